use protocol::{CreatePlayRequest, GameType, Phase, PlayId, PlayerId, TournamentId};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Game, GameError, MoveError, RuleSet};

const PLAYER1_MARK: u8 = 1;
const PLAYER2_MARK: u8 = 10;
/// Turn counter value once all nine squares are filled.
const LAST_TURN: u8 = 10;

const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Tic-tac-toe board. Player one marks squares with 1 and player two with
/// 10, so a completed line sums to 3 or 30. `turn` starts at 1 and player
/// one moves on odd turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicTacToe {
    play_id: PlayId,
    gametype: GameType,
    squares: [u8; 9],
    player1: PlayerId,
    player2: PlayerId,
    #[serde(default)]
    player1_username: Option<String>,
    #[serde(default)]
    player2_username: Option<String>,
    #[serde(default)]
    tournament_id: Option<TournamentId>,
    #[serde(default)]
    phase: Option<Phase>,
    turn: u8,
}

#[derive(Debug, Deserialize)]
struct SquareMove {
    square_to_play: Option<i64>,
}

impl TicTacToe {
    pub fn new(request: &CreatePlayRequest) -> Self {
        Self {
            play_id: request.play_id,
            gametype: GameType::TicTacToe,
            squares: [0; 9],
            player1: request.player1_id,
            player2: request.player2_id,
            player1_username: request.player1_username.clone(),
            player2_username: request.player2_username.clone(),
            tournament_id: request.tournament_id,
            phase: request.phase,
            turn: 1,
        }
    }

    pub fn who_plays(&self) -> PlayerId {
        if self.turn % 2 == 1 {
            self.player1
        } else {
            self.player2
        }
    }

    fn last_mover(&self) -> Option<PlayerId> {
        (self.turn > 1).then(|| {
            if self.who_plays() == self.player1 {
                self.player2
            } else {
                self.player1
            }
        })
    }

    fn has_line(&self) -> bool {
        LINES.iter().any(|line| {
            let sum: u8 = line.iter().map(|&i| self.squares[i]).sum();
            sum == 3 * PLAYER1_MARK || sum == 3 * PLAYER2_MARK
        })
    }

    fn check_consistent(&self) -> Result<(), GameError> {
        if self.gametype != GameType::TicTacToe {
            return Err(GameError::Corrupt(format!(
                "play {} is tagged {}",
                self.play_id, self.gametype
            )));
        }
        if !(1..=LAST_TURN).contains(&self.turn) {
            return Err(GameError::Corrupt(format!(
                "play {} has turn {}",
                self.play_id, self.turn
            )));
        }
        let marks = |mark| self.squares.iter().filter(|&&s| s == mark).count();
        let filled = marks(PLAYER1_MARK) + marks(PLAYER2_MARK);
        if filled != usize::from(self.turn - 1) || self.squares.iter().any(|&s| s != 0 && s != PLAYER1_MARK && s != PLAYER2_MARK) {
            return Err(GameError::Corrupt(format!(
                "play {} board does not match turn {}",
                self.play_id, self.turn
            )));
        }
        Ok(())
    }
}

impl Game for TicTacToe {
    fn play_id(&self) -> PlayId {
        self.play_id
    }

    fn game_type(&self) -> GameType {
        GameType::TicTacToe
    }

    fn players(&self) -> [PlayerId; 2] {
        [self.player1, self.player2]
    }

    fn tournament_id(&self) -> Option<TournamentId> {
        self.tournament_id
    }

    fn apply_move(&mut self, player_id: PlayerId, mv: &Value) -> Result<(), MoveError> {
        if self.is_over() {
            return Err(MoveError::GameOver(self.play_id));
        }
        if !self.has_player(player_id) {
            return Err(MoveError::NotAParticipant {
                play_id: self.play_id,
                player_id,
            });
        }
        if self.who_plays() != player_id {
            return Err(MoveError::NotYourTurn {
                play_id: self.play_id,
                player_id,
            });
        }

        let invalid = |reason: String| MoveError::Invalid {
            play_id: self.play_id,
            reason,
        };
        let square = SquareMove::deserialize(mv)
            .ok()
            .and_then(|m| m.square_to_play)
            .ok_or_else(|| invalid("square_to_play not given".to_string()))?;
        let index = usize::try_from(square)
            .ok()
            .filter(|i| *i < self.squares.len())
            .ok_or_else(|| invalid(format!("square index {square} is off the board")))?;
        if self.squares[index] != 0 {
            return Err(invalid(format!("square index {square} is taken")));
        }

        self.squares[index] = if player_id == self.player1 {
            PLAYER1_MARK
        } else {
            PLAYER2_MARK
        };
        self.turn += 1;
        Ok(())
    }

    fn is_over(&self) -> bool {
        self.has_line() || self.turn == LAST_TURN
    }

    fn winner(&self) -> Option<PlayerId> {
        if self.has_line() {
            self.last_mover()
        } else {
            None
        }
    }

    fn is_draw(&self) -> bool {
        self.turn == LAST_TURN && !self.has_line()
    }

    fn to_state(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    fn view(&self) -> Value {
        json!({
            "play_id": self.play_id,
            "gametype": self.gametype,
            "player1_id": self.player1,
            "player2_id": self.player2,
            "player1_username": self.player1_username,
            "player2_username": self.player2_username,
            "gamestate": self.squares,
            "gameover": self.is_over(),
            "winner": self.winner(),
            "isADraw": self.is_draw(),
            "tournament_id": self.tournament_id,
            "phase": self.phase,
            "who_plays": self.who_plays(),
        })
    }
}

/// Creates and restores [`TicTacToe`] games.
#[derive(Debug, Default, Clone, Copy)]
pub struct TicTacToeRules;

impl RuleSet for TicTacToeRules {
    fn game_type(&self) -> GameType {
        GameType::TicTacToe
    }

    fn create(&self, request: &CreatePlayRequest) -> Box<dyn Game> {
        Box::new(TicTacToe::new(request))
    }

    fn restore(&self, state: &Value) -> Result<Box<dyn Game>, GameError> {
        let game = TicTacToe::deserialize(state).map_err(|e| GameError::Corrupt(e.to_string()))?;
        game.check_consistent()?;
        Ok(Box::new(game))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreatePlayRequest {
        CreatePlayRequest {
            play_id: 7,
            player1_id: 1,
            player2_id: 2,
            player1_username: Some("ann".into()),
            player2_username: Some("bob".into()),
            tournament_id: Some(3),
            phase: Some(Phase::Final),
            player1_ui_url: None,
            player2_ui_url: None,
        }
    }

    fn play(game: &mut TicTacToe, moves: &[(PlayerId, i64)]) {
        for (player, square) in moves {
            game.apply_move(*player, &json!({ "square_to_play": square }))
                .unwrap();
        }
    }

    #[test]
    fn player_one_opens_and_turns_alternate() {
        let mut game = TicTacToe::new(&request());
        assert_eq!(game.who_plays(), 1);
        play(&mut game, &[(1, 4)]);
        assert_eq!(game.who_plays(), 2);
        assert_eq!(game.squares[4], PLAYER1_MARK);

        let err = game.apply_move(1, &json!({"square_to_play": 0})).unwrap_err();
        assert_eq!(err, MoveError::NotYourTurn { play_id: 7, player_id: 1 });
    }

    #[test]
    fn invalid_moves_leave_the_board_untouched() {
        let mut game = TicTacToe::new(&request());
        play(&mut game, &[(1, 4)]);
        let before = game.clone();

        for mv in [
            json!({"square_to_play": 4}),
            json!({"square_to_play": 9}),
            json!({"square_to_play": -1}),
            json!({}),
            json!({"square_to_play": "middle"}),
        ] {
            let err = game.apply_move(2, &mv).unwrap_err();
            assert!(matches!(err, MoveError::Invalid { play_id: 7, .. }), "{mv}: {err:?}");
        }
        assert_eq!(game, before);

        let err = game.apply_move(99, &json!({"square_to_play": 0})).unwrap_err();
        assert_eq!(err, MoveError::NotAParticipant { play_id: 7, player_id: 99 });
    }

    #[test]
    fn a_completed_line_wins_for_the_last_mover() {
        let mut game = TicTacToe::new(&request());
        play(&mut game, &[(1, 0), (2, 3), (1, 1), (2, 4)]);
        assert!(!game.is_over());
        play(&mut game, &[(1, 2)]);

        assert!(game.is_over());
        assert_eq!(game.winner(), Some(1));
        assert!(!game.is_draw());
        assert_eq!(
            game.apply_move(2, &json!({"square_to_play": 8})).unwrap_err(),
            MoveError::GameOver(7)
        );
    }

    #[test]
    fn player_two_wins_a_column() {
        let mut game = TicTacToe::new(&request());
        play(&mut game, &[(1, 0), (2, 2), (1, 3), (2, 5), (1, 7), (2, 8)]);
        assert_eq!(game.winner(), Some(2));
    }

    #[test]
    fn a_full_board_without_a_line_is_a_draw() {
        let mut game = TicTacToe::new(&request());
        play(
            &mut game,
            &[(1, 0), (2, 1), (1, 2), (2, 4), (1, 3), (2, 5), (1, 7), (2, 6), (1, 8)],
        );
        assert!(game.is_over());
        assert!(game.is_draw());
        assert_eq!(game.winner(), None);
    }

    #[test]
    fn persisted_state_restores_the_same_game() {
        let mut game = TicTacToe::new(&request());
        play(&mut game, &[(1, 4), (2, 0)]);

        let state = game.to_state();
        assert_eq!(state["gametype"], "tic-tac-toe");
        assert_eq!(state["phase"], 1);
        assert_eq!(state["turn"], 3);

        let restored = TicTacToeRules.restore(&state).unwrap();
        assert_eq!(restored.view(), game.view());
        assert_eq!(restored.to_state(), state);
    }

    #[test]
    fn inconsistent_state_is_refused() {
        let mut state = TicTacToe::new(&request()).to_state();
        state["turn"] = json!(4);
        assert!(matches!(TicTacToeRules.restore(&state), Err(GameError::Corrupt(_))));

        state["turn"] = json!(1);
        state["squares"] = json!([5, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert!(matches!(TicTacToeRules.restore(&state), Err(GameError::Corrupt(_))));
    }

    #[test]
    fn view_reports_turn_and_outcome() {
        let game = TicTacToe::new(&request());
        let view = game.view();
        assert_eq!(view["who_plays"], 1);
        assert_eq!(view["gameover"], false);
        assert_eq!(view["isADraw"], false);
        assert_eq!(view["winner"], Value::Null);
        assert_eq!(view["player2_username"], "bob");
        assert_eq!(view["gamestate"], json!([0, 0, 0, 0, 0, 0, 0, 0, 0]));
    }
}
