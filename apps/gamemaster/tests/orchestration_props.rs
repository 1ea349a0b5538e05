use std::collections::HashSet;
use std::sync::Arc;

use gamemaster::domain::{Play, SequentialIds, TournamentInfo};
use gamemaster::services::{GameManager, HistorySink, LogHistory};
use parking_lot::Mutex;
use proptest::prelude::*;
use protocol::{
    CreateTournament, GameType, Phase, PlayResultReport, PlayerId, PracticeJoin,
    TournamentRegistration,
};
use test_support::proptest_config::proptest_config;

#[ctor::ctor]
fn init_logging() {
    test_support::logging::init();
}

#[derive(Default)]
struct Collected {
    plays: Mutex<Vec<Play>>,
    tournaments: Mutex<Vec<TournamentInfo>>,
}

impl HistorySink for Collected {
    fn record(&self, tournaments: &[TournamentInfo], plays: &[Play]) {
        self.tournaments.lock().extend_from_slice(tournaments);
        self.plays.lock().extend_from_slice(plays);
    }
}

fn join(player: PlayerId, game_type: GameType) -> PracticeJoin {
    PracticeJoin {
        player_id: player,
        username: format!("player-{player}"),
        game_type,
        ui_url: None,
    }
}

fn confirm_everything(manager: &mut GameManager) {
    for handoff in manager.pending_handoffs() {
        manager
            .confirm_handoff(handoff.play_id(), "http://worker/playmaster/")
            .unwrap();
    }
}

fn assert_no_player_in_two_plays(manager: &GameManager) {
    let mut seen = HashSet::new();
    for play in manager.active_plays() {
        for player in [play.player1_id, play.player2_id] {
            assert!(seen.insert(player), "player {player} is in two active plays");
        }
    }
    let mut pending = HashSet::new();
    for handoff in manager.pending_handoffs() {
        for player in [handoff.request.player1_id, handoff.request.player2_id] {
            assert!(!seen.contains(&player), "player {player} is active and pending");
            assert!(pending.insert(player), "player {player} is in two pending plays");
        }
    }
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn practice_queues_drain_by_twos(choices in prop::collection::vec(any::<bool>(), 0..40)) {
        let mut manager = GameManager::new(Box::new(SequentialIds::default()), Arc::new(LogHistory))
            .with_hosted_game_types(GameType::ALL);
        for (index, chess) in choices.iter().enumerate() {
            let game_type = if *chess { GameType::Chess } else { GameType::TicTacToe };
            manager.join_practice(join(index as PlayerId + 1, game_type), None).unwrap();
        }

        let chess = choices.iter().filter(|c| **c).count();
        let tic_tac_toe = choices.len() - chess;
        let pending = manager.pending_handoffs();
        prop_assert_eq!(pending.len(), chess / 2 + tic_tac_toe / 2);

        let mut paired = HashSet::new();
        for handoff in &pending {
            let (p1, p2) = (handoff.request.player1_id, handoff.request.player2_id);
            prop_assert_ne!(p1, p2);
            prop_assert!(paired.insert(p1));
            prop_assert!(paired.insert(p2));
            let first = choices[(p1 - 1) as usize];
            let second = choices[(p2 - 1) as usize];
            prop_assert_eq!(first, second, "pairs never mix game types");
        }
        prop_assert_eq!(paired.len(), (chess / 2 + tic_tac_toe / 2) * 2);
    }

    #[test]
    fn no_player_is_ever_in_two_active_plays(
        ops in prop::collection::vec((0u8..4, 1i64..12, any::<bool>()), 1..80)
    ) {
        let mut manager = GameManager::new(Box::new(SequentialIds::default()), Arc::new(LogHistory))
            .with_hosted_game_types(GameType::ALL);
        let tournament = manager
            .create_tournament(CreateTournament {
                creator_id: 100,
                game_type: GameType::TicTacToe,
                max_players: 4,
            })
            .unwrap();

        for (op, player, flag) in ops {
            match op {
                0 => {
                    let game_type = if flag { GameType::Chess } else { GameType::TicTacToe };
                    let _ = manager.join_practice(join(player, game_type), None);
                }
                1 => {
                    let _ = manager.register_in_tournament(
                        TournamentRegistration {
                            tournament_id: tournament.id,
                            player_id: player,
                            username: None,
                            ui_url: None,
                        },
                        None,
                    );
                }
                2 => confirm_everything(&mut manager),
                _ => {
                    if let Some(play) = manager.active_plays().into_iter().next() {
                        let winner = if flag { play.player1_id } else { play.player2_id };
                        let draw = player % 5 == 0;
                        manager
                            .record_result(PlayResultReport {
                                play_id: play.play_id,
                                winner_id: (!draw).then_some(winner),
                                is_draw: draw,
                            })
                            .unwrap();
                    }
                }
            }
            assert_no_player_in_two_plays(&manager);
        }
    }

    #[test]
    fn brackets_finish_with_one_final_and_one_third_place_play(
        exponent in 2u32..6,
        coin_flips in prop::collection::vec(0u8..6, 64..128),
    ) {
        let size = 1usize << exponent;
        let history = Arc::new(Collected::default());
        let mut manager = GameManager::new(Box::new(SequentialIds::default()), history.clone());
        let info = manager
            .create_tournament(CreateTournament {
                creator_id: 1,
                game_type: GameType::TicTacToe,
                max_players: size,
            })
            .unwrap();
        for player in 1..=size as PlayerId {
            manager
                .register_in_tournament(
                    TournamentRegistration {
                        tournament_id: info.id,
                        player_id: player,
                        username: None,
                        ui_url: None,
                    },
                    None,
                )
                .unwrap();
        }

        // Draws are allowed until the flips run out, then every play is decisive.
        let mut flips = coin_flips.into_iter();
        let mut draws = 0;
        while history.tournaments.lock().is_empty() {
            confirm_everything(&mut manager);
            let Some(play) = manager.active_plays().into_iter().next() else {
                return Err(TestCaseError::fail("bracket stalled without active plays"));
            };
            let flip = flips.next().unwrap_or(1);
            let draw = flip == 0;
            draws += usize::from(draw);
            let winner = if flip % 2 == 0 { play.player1_id } else { play.player2_id };
            manager
                .record_result(PlayResultReport {
                    play_id: play.play_id,
                    winner_id: (!draw).then_some(winner),
                    is_draw: draw,
                })
                .unwrap();
        }

        let plays = history.plays.lock();
        prop_assert_eq!(plays.len(), size + draws);
        let decisive: Vec<&Play> = plays.iter().filter(|p| !p.is_draw()).collect();
        prop_assert_eq!(decisive.len(), size);
        prop_assert_eq!(decisive.iter().filter(|p| p.phase == Some(Phase::Final)).count(), 1);
        prop_assert_eq!(decisive.iter().filter(|p| p.phase == Some(Phase::ThirdPlace)).count(), 1);
        prop_assert!((1..=size as PlayerId).all(|p| !manager.player_exists(p)));
    }
}
