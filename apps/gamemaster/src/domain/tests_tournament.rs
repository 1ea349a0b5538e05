use protocol::{GameType, Phase, PlayerId};

use super::errors::{PlayError, TournamentError};
use super::ids::SequentialIds;
use super::play::Play;
use super::tournament::{Tournament, TournamentState};

fn filled(size: usize, ids: &mut SequentialIds) -> Tournament {
    let mut tournament = Tournament::new(1, size, GameType::TicTacToe, 999).unwrap();
    for player in 1..=size as PlayerId {
        tournament.register_player(player, ids).unwrap();
    }
    tournament
}

fn confirm_all(tournament: &mut Tournament) -> Vec<Play> {
    let plays = tournament.plays_to_create();
    for play in &plays {
        tournament.confirm_play_created(play.id).unwrap();
    }
    plays
}

/// Plays the bracket to the end, player1 always winning.
fn run_to_completion(tournament: &mut Tournament, ids: &mut SequentialIds) {
    while !tournament.is_over() {
        for play in confirm_all(tournament) {
            tournament
                .report_result(play.id, Some(play.player1), false, ids)
                .unwrap();
        }
    }
}

#[test]
fn rejects_sizes_that_are_not_powers_of_two() {
    for size in [0, 2, 3, 6, 12] {
        assert_eq!(
            Tournament::new(1, size, GameType::Chess, 1).unwrap_err(),
            TournamentError::InvalidSize(size)
        );
    }
    assert!(Tournament::new(1, 16, GameType::Chess, 1).is_ok());
}

#[test]
fn registration_rejects_duplicates_and_overflow() {
    let mut ids = SequentialIds::default();
    let mut tournament = Tournament::new(3, 4, GameType::TicTacToe, 1).unwrap();
    tournament.register_player(10, &mut ids).unwrap();
    assert_eq!(
        tournament.register_player(10, &mut ids),
        Err(TournamentError::AlreadyRegistered {
            tournament_id: 3,
            player_id: 10
        })
    );
    for player in [11, 12, 13] {
        tournament.register_player(player, &mut ids).unwrap();
    }
    assert!(tournament.is_full());
    assert_eq!(
        tournament.register_player(14, &mut ids),
        Err(TournamentError::Full(3))
    );
    assert_eq!(tournament.info().registered_players_count, 4);
}

#[test]
fn unregister_is_only_allowed_before_the_start() {
    let mut ids = SequentialIds::default();
    let mut tournament = Tournament::new(5, 4, GameType::TicTacToe, 1).unwrap();
    tournament.register_player(1, &mut ids).unwrap();
    tournament.unregister_player(1).unwrap();
    assert_eq!(tournament.info().registered_players_count, 0);
    assert!(matches!(
        tournament.unregister_player(1),
        Err(TournamentError::NotRegistered { .. })
    ));

    let mut started = filled(4, &mut ids);
    assert!(started.started());
    assert_eq!(
        started.unregister_player(1),
        Err(TournamentError::RegistrationClosed(1))
    );
    assert!(started.is_registered(1));
}

#[test]
fn filling_the_bracket_pairs_every_player_once() {
    let mut ids = SequentialIds::default();
    let tournament = filled(8, &mut ids);
    assert_eq!(tournament.state(), TournamentState::BeforeRoundStart);

    let plays = tournament.plays_to_create();
    assert_eq!(plays.len(), 4);
    let mut seen: Vec<PlayerId> = plays.iter().flat_map(|p| p.players()).collect();
    seen.sort();
    assert_eq!(seen, (1..=8).collect::<Vec<_>>());
    assert!(plays.iter().all(|p| p.phase.is_none() && p.tournament_id == Some(1)));
    assert_eq!(tournament.active_players().len(), 8);
}

#[test]
fn round_starts_once_every_play_is_confirmed() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(4, &mut ids);
    let plays = tournament.plays_to_create();
    assert!(plays.iter().all(|p| p.phase == Some(Phase::Semifinal)));

    tournament.confirm_play_created(plays[0].id).unwrap();
    assert_eq!(tournament.state(), TournamentState::BeforeRoundStart);
    tournament.confirm_play_created(plays[1].id).unwrap();
    assert_eq!(tournament.state(), TournamentState::RoundInProgress);

    assert_eq!(
        tournament.confirm_play_created(plays[1].id),
        Err(TournamentError::NotPending(plays[1].id))
    );
}

#[test]
fn results_for_unconfirmed_or_resolved_plays_are_rejected() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(4, &mut ids);
    let plays = tournament.plays_to_create();

    assert_eq!(
        tournament.report_result(plays[0].id, Some(plays[0].player1), false, &mut ids),
        Err(TournamentError::NotConfirmed(plays[0].id))
    );

    confirm_all(&mut tournament);
    tournament
        .report_result(plays[0].id, Some(plays[0].player1), false, &mut ids)
        .unwrap();
    assert_eq!(
        tournament.report_result(plays[0].id, Some(plays[0].player1), false, &mut ids),
        Err(TournamentError::Play(PlayError::AlreadyResolved(plays[0].id)))
    );
    assert_eq!(
        tournament.report_result(4242, None, true, &mut ids),
        Err(TournamentError::UnknownPlay(4242))
    );
}

#[test]
fn a_result_may_arrive_before_the_rest_of_the_round_is_confirmed() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(8, &mut ids);
    let plays = tournament.plays_to_create();

    tournament.confirm_play_created(plays[0].id).unwrap();
    tournament
        .report_result(plays[0].id, Some(plays[0].player2), false, &mut ids)
        .unwrap();
    assert_eq!(tournament.state(), TournamentState::BeforeRoundStart);
    assert_eq!(tournament.plays_to_create().len(), 3);
    assert!(!tournament.active_players().contains(&plays[0].player1));
}

#[test]
fn semifinal_losers_stay_active_for_the_third_place_play() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(4, &mut ids);
    let semis = confirm_all(&mut tournament);

    let mut eliminated = Vec::new();
    for play in &semis {
        eliminated.extend(
            tournament
                .report_result(play.id, Some(play.player1), false, &mut ids)
                .unwrap(),
        );
    }
    assert!(eliminated.is_empty());
    assert_eq!(tournament.active_players().len(), 4);
    assert!(tournament.is_finals());

    let finals = tournament.plays_to_create();
    assert_eq!(finals.len(), 2);
    let third = finals.iter().find(|p| p.phase == Some(Phase::ThirdPlace)).unwrap();
    let last = finals.iter().find(|p| p.phase == Some(Phase::Final)).unwrap();

    let mut losers: Vec<_> = semis.iter().map(|p| p.player2).collect();
    losers.sort();
    let mut third_players = third.players().to_vec();
    third_players.sort();
    assert_eq!(third_players, losers);

    let mut winners: Vec<_> = semis.iter().map(|p| p.player1).collect();
    winners.sort();
    let mut final_players = last.players().to_vec();
    final_players.sort();
    assert_eq!(final_players, winners);
}

#[test]
fn finals_remove_both_participants_and_finish() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(4, &mut ids);
    for play in confirm_all(&mut tournament) {
        tournament
            .report_result(play.id, Some(play.player1), false, &mut ids)
            .unwrap();
    }

    let finals = confirm_all(&mut tournament);
    let first = tournament
        .report_result(finals[0].id, Some(finals[0].player2), false, &mut ids)
        .unwrap();
    assert_eq!(first.len(), 2);
    assert!(!tournament.is_over());

    let second = tournament
        .report_result(finals[1].id, Some(finals[1].player1), false, &mut ids)
        .unwrap();
    assert_eq!(second.len(), 2);
    assert!(tournament.is_over());
    assert!(tournament.active_players().is_empty());
    assert_eq!(tournament.completed_plays().len(), 4);
}

#[test]
fn a_draw_is_rematched_immediately_with_the_same_players() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(8, &mut ids);
    let plays = confirm_all(&mut tournament);
    assert_eq!(tournament.state(), TournamentState::RoundInProgress);

    let drawn = &plays[0];
    let eliminated = tournament.report_result(drawn.id, None, true, &mut ids).unwrap();
    assert!(eliminated.is_empty());
    assert!(tournament.resolving_draws());
    assert_eq!(tournament.state(), TournamentState::BeforeRoundStart);

    let rematch = tournament.plays_to_create();
    assert_eq!(rematch.len(), 1);
    assert_eq!(rematch[0].players(), drawn.players());
    assert_ne!(rematch[0].id, drawn.id);

    // The other plays of the round keep going while the rematch is pending.
    tournament
        .report_result(plays[1].id, Some(plays[1].player1), false, &mut ids)
        .unwrap();

    tournament.confirm_play_created(rematch[0].id).unwrap();
    assert!(!tournament.resolving_draws());
    assert_eq!(tournament.state(), TournamentState::RoundInProgress);
}

#[test]
fn a_draw_in_the_finals_keeps_its_phase() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(4, &mut ids);
    for play in confirm_all(&mut tournament) {
        tournament
            .report_result(play.id, Some(play.player1), false, &mut ids)
            .unwrap();
    }
    let finals = confirm_all(&mut tournament);
    let third = finals.iter().find(|p| p.phase == Some(Phase::ThirdPlace)).unwrap();
    tournament.report_result(third.id, None, true, &mut ids).unwrap();

    let rematch = tournament.plays_to_create();
    assert_eq!(rematch.len(), 1);
    assert_eq!(rematch[0].phase, Some(Phase::ThirdPlace));
    assert!(!tournament.is_over());
}

#[test]
fn draw_free_bracket_produces_one_play_per_player() {
    for size in [4usize, 8, 16, 32] {
        let mut ids = SequentialIds::default();
        let mut tournament = filled(size, &mut ids);
        run_to_completion(&mut tournament, &mut ids);

        let plays = tournament.completed_plays();
        assert_eq!(plays.len(), size, "bracket of {size}");
        assert_eq!(plays.iter().filter(|p| p.phase == Some(Phase::Final)).count(), 1);
        assert_eq!(plays.iter().filter(|p| p.phase == Some(Phase::ThirdPlace)).count(), 1);
        assert_eq!(plays.iter().filter(|p| p.phase == Some(Phase::Semifinal)).count(), 2);
    }
}

#[test]
fn current_play_lookup_only_sees_active_plays() {
    let mut ids = SequentialIds::default();
    let mut tournament = filled(4, &mut ids);
    let pending = tournament.plays_to_create();
    assert!(tournament.current_play_of(pending[0].player1).is_none());

    tournament.confirm_play_created(pending[0].id).unwrap();
    assert_eq!(
        tournament.current_play_of(pending[0].player1).map(|p| p.id),
        Some(pending[0].id)
    );
    assert!(tournament.find_active_play(pending[0].id).is_some());
    assert!(tournament.find_active_play(pending[1].id).is_none());
}
