use tracing::info;

use crate::domain::{Play, TournamentInfo};

/// Receives retired tournaments and plays once they leave memory.
pub trait HistorySink: Send + Sync {
    fn record(&self, tournaments: &[TournamentInfo], plays: &[Play]);
}

/// Default sink: one structured log line per retired record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHistory;

impl HistorySink for LogHistory {
    fn record(&self, tournaments: &[TournamentInfo], plays: &[Play]) {
        for tournament in tournaments {
            info!(
                tournament_id = tournament.id,
                gametype = %tournament.gametype,
                participants = tournament.max_players,
                creator_id = tournament.creator_id,
                "tournament retired"
            );
        }
        for play in plays {
            info!(
                play_id = play.id,
                tournament_id = play.tournament_id,
                phase = play.phase.map(u8::from),
                winner_id = play.winner(),
                is_draw = play.is_draw(),
                "play retired"
            );
        }
    }
}
