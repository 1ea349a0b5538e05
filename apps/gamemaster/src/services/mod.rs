pub mod dispatcher;
pub mod errors;
pub mod game_manager;
pub mod handoff;
pub mod history;
pub mod practice_register;
pub mod tournament_register;

pub use dispatcher::{DispatchReport, Dispatcher};
pub use errors::RegisterError;
pub use game_manager::{GameManager, PendingHandoff, PlayerSession, Retired};
pub use handoff::{HandoffError, HttpWorkerClient, WorkerClient};
pub use history::{HistorySink, LogHistory};
