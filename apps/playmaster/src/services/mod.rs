pub mod game_host;
pub mod gamemaster_client;
pub mod play_manager;
pub mod session_runner;
pub mod ui_notifier;

pub use game_host::{GameHost, HostError, MoveCommand};
pub use gamemaster_client::{
    GamemasterClient, GamemasterUrl, HttpGamemasterClient, ReportError,
};
pub use play_manager::{PlayManager, PlayManagerError, PlayManagerState};
pub use session_runner::SessionRunner;
pub use ui_notifier::{HttpUiNotifier, UiNotifier};
