use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(name = "coordinator")]
#[command(about = "Coordination service backing the gamemaster and playmasters")]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "COORDINATOR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind
    #[arg(short, long, env = "COORDINATOR_PORT", default_value_t = 2181)]
    pub port: u16,

    /// Session timeout granted when a client does not ask for one
    #[arg(long, env = "COORDINATOR_SESSION_TIMEOUT_MS", default_value_t = 10_000)]
    pub session_timeout_ms: u64,

    /// How often silent sessions are looked for
    #[arg(long, env = "COORDINATOR_REAP_INTERVAL_MS", default_value_t = 1_000)]
    pub reap_interval_ms: u64,
}

impl Args {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_millis(self.reap_interval_ms.max(10))
    }
}
