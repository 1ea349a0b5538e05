use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::client::Coordinator;
use crate::error::CoordError;
use crate::memory::MemoryEnsemble;
use crate::remote::RemoteCoordinator;

/// Connects to the coordinator service at `url`, or to a private in-process
/// ensemble when no URL is configured.
pub async fn connect(
    url: Option<&str>,
    session_timeout: Duration,
) -> Result<Arc<dyn Coordinator>, CoordError> {
    match url {
        Some(url) => Ok(Arc::new(RemoteCoordinator::connect(url, session_timeout).await?)),
        None => {
            info!("no coordination URL configured, using an in-process ensemble");
            Ok(Arc::new(MemoryEnsemble::new().connect()))
        }
    }
}
