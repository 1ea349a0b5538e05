//! Coordination substrate shared by every service: a hierarchical node store
//! with ephemeral ownership and one-shot watches, peer discovery on top of
//! it, and exclusive ownership of recoverable session directories.

pub mod bootstrap;
pub mod client;
pub mod directory;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod paths;
pub mod remote;
pub mod retry;
pub mod session;

pub use bootstrap::connect;
pub use client::{
    ConnectionState, Coordinator, CreateMode, SessionId, Stat, Watch, WatchEvent, WatchKind,
};
pub use directory::{Registration, ServiceDirectory, ServiceRecord};
pub use error::CoordError;
pub use lifecycle::{spawn_supervised, supervise, ConnectionGate};
pub use memory::{MemoryClient, MemoryEnsemble};
pub use remote::{RemoteCoordinator, RemoteHost};
pub use session::{
    Acquisition, PersistError, SessionCoordinator, SessionPhase, SessionSnapshot, SessionStore,
    SESSION_ROOT,
};
