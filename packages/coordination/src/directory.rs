//! Peer discovery on top of the coordination primitive.
//!
//! Each service instance publishes an ephemeral [`ServiceRecord`] under
//! `/{category}`; consumers watch the category and rebuild their peer list
//! whenever its children change.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::{Coordinator, CreateMode, WatchKind};
use crate::error::CoordError;
use crate::paths;

/// Self-description published by every service instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub url: String,
}

impl ServiceRecord {
    /// Builds a record whose URL is `http://{ip}:{port}/{prefix}/`.
    pub fn new(hostname: impl Into<String>, ip: impl Into<String>, port: u16, prefix: &str) -> Self {
        let ip = ip.into();
        let prefix = prefix.trim_matches('/');
        let url = if prefix.is_empty() {
            format!("http://{ip}:{port}/")
        } else {
            format!("http://{ip}:{port}/{prefix}/")
        };
        Self {
            hostname: hostname.into(),
            ip,
            port,
            url,
        }
    }
}

/// How an instance occupies its category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// One fixed-name node, held by at most one session at a time.
    Singleton,
    /// A sequential node per instance, for tiers with many workers.
    Sequential,
}

#[derive(Clone)]
pub struct ServiceDirectory {
    coordinator: Arc<dyn Coordinator>,
}

impl ServiceDirectory {
    pub fn new(coordinator: Arc<dyn Coordinator>) -> Self {
        Self { coordinator }
    }

    fn category_root(category: &str) -> String {
        paths::join(paths::ROOT, category)
    }

    async fn owned_by_us(&self, path: &str) -> Result<Option<bool>, CoordError> {
        let session = self.coordinator.session_id();
        Ok(self
            .coordinator
            .exists(path)
            .await?
            .map(|stat| stat.ephemeral_owner == Some(session)))
    }

    /// Publishes `record` as an ephemeral node and returns its path.
    ///
    /// Registering again under the same session returns the node already
    /// held. A singleton name held by another session is a
    /// [`CoordError::NodeExists`].
    pub async fn register_self(
        &self,
        category: &str,
        instance: &str,
        record: &ServiceRecord,
        registration: Registration,
    ) -> Result<String, CoordError> {
        let root = Self::category_root(category);
        self.coordinator.ensure_path(&root).await?;
        let data = serde_json::to_vec(record)?;

        match registration {
            Registration::Singleton => {
                let path = paths::join(&root, instance);
                loop {
                    match self
                        .coordinator
                        .create(&path, data.clone(), CreateMode::Ephemeral)
                        .await
                    {
                        Ok(created) => {
                            info!(path = %created, url = %record.url, "registered in service directory");
                            return Ok(created);
                        }
                        Err(e) if e.is_benign_exists() => match self.owned_by_us(&path).await? {
                            Some(true) => {
                                debug!(path = %path, "directory entry already held by this session");
                                return Ok(path);
                            }
                            Some(false) => {
                                warn!(path = %path, "directory name is held by another session");
                                return Err(e);
                            }
                            // Released between the create and the check.
                            None => continue,
                        },
                        Err(e) => return Err(e),
                    }
                }
            }
            Registration::Sequential => {
                let prefix = format!("{instance}-");
                for child in self.coordinator.children(&root).await? {
                    if !child.starts_with(&prefix) {
                        continue;
                    }
                    let path = paths::join(&root, &child);
                    if self.owned_by_us(&path).await? == Some(true) {
                        debug!(path = %path, "sequential entry already held by this session");
                        return Ok(path);
                    }
                }
                let created = self
                    .coordinator
                    .create(
                        &paths::join(&root, &prefix),
                        data,
                        CreateMode::EphemeralSequential,
                    )
                    .await?;
                info!(path = %created, url = %record.url, "registered in service directory");
                Ok(created)
            }
        }
    }

    async fn read_record(&self, path: &str) -> Result<Option<ServiceRecord>, CoordError> {
        match self.coordinator.read(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Watches `category` and calls `on_update` with the URLs of all live
    /// instances every time the set changes. Only returns on error.
    pub async fn discover<F>(&self, category: &str, mut on_update: F) -> Result<(), CoordError>
    where
        F: FnMut(Vec<String>) + Send,
    {
        let root = Self::category_root(category);

        loop {
            let (stat, watch) = self.coordinator.exists_watch(&root).await?;
            if stat.is_some() {
                break;
            }
            debug!(category, "waiting for directory category to appear");
            if watch.fired().await.kind == WatchKind::SessionLost {
                return Err(CoordError::SessionExpired);
            }
        }

        loop {
            let (mut children, watch) = self.coordinator.children_watch(&root).await?;
            children.sort();

            let reads = children.iter().map(|child| {
                let path = paths::join(&root, child);
                async move { self.read_record(&path).await }
            });

            let mut urls = Vec::with_capacity(children.len());
            for outcome in join_all(reads).await {
                match outcome {
                    Ok(Some(record)) => urls.push(record.url),
                    // Vanished between listing and reading.
                    Ok(None) => {}
                    Err(CoordError::Codec { detail }) => {
                        debug!(category, detail = %detail, "skipping unreadable directory entry");
                    }
                    Err(e) => return Err(e),
                }
            }

            debug!(category, peers = urls.len(), "directory membership updated");
            on_update(urls);

            if watch.fired().await.kind == WatchKind::SessionLost {
                return Err(CoordError::SessionExpired);
            }
        }
    }

    /// Keeps a singleton entry alive: re-creates it whenever it disappears.
    /// While another session holds the name, stands by until it is released.
    /// Only returns on error.
    pub async fn maintain_singleton(
        &self,
        category: &str,
        instance: &str,
        record: &ServiceRecord,
    ) -> Result<(), CoordError> {
        let path = paths::join(&Self::category_root(category), instance);
        loop {
            match self
                .register_self(category, instance, record, Registration::Singleton)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_benign_exists() => {
                    info!(path = %path, "standing by for the singleton entry");
                }
                Err(e) => return Err(e),
            }
            let (stat, watch) = self.coordinator.exists_watch(&path).await?;
            if stat.is_none() {
                continue;
            }
            match watch.fired().await.kind {
                WatchKind::SessionLost => return Err(CoordError::SessionExpired),
                WatchKind::Deleted => {
                    info!(path = %path, "singleton entry disappeared, re-creating");
                }
                _ => {}
            }
        }
    }

    /// Waits until the singleton `instance` of `category` is registered and
    /// returns its record.
    pub async fn await_singleton(
        &self,
        category: &str,
        instance: &str,
    ) -> Result<ServiceRecord, CoordError> {
        let path = paths::join(&Self::category_root(category), instance);
        loop {
            let (stat, watch) = self.coordinator.exists_watch(&path).await?;
            if stat.is_some() {
                if let Some(record) = self.read_record(&path).await? {
                    return Ok(record);
                }
            }
            debug!(path = %path, "waiting for singleton peer");
            if watch.fired().await.kind == WatchKind::SessionLost {
                return Err(CoordError::SessionExpired);
            }
        }
    }

    /// Follows a singleton peer, reporting its URL (or `None` while absent)
    /// whenever it changes. Only returns on error.
    pub async fn follow_singleton<F>(
        &self,
        category: &str,
        instance: &str,
        mut on_update: F,
    ) -> Result<(), CoordError>
    where
        F: FnMut(Option<String>) + Send,
    {
        let path = paths::join(&Self::category_root(category), instance);
        loop {
            let (stat, watch) = self.coordinator.exists_watch(&path).await?;
            let url = match stat {
                Some(_) => self.read_record(&path).await?.map(|record| record.url),
                None => None,
            };
            on_update(url);
            if watch.fired().await.kind == WatchKind::SessionLost {
                return Err(CoordError::SessionExpired);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::memory::MemoryEnsemble;

    fn record(port: u16) -> ServiceRecord {
        ServiceRecord::new("host", "10.0.0.1", port, "playmaster")
    }

    #[test]
    fn record_url_carries_the_prefix() {
        assert_eq!(record(8000).url, "http://10.0.0.1:8000/playmaster/");
        assert_eq!(
            ServiceRecord::new("h", "127.0.0.1", 80, "").url,
            "http://127.0.0.1:80/"
        );
    }

    #[tokio::test]
    async fn discover_tracks_joins_and_departures() {
        let ensemble = MemoryEnsemble::new();
        let watcher = ServiceDirectory::new(Arc::new(ensemble.connect()));
        let worker_a = Arc::new(ensemble.connect());
        let worker_b = Arc::new(ensemble.connect());

        let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::default();
        let sink = seen.clone();
        let task = tokio::spawn(async move {
            watcher
                .discover("playmaster", move |urls| sink.lock().push(urls))
                .await
        });

        ServiceDirectory::new(worker_a.clone())
            .register_self("playmaster", "pm", &record(8001), Registration::Sequential)
            .await
            .unwrap();
        ServiceDirectory::new(worker_b.clone())
            .register_self("playmaster", "pm", &record(8002), Registration::Sequential)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.lock().last().map(Vec::len), Some(2));

        worker_a.expire();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            seen.lock().last().cloned(),
            Some(vec!["http://10.0.0.1:8002/playmaster/".to_string()])
        );
        task.abort();
    }

    #[tokio::test]
    async fn singleton_is_recreated_after_deletion() {
        let ensemble = MemoryEnsemble::new();
        let owner = Arc::new(ensemble.connect());
        let admin = ensemble.connect();
        let directory = ServiceDirectory::new(owner.clone());
        let gm = ServiceRecord::new("gm", "10.0.0.9", 9000, "gamemaster");

        let task = tokio::spawn(async move {
            directory
                .maintain_singleton("gamemaster", "gamemaster", &gm)
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        admin.delete("/gamemaster/gamemaster").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(admin.exists("/gamemaster/gamemaster").await.unwrap().is_some());
        task.abort();
    }

    #[tokio::test]
    async fn await_singleton_returns_once_peer_registers() {
        let ensemble = MemoryEnsemble::new();
        let waiter = ServiceDirectory::new(Arc::new(ensemble.connect()));
        let peer = ServiceDirectory::new(Arc::new(ensemble.connect()));

        let pending =
            tokio::spawn(async move { waiter.await_singleton("gamemaster", "gamemaster").await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let gm = ServiceRecord::new("gm", "10.0.0.9", 9000, "gamemaster");
        peer.register_self("gamemaster", "gamemaster", &gm, Registration::Singleton)
            .await
            .unwrap();

        let found = pending.await.unwrap().unwrap();
        assert_eq!(found, gm);
    }

    #[tokio::test]
    async fn a_singleton_name_has_one_holder() {
        let ensemble = MemoryEnsemble::new();
        let first = ServiceDirectory::new(Arc::new(ensemble.connect()));
        let second_client = Arc::new(ensemble.connect());
        let second = ServiceDirectory::new(second_client.clone());

        let path = first
            .register_self("playmaster", "pm-a", &record(8001), Registration::Singleton)
            .await
            .unwrap();
        assert_eq!(
            first
                .register_self("playmaster", "pm-a", &record(8001), Registration::Singleton)
                .await
                .unwrap(),
            path
        );

        let err = second
            .register_self("playmaster", "pm-a", &record(8002), Registration::Singleton)
            .await
            .unwrap_err();
        assert_eq!(err, CoordError::node_exists("/playmaster/pm-a"));
        let (bytes, stat) = second_client.get(&path).await.unwrap();
        assert_ne!(stat.ephemeral_owner, Some(second_client.session_id()));
        let held: ServiceRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(held.port, 8001);
    }

    #[tokio::test]
    async fn sequential_claimants_of_one_name_both_appear() {
        let ensemble = MemoryEnsemble::new();
        let admin = ensemble.connect();
        let first = ServiceDirectory::new(Arc::new(ensemble.connect()));
        let second = ServiceDirectory::new(Arc::new(ensemble.connect()));

        let a = first
            .register_self("playmaster", "pm", &record(8001), Registration::Sequential)
            .await
            .unwrap();
        let b = second
            .register_self("playmaster", "pm", &record(8002), Registration::Sequential)
            .await
            .unwrap();
        assert_ne!(a, b);

        // Re-registering within a live session keeps the node it already holds.
        let again = first
            .register_self("playmaster", "pm", &record(8001), Registration::Sequential)
            .await
            .unwrap();
        assert_eq!(again, a);
        assert_eq!(admin.children("/playmaster").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn a_standby_singleton_takes_over_when_the_holder_leaves() {
        let ensemble = MemoryEnsemble::new();
        let holder = Arc::new(ensemble.connect());
        let admin = ensemble.connect();
        let standby_client = Arc::new(ensemble.connect());
        let gm = |port| ServiceRecord::new("gm", "10.0.0.9", port, "gamemaster");

        ServiceDirectory::new(holder.clone())
            .register_self("gamemaster", "gamemaster", &gm(9000), Registration::Singleton)
            .await
            .unwrap();

        let standby = ServiceDirectory::new(standby_client.clone());
        let task = tokio::spawn(async move {
            standby
                .maintain_singleton("gamemaster", "gamemaster", &gm(9001))
                .await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, stat) = admin.get("/gamemaster/gamemaster").await.unwrap();
        assert_eq!(stat.ephemeral_owner, Some(holder.session_id()));

        holder.expire();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let (_, stat) = admin.get("/gamemaster/gamemaster").await.unwrap();
        assert_eq!(stat.ephemeral_owner, Some(standby_client.session_id()));
        task.abort();
    }
}
