//! Persistence for the per-session pending order marker.
//!
//! The marker is what lets a reloaded processing page find its order again.
//! Only one marker is kept per session; saving replaces the previous one.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::models::PendingOrder;

#[async_trait]
pub trait PendingOrderStore: Send + Sync {
    async fn save(&self, session_id: &str, pending: &PendingOrder) -> Result<()>;
    async fn load(&self, session_id: &str) -> Result<Option<PendingOrder>>;
    async fn clear(&self, session_id: &str) -> Result<()>;
}

/// Markers kept in process memory. Lost on restart.
#[derive(Default)]
pub struct MemoryPendingOrderStore {
    markers: Mutex<HashMap<String, PendingOrder>>,
}

#[async_trait]
impl PendingOrderStore for MemoryPendingOrderStore {
    async fn save(&self, session_id: &str, pending: &PendingOrder) -> Result<()> {
        self.markers
            .lock()
            .await
            .insert(session_id.to_string(), pending.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Option<PendingOrder>> {
        Ok(self.markers.lock().await.get(session_id).cloned())
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        self.markers.lock().await.remove(session_id);
        Ok(())
    }
}

/// Markers kept in a single JSON file mapping session id to marker.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous map intact.
pub struct FilePendingOrderStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FilePendingOrderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_map(&self) -> Result<HashMap<String, PendingOrder>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &HashMap<String, PendingOrder>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), markers = map.len(), "Pending order markers written");
        Ok(())
    }
}

#[async_trait]
impl PendingOrderStore for FilePendingOrderStore {
    async fn save(&self, session_id: &str, pending: &PendingOrder) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        map.insert(session_id.to_string(), pending.clone());
        self.write_map(&map).await
    }

    async fn load(&self, session_id: &str) -> Result<Option<PendingOrder>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_map().await?.remove(session_id))
    }

    async fn clear(&self, session_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut map = self.read_map().await?;
        if map.remove(session_id).is_some() {
            self.write_map(&map).await?;
        }
        Ok(())
    }
}
