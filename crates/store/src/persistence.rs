//! Whole-state snapshot persistence.
//!
//! The engine's working set is small (one month of campaigns per client), so
//! durability is a periodic JSON snapshot of everything: events, series
//! registry, approval records, and change requests. Snapshots are written to
//! a temp file and renamed into place so a crash mid-write never corrupts
//! the previous snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use cadence_core::approval::ApprovalRecord;
use cadence_core::change_request::ChangeRequest;
use cadence_core::error::CoreError;
use cadence_core::event::CalendarEvent;
use cadence_core::series::CampaignSeries;

use crate::approval_repo::ApprovalRepo;
use crate::change_request_repo::ChangeRequestRepo;
use crate::event_store::EventStore;

/// Serialized form of the entire engine state.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub events: Vec<CalendarEvent>,
    pub series: Vec<CampaignSeries>,
    pub approvals: Vec<ApprovalRecord>,
    pub change_requests: Vec<ChangeRequest>,
    pub seq: u64,
}

/// Periodically snapshots the engine state to one JSON file.
pub struct Persister {
    store: Arc<EventStore>,
    approvals: Arc<ApprovalRepo>,
    change_requests: Arc<ChangeRequestRepo>,
    path: PathBuf,
}

impl Persister {
    pub fn new(
        store: Arc<EventStore>,
        approvals: Arc<ApprovalRepo>,
        change_requests: Arc<ChangeRequestRepo>,
        path: impl AsRef<Path>,
    ) -> Self {
        Self {
            store,
            approvals,
            change_requests,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load the snapshot file into the repositories, if one exists.
    /// Returns `true` when state was restored.
    pub async fn restore(&self) -> Result<bool, CoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => {
                return Err(CoreError::TransientStore(format!(
                    "failed to read snapshot {}: {err}",
                    self.path.display()
                )))
            }
        };

        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes).map_err(|err| {
            CoreError::Validation(format!(
                "snapshot {} is not valid JSON: {err}",
                self.path.display()
            ))
        })?;

        self.store
            .import(snapshot.events, snapshot.series, snapshot.seq)
            .await?;
        self.approvals.import(snapshot.approvals)?;
        self.change_requests.import(snapshot.change_requests)?;

        tracing::info!(path = %self.path.display(), "State restored from snapshot");
        Ok(true)
    }

    /// Write the current state atomically (temp file + rename).
    pub async fn flush(&self) -> Result<(), CoreError> {
        let (events, series, seq) = self.store.export().await?;
        let snapshot = StoreSnapshot {
            events,
            series,
            approvals: self.approvals.export()?,
            change_requests: self.change_requests.export()?,
            seq,
        };

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|err| CoreError::TransientStore(format!("snapshot serialize failed: {err}")))?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes).await.map_err(|err| {
            CoreError::TransientStore(format!("snapshot write failed: {err}"))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|err| {
            CoreError::TransientStore(format!("snapshot rename failed: {err}"))
        })?;

        tracing::debug!(path = %self.path.display(), "Snapshot flushed");
        Ok(())
    }

    /// Flush on an interval until cancelled, then flush one final time.
    pub async fn run(self: Arc<Self>, interval: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    if let Err(err) = self.flush().await {
                        tracing::error!(error = %err, "Final snapshot flush failed");
                    }
                    return;
                }
                () = tokio::time::sleep(interval) => {
                    if let Err(err) = self.flush().await {
                        tracing::warn!(error = %err, "Periodic snapshot flush failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::approval::ApprovalKey;
    use cadence_core::change_request::RequestKind;
    use cadence_core::event::Channel;
    use cadence_core::types::YearMonth;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn sample_event() -> CalendarEvent {
        CalendarEvent {
            id: Uuid::new_v4(),
            client_id: "acme".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2025, 12, 15, 9, 0, 0).unwrap(),
            channel: Channel::Email,
            campaign_name: "Black Friday".to_string(),
            brief: String::new(),
            series_id: None,
            is_resend: false,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    fn engine() -> (Arc<EventStore>, Arc<ApprovalRepo>, Arc<ChangeRequestRepo>) {
        let store = Arc::new(EventStore::in_memory());
        let approvals = Arc::new(ApprovalRepo::new());
        let change_requests = Arc::new(ChangeRequestRepo::new(Arc::clone(&approvals)));
        (store, approvals, change_requests)
    }

    #[tokio::test]
    async fn restore_missing_file_is_a_clean_start() {
        let dir = tempfile::tempdir().unwrap();
        let (store, approvals, change_requests) = engine();
        let persister = Persister::new(store, approvals, change_requests, dir.path().join("state.json"));

        assert!(!persister.restore().await.unwrap());
    }

    #[tokio::test]
    async fn flush_and_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let (store, approvals, change_requests) = engine();
        store.put(sample_event()).await.unwrap();
        let key = ApprovalKey::parse("acme-2025-12").unwrap();
        let snapshot = store
            .snapshot("acme", YearMonth::new(2025, 12).unwrap())
            .await
            .unwrap();
        approvals.create_or_get(&key, snapshot).unwrap();
        change_requests
            .create(&key, RequestKind::Modification, "Move to morning".into())
            .unwrap();

        let persister = Persister::new(
            Arc::clone(&store),
            Arc::clone(&approvals),
            Arc::clone(&change_requests),
            &path,
        );
        persister.flush().await.unwrap();

        // Fresh engine, restored from disk.
        let (store2, approvals2, change_requests2) = engine();
        let persister2 = Persister::new(
            Arc::clone(&store2),
            Arc::clone(&approvals2),
            Arc::clone(&change_requests2),
            &path,
        );
        assert!(persister2.restore().await.unwrap());

        let december = YearMonth::new(2025, 12).unwrap();
        assert_eq!(store2.list("acme", december).await.unwrap().len(), 1);
        assert!(approvals2.get(&key).unwrap().is_some());
        assert_eq!(change_requests2.list(&key).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let (store, approvals, change_requests) = engine();
        let persister = Persister::new(store, approvals, change_requests, &path);
        assert!(matches!(
            persister.restore().await,
            Err(CoreError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn run_flushes_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let (store, approvals, change_requests) = engine();
        store.put(sample_event()).await.unwrap();
        let persister = Arc::new(Persister::new(store, approvals, change_requests, &path));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&persister).run(Duration::from_secs(3600), cancel.clone()));

        cancel.cancel();
        handle.await.unwrap();
        assert!(path.exists(), "final flush must write the snapshot");
    }
}
