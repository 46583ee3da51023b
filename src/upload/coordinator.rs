//! Upload Coordinator Module
//!
//! Resumable chunked uploads. A client announces an upload, sends chunks in
//! any order (possibly concurrently, possibly repeated), and asks for a
//! merge once all are sent. The blob store is the source of truth for which
//! chunks exist; the per-session chunk set is progress bookkeeping.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::UploadConfig;
use crate::error::{Result, ServiceError};
use crate::models::{
    InitUploadRequest, InitUploadResponse, MergeChunksResponse, UploadStatus,
    UploadStatusResponse,
};
use crate::storage::BlobStore;
use crate::upload::session::{chunk_path, storage_path, validate_upload_id, UploadSession};

type SharedSession = Arc<Mutex<UploadSession>>;

/// Outcome of one [`UploadCoordinator::sweep_sessions`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub removed_sessions: usize,
    pub removed_blobs: usize,
    /// Sessions whose blob cleanup failed; retried next pass
    pub failed: usize,
}

// == Upload Coordinator ==
/// Tracks upload sessions and writes their chunks to a blob store.
///
/// Each session sits behind its own mutex, so unrelated uploads never
/// contend. The mutex guards bookkeeping only and is never held across a
/// blob store call.
pub struct UploadCoordinator {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    config: UploadConfig,
    sessions: DashMap<String, SharedSession>,
}

impl UploadCoordinator {
    // == Constructor ==
    pub fn new(store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>, config: &UploadConfig) -> Self {
        Self {
            store,
            clock,
            config: config.clone(),
            sessions: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Number of tracked sessions, in any state.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn session(&self, upload_id: &str) -> Result<SharedSession> {
        self.sessions
            .get(upload_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServiceError::UploadNotFound(upload_id.to_string()))
    }

    fn fresh_session(&self, user_id: u64, req: &InitUploadRequest, now: DateTime<Utc>) -> UploadSession {
        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        UploadSession {
            upload_id: req.upload_id.clone(),
            user_id,
            file_name: req.file_name.clone(),
            file_size: req.file_size,
            chunk_size: self.config.chunk_size_bytes,
            total_chunks: req.total_chunks,
            uploaded: Default::default(),
            status: UploadStatus::Pending,
            storage_path: None,
            created_at: now,
            updated_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            purging: false,
        }
    }

    // == Init ==
    /// Starts an upload, or resumes it.
    ///
    /// A live pending session owned by `user_id` is returned as-is with the
    /// chunks recorded so far. Anything else under the same id (completed,
    /// cancelled or expired) is replaced by a fresh session, as long as it
    /// belongs to the caller or is abandoned.
    ///
    /// # Errors
    /// * `InvalidRequest` - Bad upload id, zero chunks, or a file size the
    ///   announced chunks cannot hold
    /// * `Unauthorized` - The id is held by another user's session
    /// * `Conflict` - The previous session's blobs are being cleaned up
    pub fn init_upload(&self, user_id: u64, req: InitUploadRequest) -> Result<InitUploadResponse> {
        validate_upload_id(&req.upload_id)?;
        if req.total_chunks == 0 {
            return Err(ServiceError::InvalidRequest(
                "total_chunks must be at least 1".to_string(),
            ));
        }
        let max_size = u64::try_from(self.config.chunk_size_bytes)
            .ok()
            .and_then(|chunk| chunk.checked_mul(u64::from(req.total_chunks)));
        if max_size.is_some_and(|max| req.file_size > max) {
            return Err(ServiceError::InvalidRequest(format!(
                "file_size {} exceeds {} chunks of {} bytes",
                req.file_size, req.total_chunks, self.config.chunk_size_bytes
            )));
        }

        let now = self.clock.now();
        match self.sessions.entry(req.upload_id.clone()) {
            Entry::Occupied(mut occupied) => {
                {
                    let existing = occupied.get().lock();
                    if existing.purging {
                        return Err(ServiceError::Conflict(format!(
                            "upload {} is being cleaned up",
                            req.upload_id
                        )));
                    }
                    if existing.user_id != user_id && !existing.is_abandoned(now) {
                        warn!(upload_id = %req.upload_id, user_id, "Upload id held by another user");
                        return Err(ServiceError::Unauthorized(format!(
                            "upload {} belongs to another user",
                            req.upload_id
                        )));
                    }
                    if existing.is_live(now) {
                        info!(
                            upload_id = %req.upload_id,
                            uploaded = existing.uploaded.len(),
                            total = existing.total_chunks,
                            "Upload resumed"
                        );
                        return Ok(existing.init_response());
                    }
                }

                let session = self.fresh_session(user_id, &req, now);
                let response = session.init_response();
                occupied.insert(Arc::new(Mutex::new(session)));
                info!(upload_id = %req.upload_id, total = req.total_chunks, "Upload restarted");
                Ok(response)
            }
            Entry::Vacant(vacant) => {
                let session = self.fresh_session(user_id, &req, now);
                let response = session.init_response();
                vacant.insert(Arc::new(Mutex::new(session)));
                info!(
                    upload_id = %req.upload_id,
                    file_name = %req.file_name,
                    total = req.total_chunks,
                    "Upload initialized"
                );
                Ok(response)
            }
        }
    }

    // == Upload Chunk ==
    /// Stores one chunk and records its index.
    ///
    /// Re-sending an index rewrites the blob and leaves the recorded set
    /// unchanged. The blob is written before the session lock is taken.
    pub async fn upload_chunk(&self, upload_id: &str, index: u32, data: Bytes) -> Result<()> {
        let session = self.session(upload_id)?;
        {
            let state = session.lock();
            state.ensure_writable(self.clock.now())?;
            if index >= state.total_chunks {
                return Err(ServiceError::InvalidRequest(format!(
                    "chunk index {index} out of range 0..{}",
                    state.total_chunks
                )));
            }
        }

        let size = data.len();
        if let Err(err) = self.store.put(&chunk_path(upload_id, index), data).await {
            warn!(upload_id, chunk_index = index, error = %err, "Chunk write failed");
            return Err(err);
        }

        let mut state = session.lock();
        // The session may have been cancelled while the blob was written.
        if state.status != UploadStatus::Pending {
            warn!(upload_id, chunk_index = index, status = ?state.status, "Chunk arrived after session closed");
            return Err(ServiceError::InvalidState(format!(
                "upload {upload_id} is {:?}",
                state.status
            )));
        }
        state.uploaded.insert(index);
        state.updated_at = self.clock.now();
        debug!(
            upload_id,
            chunk_index = index,
            size,
            uploaded = state.uploaded.len(),
            total = state.total_chunks,
            "Chunk stored"
        );
        Ok(())
    }

    // == Merge ==
    /// Completes an upload once every chunk blob exists.
    ///
    /// Chunks are not concatenated: the returned reference names the chunk
    /// directory and the chunk count, see [`UploadCoordinator::read_assembled`].
    /// Merging a completed upload returns the same reference again.
    ///
    /// # Errors
    /// * `IncompleteUpload` - Lists the missing indices; the session is unchanged
    /// * `InvalidState` - Cancelled or expired session
    pub async fn merge_chunks(&self, upload_id: &str) -> Result<MergeChunksResponse> {
        let session = self.session(upload_id)?;
        let total = {
            let state = session.lock();
            if state.status == UploadStatus::Completed {
                return Ok(self.merge_response(&state));
            }
            state.ensure_writable(self.clock.now())?;
            state.total_chunks
        };

        let mut missing = Vec::new();
        for index in 0..total {
            match self.store.exists(&chunk_path(upload_id, index)).await {
                Ok(true) => {}
                Ok(false) => missing.push(index),
                Err(err) => {
                    warn!(upload_id, chunk_index = index, error = %err, "Chunk check failed");
                    missing.push(index);
                }
            }
        }
        if !missing.is_empty() {
            warn!(upload_id, total, ?missing, "Merge refused, chunks missing");
            return Err(ServiceError::IncompleteUpload {
                upload_id: upload_id.to_string(),
                missing,
            });
        }

        let mut state = session.lock();
        if state.status == UploadStatus::Completed {
            return Ok(self.merge_response(&state));
        }
        state.ensure_writable(self.clock.now())?;
        state.status = UploadStatus::Completed;
        state.storage_path = Some(storage_path(upload_id));
        state.uploaded = (0..total).collect();
        state.updated_at = self.clock.now();
        info!(upload_id, total, "Upload completed");
        Ok(self.merge_response(&state))
    }

    fn merge_response(&self, state: &UploadSession) -> MergeChunksResponse {
        let path = state
            .storage_path
            .clone()
            .unwrap_or_else(|| storage_path(&state.upload_id));
        state.merge_response(self.store.public_url_for(&path))
    }

    // == Status ==
    pub fn get_upload_status(&self, upload_id: &str) -> Result<UploadStatusResponse> {
        let session = self.session(upload_id)?;
        let state = session.lock();
        Ok(state.status_response())
    }

    // == Cancel ==
    /// Cancels a pending upload and deletes its chunk blobs.
    ///
    /// Blob cleanup is best-effort: failures are logged and the remaining
    /// blobs are removed by the next session sweep. Cancelling twice is a
    /// no-op.
    ///
    /// # Errors
    /// * `Unauthorized` - Caller does not own the session
    /// * `InvalidState` - The upload already completed
    pub async fn cancel_upload(&self, upload_id: &str, user_id: u64) -> Result<()> {
        let session = self.session(upload_id)?;
        {
            let mut state = session.lock();
            if state.user_id != user_id {
                warn!(upload_id, user_id, owner = state.user_id, "Cancel refused, not the owner");
                return Err(ServiceError::Unauthorized(format!(
                    "upload {upload_id} belongs to another user"
                )));
            }
            match state.status {
                UploadStatus::Completed => {
                    return Err(ServiceError::InvalidState(format!(
                        "upload {upload_id} already completed"
                    )))
                }
                UploadStatus::Cancelled => return Ok(()),
                UploadStatus::Pending => {}
            }
            if state.purging {
                return Err(ServiceError::Conflict(format!(
                    "upload {upload_id} is being cleaned up"
                )));
            }
            state.status = UploadStatus::Cancelled;
            state.updated_at = self.clock.now();
            state.purging = true;
        }
        info!(upload_id, user_id, "Upload cancelled");

        let cleanup = self.remove_chunk_blobs(upload_id).await;
        session.lock().purging = false;
        match cleanup {
            Ok(removed) => debug!(upload_id, removed, "Cancelled upload blobs removed"),
            Err(err) => warn!(upload_id, error = %err, "Cancelled upload cleanup incomplete"),
        }
        Ok(())
    }

    /// Deletes every blob under the upload's chunk directory. Keeps going
    /// past failures and reports the first one.
    async fn remove_chunk_blobs(&self, upload_id: &str) -> Result<usize> {
        let paths = self.store.list(&storage_path(upload_id)).await?;
        let mut removed = 0;
        let mut first_error = None;
        for path in paths {
            match self.store.remove(&path).await {
                Ok(()) => removed += 1,
                Err(err) => {
                    warn!(upload_id, path = %path, error = %err, "Blob removal failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(removed),
        }
    }

    // == Read ==
    /// Concatenates the chunks of a completed upload in index order.
    pub async fn read_assembled(&self, upload_id: &str) -> Result<Bytes> {
        let total = {
            let session = self.session(upload_id)?;
            let state = session.lock();
            if state.status != UploadStatus::Completed {
                return Err(ServiceError::InvalidState(format!(
                    "upload {upload_id} is {:?}",
                    state.status
                )));
            }
            state.total_chunks
        };

        let mut chunks = Vec::with_capacity(total as usize);
        for index in 0..total {
            chunks.push(self.store.get(&chunk_path(upload_id, index)).await?);
        }
        let mut assembled = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            assembled.extend_from_slice(chunk);
        }
        Ok(assembled.freeze())
    }

    // == Sweep ==
    /// Deletes the blobs and records of cancelled sessions and of pending
    /// sessions past their expiry. Completed sessions are kept since their
    /// blobs back downloads.
    ///
    /// A session whose cleanup fails stays tracked and is retried next pass.
    pub async fn sweep_sessions(&self) -> SweepReport {
        let now = self.clock.now();
        let candidates: Vec<(String, SharedSession)> = self
            .sessions
            .iter()
            .filter(|entry| {
                let state = entry.value().lock();
                state.is_abandoned(now) && !state.purging
            })
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut report = SweepReport::default();
        for (upload_id, session) in candidates {
            {
                let mut state = session.lock();
                if !state.is_abandoned(now) || state.purging {
                    continue;
                }
                state.purging = true;
            }

            match self.remove_chunk_blobs(&upload_id).await {
                Ok(removed) => {
                    self.sessions
                        .remove_if(&upload_id, |_, current| Arc::ptr_eq(current, &session));
                    report.removed_sessions += 1;
                    report.removed_blobs += removed;
                }
                Err(err) => {
                    session.lock().purging = false;
                    warn!(upload_id = %upload_id, error = %err, "Session sweep failed, will retry");
                    report.failed += 1;
                }
            }
        }

        if report != SweepReport::default() {
            info!(
                removed_sessions = report.removed_sessions,
                removed_blobs = report.removed_blobs,
                failed = report.failed,
                "Upload sessions swept"
            );
        }
        report
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::MemoryBlobStore;
    use async_trait::async_trait;
    use chrono::Duration;

    struct Fixture {
        coordinator: UploadCoordinator,
        store: Arc<MemoryBlobStore>,
        clock: ManualClock,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryBlobStore::new("http://cdn/resource-chunks"));
        let clock = ManualClock::new(Utc::now());
        let coordinator = UploadCoordinator::new(
            store.clone(),
            Arc::new(clock.clone()),
            &UploadConfig::default(),
        );
        Fixture {
            coordinator,
            store,
            clock,
        }
    }

    fn request(upload_id: &str, total_chunks: u32) -> InitUploadRequest {
        InitUploadRequest {
            upload_id: upload_id.to_string(),
            file_name: "video.mp4".to_string(),
            file_size: 6,
            total_chunks,
        }
    }

    fn chunk(data: &'static [u8]) -> Bytes {
        Bytes::from_static(data)
    }

    #[tokio::test]
    async fn test_end_to_end() {
        let f = fixture();
        let init = f.coordinator.init_upload(1, request("u1", 2)).unwrap();
        assert!(init.uploaded_chunks.is_empty());
        assert_eq!(init.chunk_size, 2 * 1024 * 1024);

        f.coordinator.upload_chunk("u1", 0, chunk(b"abc")).await.unwrap();
        f.coordinator.upload_chunk("u1", 1, chunk(b"def")).await.unwrap();
        let merged = f.coordinator.merge_chunks("u1").await.unwrap();

        assert_eq!(merged.total_chunks, 2);
        assert_eq!(merged.storage_path, "chunks/u1");
        assert_eq!(merged.file_url, "http://cdn/resource-chunks/chunks/u1");
        let status = f.coordinator.get_upload_status("u1").unwrap();
        assert_eq!(status.status, UploadStatus::Completed);
        assert_eq!(status.progress, 100.0);
        assert_eq!(f.coordinator.read_assembled("u1").await.unwrap(), chunk(b"abcdef"));
    }

    #[tokio::test]
    async fn test_repeated_chunk_is_recorded_once() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 3)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"b")).await.unwrap();

        let status = f.coordinator.get_upload_status("u1").unwrap();
        assert_eq!(status.uploaded_chunks, vec![0]);
        assert_eq!(f.store.get("chunks/u1/chunk_0").await.unwrap(), chunk(b"b"));
    }

    #[tokio::test]
    async fn test_merge_reports_missing_chunks_without_state_change() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 3)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();
        f.coordinator.upload_chunk("u1", 1, chunk(b"b")).await.unwrap();

        let err = f.coordinator.merge_chunks("u1").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, ServiceError::IncompleteUpload { ref missing, .. } if missing == &vec![2]));
        assert_eq!(
            f.coordinator.get_upload_status("u1").unwrap().status,
            UploadStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_merge_trusts_blob_store_over_bookkeeping() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 2)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();
        f.coordinator.upload_chunk("u1", 1, chunk(b"b")).await.unwrap();
        f.store.remove("chunks/u1/chunk_1").await.unwrap();

        let err = f.coordinator.merge_chunks("u1").await.unwrap_err();
        assert!(matches!(err, ServiceError::IncompleteUpload { ref missing, .. } if missing == &vec![1]));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 1)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();

        let first = f.coordinator.merge_chunks("u1").await.unwrap();
        let second = f.coordinator.merge_chunks("u1").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_init_resumes_pending_session() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 4)).unwrap();
        f.coordinator.upload_chunk("u1", 2, chunk(b"c")).await.unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();

        let resumed = f.coordinator.init_upload(1, request("u1", 4)).unwrap();
        assert_eq!(resumed.uploaded_chunks, vec![0, 2]);
    }

    #[tokio::test]
    async fn test_init_restarts_expired_session() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 2)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();

        f.clock.advance(Duration::hours(25));
        assert!(matches!(
            f.coordinator.upload_chunk("u1", 1, chunk(b"b")).await,
            Err(ServiceError::InvalidState(_))
        ));

        let restarted = f.coordinator.init_upload(1, request("u1", 2)).unwrap();
        assert!(restarted.uploaded_chunks.is_empty());
    }

    #[tokio::test]
    async fn test_init_rejects_foreign_live_session() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 2)).unwrap();

        let err = f.coordinator.init_upload(2, request("u1", 2)).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_init_validation() {
        let f = fixture();
        assert!(matches!(
            f.coordinator.init_upload(1, request("../x", 2)),
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            f.coordinator.init_upload(1, request("u1", 0)),
            Err(ServiceError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_init_rejects_file_size_beyond_chunk_budget() {
        let f = fixture();
        let chunk_size = UploadConfig::default().chunk_size_bytes as u64;

        let mut oversized = request("big", 2);
        oversized.file_size = 2 * chunk_size + 1;
        assert!(matches!(
            f.coordinator.init_upload(1, oversized),
            Err(ServiceError::InvalidRequest(_))
        ));

        let mut huge = request("huge", 1);
        huge.file_size = u64::MAX;
        assert!(matches!(
            f.coordinator.init_upload(1, huge),
            Err(ServiceError::InvalidRequest(_))
        ));

        let mut exact = request("exact", 2);
        exact.file_size = 2 * chunk_size;
        assert!(f.coordinator.init_upload(1, exact).is_ok());
        assert_eq!(f.coordinator.session_count(), 1);
    }

    #[tokio::test]
    async fn test_read_assembled_sizes_buffer_from_chunks() {
        let f = fixture();
        // Declared size larger than what was actually sent.
        let mut req = request("u1", 2);
        req.file_size = 3 * 1024 * 1024;
        f.coordinator.init_upload(1, req).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"ab")).await.unwrap();
        f.coordinator.upload_chunk("u1", 1, chunk(b"c")).await.unwrap();
        f.coordinator.merge_chunks("u1").await.unwrap();

        let file = f.coordinator.read_assembled("u1").await.unwrap();
        assert_eq!(file, chunk(b"abc"));
    }

    #[tokio::test]
    async fn test_oversized_session_ttl_saturates() {
        let config = UploadConfig {
            session_ttl: std::time::Duration::from_secs(1_000_000_000_000_000),
            ..UploadConfig::default()
        };
        let coordinator = UploadCoordinator::new(
            Arc::new(MemoryBlobStore::new("http://cdn")),
            Arc::new(ManualClock::new(Utc::now())),
            &config,
        );

        coordinator.init_upload(1, request("u1", 1)).unwrap();
        coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();
        assert_eq!(
            coordinator.get_upload_status("u1").unwrap().status,
            UploadStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_chunk_errors() {
        let f = fixture();
        assert!(matches!(
            f.coordinator.upload_chunk("nope", 0, chunk(b"a")).await,
            Err(ServiceError::UploadNotFound(_))
        ));

        f.coordinator.init_upload(1, request("u1", 2)).unwrap();
        assert!(matches!(
            f.coordinator.upload_chunk("u1", 2, chunk(b"a")).await,
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_requires_owner_and_removes_blobs() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 2)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();

        let err = f.coordinator.cancel_upload("u1", 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        f.coordinator.cancel_upload("u1", 1).await.unwrap();
        f.coordinator.cancel_upload("u1", 1).await.unwrap();
        assert!(f.store.is_empty());
        assert_eq!(
            f.coordinator.get_upload_status("u1").unwrap().status,
            UploadStatus::Cancelled
        );
        assert!(matches!(
            f.coordinator.upload_chunk("u1", 1, chunk(b"b")).await,
            Err(ServiceError::InvalidState(_))
        ));
        assert!(matches!(
            f.coordinator.merge_chunks("u1").await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_completed_upload_is_rejected() {
        let f = fixture();
        f.coordinator.init_upload(1, request("u1", 1)).unwrap();
        f.coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();
        f.coordinator.merge_chunks("u1").await.unwrap();

        assert!(matches!(
            f.coordinator.cancel_upload("u1", 1).await,
            Err(ServiceError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_abandoned_sessions_only() {
        let f = fixture();
        for id in ["done", "cancelled", "stale"] {
            f.coordinator.init_upload(1, request(id, 1)).unwrap();
            f.coordinator.upload_chunk(id, 0, chunk(b"x")).await.unwrap();
        }
        f.coordinator.merge_chunks("done").await.unwrap();
        f.coordinator.cancel_upload("cancelled", 1).await.unwrap();

        f.clock.advance(Duration::hours(23));
        f.coordinator.init_upload(1, request("fresh", 1)).unwrap();
        f.clock.advance(Duration::hours(2));

        let report = f.coordinator.sweep_sessions().await;
        assert_eq!(report.removed_sessions, 2);
        assert_eq!(report.removed_blobs, 1);
        assert_eq!(report.failed, 0);

        assert!(f.coordinator.get_upload_status("done").is_ok());
        assert!(f.coordinator.get_upload_status("fresh").is_ok());
        assert!(matches!(
            f.coordinator.get_upload_status("stale"),
            Err(ServiceError::UploadNotFound(_))
        ));
        assert!(f.store.exists("chunks/done/chunk_0").await.unwrap());
        assert!(!f.store.exists("chunks/stale/chunk_0").await.unwrap());
    }

    struct BrokenRemoveStore(MemoryBlobStore);

    #[async_trait]
    impl BlobStore for BrokenRemoveStore {
        async fn put(&self, path: &str, data: Bytes) -> Result<()> {
            self.0.put(path, data).await
        }
        async fn exists(&self, path: &str) -> Result<bool> {
            self.0.exists(path).await
        }
        async fn get(&self, path: &str) -> Result<Bytes> {
            self.0.get(path).await
        }
        async fn remove(&self, _path: &str) -> Result<()> {
            Err(ServiceError::Storage("read-only".into()))
        }
        async fn list(&self, dir: &str) -> Result<Vec<String>> {
            self.0.list(dir).await
        }
        fn public_url_for(&self, path: &str) -> String {
            self.0.public_url_for(path)
        }
    }

    #[tokio::test]
    async fn test_failed_cleanup_is_retried() {
        let clock = ManualClock::new(Utc::now());
        let coordinator = UploadCoordinator::new(
            Arc::new(BrokenRemoveStore(MemoryBlobStore::new("http://cdn"))),
            Arc::new(clock),
            &UploadConfig::default(),
        );
        coordinator.init_upload(1, request("u1", 1)).unwrap();
        coordinator.upload_chunk("u1", 0, chunk(b"a")).await.unwrap();

        // Cancellation succeeds even though blob removal fails.
        coordinator.cancel_upload("u1", 1).await.unwrap();

        let report = coordinator.sweep_sessions().await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed_sessions, 0);
        assert_eq!(coordinator.session_count(), 1);
    }
}
