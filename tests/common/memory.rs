use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use upload_companion::store::{
    CompletedPart, CompletedUpload, CreatedUpload, MultipartStore, PartRecord, PartsPage,
    StoreError, StoreResult,
};

/// Which store operation a call was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreCall {
    Create,
    Presign,
    ListPage,
    Complete,
    Abort,
    Health,
}

#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct Session {
    pub key: String,
    pub content_type: String,
    pub metadata: HashMap<String, String>,
    pub parts: BTreeMap<i32, PartRecord>,
}

/// In-memory multipart store.
///
/// Enforces session liveness like S3 does (completed or aborted sessions are
/// gone), pages part listings by `page_size`, and records every call.
#[allow(dead_code)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    calls: Mutex<Vec<StoreCall>>,
    next_id: AtomicUsize,
    page_size: usize,
    /// Fail the list call with this zero-based index.
    fail_list_call: Mutex<Option<usize>>,
    /// Report every page as truncated, forever.
    endless_listing: AtomicBool,
    /// Report truncated pages without a next marker.
    drop_markers: AtomicBool,
    /// Complete without reporting a location.
    omit_location: AtomicBool,
    healthy: AtomicBool,
}

#[allow(dead_code)]
impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Self::with_page_size(1000)
    }

    pub fn with_page_size(page_size: usize) -> Arc<Self> {
        Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(1),
            page_size: page_size.max(1),
            fail_list_call: Mutex::new(None),
            endless_listing: AtomicBool::new(false),
            drop_markers: AtomicBool::new(false),
            omit_location: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
        })
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, call: StoreCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn session(&self, upload_id: &str) -> Option<Session> {
        self.sessions.lock().unwrap().get(upload_id).cloned()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    /// Simulate a client PUT of a part body to its presigned URL.
    pub fn put_part(&self, upload_id: &str, part_number: i32, etag: &str, size: i64) {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions.get_mut(upload_id).expect("session exists");
        session.parts.insert(
            part_number,
            PartRecord {
                part_number,
                etag: etag.to_string(),
                size,
                last_modified: None,
            },
        );
    }

    pub fn fail_list_call(&self, index: usize) {
        *self.fail_list_call.lock().unwrap() = Some(index);
    }

    pub fn set_endless_listing(&self, on: bool) {
        self.endless_listing.store(on, Ordering::SeqCst);
    }

    pub fn set_drop_markers(&self, on: bool) {
        self.drop_markers.store(on, Ordering::SeqCst);
    }

    pub fn set_omit_location(&self, on: bool) {
        self.omit_location.store(on, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    fn record(&self, call: StoreCall) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push(call);
        calls.iter().filter(|c| **c == call).count() - 1
    }

    fn live_session(&self, key: &str, upload_id: &str) -> StoreResult<Session> {
        match self.sessions.lock().unwrap().get(upload_id) {
            Some(session) if session.key == key => Ok(session.clone()),
            _ => Err(StoreError::NoSuchUpload {
                upload_id: upload_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl MultipartStore for MemoryStore {
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> StoreResult<CreatedUpload> {
        self.record(StoreCall::Create);
        let upload_id = format!("upload-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.sessions.lock().unwrap().insert(
            upload_id.clone(),
            Session {
                key: key.to_string(),
                content_type: content_type.to_string(),
                metadata,
                parts: BTreeMap::new(),
            },
        );
        Ok(CreatedUpload {
            key: key.to_string(),
            upload_id,
        })
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        expires_in: Duration,
    ) -> StoreResult<String> {
        self.record(StoreCall::Presign);
        self.live_session(key, upload_id)?;
        Ok(format!(
            "https://store.test/bucket/{key}?uploadId={upload_id}&partNumber={part_number}&expires={}",
            expires_in.as_secs(),
        ))
    }

    async fn list_parts_page(
        &self,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<&str>,
    ) -> StoreResult<PartsPage> {
        let index = self.record(StoreCall::ListPage);
        if *self.fail_list_call.lock().unwrap() == Some(index) {
            return Err(StoreError::S3("injected list failure".into()));
        }
        let session = self.live_session(key, upload_id)?;

        if self.endless_listing.load(Ordering::SeqCst) {
            return Ok(PartsPage {
                parts: Vec::new(),
                is_truncated: true,
                next_part_number_marker: Some(index.to_string()),
            });
        }

        let after: i32 = part_number_marker
            .map(|m| m.parse().expect("marker is a part number"))
            .unwrap_or(0);
        let remaining: Vec<PartRecord> = session
            .parts
            .range(after + 1..)
            .map(|(_, part)| part.clone())
            .collect();
        let is_truncated = remaining.len() > self.page_size;
        let parts: Vec<PartRecord> = remaining.into_iter().take(self.page_size).collect();
        let next_part_number_marker = match (is_truncated, self.drop_markers.load(Ordering::SeqCst))
        {
            (true, false) => parts.last().map(|p| p.part_number.to_string()),
            _ => None,
        };

        Ok(PartsPage {
            parts,
            is_truncated,
            next_part_number_marker,
        })
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StoreResult<CompletedUpload> {
        self.record(StoreCall::Complete);
        let session = self.live_session(key, upload_id)?;

        if parts.is_empty() {
            return Err(StoreError::S3("MalformedXML: no parts".into()));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::S3("InvalidPartOrder".into()));
        }
        for part in parts {
            match session.parts.get(&part.part_number) {
                Some(stored) if stored.etag == part.etag => {}
                _ => return Err(StoreError::S3("InvalidPart".into())),
            }
        }

        self.sessions.lock().unwrap().remove(upload_id);
        let location = (!self.omit_location.load(Ordering::SeqCst))
            .then(|| format!("https://store.test/bucket/{key}"));
        Ok(CompletedUpload { location })
    }

    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StoreResult<()> {
        self.record(StoreCall::Abort);
        self.live_session(key, upload_id)?;
        self.sessions.lock().unwrap().remove(upload_id);
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.record(StoreCall::Health);
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::S3("bucket unreachable".into()))
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
