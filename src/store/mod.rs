//! Local-first storage for chat transcripts, extracted memories, and sync
//! scheduling metadata.
//!
//! Data lives under a fixed `sharedlm_local_` key namespace in a pluggable
//! key-value substrate (see [`kv`]). The store is a best-effort cache, not an
//! authoritative database: every public operation converts substrate failures
//! into a safe default (empty list, `false`, or `None`) instead of
//! propagating an error, so callers never need to guard the primary chat flow
//! against storage problems. Failures are logged.
//!
//! Sync scheduling is pull-based: the store owns no timer. Callers ask
//! [`LocalStore::is_sync_due`] on their own cadence (app start, timer, user
//! action), push [`LocalStore::export_local_data`] to the remote store
//! themselves, and then record the sync via
//! [`LocalStore::update_sync_metadata`].

mod kv;

pub use kv::{FileStore, KeyValueStore, MemoryStore};

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

const CHATS_KEY: &str = "sharedlm_local_chats";
const MEMORIES_KEY: &str = "sharedlm_local_memories";
const SYNC_METADATA_KEY: &str = "sharedlm_local_sync_metadata";

/// Sync interval applied when a metadata update does not specify one.
pub const DEFAULT_SYNC_INTERVAL_DAYS: i64 = 10;

/// Default result cap for [`LocalStore::search_memories`].
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// A chat transcript. Opaque to the store except for `id`, which drives
/// upsert matching; everything else rides along in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,

    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl ChatRecord {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            fields: serde_json::Map::new(),
        }
    }
}

/// An extracted memory, mem0-shaped. Append-only: records are never updated
/// after creation, only bulk-cleared post-sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Generated locally (`local_<millis>_<random>`); the server never
    /// assigns these.
    pub id: String,

    pub user_id: String,

    /// Raw conversation messages the memory was extracted from.
    #[serde(default)]
    pub messages: Vec<Value>,

    /// Extracted summary text; empty when extraction produced nothing.
    #[serde(default)]
    pub memory: String,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub project_id: Option<String>,
}

/// Input for [`LocalStore::add_memory`].
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub user_id: String,
    pub messages: Vec<Value>,
    pub memory: Option<String>,
    pub project_id: Option<String>,
}

/// Sync scheduling metadata. When `last_sync` and `next_sync_due` are both
/// absent (fresh install), a sync is immediately due.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub last_sync: Option<DateTime<Utc>>,
    pub next_sync_due: Option<DateTime<Utc>>,

    #[serde(default = "default_sync_interval_days")]
    pub sync_interval_days: i64,
}

impl Default for SyncMetadata {
    fn default() -> Self {
        Self {
            last_sync: None,
            next_sync_due: None,
            sync_interval_days: DEFAULT_SYNC_INTERVAL_DAYS,
        }
    }
}

fn default_sync_interval_days() -> i64 {
    DEFAULT_SYNC_INTERVAL_DAYS
}

/// Partial update for [`LocalStore::update_sync_metadata`]. `last_sync` and
/// `next_sync_due` are always recomputed by the store and cannot be patched.
#[derive(Debug, Clone, Default)]
pub struct SyncMetadataPatch {
    pub sync_interval_days: Option<i64>,
}

/// Read-only snapshot of everything a remote sync would push.
#[derive(Debug, Clone, Serialize)]
pub struct LocalDataExport {
    pub chats: Vec<ChatRecord>,
    pub memories: Vec<MemoryRecord>,
    pub metadata: SyncMetadata,
}

/// Serialized byte sizes of the persisted values, for diagnostics only —
/// nothing enforces a quota here.
#[derive(Debug, Clone, Serialize)]
pub struct StorageSize {
    pub chats: usize,
    pub memories: usize,
    pub metadata: usize,
    pub total: usize,

    #[serde(rename = "totalMB")]
    pub total_mb: String,
}

/// Durable local store over an injected key-value substrate.
pub struct LocalStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> LocalStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// All persisted chats, in insertion order. Empty on any read or parse
    /// failure.
    pub fn chats(&self) -> Vec<ChatRecord> {
        self.read_list(CHATS_KEY)
    }

    /// Upsert a chat by id. A record with a matching id is replaced in place
    /// (position preserved); otherwise the record is appended. Returns
    /// `false` on write failure.
    pub fn save_chat(&self, chat: &ChatRecord) -> bool {
        let mut chats = self.chats();
        if let Some(existing) = chats.iter_mut().find(|c| c.id == chat.id) {
            *existing = chat.clone();
        } else {
            chats.push(chat.clone());
        }
        self.write_json(CHATS_KEY, &chats)
    }

    /// All persisted memories, in insertion order. Empty on any read or
    /// parse failure.
    pub fn memories(&self) -> Vec<MemoryRecord> {
        self.read_list(MEMORIES_KEY)
    }

    /// Append a new memory with a generated id and `created_at = now`.
    /// Returns the constructed record, or `None` on write failure.
    pub fn add_memory(&self, input: NewMemory) -> Option<MemoryRecord> {
        let mut memories = self.memories();
        let record = MemoryRecord {
            id: generate_memory_id(),
            user_id: input.user_id,
            messages: input.messages,
            memory: input.memory.unwrap_or_default(),
            created_at: Utc::now(),
            project_id: input.project_id,
        };
        memories.push(record.clone());
        if self.write_json(MEMORIES_KEY, &memories) {
            Some(record)
        } else {
            None
        }
    }

    /// Case-insensitive substring search over a user's memories, matching
    /// either the extracted `memory` text or the JSON-serialized messages.
    /// Returns at most `limit` memory texts in storage order.
    ///
    /// This is a naive scan, adequate for a small local cache only — it is
    /// not a semantic or indexed search.
    pub fn search_memories(&self, query: &str, user_id: &str, limit: usize) -> Vec<String> {
        let query = query.to_lowercase();
        self.memories()
            .into_iter()
            .filter(|m| m.user_id == user_id)
            .filter(|m| {
                if m.memory.to_lowercase().contains(&query) {
                    return true;
                }
                serde_json::to_string(&m.messages)
                    .map(|s| s.to_lowercase().contains(&query))
                    .unwrap_or(false)
            })
            .take(limit)
            .map(|m| m.memory)
            .collect()
    }

    /// Persisted sync metadata, or the default (never synced, 10-day
    /// interval) when absent or unparseable.
    pub fn sync_metadata(&self) -> SyncMetadata {
        match self.store.get(SYNC_METADATA_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Failed to parse sync metadata, using defaults: {e}");
                SyncMetadata::default()
            }),
            Ok(None) => SyncMetadata::default(),
            Err(e) => {
                warn!("Failed to read sync metadata, using defaults: {e}");
                SyncMetadata::default()
            }
        }
    }

    /// Merge `patch` over the current metadata and record that a sync just
    /// happened: `last_sync` is always stamped with the current time and
    /// `next_sync_due` recomputed as `now + (patch.sync_interval_days or 10)
    /// days`. There is no way to change the interval without also resetting
    /// the sync clock; that coupling is the documented contract. Returns
    /// `None` on write failure.
    pub fn update_sync_metadata(&self, patch: SyncMetadataPatch) -> Option<SyncMetadata> {
        let mut metadata = self.sync_metadata();
        let now = Utc::now();

        if let Some(days) = patch.sync_interval_days {
            metadata.sync_interval_days = days;
        }
        // The recompute interval falls back to the constant default, not the
        // stored interval.
        let interval = patch
            .sync_interval_days
            .unwrap_or(DEFAULT_SYNC_INTERVAL_DAYS);
        metadata.last_sync = Some(now);
        metadata.next_sync_due = Some(now + Duration::days(interval));

        if self.write_json(SYNC_METADATA_KEY, &metadata) {
            Some(metadata)
        } else {
            None
        }
    }

    /// `true` when no sync has ever been recorded, or the scheduled
    /// `next_sync_due` has been reached.
    pub fn is_sync_due(&self) -> bool {
        match self.sync_metadata().next_sync_due {
            None => true,
            Some(due) => Utc::now() >= due,
        }
    }

    /// Delete chats and memories after a successful sync. Sync metadata is
    /// kept so the freshly emptied store is not immediately due again.
    pub fn clear_local_data(&self) -> bool {
        let result = self
            .store
            .remove(CHATS_KEY)
            .and_then(|_| self.store.remove(MEMORIES_KEY));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to clear local data: {e}");
                false
            }
        }
    }

    /// Snapshot of everything pending sync. Read-only: recording the sync is
    /// a separate, explicit [`LocalStore::update_sync_metadata`] call once
    /// the caller's remote push succeeds.
    pub fn export_local_data(&self) -> LocalDataExport {
        LocalDataExport {
            chats: self.chats(),
            memories: self.memories(),
            metadata: self.sync_metadata(),
        }
    }

    /// Byte sizes of the serialized persisted values.
    pub fn storage_size(&self) -> StorageSize {
        let chats = self.raw_len(CHATS_KEY);
        let memories = self.raw_len(MEMORIES_KEY);
        let metadata = self.raw_len(SYNC_METADATA_KEY);
        let total = chats + memories + metadata;
        StorageSize {
            chats,
            memories,
            metadata,
            total,
            total_mb: format!("{:.2}", total as f64 / (1024.0 * 1024.0)),
        }
    }

    fn raw_len(&self, key: &str) -> usize {
        match self.store.get(key) {
            Ok(Some(raw)) => raw.len(),
            Ok(None) => 0,
            Err(e) => {
                warn!("Failed to read {key} for size estimate: {e}");
                0
            }
        }
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        match self.store.get(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Failed to parse {key}, treating as empty: {e}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read {key}, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize {key}: {e}");
                return false;
            }
        };
        match self.store.set(key, &raw) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write {key}: {e}");
                false
            }
        }
    }
}

/// Collision-resistant local id: millisecond timestamp plus a random suffix.
/// Uniqueness needs no coordination; the server never assigns these.
fn generate_memory_id() -> String {
    let millis = Utc::now().timestamp_millis();
    let random = uuid::Uuid::new_v4().as_simple().to_string();
    format!("local_{millis}_{}", &random[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    /// Substrate whose writes always fail; reads see nothing.
    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
            Err(anyhow!("quota exceeded"))
        }
        fn set(&self, _key: &str, _value: &str) -> anyhow::Result<()> {
            Err(anyhow!("quota exceeded"))
        }
        fn remove(&self, _key: &str) -> anyhow::Result<()> {
            Err(anyhow!("quota exceeded"))
        }
    }

    fn store() -> LocalStore<MemoryStore> {
        LocalStore::new(MemoryStore::new())
    }

    fn chat(id: &str, title: &str) -> ChatRecord {
        let mut record = ChatRecord::new(id);
        record.fields.insert("title".into(), json!(title));
        record
    }

    #[test]
    fn test_save_chat_appends_then_upserts_in_place() {
        let store = store();

        assert!(store.save_chat(&chat("a", "first")));
        assert!(store.save_chat(&chat("b", "second")));
        assert!(store.save_chat(&chat("a", "rewritten")));

        let chats = store.chats();
        assert_eq!(chats.len(), 2);
        // "a" keeps its original position but holds the new content
        assert_eq!(chats[0].id, "a");
        assert_eq!(chats[0].fields["title"], json!("rewritten"));
        assert_eq!(chats[1].id, "b");
    }

    #[test]
    fn test_chat_record_preserves_arbitrary_fields() {
        let store = store();

        let mut record = ChatRecord::new("c1");
        record.fields.insert(
            "messages".into(),
            json!([{"role": "user", "content": "hi"}]),
        );
        record.fields.insert("model".into(), json!("gemma3"));
        assert!(store.save_chat(&record));

        let roundtripped = &store.chats()[0];
        assert_eq!(roundtripped, &record);
    }

    #[test]
    fn test_add_memory_constructs_record() {
        let store = store();
        let before = Utc::now();

        let record = store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                messages: vec![json!({"role": "user", "content": "hi"})],
                memory: Some("m".into()),
                project_id: None,
            })
            .expect("write should succeed");

        assert_eq!(record.user_id, "u1");
        assert_eq!(record.memory, "m");
        assert_eq!(record.project_id, None);
        assert!(record.created_at >= before);
        assert!(record.id.starts_with("local_"));

        let memories = store.memories();
        assert_eq!(memories.len(), 1);
        assert_eq!(memories[0], record);
    }

    #[test]
    fn test_add_memory_defaults_empty_summary() {
        let store = store();
        let record = store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(record.memory, "");
    }

    #[test]
    fn test_memory_ids_are_unique() {
        let store = store();
        let a = store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                ..Default::default()
            })
            .unwrap();
        let b = store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                ..Default::default()
            })
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_search_memories_filters_and_limits() {
        let store = store();

        store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                memory: Some("Likes HELLO world".into()),
                ..Default::default()
            })
            .unwrap();
        // Match inside serialized messages, not the summary
        store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                messages: vec![json!({"role": "user", "content": "say Hello"})],
                memory: Some("greeting habit".into()),
                ..Default::default()
            })
            .unwrap();
        // Wrong user
        store
            .add_memory(NewMemory {
                user_id: "u2".into(),
                memory: Some("hello from someone else".into()),
                ..Default::default()
            })
            .unwrap();
        // No match
        store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                memory: Some("unrelated".into()),
                ..Default::default()
            })
            .unwrap();

        let results = store.search_memories("hello", "u1", DEFAULT_SEARCH_LIMIT);
        assert_eq!(
            results,
            vec!["Likes HELLO world".to_string(), "greeting habit".to_string()]
        );

        let capped = store.search_memories("hello", "u1", 1);
        assert_eq!(capped, vec!["Likes HELLO world".to_string()]);
    }

    #[test]
    fn test_fresh_store_sync_is_due() {
        let store = store();
        assert_eq!(store.sync_metadata(), SyncMetadata::default());
        assert!(store.is_sync_due());
    }

    #[test]
    fn test_update_sync_metadata_schedules_next_sync() {
        let store = store();

        let updated = store
            .update_sync_metadata(SyncMetadataPatch {
                sync_interval_days: Some(10),
            })
            .expect("write should succeed");

        let last = updated.last_sync.expect("last_sync stamped");
        assert_eq!(updated.next_sync_due, Some(last + Duration::days(10)));
        assert_eq!(updated.sync_interval_days, 10);
        assert!(!store.is_sync_due());
        assert_eq!(store.sync_metadata(), updated);
    }

    #[test]
    fn test_update_sync_metadata_custom_interval() {
        let store = store();

        let updated = store
            .update_sync_metadata(SyncMetadataPatch {
                sync_interval_days: Some(3),
            })
            .unwrap();

        assert_eq!(updated.sync_interval_days, 3);
        let last = updated.last_sync.unwrap();
        assert_eq!(updated.next_sync_due, Some(last + Duration::days(3)));
    }

    #[test]
    fn test_update_without_interval_falls_back_to_default_window() {
        let store = store();
        store
            .update_sync_metadata(SyncMetadataPatch {
                sync_interval_days: Some(3),
            })
            .unwrap();

        // An empty patch keeps the stored interval field but recomputes the
        // window from the constant default.
        let updated = store
            .update_sync_metadata(SyncMetadataPatch::default())
            .unwrap();
        assert_eq!(updated.sync_interval_days, 3);
        let last = updated.last_sync.unwrap();
        assert_eq!(
            updated.next_sync_due,
            Some(last + Duration::days(DEFAULT_SYNC_INTERVAL_DAYS))
        );
    }

    #[test]
    fn test_is_sync_due_past_deadline() {
        let inner = MemoryStore::new();
        let past = SyncMetadata {
            last_sync: Some(Utc::now() - Duration::days(11)),
            next_sync_due: Some(Utc::now() - Duration::days(1)),
            sync_interval_days: 10,
        };
        inner
            .set(
                SYNC_METADATA_KEY,
                &serde_json::to_string(&past).unwrap(),
            )
            .unwrap();

        let store = LocalStore::new(inner);
        assert!(store.is_sync_due());
    }

    #[test]
    fn test_clear_local_data_preserves_metadata() {
        let store = store();
        store.save_chat(&chat("a", "t"));
        store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                ..Default::default()
            })
            .unwrap();
        let metadata = store
            .update_sync_metadata(SyncMetadataPatch::default())
            .unwrap();

        assert!(store.clear_local_data());
        assert!(store.chats().is_empty());
        assert!(store.memories().is_empty());
        assert_eq!(store.sync_metadata(), metadata);
        assert!(!store.is_sync_due());
    }

    #[test]
    fn test_export_is_read_only_snapshot() {
        let store = store();
        store.save_chat(&chat("a", "t"));
        store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                memory: Some("m".into()),
                ..Default::default()
            })
            .unwrap();

        let metadata_before = store.sync_metadata();
        let export = store.export_local_data();

        assert_eq!(export.chats.len(), 1);
        assert_eq!(export.memories.len(), 1);
        assert_eq!(export.metadata, metadata_before);
        // Export must not advance the sync clock
        assert_eq!(store.sync_metadata(), metadata_before);
    }

    #[test]
    fn test_storage_size_reflects_serialized_bytes() {
        let store = store();
        assert_eq!(store.storage_size().total, 0);
        assert_eq!(store.storage_size().total_mb, "0.00");

        store.save_chat(&chat("a", "t"));
        let expected = serde_json::to_string(&store.chats()).unwrap().len();

        let size = store.storage_size();
        assert_eq!(size.chats, expected);
        assert_eq!(size.memories, 0);
        assert_eq!(size.total, expected);
    }

    #[test]
    fn test_corrupt_data_degrades_to_defaults() {
        let inner = MemoryStore::new();
        inner.set(CHATS_KEY, "not json").unwrap();
        inner.set(MEMORIES_KEY, "{\"oops\"").unwrap();
        inner.set(SYNC_METADATA_KEY, "42").unwrap();

        let store = LocalStore::new(inner);
        assert!(store.chats().is_empty());
        assert!(store.memories().is_empty());
        assert_eq!(store.sync_metadata(), SyncMetadata::default());
        assert!(store.is_sync_due());
    }

    #[test]
    fn test_failing_substrate_never_propagates() {
        let store = LocalStore::new(FailingStore);

        assert!(store.chats().is_empty());
        assert!(store.memories().is_empty());
        assert!(!store.save_chat(&chat("a", "t")));
        assert!(store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                ..Default::default()
            })
            .is_none());
        assert!(store.search_memories("q", "u1", 5).is_empty());
        assert_eq!(store.sync_metadata(), SyncMetadata::default());
        assert!(store
            .update_sync_metadata(SyncMetadataPatch::default())
            .is_none());
        assert!(store.is_sync_due());
        assert!(!store.clear_local_data());
        assert_eq!(store.storage_size().total, 0);
    }

    #[test]
    fn test_file_backed_store_end_to_end() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(FileStore::new(tmp.path()).unwrap());

        store.save_chat(&chat("a", "t"));
        store
            .add_memory(NewMemory {
                user_id: "u1".into(),
                memory: Some("remembers".into()),
                ..Default::default()
            })
            .unwrap();

        // A second store over the same directory sees the same data
        let reopened = LocalStore::new(FileStore::new(tmp.path()).unwrap());
        assert_eq!(reopened.chats(), store.chats());
        assert_eq!(reopened.memories(), store.memories());
    }
}
