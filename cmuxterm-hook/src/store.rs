//! The cross-process Claude hook session store.
//!
//! A JSON file shared by every `cmux claude-hook` invocation.  Every
//! operation is a locked read-modify-write: take the advisory lock on
//! `<path>.lock`, load, prune expired records, mutate, then write the
//! whole file atomically via a temp file + rename.  In-process callers
//! additionally serialize on a mutex while the file lock is held.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

const STORE_VERSION: u32 = 1;
const SESSION_TTL_DAYS: i64 = 7;

lazy_static::lazy_static! {
    static ref PROCESS_LOCK: Mutex<()> = Mutex::new(());
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub workspace_id: String,
    pub surface_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_body: Option<String>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    sessions: BTreeMap<String, SessionRecord>,
}

/// Selector for [`SessionStore::consume`].
#[derive(Debug, Default, Clone)]
pub struct ConsumeQuery {
    pub session_id: Option<String>,
    pub workspace_id: Option<String>,
    pub surface_id: Option<String>,
}

pub struct SessionStore {
    path: PathBuf,
}

/// Normalize a session id: trim whitespace, empty means "no session".
pub fn normalize_session_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        "no session".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Trim an optional string, rejecting empties.
pub fn normalize_opt(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_store() -> Self {
        Self::new(config::configuration().hook_state_path.clone())
    }

    pub fn lookup(&self, session_id: &str) -> anyhow::Result<Option<SessionRecord>> {
        let session_id = normalize_session_id(session_id);
        self.with_locked_sessions(|sessions| sessions.get(&session_id).cloned())
    }

    /// Insert or refresh the record for a session.  `started_at` is
    /// preserved across updates; everything else is replaced.
    pub fn upsert(
        &self,
        session_id: &str,
        workspace_id: &str,
        surface_id: &str,
        cwd: Option<&str>,
        last_subtitle: Option<&str>,
        last_body: Option<&str>,
    ) -> anyhow::Result<SessionRecord> {
        let session_id = normalize_session_id(session_id);
        let now = Utc::now();
        self.with_locked_sessions(|sessions| {
            let started_at = sessions
                .get(&session_id)
                .map(|r| r.started_at)
                .unwrap_or(now);
            let record = SessionRecord {
                session_id: session_id.clone(),
                workspace_id: workspace_id.to_string(),
                surface_id: surface_id.to_string(),
                cwd: normalize_opt(cwd),
                last_subtitle: normalize_opt(last_subtitle),
                last_body: normalize_opt(last_body),
                started_at,
                updated_at: now,
            };
            sessions.insert(session_id.clone(), record.clone());
            record
        })
    }

    /// Update only the stored (subtitle, body) pair used for duplicate
    /// suppression.  No-op when the session is unknown.
    pub fn remember_notification(
        &self,
        session_id: &str,
        subtitle: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        let session_id = normalize_session_id(session_id);
        self.with_locked_sessions(|sessions| {
            if let Some(record) = sessions.get_mut(&session_id) {
                record.last_subtitle = normalize_opt(Some(subtitle));
                record.last_body = normalize_opt(Some(body));
                record.updated_at = Utc::now();
            }
        })
    }

    /// Remove and return the record for the query.  Falls back from
    /// session id to the newest record matching the surface, then to the
    /// unique record matching the workspace.
    pub fn consume(&self, query: &ConsumeQuery) -> anyhow::Result<Option<SessionRecord>> {
        let session_id = query.session_id.as_deref().map(normalize_session_id);
        let surface_id = query.surface_id.clone();
        let workspace_id = query.workspace_id.clone();
        self.with_locked_sessions(move |sessions| {
            if let Some(session_id) = &session_id {
                if let Some(record) = sessions.remove(session_id) {
                    return Some(record);
                }
            }
            if let Some(surface_id) = &surface_id {
                let key = sessions
                    .values()
                    .filter(|r| &r.surface_id == surface_id)
                    .max_by_key(|r| r.updated_at)
                    .map(|r| r.session_id.clone());
                if let Some(key) = key {
                    return sessions.remove(&key);
                }
            }
            if let Some(workspace_id) = &workspace_id {
                let mut matching = sessions
                    .values()
                    .filter(|r| &r.workspace_id == workspace_id)
                    .map(|r| r.session_id.clone());
                if let (Some(key), None) = (matching.next(), matching.next()) {
                    drop(matching);
                    return sessions.remove(&key);
                }
            }
            None
        })
    }

    /// All live records, for diagnostics.
    pub fn list(&self) -> anyhow::Result<Vec<SessionRecord>> {
        self.with_locked_sessions(|sessions| sessions.values().cloned().collect())
    }

    fn with_locked_sessions<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, SessionRecord>) -> T,
    ) -> anyhow::Result<T> {
        let _process_guard = PROCESS_LOCK.lock();
        let _file_lock = FileLock::acquire(&self.lock_path())?;

        let mut store = self.load()?;
        prune_expired(&mut store.sessions);
        let result = f(&mut store.sessions);
        self.save(&store)?;
        Ok(result)
    }

    fn lock_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".lock");
        PathBuf::from(os)
    }

    fn load(&self) -> anyhow::Result<StoreFile> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreFile {
                    version: STORE_VERSION,
                    sessions: BTreeMap::new(),
                })
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        match serde_json::from_slice::<StoreFile>(&data) {
            Ok(store) => Ok(store),
            Err(err) => {
                // A corrupt state file should not wedge the hooks forever
                log::error!(
                    "discarding corrupt session store {}: {}",
                    self.path.display(),
                    err
                );
                Ok(StoreFile {
                    version: STORE_VERSION,
                    sessions: BTreeMap::new(),
                })
            }
        }
    }

    /// Serialize and atomically replace the store file.
    fn save(&self, store: &StoreFile) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("{} has no parent dir", self.path.display()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating directory {}", dir.display()))?;

        let store = StoreFile {
            version: STORE_VERSION,
            sessions: store.sessions.clone(),
        };
        let mut buf = serde_json::to_vec_pretty(&store).context("serializing session store")?;
        buf.push(b'\n');

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("creating temp file in {}", dir.display()))?;
        use std::io::Write as _;
        tmp.write_all(&buf).context("writing session store")?;
        tmp.persist(&self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;
        Ok(())
    }
}

fn prune_expired(sessions: &mut BTreeMap<String, SessionRecord>) {
    let cutoff = Utc::now() - Duration::days(SESSION_TTL_DAYS);
    sessions.retain(|_, record| record.updated_at >= cutoff);
}

/// Exclusive advisory lock on the sidecar lock file, held for the
/// duration of one read-modify-write.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> anyhow::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .with_context(|| format!("opening lock file {}", path.display()))?;
        let res = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if res != 0 {
            let err = std::io::Error::last_os_error();
            anyhow::bail!("unable to lock {}: {}", path.display(), err);
        }
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unsafe { libc::flock(self.file.as_raw_fd(), libc::LOCK_UN) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9::assert_equal;

    fn store_in(dir: &tempfile::TempDir) -> SessionStore {
        SessionStore::new(dir.path().join("sessions.json"))
    }

    #[test]
    fn upsert_lookup_consume() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store
            .upsert("sess-1", "ws-a", "sfc-a", Some("/tmp"), None, None)
            .unwrap();
        let record = store.lookup("sess-1").unwrap().unwrap();
        assert_equal!(record.workspace_id, "ws-a");
        assert_equal!(record.cwd, Some("/tmp".to_string()));

        let consumed = store
            .consume(&ConsumeQuery {
                session_id: Some("sess-1".to_string()),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        assert_equal!(consumed.session_id, "sess-1");
        assert_equal!(store.lookup("sess-1").unwrap(), None);
    }

    #[test]
    fn upsert_preserves_started_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        let first = store
            .upsert("sess-1", "ws-a", "sfc-a", None, None, None)
            .unwrap();
        let second = store
            .upsert("sess-1", "ws-b", "sfc-b", None, Some("Waiting"), None)
            .unwrap();
        assert_equal!(first.started_at, second.started_at);
        assert_equal!(second.workspace_id, "ws-b");
        assert!(second.updated_at >= first.updated_at);
    }

    #[test]
    fn session_id_normalization() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert("  padded  ", "ws", "sfc", None, None, None).unwrap();
        assert!(store.lookup("padded").unwrap().is_some());

        store.upsert("", "ws", "sfc", None, None, None).unwrap();
        assert!(store.lookup("  ").unwrap().is_some());
        assert_equal!(
            store.lookup("").unwrap().unwrap().session_id,
            "no session"
        );
    }

    #[test]
    fn consume_falls_back_to_surface_then_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert("s1", "ws-a", "sfc-1", None, None, None).unwrap();
        store.upsert("s2", "ws-a", "sfc-2", None, None, None).unwrap();

        // unknown session id, but the surface matches
        let got = store
            .consume(&ConsumeQuery {
                session_id: Some("missing".to_string()),
                surface_id: Some("sfc-2".to_string()),
                workspace_id: Some("ws-a".to_string()),
            })
            .unwrap()
            .unwrap();
        assert_equal!(got.session_id, "s2");

        // workspace fallback only fires when the match is unique
        let got = store
            .consume(&ConsumeQuery {
                workspace_id: Some("ws-a".to_string()),
                ..Default::default()
            })
            .unwrap()
            .unwrap();
        assert_equal!(got.session_id, "s1");

        assert!(store
            .consume(&ConsumeQuery {
                workspace_id: Some("ws-a".to_string()),
                ..Default::default()
            })
            .unwrap()
            .is_none());
    }

    #[test]
    fn workspace_fallback_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);

        store.upsert("s1", "ws-a", "sfc-1", None, None, None).unwrap();
        store.upsert("s2", "ws-a", "sfc-2", None, None, None).unwrap();

        assert!(store
            .consume(&ConsumeQuery {
                workspace_id: Some("ws-a".to_string()),
                ..Default::default()
            })
            .unwrap()
            .is_none());
        assert_equal!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn records_expire_after_seven_days() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let stale = Utc::now() - Duration::days(8);
        let fresh = Utc::now() - Duration::days(1);
        let file = serde_json::json!({
            "version": 1,
            "sessions": {
                "old": {
                    "session_id": "old",
                    "workspace_id": "ws",
                    "surface_id": "sfc-old",
                    "started_at": stale,
                    "updated_at": stale,
                },
                "new": {
                    "session_id": "new",
                    "workspace_id": "ws",
                    "surface_id": "sfc-new",
                    "started_at": fresh,
                    "updated_at": fresh,
                },
            },
        });
        std::fs::write(&path, serde_json::to_vec_pretty(&file).unwrap()).unwrap();

        let store = SessionStore::new(&path);
        let live = store.list().unwrap();
        assert_equal!(live.len(), 1);
        assert_equal!(live[0].session_id, "new");
    }

    #[test]
    fn corrupt_file_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = SessionStore::new(&path);
        assert_equal!(store.list().unwrap().len(), 0);
        store.upsert("s1", "ws", "sfc", None, None, None).unwrap();
        assert_equal!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn on_disk_layout_is_versioned_json() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.upsert("s1", "ws", "sfc", None, None, None).unwrap();

        let data = std::fs::read(dir.path().join("sessions.json")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&data).unwrap();
        assert_equal!(value["version"], serde_json::json!(1));
        assert_equal!(value["sessions"]["s1"]["workspace_id"], serde_json::json!("ws"));
        assert!(dir.path().join("sessions.json.lock").exists());
    }
}
