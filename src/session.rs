//! Per-session state handed between use cases.
//!
//! Résumé parsing produces a [`ResumeProfile`]; interview preparation
//! consumes it. The profile travels inside a [`SessionContext`], either
//! passed directly, cached in a [`SessionStore`] within one process, or
//! written to a [`ScratchStore`] for a later CLI invocation.
//!
//! Every session has its own key. On disk that is `<dir>/<session_id>.json`,
//! written via temp file + rename so readers never see a partial document.
//! Concurrent writers to the same session are last-writer-wins.

use crate::error::ReviewError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Text extracted from a résumé.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub ocr_text: String,
}

/// Key for one user session.
///
/// Restricted to `[A-Za-z0-9_-]{1,64}` so it is always a safe file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, ReviewError> {
        let ok = !raw.is_empty()
            && raw.len() <= 64
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if ok {
            Ok(Self(raw.to_string()))
        } else {
            Err(ReviewError::InvalidInput {
                reason: format!(
                    "invalid session id '{raw}': use 1-64 letters, digits, '-' or '_'"
                ),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = ReviewError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Everything one session has accumulated so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: SessionId,
    #[serde(default)]
    pub resume: Option<ResumeProfile>,
    #[serde(default)]
    pub job_description: Option<String>,
}

impl SessionContext {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            resume: None,
            job_description: None,
        }
    }

    pub fn with_resume(mut self, resume: ResumeProfile) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn with_job_description(mut self, text: impl Into<String>) -> Self {
        self.job_description = Some(text.into());
        self
    }

    /// The stored résumé as JSON, for prompt substitution.
    pub fn resume_json(&self) -> Result<String, ReviewError> {
        let resume = self.resume.as_ref().ok_or_else(|| ReviewError::MissingResume {
            session: self.session_id.to_string(),
        })?;
        serde_json::to_string(resume).map_err(|e| ReviewError::Internal(e.to_string()))
    }
}

// ── In-process store ─────────────────────────────────────────────────────

/// Session contexts held in memory, keyed by id.
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<SessionId, SessionContext>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the context for its session.
    pub fn put(&self, context: SessionContext) {
        self.lock().insert(context.session_id.clone(), context);
    }

    pub fn get(&self, id: &SessionId) -> Result<SessionContext, ReviewError> {
        self.lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ReviewError::SessionNotFound {
                session: id.to_string(),
            })
    }

    pub fn remove(&self, id: &SessionId) -> Option<SessionContext> {
        self.lock().remove(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, SessionContext>> {
        // A poisoned map is still structurally valid.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ── On-disk store ────────────────────────────────────────────────────────

/// Session contexts stored as JSON files, one per session.
#[derive(Debug, Clone)]
pub struct ScratchStore {
    dir: PathBuf,
}

impl ScratchStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `$TMPDIR/verge-review`.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir().join("verge-review")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Write the context atomically, creating the directory if needed.
    pub async fn save(&self, context: &SessionContext) -> Result<PathBuf, ReviewError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReviewError::ScratchIo {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.path_for(&context.session_id);
        let json = serde_json::to_vec_pretty(context).map_err(|source| {
            ReviewError::ScratchFormat {
                path: path.clone(),
                source,
            }
        })?;

        let tmp = self.dir.join(format!(
            ".{}.{}.tmp",
            context.session_id,
            uuid::Uuid::new_v4().simple()
        ));
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|source| ReviewError::ScratchIo {
                path: tmp.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(ReviewError::ScratchIo { path, source });
        }

        debug!("Saved session {} to {}", context.session_id, path.display());
        Ok(path)
    }

    pub async fn load(&self, id: &SessionId) -> Result<SessionContext, ReviewError> {
        let path = self.path_for(id);
        let bytes = tokio::fs::read(&path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ReviewError::SessionNotFound {
                    session: id.to_string(),
                }
            } else {
                ReviewError::ScratchIo {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_slice(&bytes).map_err(|source| ReviewError::ScratchFormat { path, source })
    }

    /// Load the session, or start an empty one if none is stored.
    pub async fn load_or_new(&self, id: &SessionId) -> Result<SessionContext, ReviewError> {
        match self.load(id).await {
            Err(ReviewError::SessionNotFound { .. }) => Ok(SessionContext::new(id.clone())),
            other => other,
        }
    }

    pub async fn remove(&self, id: &SessionId) -> Result<(), ReviewError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ReviewError::ScratchIo { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[test]
    fn session_id_rules() {
        assert!(SessionId::parse("abc-123_X").is_ok());
        assert!(SessionId::parse("").is_err());
        assert!(SessionId::parse("../etc/passwd").is_err());
        assert!(SessionId::parse(&"a".repeat(65)).is_err());
        let fresh = SessionId::generate();
        assert_eq!(fresh.as_str().len(), 32);
        assert!(SessionId::parse(fresh.as_str()).is_ok());
    }

    #[test]
    fn session_id_serde_validates() {
        assert!(serde_json::from_str::<SessionId>("\"ok_1\"").is_ok());
        assert!(serde_json::from_str::<SessionId>("\"no/slash\"").is_err());
    }

    #[test]
    fn resume_profile_round_trip() {
        let p: ResumeProfile = serde_json::from_str(r#"{"ocr_text": "X"}"#).unwrap();
        assert_eq!(p.ocr_text, "X");
    }

    #[test]
    fn resume_json_requires_resume() {
        let ctx = SessionContext::new(id("s1"));
        assert!(matches!(
            ctx.resume_json(),
            Err(ReviewError::MissingResume { .. })
        ));
        let ctx = ctx.with_resume(ResumeProfile {
            ocr_text: "X".into(),
        });
        assert_eq!(ctx.resume_json().unwrap(), r#"{"ocr_text":"X"}"#);
    }

    #[test]
    fn memory_store_isolates_sessions() {
        let store = SessionStore::new();
        store.put(SessionContext::new(id("a")).with_job_description("rust dev"));
        store.put(SessionContext::new(id("b")).with_job_description("go dev"));

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(&id("a")).unwrap().job_description.as_deref(),
            Some("rust dev")
        );
        assert_eq!(
            store.get(&id("b")).unwrap().job_description.as_deref(),
            Some("go dev")
        );
        store.remove(&id("a"));
        assert!(matches!(
            store.get(&id("a")),
            Err(ReviewError::SessionNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn scratch_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(dir.path());
        let ctx = SessionContext::new(id("s1")).with_resume(ResumeProfile {
            ocr_text: "X".into(),
        });

        let path = store.save(&ctx).await.unwrap();
        assert_eq!(path, dir.path().join("s1.json"));

        let loaded = store.load(&id("s1")).await.unwrap();
        assert_eq!(loaded.resume.unwrap().ocr_text, "X");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn scratch_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(dir.path());

        assert!(matches!(
            store.load(&id("nope")).await,
            Err(ReviewError::SessionNotFound { .. })
        ));
        assert_eq!(
            store.load_or_new(&id("nope")).await.unwrap(),
            SessionContext::new(id("nope"))
        );

        std::fs::write(dir.path().join("bad.json"), b"{not json").unwrap();
        assert!(matches!(
            store.load(&id("bad")).await,
            Err(ReviewError::ScratchFormat { .. })
        ));
    }

    #[tokio::test]
    async fn scratch_sessions_do_not_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScratchStore::new(dir.path());
        for (s, text) in [("one", "first"), ("two", "second")] {
            let ctx = SessionContext::new(id(s)).with_resume(ResumeProfile {
                ocr_text: text.into(),
            });
            store.save(&ctx).await.unwrap();
        }
        assert_eq!(
            store.load(&id("one")).await.unwrap().resume.unwrap().ocr_text,
            "first"
        );
        store.remove(&id("one")).await.unwrap();
        store.remove(&id("one")).await.unwrap();
        assert_eq!(
            store.load(&id("two")).await.unwrap().resume.unwrap().ocr_text,
            "second"
        );
    }
}
