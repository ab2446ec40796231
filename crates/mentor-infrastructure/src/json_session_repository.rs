//! JSON-file SessionRepository implementation.
//!
//! One pretty-printed JSON file per session under `<base_dir>/sessions/`.
//! Saves write a temp file, sync it to disk, and rename it into place so a
//! crash mid-write never leaves a truncated session on disk, and each write
//! holds a short-lived advisory lock next to the target file.

use async_trait::async_trait;
use mentor_core::session::{Session, SessionRepository};
use mentor_core::{MentorError, Result};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::paths::MentorPaths;

/// Directory-of-JSON-files session repository.
///
/// Directory structure:
/// ```text
/// base_dir/
/// └── sessions/
///     ├── <session-id>.json
///     └── <session-id>.lock
/// ```
pub struct JsonSessionRepository {
    sessions_dir: PathBuf,
}

impl JsonSessionRepository {
    /// Creates a repository rooted at the platform data directory
    /// (`~/.local/share/mentor`).
    ///
    /// # Errors
    ///
    /// Returns `Config` if the data directory cannot be determined, `Io` if
    /// the directory structure cannot be created.
    pub fn default_location() -> Result<Self> {
        Self::new(MentorPaths::data_dir()?)
    }

    /// Creates a repository rooted at `base_dir`, creating the sessions
    /// directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `Io` if directory creation fails.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let sessions_dir = MentorPaths::sessions_dir(base_dir.as_ref());
        std::fs::create_dir_all(&sessions_dir)?;
        Ok(Self { sessions_dir })
    }

    /// Returns the directory session files are stored in.
    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.json", session_id))
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "session".to_string());
        path.with_file_name(format!(".{}.tmp", file_name))
    }
}

#[async_trait]
impl SessionRepository for JsonSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let path = self.session_path(session_id);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let session: Session = serde_json::from_str(&raw)?;
        Ok(Some(session))
    }

    async fn find_by_owner_and_goal(
        &self,
        owner_id: &str,
        goal_id: Option<&str>,
    ) -> Result<Option<Session>> {
        let sessions = self.list_all().await?;
        Ok(sessions
            .into_iter()
            .find(|session| session.owner_id == owner_id && session.goal_id.as_deref() == goal_id))
    }

    async fn save(&self, session: &Session) -> Result<()> {
        let path = self.session_path(&session.id);
        let json = serde_json::to_string_pretty(session)?;

        let _lock = FileLock::acquire(&path)?;
        let tmp = Self::tmp_path(&path);
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        // The bytes must be on disk before the rename makes them visible
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.sessions_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let raw = match fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(
                        target: "json_repository",
                        "Skipping unreadable session file {}: {}",
                        path.display(),
                        e
                    );
                    continue;
                }
            };
            match serde_json::from_str::<Session>(&raw) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    tracing::warn!(
                        target: "json_repository",
                        "Skipping corrupt session file {}: {}",
                        path.display(),
                        e
                    );
                }
            }
        }

        // Most recently updated first
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}

/// A file lock guard that releases the lock when dropped.
struct FileLock {
    #[allow(dead_code)]
    file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquires an exclusive lock next to the given path.
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&lock_path)?;

        #[cfg(unix)]
        {
            use fs2::FileExt;
            file.lock_exclusive().map_err(|e| {
                MentorError::io(format!(
                    "failed to lock {}: {}",
                    lock_path.display(),
                    e
                ))
            })?;
        }

        Ok(FileLock { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Unlock is automatic when the file handle is dropped
        let _ = std::fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mentor_core::session::{Message, MessageKind};
    use tempfile::TempDir;

    fn session_with_pending(owner_id: &str) -> Session {
        let mut session = Session::new(owner_id, None);
        session.push_message(Message::user_text(&session.id, "Should I start today?"));
        let question = Message::ai_structured(
            &session.id,
            MessageKind::Question,
            "Do you have your notes ready?",
            None,
            None,
        )
        .unwrap();
        session.push_message(question);
        session
    }

    #[tokio::test]
    async fn test_save_and_find_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let session = session_with_pending("user-1");
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded, session);
        assert_eq!(loaded.messages.len(), 2);
        // The pending marker travels with the session file
        assert_eq!(loaded.pending.len(), 1);
    }

    #[tokio::test]
    async fn test_find_nonexistent_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let result = repository.find_by_id("no-such-session").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_version() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let mut session = Session::new("user-1", None);
        repository.save(&session).await.unwrap();

        session.push_message(Message::user_text(&session.id, "hello"));
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_save_shrinking_session_stays_parseable() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let mut session = session_with_pending("user-1");
        repository.save(&session).await.unwrap();

        // A smaller rewrite must replace the file wholesale, not overlay it
        session.messages.clear();
        session.pending.clear();
        repository.save(&session).await.unwrap();

        let loaded = repository.find_by_id(&session.id).await.unwrap().unwrap();
        assert!(loaded.messages.is_empty());
        assert!(loaded.pending.is_empty());
    }

    #[tokio::test]
    async fn test_list_all_skips_corrupt_files() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let session = Session::new("user-1", None);
        repository.save(&session).await.unwrap();
        std::fs::write(
            repository.sessions_dir().join("broken.json"),
            "not valid json",
        )
        .unwrap();

        let sessions = repository.list_all().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, session.id);
    }

    #[tokio::test]
    async fn test_list_all_sorts_most_recent_first() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let mut older = Session::new("user-1", None);
        older.updated_at = "2024-01-01T00:00:00Z".to_string();
        let mut newer = Session::new("user-2", None);
        newer.updated_at = "2024-06-01T00:00:00Z".to_string();
        repository.save(&older).await.unwrap();
        repository.save(&newer).await.unwrap();

        let sessions = repository.list_all().await.unwrap();
        assert_eq!(sessions[0].id, newer.id);
        assert_eq!(sessions[1].id, older.id);
    }

    #[tokio::test]
    async fn test_find_by_owner_and_goal() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let general = Session::new("user-1", None);
        let goal = Session::new("user-1", Some("goal-3".to_string()));
        repository.save(&general).await.unwrap();
        repository.save(&goal).await.unwrap();

        let found = repository
            .find_by_owner_and_goal("user-1", Some("goal-3"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, goal.id);

        let found = repository
            .find_by_owner_and_goal("user-1", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, general.id);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonSessionRepository::new(temp_dir.path()).unwrap();

        let session = Session::new("user-1", None);
        repository.save(&session).await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(repository.sessions_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
