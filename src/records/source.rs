use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::records::{ActionLogEvent, FeedbackEvent, PostRecord};

/// Read side of the record store.
///
/// Every method returns a newest-first, bounded list. No data is an empty
/// list, never an error.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_post_records(&self, user_id: &str) -> Result<Vec<PostRecord>, SourceError>;

    async fn fetch_feedback_events(&self, user_id: &str)
        -> Result<Vec<FeedbackEvent>, SourceError>;

    async fn fetch_action_log_events(
        &self,
        user_id: &str,
    ) -> Result<Vec<ActionLogEvent>, SourceError>;
}

pub const POSTS_FILE: &str = "posts.json";
pub const FEEDBACK_FILE: &str = "feedback.json";
pub const ACTIONS_FILE: &str = "actions.json";

/// Reads `<data_dir>/<user_id>/{posts,feedback,actions}.json`.
pub struct JsonRecordSource {
    data_dir: PathBuf,
    post_limit: usize,
    feedback_limit: usize,
    action_limit: usize,
}

impl JsonRecordSource {
    pub fn new(data_dir: PathBuf) -> Self {
        Self::from_config(&SourceConfig {
            data_dir: data_dir.to_string_lossy().to_string(),
            ..SourceConfig::default()
        })
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            data_dir: PathBuf::from(&config.data_dir),
            post_limit: config.post_limit,
            feedback_limit: config.feedback_limit,
            action_limit: config.action_limit,
        }
    }

    /// Rejects ids that are not plain directory names so two users can never
    /// share a record directory.
    pub fn user_dir(&self, user_id: &str) -> Result<PathBuf, SourceError> {
        if !is_valid_user_id(user_id) {
            return Err(SourceError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.data_dir.join(user_id))
    }
}

#[async_trait]
impl RecordSource for JsonRecordSource {
    async fn fetch_post_records(&self, user_id: &str) -> Result<Vec<PostRecord>, SourceError> {
        let path = self.user_dir(user_id)?.join(POSTS_FILE);
        let records: Vec<PostRecord> = load_array(&path).await?;
        Ok(newest_first(records, self.post_limit, |record| record.published_at))
    }

    async fn fetch_feedback_events(
        &self,
        user_id: &str,
    ) -> Result<Vec<FeedbackEvent>, SourceError> {
        let path = self.user_dir(user_id)?.join(FEEDBACK_FILE);
        let events: Vec<FeedbackEvent> = load_array(&path).await?;
        Ok(newest_first(events, self.feedback_limit, |event| event.created_at))
    }

    async fn fetch_action_log_events(
        &self,
        user_id: &str,
    ) -> Result<Vec<ActionLogEvent>, SourceError> {
        let path = self.user_dir(user_id)?.join(ACTIONS_FILE);
        let events: Vec<ActionLogEvent> = load_array(&path).await?;
        Ok(newest_first(events, self.action_limit, |event| event.created_at))
    }
}

pub const MAX_USER_ID_LEN: usize = 128;

/// Non-empty, at most [`MAX_USER_ID_LEN`] bytes, `[A-Za-z0-9_-]` only.
pub fn is_valid_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

async fn load_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SourceError> {
    if !path.exists() {
        debug!(path = %path.display(), "record file missing, treating as empty");
        return Ok(Vec::new());
    }

    let data = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
    if data.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> = serde_json::from_str(&data).map_err(|source| SourceError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let mut items = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        if !value.is_object() {
            warn!(path = %path.display(), position, "skipping non-object record");
            continue;
        }
        match serde_json::from_value::<T>(value) {
            Ok(item) => items.push(item),
            Err(err) => {
                warn!(path = %path.display(), position, error = %err, "skipping unreadable record")
            }
        }
    }
    Ok(items)
}

fn newest_first<T, F>(mut items: Vec<T>, limit: usize, timestamp: F) -> Vec<T>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    // Stable sort: undated items sink to the end in file order.
    items.sort_by_key(|item| Reverse(timestamp(item)));
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_user_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonRecordSource::new(dir.path().to_path_buf());
        assert!(source.fetch_post_records("nobody").await.unwrap().is_empty());
        assert!(source.fetch_feedback_events("nobody").await.unwrap().is_empty());
        assert!(source.fetch_action_log_events("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sorts_newest_first_and_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(
            user_dir.join(POSTS_FILE),
            r#"[
                {"id": "old", "publishedAt": "2026-01-01T00:00:00Z"},
                42,
                {"id": "undated"},
                {"id": "new", "publishedAt": "2026-02-01T00:00:00Z"}
            ]"#,
        )
        .unwrap();

        let source = JsonRecordSource::new(dir.path().to_path_buf());
        let posts = source.fetch_post_records("u1").await.unwrap();
        let ids: Vec<&str> = posts.iter().map(|post| post.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "undated"]);
    }

    #[tokio::test]
    async fn invalid_json_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("u1");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join(FEEDBACK_FILE), "{not json").unwrap();

        let source = JsonRecordSource::new(dir.path().to_path_buf());
        let err = source.fetch_feedback_events("u1").await.unwrap_err();
        assert!(matches!(err, SourceError::Parse { .. }));
    }

    #[test]
    fn user_ids_are_plain_directory_names() {
        assert!(is_valid_user_id("user-42_a"));
        assert!(!is_valid_user_id(""));
        assert!(!is_valid_user_id("../etc/passwd"));
        assert!(!is_valid_user_id("a.b"));
        assert!(!is_valid_user_id("a/b"));
        assert!(!is_valid_user_id(&"x".repeat(MAX_USER_ID_LEN + 1)));
    }

    #[tokio::test]
    async fn lookalike_ids_never_read_another_users_records() {
        let dir = tempfile::tempdir().unwrap();
        let user_dir = dir.path().join("a_b");
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join(POSTS_FILE), r#"[{"id": "private"}]"#).unwrap();

        let source = JsonRecordSource::new(dir.path().to_path_buf());
        assert_eq!(source.fetch_post_records("a_b").await.unwrap().len(), 1);
        for lookalike in ["a.b", "a/b", "a b"] {
            let err = source.fetch_post_records(lookalike).await.unwrap_err();
            assert!(matches!(err, SourceError::InvalidUserId(_)));
        }
    }
}
