use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::records::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostCategory {
    #[default]
    Feed,
    Reel,
    Story,
}

impl PostCategory {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "feed" | "post" | "carousel" => Some(PostCategory::Feed),
            "reel" | "reels" | "video" => Some(PostCategory::Reel),
            "story" | "stories" => Some(PostCategory::Story),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PostCategory::Feed => "feed",
            PostCategory::Reel => "reel",
            PostCategory::Story => "story",
        }
    }

    pub fn all() -> [PostCategory; 3] {
        [PostCategory::Feed, PostCategory::Reel, PostCategory::Story]
    }
}

impl<'de> Deserialize<'de> for PostCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = lenient::string(deserializer)?;
        Ok(PostCategory::from_str(&raw).unwrap_or_default())
    }
}

/// One published post with its raw performance counters.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(default, alias = "postId", deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub content: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub category: PostCategory,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub likes: f64,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub comments: f64,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub shares: f64,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub saves: f64,
    #[serde(default, deserialize_with = "lenient::counter")]
    pub reach: f64,
    #[serde(default, deserialize_with = "lenient::number")]
    pub follower_delta: f64,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::optional_bool")]
    pub satisfied: Option<bool>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub memo: Option<String>,
}

impl PostRecord {
    pub fn engagement_total(&self) -> f64 {
        self.likes.max(0.0) + self.comments.max(0.0) + self.shares.max(0.0) + self.saves.max(0.0)
    }

    pub fn title_len(&self) -> usize {
        self.title.trim().chars().count()
    }
}

/// Collapses duplicate post ids, keeping the copy with the latest publish time.
///
/// Output keeps the position of each id's first appearance. A timestamped copy
/// always beats one without a timestamp; exact ties keep the earlier copy.
pub fn dedupe_posts(records: Vec<PostRecord>) -> Vec<PostRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<PostRecord> = Vec::with_capacity(records.len());

    for record in records {
        match index.get(&record.id) {
            Some(&slot) => {
                if record.published_at > kept[slot].published_at {
                    kept[slot] = record;
                }
            }
            None => {
                index.insert(record.id.clone(), kept.len());
                kept.push(record);
            }
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: &str, day: Option<u32>, title: &str) -> PostRecord {
        PostRecord {
            id: id.to_string(),
            title: title.to_string(),
            published_at: day.map(|d| Utc.with_ymd_and_hms(2026, 3, d, 9, 0, 0).unwrap()),
            ..PostRecord::default()
        }
    }

    #[test]
    fn dedupe_keeps_latest_copy() {
        let records = vec![
            post("a", Some(1), "old"),
            post("b", Some(2), "only"),
            post("a", Some(5), "new"),
            post("a", Some(3), "middle"),
        ];
        let kept = dedupe_posts(records);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, "a");
        assert_eq!(kept[0].title, "new");
        assert_eq!(kept[1].id, "b");
    }

    #[test]
    fn dedupe_prefers_timestamped_copy() {
        let kept = dedupe_posts(vec![post("a", None, "undated"), post("a", Some(1), "dated")]);
        assert_eq!(kept[0].title, "dated");

        let kept = dedupe_posts(vec![post("a", Some(1), "dated"), post("a", None, "undated")]);
        assert_eq!(kept[0].title, "dated");
    }

    #[test]
    fn unknown_category_falls_back_to_feed() {
        let record: PostRecord =
            serde_json::from_str(r#"{"id": "p1", "category": "live", "reach": "300"}"#).unwrap();
        assert_eq!(record.category, PostCategory::Feed);
        assert_eq!(record.reach, 300.0);

        let record: PostRecord = serde_json::from_str(r#"{"postId": 7, "category": "Reels"}"#).unwrap();
        assert_eq!(record.id, "7");
        assert_eq!(record.category, PostCategory::Reel);
    }
}
