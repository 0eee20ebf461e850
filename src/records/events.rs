use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::records::lenient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[default]
    Neutral,
}

impl Sentiment {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "positive" | "good" | "like" => Some(Sentiment::Positive),
            "negative" | "bad" | "dislike" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Sentiment {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = lenient::string(deserializer)?;
        Ok(Sentiment::from_str(&raw).unwrap_or_default())
    }
}

/// A single piece of user feedback about one post.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEvent {
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub sentiment: Sentiment,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub comment: Option<String>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl FeedbackEvent {
    /// Weight with the default of 1 applied; non-finite or negative weights
    /// count as malformed.
    pub fn effective_weight(&self) -> f64 {
        match self.weight {
            Some(weight) if weight.is_finite() && weight >= 0.0 => weight,
            _ => 1.0,
        }
    }

    pub fn has_comment(&self) -> bool {
        self.comment
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Advice,
    Experiment,
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = lenient::string(deserializer)?;
        Ok(match raw.trim().to_lowercase().as_str() {
            "experiment" | "ab_test" | "test" => ActionKind::Experiment,
            _ => ActionKind::Advice,
        })
    }
}

/// A logged follow-up on a piece of advice or a planned experiment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEvent {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::optional_string")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub kind: ActionKind,
    #[serde(default, deserialize_with = "lenient::flag")]
    pub applied: bool,
    #[serde(default, deserialize_with = "lenient::optional_number")]
    pub result_delta: Option<f64>,
    #[serde(default, deserialize_with = "lenient::timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ActionLogEvent {
    pub fn is_completed_experiment(&self) -> bool {
        self.kind == ActionKind::Experiment && self.applied && self.result_delta.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_sentiment_is_neutral() {
        let event: FeedbackEvent =
            serde_json::from_str(r#"{"postId": "p1", "sentiment": 3, "weight": "heavy"}"#).unwrap();
        assert_eq!(event.sentiment, Sentiment::Neutral);
        assert_eq!(event.effective_weight(), 1.0);
        assert_eq!(event.post_id.as_deref(), Some("p1"));
    }

    #[test]
    fn negative_weight_falls_back_to_one() {
        let event = FeedbackEvent {
            weight: Some(-2.0),
            ..FeedbackEvent::default()
        };
        assert_eq!(event.effective_weight(), 1.0);

        let event = FeedbackEvent {
            weight: Some(2.5),
            ..FeedbackEvent::default()
        };
        assert_eq!(event.effective_weight(), 2.5);
    }

    #[test]
    fn completed_experiment_needs_result() {
        let action: ActionLogEvent =
            serde_json::from_str(r#"{"id": "x", "kind": "experiment", "applied": true}"#).unwrap();
        assert!(!action.is_completed_experiment());

        let action: ActionLogEvent = serde_json::from_str(
            r#"{"id": "x", "kind": "experiment", "applied": "true", "resultDelta": 0.2}"#,
        )
        .unwrap();
        assert!(action.is_completed_experiment());
    }
}
