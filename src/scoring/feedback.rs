use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::records::{FeedbackEvent, Sentiment};

/// Folded feedback for one post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackAggregate {
    pub post_id: String,
    pub positive_count: u32,
    pub negative_count: u32,
    pub neutral_count: u32,
    pub positive_weight: f64,
    pub negative_weight: f64,
    pub neutral_weight: f64,
    pub comments: Vec<String>,
}

impl FeedbackAggregate {
    pub fn total_count(&self) -> u32 {
        self.positive_count + self.negative_count + self.neutral_count
    }

    pub fn total_weight(&self) -> f64 {
        self.positive_weight + self.negative_weight + self.neutral_weight
    }

    pub fn positive_share(&self) -> f64 {
        share(self.positive_weight, self.total_weight())
    }

    pub fn negative_share(&self) -> f64 {
        share(self.negative_weight, self.total_weight())
    }

    pub fn any_comment_contains(&self, keywords: &[&str]) -> bool {
        self.comments
            .iter()
            .any(|comment| keywords.iter().any(|keyword| comment.contains(keyword)))
    }

    fn record(&mut self, event: &FeedbackEvent) {
        let weight = event.effective_weight();
        match event.sentiment {
            Sentiment::Positive => {
                self.positive_count += 1;
                self.positive_weight += weight;
            }
            Sentiment::Negative => {
                self.negative_count += 1;
                self.negative_weight += weight;
            }
            Sentiment::Neutral => {
                self.neutral_count += 1;
                self.neutral_weight += weight;
            }
        }
        if let Some(comment) = event.comment.as_deref() {
            let trimmed = comment.trim();
            if !trimmed.is_empty() {
                self.comments.push(trimmed.to_string());
            }
        }
    }
}

/// Groups feedback by post id. Events without a post id are dropped.
pub fn aggregate_feedback(events: &[FeedbackEvent]) -> HashMap<String, FeedbackAggregate> {
    let mut aggregates: HashMap<String, FeedbackAggregate> = HashMap::new();
    for event in events {
        let Some(post_id) = event.post_id.as_deref().map(str::trim) else {
            continue;
        };
        if post_id.is_empty() {
            continue;
        }
        aggregates
            .entry(post_id.to_string())
            .or_insert_with(|| FeedbackAggregate {
                post_id: post_id.to_string(),
                ..FeedbackAggregate::default()
            })
            .record(event);
    }
    aggregates
}

fn share(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(post_id: Option<&str>, sentiment: Sentiment, weight: Option<f64>, comment: Option<&str>) -> FeedbackEvent {
        FeedbackEvent {
            post_id: post_id.map(str::to_string),
            sentiment,
            weight,
            comment: comment.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn folds_counts_weights_and_comments() {
        let events = vec![
            event(Some("p1"), Sentiment::Positive, Some(2.0), Some("  また見たい  ")),
            event(Some("p1"), Sentiment::Negative, None, Some("   ")),
            event(Some("p1"), Sentiment::Neutral, Some(0.5), Some("普通")),
            event(Some("p2"), Sentiment::Positive, None, None),
            event(None, Sentiment::Positive, None, Some("orphan")),
        ];
        let aggregates = aggregate_feedback(&events);
        assert_eq!(aggregates.len(), 2);

        let p1 = &aggregates["p1"];
        assert_eq!(p1.total_count(), 3);
        assert_eq!(p1.positive_weight, 2.0);
        assert_eq!(p1.negative_weight, 1.0);
        assert_eq!(p1.neutral_weight, 0.5);
        assert_eq!(p1.comments, vec!["また見たい".to_string(), "普通".to_string()]);
        assert!((p1.positive_share() - 2.0 / 3.5).abs() < 1e-9);
        assert!(p1.any_comment_contains(&["また"]));
    }

    #[test]
    fn empty_aggregate_has_zero_shares() {
        let aggregate = FeedbackAggregate::default();
        assert_eq!(aggregate.positive_share(), 0.0);
        assert_eq!(aggregate.negative_share(), 0.0);
    }
}
