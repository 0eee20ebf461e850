//! Per-tag narrative summaries.
//!
//! Each summarized tag runs in its own task. A branch that errors, times out,
//! panics or returns junk resolves to a deterministic local summary, so the
//! caller always gets one summary per non-empty tag.

pub mod fallback;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SummarizerConfig;
use crate::error::SummarizerError;
use crate::scoring::{HashtagRanker, HashtagWeight, PostLearningSignal, Tag};

pub use fallback::fallback_summary;

const FALLBACK_HASHTAG_LIMIT: usize = 3;
const PROMPT_CONTENT_CHARS: usize = 200;
const PROMPT_COMMENT_LIMIT: usize = 3;

/// External narrative generator.
///
/// Implementations may fail in any way; the response is untrusted JSON that is
/// coerced field by field.
#[async_trait]
pub trait NarrativeSummarizer: Send + Sync {
    async fn summarize(&self, prompt_context: Value) -> Result<Value, SummarizerError>;
}

/// Stand-in used when no model is configured. Every call fails, so every
/// summary comes from the local fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSummarizer;

#[async_trait]
impl NarrativeSummarizer for DisabledSummarizer {
    async fn summarize(&self, _prompt_context: Value) -> Result<Value, SummarizerError> {
        Err(SummarizerError::NotConfigured)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Ai,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSummary {
    pub tag: Tag,
    pub summary: String,
    pub key_themes: Vec<String>,
    pub cautions: Vec<String>,
    pub suggested_angles: Vec<String>,
    pub source: SummarySource,
    pub post_count: usize,
    pub sample_size: usize,
    pub top_hashtags: Vec<HashtagWeight>,
}

/// Result of one tag's branch before fallback is applied.
#[derive(Debug)]
pub enum SummaryOutcome {
    Generated(PatternSummary),
    Failed { tag: Tag, error: SummarizerError },
}

impl SummaryOutcome {
    pub fn tag(&self) -> Tag {
        match self {
            SummaryOutcome::Generated(summary) => summary.tag,
            SummaryOutcome::Failed { tag, .. } => *tag,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SummaryOutcome::Generated(_))
    }
}

/// Text fields pulled out of a summarizer response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NarrativeParts {
    pub summary: String,
    pub key_themes: Vec<String>,
    pub cautions: Vec<String>,
    pub suggested_angles: Vec<String>,
}

impl NarrativeParts {
    fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.key_themes.is_empty()
            && self.cautions.is_empty()
            && self.suggested_angles.is_empty()
    }
}

#[derive(Clone)]
pub struct PatternSummarizer {
    summarizer: Arc<dyn NarrativeSummarizer>,
    ranker: HashtagRanker,
    timeout: Duration,
    sample_limit: usize,
}

impl PatternSummarizer {
    pub fn new(summarizer: Arc<dyn NarrativeSummarizer>, ranker: HashtagRanker) -> Self {
        Self::from_config(summarizer, ranker, &SummarizerConfig::default())
    }

    pub fn from_config(
        summarizer: Arc<dyn NarrativeSummarizer>,
        ranker: HashtagRanker,
        config: &SummarizerConfig,
    ) -> Self {
        Self {
            summarizer,
            ranker,
            timeout: Duration::from_millis(config.timeout_ms),
            sample_limit: config.sample_limit.max(1),
        }
    }

    /// One summary per tag in gold, gray, red order, skipping tags with no posts.
    pub async fn summarize_all(&self, signals: &[PostLearningSignal]) -> Vec<PatternSummary> {
        let mut branches = Vec::new();
        for tag in Tag::summarized() {
            let group: Vec<PostLearningSignal> = signals
                .iter()
                .filter(|signal| signal.tag == tag)
                .cloned()
                .collect();
            if group.is_empty() {
                continue;
            }
            let branch = self.clone();
            let task_group = group.clone();
            let handle = tokio::spawn(async move { branch.attempt(tag, &task_group).await });
            branches.push((tag, group, handle));
        }

        let mut summaries = Vec::with_capacity(branches.len());
        for (tag, group, handle) in branches {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => SummaryOutcome::Failed {
                    tag,
                    error: SummarizerError::Aborted(err.to_string()),
                },
            };
            summaries.push(self.resolve(outcome, &group));
        }
        summaries
    }

    /// Calls the summarizer for one tag's posts.
    pub async fn attempt(&self, tag: Tag, group: &[PostLearningSignal]) -> SummaryOutcome {
        let sample = select_sample(tag, group, self.sample_limit);
        let prompt = build_prompt_context(tag, group.len(), &sample);
        debug!(tag = tag.label(), sample = sample.len(), "requesting pattern summary");

        let timeout_ms = self.timeout.as_millis() as u64;
        let response = match tokio::time::timeout(self.timeout, self.summarizer.summarize(prompt))
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => return SummaryOutcome::Failed { tag, error },
            Err(_) => {
                return SummaryOutcome::Failed {
                    tag,
                    error: SummarizerError::Timeout(timeout_ms),
                }
            }
        };

        match coerce_response(&response) {
            Ok(parts) => SummaryOutcome::Generated(PatternSummary {
                tag,
                summary: parts.summary,
                key_themes: parts.key_themes,
                cautions: parts.cautions,
                suggested_angles: parts.suggested_angles,
                source: SummarySource::Ai,
                post_count: group.len(),
                sample_size: sample.len(),
                top_hashtags: self.ranker.rank(group, FALLBACK_HASHTAG_LIMIT),
            }),
            Err(error) => SummaryOutcome::Failed { tag, error },
        }
    }

    pub fn resolve(&self, outcome: SummaryOutcome, group: &[PostLearningSignal]) -> PatternSummary {
        match outcome {
            SummaryOutcome::Generated(summary) => summary,
            SummaryOutcome::Failed { tag, error } => {
                warn!(tag = tag.label(), error = %error, "pattern summary fell back to local template");
                let top = self.ranker.rank(group, FALLBACK_HASHTAG_LIMIT);
                let sample_size = group.len().min(self.sample_limit);
                fallback_summary(tag, group.len(), sample_size, top)
            }
        }
    }
}

/// Representative posts for a tag, best examples first.
pub fn select_sample(tag: Tag, group: &[PostLearningSignal], limit: usize) -> Vec<PostLearningSignal> {
    let mut sample = group.to_vec();
    match tag {
        Tag::Gold => sample.sort_by(|a, b| {
            b.kpi_score
                .total_cmp(&a.kpi_score)
                .then(b.sentiment_score.total_cmp(&a.sentiment_score))
        }),
        Tag::Gray => sample.sort_by(|a, b| {
            a.sentiment_score
                .total_cmp(&b.sentiment_score)
                .then(a.kpi_score.total_cmp(&b.kpi_score))
        }),
        Tag::Red => sample.sort_by(|a, b| {
            a.kpi_score
                .total_cmp(&b.kpi_score)
                .then(a.sentiment_score.total_cmp(&b.sentiment_score))
        }),
        Tag::Neutral => {}
    }
    sample.truncate(limit);
    sample
}

pub fn build_prompt_context(tag: Tag, post_count: usize, sample: &[PostLearningSignal]) -> Value {
    let posts: Vec<Value> = sample
        .iter()
        .map(|signal| {
            json!({
                "title": signal.title,
                "content": truncate_chars(&signal.content, PROMPT_CONTENT_CHARS),
                "hashtags": signal.hashtags,
                "category": signal.category.label(),
                "engagementRate": signal.engagement_rate,
                "kpiScore": signal.kpi_score,
                "sentimentScore": signal.sentiment_score,
                "comments": signal
                    .feedback_comments
                    .iter()
                    .take(PROMPT_COMMENT_LIMIT)
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "tag": tag.label(),
        "tagDescription": fallback::tag_description(tag),
        "postCount": post_count,
        "samples": posts,
        "responseShape": {
            "summary": "string",
            "keyThemes": ["string"],
            "cautions": ["string"],
            "suggestedAngles": ["string"],
        },
    })
}

/// Pulls the four narrative fields out of an untrusted response.
///
/// Missing or mistyped fields become empty. A response that is not an object,
/// or that yields nothing at all, is rejected.
pub fn coerce_response(response: &Value) -> Result<NarrativeParts, SummarizerError> {
    let object = response
        .as_object()
        .ok_or_else(|| SummarizerError::Malformed("response is not an object".to_string()))?;

    let field = |camel: &str, snake: &str| object.get(camel).or_else(|| object.get(snake));
    let parts = NarrativeParts {
        summary: field("summary", "summary")
            .and_then(Value::as_str)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
        key_themes: string_list(field("keyThemes", "key_themes")),
        cautions: string_list(field("cautions", "cautions")),
        suggested_angles: string_list(field("suggestedAngles", "suggested_angles")),
    };

    if parts.is_empty() {
        return Err(SummarizerError::Malformed("response has no usable fields".to_string()));
    }
    Ok(parts)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PostRecord;
    use crate::scoring::{BaselineMetrics, PerformanceScorer};

    fn signal(id: &str, tag: Tag, kpi: f64, sentiment: f64) -> PostLearningSignal {
        let record = PostRecord {
            id: id.to_string(),
            hashtags: vec!["#a".to_string()],
            ..PostRecord::default()
        };
        let mut signal = PerformanceScorer::new(&[], BaselineMetrics::default()).score(&record, None);
        signal.tag = tag;
        signal.kpi_score = kpi;
        signal.sentiment_score = sentiment;
        signal
    }

    #[test]
    fn gold_sample_is_best_first() {
        let group = vec![
            signal("low", Tag::Gold, 0.8, 0.9),
            signal("high", Tag::Gold, 1.5, 0.2),
            signal("high_liked", Tag::Gold, 1.5, 0.9),
        ];
        let ids: Vec<String> = select_sample(Tag::Gold, &group, 12)
            .into_iter()
            .map(|s| s.post_id)
            .collect();
        assert_eq!(ids, vec!["high_liked", "high", "low"]);
    }

    #[test]
    fn red_sample_is_worst_first_and_capped() {
        let group: Vec<PostLearningSignal> = (0..20)
            .map(|i| signal(&format!("p{}", i), Tag::Red, 2.0 - i as f64 * 0.1, 0.1))
            .collect();
        let sample = select_sample(Tag::Red, &group, 12);
        assert_eq!(sample.len(), 12);
        assert_eq!(sample[0].post_id, "p19");
    }

    #[test]
    fn gray_sample_orders_by_sentiment_then_kpi() {
        let group = vec![
            signal("b", Tag::Gray, 0.9, 0.8),
            signal("a", Tag::Gray, 0.5, 0.7),
            signal("c", Tag::Gray, 0.4, 0.8),
        ];
        let ids: Vec<String> = select_sample(Tag::Gray, &group, 12)
            .into_iter()
            .map(|s| s.post_id)
            .collect();
        assert_eq!(ids, vec!["a", "c", "b"]);
    }

    #[test]
    fn coerces_mistyped_fields_to_empty() {
        let response = json!({
            "summary": "  伸びた投稿の共通点  ",
            "keyThemes": "not a list",
            "cautions": ["  ", 4, "注意"],
        });
        let parts = coerce_response(&response).unwrap();
        assert_eq!(parts.summary, "伸びた投稿の共通点");
        assert!(parts.key_themes.is_empty());
        assert_eq!(parts.cautions, vec!["注意".to_string()]);
        assert!(parts.suggested_angles.is_empty());
    }

    #[test]
    fn rejects_non_objects_and_empty_objects() {
        assert!(coerce_response(&json!(["summary"])).is_err());
        assert!(coerce_response(&json!({"summary": 3})).is_err());
    }

    #[test]
    fn accepts_snake_case_keys() {
        let parts = coerce_response(&json!({"suggested_angles": ["短く"]})).unwrap();
        assert_eq!(parts.suggested_angles, vec!["短く".to_string()]);
    }

    /// Answers every tag except `slow_tag`, which outlives any short timeout.
    struct SlowForTag {
        slow_tag: &'static str,
    }

    #[async_trait]
    impl NarrativeSummarizer for SlowForTag {
        async fn summarize(&self, prompt_context: Value) -> Result<Value, SummarizerError> {
            if prompt_context["tag"] == self.slow_tag {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Ok(json!({"summary": "傾向あり", "keyThemes": ["共通点"]}))
        }
    }

    #[tokio::test]
    async fn slow_branch_times_out_alone() {
        let config = SummarizerConfig {
            timeout_ms: 50,
            ..SummarizerConfig::default()
        };
        let summarizer = PatternSummarizer::from_config(
            Arc::new(SlowForTag { slow_tag: "gray" }),
            HashtagRanker::default(),
            &config,
        );
        let signals = vec![
            signal("g", Tag::Gold, 1.2, 0.9),
            signal("y", Tag::Gray, 0.9, 0.8),
            signal("r", Tag::Red, 0.3, 0.1),
        ];

        let started = std::time::Instant::now();
        let summaries = summarizer.summarize_all(&signals).await;
        assert!(started.elapsed() < Duration::from_secs(5));

        let sources: Vec<(Tag, SummarySource)> =
            summaries.iter().map(|s| (s.tag, s.source)).collect();
        assert_eq!(
            sources,
            vec![
                (Tag::Gold, SummarySource::Ai),
                (Tag::Gray, SummarySource::Fallback),
                (Tag::Red, SummarySource::Ai),
            ]
        );
        assert_eq!(summaries[0].summary, "傾向あり");
        assert_eq!(summaries[1].post_count, 1);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_failure() {
        let config = SummarizerConfig {
            timeout_ms: 20,
            ..SummarizerConfig::default()
        };
        let summarizer = PatternSummarizer::from_config(
            Arc::new(SlowForTag { slow_tag: "red" }),
            HashtagRanker::default(),
            &config,
        );
        let group = vec![signal("r", Tag::Red, 0.3, 0.1)];
        match summarizer.attempt(Tag::Red, &group).await {
            SummaryOutcome::Failed { tag, error } => {
                assert_eq!(tag, Tag::Red);
                assert!(matches!(error, SummarizerError::Timeout(20)));
            }
            SummaryOutcome::Generated(_) => panic!("slow summarizer should time out"),
        }
    }

    #[tokio::test]
    async fn disabled_summarizer_yields_fallbacks() {
        let summarizer = PatternSummarizer::new(Arc::new(DisabledSummarizer), HashtagRanker::default());
        let signals = vec![
            signal("g", Tag::Gold, 1.2, 0.9),
            signal("n", Tag::Neutral, 1.0, 0.5),
            signal("r", Tag::Red, 0.3, 0.1),
        ];
        let summaries = summarizer.summarize_all(&signals).await;
        let tags: Vec<Tag> = summaries.iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![Tag::Gold, Tag::Red]);
        assert!(summaries.iter().all(|s| s.source == SummarySource::Fallback));
        assert_eq!(summaries[0].top_hashtags[0].tag, "a");
    }
}
