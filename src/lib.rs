//! Per-user learning context for social post coaching.
//!
//! Raw post records, feedback and action logs go in; a cached
//! [`MasterContext`] comes out, carrying scored and tagged posts, per-tag
//! pattern summaries, engagement timelines and progress badges.

pub mod badges;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod llm;
pub mod patterns;
pub mod records;
pub mod scoring;
pub mod timeline;

pub use badges::{evaluate_badges, BadgeCounters, BadgeStatus, LearningBadge};
pub use cache::{CacheStore, CachedContext, ContextCache, FileCacheStore, InMemoryCacheStore};
pub use config::LearningConfig;
pub use context::{ContextBuilder, LearningPhase, MasterContext};
pub use error::{CacheError, LearningError, SourceError, SummarizerError};
pub use patterns::{DisabledSummarizer, NarrativeSummarizer, PatternSummarizer, PatternSummary};
pub use records::{ActionLogEvent, FeedbackEvent, JsonRecordSource, PostRecord, RecordSource};
pub use scoring::{PostLearningSignal, Tag};
pub use timeline::{Timeline, TimelineAggregator, TimelinePoint};

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub(crate) fn clamp01(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.max(0.0).min(1.0)
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

pub fn format_float(value: f64, digits: usize) -> String {
    format!("{:.1$}", value, digits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_and_clamp() {
        assert_eq!(round2(0.666_666), 0.67);
        assert_eq!(round2(-1.234), -1.23);
        assert_eq!(clamp01(f64::NAN), 0.0);
        assert_eq!(clamp01(1.7), 1.0);
        assert_eq!(clamp01(-0.2), 0.0);
    }

    #[test]
    fn formats() {
        assert_eq!(format_percent(0.256), "25.6%");
        assert_eq!(format_float(1.0, 2), "1.00");
    }
}
