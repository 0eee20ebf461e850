pub mod feedback;
pub mod hashtags;
pub mod metrics;
pub mod signal;

pub use feedback::{aggregate_feedback, FeedbackAggregate};
pub use hashtags::{normalize_hashtag, HashtagRanker, HashtagWeight};
pub use metrics::{baseline, engagement_rate, BaselineMetrics};
pub use signal::{PerformanceScorer, PostLearningSignal, SentimentLabel, Tag};
