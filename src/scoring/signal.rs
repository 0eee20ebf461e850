use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::records::{PostCategory, PostRecord};
use crate::scoring::feedback::FeedbackAggregate;
use crate::scoring::metrics::{engagement_rate, BaselineMetrics};
use crate::{clamp01, round2};

/// Comment phrases that mark a post as worth repeating or referencing.
pub const REPEAT_KEYWORDS: [&str; 10] = [
    "また", "もう一度", "リピート", "参考", "真似", "まね", "再現", "保存", "次も", "続けて",
];

/// Comment phrases that ask for a fix.
pub const IMPROVE_KEYWORDS: [&str; 10] = [
    "改善", "分かりにくい", "わかりにくい", "見にくい", "長すぎ", "短すぎ", "微妙", "物足りない",
    "伸びない", "残念",
];

const FOLLOWER_SMOOTHING: f64 = 0.01;
const KPI_MAX: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Gold,
    Gray,
    Red,
    Neutral,
}

impl Tag {
    pub fn label(self) -> &'static str {
        match self {
            Tag::Gold => "gold",
            Tag::Gray => "gray",
            Tag::Red => "red",
            Tag::Neutral => "neutral",
        }
    }

    /// Tags that get a pattern summary.
    pub fn summarized() -> [Tag; 3] {
        [Tag::Gold, Tag::Gray, Tag::Red]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.6 {
            SentimentLabel::Positive
        } else if score <= 0.4 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

/// A scored, tagged post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostLearningSignal {
    pub post_id: String,
    pub title: String,
    pub content: String,
    pub hashtags: Vec<String>,
    pub category: PostCategory,
    pub published_at: Option<DateTime<Utc>>,
    pub likes: f64,
    pub comments: f64,
    pub shares: f64,
    pub saves: f64,
    pub reach: f64,
    pub follower_delta: f64,
    pub engagement_rate: f64,
    pub kpi_score: f64,
    pub reproducibility_score: f64,
    pub improvability_score: f64,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub tag: Tag,
    pub positive_feedback: u32,
    pub negative_feedback: u32,
    pub neutral_feedback: u32,
    pub feedback_comments: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
struct CategoryTotals {
    sum: f64,
    count: usize,
}

/// Scores posts against one build's baseline.
#[derive(Debug, Clone)]
pub struct PerformanceScorer {
    baseline: BaselineMetrics,
    categories: HashMap<PostCategory, CategoryTotals>,
}

impl PerformanceScorer {
    pub fn new(records: &[PostRecord], baseline: BaselineMetrics) -> Self {
        let mut categories: HashMap<PostCategory, CategoryTotals> = HashMap::new();
        for record in records {
            let rate = engagement_rate(record);
            if !rate.is_finite() {
                continue;
            }
            let totals = categories.entry(record.category).or_default();
            totals.sum += rate;
            totals.count += 1;
        }
        Self {
            baseline,
            categories,
        }
    }

    pub fn baseline(&self) -> &BaselineMetrics {
        &self.baseline
    }

    pub fn score_all(
        &self,
        records: &[PostRecord],
        feedback: &HashMap<String, FeedbackAggregate>,
    ) -> Vec<PostLearningSignal> {
        records
            .iter()
            .map(|record| self.score(record, feedback.get(&record.id)))
            .collect()
    }

    pub fn score(
        &self,
        record: &PostRecord,
        feedback: Option<&FeedbackAggregate>,
    ) -> PostLearningSignal {
        let rate = engagement_rate(record);
        let sentiment_score = sentiment_score(record, feedback);
        let kpi_score = self.kpi_score(record, rate);
        let reproducibility_score = self.reproducibility_score(record, feedback, rate);
        let improvability_score = self.improvability_score(record, feedback, rate);
        let tag = self.assign_tag(
            record,
            rate,
            kpi_score,
            reproducibility_score,
            improvability_score,
            sentiment_score,
        );

        PostLearningSignal {
            post_id: record.id.clone(),
            title: record.title.clone(),
            content: record.content.clone(),
            hashtags: record.hashtags.clone(),
            category: record.category,
            published_at: record.published_at,
            likes: record.likes,
            comments: record.comments,
            shares: record.shares,
            saves: record.saves,
            reach: record.reach,
            follower_delta: record.follower_delta,
            engagement_rate: rate,
            kpi_score,
            reproducibility_score,
            improvability_score,
            sentiment_score,
            sentiment_label: SentimentLabel::from_score(sentiment_score),
            tag,
            positive_feedback: feedback.map(|f| f.positive_count).unwrap_or(0),
            negative_feedback: feedback.map(|f| f.negative_count).unwrap_or(0),
            neutral_feedback: feedback.map(|f| f.neutral_count).unwrap_or(0),
            feedback_comments: feedback.map(|f| f.comments.clone()).unwrap_or_default(),
        }
    }

    fn kpi_score(&self, record: &PostRecord, rate: f64) -> f64 {
        let ratios = [
            ratio(record.reach, self.baseline.avg_reach, 0.0),
            ratio(rate, self.baseline.avg_engagement_rate, 0.0),
            ratio(
                record.follower_delta,
                self.baseline.avg_follower_delta,
                FOLLOWER_SMOOTHING,
            ),
        ];
        let present: Vec<f64> = ratios.into_iter().flatten().collect();
        if present.is_empty() {
            return 0.0;
        }
        let mean = present.iter().sum::<f64>() / present.len() as f64;
        round2(mean.clamp(0.0, KPI_MAX))
    }

    fn reproducibility_score(
        &self,
        record: &PostRecord,
        feedback: Option<&FeedbackAggregate>,
        rate: f64,
    ) -> f64 {
        let mut score = 0.0;
        if let Some(feedback) = feedback {
            if feedback.positive_share() >= 0.7 {
                score += 0.30;
            }
            if feedback.any_comment_contains(&REPEAT_KEYWORDS) {
                score += 0.20;
            }
        }
        if let Some(peer_avg) = self.peer_average(record, rate) {
            if peer_avg > 0.0 && rate >= peer_avg * 0.9 {
                score += 0.20;
            }
        }
        if hashtag_count(record) >= 3 {
            score += 0.15;
        }
        if record.title_len() >= 10 {
            score += 0.15;
        }
        round2(clamp01(score))
    }

    fn improvability_score(
        &self,
        record: &PostRecord,
        feedback: Option<&FeedbackAggregate>,
        rate: f64,
    ) -> f64 {
        let mut score = 0.0;
        if let Some(feedback) = feedback {
            if feedback.negative_share() >= 0.3 {
                score += 0.30;
            }
            if feedback.any_comment_contains(&IMPROVE_KEYWORDS) {
                score += 0.20;
            }
        }

        let tags = hashtag_count(record);
        let avg_rate = self.baseline.avg_engagement_rate;
        if avg_rate > 0.0 && rate < avg_rate * 0.8 {
            if tags < 3 {
                score += 0.20;
            }
            if record.title_len() < 10 {
                score += 0.15;
            }
            if record.category == PostCategory::Feed && rate < avg_rate * 0.7 {
                score += 0.15;
            }
        }
        if tags == 0 {
            score += 0.20;
        }
        round2(clamp01(score))
    }

    fn assign_tag(
        &self,
        record: &PostRecord,
        rate: f64,
        kpi_score: f64,
        reproducibility_score: f64,
        improvability_score: f64,
        sentiment_score: f64,
    ) -> Tag {
        if reproducibility_score >= 0.5 {
            return Tag::Gold;
        }
        if improvability_score >= 0.5 {
            return Tag::Red;
        }

        let baseline = &self.baseline;
        if sentiment_score >= 0.65 {
            let high = kpi_score >= 1.1
                || above(record.reach, baseline.avg_reach, 1.3)
                || above(rate, baseline.avg_engagement_rate, 1.3)
                || record.follower_delta > 0.0;
            return if high { Tag::Gold } else { Tag::Gray };
        }
        if sentiment_score <= 0.4 {
            let low = kpi_score <= 0.85
                || below(record.reach, baseline.avg_reach, 0.7)
                || below(rate, baseline.avg_engagement_rate, 0.7);
            if low {
                return Tag::Red;
            }
        }
        Tag::Neutral
    }

    /// Mean engagement rate of the other posts in the same category.
    fn peer_average(&self, record: &PostRecord, rate: f64) -> Option<f64> {
        let totals = self.categories.get(&record.category)?;
        let own = if rate.is_finite() { 1 } else { 0 };
        let count = totals.count.checked_sub(own)?;
        if count == 0 {
            return None;
        }
        let sum = if own == 1 { totals.sum - rate } else { totals.sum };
        Some(sum / count as f64)
    }
}

/// Positive weight share including the record's own satisfaction flag.
///
/// With no feedback and no flag the neutral bucket defaults to weight 1, so an
/// unreviewed post scores 0.
pub fn sentiment_score(record: &PostRecord, feedback: Option<&FeedbackAggregate>) -> f64 {
    let (mut positive, mut negative, neutral) = feedback
        .map(|f| (f.positive_weight, f.negative_weight, f.neutral_weight))
        .unwrap_or((0.0, 0.0, 0.0));
    match record.satisfied {
        Some(true) => positive += 1.0,
        Some(false) => negative += 1.0,
        None => {}
    }

    let mut total = positive + negative + neutral;
    if total <= 0.0 {
        total = 1.0;
    }
    round2(clamp01(positive / total))
}

pub fn hashtag_count(record: &PostRecord) -> usize {
    record
        .hashtags
        .iter()
        .filter(|tag| !tag.trim().trim_start_matches('#').is_empty())
        .count()
}

fn ratio(value: f64, baseline: f64, smoothing: f64) -> Option<f64> {
    if baseline > 0.0 {
        Some(((value + smoothing) / (baseline + smoothing)).max(0.0))
    } else if value > 0.0 {
        Some(1.0)
    } else {
        None
    }
}

fn above(value: f64, baseline: f64, factor: f64) -> bool {
    baseline > 0.0 && value >= baseline * factor
}

fn below(value: f64, baseline: f64, factor: f64) -> bool {
    baseline > 0.0 && value <= baseline * factor
}
