use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::badges::{LearningBadge, BADGE_CATALOGUE_VERSION};
use crate::patterns::PatternSummary;
use crate::records::{ActionLogEvent, FeedbackEvent, PostCategory, Sentiment};
use crate::scoring::{BaselineMetrics, HashtagWeight, PostLearningSignal, Tag};
use crate::timeline::Timeline;
use crate::{clamp01, round2};

const RAG_CATEGORY_TARGET: f64 = 3.0;
const RAG_SIGNAL_TARGET: f64 = 20.0;
const RECOMMENDATION_LIMIT: usize = 5;
const FEEDBACK_HABIT_TARGET: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningPhase {
    Initial,
    Learning,
    Optimized,
    Master,
}

impl LearningPhase {
    pub fn from_interactions(total: u32) -> Self {
        if total >= 12 {
            LearningPhase::Master
        } else if total >= 8 {
            LearningPhase::Optimized
        } else if total >= 4 {
            LearningPhase::Learning
        } else {
            LearningPhase::Initial
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LearningPhase::Initial => "initial",
            LearningPhase::Learning => "learning",
            LearningPhase::Optimized => "optimized",
            LearningPhase::Master => "master",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionStats {
    pub feedback_count: u32,
    pub positive_rate: f64,
    pub commented_feedback_count: u32,
    pub action_count: u32,
    pub applied_action_count: u32,
    pub adoption_rate: f64,
}

impl InteractionStats {
    pub fn collect(feedback: &[FeedbackEvent], actions: &[ActionLogEvent]) -> Self {
        let mut total_weight = 0.0;
        let mut positive_weight = 0.0;
        for event in feedback {
            let weight = event.effective_weight();
            total_weight += weight;
            if event.sentiment == Sentiment::Positive {
                positive_weight += weight;
            }
        }
        let applied = actions.iter().filter(|action| action.applied).count();

        Self {
            feedback_count: feedback.len() as u32,
            positive_rate: ratio(positive_weight, total_weight),
            commented_feedback_count: feedback.iter().filter(|event| event.has_comment()).count()
                as u32,
            action_count: actions.len() as u32,
            applied_action_count: applied as u32,
            adoption_rate: ratio(applied as f64, actions.len() as f64),
        }
    }

    pub fn total_interactions(&self) -> u32 {
        self.feedback_count + self.action_count
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagCounts {
    pub gold: u32,
    pub gray: u32,
    pub red: u32,
    pub neutral: u32,
}

impl TagCounts {
    pub fn from_signals(signals: &[PostLearningSignal]) -> Self {
        let mut counts = TagCounts::default();
        for signal in signals {
            match signal.tag {
                Tag::Gold => counts.gold += 1,
                Tag::Gray => counts.gray += 1,
                Tag::Red => counts.red += 1,
                Tag::Neutral => counts.neutral += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u32 {
        self.gold + self.gray + self.red + self.neutral
    }
}

/// Everything downstream advice generation knows about one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterContext {
    pub user_id: String,
    pub generated_at: DateTime<Utc>,
    pub is_cold_start: bool,
    pub learning_phase: LearningPhase,
    pub total_interactions: u32,
    pub rag_hit_rate: f64,
    pub baseline: BaselineMetrics,
    pub interaction_stats: InteractionStats,
    pub tag_counts: TagCounts,
    pub signals: Vec<PostLearningSignal>,
    pub pattern_summaries: Vec<PatternSummary>,
    pub top_hashtags: Vec<HashtagWeight>,
    pub timeline: Timeline,
    pub feedback_streak_weeks: u32,
    pub badges: Vec<LearningBadge>,
    pub badge_catalogue_version: u32,
    pub recommendations: Vec<String>,
}

impl MasterContext {
    /// Context for a user with nothing recorded yet, or whose records could
    /// not be read.
    pub fn cold_start(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            generated_at: now,
            is_cold_start: true,
            learning_phase: LearningPhase::Initial,
            total_interactions: 0,
            rag_hit_rate: 0.0,
            baseline: BaselineMetrics::default(),
            interaction_stats: InteractionStats::default(),
            tag_counts: TagCounts::default(),
            signals: Vec::new(),
            pattern_summaries: Vec::new(),
            top_hashtags: Vec::new(),
            timeline: Timeline::default(),
            feedback_streak_weeks: 0,
            badges: Vec::new(),
            badge_catalogue_version: BADGE_CATALOGUE_VERSION,
            recommendations: onboarding_recommendations(),
        }
    }
}

pub fn onboarding_recommendations() -> Vec<String> {
    [
        "まずは最近の投稿を3件以上登録して、反応の傾向をつかみましょう",
        "投稿ごとに「良かった」「改善したい」をフィードバックとして記録しましょう",
        "アドバイスを試したらアクションとして記録すると、効果を学習できます",
    ]
    .iter()
    .map(|line| line.to_string())
    .collect()
}

/// How well the accumulated data can ground advice, in [0, 1].
///
/// Blends category coverage, volume of scored posts, positive feedback share
/// and action adoption.
pub fn rag_hit_rate(signals: &[PostLearningSignal], stats: &InteractionStats) -> f64 {
    if signals.is_empty() {
        return 0.0;
    }
    let categories = signals
        .iter()
        .map(|signal| signal.category)
        .collect::<HashSet<PostCategory>>()
        .len() as f64;
    let coverage = (categories / RAG_CATEGORY_TARGET).min(1.0);
    let volume = (signals.len() as f64 / RAG_SIGNAL_TARGET).min(1.0);
    let score = 0.3 * coverage + 0.3 * volume + 0.2 * stats.positive_rate + 0.2 * stats.adoption_rate;
    round2(clamp01(score))
}

/// Short deterministic advice lines derived from the built context.
pub fn recommendations(
    signals: &[PostLearningSignal],
    tag_counts: &TagCounts,
    stats: &InteractionStats,
    top_hashtags: &[HashtagWeight],
    feedback_streak_weeks: u32,
) -> Vec<String> {
    let mut lines = Vec::new();

    let best_gold = signals
        .iter()
        .filter(|signal| signal.tag == Tag::Gold)
        .max_by(|a, b| a.kpi_score.total_cmp(&b.kpi_score));
    if let Some(gold) = best_gold {
        let title = if gold.title.trim().is_empty() {
            gold.post_id.as_str()
        } else {
            gold.title.trim()
        };
        lines.push(format!("「{}」の構成は再現性が高いので、次の投稿でも活かしましょう", title));
    }
    if tag_counts.red > 0 {
        lines.push(format!(
            "改善余地のある投稿が{}件あります。タイトルとハッシュタグを見直しましょう",
            tag_counts.red
        ));
    }
    if !top_hashtags.is_empty() {
        let listed: Vec<String> = top_hashtags
            .iter()
            .take(3)
            .map(|entry| format!("#{}", entry.tag))
            .collect();
        lines.push(format!("反応につながりやすいハッシュタグ: {}", listed.join(" ")));
    }
    if stats.feedback_count < FEEDBACK_HABIT_TARGET {
        lines.push("投稿ごとにフィードバックを記録すると分析の精度が上がります".to_string());
    } else if feedback_streak_weeks == 0 {
        lines.push("今週のふりかえりがまだです。最新の投稿を振り返りましょう".to_string());
    }
    if stats.action_count > 0 && stats.adoption_rate < 0.5 {
        lines.push(format!(
            "提案の実行率は{}%です。まずは1つ試してみましょう",
            (stats.adoption_rate * 100.0).round() as u32
        ));
    }

    lines.truncate(RECOMMENDATION_LIMIT);
    lines
}

fn ratio(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(part / total)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn phase_thresholds() {
        assert_eq!(LearningPhase::from_interactions(0), LearningPhase::Initial);
        assert_eq!(LearningPhase::from_interactions(3), LearningPhase::Initial);
        assert_eq!(LearningPhase::from_interactions(4), LearningPhase::Learning);
        assert_eq!(LearningPhase::from_interactions(8), LearningPhase::Optimized);
        assert_eq!(LearningPhase::from_interactions(11), LearningPhase::Optimized);
        assert_eq!(LearningPhase::from_interactions(12), LearningPhase::Master);
    }

    #[test]
    fn cold_start_round_trips_through_json() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 3, 0, 0).unwrap();
        let context = MasterContext::cold_start("u1", now);
        assert_eq!(context.total_interactions, 0);
        assert_eq!(context.learning_phase, LearningPhase::Initial);
        assert_eq!(context.recommendations.len(), 3);

        let json = serde_json::to_string(&context).unwrap();
        assert!(json.contains("\"learningPhase\":\"initial\""));
        assert!(json.contains("\"generatedAt\":\"2026-10-19T03:00:00Z\""));
        let back: MasterContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, context);
    }

    #[test]
    fn stats_use_weights_for_positive_rate() {
        let feedback = vec![
            FeedbackEvent {
                post_id: Some("p".to_string()),
                sentiment: Sentiment::Positive,
                weight: Some(3.0),
                comment: Some("また見たい".to_string()),
                created_at: None,
            },
            FeedbackEvent {
                post_id: Some("p".to_string()),
                sentiment: Sentiment::Negative,
                weight: None,
                comment: None,
                created_at: None,
            },
        ];
        let actions = vec![
            ActionLogEvent {
                applied: true,
                ..ActionLogEvent::default()
            },
            ActionLogEvent::default(),
        ];
        let stats = InteractionStats::collect(&feedback, &actions);
        assert_eq!(stats.positive_rate, 0.75);
        assert_eq!(stats.commented_feedback_count, 1);
        assert_eq!(stats.adoption_rate, 0.5);
        assert_eq!(stats.total_interactions(), 4);
    }

    #[test]
    fn rag_is_zero_without_signals() {
        let stats = InteractionStats {
            positive_rate: 1.0,
            adoption_rate: 1.0,
            ..InteractionStats::default()
        };
        assert_eq!(rag_hit_rate(&[], &stats), 0.0);
    }
}
