//! Gamified progress badges.
//!
//! The catalogue is a table of definitions, each a pure function of
//! [`BadgeCounters`] plus a target. Bump [`BADGE_CATALOGUE_VERSION`] whenever a
//! definition's meaning changes.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::records::{ActionLogEvent, FeedbackEvent, PostCategory, Sentiment};
use crate::round2;
use crate::scoring::{PostLearningSignal, Tag};
use crate::timeline::Timeline;

pub const BADGE_CATALOGUE_VERSION: u32 = 1;

/// KPI at which a post counts as a breakthrough for its category.
pub const BREAKTHROUGH_KPI: f64 = 1.3;
/// Mean sentiment at which a category counts as resonating.
pub const RESONANCE_SENTIMENT: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeStatus {
    Earned,
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeShortcut {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningBadge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub current: f64,
    pub target: f64,
    pub progress: f64,
    pub status: BadgeStatus,
    pub condition: Option<String>,
    pub shortcuts: Vec<BadgeShortcut>,
}

/// Aggregate counters the catalogue reads from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BadgeCounters {
    pub scored_post_count: u32,
    pub gold_count: u32,
    pub feedback_count: u32,
    pub positive_feedback_weight: f64,
    pub negative_feedback_weight: f64,
    pub commented_feedback_count: u32,
    pub action_count: u32,
    pub applied_action_count: u32,
    pub adoption_rate: f64,
    pub feedback_streak_weeks: u32,
    pub action_streak_weeks: u32,
    pub cluster_breakthrough_count: u32,
    pub completed_experiment_count: u32,
    pub audience_resonance_segment_count: u32,
    pub rag_hit_rate: f64,
}

impl BadgeCounters {
    pub fn collect(
        signals: &[PostLearningSignal],
        feedback: &[FeedbackEvent],
        actions: &[ActionLogEvent],
        timeline: &Timeline,
        rag_hit_rate: f64,
    ) -> Self {
        let mut positive_feedback_weight = 0.0;
        let mut negative_feedback_weight = 0.0;
        let mut commented_feedback_count = 0;
        for event in feedback {
            match event.sentiment {
                Sentiment::Positive => positive_feedback_weight += event.effective_weight(),
                Sentiment::Negative => negative_feedback_weight += event.effective_weight(),
                Sentiment::Neutral => {}
            }
            if event.has_comment() {
                commented_feedback_count += 1;
            }
        }

        let applied_action_count = actions.iter().filter(|action| action.applied).count() as u32;
        let action_count = actions.len() as u32;
        let adoption_rate = if action_count > 0 {
            round2(applied_action_count as f64 / action_count as f64)
        } else {
            0.0
        };

        Self {
            scored_post_count: signals.len() as u32,
            gold_count: signals.iter().filter(|signal| signal.tag == Tag::Gold).count() as u32,
            feedback_count: feedback.len() as u32,
            positive_feedback_weight,
            negative_feedback_weight,
            commented_feedback_count,
            action_count,
            applied_action_count,
            adoption_rate,
            feedback_streak_weeks: timeline.feedback_streak_weeks,
            action_streak_weeks: timeline.action_streak_weeks,
            cluster_breakthrough_count: cluster_breakthroughs(signals),
            completed_experiment_count: actions
                .iter()
                .filter(|action| action.is_completed_experiment())
                .count() as u32,
            audience_resonance_segment_count: resonance_segments(signals),
            rag_hit_rate,
        }
    }
}

/// Categories with at least one post at or above [`BREAKTHROUGH_KPI`].
pub fn cluster_breakthroughs(signals: &[PostLearningSignal]) -> u32 {
    signals
        .iter()
        .filter(|signal| signal.kpi_score >= BREAKTHROUGH_KPI)
        .map(|signal| signal.category)
        .collect::<HashSet<PostCategory>>()
        .len() as u32
}

/// Categories whose mean sentiment reaches [`RESONANCE_SENTIMENT`].
pub fn resonance_segments(signals: &[PostLearningSignal]) -> u32 {
    PostCategory::all()
        .into_iter()
        .filter(|category| {
            let scores: Vec<f64> = signals
                .iter()
                .filter(|signal| signal.category == *category)
                .map(|signal| signal.sentiment_score)
                .collect();
            !scores.is_empty()
                && scores.iter().sum::<f64>() / scores.len() as f64 >= RESONANCE_SENTIMENT
        })
        .count() as u32
}

/// Minimum evidence a badge needs before it can be earned.
#[derive(Clone, Copy)]
pub struct SampleRequirement {
    pub measure: fn(&BadgeCounters) -> f64,
    pub minimum: f64,
}

#[derive(Clone)]
pub struct BadgeDefinition {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub target: f64,
    pub evaluate: fn(&BadgeCounters) -> f64,
    pub sample: Option<SampleRequirement>,
    pub condition: Option<&'static str>,
    pub shortcuts: &'static [(&'static str, &'static str)],
}

impl BadgeDefinition {
    pub fn evaluate(&self, counters: &BadgeCounters) -> LearningBadge {
        let current = (self.evaluate)(counters);
        let progress = progress(current, self.target);
        let sample_met = self
            .sample
            .map(|sample| (sample.measure)(counters) >= sample.minimum)
            .unwrap_or(true);
        let status = if current >= self.target && sample_met {
            BadgeStatus::Earned
        } else {
            BadgeStatus::InProgress
        };

        LearningBadge {
            id: self.id.to_string(),
            title: self.title.to_string(),
            description: self.description.to_string(),
            current: round2(current),
            target: self.target,
            progress,
            status,
            condition: self.condition.map(str::to_string),
            shortcuts: self
                .shortcuts
                .iter()
                .map(|(label, href)| BadgeShortcut {
                    label: label.to_string(),
                    href: href.to_string(),
                })
                .collect(),
        }
    }
}

/// `min(1, current / target)`, never negative.
pub fn progress(current: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 1.0;
    }
    if !current.is_finite() || current <= 0.0 {
        return 0.0;
    }
    (current / target).min(1.0)
}

const FEEDBACK_LINK: (&str, &str) = ("フィードバックを記録", "/feedback");
const ACTION_LINK: (&str, &str) = ("アクションを記録", "/actions");
const ANALYTICS_LINK: (&str, &str) = ("投稿分析を見る", "/analytics");
const PLAN_LINK: (&str, &str) = ("投稿プランを作る", "/plans");

pub fn catalogue() -> Vec<BadgeDefinition> {
    vec![
        BadgeDefinition {
            id: "first_gold",
            title: "はじめてのゴールド",
            description: "再現性の高い成功パターンが見つかりました",
            target: 1.0,
            evaluate: |c| c.gold_count as f64,
            sample: None,
            condition: Some("goldに分類される投稿を1件つくる"),
            shortcuts: &[ANALYTICS_LINK],
        },
        BadgeDefinition {
            id: "gold_collector",
            title: "ゴールドコレクター",
            description: "成功パターンを安定して生み出しています",
            target: 5.0,
            evaluate: |c| c.gold_count as f64,
            sample: None,
            condition: Some("goldに分類される投稿を5件つくる"),
            shortcuts: &[ANALYTICS_LINK, PLAN_LINK],
        },
        BadgeDefinition {
            id: "feedback_starter",
            title: "ふりかえりスターター",
            description: "投稿へのフィードバックを記録し始めました",
            target: 5.0,
            evaluate: |c| c.feedback_count as f64,
            sample: None,
            condition: Some("フィードバックを5件記録する"),
            shortcuts: &[FEEDBACK_LINK],
        },
        BadgeDefinition {
            id: "feedback_veteran",
            title: "ふりかえりベテラン",
            description: "継続的なフィードバックで学習が深まっています",
            target: 30.0,
            evaluate: |c| c.feedback_count as f64,
            sample: None,
            condition: Some("フィードバックを30件記録する"),
            shortcuts: &[FEEDBACK_LINK],
        },
        BadgeDefinition {
            id: "balanced_reviewer",
            title: "バランスレビュアー",
            description: "良かった点と改善点の両方を振り返っています",
            target: 3.0,
            evaluate: |c| c.positive_feedback_weight.min(c.negative_feedback_weight),
            sample: None,
            condition: Some("ポジティブとネガティブのフィードバックをそれぞれ3件分以上記録する"),
            shortcuts: &[FEEDBACK_LINK],
        },
        BadgeDefinition {
            id: "commentator",
            title: "コメントマスター",
            description: "具体的なコメント付きで振り返っています",
            target: 10.0,
            evaluate: |c| c.commented_feedback_count as f64,
            sample: None,
            condition: Some("コメント付きのフィードバックを10件記録する"),
            shortcuts: &[FEEDBACK_LINK],
        },
        BadgeDefinition {
            id: "action_taker",
            title: "アクションテイカー",
            description: "アドバイスを実際の投稿に活かしています",
            target: 10.0,
            evaluate: |c| c.applied_action_count as f64,
            sample: None,
            condition: Some("アドバイスを10件実行する"),
            shortcuts: &[ACTION_LINK],
        },
        BadgeDefinition {
            id: "adoption_pro",
            title: "実行率プロ",
            description: "提案の多くを実行に移しています",
            target: 0.6,
            evaluate: |c| c.adoption_rate,
            sample: Some(SampleRequirement {
                measure: |c| c.action_count as f64,
                minimum: 5.0,
            }),
            condition: Some("アクションを5件以上記録し、実行率60%以上を達成する"),
            shortcuts: &[ACTION_LINK],
        },
        BadgeDefinition {
            id: "weekly_streak",
            title: "継続は力なり",
            description: "毎週フィードバックを続けています",
            target: 4.0,
            evaluate: |c| c.feedback_streak_weeks as f64,
            sample: None,
            condition: Some("4週連続でフィードバックを記録する"),
            shortcuts: &[FEEDBACK_LINK],
        },
        BadgeDefinition {
            id: "action_streak",
            title: "改善の習慣",
            description: "毎週なにかしらの改善を実行しています",
            target: 4.0,
            evaluate: |c| c.action_streak_weeks as f64,
            sample: None,
            condition: Some("4週連続でアクションを記録する"),
            shortcuts: &[ACTION_LINK],
        },
        BadgeDefinition {
            id: "cluster_breakthrough",
            title: "ブレイクスルー",
            description: "複数の投稿形式で平均を大きく超える成果を出しました",
            target: 2.0,
            evaluate: |c| c.cluster_breakthrough_count as f64,
            sample: None,
            condition: Some("2つ以上の投稿形式でKPIスコア1.3以上の投稿をつくる"),
            shortcuts: &[ANALYTICS_LINK],
        },
        BadgeDefinition {
            id: "experimenter",
            title: "実験家",
            description: "仮説を立てて検証を完了しています",
            target: 3.0,
            evaluate: |c| c.completed_experiment_count as f64,
            sample: None,
            condition: Some("結果まで記録した実験を3件完了する"),
            shortcuts: &[ACTION_LINK, PLAN_LINK],
        },
        BadgeDefinition {
            id: "audience_resonance",
            title: "オーディエンス共鳴",
            description: "すべての投稿形式でフォロワーの好反応を得ています",
            target: 3.0,
            evaluate: |c| c.audience_resonance_segment_count as f64,
            sample: None,
            condition: Some("フィード・リール・ストーリーズすべてで好評価を得る"),
            shortcuts: &[ANALYTICS_LINK],
        },
        BadgeDefinition {
            id: "rag_confidence",
            title: "学習コンテキスト充実",
            description: "アドバイスの根拠となるデータが十分に集まりました",
            target: 0.7,
            evaluate: |c| c.rag_hit_rate,
            sample: Some(SampleRequirement {
                measure: |c| c.scored_post_count as f64,
                minimum: 10.0,
            }),
            condition: Some("10件以上の投稿を分析し、学習スコア0.7以上を達成する"),
            shortcuts: &[ANALYTICS_LINK, FEEDBACK_LINK],
        },
    ]
}

pub fn evaluate_badges(counters: &BadgeCounters) -> Vec<LearningBadge> {
    catalogue()
        .iter()
        .map(|definition| definition.evaluate(counters))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn badge<'a>(badges: &'a [LearningBadge], id: &str) -> &'a LearningBadge {
        badges.iter().find(|badge| badge.id == id).unwrap()
    }

    #[test]
    fn catalogue_has_unique_ids() {
        let ids: HashSet<&str> = catalogue().iter().map(|definition| definition.id).collect();
        assert_eq!(ids.len(), 14);
        assert_eq!(catalogue().len(), 14);
    }

    #[test]
    fn empty_counters_earn_nothing() {
        let badges = evaluate_badges(&BadgeCounters::default());
        assert!(badges.iter().all(|badge| badge.status == BadgeStatus::InProgress));
        assert!(badges.iter().all(|badge| badge.progress == 0.0));
    }

    #[test]
    fn earned_exactly_at_target_and_clamped_above() {
        let counters = BadgeCounters {
            gold_count: 5,
            ..BadgeCounters::default()
        };
        let badges = evaluate_badges(&counters);
        assert_eq!(badge(&badges, "gold_collector").status, BadgeStatus::Earned);
        assert_eq!(badge(&badges, "gold_collector").progress, 1.0);
        assert_eq!(badge(&badges, "first_gold").progress, 1.0);
        assert_eq!(badge(&badges, "first_gold").current, 5.0);

        let counters = BadgeCounters {
            gold_count: 4,
            ..BadgeCounters::default()
        };
        let collector = evaluate_badges(&counters)
            .into_iter()
            .find(|badge| badge.id == "gold_collector")
            .unwrap();
        assert_eq!(collector.status, BadgeStatus::InProgress);
        assert_eq!(collector.progress, 0.8);
    }

    #[test]
    fn adoption_badge_needs_five_actions() {
        let counters = BadgeCounters {
            action_count: 2,
            applied_action_count: 2,
            adoption_rate: 1.0,
            ..BadgeCounters::default()
        };
        let badges = evaluate_badges(&counters);
        let adoption = badge(&badges, "adoption_pro");
        assert_eq!(adoption.progress, 1.0);
        assert_eq!(adoption.status, BadgeStatus::InProgress);

        let counters = BadgeCounters {
            action_count: 5,
            applied_action_count: 3,
            adoption_rate: 0.6,
            ..BadgeCounters::default()
        };
        let badges = evaluate_badges(&counters);
        assert_eq!(badge(&badges, "adoption_pro").status, BadgeStatus::Earned);
    }

    #[test]
    fn rag_badge_needs_ten_posts() {
        let mut counters = BadgeCounters {
            rag_hit_rate: 0.9,
            scored_post_count: 9,
            ..BadgeCounters::default()
        };
        assert_eq!(
            badge(&evaluate_badges(&counters), "rag_confidence").status,
            BadgeStatus::InProgress
        );
        counters.scored_post_count = 10;
        assert_eq!(
            badge(&evaluate_badges(&counters), "rag_confidence").status,
            BadgeStatus::Earned
        );
    }

    #[test]
    fn balance_uses_weaker_side() {
        let counters = BadgeCounters {
            positive_feedback_weight: 10.0,
            negative_feedback_weight: 1.5,
            ..BadgeCounters::default()
        };
        let balanced = evaluate_badges(&counters)
            .into_iter()
            .find(|badge| badge.id == "balanced_reviewer")
            .unwrap();
        assert_eq!(balanced.current, 1.5);
        assert_eq!(balanced.progress, 0.5);
    }

    #[test]
    fn progress_helper_edges() {
        assert_eq!(progress(-1.0, 5.0), 0.0);
        assert_eq!(progress(f64::NAN, 5.0), 0.0);
        assert_eq!(progress(50.0, 5.0), 1.0);
        assert_eq!(progress(0.0, 0.0), 1.0);
    }

    #[test]
    fn near_miss_never_reports_full_progress() {
        let counters = BadgeCounters {
            positive_feedback_weight: 4.0,
            negative_feedback_weight: 2.996,
            ..BadgeCounters::default()
        };
        let badges = evaluate_badges(&counters);
        let balanced = badge(&badges, "balanced_reviewer");
        assert_eq!(balanced.status, BadgeStatus::InProgress);
        assert!(balanced.progress < 1.0);
    }
}
