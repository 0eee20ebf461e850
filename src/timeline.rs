use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::TimelineConfig;
use crate::records::{ActionLogEvent, FeedbackEvent, Sentiment};
use crate::round2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    pub period_key: String,
    pub label: String,
    pub feedback_count: u32,
    pub positive_rate: f64,
    pub action_count: u32,
    pub applied_action_count: u32,
    pub adoption_rate: f64,
    pub commented_feedback_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub monthly: Vec<TimelinePoint>,
    pub weekly: Vec<TimelinePoint>,
    pub feedback_streak_weeks: u32,
    pub action_streak_weeks: u32,
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    label: String,
    feedback_count: u32,
    feedback_weight: f64,
    positive_weight: f64,
    commented_count: u32,
    action_count: u32,
    applied_count: u32,
}

impl Bucket {
    fn add_feedback(&mut self, event: &FeedbackEvent) {
        let weight = event.effective_weight();
        self.feedback_count += 1;
        self.feedback_weight += weight;
        if event.sentiment == Sentiment::Positive {
            self.positive_weight += weight;
        }
        if event.has_comment() {
            self.commented_count += 1;
        }
    }

    fn add_action(&mut self, event: &ActionLogEvent) {
        self.action_count += 1;
        if event.applied {
            self.applied_count += 1;
        }
    }

    fn into_point(self, period_key: String) -> TimelinePoint {
        TimelinePoint {
            period_key,
            label: self.label,
            feedback_count: self.feedback_count,
            positive_rate: rate(self.positive_weight, self.feedback_weight),
            action_count: self.action_count,
            applied_action_count: self.applied_count,
            adoption_rate: rate(self.applied_count as f64, self.action_count as f64),
            commented_feedback_count: self.commented_count,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimelineAggregator {
    offset: FixedOffset,
    monthly_window: usize,
    weekly_window: usize,
}

impl Default for TimelineAggregator {
    fn default() -> Self {
        Self::new(&TimelineConfig::default())
    }
}

impl TimelineAggregator {
    pub fn new(config: &TimelineConfig) -> Self {
        let offset = config
            .utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix());
        Self {
            offset,
            monthly_window: config.monthly_window,
            weekly_window: config.weekly_window,
        }
    }

    /// Buckets events up to and including the current period. Events dated
    /// after the current month or week are left out of that series.
    pub fn aggregate(
        &self,
        feedback: &[FeedbackEvent],
        actions: &[ActionLogEvent],
        now: DateTime<Utc>,
    ) -> Timeline {
        let today = self.local_date(now);
        let current_month = month_key(today);
        let current_week = week_key(today);

        let mut monthly: BTreeMap<String, Bucket> = BTreeMap::new();
        let mut weekly: BTreeMap<String, Bucket> = BTreeMap::new();

        for event in feedback {
            let Some(at) = event.created_at else { continue };
            let date = self.local_date(at);
            if month_key(date) <= current_month {
                self.month_bucket(&mut monthly, date).add_feedback(event);
            }
            if week_key(date) <= current_week {
                self.week_bucket(&mut weekly, date).add_feedback(event);
            }
        }
        for event in actions {
            let Some(at) = event.created_at else { continue };
            let date = self.local_date(at);
            if month_key(date) <= current_month {
                self.month_bucket(&mut monthly, date).add_action(event);
            }
            if week_key(date) <= current_week {
                self.week_bucket(&mut weekly, date).add_action(event);
            }
        }

        // "Now" is always visible, even with no events in it.
        self.month_bucket(&mut monthly, today);
        self.week_bucket(&mut weekly, today);

        let feedback_streak_weeks =
            self.trailing_streak(&weekly, today, |bucket| bucket.feedback_count > 0);
        let action_streak_weeks =
            self.trailing_streak(&weekly, today, |bucket| bucket.action_count > 0);

        Timeline {
            monthly: finish(monthly, self.monthly_window),
            weekly: finish(weekly, self.weekly_window),
            feedback_streak_weeks,
            action_streak_weeks,
        }
    }

    /// Consecutive calendar weeks ending with the current one, capped at the
    /// weekly window. A week with no bucket breaks the run.
    fn trailing_streak<F>(
        &self,
        weekly: &BTreeMap<String, Bucket>,
        today: NaiveDate,
        active: F,
    ) -> u32
    where
        F: Fn(&Bucket) -> bool,
    {
        let mut streak = 0;
        let mut date = today;
        while streak < self.weekly_window {
            match weekly.get(&week_key(date)) {
                Some(bucket) if active(bucket) => streak += 1,
                _ => break,
            }
            match date.checked_sub_signed(Duration::weeks(1)) {
                Some(previous) => date = previous,
                None => break,
            }
        }
        streak as u32
    }

    fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    fn month_bucket<'a>(
        &self,
        buckets: &'a mut BTreeMap<String, Bucket>,
        date: NaiveDate,
    ) -> &'a mut Bucket {
        buckets.entry(month_key(date)).or_insert_with(|| Bucket {
            label: format!("{}年{}月", date.year(), date.month()),
            ..Bucket::default()
        })
    }

    fn week_bucket<'a>(
        &self,
        buckets: &'a mut BTreeMap<String, Bucket>,
        date: NaiveDate,
    ) -> &'a mut Bucket {
        buckets.entry(week_key(date)).or_insert_with(|| {
            let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
            Bucket {
                label: format!("{}/{}週", monday.month(), monday.day()),
                ..Bucket::default()
            }
        })
    }
}

pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

/// ISO week key, e.g. `2026-W43`. Sorts chronologically as a string.
pub fn week_key(date: NaiveDate) -> String {
    let week = date.iso_week();
    format!("{:04}-W{:02}", week.year(), week.week())
}

fn finish(buckets: BTreeMap<String, Bucket>, window: usize) -> Vec<TimelinePoint> {
    let skip = buckets.len().saturating_sub(window);
    buckets
        .into_iter()
        .skip(skip)
        .map(|(key, bucket)| bucket.into_point(key))
        .collect()
}

fn rate(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(part / total)
    } else {
        0.0
    }
}
