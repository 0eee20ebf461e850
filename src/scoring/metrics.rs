use serde::{Deserialize, Serialize};

use crate::records::PostRecord;
use crate::round2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineMetrics {
    pub avg_engagement_rate: f64,
    pub avg_reach: f64,
    pub avg_follower_delta: f64,
}

/// Engagement per unit of reach, or the raw engagement sum when reach is
/// unknown so zero-reach posts are not scored as dead.
pub fn engagement_rate(record: &PostRecord) -> f64 {
    let engagement = record.engagement_total();
    if record.reach > 0.0 {
        round2(engagement / record.reach.max(1.0))
    } else {
        engagement
    }
}

pub fn baseline(records: &[PostRecord]) -> BaselineMetrics {
    BaselineMetrics {
        avg_engagement_rate: positive_mean(records.iter().map(engagement_rate)),
        avg_reach: positive_mean(records.iter().map(|record| record.reach)),
        avg_follower_delta: positive_mean(records.iter().map(|record| record.follower_delta)),
    }
}

/// Mean over finite, strictly positive values; 0 when there are none.
pub fn positive_mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let mut total = 0.0;
    let mut count = 0usize;
    for value in values {
        if value.is_finite() && value > 0.0 {
            total += value;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}
