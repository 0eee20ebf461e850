use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::HashtagConfig;
use crate::round2;
use crate::scoring::signal::{PostLearningSignal, Tag};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashtagWeight {
    pub tag: String,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct HashtagRanker {
    config: HashtagConfig,
}

impl Default for HashtagRanker {
    fn default() -> Self {
        Self::new(HashtagConfig::default())
    }
}

impl HashtagRanker {
    pub fn new(config: HashtagConfig) -> Self {
        Self { config }
    }

    pub fn tag_weight(&self, tag: Tag) -> f64 {
        match tag {
            Tag::Gold => self.config.gold_weight,
            Tag::Gray => self.config.gray_weight,
            Tag::Red => self.config.red_weight,
            Tag::Neutral => self.config.neutral_weight,
        }
    }

    /// Summed weight per normalized hashtag, in first-seen order.
    pub fn weights<'a, I>(&self, signals: I) -> Vec<HashtagWeight>
    where
        I: IntoIterator<Item = &'a PostLearningSignal>,
    {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut weights: Vec<HashtagWeight> = Vec::new();

        for signal in signals {
            let weight = self.tag_weight(signal.tag);
            for raw in &signal.hashtags {
                let Some(tag) = normalize_hashtag(raw) else {
                    continue;
                };
                match index.get(&tag) {
                    Some(&slot) => weights[slot].weight += weight,
                    None => {
                        index.insert(tag.clone(), weights.len());
                        weights.push(HashtagWeight { tag, weight });
                    }
                }
            }
        }

        weights
    }

    /// Top hashtags by summed weight. Ties keep first-seen order.
    pub fn rank<'a, I>(&self, signals: I, limit: usize) -> Vec<HashtagWeight>
    where
        I: IntoIterator<Item = &'a PostLearningSignal>,
    {
        let mut weights = self.weights(signals);
        // sort_by is stable, which is what gives the first-seen tie order.
        weights.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        weights.truncate(limit);
        for entry in weights.iter_mut() {
            entry.weight = round2(entry.weight);
        }
        weights
    }

    pub fn top(&self, signals: &[PostLearningSignal]) -> Vec<HashtagWeight> {
        self.rank(signals, self.config.top_n)
    }
}

pub fn normalize_hashtag(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('#').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{PostCategory, PostRecord};
    use crate::scoring::metrics::BaselineMetrics;
    use crate::scoring::signal::PerformanceScorer;

    fn signal(tag: Tag, hashtags: &[&str]) -> PostLearningSignal {
        let record = PostRecord {
            id: format!("{:?}", hashtags),
            hashtags: hashtags.iter().map(|tag| tag.to_string()).collect(),
            category: PostCategory::Reel,
            ..PostRecord::default()
        };
        let mut signal = PerformanceScorer::new(&[], BaselineMetrics::default()).score(&record, None);
        signal.tag = tag;
        signal
    }

    #[test]
    fn weights_by_owning_tag() {
        let signals = vec![
            signal(Tag::Gold, &["#a", "#b"]),
            signal(Tag::Gray, &["#b", "#c"]),
            signal(Tag::Red, &["#a"]),
        ];
        let ranker = HashtagRanker::default();

        let weights = ranker.weights(&signals);
        let as_map: HashMap<&str, f64> =
            weights.iter().map(|w| (w.tag.as_str(), w.weight)).collect();
        assert_eq!(as_map["a"], 2.5);
        assert_eq!(as_map["b"], 3.0);
        assert_eq!(as_map["c"], 1.0);

        let ranked = ranker.top(&signals);
        let order: Vec<&str> = ranked.iter().map(|w| w.tag.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn normalizes_case_and_skips_empties() {
        let signals = vec![signal(Tag::Neutral, &["#Cafe", "cafe", "  ", "#", "#CAFE "])];
        let ranked = HashtagRanker::default().top(&signals);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].tag, "cafe");
        assert_eq!(ranked[0].weight, 0.9);
    }

    #[test]
    fn ties_keep_first_seen_order_and_limit_applies() {
        let tags: Vec<String> = (0..20).map(|i| format!("#t{}", i)).collect();
        let refs: Vec<&str> = tags.iter().map(String::as_str).collect();
        let signals = vec![signal(Tag::Gray, &refs)];
        let ranked = HashtagRanker::default().top(&signals);
        assert_eq!(ranked.len(), 15);
        assert_eq!(ranked[0].tag, "t0");
        assert_eq!(ranked[14].tag, "t14");
    }
}
