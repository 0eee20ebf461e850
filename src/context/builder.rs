use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::badges::{evaluate_badges, BadgeCounters, BADGE_CATALOGUE_VERSION};
use crate::cache::{CacheStore, ContextCache, FileCacheStore};
use crate::config::LearningConfig;
use crate::context::master::{
    rag_hit_rate, recommendations, InteractionStats, LearningPhase, MasterContext, TagCounts,
};
use crate::error::SourceError;
use crate::llm::ChatSummarizer;
use crate::patterns::{DisabledSummarizer, NarrativeSummarizer, PatternSummarizer};
use crate::records::{
    dedupe_posts, ActionLogEvent, FeedbackEvent, JsonRecordSource, PostRecord, RecordSource,
};
use crate::scoring::{aggregate_feedback, baseline, HashtagRanker, PerformanceScorer};
use crate::timeline::TimelineAggregator;

type FlightMap = Mutex<HashMap<String, Arc<Mutex<()>>>>;

struct RawRecords {
    posts: Vec<PostRecord>,
    feedback: Vec<FeedbackEvent>,
    actions: Vec<ActionLogEvent>,
}

impl RawRecords {
    fn is_empty(&self) -> bool {
        self.posts.is_empty() && self.feedback.is_empty() && self.actions.is_empty()
    }
}

/// Builds, caches and serves [`MasterContext`]s.
///
/// `build` never fails. Source failures become a cold-start context, summary
/// failures become local fallbacks and cache failures become misses.
pub struct ContextBuilder {
    source: Arc<dyn RecordSource>,
    summarizer: PatternSummarizer,
    cache: ContextCache,
    timeline: TimelineAggregator,
    ranker: HashtagRanker,
    flights: Option<FlightMap>,
}

impl ContextBuilder {
    pub fn new(
        source: Arc<dyn RecordSource>,
        summarizer: Arc<dyn NarrativeSummarizer>,
        store: Arc<dyn CacheStore>,
        config: &LearningConfig,
    ) -> Self {
        let ranker = HashtagRanker::new(config.hashtags.clone());
        Self {
            source,
            summarizer: PatternSummarizer::from_config(summarizer, ranker.clone(), &config.summarizer),
            cache: ContextCache::from_config(store, &config.cache),
            timeline: TimelineAggregator::new(&config.timeline),
            ranker,
            flights: config.cache.single_flight.then(|| Mutex::new(HashMap::new())),
        }
    }

    /// Wires the JSON record source, the file cache and, when `LLM_API_KEY`
    /// is set, the chat summarizer.
    pub fn from_config(config: &LearningConfig) -> Self {
        let source = Arc::new(JsonRecordSource::from_config(&config.source));
        let store = Arc::new(FileCacheStore::from_config(&config.cache));
        let summarizer: Arc<dyn NarrativeSummarizer> = match ChatSummarizer::from_env(&config.summarizer) {
            Some(client) => {
                info!(model = client.model(), "pattern summaries use chat model");
                Arc::new(client)
            }
            None => {
                info!("LLM_API_KEY not set; pattern summaries use local templates");
                Arc::new(DisabledSummarizer)
            }
        };
        Self::new(source, summarizer, store, config)
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.flights = enabled.then(|| Mutex::new(HashMap::new()));
        self
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    pub async fn build(&self, user_id: &str, force_refresh: bool) -> MasterContext {
        self.build_at(user_id, force_refresh, Utc::now()).await
    }

    /// [`build`](Self::build) with an explicit clock.
    pub async fn build_at(
        &self,
        user_id: &str,
        force_refresh: bool,
        now: DateTime<Utc>,
    ) -> MasterContext {
        if let Some(context) = self.cache.read(user_id, now, force_refresh).await {
            info!(user_id, "context served from cache");
            return context;
        }

        let Some(flights) = self.flights.as_ref() else {
            return self.rebuild(user_id, now).await;
        };

        let flight = {
            let mut map = flights.lock().await;
            map.entry(user_id.to_string()).or_default().clone()
        };
        let (guard, waited) = match flight.clone().try_lock_owned() {
            Ok(guard) => (guard, false),
            Err(_) => {
                debug!(user_id, "waiting for in-flight build");
                (flight.clone().lock_owned().await, true)
            }
        };

        let reused = if waited && !force_refresh {
            self.cache.read(user_id, now, false).await
        } else {
            None
        };
        let context = match reused {
            Some(context) => {
                info!(user_id, "context reused from concurrent build");
                context
            }
            None => self.rebuild(user_id, now).await,
        };

        drop(guard);
        drop(flight);
        let mut map = flights.lock().await;
        if map.get(user_id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            map.remove(user_id);
        }
        context
    }

    async fn rebuild(&self, user_id: &str, now: DateTime<Utc>) -> MasterContext {
        let raw = match self.fetch(user_id).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(user_id, error = %err, "record source failed; returning cold start context");
                return MasterContext::cold_start(user_id, now);
            }
        };
        if raw.is_empty() {
            info!(user_id, "no records yet; returning cold start context");
            return MasterContext::cold_start(user_id, now);
        }

        let context = self.assemble(user_id, raw, now).await;
        self.cache.write(user_id, &context, now).await;
        info!(
            user_id,
            signals = context.signals.len(),
            phase = context.learning_phase.label(),
            "context built"
        );
        context
    }

    async fn fetch(&self, user_id: &str) -> Result<RawRecords, SourceError> {
        let (posts, feedback, actions) = tokio::try_join!(
            self.source.fetch_post_records(user_id),
            self.source.fetch_feedback_events(user_id),
            self.source.fetch_action_log_events(user_id),
        )?;
        debug!(
            user_id,
            posts = posts.len(),
            feedback = feedback.len(),
            actions = actions.len(),
            "records fetched"
        );
        Ok(RawRecords {
            posts,
            feedback,
            actions,
        })
    }

    async fn assemble(&self, user_id: &str, raw: RawRecords, now: DateTime<Utc>) -> MasterContext {
        let RawRecords {
            posts,
            feedback,
            actions,
        } = raw;

        let fetched = posts.len();
        let posts: Vec<PostRecord> = posts
            .into_iter()
            .filter(|post| !post.id.trim().is_empty())
            .collect();
        if posts.len() < fetched {
            warn!(user_id, skipped = fetched - posts.len(), "skipped posts without an id");
        }
        let posts = dedupe_posts(posts);

        let baseline = baseline(&posts);
        let aggregates = aggregate_feedback(&feedback);
        let signals = PerformanceScorer::new(&posts, baseline).score_all(&posts, &aggregates);
        let top_hashtags = self.ranker.top(&signals);
        debug!(user_id, signals = signals.len(), "posts scored");

        let pattern_summaries = self.summarizer.summarize_all(&signals).await;
        let timeline = self.timeline.aggregate(&feedback, &actions, now);

        let stats = InteractionStats::collect(&feedback, &actions);
        let tag_counts = TagCounts::from_signals(&signals);
        let rag_hit_rate = rag_hit_rate(&signals, &stats);
        let counters = BadgeCounters::collect(&signals, &feedback, &actions, &timeline, rag_hit_rate);
        let badges = evaluate_badges(&counters);
        let total_interactions = stats.total_interactions();
        let recommendations = recommendations(
            &signals,
            &tag_counts,
            &stats,
            &top_hashtags,
            timeline.feedback_streak_weeks,
        );

        MasterContext {
            user_id: user_id.to_string(),
            generated_at: now,
            is_cold_start: false,
            learning_phase: LearningPhase::from_interactions(total_interactions),
            total_interactions,
            rag_hit_rate,
            baseline,
            interaction_stats: stats,
            tag_counts,
            signals,
            pattern_summaries,
            top_hashtags,
            feedback_streak_weeks: timeline.feedback_streak_weeks,
            timeline,
            badges,
            badge_catalogue_version: BADGE_CATALOGUE_VERSION,
            recommendations,
        }
    }
}
