pub mod builder;
pub mod master;

pub use builder::ContextBuilder;
pub use master::{
    onboarding_recommendations, rag_hit_rate, InteractionStats, LearningPhase, MasterContext,
    TagCounts,
};
