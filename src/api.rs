use serde::{Deserialize, Serialize};

use learning_context::records::{is_valid_user_id, MAX_USER_ID_LEN};
use learning_context::{LearningBadge, LearningPhase, MasterContext};

#[derive(Debug, Deserialize, Default)]
pub struct ContextQuery {
    pub force_refresh: Option<bool>,
}

impl ContextQuery {
    pub fn force_refresh(&self) -> bool {
        self.force_refresh.unwrap_or(false)
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBadgesResponse {
    pub user_id: String,
    pub learning_phase: LearningPhase,
    pub badge_catalogue_version: u32,
    pub earned: usize,
    pub badges: Vec<LearningBadge>,
}

impl ApiBadgesResponse {
    pub fn from_context(context: MasterContext) -> Self {
        let earned = context
            .badges
            .iter()
            .filter(|badge| badge.status == learning_context::BadgeStatus::Earned)
            .count();
        Self {
            user_id: context.user_id,
            learning_phase: context.learning_phase,
            badge_catalogue_version: context.badge_catalogue_version,
            earned,
            badges: context.badges,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

pub fn validate_user_id(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("user id is required".to_string());
    }
    if trimmed.len() > MAX_USER_ID_LEN {
        return Err("user id is too long".to_string());
    }
    if !is_valid_user_id(trimmed) {
        return Err("user id may only contain letters, digits, '-' and '_'".to_string());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_ids_are_trimmed_and_checked() {
        assert_eq!(validate_user_id("  demo_1 ").unwrap(), "demo_1");
        assert!(validate_user_id("   ").is_err());
        assert!(validate_user_id(&"u".repeat(MAX_USER_ID_LEN + 1)).is_err());
    }

    #[test]
    fn lookalike_ids_are_rejected() {
        assert!(validate_user_id("a_b").is_ok());
        assert!(validate_user_id("a.b").is_err());
        assert!(validate_user_id("a/b").is_err());
        assert!(validate_user_id("..").is_err());
    }
}
