use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{LearningError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub dir: String,
    pub single_flight: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            dir: "data/cache".to_string(),
            single_flight: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub data_dir: String,
    pub post_limit: usize,
    pub feedback_limit: usize,
    pub action_limit: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            data_dir: "data/users".to_string(),
            post_limit: 200,
            feedback_limit: 500,
            action_limit: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    pub timeout_ms: u64,
    pub sample_limit: usize,
    pub api_base: String,
    pub model: String,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 20_000,
            sample_limit: 12,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    pub monthly_window: usize,
    pub weekly_window: usize,
    pub utc_offset_hours: i32,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            monthly_window: 8,
            weekly_window: 12,
            utc_offset_hours: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashtagConfig {
    pub gold_weight: f64,
    pub gray_weight: f64,
    pub red_weight: f64,
    pub neutral_weight: f64,
    pub top_n: usize,
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            gold_weight: 2.0,
            gray_weight: 1.0,
            red_weight: 0.5,
            neutral_weight: 0.3,
            top_n: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LearningConfig {
    pub cache: CacheConfig,
    pub source: SourceConfig,
    pub summarizer: SummarizerConfig,
    pub timeline: TimelineConfig,
    pub hashtags: HashtagConfig,
}

impl LearningConfig {
    pub fn load(path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>)> {
        let config_path = path.or_else(default_config_path);
        let mut config = if let Some(path) = config_path.as_ref() {
            if path.exists() {
                let contents = std::fs::read_to_string(path).map_err(|err| {
                    LearningError::Config(format!("failed to read config: {}", err))
                })?;
                toml::from_str(&contents).map_err(|err| {
                    LearningError::Config(format!("failed to parse config: {}", err))
                })?
            } else {
                LearningConfig::default()
            }
        } else {
            LearningConfig::default()
        };

        config.apply_env_overrides();
        Ok((config, config_path))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                LearningError::Config(format!("failed to create config dir: {}", err))
            })?;
        }
        let payload = toml::to_string_pretty(self)
            .map_err(|err| LearningError::Config(format!("failed to serialize config: {}", err)))?;
        std::fs::write(path, payload)
            .map_err(|err| LearningError::Config(format!("failed to write config: {}", err)))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(ttl) = env::var("CONTEXT_CACHE_TTL_SECONDS") {
            if let Ok(value) = ttl.parse::<u64>() {
                self.cache.ttl_seconds = value;
            }
        }
        if let Ok(dir) = env::var("LEARNING_CACHE_DIR") {
            if !dir.trim().is_empty() {
                self.cache.dir = dir;
            }
        }
        if let Ok(dir) = env::var("LEARNING_DATA_DIR") {
            if !dir.trim().is_empty() {
                self.source.data_dir = dir;
            }
        }
        if let Ok(timeout) = env::var("SUMMARIZER_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.summarizer.timeout_ms = value;
            }
        }
        if let Ok(offset) = env::var("TIMELINE_UTC_OFFSET_HOURS") {
            if let Ok(value) = offset.parse::<i32>() {
                self.timeline.utc_offset_hours = value.clamp(-12, 14);
            }
        }
    }
}

fn default_config_path() -> Option<PathBuf> {
    env::var("LEARNING_CONFIG_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .or_else(|| Some(PathBuf::from("config/learning.toml")))
}
