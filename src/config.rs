// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::{DEFAULT_CONTENT_RECENCY_WINDOW_DAYS, DEFAULT_RETENTION_DAYS};
use crate::ingest::IngestCfg;
use crate::orchestrator::OrchestratorCfg;
use crate::publish::formatter::{DEFAULT_FOOTER, DEFAULT_MAX_LENGTH};
use crate::publish::PostFormatter;
use crate::rate_gate::{RateGate, DEFAULT_DAILY_POST_CAP, DEFAULT_MIN_INTERVAL_MINUTES};
use crate::scheduler::SchedulerCfg;

pub const ENV_CONFIG_PATH: &str = "BOT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/bot.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    pub min_interval_minutes: i64,
    pub daily_post_cap: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            min_interval_minutes: DEFAULT_MIN_INTERVAL_MINUTES,
            daily_post_cap: DEFAULT_DAILY_POST_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub db_path: PathBuf,
    pub retention_days: i64,
    pub content_recency_window_days: i64,
}

impl Default for DedupSettings {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/posted.db"),
            retention_days: DEFAULT_RETENTION_DAYS,
            content_recency_window_days: DEFAULT_CONTENT_RECENCY_WINDOW_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub interval_minutes: u64,
    pub max_items: usize,
    pub max_age_hours: i64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            max_items: 10,
            max_age_hours: 24,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    pub timeout_secs: u64,
    /// No webhook ⇒ console (dry-run) publisher.
    pub webhook_url: Option<String>,
    pub hashtags: Vec<String>,
    pub footer: String,
    pub max_length: usize,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            webhook_url: None,
            hashtags: PostFormatter::default().hashtags,
            footer: DEFAULT_FOOTER.to_string(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSettings {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub rate_limits: RateLimits,
    pub dedup: DedupSettings,
    pub schedule: ScheduleSettings,
    pub publish: PublishSettings,
    pub feeds: Vec<FeedSettings>,
}

impl BotConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(s).context("parsing bot config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.schedule.interval_minutes == 0 {
            bail!("schedule.interval_minutes must be > 0");
        }
        if self.publish.timeout_secs == 0 {
            bail!("publish.timeout_secs must be > 0");
        }
        if self.publish.max_length == 0 {
            bail!("publish.max_length must be > 0");
        }
        for f in &self.feeds {
            if f.url.trim().is_empty() {
                bail!("feed `{}` has an empty url", f.name);
            }
        }
        Ok(())
    }

    /// Environment wins over the file for the knobs deployments tune most.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("MIN_INTERVAL_MINUTES") {
            self.rate_limits.min_interval_minutes = v;
        }
        if let Some(v) = env_parse("DAILY_POST_CAP") {
            self.rate_limits.daily_post_cap = v;
        }
        if let Ok(p) = std::env::var("DEDUP_DB_PATH") {
            if !p.trim().is_empty() {
                self.dedup.db_path = PathBuf::from(p);
            }
        }
        if let Ok(u) = std::env::var("PUBLISH_WEBHOOK_URL") {
            if !u.trim().is_empty() {
                self.publish.webhook_url = Some(u);
            }
        }
    }

    pub fn rate_gate(&self) -> RateGate {
        RateGate::new(
            self.rate_limits.min_interval_minutes,
            self.rate_limits.daily_post_cap,
        )
    }

    pub fn formatter(&self) -> PostFormatter {
        PostFormatter {
            max_length: self.publish.max_length,
            footer: self.publish.footer.clone(),
            hashtags: self.publish.hashtags.clone(),
        }
    }

    pub fn orchestrator_cfg(&self) -> OrchestratorCfg {
        OrchestratorCfg {
            publish_timeout: Duration::from_secs(self.publish.timeout_secs),
            retention_days: self.dedup.retention_days,
        }
    }

    pub fn scheduler_cfg(&self) -> SchedulerCfg {
        SchedulerCfg {
            interval: Duration::from_secs(self.schedule.interval_minutes.saturating_mul(60)),
            ingest: IngestCfg {
                max_age_hours: self.schedule.max_age_hours,
                max_items: self.schedule.max_items,
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Load config from an explicit TOML path.
pub fn load_from(path: &Path) -> Result<BotConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading bot config from {}", path.display()))?;
    BotConfig::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $BOT_CONFIG_PATH (must exist)
/// 2) config/bot.toml
/// 3) built-in defaults
pub fn load_default() -> Result<BotConfig> {
    let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        load_from(&pb)?
    } else {
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            load_from(&default_p)?
        } else {
            tracing::info!("no config file found, using defaults");
            BotConfig::default()
        }
    };
    cfg.apply_env_overrides();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = BotConfig::from_toml_str(
            r#"
[rate_limits]
daily_post_cap = 12

[[feeds]]
name = "NTV Spor"
url = "https://www.ntvspor.net/rss"
"#,
        )
        .unwrap();
        assert_eq!(cfg.rate_limits.daily_post_cap, 12);
        assert_eq!(cfg.rate_limits.min_interval_minutes, 10);
        assert_eq!(cfg.dedup.retention_days, 30);
        assert_eq!(cfg.dedup.content_recency_window_days, 7);
        assert_eq!(cfg.feeds.len(), 1);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = BotConfig::from_toml_str("[schedule]\ninterval_minutes = 0\n").unwrap_err();
        assert!(err.to_string().contains("interval_minutes"));
    }

    #[test]
    fn derived_cfgs_follow_settings() {
        let mut cfg = BotConfig::default();
        cfg.schedule.interval_minutes = 15;
        cfg.publish.timeout_secs = 5;
        assert_eq!(cfg.scheduler_cfg().interval, Duration::from_secs(900));
        assert_eq!(cfg.orchestrator_cfg().publish_timeout, Duration::from_secs(5));
        assert_eq!(cfg.rate_gate().daily_post_cap(), 30);
        assert_eq!(cfg.rate_gate().min_interval(), chrono::Duration::minutes(10));
    }

    #[test]
    fn huge_interval_saturates() {
        let cfg = BotConfig::from_toml_str(&format!(
            "[schedule]\ninterval_minutes = {}\n",
            i64::MAX
        ))
        .unwrap();
        assert_eq!(cfg.scheduler_cfg().interval, Duration::from_secs(u64::MAX));
    }
}
