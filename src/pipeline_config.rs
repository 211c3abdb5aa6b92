//! Pipeline configuration: batch limits, inference timeouts, retry policy.
//!
//! Defaults match the hosted service (3 items per batch, 1 item on the free
//! tier). Every value can be overridden through `METATA_*` environment
//! variables via [`PipelineConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Hard ceiling for item parallelism inside one batch.
pub const MAX_CONCURRENCY: usize = 3;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Retry behaviour for the extraction call.
///
/// Only a single retry is ever offered: extraction calls are expensive and a
/// second transport failure in a row is reported to the user instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RetryPolicy {
    /// One attempt, failures surface immediately.
    #[default]
    None,
    /// One extra attempt on a transient transport failure.
    Once { delay_ms: u64 },
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        match self {
            Self::None => 1,
            Self::Once { .. } => 2,
        }
    }

    pub fn delay(&self) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Once { delay_ms } => Duration::from_millis(*delay_ms),
        }
    }
}

/// Runtime configuration for one cataloging pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum number of items in one worklist.
    pub max_batch_items: usize,
    /// Files and URLs are each truncated to this count before merging.
    pub max_items_per_source: usize,
    /// Item cap for the free tier.
    pub free_tier_item_limit: usize,
    /// Timeout handed to every inference call.
    pub inference_timeout_secs: u64,
    pub extraction_retry: RetryPolicy,
    /// Items processed in parallel (1 = strictly sequential).
    pub max_concurrency: usize,
    /// Model-settings key of the classifier ("scout") model.
    pub scout_tier_name: String,
    pub ollama_url: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_batch_items: 3,
            max_items_per_source: 3,
            free_tier_item_limit: 1,
            inference_timeout_secs: 120,
            extraction_retry: RetryPolicy::None,
            max_concurrency: 1,
            scout_tier_name: "scout".to_string(),
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults with `METATA_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are ignored (with a warning) so a typo in the
    /// environment never prevents the pipeline from starting.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        override_parsed(&lookup, "METATA_MAX_BATCH_ITEMS", &mut config.max_batch_items);
        override_parsed(
            &lookup,
            "METATA_MAX_ITEMS_PER_SOURCE",
            &mut config.max_items_per_source,
        );
        override_parsed(
            &lookup,
            "METATA_FREE_TIER_ITEM_LIMIT",
            &mut config.free_tier_item_limit,
        );
        override_parsed(
            &lookup,
            "METATA_INFERENCE_TIMEOUT_SECS",
            &mut config.inference_timeout_secs,
        );
        override_parsed(&lookup, "METATA_MAX_CONCURRENCY", &mut config.max_concurrency);

        if let Some(value) = lookup("METATA_EXTRACTION_RETRY") {
            match parse_retry(&value) {
                Some(policy) => config.extraction_retry = policy,
                None => tracing::warn!(
                    key = "METATA_EXTRACTION_RETRY",
                    value = %value,
                    "Ignoring invalid retry policy"
                ),
            }
        }
        if let Some(value) = lookup("METATA_SCOUT_TIER") {
            if !value.trim().is_empty() {
                config.scout_tier_name = value.trim().to_string();
            }
        }
        if let Some(value) = lookup("METATA_OLLAMA_URL") {
            if !value.trim().is_empty() {
                config.ollama_url = value.trim().to_string();
            }
        }

        config
    }

    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }

    /// Concurrency clamped to `1..=MAX_CONCURRENCY`.
    pub fn effective_concurrency(&self) -> usize {
        self.max_concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(key, value = %raw, "Ignoring unparseable config override"),
    }
}

/// Accepts `none`, `once`, or `once:<delay_ms>`.
fn parse_retry(value: &str) -> Option<RetryPolicy> {
    let value = value.trim().to_lowercase();
    match value.as_str() {
        "none" | "off" | "0" => Some(RetryPolicy::None),
        "once" | "1" => Some(RetryPolicy::Once { delay_ms: 500 }),
        other => {
            let delay = other.strip_prefix("once:")?;
            delay
                .parse::<u64>()
                .ok()
                .map(|delay_ms| RetryPolicy::Once { delay_ms })
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
