use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::marc::{self, EncodeError};
use crate::pipeline::cataloging::{FailureKind, MetadataMapping};
use crate::pipeline_config::PipelineConfig;

// ═══════════════════════════════════════════
// Tier
// ═══════════════════════════════════════════

/// Account tier of the user submitting a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Paid,
}

impl Tier {
    /// Also the model-settings key of the tier's extraction model.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }

    /// Maximum worklist size for this tier.
    pub fn item_limit(&self, config: &PipelineConfig) -> usize {
        match self {
            Self::Free => config.free_tier_item_limit.min(config.max_batch_items),
            Self::Paid => config.max_batch_items,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════
// Per-item outcome
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Done,
    Rejected,
    Failed,
}

/// Terminal result of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Done {
        metadata: MetadataMapping,
        /// Extra list entries the model returned beyond the first.
        discarded_entries: usize,
    },
    /// The scout judged the image not to be a catalogable item.
    Rejected { reason: String },
    Failed { kind: FailureKind, reason: String },
}

impl ItemOutcome {
    pub fn status(&self) -> ItemStatus {
        match self {
            Self::Done { .. } => ItemStatus::Done,
            Self::Rejected { .. } => ItemStatus::Rejected,
            Self::Failed { .. } => ItemStatus::Failed,
        }
    }
}

/// One entry of a batch report, in worklist order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub index: usize,
    pub item_name: String,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

impl ItemReport {
    pub fn status(&self) -> ItemStatus {
        self.outcome.status()
    }

    /// The extracted mapping of a completed item.
    pub fn metadata(&self) -> Option<&MetadataMapping> {
        match &self.outcome {
            ItemOutcome::Done { metadata, .. } => Some(metadata),
            _ => None,
        }
    }

    /// Failure or rejection message, if any.
    pub fn reason(&self) -> Option<&str> {
        match &self.outcome {
            ItemOutcome::Done { .. } => None,
            ItemOutcome::Rejected { reason } | ItemOutcome::Failed { reason, .. } => Some(reason),
        }
    }
}

// ═══════════════════════════════════════════
// Batch report
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub tier: Tier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub items: Vec<ItemReport>,
}

impl BatchReport {
    pub fn empty(tier: Tier, requested_by: Option<String>) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            tier,
            requested_by,
            started_at: Utc::now(),
            duration_ms: 0,
            items: Vec::new(),
        }
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status() == status).count()
    }

    pub fn done_count(&self) -> usize {
        self.count(ItemStatus::Done)
    }

    pub fn rejected_count(&self) -> usize {
        self.count(ItemStatus::Rejected)
    }

    pub fn failed_count(&self) -> usize {
        self.count(ItemStatus::Failed)
    }

    /// Mappings of completed items, in worklist order.
    pub fn completed_mappings(&self) -> Vec<&MetadataMapping> {
        self.items.iter().filter_map(ItemReport::metadata).collect()
    }

    /// Encode every completed item as one binary record stream.
    pub fn encode_records(&self) -> Result<Vec<u8>, EncodeError> {
        marc::encode(self.completed_mappings())
    }
}

// ═══════════════════════════════════════════
// Progress events
// ═══════════════════════════════════════════

/// Progress notifications emitted while a batch runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    Started {
        batch_id: Uuid,
        item_count: usize,
    },
    ItemStarted {
        index: usize,
        item_name: String,
    },
    ItemFinished {
        index: usize,
        item_name: String,
        status: ItemStatus,
    },
    Completed {
        done: usize,
        rejected: usize,
        failed: usize,
        duration_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::cataloging::FieldValue;

    fn done(index: usize, title: &str) -> ItemReport {
        let mut metadata = MetadataMapping::new();
        metadata.insert("245", FieldValue::Text(title.into()));
        ItemReport {
            index,
            item_name: format!("item-{index}.jpg"),
            outcome: ItemOutcome::Done {
                metadata,
                discarded_entries: 0,
            },
        }
    }

    #[test]
    fn tier_limits_follow_config() {
        let config = PipelineConfig::default();
        assert_eq!(Tier::Free.item_limit(&config), 1);
        assert_eq!(Tier::Paid.item_limit(&config), 3);
        assert_eq!(Tier::Paid.as_str(), "paid");
    }

    #[test]
    fn free_limit_never_exceeds_batch_limit() {
        let config = PipelineConfig {
            free_tier_item_limit: 10,
            ..PipelineConfig::default()
        };
        assert_eq!(Tier::Free.item_limit(&config), 3);
    }

    #[test]
    fn report_counts_and_mappings() {
        let mut report = BatchReport::empty(Tier::Paid, None);
        report.items = vec![
            done(0, "First"),
            ItemReport {
                index: 1,
                item_name: "selfie.jpg".into(),
                outcome: ItemOutcome::Rejected {
                    reason: "not a library item".into(),
                },
            },
            done(2, "Third"),
        ];
        assert_eq!(report.done_count(), 2);
        assert_eq!(report.rejected_count(), 1);
        assert_eq!(report.failed_count(), 0);
        let titles: Vec<_> = report
            .completed_mappings()
            .iter()
            .filter_map(|m| m.get("245").and_then(FieldValue::as_text))
            .collect();
        assert_eq!(titles, vec!["First", "Third"]);
        assert_eq!(report.items[1].reason(), Some("not a library item"));
    }

    #[test]
    fn item_report_serializes_flat() {
        let report = ItemReport {
            index: 1,
            item_name: "x.png".into(),
            outcome: ItemOutcome::Failed {
                kind: FailureKind::ModelUnavailable,
                reason: "timeout".into(),
            },
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "model_unavailable");
        assert_eq!(json["index"], 1);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = BatchEvent::ItemFinished {
            index: 0,
            item_name: "a.jpg".into(),
            status: ItemStatus::Done,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"ItemFinished\""));
        assert!(json.contains("\"status\":\"done\""));
    }
}
