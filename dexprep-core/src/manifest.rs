//! Run manifest: a hash-chained record of completed pipeline stages.
//!
//! The manifest is written next to the dataset after every stage, so its
//! presence is the explicit marker that a dataset has been (at least partly)
//! transformed.

use crate::error::PrepError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// A pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Preflight,
    Normalize,
    Reshape,
    Partition,
    Augment,
    RemoveLeakage,
    UpdateLabels,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Preflight => "preflight",
            Stage::Normalize => "normalize",
            Stage::Reshape => "reshape",
            Stage::Partition => "partition",
            Stage::Augment => "augment",
            Stage::RemoveLeakage => "remove_leakage",
            Stage::UpdateLabels => "update_labels",
        };
        write!(f, "{name}")
    }
}

/// Record of one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: Stage,
    pub completed_at: DateTime<Utc>,
    pub items_in: usize,
    pub items_out: usize,
}

/// Full record of a preparation run over one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub dataset_root: String,
    pub started_at: DateTime<Utc>,
    pub stages: Vec<StageRecord>,
    pub hash_chain: Vec<String>,
}

impl RunManifest {
    pub fn new(dataset_root: &Path) -> Self {
        let dataset_root = dataset_root.display().to_string();
        let initial_hash = compute_hash(&format!("dexprep:{dataset_root}"));
        Self {
            dataset_root,
            started_at: Utc::now(),
            stages: Vec::new(),
            hash_chain: vec![initial_hash],
        }
    }

    /// Append a completed stage and extend the hash chain.
    pub fn record(&mut self, stage: Stage, items_in: usize, items_out: usize) {
        let record = StageRecord {
            stage,
            completed_at: Utc::now(),
            items_in,
            items_out,
        };
        let prev_hash = self.hash_chain.last().cloned().unwrap_or_default();
        self.hash_chain.push(chain_hash(&prev_hash, &record));
        self.stages.push(record);
    }

    pub fn has_stage(&self, stage: Stage) -> bool {
        self.stages.iter().any(|r| r.stage == stage)
    }

    /// Verify the integrity of the hash chain.
    pub fn verify_integrity(&self) -> bool {
        if self.hash_chain.len() != self.stages.len() + 1 {
            return false;
        }
        let expected_initial = compute_hash(&format!("dexprep:{}", self.dataset_root));
        if self.hash_chain[0] != expected_initial {
            return false;
        }
        self.stages
            .iter()
            .enumerate()
            .all(|(i, record)| self.hash_chain[i + 1] == chain_hash(&self.hash_chain[i], record))
    }

    pub fn load(path: &Path) -> Result<Option<Self>, PrepError> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), PrepError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn chain_hash(prev: &str, record: &StageRecord) -> String {
    compute_hash(&format!(
        "{prev}:{}:{}:{}:{}",
        record.stage,
        record.completed_at.to_rfc3339(),
        record.items_in,
        record.items_out
    ))
}

fn compute_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}
