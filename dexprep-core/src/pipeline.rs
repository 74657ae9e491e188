//! Linear orchestration of the preparation stages.
//!
//! preflight → normalize → reshape → partition → augment → remove leakage
//! (→ update labels). Each stage finishes completely before the next starts,
//! and every completed stage is appended to the run manifest.

use crate::augment::{AugmentReport, augment_train_tree};
use crate::config::PrepConfig;
use crate::error::PrepError;
use crate::labels::{LabelRow, expand_with_variants, read_items, reshape, write_label_table};
use crate::layout::Layout;
use crate::leakage::{LeakageReport, remove_originals};
use crate::manifest::{RunManifest, Stage};
use crate::normalize::{NormalizeReport, normalize_all};
use crate::partition::{PartitionReport, partition};
use crate::preflight::run_preflight;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything a full run produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub items: usize,
    pub label_rows: usize,
    pub normalize: NormalizeReport,
    pub partition: PartitionReport,
    pub augment: AugmentReport,
    pub leakage: LeakageReport,
    pub label_table: Option<PathBuf>,
}

/// A configured preparation pipeline bound to one dataset.
pub struct Pipeline {
    config: PrepConfig,
    layout: Layout,
}

impl Pipeline {
    pub fn new(config: PrepConfig, layout: Layout) -> Self {
        Self { config, layout }
    }

    /// Resolve the dataset layout from the config relative to `cwd`.
    pub fn from_config(config: PrepConfig, cwd: &Path) -> Self {
        let layout = Layout::new(&config.paths, cwd);
        Self::new(config, layout)
    }

    pub fn config(&self) -> &PrepConfig {
        &self.config
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Validate the working context and inputs without touching anything.
    pub fn preflight(&self, cwd: &Path) -> Result<(), PrepError> {
        run_preflight(&self.config.paths, &self.layout, cwd)
    }

    /// Read the wide item table and reshape it to long form.
    pub fn load_label_rows(&self) -> Result<Vec<LabelRow>, PrepError> {
        Ok(reshape(&read_items(self.layout.labels_file())?))
    }

    /// Run every stage in order.
    pub fn run(&self, cwd: &Path) -> Result<RunSummary, PrepError> {
        tracing::info!(root = %self.layout.data_root().display(), "Starting dataset preparation");
        self.preflight(cwd)?;

        let mut manifest = RunManifest::new(self.layout.data_root());
        manifest.record(Stage::Preflight, 0, 0);
        self.save_manifest(&manifest)?;

        let mut summary = RunSummary::default();

        let items = read_items(self.layout.labels_file())?;
        summary.items = items.len();
        summary.normalize = normalize_all(
            &self.layout,
            items.iter().map(|i| i.name.as_str()),
            &self.config.normalize,
        )?;
        manifest.record(Stage::Normalize, items.len(), summary.normalize.converted);
        self.save_manifest(&manifest)?;

        let rows = reshape(&items);
        summary.label_rows = rows.len();
        manifest.record(Stage::Reshape, items.len(), rows.len());
        self.save_manifest(&manifest)?;

        summary.partition = partition(&self.layout, &rows, &self.config.partition)?;
        manifest.record(
            Stage::Partition,
            rows.len(),
            summary.partition.train_copies + summary.partition.test_copies,
        );
        self.save_manifest(&manifest)?;

        summary.augment = augment_train_tree(
            &self.layout,
            &self.config.augment,
            self.config.normalize.jpeg_quality,
        )?;
        manifest.record(Stage::Augment, summary.augment.sources, summary.augment.written);
        self.save_manifest(&manifest)?;

        summary.leakage = remove_originals(&self.layout)?;
        manifest.record(Stage::RemoveLeakage, summary.leakage.removed, 0);
        self.save_manifest(&manifest)?;

        if self.config.labels.update {
            let (path, written) = self.write_expanded_labels(&rows)?;
            manifest.record(Stage::UpdateLabels, rows.len(), written);
            self.save_manifest(&manifest)?;
            summary.label_table = Some(path);
        }

        tracing::info!(
            items = summary.items,
            label_rows = summary.label_rows,
            augmented = summary.augment.written,
            "Dataset preparation finished"
        );
        Ok(summary)
    }

    /// Normalize the sources named in the item table.
    pub fn normalize(&self) -> Result<NormalizeReport, PrepError> {
        let items = read_items(self.layout.labels_file())?;
        let report = normalize_all(
            &self.layout,
            items.iter().map(|i| i.name.as_str()),
            &self.config.normalize,
        )?;
        self.record_standalone(Stage::Normalize, items.len(), report.converted)?;
        Ok(report)
    }

    /// Build and populate the class/split tree.
    pub fn partition(&self) -> Result<PartitionReport, PrepError> {
        let rows = self.load_label_rows()?;
        let report = partition(&self.layout, &rows, &self.config.partition)?;
        self.record_standalone(
            Stage::Partition,
            rows.len(),
            report.train_copies + report.test_copies,
        )?;
        Ok(report)
    }

    /// Augment the training tree.
    pub fn augment(&self) -> Result<AugmentReport, PrepError> {
        let report = augment_train_tree(
            &self.layout,
            &self.config.augment,
            self.config.normalize.jpeg_quality,
        )?;
        self.record_standalone(Stage::Augment, report.sources, report.written)?;
        Ok(report)
    }

    /// Remove originals from the training tree.
    pub fn remove_leakage(&self) -> Result<LeakageReport, PrepError> {
        let report = remove_originals(&self.layout)?;
        self.record_standalone(Stage::RemoveLeakage, report.removed, 0)?;
        Ok(report)
    }

    /// Write the variant-expanded label table, optionally under another file name.
    pub fn update_labels(&self, file_name: Option<&str>) -> Result<PathBuf, PrepError> {
        let rows = self.load_label_rows()?;
        let name = file_name.unwrap_or(&self.config.labels.output_file);
        let path = self.layout.label_output(name);
        let expanded = expand_with_variants(&rows);
        write_label_table(&path, &expanded)?;
        // A label table on its own does not mark the dataset as processed.
        if let Some(mut manifest) = self.manifest()? {
            manifest.record(Stage::UpdateLabels, rows.len(), expanded.len());
            self.save_manifest(&manifest)?;
        }
        Ok(path)
    }

    fn write_expanded_labels(&self, rows: &[LabelRow]) -> Result<(PathBuf, usize), PrepError> {
        let path = self.layout.label_output(&self.config.labels.output_file);
        let expanded = expand_with_variants(rows);
        write_label_table(&path, &expanded)?;
        Ok((path, expanded.len()))
    }

    /// Load the run manifest, if one exists.
    pub fn manifest(&self) -> Result<Option<RunManifest>, PrepError> {
        RunManifest::load(&self.layout.manifest_path())
    }

    fn record_standalone(
        &self,
        stage: Stage,
        items_in: usize,
        items_out: usize,
    ) -> Result<(), PrepError> {
        let mut manifest = self
            .manifest()?
            .unwrap_or_else(|| RunManifest::new(self.layout.data_root()));
        manifest.record(stage, items_in, items_out);
        self.save_manifest(&manifest)
    }

    fn save_manifest(&self, manifest: &RunManifest) -> Result<(), PrepError> {
        manifest.save(&self.layout.manifest_path())
    }
}
