//! Output names of the generated models and the made/skipped bookkeeping of a run

use crate::Label;
use crate::color_table::{ColorTable, INVALID_NAME, NO_NAME};
use itertools::Itertools;
use log::info;

/// Result of naming a label
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelName {
    /// The model should be generated with this name
    Name(String),
    /// The label has no usable name and unnamed labels are skipped
    Skip,
}

/// Derives deterministic model names from a base name, the label and an optional color table
#[derive(Clone, Debug)]
pub struct ArtifactNamer<'a> {
    base_name: &'a str,
    color_table: Option<&'a ColorTable>,
    skip_unnamed: bool,
}

impl<'a> ArtifactNamer<'a> {
    pub fn new(base_name: &'a str, color_table: Option<&'a ColorTable>, skip_unnamed: bool) -> Self {
        Self {
            base_name,
            color_table,
            skip_unnamed,
        }
    }

    /// Returns the output name of the given label
    ///
    /// With a color table the name is `<base>_<label>_<color name>`, falling back to
    /// `<base>_<label>` if the label has no usable color name. Without a color table it is
    /// `<base>_<label>`. Labels without a usable name are skipped if `skip_unnamed` is set.
    pub fn name(&self, label: Label) -> ModelName {
        let color_name = self
            .color_table
            .and_then(|table| table.color_name(label))
            .filter(|&name| name != INVALID_NAME && name != NO_NAME);

        match (color_name, self.skip_unnamed) {
            (Some(color_name), _) => ModelName::Name(format!(
                "{}_{}_{}",
                self.base_name,
                label,
                sanitize_file_name(color_name)
            )),
            (None, true) => ModelName::Skip,
            (None, false) => ModelName::Name(format!("{}_{}", self.base_name, label)),
        }
    }

    /// The raw color name of the label, if any
    pub fn color_name(&self, label: Label) -> Option<&'a str> {
        self.color_table.and_then(|table| table.color_name(label))
    }
}

/// Replaces every character that is not safe in a file name by an underscore
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// The labels that were turned into models and the ones that were skipped, in processing order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    made_labels: Vec<Label>,
    skipped_labels: Vec<Label>,
}

impl RunSummary {
    pub fn record_made(&mut self, label: Label) {
        self.made_labels.push(label);
    }

    pub fn record_skipped(&mut self, label: Label) {
        self.skipped_labels.push(label);
    }

    pub fn made_labels(&self) -> &[Label] {
        &self.made_labels
    }

    pub fn skipped_labels(&self) -> &[Label] {
        &self.skipped_labels
    }

    /// Logs the made and skipped labels
    pub fn log_report(&self) {
        info!(
            "Made models from labels: {}",
            self.made_labels.iter().join(" ")
        );
        if !self.skipped_labels.is_empty() {
            info!(
                "Skipped making models from labels: {}",
                self.skipped_labels.iter().join(" ")
            );
        }
    }
}
