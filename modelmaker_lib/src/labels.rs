//! Resolution of the user's label specification into the ordered sequence of labels to process

use crate::histogram::LabelHistogram;
use crate::{Label, PipelineError};
use log::{debug, info};
use std::ops::RangeInclusive;

/// Sentinel value for an unset start or end label
pub const UNSET_LABEL: Label = -1;

/// The labels a run should turn into models
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LabelSpec {
    /// An explicit set of labels, sorted ascending without duplicates
    Explicit(Vec<Label>),
    /// All labels in the inclusive range `[start, end]`
    Range { start: Label, end: Label },
    /// All positive labels present in the volume, resolved with the histogram
    All,
}

impl LabelSpec {
    /// Creates an explicit label set, sorting and deduplicating the given labels
    pub fn explicit<I: IntoIterator<Item = Label>>(labels: I) -> Self {
        let mut labels = labels.into_iter().collect::<Vec<_>>();
        labels.sort_unstable();
        labels.dedup();
        LabelSpec::Explicit(labels)
    }

    /// Builds the label specification from the raw command line style inputs
    ///
    /// `generate_all` takes precedence over an explicit list, which takes precedence over a range.
    /// Start and end use [`UNSET_LABEL`] if they were not given. The range is only validated if it
    /// is actually used.
    pub fn from_inputs(
        labels: &[Label],
        start: Label,
        end: Label,
        generate_all: bool,
    ) -> Result<Self, PipelineError> {
        if generate_all {
            return Ok(LabelSpec::All);
        }

        let range_given = start != UNSET_LABEL || end != UNSET_LABEL;
        if !labels.is_empty() {
            if range_given {
                info!(
                    "Both a label list and a label range were given, ignoring the range [{}, {}].",
                    start, end
                );
            }
            return Ok(LabelSpec::explicit(labels.iter().copied()));
        }

        match (start != UNSET_LABEL, end != UNSET_LABEL) {
            (true, true) if start < 0 || end < 0 => Err(PipelineError::config(format!(
                "invalid label range [{}, {}], labels have to be non-negative",
                start, end
            ))),
            (true, true) if start > end => Err(PipelineError::config(format!(
                "invalid label range [{}, {}], the start label is larger than the end label",
                start, end
            ))),
            (true, true) => Ok(LabelSpec::Range { start, end }),
            (true, false) | (false, true) => Err(PipelineError::config(
                "a label range needs both a start and an end label",
            )),
            (false, false) => Err(PipelineError::config("no labels specified")),
        }
    }

    /// Returns whether resolving this specification requires a histogram
    pub fn needs_histogram(&self) -> bool {
        matches!(self, LabelSpec::All)
    }

    /// Returns whether the specification selects exactly one label without consulting the volume
    pub fn is_single(&self) -> bool {
        match self {
            LabelSpec::Explicit(labels) => labels.len() == 1,
            LabelSpec::Range { start, end } => start == end,
            LabelSpec::All => false,
        }
    }

    /// Upper bound of the number of models before the histogram is known
    ///
    /// For [`LabelSpec::All`] every positive histogram bin up to `bin_max` could become a model.
    pub fn estimated_num_models(&self, bin_max: Label) -> usize {
        match self {
            LabelSpec::Explicit(labels) => labels.len(),
            LabelSpec::Range { start, end } => (end - start) as usize + 1,
            LabelSpec::All => bin_max.max(1) as usize,
        }
    }
}

/// Whether the run produces one or several models
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ExtractionMode {
    /// Exactly one label was requested, no histogram gate is applied
    Single,
    /// Several labels, empty ones are skipped based on the histogram
    Multi,
}

/// The concrete labels of a run, in processing order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelSelection {
    pub mode: ExtractionMode,
    /// Ascending labels without duplicates
    pub labels: Vec<Label>,
}

impl LabelSelection {
    /// Inclusive range spanned by the selected labels, `None` for an empty selection
    pub fn range(&self) -> Option<RangeInclusive<Label>> {
        Some(*self.labels.first()?..=*self.labels.last()?)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }
}

/// Turns a label specification into the ordered labels to process
///
/// [`LabelSpec::All`] requires the histogram and resolves to the histogram bins between the
/// smallest positive label with voxels and the largest label with voxels. Label 0 and negative
/// labels are never part of such a selection.
pub fn resolve(
    spec: &LabelSpec,
    histogram: Option<&LabelHistogram>,
) -> Result<LabelSelection, PipelineError> {
    let selection = match spec {
        LabelSpec::Explicit(labels) if labels.is_empty() => {
            return Err(PipelineError::config("no labels specified"));
        }
        LabelSpec::Explicit(labels) => {
            let mut labels = labels.clone();
            labels.sort_unstable();
            labels.dedup();
            LabelSelection {
                mode: if labels.len() == 1 {
                    ExtractionMode::Single
                } else {
                    ExtractionMode::Multi
                },
                labels,
            }
        }
        &LabelSpec::Range { start, end } => {
            if start < 0 || end < start {
                return Err(PipelineError::config(format!(
                    "invalid label range [{}, {}]",
                    start, end
                )));
            }
            LabelSelection {
                mode: if end == start {
                    ExtractionMode::Single
                } else {
                    ExtractionMode::Multi
                },
                labels: (start..=end).collect(),
            }
        }
        LabelSpec::All => {
            let histogram = histogram.ok_or_else(|| {
                PipelineError::config("generating all labels requires a label histogram")
            })?;

            let labels = match (histogram.min_positive_label(), histogram.max_label()) {
                (Some(min), Some(max)) if min <= max => histogram.bins_in(min..=max).collect(),
                _ => Vec::new(),
            };

            LabelSelection {
                mode: ExtractionMode::Multi,
                labels,
            }
        }
    };

    debug!(
        "Resolved {:?} to {} label(s) in {:?} mode.",
        spec,
        selection.len(),
        selection.mode
    );

    Ok(selection)
}
