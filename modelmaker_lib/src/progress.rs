//! Progress accounting of an extraction run
//!
//! The total number of steps is computed up front from the run mode and is reported as a fraction
//! after each completed stage. The reported fraction is monotonic and never exceeds 1.0.

use log::trace;
use std::fmt;

/// The stages of an extraction run, used for progress reporting and error messages
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    ReadVolume,
    PadVolume,
    Histogram,
    JointIsosurface,
    JointSmooth,
    Threshold,
    Isosurface,
    Decimate,
    ReverseSense,
    Smooth,
    Transform,
    Normals,
    Strip,
    Write,
    SaveIntermediate,
    SkipLabel,
    Finished,
}

impl Stage {
    /// Human readable name of the stage
    pub fn name(self) -> &'static str {
        match self {
            Stage::ReadVolume => "read volume",
            Stage::PadVolume => "pad volume",
            Stage::Histogram => "label histogram",
            Stage::JointIsosurface => "joint isosurface",
            Stage::JointSmooth => "joint smoothing",
            Stage::Threshold => "threshold",
            Stage::Isosurface => "isosurface",
            Stage::Decimate => "decimation",
            Stage::ReverseSense => "reverse sense",
            Stage::Smooth => "smoothing",
            Stage::Transform => "transform",
            Stage::Normals => "normals",
            Stage::Strip => "triangle strips",
            Stage::Write => "write model",
            Stage::SaveIntermediate => "save intermediate model",
            Stage::SkipLabel => "skip label",
            Stage::Finished => "finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Receives `(stage name, completed fraction)` after every completed stage
pub trait ProgressObserver {
    fn progress(&mut self, stage: &str, fraction: f64);
}

impl<F: FnMut(&str, f64)> ProgressObserver for F {
    fn progress(&mut self, stage: &str, fraction: f64) {
        self(stage, fraction)
    }
}

/// Step counts of a run, depending on its mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ProgressPlan {
    /// Whether several models are generated
    pub multiple: bool,
    /// Whether joint smoothing is used
    pub joint_smoothing: bool,
    /// Whether intermediate models are saved
    pub save_intermediate: bool,
}

impl ProgressPlan {
    /// Steps that are executed once per run (read, pad, histogram and joint isosurface for several models)
    pub fn singleton_steps(&self) -> u64 {
        if self.multiple { 4 } else { 1 }
    }

    /// Steps that are executed once per model, including the intermediate saves
    pub fn steps_per_model(&self) -> u64 {
        // Joint smoothing only applies when several models are generated
        let joint = self.multiple && self.joint_smoothing;
        let repeated = if joint { 7 } else { 9 };
        let intermediate = match (self.save_intermediate, joint) {
            (false, _) => 0,
            (true, true) => 1,
            (true, false) => 3,
        };
        repeated + intermediate
    }

    /// Total number of steps for the given number of models
    pub fn total_steps(&self, num_models: usize) -> u64 {
        self.singleton_steps() + self.steps_per_model() * num_models as u64
    }
}

/// Monotonic progress state of a run
pub struct ProgressTracker<'a> {
    plan: ProgressPlan,
    total_steps: u64,
    completed_steps: u64,
    model_end: Option<u64>,
    last_fraction: f64,
    observer: Option<&'a mut dyn ProgressObserver>,
}

impl<'a> ProgressTracker<'a> {
    /// Creates a tracker for the given plan and estimated number of models
    pub fn new(
        plan: ProgressPlan,
        estimated_num_models: usize,
        observer: Option<&'a mut dyn ProgressObserver>,
    ) -> Self {
        Self {
            plan,
            total_steps: plan.total_steps(estimated_num_models).max(1),
            completed_steps: 0,
            model_end: None,
            last_fraction: 0.0,
            observer,
        }
    }

    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    pub fn completed_steps(&self) -> u64 {
        self.completed_steps
    }

    /// The fraction that was reported last
    pub fn fraction(&self) -> f64 {
        self.last_fraction
    }

    /// Recomputes the total once the actual number of models is known
    ///
    /// The total is never increased and never drops below the steps already completed.
    pub fn set_num_models(&mut self, num_models: usize) {
        let new_total = self
            .plan
            .total_steps(num_models)
            .max(self.completed_steps)
            .max(1);
        if new_total < self.total_steps {
            trace!(
                "Reducing the total number of progress steps from {} to {}.",
                self.total_steps, new_total
            );
            self.total_steps = new_total;
        }
    }

    /// Marks one step as completed
    pub fn complete(&mut self, stage: Stage) {
        let limit = self.model_end.unwrap_or(self.total_steps);
        self.completed_steps = (self.completed_steps + 1).min(limit);
        self.emit(stage);
    }

    /// Marks the singleton steps as completed, including the ones that did not run
    pub fn complete_singleton_steps(&mut self, stage: Stage) {
        let target = self.plan.singleton_steps().min(self.total_steps);
        self.completed_steps = self.completed_steps.max(target);
        self.emit(stage);
    }

    /// Starts the steps of a model that was counted in the total
    pub fn begin_model(&mut self) {
        self.model_end = Some(
            (self.completed_steps + self.plan.steps_per_model()).min(self.total_steps),
        );
    }

    /// Completes all remaining steps of the current model
    pub fn end_model(&mut self, stage: Stage) {
        if let Some(end) = self.model_end.take() {
            self.completed_steps = self.completed_steps.max(end);
            self.emit(stage);
        }
    }

    /// Reports completion of the run
    pub fn finish(&mut self) {
        self.model_end = None;
        self.completed_steps = self.total_steps;
        self.emit(Stage::Finished);
    }

    fn emit(&mut self, stage: Stage) {
        let fraction = (self.completed_steps as f64 / self.total_steps as f64)
            .clamp(self.last_fraction, 1.0);
        self.last_fraction = fraction;

        if let Some(observer) = self.observer.as_mut() {
            observer.progress(stage.name(), fraction);
        }
    }
}
