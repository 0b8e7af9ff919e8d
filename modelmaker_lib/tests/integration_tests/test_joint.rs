use super::common::{CountingBackend, EventLog, Observed, block, block_volume};
use modelmaker_lib::pipeline::SkipReason;
use modelmaker_lib::{ExtractionInput, LabelSpec, LabelVolume, PipelineConfig, extract_models};

/// Three touching blocks with the labels 1, 2 and 3
fn three_blocks() -> LabelVolume {
    block_volume(
        [12, 6, 6],
        &[
            block(1, [1, 1, 1], [4, 5, 5]),
            block(2, [4, 1, 1], [7, 5, 5]),
            block(3, [7, 1, 1], [10, 5, 5]),
        ],
    )
}

fn joint_config() -> PipelineConfig {
    PipelineConfig {
        joint_smoothing: true,
        ..Default::default()
    }
}

#[test]
fn joint_smoothing_extracts_and_smooths_once() {
    let volume = three_blocks();
    let backend = CountingBackend::default();
    let mut log = EventLog::default();

    let outcome = extract_models(
        &backend,
        &ExtractionInput {
            volume: &volume,
            labels: LabelSpec::explicit([1, 2, 3]),
            base_name: "Model",
            color_table: None,
        },
        &joint_config(),
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(outcome.summary.made_labels(), &[1, 2, 3]);
    assert_eq!(backend.count("isosurface"), 1);
    assert_eq!(backend.count("smooth"), 1);
    assert_eq!(backend.count("threshold"), 0);
    assert_eq!(backend.count("threshold_mesh"), 3);
    assert_eq!(backend.count("decimate"), 3);
    assert_eq!(backend.count("strip"), 3);

    // The joint stages run before any label is processed
    let calls = backend.calls.lock();
    assert_eq!(&calls[..2], &["isosurface", "smooth"]);
    drop(calls);

    assert_eq!(log.signed_volumes.len(), 3);
    assert!(log.signed_volumes.iter().all(|&v| v > 0.0));
}

#[test]
fn joint_smoothing_applies_the_histogram_gate() {
    let volume = three_blocks();
    let backend = CountingBackend::default();
    let mut log = EventLog::default();

    let outcome = extract_models(
        &backend,
        &ExtractionInput {
            volume: &volume,
            labels: LabelSpec::Range { start: 2, end: 5 },
            base_name: "Model",
            color_table: None,
        },
        &PipelineConfig {
            save_intermediate: true,
            ..joint_config()
        },
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(outcome.summary.made_labels(), &[2, 3]);
    assert_eq!(outcome.summary.skipped_labels(), &[4, 5]);
    assert_eq!(backend.count("threshold_mesh"), 2);

    // Only the decimated mesh exists as an intermediate model of a label
    assert_eq!(
        log.events,
        vec![
            Observed::Intermediate(2, "Model_2-Decimated".to_string()),
            Observed::Produced(2, "Model_2".to_string()),
            Observed::Intermediate(3, "Model_3-Decimated".to_string()),
            Observed::Produced(3, "Model_3".to_string()),
            Observed::Skipped(4, SkipReason::NoVoxels),
            Observed::Skipped(5, SkipReason::NoVoxels),
        ]
    );
}

#[test]
fn joint_smoothing_is_ignored_for_a_single_label() {
    let volume = three_blocks();
    let backend = CountingBackend::default();
    let mut log = EventLog::default();

    let outcome = extract_models(
        &backend,
        &ExtractionInput {
            volume: &volume,
            labels: LabelSpec::explicit([2]),
            base_name: "Model",
            color_table: None,
        },
        &joint_config(),
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(outcome.summary.made_labels(), &[2]);
    assert_eq!(backend.count("threshold"), 1);
    assert_eq!(backend.count("threshold_mesh"), 0);
}

#[test]
fn joint_smoothing_without_iterations_skips_smoothing() {
    let volume = three_blocks();
    let backend = CountingBackend::default();

    extract_models(
        &backend,
        &ExtractionInput {
            volume: &volume,
            labels: LabelSpec::explicit([1, 3]),
            base_name: "Model",
            color_table: None,
        },
        &PipelineConfig {
            smooth_iterations: 0,
            ..joint_config()
        },
        &mut EventLog::default(),
        None,
    )
    .unwrap();

    assert_eq!(backend.count("smooth"), 0);
    assert_eq!(backend.count("threshold_mesh"), 2);
}
