use super::common::{EventLog, block, block_volume};
use all_asserts::assert_range;
use modelmaker_lib::progress::ProgressObserver;
use modelmaker_lib::{
    ExtractionInput, LabelSpec, LabelVolume, NativeBackend, PipelineConfig, extract_models,
};

fn run_with_progress(volume: &LabelVolume, labels: LabelSpec, config: &PipelineConfig) -> Vec<(String, f64)> {
    let mut reports = Vec::new();
    let mut observer = |stage: &str, fraction: f64| reports.push((stage.to_string(), fraction));

    extract_models(
        &NativeBackend,
        &ExtractionInput {
            volume,
            labels,
            base_name: "Model",
            color_table: None,
        },
        config,
        &mut EventLog::default(),
        Some(&mut observer as &mut dyn ProgressObserver),
    )
    .unwrap();

    reports
}

fn assert_monotonic(reports: &[(String, f64)]) {
    assert!(!reports.is_empty());
    for pair in reports.windows(2) {
        assert!(
            pair[0].1 <= pair[1].1,
            "progress decreased from {:?} to {:?}",
            pair[0],
            pair[1]
        );
    }
    for (_, fraction) in reports {
        assert_range!((0.0..=1.0), *fraction);
    }

    let (stage, fraction) = reports.last().unwrap();
    assert_eq!(stage, "finished");
    assert_eq!(*fraction, 1.0);
}

#[test]
fn progress_of_generate_all_is_monotonic() {
    let volume = block_volume(
        [14, 7, 7],
        &[
            block(2, [1, 1, 1], [5, 5, 5]),
            block(6, [8, 2, 2], [12, 6, 6]),
        ],
    );

    for joint_smoothing in [false, true] {
        let config = PipelineConfig {
            joint_smoothing,
            save_intermediate: true,
            ..Default::default()
        };
        let reports = run_with_progress(&volume, LabelSpec::All, &config);
        assert_monotonic(&reports);

        // Well before the end while the first model is written
        let first_write = reports
            .iter()
            .find(|(stage, _)| stage == "write model")
            .unwrap();
        assert_range!((0.0..0.9), first_write.1);
    }
}

#[test]
fn generate_all_total_only_counts_labels_with_voxels() {
    // Labels 2 and 6, the bins 3 to 5 of the histogram are empty
    let volume = block_volume(
        [14, 7, 7],
        &[
            block(2, [1, 1, 1], [5, 5, 5]),
            block(6, [8, 2, 2], [12, 6, 6]),
        ],
    );

    // 4 singleton steps, then 9 steps per model (7 with joint smoothing) for two models
    for (joint_smoothing, expected) in [(false, 13.0 / 22.0), (true, 11.0 / 18.0)] {
        let config = PipelineConfig {
            joint_smoothing,
            ..Default::default()
        };
        let reports = run_with_progress(&volume, LabelSpec::All, &config);
        assert_monotonic(&reports);

        let writes = reports
            .iter()
            .filter(|(stage, _)| stage == "write model")
            .map(|(_, fraction)| *fraction)
            .collect::<Vec<_>>();
        assert_eq!(writes.len(), 2);
        assert!(
            (writes[0] - expected).abs() < 1e-12,
            "first model written at {} instead of {}",
            writes[0],
            expected
        );
        assert_eq!(writes[1], 1.0);
    }
}

#[test]
fn empty_labels_of_a_range_keep_their_share() {
    let volume = block_volume(
        [14, 7, 7],
        &[
            block(2, [1, 1, 1], [5, 5, 5]),
            block(6, [8, 2, 2], [12, 6, 6]),
        ],
    );
    let reports = run_with_progress(
        &volume,
        LabelSpec::Range { start: 2, end: 6 },
        &PipelineConfig::default(),
    );
    assert_monotonic(&reports);

    // 4 + 9 * 5 steps, the first model ends after 13 of them
    let first_write = reports
        .iter()
        .find(|(stage, _)| stage == "write model")
        .unwrap();
    assert!((first_write.1 - 13.0 / 49.0).abs() < 1e-12);
}

#[test]
fn progress_of_single_label_is_monotonic() {
    let volume = block_volume([8, 8, 8], &[block(4, [2, 2, 2], [6, 6, 6])]);
    let reports = run_with_progress(&volume, LabelSpec::explicit([4]), &PipelineConfig::default());
    assert_monotonic(&reports);

    let stages = reports.iter().map(|(s, _)| s.as_str()).collect::<Vec<_>>();
    assert_eq!(stages.first(), Some(&"read volume"));
    assert!(stages.contains(&"triangle strips"));
}
