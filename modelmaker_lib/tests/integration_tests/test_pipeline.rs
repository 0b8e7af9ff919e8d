use super::common::{CountingBackend, EventLog, Observed, block, block_volume};
use modelmaker_lib::color_table::{ColorEntry, ColorTable};
use modelmaker_lib::labels::ExtractionMode;
use modelmaker_lib::nalgebra::{Matrix4, Vector4};
use modelmaker_lib::pipeline::SkipReason;
use modelmaker_lib::{
    CollectingSink, ExtractionEvent, ExtractionInput, ExtractionSink, LabelSpec, LabelVolume,
    NativeBackend, PipelineConfig, PipelineError, SinkError, extract_models,
};

fn two_blocks() -> LabelVolume {
    block_volume(
        [14, 7, 7],
        &[
            block(3, [1, 1, 1], [5, 5, 5]),
            block(9, [8, 2, 2], [12, 6, 6]),
        ],
    )
}

fn input(volume: &LabelVolume, labels: LabelSpec) -> ExtractionInput<'_> {
    ExtractionInput {
        volume,
        labels,
        base_name: "Model",
        color_table: None,
    }
}

#[test]
fn single_label_without_color_table() {
    let volume = block_volume([8, 8, 8], &[block(5, [2, 2, 2], [6, 6, 6])]);
    let mut sink = CollectingSink::<f64>::default();

    let outcome = extract_models(
        &NativeBackend,
        &input(&volume, LabelSpec::explicit([5])),
        &PipelineConfig::default(),
        &mut sink,
        None,
    )
    .unwrap();

    assert_eq!(outcome.selection.mode, ExtractionMode::Single);
    assert!(outcome.histogram.is_none());
    assert_eq!(outcome.summary.made_labels(), &[5]);
    assert!(outcome.summary.skipped_labels().is_empty());

    assert_eq!(sink.results.len(), 1);
    let result = &sink.results[0];
    assert_eq!(result.name, "Model_5");
    assert!(!result.mesh.strips.is_empty());
    assert!(result.mesh.triangles.is_empty());
    assert!(result.mesh.normals.is_some());
    assert!(result.mesh.signed_volume() > 0.0);
}

#[test]
fn generate_all_skips_empty_labels_in_range() {
    let volume = two_blocks();
    let backend = CountingBackend::default();
    let mut log = EventLog::default();

    let outcome = extract_models(
        &backend,
        &input(&volume, LabelSpec::All),
        &PipelineConfig::default(),
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(outcome.selection.labels, (3..=9).collect::<Vec<_>>());
    assert_eq!(outcome.summary.made_labels(), &[3, 9]);
    assert_eq!(outcome.summary.skipped_labels(), &[4, 5, 6, 7, 8]);

    // The empty labels never reach a geometry operation
    assert_eq!(backend.count("threshold"), 2);
    assert_eq!(backend.count("isosurface"), 2);

    assert_eq!(log.events[0], Observed::Produced(3, "Model_3".to_string()));
    assert_eq!(log.events[1], Observed::Skipped(4, SkipReason::NoVoxels));
    assert_eq!(log.events[6], Observed::Produced(9, "Model_9".to_string()));
}

#[test]
fn explicit_labels_absent_from_volume_are_skipped() {
    let volume = two_blocks();
    let backend = CountingBackend::default();
    let mut log = EventLog::default();

    let outcome = extract_models(
        &backend,
        &input(&volume, LabelSpec::explicit([9, 3, 42, 3])),
        &PipelineConfig::default(),
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(outcome.selection.labels, vec![3, 9, 42]);
    assert_eq!(outcome.summary.made_labels(), &[3, 9]);
    assert_eq!(outcome.summary.skipped_labels(), &[42]);
    assert_eq!(backend.count("threshold"), 2);
    assert_eq!(backend.count("strip"), 2);
}

#[test]
fn single_absent_label_gives_empty_surface() {
    let volume = two_blocks();
    let mut log = EventLog::default();

    let outcome = extract_models(
        &NativeBackend,
        &input(&volume, LabelSpec::explicit([7])),
        &PipelineConfig::default(),
        &mut log,
        None,
    )
    .unwrap();

    assert!(outcome.summary.made_labels().is_empty());
    assert_eq!(log.events, vec![Observed::Skipped(7, SkipReason::EmptySurface)]);
}

#[test]
fn mirrored_transform_reverses_orientation() {
    let mirror = Matrix4::from_diagonal(&Vector4::new(-1.0, 1.0, 1.0, 1.0));
    let volume = block_volume([8, 8, 8], &[block(1, [2, 2, 2], [6, 6, 6])]);

    for (volume, expect_reverse) in [(volume.clone().with_ijk_to_ras(mirror), true), (volume, false)] {
        let backend = CountingBackend::default();
        let mut log = EventLog::default();
        extract_models(
            &backend,
            &input(&volume, LabelSpec::explicit([1])),
            &PipelineConfig::default(),
            &mut log,
            None,
        )
        .unwrap();

        assert_eq!(backend.count("reverse_sense") == 1, expect_reverse);
        assert_eq!(log.signed_volumes.len(), 1);
        assert!(log.signed_volumes[0] > 0.0);
    }
}

#[test]
fn color_table_names_and_unnamed_labels() {
    let volume = two_blocks();
    // The table spans the labels 0 to 12, label 9 has no entry
    let color_table = ColorTable::from_entries([
        (
            3,
            ColorEntry {
                name: "left lung".to_string(),
                rgba: [1.0, 0.0, 0.0, 1.0],
            },
        ),
        (
            12,
            ColorEntry {
                name: "invalid".to_string(),
                rgba: [0.0, 0.0, 0.0, 0.0],
            },
        ),
    ]);

    let mut colored = ExtractionInput {
        color_table: Some(&color_table),
        ..input(&volume, LabelSpec::explicit([3, 9]))
    };

    let mut log = EventLog::default();
    let outcome = extract_models(
        &NativeBackend,
        &colored,
        &PipelineConfig::default(),
        &mut log,
        None,
    )
    .unwrap();
    assert_eq!(outcome.summary.made_labels(), &[3, 9]);
    assert_eq!(
        log.events[0],
        Observed::Produced(3, "Model_3_left_lung".to_string())
    );
    assert_eq!(log.events[1], Observed::Produced(9, "Model_9".to_string()));

    colored.base_name = "Organ";
    let config = PipelineConfig {
        skip_unnamed_labels: true,
        ..Default::default()
    };
    let mut log = EventLog::default();
    let outcome = extract_models(&NativeBackend, &colored, &config, &mut log, None).unwrap();
    assert_eq!(outcome.summary.made_labels(), &[3]);
    assert_eq!(outcome.summary.skipped_labels(), &[9]);
    assert_eq!(log.events[1], Observed::Skipped(9, SkipReason::Unnamed));
}

#[test]
fn intermediate_models_are_emitted_in_order() {
    let volume = block_volume([8, 8, 8], &[block(2, [2, 2, 2], [6, 6, 6])]);
    let config = PipelineConfig {
        save_intermediate: true,
        ..Default::default()
    };
    let mut log = EventLog::default();
    extract_models(
        &NativeBackend,
        &input(&volume, LabelSpec::explicit([2])),
        &config,
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(
        log.events,
        vec![
            Observed::Intermediate(2, "Model_2-MarchingCubes".to_string()),
            Observed::Intermediate(2, "Model_2-Decimated".to_string()),
            Observed::Intermediate(2, "Model_2-Smoothed".to_string()),
            Observed::Produced(2, "Model_2".to_string()),
        ]
    );
}

#[test]
fn padding_closes_surfaces_at_the_border() {
    // The label touches the border of the volume on every side
    let volume = block_volume([4, 4, 4], &[block(1, [0, 0, 0], [4, 4, 4])]);
    let config = PipelineConfig {
        pad: true,
        smooth_iterations: 0,
        ..Default::default()
    };
    let mut log = EventLog::default();
    let outcome = extract_models(
        &NativeBackend,
        &input(&volume, LabelSpec::explicit([1])),
        &config,
        &mut log,
        None,
    )
    .unwrap();

    assert_eq!(outcome.summary.made_labels(), &[1]);
    assert!(log.signed_volumes[0] > 0.0);
}

#[test]
fn repeated_runs_are_deterministic() {
    let volume = two_blocks();
    let run = || {
        let mut sink = CollectingSink::<f64>::default();
        let outcome = extract_models(
            &NativeBackend,
            &input(&volume, LabelSpec::Range { start: 1, end: 10 }),
            &PipelineConfig::default(),
            &mut sink,
            None,
        )
        .unwrap();
        (outcome.summary, sink.results)
    };

    let (summary_a, results_a) = run();
    let (summary_b, results_b) = run();
    assert_eq!(summary_a, summary_b);
    assert_eq!(results_a.len(), results_b.len());
    for (a, b) in results_a.iter().zip(&results_b) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.mesh, b.mesh);
    }
}

#[test]
fn invalid_inputs_are_rejected() {
    let flat = LabelVolume::new([4, 4, 1], vec![1; 16]).unwrap();
    let result = extract_models(
        &NativeBackend,
        &input(&flat, LabelSpec::explicit([1])),
        &PipelineConfig::default(),
        &mut CollectingSink::<f32>::default(),
        None,
    );
    assert!(matches!(result, Err(PipelineError::VolumeShape { .. })));

    let volume = two_blocks();
    let config = PipelineConfig {
        decimate_target_reduction: 2.0,
        ..Default::default()
    };
    let result = extract_models(
        &NativeBackend,
        &input(&volume, LabelSpec::explicit([3])),
        &config,
        &mut CollectingSink::<f32>::default(),
        None,
    );
    assert!(matches!(result, Err(PipelineError::Config(_))));
}

#[test]
fn sink_failure_aborts_the_run() {
    struct FailingSink {
        calls: usize,
    }

    impl ExtractionSink<f64> for FailingSink {
        fn consume(&mut self, _event: ExtractionEvent<'_, f64>) -> Result<(), SinkError> {
            self.calls += 1;
            Err("disk full".into())
        }
    }

    let volume = two_blocks();
    let mut sink = FailingSink { calls: 0 };
    let result = extract_models(
        &NativeBackend,
        &input(&volume, LabelSpec::explicit([3, 9])),
        &PipelineConfig::default(),
        &mut sink,
        None,
    );
    assert!(matches!(result, Err(PipelineError::Sink { label: 3, .. })));
    assert_eq!(sink.calls, 1);
}
