//! End-to-end tests for batch traversal.

use std::fs;

use super::*;
use crate::testing::{cell_with_puncta, write_two_channel_stack};

fn write_cell(path: &Path, depth: usize) {
    let volume = cell_with_puncta(24, 24, depth, &[(12.0, 12.0, 1.3)]);
    write_two_channel_stack(path, &volume);
}

fn config_for(input: &Path, output: &Path) -> BatchConfig {
    BatchConfig {
        input_dir: input.to_path_buf(),
        output_dir: output.to_path_buf(),
        ..BatchConfig::default()
    }
}

fn csv_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// First column of every data line.
fn first_column(path: &Path) -> Vec<String> {
    csv_lines(path)
        .iter()
        .skip(1)
        .map(|l| l.split(',').next().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_only_matching_files_are_processed() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("a_crop.tif"), 3);
    for name in ["a_crop.png", "a_cell.tif", "A_CROP.TIF"] {
        fs::write(input.path().join(name), b"not an image").unwrap();
    }

    let report = BatchOrchestrator::new(config_for(input.path(), output.path()))
        .run()
        .unwrap();

    assert_eq!(report.processed, vec![input.path().join("a_crop.tif")]);
    assert!(report.failed.is_empty(), "unselected files are never opened");
    assert_eq!(report.skipped, 3);
    assert_eq!(report.exit_code(), 0);
    assert!(output.path().join("a_crop.tif_Masked.tif").is_file());
}

#[test]
fn test_row_counts_and_outputs() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("one_crop.tif"), 3);
    write_cell(&input.path().join("two_crop.tif"), 4);

    let report = BatchOrchestrator::new(config_for(input.path(), output.path()))
        .run()
        .unwrap();
    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.peak_rows, 2, "one Peaks row per file");
    assert_eq!(report.measurement_rows, 7, "one Results row per slice");

    let peaks = csv_lines(&output.path().join(PEAKS_TABLE));
    assert_eq!(peaks[0], "File,Peak Number");
    assert_eq!(peaks.len(), 3);

    let results = csv_lines(&output.path().join(RESULTS_TABLE));
    assert_eq!(results[0], "Label,Slice,Area,Mean,IntDen,RawIntDen");
    assert_eq!(results.len(), 8);
    assert!(results[1].starts_with("one_crop.tif_Masked:1,1,"));
    assert!(results[7].starts_with("two_crop.tif_Masked:4,4,"));

    let masked = load_hyperstack(&output.path().join("two_crop.tif_Masked.tif")).unwrap();
    assert_eq!(masked.channels, 1);
    assert_eq!(masked.depth(), 4);
}

#[test]
fn test_files_are_processed_in_sorted_order() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let sub = input.path().join("a_sub");
    fs::create_dir(&sub).unwrap();
    write_cell(&sub.join("c_crop.tif"), 2);
    write_cell(&input.path().join("b_crop.tif"), 2);
    write_cell(&input.path().join("a_crop.tif"), 2);

    BatchOrchestrator::new(config_for(input.path(), output.path()))
        .run()
        .unwrap();

    assert_eq!(
        first_column(&output.path().join(PEAKS_TABLE)),
        vec!["a_crop.tif", "b_crop.tif", "c_crop.tif"]
    );
}

#[test]
fn test_failing_file_is_isolated() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("a_crop.tif"), 2);
    fs::write(input.path().join("b_crop.tif"), b"corrupt").unwrap();
    write_cell(&input.path().join("c_crop.tif"), 3);

    let report = BatchOrchestrator::new(config_for(input.path(), output.path()))
        .run()
        .unwrap();

    assert_eq!(report.processed.len(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, input.path().join("b_crop.tif"));
    assert_eq!(report.exit_code(), 1);
    assert_eq!(report.selected(), 3);

    assert_eq!(
        first_column(&output.path().join(PEAKS_TABLE)),
        vec!["a_crop.tif", "c_crop.tif"],
        "a failed file contributes no rows"
    );
    assert_eq!(csv_lines(&output.path().join(RESULTS_TABLE)).len(), 1 + 5);
    assert!(!output.path().join("b_crop.tif_Masked.tif").exists());
}

#[test]
fn test_missing_channel_fails_every_file() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("a_crop.tif"), 2);

    let config = BatchConfig {
        channel: 2,
        ..config_for(input.path(), output.path())
    };
    let report = BatchOrchestrator::new(config).run().unwrap();
    assert_eq!(report.failed.len(), 1);
    assert!(report.failed[0].error.contains("channel"));
    assert_eq!(csv_lines(&output.path().join(PEAKS_TABLE)).len(), 1);
}

#[test]
fn test_rerun_produces_identical_tables() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("a_crop.tif"), 3);
    write_cell(&input.path().join("b_crop.tif"), 2);

    let orchestrator = BatchOrchestrator::new(config_for(input.path(), output.path()));
    orchestrator.run().unwrap();
    let peaks = fs::read(output.path().join(PEAKS_TABLE)).unwrap();
    let results = fs::read(output.path().join(RESULTS_TABLE)).unwrap();

    orchestrator.run().unwrap();
    assert_eq!(fs::read(output.path().join(PEAKS_TABLE)).unwrap(), peaks);
    assert_eq!(fs::read(output.path().join(RESULTS_TABLE)).unwrap(), results);
}

#[test]
fn test_output_inside_input_is_not_reprocessed() {
    let input = tempfile::tempdir().unwrap();
    let output = input.path().join("results_crop");
    write_cell(&input.path().join("a_crop.tif"), 2);

    let orchestrator = BatchOrchestrator::new(config_for(input.path(), &output));
    let first = orchestrator.run().unwrap();
    let second = orchestrator.run().unwrap();
    assert_eq!(first.processed.len(), 1);
    assert_eq!(second.processed, first.processed);
}

#[test]
fn test_same_name_in_subdirectories_is_reported_as_overwrite() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for sub in ["day1", "day2"] {
        let dir = input.path().join(sub);
        fs::create_dir(&dir).unwrap();
        write_cell(&dir.join("cell_crop.tif"), 2);
    }
    write_cell(&input.path().join("other_crop.tif"), 2);

    let report = BatchOrchestrator::new(config_for(input.path(), output.path()))
        .run()
        .unwrap();

    assert_eq!(report.processed.len(), 3);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(
        report.overwritten,
        vec![input.path().join("day2").join("cell_crop.tif")],
        "only the later file replaced an earlier output"
    );
    assert!(output.path().join("cell_crop.tif_Masked.tif").is_file());
    assert_eq!(
        first_column(&output.path().join(PEAKS_TABLE)),
        vec!["other_crop.tif", "cell_crop.tif", "cell_crop.tif"],
        "both files keep their rows"
    );
}

#[test]
fn test_distinct_names_are_not_overwrites() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("a_crop.tif"), 2);
    write_cell(&input.path().join("b_crop.tif"), 2);

    let orchestrator = BatchOrchestrator::new(config_for(input.path(), output.path()));
    assert!(orchestrator.run().unwrap().overwritten.is_empty());
    // Outputs left by a previous run are not overwrites within this run.
    assert!(orchestrator.run().unwrap().overwritten.is_empty());
}

#[test]
fn test_overlays_are_written_when_enabled() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_cell(&input.path().join("a_crop.tif"), 2);

    let config = BatchConfig {
        save_overlays: true,
        ..config_for(input.path(), output.path())
    };
    BatchOrchestrator::new(config).run().unwrap();
    assert!(output.path().join("a_crop.tif_Peaks.png").is_file());
}

#[test]
fn test_missing_input_directory_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("missing"), &dir.path().join("out"));
    assert!(matches!(
        BatchOrchestrator::new(config).run(),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_invalid_method_stops_before_any_output() {
    let input = tempfile::tempdir().unwrap();
    let output = input.path().join("out");
    let mut config = config_for(input.path(), &output);
    config.mask.method = "huang".to_string();
    assert!(matches!(
        BatchOrchestrator::new(config).run(),
        Err(Error::Configuration(_))
    ));
    assert!(!output.exists());
}
