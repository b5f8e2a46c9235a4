//! File-to-file pipeline tests.

use sobel_compute::{
    ComputeError, Distribution, Pipeline, PipelineConfig, ProcessGroupExecutor, Stage,
    ThreadedConfig, ThreadedExecutor,
};
use sobel_core::FlatRangePolicy;
use sobel_io::RasterFormat;
use tempfile::TempDir;

fn threads() -> Pipeline<ThreadedExecutor> {
    Pipeline::new(
        ThreadedExecutor::new(ThreadedConfig { workers: 3 }).unwrap(),
        PipelineConfig::default(),
    )
}

const SPIKE: &str = "P2\n# single bright pixel\n5 5\n100\n\
0 0 0 0 0\n0 0 0 0 0\n0 0 100 0 0\n0 0 0 0 0\n0 0 0 0 0\n";

#[test]
fn test_run_files_ascii() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pgm");
    let output = dir.path().join("out.pgm");
    std::fs::write(&input, SPIKE).unwrap();

    let report = threads().run_files(&input, &output).unwrap();
    assert_eq!(report.stage, Stage::Stored);

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("P2\n5 5\n255\n"));
    let (img, format) = sobel_io::read(&output).unwrap();
    assert_eq!(format, RasterFormat::Ascii);
    assert_eq!(img.get(2, 1), 255);
    assert_eq!(img.get(1, 1), 180);
    assert_eq!(img.get(2, 2), 0);
}

#[test]
fn test_run_files_keeps_binary_variant() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pgm");
    let output = dir.path().join("out.pgm");
    let (img, _) = sobel_io::from_bytes(SPIKE.as_bytes()).unwrap();
    sobel_io::write(&input, &img, RasterFormat::Binary).unwrap();

    threads().run_files(&input, &output).unwrap();
    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"P5\n"));
}

#[test]
fn test_run_files_output_override() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pgm");
    let output = dir.path().join("out.pgm");
    std::fs::write(&input, SPIKE).unwrap();

    let exec = ProcessGroupExecutor::in_process(2, Distribution::Halo).unwrap();
    let config = PipelineConfig::default().with_output_format(RasterFormat::Binary);
    Pipeline::new(exec, config).run_files(&input, &output).unwrap();

    let (img, format) = sobel_io::read(&output).unwrap();
    assert_eq!(format, RasterFormat::Binary);
    assert_eq!(img.max_intensity(), 255);
}

#[test]
fn test_missing_input_is_raster_error() {
    let dir = TempDir::new().unwrap();
    let err = threads()
        .run_files(dir.path().join("missing.pgm"), dir.path().join("out.pgm"))
        .unwrap_err();
    assert!(matches!(err, ComputeError::Raster(ref e) if !e.is_format()));
}

#[test]
fn test_bad_header_is_format_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pgm");
    std::fs::write(&input, "P3\n2 2\n255\n0 0 0 0\n").unwrap();
    let err = threads()
        .run_files(&input, dir.path().join("out.pgm"))
        .unwrap_err();
    assert!(matches!(err, ComputeError::Raster(ref e) if e.is_format()));
}

#[test]
fn test_flat_fail_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.pgm");
    let output = dir.path().join("out.pgm");
    std::fs::write(&input, "P2\n3 3\n9\n4 4 4 4 4 4 4 4 4\n").unwrap();

    let mut strict = Pipeline::new(
        ThreadedExecutor::new(ThreadedConfig { workers: 2 }).unwrap(),
        PipelineConfig::default().with_flat_range(FlatRangePolicy::Fail),
    );
    assert!(strict.run_files(&input, &output).is_err());
    assert!(!output.exists());
}
