//! Tests driving the built `ssimulacra2` binary.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

fn ssimulacra2() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_ssimulacra2"));
    cmd.env_remove("RUST_LOG").env_remove("SSIMULACRA2_CONFIG");
    cmd
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn write_png(dir: &Path, name: &str, shift: u8) -> PathBuf {
    let img = RgbImage::from_fn(32, 32, |x, y| {
        Rgb([
            (x * 7) as u8 ^ shift,
            (y * 7) as u8,
            ((x + y) * 3) as u8,
        ])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    let path = dir.join(name);
    std::fs::write(&path, buf).unwrap();
    path
}

#[test]
fn test_help() {
    let output = ssimulacra2().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("ORIGINAL"));
    assert!(text.contains("--worst-case-alpha"));
}

#[test]
fn test_identical_images() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);

    let output = ssimulacra2().arg(&a).arg(&a).output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(text.contains("SSIMULACRA 2.1"));
    assert!(text.contains("=== IMAGE ANALYSIS ==="));
    assert!(text.contains("SSIMULACRA2 Score: "));
    assert!(text.contains("Near mathematically lossless"), "{text}");
    assert!(text.contains("File and memory APIs produce identical results"));
}

#[test]
fn test_flags_trim_output() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);
    let b = write_png(dir.path(), "b.png", 3);

    let output = ssimulacra2()
        .arg(&a)
        .arg(&b)
        .args(["--no-analysis", "--skip-memory-check"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let text = stdout(&output);
    assert!(!text.contains("=== IMAGE ANALYSIS ==="));
    assert!(!text.contains("MEMORY-BASED"));
    assert!(text.contains("Quality interpretation:"));
}

#[test]
fn test_json_report() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);
    let b = write_png(dir.path(), "b.png", 5);

    let output = ssimulacra2().arg(&a).arg(&b).arg("0.25").arg("--json").output().unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["version"], "SSIMULACRA 2.1");
    assert_eq!(report["config"]["background"], 0.25);
    assert!(report["score"].is_f64());
    assert_eq!(report["memory_check"]["status"], "agree");
    assert_eq!(report["analysis"]["original"]["format"], "png");
}

#[test]
fn test_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);
    let missing = dir.path().join("missing.png");

    let output = ssimulacra2().arg(&a).arg(&missing).output().unwrap();
    assert!(!output.status.success());

    let err = stderr(&output);
    assert!(err.contains("FileNotFound (-2)"), "{err}");
    assert!(err.contains("=== DETAILED ERROR DIAGNOSTICS ==="));
    assert!(err.contains("missing.png"));
}

#[test]
fn test_json_failure() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);
    let junk = dir.path().join("junk.png");
    std::fs::write(&junk, b"this is not an image file").unwrap();

    let output = ssimulacra2().arg(&a).arg(&junk).arg("--json").output().unwrap();
    assert!(!output.status.success());

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["code"], -3);
    assert_eq!(report["name"], "UnsupportedFormat");
}

#[test]
fn test_background_out_of_range() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);

    for bad in ["1.5", "-0.1", "gray"] {
        let output = ssimulacra2().arg(&a).arg(&a).arg(bad).output().unwrap();
        assert!(!output.status.success(), "{bad} accepted");
        assert!(stderr(&output).contains("BACKGROUND"), "{bad}");
    }
}

#[test]
fn test_config_file() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);
    let config = dir.path().join("score.json");
    std::fs::write(&config, r#"{ "background": 0.75, "parallel_decode": false }"#).unwrap();

    let output = ssimulacra2()
        .arg(&a)
        .arg(&a)
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", stderr(&output));

    let report: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(report["config"]["background"], 0.75);
    assert_eq!(report["config"]["parallel_decode"], false);
}

#[test]
fn test_bad_config_file() {
    let dir = TempDir::new().unwrap();
    let a = write_png(dir.path(), "a.png", 0);
    let config = dir.path().join("score.json");
    std::fs::write(&config, r#"{ "background": 3.0 }"#).unwrap();

    let output = ssimulacra2().arg(&a).arg(&a).arg("--config").arg(&config).output().unwrap();
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Failed to load config"));
}
