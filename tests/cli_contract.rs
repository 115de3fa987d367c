use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde_json::{json, Value};
use tempfile::tempdir;

fn run_glbench(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_glbench"))
        .current_dir(cwd)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("glbench command should run")
}

fn run_glbench_with_stdin(cwd: &Path, args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_glbench"))
        .current_dir(cwd)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("glbench command should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(stdin.as_bytes())
        .expect("stdin should accept input");
    child.wait_with_output().expect("glbench should exit")
}

fn error_envelope(output: &Output) -> Value {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|line| line.trim_start().starts_with('{'))
        .unwrap_or_else(|| panic!("no JSON envelope on stderr:\n{stderr}"));
    serde_json::from_str(line).expect("envelope should be valid json")
}

fn triangle_results() -> Value {
    let result = |count: u32, fps: f64, cpu: f64| {
        json!({
            "triangle_count": count,
            "lighting_mode": "none",
            "texture_mode": "none",
            "avg_fps": fps,
            "min_fps": fps * 0.9,
            "max_fps": fps * 1.1,
            "avg_cpu": cpu,
            "avg_gpu": null,
            "total_frames": (fps * 5.0) as u64,
            "duration_seconds": 5.0
        })
    };

    json!({
        "timestamp": "2024-05-01T10:00:00+02:00",
        "suite": "triangles",
        "build_profile": "release",
        "renderer": { "adapter": "llvmpipe", "backend": "gl" },
        "duration_per_test_seconds": 5.0,
        "system_info": {
            "cpu_physical_cores": 4,
            "cpu_logical_cores": 8,
            "cpu_max_freq_mhz": 3400,
            "ram_gb": 15.5,
            "gpu_available": false,
            "gpu_count": 0,
            "gpu_info": [],
            "os_name": "Linux",
            "os_version": "6.8",
            "arch": "x86_64"
        },
        "results": [
            result(1, 2900.0, 12.0),
            result(100, 1500.0, 18.0),
            result(2000, 140.0, 35.0)
        ]
    })
}

#[test]
fn charts_render_from_existing_result_files() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(
        dir.path().join("benchmark_triangles.json"),
        serde_json::to_string_pretty(&triangle_results()).unwrap(),
    )
    .expect("result file should write");

    let output = run_glbench(dir.path(), &["charts", "--output-dir", "."]);
    assert!(
        output.status.success(),
        "charts should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let chart = dir.path().join("chart_fps_triangles.png");
    let decoded = image::open(&chart).expect("chart should be a png");
    assert_eq!((decoded.width(), decoded.height()), (1200, 900));
    assert!(!dir.path().join("chart_lighting.png").exists());
    assert!(!dir.path().join("chart_textures.png").exists());
}

#[test]
fn charts_without_results_fail_with_no_results_code() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_glbench(dir.path(), &["charts", "--json"]);

    assert_eq!(output.status.code(), Some(1));
    let envelope = error_envelope(&output);
    assert_eq!(envelope["ok"], json!(false));
    assert_eq!(envelope["error"]["code"], json!("NO_RESULTS"));
}

#[test]
fn invalid_config_is_reported_before_any_work() {
    let dir = tempdir().expect("tempdir should create");
    fs::write(dir.path().join("bad.yaml"), "duration_seconds: -1\n").unwrap();
    fs::write(dir.path().join("typo.yaml"), "duraton_seconds: 5\n").unwrap();

    for file in ["bad.yaml", "typo.yaml"] {
        let output = run_glbench(dir.path(), &["--config", file, "--json", "system"]);
        assert_eq!(output.status.code(), Some(1), "{file} should fail");
        let envelope = error_envelope(&output);
        assert_eq!(envelope["error"]["code"], json!("INVALID_CONFIG"), "{file}");
        assert!(output.stdout.is_empty(), "{file} should not print a report");
    }
}

#[test]
fn out_of_range_duration_flags_are_invalid() {
    let dir = tempdir().expect("tempdir should create");
    for duration in ["0", "1e20", "1e-12"] {
        let output = run_glbench(
            dir.path(),
            &["triangles", "--duration", duration, "--json"],
        );

        assert_eq!(output.status.code(), Some(1), "--duration {duration}");
        assert_eq!(
            error_envelope(&output)["error"]["code"],
            json!("INVALID_CONFIG"),
            "--duration {duration}"
        );
        assert!(!dir.path().join("benchmark_triangles.json").exists());
    }
}

#[test]
fn system_command_prints_hardware_report() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_glbench(dir.path(), &["system"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SYSTEM INFORMATION"));
    assert!(stdout.contains("Logical cores:"));
    assert!(stdout.contains("RAM total:"));
    assert!(stdout.contains("GPU"));
}

#[test]
fn menu_reprompts_reports_failures_and_exits() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_glbench_with_stdin(dir.path(), &["menu"], "9\n7\n1\n0\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("7. Generate charts"));
    assert!(stdout.contains("Invalid option '9'"));
    assert!(stdout.contains("Error: NO_RESULTS"));
    assert!(stdout.contains("SYSTEM INFORMATION"));
    assert!(stdout.contains("Bye."));
}

#[test]
fn menu_exits_on_end_of_input() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_glbench_with_stdin(dir.path(), &[], "");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("0. Exit"));
}

#[test]
fn version_reports_package_version() {
    let dir = tempdir().expect("tempdir should create");
    let output = run_glbench(dir.path(), &["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with(&format!("glbench {} (", env!("CARGO_PKG_VERSION"))));
}
