//! CLI command integration tests.
//! Each test uses a temp directory via CM_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cm_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("cm").unwrap();
    cmd.env("CM_DATA_DIR", data_dir.path());
    cmd
}

/// Run `compute` at a low degree and return the stored run id.
fn compute_run(dir: &TempDir, point: &str) -> String {
    let output = cm_cmd(dir)
        .args(["compute", "--point", point, "--degree", "4"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "compute failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find_map(|l| l.strip_prefix("stored run "))
        .map(|s| s.trim().to_string())
        .expect("compute should print the stored run id")
}

#[test]
fn runs_fresh_db() {
    let dir = TempDir::new().unwrap();
    cm_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no runs)"));
}

#[test]
fn compute_prints_table_and_stores_run() {
    let dir = TempDir::new().unwrap();
    cm_cmd(&dir)
        .args(["compute", "--point", "L1", "--degree", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lambda1:"))
        .stdout(predicate::str::contains("max_degree: 4"))
        .stdout(predicate::str::contains("deg  q2 p2 q3 p3"))
        .stdout(predicate::str::contains(" terms"))
        .stdout(predicate::str::contains("stored run "));

    cm_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("L1"))
        .stdout(predicate::str::contains("(no runs)").not());
}

#[test]
fn compute_no_store_leaves_db_empty() {
    let dir = TempDir::new().unwrap();
    cm_cmd(&dir)
        .args(["compute", "--point", "L2", "--degree", "3", "--no-store"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stored run").not());

    cm_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no runs)"));
}

#[test]
fn show_by_prefix() {
    let dir = TempDir::new().unwrap();
    let id = compute_run(&dir, "L2");

    cm_cmd(&dir)
        .args(["show", &id[..8]])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()))
        .stdout(predicate::str::contains("point:      L2"))
        .stdout(predicate::str::contains(" terms"));

    cm_cmd(&dir)
        .args(["show", &id, "--stage", "generators"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stage:      generators"))
        .stdout(predicate::str::contains("nonzero"));
}

#[test]
fn show_unknown_run_fails() {
    let dir = TempDir::new().unwrap();
    cm_cmd(&dir)
        .args(["show", "deadbeef"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no unique run"));
}

#[test]
fn ic_maps_center_manifold_point() {
    let dir = TempDir::new().unwrap();
    let id = compute_run(&dir, "L1");

    let output = cm_cmd(&dir)
        .args(["ic", &id, "0.001", "-0.002", "0.0015", "0.0005"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "ic failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    for name in ["x ", "y ", "z ", "px", "py", "pz"] {
        let line = stdout
            .lines()
            .find(|l| l.starts_with(name))
            .unwrap_or_else(|| panic!("missing {name} in {stdout}"));
        let value: f64 = line.split('=').nth(1).unwrap().trim().parse().unwrap();
        assert!(value.is_finite());
        assert!(value.abs() < 0.1, "{name} = {value}");
    }
}

#[test]
fn export_delete_import_roundtrip() {
    let dir = TempDir::new().unwrap();
    let id = compute_run(&dir, "L1");
    let path = dir.path().join("run.json");

    cm_cmd(&dir)
        .args(["export", &id])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported"));
    assert!(path.exists());

    cm_cmd(&dir)
        .args(["delete", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted"));
    cm_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains("(no runs)"));

    cm_cmd(&dir)
        .arg("import")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("imported {id}")));
    cm_cmd(&dir)
        .arg("runs")
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));
}

#[test]
fn import_invalid_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "{\"version\": \"1.0.0\"}").unwrap();

    cm_cmd(&dir)
        .arg("import")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to import JSON"));
}

#[test]
fn invalid_point_rejected() {
    let dir = TempDir::new().unwrap();
    cm_cmd(&dir)
        .args(["compute", "--point", "L4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("L4"));
}

#[test]
fn invalid_mass_ratio_rejected() {
    let dir = TempDir::new().unwrap();
    cm_cmd(&dir)
        .args(["compute", "--mu", "0.7", "--degree", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid libration point"));
}

#[test]
fn config_file_sets_degree_and_flags_override() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cm.toml");
    std::fs::write(&config, "threads = 2\n\n[normal_form]\nmax_degree = 3\n").unwrap();

    cm_cmd(&dir)
        .arg("--config")
        .arg(&config)
        .args(["compute", "--no-store"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_degree: 3"));

    cm_cmd(&dir)
        .arg("--config")
        .arg(&config)
        .args(["compute", "--no-store", "--degree", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_degree: 4"));
}

#[test]
fn bad_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("cm.toml");
    std::fs::write(&config, "[normal_form]\nmax_degree = 1\n").unwrap();

    cm_cmd(&dir)
        .arg("--config")
        .arg(&config)
        .arg("runs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}
