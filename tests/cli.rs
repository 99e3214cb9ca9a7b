use std::fs;
use std::path::Path;

use assert_cmd::Command;
use gamma_separation::data::io::{read_table, DEFAULT_HDF_KEY};
use tempfile::tempdir;

const CLASSIFIER: &str = r#"{
    "kind": "random_forest_classifier",
    "n_features": 2,
    "estimators": [{
        "children_left":  [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature":        [1, -2, -2],
        "threshold":      [150.0, -2.0, -2.0],
        "value":          [[5.0, 5.0], [4.0, 1.0], [1.0, 4.0]]
    }]
}"#;

const REGRESSOR: &str = r#"{
    "kind": "random_forest_regressor",
    "n_features": 2,
    "feature_importances": [0.7, 0.3],
    "estimators": [{
        "children_left":  [1, -1, -1],
        "children_right": [2, -1, -1],
        "feature":        [0, -2, -2],
        "threshold":      [100.0, -2.0, -2.0],
        "value":          [[550.0], [100.0], [1000.0]]
    }]
}"#;

const EVENTS: &str = "\
Theta,Distance,Theta_Off_3,Distance_Off_3,size
1.0,4.0,7.0,10.0,100.0
2.0,5.0,8.0,11.0,200.0
3.0,6.0,9.0,12.0,300.0
";

fn write_inputs(dir: &Path) {
    fs::write(dir.join("config.yaml"), "training_variables: [Theta, size]\n").unwrap();
    fs::write(dir.join("model.json"), CLASSIFIER).unwrap();
    fs::write(dir.join("events.csv"), EVENTS).unwrap();
}

fn apply(dir: &Path, output: &str) -> assert_cmd::assert::Assert {
    Command::new(assert_cmd::cargo_bin!("apply"))
        .current_dir(dir)
        .args(["config.yaml", "events.csv", "model.json", output])
        .assert()
}

#[test]
fn help_lists_arguments() {
    let output = Command::new(assert_cmd::cargo_bin!("apply"))
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    for name in ["CONFIGURATION_PATH", "DATA_PATH", "MODEL_PATH", "OUTPUT_PATH"] {
        assert!(text.contains(name), "missing argument {name}");
    }

    let output = Command::new(assert_cmd::cargo_bin!("plot"))
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8_lossy(&output);
    for name in ["PERFORMANCE_PATH", "--output", "--key"] {
        assert!(text.contains(name), "missing argument {name}");
    }
}

#[test]
fn apply_writes_predictions() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    apply(dir.path(), "out.json").success();

    let out = read_table(&dir.path().join("out.json"), DEFAULT_HDF_KEY).unwrap();
    assert_eq!(out.len(), 3);
    assert_eq!(out.column("Theta").unwrap(), &[1.0, 2.0, 3.0]);
    assert_eq!(out.column("Distance").unwrap(), &[4.0, 5.0, 6.0]);
    assert_eq!(out.column("background_theta").unwrap(), &[7.0, 8.0, 9.0]);
    assert_eq!(out.column("background_distance").unwrap(), &[10.0, 11.0, 12.0]);
    assert_eq!(out.column("signal_prediction").unwrap(), &[0.2, 0.8, 0.8]);
}

#[test]
fn apply_writes_parquet() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    apply(dir.path(), "out.parquet").success();

    let out = read_table(&dir.path().join("out.parquet"), DEFAULT_HDF_KEY).unwrap();
    assert_eq!(out.index(), &[0, 1, 2]);
    assert!(out.has_column("background_prediction"));
}

#[test]
fn apply_rejects_unsupported_output() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    apply(dir.path(), "out.txt").failure();
    assert!(!dir.path().join("out.txt").exists());
}

#[test]
fn apply_requires_existing_inputs() {
    let dir = tempdir().unwrap();
    write_inputs(dir.path());
    Command::new(assert_cmd::cargo_bin!("apply"))
        .current_dir(dir.path())
        .args(["config.yaml", "missing.csv", "model.json", "out.json"])
        .assert()
        .failure();
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn plot_saves_a_pdf() {
    let dir = tempdir().unwrap();
    let mut performance = String::from("label,label_prediction\n");
    for i in 0..60 {
        let energy = 10f64.powf(2.0 + i as f64 / 20.0);
        performance.push_str(&format!("{energy},{}\n", energy * (0.9 + 0.005 * i as f64)));
    }
    fs::write(dir.path().join("performance.csv"), performance).unwrap();
    fs::write(dir.path().join("config.yaml"), "training_variables: [size, width]\n").unwrap();
    fs::write(dir.path().join("regressor.json"), REGRESSOR).unwrap();

    Command::new(assert_cmd::cargo_bin!("plot"))
        .current_dir(dir.path())
        .args([
            "config.yaml",
            "performance.csv",
            "regressor.json",
            "-o",
            "plots.pdf",
        ])
        .assert()
        .success();

    let bytes = fs::read(dir.path().join("plots.pdf")).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
    let doc = lopdf::Document::load(dir.path().join("plots.pdf")).unwrap();
    assert_eq!(doc.get_pages().len(), 4);
}
