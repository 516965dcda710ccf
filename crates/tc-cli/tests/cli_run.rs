use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_transcore"))
}

fn tmp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("transcore_cli_{}_{}_{}", std::process::id(), nanos, name));
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

const CONFIG: &str = "\
energy_deposition:
  binning: { type: linear, min: 0.0, max: 2.0, count: 4 }
exit_spectrum:
  binning: { type: log, min: 1.0e-11, max: 10.0, count: 2 }
";

const FEED: &str = r#"# two primaries
{"primary":0,"type":"deposit","position":[0.0,0.0,0.25],"edep":0.5}
{"primary":0,"type":"deposit","position":[0.0,0.0,1.5],"edep":0.25}
{"primary":0,"type":"track","particle":"neutron","kinetic_energy":1e-9,"post_volume":null}

{"primary":1,"type":"deposit","position":[0.0,0.0,0.75],"edep":1.0}
{"primary":1,"type":"deposit","position":[0.0,0.0,5.0],"edep":1.0}
{"primary":1,"type":"track","particle":"neutron","kinetic_energy":1.0,"post_volume":null}
{"primary":1,"type":"track","particle":"gamma","kinetic_energy":1.0,"post_volume":null}
{"primary":1,"type":"track","particle":"neutron","kinetic_energy":1.0,"post_volume":"Target"}
"#;

fn write_inputs(tag: &str) -> (PathBuf, PathBuf, PathBuf) {
    let dir = tmp_path(tag);
    std::fs::create_dir_all(&dir).unwrap();
    let cfg = dir.join("scoring.yaml");
    let feed = dir.join("events.jsonl");
    std::fs::write(&cfg, CONFIG).unwrap();
    std::fs::write(&feed, FEED).unwrap();
    (dir, cfg, feed)
}

fn values(path: &Path) -> (String, Vec<f64>) {
    let text = std::fs::read_to_string(path).unwrap();
    let mut lines = text.lines();
    let header = lines.next().unwrap().to_string();
    let vals = lines
        .map(|l| {
            let cols: Vec<&str> = l.split_whitespace().collect();
            assert_eq!(cols.len(), 2, "bad line '{l}'");
            cols[1].parse().unwrap()
        })
        .collect();
    (header, vals)
}

fn check_run(mode: &str) {
    let (dir, cfg, feed) = write_inputs(mode);
    let out_dir = dir.join("out");
    let summary = dir.join("summary.json");

    let out = run(&[
        "run",
        "--config",
        cfg.to_str().unwrap(),
        "--events",
        feed.to_str().unwrap(),
        "--output",
        out_dir.to_str().unwrap(),
        "--threads",
        "2",
        "--mode",
        mode,
        "--summary",
        summary.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "run failed, stderr={}", String::from_utf8_lossy(&out.stderr));

    let (header, edep) = values(&out_dir.join("edep_profile.dat"));
    assert_eq!(header, "# z_cm edep_GeV");
    assert_eq!(edep, vec![0.5, 1.0, 0.0, 0.25]);

    let (header, spectrum) = values(&out_dir.join("neutron_spectrum.dat"));
    assert_eq!(header, "# energy_GeV count");
    assert_eq!(spectrum, vec![1.0, 1.0]);

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(v["primaries"], 2);
    assert_eq!(v["total_exits"], 2);
    assert_eq!(v["total_energy_deposited"].as_f64().unwrap(), 1.75);
    assert_eq!(v["dropped"]["out_of_range_deposits"], 1);
    assert_eq!(v["files"].as_array().unwrap().len(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn run_shared_mode_writes_result_files() {
    check_run("shared");
}

#[test]
fn run_partial_mode_matches_shared() {
    check_run("partial");
}

#[test]
fn run_with_empty_feed_writes_nothing() {
    let dir = tmp_path("empty");
    std::fs::create_dir_all(&dir).unwrap();
    let feed = dir.join("events.jsonl");
    std::fs::write(&feed, "").unwrap();
    let out_dir = dir.join("out");

    let out = run(&[
        "run",
        "--events",
        feed.to_str().unwrap(),
        "--output",
        out_dir.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["primaries"], 0);
    assert!(v["files"].as_array().unwrap().is_empty());
    assert!(!out_dir.join("edep_profile.dat").exists());

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn run_rejects_malformed_feed() {
    let (dir, cfg, feed) = write_inputs("malformed");
    std::fs::write(&feed, "{\"primary\":0,\"type\":\"teleport\"}\n").unwrap();
    let out = run(&[
        "run",
        "--config",
        cfg.to_str().unwrap(),
        "--events",
        feed.to_str().unwrap(),
        "--output",
        dir.join("out").to_str().unwrap(),
    ]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid step event"), "stderr={stderr}");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn validate_rejects_nonpositive_log_min() {
    let dir = tmp_path("validate_bad");
    std::fs::create_dir_all(&dir).unwrap();
    let cfg = dir.join("bad.yaml");
    std::fs::write(&cfg, "exit_spectrum:\n  binning: { type: log, min: 0.0, max: 10.0, count: 10 }\n")
        .unwrap();

    let out = run(&["validate", "--config", cfg.to_str().unwrap()]);
    assert!(!out.status.success(), "validate should fail on log min 0");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid binning policy"), "stderr={stderr}");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn validate_prints_resolved_config() {
    let (dir, cfg, _) = write_inputs("validate_ok");
    let out = run(&["validate", "--config", cfg.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["energy_deposition"]["binning"]["count"], 4);
    assert_eq!(v["exit_spectrum"]["name"], "neutron_spectrum");
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn default_config_round_trips_through_validate() {
    let path = tmp_path("default.yaml");
    let out = run(&["default-config", "--output", path.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let out = run(&["validate", "--config", path.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["energy_deposition"]["binning"]["type"], "linear");
    assert_eq!(v["exit_spectrum"]["binning"]["type"], "logarithmic");
    std::fs::remove_file(&path).ok();
}
