use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde_json::{json, Value};
use serial_test::serial;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pve-processor-{}-{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn raptor_replay(
    id: &str,
    start_time: &str,
    ai_won: bool,
    start_metal: i64,
    players: Value,
) -> Value {
    json!({
        "id": id,
        "startTime": start_time,
        "durationMs": 1_800_000,
        "Map": { "scriptName": "All That Glitters v2.2" },
        "AllyTeams": [
            { "winningTeam": !ai_won, "Players": players, "AIs": [] },
            {
                "winningTeam": ai_won,
                "Players": [],
                "AIs": [{ "shortName": "RaptorsAI", "teamId": 20 }]
            }
        ],
        "raptor_difficulty": "epic",
        "startmetal": start_metal
    })
}

fn write_snapshot(dir: &PathBuf) -> PathBuf {
    let snapshot = json!([
        raptor_replay(
            "win-hard",
            "2024-07-01T12:00:00.000Z",
            false,
            500,
            json!([
                { "userId": 1, "teamId": 10, "name": "alpha" },
                { "userId": 2, "teamId": 11, "name": "beta" }
            ])
        ),
        raptor_replay(
            "loss-easy",
            "2024-07-01T14:00:00.000Z",
            true,
            2000,
            json!([{ "userId": 3, "teamId": 10, "name": "gamma" }])
        ),
        raptor_replay(
            "win-easy",
            "2024-07-01T16:00:00.000Z",
            false,
            2000,
            json!([{ "userId": 4, "teamId": 10, "name": "delta" }])
        ),
    ]);
    let path = dir.join("snapshot.json");
    fs::write(&path, snapshot.to_string()).unwrap();
    path
}

fn run_processor(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_pve-processor"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute processor")
}

#[test]
#[serial]
fn test_run_writes_exports() {
    let dir = scratch_dir("cli-run");
    let snapshot = write_snapshot(&dir);
    let output_dir = dir.join("output");

    let output = run_processor(&[
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--output-dir",
        output_dir.to_str().unwrap(),
        "--log-level",
        "info",
    ]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // each variant reports its merge-source skip count
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("processed variant") && stderr.contains("skipped_sources"),
        "stderr: {stderr}"
    );

    let read_rows = |name: &str| -> Vec<Value> {
        let raw = fs::read_to_string(output_dir.join(name)).unwrap();
        serde_json::from_str(&raw).unwrap()
    };

    let all = read_rows("Raptors.all.grouped_gamesettings.json");
    assert_eq!(all.len(), 2);

    // the 500 metal setup is the harder of the two
    let unbeaten = read_rows("Raptors.unbeaten.grouped_gamesettings.json");
    assert_eq!(unbeaten.len(), 1);
    assert_eq!(unbeaten[0]["startmetal"], Value::from(500));
    assert!(unbeaten[0]["Copy Paste"]
        .as_str()
        .unwrap()
        .contains("!startmetal 500"));

    let cheese = read_rows("Raptors.cheese.grouped_gamesettings.json");
    assert_eq!(cheese[0]["startmetal"], Value::from(2000));
    assert!(read_rows("Raptors.regular.grouped_gamesettings.json").is_empty());

    let ratings = read_rows("PveRating.Raptors_gamesettings.json");
    assert_eq!(ratings.len(), 3);
    assert_eq!(ratings[0]["PVE Rating"], Value::from(30.0));

    // gamma never won and gets no row
    let players: Vec<&str> = ratings
        .iter()
        .map(|row| row["Player"].as_str().unwrap())
        .collect();
    assert!(players.contains(&"alpha") && players.contains(&"delta"));
    assert!(!players.contains(&"gamma"));

    let combined: Value = serde_json::from_str(
        &fs::read_to_string(output_dir.join("pve_ratings.json")).unwrap(),
    )
    .unwrap();
    assert!(combined["pve_ratings"]["RaptorsAI"]["alpha"].is_number());

    // a second invocation reproduces every file byte for byte
    let rerun_dir = dir.join("output-rerun");
    let rerun = run_processor(&[
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--output-dir",
        rerun_dir.to_str().unwrap(),
        "--log-level",
        "error",
    ]);
    assert!(rerun.status.success());
    for name in [
        "Raptors.all.grouped_gamesettings.json",
        "Raptors.regular.grouped_gamesettings.json",
        "Raptors.unbeaten.grouped_gamesettings.json",
        "Raptors.cheese.grouped_gamesettings.json",
        "PveRating.Raptors_gamesettings.json",
        "pve_ratings.json",
    ] {
        assert_eq!(
            fs::read(output_dir.join(name)).unwrap(),
            fs::read(rerun_dir.join(name)).unwrap(),
            "{name} differs between runs"
        );
    }

    let _ = fs::remove_dir_all(&dir);
}

#[test]
#[serial]
fn test_missing_snapshot_exits_nonzero() {
    let dir = scratch_dir("cli-missing");

    let output = run_processor(&[
        "--snapshot",
        dir.join("nonexistent.json").to_str().unwrap(),
        "--output-dir",
        dir.join("output").to_str().unwrap(),
        "--log-level",
        "error",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("processing run failed"),
        "Should log the run failure. Got: {}",
        stderr
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
#[serial]
fn test_invalid_calibration_exits_nonzero() {
    let dir = scratch_dir("cli-calibration");
    let snapshot = write_snapshot(&dir);

    let output = run_processor(&[
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--output-dir",
        dir.join("output").to_str().unwrap(),
        "--calibration",
        "not-a-curve",
        "--log-level",
        "error",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("processing run failed"),
        "Should log the run failure. Got: {}",
        stderr
    );

    let _ = fs::remove_dir_all(&dir);
}
