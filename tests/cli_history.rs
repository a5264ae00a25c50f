use assert_cmd::Command;
use chrono::{TimeZone, Utc};

use rightangle::sample::{Sample, TaggedSample};
use rightangle::store::{ResultsStore, SqliteResultsStore};
use rightangle::{SessionMode, SessionRecord, SessionResult, StrengthSummary};

fn record(mode: SessionMode, millis: i64, rom: f64, max: f64, avg: f64) -> SessionRecord {
    SessionRecord {
        mode,
        recorded_at: Utc.timestamp_millis_opt(millis).unwrap(),
        result: SessionResult {
            rom,
            strength: StrengthSummary { max, avg },
            samples: vec![TaggedSample {
                sample: Sample::new(millis, max),
                relevant: true,
            }],
        },
    }
}

fn history(db: &std::path::Path, extra: &[&str]) -> String {
    let output = Command::cargo_bin("rightangle")
        .unwrap()
        .arg("history")
        .arg("--db")
        .arg(db)
        .args(extra)
        .output()
        .unwrap();
    assert!(output.status.success(), "history failed: {output:?}");
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn history_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let out = history(&dir.path().join("results.db"), &[]);
    assert!(out.contains("No baseline recorded."));
    assert!(out.contains("No measurements recorded."));
}

#[test]
fn history_lists_measurements_against_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("results.db");
    {
        let mut store = SqliteResultsStore::open(&db).unwrap();
        store
            .record(&record(SessionMode::Baseline, 1_700_000_000_000, 80.0, 20.0, 15.0))
            .unwrap();
        store
            .record(&record(SessionMode::Regular, 1_700_100_000_000, 95.0, 25.0, 17.67))
            .unwrap();
    }

    let out = history(&db, &[]);
    assert!(out.contains("ROM 80° | max 20 lbs | avg 15 lbs | 1 samples"), "{out}");
    assert!(out.contains("ROM 95° | max 25 lbs | avg 17.67 lbs"), "{out}");
    assert!(out.contains("vs baseline: ROM +15°, max +5 lbs"), "{out}");
}

#[test]
fn history_respects_limit() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("results.db");
    {
        let mut store = SqliteResultsStore::open(&db).unwrap();
        for i in 0..4 {
            store
                .record(&record(
                    SessionMode::Regular,
                    1_700_000_000_000 + i * 60_000,
                    90.0 + i as f64,
                    20.0,
                    10.0,
                ))
                .unwrap();
        }
    }

    let out = history(&db, &["-n", "2"]);
    assert!(out.contains("ROM 93°"));
    assert!(out.contains("ROM 92°"));
    assert!(!out.contains("ROM 91°"));
}
