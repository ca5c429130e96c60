//! Integration tests for the `timeslot` CLI binary.
//!
//! These run the real binary against the provider and calendar fixtures and
//! check the JSON and iCalendar it prints, plus the failure paths.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

/// Monday 2025-01-06 in New York.
const MONDAY_FROM: &str = "2025-01-06T00:00:00-05:00";
const MONDAY_TO: &str = "2025-01-07T00:00:00-05:00";

fn provider_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/provider.toml")
}

fn calendar_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/calendar.ics")
}

fn calendar_ics() -> String {
    std::fs::read_to_string(calendar_path()).expect("calendar.ics fixture must exist")
}

fn timeslot() -> Command {
    Command::cargo_bin("timeslot").unwrap()
}

/// Run a command expected to succeed and parse its stdout as a JSON array.
fn json_array(cmd: &mut Command) -> Vec<Value> {
    let output = cmd.assert().success().get_output().stdout.clone();
    let value: Value = serde_json::from_slice(&output).expect("stdout must be JSON");
    value.as_array().expect("stdout must be a JSON array").clone()
}

/// A scratch file unique to this test process.
fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("timeslot-cli-{}-{}", std::process::id(), name))
}

// ─────────────────────────────────────────────────────────────────────────────
// slots
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn slots_prints_free_intervals_around_bookings() {
    let free = json_array(timeslot().args([
        "slots",
        "-c",
        provider_path(),
        "--from",
        MONDAY_FROM,
        "--to",
        MONDAY_TO,
    ]));

    assert_eq!(free.len(), 3);
    assert_eq!(free[0]["start"], "2025-01-06T09:00:00-05:00");
    assert_eq!(free[0]["end"], "2025-01-06T10:00:00-05:00");
    assert_eq!(free[1]["start"], "2025-01-06T11:00:00-05:00");
    assert_eq!(free[2]["end"], "2025-01-06T17:00:00-05:00");
    assert_eq!(free[0]["timezone"], "America/New_York");
}

#[test]
fn slots_on_blocked_date_is_empty() {
    let free = json_array(timeslot().args([
        "slots",
        "-c",
        provider_path(),
        "--from",
        "2025-01-08T00:00:00-05:00",
        "--to",
        "2025-01-09T00:00:00-05:00",
    ]));
    assert!(free.is_empty());
}

#[test]
fn slots_uses_modified_override() {
    let free = json_array(timeslot().args([
        "slots",
        "-c",
        provider_path(),
        "--from",
        "2025-01-11T00:00:00-05:00",
        "--to",
        "2025-01-12T00:00:00-05:00",
    ]));
    assert_eq!(free.len(), 1);
    assert_eq!(free[0]["start"], "2025-01-11T10:00:00-05:00");
    assert_eq!(free[0]["end"], "2025-01-11T12:00:00-05:00");
}

#[test]
fn slots_with_duration_respects_buffers_and_limit() {
    // The 10:00 booking with 15-minute buffers rules out 09:00 and 11:00.
    let slots = json_array(timeslot().args([
        "slots",
        "-c",
        provider_path(),
        "--from",
        MONDAY_FROM,
        "--to",
        MONDAY_TO,
        "--duration",
        "60",
        "--limit",
        "2",
    ]));

    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0]["start"], "2025-01-06T13:00:00-05:00");
    assert_eq!(slots[1]["start"], "2025-01-06T14:00:00-05:00");
}

#[test]
fn slots_with_zero_duration_fails() {
    timeslot()
        .args([
            "slots",
            "-c",
            provider_path(),
            "--from",
            MONDAY_FROM,
            "--to",
            MONDAY_TO,
            "--duration",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to search for slots"));
}

// ─────────────────────────────────────────────────────────────────────────────
// busy / free
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn busy_skips_cancelled_events() {
    let busy = json_array(timeslot().args([
        "busy",
        "-i",
        calendar_path(),
        "--from",
        MONDAY_FROM,
        "--to",
        MONDAY_TO,
    ]));

    assert_eq!(busy.len(), 1);
    assert_eq!(busy[0]["start"], "2025-01-06T09:30:00-05:00");
    assert_eq!(busy[0]["end"], "2025-01-06T10:00:00-05:00");
}

#[test]
fn busy_expands_recurrences_over_a_week() {
    let busy = json_array(timeslot().args([
        "busy",
        "-i",
        calendar_path(),
        "--from",
        "2025-01-06T00:00:00-05:00",
        "--to",
        "2025-01-13T00:00:00-05:00",
    ]));
    // Five daily standups plus the Tuesday review.
    assert_eq!(busy.len(), 6);
}

#[test]
fn busy_reads_stdin() {
    let busy = json_array(
        timeslot()
            .args(["busy", "--from", MONDAY_FROM, "--to", MONDAY_TO])
            .write_stdin(calendar_ics()),
    );
    assert_eq!(busy.len(), 1);
}

#[test]
fn free_subtracts_calendar_from_weekly_slots() {
    let free = json_array(timeslot().args([
        "free",
        "-i",
        calendar_path(),
        "-c",
        provider_path(),
        "--from",
        MONDAY_FROM,
        "--to",
        MONDAY_TO,
    ]));

    assert_eq!(free.len(), 3);
    assert_eq!(free[0]["start"], "2025-01-06T09:00:00-05:00");
    assert_eq!(free[0]["end"], "2025-01-06T09:30:00-05:00");
    assert_eq!(free[1]["start"], "2025-01-06T10:00:00-05:00");
    assert_eq!(free[1]["end"], "2025-01-06T12:00:00-05:00");
}

#[test]
fn busy_with_startless_event_fails_with_line() {
    timeslot()
        .args(["busy", "--from", MONDAY_FROM, "--to", MONDAY_TO])
        .write_stdin("BEGIN:VCALENDAR\nVERSION:2.0\nBEGIN:VEVENT\nSUMMARY:x\nEND:VEVENT\nEND:VCALENDAR\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse iCalendar input"))
        .stderr(predicate::str::contains("line 3"));
}

// ─────────────────────────────────────────────────────────────────────────────
// export
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn export_writes_icalendar_to_stdout() {
    timeslot()
        .args([
            "export",
            "-c",
            provider_path(),
            "--from",
            MONDAY_FROM,
            "--to",
            MONDAY_TO,
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("BEGIN:VCALENDAR\r\n"))
        .stdout(predicate::str::contains("X-WR-CALNAME:Availability"))
        .stdout(predicate::str::contains("DTSTART:20250106T140000Z"))
        .stdout(predicate::str::contains("DTEND:20250106T150000Z"))
        .stdout(predicate::str::contains("END:VCALENDAR"));
}

#[test]
fn export_writes_to_file() {
    let path = scratch("export.ics");
    timeslot()
        .args([
            "export",
            "-c",
            provider_path(),
            "--from",
            MONDAY_FROM,
            "--to",
            MONDAY_TO,
            "-o",
        ])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = std::fs::read_to_string(&path).expect("export file must exist");
    let _ = std::fs::remove_file(&path);
    assert_eq!(written.matches("BEGIN:VEVENT").count(), 3);
}

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_reports_conflicts_with_existing_booking() {
    let conflicts = json_array(timeslot().args([
        "check",
        "-c",
        provider_path(),
        "--start",
        "2025-01-06T15:00:00Z",
        "--end",
        "2025-01-06T16:00:00Z",
    ]));

    let kinds: Vec<&str> = conflicts
        .iter()
        .map(|c| c["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"overlap"));
    assert!(kinds.contains(&"double-booking"));
    assert!(conflicts.iter().all(|c| c["providers"][0] == "dr-lee"));
}

#[test]
fn check_free_slot_prints_empty_list() {
    timeslot()
        .args([
            "check",
            "-c",
            provider_path(),
            "--start",
            "2025-01-06T19:00:00Z",
            "--end",
            "2025-01-06T20:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));
}

#[test]
fn check_flags_buffer_running_into_lunch() {
    // 13:00-14:00 is free, but the 15-minute lead-in falls in the lunch gap.
    let conflicts = json_array(timeslot().args([
        "check",
        "-c",
        provider_path(),
        "--start",
        "2025-01-06T18:00:00Z",
        "--end",
        "2025-01-06T19:00:00Z",
    ]));
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["kind"], "buffer");
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors and logging
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_config_fails() {
    timeslot()
        .args([
            "slots",
            "-c",
            "/nonexistent/provider.toml",
            "--from",
            MONDAY_FROM,
            "--to",
            MONDAY_TO,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}

#[test]
fn invalid_config_names_the_field() {
    let path = scratch("bad-weekly.toml");
    std::fs::write(&path, "id = \"x\"\n[weekly]\nmonday = [\"9am-5pm\"]\n").unwrap();

    let assert = timeslot()
        .args(["slots", "--from", MONDAY_FROM, "--to", MONDAY_TO, "-c"])
        .arg(&path)
        .assert();
    let _ = std::fs::remove_file(&path);
    assert
        .failure()
        .stderr(predicate::str::contains("weekly.monday[0]"));
}

#[test]
fn unknown_config_key_fails() {
    let path = scratch("unknown-key.toml");
    std::fs::write(&path, "id = \"x\"\ncolour = \"blue\"\n").unwrap();

    let assert = timeslot()
        .args(["slots", "--from", MONDAY_FROM, "--to", MONDAY_TO, "-c"])
        .arg(&path)
        .assert();
    let _ = std::fs::remove_file(&path);
    assert
        .failure()
        .stderr(predicate::str::contains("colour"));
}

#[test]
fn malformed_timestamp_is_rejected_by_argument_parsing() {
    timeslot()
        .args([
            "slots",
            "-c",
            provider_path(),
            "--from",
            "next monday",
            "--to",
            MONDAY_TO,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}

#[test]
fn reversed_window_fails() {
    timeslot()
        .args([
            "busy",
            "-i",
            calendar_path(),
            "--from",
            MONDAY_TO,
            "--to",
            MONDAY_FROM,
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be after"));
}

#[test]
fn verbose_logs_resolution_to_stderr() {
    timeslot()
        .args([
            "slots",
            "-c",
            provider_path(),
            "--from",
            MONDAY_FROM,
            "--to",
            MONDAY_TO,
            "--verbose",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("resolved availability"));
}

#[test]
fn no_subcommand_shows_usage() {
    timeslot()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
