use std::fs::File;
use std::io::Write;

use rstest::rstest;
use soc_config::load_telemetry_csv;
use tempfile::tempdir;

const HEADER: &str =
    "timestamp,soc,is_charging,ignition_on,charging_level,time_to_full_l2,time_to_full_l3";

fn write_csv(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("telemetry.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "{HEADER}").unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[rstest]
fn loads_charging_session() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        &dir,
        "2024-05-01T18:00:00Z,60.0,true,false,LEVEL_2,120,\n\
         2024-05-01T19:00:00Z,80.0,true,false,LEVEL_2,60,\n\
         2024-05-01T20:00:00Z,100.0,false,false,,,\n",
    );
    let rows = load_telemetry_csv(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows[0].is_charging);
    assert_eq!(rows[1].time_to_full_l2, Some(60.0));
    assert_eq!(rows[2].charging_level, None);
    assert!(rows[0].timestamp < rows[2].timestamp);
}

#[rstest]
fn header_only_file_is_empty() {
    let dir = tempdir().unwrap();
    let path = write_csv(&dir, "");
    let rows = load_telemetry_csv(&path).unwrap();
    assert!(rows.is_empty());
}

#[rstest]
fn rejects_wrong_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "time,soc").unwrap();
    writeln!(f, "2024-05-01T18:00:00Z,60.0").unwrap();
    let err = load_telemetry_csv(&path).unwrap_err();
    assert!(format!("{err:#}").contains("must have headers"));
}

#[rstest]
fn rejects_out_of_order_rows() {
    let dir = tempdir().unwrap();
    let path = write_csv(
        &dir,
        "2024-05-01T19:00:00Z,60.0,true,false,,120,\n\
         2024-05-01T18:00:00Z,61.0,true,false,,110,\n",
    );
    let err = load_telemetry_csv(&path).unwrap_err();
    assert!(format!("{err:#}").contains("time order"));
}

#[rstest]
#[case("not-a-time,60.0,true,false,,,\n")]
#[case("2024-05-01T18:00:00Z,sixty,true,false,,,\n")]
#[case("2024-05-01T18:00:00Z,60.0,maybe,false,,,\n")]
fn rejects_malformed_cells(#[case] body: &str) {
    let dir = tempdir().unwrap();
    let path = write_csv(&dir, body);
    let err = load_telemetry_csv(&path).unwrap_err();
    assert!(format!("{err:#}").contains("invalid CSV row 2"));
}

#[rstest]
fn missing_file_reports_path() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.csv");
    let err = load_telemetry_csv(&path).unwrap_err();
    assert!(format!("{err:#}").contains("open telemetry CSV"));
}
