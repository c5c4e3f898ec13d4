use std::path::PathBuf;
use std::process::{Command, Output};

fn table_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("configs/clocks/s3c6410.yaml")
}

fn clktree(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_clktree"))
        .arg("--table")
        .arg(table_path())
        .args(args)
        .output()
        .expect("Failed to execute clktree")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_summary_json() {
    let output = clktree(&["summary", "--json"]);
    assert!(output.status.success());

    let json: serde_json::Value =
        serde_json::from_str(&stdout(&output)).expect("Failed to parse JSON");
    let clocks = json.as_array().expect("summary is an array");
    let pclk = clocks
        .iter()
        .find(|c| c["name"] == "pclk")
        .expect("pclk in summary");
    assert_eq!(pclk["rate_hz"], 66_500_000);
    assert_eq!(pclk["parent"], "hclk2");

    // Depth-first from the roots: the crystal comes first.
    assert_eq!(clocks[0]["name"], "xtal");
    assert_eq!(clocks[0]["depth"], 0);
}

#[test]
fn test_summary_text() {
    let output = clktree(&["summary"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.lines().next().unwrap_or_default().starts_with("xtal"));
    assert!(out.contains("532 MHz"));
    assert!(out.contains("[external]"));
}

#[test]
fn test_rate() {
    let output = clktree(&["rate", "pclk"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("pclk: 66500000 Hz (66.5 MHz)"));

    let output = clktree(&["rate", "uart:2"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("uart:2: 66500000 Hz"));
}

#[test]
fn test_round_rate_does_not_write() {
    let output = clktree(&["round-rate", "armclk", "400M"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("rounds to 532000000 Hz"));
    assert!(!out.contains("reg "));
}

#[test]
fn test_set_rate_reports_register_writes() {
    let output = clktree(&["set-rate", "armclk", "266M"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("armclk: 266000000 Hz (266 MHz)"));
    assert!(out.contains("reg 0x0020: 0x00003310 -> 0x00003311"));
}

#[test]
fn test_variant_changes_armclk_floor() {
    let output = clktree(&["--variant", "s3c6400", "set-rate", "armclk", "50M"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("armclk: 53200000 Hz"));

    // Same request is below the S3C6410 floor.
    let output = clktree(&["set-rate", "armclk", "50M"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_poke_overrides_boot_selector() {
    let output = clktree(&["--poke", "0x1c=0x5", "rate", "mout_mpll"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("mout_mpll: 12000000 Hz"));
}

#[test]
fn test_reparent() {
    let output = clktree(&["reparent", "audio-bus:0", "iis_cdclk0"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("audio-bus:0: 0 Hz"));
    assert!(out.contains("reg 0x001c: 0x00000007 -> 0x00000187"));

    let output = clktree(&["reparent", "audio-bus:1", "iis_cdclk0"]);
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn test_enable_and_disable() {
    let output = clktree(&["enable", "rtc"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("rtc: enable count 1"));

    // Gated off at boot, nothing to drop.
    let output = clktree(&["disable", "rtc"]);
    assert_eq!(output.status.code(), Some(3));

    let output = clktree(&["enable", "watchdog"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("watchdog: not gated"));
}

#[test]
fn test_unknown_clock_is_a_config_error() {
    let output = clktree(&["rate", "nosuch"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_missing_table_is_a_config_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_clktree"))
        .args(["--table", "does/not/exist.yaml", "summary"])
        .output()
        .expect("Failed to execute clktree");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_check_passes_for_reference_table() {
    let output = clktree(&["check", "--json"]);
    let out = stdout(&output);
    assert!(output.status.success(), "check failed: {}", out);

    let report: serde_json::Value = serde_json::from_str(&out).expect("Failed to parse JSON");
    assert_eq!(report["valid"], true);
    assert_eq!(report["errors"].as_array().map(Vec::len), Some(0));
}
