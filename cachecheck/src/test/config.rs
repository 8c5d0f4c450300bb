use std::error::Error;
use std::time::Duration;

use crate::config::{HarnessConfig, SweepCase};
use crate::error::VerifyError;
use crate::util::default_cases;

use super::write_file;

#[test]
fn empty_config_uses_defaults() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = HarnessConfig::from_file(&write_file(dir.path(), "harness.json", "{}"))?;
    assert_eq!(config.reference_timeout(), Duration::from_secs(60));
    assert_eq!(config.cases, default_cases());
    assert_eq!(config.candidate.symbols.counters()[0], "cache_hit_count");
    assert_eq!(config.candidate.artifact_path(), std::path::Path::new("bin").join("csim.so"));
    Ok(())
}

#[test]
fn cases_accept_short_field_names() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let json = r#"{
        "reference_timeout_secs": 5,
        "candidate": { "compiler": "gcc-7", "store_byte": 7, "symbols": { "outcome": "last_result" } },
        "cases": [
            { "s": 2, "E": 1, "b": 2, "trace": "wide.trace" },
            { "index_bits": 14, "associativity": 1024, "offset_bits": 3, "trace": "trans.trace" }
        ]
    }"#;
    let config = HarnessConfig::from_file(&write_file(dir.path(), "harness.json", json))?;
    assert_eq!(config.reference_timeout(), Duration::from_secs(5));
    assert_eq!(config.candidate.compiler, "gcc-7");
    assert_eq!(config.candidate.store_byte, 7);
    assert_eq!(config.candidate.symbols.outcome, "last_result");
    assert_eq!(config.candidate.symbols.read, "sram_cache_read");
    assert_eq!(
        config.cases,
        [SweepCase::new(2, 1, 2, "wide.trace"), SweepCase::new(14, 1024, 3, "trans.trace")]
    );
    Ok(())
}

#[test]
fn unparseable_config_is_a_config_error() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "harness.json", r#"{ "cases": [ { "s": 2 } ] }"#);
    assert!(matches!(HarnessConfig::from_file(&path), Err(VerifyError::Config(_))));
    assert!(matches!(
        HarnessConfig::from_file(&dir.path().join("absent.json")),
        Err(VerifyError::Io { .. })
    ));
    Ok(())
}

#[test]
fn parses_cases_from_the_command_line() {
    assert_eq!("2,1,2,wide.trace".parse::<SweepCase>(), Ok(SweepCase::new(2, 1, 2, "wide.trace")));
    assert_eq!(" 14, 1024 ,3, trans.trace".parse::<SweepCase>(), Ok(SweepCase::new(14, 1024, 3, "trans.trace")));
    for bad in ["2,1,2", "2,1,2,", "x,1,2,t", "2,1,2,t,extra", "-1,1,2,t"] {
        assert!(bad.parse::<SweepCase>().is_err(), "accepted \"{bad}\"");
    }
}
