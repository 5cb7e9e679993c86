//! Tests against a real modem.
//!
//! Ignored by default. Run with:
//! `AT_TEST_SERIAL_PORT=/dev/ttyAMA0 cargo test --features hardware-tests -- --ignored`

#![cfg(feature = "hardware-tests")]

use at_test_driver::config::ConfigLoader;
use at_test_driver::provision::NoopProvisioner;
use at_test_driver::runner::{open_serial, run_plan, Plan};
use at_test_driver::RunStatus;

#[test]
#[ignore]
fn test_timer_case_on_hardware() {
    let config = ConfigLoader::load().expect("configuration").into_config();

    let plan = Plan::new(0, Some(11), &config).unwrap();
    let summary = run_plan(plan, &config, &NoopProvisioner, open_serial)
        .expect("modem should be reachable");

    assert_eq!(summary.report.status, RunStatus::Completed { total: 1 });
}

#[test]
#[ignore]
fn test_missing_device_is_fatal() {
    let mut config = ConfigLoader::with_defaults().into_config();
    config.serial.port = "/dev/at_test_missing_device".to_string();

    let plan = Plan::new(0, Some(12), &config).unwrap();
    let err = run_plan(plan, &config, &NoopProvisioner, open_serial).unwrap_err();

    assert_eq!(err.exit_code(), at_test_driver::error::EXIT_ENVIRONMENT);
}
