// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

fn clear_all() {
    for key in [
        "CSV_OUTPUT_DIR",
        "AD_DOMAIN_PREFIX",
        "TASK_MAX_RETRIES",
        "TASK_RETRY_DELAY",
        "TASK_BATCH_SIZE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn defaults_apply_when_unset() {
    clear_all();
    let cfg = Config::from_env();
    assert_eq!(cfg.csv_output_dir, "/tmp/arw_csv_files");
    assert_eq!(cfg.task.max_retries, 3);
    assert_eq!(cfg.task.batch_size, 10);
    assert!(cfg.ad_domain_prefix.is_none());
}

#[test]
#[serial]
fn env_vars_override_defaults() {
    clear_all();
    std::env::set_var("CSV_OUTPUT_DIR", "/var/arw/csv");
    std::env::set_var("AD_DOMAIN_PREFIX", "CORP");
    std::env::set_var("TASK_MAX_RETRIES", "7");
    let cfg = Config::from_env();
    assert_eq!(cfg.csv_output_dir, "/var/arw/csv");
    assert_eq!(cfg.ad_domain_prefix.as_deref(), Some("CORP"));
    assert_eq!(cfg.task.max_retries, 7);
    clear_all();
}

#[test]
#[serial]
fn malformed_numeric_env_falls_back_to_default() {
    clear_all();
    std::env::set_var("TASK_BATCH_SIZE", "not-a-number");
    let cfg = Config::from_env();
    assert_eq!(cfg.task.batch_size, 10);
    clear_all();
}
