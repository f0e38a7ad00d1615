use conf_portal::{
    AppConfig,
    config::Env,
    guard::{LOGIN_PATH, RehydrationPolicy},
};
use serial_test::serial;
use std::{env, panic, path::PathBuf};

const CONFIG_VARS: [&str; 8] = [
    "APP_ENV",
    "PORTAL_BIND_ADDR",
    "AUTH_API_URL",
    "AUTH_API_KEY",
    "PORTAL_JWT_SECRET",
    "SESSION_STORE_PATH",
    "TICKET_CATALOG_PATH",
    "GUARD_REHYDRATION",
];

// --- Setup/Teardown Utilities ---

/// Runs `test` with a clean configuration environment and restores the previous
/// values afterwards, even if the test panics.
fn run_with_env<T, R>(test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> = CONFIG_VARS
        .iter()
        .map(|&var| (var, env::var(var).ok()))
        .collect();

    unsafe {
        for var in CONFIG_VARS {
            env::remove_var(var);
        }
    }

    let result = panic::catch_unwind(test);

    for (key, original_value) in originals.into_iter().rev() {
        unsafe {
            match original_value {
                Some(val) => env::set_var(key, val),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

// --- Tests ---

#[test]
#[serial]
fn test_production_config_fails_fast_without_secrets() {
    let result = run_with_env(|| {
        panic::catch_unwind(|| {
            unsafe {
                env::set_var("APP_ENV", "production");
                env::set_var("AUTH_API_URL", "https://api.example.org");
            }
            // AUTH_API_KEY and PORTAL_JWT_SECRET are missing.
            AppConfig::load()
        })
    });

    assert!(
        result.is_err(),
        "Production config loading should panic on missing secrets"
    );
}

#[test]
#[serial]
fn test_production_config_loads_when_complete() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("APP_ENV", "production");
            env::set_var("AUTH_API_URL", "https://api.example.org");
            env::set_var("AUTH_API_KEY", "key");
            env::set_var("PORTAL_JWT_SECRET", "prod-secret");
            env::set_var("TICKET_CATALOG_PATH", "/etc/portal/tickets.json");
        }
        AppConfig::load()
    });

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(
        config.ticket_catalog_path,
        Some(PathBuf::from("/etc/portal/tickets.json"))
    );
}

#[test]
#[serial]
fn test_local_config_uses_defaults() {
    let config = run_with_env(AppConfig::load);

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.bind_addr, "0.0.0.0:3000");
    assert_eq!(config.auth_api_url, "http://localhost:8080");
    assert_eq!(config.jwt_secret, "conf-portal-local-development-secret");
    assert_eq!(config.session_store_path, PathBuf::from("./data/sessions.json"));
    assert!(config.ticket_catalog_path.is_none());
    assert_eq!(config.rehydration, RehydrationPolicy::AwaitRehydration);
}

#[test]
#[serial]
fn test_rehydration_policy_can_be_switched() {
    let config = run_with_env(|| {
        unsafe {
            env::set_var("GUARD_REHYDRATION", "redirect");
        }
        AppConfig::load()
    });

    let guard = config.guard_config();
    assert_eq!(guard.rehydration, RehydrationPolicy::RedirectImmediately);
    assert_eq!(guard.login_path, LOGIN_PATH);
}
