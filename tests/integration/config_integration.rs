//! Configuration layering as seen by an embedding host

use concord::config::{ConcordConfig, ConfigLoader};
use concord::ApiError;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Point the global config at an empty directory and clear overrides.
fn isolate(temp: &TempDir) -> Vec<(&'static str, Option<String>)> {
    let vars = [
        "XDG_CONFIG_HOME",
        "CONCORD_ENV",
        "CONCORD__SYNC__ATTEMPT_BUDGET",
        "CONCORD__SYNC__GOSSIP",
        "CONCORD__LOGGING__FORMAT",
    ];
    let saved = vars.iter().map(|k| (*k, std::env::var(k).ok())).collect();
    for k in vars {
        std::env::remove_var(k);
    }
    std::env::set_var("XDG_CONFIG_HOME", temp.path().join("xdg"));
    saved
}

fn restore(saved: Vec<(&'static str, Option<String>)>) {
    for (k, v) in saved {
        match v {
            Some(v) => std::env::set_var(k, v),
            None => std::env::remove_var(k),
        }
    }
}

fn write_workspace_file(root: &std::path::Path, name: &str, contents: &str) {
    let dir = root.join("config");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_environment_profile_file_layers_over_base() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    let saved = isolate(&temp);

    write_workspace_file(
        temp.path(),
        "config.toml",
        "[sync]\nattempt_budget = 5\n\n[logging]\nlevel = \"warn\"\n",
    );
    write_workspace_file(temp.path(), "staging.toml", "[sync]\ngossip = false\n");
    std::env::set_var("CONCORD_ENV", "staging");

    let config = ConfigLoader::load(temp.path());
    restore(saved);
    let config = config.unwrap();

    assert_eq!(config.sync.attempt_budget, 5);
    assert!(!config.sync.gossip);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.storage.store_path, PathBuf::from(".concord/store"));
}

#[test]
fn test_environment_variables_win() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    let saved = isolate(&temp);

    write_workspace_file(temp.path(), "config.toml", "[sync]\nattempt_budget = 5\n");
    std::env::set_var("CONCORD__SYNC__ATTEMPT_BUDGET", "11");
    std::env::set_var("CONCORD__SYNC__GOSSIP", "false");

    let config = ConfigLoader::load(temp.path());
    restore(saved);
    let config = config.unwrap();

    assert_eq!(config.sync.attempt_budget, 11);
    assert!(!config.sync.gossip);
}

#[test]
fn test_invalid_values_fail_validation() {
    let _lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let temp = TempDir::new().unwrap();
    let saved = isolate(&temp);

    write_workspace_file(
        temp.path(),
        "config.toml",
        "[sync]\nattempt_budget = 0\n\n[logging]\nformat = \"yaml\"\n",
    );

    let result = ConcordConfig::load_validated(temp.path());
    restore(saved);

    match result {
        Err(ApiError::ConfigError(msg)) => {
            assert!(msg.contains("attempt_budget"));
            assert!(msg.contains("yaml"));
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
}

#[test]
fn test_store_path_resolves_against_workspace() {
    let config = ConfigLoader::defaults();
    let root = PathBuf::from("/srv/rooms");
    assert_eq!(
        config.storage.resolve(&root),
        PathBuf::from("/srv/rooms/.concord/store")
    );

    let mut absolute = config.clone();
    absolute.storage.store_path = PathBuf::from("/var/lib/concord");
    assert_eq!(
        absolute.storage.resolve(&root),
        PathBuf::from("/var/lib/concord")
    );
}
