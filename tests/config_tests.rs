//! Settings loaded from the process environment.

use std::sync::{Mutex, OnceLock};

use tempfile::TempDir;

use chattr::config::Settings;
use chattr::error::ChattrError;

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

const CONFIG_ENV_VARS: [&str; 8] = [
    "MODEL__API_KEY",
    "MODEL__URL",
    "MODEL__TEMPERATURE",
    "DIRECTORY__BASE",
    "MCP__PATH",
    "MCP__VIDEO_TOOLS",
    "CHARACTER__NAME",
    "SHORT_TERM_MEMORY__URL",
];

struct EnvGuard {
    saved: Vec<(String, Option<String>)>,
}

impl EnvGuard {
    fn capture(keys: &[&str]) -> Self {
        let saved = keys
            .iter()
            .map(|key| ((*key).to_string(), std::env::var(key).ok()))
            .collect();
        for key in keys {
            std::env::remove_var(key);
        }
        Self { saved }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.saved {
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
        }
    }
}

fn env_lock_guard() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[test]
fn load_reads_nested_environment_keys() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::capture(&CONFIG_ENV_VARS);
    let tmp = TempDir::new().unwrap();

    std::env::set_var("MODEL__API_KEY", "sk-env");
    std::env::set_var("DIRECTORY__BASE", tmp.path());
    std::env::set_var("MCP__PATH", tmp.path().join("tools.json"));
    std::env::set_var("MCP__VIDEO_TOOLS", "render,animate");
    std::env::set_var("CHARACTER__NAME", "Cleopatra");
    std::env::set_var("SHORT_TERM_MEMORY__URL", "memory://");

    let settings = Settings::load().unwrap();
    assert_eq!(settings.model.require_api_key().unwrap().expose(), "sk-env");
    assert_eq!(settings.character.name, "Cleopatra");
    assert_eq!(settings.mcp.video_tools, vec!["render", "animate"]);
    assert_eq!(settings.session_store_url(), "memory://");
    assert!(tmp.path().join("assets/video").is_dir());
    assert!(tmp.path().join("assets/prompts").is_dir());
}

#[test]
fn load_without_api_key_fails_before_anything_else() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::capture(&CONFIG_ENV_VARS);
    let tmp = TempDir::new().unwrap();
    std::env::set_var("DIRECTORY__BASE", tmp.path().join("never"));

    let err = Settings::load().unwrap_err();
    assert!(matches!(err, ChattrError::Configuration(ref msg) if msg.contains("MODEL__API_KEY")));
    assert!(err.is_fatal());
    assert!(!tmp.path().join("never").exists());
}

#[test]
fn load_rejects_out_of_range_temperature() {
    let _lock = env_lock_guard();
    let _env = EnvGuard::capture(&CONFIG_ENV_VARS);
    let tmp = TempDir::new().unwrap();
    std::env::set_var("MODEL__API_KEY", "sk-env");
    std::env::set_var("DIRECTORY__BASE", tmp.path());
    std::env::set_var("MODEL__TEMPERATURE", "-0.1");

    let err = Settings::load().unwrap_err();
    assert!(matches!(err, ChattrError::Validation(_)));
    assert!(!err.is_fatal());
}
