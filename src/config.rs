//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--data-dir`, `--category`, etc.)
//! 2. `$FTREE_CONFIG` environment variable (path to config file)
//! 3. Project-local `.ftree.toml` in the current working directory
//! 4. Global `~/.config/ftree/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

// ── Section configs ──────────────────────────────────────────────────────────

/// General application settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the folder and record files.
    pub data_dir: Option<String>,
    /// Record category to open (`worlds`, `servers`, ...).
    pub category: Option<String>,
}

/// Persistence settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SaveConfig {
    /// Save the folder file after every create or rename.
    /// Deletions always save.
    pub autosave: Option<bool>,
}

/// Logging settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub save: SaveConfig,
    pub log: LogConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default record category.
pub const DEFAULT_CATEGORY: &str = "worlds";
/// Default log filter.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path, which is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("FTREE_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".ftree.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("ftree").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning printed to stderr,
/// since logging is not set up until the config is known).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `Some` values in `other` win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                data_dir: other
                    .general
                    .data_dir
                    .clone()
                    .or(self.general.data_dir),
                category: other
                    .general
                    .category
                    .clone()
                    .or(self.general.category),
            },
            save: SaveConfig {
                autosave: other.save.autosave.or(self.save.autosave),
            },
            log: LogConfig {
                level: other.log.level.clone().or(self.log.level),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Directory holding the category files.
    ///
    /// Falls back to the platform data dir, then to `./.ftree`.
    pub fn data_dir(&self) -> PathBuf {
        match &self.general.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_dir()
                .map(|d| d.join("ftree"))
                .unwrap_or_else(|| PathBuf::from(".ftree")),
        }
    }

    /// Record category to open.
    pub fn category(&self) -> &str {
        self.general.category.as_deref().unwrap_or(DEFAULT_CATEGORY)
    }

    /// Whether creates and renames are saved immediately.
    pub fn autosave(&self) -> bool {
        self.save.autosave.unwrap_or(true)
    }

    /// Log filter directive.
    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.category(), "worlds");
        assert!(cfg.autosave());
        assert_eq!(cfg.log_level(), "warn");
        assert!(cfg.data_dir().to_string_lossy().contains("ftree"));
    }

    #[test]
    fn test_toml_parsing_full() {
        let toml = r#"
[general]
data_dir = "/tmp/ftree-data"
category = "servers"

[save]
autosave = false

[log]
level = "debug"
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert_eq!(cfg.data_dir(), PathBuf::from("/tmp/ftree-data"));
        assert_eq!(cfg.category(), "servers");
        assert!(!cfg.autosave());
        assert_eq!(cfg.log_level(), "debug");
    }

    #[test]
    fn test_toml_parsing_partial() {
        let toml = r#"
[save]
autosave = false
"#;
        let cfg: AppConfig = toml::from_str(toml).expect("parse failed");
        assert!(!cfg.autosave());
        // Everything else should be defaults
        assert_eq!(cfg.category(), "worlds");
        assert_eq!(cfg.log_level(), "warn");
    }

    #[test]
    fn test_toml_parsing_empty() {
        let cfg: AppConfig = toml::from_str("").expect("parse failed");
        assert!(cfg.autosave());
    }

    #[test]
    fn test_merge_overrides() {
        let base = AppConfig {
            general: GeneralConfig {
                data_dir: Some("/a".into()),
                category: Some("worlds".into()),
            },
            ..Default::default()
        };

        let over = AppConfig {
            general: GeneralConfig {
                category: Some("servers".into()),
                ..Default::default()
            },
            save: SaveConfig {
                autosave: Some(false),
            },
            ..Default::default()
        };

        let merged = base.merge(&over);
        assert_eq!(merged.category(), "servers"); // overridden
        assert_eq!(merged.data_dir(), PathBuf::from("/a")); // from base
        assert!(!merged.autosave()); // overridden
    }

    #[test]
    fn test_merge_none_does_not_clear_some() {
        let base = AppConfig {
            log: LogConfig {
                level: Some("info".into()),
            },
            ..Default::default()
        };
        let merged = base.merge(&AppConfig::default());
        assert_eq!(merged.log_level(), "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("test-config.toml");
        let mut f = std::fs::File::create(&cfg_path).expect("create");
        writeln!(
            f,
            r#"
[general]
category = "servers"

[log]
level = "trace"
"#
        )
        .expect("write");

        let cfg = load_file(&cfg_path).expect("load");
        assert_eq!(cfg.category(), "servers");
        assert_eq!(cfg.log_level(), "trace");
        assert!(cfg.autosave());
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(result.is_none());
    }

    #[test]
    fn test_load_invalid_toml_returns_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("bad.toml");
        std::fs::write(&cfg_path, "this is { not valid toml").expect("write");
        assert!(load_file(&cfg_path).is_none());
    }

    #[test]
    fn test_load_with_cli_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("config.toml");
        std::fs::write(
            &cfg_path,
            r#"
[general]
category = "servers"
data_dir = "/from/file"
"#,
        )
        .expect("write");

        let cli_overrides = AppConfig {
            general: GeneralConfig {
                data_dir: Some("/from/cli".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let cfg = AppConfig::load(Some(&cfg_path), Some(&cli_overrides));
        // CLI override wins
        assert_eq!(cfg.data_dir(), PathBuf::from("/from/cli"));
        // File value preserved (not overridden by CLI)
        assert_eq!(cfg.category(), "servers");
    }
}
