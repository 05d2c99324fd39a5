//! Layered configuration loading.
//!
//! The priority chain (later overrides earlier):
//! 1. Built-in defaults ([`WatchConfig::default()`])
//! 2. User-level: `~/.uidwatch/config.toml`
//! 3. Workspace-level: `./.uidwatch/config.toml`
//! 4. `UIDWATCH_*` environment variables
//!
//! Each field in the final [`EffectiveConfig`] is annotated with the
//! [`ConfigSource`] that determined its value.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{WatchConfig, CONFIG_DIRNAME, CONFIG_FILENAME};
use crate::UidWatchError;

/// Config files larger than this are rejected.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Where a configuration value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    BuiltinDefault,
    UserFile(PathBuf),
    WorkspaceFile(PathBuf),
    EnvVar(String),
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::BuiltinDefault => write!(f, "built-in default"),
            ConfigSource::UserFile(p) => write!(f, "user file: {}", p.display()),
            ConfigSource::WorkspaceFile(p) => write!(f, "workspace file: {}", p.display()),
            ConfigSource::EnvVar(name) => write!(f, "env var: {name}"),
        }
    }
}

/// The merged config plus provenance for each field path.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub config: WatchConfig,
    /// Dot-separated field path -> the source that determined its value.
    pub sources: BTreeMap<String, ConfigSource>,
    /// Config files that were found and loaded, in priority order.
    pub source_files: Vec<PathBuf>,
}

/// Layered configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    workspace_config_path: Option<PathBuf>,
    skip_env: bool,
}

/// Mapping from a `UIDWATCH_*` variable to a TOML field path.
pub struct EnvMapping {
    pub env_var: &'static str,
    pub toml_path: &'static [&'static str],
    pub numeric: bool,
}

/// All supported environment variable overrides.
pub const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        env_var: "UIDWATCH_DEFAULT_TIMEOUT_MS",
        toml_path: &["default_timeout_ms"],
        numeric: true,
    },
    EnvMapping {
        env_var: "UIDWATCH_READY_TIMEOUT_MS",
        toml_path: &["ready_timeout_ms"],
        numeric: true,
    },
    EnvMapping {
        env_var: "UIDWATCH_TEARDOWN_GRACE_MS",
        toml_path: &["teardown_grace_ms"],
        numeric: true,
    },
    EnvMapping {
        env_var: "UIDWATCH_ADB_PROGRAM",
        toml_path: &["adb", "program"],
        numeric: false,
    },
    EnvMapping {
        env_var: "UIDWATCH_ADB_SERIAL",
        toml_path: &["adb", "serial"],
        numeric: false,
    },
];

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the user config file path.
    #[must_use]
    pub fn with_user_path(mut self, path: PathBuf) -> Self {
        self.user_config_path = Some(path);
        self
    }

    /// Override the workspace config file path.
    #[must_use]
    pub fn with_workspace_path(mut self, path: PathBuf) -> Self {
        self.workspace_config_path = Some(path);
        self
    }

    /// Ignore `UIDWATCH_*` environment variables.
    #[must_use]
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    fn user_path(&self) -> PathBuf {
        self.user_config_path.clone().unwrap_or_else(|| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            PathBuf::from(home).join(CONFIG_DIRNAME).join(CONFIG_FILENAME)
        })
    }

    fn workspace_path(&self) -> PathBuf {
        self.workspace_config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIRNAME).join(CONFIG_FILENAME))
    }

    /// Load and merge configuration from all sources.
    pub fn load(&self) -> Result<EffectiveConfig, UidWatchError> {
        let mut sources = BTreeMap::new();
        let mut source_files = Vec::new();

        let mut merged = toml::Value::try_from(WatchConfig::default())
            .map_err(|e| UidWatchError::ConfigError(format!("failed to serialize defaults: {e}")))?;
        record_sources(&merged, &mut sources, &ConfigSource::BuiltinDefault);

        let user_path = self.user_path();
        if user_path.exists() {
            let layer = read_layer(&user_path, "user")?;
            deep_merge(&mut merged, &layer);
            record_sources(&layer, &mut sources, &ConfigSource::UserFile(user_path.clone()));
            source_files.push(user_path);
        }

        let workspace_path = self.workspace_path();
        if workspace_path.exists() {
            let layer = read_layer(&workspace_path, "workspace")?;
            deep_merge(&mut merged, &layer);
            record_sources(
                &layer,
                &mut sources,
                &ConfigSource::WorkspaceFile(workspace_path.clone()),
            );
            source_files.push(workspace_path);
        }

        if !self.skip_env {
            apply_env_overrides(&mut merged, &mut sources)?;
        }

        let config: WatchConfig = merged
            .try_into()
            .map_err(|e| UidWatchError::ConfigError(format!("failed to parse merged config: {e}")))?;
        validate_config(&config)?;

        tracing::debug!(files = source_files.len(), "loaded uidwatch config");

        Ok(EffectiveConfig {
            config,
            sources,
            source_files,
        })
    }
}

fn read_layer(path: &Path, label: &str) -> Result<toml::Value, UidWatchError> {
    let content = read_config_file(path)?;
    toml::from_str(&content)
        .map_err(|e| UidWatchError::ConfigError(format!("invalid {label} config: {e}")))
}

/// Read a config file, enforcing the size limit.
fn read_config_file(path: &Path) -> Result<String, UidWatchError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        UidWatchError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })?;

    if metadata.len() > MAX_CONFIG_FILE_SIZE {
        return Err(UidWatchError::ConfigError(format!(
            "config file {} exceeds maximum size of {} bytes (actual: {} bytes)",
            path.display(),
            MAX_CONFIG_FILE_SIZE,
            metadata.len()
        )));
    }

    std::fs::read_to_string(path).map_err(|e| {
        UidWatchError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
    })
}

/// Deep-merge `overlay` into `base`. Tables merge field-by-field; scalars
/// and arrays are replaced.
fn deep_merge(base: &mut toml::Value, overlay: &toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                if let Some(base_val) = base_table.get_mut(key) {
                    deep_merge(base_val, overlay_val);
                } else {
                    base_table.insert(key.clone(), overlay_val.clone());
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn record_sources(
    layer: &toml::Value,
    sources: &mut BTreeMap<String, ConfigSource>,
    source: &ConfigSource,
) {
    fn walk(
        value: &toml::Value,
        prefix: Option<&str>,
        sources: &mut BTreeMap<String, ConfigSource>,
        source: &ConfigSource,
    ) {
        if let toml::Value::Table(table) = value {
            for (key, val) in table {
                let path = match prefix {
                    Some(p) => format!("{p}.{key}"),
                    None => key.clone(),
                };
                sources.insert(path.clone(), source.clone());
                walk(val, Some(&path), sources, source);
            }
        }
    }
    walk(layer, None, sources, source);
}

fn apply_env_overrides(
    merged: &mut toml::Value,
    sources: &mut BTreeMap<String, ConfigSource>,
) -> Result<(), UidWatchError> {
    for mapping in ENV_MAPPINGS {
        let Ok(raw) = std::env::var(mapping.env_var) else {
            continue;
        };
        if raw.chars().any(|c| c.is_control()) {
            return Err(UidWatchError::ConfigError(format!(
                "environment variable {} contains control characters",
                mapping.env_var
            )));
        }
        let value = if mapping.numeric {
            let num: i64 = raw.trim().parse().map_err(|e| {
                UidWatchError::ConfigError(format!(
                    "environment variable {} must be numeric: {e}",
                    mapping.env_var
                ))
            })?;
            toml::Value::Integer(num)
        } else {
            toml::Value::String(raw)
        };
        set_nested_value(merged, mapping.toml_path, value);
        sources.insert(
            mapping.toml_path.join("."),
            ConfigSource::EnvVar(mapping.env_var.to_string()),
        );
    }
    Ok(())
}

/// Set a value at a nested path, creating intermediate tables as needed.
fn set_nested_value(root: &mut toml::Value, path: &[&str], value: toml::Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    let toml::Value::Table(table) = root else {
        return;
    };
    if rest.is_empty() {
        table.insert((*first).to_string(), value);
        return;
    }
    let entry = table
        .entry((*first).to_string())
        .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    set_nested_value(entry, rest, value);
}

fn validate_config(config: &WatchConfig) -> Result<(), UidWatchError> {
    if config.default_timeout_ms == 0 {
        return Err(UidWatchError::ConfigError(
            "default_timeout_ms must be greater than zero".into(),
        ));
    }
    if config.ready_timeout_ms == 0 {
        return Err(UidWatchError::ConfigError(
            "ready_timeout_ms must be greater than zero".into(),
        ));
    }
    if config.ready_prefix.trim().is_empty() {
        return Err(UidWatchError::ConfigError(
            "ready_prefix cannot be empty".into(),
        ));
    }
    if config.adb.enabled && config.adb.program.trim().is_empty() {
        return Err(UidWatchError::ConfigError(
            "adb.program cannot be empty when adb is enabled".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Env vars are process-global; tests that read them must not overlap.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for mapping in ENV_MAPPINGS {
            std::env::remove_var(mapping.env_var);
        }
    }

    fn write_config(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn defaults_when_no_files() {
        let tmp = TempDir::new().unwrap();
        let effective = ConfigLoader::new()
            .with_user_path(tmp.path().join("missing-user.toml"))
            .with_workspace_path(tmp.path().join("missing-ws.toml"))
            .without_env()
            .load()
            .unwrap();
        assert_eq!(effective.config, WatchConfig::default());
        assert!(effective.source_files.is_empty());
        assert_eq!(
            effective.sources.get("default_timeout_ms"),
            Some(&ConfigSource::BuiltinDefault)
        );
    }

    #[test]
    fn workspace_overrides_user() {
        let tmp = TempDir::new().unwrap();
        let user = write_config(
            tmp.path(),
            "user.toml",
            "default_timeout_ms = 1000\nteardown_grace_ms = 50\n",
        );
        let ws = write_config(tmp.path(), "ws.toml", "default_timeout_ms = 2000\n");

        let effective = ConfigLoader::new()
            .with_user_path(user.clone())
            .with_workspace_path(ws.clone())
            .without_env()
            .load()
            .unwrap();

        assert_eq!(effective.config.default_timeout_ms, 2000);
        assert_eq!(effective.config.teardown_grace_ms, 50);
        assert_eq!(effective.source_files, vec![user.clone(), ws.clone()]);
        assert_eq!(
            effective.sources.get("default_timeout_ms"),
            Some(&ConfigSource::WorkspaceFile(ws))
        );
        assert_eq!(
            effective.sources.get("teardown_grace_ms"),
            Some(&ConfigSource::UserFile(user))
        );
    }

    #[test]
    fn nested_adb_table_merges() {
        let tmp = TempDir::new().unwrap();
        let user = write_config(tmp.path(), "user.toml", "[adb]\nprogram = \"/opt/adb\"\n");
        let ws = write_config(tmp.path(), "ws.toml", "[adb]\nserial = \"R58M\"\n");

        let effective = ConfigLoader::new()
            .with_user_path(user)
            .with_workspace_path(ws)
            .without_env()
            .load()
            .unwrap();

        assert_eq!(effective.config.adb.program, "/opt/adb");
        assert_eq!(effective.config.adb.serial.as_deref(), Some("R58M"));
        assert!(effective.config.adb.enabled);
    }

    #[test]
    fn env_overrides_files() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let tmp = TempDir::new().unwrap();
        let ws = write_config(tmp.path(), "ws.toml", "default_timeout_ms = 2000\n");

        std::env::set_var("UIDWATCH_DEFAULT_TIMEOUT_MS", "321");
        std::env::set_var("UIDWATCH_ADB_SERIAL", "emulator-5556");
        let result = ConfigLoader::new()
            .with_user_path(tmp.path().join("none.toml"))
            .with_workspace_path(ws)
            .load();
        clear_env();

        let effective = result.unwrap();
        assert_eq!(effective.config.default_timeout_ms, 321);
        assert_eq!(effective.config.adb.serial.as_deref(), Some("emulator-5556"));
        assert_eq!(
            effective.sources.get("adb.serial"),
            Some(&ConfigSource::EnvVar("UIDWATCH_ADB_SERIAL".into()))
        );
    }

    #[test]
    fn non_numeric_env_is_rejected() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let tmp = TempDir::new().unwrap();
        std::env::set_var("UIDWATCH_READY_TIMEOUT_MS", "soon");
        let result = ConfigLoader::new()
            .with_user_path(tmp.path().join("a.toml"))
            .with_workspace_path(tmp.path().join("b.toml"))
            .load();
        clear_env();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("UIDWATCH_READY_TIMEOUT_MS"));
    }

    #[test]
    fn zero_timeout_fails_validation() {
        let tmp = TempDir::new().unwrap();
        let ws = write_config(tmp.path(), "ws.toml", "default_timeout_ms = 0\n");
        let err = ConfigLoader::new()
            .with_user_path(tmp.path().join("none.toml"))
            .with_workspace_path(ws)
            .without_env()
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("default_timeout_ms"));
    }

    #[test]
    fn invalid_toml_names_layer() {
        let tmp = TempDir::new().unwrap();
        let user = write_config(tmp.path(), "user.toml", "default_timeout_ms = [");
        let err = ConfigLoader::new()
            .with_user_path(user)
            .with_workspace_path(tmp.path().join("none.toml"))
            .without_env()
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("invalid user config"));
    }
}
