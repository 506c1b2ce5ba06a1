//! Configuration parser for loading workspace files.
//!
//! Loads YAML from disk, applies environment overrides and the `.env` file
//! next to the workspace file.

use crate::error::{ConfigError, EngineError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::WorkspaceConfig;

/// Environment variable overriding the workspace name.
pub const ENV_WORKSPACE: &str = "RECONCILE_WORKSPACE";

/// Environment variable overriding the state file path.
pub const ENV_STATE_PATH: &str = "RECONCILE_STATE_PATH";

/// Configuration parser for loading workspace configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<WorkspaceConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(EngineError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<WorkspaceConfig> {
        debug!("Parsing YAML configuration");

        let config: WorkspaceConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            EngineError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration for workspace: {}", config.workspace);
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<WorkspaceConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut WorkspaceConfig) {
        if let Ok(name) = std::env::var(ENV_WORKSPACE) {
            debug!("Overriding workspace from environment");
            config.workspace = name;
        }

        if let Ok(path) = std::env::var(ENV_STATE_PATH) {
            debug!("Overriding state.path from environment");
            config.state.path = Some(path);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                EngineError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Resolves the state file path for `config` loaded from `config_file`.
    #[must_use]
    pub fn state_path(config: &WorkspaceConfig, config_file: &Path) -> PathBuf {
        let base = config_file.parent().unwrap_or_else(|| Path::new("."));
        config.state.path.as_ref().map_or_else(
            || base.join(DEFAULT_STATE_DIR).join(DEFAULT_STATE_FILE),
            |path| {
                let path = PathBuf::from(path);
                if path.is_absolute() { path } else { base.join(path) }
            },
        )
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["reconcile.yaml", "reconcile.yml"];

/// Default state directory, next to the workspace file.
pub const DEFAULT_STATE_DIR: &str = ".reconcile";

/// Default state file name.
pub const DEFAULT_STATE_FILE: &str = "state.json";

/// Finds the configuration file in the current directory or parent directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(EngineError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
workspace: demo
";
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("valid yaml");
        assert_eq!(config.workspace, "demo");
        assert!(config.resources.is_empty());
        assert!(config.state.path.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
workspace: site
state:
  path: state/site.json
provider:
  base_dir: ./out
resources:
  - type: local_file
    name: index
    config:
      path: index.html
      content: "<h1>hi</h1>"
      metadata:
        - key: owner
          value: web
data:
  - type: local_file_info
    name: robots
    config:
      path: robots.txt
"#;
        let config = ConfigParser::new().parse_yaml(yaml, None).expect("valid yaml");
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.resources[0].address(), "local_file.index");
        assert_eq!(config.provider.get("base_dir").and_then(|v| v.as_str()), Some("./out"));
        assert_eq!(config.data[0].type_name, "local_file_info");
        assert!(config.resources[0].config["metadata"].is_array());
    }

    #[test]
    fn test_parse_error_has_location() {
        let err = ConfigParser::new()
            .parse_yaml("resources: 3", Some(Path::new("bad.yaml")))
            .expect_err("missing workspace");
        assert!(matches!(
            err,
            EngineError::Config(ConfigError::ParseError { location: Some(_), .. })
        ));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let dir = TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("reconcile.yaml"), "workspace: up\n").expect("write");
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).expect("mkdir");

        let found = find_config_file(&nested).expect("found");
        assert_eq!(found, dir.path().join("reconcile.yaml"));
    }

    #[test]
    fn test_state_path() {
        let mut config = ConfigParser::new().parse_yaml("workspace: w\n", None).expect("yaml");
        let file = Path::new("/ws/reconcile.yaml");
        assert_eq!(
            ConfigParser::state_path(&config, file),
            PathBuf::from("/ws/.reconcile/state.json")
        );
        config.state.path = Some("custom.json".to_string());
        assert_eq!(ConfigParser::state_path(&config, file), PathBuf::from("/ws/custom.json"));
    }
}
