use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use clipwatch_policy::PolicyConfig;

const HOME_ENV: &str = "CLIPWATCH_HOME";
const HOME_DIR_NAME: &str = ".clipwatch";
const CONFIG_FILE_NAME: &str = "config.toml";
const DB_FILE_NAME: &str = "clipwatch.sqlite";
const SPOOL_DIR_NAME: &str = "alerts";
const LOCK_MARKER_FILE_NAME: &str = "clipboard.lock";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Host identity reported in alerts; falls back to $HOSTNAME.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_host: Option<String>,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub home: PathBuf,
    pub config_file: PathBuf,
    pub db_path: PathBuf,
    pub spool_dir: PathBuf,
    pub lock_marker: PathBuf,
}

impl AgentPaths {
    pub fn resolve() -> Result<Self, String> {
        let home = match std::env::var(HOME_ENV) {
            Ok(value) if !value.is_empty() => PathBuf::from(value),
            _ => {
                let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
                PathBuf::from(home).join(HOME_DIR_NAME)
            }
        };
        Ok(Self {
            config_file: home.join(CONFIG_FILE_NAME),
            db_path: home.join(DB_FILE_NAME),
            spool_dir: home.join(SPOOL_DIR_NAME),
            lock_marker: home.join(LOCK_MARKER_FILE_NAME),
            home,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: AgentConfig,
    pub paths: AgentPaths,
    pub created: bool,
}

pub fn load_or_create() -> Result<ConfigLoad, String> {
    let paths = AgentPaths::resolve()?;
    fs::create_dir_all(&paths.home)
        .map_err(|err| format!("create agent home {}: {}", paths.home.display(), err))?;
    fs::create_dir_all(&paths.spool_dir)
        .map_err(|err| format!("create spool dir {}: {}", paths.spool_dir.display(), err))?;

    if paths.config_file.exists() {
        let contents = fs::read_to_string(&paths.config_file)
            .map_err(|err| format!("read config {}: {}", paths.config_file.display(), err))?;
        let config: AgentConfig = toml::from_str(&contents)
            .map_err(|err| format!("parse config {}: {}", paths.config_file.display(), err))?;
        return Ok(ConfigLoad {
            config,
            paths,
            created: false,
        });
    }

    let config = AgentConfig::default();
    let contents =
        toml::to_string_pretty(&config).map_err(|err| format!("serialize config: {}", err))?;
    fs::write(&paths.config_file, contents)
        .map_err(|err| format!("write config {}: {}", paths.config_file.display(), err))?;

    Ok(ConfigLoad {
        config,
        paths,
        created: true,
    })
}

pub fn resolve_source_host(config: &AgentConfig) -> String {
    if let Some(host) = &config.source_host {
        return host.clone();
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes_with_policy_defaults() {
        let contents = toml::to_string_pretty(&AgentConfig::default()).expect("serialize");
        let parsed: AgentConfig = toml::from_str(&contents).expect("parse");
        assert_eq!(parsed.policy.limit_1h_bytes, 500);
        assert_eq!(parsed.policy.limit_24h_bytes, 1500);
        assert_eq!(parsed.source_host, None);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let parsed: AgentConfig = toml::from_str(
            r#"
            source_host = "workstation-7"

            [policy]
            limit_1h_bytes = 800
            "#,
        )
        .expect("parse");
        assert_eq!(parsed.source_host.as_deref(), Some("workstation-7"));
        assert_eq!(parsed.policy.limit_1h_bytes, 800);
        assert_eq!(parsed.policy.limit_24h_bytes, 1500);
        assert_eq!(parsed.policy.rotation_interval_minutes, 60);
    }
}
