use std::path::PathBuf;

use anyhow::{anyhow, Result};
use models::DeletePolicy;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 3333, worker_threads: Some(4) }
    }
}

/// Where the record documents live and how deletes treat references.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_fleet_file")]
    pub fleet_file: String,
    #[serde(default = "default_catalog_file")]
    pub catalog_file: String,
    #[serde(default)]
    pub delete_policy: DeletePolicy,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            fleet_file: default_fleet_file(),
            catalog_file: default_catalog_file(),
            delete_policy: DeletePolicy::default(),
        }
    }
}

fn default_data_dir() -> String { "data".into() }
fn default_fleet_file() -> String { "fleet.json".into() }
fn default_catalog_file() -> String { "catalog.json".into() }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    /// Configuration built only from defaults and environment variables,
    /// used when no config file is present.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::default();
        if let Ok(host) = std::env::var("SERVER_HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = std::env::var("SERVER_PORT").ok().and_then(|p| p.parse::<u16>().ok()) {
            cfg.server.port = port;
        }
        cfg.server.worker_threads = std::env::var("TOKIO_WORKER_THREADS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());
        if let Ok(policy) = std::env::var("DELETE_POLICY") {
            cfg.storage.delete_policy = policy.parse().map_err(|e| anyhow!("DELETE_POLICY: {e}"))?;
        }
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.storage.normalize_from_env();
        self.storage.validate()?;
        Ok(())
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl StorageConfig {
    pub fn normalize_from_env(&mut self) {
        // DATA_DIR wins over the file so deployments can relocate data without editing it
        if let Ok(dir) = std::env::var("DATA_DIR") {
            if !dir.trim().is_empty() {
                self.data_dir = dir;
            }
        }
        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (key, name) in [("storage.fleet_file", &self.fleet_file), ("storage.catalog_file", &self.catalog_file)] {
            if name.trim().is_empty() {
                return Err(anyhow!("{key} must not be empty"));
            }
            if name.contains('/') || name.contains('\\') {
                return Err(anyhow!("{key} must be a file name inside storage.data_dir"));
            }
        }
        if self.fleet_file == self.catalog_file {
            return Err(anyhow!("storage.fleet_file and storage.catalog_file must differ"));
        }
        Ok(())
    }

    pub fn fleet_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.fleet_file)
    }

    pub fn catalog_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join(&self.catalog_file)
    }
}
