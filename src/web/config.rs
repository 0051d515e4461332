use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

use crate::hub::HubConfig;
use crate::identity::AuthConfig;
use crate::location::{MovementPolicy, ReporterId, VehicleId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub hub: HubConfig,
    #[serde(default)]
    pub policy: MovementPolicy,
    #[serde(default)]
    pub vehicles: Vec<VehicleAssignment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub journal_folder: PathBuf,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct VehicleAssignment {
    pub reporter_id: ReporterId,
    pub vehicle_id: VehicleId,
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)?;
        Ok(config)
    }

    pub fn vehicle_map(&self) -> HashMap<ReporterId, VehicleId> {
        self.vehicles
            .iter()
            .map(|v| (v.reporter_id, v.vehicle_id))
            .collect()
    }
}
