use serde::{Deserialize, Serialize};
use std::{
    fs::{read_to_string, write},
    path::Path,
};

use crate::error::CagError;

/// Graph parameter defaults applied at creation time, before caller-supplied
/// geography/time-scale/history-range overrides are merged in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineDefaults {
    pub engine: String,
    pub time_scale: String,
    pub num_steps: u32,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        EngineDefaults {
            engine: "dyse".to_string(),
            time_scale: "month".to_string(),
            num_steps: 12,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub cache_capacity: usize,
    pub defaults: EngineDefaults,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            cache_capacity: 32,
            defaults: EngineDefaults::default(),
        }
    }
}

impl ServiceConfig {
    /// Read config from a TOML file. A missing file is not an error: the
    /// defaults apply and a debug line records the fallback.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CagError> {
        let path = path.as_ref();
        tracing::debug!("Attempting to read service config from: {:?}", path);
        if !path.exists() {
            tracing::debug!("Config file not found, using defaults.");
            return Ok(ServiceConfig::default());
        }
        let content = read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn store<P: AsRef<Path>>(&self, path: P) -> Result<(), CagError> {
        let toml_string = toml::to_string(self)?;
        write(path, toml_string)?;
        Ok(())
    }
}
