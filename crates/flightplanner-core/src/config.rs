// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use crate::PlannerError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const API_URL_ENV: &str = "FLIGHTPLANNER_API_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme and host of the planning backend, e.g. `http://localhost:8000`.
    pub base_url: String,
    pub api_prefix: String,
    /// Applies to the plain request/response path only; streams are not timed out.
    pub request_timeout_secs: u64,
    /// How many progress events the controller keeps for display.
    pub progress_history_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_prefix: "/api".to_string(),
            request_timeout_secs: 30,
            progress_history_limit: 100,
        }
    }
}

impl ClientConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves an API path like `/plan/stream` against base URL and prefix.
    pub fn endpoint(&self, path: &str) -> Result<Url, PlannerError> {
        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if prefix.is_empty() {
            format!("{}/{}", self.base_url.trim_end_matches('/'), path)
        } else {
            format!(
                "{}/{}/{}",
                self.base_url.trim_end_matches('/'),
                prefix,
                path
            )
        };
        Ok(Url::parse(&joined)?)
    }

    pub fn with_api_url(mut self, api_url: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config_path: crate::get_config_root().join("config.json"),
        }
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Self {
        Self {
            config_path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub fn load(&self) -> Result<ClientConfig> {
        if !self.config_path.exists() {
            log::debug!(
                "No config file; using defaults — config_path={}",
                self.config_path.display()
            );
            return Ok(ClientConfig::default());
        }

        let content =
            fs::read_to_string(&self.config_path).context("Failed to read config.json")?;

        serde_json::from_str(&content).context("Failed to parse config.json")
    }

    pub fn save(&self, config: &ClientConfig) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize config")?;

        fs::write(&self.config_path, content).context("Failed to write config.json")
    }
}
