// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

pub mod client;
pub mod config;
pub mod controller;
pub mod driver;
pub mod plan;
pub mod stream;
pub mod validation;

pub use client::PlannerClient;
pub use config::{ClientConfig, ConfigManager};
pub use controller::{CancelOrigin, Command, Message, Notifier, PlanController, PlanState, SessionId};
pub use driver::PlanDriver;
pub use plan::{FlightPlan, LocalPlanRequest, LocalPlanResponse, PlanMode, PlanRequest, RoutePlanRequest};
pub use stream::{PlanStreamHandler, ProgressEvent, SessionEnd, StreamError};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlannerError {
    #[error("{}", http_message(.status, .detail))]
    Http { status: u16, detail: Option<String> },
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Protocol violation: {0}")]
    Protocol(String),
    #[error("Stream ended unexpectedly")]
    StreamEnded,
    #[error("{0}")]
    Validation(String),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),
}

fn http_message(status: &u16, detail: &Option<String>) -> String {
    match detail {
        Some(detail) if !detail.trim().is_empty() => detail.clone(),
        _ => format!("Request failed ({})", status),
    }
}

impl PlannerError {
    /// Message suitable for an error banner or toast.
    ///
    /// Server-provided details win; otherwise common statuses get a friendlier
    /// hint than the bare status code.
    pub fn user_message(&self) -> String {
        match self {
            PlannerError::Http {
                detail: Some(detail),
                ..
            } if !detail.trim().is_empty() => detail.clone(),
            PlannerError::Http { status: 429, .. } => {
                "Too many requests. Please wait a moment.".to_string()
            }
            PlannerError::Http { status: 500, .. } => {
                "Server error. Please try again later.".to_string()
            }
            PlannerError::Http { status: 404, .. } => "Resource not found.".to_string(),
            PlannerError::Network(e) if e.is_decode() => {
                "Invalid response from server.".to_string()
            }
            PlannerError::Network(_) => "Network error. Check your connection.".to_string(),
            other => other.to_string(),
        }
    }
}

/// Platform config directory for the planner (e.g. `~/.config/flightplanner`).
pub fn get_config_root() -> PathBuf {
    directories::ProjectDirs::from("org", "flightplanner", "flightplanner")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
