// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use crate::plan::{LocalPlanRequest, PlanRequest, RoutePlanRequest};
use crate::PlannerError;
use regex::Regex;
use std::sync::OnceLock;

fn airport_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z0-9]{3,5}$").unwrap())
}

fn dash_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-–—]").unwrap())
}

/// First token of the user input, uppercased. Accepts picker labels such as
/// "KPAO - Palo Alto Airport" and keeps only the code before the dash.
fn leading_token(value: &str) -> String {
    let upper = value.trim().to_uppercase();
    let before_dash = dash_re().split(&upper).next().unwrap_or("").trim();
    before_dash
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string()
}

/// Returns the bare airport code, or an empty string if the input holds none.
pub fn normalize_airport_code(value: &str) -> String {
    let token = leading_token(value);
    if airport_code_re().is_match(&token) {
        token
    } else {
        String::new()
    }
}

pub fn validate_airport_code(value: &str) -> Result<String, PlannerError> {
    let token = leading_token(value);
    if token.is_empty() {
        return Err(PlannerError::Validation(
            "Airport code is required".to_string(),
        ));
    }
    let len = token.chars().count();
    if !(3..=5).contains(&len) {
        return Err(PlannerError::Validation(
            "Airport code must be 3-5 characters".to_string(),
        ));
    }
    if !airport_code_re().is_match(&token) {
        return Err(PlannerError::Validation(
            "Airport code must contain only letters and numbers".to_string(),
        ));
    }
    Ok(token)
}

fn validate_route(req: &RoutePlanRequest) -> Result<RoutePlanRequest, PlannerError> {
    let origin = validate_airport_code(&req.origin)
        .map_err(|e| PlannerError::Validation(format!("Origin: {}", e)))?;
    let destination = validate_airport_code(&req.destination)
        .map_err(|e| PlannerError::Validation(format!("Destination: {}", e)))?;
    if !req.speed.is_finite() || req.speed <= 0.0 {
        return Err(PlannerError::Validation(
            "Speed must be greater than 0".to_string(),
        ));
    }
    if let Some(max_leg) = req.max_leg_distance {
        if max_leg <= 0.0 {
            return Err(PlannerError::Validation(
                "Max leg distance must be greater than 0".to_string(),
            ));
        }
    }
    Ok(RoutePlanRequest {
        origin,
        destination,
        ..req.clone()
    })
}

fn validate_local(req: &LocalPlanRequest) -> Result<LocalPlanRequest, PlannerError> {
    let airport = validate_airport_code(&req.airport)?;
    if let Some(radius) = req.radius_nm {
        if !radius.is_finite() || radius <= 0.0 {
            return Err(PlannerError::Validation(
                "Radius must be greater than 0".to_string(),
            ));
        }
    }
    Ok(LocalPlanRequest {
        airport,
        radius_nm: req.radius_nm,
    })
}

/// Checks a request before any network I/O and returns it with normalized codes.
pub fn validate_request(req: &PlanRequest) -> Result<PlanRequest, PlannerError> {
    match req {
        PlanRequest::Route(route) => validate_route(route).map(PlanRequest::Route),
        PlanRequest::Local(local) => validate_local(local).map(PlanRequest::Local),
    }
}
