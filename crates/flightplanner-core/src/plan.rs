// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanMode {
    Local,
    Route,
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanMode::Local => write!(f, "local"),
            PlanMode::Route => write!(f, "route"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeedUnit {
    #[default]
    Knots,
    Mph,
}

impl FromStr for SpeedUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "knots" | "kt" | "kts" => Ok(SpeedUnit::Knots),
            "mph" => Ok(SpeedUnit::Mph),
            other => Err(format!("Unknown speed unit '{}' (expected knots or mph)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelStrategy {
    Time,
    Economy,
}

/// Cross-country route request. Optional knobs are left out of the JSON body
/// when unset so the server applies its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlanRequest {
    pub origin: String,
    pub destination: String,
    pub speed: f64,
    #[serde(default)]
    pub speed_unit: SpeedUnit,
    pub altitude: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_airspaces: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avoid_terrain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan_fuel_stops: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft_range_nm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_leg_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_burn_gph: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve_minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_strategy: Option<FuelStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_wind: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_alternates: Option<bool>,
}

impl RoutePlanRequest {
    pub fn new(origin: &str, destination: &str, speed: f64, altitude: i32) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            speed,
            speed_unit: SpeedUnit::Knots,
            altitude,
            avoid_airspaces: None,
            avoid_terrain: None,
            plan_fuel_stops: None,
            aircraft_range_nm: None,
            max_leg_distance: None,
            fuel_burn_gph: None,
            reserve_minutes: None,
            fuel_strategy: None,
            apply_wind: None,
            include_alternates: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPlanRequest {
    pub airport: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius_nm: Option<f64>,
}

/// A plan request as sent to the backend; `mode` selects the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PlanRequest {
    Route(RoutePlanRequest),
    Local(LocalPlanRequest),
}

impl PlanRequest {
    pub fn mode(&self) -> PlanMode {
        match self {
            PlanRequest::Route(_) => PlanMode::Route,
            PlanRequest::Local(_) => PlanMode::Local,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
    Climb,
    Cruise,
    Descent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: (f64, f64),
    pub end: (f64, f64),
    #[serde(rename = "type")]
    pub kind: SegmentKind,
    pub vfr_altitude: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternateAirport {
    pub icao: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub distance_nm: Option<f64>,
}

/// A route plan. Partial snapshots carry the route before legs, fuel and wind
/// are attached, so everything past `route` is defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub route: Vec<String>,
    #[serde(default)]
    pub distance_nm: f64,
    #[serde(default)]
    pub time_hr: f64,
    #[serde(default)]
    pub origin_coords: Option<(f64, f64)>,
    #[serde(default)]
    pub destination_coords: Option<(f64, f64)>,
    #[serde(default)]
    pub segments: Vec<Segment>,

    #[serde(default)]
    pub fuel_stops: Option<Vec<String>>,
    #[serde(default)]
    pub fuel_burn_gph: Option<f64>,
    #[serde(default)]
    pub reserve_minutes: Option<f64>,
    #[serde(default)]
    pub fuel_required_gal: Option<f64>,
    #[serde(default)]
    pub fuel_required_with_reserve_gal: Option<f64>,

    #[serde(default)]
    pub wind_speed_kt: Option<f64>,
    #[serde(default)]
    pub wind_direction_deg: Option<f64>,
    #[serde(default)]
    pub headwind_kt: Option<f64>,
    #[serde(default)]
    pub crosswind_kt: Option<f64>,
    #[serde(default)]
    pub groundspeed_kt: Option<f64>,

    #[serde(default)]
    pub departure_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub arrival_time_utc: Option<DateTime<Utc>>,
    #[serde(default)]
    pub alternates: Option<Vec<AlternateAirport>>,
}

impl FlightPlan {
    /// "KPAO → KSQL → KSFO"
    pub fn route_label(&self) -> String {
        self.route.join(" → ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirportSummary {
    #[serde(default)]
    pub icao: String,
    #[serde(default)]
    pub iata: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default, rename = "type")]
    pub airport_type: String,
}

impl AirportSummary {
    /// ICAO when known, otherwise IATA.
    pub fn code(&self) -> &str {
        if self.icao.is_empty() {
            &self.iata
        } else {
            &self.icao
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyAirport {
    #[serde(flatten)]
    pub airport: AirportSummary,
    pub distance_nm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalPlanResponse {
    pub planned_at_utc: DateTime<Utc>,
    pub airport: String,
    pub radius_nm: f64,
    pub center: AirportSummary,
    #[serde(default)]
    pub nearby_airports: Vec<NearbyAirport>,
}

/// Formats a UTC timestamp to the minute, e.g. `2026-03-01 14:05Z`.
pub fn format_utc_minute(ts: Option<&DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%MZ").to_string(),
        None => "—".to_string(),
    }
}
