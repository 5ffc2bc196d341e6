// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use crate::plan::FlightPlan;
use crate::PlannerError;
use serde::{Deserialize, Serialize};

/// Status reported for a server-side `cancelled` event (nginx "client closed request").
pub const CANCELLED_STATUS: u16 = 499;
pub const CANCELLED_DETAIL: &str = "Request cancelled";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    #[serde(default)]
    pub phase: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    /// Fraction complete, 0..1.
    #[serde(default)]
    pub percent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl StreamError {
    pub fn cancelled() -> Self {
        Self {
            status_code: Some(CANCELLED_STATUS),
            detail: Some(CANCELLED_DETAIL.to_string()),
        }
    }

    pub fn message(&self) -> String {
        match &self.detail {
            Some(detail) if !detail.trim().is_empty() => detail.clone(),
            _ => format!("Request failed ({})", self.status_code.unwrap_or(500)),
        }
    }
}

/// Name and payload of one block, before the payload is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub name: String,
    pub data: Option<String>,
}

/// Extracts the event name and joined `data:` payload from a block.
///
/// The last `event:` line wins; `data:` lines are joined with `\n` in order.
/// Returns `None` for blocks without an event name (comments, keep-alives).
pub fn parse_block(block: &str) -> Option<RawEvent> {
    let mut name: Option<&str> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in block.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = line.strip_prefix("event:") {
            name = Some(value.trim());
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }

    let name = name.filter(|n| !n.is_empty())?;
    Some(RawEvent {
        name: name.to_string(),
        data: if data.is_empty() {
            None
        } else {
            Some(data.join("\n"))
        },
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStreamEvent {
    Progress(ProgressEvent),
    PartialPlan(FlightPlan),
    Done(FlightPlan),
    /// Server gave up on the request; surfaced as an error-shaped event.
    Cancelled(StreamError),
    Error(StreamError),
}

#[derive(Deserialize)]
struct PlanEnvelope {
    #[serde(default)]
    plan: Option<FlightPlan>,
}

impl PlanStreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanStreamEvent::Done(_) | PlanStreamEvent::Cancelled(_) | PlanStreamEvent::Error(_)
        )
    }

    /// Interprets a raw block.
    ///
    /// `Ok(None)` means "nothing to dispatch": unknown event names, blocks
    /// without payload, and malformed non-terminal payloads. A terminal event
    /// that cannot be understood is an error because nothing can follow it.
    pub fn decode(raw: &RawEvent) -> Result<Option<Self>, PlannerError> {
        if raw.name == "cancelled" {
            return Ok(Some(PlanStreamEvent::Cancelled(StreamError::cancelled())));
        }

        let data = match raw.data.as_deref() {
            Some(data) => data,
            None => {
                log::debug!("Dropping '{}' block without data", raw.name);
                return Ok(None);
            }
        };

        match raw.name.as_str() {
            "progress" => match serde_json::from_str::<ProgressEvent>(data) {
                Ok(progress) => Ok(Some(PlanStreamEvent::Progress(progress))),
                Err(e) => {
                    log::warn!("Dropping malformed progress event: {}", e);
                    Ok(None)
                }
            },
            "partial_plan" => match serde_json::from_str::<PlanEnvelope>(data) {
                Ok(PlanEnvelope { plan: Some(plan) }) => Ok(Some(PlanStreamEvent::PartialPlan(plan))),
                Ok(PlanEnvelope { plan: None }) => {
                    log::debug!("partial_plan event without plan; ignoring");
                    Ok(None)
                }
                Err(e) => {
                    log::warn!("Dropping malformed partial_plan event: {}", e);
                    Ok(None)
                }
            },
            "done" => {
                let envelope: PlanEnvelope = serde_json::from_str(data).map_err(|e| {
                    PlannerError::Protocol(format!("malformed done event: {}", e))
                })?;
                match envelope.plan {
                    Some(plan) => Ok(Some(PlanStreamEvent::Done(plan))),
                    None => Err(PlannerError::Protocol(
                        "done event carried no plan".to_string(),
                    )),
                }
            }
            "error" => {
                let error: StreamError = serde_json::from_str(data).map_err(|e| {
                    PlannerError::Protocol(format!("malformed error event: {}", e))
                })?;
                Ok(Some(PlanStreamEvent::Error(error)))
            }
            other => {
                log::debug!("Ignoring unknown stream event '{}'", other);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, data: &str) -> RawEvent {
        RawEvent {
            name: name.to_string(),
            data: Some(data.to_string()),
        }
    }

    #[test]
    fn test_last_event_line_wins_and_data_joins() {
        let block = "data: {\"a\":\nevent: progress\ndata:  1}\n: comment\nevent:done\nid: 7";
        let parsed = parse_block(block).unwrap();
        assert_eq!(parsed.name, "done");
        assert_eq!(parsed.data.as_deref(), Some("{\"a\":\n 1}"));
    }

    #[test]
    fn test_data_without_event_is_dropped() {
        assert_eq!(parse_block("data: {\"percent\": 0.5}"), None);
        assert_eq!(parse_block(": keep-alive"), None);
        assert_eq!(parse_block("event:   \ndata: {}"), None);
    }

    #[test]
    fn test_event_without_data() {
        let parsed = parse_block("event: progress").unwrap();
        assert_eq!(parsed.data, None);
        assert_eq!(PlanStreamEvent::decode(&parsed).unwrap(), None);
    }

    #[test]
    fn test_decode_progress() {
        let ev = PlanStreamEvent::decode(&raw(
            "progress",
            r#"{"phase":"route","message":"Computing route","percent":0.2,"ts":1.5}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            ev,
            PlanStreamEvent::Progress(ProgressEvent {
                phase: Some("route".to_string()),
                message: Some("Computing route".to_string()),
                percent: Some(0.2),
            })
        );
        assert!(!ev.is_terminal());
    }

    #[test]
    fn test_decode_malformed_non_terminal_is_dropped() {
        assert_eq!(
            PlanStreamEvent::decode(&raw("progress", "{not json")).unwrap(),
            None
        );
        assert_eq!(
            PlanStreamEvent::decode(&raw("partial_plan", r#"{"plan": 3}"#)).unwrap(),
            None
        );
        assert_eq!(
            PlanStreamEvent::decode(&raw("partial_plan", r#"{"phase": "route"}"#)).unwrap(),
            None
        );
    }

    #[test]
    fn test_decode_malformed_terminal_is_protocol_error() {
        assert!(matches!(
            PlanStreamEvent::decode(&raw("done", "{oops")),
            Err(PlannerError::Protocol(_))
        ));
        assert!(matches!(
            PlanStreamEvent::decode(&raw("done", "{}")),
            Err(PlannerError::Protocol(_))
        ));
        assert!(matches!(
            PlanStreamEvent::decode(&raw("error", "[1,2]")),
            Err(PlannerError::Protocol(_))
        ));
    }

    #[test]
    fn test_decode_terminal_events() {
        let done = PlanStreamEvent::decode(&raw("done", r#"{"plan":{"route":["KPAO","KSFO"]}}"#))
            .unwrap()
            .unwrap();
        assert!(done.is_terminal());

        let err = PlanStreamEvent::decode(&raw(
            "error",
            r#"{"status_code":503,"detail":"overloaded"}"#,
        ))
        .unwrap()
        .unwrap();
        assert_eq!(
            err,
            PlanStreamEvent::Error(StreamError {
                status_code: Some(503),
                detail: Some("overloaded".to_string()),
            })
        );

        let cancelled = PlanStreamEvent::decode(&parse_block("event: cancelled").unwrap())
            .unwrap()
            .unwrap();
        match cancelled {
            PlanStreamEvent::Cancelled(e) => {
                assert_eq!(e.status_code, Some(CANCELLED_STATUS));
                assert_eq!(e.message(), "Request cancelled");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_ignored() {
        assert_eq!(
            PlanStreamEvent::decode(&raw("heartbeat", "{}")).unwrap(),
            None
        );
    }

    #[test]
    fn test_stream_error_message_fallback() {
        assert_eq!(StreamError::default().message(), "Request failed (500)");
        let e = StreamError {
            status_code: Some(504),
            detail: None,
        };
        assert_eq!(e.message(), "Request failed (504)");
    }
}
