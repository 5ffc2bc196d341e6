// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use crate::config::ClientConfig;
use crate::plan::{FlightPlan, LocalPlanRequest, LocalPlanResponse, PlanRequest, RoutePlanRequest};
use crate::stream::{run_session, PlanStreamHandler, SessionEnd};
use crate::PlannerError;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub const PLAN_PATH: &str = "/plan";
pub const PLAN_STREAM_PATH: &str = "/plan/stream";

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

/// HTTP client for the planning backend.
#[derive(Debug, Clone)]
pub struct PlannerClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl PlannerClient {
    pub fn new(config: ClientConfig) -> Result<Self, PlannerError> {
        // No client-wide timeout: it would also cut long-running streams.
        let http = reqwest::Client::builder()
            .user_agent(concat!("flightplanner/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Local-area plan over the plain request/response path.
    pub async fn plan_local(
        &self,
        req: &LocalPlanRequest,
    ) -> Result<LocalPlanResponse, PlannerError> {
        self.post_plan(&PlanRequest::Local(req.clone())).await
    }

    /// Route plan without streaming; blocks until the whole plan is computed.
    pub async fn plan_route(&self, req: &RoutePlanRequest) -> Result<FlightPlan, PlannerError> {
        self.post_plan(&PlanRequest::Route(req.clone())).await
    }

    async fn post_plan<T: DeserializeOwned>(&self, req: &PlanRequest) -> Result<T, PlannerError> {
        let url = self.config.endpoint(PLAN_PATH)?;
        info!("Requesting {} plan — url={}", req.mode(), url);

        let response = self
            .http
            .post(url)
            .timeout(self.config.request_timeout())
            .json(req)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http_failure(response).await);
        }
        Ok(response.json::<T>().await?)
    }

    /// Streams a route plan, feeding events to `handler` until a terminal event.
    ///
    /// Firing `cancel` severs the transfer at whichever await is pending and
    /// yields [`SessionEnd::Aborted`]; the handler hears nothing about it.
    pub async fn plan_stream<H>(
        &self,
        req: &RoutePlanRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> Result<SessionEnd, PlannerError>
    where
        H: PlanStreamHandler + ?Sized,
    {
        let url = self.config.endpoint(PLAN_STREAM_PATH)?;
        info!(
            "Opening plan stream — url={} origin={} destination={}",
            url, req.origin, req.destination
        );

        let send = self
            .http
            .post(url)
            .header(ACCEPT, "text/event-stream")
            .json(&PlanRequest::Route(req.clone()))
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Plan stream aborted before response headers");
                return Ok(SessionEnd::Aborted);
            }
            response = send => response?,
        };

        if !response.status().is_success() {
            return Err(http_failure(response).await);
        }

        run_session(response.bytes_stream(), handler, cancel).await
    }
}

/// Turns a non-2xx response into an error, keeping the server's `detail` if any.
async fn http_failure(response: Response) -> PlannerError {
    let status = response.status().as_u16();
    let detail = match response.json::<ErrorBody>().await {
        Ok(body) => body.detail.and_then(|d| match d {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Null => None,
            // FastAPI validation errors arrive as a list of objects
            other => Some(other.to_string()),
        }),
        Err(e) => {
            debug!("Error body was not JSON: {}", e);
            None
        }
    };
    warn!("Planner request failed — status={} detail={:?}", status, detail);
    PlannerError::Http { status, detail }
}
