// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

//! Request state machine behind the planner UI.
//!
//! The controller never performs I/O. [`PlanController::update`] applies a
//! [`Message`] and returns the [`Command`] the caller must run; results come
//! back as further messages tagged with the [`SessionId`] that produced them.
//! Messages from any session other than the active one are stale and dropped.

use crate::plan::{FlightPlan, LocalPlanRequest, LocalPlanResponse, PlanMode, PlanRequest, RoutePlanRequest};
use crate::stream::{ProgressEvent, SessionEnd, StreamError};
use crate::validation;
use log::{debug, info, warn};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

pub type SessionId = u64;

pub const DEFAULT_PROGRESS_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanState {
    Idle,
    Submitting,
    Streaming,
    AwaitingResponse,
    Succeeded,
    Failed,
    Cancelled,
}

impl PlanState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PlanState::Succeeded | PlanState::Failed | PlanState::Cancelled
        )
    }
}

/// Who ended a cancelled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOrigin {
    /// Local abort; never shown as an error.
    User,
    /// The stream delivered a `cancelled` event.
    Server,
}

#[derive(Debug, Clone)]
pub enum Message {
    Submit(PlanRequest),
    Retry,
    Cancel,
    Reset,
    Progress(SessionId, ProgressEvent),
    PartialPlan(SessionId, FlightPlan),
    Done(SessionId, FlightPlan),
    StreamError(SessionId, StreamError),
    /// The stream ended with a `cancelled` event.
    ServerCancelled(SessionId),
    LocalLoaded(SessionId, Result<LocalPlanResponse, String>),
    /// Sent once the I/O task for a session has returned.
    SessionEnded(SessionId, Result<SessionEnd, String>),
}

#[derive(Debug, Clone)]
pub enum Command {
    None,
    StartStream {
        session: SessionId,
        request: RoutePlanRequest,
        cancel: CancellationToken,
    },
    FetchLocal {
        session: SessionId,
        request: LocalPlanRequest,
        cancel: CancellationToken,
    },
}

/// Terminal success/failure sink (toasts in a GUI, stderr in the CLI).
pub trait Notifier {
    fn success(&mut self, message: &str);
    fn failure(&mut self, message: &str);
}

/// Notifier that only writes to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&mut self, message: &str) {
        info!("{}", message);
    }

    fn failure(&mut self, message: &str) {
        log::error!("{}", message);
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
}

pub struct PlanController {
    state: PlanState,
    trace: Vec<PlanState>,
    mode: PlanMode,
    last_request: Option<PlanRequest>,
    active: Option<ActiveSession>,
    next_session: SessionId,

    progress: VecDeque<ProgressEvent>,
    progress_limit: usize,
    progress_total: usize,
    latest_message: Option<String>,
    latest_percent: Option<f64>,

    partial_plan: Option<FlightPlan>,
    route_plan: Option<FlightPlan>,
    local_plan: Option<LocalPlanResponse>,
    error: Option<String>,
    cancel_origin: Option<CancelOrigin>,

    notifier: Box<dyn Notifier + Send>,
}

impl std::fmt::Debug for PlanController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanController")
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("active", &self.active)
            .field("progress", &self.progress.len())
            .field("error", &self.error)
            .finish()
    }
}

impl Default for PlanController {
    fn default() -> Self {
        Self::new(Box::new(LogNotifier))
    }
}

impl PlanController {
    pub fn new(notifier: Box<dyn Notifier + Send>) -> Self {
        Self {
            state: PlanState::Idle,
            trace: vec![PlanState::Idle],
            mode: PlanMode::Route,
            last_request: None,
            active: None,
            next_session: 1,
            progress: VecDeque::new(),
            progress_limit: DEFAULT_PROGRESS_LIMIT,
            progress_total: 0,
            latest_message: None,
            latest_percent: None,
            partial_plan: None,
            route_plan: None,
            local_plan: None,
            error: None,
            cancel_origin: None,
            notifier,
        }
    }

    pub fn with_progress_limit(mut self, limit: usize) -> Self {
        self.progress_limit = limit.max(1);
        self
    }

    pub fn update(&mut self, message: Message) -> Command {
        match message {
            Message::Submit(req) => match validation::validate_request(&req) {
                Ok(req) => self.submit(req),
                Err(e) => {
                    warn!("Rejected {} request: {}", req.mode(), e);
                    self.notifier.failure(&e.to_string());
                    Command::None
                }
            },
            Message::Retry => match self.last_request.clone() {
                Some(req) => {
                    info!("Retrying last {} request", req.mode());
                    self.submit(req)
                }
                None => Command::None,
            },
            Message::Cancel => {
                self.cancel();
                Command::None
            }
            Message::Reset => {
                self.reset();
                Command::None
            }
            Message::Progress(id, event) => {
                if self.accept(id, "progress") {
                    self.record_progress(event);
                }
                Command::None
            }
            Message::PartialPlan(id, plan) => {
                if self.accept(id, "partial_plan") {
                    self.partial_plan = Some(plan);
                }
                Command::None
            }
            Message::Done(id, plan) => {
                if self.accept(id, "done") {
                    self.active = None;
                    self.route_plan = Some(plan);
                    self.partial_plan = None;
                    self.set_state(PlanState::Succeeded);
                    self.notifier.success("Route planned successfully!");
                }
                Command::None
            }
            Message::StreamError(id, error) => {
                if self.accept(id, "error") {
                    self.active = None;
                    self.fail(error.message());
                }
                Command::None
            }
            Message::ServerCancelled(id) => {
                if self.accept(id, "cancelled") {
                    self.active = None;
                    self.cancel_origin = Some(CancelOrigin::Server);
                    self.set_state(PlanState::Cancelled);
                }
                Command::None
            }
            Message::LocalLoaded(id, result) => {
                if self.accept(id, "local response") {
                    self.active = None;
                    match result {
                        Ok(plan) => {
                            self.local_plan = Some(plan);
                            self.set_state(PlanState::Succeeded);
                            self.notifier.success("Local plan generated successfully!");
                        }
                        Err(message) => self.fail(message),
                    }
                }
                Command::None
            }
            Message::SessionEnded(id, result) => {
                // Terminal callbacks clear the active session first, so reaching
                // here with a live session means no terminal callback fired.
                if self.accept(id, "session end") {
                    self.active = None;
                    match result {
                        Ok(SessionEnd::Aborted) => {
                            self.cancel_origin = Some(CancelOrigin::User);
                            self.set_state(PlanState::Cancelled);
                        }
                        Ok(end) => {
                            warn!("Session {} ended ({:?}) without a terminal callback", id, end);
                            self.fail("Stream ended unexpectedly".to_string());
                        }
                        Err(message) => self.fail(message),
                    }
                }
                Command::None
            }
        }
    }

    fn submit(&mut self, req: PlanRequest) -> Command {
        self.trace.clear();
        self.set_state(PlanState::Submitting);
        self.last_request = Some(req.clone());
        self.mode = req.mode();

        let (session, cancel) = self.begin_session();
        self.error = None;
        self.cancel_origin = None;

        match req {
            PlanRequest::Route(request) => {
                self.progress.clear();
                self.progress_total = 0;
                self.latest_message = Some("Starting...".to_string());
                self.latest_percent = None;
                self.partial_plan = None;
                self.route_plan = None;
                self.set_state(PlanState::Streaming);
                info!(
                    "Session {} streaming route {} → {}",
                    session, request.origin, request.destination
                );
                Command::StartStream {
                    session,
                    request,
                    cancel,
                }
            }
            PlanRequest::Local(request) => {
                self.local_plan = None;
                self.set_state(PlanState::AwaitingResponse);
                info!("Session {} requesting local plan for {}", session, request.airport);
                Command::FetchLocal {
                    session,
                    request,
                    cancel,
                }
            }
        }
    }

    /// Supersedes any running session: its token is cancelled before the new
    /// one exists, so everything it still delivers is stale.
    fn begin_session(&mut self) -> (SessionId, CancellationToken) {
        if let Some(previous) = self.active.take() {
            debug!("Superseding session {}", previous.id);
            previous.cancel.cancel();
        }
        let id = self.next_session;
        self.next_session += 1;
        let cancel = CancellationToken::new();
        self.active = Some(ActiveSession {
            id,
            cancel: cancel.clone(),
        });
        (id, cancel)
    }

    fn cancel(&mut self) {
        match self.active.take() {
            Some(active) => {
                info!("Session {} cancelled by user", active.id);
                active.cancel.cancel();
                self.cancel_origin = Some(CancelOrigin::User);
                self.set_state(PlanState::Cancelled);
            }
            None => debug!("Cancel with no active session; ignoring"),
        }
    }

    fn reset(&mut self) {
        if self.active.is_some() {
            debug!("Reset ignored while a session is active");
            return;
        }
        self.progress.clear();
        self.progress_total = 0;
        self.latest_message = None;
        self.latest_percent = None;
        self.partial_plan = None;
        self.route_plan = None;
        self.local_plan = None;
        self.error = None;
        self.cancel_origin = None;
        self.trace.clear();
        self.set_state(PlanState::Idle);
    }

    fn accept(&self, id: SessionId, what: &str) -> bool {
        let current = self.active.as_ref().map(|a| a.id) == Some(id);
        if !current {
            debug!(
                "Dropping stale {} from session {} (active={:?})",
                what,
                id,
                self.active.as_ref().map(|a| a.id)
            );
        }
        current
    }

    fn record_progress(&mut self, event: ProgressEvent) {
        if let Some(message) = &event.message {
            self.latest_message = Some(message.clone());
        }
        if let Some(percent) = event.percent {
            self.latest_percent = Some(percent);
        }
        self.progress_total += 1;
        self.progress.push_back(event);
        while self.progress.len() > self.progress_limit {
            self.progress.pop_front();
        }
    }

    fn fail(&mut self, message: String) {
        self.notifier.failure(&message);
        self.error = Some(message);
        self.set_state(PlanState::Failed);
    }

    fn set_state(&mut self, state: PlanState) {
        if self.state != state {
            debug!("Plan state {:?} → {:?}", self.state, state);
        }
        self.state = state;
        self.trace.push(state);
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    /// States visited since the last submit, in order.
    pub fn trace(&self) -> &[PlanState] {
        &self.trace
    }

    pub fn mode(&self) -> PlanMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        matches!(
            self.state,
            PlanState::Submitting | PlanState::Streaming | PlanState::AwaitingResponse
        )
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn last_request(&self) -> Option<&PlanRequest> {
        self.last_request.as_ref()
    }

    pub fn progress_history(&self) -> &VecDeque<ProgressEvent> {
        &self.progress
    }

    /// Progress events received this session, including ones evicted from history.
    pub fn progress_total(&self) -> usize {
        self.progress_total
    }

    /// Messages of the last `n` progress events, oldest first.
    pub fn recent_progress(&self, n: usize) -> Vec<&str> {
        let skip = self.progress.len().saturating_sub(n);
        self.progress
            .iter()
            .skip(skip)
            .filter_map(|p| p.message.as_deref())
            .collect()
    }

    pub fn latest_message(&self) -> Option<&str> {
        self.latest_message.as_deref()
    }

    pub fn latest_percent(&self) -> Option<f64> {
        self.latest_percent
    }

    pub fn partial_plan(&self) -> Option<&FlightPlan> {
        self.partial_plan.as_ref()
    }

    pub fn final_plan(&self) -> Option<&FlightPlan> {
        self.route_plan.as_ref()
    }

    /// The plan to draw: the final plan once it exists, otherwise the latest partial.
    pub fn displayed_route_plan(&self) -> Option<&FlightPlan> {
        self.route_plan.as_ref().or(self.partial_plan.as_ref())
    }

    pub fn local_plan(&self) -> Option<&LocalPlanResponse> {
        self.local_plan.as_ref()
    }

    /// Banner text; `None` for successes and cancellations.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cancel_origin(&self) -> Option<CancelOrigin> {
        self.cancel_origin
    }
}
