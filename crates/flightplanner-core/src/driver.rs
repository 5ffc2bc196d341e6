// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

//! Runs [`Command`]s produced by the controller on the tokio runtime and feeds
//! their results back as [`Message`]s.

use crate::client::PlannerClient;
use crate::controller::{Command, Message, Notifier, PlanController, PlanState, SessionId};
use crate::plan::FlightPlan;
use crate::stream::{PlanStreamHandler, ProgressEvent, SessionEnd, StreamError};
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Forwards stream callbacks into the driver's queue, tagged with their session.
struct ChannelHandler {
    session: SessionId,
    tx: mpsc::UnboundedSender<Message>,
}

impl ChannelHandler {
    fn send(&self, message: Message) {
        if self.tx.send(message).is_err() {
            debug!("Driver gone; dropping event for session {}", self.session);
        }
    }
}

impl PlanStreamHandler for ChannelHandler {
    fn on_progress(&mut self, event: ProgressEvent) {
        self.send(Message::Progress(self.session, event));
    }

    fn on_partial_plan(&mut self, plan: FlightPlan) {
        self.send(Message::PartialPlan(self.session, plan));
    }

    fn on_done(&mut self, plan: FlightPlan) {
        self.send(Message::Done(self.session, plan));
    }

    fn on_error(&mut self, error: StreamError) {
        self.send(Message::StreamError(self.session, error));
    }

    fn on_cancelled(&mut self, _error: StreamError) {
        self.send(Message::ServerCancelled(self.session));
    }
}

pub struct PlanDriver {
    controller: PlanController,
    client: Arc<PlannerClient>,
    tx: mpsc::UnboundedSender<Message>,
    rx: mpsc::UnboundedReceiver<Message>,
}

impl PlanDriver {
    pub fn new(client: PlannerClient, notifier: Box<dyn Notifier + Send>) -> Self {
        let limit = client.config().progress_history_limit;
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            controller: PlanController::new(notifier).with_progress_limit(limit),
            client: Arc::new(client),
            tx,
            rx,
        }
    }

    pub fn controller(&self) -> &PlanController {
        &self.controller
    }

    /// Handle for injecting messages from other tasks, e.g. a Ctrl-C listener.
    pub fn sender(&self) -> mpsc::UnboundedSender<Message> {
        self.tx.clone()
    }

    /// Applies a message and starts whatever work it asks for. Must be called
    /// from within a tokio runtime.
    pub fn dispatch(&mut self, message: Message) {
        let command = self.controller.update(message);
        self.perform(command);
    }

    fn perform(&self, command: Command) {
        match command {
            Command::None => {}
            Command::StartStream {
                session,
                request,
                cancel,
            } => {
                let client = Arc::clone(&self.client);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let mut handler = ChannelHandler {
                        session,
                        tx: tx.clone(),
                    };
                    // Streaming failures keep the bare status; the friendlier
                    // status hints belong to the request/response path only.
                    let result = client
                        .plan_stream(&request, &mut handler, &cancel)
                        .await
                        .map_err(|e| {
                            warn!("Plan stream failed — session={} error={}", session, e);
                            e.to_string()
                        });
                    let _ = tx.send(Message::SessionEnded(session, result));
                });
            }
            Command::FetchLocal {
                session,
                request,
                cancel,
            } => {
                let client = Arc::clone(&self.client);
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let message = tokio::select! {
                        _ = cancel.cancelled() => {
                            Message::SessionEnded(session, Ok(SessionEnd::Aborted))
                        }
                        result = client.plan_local(&request) => {
                            let result = result.map_err(|e| {
                                warn!("Local plan failed — session={} error={}", session, e);
                                e.user_message()
                            });
                            Message::LocalLoaded(session, result)
                        }
                    };
                    let _ = tx.send(message);
                });
            }
        }
    }

    /// Waits for the next queued message and applies it.
    pub async fn pump(&mut self) -> Option<PlanState> {
        let message = self.rx.recv().await?;
        self.dispatch(message);
        Some(self.controller.state())
    }

    /// Pumps until the controller leaves its loading states.
    pub async fn run_until_settled(&mut self) -> PlanState {
        while self.controller.is_loading() {
            if self.pump().await.is_none() {
                break;
            }
        }
        self.controller.state()
    }
}
