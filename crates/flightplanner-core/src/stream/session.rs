// SPDX-License-Identifier: MIT
// Copyright (c) 2020 Austin Goudge
// Copyright (c) 2026 StarTuz

use super::event::{parse_block, PlanStreamEvent, ProgressEvent, StreamError};
use super::frame::FrameDecoder;
use crate::plan::FlightPlan;
use crate::PlannerError;
use futures::{Stream, StreamExt};
use log::{debug, info};
use tokio_util::sync::CancellationToken;

/// Receives the typed events of one streaming session, in arrival order.
pub trait PlanStreamHandler {
    fn on_progress(&mut self, event: ProgressEvent);
    fn on_partial_plan(&mut self, plan: FlightPlan);
    fn on_done(&mut self, plan: FlightPlan);
    fn on_error(&mut self, error: StreamError);
    /// Server-side `cancelled` event. `error` is the synthesized 499; by default
    /// it is delivered as an ordinary error.
    fn on_cancelled(&mut self, error: StreamError) {
        self.on_error(error);
    }
}

/// How a session stopped without a transport or protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Done,
    Failed,
    ServerCancelled,
    /// The caller's token fired. No terminal callback was invoked.
    Aborted,
}

/// Pumps a response body until a terminal event, cancellation or failure.
///
/// Blocks are dispatched strictly in order. After a terminal event any bytes
/// still buffered are discarded. A body that ends before a terminal event is
/// reported as [`PlannerError::StreamEnded`].
pub async fn run_session<S, B, E, H>(
    body: S,
    handler: &mut H,
    cancel: &CancellationToken,
) -> Result<SessionEnd, PlannerError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<PlannerError>,
    H: PlanStreamHandler + ?Sized,
{
    let mut body = std::pin::pin!(body);
    let mut decoder = FrameDecoder::new();
    let mut dispatched = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Plan stream aborted by caller — events_dispatched={}", dispatched);
                return Ok(SessionEnd::Aborted);
            }
            next = body.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(e.into()),
            None => break,
        };

        for block in decoder.push(chunk.as_ref()) {
            if cancel.is_cancelled() {
                return Ok(SessionEnd::Aborted);
            }
            let raw = match parse_block(&block) {
                Some(raw) => raw,
                None => continue,
            };
            let event = match PlanStreamEvent::decode(&raw)? {
                Some(event) => event,
                None => continue,
            };
            dispatched += 1;
            if let Some(end) = dispatch(event, handler) {
                let discarded = decoder.finish();
                info!(
                    "Plan stream finished — outcome={:?} events_dispatched={} discarded_bytes={}",
                    end, dispatched, discarded
                );
                return Ok(end);
            }
        }
    }

    decoder.finish();
    info!(
        "Plan stream closed without a terminal event — events_dispatched={}",
        dispatched
    );
    Err(PlannerError::StreamEnded)
}

fn dispatch<H: PlanStreamHandler + ?Sized>(
    event: PlanStreamEvent,
    handler: &mut H,
) -> Option<SessionEnd> {
    match event {
        PlanStreamEvent::Progress(progress) => {
            debug!(
                "progress — phase={:?} percent={:?} message={:?}",
                progress.phase, progress.percent, progress.message
            );
            handler.on_progress(progress);
            None
        }
        PlanStreamEvent::PartialPlan(plan) => {
            debug!("partial_plan — route={}", plan.route_label());
            handler.on_partial_plan(plan);
            None
        }
        PlanStreamEvent::Done(plan) => {
            debug!("done — route={}", plan.route_label());
            handler.on_done(plan);
            Some(SessionEnd::Done)
        }
        PlanStreamEvent::Cancelled(error) => {
            debug!("cancelled by server");
            handler.on_cancelled(error);
            Some(SessionEnd::ServerCancelled)
        }
        PlanStreamEvent::Error(error) => {
            debug!(
                "error — status={:?} detail={:?}",
                error.status_code, error.detail
            );
            handler.on_error(error);
            Some(SessionEnd::Failed)
        }
    }
}
