use flightplanner_core::controller::Notifier;
use flightplanner_core::{
    CancelOrigin, ClientConfig, LocalPlanRequest, Message, PlanDriver, PlanRequest, PlanState,
    PlannerClient, RoutePlanRequest,
};
use serde_json::json;
use simplelog::{Config, LevelFilter, TestLogger};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct Toasts(Arc<Mutex<Vec<String>>>);

impl Notifier for Toasts {
    fn success(&mut self, message: &str) {
        self.0.lock().unwrap().push(format!("ok: {}", message));
    }
    fn failure(&mut self, message: &str) {
        self.0.lock().unwrap().push(format!("err: {}", message));
    }
}

impl Toasts {
    fn all(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

fn driver_for(server: &MockServer) -> (PlanDriver, Toasts) {
    let _ = TestLogger::init(LevelFilter::Debug, Config::default());
    let config = ClientConfig::default().with_api_url(Some(server.uri()));
    let toasts = Toasts::default();
    let client = PlannerClient::new(config).expect("client");
    (PlanDriver::new(client, Box::new(toasts.clone())), toasts)
}

fn route(origin: &str) -> Message {
    Message::Submit(PlanRequest::Route(RoutePlanRequest::new(
        origin, "KSFO", 110.0, 5500,
    )))
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

fn done_body(route: &[&str]) -> String {
    format!(
        "event: progress\ndata: {{\"message\":\"Computing route\",\"percent\":0.5}}\n\n\
         event: partial_plan\ndata: {{\"plan\":{{\"route\":{first}}}}}\n\n\
         event: done\ndata: {{\"plan\":{{\"route\":{full}}}}}\n\n",
        first = json!([route[0], route[route.len() - 1]]),
        full = json!(route),
    )
}

#[tokio::test]
async fn test_streamed_route_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse(&done_body(&["KPAO", "KSQL", "KSFO"])))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KPAO"));
    assert_eq!(driver.controller().state(), PlanState::Streaming);

    let state = driver.run_until_settled().await;
    let c = driver.controller();
    assert_eq!(state, PlanState::Succeeded);
    assert_eq!(c.latest_message(), Some("Computing route"));
    assert_eq!(c.latest_percent(), Some(0.5));
    assert_eq!(c.progress_history().len(), 1);
    assert_eq!(
        c.displayed_route_plan().unwrap().route,
        vec!["KPAO", "KSQL", "KSFO"]
    );
    assert_eq!(toasts.all(), vec!["ok: Route planned successfully!"]);
}

#[tokio::test]
async fn test_stream_error_event_fails_with_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse(
            "event: error\ndata: {\"status_code\":404,\"detail\":\"Airport not found: KZZZ\"}\n\n",
        ))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KZZZ"));
    assert_eq!(driver.run_until_settled().await, PlanState::Failed);
    assert_eq!(
        driver.controller().error_message(),
        Some("Airport not found: KZZZ")
    );
    assert_eq!(toasts.all(), vec!["err: Airport not found: KZZZ"]);
}

#[tokio::test]
async fn test_truncated_stream_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse("event: progress\ndata: {\"message\":\"Loading\"}\n\n"))
        .mount(&server)
        .await;

    let (mut driver, _) = driver_for(&server);
    driver.dispatch(route("KPAO"));
    assert_eq!(driver.run_until_settled().await, PlanState::Failed);
    assert_eq!(
        driver.controller().error_message(),
        Some("Stream ended unexpectedly")
    );
}

#[tokio::test]
async fn test_user_cancel_while_waiting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse(&done_body(&["KPAO", "KSFO"])).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KPAO"));

    let tx = driver.sender();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(Message::Cancel);
    });

    let state = tokio::time::timeout(Duration::from_secs(5), driver.run_until_settled())
        .await
        .expect("cancel should settle promptly");
    assert_eq!(state, PlanState::Cancelled);
    assert_eq!(driver.controller().cancel_origin(), Some(CancelOrigin::User));
    assert_eq!(driver.controller().error_message(), None);
    assert!(toasts.all().is_empty());
}

#[tokio::test]
async fn test_server_cancel_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse(
            "event: progress\ndata: {\"message\":\"Working\"}\n\nevent: cancelled\ndata: {}\n\n",
        ))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KPAO"));
    assert_eq!(driver.run_until_settled().await, PlanState::Cancelled);
    assert_eq!(driver.controller().cancel_origin(), Some(CancelOrigin::Server));
    assert_eq!(driver.controller().error_message(), None);
    assert!(toasts.all().is_empty());
}

#[tokio::test]
async fn test_newer_submission_wins() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .and(body_partial_json(json!({"origin": "KOAK"})))
        .respond_with(sse(&done_body(&["KOAK", "KSFO"])).set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .and(body_partial_json(json!({"origin": "KPAO"})))
        .respond_with(sse(&done_body(&["KPAO", "KSQL", "KSFO"])))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KOAK"));
    let first = driver.controller().active_session();
    driver.dispatch(route("KPAO"));
    assert_ne!(driver.controller().active_session(), first);

    assert_eq!(driver.run_until_settled().await, PlanState::Succeeded);
    tokio::time::sleep(Duration::from_millis(400)).await;

    let c = driver.controller();
    assert_eq!(c.final_plan().unwrap().route, vec!["KPAO", "KSQL", "KSFO"]);
    assert_eq!(toasts.all(), vec!["ok: Route planned successfully!"]);
}

#[tokio::test]
async fn test_retry_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse(&done_body(&["KPAO", "KSFO"])))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KPAO"));
    assert_eq!(driver.run_until_settled().await, PlanState::Failed);
    assert_eq!(
        driver.controller().error_message(),
        Some("Request failed (500)")
    );

    driver.dispatch(Message::Retry);
    assert_eq!(driver.run_until_settled().await, PlanState::Succeeded);
    assert_eq!(driver.controller().error_message(), None);
    assert_eq!(
        toasts.all(),
        vec![
            "err: Request failed (500)",
            "ok: Route planned successfully!"
        ]
    );
}

#[tokio::test]
async fn test_stream_http_failure_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(route("KPAO"));
    assert_eq!(driver.run_until_settled().await, PlanState::Failed);
    assert_eq!(driver.controller().error_message(), Some("Request failed (404)"));
    assert_eq!(toasts.all(), vec!["err: Request failed (404)"]);
}

#[tokio::test]
async fn test_local_http_failure_uses_status_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let (mut driver, _) = driver_for(&server);
    driver.dispatch(Message::Submit(PlanRequest::Local(LocalPlanRequest {
        airport: "KPAO".to_string(),
        radius_nm: Some(25.0),
    })));
    assert_eq!(driver.run_until_settled().await, PlanState::Failed);
    assert_eq!(
        driver.controller().error_message(),
        Some("Server error. Please try again later.")
    );
}

#[tokio::test]
async fn test_error_event_with_cancel_status_still_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan/stream"))
        .respond_with(sse(
            "event: error\ndata: {\"status_code\":499,\"detail\":\"Upstream closed\"}\n\n",
        ))
        .mount(&server)
        .await;

    let (mut driver, _) = driver_for(&server);
    driver.dispatch(route("KPAO"));
    assert_eq!(driver.run_until_settled().await, PlanState::Failed);
    assert_eq!(driver.controller().cancel_origin(), None);
    assert_eq!(driver.controller().error_message(), Some("Upstream closed"));
}

#[tokio::test]
async fn test_local_plan_flow() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/plan"))
        .and(body_partial_json(json!({"mode": "local", "airport": "KPAO"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "planned_at_utc": "2026-03-01T14:05:09Z",
            "airport": "KPAO",
            "radius_nm": 25.0,
            "center": {"icao": "KPAO", "latitude": 37.461, "longitude": -122.115},
            "nearby_airports": [
                {"icao": "KSQL", "latitude": 37.512, "longitude": -122.25, "distance_nm": 7.1}
            ]
        })))
        .mount(&server)
        .await;

    let (mut driver, toasts) = driver_for(&server);
    driver.dispatch(Message::Submit(PlanRequest::Local(LocalPlanRequest {
        airport: "kpao - Palo Alto".to_string(),
        radius_nm: Some(25.0),
    })));
    assert_eq!(driver.controller().state(), PlanState::AwaitingResponse);
    assert_eq!(driver.run_until_settled().await, PlanState::Succeeded);

    let c = driver.controller();
    assert!(!c.trace().contains(&PlanState::Streaming));
    assert_eq!(c.local_plan().unwrap().nearby_airports.len(), 1);
    assert_eq!(toasts.all(), vec!["ok: Local plan generated successfully!"]);
}
