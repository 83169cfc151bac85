#![allow(clippy::unwrap_used)]
// Command dispatch against a wiremock hub.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use duosync_api::{DEFAULT_DEVICE_ENDPOINT, HubClient};
use duosync_core::{Command, CommandDispatcher, CoreError};

async fn setup() -> (MockServer, CommandDispatcher) {
    let server = MockServer::start().await;
    let client = HubClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        DEFAULT_DEVICE_ENDPOINT,
    );
    (server, CommandDispatcher::new(client))
}

fn route(action: &str) -> String {
    format!("{DEFAULT_DEVICE_ENDPOINT}/{action}_multiple")
}

fn ids() -> Vec<String> {
    vec!["a".into(), "b".into()]
}

#[tokio::test]
async fn color_is_clamped_and_sent_at_full_gain() {
    let (server, dispatcher) = setup().await;

    Mock::given(method("POST"))
        .and(path(route("color")))
        .and(body_json(json!({
            "device_ids": ["a", "b"],
            "red": 255, "green": 0, "blue": 13,
            "gain": 100
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher.set_color(ids(), 400.0, -20.0, 12.5).await.unwrap();
}

#[tokio::test]
async fn brightness_and_temperature_are_clamped() {
    let (server, dispatcher) = setup().await;

    Mock::given(method("POST"))
        .and(path(route("brightness")))
        .and(body_json(json!({ "device_ids": ["a", "b"], "brightness": 1 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(route("temperature")))
        .and(body_json(json!({ "device_ids": ["a", "b"], "temperature": 6500 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher.set_brightness(ids(), 0.0).await.unwrap();
    dispatcher.set_temperature(ids(), 12_000.0).await.unwrap();
}

#[tokio::test]
async fn white_carries_white_and_gain() {
    let (server, dispatcher) = setup().await;

    Mock::given(method("POST"))
        .and(path(route("white")))
        .and(body_json(json!({ "device_ids": ["a"], "white": 100, "gain": 0 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    dispatcher
        .set_white(vec!["a".into()], 150.0, f64::NAN)
        .await
        .unwrap();
}

#[tokio::test]
async fn on_and_off_post_only_ids() {
    let (server, dispatcher) = setup().await;

    for action in ["on", "off"] {
        Mock::given(method("POST"))
            .and(path(route(action)))
            .and(body_json(json!({ "device_ids": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
    }

    dispatcher.turn_on(ids()).await.unwrap();
    dispatcher
        .dispatch(&Command::TurnOff { device_ids: ids() })
        .await
        .unwrap();
}

#[tokio::test]
async fn empty_targets_never_reach_the_hub() {
    let (server, dispatcher) = setup().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = dispatcher.turn_on(Vec::new()).await;
    assert!(matches!(result, Err(CoreError::ValidationFailed { .. })));
}

#[tokio::test]
async fn hub_failures_reach_the_caller() {
    let (server, dispatcher) = setup().await;

    Mock::given(method("POST"))
        .and(path(route("on")))
        .respond_with(ResponseTemplate::new(500).set_body_string("relay stuck"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(route("off")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = dispatcher.turn_on(ids()).await.unwrap_err();
    assert!(matches!(err, CoreError::Api { status: Some(500), .. }));

    let err = dispatcher.turn_off(ids()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));
}
