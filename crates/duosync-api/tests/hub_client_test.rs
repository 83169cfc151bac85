#![allow(clippy::unwrap_used)]
// Integration tests for `HubClient` using wiremock.

use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use duosync_api::{DEFAULT_DEVICE_ENDPOINT, Error, HubClient};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, HubClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = HubClient::with_client(reqwest::Client::new(), base_url, DEFAULT_DEVICE_ENDPOINT);
    (server, client)
}

fn device_path(suffix: &str) -> String {
    format!("{DEFAULT_DEVICE_ENDPOINT}/{suffix}")
}

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}

// ── Status tests ────────────────────────────────────────────────────

#[tokio::test]
async fn test_devices_status_returns_raw_json() {
    let (server, client) = setup().await;

    let body = json!({
        "kitchen": { "ison": true, "power": 5.5, "red": 10 },
        "hall": { "ison": false }
    });

    Mock::given(method("GET"))
        .and(path("/devices/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let value = client.devices_status().await.unwrap();
    assert_eq!(value, body);
}

#[tokio::test]
async fn test_devices_status_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/devices/status"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let err = client.devices_status().await.unwrap_err();
    assert!(err.is_not_found(), "expected not-found, got: {err:?}");
}

#[tokio::test]
async fn test_device_list_uses_device_endpoint() {
    let (server, client) = setup().await;

    let body = json!([{ "device_id": "a", "ison": true }]);

    Mock::given(method("GET"))
        .and(path(DEFAULT_DEVICE_ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    assert_eq!(client.device_list().await.unwrap(), body);
}

#[tokio::test]
async fn test_invalid_json_is_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/devices/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client.devices_status().await;
    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("oops")),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Control tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_turn_on_posts_device_ids() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(device_path("on_multiple")))
        .and(body_json(json!({ "device_ids": ["a", "b"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    client.turn_on(&ids(&["a", "b"])).await.unwrap();
}

#[tokio::test]
async fn test_set_color_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(device_path("color_multiple")))
        .and(body_json(json!({
            "device_ids": ["a"],
            "red": 255, "green": 0, "blue": 12,
            "gain": 100
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_color(&ids(&["a"]), (255, 0, 12), 100).await.unwrap();
}

#[tokio::test]
async fn test_set_white_body() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(device_path("white_multiple")))
        .and(body_json(json!({ "device_ids": ["a"], "white": 100, "gain": 40 })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client.set_white(&ids(&["a"]), 100, 40).await.unwrap();
}

#[tokio::test]
async fn test_control_failure_surfaces_status() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(device_path("temperature_multiple")))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let result = client.set_temperature(&ids(&["a"]), 4000).await;
    assert!(
        matches!(result, Err(Error::Http { status: 502, .. })),
        "expected Http 502, got: {result:?}"
    );
}
