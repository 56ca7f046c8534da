#![allow(dead_code)]

use eesmoke::{ClientConfig, CredentialRecord, OAuth2Credentials, Session};
use httpmock::prelude::*;
use httpmock::Mock;
use serde_json::json;
use std::time::Duration;

pub const PROJECT: &str = "ee-smoke";
pub const COMPUTE_PATH: &str = "/v1/projects/ee-smoke/value:compute";
pub const ACCESS_TOKEN: &str = "ya29.test-access-token";

pub fn raw_credentials() -> String {
    json!({
        "client_id": "517222506229-test.apps.googleusercontent.com",
        "client_secret": "d-FL95Q19q7MQmFpd7hHD0Ty",
        "refresh_token": "1//0g-test-refresh-token",
        "project": PROJECT
    })
    .to_string()
}

pub fn credentials(server: &MockServer) -> OAuth2Credentials {
    let record = CredentialRecord::from_json(&raw_credentials()).unwrap();
    OAuth2Credentials::from_record(&record).with_token_uri(server.url("/token"))
}

pub fn session(server: &MockServer) -> Session {
    session_with(server, credentials(server))
}

pub fn session_with(server: &MockServer, credentials: OAuth2Credentials) -> Session {
    let cfg = ClientConfig {
        url: server.base_url(),
        project: None,
        verify: true,
    };
    Session::new(credentials, cfg)
        .unwrap()
        .with_progress(false)
        .with_retry_max(3)
        .with_sleep_max(Duration::from_millis(5))
}

pub fn token_mock(server: &MockServer) -> Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/token")
            .body_contains("grant_type=refresh_token")
            .body_contains("client_id=517222506229-test.apps.googleusercontent.com");
        then.status(200).json_body(json!({
            "access_token": ACCESS_TOKEN,
            "expires_in": 3599,
            "token_type": "Bearer"
        }));
    })
}

pub fn echo_mock<'a>(server: &'a MockServer, reply: &str) -> Mock<'a> {
    let reply = reply.to_string();
    server.mock(move |when, then| {
        when.method(POST)
            .path(COMPUTE_PATH)
            .header("authorization", format!("Bearer {}", ACCESS_TOKEN))
            .header("x-goog-user-project", PROJECT)
            .body_contains("\"constantValue\":\"Greetings from the Earth Engine servers!\"");
        then.status(200).json_body(json!({ "result": reply }));
    })
}

pub fn sample_mock(server: &MockServer, result: serde_json::Value) -> Mock<'_> {
    server.mock(move |when, then| {
        when.method(POST)
            .path(COMPUTE_PATH)
            .header("authorization", format!("Bearer {}", ACCESS_TOKEN))
            .body_contains("\"functionName\":\"Image.sample\"")
            .body_contains("\"USGS/SRTMGL1_003\"")
            .body_contains("[86.925,27.9881]");
        then.status(200).json_body(json!({ "result": result }));
    })
}
