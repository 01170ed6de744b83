//! End-to-end admission tests driving the public router.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use common::{harness, json_body, test_config, ALLOWED_ORIGIN};

#[tokio::test]
async fn test_sealed_request_is_admitted() {
    let h = harness(test_config());
    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "  <b>a red fox</b> ", "style": "ink"}));

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-session-id"], "s1");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
    assert!(response.headers().contains_key("x-request-id"));

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["prompt"], "ba red fox/b");
    assert_eq!(body["data"]["options"]["style"], "ink");
    assert_eq!(body["data"]["sessionId"], "s1");
}

#[tokio::test]
async fn test_sixth_request_is_rate_limited() {
    let h = harness(test_config());
    for _ in 0..5 {
        let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
    assert_eq!(body["error"]["retryAfter"], 60);
}

#[tokio::test]
async fn test_window_reopens_after_cool_down() {
    let h = harness(test_config());
    for _ in 0..6 {
        let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
        h.router.clone().oneshot(request).await.unwrap();
    }
    h.clock.advance(60_000);

    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_ip_limit_spans_sessions() {
    let h = harness(test_config());
    for i in 0..8 {
        let request = h.generate_request(&format!("s{i}"), "10.0.0.9", &json!({"prompt": "hello"}));
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let request = h.generate_request("fresh", "10.0.0.9", &json!({"prompt": "hello"}));
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    // the session's slot was released when the IP check failed
    assert_eq!(h.security.session_limiter().remaining_requests("fresh"), 5);
}

#[tokio::test]
async fn test_rejected_requests_during_in_flight_load_leave_session_usable() {
    let h = harness(test_config());
    let in_flight: Vec<_> = (0..5)
        .map(|_| h.security.session_limiter().try_acquire("victim").unwrap())
        .collect();

    for _ in 0..3 {
        let mut request = h.generate_request("victim", "10.0.0.66", &json!({"prompt": "hello"}));
        request
            .headers_mut()
            .insert("x-signature", "ab".repeat(32).parse().unwrap());
        let response = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }
    drop(in_flight);

    let request = h.generate_request("victim", "10.0.0.1", &json!({"prompt": "hello"}));
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "4");
}

#[tokio::test]
async fn test_oversized_body_gets_json_error() {
    let mut config = test_config();
    config.listener.max_body_size = 256;
    let h = harness(config);

    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "x".repeat(512)}));
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert!(h.security.session_limiter().snapshot("s1").is_none());
}

#[tokio::test]
async fn test_foreign_origin_forbidden() {
    let h = harness(test_config());
    let mut request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    request
        .headers_mut()
        .insert(header::ORIGIN, "https://evil.example".parse().unwrap());

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_ORIGIN");
}

#[tokio::test]
async fn test_referer_origin_checked() {
    let h = harness(test_config());
    let mut request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    request.headers_mut().remove(header::ORIGIN);
    request
        .headers_mut()
        .insert(header::REFERER, format!("{ALLOWED_ORIGIN}/studio?x=1").parse().unwrap());

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_plain_body_rejected_when_encryption_required() {
    let h = harness(test_config());
    let request = Request::post("/api/generate")
        .header("content-type", "application/json")
        .header("x-session-id", "s1")
        .body(Body::from(r#"{"prompt":"hello"}"#))
        .unwrap();

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "MISSING_ENCRYPTION_HEADERS");
}

#[tokio::test]
async fn test_stale_timestamp_rejected() {
    let h = harness(test_config());
    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    h.clock.advance(5 * 60_000 + 1);

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_TIMESTAMP");
}

#[tokio::test]
async fn test_forged_signature_rejected() {
    let h = harness(test_config());
    let mut request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    let forged = "ab".repeat(32);
    request
        .headers_mut()
        .insert("x-signature", forged.parse().unwrap());

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_SIGNATURE");
    assert_eq!(h.security.session_limiter().remaining_requests("s1"), 5);
}

#[tokio::test]
async fn test_undecryptable_payload_rejected() {
    let h = harness(test_config());
    let mut request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    request
        .headers_mut()
        .insert("x-iv", "00".repeat(8).parse().unwrap());

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "DECRYPTION_FAILED");
}

#[tokio::test]
async fn test_sensitive_prompt_rejected() {
    let h = harness(test_config());
    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "something NSFW please"}));

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "SENSITIVE_CONTENT");
    assert!(body["error"]["message"].as_str().unwrap().contains("nsfw"));
}

#[tokio::test]
async fn test_markup_only_prompt_rejected() {
    let h = harness(test_config());
    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": " <> "}));

    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_PROMPT");
}

#[tokio::test]
async fn test_csrf_flow() {
    let mut config = test_config();
    config.csrf.required = true;
    let h = harness(config);

    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_CSRF_TOKEN");

    let request = Request::get("/api/csrf-token")
        .header("x-session-id", "s1")
        .body(Body::empty())
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let token = json_body(response).await["data"]["token"].as_str().unwrap().to_string();

    let mut request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    request
        .headers_mut()
        .insert("x-csrf-token", token.parse().unwrap());
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_csrf_token_for_new_session() {
    let h = harness(test_config());
    let request = Request::get("/api/csrf-token").body(Body::empty()).unwrap();

    let response = h.router.clone().oneshot(request).await.unwrap();
    let session = response.headers()["x-session-id"].to_str().unwrap().to_string();
    assert!(session.starts_with("session_1700000000000_"));

    let body = json_body(response).await;
    assert_eq!(body["data"]["sessionId"], session.as_str());
    assert!(body["data"]["token"].as_str().unwrap().starts_with("csrf_"));
}

#[tokio::test]
async fn test_rate_limit_status() {
    let h = harness(test_config());
    let request = h.generate_request("s1", "10.0.0.1", &json!({"prompt": "hello"}));
    h.router.clone().oneshot(request).await.unwrap();

    let request = Request::get("/api/rate-limit")
        .header("x-session-id", "s1")
        .header("x-forwarded-for", "10.0.0.1")
        .body(Body::empty())
        .unwrap();
    let body = json_body(h.router.clone().oneshot(request).await.unwrap()).await;

    assert_eq!(body["data"]["session"]["remaining"], 4);
    assert_eq!(body["data"]["session"]["limit"], 5);
    assert_eq!(body["data"]["session"]["resetTime"], common::NOW + 60_000);
    assert_eq!(body["data"]["ip"]["remaining"], 7);
}

#[tokio::test]
async fn test_health() {
    let h = harness(test_config());
    let response = h
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn test_plain_mode_passes_body_through() {
    let mut config = test_config();
    config.encryption.require_encryption = false;
    let h = harness(config);

    let request = Request::post("/api/generate")
        .header("content-type", "application/json")
        .header("x-session-id", "plain")
        .body(Body::from(r#"{"prompt":"a quiet lake"}"#))
        .unwrap();
    let response = h.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["prompt"], "a quiet lake");
}
