//! Router-level tests: the full HTTP surface with real extractors

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use firma_api::router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_body() -> Value {
    json!({
        "documentType": "quote",
        "documentTitle": "Preventivo #123",
        "documentUrl": "http://127.0.0.1:1/unreachable.pdf",
        "signerName": "Anna Bianchi",
        "signerEmail": "a@b.it",
        "expiresInDays": 7,
    })
}

#[tokio::test]
async fn health_is_open() {
    let env = test_env().await;
    let app = router(env.state.clone());

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn internal_endpoints_require_a_bearer_token() {
    let env = test_env().await;
    let app = router(env.state.clone());

    let missing = app
        .clone()
        .oneshot(
            Request::post("/api/signatures")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .oneshot(
            Request::post("/api/signatures")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_link_with_a_forged_token_is_refused() {
    let env = test_env().await;
    let app = router(env.state.clone());

    let response = app
        .oneshot(
            Request::get("/sign/bm9wZQ.bm9wZQ")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_flow_over_http() {
    let env = test_env().await;
    let app = router(env.state.clone());
    let auth = format!("Bearer {}", requester_token(&env, "user-42"));

    // Create.
    let created = app
        .clone()
        .oneshot(
            Request::post("/api/signatures")
                .header(header::AUTHORIZATION, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let created = body_json(created).await;
    let id = created["request"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["request"]["status"], "pending");
    let sign_link = created["signLink"].as_str().unwrap();
    let token = sign_link.rsplit('/').next().unwrap().to_string();

    // The signer's view through the capability link.
    let view = app
        .clone()
        .oneshot(
            Request::get(format!("/sign/{token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(view.status(), StatusCode::OK);
    let view = body_json(view).await;
    assert_eq!(view["documentTitle"], "Preventivo #123");
    // The signer-facing projection carries no requester identity.
    assert!(view.get("requesterId").is_none());

    // Send the code.
    let sent = app
        .clone()
        .oneshot(
            Request::post(format!("/api/signatures/{id}/send-otp"))
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(sent.status(), StatusCode::OK);
    let code = env.channel.last_code().unwrap();

    // A wrong code reports remaining attempts.
    let wrong = if code == "000000" { "111111" } else { "000000" };
    let mismatch = app
        .clone()
        .oneshot(
            Request::post(format!("/sign/{token}/verify"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "otp": wrong }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
    let mismatch = body_json(mismatch).await;
    assert_eq!(mismatch["details"]["remainingAttempts"], 2);

    // The right code signs; padding around it is tolerated.
    let signed = app
        .clone()
        .oneshot(
            Request::post(format!("/sign/{token}/verify"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "otp": format!(" {code} ") }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(signed.status(), StatusCode::OK);
    let signed = body_json(signed).await;
    assert_eq!(signed["success"], true);

    // The requester detail now shows the terminal state and the trail.
    let detail = app
        .clone()
        .oneshot(
            Request::get(format!("/api/signatures/{id}"))
                .header(header::AUTHORIZATION, &auth)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(detail.status(), StatusCode::OK);
    let detail = body_json(detail).await;
    assert_eq!(detail["request"]["status"], "signed");
    assert!(detail["audit"].as_array().unwrap().len() >= 4);

    // Verifying again hits the closed-request guard.
    let again = app
        .oneshot(
            Request::post(format!("/sign/{token}/verify"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "otp": code }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::GONE);
}

#[tokio::test]
async fn decline_over_http_requires_a_reason() {
    let env = test_env().await;
    let app = router(env.state.clone());
    let auth = format!("Bearer {}", requester_token(&env, "user-42"));

    let created = app
        .clone()
        .oneshot(
            Request::post("/api/signatures")
                .header(header::AUTHORIZATION, &auth)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(created).await;
    let token = created["signLink"]
        .as_str()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();

    let empty = app
        .clone()
        .oneshot(
            Request::post(format!("/sign/{token}/decline"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "reason": "" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

    let declined = app
        .oneshot(
            Request::post(format!("/sign/{token}/decline"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "reason": "price changed" }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(declined.status(), StatusCode::OK);
    let declined = body_json(declined).await;
    assert_eq!(declined["status"], "declined");
}

#[tokio::test]
async fn cancel_over_http_is_owner_scoped() {
    let env = test_env().await;
    let app = router(env.state.clone());
    let owner = format!("Bearer {}", requester_token(&env, "user-42"));
    let stranger = format!("Bearer {}", requester_token(&env, "someone-else"));

    let created = app
        .clone()
        .oneshot(
            Request::post("/api/signatures")
                .header(header::AUTHORIZATION, &owner)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(create_body().to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let created = body_json(created).await;
    let id = created["request"]["id"].as_str().unwrap().to_string();

    let forbidden = app
        .clone()
        .oneshot(
            Request::delete(format!("/api/signatures/{id}"))
                .header(header::AUTHORIZATION, &stranger)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let cancelled = app
        .oneshot(
            Request::delete(format!("/api/signatures/{id}"))
                .header(header::AUTHORIZATION, &owner)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(cancelled.status(), StatusCode::OK);
    let cancelled = body_json(cancelled).await;
    assert_eq!(cancelled["status"], "cancelled");
}
