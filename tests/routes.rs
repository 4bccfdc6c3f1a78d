use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use game_settings_sync::{
    auth::USER_ROLE_HEADER,
    config::AppConfig,
    dao::fallback::MemoryFallbackStore,
    routes,
    state::{AppState, SharedState},
};

async fn test_app() -> (Router, SharedState) {
    let state = AppState::new(&AppConfig::default(), Arc::new(MemoryFallbackStore::new()));
    state.settings().fetch().await;
    (routes::router(state.clone()), state)
}

fn put_setting(game_name: &str, role: Option<&str>, is_enabled: bool) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::PUT)
        .uri(format!("/settings/{game_name}"))
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(role) = role {
        builder = builder.header(USER_ROLE_HEADER, role);
    }
    builder
        .body(Body::from(json!({ "is_enabled": is_enabled }).to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn update_requires_the_admin_role() {
    let (app, state) = test_app().await;

    let res = app
        .clone()
        .oneshot(put_setting("quiz_game", Some("player"), true))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(json_body(res).await["message"].is_string());

    let res = app
        .oneshot(put_setting("quiz_game", None, true))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(!state.settings().is_enabled("quiz_game").await);
}

#[tokio::test]
async fn update_rejects_blank_game_names() {
    let (app, _) = test_app().await;

    let res = app
        .oneshot(put_setting("%20", Some("admin"), true))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_update_returns_the_refreshed_view() {
    let (app, _) = test_app().await;

    let res = app
        .clone()
        .oneshot(put_setting("quiz_game", Some("admin"), true))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let view = json_body(res).await;
    assert_eq!(view["is_admin"], true);
    assert!(view["error"].is_null());
    let quiz = view["settings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|row| row["game_name"] == "quiz_game")
        .unwrap();
    assert_eq!(quiz["is_enabled"], true);

    let res = app.oneshot(get("/settings/quiz_game")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        json_body(res).await,
        json!({ "game_name": "quiz_game", "is_enabled": true })
    );
}

#[tokio::test]
async fn anonymous_view_is_not_admin() {
    let (app, _) = test_app().await;

    let res = app.oneshot(get("/settings")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let view = json_body(res).await;
    assert_eq!(view["is_admin"], false);
    assert_eq!(view["loading"], false);
    assert_eq!(view["settings"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn healthcheck_reports_degraded_without_remote_store() {
    let (app, _) = test_app().await;

    let res = app.oneshot(get("/healthcheck")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = json_body(res).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["remote_connected"], false);
    assert_eq!(body["settings"], 6);
}
