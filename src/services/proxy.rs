//! JSON relay routes. Each handler checks what can be checked locally, then
//! forwards the body untouched and hands the backend's answer back.

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::backend::{
    CHAT_PATH, LOGIN_PATH, PERSONALIZE_PATH, SIGNUP_PATH, TRANSLATE_PATH, check_question,
    check_transform_content,
};
use axum::{Json, extract::State};
use serde_json::Value;

fn str_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body.get(key).and_then(Value::as_str).unwrap_or_default()
}

pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    check_question(str_field(&body, "question"))?;
    Ok(Json(state.backend.relay(CHAT_PATH, &body).await?))
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.backend.relay(SIGNUP_PATH, &body).await?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(state.backend.relay(LOGIN_PATH, &body).await?))
}

pub async fn personalize(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    check_transform_content(str_field(&body, "content"))?;
    Ok(Json(state.backend.relay(PERSONALIZE_PATH, &body).await?))
}

pub async fn translate(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    check_transform_content(str_field(&body, "content"))?;
    Ok(Json(state.backend.relay(TRANSLATE_PATH, &body).await?))
}

#[cfg(test)]
mod tests {
    use crate::app::{AppState, build_router};
    use crate::services::backend::tests::{client_for, dead_address, spawn_upstream};
    use axum::{
        Json, Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        routing::post,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn app_for(base: &str) -> Router {
        build_router(AppState {
            backend: Arc::new(client_for(base)),
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn chat_is_relayed_verbatim() {
        let upstream = Router::new().route(
            "/api/chat/",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "message_id": "m-7",
                    "answer": "Nodes talk over topics.",
                    "sources": [{"chapter": "1.2", "title": "ROS 2 Architecture", "relevance": 0.8}],
                    "echo": body,
                }))
            }),
        );
        let app = app_for(&spawn_upstream(upstream).await);

        let request = json!({"question": "How do nodes talk?", "context": "topics"});
        let response = app
            .oneshot(post_json("/api/chat", request.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["answer"], "Nodes talk over topics.");
        assert_eq!(body["echo"], request);
    }

    #[tokio::test]
    async fn short_content_is_rejected_before_relaying() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let upstream = Router::new().route(
            "/api/content/translate",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(json!({"translated_content": "x"}))
                }
            }),
        );
        let app = app_for(&spawn_upstream(upstream).await);

        let response = app
            .oneshot(post_json(
                "/api/content/translate",
                json!({"content": "   short   ", "target_language": "urdu"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(json_body(response).await["error"].as_str().unwrap().contains("50"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through() {
        let upstream = Router::new().route(
            "/api/auth/signup",
            post(|| async {
                (
                    StatusCode::CONFLICT,
                    Json(json!({"detail": "Email already registered"})),
                )
            }),
        );
        let app = app_for(&spawn_upstream(upstream).await);

        let response = app
            .oneshot(post_json("/api/auth/signup", json!({"email": "a@b.c"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert!(body["details"].as_str().unwrap().contains("Email already registered"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_bad_gateway() {
        let app = app_for(&dead_address().await);
        let response = app
            .oneshot(post_json("/api/chat/", json!({"question": "hello?"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"], "connection error");
    }

    #[tokio::test]
    async fn blank_question_is_bad_request() {
        let app = app_for(&dead_address().await);
        let response = app
            .oneshot(post_json("/api/chat", json!({"question": "  "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
