use crate::app::AppState;
use crate::client::auth::{Account, AuthError, Background, Contact, signup_request};
use crate::client::session::Session;
use crate::services::backend::Backend;
use crate::services::registry;
use crate::services::render::{self, SignupPage};
use crate::services::web_session;
use axum::{
    Form, Json,
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use http::{HeaderMap, StatusCode, header};
use serde::Deserialize;
use serde_json::{Value, json};

pub async fn home(headers: HeaderMap) -> Html<String> {
    let viewer = web_session::read(&headers);
    Html(render::home(viewer.as_ref().map(|s| &s.user)))
}

pub async fn chapter(Path(slug): Path<String>, headers: HeaderMap) -> (StatusCode, Html<String>) {
    let viewer = web_session::read(&headers);
    let viewer = viewer.as_ref().map(|s| &s.user);
    match registry::resolve(&slug) {
        Some(entry) => (StatusCode::OK, Html(render::chapter(entry, viewer))),
        None => {
            tracing::debug!(%slug, "unknown chapter");
            (StatusCode::NOT_FOUND, Html(render::not_found(viewer)))
        }
    }
}

pub async fn not_found(headers: HeaderMap) -> (StatusCode, Html<String>) {
    let viewer = web_session::read(&headers);
    (
        StatusCode::NOT_FOUND,
        Html(render::not_found(viewer.as_ref().map(|s| &s.user))),
    )
}

pub async fn chapter_index() -> Json<Value> {
    Json(json!({
        "modules": registry::modules(),
        "chapters": registry::chapters(),
    }))
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn signup_form(headers: HeaderMap) -> Html<String> {
    let viewer = web_session::read(&headers);
    let page = SignupPage::Account {
        name: "",
        email: "",
        error: None,
    };
    Html(render::signup(&page, viewer.as_ref().map(|s| &s.user)))
}

/// Expires the session cookie and goes back to the home page.
pub async fn sign_out() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, web_session::sign_out_cookie())],
        Redirect::to("/"),
    )
}

/// Fields of both signup steps. Step two re-posts name and email as hidden
/// inputs; the password is only ever typed on step two.
#[derive(Debug, Default, Deserialize)]
pub struct SignupFields {
    #[serde(default)]
    step: u8,
    #[serde(default)]
    back: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    programming_experience: String,
    #[serde(default)]
    hardware_experience: String,
    #[serde(default)]
    primary_interest: String,
}

pub async fn signup_submit(State(state): State<AppState>, Form(fields): Form<SignupFields>) -> Response {
    let contact = match Contact::parse(&fields.name, &fields.email) {
        Ok(contact) => contact,
        Err(err) => return account_step(&fields, Some(&err)),
    };
    if fields.step < 2 {
        return background_step(&contact, None);
    }
    if fields.back.is_some() {
        return account_step(&fields, None);
    }
    let account = match Account::with_password(contact.clone(), &fields.password) {
        Ok(account) => account,
        Err(err) => return background_step(&contact, Some(&err)),
    };
    let background = match Background::parse(
        &fields.programming_experience,
        &fields.hardware_experience,
        &fields.primary_interest,
    ) {
        Ok(background) => background,
        Err(err) => return background_step(&contact, Some(&err)),
    };

    let request = signup_request(&account, &background);
    match state.backend.signup(&request).await {
        Ok(response) => {
            tracing::info!(user = %response.user.email, "account created");
            signed_up(Session {
                token: response.token,
                user: response.user,
            })
        }
        Err(err) => background_step(&contact, Some(&AuthError::from_backend(err, "Signup failed"))),
    }
}

fn signed_up(session: Session) -> Response {
    let done = SignupPage::Done {
        name: &session.user.name,
    };
    match web_session::sign_in_cookie(&session) {
        Ok(cookie) => (
            [(header::SET_COOKIE, cookie)],
            Html(render::signup(&done, Some(&session.user))),
        )
            .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "account created but the browser could not be signed in");
            Html(render::signup(&done, None)).into_response()
        }
    }
}

fn account_step(fields: &SignupFields, error: Option<&AuthError>) -> Response {
    let message = error.map(ToString::to_string);
    let status = if error.is_some() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::OK
    };
    let page = SignupPage::Account {
        name: &fields.name,
        email: &fields.email,
        error: message.as_deref(),
    };
    (status, Html(render::signup(&page, None))).into_response()
}

fn background_step(contact: &Contact, error: Option<&AuthError>) -> Response {
    let message = error.map(ToString::to_string);
    let status = match error {
        None => StatusCode::OK,
        Some(AuthError::Connection) => StatusCode::BAD_GATEWAY,
        Some(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let page = SignupPage::Background {
        contact,
        error: message.as_deref(),
    };
    (status, Html(render::signup(&page, None))).into_response()
}

#[cfg(test)]
mod tests {
    use crate::app::{AppState, build_router};
    use crate::services::backend::tests::{client_for, dead_address, spawn_upstream};
    use crate::services::registry;
    use axum::{
        Json, Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
        routing::post,
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn app() -> Router {
        build_router(AppState {
            backend: Arc::new(client_for(&dead_address().await)),
        })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn post_form(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/signup")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn every_static_slug_renders() {
        for slug in registry::static_params() {
            let (status, html) = get(app().await, &format!("/chapters/{slug}")).await;
            assert_eq!(status, StatusCode::OK, "{slug}");
            assert!(html.contains("class=\"chapter-body\""));
        }
    }

    #[tokio::test]
    async fn unknown_slug_is_not_found() {
        for uri in ["/chapters/nope", "/chapters/ROS2-ARCHITECTURE", "/chapters/%20isaac-sim"] {
            let (status, html) = get(app().await, uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert!(html.contains("Page not found"));
        }
    }

    #[tokio::test]
    async fn health_and_index() {
        let (status, body) = get(app().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");

        let (_, body) = get(app().await, "/api/chapters").await;
        let index: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(index["chapters"].as_array().unwrap().len(), 15);
        assert_eq!(index["chapters"][0]["next"]["slug"], "ros2-architecture");
        assert!(index["chapters"][0].get("body").is_none());
    }

    #[tokio::test]
    async fn signup_step_one_validates_then_advances() {
        let response = app()
            .await
            .oneshot(post_form("step=1&name=Ada&email=nope"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app()
            .await
            .oneshot(post_form("step=1&name=Ada&email=ada%40example.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let html = text(response).await;
        assert!(html.contains("Programming Experience"));
        assert!(html.contains(r#"<input type="password" name="password""#));
    }

    #[tokio::test]
    async fn password_never_comes_back_in_the_page() {
        for body in [
            // stray password on a failing step one
            "step=1&name=Ada&email=nope&password=Zq7-secret-long",
            // too short on step two
            "step=2&name=Ada&email=ada%40example.com&password=Zq7-sec\
             &programming_experience=advanced&hardware_experience=none&primary_interest=ai",
            // good password, bad background
            "step=2&name=Ada&email=ada%40example.com&password=Zq7-secret-long\
             &programming_experience=expert&hardware_experience=none&primary_interest=ai",
        ] {
            let response = app().await.oneshot(post_form(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY, "{body}");
            let html = text(response).await;
            assert!(!html.contains("Zq7-sec"), "{body}");
        }
    }

    #[tokio::test]
    async fn signup_step_two_relays_to_backend() {
        let upstream = Router::new().route(
            "/api/auth/signup",
            post(|Json(body): Json<Value>| async move {
                Json(json!({
                    "token": "t",
                    "user": {
                        "id": "1",
                        "email": body["email"],
                        "name": body["name"],
                        "programming_experience": body["programming_experience"],
                        "hardware_experience": body["hardware_experience"],
                        "primary_interest": body["primary_interest"],
                    }
                }))
            }),
        );
        let app = build_router(AppState {
            backend: Arc::new(client_for(&spawn_upstream(upstream).await)),
        });

        let response = app
            .clone()
            .oneshot(post_form(
                "step=2&name=Ada&email=ada%40example.com&password=analytical\
                 &programming_experience=advanced&hardware_experience=none&primary_interest=ai",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("textbook_session="));
        assert!(cookie.contains("HttpOnly"));
        let html = text(response).await;
        assert!(html.contains("Welcome, Ada!"));
        assert!(html.contains(r#"<span class="user">Ada</span>"#));

        // The next page load carries the cookie and shows who is signed in.
        let pair = cookie.split(';').next().unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/chapters/ros2-architecture")
                    .header(header::COOKIE, pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let html = text(response).await;
        assert!(html.contains(r#"<span class="user">Ada</span>"#));
        assert!(!html.contains(">Sign In</a>"));
    }

    #[tokio::test]
    async fn sign_out_expires_the_cookie() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/signout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn signup_offline_shows_connection_error() {
        let response = app()
            .await
            .oneshot(post_form(
                "step=2&name=Ada&email=ada%40example.com&password=analytical\
                 &programming_experience=advanced&hardware_experience=none&primary_interest=ai",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let html = text(response).await;
        assert!(html.contains("Connection error. Please try again."));
        assert!(!html.contains("analytical"));
    }
}
