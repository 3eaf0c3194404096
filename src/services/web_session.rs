//! Browser sign-in state. The server keeps nothing; the session rides in a
//! single HttpOnly cookie, form-encoded so names with spaces or accents stay
//! inside the cookie grammar.

use crate::client::session::Session;
use crate::models::UserProfile;
use anyhow::{Context, Result};
use http::{HeaderMap, HeaderValue, header};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "textbook_session";
const ATTRIBUTES: &str = "Path=/; HttpOnly; SameSite=Lax";

#[derive(Serialize, Deserialize)]
struct CookieSession {
    token: String,
    id: String,
    email: String,
    name: String,
    programming_experience: String,
    hardware_experience: String,
    primary_interest: String,
}

impl From<&Session> for CookieSession {
    fn from(session: &Session) -> Self {
        let user = &session.user;
        CookieSession {
            token: session.token.clone(),
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            programming_experience: user.programming_experience.clone(),
            hardware_experience: user.hardware_experience.clone(),
            primary_interest: user.primary_interest.clone(),
        }
    }
}

impl From<CookieSession> for Session {
    fn from(cookie: CookieSession) -> Self {
        Session {
            token: cookie.token,
            user: UserProfile {
                id: cookie.id,
                email: cookie.email,
                name: cookie.name,
                programming_experience: cookie.programming_experience,
                hardware_experience: cookie.hardware_experience,
                primary_interest: cookie.primary_interest,
            },
        }
    }
}

/// `Set-Cookie` value that signs the browser in.
pub fn sign_in_cookie(session: &Session) -> Result<HeaderValue> {
    let value = serde_urlencoded::to_string(CookieSession::from(session))
        .context("failed to encode session cookie")?;
    HeaderValue::from_str(&format!("{SESSION_COOKIE}={value}; {ATTRIBUTES}"))
        .context("session cookie is not a valid header value")
}

/// `Set-Cookie` value that expires the session cookie.
pub fn sign_out_cookie() -> HeaderValue {
    HeaderValue::from_static("textbook_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The session carried by the request, if any. A cookie that does not
/// decode, or holds an empty token, counts as signed out.
pub fn read(headers: &HeaderMap) -> Option<Session> {
    let value = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find_map(|(name, value)| (name == SESSION_COOKIE).then_some(value))?;
    match serde_urlencoded::from_str::<CookieSession>(value) {
        Ok(cookie) if !cookie.token.is_empty() => Some(cookie.into()),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "ignoring unreadable session cookie");
            None
        }
    }
}
