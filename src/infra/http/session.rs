//! Signed-cookie session: the logged-in user id plus one-shot flash messages.

use std::convert::Infallible;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::config::SessionSettings;
use crate::presentation::views::FlashView;

pub const FLASH_COOKIE: &str = "warbler_flash";

#[derive(Clone)]
pub struct SessionConfig {
    key: Key,
    cookie_name: String,
    secure: bool,
}

impl SessionConfig {
    /// The signing key is derived from `secret`, so any length of secret works.
    pub fn new(secret: &str, cookie_name: impl Into<String>, secure: bool) -> Self {
        let digest = Sha512::digest(secret.as_bytes());
        Self {
            key: Key::from(digest.as_slice()),
            cookie_name: cookie_name.into(),
            secure,
        }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        Self::new(
            &settings.secret_key,
            settings.cookie_name.clone(),
            settings.secure_cookies,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Danger,
    Info,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashCategory::Success => "success",
            FlashCategory::Danger => "danger",
            FlashCategory::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

impl From<Flash> for FlashView {
    fn from(flash: Flash) -> Self {
        Self {
            category: flash.category.as_str(),
            message: flash.message,
        }
    }
}

fn encode_flashes(flashes: &[Flash]) -> Option<String> {
    serde_json::to_vec(flashes)
        .ok()
        .map(|json| URL_SAFE_NO_PAD.encode(json))
}

/// Anything undecodable is dropped rather than surfaced.
fn decode_flashes(value: &str) -> Vec<Flash> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default()
}

/// Request-scoped view of the session cookies. Return it from a handler to persist changes.
pub struct Session {
    jar: SignedCookieJar,
    cookie_name: String,
    secure: bool,
}

impl Session {
    pub fn from_jar(jar: SignedCookieJar, config: &SessionConfig) -> Self {
        Self {
            jar,
            cookie_name: config.cookie_name.clone(),
            secure: config.secure,
        }
    }

    pub fn from_headers(headers: &HeaderMap, config: &SessionConfig) -> Self {
        let jar = SignedCookieJar::from_headers(headers, config.key.clone());
        Self::from_jar(jar, config)
    }

    pub fn user_id(&self) -> Option<i64> {
        self.jar
            .get(&self.cookie_name)
            .and_then(|cookie| cookie.value().parse().ok())
    }

    pub fn login(mut self, user_id: i64) -> Self {
        let cookie = self.cookie(self.cookie_name.clone(), user_id.to_string());
        self.jar = self.jar.add(cookie);
        self
    }

    pub fn logout(mut self) -> Self {
        let removal = self.removal(self.cookie_name.clone());
        self.jar = self.jar.remove(removal);
        self
    }

    pub fn flash(mut self, category: FlashCategory, message: impl Into<String>) -> Self {
        let mut flashes = self.pending_flashes();
        flashes.push(Flash {
            category,
            message: message.into(),
        });

        if let Some(encoded) = encode_flashes(&flashes) {
            let cookie = self.cookie(FLASH_COOKIE.to_string(), encoded);
            self.jar = self.jar.add(cookie);
        }
        self
    }

    /// Drain queued flashes; they are shown on exactly one rendered page.
    pub fn take_flashes(mut self) -> (Self, Vec<Flash>) {
        let flashes = self.pending_flashes();
        if self.jar.get(FLASH_COOKIE).is_some() {
            let removal = self.removal(FLASH_COOKIE.to_string());
            self.jar = self.jar.remove(removal);
        }
        (self, flashes)
    }

    fn pending_flashes(&self) -> Vec<Flash> {
        self.jar
            .get(FLASH_COOKIE)
            .map(|cookie| decode_flashes(cookie.value()))
            .unwrap_or_default()
    }

    fn cookie(&self, name: String, value: String) -> Cookie<'static> {
        Cookie::build((name, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .build()
    }

    fn removal(&self, name: String) -> Cookie<'static> {
        Cookie::build((name, String::new())).path("/").build()
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    SessionConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = SessionConfig::from_ref(state);
        Ok(Self::from_headers(&parts.headers, &config))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        self.jar.into_response_parts(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue, header};
    use axum::response::IntoResponse;

    fn config() -> SessionConfig {
        SessionConfig::new("test secret", "warbler_session", false)
    }

    fn fresh(config: &SessionConfig) -> Session {
        Session::from_jar(SignedCookieJar::new(config.key().clone()), config)
    }

    /// Replay the cookies a response sets as the `Cookie` header of the next request.
    fn next_request_headers(session: Session) -> HeaderMap {
        let response = (session, ()).into_response();
        let cookie_header = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| value.split(';').next())
            .filter(|pair| !pair.ends_with('='))
            .collect::<Vec<_>>()
            .join("; ");

        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&cookie_header) {
            headers.insert(header::COOKIE, value);
        }
        headers
    }

    fn reopen(headers: &HeaderMap, config: &SessionConfig) -> Session {
        Session::from_jar(
            SignedCookieJar::from_headers(headers, config.key().clone()),
            config,
        )
    }

    #[test]
    fn flashes_round_trip_through_base64_json() {
        let flashes = vec![
            Flash {
                category: FlashCategory::Danger,
                message: "Access unauthorized.".to_string(),
            },
            Flash {
                category: FlashCategory::Success,
                message: "Hello, testuser!".to_string(),
            },
        ];

        let encoded = encode_flashes(&flashes).expect("encodable");
        assert!(!encoded.contains(['"', ',', ';', '=']));
        assert_eq!(decode_flashes(&encoded), flashes);
    }

    #[test]
    fn garbage_flash_cookie_is_ignored() {
        assert!(decode_flashes("not base64 at all!").is_empty());
        assert!(decode_flashes(&URL_SAFE_NO_PAD.encode("{}")).is_empty());
    }

    #[test]
    fn login_and_flashes_survive_a_request_boundary() {
        let config = config();
        let session = fresh(&config)
            .login(42)
            .flash(FlashCategory::Success, "Hello, alice!")
            .flash(FlashCategory::Info, "second");

        let next = reopen(&next_request_headers(session), &config);
        assert_eq!(next.user_id(), Some(42));

        let (next, flashes) = next.take_flashes();
        let messages: Vec<_> = flashes.iter().map(|flash| flash.message.as_str()).collect();
        assert_eq!(messages, ["Hello, alice!", "second"]);
        assert!(next.pending_flashes().is_empty());
    }

    #[test]
    fn logout_forgets_the_user() {
        let config = config();
        let session = fresh(&config).login(9);
        let next = reopen(&next_request_headers(session), &config);

        let after = reopen(&next_request_headers(next.logout()), &config);
        assert_eq!(after.user_id(), None);
    }

    #[test]
    fn cookies_signed_with_another_secret_are_rejected() {
        let config = config();
        let headers = next_request_headers(fresh(&config).login(7));

        let other = SessionConfig::new("a different secret", "warbler_session", false);
        assert_eq!(reopen(&headers, &other).user_id(), None);
        assert_eq!(reopen(&headers, &config).user_id(), Some(7));
    }
}
