//! Authenticated wiki session.
//!
//! The instance sits behind single sign-on, so interactive logins are not
//! possible from a script: authentication is either HTTP Basic (server /
//! data-center installs) or a raw browser cookie header captured after a
//! manual SSO login. Either way the result is one verified, reusable
//! session handle owning the HTTP client for the rest of the run.

use base64::Engine;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, USER_AGENT};
use std::time::Duration;

use crate::error::{AuthError, Result};

/// Some SSO gateways reject non-browser agents outright.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Credential material accepted by [`Session::authenticate`].
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Username + secret for HTTP Basic authentication.
    Basic { username: String, secret: String },
    /// Raw browser cookie header captured after an SSO login.
    CookieHeader(String),
}

/// An authenticated HTTP session against one wiki instance.
///
/// Owns the underlying client; the page repository borrows it for the
/// duration of one run. Authentication mutates the session in place and is
/// not safe for concurrent attempts — callers must serialize runs.
pub struct Session {
    base_url: String,
    client: Client,
}

impl Session {
    /// Establish and verify a session from the supplied credentials.
    ///
    /// Cookie credentials are parsed as `name=value` pairs separated by
    /// `;` (a leading `Cookie:` prefix is tolerated) and installed as a
    /// default header. Verification performs one read-only call against
    /// the space listing endpoint and requires HTTP 200.
    pub fn authenticate(
        base_url: &str,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        match credentials {
            Credentials::Basic { username, secret } => {
                if username.trim().is_empty() {
                    return Err(AuthError::InvalidCredentials.into());
                }
                let token = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, secret));
                let value = HeaderValue::from_str(&format!("Basic {}", token))
                    .map_err(|_| AuthError::InvalidCredentials)?;
                headers.insert(AUTHORIZATION, value);
            }
            Credentials::CookieHeader(raw) => {
                let pairs = parse_cookie_header(raw);
                if pairs.is_empty() {
                    return Err(AuthError::InvalidCredentials.into());
                }
                let joined = pairs
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; ");
                let value = HeaderValue::from_str(&joined)
                    .map_err(|_| AuthError::InvalidCredentials)?;
                headers.insert(COOKIE, value);
            }
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Network(e.to_string()))?;

        let session = Self { base_url, client };
        session.verify()?;
        Ok(session)
    }

    /// Lightweight verification against a known read-only endpoint.
    fn verify(&self) -> Result<()> {
        let url = format!("{}/rest/api/space", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| AuthError::Network(e.to_string()))?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err(AuthError::VerificationFailed(resp.status().as_u16()).into());
        }
        Ok(())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> &Client {
        &self.client
    }
}

/// Parse a raw browser cookie header into `(name, value)` pairs.
pub fn parse_cookie_header(raw: &str) -> Vec<(String, String)> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("Cookie:").map(str::trim).unwrap_or(raw);
    raw.split(';')
        .filter_map(|part| {
            let (name, value) = part.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some((name.to_string(), value.trim().to_string()))
        })
        .collect()
}
