//! Credential loading for the CLI.
//!
//! Thin collaborator outside the synchronization core: the core receives
//! an opaque [`Credentials`] value and never persists it. Environment
//! variables win over the optional JSON file so CI and one-off runs need
//! no file on disk.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::session::Credentials;

/// Shape of the optional credentials file.
///
/// Either `{"cookies": "..."}` (captured browser cookie header) or
/// `{"username": "...", "password": "..."}`.
#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    cookies: Option<String>,
}

/// Load credentials from the environment, falling back to a JSON file.
///
/// Environment: `PUBSYNC_COOKIES`, or `PUBSYNC_USERNAME` +
/// `PUBSYNC_PASSWORD`.
pub fn load_credentials(path: Option<&Path>) -> Result<Credentials> {
    if let Ok(cookies) = std::env::var("PUBSYNC_COOKIES") {
        if !cookies.trim().is_empty() {
            return Ok(Credentials::CookieHeader(cookies));
        }
    }
    if let (Ok(username), Ok(password)) = (
        std::env::var("PUBSYNC_USERNAME"),
        std::env::var("PUBSYNC_PASSWORD"),
    ) {
        if !username.trim().is_empty() {
            return Ok(Credentials::Basic {
                username,
                secret: password,
            });
        }
    }

    let path = path.context(
        "no credentials: set PUBSYNC_COOKIES (or PUBSYNC_USERNAME/PUBSYNC_PASSWORD) \
         or pass --credentials <file>",
    )?;
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
    let parsed: CredentialFile =
        serde_json::from_str(&raw).with_context(|| "Failed to parse credentials file")?;

    if let Some(cookies) = parsed.cookies.filter(|c| !c.trim().is_empty()) {
        return Ok(Credentials::CookieHeader(cookies));
    }
    match (parsed.username, parsed.password) {
        (Some(username), Some(password)) if !username.trim().is_empty() => {
            Ok(Credentials::Basic {
                username,
                secret: password,
            })
        }
        _ => anyhow::bail!(
            "credentials file {} has neither cookies nor username/password",
            path.display()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cookie_file_wins_over_basic_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        fs::write(
            &path,
            r#"{"cookies": "JSESSIONID=abc", "username": "u", "password": "p"}"#,
        )
        .unwrap();

        match load_credentials(Some(&path)).unwrap() {
            Credentials::CookieHeader(raw) => assert_eq!(raw, "JSESSIONID=abc"),
            other => panic!("expected cookie credentials, got {:?}", other),
        }
    }

    #[test]
    fn basic_pair_loaded_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        fs::write(&path, r#"{"username": "editor", "password": "secret"}"#).unwrap();

        match load_credentials(Some(&path)).unwrap() {
            Credentials::Basic { username, secret } => {
                assert_eq!(username, "editor");
                assert_eq!(secret, "secret");
            }
            other => panic!("expected basic credentials, got {:?}", other),
        }
    }

    #[test]
    fn empty_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("creds.json");
        fs::write(&path, r#"{"cookies": "  "}"#).unwrap();
        assert!(load_credentials(Some(&path)).is_err());
    }
}
