//! Wiki page repository.
//!
//! Fetches a page's content and version and writes updated content back
//! under optimistic concurrency control. The remote system is the sole
//! authority on conflict detection: a write always submits
//! `base_version + 1` and a stale base surfaces as `Conflict` — no local
//! reconciliation, no retry. The repository holds no cache; every fetch is
//! an authoritative round trip.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::Page;
use crate::session::Session;

/// Read/write access to wiki pages for one run.
///
/// The live implementation is [`PageRepository`]; tests use an in-memory
/// store.
pub trait PageStore {
    /// Fetch a page. `expand` selects which nested attributes the remote
    /// expands (e.g. `body.storage,version`); unsupported fields are
    /// remote-defined behavior.
    fn fetch(&self, page_id: &str, expand: &str) -> Result<Page>;

    /// Write new content on top of `base_version`. The returned page
    /// carries the version echoed back by the remote (`base_version + 1`
    /// on success).
    fn write(&self, page_id: &str, title: &str, content: &str, base_version: u32) -> Result<Page>;
}

/// [`PageStore`] backed by the content API over an authenticated
/// [`Session`].
pub struct PageRepository<'a> {
    session: &'a Session,
}

impl<'a> PageRepository<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    fn content_url(&self, page_id: &str) -> String {
        format!("{}/rest/api/content/{}", self.session.base_url(), page_id)
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    title: String,
    version: VersionField,
    body: Option<BodyField>,
}

#[derive(Debug, Deserialize)]
struct VersionField {
    number: u32,
}

#[derive(Debug, Deserialize)]
struct BodyField {
    storage: StorageField,
}

#[derive(Debug, Deserialize)]
struct StorageField {
    value: String,
}

impl PageStore for PageRepository<'_> {
    fn fetch(&self, page_id: &str, expand: &str) -> Result<Page> {
        let resp = self
            .session
            .client()
            .get(self.content_url(page_id))
            .query(&[("expand", expand)])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(match status.as_u16() {
                404 => Error::NotFound(format!("page {}", page_id)),
                401 | 403 => Error::Forbidden(format!("page {} (HTTP {})", page_id, status)),
                code => Error::Network(format!(
                    "page fetch failed (HTTP {}): {}",
                    code,
                    truncate(&body, 500)
                )),
            });
        }

        let parsed: PageResponse = resp
            .json()
            .map_err(|e| Error::Network(format!("malformed page response: {}", e)))?;

        Ok(Page {
            id: page_id.to_string(),
            title: parsed.title,
            version: parsed.version.number,
            content: parsed
                .body
                .map(|b| b.storage.value)
                .unwrap_or_default(),
        })
    }

    fn write(&self, page_id: &str, title: &str, content: &str, base_version: u32) -> Result<Page> {
        let body = serde_json::json!({
            "version": { "number": base_version + 1 },
            "title": title,
            "type": "page",
            "body": {
                "storage": {
                    "value": content,
                    "representation": "storage"
                }
            }
        });

        let resp = self
            .session
            .client()
            .put(self.content_url(page_id))
            .json(&body)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            let detail = truncate(&text, 500);
            return Err(match status.as_u16() {
                409 => Error::Conflict {
                    page_id: page_id.to_string(),
                    detail,
                },
                404 => Error::NotFound(format!("page {}", page_id)),
                401 | 403 => Error::Forbidden(format!("page {} (HTTP {})", page_id, status)),
                // some installs report a stale base version as a plain 400
                _ if text.contains("version") => Error::Conflict {
                    page_id: page_id.to_string(),
                    detail,
                },
                code => Error::Network(format!("page write failed (HTTP {}): {}", code, detail)),
            });
        }

        let parsed: PageResponse = resp
            .json()
            .map_err(|e| Error::Network(format!("malformed write response: {}", e)))?;

        Ok(Page {
            id: page_id.to_string(),
            title: parsed.title,
            version: parsed.version.number,
            // the write response omits the body unless asked to expand it
            content: content.to_string(),
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
