//! Bibliographic search client (NCBI E-utilities).
//!
//! Two endpoints: `esearch.fcgi` returns matching record identifiers as
//! JSON, `efetch.fcgi` returns batched per-record metadata as XML. Records
//! that fail to parse are dropped with a warning; they never abort a
//! fetch.

use serde::Deserialize;
use std::time::Duration;

use crate::config::PubMedConfig;
use crate::error::{Error, Result};
use crate::models::BibRecord;

/// Abstract excerpts are capped at this many characters.
const ABSTRACT_EXCERPT_CHARS: usize = 200;

pub struct PubMedClient {
    http: reqwest::blocking::Client,
    base_url: String,
    email: String,
    tool: String,
}

impl PubMedClient {
    pub fn new(config: &PubMedConfig) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            tool: config.tool.clone(),
        })
    }

    /// Search for record identifiers matching a free-text query.
    pub fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let url = format!("{}/esearch.fcgi", self.base_url);
        let retmax = max_results.to_string();
        let params = [
            ("db", "pubmed"),
            ("term", query),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
            ("email", self.email.as_str()),
            ("tool", self.tool.as_str()),
        ];

        let resp = self.http.get(&url).query(&params).send()?;
        if !resp.status().is_success() {
            return Err(Error::Network(format!(
                "search failed (HTTP {})",
                resp.status()
            )));
        }

        let parsed: EsearchResponse = resp
            .json()
            .map_err(|e| Error::Network(format!("malformed search response: {}", e)))?;
        Ok(parsed.esearchresult.idlist)
    }

    /// Fetch structured details for a batch of identifiers.
    pub fn fetch_details(&self, ids: &[String]) -> Result<Vec<BibRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/efetch.fcgi", self.base_url);
        let joined = ids.join(",");
        let params = [
            ("db", "pubmed"),
            ("id", joined.as_str()),
            ("rettype", "xml"),
            ("email", self.email.as_str()),
            ("tool", self.tool.as_str()),
        ];

        let resp = self.http.get(&url).query(&params).send()?;
        if !resp.status().is_success() {
            return Err(Error::Network(format!(
                "detail fetch failed (HTTP {})",
                resp.status()
            )));
        }

        let xml = resp.text()?;
        let (records, dropped) = parse_article_set(&xml);
        if dropped > 0 {
            eprintln!(
                "Warning: dropped {} record(s) with unusable metadata",
                dropped
            );
        }
        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    #[serde(default)]
    esearchresult: EsearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Default)]
struct ArticleState {
    record: BibRecord,
    abstract_full: String,
    last_name: String,
    fore_name: String,
    in_author: bool,
    in_journal: bool,
    in_pub_date: bool,
    in_title: bool,
    in_abstract: bool,
    id_type: String,
}

/// Parse an efetch `PubmedArticleSet` document. Returns the parsed
/// records plus the count of articles dropped for missing id or title.
fn parse_article_set(xml: &str) -> (Vec<BibRecord>, usize) {
    use quick_xml::events::Event;

    let mut records = Vec::new();
    let mut dropped = 0usize;
    let mut article: Option<ArticleState> = None;
    let mut current: Vec<u8> = Vec::new();

    let mut reader = quick_xml::Reader::from_reader(xml.as_bytes());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                current = name.as_ref().to_vec();
                if name.as_ref() == b"PubmedArticle" {
                    article = Some(ArticleState::default());
                } else if let Some(state) = article.as_mut() {
                    match name.as_ref() {
                        b"Author" => {
                            state.in_author = true;
                            state.last_name.clear();
                            state.fore_name.clear();
                        }
                        b"Journal" => state.in_journal = true,
                        b"PubDate" => state.in_pub_date = true,
                        b"ArticleTitle" => state.in_title = true,
                        b"AbstractText" => state.in_abstract = true,
                        b"ArticleId" => {
                            state.id_type = e
                                .try_get_attribute("IdType")
                                .ok()
                                .flatten()
                                .and_then(|a| a.unescape_value().ok())
                                .map(|v| v.into_owned())
                                .unwrap_or_default();
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(te)) => {
                let Some(state) = article.as_mut() else {
                    buf.clear();
                    continue;
                };
                let text = te.unescape().unwrap_or_default();
                if state.in_title {
                    state.record.title.push_str(&text);
                } else if state.in_abstract {
                    state.abstract_full.push_str(&text);
                } else {
                    match current.as_slice() {
                        b"PMID" if state.record.id.is_empty() => {
                            state.record.id = text.trim().to_string();
                        }
                        b"LastName" if state.in_author => {
                            state.last_name = text.trim().to_string();
                        }
                        b"ForeName" if state.in_author => {
                            state.fore_name = text.trim().to_string();
                        }
                        b"Title" if state.in_journal => {
                            state.record.venue.push_str(&text);
                        }
                        b"Year" if state.in_pub_date && state.record.year.is_none() => {
                            state.record.year = Some(text.trim().to_string());
                        }
                        b"Month" if state.in_pub_date && state.record.month.is_none() => {
                            state.record.month = Some(text.trim().to_string());
                        }
                        b"ArticleId" if state.id_type == "doi" && state.record.doi.is_none() => {
                            state.record.doi = Some(text.trim().to_string());
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                current.clear();
                if name.as_ref() == b"PubmedArticle" {
                    if let Some(state) = article.take() {
                        match finish_article(state) {
                            Some(record) => records.push(record),
                            None => dropped += 1,
                        }
                    }
                } else if let Some(state) = article.as_mut() {
                    match name.as_ref() {
                        b"Author" => {
                            state.in_author = false;
                            if !state.last_name.is_empty() {
                                let author = match state.fore_name.chars().next() {
                                    Some(initial) => {
                                        format!("{} {}", state.last_name, initial)
                                    }
                                    None => state.last_name.clone(),
                                };
                                state.record.authors.push(author);
                            }
                        }
                        b"Journal" => state.in_journal = false,
                        b"PubDate" => state.in_pub_date = false,
                        b"ArticleTitle" => state.in_title = false,
                        b"AbstractText" => state.in_abstract = false,
                        b"ArticleId" => state.id_type.clear(),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                eprintln!("Warning: XML parse error in detail response: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    (records, dropped)
}

fn finish_article(state: ArticleState) -> Option<BibRecord> {
    let mut record = state.record;
    if record.id.is_empty() || record.title.trim().is_empty() {
        return None;
    }
    record.title = record.title.trim().to_string();
    record.abstract_excerpt = excerpt(state.abstract_full.trim(), ABSTRACT_EXCERPT_CHARS);
    Some(record)
}

fn excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
