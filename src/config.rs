use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::editor;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub wiki: WikiConfig,
    #[serde(default)]
    pub backup: BackupConfig,
    #[serde(default)]
    pub pubmed: PubMedConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub table: TableConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WikiConfig {
    /// Base URL of the wiki instance, e.g. `https://wiki.example.org`.
    pub base_url: String,
    /// Identifier of the publications page.
    pub page_id: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackupConfig {
    #[serde(default = "default_backup_dir")]
    pub dir: PathBuf,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
        }
    }
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

#[derive(Debug, Deserialize, Clone)]
pub struct PubMedConfig {
    #[serde(default = "default_pubmed_base")]
    pub base_url: String,
    /// Contact address sent with every E-utilities call (NCBI policy).
    #[serde(default)]
    pub email: String,
    #[serde(default = "default_pubmed_tool")]
    pub tool: String,
    /// Minimum pause between successive search calls.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    /// Result cap per search query.
    #[serde(default = "default_max_per_query")]
    pub max_per_query: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PubMedConfig {
    fn default() -> Self {
        Self {
            base_url: default_pubmed_base(),
            email: String::new(),
            tool: default_pubmed_tool(),
            rate_limit_ms: default_rate_limit_ms(),
            max_per_query: default_max_per_query(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_pubmed_base() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}
fn default_pubmed_tool() -> String {
    "pubsync".to_string()
}
fn default_rate_limit_ms() -> u64 {
    1000
}
fn default_max_per_query() -> usize {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Keyword combination queries, executed first.
    #[serde(default = "default_keyword_queries")]
    pub keyword_queries: Vec<String>,
    /// Publication-date window queries.
    #[serde(default = "default_temporal_queries")]
    pub temporal_queries: Vec<String>,
    /// Affiliation queries for participating institutions.
    #[serde(default = "default_institution_queries")]
    pub institution_queries: Vec<String>,
    /// How many known authors get a dedicated query.
    #[serde(default = "default_author_query_limit")]
    pub author_query_limit: usize,
    /// Topic filter AND-ed onto each author query.
    #[serde(default = "default_author_filter")]
    pub author_filter: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            keyword_queries: default_keyword_queries(),
            temporal_queries: default_temporal_queries(),
            institution_queries: default_institution_queries(),
            author_query_limit: default_author_query_limit(),
            author_filter: default_author_filter(),
        }
    }
}

fn default_keyword_queries() -> Vec<String> {
    [
        "(COVID-19) AND (radiology) AND (chest CT)",
        "(SARS-CoV-2) AND (imaging) AND (lung)",
        "(coronavirus) AND (chest X-ray)",
        "(COVID-19) AND (pneumonia) AND (CT)",
        "RACOON study",
        "(COVID-19) AND (artificial intelligence) AND (radiology)",
    ]
    .map(String::from)
    .to_vec()
}

fn default_temporal_queries() -> Vec<String> {
    [
        "(COVID-19) AND (radiology) AND (\"2020\"[Date - Publication] : \"2025\"[Date - Publication])",
        "(chest CT) AND (COVID-19) AND (\"2020/03\"[Date - Publication] : \"2025/12\"[Date - Publication])",
    ]
    .map(String::from)
    .to_vec()
}

fn default_institution_queries() -> Vec<String> {
    [
        "(\"Otto-von-Guericke University\"[Affiliation]) AND (COVID-19)",
        "(\"University Hospital Magdeburg\"[Affiliation]) AND (radiology)",
        "(\"Friedrich Schiller University\"[Affiliation]) AND (imaging)",
    ]
    .map(String::from)
    .to_vec()
}

fn default_author_query_limit() -> usize {
    5
}
fn default_author_filter() -> String {
    "(COVID-19 OR radiology)".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    /// Core topic keywords matched against title/abstract.
    #[serde(default = "default_topic_keywords")]
    pub topic_keywords: Vec<String>,
    /// Imaging-domain keywords; density contributes up to a cap.
    #[serde(default = "default_imaging_keywords")]
    pub imaging_keywords: Vec<String>,
    /// Known contributors, `Lastname F` form.
    #[serde(default = "default_known_authors")]
    pub known_authors: Vec<String>,
    /// Venue keywords matched against the journal title.
    #[serde(default = "default_venue_keywords")]
    pub venue_keywords: Vec<String>,
    /// Years considered recent enough for the time bonus.
    #[serde(default = "default_recent_years")]
    pub recent_years: Vec<String>,
    /// Minimum relevance score for acceptance.
    #[serde(default = "default_min_score")]
    pub min_score: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            topic_keywords: default_topic_keywords(),
            imaging_keywords: default_imaging_keywords(),
            known_authors: default_known_authors(),
            venue_keywords: default_venue_keywords(),
            recent_years: default_recent_years(),
            min_score: default_min_score(),
        }
    }
}

fn default_topic_keywords() -> Vec<String> {
    ["covid-19", "sars-cov-2", "coronavirus", "covid"]
        .map(String::from)
        .to_vec()
}

fn default_imaging_keywords() -> Vec<String> {
    ["ct", "x-ray", "chest", "lung", "radiology", "imaging", "radiological"]
        .map(String::from)
        .to_vec()
}

fn default_known_authors() -> Vec<String> {
    [
        "Surov A",
        "Pech M",
        "Haag F",
        "Teichräber U",
        "Thormann M",
        "Kardas H",
        "Meyer HJ",
        "Güttler F",
        "Lassen-Schmidt B",
        "Krämer M",
        "Renz D",
    ]
    .map(String::from)
    .to_vec()
}

fn default_venue_keywords() -> Vec<String> {
    ["radiology", "european radiology", "radiological", "imaging"]
        .map(String::from)
        .to_vec()
}

fn default_recent_years() -> Vec<String> {
    ["2020", "2021", "2022", "2023", "2024", "2025"]
        .map(String::from)
        .to_vec()
}

fn default_min_score() -> u8 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct CleanupConfig {
    /// Exact row markup removed wherever it occurs.
    #[serde(default = "default_placeholder_rows")]
    pub placeholder_rows: Vec<String>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            placeholder_rows: default_placeholder_rows(),
        }
    }
}

fn default_placeholder_rows() -> Vec<String> {
    vec![editor::PLACEHOLDER_ROW.to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    /// Location cell value when none can be derived.
    #[serde(default = "default_location")]
    pub default_location: String,
    /// Auto funding codes are `base + sequence number`.
    #[serde(default = "default_funding_code_base")]
    pub funding_code_base: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
            funding_code_base: default_funding_code_base(),
        }
    }
}

fn default_location() -> String {
    "TBD".to_string()
}
fn default_funding_code_base() -> u32 {
    70_000
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.wiki.base_url.trim().is_empty() {
        anyhow::bail!("wiki.base_url must not be empty");
    }
    if config.wiki.page_id.trim().is_empty() {
        anyhow::bail!("wiki.page_id must not be empty");
    }
    if config.scoring.min_score > 100 {
        anyhow::bail!("scoring.min_score must be in [0, 100]");
    }
    if config.pubmed.max_per_query == 0 {
        anyhow::bail!("pubmed.max_per_query must be >= 1");
    }

    Ok(config)
}

impl Config {
    /// A minimal config for tests: defaults everywhere, placeholder wiki.
    pub fn minimal() -> Self {
        Self {
            wiki: WikiConfig {
                base_url: "https://wiki.example.org".to_string(),
                page_id: "1".to_string(),
                timeout_secs: default_timeout_secs(),
            },
            backup: BackupConfig::default(),
            pubmed: PubMedConfig::default(),
            discovery: DiscoveryConfig::default(),
            scoring: ScoringConfig::default(),
            cleanup: CleanupConfig::default(),
            table: TableConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::minimal();
        assert!(config.scoring.min_score <= 100);
        assert!(!config.discovery.keyword_queries.is_empty());
        assert!(!config.cleanup.placeholder_rows.is_empty());
        assert_eq!(config.table.funding_code_base, 70_000);
    }

    #[test]
    fn parse_overrides() {
        let toml_src = r#"
            [wiki]
            base_url = "https://wiki.example.org"
            page_id = "165485055"

            [scoring]
            min_score = 80

            [pubmed]
            rate_limit_ms = 250
        "#;
        let config: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(config.scoring.min_score, 80);
        assert_eq!(config.pubmed.rate_limit_ms, 250);
        // untouched sections keep their defaults
        assert_eq!(config.pubmed.max_per_query, 5);
        assert_eq!(config.table.default_location, "TBD");
    }
}
