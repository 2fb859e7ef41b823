//! Publication discovery: query plan, relevance scoring, dedup.
//!
//! One pipeline run walks the prioritized query plan, collects record
//! identifiers, drops duplicates seen earlier in the same run, fetches
//! details, and scores every record against the static rubric. A failing
//! query is reported and skipped; the plan continues. Scoring is a pure
//! function of the record and the rubric tables — no randomness, no I/O.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use crate::config::{DiscoveryConfig, ScoringConfig};
use crate::models::{BibRecord, QueryCategory, QueryPriority, SearchQuery};
use crate::pubmed::PubMedClient;

const TOPIC_POINTS: u32 = 30;
const IMAGING_POINTS_EACH: u32 = 8;
const IMAGING_CAP: u32 = 25;
const AUTHOR_POINTS_EACH: u32 = 15;
const AUTHOR_CAP: u32 = 25;
const VENUE_BONUS: u32 = 10;
const RECENT_YEAR_BONUS: u32 = 10;

/// Static scoring rubric, lowercased once at construction.
pub struct Rubric {
    topic_keywords: Vec<String>,
    imaging_keywords: Vec<String>,
    author_surnames: Vec<String>,
    venue_keywords: Vec<String>,
    recent_years: Vec<String>,
}

impl Rubric {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            topic_keywords: lowercased(&config.topic_keywords),
            imaging_keywords: lowercased(&config.imaging_keywords),
            // known contributors are listed as `Lastname F`; match on surname
            author_surnames: config
                .known_authors
                .iter()
                .filter_map(|a| a.split_whitespace().next())
                .map(|s| s.to_lowercase())
                .collect(),
            venue_keywords: lowercased(&config.venue_keywords),
            recent_years: config.recent_years.clone(),
        }
    }

    /// Additive relevance score, clamped to [0, 100].
    pub fn score(&self, record: &BibRecord) -> u8 {
        let title = record.title.to_lowercase();
        let abstract_text = record.abstract_excerpt.to_lowercase();
        let authors: Vec<String> = record.authors.iter().map(|a| a.to_lowercase()).collect();
        let venue = record.venue.to_lowercase();

        let mut score = 0u32;

        if self
            .topic_keywords
            .iter()
            .any(|k| title.contains(k.as_str()) || abstract_text.contains(k.as_str()))
        {
            score += TOPIC_POINTS;
        }

        let imaging_hits = self
            .imaging_keywords
            .iter()
            .filter(|k| title.contains(k.as_str()) || abstract_text.contains(k.as_str()))
            .count() as u32;
        score += (imaging_hits * IMAGING_POINTS_EACH).min(IMAGING_CAP);

        let author_hits = self
            .author_surnames
            .iter()
            .filter(|surname| authors.iter().any(|a| a.contains(surname.as_str())))
            .count() as u32;
        score += (author_hits * AUTHOR_POINTS_EACH).min(AUTHOR_CAP);

        if self.venue_keywords.iter().any(|k| venue.contains(k.as_str())) {
            score += VENUE_BONUS;
        }

        if let Some(year) = &record.year {
            if self.recent_years.iter().any(|y| y == year) {
                score += RECENT_YEAR_BONUS;
            }
        }

        score.min(100) as u8
    }
}

fn lowercased(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

/// Build the fixed prioritized query plan: keyword and time-window queries
/// first (high), then author and institution queries (medium). Order
/// expresses execution priority; all entries run unless the caller caps
/// the plan.
pub fn build_query_plan(discovery: &DiscoveryConfig, scoring: &ScoringConfig) -> Vec<SearchQuery> {
    let mut plan = Vec::new();

    for query in &discovery.keyword_queries {
        plan.push(SearchQuery {
            query: query.clone(),
            category: QueryCategory::Keyword,
            priority: QueryPriority::High,
        });
    }

    for query in &discovery.temporal_queries {
        plan.push(SearchQuery {
            query: query.clone(),
            category: QueryCategory::Temporal,
            priority: QueryPriority::High,
        });
    }

    for author in scoring
        .known_authors
        .iter()
        .take(discovery.author_query_limit)
    {
        plan.push(SearchQuery {
            query: format!("(\"{}\"[Author]) AND {}", author, discovery.author_filter),
            category: QueryCategory::Author,
            priority: QueryPriority::Medium,
        });
    }

    for query in &discovery.institution_queries {
        plan.push(SearchQuery {
            query: query.clone(),
            category: QueryCategory::Institution,
            priority: QueryPriority::Medium,
        });
    }

    plan
}

/// Outcome of one discovery run.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Deduplicated, scored records in discovery order.
    pub records: Vec<BibRecord>,
    pub queries_run: usize,
    pub query_failures: usize,
    /// Identifiers seen more than once across queries.
    pub duplicates: usize,
}

/// Executes the query plan against the bibliographic API.
pub struct DiscoveryPipeline<'a> {
    client: &'a PubMedClient,
    rubric: Rubric,
    rate_limit: Duration,
}

impl<'a> DiscoveryPipeline<'a> {
    pub fn new(client: &'a PubMedClient, rubric: Rubric, rate_limit: Duration) -> Self {
        Self {
            client,
            rubric,
            rate_limit,
        }
    }

    /// Run every query in the plan, at most `max_per_query` hits each.
    ///
    /// The rate-limit pause between search calls is a blocking sleep on
    /// the single execution thread (upstream usage policy).
    pub fn run(&self, plan: &[SearchQuery], max_per_query: usize) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        let mut seen: HashSet<String> = HashSet::new();

        for (i, entry) in plan.iter().enumerate() {
            if i > 0 {
                thread::sleep(self.rate_limit);
            }
            report.queries_run += 1;

            let ids = match self.client.search(&entry.query, max_per_query) {
                Ok(ids) => ids,
                Err(e) => {
                    eprintln!("Warning: search failed for '{}': {}", entry.query, e);
                    report.query_failures += 1;
                    continue;
                }
            };
            if ids.is_empty() {
                continue;
            }

            let total = ids.len();
            let fresh = retain_unseen(ids, &mut seen);
            report.duplicates += total - fresh.len();
            if fresh.is_empty() {
                continue;
            }

            let details = match self.client.fetch_details(&fresh) {
                Ok(details) => details,
                Err(e) => {
                    eprintln!("Warning: detail fetch failed for '{}': {}", entry.query, e);
                    report.query_failures += 1;
                    continue;
                }
            };

            for mut record in details {
                record.score = self.rubric.score(&record);
                report.records.push(record);
            }
        }

        report
    }
}

/// Keep only identifiers not seen earlier in the run.
fn retain_unseen(ids: Vec<String>, seen: &mut HashSet<String>) -> Vec<String> {
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

/// Drop records below `min_score` and sort the rest descending by score
/// (ties broken by identifier for determinism).
pub fn filter_by_score(mut records: Vec<BibRecord>, min_score: u8) -> Vec<BibRecord> {
    records.retain(|r| r.score >= min_score);
    records.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DiscoveryConfig, ScoringConfig};

    fn rubric() -> Rubric {
        Rubric::from_config(&ScoringConfig::default())
    }

    fn record(title: &str, abstract_excerpt: &str) -> BibRecord {
        BibRecord {
            id: "1".to_string(),
            title: title.to_string(),
            abstract_excerpt: abstract_excerpt.to_string(),
            ..BibRecord::default()
        }
    }

    #[test]
    fn score_is_zero_for_unrelated_record() {
        let r = record("Gut microbiome dynamics", "A study of intestinal flora.");
        assert_eq!(rubric().score(&r), 0);
    }

    #[test]
    fn score_stacks_and_clamps_to_100() {
        let r = BibRecord {
            id: "1".to_string(),
            title: "COVID-19 chest CT and X-ray lung imaging in radiology".to_string(),
            abstract_excerpt: "Radiological imaging of coronavirus pneumonia.".to_string(),
            authors: vec!["Surov A".to_string(), "Pech M".to_string()],
            venue: "European Radiology".to_string(),
            year: Some("2022".to_string()),
            ..BibRecord::default()
        };
        // topic 30 + imaging cap 25 + author cap (2 hits, capped) 25
        // + venue 10 + recent year 10 = 100
        assert_eq!(rubric().score(&r), 100);
    }

    #[test]
    fn score_always_in_bounds() {
        let samples = [
            record("", ""),
            record("CT", "ct ct ct ct ct"),
            record("COVID-19 imaging chest lung x-ray radiology CT", ""),
        ];
        for r in &samples {
            assert!(rubric().score(r) <= 100);
        }
    }

    #[test]
    fn imaging_density_saturates() {
        let dense = record(
            "CT x-ray chest lung radiology imaging radiological",
            "",
        );
        let sparse = record("chest CT", "");
        let rubric = rubric();
        // 7 hits × 8 saturates at the cap; 2 hits stay below it
        assert_eq!(rubric.score(&dense), IMAGING_CAP as u8);
        assert_eq!(rubric.score(&sparse), (2 * IMAGING_POINTS_EACH) as u8);
    }

    #[test]
    fn dedup_keeps_first_occurrence_only() {
        let mut seen = HashSet::new();
        let first = retain_unseen(
            vec!["10".to_string(), "11".to_string()],
            &mut seen,
        );
        assert_eq!(first, vec!["10", "11"]);

        // the second query returns an overlapping identifier
        let second = retain_unseen(
            vec!["11".to_string(), "12".to_string()],
            &mut seen,
        );
        assert_eq!(second, vec!["12"]);
    }

    #[test]
    fn filter_sorts_descending_and_cuts_threshold() {
        let mut low = record("chest CT", "");
        low.id = "2".to_string();
        low.score = 16;
        let mut high = record("COVID-19 chest CT radiology", "");
        high.id = "1".to_string();
        high.score = 71;
        let mut mid = record("COVID-19", "");
        mid.id = "3".to_string();
        mid.score = 40;

        let kept = filter_by_score(vec![low, high, mid], 40);
        let scores: Vec<u8> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![71, 40]);
    }

    #[test]
    fn plan_orders_high_priority_first() {
        let plan = build_query_plan(&DiscoveryConfig::default(), &ScoringConfig::default());
        assert!(!plan.is_empty());

        let first_medium = plan
            .iter()
            .position(|q| q.priority == QueryPriority::Medium)
            .unwrap();
        assert!(plan[..first_medium]
            .iter()
            .all(|q| q.priority == QueryPriority::High));
        // keyword queries open the plan, author queries follow the high block
        assert_eq!(plan[0].category, QueryCategory::Keyword);
        assert_eq!(plan[first_medium].category, QueryCategory::Author);
    }

    #[test]
    fn author_queries_quote_the_contributor() {
        let plan = build_query_plan(&DiscoveryConfig::default(), &ScoringConfig::default());
        let author_query = plan
            .iter()
            .find(|q| q.category == QueryCategory::Author)
            .unwrap();
        assert!(author_query.query.contains("[Author]"));
        assert!(author_query.query.contains("Surov A"));
    }
}
