//! Entity resolution: map a reconciled set candidate onto an existing
//! canonical release, or create one.
//!
//! Matching is two-pass over names in their comparison form: substring
//! containment first (cheap, catches subtitle variants), then a best-match
//! normalized Levenshtein pass with a fixed acceptance threshold.

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::application::reconciler::MergedCandidate;
use crate::domain::entities::{NewRelease, Release};
use crate::domain::normalize::{normalize_for_match, strip_game_prefix};
use crate::infrastructure::release_repository::ReleaseRepository;

/// Minimum normalized Levenshtein similarity for a fuzzy release match.
const FUZZY_MATCH_THRESHOLD: f64 = 0.82;

pub struct EntityResolver {
    repository: ReleaseRepository,
}

/// Outcome of resolving one candidate.
pub struct ResolvedRelease {
    pub release: Release,
    pub created: bool,
}

fn comparison_form(name: &str) -> String {
    strip_game_prefix(&normalize_for_match(name))
}

fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Whether two comparison-form names refer to the same release. Containment
/// accepts subtitle variants ("ascended heroes" vs "ascended heroes mega
/// evolution"); the fuzzy pass absorbs typos and minor rewording.
fn names_match(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    contains_either(a, b) || normalized_levenshtein(a, b) >= FUZZY_MATCH_THRESHOLD
}

/// Two-pass match against the stored releases: the first containment hit
/// wins outright, then the best fuzzy score at or above the threshold.
fn find_match<'a>(candidate_key: &str, existing: &'a [Release]) -> Option<(&'a Release, f64)> {
    if candidate_key.is_empty() {
        return None;
    }
    for release in existing {
        if contains_either(candidate_key, &comparison_form(&release.name)) {
            return Some((release, 1.0));
        }
    }
    let mut best: Option<(&Release, f64)> = None;
    for release in existing {
        let release_key = comparison_form(&release.name);
        if !names_match(candidate_key, &release_key) {
            continue;
        }
        let similarity = normalized_levenshtein(candidate_key, &release_key);
        if best.map_or(true, |(_, s)| similarity > s) {
            best = Some((release, similarity));
        }
    }
    best
}

impl EntityResolver {
    pub fn new(repository: ReleaseRepository) -> Self {
        Self { repository }
    }

    /// Resolve a merged candidate to a release row, creating one when no
    /// existing release matches. Matched releases get their derived date
    /// fields refreshed from the candidate.
    pub async fn resolve(&self, candidate: &MergedCandidate) -> Result<ResolvedRelease> {
        let today = Utc::now().date_naive();
        let candidate_key = comparison_form(&candidate.set_name);
        let existing = self
            .repository
            .find_releases_by_category(candidate.category)
            .await?;

        let best = find_match(&candidate_key, &existing);

        let earliest_date = candidate.products.iter().filter_map(|p| p.release_date).min();

        if let Some((matched, similarity)) = best {
            debug!(
                "Matched '{}' to existing release '{}' (similarity {similarity:.2})",
                candidate.set_name, matched.name
            );
            let release_date = earliest_date.unwrap_or(matched.release_date);
            self.repository
                .refresh_release_derived(&matched.id, release_date, release_date <= today)
                .await?;
            let mut release = matched.clone();
            release.release_date = release_date;
            release.is_released = release_date <= today;
            return Ok(ResolvedRelease {
                release,
                created: false,
            });
        }

        let release = self
            .repository
            .create_release(&new_release_for(candidate, earliest_date, today))
            .await?;
        info!(
            "Created release '{}' ({}) from source {}",
            release.name, release.category, candidate.primary_source.id
        );
        Ok(ResolvedRelease {
            release,
            created: true,
        })
    }
}

fn new_release_for(
    candidate: &MergedCandidate,
    earliest_date: Option<NaiveDate>,
    today: NaiveDate,
) -> NewRelease {
    let release_date = earliest_date.unwrap_or(today);
    let msrp = candidate
        .products
        .iter()
        .filter_map(|p| p.msrp)
        .find(|m| *m > 0.0)
        .unwrap_or_else(|| candidate.category.default_msrp());
    NewRelease {
        name: candidate.set_name.clone(),
        category: candidate.category,
        release_date,
        manufacturer: candidate.category.manufacturer().to_string(),
        msrp,
        description: Some(format!(
            "Scraped release candidate for {}.",
            candidate.set_name
        )),
        is_released: release_date <= today,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 100-character base string built from a repeating alphabet, so edit
    // counts translate to exact similarity values.
    fn base_name() -> String {
        "abcdefghij".repeat(10)
    }

    fn with_edits(base: &str, edits: usize) -> String {
        let mut chars: Vec<char> = base.chars().collect();
        for slot in chars.iter_mut().take(edits) {
            *slot = 'z';
        }
        chars.into_iter().collect()
    }

    #[test]
    fn similarity_at_the_threshold_is_accepted() {
        let a = base_name();
        let b = with_edits(&a, 18);
        // 18 edits over 100 chars puts similarity at 0.82 exactly.
        assert!(names_match(&a, &b));
    }

    #[test]
    fn similarity_below_the_threshold_is_rejected() {
        let a = base_name();
        let b = with_edits(&a, 19);
        assert!(!names_match(&a, &b));
    }

    #[test]
    fn containment_matches_regardless_of_distance() {
        assert!(names_match(
            "ascended heroes",
            "ascended heroes mega evolution premium collection"
        ));
    }

    #[test]
    fn empty_names_never_match() {
        assert!(!names_match("", ""));
        assert!(!names_match("ascended heroes", ""));
    }

    #[test]
    fn unrelated_names_do_not_match() {
        assert!(!names_match("ascended heroes", "prismatic evolutions"));
    }

    fn stored_release(name: &str) -> Release {
        let now = chrono::Utc::now();
        Release {
            id: name.to_string(),
            name: name.to_string(),
            category: crate::domain::entities::Category::Pokemon,
            release_date: chrono::NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            manufacturer: "The Pokémon Company".to_string(),
            msrp: 4.99,
            estimated_resale: None,
            hype_score: None,
            image_url: None,
            top_chases: Vec::new(),
            print_run: None,
            description: None,
            is_released: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn containment_wins_before_any_fuzzy_comparison() {
        let existing = vec![
            stored_release("Ascended Heroez"),
            stored_release("Ascended Heroes Mega Evolution"),
        ];
        let (matched, similarity) =
            find_match("ascended heroes", &existing).expect("containment hit");
        assert_eq!(matched.name, "Ascended Heroes Mega Evolution");
        assert_eq!(similarity, 1.0);
    }

    #[test]
    fn fuzzy_pass_picks_the_closest_release() {
        let a = base_name();
        let close = with_edits(&a, 5);
        let far = with_edits(&a, 17);
        let existing = vec![stored_release(&far), stored_release(&close)];
        let (matched, _) = find_match(&a, &existing).expect("fuzzy hit");
        assert_eq!(matched.name, close);
    }

    #[test]
    fn no_match_below_the_threshold() {
        let existing = vec![stored_release("Prismatic Evolutions")];
        assert!(find_match("ascended heroes", &existing).is_none());
    }
}
