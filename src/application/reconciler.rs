//! Cross-source reconciliation: bucket per-source candidates into logical
//! sets, rank them by trust, merge product fields and score confidence.
//!
//! Buckets keep first-seen order so pipeline output is deterministic for a
//! given registry order; within a bucket a stable sort by trust score decides
//! which source wins contested fields.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::entities::{Category, Confidence, ProductType, SourceTier, SourceType};
use crate::domain::extraction::{ExtractedProduct, ExtractedSetCandidate};
use crate::domain::normalize::{normalize_for_match, strip_game_prefix};
use crate::domain::sources::ReleaseIntelSource;

static PARENTHESIZED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+?)\s*\((.+?)\)\s*$").expect("valid regex"));

/// Merge key under the set-default bucket: all set-level fallback products
/// from different sources collapse into one row.
const SET_DEFAULT_KEY: &str = "__set_default__";

/// One logical set after reconciliation, ready for entity resolution and
/// upsert.
#[derive(Debug, Clone)]
pub struct MergedCandidate {
    pub set_name: String,
    pub category: Category,
    pub products: Vec<ExtractedProduct>,
    pub confidence_score: i64,
    pub confidence: Confidence,
    pub primary_source: ReleaseIntelSource,
    /// Source names in trust order, primary first.
    pub supporting_sources: Vec<String>,
}

/// Canonical dedup key for a set name. "Ascended Heroes (Mega Evolution)"
/// and "Mega Evolution—Ascended Heroes" are the same set written two ways,
/// so two-component names are split, normalized and sorted before joining.
pub fn canonical_set_key(name: &str) -> String {
    let trimmed = name.trim();

    let components: Option<(String, String)> =
        if let Some(caps) = PARENTHESIZED_RE.captures(trimmed) {
            Some((caps[1].to_string(), caps[2].to_string()))
        } else {
            let parts: Vec<&str> = trimmed.splitn(2, ['—', '–']).collect();
            match parts.as_slice() {
                [a, b] => Some((a.to_string(), b.to_string())),
                _ => None,
            }
        };

    match components {
        Some((a, b)) => {
            let mut parts: Vec<String> = [a, b]
                .iter()
                .map(|c| strip_game_prefix(&normalize_for_match(c)))
                .filter(|c| !c.is_empty())
                .collect();
            if parts.len() < 2 {
                return parts.pop().unwrap_or_default();
            }
            parts.sort();
            parts.join(" ")
        }
        None => strip_game_prefix(&normalize_for_match(trimmed)),
    }
}

/// Merge key for one product within a set bucket.
fn product_merge_key(product: &ExtractedProduct) -> String {
    if product.product_type == ProductType::SetDefault {
        SET_DEFAULT_KEY.to_string()
    } else {
        normalize_for_match(&product.name)
    }
}

/// Confidence score for a reconciled candidate. Corroboration by further
/// sources adds up to 20 points; `age_days` counts days since the candidate
/// was last observed and bleeds up to 15. Candidates reconciled in the run
/// that observed them pass zero.
pub fn compute_confidence_score(
    tier: SourceTier,
    source_type: SourceType,
    supporting_count: usize,
    age_days: i64,
) -> i64 {
    let corroboration = ((supporting_count as i64 - 1).max(0) * 8).min(20);
    let age_penalty = age_days.clamp(0, 15);
    let score = tier.confidence_base() + source_type.weight() + corroboration - age_penalty;
    score.clamp(5, 99)
}

/// Reconcile all per-source candidates of one run into merged candidates.
pub fn reconcile(candidates: Vec<ExtractedSetCandidate>) -> Vec<MergedCandidate> {
    let mut bucket_index: HashMap<(Category, String), usize> = HashMap::new();
    let mut buckets: Vec<Vec<ExtractedSetCandidate>> = Vec::new();

    for candidate in candidates {
        let key = (candidate.category, canonical_set_key(&candidate.set_name));
        match bucket_index.get(&key) {
            Some(&i) => buckets[i].push(candidate),
            None => {
                bucket_index.insert(key, buckets.len());
                buckets.push(vec![candidate]);
            }
        }
    }

    buckets.into_iter().map(merge_bucket).collect()
}

fn merge_bucket(mut bucket: Vec<ExtractedSetCandidate>) -> MergedCandidate {
    // Stable: registry order breaks trust-score ties.
    bucket.sort_by_key(|c| std::cmp::Reverse(c.source.trust_score()));

    let primary = bucket[0].source.clone();
    let set_name = bucket[0].set_name.clone();
    let category = bucket[0].category;

    let mut supporting_sources: Vec<String> = Vec::new();
    for candidate in &bucket {
        if !supporting_sources.contains(&candidate.source.name) {
            supporting_sources.push(candidate.source.name.clone());
        }
    }

    let mut product_index: HashMap<String, usize> = HashMap::new();
    let mut products: Vec<ExtractedProduct> = Vec::new();
    for candidate in &bucket {
        for product in &candidate.products {
            let key = product_merge_key(product);
            match product_index.get(&key) {
                Some(&i) => backfill_product(&mut products[i], product),
                None => {
                    product_index.insert(key, products.len());
                    products.push(product.clone());
                }
            }
        }
    }

    // Everything in this bucket was observed by the current run, so the
    // staleness penalty does not apply.
    let confidence_score = compute_confidence_score(
        primary.tier,
        primary.source_type,
        supporting_sources.len(),
        0,
    );

    MergedCandidate {
        set_name,
        category,
        products,
        confidence_score,
        confidence: Confidence::from_score(confidence_score),
        primary_source: primary,
        supporting_sources,
    }
}

/// Fill fields the higher-trust source left empty; never overwrite.
fn backfill_product(target: &mut ExtractedProduct, other: &ExtractedProduct) {
    if target.msrp.is_none() {
        target.msrp = other.msrp;
    }
    if target.estimated_resale.is_none() {
        target.estimated_resale = other.estimated_resale;
    }
    if target.release_date.is_none() {
        target.release_date = other.release_date;
    }
    if target.preorder_date.is_none() {
        target.preorder_date = other.preorder_date;
    }
    if target.image_url.is_none() {
        target.image_url = other.image_url.clone();
    }
    if target.buy_url.is_none() {
        target.buy_url = other.buy_url.clone();
    }
    if target.contents_summary.is_none() {
        target.contents_summary = other.contents_summary.clone();
    }
    if target.top_chases.is_empty() {
        target.top_chases = other.top_chases.clone();
    }
}
