//! Fuzzy Matcher
//!
//! Scores a spreadsheet name against existing database records.
//!
//! **Rules, highest score first:**
//! 1. Exact (trimmed, case-insensitive) → 1.0, returned immediately
//! 2. Person-name tokens (advisors only): every candidate token is contained
//!    in, or contains, some token of the existing name → 0.95
//! 3. Substring containment in either direction → 0.9
//! 4. Normalized edit-distance similarity, accepted at `>= threshold`
//!
//! The scan keeps the best strictly-greater score, so a later exact match
//! still wins over an earlier substring hit.

use spm_common::db::{AdvisorUser, Market, Store};

pub const EXACT_SCORE: f64 = 1.0;
pub const TOKEN_SUBSET_SCORE: f64 = 0.95;
pub const SUBSTRING_SCORE: f64 = 0.9;
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Which entity family is being matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Market,
    Store,
    Advisor,
}

/// Existing record that can be matched by name
pub trait Matchable {
    fn id(&self) -> i64;
    fn match_name(&self) -> &str;
}

impl Matchable for Market {
    fn id(&self) -> i64 {
        self.id
    }

    fn match_name(&self) -> &str {
        &self.name
    }
}

impl Matchable for Store {
    fn id(&self) -> i64 {
        self.id
    }

    fn match_name(&self) -> &str {
        &self.name
    }
}

impl Matchable for AdvisorUser {
    fn id(&self) -> i64 {
        self.id
    }

    fn match_name(&self) -> &str {
        &self.full_name
    }
}

/// Best match found for a candidate
#[derive(Debug, PartialEq)]
pub struct MatchResult<'a, T> {
    pub entity: &'a T,
    pub score: f64,
}

// Holds only a reference, so copyable whatever `T` is
impl<T> Clone for MatchResult<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MatchResult<'_, T> {}

/// Classic edit distance (insert/delete/substitute cost 1)
pub fn levenshtein(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `(maxLen - distance) / maxLen`, with two empty strings scoring 1.0
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Every candidate token overlaps some token of the existing full name
fn tokens_overlap(candidate: &str, existing: &str) -> bool {
    let existing_tokens: Vec<&str> = existing.split_whitespace().collect();
    let mut candidate_tokens = candidate.split_whitespace().peekable();

    if candidate_tokens.peek().is_none() {
        return false;
    }

    candidate_tokens.all(|c| {
        existing_tokens
            .iter()
            .any(|e| e.contains(c) || c.contains(e))
    })
}

/// Name matcher with a configurable similarity threshold
#[derive(Debug, Clone, Copy)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Score one pair; `None` when no rule accepts it
    pub fn score(&self, candidate: &str, existing: &str, kind: EntityKind) -> Option<f64> {
        let a = normalize(candidate);
        let b = normalize(existing);

        if a == b {
            return Some(EXACT_SCORE);
        }
        if kind == EntityKind::Advisor && tokens_overlap(&a, &b) {
            return Some(TOKEN_SUBSET_SCORE);
        }
        if !a.is_empty() && !b.is_empty() && (a.contains(&b) || b.contains(&a)) {
            return Some(SUBSTRING_SCORE);
        }

        let sim = similarity(&a, &b);
        (sim >= self.threshold).then_some(sim)
    }

    /// Best-scoring existing record for `candidate`, if any passes
    pub fn find_best<'a, T: Matchable>(
        &self,
        candidate: &str,
        existing: &'a [T],
        kind: EntityKind,
    ) -> Option<MatchResult<'a, T>> {
        let mut best: Option<MatchResult<'a, T>> = None;

        for entity in existing {
            let Some(score) = self.score(candidate, entity.match_name(), kind) else {
                continue;
            };

            if score >= EXACT_SCORE {
                return Some(MatchResult { entity, score });
            }

            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(MatchResult { entity, score });
            }
        }

        best
    }
}
