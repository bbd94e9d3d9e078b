//! NAP comparator
//!
//! Scores each field of an input record against the looked-up place:
//! - Name: token-sort similarity (word order, case and punctuation ignored)
//! - Address: token-sort similarity, optionally raised by token coverage
//! - Phone: digits-only equality after trimming country/trunk prefixes
//!
//! Scores are in [0, 100]; a field matches when its score reaches the
//! configured threshold.

use nap_common::config::{MatchingConfig, NapField};

use crate::models::{FieldVerdict, FieldVerdicts, InputRecord, LookupResult};

/// Verdicts for one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    pub verdicts: FieldVerdicts,
    pub overall: bool,
}

/// Field-by-field comparator
#[derive(Debug, Clone)]
pub struct NapComparator {
    config: MatchingConfig,
}

impl NapComparator {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Compare an input record with its lookup result
    pub fn compare(&self, input: &InputRecord, lookup: &LookupResult) -> Comparison {
        if !lookup.found {
            return Comparison {
                verdicts: FieldVerdicts::default(),
                overall: false,
            };
        }

        let name = self.threshold_verdict(
            token_sort_similarity(&input.name, lookup.field(NapField::Name)),
            self.config.name_threshold,
        );

        let mut address_score =
            token_sort_similarity(&input.address, lookup.field(NapField::Address));
        if self.config.address_token_coverage {
            address_score =
                address_score.max(token_coverage(&input.address, lookup.field(NapField::Address)));
        }
        let address = self.threshold_verdict(address_score, self.config.address_threshold);

        let phone = self.phone_verdict(&input.phone, lookup.field(NapField::Phone));

        let verdicts = FieldVerdicts {
            name,
            address,
            phone,
        };
        let overall = self
            .config
            .required_fields
            .iter()
            .all(|field| verdicts.get(*field).matched);

        Comparison { verdicts, overall }
    }

    fn threshold_verdict(&self, score: f64, threshold: f64) -> FieldVerdict {
        FieldVerdict {
            score,
            matched: score >= threshold,
        }
    }

    fn phone_verdict(&self, input: &str, looked_up: &str) -> FieldVerdict {
        let digits = self.config.phone_significant_digits;
        let a = normalize_phone(input, digits);
        let b = normalize_phone(looked_up, digits);

        if !a.is_empty() && a == b {
            FieldVerdict {
                score: 100.0,
                matched: true,
            }
        } else {
            FieldVerdict::unmatched()
        }
    }
}

/// Lowercase, turn punctuation into spaces, collapse whitespace
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Digits only; when longer than `significant_digits` (non-zero) keep the
/// trailing digits, dropping country code and trunk prefixes
pub fn normalize_phone(phone: &str, significant_digits: usize) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if significant_digits > 0 && digits.len() > significant_digits {
        digits[digits.len() - significant_digits..].to_string()
    } else {
        digits
    }
}

/// Word-order-insensitive similarity in [0, 100], one decimal place
///
/// Tokens of both sides are sorted before comparing with normalized
/// Levenshtein similarity. Either side empty scores 0.
pub fn token_sort_similarity(a: &str, b: &str) -> f64 {
    let a = sorted_tokens(a);
    let b = sorted_tokens(b);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    round_score(strsim::normalized_levenshtein(&a, &b) * 100.0)
}

/// Share (0-100) of significant input tokens contained in some looked-up token
///
/// Significant tokens are numeric or longer than two characters; short words
/// like "st" or "nw" are ignored.
pub fn token_coverage(input: &str, looked_up: &str) -> f64 {
    let input = normalize_text(input);
    let looked_up = normalize_text(looked_up);
    let candidates: Vec<&str> = looked_up.split(' ').filter(|t| !t.is_empty()).collect();

    let significant: Vec<&str> = input
        .split(' ')
        .filter(|t| t.len() > 2 || (!t.is_empty() && t.chars().all(|c| c.is_ascii_digit())))
        .collect();

    if significant.is_empty() || candidates.is_empty() {
        return 0.0;
    }

    let covered = significant
        .iter()
        .filter(|token| candidates.iter().any(|c| c.contains(**token)))
        .count();

    round_score(covered as f64 / significant.len() as f64 * 100.0)
}

fn sorted_tokens(text: &str) -> String {
    let normalized = normalize_text(text);
    let mut tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

fn round_score(score: f64) -> f64 {
    ((score * 10.0).round() / 10.0).clamp(0.0, 100.0)
}
