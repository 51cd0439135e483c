//! Free-text address normalization.
//!
//! Property addresses arrive as a single display string
//! (`"123 Main St, Hartford CT 06103"`). [`normalize`] splits them into the
//! structured form the phone-lookup service expects. The heuristic is lossy:
//! it never fails, it only degrades to returning the input as the street.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static POSTAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("valid postal code regex"));

/// A structured postal address. Empty strings mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl NormalizedAddress {
    fn degraded(text: &str) -> Self {
        Self {
            street: text.trim().to_string(),
            ..Self::default()
        }
    }

    /// Whether parsing fell back to carrying the raw text as the street.
    pub fn is_degraded(&self) -> bool {
        self.city.is_empty() && self.state.is_empty() && self.postal_code.is_empty()
    }

    /// Fill in `state` when parsing did not find one.
    pub fn with_default_state(mut self, state: &str) -> Self {
        if self.state.is_empty() {
            self.state = state.to_string();
        }
        self
    }
}

/// Split a free-text address into street, city, state and postal code.
///
/// The first comma segment is the street. The rest is tokenized on whitespace:
/// the rightmost 5-digit (optionally `-NNNN`) token is the postal code, a
/// two-letter token just before it is the state, and whatever leads is the
/// city. An empty city falls back to `region_hint`.
pub fn normalize(text: &str, region_hint: &str) -> NormalizedAddress {
    let Some((street, rest)) = text.split_once(',') else {
        tracing::debug!(address = text, "address has no comma-separated segments");
        return NormalizedAddress::degraded(text);
    };
    let street = street.trim();
    if street.is_empty() {
        return NormalizedAddress::degraded(text);
    }
    let remainder: Vec<&str> = rest.split(',').flat_map(str::split_whitespace).collect();

    let mut leading: &[&str] = &remainder;
    let mut postal_code = String::new();
    if let Some(pos) = remainder.iter().rposition(|t| POSTAL_CODE.is_match(t)) {
        postal_code = remainder[pos].to_string();
        leading = &remainder[..pos];
    }

    let mut state = String::new();
    if let Some((last, rest)) = leading.split_last() {
        if is_state_code(last) {
            state = last.to_ascii_uppercase();
            leading = rest;
        }
    }

    let city = if leading.is_empty() {
        region_hint.trim().to_string()
    } else {
        leading.join(" ")
    };

    if city.is_empty() && state.is_empty() && postal_code.is_empty() {
        tracing::debug!(address = text, "address has no city/state/zip segment");
        return NormalizedAddress::degraded(street);
    }

    NormalizedAddress {
        street: street.to_string(),
        city,
        state,
        postal_code,
    }
}

fn is_state_code(token: &str) -> bool {
    token.len() == 2 && token.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_address() {
        let addr = normalize("123 Main St, Hartford CT 06103", "Middletown");
        assert_eq!(
            addr,
            NormalizedAddress {
                street: "123 Main St".into(),
                city: "Hartford".into(),
                state: "CT".into(),
                postal_code: "06103".into(),
            }
        );
        assert!(!addr.is_degraded());
    }

    #[test]
    fn placeholder_degrades() {
        let addr = normalize("See Clerk", "Middletown");
        assert_eq!(addr.street, "See Clerk");
        assert!(addr.city.is_empty());
        assert!(addr.state.is_empty());
        assert!(addr.postal_code.is_empty());
        assert!(addr.is_degraded());
    }

    #[test]
    fn multi_word_city_and_zip_plus_four() {
        let addr = normalize("9 Elm Rd, East Hampton, ct 06424-1234", "");
        assert_eq!(addr.street, "9 Elm Rd");
        assert_eq!(addr.city, "East Hampton");
        assert_eq!(addr.state, "CT");
        assert_eq!(addr.postal_code, "06424-1234");
    }

    #[test]
    fn city_falls_back_to_hint() {
        let addr = normalize("45 Oak Ave, CT 06457", "Middletown");
        assert_eq!(addr.city, "Middletown");
        assert_eq!(addr.state, "CT");
        assert_eq!(addr.postal_code, "06457");
    }

    #[test]
    fn no_postal_code_still_finds_state() {
        let addr = normalize("1 River Rd, Portland CT", "");
        assert_eq!(addr.city, "Portland");
        assert_eq!(addr.state, "CT");
        assert!(addr.postal_code.is_empty());
    }

    #[test]
    fn tokens_after_postal_code_are_ignored() {
        let addr = normalize("7 Pine St, Durham CT 06422 USA", "");
        assert_eq!(addr.city, "Durham");
        assert_eq!(addr.postal_code, "06422");
    }

    #[test]
    fn empty_street_degrades() {
        assert!(normalize(", Hartford CT 06103", "").is_degraded());
        assert_eq!(normalize("", "Hartford").street, "");
    }

    #[test]
    fn trailing_comma_uses_hint_for_city() {
        let addr = normalize("123 Main St,", "Hartford");
        assert_eq!(addr.street, "123 Main St");
        assert_eq!(addr.city, "Hartford");
        assert!(!addr.is_degraded());

        let addr = normalize("123 Main St,   ", "");
        assert_eq!(addr.street, "123 Main St");
        assert!(addr.is_degraded());
    }

    #[test]
    fn default_state_fills_only_when_missing() {
        let addr = normalize("45 Oak Ave, Middletown 06457", "").with_default_state("CT");
        assert_eq!(addr.state, "CT");
        let addr = normalize("45 Oak Ave, Albany NY 12207", "").with_default_state("CT");
        assert_eq!(addr.state, "NY");
    }
}
