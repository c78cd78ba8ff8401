//! Name normalisation for geography and habitat matching.
//!
//! Two independent canonical forms:
//!
//! - **Geography names** (LPA/NCA): administrative decorations are stripped
//!   so "City of York Council" matches "York".
//! - **Habitat names**: case and whitespace are folded and a fixed alias
//!   table collapses known variant spellings, so "Other rivers and streams"
//!   matches "Rivers and streams".
//!
//! Both functions are pure; callers that need repeated lookups normalise once
//! into a per-solve index rather than re-normalising at point of use.

use once_cell::sync::Lazy;

/// Administrative words stripped from LPA/NCA names before comparison.
/// Multi-word phrases first so "city of" wins over a bare "city".
const GEO_STOP_PHRASES: [&str; 7] = [
    "city of",
    "royal borough of",
    "council",
    "borough",
    "district",
    "county",
    "unitary",
];

/// Normalise an LPA or NCA name for equality/membership tests.
///
/// Lowercases, strips administrative phrases, then collapses to
/// alphanumerics. Returns an empty string for names with no substance; empty
/// strings must never be treated as matching by callers.
pub fn normalize_geo_name(name: &str) -> String {
    let mut folded = name.to_ascii_lowercase();
    for phrase in GEO_STOP_PHRASES {
        folded = folded.replace(phrase, " ");
    }
    folded.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Variant spellings collapsed to one canonical habitat name. Applied after
/// case/whitespace folding, so entries are written pre-folded.
static HABITAT_ALIASES: Lazy<Vec<(&'static str, &'static str)>> = Lazy::new(|| {
    vec![
        ("other rivers and streams", "rivers and streams"),
        ("other watercourse", "watercourse"),
        ("native species-rich hedgerow", "species-rich native hedgerow"),
        ("traditional orchards", "traditional orchard"),
        ("mixed scrub - bramble", "mixed scrub"),
    ]
});

/// Canonical form of a habitat name: lowercased, whitespace collapsed to
/// single spaces, and known variant spellings folded via the alias table.
pub fn canonical_habitat(name: &str) -> String {
    let folded = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_lowercase();
    for (variant, canonical) in HABITAT_ALIASES.iter() {
        if folded == *variant {
            return (*canonical).to_string();
        }
    }
    folded
}

/// True when two habitat names share a canonical form.
pub fn same_habitat(a: &str, b: &str) -> bool {
    canonical_habitat(a) == canonical_habitat(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_names_strip_administrative_decorations() {
        assert_eq!(normalize_geo_name("City of York Council"), normalize_geo_name("York"));
        assert_eq!(
            normalize_geo_name("Royal Borough of Kingston"),
            normalize_geo_name("Kingston")
        );
        assert_eq!(normalize_geo_name("Somerset County"), normalize_geo_name("somerset"));
        assert_eq!(normalize_geo_name("South Downs District"), "southdowns");
    }

    #[test]
    fn geo_names_never_match_when_empty() {
        assert_eq!(normalize_geo_name(""), "");
        assert_eq!(normalize_geo_name("  Council  "), "");
    }

    #[test]
    fn habitat_aliases_collapse() {
        assert!(same_habitat("Other rivers and streams", "Rivers and streams"));
        assert!(same_habitat("Lowland   meadows", "lowland meadows"));
        assert!(!same_habitat("Lowland meadows", "Upland meadows"));
    }

    #[test]
    fn canonical_form_is_idempotent() {
        let once = canonical_habitat("Other Rivers and Streams");
        assert_eq!(canonical_habitat(&once), once);
    }
}
