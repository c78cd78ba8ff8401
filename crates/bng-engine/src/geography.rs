//! Spatial tier classification.
//!
//! Classifies a bank's relation to the target site into local / adjacent /
//! far from LPA and NCA membership alone. Neighbour lists are supplied by
//! the caller (the engine never calls a GIS service) and are normalised once
//! at context construction.
//!
//! Watercourse tiering properly follows catchment boundaries; catchment data
//! is an external concern, so watercourse demands are tiered by LPA/NCA like
//! everything else and the solve reports a diagnostic noting the
//! approximation.

use std::collections::BTreeSet;

use bng_core::normalize::normalize_geo_name;
use bng_core::types::{Bank, Tier};

/// Per-solve geography context with pre-normalised target and neighbour
/// names.
#[derive(Debug, Clone)]
pub struct GeographyContext {
    target_lpa: String,
    target_nca: String,
    lpa_neighbours: BTreeSet<String>,
    nca_neighbours: BTreeSet<String>,
}

impl GeographyContext {
    pub fn new(
        target_lpa: &str,
        target_nca: &str,
        lpa_neighbours: &[String],
        nca_neighbours: &[String],
    ) -> Self {
        let normalise_set = |names: &[String]| {
            names
                .iter()
                .map(|n| normalize_geo_name(n))
                .filter(|n| !n.is_empty())
                .collect()
        };
        Self {
            target_lpa: normalize_geo_name(target_lpa),
            target_nca: normalize_geo_name(target_nca),
            lpa_neighbours: normalise_set(lpa_neighbours),
            nca_neighbours: normalise_set(nca_neighbours),
        }
    }

    /// Classify a bank's spatial relation to the target site.
    ///
    /// Same LPA or same NCA wins `Local`; membership of either name in the
    /// corresponding neighbour list gives `Adjacent`; everything else is
    /// `Far`. Empty names never match.
    pub fn classify(&self, bank: &Bank) -> Tier {
        let bank_lpa = normalize_geo_name(&bank.lpa_name);
        let bank_nca = normalize_geo_name(&bank.nca_name);

        let lpa_matches = !bank_lpa.is_empty() && bank_lpa == self.target_lpa;
        let nca_matches = !bank_nca.is_empty() && bank_nca == self.target_nca;
        if lpa_matches || nca_matches {
            return Tier::Local;
        }

        let lpa_neighbour = !bank_lpa.is_empty() && self.lpa_neighbours.contains(&bank_lpa);
        let nca_neighbour = !bank_nca.is_empty() && self.nca_neighbours.contains(&bank_nca);
        if lpa_neighbour || nca_neighbour {
            return Tier::Adjacent;
        }

        Tier::Far
    }
}
