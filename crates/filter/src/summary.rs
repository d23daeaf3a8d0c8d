use atlas_core::{props, ClaimStatus, Feature};
use serde::{Deserialize, Serialize};

/// Headline counts for a set of claims (dashboard tiles, CLI `summary`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimSummary {
    pub total: usize,
    pub pending: usize,
    pub granted: usize,
    pub rejected: usize,
    /// Sum of `area` over claims that carry one, in hectares.
    pub total_area_ha: f64,
}

impl ClaimSummary {
    pub fn of<'a>(claims: impl IntoIterator<Item = &'a Feature>) -> Self {
        let mut s = ClaimSummary::default();
        for f in claims {
            s.total += 1;
            match f.status() {
                Some(ClaimStatus::Pending) => s.pending += 1,
                Some(ClaimStatus::Granted) => s.granted += 1,
                Some(ClaimStatus::Rejected) => s.rejected += 1,
                None => {}
            }
            s.total_area_ha += f.number(props::AREA).unwrap_or(0.0);
        }
        s
    }
}
