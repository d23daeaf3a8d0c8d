//! Column sets for tabular output.
//!
//! This module provides:
//! - The export column list (header label + canonical property key), in header order
//! - Per-kind popup rows used by detail popups and the CLI listing

#![forbid(unsafe_code)]

use crate::{props, FeatureKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub label: &'static str,
    pub key: &'static str,
}

const fn col(label: &'static str, key: &'static str) -> ColumnSpec {
    ColumnSpec { label, key }
}

/// CSV export columns. The header line is these labels joined with `,`.
pub const EXPORT_COLUMNS: [ColumnSpec; 7] = [
    col("Name", props::NAME),
    col("Patta Number", props::PATTA_NUMBER),
    col("Area", props::AREA),
    col("Status", props::STATUS),
    col("Village", props::VILLAGE),
    col("District", props::DISTRICT),
    col("State", props::STATE),
];

pub fn export_header() -> String {
    EXPORT_COLUMNS.iter().map(|c| c.label).collect::<Vec<_>>().join(",")
}

/// Rows shown in a feature's detail popup. Empty means "every property".
pub fn popup_columns_for(kind: FeatureKind) -> Vec<ColumnSpec> {
    match kind {
        FeatureKind::Claims => vec![
            col("Claim Type", props::CLAIM_TYPE),
            col("Patta No", props::PATTA_NUMBER),
            col("Area (Ha)", props::AREA),
            col("Village", props::VILLAGE),
            col("District", props::DISTRICT),
            col("State", props::STATE),
            col("Status", props::STATUS),
        ],
        FeatureKind::Assets => vec![col("Type", props::ASSET_TYPE), col("Area (Ha)", props::AREA)],
        FeatureKind::Villages => vec![col("District", props::DISTRICT), col("Population", "population")],
        FeatureKind::AdminBoundaries => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_header_is_fixed() {
        assert_eq!(export_header(), "Name,Patta Number,Area,Status,Village,District,State");
    }

    #[test]
    fn admin_popups_show_everything() {
        assert!(popup_columns_for(FeatureKind::AdminBoundaries).is_empty());
        assert_eq!(popup_columns_for(FeatureKind::Claims)[0].label, "Claim Type");
    }
}
