//! Canonical property keys and the source spellings folded into them on load.

use crate::{FeatureKind, Properties};

pub const NAME: &str = "name";
pub const PATTA_NUMBER: &str = "pattaNumber";
pub const AREA: &str = "area";
pub const STATUS: &str = "status";
pub const VILLAGE: &str = "village";
pub const DISTRICT: &str = "district";
pub const STATE: &str = "state";
pub const CLAIM_TYPE: &str = "claimType";
pub const ASSET_TYPE: &str = "type";
pub const ID: &str = "id";

/// Placeholder for a required text property that the source omitted.
pub const NOT_FOUND: &str = "Not Found";

// (canonical, aliases)
const ALIASES: &[(&str, &[&str])] = &[
    (NAME, &["Name", "NAME"]),
    (PATTA_NUMBER, &["patta_no", "patta_number", "pattaNo", "PATTA_NO"]),
    (AREA, &["area_ha", "total_area_ha", "Area"]),
    (STATUS, &["Status", "STATUS"]),
    (VILLAGE, &["Village", "VILLAGE"]),
    (DISTRICT, &["District", "DISTRICT", "DISTRICT_N"]),
    (STATE, &["State", "STATE", "STATE_N"]),
    (CLAIM_TYPE, &["claim_type", "ClaimType"]),
];

const VILLAGE_NAME: &str = "village_name";

/// Resolve a source key to its canonical spelling, if it has one. `village_name` is the
/// claim's village on claims and the polygon's own name everywhere else.
pub fn canonical(kind: FeatureKind, key: &str) -> Option<&'static str> {
    if key == VILLAGE_NAME {
        return Some(if kind == FeatureKind::Claims { VILLAGE } else { NAME });
    }
    ALIASES
        .iter()
        .find(|(canon, aliases)| *canon == key || aliases.contains(&key))
        .map(|(canon, _)| *canon)
}

/// Fold alias keys into canonical ones. An explicit canonical key wins over an alias.
pub fn canonicalize(kind: FeatureKind, props: Properties) -> Properties {
    let mut out = Properties::new();
    let mut aliased = Vec::new();
    for (k, v) in props {
        match canonical(kind, &k) {
            Some(canon) if canon == k => {
                out.insert(k, v);
            }
            Some(canon) => {
                // source spelling stays for popups
                aliased.push((canon, v.clone()));
                out.insert(k, v);
            }
            None => {
                out.insert(k, v);
            }
        }
    }
    for (canon, v) in aliased {
        out.entry(canon.to_string()).or_insert(v);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropValue;

    fn text(s: &str) -> PropValue {
        PropValue::Text(s.to_string())
    }

    #[test]
    fn aliases_fold_into_canonical_keys() {
        let mut p = Properties::new();
        p.insert("patta_no".into(), text("P-1"));
        p.insert("area_ha".into(), PropValue::Number(1.5));
        p.insert("DISTRICT_N".into(), text("Koraput"));
        p.insert("unrelated".into(), text("x"));
        let c = canonicalize(FeatureKind::Claims, p);
        assert_eq!(c.get(PATTA_NUMBER), Some(&text("P-1")));
        assert_eq!(c.get(AREA), Some(&PropValue::Number(1.5)));
        assert_eq!(c.get(DISTRICT), Some(&text("Koraput")));
        assert_eq!(c.get("unrelated"), Some(&text("x")));
        // source keys survive for popups
        assert!(c.contains_key("patta_no"));
    }

    #[test]
    fn explicit_canonical_key_wins() {
        let mut p = Properties::new();
        p.insert("district".into(), text("Rayagada"));
        p.insert("District".into(), text("Koraput"));
        let c = canonicalize(FeatureKind::Claims, p);
        assert_eq!(c.get(DISTRICT), Some(&text("Rayagada")));
    }

    #[test]
    fn village_name_depends_on_layer_kind() {
        let mut p = Properties::new();
        p.insert("village_name".into(), text("Dumuriguda"));
        let claim = canonicalize(FeatureKind::Claims, p.clone());
        assert_eq!(claim.get(VILLAGE), Some(&text("Dumuriguda")));
        assert!(claim.get(NAME).is_none());
        let boundary = canonicalize(FeatureKind::Villages, p);
        assert_eq!(boundary.get(NAME), Some(&text("Dumuriguda")));
        assert!(boundary.get(VILLAGE).is_none());
    }
}
