//! Atlas core types: features, geometry, bounds and property keys.

#![forbid(unsafe_code)]

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

pub mod columns;
pub mod props;

/// The four independently sourced layers. Each layer holds features of exactly one kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Claims,
    #[serde(rename = "admin")]
    AdminBoundaries,
    Villages,
    Assets,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 4] = [
        FeatureKind::Claims,
        FeatureKind::AdminBoundaries,
        FeatureKind::Villages,
        FeatureKind::Assets,
    ];

    /// Stable slot used by per-layer arrays.
    pub fn index(self) -> usize {
        match self {
            FeatureKind::Claims => 0,
            FeatureKind::AdminBoundaries => 1,
            FeatureKind::Villages => 2,
            FeatureKind::Assets => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKind::Claims => "claims",
            FeatureKind::AdminBoundaries => "admin",
            FeatureKind::Villages => "villages",
            FeatureKind::Assets => "assets",
        }
    }

    /// Human label for popups and layer lists.
    pub fn label(self) -> &'static str {
        match self {
            FeatureKind::Claims => "Claim",
            FeatureKind::AdminBoundaries => "Boundary",
            FeatureKind::Villages => "Village",
            FeatureKind::Assets => "Asset",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown layer kind: {0} (expected claims, admin, villages or assets)")]
pub struct UnknownKind(pub String);

impl FromStr for FeatureKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claims" | "claim" => Ok(FeatureKind::Claims),
            "admin" | "boundaries" | "admin-boundaries" => Ok(FeatureKind::AdminBoundaries),
            "villages" | "village" => Ok(FeatureKind::Villages),
            "assets" | "asset" => Ok(FeatureKind::Assets),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Stable identifier, unique within its kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureId(pub String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of a feature across layers: ids are only unique within a kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct FeatureKey {
    pub kind: FeatureKind,
    pub id: FeatureId,
}

impl FeatureKey {
    pub fn new(kind: FeatureKind, id: impl Into<String>) -> Self {
        Self { kind, id: FeatureId(id.into()) }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from a GeoJSON position (`[lng, lat, ..]`).
    pub fn from_position(pos: &[f64]) -> Option<Self> {
        match pos {
            [lng, lat, ..] => Some(Self { lat: *lat, lng: *lng }),
            _ => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Ordered ring of positions; the first ring of a polygon is its outer boundary.
pub type Ring = Vec<LatLng>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Geometry {
    Point(LatLng),
    Polygon(SmallVec<[Ring; 1]>),
}

impl Geometry {
    pub fn as_point(&self) -> Option<LatLng> {
        match self {
            Geometry::Point(p) => Some(*p),
            Geometry::Polygon(_) => None,
        }
    }

    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::of(self)
    }
}

/// Axis-aligned lat/lng bounding region.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_point(p: LatLng) -> Self {
        Self { south: p.lat, west: p.lng, north: p.lat, east: p.lng }
    }

    pub fn extend(&mut self, p: LatLng) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
    }

    pub fn union(mut self, other: Bounds) -> Self {
        self.south = self.south.min(other.south);
        self.north = self.north.max(other.north);
        self.west = self.west.min(other.west);
        self.east = self.east.max(other.east);
        self
    }

    pub fn center(&self) -> LatLng {
        LatLng { lat: (self.south + self.north) / 2.0, lng: (self.west + self.east) / 2.0 }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    /// Bounds of every position in a geometry; `None` for an empty polygon.
    pub fn of(geometry: &Geometry) -> Option<Self> {
        match geometry {
            Geometry::Point(p) => Some(Self::from_point(*p)),
            Geometry::Polygon(rings) => {
                let mut it = rings.iter().flat_map(|r| r.iter());
                let first = it.next()?;
                let mut b = Self::from_point(*first);
                for p in it {
                    b.extend(*p);
                }
                Some(b)
            }
        }
    }
}

/// Scalar property value. Nested or null values never reach the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PropValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

impl PropValue {
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::String(s) => Some(PropValue::Text(s.clone())),
            serde_json::Value::Number(n) => n.as_f64().map(PropValue::Number),
            serde_json::Value::Bool(b) => Some(PropValue::Bool(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(n) => Some(*n),
            PropValue::Text(s) => s.trim().parse().ok(),
            PropValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Text(s) => f.write_str(s),
            PropValue::Number(n) => write!(f, "{}", n),
            PropValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

pub type Properties = BTreeMap<String, PropValue>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ClaimStatus {
    Pending,
    Granted,
    Rejected,
}

impl ClaimStatus {
    pub const ALL: [ClaimStatus; 3] = [ClaimStatus::Pending, ClaimStatus::Granted, ClaimStatus::Rejected];

    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Pending => "Pending",
            ClaimStatus::Granted => "Granted",
            ClaimStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown claim status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ClaimStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(ClaimStatus::Pending),
            "granted" => Ok(ClaimStatus::Granted),
            "rejected" => Ok(ClaimStatus::Rejected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// One geographic record. Immutable once installed in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    pub id: FeatureId,
    pub kind: FeatureKind,
    pub geometry: Geometry,
    pub properties: Properties,
}

impl Feature {
    pub fn key(&self) -> FeatureKey {
        FeatureKey { kind: self.kind, id: self.id.clone() }
    }

    pub fn prop(&self, key: &str) -> Option<&PropValue> {
        self.properties.get(key)
    }

    /// Text value of a property; numbers and bools are not coerced.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.prop(key).and_then(PropValue::as_str)
    }

    /// Text value with numbers and bools rendered the way [`Feature::display`] shows them.
    pub fn text_lossy(&self, key: &str) -> Option<Cow<'_, str>> {
        self.prop(key).map(|v| match v {
            PropValue::Text(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        })
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.prop(key).and_then(PropValue::as_f64)
    }

    /// Rendered value for display and export; empty when missing.
    pub fn display(&self, key: &str) -> String {
        self.prop(key).map(|v| v.to_string()).unwrap_or_default()
    }

    pub fn status(&self) -> Option<ClaimStatus> {
        self.text(props::STATUS).and_then(|s| s.parse().ok())
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.geometry.bounds()
    }
}

/// Decision-support hint shown with a claim's details.
pub fn dss_suggestion(feature: &Feature) -> String {
    let mut parts: SmallVec<[&str; 2]> = SmallVec::new();
    if feature.number(props::AREA).map(|a| a < 2.0).unwrap_or(false) {
        parts.push("Recommend: PM-KISAN");
    }
    if feature.status() == Some(ClaimStatus::Pending) {
        parts.push("Priority: Verification");
    }
    parts.join(" | ")
}

pub mod prelude {
    pub use super::{
        Bounds, ClaimStatus, Feature, FeatureId, FeatureKey, FeatureKind, Geometry, LatLng, PropValue,
        Properties, Ring,
    };
}
