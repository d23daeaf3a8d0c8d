//! Engine configuration: layer sources, load timeout, zoom policy, highlight target.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use atlas_core::FeatureKind;
use atlas_store::{FeatureStore, FileSource, LayerLoader};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerSources {
    pub claims: Option<PathBuf>,
    pub villages: Option<PathBuf>,
    pub assets: Option<PathBuf>,
    pub admin: Option<PathBuf>,
}

impl LayerSources {
    pub fn get(&self, kind: FeatureKind) -> Option<&PathBuf> {
        match kind {
            FeatureKind::Claims => self.claims.as_ref(),
            FeatureKind::Villages => self.villages.as_ref(),
            FeatureKind::Assets => self.assets.as_ref(),
            FeatureKind::AdminBoundaries => self.admin.as_ref(),
        }
    }

    pub fn set(&mut self, kind: FeatureKind, path: impl Into<PathBuf>) {
        let slot = match kind {
            FeatureKind::Claims => &mut self.claims,
            FeatureKind::Villages => &mut self.villages,
            FeatureKind::Assets => &mut self.assets,
            FeatureKind::AdminBoundaries => &mut self.admin,
        };
        *slot = Some(path.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub sources: LayerSources,
    pub fetch_timeout_ms: u64,
    /// Point focus never shows a claim from further out than this.
    pub point_focus_zoom: f64,
    /// Highlight fits the feature's bounds but stops zooming in here.
    pub highlight_max_zoom: f64,
    pub highlight_layer: FeatureKind,
    pub highlight_property: String,
    pub export_filename: String,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            sources: LayerSources::default(),
            fetch_timeout_ms: 10_000,
            point_focus_zoom: 16.0,
            highlight_max_zoom: 16.0,
            highlight_layer: FeatureKind::Villages,
            highlight_property: "SURVEY_NO".to_string(),
            export_filename: "fra_claims.csv".to_string(),
        }
    }
}

impl AtlasConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        let cfg: AtlasConfig = serde_json::from_str(&text)?;
        cfg.validate()?;
        debug!(path = %path.display(), "config loaded");
        Ok(cfg)
    }

    /// Overlay `ATLAS_*` environment variables.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|k| std::env::var(k).ok())
    }

    pub(crate) fn apply_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        for (key, kind) in [
            ("ATLAS_CLAIMS", FeatureKind::Claims),
            ("ATLAS_VILLAGES", FeatureKind::Villages),
            ("ATLAS_ASSETS", FeatureKind::Assets),
            ("ATLAS_ADMIN", FeatureKind::AdminBoundaries),
        ] {
            if let Some(v) = var(key).filter(|v| !v.trim().is_empty()) {
                self.sources.set(kind, v);
            }
        }
        if let Some(v) = var("ATLAS_FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = v
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("ATLAS_FETCH_TIMEOUT_MS={:?} is not a number", v)))?;
        }
        if let Some(v) = var("ATLAS_HIGHLIGHT_PROPERTY").filter(|v| !v.trim().is_empty()) {
            self.highlight_property = v.trim().to_string();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetch_timeout_ms must be positive".into()));
        }
        for (name, z) in [("point_focus_zoom", self.point_focus_zoom), ("highlight_max_zoom", self.highlight_max_zoom)] {
            if !(0.0..=atlas_render::MAX_ZOOM).contains(&z) {
                return Err(ConfigError::Invalid(format!("{} must be within 0..={}", name, atlas_render::MAX_ZOOM)));
            }
        }
        if self.highlight_property.trim().is_empty() {
            return Err(ConfigError::Invalid("highlight_property is empty".into()));
        }
        if self.export_filename.trim().is_empty() {
            return Err(ConfigError::Invalid("export_filename is empty".into()));
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Loader with one file source per configured layer.
    pub fn loader(&self, store: Arc<FeatureStore>) -> LayerLoader {
        let mut loader = LayerLoader::new(store).with_timeout(self.fetch_timeout());
        for kind in FeatureKind::ALL {
            match self.sources.get(kind) {
                Some(path) => loader = loader.with_source(kind, FileSource::new(path.clone())),
                None if kind == FeatureKind::Claims => warn!("no claims source configured"),
                None => {}
            }
        }
        loader
    }
}
