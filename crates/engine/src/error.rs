use atlas_core::FeatureKind;

/// Why a highlight request changed nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HighlightError {
    #[error("no feature with identifier {identifier:?}")]
    NotFound { identifier: String },
    #[error("identifier is empty")]
    EmptyIdentifier,
    #[error("layer {layer} is not loaded")]
    LayerNotLoaded { layer: FeatureKind },
    #[error("engine has been torn down")]
    TornDown,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}
