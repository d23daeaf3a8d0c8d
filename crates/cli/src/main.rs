use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use atlas_core::{props, ClaimStatus, FeatureKind};
use atlas_engine::{popup_for, AtlasConfig, AtlasEngine};
use atlas_filter::FilterAction;
use atlas_render::{Popup, SvgRenderer};
use atlas_store::FeatureStore;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "atlasctl", version, about = "FRA atlas CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// JSON config file; ATLAS_* variables and flags override it
    #[arg(long = "config", global = true, env = "ATLAS_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    sources: SourceArgs,

    #[command(flatten)]
    filters: FilterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Claims GeoJSON
    #[arg(long, global = true, env = "ATLAS_CLAIMS")]
    claims: Option<PathBuf>,
    /// Village / survey boundaries GeoJSON
    #[arg(long, global = true, env = "ATLAS_VILLAGES")]
    villages: Option<PathBuf>,
    /// Assets GeoJSON
    #[arg(long, global = true, env = "ATLAS_ASSETS")]
    assets: Option<PathBuf>,
    /// Administrative boundaries GeoJSON
    #[arg(long, global = true, env = "ATLAS_ADMIN")]
    admin: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    #[arg(long, global = true)]
    state: Option<String>,
    #[arg(long, global = true)]
    district: Option<String>,
    #[arg(long, global = true)]
    village: Option<String>,
    /// Pending, Granted, Rejected or All
    #[arg(long, global = true)]
    status: Option<String>,
    /// Case-insensitive match on name, patta number or village
    #[arg(long, global = true)]
    search: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load every layer and print its state
    Layers,
    /// Cascading option lists for the given filters
    Options,
    /// Claims matching the filters
    List,
    /// Counts and total area of the matching claims
    Summary,
    /// Write the matching claims as CSV
    Export {
        /// File or directory (directory receives the default filename)
        #[arg(long = "out", default_value = ".")]
        out: PathBuf,
    },
    /// Find a boundary by its identifier and show its details
    Highlight {
        /// Identifier value, matched exactly
        id: String,
    },
    /// Draw the map to an SVG file
    Render {
        #[arg(long = "out")]
        out: PathBuf,
        /// Claim id to select
        #[arg(long = "select")]
        select: Option<String>,
        /// Identifier to highlight
        #[arg(long = "highlight")]
        highlight: Option<String>,
        #[arg(long = "width", default_value_t = 1024)]
        width: u32,
        #[arg(long = "height", default_value_t = 768)]
        height: u32,
    },
}

fn init_tracing() {
    let env = std::env::var("ATLAS_LOG").unwrap_or_else(|_| "info".to_string());
    let filter =
        tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("ATLAS_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid ATLAS_METRICS_ADDR; expected host:port");
        }
    }
}

fn build_config(cli: &Cli) -> Result<AtlasConfig> {
    let base = match &cli.config {
        Some(path) => AtlasConfig::from_path(path).with_context(|| format!("loading {}", path.display()))?,
        None => AtlasConfig::default(),
    };
    let mut config = base.apply_env().context("applying ATLAS_* environment")?;
    for (kind, path) in [
        (FeatureKind::Claims, &cli.sources.claims),
        (FeatureKind::Villages, &cli.sources.villages),
        (FeatureKind::Assets, &cli.sources.assets),
        (FeatureKind::AdminBoundaries, &cli.sources.admin),
    ] {
        if let Some(p) = path {
            config.sources.set(kind, p.clone());
        }
    }
    Ok(config)
}

/// Dispatch the filter flags parent first so each level is validated against its parent.
fn apply_filter_flags(engine: &mut AtlasEngine<SvgRenderer>, f: &FilterArgs) -> Result<()> {
    let status = match f.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) if s.eq_ignore_ascii_case("all") => None,
        Some(s) => Some(ClaimStatus::from_str(s).with_context(|| format!("--status {}", s))?),
    };
    let requested = [("state", &f.state), ("district", &f.district), ("village", &f.village)];
    engine.dispatch(FilterAction::SetState(f.state.clone()));
    engine.dispatch(FilterAction::SetDistrict(f.district.clone()));
    engine.dispatch(FilterAction::SetVillage(f.village.clone()));
    engine.dispatch(FilterAction::SetStatus(status));
    if let Some(q) = &f.search {
        engine.dispatch(FilterAction::SetSearch(q.clone()));
    }
    let applied = engine.filters();
    for ((name, want), got) in requested.iter().zip([&applied.state, &applied.district, &applied.village]) {
        if let Some(w) = want {
            if !w.trim().eq_ignore_ascii_case("all") && got.is_none() {
                warn!(filter = name, value = %w, "value not available under current selection; using All");
            }
        }
    }
    Ok(())
}

fn print_popup(popup: &Popup) {
    println!("{}", popup.title);
    for (label, value) in &popup.rows {
        println!("  {:<12} {}", label, value);
    }
    if let Some(note) = &popup.note {
        println!("  {}", note);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let config = build_config(&cli)?;

    let store = Arc::new(FeatureStore::new());
    let report = config.loader(Arc::clone(&store)).load_all().await;
    for (kind, reason) in report.failures() {
        warn!(layer = %kind, error = %reason, "layer unavailable");
    }

    let (width, height) = match &cli.command {
        Commands::Render { width, height, .. } => (*width, *height),
        _ => (1024, 768),
    };
    let highlight_property = config.highlight_property.clone();
    let highlight_layer = config.highlight_layer;
    let mut engine = AtlasEngine::new(Arc::clone(&store), SvgRenderer::new(width, height), config);
    apply_filter_flags(&mut engine, &cli.filters)?;

    match &cli.command {
        Commands::Layers => match cli.output {
            Output::Human => {
                println!("{:<10} {:<11} {:>8} {:>8} {:>8}", "LAYER", "STATE", "FEATURES", "SKIPPED", "DRAWN");
                for v in engine.layers() {
                    println!("{:<10} {:<11} {:>8} {:>8} {:>8}", v.kind.as_str(), v.state.label(), v.features, v.skipped, v.drawn);
                }
                for (kind, reason) in report.failures() {
                    println!("! {}: {}", kind, reason);
                }
            }
            Output::Json => {
                let out = serde_json::json!({ "report": report, "layers": engine.layers() });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
        },
        Commands::Options => {
            let opts = engine.options();
            match cli.output {
                Output::Human => {
                    println!("states:    {}", opts.states.join(", "));
                    println!("districts: {}", opts.districts.join(", "));
                    println!("villages:  {}", opts.villages.join(", "));
                    let statuses: Vec<&str> = opts.statuses.iter().map(|s| s.as_str()).collect();
                    println!("statuses:  {}", statuses.join(", "));
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&opts)?),
            }
        }
        Commands::List => {
            let claims = engine.filtered();
            match cli.output {
                Output::Human => {
                    for c in &claims {
                        println!(
                            "{} • {} • {} • {} • {}/{}/{}",
                            c.id,
                            c.display(props::NAME),
                            c.display(props::PATTA_NUMBER),
                            c.display(props::STATUS),
                            c.display(props::STATE),
                            c.display(props::DISTRICT),
                            c.display(props::VILLAGE)
                        );
                    }
                    info!(count = claims.len(), "claims listed");
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&claims)?),
            }
        }
        Commands::Summary => {
            let s = engine.summary();
            match cli.output {
                Output::Human => {
                    println!("total     {}", s.total);
                    println!("pending   {}", s.pending);
                    println!("granted   {}", s.granted);
                    println!("rejected  {}", s.rejected);
                    println!("area (ha) {:.2}", s.total_area_ha);
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&s)?),
            }
        }
        Commands::Export { out } => {
            let doc = engine.export_csv();
            let path = doc.save(out).with_context(|| format!("writing {}", out.display()))?;
            match cli.output {
                Output::Human => println!("wrote {} rows to {}", doc.rows(), path.display()),
                Output::Json => println!("{}", serde_json::json!({ "path": path, "rows": doc.rows() })),
            }
        }
        Commands::Highlight { id } => {
            let found = engine
                .highlight(id)
                .with_context(|| format!("highlighting {} = {:?}", highlight_property, id))?;
            let layer = store.layer(highlight_layer);
            let feature = layer.find(found.as_str()).context("highlighted feature vanished")?;
            let popup = popup_for(feature);
            match cli.output {
                Output::Human => print_popup(&popup),
                Output::Json => println!("{}", serde_json::to_string_pretty(&popup)?),
            }
        }
        Commands::Render { out, select, highlight, .. } => {
            let mut focused = false;
            if let Some(id) = highlight {
                engine.highlight(id).with_context(|| format!("highlighting {} = {:?}", highlight_property, id))?;
                focused = true;
            }
            if let Some(id) = select {
                if !engine.select(id) {
                    warn!(claim = %id, "claim not in filtered list; nothing selected");
                } else {
                    focused = true;
                }
            }
            if !focused {
                engine.renderer_mut().fit_all();
            }
            let svg = engine.renderer().to_svg();
            std::fs::write(out, svg).with_context(|| format!("writing {}", out.display()))?;
            let shapes = engine.renderer().shape_count();
            match cli.output {
                Output::Human => println!("wrote {} shapes to {}", shapes, out.display()),
                Output::Json => println!("{}", serde_json::json!({ "path": out, "shapes": shapes })),
            }
        }
    }
    engine.teardown();
    Ok(())
}
