use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use doc_model::{BoundingRect, PageNumber, PhraseConfig, ReferenceId, TextFragment};
use pdf_engine::{default_engine, page_fragments, AverageAdvance, OpenSource, PdfEngine};
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::Storage;
use tracing_subscriber::EnvFilter;
use viewer_core::{
    Activation, FragmentJoin, LoadOptions, LocatorOptions, Viewer, ViewportState, ViewportSurface,
};

#[derive(Debug, Parser)]
#[command(name = "citemark")]
#[command(about = "Locate configured phrases in PDF documents")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `viewer_core=trace`. Defaults to `RUST_LOG`, then `warn`.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Index a PDF and locate the phrase configured for a reference.
    Locate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Phrase configuration; defaults to the per-user `phrases.json`.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        #[arg(long, value_name = "ID")]
        reference: String,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
        /// Join fragments with a space when resolving the matching run.
        #[arg(long)]
        join_with_space: bool,
        #[arg(long, default_value_t = 800.0, value_name = "PX")]
        viewport_height: f32,
    },
    /// Print the positioned text fragments of one page.
    Fragments {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: PageNumber,
        #[arg(long, default_value_t = 1.0)]
        scale: f32,
    },
    /// Validate a phrase configuration file.
    CheckConfig {
        #[arg(value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Reference that must be configured; repeatable.
        #[arg(long = "require", value_name = "ID")]
        required: Vec<String>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum LocateOutput {
    Found {
        reference: ReferenceId,
        canonical: String,
        page: PageNumber,
        variation: String,
        rect: BoundingRect,
        scroll_offset: f32,
        centered_page: Option<PageNumber>,
    },
    NotFound {
        reference: ReferenceId,
        message: String,
        variations: Vec<String>,
    },
    UnknownReference {
        reference: ReferenceId,
    },
}

#[derive(Debug, Serialize)]
struct FragmentsOutput {
    page: PageNumber,
    page_count: u32,
    fragments: Vec<TextFragment>,
}

#[derive(Debug, Serialize)]
struct CheckConfigOutput {
    path: String,
    reference_count: usize,
    references: Vec<ReferenceSummary>,
}

#[derive(Debug, Serialize)]
struct ReferenceSummary {
    id: ReferenceId,
    canonical: String,
    variations: usize,
    page_hint: Option<PageNumber>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.log_level.as_deref())?;

    match cli.command {
        Commands::Locate { file, config, reference, scale, join_with_space, viewport_height } => {
            let join = if join_with_space { FragmentJoin::Space } else { FragmentJoin::Concatenate };
            run_locate(&file, config.as_deref(), reference.into(), scale, join, viewport_height)
        }
        Commands::Fragments { file, page, scale } => run_fragments(&file, page, scale),
        Commands::CheckConfig { config, required } => run_check_config(config.as_deref(), required),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to install logger: {error}"))
}

fn run_locate(
    file: &Path,
    config_path: Option<&Path>,
    reference: ReferenceId,
    scale: f32,
    join: FragmentJoin,
    viewport_height: f32,
) -> Result<()> {
    ensure_file_exists(file)?;
    let config = Arc::new(load_config(config_path)?);

    let mut engine = default_engine();
    let options = LoadOptions::default()
        .with_scale(scale)
        .with_locator(LocatorOptions::default().with_fragment_join(join));
    let surface = ViewportSurface::new(ViewportState::with_pages(Vec::new(), viewport_height));
    let mut viewer = Viewer::new(surface, options);

    viewer
        .begin_load(&mut engine, OpenSource::from(file), Arc::clone(&config))
        .context("failed to open PDF")?;
    viewer.load_to_end(&mut engine).context("failed to index PDF")?;
    tracing::debug!(file = %file.display(), %reference, "document ready, activating reference");

    let output = match viewer.activate_reference(&reference)? {
        Activation::Highlighted(found) => LocateOutput::Found {
            canonical: config
                .get(&reference)
                .map(|spec| spec.canonical.clone())
                .unwrap_or_default(),
            reference,
            page: found.page,
            variation: found.variation,
            rect: found.rect,
            scroll_offset: viewer.surface().scroll_offset(),
            centered_page: viewer.surface().centered_page(),
        },
        Activation::NotFound { message, variations } => {
            LocateOutput::NotFound { reference, message, variations }
        }
        Activation::UnknownReference(reference) => LocateOutput::UnknownReference { reference },
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run_fragments(file: &Path, page: PageNumber, scale: f32) -> Result<()> {
    ensure_file_exists(file)?;

    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut engine = default_engine();
    let handle = engine.open(OpenSource::from(file)).context("failed to open PDF")?;

    let page_count = engine.page_count(handle)?;
    let fragments = page_fragments(&engine, handle, page, scale, &AverageAdvance::default())
        .with_context(|| format!("failed to extract page {page}"));
    engine.close(handle)?;

    let payload = FragmentsOutput { page, page_count, fragments: fragments? };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn run_check_config(config_path: Option<&Path>, required: Vec<String>) -> Result<()> {
    let path = resolve_config_path(config_path)?;
    let config = storage::load_phrase_config(&path)
        .with_context(|| format!("failed to load phrase configuration {}", path.display()))?;

    let required: Vec<ReferenceId> = required.into_iter().map(ReferenceId::from).collect();
    config.require(&required)?;

    let payload = CheckConfigOutput {
        path: path.display().to_string(),
        reference_count: config.len(),
        references: config
            .iter()
            .map(|(id, spec)| ReferenceSummary {
                id: id.clone(),
                canonical: spec.canonical.clone(),
                variations: spec.variations.len(),
                page_hint: spec.page_hint,
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<PhraseConfig> {
    let path = resolve_config_path(config_path)?;

    storage::load_phrase_config(&path)
        .with_context(|| format!("failed to load phrase configuration {}", path.display()))
}

fn resolve_config_path(config_path: Option<&Path>) -> Result<PathBuf> {
    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => Storage::from_default_project()?.phrases_path(),
    };
    tracing::debug!(path = %path.display(), "using phrase configuration");

    Ok(path)
}

fn ensure_file_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
