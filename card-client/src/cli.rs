//! The `idcard` command line.
//!
//! Templates and records are given either as a storage id or as a path to a
//! `.json` file, so cards can be rendered with or without a running service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use card_core::{
    compose_record, CompositionOptions, ElementKind, Record, ShapeCatalog, ShapeType, Template,
};
use card_renderer::{AssetCache, ExportConfig, ExportFormat, SceneExporter};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

use crate::config::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::loader::HttpImageLoader;
use crate::storage::StorageClient;

/// Render data-bound ID card templates.
#[derive(Debug, Parser)]
#[command(name = "idcard", version, about)]
pub struct Cli {
    /// Storage service root.
    #[arg(long, env = "IDCARD_API_URL", default_value = DEFAULT_BASE_URL, global = true)]
    pub api_url: String,

    /// Bearer token for the storage service.
    #[arg(long, env = "IDCARD_API_TOKEN", hide_env_values = true, global = true)]
    pub api_token: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "IDCARD_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,

    /// Read `/uploads/...` asset paths from this directory instead of the service.
    #[arg(long, env = "IDCARD_ASSETS_DIR", global = true)]
    pub assets_dir: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render a template for one record.
    Render(RenderArgs),
    /// Render a template for many records into one PDF, one page each.
    Batch(BatchArgs),
    /// List stored templates.
    Templates,
}

/// Arguments for `idcard render`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Template id or `.json` file.
    #[arg(long)]
    pub template: String,

    /// Student id or `.json` file; without it the template's literal values render.
    #[arg(long)]
    pub record: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Png)]
    pub format: OutputFormat,

    /// Output file.
    #[arg(long)]
    pub out: PathBuf,

    /// Paint the editing decoration.
    #[arg(long)]
    pub editable: bool,

    /// Element index to decorate as selected.
    #[arg(long, requires = "editable")]
    pub selected: Option<usize>,

    /// Output pixels per canvas pixel.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,

    /// JPEG quality.
    #[arg(long, default_value_t = 85, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub jpeg_quality: u8,
}

/// Arguments for `idcard batch`.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// Template id or `.json` file.
    #[arg(long)]
    pub template: String,

    /// JSON file holding an array of records.
    #[arg(long)]
    pub records: PathBuf,

    /// Output PDF.
    #[arg(long)]
    pub out: PathBuf,

    /// Raster resolution multiplier for the PDF pages.
    #[arg(long, default_value_t = 1.0)]
    pub scale: f32,
}

/// Output formats accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// PNG image.
    Png,
    /// JPEG image.
    Jpeg,
    /// SVG document.
    Svg,
    /// PDF with a vector text layer.
    Pdf,
}

impl From<OutputFormat> for ExportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Png => Self::Png,
            OutputFormat::Jpeg => Self::Jpeg,
            OutputFormat::Svg => Self::Svg,
            OutputFormat::Pdf => Self::Pdf,
        }
    }
}

/// Where a template or record comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A JSON file on disk.
    File(PathBuf),
    /// A storage id.
    Stored(String),
}

impl Source {
    /// Interpret a command line value.
    ///
    /// Values ending in `.json`, or naming an existing file, are files.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let path = Path::new(value);
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json || path.is_file() {
            Self::File(path.to_path_buf())
        } else {
            Self::Stored(value.to_string())
        }
    }
}

impl Cli {
    /// Client configuration from the connection options.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(self.api_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.api_token {
            Some(token) => config.with_token(token.clone()),
            None => config,
        }
    }
}

/// Execute a parsed command line.
///
/// Nothing is written unless the whole render succeeds.
///
/// # Errors
///
/// Returns an error if the template or records cannot be resolved, the
/// render fails, or the output cannot be written.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let storage = StorageClient::new(cli.client_config())?;
    let loader = match &cli.assets_dir {
        Some(dir) => HttpImageLoader::new(storage.clone()).with_local_root(dir),
        None => HttpImageLoader::new(storage.clone()),
    };

    match cli.command {
        Command::Render(args) => render(&storage, &loader, &args).await,
        Command::Batch(args) => batch(&storage, &loader, &args).await,
        Command::Templates => list_templates(&storage).await,
    }
}

async fn render(
    storage: &StorageClient,
    loader: &HttpImageLoader,
    args: &RenderArgs,
) -> anyhow::Result<()> {
    let template = load_template(storage, &args.template).await?;
    let record = match &args.record {
        Some(source) => load_record(storage, source).await?,
        None => Record::new(),
    };
    if let Some(index) = args.selected {
        if index >= template.elements.len() {
            bail!(
                "Template \"{}\" has no element {index} to select",
                template.name
            );
        }
    }

    let catalog = load_catalog(storage, &template).await;
    let options = if args.editable {
        CompositionOptions::editor(args.selected)
    } else {
        CompositionOptions::default()
    };
    let scene = compose_record(&template, &record, catalog.as_ref(), &options);

    let mut assets = AssetCache::new();
    let report = assets.preload(scene.image_urls(), loader).await;
    if report.failed > 0 {
        warn!(failed = report.failed, "Some images could not be loaded");
    }

    let exporter = SceneExporter::new(ExportConfig {
        scale: args.scale,
        jpeg_quality: args.jpeg_quality,
        title: template.name.clone(),
        ..ExportConfig::default()
    });
    let bytes = exporter.export(&scene, &assets, args.format.into())?;
    write_output(&args.out, &bytes).await?;
    info!(
        template = %template.name,
        out = %args.out.display(),
        bytes = bytes.len(),
        "Rendered card"
    );
    Ok(())
}

async fn batch(
    storage: &StorageClient,
    loader: &HttpImageLoader,
    args: &BatchArgs,
) -> anyhow::Result<()> {
    let template = load_template(storage, &args.template).await?;
    let records = load_records(&args.records).await?;
    if records.is_empty() {
        bail!("No records to export in {}", args.records.display());
    }

    let catalog = load_catalog(storage, &template).await;
    let urls: Vec<String> = records
        .iter()
        .flat_map(|record| {
            compose_record(
                &template,
                record,
                catalog.as_ref(),
                &CompositionOptions::default(),
            )
            .image_urls()
        })
        .collect();
    let mut assets = AssetCache::new();
    let report = assets.preload(urls, loader).await;
    if report.failed > 0 {
        warn!(failed = report.failed, "Some images could not be loaded");
    }

    let exporter = SceneExporter::new(ExportConfig {
        scale: args.scale,
        title: template.name.clone(),
        ..ExportConfig::default()
    });
    let bytes = exporter.export_batch(&template, &records, catalog.as_ref(), &assets)?;
    write_output(&args.out, &bytes).await?;
    info!(
        template = %template.name,
        pages = records.len(),
        out = %args.out.display(),
        "Rendered batch"
    );
    Ok(())
}

async fn list_templates(storage: &StorageClient) -> anyhow::Result<()> {
    let templates = storage.list_templates().await?;
    for template in &templates {
        println!(
            "{}\t{}\t{} elements",
            template.id.as_deref().unwrap_or("-"),
            template.name,
            template.elements.len()
        );
    }
    Ok(())
}

/// Resolve a template from a file or from storage.
///
/// # Errors
///
/// Returns an error if the template cannot be read, fetched or parsed.
pub async fn load_template(storage: &StorageClient, source: &str) -> anyhow::Result<Template> {
    match Source::parse(source) {
        Source::File(path) => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read template {}", path.display()))?;
            Template::from_json(&json)
                .with_context(|| format!("Invalid template in {}", path.display()))
        }
        Source::Stored(id) => storage
            .get_template(&id)
            .await
            .with_context(|| format!("Failed to load template {id}")),
    }
}

/// Resolve one record from a file or from storage.
///
/// # Errors
///
/// Returns an error if the record cannot be read, fetched or parsed.
pub async fn load_record(storage: &StorageClient, source: &str) -> anyhow::Result<Record> {
    match Source::parse(source) {
        Source::File(path) => {
            let json = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("Failed to read record {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Invalid record in {}", path.display()))
        }
        Source::Stored(id) => storage
            .get_student(&id)
            .await
            .with_context(|| format!("Failed to load student {id}")),
    }
}

/// Read a JSON array of records.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not an array of objects.
pub async fn load_records(path: &Path) -> anyhow::Result<Vec<Record>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read records {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid records in {}", path.display()))
}

/// Fetch the shape catalog when the template references uploaded shapes.
///
/// A catalog that cannot be loaded is logged; the affected masks then fall
/// back to their inline outlines.
async fn load_catalog(storage: &StorageClient, template: &Template) -> Option<ShapeCatalog> {
    if !uses_uploaded_shapes(template) {
        return None;
    }
    match storage.shape_catalog().await {
        Ok(catalog) => Some(catalog),
        Err(e) => {
            warn!("Failed to load shape catalog: {}", e);
            None
        }
    }
}

fn uses_uploaded_shapes(template: &Template) -> bool {
    template.elements.iter().any(|element| match &element.kind {
        ElementKind::Image(attrs) => matches!(attrs.shape_type, Some(ShapeType::Custom(_))),
        ElementKind::Custom(attrs) => attrs.shape_id.is_some(),
        _ => false,
    })
}

async fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
