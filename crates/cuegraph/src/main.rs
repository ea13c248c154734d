use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use cuegraph_core::{
    export_cue_list, rebuild_scenes, write_export, CommandPattern, ConfigError, ConfigManager,
    CueControlService, CueError, Importer, LightCueCatalog, RemoteWorkspace, Settings, SheetKind,
};
use cuegraph_qlab::OscTransport;
use log::{error, info, warn};

mod input;

/// Builds light cue timelines in a QLab workspace from edited cue sheets.
#[derive(Parser, Debug)]
#[command(name = "cuegraph")]
#[command(about = "Cue sheet to QLab cue graph compiler")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Settings file (default: ~/.cuegraph.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log every request and compiler step
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the effective settings back to the settings file
    #[arg(long, global = true)]
    save: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import song or show sheets into the destination cue list
    Import(ImportArgs),
    /// Write a cue list and its cue tree to <OUTDIR>/<workspace>.json
    Export(ExportArgs),
    /// Recreate every scene as a light cue starting from a blank rig
    RebuildScenes(RebuildArgs),
}

#[derive(Args, Debug)]
struct Connection {
    /// QLab host
    #[arg(long)]
    host: Option<String>,

    /// QLab OSC port
    #[arg(long)]
    port: Option<u16>,

    /// Workspace unique id
    #[arg(long)]
    workspace: Option<String>,
}

#[derive(Args, Debug)]
struct CatalogArgs {
    /// Read the light cues from QLab even when a cache file exists
    #[arg(long)]
    no_cache: bool,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// A sheet file, or a directory of song sheets
    path: String,

    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Cue list the imported cues are appended to
    #[arg(long)]
    destination: Option<String>,

    /// Remove chase fixtures that a co-occurring scene also sets
    #[arg(long)]
    remove_chase_conflicts: bool,

    /// Delete cues in the destination list numbered like the sheet before building it
    #[arg(long)]
    replace_existing: bool,

    /// Color of each imported sheet's group (red, orange, green, blue, purple or none)
    #[arg(long)]
    color: Option<String>,

    #[command(flatten)]
    connection: Connection,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Directory the export file is written to
    outdir: PathBuf,

    /// Cue list to export
    #[arg(long)]
    source: String,

    #[command(flatten)]
    connection: Connection,
}

#[derive(Args, Debug)]
struct RebuildArgs {
    /// Cue list the scene cues are appended to
    #[arg(long)]
    destination: Option<String>,

    #[command(flatten)]
    connection: Connection,

    #[command(flatten)]
    catalog: CatalogArgs,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
    Song,
    Show,
}

impl From<KindArg> for SheetKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Song => SheetKind::Song,
            KindArg::Show => SheetKind::Show,
        }
    }
}

impl Connection {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(workspace) = &self.workspace {
            settings.workspace_id = workspace.clone();
        }
    }
}

impl Command {
    fn apply(&self, settings: &mut Settings) {
        match self {
            Command::Import(args) => {
                args.connection.apply(settings);
                if let Some(kind) = args.kind {
                    settings.sheet_kind = kind.into();
                }
                if let Some(destination) = &args.destination {
                    settings.destination_cue_list = destination.clone();
                }
                if args.remove_chase_conflicts {
                    settings.chase_fixture_removal_on_matching_fixture = true;
                }
                if args.replace_existing {
                    settings.replace_existing = true;
                }
                if let Some(color) = &args.color {
                    settings.root_group_color = Some(color.to_lowercase());
                }
                if args.catalog.no_cache {
                    settings.use_light_cue_cache = false;
                }
            }
            Command::Export(args) => args.connection.apply(settings),
            Command::RebuildScenes(args) => {
                args.connection.apply(settings);
                if let Some(destination) = &args.destination {
                    settings.destination_cue_list = destination.clone();
                }
                if args.catalog.no_cache {
                    settings.use_light_cue_cache = false;
                }
            }
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = tokio::runtime::Runtime::new()
        .context("starting the async runtime")
        .and_then(|runtime| runtime.block_on(run(cli)));

    if let Err(err) = result {
        report(err);
        std::process::exit(1);
    }
}

/// Logs an error, one line per collected validation failure.
fn report(err: anyhow::Error) {
    let err = match err.downcast::<CueError>() {
        Ok(cue_error) => {
            for message in cue_error.into_messages() {
                error!("{}", message);
            }
            return;
        }
        Err(err) => err,
    };
    match err.downcast::<ConfigError>() {
        Ok(ConfigError::ValidationError(errors)) => {
            for message in errors {
                error!("{}", message);
            }
        }
        Ok(other) => error!("{}", other),
        Err(err) => error!("{:#}", err),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut manager = ConfigManager::new(cli.config.clone());
    let mut settings = manager.load()?;
    cli.command.apply(&mut settings);

    ConfigManager::validate_settings(&settings).map_err(ConfigError::ValidationError)?;
    if cli.save {
        manager.update_settings(settings.clone())?;
        info!("Saved settings to {}", manager.config_path().display());
    }

    if settings.workspace_id.trim().is_empty() {
        bail!(
            "no workspace id, pass --workspace or set workspace_id in {}",
            manager.config_path().display()
        );
    }

    match &cli.command {
        Command::Import(args) => import(&settings, &args.path).await,
        Command::Export(args) => export(&settings, &args.outdir, &args.source).await,
        Command::RebuildScenes(_) => rebuild(&settings).await,
    }
}

async fn connect(settings: &Settings) -> Result<RemoteWorkspace<OscTransport>> {
    let transport = OscTransport::connect(&settings.host, settings.port)
        .await
        .with_context(|| format!("connecting to QLab at {}:{}", settings.host, settings.port))?;
    let workspace =
        RemoteWorkspace::connect(transport, &settings.workspace_id, settings.retry_policy())
            .await?;
    Ok(workspace)
}

async fn load_catalog<S>(service: &mut S, settings: &Settings) -> Result<LightCueCatalog>
where
    S: CueControlService + ?Sized,
{
    let lists = service.list().await?;
    let catalog = LightCueCatalog::load_or_cached(
        service,
        &lists,
        &settings.light_cues_list,
        &settings.light_cue_cache_path(),
        settings.use_light_cue_cache,
    )
    .await?;
    info!("{} light cues available", catalog.len());
    Ok(catalog)
}

fn require_destination(settings: &Settings) -> Result<()> {
    if settings.destination_cue_list.trim().is_empty() {
        bail!("no destination cue list, pass --destination or set destination_cue_list");
    }
    Ok(())
}

async fn import(settings: &Settings, raw_path: &str) -> Result<()> {
    require_destination(settings)?;
    let path = input::clean_path(raw_path);
    let files = input::discover(&path, settings.sheet_kind)?;
    let sheets = input::load_sheets(&files, settings.sheet_kind)?;

    let mut workspace = connect(settings).await?;
    let catalog = load_catalog(&mut workspace, settings).await?;
    let commands: CommandPattern = settings.command_pattern();

    let importer = Importer::new(&catalog, &commands, settings.import_options());
    let reports = importer.run(&mut workspace, &sheets).await?;

    for report in &reports {
        info!("{}: {} cues created", report.title, report.cues_created);
        if !report.warnings.is_empty() {
            warn!("{}:", report.title);
            for warning in &report.warnings {
                warn!("  {}", warning);
            }
        }
    }
    Ok(())
}

async fn export(settings: &Settings, outdir: &std::path::Path, source: &str) -> Result<()> {
    let mut workspace = connect(settings).await?;
    let lists = workspace.list().await?;
    let exported = export_cue_list(&mut workspace, &lists, source).await?;
    write_export(outdir, workspace.workspace_id(), &exported)?;
    Ok(())
}

async fn rebuild(settings: &Settings) -> Result<()> {
    require_destination(settings)?;
    let mut workspace = connect(settings).await?;
    let catalog = load_catalog(&mut workspace, settings).await?;
    rebuild_scenes(&mut workspace, &catalog, &settings.destination_cue_list).await?;
    Ok(())
}
