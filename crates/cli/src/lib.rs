use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use command::{CommandAction, CommandHandler, CommandRequest, CommandResponse};
use config::{AppConfig, ConfigOverrides};
use entropic_protocol::serialize_json;
use entropic_sketchbook::BinItemKind;
use serde_json::{json, Value};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

mod command;
mod config;
mod serve;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "entropic")]
#[command(about = "Sketchbook, variants, recycle bin and runner for Processing sketches", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,

    /// Directory holding the `Entropic/` sketchbook (env: ENTROPIC_DOCUMENTS_DIR)
    #[arg(long, global = true)]
    documents_dir: Option<PathBuf>,

    /// Bundled JDK and Processing jars (env: ENTROPIC_RESOURCES_DIR)
    #[arg(long, global = true)]
    resources_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a JSON Command API request
    Command(CommandArgs),

    /// Serve the Command API over stdio, one JSON request per line
    Serve,

    /// Manage sketches
    #[command(subcommand)]
    Sketch(SketchCommand),

    /// Manage the variants (stashed snapshots) of a sketch
    #[command(subcommand)]
    Variant(VariantCommand),

    /// Inspect and manage the recycle bin
    #[command(subcommand)]
    Bin(BinCommand),

    /// List or toggle starred sketches
    #[command(subcommand)]
    Star(StarCommand),

    /// Report the Java/Processing toolchain and, optionally, library imports
    Check(CheckArgs),

    /// Compile and run a sketch, printing its output when it exits
    Run(RunArgs),
}

#[derive(Args)]
struct CommandArgs {
    /// Inline JSON payload (mutually exclusive with --file)
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Path to file containing JSON payload
    #[arg(long)]
    file: Option<PathBuf>,

    /// Pretty-print JSON response
    #[arg(long)]
    pretty: bool,
}

#[derive(Subcommand)]
enum SketchCommand {
    /// List sketches, most recently updated first
    List,
    /// Create a sketch from the default template
    Create {
        /// Name; sanitized into the sketch id. Auto-named when omitted
        name: Option<String>,
    },
    /// Print the main source
    Load { id: String },
    /// Overwrite the main source from a file (or stdin)
    Save {
        id: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Rename a sketch
    Rename { id: String, new_name: String },
    /// Move a sketch to the recycle bin
    Delete { id: String },
}

#[derive(Subcommand)]
enum VariantCommand {
    /// List the variants of a sketch
    List { sketch_id: String },
    /// Snapshot the current main source as a new variant
    Stage {
        sketch_id: String,
        #[arg(long)]
        name: Option<String>,
    },
    /// Print a variant's source
    Load { sketch_id: String, variant_id: String },
    /// Overwrite a variant's source from a file (or stdin)
    Save {
        sketch_id: String,
        variant_id: String,
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Rename a variant
    Rename {
        sketch_id: String,
        variant_id: String,
        new_name: String,
    },
    /// Move a variant to the recycle bin
    Delete { sketch_id: String, variant_id: String },
    /// Replace the main source with a variant
    Restore {
        sketch_id: String,
        variant_id: String,
        /// Stage the current main source first
        #[arg(long)]
        backup: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ItemType {
    Sketch,
    Variant,
}

impl From<ItemType> for BinItemKind {
    fn from(value: ItemType) -> Self {
        match value {
            ItemType::Sketch => BinItemKind::Sketch,
            ItemType::Variant => BinItemKind::Variant,
        }
    }
}

#[derive(Args)]
struct BinItemArgs {
    /// Sketch id, or variant id together with --sketch-id
    id: String,
    #[arg(long = "type", value_enum)]
    item_type: ItemType,
    #[arg(long)]
    sketch_id: Option<String>,
}

impl BinItemArgs {
    fn payload(&self) -> Value {
        let mut payload = json!({
            "id": self.id,
            "type": BinItemKind::from(self.item_type).as_str(),
        });
        if let (Some(sketch_id), Value::Object(map)) = (&self.sketch_id, &mut payload) {
            map.insert("sketch_id".to_string(), json!(sketch_id));
        }
        payload
    }
}

#[derive(Subcommand)]
enum BinCommand {
    /// List bin entries
    List,
    /// Move an entry back to where it came from
    Restore(BinItemArgs),
    /// Delete an entry permanently
    Delete(BinItemArgs),
    /// Delete every entry permanently
    Empty,
    /// Purge entries older than the retention window
    Sweep,
}

#[derive(Subcommand)]
enum StarCommand {
    List,
    Toggle { id: String },
}

#[derive(Args)]
struct CheckArgs {
    /// Also report which libraries imported by this sketch file are installed
    #[arg(long)]
    libraries: Option<PathBuf>,
}

#[derive(Args)]
#[command(group(clap::ArgGroup::new("source").required(true).args(["sketch_id", "file"])))]
struct RunArgs {
    /// Run a saved sketch
    #[arg(long)]
    sketch_id: Option<String>,
    /// Run a `.pde` file
    #[arg(long)]
    file: Option<PathBuf>,
    /// Class name for the generated Java (defaults to the sketch id or file stem)
    #[arg(long)]
    name: Option<String>,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries JSON in these modes; keep stderr to warnings unless asked.
    let json_mode = matches!(cli.command, Commands::Command(_) | Commands::Serve);
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    } else if cli.quiet || json_mode {
        builder.filter_level(log::LevelFilter::Warn);
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = AppConfig::resolve(&ConfigOverrides {
        documents_dir: cli.documents_dir.clone(),
        resources_dir: cli.resources_dir.clone(),
    })?;
    log::debug!("Sketchbook root: {}", config.layout().root().display());

    match cli.command {
        Commands::Command(args) => run_command(args, &config).await?,
        Commands::Serve => serve::run(&config).await?,
        Commands::Sketch(cmd) => run_sketch_command(cmd, &config).await?,
        Commands::Variant(cmd) => run_variant_command(cmd, &config).await?,
        Commands::Bin(cmd) => run_bin_command(cmd, &config).await?,
        Commands::Star(cmd) => run_star_command(cmd, &config).await?,
        Commands::Check(args) => run_check(args, &config).await?,
        Commands::Run(args) => run_run(args, &config).await?,
    }

    Ok(())
}

async fn run_command(args: CommandArgs, config: &AppConfig) -> Result<()> {
    let raw = read_payload(&args)?;
    let request: CommandRequest =
        serde_json::from_str(&raw).context("Invalid JSON passed to --json/--file")?;

    let handler = CommandHandler::new(config, None)?;
    let response = handler.execute(request).await;
    handler.shutdown().await;

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serialize_json(&response)?
    };
    print_stdout(&output)?;

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn read_payload(args: &CommandArgs) -> Result<String> {
    if let Some(raw) = &args.json {
        return Ok(raw.clone());
    }
    if let Some(path) = &args.file {
        return fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON from {}", path.display()));
    }

    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read JSON from stdin")?;

    if buffer.trim().is_empty() {
        anyhow::bail!("Command request is empty. Provide --json, --file, or pipe JSON via stdin.");
    }

    Ok(buffer)
}

fn read_source(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read source from {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read source from stdin")?;
            Ok(buffer)
        }
    }
}

/// Runs one request and prints the pretty response; exits 1 on failure.
async fn dispatch(config: &AppConfig, action: CommandAction, payload: Value) -> Result<()> {
    let handler = CommandHandler::new(config, None)?;
    let response = handler.execute(CommandRequest::new(action, payload)).await;
    handler.shutdown().await;
    print_response(&response)
}

fn print_response(response: &CommandResponse) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(response)?)?;
    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_sketch_command(cmd: SketchCommand, config: &AppConfig) -> Result<()> {
    let (action, payload) = match cmd {
        SketchCommand::List => (CommandAction::ListSketches, json!({})),
        SketchCommand::Create { name } => (CommandAction::CreateSketch, json!({ "name": name })),
        SketchCommand::Load { id } => (CommandAction::LoadSketch, json!({ "id": id })),
        SketchCommand::Save { id, file } => {
            let code = read_source(file.as_ref())?;
            (CommandAction::SaveSketch, json!({ "id": id, "code": code }))
        }
        SketchCommand::Rename { id, new_name } => (
            CommandAction::RenameSketch,
            json!({ "id": id, "new_name": new_name }),
        ),
        SketchCommand::Delete { id } => (CommandAction::DeleteSketch, json!({ "id": id })),
    };
    dispatch(config, action, payload).await
}

async fn run_variant_command(cmd: VariantCommand, config: &AppConfig) -> Result<()> {
    let (action, payload) = match cmd {
        VariantCommand::List { sketch_id } => {
            (CommandAction::ListVariants, json!({ "sketch_id": sketch_id }))
        }
        VariantCommand::Stage { sketch_id, name } => (
            CommandAction::StageVariant,
            json!({ "sketch_id": sketch_id, "name": name }),
        ),
        VariantCommand::Load {
            sketch_id,
            variant_id,
        } => (
            CommandAction::LoadVariant,
            json!({ "sketch_id": sketch_id, "variant_id": variant_id }),
        ),
        VariantCommand::Save {
            sketch_id,
            variant_id,
            file,
        } => {
            let code = read_source(file.as_ref())?;
            (
                CommandAction::SaveVariant,
                json!({ "sketch_id": sketch_id, "variant_id": variant_id, "code": code }),
            )
        }
        VariantCommand::Rename {
            sketch_id,
            variant_id,
            new_name,
        } => (
            CommandAction::RenameVariant,
            json!({ "sketch_id": sketch_id, "variant_id": variant_id, "new_name": new_name }),
        ),
        VariantCommand::Delete {
            sketch_id,
            variant_id,
        } => (
            CommandAction::DeleteVariant,
            json!({ "sketch_id": sketch_id, "variant_id": variant_id }),
        ),
        VariantCommand::Restore {
            sketch_id,
            variant_id,
            backup,
        } => (
            CommandAction::RestoreVariant,
            json!({ "sketch_id": sketch_id, "variant_id": variant_id, "backup": backup }),
        ),
    };
    dispatch(config, action, payload).await
}

async fn run_bin_command(cmd: BinCommand, config: &AppConfig) -> Result<()> {
    let (action, payload) = match cmd {
        BinCommand::List => (CommandAction::ListBin, json!({})),
        BinCommand::Restore(item) => (CommandAction::RestoreBinItem, item.payload()),
        BinCommand::Delete(item) => (CommandAction::DeleteBinItem, item.payload()),
        BinCommand::Empty => (CommandAction::EmptyBin, json!({})),
        BinCommand::Sweep => (CommandAction::SweepBin, json!({})),
    };
    dispatch(config, action, payload).await
}

async fn run_star_command(cmd: StarCommand, config: &AppConfig) -> Result<()> {
    let (action, payload) = match cmd {
        StarCommand::List => (CommandAction::ListStars, json!({})),
        StarCommand::Toggle { id } => (CommandAction::ToggleStar, json!({ "id": id })),
    };
    dispatch(config, action, payload).await
}

async fn run_check(args: CheckArgs, config: &AppConfig) -> Result<()> {
    let Some(path) = args.libraries else {
        return dispatch(config, CommandAction::CheckRuntime, json!({})).await;
    };
    let code = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read sketch {}", path.display()))?;

    let handler = CommandHandler::new(config, None)?;
    let runtime = handler
        .execute(CommandRequest::new(CommandAction::CheckRuntime, json!({})))
        .await;
    let libraries = handler
        .execute(CommandRequest::new(
            CommandAction::CheckLibraries,
            json!({ "code": code }),
        ))
        .await;
    let success = runtime.is_success() && libraries.is_success();
    let report = json!({ "runtime": runtime, "libraries": libraries });
    print_stdout(&serde_json::to_string_pretty(&report)?)?;
    if !success {
        std::process::exit(1);
    }
    Ok(())
}

async fn run_run(args: RunArgs, config: &AppConfig) -> Result<()> {
    let payload = match (&args.sketch_id, &args.file) {
        (Some(sketch_id), _) => json!({ "sketch_id": sketch_id, "name": args.name }),
        (None, Some(file)) => {
            let code = read_source(Some(file))?;
            let name = args.name.clone().or_else(|| {
                file.file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
            });
            json!({ "code": code, "name": name })
        }
        (None, None) => anyhow::bail!("Pass --sketch-id or --file"),
    };
    dispatch(config, CommandAction::RunSketch, payload).await
}
