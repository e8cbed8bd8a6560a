use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use projdup::{
    util, ApplyOutcome, Config, ConsoleNotifier, MemoryHost, Notifier, SnapshotAssembler,
    SnapshotEnvelope, TransferController, TransferStore, Workspace,
};

/// Copy scopes, filters, match/replace rules and replay sessions between projects
#[derive(Parser, Debug)]
#[command(name = "projdup")]
#[command(version, about, long_about = None)]
struct Args {
    /// Workspace file holding the projects (defaults to <data-dir>/workspace.json)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Data directory for config and logs (defaults to ~/.projdup)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the projects in the workspace
    Projects,
    /// Show what a project contains
    Show {
        /// Project name (defaults to the selected project)
        #[arg(short, long)]
        project: Option<String>,
    },
    /// Copy one project's entities into another
    Duplicate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },
    /// Capture a project into a snapshot file
    Capture {
        #[arg(long)]
        from: String,
        #[arg(long)]
        out: PathBuf,
    },
    /// Apply a snapshot file to a project
    Apply {
        #[arg(long)]
        snapshot: PathBuf,
        #[arg(long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    util::init_data_dir(args.data_dir.clone());
    init_logging(args.verbose)?;

    let config = Config::load();
    let workspace_path = args
        .workspace
        .clone()
        .unwrap_or_else(util::default_workspace_path);

    match args.command {
        Command::Projects => list_projects(&workspace_path),
        Command::Show { project } => show_project(&workspace_path, project.as_deref()),
        Command::Duplicate { from, to } => duplicate(&workspace_path, &config, &from, &to).await,
        Command::Capture { from, out } => capture(&workspace_path, &config, &from, &out).await,
        Command::Apply { snapshot, to } => apply(&workspace_path, &config, &snapshot, &to).await,
    }
}

/// Log to <data-dir>/logs/projdup.log
fn init_logging(verbose: bool) -> Result<()> {
    fs::create_dir_all(util::logs_dir()).context("Failed to create log directory")?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(util::log_file_path())
        .context("Failed to open log file")?;

    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .init();

    Ok(())
}

fn load_workspace(path: &Path) -> Result<Workspace> {
    Workspace::load(path).with_context(|| format!("Failed to load workspace {}", path.display()))
}

fn list_projects(workspace_path: &Path) -> Result<()> {
    let workspace = load_workspace(workspace_path)?;
    for project in &workspace.projects {
        let marker = if workspace.selected.as_deref() == Some(project.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!("{} {} ({})", marker, project.name, project.id);
    }
    Ok(())
}

fn show_project(workspace_path: &Path, name: Option<&str>) -> Result<()> {
    let workspace = load_workspace(workspace_path)?;
    let project = match name {
        Some(name) => workspace.project_by_name(name),
        None => workspace.selected_project(),
    }
    .with_context(|| match name {
        Some(name) => format!("No project named '{}'", name),
        None => "No project is selected".to_string(),
    })?;

    println!("{} ({})", project.name, project.id);
    print_section("Scopes", project.scopes.iter().map(|s| s.name.clone()));
    print_section(
        "Filters",
        project.filters.iter().map(|f| match f.defined_alias() {
            Some(alias) => format!("{} [{}]", f.name, alias),
            None => f.name.clone(),
        }),
    );
    print_section(
        "Match/replace collections",
        project.match_replace_collections.iter().map(|c| c.name.clone()),
    );
    print_section(
        "Match/replace rules",
        project.match_replace_rules.iter().map(|r| r.name.clone()),
    );
    print_section(
        "Replay collections",
        project.replay_collections.iter().map(|c| c.name.clone()),
    );
    print_section(
        "Replay sessions",
        project.replay_sessions.iter().map(|s| s.name.clone()),
    );
    Ok(())
}

fn print_section(title: &str, items: impl Iterator<Item = String>) {
    let items: Vec<String> = items.collect();
    println!("{}: {}", title, items.len());
    for item in items {
        println!("  - {}", item);
    }
}

fn controller(host: &Arc<MemoryHost>, config: &Config) -> Arc<TransferController> {
    Arc::new(TransferController::new(
        host.clone(),
        Arc::new(ConsoleNotifier),
        Arc::new(TransferStore::new()),
        config.controller_options(),
    ))
}

/// Switch to `target` with the controller listening and wait for the apply
async fn switch_and_apply(
    host: &Arc<MemoryHost>,
    controller: Arc<TransferController>,
    target: &str,
) -> Result<()> {
    let (tx, mut outcomes) = mpsc::unbounded_channel();
    let listener = controller.listen(host.subscribe(), Some(tx));

    host.select_project(target)
        .with_context(|| format!("Failed to select target project '{}'", target))?;
    let outcome = outcomes
        .recv()
        .await
        .context("Transfer listener stopped before applying")?;
    listener.abort();

    match outcome {
        ApplyOutcome::Applied(_) => Ok(()),
        ApplyOutcome::NotArmed => bail!("No snapshot was armed"),
        ApplyOutcome::Aborted(e) => Err(e).context("Apply failed"),
    }
}

async fn duplicate(workspace_path: &Path, config: &Config, from: &str, to: &str) -> Result<()> {
    let host = Arc::new(MemoryHost::new(load_workspace(workspace_path)?));
    let controller = controller(&host, config);

    host.select_project(from)
        .with_context(|| format!("Failed to select source project '{}'", from))?;
    controller.duplicate().await.context("Capture failed")?;

    switch_and_apply(&host, controller, to).await?;
    host.workspace()
        .save(workspace_path)
        .context("Failed to save workspace")?;
    Ok(())
}

async fn capture(workspace_path: &Path, config: &Config, from: &str, out: &Path) -> Result<()> {
    let host = MemoryHost::new(load_workspace(workspace_path)?);
    host.select_project(from)
        .with_context(|| format!("Failed to select source project '{}'", from))?;

    let outcome = SnapshotAssembler::new(&host)
        .with_options(config.categories)
        .capture()
        .await
        .context("Capture failed")?;

    let notifier = ConsoleNotifier;
    for warning in &outcome.warnings {
        notifier.notify(&warning.to_string(), warning.variant());
    }

    outcome
        .envelope
        .save(out)
        .with_context(|| format!("Failed to write snapshot {}", out.display()))?;
    println!(
        "Captured '{}' ({}) to {}",
        outcome.envelope.source_name(),
        outcome.envelope.snapshot.describe(),
        out.display()
    );
    Ok(())
}

async fn apply(workspace_path: &Path, config: &Config, snapshot: &Path, to: &str) -> Result<()> {
    let envelope = SnapshotEnvelope::load(snapshot)
        .with_context(|| format!("Failed to read snapshot {}", snapshot.display()))?;
    let host = Arc::new(MemoryHost::new(load_workspace(workspace_path)?));
    let controller = controller(&host, config);

    controller.stage(envelope);
    switch_and_apply(&host, controller, to).await?;
    host.workspace()
        .save(workspace_path)
        .context("Failed to save workspace")?;
    Ok(())
}
