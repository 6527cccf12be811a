use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use eaglet::api::{EagleClient, Folder};
use eaglet::config::{self, Config};
use eaglet::fetch::{Completed, FetchSequencer, QueryContext};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("EAGLET_BUILD_GIT_HASH"),
    ")"
);

/// Upper bound for one `wait` in `list`; the loop keeps waiting after it.
const LIST_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "eaglet", version = VERSION, about = "Terminal browser for Eagle media libraries")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Backend base URL (default: http://127.0.0.1:8000)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Grid columns for the viewer (1-10)
    #[arg(long, global = true)]
    columns: Option<u16>,

    /// Folder id or name to start in (viewer and `list`)
    #[arg(long, global = true)]
    folder: Option<String>,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print items page by page until the library is exhausted
    List {
        /// Stop after this many items
        #[arg(long)]
        max: Option<usize>,

        /// One JSON object per line instead of `id<TAB>url`
        #[arg(long)]
        json: bool,
    },
    /// Print the active library name
    Current,
    /// Print available libraries (`*` marks the active one)
    Libraries,
    /// Print the folder tree
    Folders,
    /// Switch the active library and wait for it to load
    Switch { name: String },
    /// Print metadata for one item
    Info { id: String },
}

fn init_logging(cli: &Cli) -> Result<()> {
    if let Some(log_path) = &cli.log {
        let file = std::fs::File::create(log_path)
            .with_context(|| format!("failed to open log file {}", log_path.display()))?;
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // viewer mode + no --log → logger not initialized (would corrupt the screen)
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(cli.base_url, cli.columns);
    let config = cfg.resolve();

    if let Err(e) = dispatch(cli.command, cli.folder, &config) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn dispatch(command: Option<Command>, folder: Option<String>, config: &Config) -> Result<()> {
    let client = Arc::new(EagleClient::new(&config.base_url)?);
    info!("backend: {}", client.base_url());

    match command {
        None => {
            let context = resolve_context(&client, folder.as_deref())?;
            eaglet::viewer::run(client, config, context)
        }
        Some(Command::List { max, json }) => {
            let context = resolve_context(&client, folder.as_deref())?;
            cmd_list(client, context, max, json)
        }
        Some(Command::Current) => {
            println!("{}", client.current_library()?);
            Ok(())
        }
        Some(Command::Libraries) => cmd_libraries(&client),
        Some(Command::Folders) => cmd_folders(&client),
        Some(Command::Switch { name }) => cmd_switch(&client, config, &name),
        Some(Command::Info { id }) => {
            let info = client.item_info(&id)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
            Ok(())
        }
    }
}

/// Map `--folder` to a query context. Unknown keys are passed through as ids.
fn resolve_context(client: &EagleClient, folder: Option<&str>) -> Result<QueryContext> {
    let Some(key) = folder else {
        return Ok(QueryContext::all());
    };
    let tree = client.folder_list().context("failed to load folder list")?;
    match Folder::find(&tree, key) {
        Some(found) => {
            info!("folder '{key}' resolved to {} ({})", found.id, found.name);
            Ok(QueryContext::folder(found.id.clone()))
        }
        None => {
            warn!("folder '{key}' not in folder list, using it as an id");
            Ok(QueryContext::folder(key))
        }
    }
}

fn cmd_list(
    client: Arc<EagleClient>,
    context: QueryContext,
    max: Option<usize>,
    json: bool,
) -> Result<()> {
    let started = Instant::now();
    let limit = max.unwrap_or(usize::MAX);
    let mut seq = FetchSequencer::new(client, context);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut printed = 0;

    seq.start();
    while printed < limit {
        let Some(completed) = seq.wait(LIST_WAIT) else {
            info!("list: still waiting for page at offset {}", seq.offset());
            continue;
        };
        match completed {
            Completed::Merged { .. } => {
                for item in seq.items().iter().skip(printed).take(limit - printed) {
                    if json {
                        writeln!(out, "{}", serde_json::to_string(item)?)?;
                    } else {
                        writeln!(out, "{}\t{}", item.id, item.url)?;
                    }
                    printed += 1;
                }
                out.flush()?;
                if printed < limit {
                    seq.request_more();
                }
            }
            Completed::Exhausted { .. } => break,
            Completed::Failed(e) => anyhow::bail!("page fetch failed: {e}"),
            Completed::Cancelled => anyhow::bail!("page fetch was cancelled"),
            Completed::Stale { .. } => {}
        }
    }

    info!(
        "list: {printed} item(s), {} request(s) in {:.1}ms",
        seq.requests_issued(),
        started.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn cmd_libraries(client: &EagleClient) -> Result<()> {
    let current = client.current_library().unwrap_or_default();
    for lib in client.library_list()? {
        let mark = if lib.name == current { '*' } else { ' ' };
        println!("{mark} {}\t{}", lib.name, lib.path);
    }
    Ok(())
}

fn cmd_folders(client: &EagleClient) -> Result<()> {
    let tree = client.folder_list()?;
    for (depth, folder) in Folder::flatten(&tree) {
        println!("{}{}\t{}", "  ".repeat(depth), folder.name, folder.id);
    }
    Ok(())
}

fn cmd_switch(client: &EagleClient, config: &Config, name: &str) -> Result<()> {
    let message = client.switch_library(name)?;
    eprintln!("{message}");
    eprintln!("waiting for '{name}' to become active...");
    client.wait_for_library(
        name,
        config.library.switch_attempts,
        config.library.switch_poll_interval,
    )?;
    println!("{name}");
    Ok(())
}
