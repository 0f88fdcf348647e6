use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, KeyCode, KeyEvent, KeyTarget, LoadOutcome, Modifiers, PanelStats, ResultView,
    SearchClient, SearchPanel, ViewCommand, ViewStatus,
};
use futures::StreamExt;
use shared::domain::{SortMode, WatchState};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docsearch", about = "Terminal front end for the document search backend")]
struct Args {
    /// Overrides `backend_url` from client.toml / BACKEND_URL.
    #[arg(long)]
    backend_url: Option<String>,
    #[arg(long)]
    page_size: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List documents, or search them when a query or tag is given.
    Search {
        #[arg(default_value = "")]
        query: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value = "relevance")]
        sort: SortMode,
        /// Pages to load before printing.
        #[arg(long, default_value_t = 1)]
        pages: usize,
        /// Key codes replayed against the result list, e.g. `ArrowDown,KeyJ,Enter`.
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,
    },
    /// Print watched folders and their indexing jobs.
    Watches {
        #[arg(long)]
        follow: bool,
    },
    AddWatch {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    DeleteWatch { path: PathBuf },
    /// Suggest folders to watch on first run.
    Recommend {
        #[arg(long)]
        accept: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.backend_url {
        settings.backend_url = url;
    }
    if let Some(page_size) = args.page_size {
        settings.page_size = page_size.max(1);
    }

    let client = SearchClient::connect(&settings)
        .with_context(|| format!("failed to configure backend {}", settings.backend_url))?;

    let result = match args.command {
        Command::Search {
            query,
            tags,
            sort,
            pages,
            keys,
        } => run_search(&client, &query, &tags, sort, pages, &keys).await,
        Command::Watches { follow } => run_watches(&client, follow).await,
        Command::AddWatch { paths } => run_add_watches(&client, &paths).await,
        Command::DeleteWatch { path } => client
            .actions()
            .delete_watch(&path)
            .await
            .with_context(|| format!("failed to delete watch {}", path.display())),
        Command::Recommend { accept } => run_recommend(&client, accept).await,
    };

    client.shutdown();
    result
}

async fn run_search(
    client: &SearchClient,
    query: &str,
    tags: &[String],
    sort: SortMode,
    pages: usize,
    keys: &[String],
) -> Result<()> {
    let mut panel = client.search_panel();
    panel.set_query(query);
    for tag in tags {
        panel.add_tag(tag);
    }
    panel.set_sort(sort);
    panel.drain_commands();

    if let LoadOutcome::Failed(err) = panel.load_first().await {
        return Err(err).context("failed to load results");
    }
    for _ in 1..pages {
        match panel.on_end_reached().await {
            LoadOutcome::Exhausted => break,
            LoadOutcome::Failed(err) => return Err(err).context("failed to load more results"),
            _ => {}
        }
    }

    let view = panel.view();
    print_view(&view, panel.stats());

    for key in keys {
        let event = parse_key(&panel, key);
        let outcome = panel.handle_key(event);
        if !outcome.consumed {
            println!("{key}: not handled");
        }
        for command in panel.drain_commands() {
            perform(client, &panel, command).await?;
        }
    }
    Ok(())
}

/// `Ctrl+KeyN` style specs. Keys go to the search input while nothing is selected.
fn parse_key(panel: &SearchPanel, spec: &str) -> KeyEvent {
    let (modifiers, code) = match spec.strip_prefix("Ctrl+") {
        Some(code) => (Modifiers::CTRL, code),
        None => (Modifiers::NONE, spec),
    };
    let target = if panel.state().selection().is_selected() {
        KeyTarget::Other
    } else {
        KeyTarget::TextInput
    };
    KeyEvent::new(KeyCode::from_code(code.trim()), modifiers, target)
}

fn print_view(view: &ResultView, stats: PanelStats) {
    match &view.status {
        ViewStatus::Empty => {
            println!("No documents.");
            return;
        }
        ViewStatus::Error(message) => {
            println!("Error: {message}");
            return;
        }
        _ => {}
    }
    let sort = if stats.show_sort {
        format!(" (sorted by {})", view.signature.sort().as_str())
    } else {
        String::new()
    };
    println!("{} of {} documents{sort}", view.items.len(), stats.count);
    for (index, item) in view.items.iter().enumerate() {
        println!("{index:>4}  {}  {}", item.display_title(), item.path.display());
        if let Some(highlight) = item.highlight.as_deref().filter(|h| !h.is_empty()) {
            println!("      {highlight}");
        }
    }
    if view.has_more {
        println!("(more available)");
    }
}

async fn perform(client: &SearchClient, panel: &SearchPanel, command: ViewCommand) -> Result<()> {
    match command {
        ViewCommand::FocusInput => println!("-> search input focused"),
        ViewCommand::BlurInput => {}
        ViewCommand::ScrollIntoView { index, align } => {
            let title = panel
                .pager()
                .item(index)
                .map(|item| item.display_title())
                .unwrap_or_default();
            println!("-> [{index}] {title} ({align:?})");
        }
        ViewCommand::ScrollToTop => println!("-> scrolled to top"),
        ViewCommand::OpenFile { path } => println!("open {}", path.display()),
        ViewCommand::OpenContainingFolder { path } => {
            let folder = client
                .actions()
                .containing_folder(&path)
                .await
                .with_context(|| format!("failed to resolve folder of {}", path.display()))?;
            println!("open {}", folder.display());
        }
        ViewCommand::CopyToClipboard { text } => println!("copied {text}"),
    }
    Ok(())
}

fn print_watch_state(state: &WatchState) {
    if state.watches.is_empty() {
        println!("No watched folders.");
        return;
    }
    for watch in &state.watches {
        let job = state
            .job_report_for(watch.id)
            .map(|report| {
                format!(
                    "  {:?} {:?} {}/{}",
                    report.job_type, report.status, report.progress.done, report.progress.total
                )
            })
            .unwrap_or_default();
        println!(
            "{}  {:?}  {} documents{job}",
            watch.path.display(),
            watch.status,
            watch.document_count
        );
    }
}

async fn run_watches(client: &SearchClient, follow: bool) -> Result<()> {
    if !follow {
        let mut rx = client.watches().subscribe();
        // The snapshot may fail; fall back to whatever is published by then.
        let _ = tokio::time::timeout(Duration::from_secs(3), rx.changed()).await;
        print_watch_state(&client.watches().current());
        return Ok(());
    }

    let mut updates = client.watches().updates();
    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(state) => {
                    println!("---");
                    print_watch_state(&state);
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

async fn run_add_watches(client: &SearchClient, paths: &[PathBuf]) -> Result<()> {
    let results = client.actions().add_watches(paths).await;
    let mut failed = 0;
    for (path, result) in paths.iter().zip(results) {
        match result {
            Ok(watch) => println!("watching {} (id {})", watch.path.display(), watch.id.0),
            Err(err) => {
                failed += 1;
                println!("{}: {err} [watches.errors.{}]", path.display(), err.as_str());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} watches could not be added", paths.len());
    }
    Ok(())
}

async fn run_recommend(client: &SearchClient, accept: bool) -> Result<()> {
    let recommendations = client
        .actions()
        .load_recommendations()
        .await
        .context("failed to load recommendations")?;
    if recommendations.is_empty() {
        println!("No recommendations.");
        return Ok(());
    }
    for recommendation in &recommendations {
        println!("{:?}  {}", recommendation.kind, recommendation.path.display());
    }
    if accept {
        let paths: Vec<PathBuf> = recommendations.iter().map(|r| r.path.clone()).collect();
        run_add_watches(client, &paths).await?;
    }
    Ok(())
}
