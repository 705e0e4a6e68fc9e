use anyhow::{bail, Context};
use clap::Parser;
use listing_autofill::autofill::TracingSink;
use listing_autofill::core::BrowserTrait;
use listing_autofill::{
    Automator, ChromeBrowser, Config, JsonFileValueStore, MemoryDocument, Page, PageDocument,
    RunReport, TriggerCommand,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Fill the identifier and price fields of a listing form.
#[derive(Debug, Parser)]
#[command(name = "autofill", version)]
struct Args {
    /// Page to open in Chrome
    #[arg(long)]
    url: Option<String>,

    /// JSON object holding the listing values
    #[arg(long)]
    values: PathBuf,

    /// JSON config file; every key is optional
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Dry run against a saved HTML file instead of a browser
    #[arg(long, conflicts_with = "url")]
    html: Option<PathBuf>,

    /// Wait for `fill` / `quit` lines on stdin instead of running once
    #[arg(long)]
    wait_for_trigger: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    if args.headful {
        config.browser.headless = false;
    }

    let values = Arc::new(JsonFileValueStore::new(&args.values));
    let sink = Arc::new(TracingSink);

    let reports = if let Some(html_path) = &args.html {
        let html = tokio::fs::read_to_string(html_path)
            .await
            .with_context(|| format!("reading {}", html_path.display()))?;
        let page = Arc::new(MemoryDocument::new(html));
        let automator = Automator::new(page, config, values, sink)?;
        drive(&automator, None, args.wait_for_trigger).await?
    } else {
        let Some(url) = args.url.clone() else {
            bail!("either --url or --html is required");
        };

        let mut browser = ChromeBrowser::new();
        browser.launch(&config).await.context("launching chrome")?;
        let browser = Arc::new(browser);
        let tab = browser.new_tab().await?;
        let page = Arc::new(PageDocument::new(
            browser.clone(),
            tab,
            Duration::from_millis(config.browser.script_timeout_ms),
        ));
        page.navigate(&url)
            .await
            .with_context(|| format!("opening {}", url))?;
        let loaded_url = page.current_url().await?;
        info!(url = %loaded_url, "page opened");

        let automator = Automator::new(page.clone(), config, values, sink)?;
        let outcome = drive(&automator, Some(loaded_url), args.wait_for_trigger).await;
        if let Err(err) = page.close().await {
            warn!(error = %err, "chrome did not shut down cleanly");
        }
        outcome?
    };

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

async fn drive<P: Page + ?Sized + 'static>(
    automator: &Automator<P>,
    loaded_url: Option<String>,
    wait_for_trigger: bool,
) -> anyhow::Result<Vec<RunReport>> {
    if !wait_for_trigger {
        let report = automator.trigger().await.context("automation run")?;
        return Ok(vec![report]);
    }

    let (tx, rx) = mpsc::channel(16);
    if let Some(url) = loaded_url {
        tx.send(TriggerCommand::PageLoaded(url)).await?;
    }
    tokio::spawn(read_commands(tx));
    info!("waiting for commands: fill, quit");
    Ok(automator.serve(rx).await)
}

async fn read_commands(tx: mpsc::Sender<TriggerCommand>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let command = match lines.next_line().await {
            Ok(Some(line)) => match line.trim() {
                "fill" => TriggerCommand::Fill,
                "quit" | "exit" => TriggerCommand::Shutdown,
                "" => continue,
                other => {
                    warn!(command = other, "unknown command");
                    continue;
                }
            },
            Ok(None) => TriggerCommand::Shutdown,
            Err(err) => {
                warn!(error = %err, "stdin closed");
                TriggerCommand::Shutdown
            }
        };
        let done = command == TriggerCommand::Shutdown;
        if tx.send(command).await.is_err() || done {
            break;
        }
    }
}
