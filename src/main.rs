use std::fs;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use notify::{Error as NotifyError, Event as NotifyEvent, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use menubind::config::CONFIG_ENV_VAR;
use menubind::dom::{self, RawDom, SelectorDom};
use menubind::steps::{run_steps, Step};
use menubind::telemetry::{DropdownObserver, FanoutObserver, JsonLinesObserver, TracingObserver};
use menubind::{BootstrapDropdowns, DropdownConfig, DropdownController, Page};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DomChoice {
    Raw,
    Selector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FrameworkChoice {
    None,
    Bootstrap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventFormat {
    Text,
    Json,
}

/// Bind dropdown behaviour to an HTML page and drive it from the command line.
#[derive(Debug, Parser)]
#[command(name = "menubind", version)]
struct Cli {
    /// HTML file to load
    page: PathBuf,

    /// Dropdown configuration (YAML). Falls back to MENUBIND_CONFIG, then the
    /// user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = DomChoice::Raw)]
    dom: DomChoice,

    #[arg(long, value_enum, default_value_t = FrameworkChoice::None)]
    framework: FrameworkChoice,

    /// click:<css>, wait:<ms>, reinit or dispose; repeatable
    #[arg(long = "step")]
    steps: Vec<Step>,

    #[arg(long, value_enum, default_value_t = EventFormat::Text)]
    events: EventFormat,

    /// Print the document after the steps have run
    #[arg(long)]
    print_html: bool,

    /// Start the page in the loading state and finish loading after install
    #[arg(long)]
    loading: bool,

    /// Re-run whenever the page file changes
    #[arg(long)]
    watch: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let subscriber_result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
    if subscriber_result.is_err() {
        // tracing was already initialised; continue silently
    }

    let cli = Cli::parse();

    let config_path =
        DropdownConfig::resolve_path(cli.config.clone(), std::env::var(CONFIG_ENV_VAR).ok());
    if let Some(path) = &config_path {
        info!(config = %path.display(), exists = path.exists(), "dropdown configuration");
    }
    let config =
        DropdownConfig::load(config_path).context("failed to load dropdown configuration")?;

    run_once(&cli, &config).await?;

    if cli.watch {
        watch(&cli, &config).await?;
    }
    Ok(())
}

async fn run_once(cli: &Cli, config: &DropdownConfig) -> Result<()> {
    let html = fs::read_to_string(&cli.page)
        .with_context(|| format!("failed to read {}", cli.page.display()))?;
    let page = if cli.loading {
        Page::parse_loading(&html)
    } else {
        Page::parse(&html)
    };

    let observer: Rc<dyn DropdownObserver> = match cli.events {
        EventFormat::Text => Rc::new(TracingObserver),
        EventFormat::Json => Rc::new(FanoutObserver::new(vec![
            Rc::new(TracingObserver) as Rc<dyn DropdownObserver>,
            Rc::new(JsonLinesObserver::new(io::stdout())),
        ])),
    };

    let mut builder = DropdownController::builder(&page)
        .config(config.clone())
        .observer(observer);
    builder = match cli.dom {
        DomChoice::Raw => builder.dom_backend(RawDom::new()),
        DomChoice::Selector => builder.dom_backend(SelectorDom::new()),
    };
    if cli.framework == FrameworkChoice::Bootstrap {
        builder = builder.framework(BootstrapDropdowns::new());
    }
    let controller = builder.install();

    if cli.loading {
        page.finish_loading();
    }

    run_steps(&controller, &cli.steps)
        .await
        .context("failed to run steps")?;
    page.settle().await;

    let expanded_attribute = &config.markers.expanded_attribute;
    for trigger in controller.bound_triggers() {
        let strategy = controller
            .strategy_of(&trigger)
            .map(|strategy| strategy.to_string())
            .unwrap_or_default();
        let expanded = dom::attribute(&trigger, expanded_attribute).as_deref() == Some("true");
        let shown = controller.is_open(&trigger).unwrap_or(false);
        println!(
            "{}\t{}\texpanded={}\tshown={}",
            dom::describe(&trigger),
            strategy,
            expanded,
            shown
        );
    }

    if cli.print_html {
        println!("{}", page.to_html());
    }

    controller.dispose();
    page.clear();
    Ok(())
}

async fn watch(cli: &Cli, config: &DropdownConfig) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |event: Result<NotifyEvent, NotifyError>| {
        let _ = tx.send(event);
    })
    .context("failed to create file watcher")?;
    watcher
        .watch(&cli.page, RecursiveMode::NonRecursive)
        .with_context(|| format!("failed to watch {}", cli.page.display()))?;
    info!(page = %cli.page.display(), "watching for changes");

    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                if let Err(err) = run_once(cli, config).await {
                    warn!(error = %format!("{err:#}"), "re-run failed");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(error = %err, "file watcher error"),
        }
    }
    Ok(())
}
