//! Tailscope - terminal event tail for a deployment
//!
//! Usage:
//!   TAILSCOPE_TOKEN=... tailscope https://my-app.example.cloud
//!   tailscope https://my-app.example.cloud --token ... --category mutation --hide-successes
//!
//! New events print the current window as they arrive. Type `help` on stdin
//! for interactive commands.

mod commands;
mod render;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{Instrument, info, info_span};

use tailscope_core::{AuthToken, Event, EventCategory};
use tailscope_engine::{
    ActiveView, CategoryFilter, EngineConfig, EngineHandle, FilterExpression, PanelState, Preset,
    TailEngine, TailObserver, Viewport,
};
use tailscope_logging::{FileConfig, LogConfig, TailscopeSubscriberBuilder, spans};
use tailscope_transport::{HttpTransport, HttpTransportConfig};

use crate::commands::{HELP, Input, parse_input};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "tailscope")]
#[command(about = "Tail function logs and network calls from a deployment")]
struct Args {
    /// Deployment base URL
    #[arg(env = "TAILSCOPE_URL")]
    url: String,

    /// Bearer token for the deployment
    #[arg(long, env = "TAILSCOPE_TOKEN", hide_env_values = true)]
    token: String,

    /// Polling preset (default, realtime, background)
    #[arg(long, default_value = "default", value_parser = parse_preset)]
    preset: Preset,

    /// Delay between polls in milliseconds (overrides the preset)
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Maximum events kept in memory (overrides the preset)
    #[arg(long)]
    max_stored_logs: Option<usize>,

    /// Consecutive failures before polling stops
    #[arg(long, default_value_t = tailscope_engine::DEFAULT_FAILURE_THRESHOLD)]
    failure_threshold: u32,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Rows in the printed window
    #[arg(long, default_value_t = 20)]
    rows: usize,

    /// Initial free-text search
    #[arg(long)]
    search: Option<String>,

    /// Only show these categories (repeatable)
    #[arg(long = "category", value_parser = parse_category)]
    categories: Vec<EventCategory>,

    /// Only show events of this request id
    #[arg(long)]
    request_id: Option<String>,

    /// Hide successful events
    #[arg(long)]
    hide_successes: bool,

    /// Start on the network view instead of logs
    #[arg(long)]
    network: bool,

    /// Start paused
    #[arg(long)]
    paused: bool,

    /// Human-readable log output instead of JSONL
    #[arg(long)]
    pretty: bool,

    /// Default log level (RUST_LOG takes precedence)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Also write JSONL logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn parse_category(s: &str) -> Result<EventCategory, String> {
    s.parse()
}

fn parse_preset(s: &str) -> Result<Preset, String> {
    match s.to_ascii_lowercase().as_str() {
        "default" => Ok(Preset::Default),
        "realtime" => Ok(Preset::Realtime),
        "background" => Ok(Preset::Background),
        other => Err(format!("unknown preset: {}", other)),
    }
}

impl Args {
    fn filter(&self) -> FilterExpression {
        let mut filter = FilterExpression::new().with_show_successes(!self.hide_successes);
        if !self.categories.is_empty() {
            filter = filter.with_categories(CategoryFilter::only(self.categories.iter().copied()));
        }
        if let Some(id) = &self.request_id {
            filter = filter.with_correlation_id(id.clone());
        }
        if let Some(search) = &self.search {
            filter = filter.with_search(search.clone());
        }
        filter
    }

    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::from_preset(self.preset)
            .with_failure_threshold(self.failure_threshold)
            .with_initial_filter(self.filter())
            .with_start_live(!self.paused)
            .with_source_label(self.url.clone());
        if let Some(ms) = self.interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if let Some(capacity) = self.max_stored_logs {
            config = config.with_max_stored_logs(capacity);
        }
        config
    }

    fn log_config(&self) -> LogConfig {
        let mut config = if self.pretty {
            LogConfig::development()
        } else {
            LogConfig::default()
        };
        config.default_level = self.log_level.clone();
        config.file = self.log_dir.as_ref().map(|dir| FileConfig {
            directory: dir.clone(),
            ..FileConfig::default()
        });
        config
    }
}

/// Forwards engine callbacks to the terminal loop
struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notice>,
}

enum Notice {
    Landed(usize),
    FetchError(String),
}

impl TailObserver for ChannelObserver {
    fn on_batch(&self, events: &[Event]) {
        if !events.is_empty() {
            let _ = self.tx.send(Notice::Landed(events.len()));
        }
    }

    fn on_fetch_error(&self, message: &str) {
        let _ = self.tx.send(Notice::FetchError(message.to_string()));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = TailscopeSubscriberBuilder::new()
        .with_config(args.log_config())
        .init();

    let transport = HttpTransport::new(
        HttpTransportConfig::new(&args.url).with_request_timeout(Duration::from_secs(args.timeout_secs)),
    )
    .context("invalid transport settings")?;

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let panel = PanelState {
        active_view: if args.network { ActiveView::Network } else { ActiveView::Logs },
        filter: args.filter(),
        ..Default::default()
    };

    let (handle, join) = TailEngine::builder(Arc::new(transport))
        .auth_token(AuthToken::new(args.token.clone()))
        .config(args.engine_config())
        .panel_state(panel)
        .observer(Arc::new(ChannelObserver { tx: notice_tx }))
        .viewport(Viewport::new(0, args.rows))
        .spawn()
        .context("failed to start engine")?;

    let session = info_span!(spans::SESSION, url = %args.url);
    run_terminal(handle.clone(), notice_rx, args.rows)
        .instrument(session)
        .await?;

    handle.shutdown();
    join.await.context("engine task panicked")?;
    Ok(())
}

async fn run_terminal(
    handle: EngineHandle,
    mut notices: mpsc::UnboundedReceiver<Notice>,
    page: usize,
) -> Result<()> {
    info!("Tailing started");
    println!("{}", render::format_status(&handle.status()));
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }

            notice = notices.recv() => {
                match notice {
                    Some(Notice::Landed(count)) => {
                        if handle.status().live {
                            print_window(&handle).await?;
                        } else {
                            println!("{} new event(s) while paused", count);
                        }
                    }
                    Some(Notice::FetchError(message)) => {
                        let status = handle.status();
                        if let Some(reason) = status.trip_reason {
                            eprintln!("polling disabled ({}): {}. type `retry`", reason, message);
                        }
                    }
                    None => break,
                }
            }

            line = lines.next_line(), if stdin_open => {
                let Some(line) = line.context("failed to read stdin")? else {
                    stdin_open = false;
                    continue;
                };
                if !apply_input(&handle, &line, page).await? {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Returns false when the operator asked to quit
async fn apply_input(handle: &EngineHandle, line: &str, page: usize) -> Result<bool> {
    let Some(input) = parse_input(line) else {
        println!("unknown command, type `help`");
        return Ok(true);
    };

    let status = handle.status();
    match input {
        Input::Refresh => handle.refresh()?,
        Input::TogglePause => {
            let live = !status.live;
            handle.set_live(live)?;
            println!("{}", if live { "live" } else { "paused" });
        }
        Input::Retry => handle.retry_connection()?,
        Input::Search(text) => {
            handle.set_filter(status.panel.filter.clone().with_search(text))?;
            print_window(handle).await?;
        }
        Input::RequestId(id) => {
            let mut filter = status.panel.filter.clone();
            filter.correlation_id = (!id.is_empty()).then_some(id);
            handle.set_filter(filter)?;
            print_window(handle).await?;
        }
        Input::ToggleSuccesses => {
            let filter = status.panel.filter.clone();
            let show = !filter.show_successes;
            handle.set_filter(filter.with_show_successes(show))?;
            print_window(handle).await?;
        }
        Input::ToggleView => {
            let view = match status.panel.active_view {
                ActiveView::Logs => ActiveView::Network,
                ActiveView::Network => ActiveView::Logs,
            };
            handle.set_active_view(view)?;
            print_window(handle).await?;
        }
        Input::Window => print_window(handle).await?,
        Input::ScrollDown => {
            handle.scroll_to(status.viewport.offset + page)?;
            print_window(handle).await?;
        }
        Input::ScrollUp => {
            handle.scroll_to(status.viewport.offset.saturating_sub(page))?;
            print_window(handle).await?;
        }
        Input::Top => {
            handle.scroll_to(0)?;
            print_window(handle).await?;
        }
        Input::Status => println!("{}", render::format_status(&status)),
        Input::Clear => handle.clear()?,
        Input::Help => println!("{}", HELP),
        Input::Quit => return Ok(false),
    }
    Ok(true)
}

async fn print_window(handle: &EngineHandle) -> Result<()> {
    let projection = handle.project().await?;
    let status = handle.status();
    println!("{}", render::format_window(&projection, &status));
    Ok(())
}
