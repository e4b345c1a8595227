//! Chatwire Terminal Client
//!
//! Run with: cargo run --bin chatwire-client -- --user alice
//!
//! Reads lines from stdin and sends each as a chat message. Outgoing lines are
//! echoed with `<< `, received messages are printed with `>> `. Lines typed
//! while the server is unreachable are buffered and delivered on reconnect.
//! Blank or whitespace-only lines are not sent; empty-text messages from
//! other clients are still received and printed.
//!
//! # Configuration
//!
//! Loaded from `--config`, or the default locations, with `CHATWIRE_*`
//! environment overrides; command-line flags win over both.

use anyhow::Context;
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

use chatwire::client::{BridgedClient, ConnectionStatus, InboundHook, Supervisor};
use chatwire::config::Config;
use chatwire::message::{dispatch, Action, ActionHandler, Message, Notification};
use chatwire::transport::WsConnector;

#[derive(Parser)]
#[command(name = "chatwire-client")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Line-oriented chat client with automatic reconnection")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name to chat as
    #[arg(short, long)]
    user: Option<String>,

    /// Server base URL, e.g. ws://localhost:5555
    #[arg(long)]
    url: Option<String>,

    /// Token sent on connect
    #[arg(long)]
    token: Option<String>,

    /// Drive the client from a synchronous loop on a separate worker thread
    #[arg(long)]
    bridged: bool,
}

/// Renders messages and directives on the terminal
struct TerminalView {
    online: bool,
}

impl TerminalView {
    fn new() -> Self {
        Self { online: false }
    }

    fn render(&mut self, message: &Message) {
        if let Err(e) = dispatch(self, message) {
            tracing::warn!(error = %e, "Ignoring directive");
        }
    }

    /// Turn a status change into the matching connection directive
    fn status_changed(&mut self, status: ConnectionStatus) {
        let directive = match status {
            ConnectionStatus::Online if !self.online => Action::ConnectionEnable,
            ConnectionStatus::Offline if self.online => Action::ConnectionDisable,
            _ => return,
        };
        self.render(&directive.message(status.to_string()));
    }
}

impl ActionHandler for TerminalView {
    fn push_text(&mut self, message: &Message) {
        println!(">> {}", message);
    }

    fn clear_chat(&mut self, _message: &Message) {
        print!("\x1b[2J\x1b[H");
    }

    fn connection_disable(&mut self, _message: &Message) {
        self.online = false;
        println!("-- offline, messages will be sent after reconnecting --");
    }

    fn connection_enable(&mut self, _message: &Message) {
        self.online = true;
        println!("-- online --");
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    if let Some(user) = cli.user {
        config.client.user = user;
    }
    if let Some(url) = cli.url {
        config.client.url = url;
    }
    if let Some(token) = cli.token {
        config.client.token = token;
    }

    chatwire::logging::init(&config.logging)?;

    let supervisor_config = config.client.supervisor_config();
    tracing::info!(url = %supervisor_config.url, "Starting chat client");

    let user = config.client.user.clone();
    let (supervisor, client) = Supervisor::new(supervisor_config, Arc::new(WsConnector));
    let supervisor = supervisor.with_hook(trace_hook());

    if cli.bridged {
        let bridged = BridgedClient::spawn(supervisor, client)?;
        return run_bridged(bridged, &user);
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    runtime.block_on(async move {
        let worker = tokio::spawn(supervisor.run());
        let result = run_native(client, &user).await;
        worker.await.context("Supervisor task failed")??;
        result
    })
}

fn trace_hook() -> InboundHook {
    Arc::new(|message: &Message, notification: &Notification| match notification {
        Notification::Chat => tracing::trace!(sender = %message.sender, "Chat message"),
        Notification::Directive(action) => tracing::debug!(action = %action, "Directive"),
        Notification::Unknown(name) => tracing::debug!(action = %name, "Unknown directive"),
    })
}

enum Event {
    Line(Option<String>),
    Incoming(Message),
    Status(ConnectionStatus),
    Stopped,
}

async fn run_native(mut client: chatwire::ChatClient, user: &str) -> anyhow::Result<()> {
    let mut view = TerminalView::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = client.watch_state();

    loop {
        let event = tokio::select! {
            line = lines.next_line() => Event::Line(line?),
            incoming = client.arecv() => match incoming {
                Ok(message) => Event::Incoming(message),
                Err(_) => Event::Stopped,
            },
            changed = state.changed() => match changed {
                Ok(()) => Event::Status(state.borrow_and_update().status()),
                Err(_) => Event::Stopped,
            },
        };

        match event {
            Event::Line(Some(text)) => {
                if text.trim().is_empty() {
                    continue;
                }
                println!("<< {}", text);
                client.asend(Message::new(user, text)).await?;
            }
            Event::Line(None) | Event::Stopped => break,
            Event::Incoming(message) => view.render(&message),
            Event::Status(status) => view.status_changed(status),
        }
    }

    client.stop();
    Ok(())
}

fn run_bridged(mut client: BridgedClient, user: &str) -> anyhow::Result<()> {
    let (line_tx, line_rx) = std::sync::mpsc::channel::<String>();
    std::thread::Builder::new()
        .name("chatwire-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines().map_while(Result::ok) {
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to start stdin reader")?;

    let mut view = TerminalView::new();
    let mut last_status = client.status();

    loop {
        loop {
            match line_rx.try_recv() {
                Ok(text) if text.trim().is_empty() => {}
                Ok(text) => {
                    println!("<< {}", text);
                    client.send(Message::new(user, text))?;
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => break,
                Err(std::sync::mpsc::TryRecvError::Disconnected) => {
                    return client.join().map_err(Into::into);
                }
            }
        }

        while let Some(message) = client.recv() {
            view.render(&message);
        }

        let status = client.status();
        if status != last_status {
            view.status_changed(status);
            last_status = status;
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
