//! whatsapp-console - a console chat client for WhatsApp.
//!
//! Runs as an interactive shell or as one-shot commands (`send`, `list`).
//! The messaging session itself is held by a multi-device gateway that the
//! console reaches over HTTP or a Unix socket.

mod config;
mod format;
mod gateway;
mod jid;
mod protocol;
mod qr;
mod session;
mod shell;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gateway::{Backend, Messenger};
use session::Mode;
use shell::ListScope;
use std::io::Write;
use std::process::Command as ProcessCommand;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "whatsapp-console")]
#[command(author, version, about = "A console chat client for WhatsApp")]
#[command(long_about = "Send messages and list contacts and groups from the terminal.\n\nRun without a command for the interactive shell. The first start shows a QR code to link this client as a device.")]
struct Cli {
    /// Enable debug logging (same as WHATSAPP_DEBUG=1)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print results of one-shot commands as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message to a phone number or group
    Send {
        /// Phone number (491234567890), group ID or full address
        recipient: String,
        /// Message text; multiple words are joined with spaces
        #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },
    /// List contacts (first 20), all contacts, or joined groups
    List {
        /// "all" or "groups"
        #[arg(value_name = "SCOPE")]
        scope: Option<String>,
    },
    /// Show version and build information
    Version,
    /// Open configuration file in $EDITOR
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Version) => handle_version(),
        Some(Commands::Config) => handle_config(),
        Some(Commands::Send { recipient, message }) => {
            handle_send(&recipient, &message.join(" "), cli.json).await
        }
        Some(Commands::List { scope }) => {
            handle_list(ListScope::from_arg(scope.as_deref()), cli.json).await
        }
        None => handle_interactive().await,
    }
}

/// Initialize logging to stderr so stdout carries only results.
fn init_logging(verbose: bool) {
    let debug = verbose || std::env::var("WHATSAPP_DEBUG").is_ok_and(|v| v == "1");
    let level = if debug { "debug" } else { "warn" };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("whatsapp_console={},reqwest=warn", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print version and build information.
fn handle_version() -> Result<()> {
    println!("WhatsApp Console Client {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Commit: {}",
        option_env!("WHATSAPP_CONSOLE_COMMIT").unwrap_or("none")
    );
    println!(
        "Built: {}",
        option_env!("WHATSAPP_CONSOLE_BUILD_DATE").unwrap_or("unknown")
    );
    Ok(())
}

/// Handle the config command.
fn handle_config() -> Result<()> {
    let config_path = config::Config::config_path()?;

    // Create default config if it doesn't exist
    if !config_path.exists() {
        let default_config = config::Config::default();
        default_config.save()?;
        println!("Created default config at {}", config_path.display());
    }

    // Open in editor
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = ProcessCommand::new(&editor)
        .arg(&config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        eprintln!("Editor exited with non-zero status");
    }

    Ok(())
}

/// Load config and build the gateway backend.
fn open_backend() -> Result<(config::Config, Backend)> {
    let config = config::Config::load().context("Failed to load configuration")?;
    let backend = gateway::create_backend(&config.gateway)?;
    info!(
        "Using {} gateway at {}",
        backend.name(),
        backend.endpoint()
    );
    Ok((config, backend))
}

/// One-shot `send`.
async fn handle_send(recipient: &str, text: &str, json: bool) -> Result<()> {
    let (config, backend) = open_backend()?;
    let jid = jid::resolve_recipient(recipient)
        .with_context(|| format!("Invalid number or group ID '{}'", recipient))?;

    let mut progress = std::io::stderr();
    session::ensure_session(
        &backend,
        Mode::OneShotSend,
        config.preferences.connect_timeout(),
        &mut progress,
    )
    .await?;

    let result = backend.send_text(&jid, text).await;
    disconnect_quietly(&backend).await;
    let receipt = result.context("Failed to send message")?;

    if json {
        println!("{}", format::sent_json(&jid, text, &receipt)?);
    } else {
        println!("{}", format::sent(&jid, text));
    }
    Ok(())
}

/// One-shot `list`.
async fn handle_list(scope: ListScope, json: bool) -> Result<()> {
    let (config, backend) = open_backend()?;

    let mut progress = std::io::stderr();
    session::ensure_session(
        &backend,
        Mode::OneShot,
        config.preferences.connect_timeout(),
        &mut progress,
    )
    .await?;

    let output = match scope {
        ListScope::Groups => {
            let groups = backend.joined_groups().await;
            disconnect_quietly(&backend).await;
            let groups = groups.context("Failed to load groups")?;
            if json {
                format::groups_json(&groups)?
            } else {
                format::groups(&groups)
            }
        }
        ListScope::Top | ListScope::All => {
            let contacts = backend.contacts().await;
            disconnect_quietly(&backend).await;
            let contacts = contacts.context("Failed to load contacts")?;
            let limit = (scope == ListScope::Top).then_some(config.preferences.contact_limit);
            if json {
                format::contacts_json(&contacts, limit)?
            } else {
                format::contacts(&contacts, limit)
            }
        }
    };

    print!("{}", output);
    if json {
        println!();
    }
    Ok(())
}

/// Disconnect after a one-shot command; failures are only logged.
async fn disconnect_quietly(backend: &Backend) {
    if let Err(e) = backend.disconnect().await {
        warn!("disconnect failed: {:#}", e);
    }
}

/// Interactive shell with live events.
async fn handle_interactive() -> Result<()> {
    let (config, backend) = open_backend()?;

    let mut stdout = std::io::stdout();
    let connected = tokio::select! {
        result = session::ensure_session(
            &backend,
            Mode::Interactive,
            config.preferences.connect_timeout(),
            &mut stdout,
        ) => Some(result),
        _ = shutdown_signal() => None,
    };
    match connected {
        Some(result) => {
            result?;
        }
        None => {
            println!("\nShutting down...");
            return session::shutdown(&backend, &mut std::io::stdout()).await;
        }
    }

    let events = spawn_event_printer(backend.clone());

    let prompt = atty::is(atty::Stream::Stdin);
    let mut repl = shell::Shell::new(&backend, std::io::stdout(), config.preferences.contact_limit)
        .with_prompt(prompt);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());

    let interrupted = tokio::select! {
        result = repl.run(stdin) => {
            result?;
            false
        }
        _ = shutdown_signal() => true,
    };

    events.abort();
    if interrupted {
        println!("\nShutting down...");
        session::shutdown(&backend, &mut std::io::stdout()).await?;
        // The blocking stdin read cannot be cancelled; don't wait for it.
        std::process::exit(0);
    } else {
        disconnect_quietly(&backend).await;
    }
    std::io::stdout().flush()?;
    Ok(())
}

/// Print incoming messages and read receipts while the shell runs.
fn spawn_event_printer(backend: Backend) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let events = match backend.events().await {
            Ok(events) => events,
            Err(e) => {
                warn!("live events unavailable: {:#}", e);
                return;
            }
        };

        let mut stdout = std::io::stdout();
        if let Err(e) = shell::print_events(events, &mut stdout).await {
            warn!("event printer stopped: {:#}", e);
        }
    })
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
