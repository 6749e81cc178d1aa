//! liquid - CLI tool for managing persisted Liquid event queues
//!
//! This tool provides commands for:
//! - Checking configuration and the queue persisted for a token
//! - Queueing an event and persisting it
//! - Flushing the persisted queue to the server
//! - Deleting the persisted queue (e.g. after logout)
//!
//! Uses XDG Base Directory specification for file locations:
//! - Queues: $XDG_DATA_HOME/liquid/queues/ (~/.local/share/liquid/queues/)
//! - Config: $XDG_CONFIG_HOME/liquid/config.toml (~/.config/liquid/config.toml)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use liquid_core::{Config, NetworkingManager, Payload, QueueStore};

#[derive(Parser)]
#[command(name = "liquid")]
#[command(about = "Manage persisted Liquid event queues")]
#[command(version)]
struct Args {
    /// Verbose output (writes a log file)
    #[arg(short, long)]
    verbose: bool,

    /// API token the queue belongs to
    #[arg(short, long, env = "LIQUID_TOKEN")]
    token: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show configuration and the persisted queue
    Status,

    /// Queue an event and persist it
    Enqueue {
        /// Endpoint relative to the server URL (or an absolute URL)
        #[arg(short, long)]
        endpoint: String,

        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        #[arg(short, long, default_value = "POST")]
        method: String,

        /// JSON object to send
        #[arg(short, long)]
        payload: String,
    },

    /// Send pending events once and persist what is left
    Flush,

    /// Delete the persisted queue
    Clear,

    /// GET an endpoint and print the response
    Fetch {
        #[arg(short, long)]
        endpoint: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = if args.verbose {
        Some(liquid_core::logging::init(&config.logging).context("failed to initialize logging")?)
    } else {
        None
    };

    match args.command {
        Command::Status => cmd_status(&config, &args.token),
        Command::Enqueue {
            endpoint,
            method,
            payload,
        } => cmd_enqueue(&config, &args.token, &endpoint, &method, &payload),
        Command::Flush => cmd_flush(&config, &args.token),
        Command::Clear => cmd_clear(&config, &args.token),
        Command::Fetch { endpoint } => cmd_fetch(&config, &args.token, &endpoint),
    }
}

fn cmd_status(config: &Config, token: &str) -> Result<()> {
    let networking = &config.networking;

    println!("Liquid Networking Configuration");
    println!("===============================");
    println!();
    println!("Server URL:      {}", networking.server_url);
    println!("Queue Limit:     {}", networking.queue_size_limit);
    println!("Flush Interval:  {}s", networking.flush_interval_secs);
    println!("Batch Size:      {}", networking.batch_size);
    println!("Timeout:         {}s", networking.timeout_secs);
    println!("User Agent:      {}", NetworkingManager::user_agent());

    let store = QueueStore::new(networking.resolved_queue_dir());
    println!();
    println!("Queue File:      {}", store.path_for(token).display());

    if !store.exists(token) {
        println!("Pending Events:  0 (no persisted queue)");
        return Ok(());
    }

    let events = store.unarchive(token);
    println!("Pending Events:  {}", events.len());
    if events.is_empty() {
        return Ok(());
    }

    println!();
    println!("{:<8} {:<40} {:>20}", "Method", "Endpoint", "Queued At");
    println!("{:-<70}", "");
    for event in &events {
        let endpoint = if event.endpoint().chars().count() > 38 {
            format!("{}...", event.endpoint().chars().take(35).collect::<String>())
        } else {
            event.endpoint().to_string()
        };
        println!(
            "{:<8} {:<40} {:>20}",
            event.method(),
            endpoint,
            event.enqueued_at().format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn cmd_enqueue(
    config: &Config,
    token: &str,
    endpoint: &str,
    method: &str,
    payload: &str,
) -> Result<()> {
    let payload: Payload = match serde_json::from_str(payload).context("payload is not valid JSON")? {
        serde_json::Value::Object(map) => map,
        _ => bail!("payload must be a JSON object"),
    };

    let manager = NetworkingManager::from_disk(token, &config.networking)
        .context("failed to create networking manager")?;
    manager
        .add_to_http_queue(payload, endpoint, method)
        .context("failed to queue event")?;
    manager.archive_queue().context("failed to persist queue")?;

    println!(
        "Queued {} {} ({} pending)",
        method.to_uppercase(),
        endpoint,
        manager.pending_count()
    );
    Ok(())
}

fn cmd_flush(config: &Config, token: &str) -> Result<()> {
    let manager = NetworkingManager::from_disk(token, &config.networking)
        .context("failed to create networking manager")?;

    if !manager.has_pending() {
        println!("No pending events to flush.");
        return Ok(());
    }

    println!("Flushing {} pending event(s)...", manager.pending_count());

    let report = manager.flush_blocking().context("flush failed")?;
    manager.archive_queue().context("failed to persist queue")?;

    println!();
    println!("Delivered:  {}", report.delivered);
    println!("Dropped:    {}", report.dropped);
    println!("Retained:   {}", report.retained);
    println!("Requests:   {}", report.requests);
    println!("Failures:   {}", report.failures);
    println!("Pending:    {}", manager.pending_count());

    Ok(())
}

fn cmd_clear(config: &Config, token: &str) -> Result<()> {
    let pending = NetworkingManager::unarchive_queue(token, &config.networking).len();
    NetworkingManager::delete_queue(token, &config.networking)
        .context("failed to delete queue")?;

    println!("Deleted persisted queue ({} event(s))", pending);
    Ok(())
}

fn cmd_fetch(config: &Config, token: &str, endpoint: &str) -> Result<()> {
    let manager = NetworkingManager::new(token, &config.networking)
        .context("failed to create networking manager")?;
    let response = manager
        .get_data_from_endpoint(endpoint)
        .with_context(|| format!("failed to fetch {}", endpoint))?;

    println!("Status: {}", response.status);
    println!("{}", String::from_utf8_lossy(&response.body));
    Ok(())
}
