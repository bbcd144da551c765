use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use futures_util::StreamExt;
use guestchat_embed::{ChatElement, HostEnvironment, WidgetBuilder};
use guestchat_protocol::{RegistrationField, RegistrationForm, WidgetEvent};
use guestchat_store::FileStorage;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "guestchatd")]
#[command(about = "Headless guestchat widget host")]
struct Cli {
    /// JSON file holding the global widget configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = ".guestchat")]
    storage: PathBuf,
    /// Pretend the host page is rendered on a mobile device.
    #[arg(long)]
    mobile: bool,
    #[arg(long, default_value = "https://localhost/")]
    url: String,
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let global = match &cli.config {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("config {} is not valid JSON", path.display()))?
        }
        None => Value::Object(Default::default()),
    };

    let mut element = WidgetBuilder::from_global(global)
        .context("invalid widget configuration")?
        .storage(Arc::new(FileStorage::new(&cli.storage)))
        .environment(HostEnvironment {
            url: cli.url.clone(),
            is_mobile: cli.mobile,
        })
        .mount()
        .context("failed to mount widget")?;
    info!(storage = %cli.storage.display(), "widget ready; commands: /open /close /register k=v.. /messages /quit");

    let mut events = element.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            if let WidgetEvent::ResponseReceived(detail) = event {
                println!("< {}", detail.message);
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let pending = element.instance().has_pending_work();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if !handle_line(&mut element, line.trim()) {
                    break;
                }
            }
            _ = element.instance_mut().process_next(), if pending => {}
        }
    }

    element.settle().await;
    printer.abort();
    if let Err(error) = printer.await
        && !error.is_cancelled()
    {
        warn!(%error, "event printer stopped");
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

/// Returns `false` when the session should end.
fn handle_line(element: &mut ChatElement, line: &str) -> bool {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("", _) => {}
        ("/quit", _) => return false,
        ("/open", _) => element.open(),
        ("/close", _) => element.close(),
        ("/register", rest) => {
            match parse_form(rest) {
                Ok(form) => println!("{:?}", element.register(&form)),
                Err(error) => warn!(%error, "registration form not submitted"),
            }
        }
        ("/messages", _) => {
            for line in element.view().transcript {
                println!("[{:?}] {}", line.sender, line.text);
            }
        }
        _ => {
            if let Some(request_id) = element.send_message(line) {
                println!("> {line} ({request_id})");
            }
        }
    }
    true
}

fn parse_form(raw: &str) -> Result<RegistrationForm> {
    let mut form = RegistrationForm::new();
    for pair in raw.split_whitespace() {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("expected key=value, got {pair}");
        };
        let field: RegistrationField = key
            .parse()
            .with_context(|| format!("unknown registration field {key}"))?;
        form.set(field, value);
    }
    Ok(form)
}
