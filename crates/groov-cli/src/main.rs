use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use groov_embed::{
    EmbedResolver, EmbedStatus, GroovConfig, LoggingHost, RouterParams, Style, TokenParams,
};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "groov", about = "Groov widget embed: resolves an embed URL and prints the view")]
struct Cli {
    /// Path to groov.toml (defaults to ./groov.toml, then ~/.config/groov/groov.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a fresh session id with a registrar, then look up the embed
    Router {
        /// Registrar endpoint; the session id is appended as a path segment
        #[arg(long)]
        endpoint: String,
        /// Header name carrying the registrar credential
        #[arg(long)]
        auth_header: String,
        /// Registrar credential
        #[arg(long)]
        auth_value: String,
        /// HTTP method for the registration call (any case)
        #[arg(long)]
        method: String,
        /// Frame style overrides as a JSON object
        #[arg(long)]
        frame_style: Option<String>,
    },
    /// Exchange an external user id for an embed via the token endpoint
    Token {
        #[arg(long)]
        external_user_id: String,
        #[arg(long)]
        auth_value: String,
        /// Frame style overrides as a JSON object
        #[arg(long)]
        frame_style: Option<String>,
    },
}

fn init_logging(json: bool) {
    // stdout carries the rendered view
    let builder = fmt()
        .with_env_filter(EnvFilter::from_env("GROOV_LOG"))
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn find_config(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let local = PathBuf::from("groov.toml");
    if local.exists() {
        return Ok(local);
    }
    if let Some(home) = dirs::home_dir() {
        let user = home.join(".config").join("groov").join("groov.toml");
        if user.exists() {
            return Ok(user);
        }
    }
    bail!("no groov.toml found; pass --config or create ./groov.toml")
}

fn parse_style(raw: Option<&str>) -> Result<Style> {
    match raw {
        None => Ok(Style::new()),
        Some(raw) => {
            let value: serde_json::Value =
                serde_json::from_str(raw).context("--frame-style is not valid JSON")?;
            Style::from_json(value).context("--frame-style must be a JSON object")
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config_path = find_config(cli.config)?;
    let config = GroovConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(config = %config_path.display(), "Loaded config");

    let resolver = EmbedResolver::from_config(&config)?;

    let activation = match cli.command {
        Command::Router {
            endpoint,
            auth_header,
            auth_value,
            method,
            frame_style,
        } => {
            let style = parse_style(frame_style.as_deref())?;
            resolver.activate_router(
                RouterParams {
                    registrar_endpoint: endpoint,
                    auth_header_name: auth_header,
                    auth_header_value: auth_value,
                    http_method: method,
                },
                style,
            )
        }
        Command::Token {
            external_user_id,
            auth_value,
            frame_style,
        } => {
            let style = parse_style(frame_style.as_deref())?;
            resolver.activate_token(
                TokenParams {
                    external_user_id,
                    auth_header_value: auth_value,
                },
                style,
            )
        }
    };

    let status = activation.wait().await;
    activation.render_into(&LoggingHost);

    println!("{}", serde_json::to_string_pretty(&activation.render())?);

    Ok(match status {
        EmbedStatus::Ready(_) => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
