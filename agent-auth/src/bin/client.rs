//! Agent Auth Client Binary
//!
//! Sends one protected request to another agent, or verifies a set of
//! inbound headers against the registry.

use agent_auth::{AgentAuth, AgentAuthConfig};
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::path::PathBuf;
use tracing::info;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "agent-auth-client", version, about = "Call another agent through the registry")]
struct Args {
    /// TOML config file; AUTHED_* environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target URL
    #[arg(long)]
    url: String,

    /// Target agent id
    #[arg(long, required_unless_present = "verify")]
    target: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra header, `name: value`; repeatable
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// JSON request body
    #[arg(short, long)]
    data: Option<String>,

    /// Verify the given headers instead of sending a request
    #[arg(long)]
    verify: bool,
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => AgentAuthConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => AgentAuthConfig::from_env().context("Failed to load config from environment")?,
    };
    let auth = AgentAuth::new(config);
    let headers = header_map(&args.headers)?;

    if args.verify {
        let verified = auth.verify_request(&args.method, &args.url, &headers).await?;
        println!("verified: {}", verified);
        return Ok(());
    }

    let target = args
        .target
        .as_deref()
        .ok_or_else(|| anyhow!("--target is required"))?;

    let mut headers = auth
        .protect_request(&args.method, &args.url, target, Some(&headers))
        .await?;

    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {}", args.method))?;
    let mut request = reqwest::Client::new().request(method, &args.url);
    if let Some(data) = args.data {
        headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static("application/json"));
        request = request.body(data);
    }

    info!(url = %args.url, target_agent_id = target, "Sending protected request");
    let response = request.headers(headers).send().await?;

    let status = response.status();
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    println!("{}", status);
    if is_json {
        let body: serde_json::Value = response.json().await?;
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("{}", response.text().await?);
    }

    Ok(())
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `name: value`, got `{}`", raw))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        map.append(
            HeaderName::from_bytes(name.as_bytes()).with_context(|| format!("Invalid header {}", name))?,
            HeaderValue::from_str(value).with_context(|| format!("Invalid value for {}", name))?,
        );
    }
    Ok(map)
}
