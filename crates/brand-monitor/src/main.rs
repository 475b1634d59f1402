//! Brand monitor CLI - mention sentiment and NPS over a time window.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use brand_monitor::config::{
    parse_provider_list, AwsConfig, GoogleConfig, ProviderKind, TwitterConfig,
    AWS_ACCESS_KEY_ID_ENV, AWS_NEGATIVE_THRESHOLD_ENV, AWS_POSITIVE_THRESHOLD_ENV, AWS_REGION_ENV,
    AWS_SECRET_ACCESS_KEY_ENV, AWS_SESSION_TOKEN_ENV, GOOGLE_API_KEY_ENV,
    GOOGLE_NEGATIVE_THRESHOLD_ENV, GOOGLE_POSITIVE_THRESHOLD_ENV, TWITTER_BEARER_TOKEN_ENV,
};
use brand_monitor::pipeline::{default_lookback, Pipeline, PipelineConfig, TimeWindow};
use brand_monitor::report::{self, DEFAULT_REPORT_DIR};
use brand_monitor::sentiment::ProviderConfig;
use brand_monitor::twitter::TwitterClient;
use brand_monitor::NpsResult;

/// Brand monitor CLI - Score Twitter/X mentions with sentiment providers.
#[derive(Parser)]
#[command(name = "brand-monitor")]
#[command(about = "Twitter/X mention sentiment and NPS pipeline")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute the NPS of an account's mentions over a time window
    Nps(NpsArgs),

    /// Resolve a username to its numeric user id
    UserId {
        /// Username, with or without a leading @
        username: String,

        /// Twitter API v2 bearer token
        #[arg(long, env = TWITTER_BEARER_TOKEN_ENV, hide_env_values = true)]
        bearer_token: Option<String>,
    },
}

#[derive(Args)]
pub struct NpsArgs {
    /// Numeric id of the mentioned account
    #[arg(long, conflicts_with = "username", required_unless_present = "username")]
    user_id: Option<String>,

    /// Username of the mentioned account (resolved to an id first)
    #[arg(long)]
    username: Option<String>,

    /// Window start (Unix seconds or RFC 3339)
    #[arg(long, value_parser = parse_time)]
    start_time: DateTime<Utc>,

    /// Window end (Unix seconds or RFC 3339)
    #[arg(long, value_parser = parse_time)]
    end_time: DateTime<Utc>,

    /// Mentions requested per page (5-100)
    #[arg(long, default_value = "100")]
    max_results: u32,

    /// Comma-separated sentiment providers (aws, google)
    #[arg(long, default_value = "aws")]
    providers: String,

    /// Write a per-mention CSV report
    #[arg(long)]
    csv: bool,

    /// Directory for CSV reports
    #[arg(long, default_value = DEFAULT_REPORT_DIR)]
    report_dir: PathBuf,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    thresholds: ThresholdArgs,
}

#[derive(Args)]
pub struct CredentialArgs {
    /// Twitter API v2 bearer token
    #[arg(long, env = TWITTER_BEARER_TOKEN_ENV, hide_env_values = true)]
    bearer_token: Option<String>,

    /// AWS Comprehend region
    #[arg(long, env = AWS_REGION_ENV)]
    aws_region: Option<String>,

    /// AWS access key id
    #[arg(long, env = AWS_ACCESS_KEY_ID_ENV, hide_env_values = true)]
    aws_access_key_id: Option<String>,

    /// AWS secret access key
    #[arg(long, env = AWS_SECRET_ACCESS_KEY_ENV, hide_env_values = true)]
    aws_secret_access_key: Option<String>,

    /// AWS STS session token
    #[arg(long, env = AWS_SESSION_TOKEN_ENV, hide_env_values = true)]
    aws_session_token: Option<String>,

    /// Google Cloud Natural Language API key
    #[arg(long, env = GOOGLE_API_KEY_ENV, hide_env_values = true)]
    google_api_key: Option<String>,
}

#[derive(Args)]
pub struct ThresholdArgs {
    /// Minimum POSITIVE confidence for an AWS promoter (0-1)
    #[arg(long, env = AWS_POSITIVE_THRESHOLD_ENV)]
    aws_positive_threshold: Option<f64>,

    /// Minimum NEGATIVE confidence for an AWS detractor (0-1)
    #[arg(long, env = AWS_NEGATIVE_THRESHOLD_ENV)]
    aws_negative_threshold: Option<f64>,

    /// Polarity above which a Google result is a promoter
    #[arg(long, env = GOOGLE_POSITIVE_THRESHOLD_ENV, allow_hyphen_values = true)]
    google_positive_threshold: Option<f64>,

    /// Polarity below which a Google result is a detractor
    #[arg(long, env = GOOGLE_NEGATIVE_THRESHOLD_ENV, allow_hyphen_values = true)]
    google_negative_threshold: Option<f64>,
}

impl NpsArgs {
    /// Value resolved by clap for the setting named by its environment variable.
    fn setting(&self, name: &str) -> Option<String> {
        let credentials = &self.credentials;
        let thresholds = &self.thresholds;
        match name {
            TWITTER_BEARER_TOKEN_ENV => credentials.bearer_token.clone(),
            AWS_REGION_ENV => credentials.aws_region.clone(),
            AWS_ACCESS_KEY_ID_ENV => credentials.aws_access_key_id.clone(),
            AWS_SECRET_ACCESS_KEY_ENV => credentials.aws_secret_access_key.clone(),
            AWS_SESSION_TOKEN_ENV => credentials.aws_session_token.clone(),
            GOOGLE_API_KEY_ENV => credentials.google_api_key.clone(),
            AWS_POSITIVE_THRESHOLD_ENV => thresholds.aws_positive_threshold.map(|v| v.to_string()),
            AWS_NEGATIVE_THRESHOLD_ENV => thresholds.aws_negative_threshold.map(|v| v.to_string()),
            GOOGLE_POSITIVE_THRESHOLD_ENV => {
                thresholds.google_positive_threshold.map(|v| v.to_string())
            }
            GOOGLE_NEGATIVE_THRESHOLD_ENV => {
                thresholds.google_negative_threshold.map(|v| v.to_string())
            }
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("brand_monitor=debug,info")
    } else {
        EnvFilter::new("brand_monitor=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Nps(args) => {
            tracing::info!(
                user_id = ?args.user_id,
                username = ?args.username,
                start = %args.start_time,
                end = %args.end_time,
                providers = %args.providers,
                "Starting NPS run"
            );
            run_nps(args).await
        }
        Commands::UserId {
            username,
            bearer_token,
        } => run_user_id(&username, bearer_token).await,
    }
}

async fn run_nps(args: NpsArgs) -> Result<()> {
    let kinds = parse_provider_list(&args.providers)?;
    let providers = kinds
        .iter()
        .map(|kind| build_provider(*kind, |name| args.setting(name)))
        .collect::<Result<Vec<_>>>()?;

    let client = twitter_client(args.credentials.bearer_token.as_deref())?;
    let target_id = match (args.user_id, args.username) {
        (Some(id), _) => id,
        (None, Some(username)) => {
            let user = client
                .lookup_user(&username)
                .await
                .with_context(|| format!("Failed to resolve username {username}"))?;
            tracing::info!(username = %user.username, id = %user.id, "Resolved username");
            user.id
        }
        (None, None) => anyhow::bail!("Either --user-id or --username is required"),
    };

    let config = PipelineConfig {
        target_id: target_id.clone(),
        max_results: args.max_results,
        lookback: default_lookback(),
    };
    let window = TimeWindow::new(args.start_time, args.end_time);
    let pipeline = Pipeline::new(config, Arc::new(client), providers);
    let report = pipeline.run(&window).await?;

    let report_path = if args.csv {
        Some(report::write_report(&args.report_dir, &report.state, Utc::now())?)
    } else {
        None
    };

    if args.json {
        let output = serde_json::json!({
            "targetId": target_id,
            "startTime": window.start,
            "endTime": window.end,
            "pages": report.state.pages(),
            "totalDocuments": report.state.total_document_count(),
            "nps": report.nps,
            "report": report_path,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "\n{} {} ({} .. {})",
        "NPS for".bold(),
        target_id.as_str().bold().cyan(),
        window.start.to_rfc3339(),
        window.end.to_rfc3339()
    );
    println!(
        "   Pages: {} | Mentions scored: {}",
        report.state.pages(),
        report.state.total_document_count()
    );
    for (provider, nps) in &report.nps {
        print_nps(provider.as_str(), nps);
    }
    if let Some(path) = report_path {
        println!("\n   Report written to {}", path.display());
    }

    Ok(())
}

fn print_nps(provider: &str, nps: &NpsResult) {
    let score = format!("{:+.1}", nps.score);
    let score = if nps.score > 0.0 {
        score.green()
    } else if nps.score < 0.0 {
        score.red()
    } else {
        score.yellow()
    };
    println!("\n   {}", provider.bold());
    println!("      Score: {score}");
    println!(
        "      Promoters: {} | Detractors: {} | Documents: {}",
        nps.promoters_count, nps.detractors_count, nps.total_documents
    );
}

async fn run_user_id(username: &str, bearer_token: Option<String>) -> Result<()> {
    let client = twitter_client(bearer_token.as_deref())?;
    let user = client
        .lookup_user(username)
        .await
        .with_context(|| format!("Failed to resolve username {username}"))?;
    println!("{}", user.id);
    Ok(())
}

fn twitter_client(bearer_token: Option<&str>) -> Result<TwitterClient> {
    TwitterConfig::from_lookup(|name| match name {
        TWITTER_BEARER_TOKEN_ENV => bearer_token.map(ToString::to_string),
        _ => None,
    })?
    .client()
}

fn build_provider(
    kind: ProviderKind,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ProviderConfig> {
    match kind {
        ProviderKind::Aws => AwsConfig::from_lookup(lookup)?.provider_config(),
        ProviderKind::Google => GoogleConfig::from_lookup(lookup)?.provider_config(),
    }
}

/// Parse Unix seconds or an RFC 3339 timestamp.
fn parse_time(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| format!("timestamp out of range: {value}"));
    }
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("expected Unix seconds or RFC 3339, got {value}: {e}"))
}
