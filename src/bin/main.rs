use std::io::{self, BufRead, Write};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use earnings_notifier::auth::{consent_url, exchange_code};
use earnings_notifier::config::{default_log_filter, Config, DEFAULT_SCHEDULE};
use earnings_notifier::fx::CurrencyNormalizer;
use earnings_notifier::notifier::Telegram;
use earnings_notifier::scheduler::{parse_schedule, run_once, run_scheduled};
use earnings_notifier::source::{AdMob, AppStore};
use earnings_notifier::Reporter;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
struct Args {
    /// Run the report once and exit
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    /// Cron expression for the recurring report
    #[arg(long, env = "CRON_SCHEDULE", default_value = DEFAULT_SCHEDULE)]
    schedule: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Obtain an AdMob refresh token through the Google consent screen
    Authorize,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_log_filter().into()))
        .with(fmt::layer())
        .init();

    let args = Args::parse();

    let res = match args.command {
        Some(Commands::Authorize) => run_authorize().await,
        None => run_notifier(args.dry_run, &args.schedule).await,
    };

    if let Err(err) = res {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

async fn run_notifier(dry_run: bool, schedule: &str) -> Result<()> {
    let config = Config::from_env()?;
    let client = config.http_client()?;

    let normalizer = CurrencyNormalizer::new(client.clone(), config.exchange_rate_url.clone());
    let reporter = Reporter::new(
        AdMob::new(client.clone(), config.admob.clone()),
        AppStore::new(client.clone(), config.app_store.clone(), normalizer),
        Telegram::new(client, config.telegram.clone()),
    );

    if dry_run {
        run_once(&reporter).await;
        return Ok(());
    }

    let schedule = parse_schedule(schedule)?;
    info!("{} Scheduled for: {}", "Apps Income Notifier started.".green(), schedule);
    run_scheduled(&reporter, &schedule).await
}

async fn run_authorize() -> Result<()> {
    let config = Config::from_env()?;
    let (Some(client_id), Some(client_secret)) =
        (&config.admob.client_id, &config.admob.client_secret)
    else {
        bail!("AD_MOB_CLIENT_ID and AD_MOB_CLIENT_SECRET must be set in .env");
    };

    println!("Step 1: Visit this URL to authorize the app:");
    println!("\n{}\n", consent_url(client_id)?);
    println!("After authorizing, the browser is redirected to http://127.0.0.1 and will likely fail to load.");
    println!("This is expected. Copy the value of \"code=\" from the address bar.\n");
    print!("Step 2: Paste the code here: ");
    io::stdout().flush()?;

    let mut code = String::new();
    io::stdin().lock().read_line(&mut code)?;
    let code = code.trim();
    if code.is_empty() {
        bail!("No authorization code given");
    }

    let client = config.http_client()?;
    let tokens = exchange_code(&client, client_id, client_secret, code).await?;

    println!("\n{}", "Authorization successful!".green());
    match tokens.refresh_token {
        Some(refresh_token) => {
            println!("\n--- YOUR REFRESH TOKEN ---");
            println!("{}", refresh_token);
            println!("--------------------------\n");
            println!("Copy this refresh token into your .env file as AD_MOB_REFRESH_TOKEN");
        }
        None => bail!("Google did not return a refresh token; revoke the app's access and retry"),
    }

    Ok(())
}
