// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Command line front end for the Garmin Connect client

use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use garmin_connect::auth::{
    Authenticator, ConsolePrompter, FileSessionStore, MfaPrompter, StaticPrompter,
};
use garmin_connect::client::GarminClient;
use garmin_connect::config::GarminConfig;
use garmin_connect::constants::defaults;
use garmin_connect::error::GarminError;
use garmin_connect::fit::{self, FitEncoder};
use garmin_connect::logging::{AppLogger, LoggingConfig};

#[derive(Parser)]
#[command(name = "garmin-cli")]
#[command(version, about = "Garmin Connect command line client")]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, inspect or remove the stored session
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// List, inspect, upload and download activities
    Activities {
        #[command(subcommand)]
        command: ActivityCommands,
    },
    /// Profile of the logged-in user
    Profile,
    /// Daily totals (steps, distance, calories)
    Stats {
        /// Day as YYYY-MM-DD, today if omitted
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Daily health summaries
    Health {
        #[command(subcommand)]
        metric: HealthMetric,
        /// Day as YYYY-MM-DD, today if omitted
        #[arg(long, global = true)]
        date: Option<NaiveDate>,
    },
    /// Scale measurements in a date range
    BodyComposition {
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
    /// Gear and its usage
    Gear {
        #[command(subcommand)]
        command: GearCommands,
    },
    /// Local FIT container tools
    Fit {
        #[command(subcommand)]
        command: FitCommands,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Run the SSO login and store the session
    Login {
        /// Falls back to GARMIN_USERNAME or the config file
        #[arg(long)]
        username: Option<String>,
        /// Falls back to GARMIN_PASSWORD or the config file
        #[arg(long)]
        password: Option<String>,
        /// Use this MFA code instead of prompting
        #[arg(long)]
        mfa_code: Option<String>,
    },
    /// Show whether a stored session exists and when it expires
    Status,
    /// Delete the stored session
    Logout,
}

#[derive(Subcommand)]
enum ActivityCommands {
    /// One page of activities, newest first
    List {
        #[arg(long, default_value_t = 0)]
        page: u32,
        #[arg(long, default_value_t = defaults::ACTIVITIES_PAGE_SIZE)]
        page_size: u32,
    },
    /// Details of one activity
    Show { activity_id: i64 },
    /// Upload a FIT file
    Upload { file: PathBuf },
    /// Download the original FIT export
    Download {
        activity_id: i64,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum HealthMetric {
    Sleep,
    Stress,
    Steps,
    Hrv,
    BodyBattery,
}

#[derive(Subcommand)]
enum GearCommands {
    /// Gear registered to a profile (the logged-in user if omitted)
    List {
        #[arg(long)]
        profile_pk: Option<i64>,
    },
    /// Usage totals for one item
    Stats { uuid: String },
    /// Activities recorded with one item
    Activities {
        uuid: String,
        #[arg(long, default_value_t = 0)]
        start: u32,
        #[arg(long, default_value_t = defaults::ACTIVITIES_PAGE_SIZE)]
        limit: u32,
    },
}

#[derive(Subcommand)]
enum FitCommands {
    /// Wrap raw FIT records in a container with header and CRC
    Wrap { input: PathBuf, output: PathBuf },
    /// Check a FIT file's header, size and CRCs
    Validate { file: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env();
    if cli.verbose {
        logging = logging.verbose();
    }
    if let Err(e) = logging.init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(garmin_error) = e.downcast_ref::<GarminError>() {
                eprintln!("{}", garmin_error.user_hint());
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = GarminConfig::load(cli.config.clone())?;
    config.validate()?;

    match cli.command {
        Commands::Auth { command } => run_auth(&config, command).await,
        Commands::Activities { command } => run_activities(&config, command).await,
        Commands::Profile => print_json(&client(&config)?.get_user_profile().await?),
        Commands::Stats { date } => {
            print_json(&client(&config)?.get_user_stats(day(date)).await?)
        }
        Commands::Health { metric, date } => run_health(&config, metric, day(date)).await,
        Commands::BodyComposition { start, end } => {
            print_json(&client(&config)?.get_body_composition(start, end).await?)
        }
        Commands::Gear { command } => run_gear(&config, command).await,
        Commands::Fit { command } => run_fit(command),
    }
}

async fn run_auth(config: &GarminConfig, command: AuthCommands) -> Result<()> {
    let store = FileSessionStore::new(config.session_path());

    match command {
        AuthCommands::Login {
            username,
            password,
            mfa_code,
        } => {
            let username = username
                .or_else(|| config.username.clone())
                .context("No username: pass --username or set GARMIN_USERNAME")?;
            let password = password
                .or_else(|| config.password.clone())
                .context("No password: pass --password or set GARMIN_PASSWORD")?;

            let prompter: Arc<dyn MfaPrompter> = match mfa_code {
                Some(code) => Arc::new(StaticPrompter::new(code)),
                None => Arc::new(ConsolePrompter::new()),
            };
            let authenticator = Authenticator::new(config.clone())?
                .with_prompter(prompter)
                .with_store(store);

            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let outcome = authenticator.login(&username, &password, &cancel).await?;
            if let Some(e) = &outcome.persist_error {
                warn!(error = %e, "Logged in, but the session was not saved");
                eprintln!("Warning: session not saved: {e}");
            }
            println!(
                "Logged in as {username}; session valid until {}",
                outcome.session.expires_at
            );
            Ok(())
        }
        AuthCommands::Status => {
            match store.load()? {
                Some(session) if session.is_expired() => println!(
                    "Session at {} expired at {}",
                    store.path().display(),
                    session.expires_at
                ),
                Some(session) => println!(
                    "Session at {} valid until {}",
                    store.path().display(),
                    session.expires_at
                ),
                None => println!("No session stored at {}", store.path().display()),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            Authenticator::new(config.clone())?.with_store(store).logout()?;
            println!("Logged out");
            Ok(())
        }
    }
}

async fn run_activities(config: &GarminConfig, command: ActivityCommands) -> Result<()> {
    let client = client(config)?;

    match command {
        ActivityCommands::List { page, page_size } => {
            print_json(&client.get_activities(page, page_size).await?)
        }
        ActivityCommands::Show { activity_id } => {
            print_json(&client.get_activity_details(activity_id).await?)
        }
        ActivityCommands::Upload { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let activity_id = client.upload_activity(bytes).await?;
            println!("Uploaded {} as activity {activity_id}", file.display());
            Ok(())
        }
        ActivityCommands::Download {
            activity_id,
            output,
        } => {
            let bytes = client.download_activity(activity_id).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("{activity_id}.fit")));
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}

async fn run_health(config: &GarminConfig, metric: HealthMetric, date: NaiveDate) -> Result<()> {
    let client = client(config)?;

    match metric {
        HealthMetric::Sleep => print_json(&client.get_sleep_data(date).await?),
        HealthMetric::Stress => print_json(&client.get_stress_data(date).await?),
        HealthMetric::Steps => print_json(&client.get_steps_data(date).await?),
        HealthMetric::Hrv => print_json(&client.get_hrv_data(date).await?),
        HealthMetric::BodyBattery => print_json(&client.get_body_battery(date).await?),
    }
}

async fn run_gear(config: &GarminConfig, command: GearCommands) -> Result<()> {
    let client = client(config)?;

    match command {
        GearCommands::List { profile_pk } => {
            let profile_pk = match profile_pk {
                Some(pk) => pk,
                None => client
                    .get_user_profile()
                    .await?
                    .profile_id
                    .as_deref()
                    .and_then(|id| id.parse().ok())
                    .context("Profile has no numeric id; pass --profile-pk")?,
            };
            print_json(&client.get_gear(profile_pk).await?)
        }
        GearCommands::Stats { uuid } => print_json(&client.get_gear_stats(&uuid).await?),
        GearCommands::Activities { uuid, start, limit } => {
            print_json(&client.get_gear_activities(&uuid, start, limit).await?)
        }
    }
}

fn run_fit(command: FitCommands) -> Result<()> {
    match command {
        FitCommands::Wrap { input, output } => {
            let mut reader = BufReader::new(
                File::open(&input).with_context(|| format!("Failed to open {}", input.display()))?,
            );
            let sink = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;

            let mut encoder = FitEncoder::open(BufWriter::new(sink))?;
            io::copy(&mut reader, &mut encoder)?;
            let data_size = encoder.data_size();
            encoder.finish()?;

            let summary = fit::validate(&std::fs::read(&output)?)?;
            AppLogger::log_fit_event("wrap", data_size, summary.file_crc);
            println!(
                "Wrote {} ({data_size} data bytes, CRC {:#06x})",
                output.display(),
                summary.file_crc
            );
            Ok(())
        }
        FitCommands::Validate { file } => {
            let bytes =
                std::fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            let summary = fit::validate(&bytes)?;
            println!(
                "{}: valid FIT file, {} data bytes, CRC {:#06x}",
                file.display(),
                summary.data_size(),
                summary.file_crc
            );
            Ok(())
        }
    }
}

/// Client over the stored session that refreshes through a fresh authenticator
fn client(config: &GarminConfig) -> Result<GarminClient> {
    let store = FileSessionStore::new(config.session_path());
    let refresher = Arc::new(Authenticator::new(config.clone())?.with_store(store.clone()));
    let client = GarminClient::from_store(config, store)?.with_refresher(refresher);
    info!(base_url = %client.base_url(), "Client ready");
    Ok(client)
}

fn day(date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| Local::now().date_naive())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
