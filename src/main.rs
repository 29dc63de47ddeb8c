#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

use std::process;

use clap::Parser;
use dialoguer::{theme::ColorfulTheme, Password};
use slack_destalinator::announcer::Announcer;
use slack_destalinator::archiver::Archiver;
use slack_destalinator::auth::validate_token;
use slack_destalinator::config::{default_config_path, Config};
use slack_destalinator::destalinator::Destalinator;
use slack_destalinator::flagger::Flagger;
use slack_destalinator::scheduler::{
    self, destalinate_job, run_forever, Credentials, API_TOKEN_ENV_VAR, BOT_TOKEN_ENV_VAR,
};
use slack_destalinator::slacker::{SlackApi, SlackClient};
use slack_destalinator::warner::Warner;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::args::{Args, Command};

mod args;

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "slack_destalinator=debug"
    } else {
        "slack_destalinator=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

async fn connect(config: &Config) -> Result<Destalinator<SlackClient>, String> {
    let credentials = Credentials::from_env();
    let (api_token, bot_token) = credentials.tokens().ok_or_else(|| {
        format!("Missing at least one Slack environment variable ({API_TOKEN_ENV_VAR}, {BOT_TOKEN_ENV_VAR})")
    })?;

    let slacker = SlackClient::connect(&config.api_base, api_token, bot_token)
        .await
        .map_err(|e| e.to_string())?;

    Destalinator::new(slacker, config.clone(), config.activated).map_err(|e| e.to_string())
}

async fn check_tokens(config: &Config) -> Result<(), String> {
    let credentials = Credentials::from_env();
    let api = SlackApi::new(&config.api_base);

    for (name, token) in [
        (API_TOKEN_ENV_VAR, credentials.api_token),
        (BOT_TOKEN_ENV_VAR, credentials.bot_token),
    ] {
        let token = match token {
            Some(token) => token,
            None => prompt_password_input(&format!("Enter {name}: ")),
        };

        let identity = validate_token(&api, &token)
            .await
            .map_err(|e| format!("{name}: {e}"))?;
        println!("{name} is valid for {identity}");
    }

    Ok(())
}

async fn start(args: Args) -> Result<(), String> {
    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path().map_err(|e| e.to_string())?,
    };
    let config = Config::load(&config_path).map_err(|e| e.to_string())?;

    match args.command {
        Command::Schedule { test_schedule } => {
            let test_schedule = test_schedule || scheduler::test_schedule_requested();
            run_forever(&config, test_schedule)
                .await
                .map_err(|e| e.to_string())?;
        }
        Command::Run => {
            let outcome = destalinate_job(&config, &Credentials::from_env())
                .await
                .map_err(|e| e.to_string())?;
            info!(?outcome, "END: destalinate_job");
        }
        Command::Warn { force } => {
            let ds = connect(&config).await?;
            Warner::new(&ds).warn(force).await;
        }
        Command::Archive => {
            let ds = connect(&config).await?;
            Archiver::new(&ds).archive().await;
        }
        Command::Announce => {
            let ds = connect(&config).await?;
            Announcer::new(&ds)
                .announce()
                .await
                .map_err(|e| e.to_string())?;
        }
        Command::Flag => {
            let ds = connect(&config).await?;
            Flagger::new(&ds).flag().await.map_err(|e| e.to_string())?;
        }
        Command::Auth => check_tokens(&config).await?,
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            process::exit(1);
        }
    };

    rt.block_on(async {
        if let Err(e) = start(args).await {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    });
}

fn prompt_password_input(prompt: &str) -> String {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()
        .unwrap_or_default()
}
