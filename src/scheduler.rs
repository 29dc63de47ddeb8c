//! Cron trigger for the destalinate job.
//!
//! Each tick connects to Slack and runs the phases in [`Phase`] order. A
//! phase that fails ends that tick's job; the next tick starts fresh.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use derive_more::Display;
use strum::{EnumProperty, IntoEnumIterator};
use strum_macros::{EnumIter, EnumProperty};
use thiserror::Error;
use tracing::{error, info};

use crate::announcer::Announcer;
use crate::archiver::Archiver;
use crate::config::{Config, ConfigError};
use crate::destalinator::Destalinator;
use crate::flagger::Flagger;
use crate::slacker::{SlackClient, SlackError, Slacker};
use crate::warner::Warner;

pub const API_TOKEN_ENV_VAR: &str = "API_TOKEN";
pub const BOT_TOKEN_ENV_VAR: &str = "SB_TOKEN";
pub const TEST_SCHEDULE_ENV_VAR: &str = "TEST_SCHEDULE";

/// Every ten minutes, for trying changes against a workspace.
pub const TEST_CRON: &str = "0 */10 * * * *";

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid cron expression '{expression}': {source}")]
    InvalidCron {
        expression: String,
        #[source]
        source: cron::error::Error,
    },

    #[error("cron expression '{0}' has no upcoming run")]
    NoUpcomingRun(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Slack(#[from] SlackError),
}

#[derive(Display, EnumIter, Clone, Copy, EnumProperty, PartialEq, Debug)]
pub enum Phase {
    #[strum(props(Friendly = "Warning"))]
    Warn,

    #[strum(props(Friendly = "Archiving"))]
    Archive,

    #[strum(props(Friendly = "Announcing"))]
    Announce,

    #[strum(props(Friendly = "Flagging"))]
    Flag,
}

#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub api_token: Option<String>,
    pub bot_token: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v: &String| !v.is_empty());

        Self {
            api_token: var(API_TOKEN_ENV_VAR),
            bot_token: var(BOT_TOKEN_ENV_VAR),
        }
    }

    pub fn tokens(&self) -> Option<(&str, &str)> {
        Some((self.api_token.as_deref()?, self.bot_token.as_deref()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    MissingCredentials,
    Completed,
}

pub fn test_schedule_requested() -> bool {
    std::env::var_os(TEST_SCHEDULE_ENV_VAR).is_some_and(|v| !v.is_empty())
}

pub fn cron_expression(config: &Config, test_schedule: bool) -> String {
    if test_schedule {
        TEST_CRON.to_string()
    } else {
        format!("0 0 {} * * *", config.schedule_hour)
    }
}

pub fn build_schedule(expression: &str) -> Result<Schedule, SchedulerError> {
    Schedule::from_str(expression).map_err(|source| SchedulerError::InvalidCron {
        expression: expression.to_string(),
        source,
    })
}

pub fn next_run(schedule: &Schedule, after: &DateTime<Tz>) -> Result<DateTime<Tz>, SchedulerError> {
    schedule
        .after(after)
        .next()
        .ok_or_else(|| SchedulerError::NoUpcomingRun(schedule.to_string()))
}

pub async fn run_phase<S: Slacker>(ds: &Destalinator<S>, phase: Phase) -> Result<(), SlackError> {
    info!("{}", phase.get_str("Friendly").unwrap_or_default());

    match phase {
        Phase::Warn => {
            Warner::new(ds).warn(false).await;
        }
        Phase::Archive => {
            Archiver::new(ds).archive().await;
        }
        Phase::Announce => {
            Announcer::new(ds).announce().await?;
        }
        Phase::Flag => {
            Flagger::new(ds).flag().await?;
        }
    }

    Ok(())
}

/// Runs warn, archive, announce and flag in that order, stopping at the first
/// phase that fails.
pub async fn run_phases<S: Slacker>(ds: &Destalinator<S>) -> Result<(), SlackError> {
    for phase in Phase::iter() {
        if let Err(e) = run_phase(ds, phase).await {
            error!(%phase, error = %e, "phase failed, skipping the rest of this run");
            return Err(e);
        }
    }

    info!("OK: destalinated");
    Ok(())
}

pub async fn destalinate_job(
    config: &Config,
    credentials: &Credentials,
) -> Result<JobOutcome, SchedulerError> {
    info!("Destalinating");

    let Some((api_token, bot_token)) = credentials.tokens() else {
        error!(
            "ERR: Missing at least one Slack environment variable ({API_TOKEN_ENV_VAR}, {BOT_TOKEN_ENV_VAR})"
        );
        return Ok(JobOutcome::MissingCredentials);
    };

    let slacker = SlackClient::connect(&config.api_base, api_token, bot_token).await?;
    let ds = Destalinator::new(slacker, config.clone(), config.activated)?;
    run_phases(&ds).await?;

    Ok(JobOutcome::Completed)
}

/// Runs the job on the configured schedule until the process is killed.
pub async fn run_forever(config: &Config, test_schedule: bool) -> Result<(), SchedulerError> {
    let tz = config.timezone()?;
    let expression = cron_expression(config, test_schedule);
    let schedule = build_schedule(&expression)?;
    info!(%expression, timezone = %tz, "scheduler started");

    loop {
        let now = Utc::now().with_timezone(&tz);
        let next = next_run(&schedule, &now)?;
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next = %next, "waiting for next run");
        tokio::time::sleep(wait).await;

        match destalinate_job(config, &Credentials::from_env()).await {
            Ok(outcome) => info!(?outcome, "END: destalinate_job"),
            Err(e) => error!(error = %e, "END: destalinate_job failed"),
        }
    }
}
