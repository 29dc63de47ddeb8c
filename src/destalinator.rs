//! Staleness rules and the warn/archive orchestration built on them.
//!
//! Nothing is stored locally. Whether a channel was already warned is read
//! back from the channel's own history, by looking for the bot's tagged
//! warning post.

use std::sync::OnceLock;

use chrono::{NaiveDate, Utc};
use regex::{Regex, RegexSet};
use tracing::{debug, info, warn};

use crate::config::{parse_date, Config, ConfigError};
use crate::conversations::{ArchiveResponse, Message, MessageType, PostMessageResponse};
use crate::markup::add_channel_markup;
use crate::slacker::{SlackError, Slacker};

/// Earliest archive date used when none is configured: always in the past.
pub const PAST_DATE_STRING: &str = "2000-01-01";

pub const SECONDS_PER_DAY: i64 = 86_400;

fn lone_emoji() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^:[a-z0-9_+'-]+:(?::skin-tone-[2-6]:)?$").expect("static pattern compiles")
    })
}

/// Text that carries no real activity: nothing, or one emoji shortcode.
fn is_trivial_text(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || lone_emoji().is_match(text)
}

/// Resolves the date before which nothing gets archived: the date in the env
/// var named by `earliest_archive_date_env_varname` when that is set, else
/// `earliest_archive_date`, else [`PAST_DATE_STRING`].
pub fn resolve_earliest_archive_date<F>(config: &Config, env: F) -> Result<NaiveDate, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(varname) = &config.earliest_archive_date_env_varname {
        if let Some(value) = env(varname) {
            return parse_date(varname, &value);
        }
    }

    if let Some(value) = &config.earliest_archive_date {
        return parse_date("earliest_archive_date", value);
    }

    parse_date("PAST_DATE_STRING", PAST_DATE_STRING)
}

pub struct Destalinator<S> {
    slacker: S,
    config: Config,
    ignore_patterns: RegexSet,
    activated: bool,
    earliest_archive_date: NaiveDate,
}

impl<S: Slacker> Destalinator<S> {
    /// `activated` gates the destructive step: without it [`archive`] only
    /// logs.
    ///
    /// [`archive`]: Destalinator::archive
    pub fn new(slacker: S, config: Config, activated: bool) -> Result<Self, ConfigError> {
        Self::new_with_env(slacker, config, activated, |name| std::env::var(name).ok())
    }

    pub fn new_with_env<F>(
        slacker: S,
        config: Config,
        activated: bool,
        env: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ignore_patterns = config.ignore_channel_patterns()?;
        let earliest_archive_date = resolve_earliest_archive_date(&config, env)?;

        debug!(%earliest_archive_date, activated, "destalinator ready");

        Ok(Self {
            slacker,
            config,
            ignore_patterns,
            activated,
            earliest_archive_date,
        })
    }

    pub fn slacker(&self) -> &S {
        &self.slacker
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn activated(&self) -> bool {
        self.activated
    }

    pub fn earliest_archive_date(&self) -> NaiveDate {
        self.earliest_archive_date
    }

    pub fn set_earliest_archive_date(&mut self, date: NaiveDate) {
        self.earliest_archive_date = date;
    }

    pub fn warning_text(&self) -> &str {
        &self.config.warning_text
    }

    pub fn closure_text(&self) -> &str {
        &self.config.closure_text
    }

    /// Re-reads the earliest archive date from config and the environment.
    pub fn get_earliest_archive_date(&self) -> Result<NaiveDate, ConfigError> {
        resolve_earliest_archive_date(&self.config, |name| std::env::var(name).ok())
    }

    pub fn add_slack_channel_markup(&self, text: &str) -> String {
        add_channel_markup(text, |name| self.slacker.add_channel_markup(name))
    }

    pub async fn post_marked_up_message(
        &self,
        channel: &str,
        text: &str,
        message_type: Option<MessageType>,
    ) -> Result<PostMessageResponse, SlackError> {
        let text = self.add_slack_channel_markup(text);
        self.slacker.post_message(channel, &text, message_type).await
    }

    /// True when the channel is strictly older than `min_days`.
    pub async fn channel_minimum_age(&self, channel: &str, min_days: u32) -> Result<bool, SlackError> {
        let info = self.slacker.get_channel_info(channel).await?;
        Ok(info.age > i64::from(min_days) * SECONDS_PER_DAY)
    }

    pub fn ignore_channel(&self, name: &str) -> bool {
        self.config.ignore_channels.iter().any(|c| c == name) || self.ignore_patterns.is_match(name)
    }

    fn channel_id(&self, channel: &str) -> Result<&str, SlackError> {
        self.slacker
            .get_channelid(channel)
            .ok_or_else(|| SlackError::UnknownChannel(channel.to_string()))
    }

    /// Unfiltered history of the last `lookback_days`.
    async fn history(&self, channel: &str, lookback_days: u32) -> Result<Vec<Message>, SlackError> {
        let channel_id = self.channel_id(channel)?;
        let latest = Utc::now().timestamp();
        let oldest = latest - i64::from(lookback_days) * SECONDS_PER_DAY;

        self.slacker
            .get_messages_in_time_range(channel_id, oldest, latest)
            .await
    }

    /// History of the last `lookback_days`, keeping plain messages and the
    /// subtypes listed in `included_subtypes`.
    pub async fn get_messages(&self, channel: &str, lookback_days: u32) -> Result<Vec<Message>, SlackError> {
        let messages = self.history(channel, lookback_days).await?;

        Ok(messages
            .into_iter()
            .filter(|m| match &m.subtype {
                None => true,
                Some(subtype) => self.config.included_subtypes.contains(subtype),
            })
            .collect())
    }

    fn is_substantive(&self, message: &Message) -> bool {
        if message
            .user
            .as_ref()
            .is_some_and(|u| self.config.ignore_users.contains(u))
        {
            return false;
        }

        // The bot's own warnings must not keep a channel alive.
        if message.marker().is_some() {
            return false;
        }

        message.has_files() || message.has_attachment_content() || !is_trivial_text(&message.text)
    }

    /// True when the channel is older than `lookback_days` and nothing
    /// substantive was posted in that window. A younger channel is never
    /// stale, whatever its history.
    pub async fn stale(&self, channel: &str, lookback_days: u32) -> Result<bool, SlackError> {
        if !self.channel_minimum_age(channel, lookback_days).await? {
            debug!(channel = %channel, lookback_days, "channel too young to be stale");
            return Ok(false);
        }

        let messages = self.get_messages(channel, lookback_days).await?;
        Ok(!messages.iter().any(|m| self.is_substantive(m)))
    }

    /// Non-ignored channels old enough to judge and without activity in the
    /// last `lookback_days`, in name order. A channel that can't be checked is
    /// logged and left out.
    pub async fn get_stale_channels(&self, lookback_days: u32) -> Vec<String> {
        let mut stale_channels = Vec::new();

        for channel in self.slacker.channels_by_name().keys() {
            if self.ignore_channel(channel) {
                debug!(channel = %channel, "ignoring channel");
                continue;
            }

            match self.stale(channel, lookback_days).await {
                Ok(true) => stale_channels.push(channel.clone()),
                Ok(false) => {}
                Err(e) => warn!(channel = %channel, error = %e, "could not check channel staleness"),
            }
        }

        info!(count = stale_channels.len(), lookback_days, "found stale channels");
        stale_channels
    }

    fn is_warning(&self, message: &Message, marked_up_warning: &str) -> bool {
        message.has_marker(MessageType::ChannelWarning)
            || message.text == self.config.warning_text
            || message.text == marked_up_warning
    }

    /// Posts the warning unless the channel already got one within
    /// `lookback_days` (`force` posts anyway). Returns whether it posted.
    pub async fn warn(&self, channel: &str, lookback_days: u32, force: bool) -> Result<bool, SlackError> {
        if self.slacker.channel_has_only_restricted_members(channel).await? {
            debug!(channel = %channel, "not warning channel with only restricted members");
            return Ok(false);
        }

        let marked_up_warning = self.add_slack_channel_markup(&self.config.warning_text);
        let messages = self.history(channel, lookback_days).await?;
        if !force && messages.iter().any(|m| self.is_warning(m, &marked_up_warning)) {
            debug!(channel = %channel, "channel already warned");
            return Ok(false);
        }

        self.slacker
            .post_message(channel, &marked_up_warning, Some(MessageType::ChannelWarning))
            .await?;
        info!(channel = %channel, "warned channel");

        Ok(true)
    }

    /// Warns every stale channel; returns the ones that got a new warning.
    pub async fn warn_all(&self, lookback_days: u32, force: bool) -> Vec<String> {
        let mut warned = Vec::new();

        for channel in self.get_stale_channels(lookback_days).await {
            match self.warn(&channel, lookback_days, force).await {
                Ok(true) => warned.push(channel),
                Ok(false) => {}
                Err(e) => warn!(channel = %channel, error = %e, "failed to warn channel"),
            }
        }

        info!(count = warned.len(), "warned channels");
        warned
    }

    /// Announces the closure with the member list, then archives. `None`
    /// when the channel is ignored or the destalinator isn't activated.
    pub async fn archive(&self, channel: &str) -> Result<Option<ArchiveResponse>, SlackError> {
        if self.ignore_channel(channel) {
            debug!(channel = %channel, "not archiving ignored channel");
            return Ok(None);
        }

        if !self.activated {
            info!(channel = %channel, "destalinator not activated, not archiving");
            return Ok(None);
        }

        let members = self.slacker.get_channel_member_names(channel).await?;
        let closure = format!("{} ({})", self.config.closure_text, members.join(", "));
        self.post_marked_up_message(channel, &closure, Some(MessageType::ChannelArchive))
            .await?;

        info!(channel = %channel, "archiving channel");
        let response = self.slacker.archive(channel).await?;
        if !response.ok {
            warn!(
                channel,
                error = response.error.as_deref().unwrap_or("unknown error"),
                "slack refused to archive channel"
            );
        }

        Ok(Some(response))
    }

    /// [`archive`](Destalinator::archive), unless every member is a guest
    /// or the earliest archive date hasn't arrived yet.
    pub async fn safe_archive(&self, channel: &str) -> Result<Option<ArchiveResponse>, SlackError> {
        if self.slacker.channel_has_only_restricted_members(channel).await? {
            debug!(channel = %channel, "not archiving channel with only restricted members");
            return Ok(None);
        }

        let today = Utc::now().date_naive();
        if today < self.earliest_archive_date {
            debug!(channel = %channel, earliest_archive_date = %self.earliest_archive_date, "too early to archive");
            return Ok(None);
        }

        self.archive(channel).await
    }

    /// Archives every stale, non-ignored channel in name order; returns the
    /// channels Slack confirmed as archived.
    pub async fn safe_archive_all(&self, lookback_days: u32) -> Vec<String> {
        let mut archived = Vec::new();

        for channel in self.slacker.channels_by_name().keys() {
            if self.ignore_channel(channel) {
                debug!(channel = %channel, "ignoring channel");
                continue;
            }

            let result = match self.stale(channel, lookback_days).await {
                Ok(true) => self.safe_archive(channel).await,
                Ok(false) => continue,
                Err(e) => Err(e),
            };

            match result {
                Ok(Some(response)) if response.ok => archived.push(channel.clone()),
                Ok(_) => {}
                Err(e) => warn!(channel = %channel, error = %e, "failed to archive channel"),
            }
        }

        info!(count = archived.len(), "archived channels");
        archived
    }
}
