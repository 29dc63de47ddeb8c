use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::FlaggerRule;
use crate::conversations::MessageType;
use crate::destalinator::{Destalinator, SECONDS_PER_DAY};
use crate::slacker::{SlackError, Slacker};

/// Flag phase: re-posts messages that collected enough of a rule's emoji
/// reaction into the rule's output channel.
pub struct Flagger<'a, S> {
    ds: &'a Destalinator<S>,
}

pub fn permalink(slack_name: &str, channel_id: &str, ts: &str) -> String {
    format!(
        "https://{slack_name}.slack.com/archives/{channel_id}/p{}",
        ts.replace('.', "")
    )
}

impl<'a, S: Slacker> Flagger<'a, S> {
    pub fn new(ds: &'a Destalinator<S>) -> Self {
        Self { ds }
    }

    /// Returns the permalinks flagged by this run.
    pub async fn flag(&self) -> Result<Vec<String>, SlackError> {
        let mut flagged = Vec::new();

        for rule in &self.ds.config().flagger_rules {
            flagged.extend(self.flag_rule(rule).await?);
        }

        info!(count = flagged.len(), "flagged messages");
        Ok(flagged)
    }

    async fn flag_rule(&self, rule: &FlaggerRule) -> Result<Vec<String>, SlackError> {
        let config = self.ds.config();
        let slacker = self.ds.slacker();
        let output_id = slacker
            .get_channelid(&rule.output_channel)
            .ok_or_else(|| SlackError::UnknownChannel(rule.output_channel.clone()))?;

        let now = Utc::now().timestamp();
        let oldest = now - i64::from(config.flagger_lookback_days) * SECONDS_PER_DAY;

        let mut already_flagged: Vec<String> = slacker
            .get_messages_in_time_range(output_id, oldest, now)
            .await?
            .into_iter()
            .filter(|m| m.has_marker(MessageType::FlaggedMessage))
            .map(|m| m.text)
            .collect();

        let mut flagged = Vec::new();
        for (channel, channel_id) in slacker.channels_by_name() {
            if *channel == rule.output_channel || self.ds.ignore_channel(channel) {
                continue;
            }

            let messages = match slacker.get_messages_in_time_range(channel_id, oldest, now).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(channel = %channel, error = %e, "could not read channel for flagging");
                    continue;
                }
            };

            for message in messages {
                let count = message.reaction_count(&rule.emoji);
                if count < rule.threshold || message.marker().is_some() {
                    continue;
                }

                let link = permalink(&config.slack_name, channel_id, &message.ts);
                if already_flagged.iter().any(|text| text.contains(&link)) {
                    debug!(%link, "message already flagged");
                    continue;
                }

                let text = format!(
                    "Flagged :{}: x{count} in #{channel}: {link}",
                    rule.emoji
                );
                match self
                    .ds
                    .post_marked_up_message(
                        &rule.output_channel,
                        &text,
                        Some(MessageType::FlaggedMessage),
                    )
                    .await
                {
                    Ok(_) => {
                        already_flagged.push(link.clone());
                        flagged.push(link);
                    }
                    Err(e) => warn!(channel = %channel, error = %e, "failed to flag message"),
                }
            }
        }

        Ok(flagged)
    }
}
