use chrono::Utc;
use tracing::{debug, info, warn};

use crate::conversations::MessageType;
use crate::destalinator::{Destalinator, SECONDS_PER_DAY};
use crate::slacker::{ChannelInfo, SlackError, Slacker};

/// Announce phase: tells `general_message_channel` about channels created in
/// the last `announce_lookback_days`.
pub struct Announcer<'a, S> {
    ds: &'a Destalinator<S>,
}

fn announcement(info: &ChannelInfo) -> String {
    let mut text = format!("New channel #{}", info.name);
    if let Some(creator) = &info.creator {
        text.push_str(&format!(", created by <@{creator}>"));
    }
    text.push('.');
    if let Some(purpose) = &info.purpose {
        text.push_str(&format!(" Purpose: {purpose}"));
    }
    text
}

impl<'a, S: Slacker> Announcer<'a, S> {
    pub fn new(ds: &'a Destalinator<S>) -> Self {
        Self { ds }
    }

    /// Returns the channels announced by this run.
    pub async fn announce(&self) -> Result<Vec<String>, SlackError> {
        let config = self.ds.config();
        let Some(general) = config.general_message_channel.as_deref() else {
            info!("no general_message_channel configured, skipping announcements");
            return Ok(Vec::new());
        };

        let slacker = self.ds.slacker();
        let general_id = slacker
            .get_channelid(general)
            .ok_or_else(|| SlackError::UnknownChannel(general.to_string()))?;

        let now = Utc::now().timestamp();
        let lookback = i64::from(config.announce_lookback_days) * SECONDS_PER_DAY;
        let previous: Vec<String> = slacker
            .get_messages_in_time_range(general_id, now - lookback, now)
            .await?
            .into_iter()
            .filter(|m| m.has_marker(MessageType::ChannelAnnouncement))
            .map(|m| m.text)
            .collect();

        let mut new_channels: Vec<ChannelInfo> = slacker
            .get_channels()
            .iter()
            .map(|c| ChannelInfo::from_channel(c.clone(), now))
            .filter(|info| info.age < lookback)
            .filter(|info| info.name != general && !self.ds.ignore_channel(&info.name))
            .collect();
        new_channels.sort_by(|a, b| a.name.cmp(&b.name));

        let mut announced = Vec::new();
        for info in new_channels {
            let reference = slacker
                .add_channel_markup(&info.name)
                .unwrap_or_else(|| format!("#{}", info.name));
            if previous.iter().any(|text| text.contains(&reference)) {
                debug!(channel = %info.name, "channel already announced");
                continue;
            }

            match self
                .ds
                .post_marked_up_message(
                    general,
                    &announcement(&info),
                    Some(MessageType::ChannelAnnouncement),
                )
                .await
            {
                Ok(_) => announced.push(info.name),
                Err(e) => warn!(channel = %info.name, error = %e, "failed to announce channel"),
            }
        }

        info!(count = announced.len(), "announced new channels");
        Ok(announced)
    }
}
