//! Animation-set and settings transfers, composed from bulk transfers.
//!
//! Every wait is armed before the message that provokes it is sent, so a
//! fast die cannot answer before the host is listening.

use log::info;

use crate::animation::{AnimationSet, DieSettings};
use crate::error::{Error, Result};
use crate::protocol::bulk::{self, BulkDownload};
use crate::protocol::message::{Message, MessageType};
use crate::protocol::Deadline;

use super::Die;
use super::events::DieEvent;

impl Die {
    /// Replace the die's animation set.
    pub async fn upload_animation_set(&self, set: &AnimationSet) -> Result<()> {
        let link = self.link();
        let count = u8::try_from(set.len()).map_err(|_| Error::TooManyAnimations(set.len()))?;
        let total_animation_byte_size = u16::try_from(set.total_size())
            .map_err(|_| Error::PayloadTooLarge(set.total_size()))?;

        link.send_awaiting_reply(
            &Message::TransferAnimSet {
                count,
                total_animation_byte_size,
            },
            MessageType::TransferAnimSetAck,
            Deadline::Default,
        )
        .await?;

        for animation in set.animations() {
            let ready = link.expect(MessageType::TransferAnimReadyForNextAnim, Deadline::Default);
            bulk::upload(link, animation, Deadline::Default).await?;
            ready.recv().await?;
        }

        info!("{}: uploaded {} animations", self.name(), count);
        Ok(())
    }

    /// Read the die's animation set.
    pub async fn download_animation_set(&self) -> Result<AnimationSet> {
        let link = self.link();
        let deadline = self.config().bulk_deadline();

        let announce = link.expect(MessageType::TransferAnimSet, Deadline::Default);
        link.send(&Message::RequestAnimSet)?;
        let Message::TransferAnimSet { count, .. } = announce.recv().await? else {
            return Err(Error::ProtocolViolation);
        };

        let mut next = (count > 0).then(|| BulkDownload::arm(link, deadline));
        link.send(&Message::TransferAnimSetAck)?;

        let mut animations = Vec::with_capacity(usize::from(count));
        for index in 0..count {
            let Some(download) = next.take() else {
                break;
            };
            animations.push(download.receive().await?);
            if index + 1 < count {
                next = Some(BulkDownload::arm(link, deadline));
            }
            link.send(&Message::TransferAnimReadyForNextAnim)?;
        }

        info!("{}: downloaded {} animations", self.name(), animations.len());
        AnimationSet::new(animations)
    }

    /// Write settings to the die.
    pub async fn upload_settings(&self, settings: &DieSettings) -> Result<()> {
        let link = self.link();
        link.send_awaiting_reply(
            &Message::TransferSettings,
            MessageType::TransferSettingsAck,
            Deadline::Default,
        )
        .await?;
        bulk::upload(link, &settings.bytes, Deadline::Default).await?;
        self.shared.observers.emit(&DieEvent::SettingsChanged);
        Ok(())
    }

    /// Read the die's settings.
    pub async fn download_settings(&self) -> Result<DieSettings> {
        let link = self.link();

        let announce = link.expect(MessageType::TransferSettings, Deadline::Default);
        link.send(&Message::RequestSettings)?;
        announce.recv().await?;

        let download = BulkDownload::arm(link, self.config().bulk_deadline());
        link.send(&Message::TransferSettingsAck)?;
        let settings = DieSettings::new(download.receive().await?);

        self.shared.observers.emit(&DieEvent::SettingsChanged);
        Ok(settings)
    }
}
