//! Ties the pieces together: listener events in, dispatched replies out.
use crate::commands::CommandTable;
use crate::gateway::client::GatewayClient;
use crate::listen::client::ChatListener;
use crate::listen::data::{ChatEvent, EventKind};
use error::BotError;

pub mod error;

#[derive(Debug)]
pub struct BotData {
    /// The bot account's own name, for the echo filter.
    pub bot_username: String,
    /// The channel replies are posted into.
    pub streamer: String,
}

#[derive(Debug)]
pub struct Bot {
    listener: ChatListener,
    gateway: GatewayClient,
    commands: CommandTable,
    data: BotData,
}

impl Bot {
    #[must_use]
    pub fn new(
        listener: ChatListener,
        gateway: GatewayClient,
        commands: CommandTable,
        data: BotData,
    ) -> Self {
        Bot {
            listener,
            gateway,
            commands,
            data,
        }
    }

    /// Starts the listener and relays replies until the event stream ends
    /// (listener stopped or process shutdown).
    ///
    /// # Errors
    /// Returns `Err(BotError::EventStreamTaken)` if something else already
    /// consumed the listener's events.
    pub async fn run(mut self) -> Result<(), BotError> {
        let mut events = self
            .listener
            .take_events()
            .ok_or(BotError::EventStreamTaken)?;
        self.listener.start();

        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        Ok(())
    }

    async fn handle_event(&self, event: ChatEvent) {
        if event.kind != EventKind::Text {
            return;
        }
        // A reply that itself starts with the sigil would come back around
        // through the subscription; never answer our own messages.
        if is_own_message(event.sender.as_deref(), &self.data.bot_username) {
            return;
        }
        let Some(reply) = self.commands.dispatch(&event.content) else {
            return;
        };

        // Chat replies are not safety-critical; a failed send is logged and
        // dropped, never retried.
        match self.gateway.send_message(&self.data.streamer, reply).await {
            Ok(delivery) => {
                tracing::debug!(
                    payload = %delivery.payload,
                    ack = %delivery.ack,
                    "bot: replied to {:?}",
                    event.content
                )
            }
            Err(err) => tracing::error!("bot: dropping a reply: {err}"),
        }
    }
}

fn is_own_message(sender: Option<&str>, bot_username: &str) -> bool {
    sender.map_or(false, |sender| sender.eq_ignore_ascii_case(bot_username))
}
