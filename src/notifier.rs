use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::error::check_status;

const TELEGRAM_ENDPOINT: &str = "https://api.telegram.org";

/// Destination of the daily report.
pub trait Notifier {
    /// Delivers HTML-formatted text.
    async fn send(&self, text: &str) -> Result<()>;
}

#[derive(Serialize, Debug)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

/// Telegram bot sink. Without a token and chat id it only logs the message.
#[derive(Clone, Debug)]
pub struct Telegram {
    client: Client,
    config: TelegramConfig,
}

impl Telegram {
    pub fn new(client: Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }
}

impl Notifier for Telegram {
    async fn send(&self, text: &str) -> Result<()> {
        let (Some(bot_token), Some(chat_id)) = (&self.config.bot_token, &self.config.chat_id)
        else {
            warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set. Skipping notification.");
            info!("Message was:\n{}", text);
            return Ok(());
        };

        let url = format!("{TELEGRAM_ENDPOINT}/bot{bot_token}/sendMessage");
        let message = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
        };
        let res = self.client.post(url).json(&message).send().await?;
        check_status(res).await?;

        info!("Notification sent successfully");
        Ok(())
    }
}
