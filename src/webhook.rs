use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use tokio::{
    spawn,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
};
use tracing::{debug, error, info, warn};

use crate::config::DiscordConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
    Command,
}

impl Level {
    pub fn color(self) -> u32 {
        match self {
            Level::Info => 3447003,
            Level::Success => 5763719,
            Level::Warning => 16705372,
            Level::Error => 15548997,
            Level::Command => 10181046,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Success => "SUCCESS",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Command => "COMMAND",
        }
    }
}

/// One structured log entry, rendered as a single Discord embed.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub level: Level,
    pub title: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

impl Record {
    pub fn new(level: Level, title: impl Into<String>, description: impl Into<String>) -> Self {
        Record {
            level,
            title: title.into(),
            description: description.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Info, title, description)
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Success, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Warning, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(Level::Error, title, description)
    }

    /// "Command: !name" record used when a command starts something.
    pub fn command(name: &str, user: &str, details: &str) -> Self {
        let mut description = format!("**User:** {user}");
        if !details.is_empty() {
            description.push_str(&format!("\n**Details:** {details}"));
        }
        Self::new(Level::Command, format!("Command: {name}"), description)
    }

    pub fn payload(&self, footer_suffix: &str) -> Payload {
        Payload {
            embeds: vec![Embed {
                title: self.title.clone(),
                description: self.description.clone(),
                color: self.level.color(),
                timestamp: self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
                footer: Footer {
                    text: format!("{} | {}", self.level.label(), footer_suffix),
                },
            }],
        }
    }
}

#[derive(Serialize, Debug)]
pub struct Payload {
    pub embeds: Vec<Embed>,
}

#[derive(Serialize, Debug)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub footer: Footer,
}

#[derive(Serialize, Debug)]
pub struct Footer {
    pub text: String,
}

/// Cheap handle commands use to emit records. Every record is also traced
/// locally; it only reaches Discord when a webhook worker is running.
#[derive(Clone, Debug, Default)]
pub struct Logger {
    tx: Option<UnboundedSender<Record>>,
}

impl Logger {
    pub fn disabled() -> Self {
        Logger { tx: None }
    }

    pub fn log(&self, record: Record) {
        match record.level {
            Level::Error => error!(title = %record.title, "{}", record.description),
            Level::Warning => warn!(title = %record.title, "{}", record.description),
            _ => info!(title = %record.title, "{}", record.description),
        }

        if let Some(tx) = &self.tx {
            if tx.send(record).is_err() {
                debug!("webhook worker is gone, dropping record");
            }
        }
    }
}

pub struct DiscordWebhook {
    client: Client,
    url: String,
    footer: String,
    rx: UnboundedReceiver<Record>,
}

impl DiscordWebhook {
    async fn post(&self, record: &Record) {
        let response = self
            .client
            .post(&self.url)
            .json(&record.payload(&self.footer))
            .send()
            .await;

        match response {
            Ok(res) if res.status().is_success() => (),
            Ok(res) => warn!(status = res.status().as_u16(), title = %record.title, "webhook rejected record"),
            Err(e) => warn!(error = %e, title = %record.title, "couldn't reach webhook"),
        }
    }
}

/// Spawn the webhook worker if logging is configured and return the handle for it.
pub fn start(cfg: &DiscordConfig) -> Logger {
    if !cfg.enabled || cfg.webhook_url.trim().is_empty() {
        info!("discord logging disabled");
        return Logger::disabled();
    }

    let (tx, rx) = unbounded_channel();
    let webhook = DiscordWebhook {
        client: Client::new(),
        url: cfg.webhook_url.clone(),
        footer: cfg.footer.clone(),
        rx,
    };
    spawn(main_loop(webhook));

    let logger = Logger { tx: Some(tx) };
    logger.log(Record::success(
        "Configuration Complete",
        "Currency bot started and connected to the logging webhook.",
    ));
    logger
}

pub async fn main_loop(mut webhook: DiscordWebhook) {
    while let Some(record) = webhook.rx.recv().await {
        webhook.post(&record).await;
    }
    debug!("webhook worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn payload_has_discord_embed_shape() {
        let mut record = Record::warning("Work Cooldown Active", "**User:** alice\n\"quoted\"");
        record.timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let json = serde_json::to_value(record.payload("Cub Coins Logging System")).unwrap();
        let embed = &json["embeds"][0];

        assert_eq!(json["embeds"].as_array().unwrap().len(), 1);
        assert_eq!(embed["title"], "Work Cooldown Active");
        assert_eq!(embed["description"], "**User:** alice\n\"quoted\"");
        assert_eq!(embed["color"], 16705372);
        assert_eq!(embed["timestamp"], "2024-03-01T12:00:00.000Z");
        assert_eq!(embed["footer"]["text"], "WARNING | Cub Coins Logging System");
    }

    #[test]
    fn levels_map_to_fixed_colors() {
        assert_eq!(Level::Info.color(), 3447003);
        assert_eq!(Level::Success.color(), 5763719);
        assert_eq!(Level::Error.color(), 15548997);
        assert_eq!(Level::Command.color(), 10181046);
        assert_eq!(Level::Command.label(), "COMMAND");
    }

    #[test]
    fn command_record_omits_empty_details() {
        let bare = Record::command("!wordle", "bob", "");
        assert_eq!(bare.title, "Command: !wordle");
        assert_eq!(bare.description, "**User:** bob");

        let detailed = Record::command("!blackjack", "bob", "Bet: $25");
        assert_eq!(detailed.description, "**User:** bob\n**Details:** Bet: $25");
    }

    #[tokio::test]
    async fn disabled_config_yields_silent_logger() {
        let cfg = DiscordConfig {
            enabled: true,
            webhook_url: "  ".into(),
            footer: "x".into(),
        };
        let logger = start(&cfg);
        assert!(logger.tx.is_none());
        logger.log(Record::info("still fine", "nothing is sent"));
    }
}
