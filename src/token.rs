use anyhow::{bail, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::config::TwitchConfig;

const TOKEN_ENDPOINT: &str = "https://id.twitch.tv/oauth2/token";
const VALIDATION_ENDPOINT: &str = "https://id.twitch.tv/oauth2/validate";
const VALIDATION_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Deserialize)]
pub struct Token {
    // Mandatory
    pub access_token: String,
    refresh_token: String,

    #[serde(skip)]
    client_id: String,
    #[serde(skip)]
    client_secret: String,

    #[serde(skip)]
    path: String,

    #[serde(skip, default = "SystemTime::now")]
    last_validated: SystemTime,
}

impl Token {
    pub async fn from_file(path: String, twitch_cfg: &TwitchConfig) -> Result<Token> {
        let file_content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) => bail!("{e}:\nToken file {path} could not be read."),
        };
        let mut token: Token = serde_json::from_str(&file_content)?;
        token.path = path;
        token.client_id = twitch_cfg.client_id.clone();
        token.client_secret = twitch_cfg.client_secret.clone();

        token.validate().await?;
        Ok(token)
    }

    pub async fn refresh(&mut self) -> Result<()> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.as_str()),
        ];
        let res = reqwest::Client::new()
            .post(TOKEN_ENDPOINT)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&params)
            .send()
            .await?;

        let status_code = res.status().as_u16();
        let response = res.text().await?;
        if status_code != 200 {
            bail!("Refreshing tokens failed:\nStatus code: {status_code}\nReason: {response}")
        }

        let new_token: Token = serde_json::from_str(&response)?;
        self.access_token = new_token.access_token;
        self.refresh_token = new_token.refresh_token;
        info!(path = %self.path, "refreshed token");

        tokio::fs::write(&self.path, response.as_bytes()).await?;
        Ok(())
    }

    /// Errors when the refresh failed, a different status code came back, or the request itself failed.
    pub async fn validate(&mut self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(VALIDATION_ENDPOINT)
            .header(AUTHORIZATION, format!("OAuth {}", self.access_token))
            .send()
            .await?;

        self.last_validated = SystemTime::now();
        match res.status().as_u16() {
            200 => Ok(()),
            401 => self.refresh().await,
            other => bail!("Status code was {other} when validating, expected 200 or 401."),
        }
    }

    /// Twitch wants every token validated at least hourly while in use.
    pub async fn validate_if_stale(&mut self) {
        let stale = self
            .last_validated
            .elapsed()
            .is_ok_and(|elapsed| elapsed >= VALIDATION_INTERVAL);
        if stale {
            if let Err(e) = self.validate().await {
                warn!(error = %e, path = %self.path, "token validation failed");
            }
        }
    }
}
