use anyhow::{bail, Result};
use reqwest::{header::AUTHORIZATION, Client};
use serde::Deserialize;
use tracing::debug;

use crate::economy::Target;
use crate::token::Token;

const USERS_URL: &str = "https://api.twitch.tv/helix/users";

#[derive(Deserialize)]
struct UsersResponse {
    data: Vec<HelixUser>,
}

#[derive(Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
}

impl From<HelixUser> for Target {
    fn from(user: HelixUser) -> Self {
        Target {
            id: user.id,
            login: user.login,
            display_name: user.display_name,
        }
    }
}

fn first_user(body: &str) -> Result<Option<Target>> {
    let response: UsersResponse = serde_json::from_str(body)?;
    Ok(response.data.into_iter().next().map(Target::from))
}

pub struct TwitchApiClient {
    client: Client,
    client_id: String,
}

impl TwitchApiClient {
    pub fn new(client_id: String) -> Self {
        TwitchApiClient {
            client: Client::new(),
            client_id,
        }
    }

    /// https://dev.twitch.tv/docs/api/reference/#get-users
    ///
    /// `Ok(None)` when no account has that login. A 401 refreshes `token` and retries once.
    pub async fn get_user(&self, login: &str, token: &mut Token) -> Result<Option<Target>> {
        let mut refreshed = false;
        loop {
            let response = self
                .client
                .get(USERS_URL)
                .header(AUTHORIZATION, format!("Bearer {}", token.access_token))
                .header("Client-Id", &self.client_id)
                .query(&[("login", login)])
                .send()
                .await?;

            match response.status().as_u16() {
                200 => {
                    let found = first_user(&response.text().await?)?;
                    debug!(login, found = found.is_some(), "helix user lookup");
                    return Ok(found);
                }
                401 if !refreshed => {
                    token.refresh().await?;
                    refreshed = true;
                }
                other => {
                    bail!("Status code was {other} when looking up user {login}, expected 200 or 401.")
                }
            }
        }
    }

    pub async fn get_broadcaster_id(&self, channel: &str, token: &mut Token) -> Result<String> {
        match self.get_user(channel, token).await? {
            Some(user) => Ok(user.id),
            None => bail!("Channel {channel} does not exist on Twitch."),
        }
    }
}
