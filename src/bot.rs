use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use futures::{join, FutureExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval, sleep, Interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::command::{self, Command};
use crate::config::{Config, SETTINGS_FILE};
use crate::economy::{Action, Economy, Invocation, Reply, Target};
use crate::helpers::normalize_login;
use crate::player::VideoQueue;
use crate::store::Store;
use crate::token::Token;
use crate::twitch::TwitchApiClient;
use crate::webhook::{self, Logger, Record};
use crate::{message::Message, stream::Stream};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct Bot {
    pub irc_stream: Stream,
    pub cfg: Arc<Config>,
    pub bot_token: Token,
    pub stream_token: Token,
    pub active_commands: Vec<Command>,
    economy: Economy,
    player: VideoQueue,
    video_ended: UnboundedReceiver<u64>,
    helix: TwitchApiClient,
    logger: Logger,
}

impl Bot {
    pub async fn initialize() -> Result<Self> {
        let mut cfg = Config::build(SETTINGS_FILE)?;
        let logger = webhook::start(&cfg.discord);
        let store = Arc::new(Store::open(&cfg.store.path)?);

        // async
        let (bot_token, stream_token, active_commands, irc_stream) = join!(
            Token::from_file(cfg.twitch_cfg.bot_token_path.clone(), &cfg.twitch_cfg),
            Token::from_file(cfg.twitch_cfg.stream_token_path.clone(), &cfg.twitch_cfg),
            command::get_commands(),
            Stream::new(
                &cfg.twitch_cfg.irc_host,
                &cfg.twitch_cfg.irc_port,
                cfg.twitch_cfg.channel.clone(),
            )
        );
        let mut stream_token = stream_token?;

        let helix = TwitchApiClient::new(cfg.twitch_cfg.client_id.clone());
        if cfg.twitch_cfg.broadcaster_id.is_empty() {
            cfg.twitch_cfg.broadcaster_id = helix
                .get_broadcaster_id(&cfg.twitch_cfg.channel, &mut stream_token)
                .await?;
            cfg.update_file()?;
        }

        let cfg = Arc::new(cfg);
        let economy = Economy::new(store, Arc::clone(&cfg), logger.clone());
        let (player, video_ended) = VideoQueue::new(
            Duration::from_secs(cfg.player.max_duration_seconds),
            cfg.player.max_queue,
            logger.clone(),
        );

        let mut bot = Bot {
            irc_stream: irc_stream?,
            cfg,
            bot_token: bot_token?,
            stream_token,
            active_commands: active_commands?,
            economy,
            player,
            video_ended,
            helix,
            logger,
        };

        if let Err(e) = bot.irc_stream.connect_to_irc(
            &bot.cfg.twitch_cfg.account,
            &bot.cfg.twitch_cfg.channel,
            &bot.bot_token.access_token,
        ) {
            bail!(e)
        }
        info!(commands = bot.active_commands.len(), "bot initialized");
        Ok(bot)
    }

    pub async fn run(&mut self) {
        let mut treasure = treasure_timer(self.cfg.games.treasure.spawn_interval_seconds);

        // main loop
        loop {
            // read irc stream
            match self.irc_stream.read_irc() {
                Ok(messages) => {
                    for message in messages {
                        self.handle_message(message).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "IRC connection lost");
                    self.reconnect().await;
                }
            }

            if treasure.tick().now_or_never().is_some() {
                let replies = self.economy.spawn_treasure(Utc::now());
                self.deliver(replies).await;
            }

            while let Ok(generation) = self.video_ended.try_recv() {
                let lines = self.player.finished(generation);
                self.chat_lines(lines);
            }

            // hourly token validation
            self.stream_token.validate_if_stale().await;
            self.bot_token.validate_if_stale().await;
        }
    }

    async fn reconnect(&mut self) {
        let cfg = Arc::clone(&self.cfg);
        let twitch = &cfg.twitch_cfg;
        loop {
            sleep(RECONNECT_DELAY).await;
            let stream = match Stream::new(&twitch.irc_host, &twitch.irc_port, twitch.channel.clone()).await {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "couldn't reach IRC, retrying");
                    continue;
                }
            };
            self.irc_stream = stream;
            match self
                .irc_stream
                .connect_to_irc(&twitch.account, &twitch.channel, &self.bot_token.access_token)
            {
                Ok(()) => {
                    self.logger.log(Record::warning(
                        "IRC Reconnected",
                        format!("**Channel:** {}", twitch.channel),
                    ));
                    return;
                }
                Err(e) => warn!(error = %e, "couldn't rejoin channel, retrying"),
            }
        }
    }

    async fn handle_message(&mut self, message: Message) {
        let now = Utc::now();
        let greeting = self.economy.observe(&message.user, now);
        self.deliver(greeting).await;

        if let Some(command) = self.get_command_instance(message) {
            self.run_command(command, now).await;
        }
    }

    pub fn get_command_instance(&mut self, message: Message) -> Option<Command> {
        let (option, arguments) = self.find_command_by_message(&message);

        // An instance of a command differs per use: the caller and the arguments change
        let command = command::validate_and_return_command(option, &message)?;
        let mut instance = command.clone();
        instance.arguments = arguments;
        instance.requested_by = Some(message.user);
        Some(instance)
    }

    pub async fn run_command(&mut self, command: Command, now: DateTime<Utc>) {
        if let Some(response) = command.response.as_ref() {
            self.chat(response);
        }

        // Commands without an action only had their response to send
        let (Some(action), Some(user)) = (command.action, command.requested_by) else {
            return;
        };

        match action {
            Action::VideoRequest => {
                let lines = self.player.request(&user, &command.arguments);
                self.chat_lines(lines);
            }
            Action::VideoStop => {
                let lines = self.player.stop(&user);
                self.chat_lines(lines);
            }
            _ => {
                let mut inv = Invocation::new(user, command.arguments, now);
                if action.takes_target() {
                    if let Some(login) = inv.input(0).map(normalize_login) {
                        inv.target = self.resolve_target(&login).await;
                    }
                }
                let replies = self.economy.run(action, &inv);
                self.deliver(replies).await;
            }
        }
    }

    /// Chatters seen by the bot are resolved locally, anyone else through Helix.
    async fn resolve_target(&mut self, login: &str) -> Option<Target> {
        if login.is_empty() {
            return None;
        }
        if let Some(target) = self.economy.find_user(login) {
            return Some(target);
        }
        match self.helix.get_user(login, &mut self.stream_token).await {
            Ok(target) => target,
            Err(e) => {
                warn!(login, error = %e, "helix user lookup failed");
                None
            }
        }
    }

    pub fn find_command_by_message(&mut self, msg: &Message) -> (Option<&mut Command>, Vec<String>) {
        let split_message: Vec<String> = msg.message.split_whitespace().map(str::to_string).collect();

        if let Some((word, arguments)) = split_message.split_first() {
            if let Some(command) = self.active_commands.iter_mut().find(|c| c.matches(word)) {
                return (Some(command), arguments.to_vec());
            }
        }
        (None, Vec::new())
    }

    async fn deliver(&mut self, replies: Vec<Reply>) {
        for reply in replies {
            match reply {
                Reply::Say(line) => self.chat(line),
                Reply::Pause(pause) => sleep(pause).await,
            }
        }
    }

    fn chat_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            self.chat(line);
        }
    }

    pub fn chat<T: Display>(&mut self, message: T) {
        if let Err(e) = self.irc_stream.send_chat_message(message) {
            error!("{e}");
        }
    }
}

fn treasure_timer(seconds: u64) -> Interval {
    let period = Duration::from_secs(seconds.max(1));
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick fires immediately, skip it so the first chest waits a full period
    timer.reset();
    timer
}
