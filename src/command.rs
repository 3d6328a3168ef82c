use serde::{de, Deserialize};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Result};
use tracing::debug;

use crate::economy::Action;
use crate::message::{Group, Message, RecentUser, User};

pub const COMMANDS_FILE: &str = "commands.yaml";

#[derive(Clone, PartialEq, Deserialize, Debug)]
pub struct Command {
    pub cmd: String, // Mandatory

    // Disallow these properties from being defined in commands.yaml
    #[serde(skip)]
    pub recent_users: Vec<RecentUser>,
    #[serde(skip)]
    pub arguments: Vec<String>,
    #[serde(skip)]
    pub requested_by: Option<User>,
    #[serde(skip, default = "SystemTime::now")]
    pub can_be_used_at: SystemTime,

    #[serde(default)]
    pub alternative_cmds: Vec<String>,

    /// Fixed text sent before the action runs.
    #[serde(default)]
    pub response: Option<String>,

    /// What the command does beyond its response. Commands without one only reply.
    #[serde(default)]
    pub action: Option<Action>,

    #[serde(default, deserialize_with = "Command::cast_cooldown")]
    pub global_cooldown: Duration,

    #[serde(default, deserialize_with = "Command::cast_cooldown")]
    pub user_cooldown: Duration,

    #[serde(default = "Command::get_default_permitted_by")]
    #[serde(deserialize_with = "Command::build_permitted_by")]
    pub permitted_by: Vec<Group>,

    #[serde(default, deserialize_with = "Command::build_groups")]
    pub allowed_to_bypass: Vec<Group>,
}

impl Command {
    pub fn matches(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        self.cmd == word || self.alternative_cmds.iter().any(|alt| *alt == word)
    }

    pub fn is_global_cooldown_active(&self) -> bool {
        SystemTime::now() < self.can_be_used_at
    }

    pub fn add_global_cooldown(&mut self) {
        self.can_be_used_at = SystemTime::now() + self.global_cooldown;
    }

    pub fn is_user_permitted(&self, user: &User) -> bool {
        user.groups
            .iter()
            .any(|user_group| self.permitted_by.contains(user_group))
    }

    pub fn can_user_bypass(&self, user: &User) -> bool {
        user.groups
            .iter()
            .any(|user_group| self.allowed_to_bypass.contains(user_group))
    }

    pub fn is_user_cooldown_active(&mut self, user: &User) -> bool {
        if let Some(recent_user) = self
            .recent_users
            .iter_mut()
            .find(|recent| recent.user.username == user.username)
        {
            if recent_user.is_cooldown_active() {
                debug!(user = %user.username, cmd = %self.cmd, "user cooldown still active");
                return true;
            }
            recent_user.add_cooldown(self.user_cooldown);
            return false;
        }

        let mut recent_user = RecentUser::new(user.clone());
        recent_user.add_cooldown(self.user_cooldown);
        self.recent_users.push(recent_user);
        false
    }

    fn cast_cooldown<'de, D>(input: D) -> Result<Duration, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let n = u64::deserialize(input)?;
        Ok(Duration::from_secs(n))
    }

    fn get_default_permitted_by() -> Vec<Group> {
        vec![Group::EVERYONE]
    }

    fn build_permitted_by<'de, D>(input: D) -> Result<Vec<Group>, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        let mut permitted_by = Self::build_groups(input)?;
        if permitted_by.is_empty() {
            permitted_by.push(Group::EVERYONE);
        }
        Ok(permitted_by)
    }

    fn build_groups<'de, D>(input: D) -> Result<Vec<Group>, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        Vec::<String>::deserialize(input)?
            .iter()
            .map(|group| Group::try_from(group.as_str()).map_err(de::Error::custom))
            .collect()
    }
}

pub fn parse_commands(yaml: &str) -> Result<Vec<Command>> {
    let mut commands: Vec<Command> = match serde_yaml::from_str(yaml) {
        Ok(cmds) => cmds,
        Err(e) => bail!("Syntax of defined commands in {COMMANDS_FILE} is wrong.\nIn specific: {e}"),
    };
    for command in &mut commands {
        command.cmd = command.cmd.to_lowercase();
        for alt in &mut command.alternative_cmds {
            *alt = alt.to_lowercase();
        }
    }
    Ok(commands)
}

pub async fn get_commands() -> Result<Vec<Command>> {
    let commands_yaml = match tokio::fs::read_to_string(COMMANDS_FILE).await {
        Ok(cmds) => cmds,
        Err(e) => bail!("{e}:\nFile {COMMANDS_FILE} not found, can't continue."),
    };
    parse_commands(&commands_yaml)
}

pub fn validate_and_return_command<'a>(
    option: Option<&'a mut Command>,
    message: &Message,
) -> Option<&'a mut Command> {
    // make checks to see if the command is allowed to be used
    let cmd = option?;

    if !cmd.is_user_permitted(&message.user) {
        return None;
    }
    if cmd.can_user_bypass(&message.user) {
        if !cmd.is_global_cooldown_active() {
            cmd.add_global_cooldown();
        }
        return Some(cmd);
    }
    if cmd.is_global_cooldown_active() {
        return None;
    }
    if cmd.is_user_cooldown_active(&message.user) {
        return None;
    }

    cmd.add_global_cooldown();

    Some(cmd)
}
