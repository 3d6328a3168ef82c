use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::Deserialize;

#[derive(Clone, Copy, PartialEq, Eq, Deserialize, Debug)]
pub enum Group {
    STREAMER,
    MODERATOR,
    VIP,
    SUBSCRIBER,
    EVERYONE,
}

impl TryFrom<&str> for Group {
    type Error = String;

    fn try_from(group: &str) -> Result<Self, Self::Error> {
        match group.to_uppercase().as_str() {
            "STREAMER" | "BROADCASTER" => Ok(Group::STREAMER),
            "MODERATOR" | "MOD" => Ok(Group::MODERATOR),
            "VIP" => Ok(Group::VIP),
            "SUBSCRIBER" | "SUB" => Ok(Group::SUBSCRIBER),
            "EVERYONE" => Ok(Group::EVERYONE),
            _ => Err(format!("No matching group was found for the Group {group}")),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    pub user: User,
    pub message: String,
}

impl Message {
    pub fn new(user: User, message: String) -> Self {
        Message { user, message }
    }
}

#[derive(Clone, Debug)]
pub struct User {
    /// Twitch user id from the `user-id` tag. Empty when the server sent no tags.
    pub id: String,
    /// Lower-case login.
    pub username: String,
    pub display_name: String,
    pub groups: Vec<Group>,
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl User {
    pub fn new(id: String, username: String, display_name: String, mut groups: Vec<Group>) -> Self {
        groups.push(Group::EVERYONE); // the default group is EVERYONE
        User {
            id,
            username,
            display_name,
            groups,
        }
    }

    /// Build a user from the IRC tag block (`@key=value;...`) preceding a PRIVMSG.
    pub fn from(metadata: &str, username: String) -> Self {
        let tags = parse_tags(metadata);
        let flag = |key: &str| tags.get(key).is_some_and(|v| v == "1");
        let badges = tags.get("badges").map(String::as_str).unwrap_or_default();

        let mut groups = vec![];
        if badges.contains("broadcaster/1") {
            groups.push(Group::STREAMER);
        }
        if flag("mod") {
            groups.push(Group::MODERATOR);
        }
        if badges.contains("vip/1") || flag("vip") {
            groups.push(Group::VIP);
        }
        if flag("subscriber") {
            groups.push(Group::SUBSCRIBER);
        }

        let display_name = match tags.get("display-name") {
            Some(name) if !name.is_empty() => name.clone(),
            _ => username.clone(),
        };
        let id = tags.get("user-id").cloned().unwrap_or_default();

        Self::new(id, username, display_name, groups)
    }

    pub fn is(&self, group: Group) -> bool {
        self.groups.contains(&group)
    }

    pub fn is_moderator(&self) -> bool {
        self.is(Group::MODERATOR) || self.is(Group::STREAMER)
    }
}

fn parse_tags(metadata: &str) -> HashMap<String, String> {
    metadata
        .trim_start_matches('@')
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Clone, PartialEq, Debug)]
pub struct RecentUser {
    pub user: User,
    pub can_use_at: SystemTime,
}

impl RecentUser {
    pub fn new(user: User) -> Self {
        RecentUser {
            user,
            can_use_at: SystemTime::now(),
        }
    }

    pub fn is_cooldown_active(&self) -> bool {
        SystemTime::now() < self.can_use_at
    }

    pub fn add_cooldown(&mut self, cooldown: Duration) {
        self.can_use_at = SystemTime::now() + cooldown;
    }
}
