use std::{
    fmt::Display,
    io::{ErrorKind, Read, Write},
    net::TcpStream,
    time::Duration,
};

use anyhow::{bail, Result};
use tracing::{debug, info, trace, warn};

use crate::message::{Message, User};

const READ_CHUNK: usize = 4096;

// Stream is interpreted as an IRC stream
pub struct Stream {
    pub current_stream: TcpStream,
    channel: String,
    /// Bytes of the last read that didn't end in `\r\n` yet.
    partial: Vec<u8>,
}

impl Stream {
    pub async fn new(host: &str, port: &u16, channel: String) -> Result<Self> {
        let current_stream = TcpStream::connect(format!("{host}:{port}"))?;
        info!(host, port, "connected to IRC");
        Ok(Stream {
            current_stream,
            channel,
            partial: Vec::new(),
        })
    }

    pub fn connect_to_irc(&mut self, account: &str, channel: &str, access_token: &str) -> Result<()> {
        writeln!(self.current_stream, "PASS oauth:{access_token}")?;
        writeln!(self.current_stream, "NICK {account}")?;
        writeln!(self.current_stream, "JOIN #{channel}")?;
        writeln!(self.current_stream, "CAP REQ :twitch.tv/commands twitch.tv/tags")?;

        self.current_stream.set_read_timeout(Some(Duration::from_millis(10)))?;
        info!(account, channel, "joined channel");
        Ok(())
    }

    /// Drain whatever the socket has right now. An empty batch means nothing arrived.
    pub fn read_irc(&mut self) -> Result<Vec<Message>> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match self.current_stream.read(&mut buf) {
                Ok(0) => bail!("IRC server closed the connection"),
                Ok(n) => self.partial.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let lines = take_complete_lines(&mut self.partial);
        if lines.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.handle_irc_messages(&lines))
    }

    fn handle_irc_messages(&mut self, raw_messages: &[String]) -> Vec<Message> {
        let mut messages: Vec<Message> = Vec::new();

        for raw_message in raw_messages {
            let split_message: Vec<&str> = raw_message.split(' ').collect();
            match IrcMessageType::from(&split_message) {
                IrcMessageType::PING => self.pong(split_message.get(1).copied()),
                IrcMessageType::PRIVMSG => {
                    if let Some(message) = parse_privmsg_to_message(raw_message) {
                        messages.push(message);
                    }
                }
                IrcMessageType::OTHER => trace!("{raw_message}"),
                _ => continue,
            };
        }

        messages
    }

    pub fn send_chat_message<T: Display>(&mut self, message: T) -> Result<()> {
        if let Err(e) = write!(self.current_stream, "PRIVMSG #{} :{}\r\n", self.channel, message) {
            bail!("Failed to send chat message, reason: {e}")
        }
        debug!("sent: {message}");
        Ok(())
    }

    fn pong(&mut self, answer_opt: Option<&str>) {
        debug!("PINGED");
        if let Some(answer) = answer_opt {
            if let Err(e) = write!(self.current_stream, "PONG {answer}\r\n") {
                warn!(error = %e, "couldn't ping back");
            }
        }
    }
}

/// Split off every `\r\n`-terminated line, leaving an unfinished tail in `pending`.
/// Lines are decoded only once complete, so a character split across reads survives.
fn take_complete_lines(pending: &mut Vec<u8>) -> Vec<String> {
    let Some(end) = pending.windows(2).rposition(|pair| pair == b"\r\n") else {
        return Vec::new();
    };
    let tail = pending.split_off(end + 2);
    let lines = pending
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect();
    *pending = tail;
    lines
}

fn invalid_message(split_message: &[&str]) -> bool {
    split_message.len() < 2
}

fn is_message_ping(split_message: &[&str]) -> bool {
    split_message.first() == Some(&"PING")
}

/// With tags requested the command sits after the tag block and the prefix.
fn command_word<'a>(split_message: &[&'a str]) -> Option<&'a str> {
    let offset = if split_message.first()?.starts_with('@') { 2 } else { 1 };
    split_message.get(offset).copied()
}

/// `@tags :login!login@login.tmi.twitch.tv PRIVMSG #channel :text`
fn parse_privmsg_to_message(raw_message: &str) -> Option<Message> {
    let (metadata, rest) = match raw_message.strip_prefix('@') {
        Some(tagged) => tagged.split_once(' ')?,
        None => ("", raw_message),
    };

    let prefix = rest.strip_prefix(':')?;
    let username = prefix.split('!').next()?.to_lowercase();
    let (_, text) = prefix.split_once(" :")?;

    // Twitch pads repeated messages with a tag character to dodge duplicate filters
    let user_message = text.replace(" \u{e0000}", "").trim_end().to_string();

    Some(Message::new(User::from(metadata, username), user_message))
}

#[derive(Clone, PartialEq, Debug)]
enum IrcMessageType {
    PING,
    PRIVMSG,
    EMPTY,
    USERSTATE,
    OTHER,
}

impl From<&Vec<&str>> for IrcMessageType {
    fn from(split_message: &Vec<&str>) -> Self {
        if invalid_message(split_message) {
            return IrcMessageType::EMPTY;
        }
        if is_message_ping(split_message) {
            return IrcMessageType::PING;
        }
        match command_word(split_message) {
            Some("PRIVMSG") => IrcMessageType::PRIVMSG,
            Some("USERSTATE") => IrcMessageType::USERSTATE,
            _ => IrcMessageType::OTHER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Group;

    const TAGGED: &str = "@badge-info=;badges=moderator/1;display-name=CubFan;mod=1;subscriber=0;user-id=4242 :cubfan!cubfan@cubfan.tmi.twitch.tv PRIVMSG #cubs :!give @bob 50 \u{e0000}";

    #[test]
    fn classifies_lines() {
        let kind = |line: &str| IrcMessageType::from(&line.split(' ').collect::<Vec<_>>());
        assert_eq!(kind("PING :tmi.twitch.tv"), IrcMessageType::PING);
        assert_eq!(kind(TAGGED), IrcMessageType::PRIVMSG);
        assert_eq!(kind(":a!a@a.tmi.twitch.tv PRIVMSG #cubs :hi"), IrcMessageType::PRIVMSG);
        assert_eq!(kind("@badges= :tmi.twitch.tv USERSTATE #cubs"), IrcMessageType::USERSTATE);
        assert_eq!(kind(""), IrcMessageType::EMPTY);
        assert_eq!(kind(":tmi.twitch.tv 001 cubbot :Welcome, GLHF!"), IrcMessageType::OTHER);
    }

    #[test]
    fn privmsg_carries_user_tags_and_text() {
        let message = parse_privmsg_to_message(TAGGED).unwrap();
        assert_eq!(message.message, "!give @bob 50");
        assert_eq!(message.user.username, "cubfan");
        assert_eq!(message.user.display_name, "CubFan");
        assert_eq!(message.user.id, "4242");
        assert!(message.user.is(Group::MODERATOR));
    }

    #[test]
    fn text_may_contain_colons() {
        let message = parse_privmsg_to_message(":a!a@a.tmi.twitch.tv PRIVMSG #cubs :!sr https://youtu.be/x").unwrap();
        assert_eq!(message.message, "!sr https://youtu.be/x");
        assert!(message.user.id.is_empty());
    }

    #[test]
    fn partial_lines_wait_for_the_rest() {
        let mut pending = b"PING :a\r\n:x PRIVMSG #c :hel".to_vec();
        assert_eq!(take_complete_lines(&mut pending), vec!["PING :a"]);
        assert_eq!(pending, b":x PRIVMSG #c :hel");

        pending.extend_from_slice(b"lo\r\n");
        assert_eq!(take_complete_lines(&mut pending), vec![":x PRIVMSG #c :hello"]);
        assert!(pending.is_empty());
    }

    #[test]
    fn character_split_across_reads_survives() {
        let line = ":x!x@x.tmi.twitch.tv PRIVMSG #c :gg 🎉\r\n".as_bytes();
        let cut = line.len() - 4; // inside the four-byte emoji
        let mut pending = line[..cut].to_vec();
        assert!(take_complete_lines(&mut pending).is_empty());

        pending.extend_from_slice(&line[cut..]);
        let lines = take_complete_lines(&mut pending);
        assert_eq!(lines, vec![":x!x@x.tmi.twitch.tv PRIVMSG #c :gg 🎉"]);
        assert_eq!(parse_privmsg_to_message(&lines[0]).unwrap().message, "gg 🎉");
    }
}
