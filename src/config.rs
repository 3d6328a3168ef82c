use std::path::Path;

use anyhow::{bail, Result};
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use tracing::info;

pub const SETTINGS_FILE: &str = "settings.toml";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(rename = "twitch")]
    pub twitch_cfg: TwitchConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub games: GamesConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

impl Config {
    pub fn build(path: &str) -> Result<Config> {
        let file_contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => bail!("{e}:\nFile {path} not found, run with --setup to create one."),
        };
        let config: Config = toml::from_str(&file_contents)?;

        Ok(config)
    }

    pub fn update_file(&self) -> Result<()> {
        self.write_to(SETTINGS_FILE)
    }

    fn write_to(&self, path: &str) -> Result<()> {
        match toml::to_string(self) {
            Ok(ser) => std::fs::write(path, ser.as_bytes())?,
            Err(e) => bail!(e),
        };

        Ok(())
    }

    /// Setup routine: write a settings file full of defaults unless one already exists.
    pub fn write_default(path: &str) -> Result<bool> {
        if Path::new(path).exists() {
            info!(path, "settings file already exists, leaving it alone");
            return Ok(false);
        }
        Config::default().write_to(path)?;
        info!(path, "wrote default settings");
        Ok(true)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TwitchConfig {
    pub client_id: String,
    pub client_secret: String,
    pub irc_host: String,
    pub irc_port: u16,
    pub account: String,
    pub channel: String,
    #[serde(default)]
    pub broadcaster_id: String,
    pub bot_token_path: String,
    pub stream_token_path: String,
}

impl Default for TwitchConfig {
    fn default() -> Self {
        Self {
            client_id: Default::default(),
            client_secret: Default::default(),
            irc_host: "irc.chat.twitch.tv".into(),
            irc_port: 6667,
            account: Default::default(),
            channel: Default::default(),
            broadcaster_id: Default::default(),
            bot_token_path: "bot_token.json".into(),
            stream_token_path: "stream_token.json".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct CurrencyConfig {
    pub name: String,
    /// Store key balances live under.
    pub key: String,
    pub daily_reward: i64,
    pub daily_cooldown_hours: i64,
    pub give_min_amount: i64,
    pub leaderboard_size: usize,
    pub inactivity_timeout_seconds: i64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            name: "Cub Coins".into(),
            key: "cubcoins".into(),
            daily_reward: 100,
            daily_cooldown_hours: 24,
            give_min_amount: 1,
            leaderboard_size: 5,
            inactivity_timeout_seconds: 60,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DiscordConfig {
    pub enabled: bool,
    pub webhook_url: String,
    pub footer: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            footer: "Cub Coins Logging System".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/store.json".into(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PlayerConfig {
    pub max_duration_seconds: u64,
    /// Videos allowed to wait behind the one playing.
    pub max_queue: usize,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            max_duration_seconds: 600,
            max_queue: 20,
        }
    }
}

/// Reward-only games paying a uniform amount in `[min_reward, max_reward]`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RewardGame {
    pub min_reward: i64,
    pub max_reward: i64,
    pub cooldown_minutes: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CooldownOnly {
    pub cooldown_minutes: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LuckGame {
    pub min_bet: i64,
    pub max_mult: i64,
    pub cooldown_minutes: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WagerGame {
    pub min_bet: i64,
    pub max_bet: i64,
    pub win_mult: i64,
    pub max_mult: f64,
    pub cooldown_seconds: i64,
}

impl WagerGame {
    fn new(min_bet: i64, max_bet: i64, win_mult: i64, cooldown_seconds: i64) -> Self {
        WagerGame {
            min_bet,
            max_bet,
            win_mult,
            max_mult: 10.0,
            cooldown_seconds,
        }
    }

    pub fn accepts(&self, bet: i64) -> bool {
        (self.min_bet..=self.max_bet).contains(&bet)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RobGame {
    pub cooldown_minutes: i64,
    pub success_rate: i64,
    pub min_percent: i64,
    pub max_percent: i64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WordleGame {
    pub cost: i64,
    pub win_reward: i64,
    pub max_guesses: i64,
    pub cooldown_seconds: i64,
    pub words: Vec<String>,
}

impl WordleGame {
    /// Configured words that are playable: five ASCII letters, upper-cased.
    pub fn word_pool(&self) -> Vec<String> {
        self.words
            .iter()
            .map(|w| w.trim().to_uppercase())
            .filter(|w| w.len() == 5 && w.chars().all(|c| c.is_ascii_alphabetic()))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TreasureGame {
    pub spawn_chance: i64,
    pub spawn_interval_seconds: u64,
}

/// Each `[games.*]` section is laid over that game's own defaults, so a
/// section only needs the fields it changes.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GamesConfig {
    #[serde(deserialize_with = "section::work")]
    pub work: RewardGame,
    #[serde(deserialize_with = "section::collect")]
    pub collect: RewardGame,
    #[serde(deserialize_with = "section::magic")]
    pub magic: RewardGame,
    #[serde(deserialize_with = "section::bounty")]
    pub bounty: RewardGame,
    #[serde(deserialize_with = "section::scavenge")]
    pub scavenge: CooldownOnly,
    #[serde(deserialize_with = "section::battle")]
    pub battle: CooldownOnly,
    #[serde(deserialize_with = "section::luck")]
    pub luck: LuckGame,
    #[serde(deserialize_with = "section::crime")]
    pub crime: CooldownOnly,
    #[serde(deserialize_with = "section::coinflip")]
    pub coinflip: WagerGame,
    #[serde(deserialize_with = "section::dice")]
    pub dice: WagerGame,
    #[serde(deserialize_with = "section::crash")]
    pub crash: WagerGame,
    #[serde(deserialize_with = "section::plinko")]
    pub plinko: WagerGame,
    #[serde(deserialize_with = "section::duel")]
    pub duel: WagerGame,
    #[serde(deserialize_with = "section::blackjack")]
    pub blackjack: WagerGame,
    #[serde(deserialize_with = "section::rob")]
    pub rob: RobGame,
    #[serde(deserialize_with = "section::wordle")]
    pub wordle: WordleGame,
    #[serde(deserialize_with = "section::treasure")]
    pub treasure: TreasureGame,
}

/// Deserialize a section as a table and write its keys over `base`.
fn over_default<'de, D, T>(base: T, input: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Serialize + DeserializeOwned,
{
    let overrides = toml::Table::deserialize(input)?;
    let mut merged = match toml::Value::try_from(base).map_err(de::Error::custom)? {
        toml::Value::Table(table) => table,
        other => return Err(de::Error::custom(format!("game defaults are a {}, not a table", other.type_str()))),
    };
    merged.extend(overrides);
    toml::Value::Table(merged).try_into().map_err(de::Error::custom)
}

mod section {
    use super::*;

    macro_rules! sections {
        ($($name:ident: $ty:ty),* $(,)?) => {
            $(
                pub fn $name<'de, D: Deserializer<'de>>(input: D) -> Result<$ty, D::Error> {
                    over_default(GamesConfig::default().$name, input)
                }
            )*
        };
    }

    sections! {
        work: RewardGame,
        collect: RewardGame,
        magic: RewardGame,
        bounty: RewardGame,
        scavenge: CooldownOnly,
        battle: CooldownOnly,
        luck: LuckGame,
        crime: CooldownOnly,
        coinflip: WagerGame,
        dice: WagerGame,
        crash: WagerGame,
        plinko: WagerGame,
        duel: WagerGame,
        blackjack: WagerGame,
        rob: RobGame,
        wordle: WordleGame,
        treasure: TreasureGame,
    }
}

impl Default for GamesConfig {
    fn default() -> Self {
        let reward = |min_reward, max_reward, cooldown_minutes| RewardGame {
            min_reward,
            max_reward,
            cooldown_minutes,
        };

        Self {
            work: reward(25, 100, 30),
            collect: reward(15, 65, 15),
            magic: reward(25, 120, 35),
            bounty: reward(40, 180, 50),
            scavenge: CooldownOnly { cooldown_minutes: 22 },
            battle: CooldownOnly { cooldown_minutes: 40 },
            luck: LuckGame {
                min_bet: 20,
                max_mult: 10,
                cooldown_minutes: 25,
            },
            crime: CooldownOnly { cooldown_minutes: 30 },
            coinflip: WagerGame::new(10, 500, 2, 15),
            dice: WagerGame::new(10, 300, 6, 15),
            crash: WagerGame::new(25, 500, 2, 25),
            plinko: WagerGame::new(25, 500, 2, 25),
            duel: WagerGame::new(50, 500, 2, 30),
            blackjack: WagerGame::new(25, 500, 2, 30),
            rob: RobGame {
                cooldown_minutes: 45,
                success_rate: 40,
                min_percent: 10,
                max_percent: 30,
            },
            wordle: WordleGame {
                cost: 50,
                win_reward: 150,
                max_guesses: 6,
                cooldown_seconds: 60,
                words: ["CRANE", "SLATE", "TIGER", "HONEY", "PIXEL", "STORM", "GHOST", "BRAVE", "CHAIR", "LEMON"]
                    .into_iter()
                    .map(String::from)
                    .collect(),
            },
            treasure: TreasureGame {
                spawn_chance: 50,
                spawn_interval_seconds: 600,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [twitch]
            client_id = "abc"
            client_secret = "shh"
            irc_host = "irc.chat.twitch.tv"
            irc_port = 6667
            account = "cubbot"
            channel = "cubchannel"
            bot_token_path = "bot.json"
            stream_token_path = "stream.json"

            [currency]
            name = "Bear Bucks"

            [games.dice]
            min_bet = 5
            max_bet = 50
            cooldown_seconds = 10
            "#,
        )
        .unwrap();

        assert_eq!(cfg.currency.name, "Bear Bucks");
        assert_eq!(cfg.currency.key, "cubcoins");
        assert_eq!(cfg.games.dice.win_mult, 6);
        assert_eq!(cfg.games.dice.min_bet, 5);
        assert_eq!(cfg.games.dice.max_bet, 50);
        assert_eq!(cfg.games.work, GamesConfig::default().work);
        assert!(!cfg.discord.enabled);
        assert_eq!(cfg.player.max_duration_seconds, 600);
    }

    #[test]
    fn one_field_section_keeps_that_games_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [twitch]
            client_id = ""
            client_secret = ""
            irc_host = "irc.chat.twitch.tv"
            irc_port = 6667
            account = ""
            channel = ""
            bot_token_path = "bot.json"
            stream_token_path = "stream.json"

            [games.work]
            min_reward = 5

            [games.collect]
            cooldown_minutes = 1

            [games.blackjack]
            max_bet = 1000

            [games.wordle]
            cost = 10
            "#,
        )
        .unwrap();
        let defaults = GamesConfig::default();

        assert_eq!(cfg.games.work.min_reward, 5);
        assert_eq!(cfg.games.work.max_reward, defaults.work.max_reward);
        assert_eq!(cfg.games.collect.min_reward, defaults.collect.min_reward);
        assert_eq!(cfg.games.collect.cooldown_minutes, 1);
        assert_eq!(cfg.games.blackjack.max_bet, 1000);
        assert_eq!(cfg.games.blackjack.min_bet, defaults.blackjack.min_bet);
        assert_eq!(cfg.games.wordle.cost, 10);
        assert_eq!(cfg.games.wordle.words, defaults.wordle.words);
        assert_eq!(cfg.games.rob, defaults.rob);
    }

    #[test]
    fn section_with_wrong_type_is_an_error() {
        let text = toml::to_string(&Config::default()).unwrap() + "\n";
        let broken = text.replace("min_reward = 25", "min_reward = \"lots\"");
        assert!(toml::from_str::<Config>(&broken).is_err());
    }

    #[test]
    fn defaults_survive_a_toml_round_trip() {
        let text = toml::to_string(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.games.rob, GamesConfig::default().rob);
        assert_eq!(back.games.wordle.words.len(), 10);
    }

    #[test]
    fn word_pool_drops_unplayable_words() {
        let mut wordle = GamesConfig::default().wordle;
        wordle.words = vec!["crane".into(), "toolong".into(), "ab1cd".into(), " Slate ".into()];
        assert_eq!(wordle.word_pool(), vec!["CRANE".to_string(), "SLATE".to_string()]);
    }
}
