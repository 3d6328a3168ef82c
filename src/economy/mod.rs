//! Currency commands.
//!
//! Every command runs as one store transaction through [`Economy::run`]. A
//! handler gets a [`Ctx`] holding the transaction, the configuration, a random
//! source and the invocation time; it queues chat replies and webhook records
//! on the context and returns `Ok(())` to commit, or a [`CommandError`] to
//! throw away every write it made.

mod blackjack;
mod core;
mod earn;
mod ledger;
mod pvp;
mod social;
mod treasure;
mod wager;
mod wordle;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::cooldown::Cooldown;
use crate::error::CommandError;
use crate::message::User;
use crate::store::{Scope, Store, Vars, PERSISTENT};
use crate::webhook::{Logger, Record};

pub use ledger::Ledger;

/// Command behaviour a `commands.yaml` entry can be bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Balance,
    Give,
    Daily,
    Leaderboard,
    Work,
    Collect,
    Magic,
    Bounty,
    Scavenge,
    Battle,
    Luck,
    Crime,
    Coinflip,
    Dice,
    Crash,
    Plinko,
    Rob,
    Duel,
    Blackjack,
    Wordle,
    Loot,
    Shoutout,
    VideoRequest,
    VideoStop,
}

impl Action {
    /// Whether the first argument names another chatter that has to be resolved to an id.
    pub fn takes_target(self) -> bool {
        matches!(
            self,
            Action::Balance | Action::Give | Action::Rob | Action::Duel | Action::Shoutout
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::Balance => "balance",
            Action::Give => "give",
            Action::Daily => "daily",
            Action::Leaderboard => "leaderboard",
            Action::Work => "work",
            Action::Collect => "collect",
            Action::Magic => "magic",
            Action::Bounty => "bounty",
            Action::Scavenge => "scavenge",
            Action::Battle => "battle",
            Action::Luck => "luck",
            Action::Crime => "crime",
            Action::Coinflip => "coinflip",
            Action::Dice => "dice",
            Action::Crash => "crash",
            Action::Plinko => "plinko",
            Action::Rob => "rob",
            Action::Duel => "duel",
            Action::Blackjack => "blackjack",
            Action::Wordle => "wordle",
            Action::Loot => "loot",
            Action::Shoutout => "shoutout",
            Action::VideoRequest => "video request",
            Action::VideoStop => "video stop",
        }
    }
}

/// Another chatter named in a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub id: String,
    pub login: String,
    pub display_name: String,
}

/// One use of a command: who, with what arguments, and when.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub user: User,
    pub inputs: Vec<String>,
    /// Resolved from `inputs[0]` for commands that take a target. `None` when
    /// nothing was named or the name couldn't be found.
    pub target: Option<Target>,
    pub now: DateTime<Utc>,
}

impl Invocation {
    pub fn new(user: User, inputs: Vec<String>, now: DateTime<Utc>) -> Self {
        Invocation {
            user,
            inputs,
            target: None,
            now,
        }
    }

    pub fn input(&self, i: usize) -> Option<&str> {
        self.inputs
            .get(i)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Caller's user id, or the missing-argument error when the host didn't supply one.
    pub fn user_id(&self) -> Result<&str, CommandError> {
        if self.user.username.is_empty() {
            return Err(CommandError::MissingArgument("user"));
        }
        if self.user.id.is_empty() {
            return Err(CommandError::MissingArgument("userId"));
        }
        Ok(&self.user.id)
    }

    pub fn name(&self) -> &str {
        &self.user.display_name
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Say(String),
    Pause(Duration),
}

/// What a handler works with for the length of one transaction.
pub struct Ctx<'a> {
    pub vars: &'a mut dyn Vars,
    pub cfg: &'a Config,
    pub rng: &'a mut dyn RngCore,
    pub now: DateTime<Utc>,
    replies: Vec<Reply>,
    records: Vec<Record>,
}

impl<'a> Ctx<'a> {
    pub fn new(
        vars: &'a mut dyn Vars,
        cfg: &'a Config,
        rng: &'a mut dyn RngCore,
        now: DateTime<Utc>,
    ) -> Self {
        Ctx {
            vars,
            cfg,
            rng,
            now,
            replies: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn say(&mut self, line: impl Into<String>) {
        self.replies.push(Reply::Say(line.into()));
    }

    pub fn pause(&mut self, millis: u64) {
        self.replies.push(Reply::Pause(Duration::from_millis(millis)));
    }

    pub fn log(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn currency(&self) -> &str {
        &self.cfg.currency.name
    }

    pub fn ledger(&mut self) -> Ledger<'_> {
        Ledger::new(&mut *self.vars, &self.cfg.currency.key)
    }

    /// Reject while `cooldown` is running for `scope`. `reply` gets the rendered time left.
    pub fn gate(
        &self,
        cooldown: &Cooldown,
        scope: &Scope,
        title: &str,
        user: &str,
        reply: impl FnOnce(&str) -> String,
    ) -> Result<(), CommandError> {
        match cooldown.active(&*self.vars, scope, self.now) {
            Some(left) => Err(CommandError::reject(reply(&left))
                .warned(title, format!("**User:** {user}\n**Time Left:** {left}"))),
            None => Ok(()),
        }
    }

    /// Reject unless `user_id` holds at least `amount`.
    pub fn require(
        &mut self,
        user_id: &str,
        amount: i64,
        reply: impl FnOnce(i64) -> String,
    ) -> Result<i64, CommandError> {
        let balance = self.ledger().balance(user_id);
        if balance < amount {
            return Err(CommandError::reject(reply(balance)).warned(
                "Insufficient Balance",
                format!("**User ID:** {user_id}\n**Balance:** ${balance}\n**Needed:** ${amount}"),
            ));
        }
        Ok(balance)
    }

    fn finish(self) -> (Vec<Reply>, Vec<Record>) {
        (self.replies, self.records)
    }
}

pub struct Economy {
    store: Arc<Store>,
    cfg: Arc<Config>,
    logger: Logger,
    rng: Mutex<StdRng>,
}

impl Economy {
    pub fn new(store: Arc<Store>, cfg: Arc<Config>, logger: Logger) -> Self {
        Self::with_rng(store, cfg, logger, StdRng::from_entropy())
    }

    pub fn with_rng(store: Arc<Store>, cfg: Arc<Config>, logger: Logger, rng: StdRng) -> Self {
        Economy {
            store,
            cfg,
            logger,
            rng: Mutex::new(rng),
        }
    }

    /// Run one command to completion. Never fails: soft failures become a chat
    /// reply, anything unexpected becomes a logged error and an apology.
    pub fn run(&self, action: Action, inv: &Invocation) -> Vec<Reply> {
        debug!(action = action.name(), user = %inv.user.username, inputs = ?inv.inputs, "running command");
        let outcome = self.transact(inv.now, |ctx| dispatch(ctx, action, inv));
        self.settle(action.name(), outcome)
    }

    /// Every chat line passes through here: remember who the chatter is and greet first-timers.
    pub fn observe(&self, user: &User, now: DateTime<Utc>) -> Vec<Reply> {
        if user.id.is_empty() {
            return Vec::new();
        }
        let outcome = self.transact(now, |ctx| {
            remember(ctx, user);
            social::welcome(ctx, user)
        });
        self.settle("welcome", outcome)
    }

    /// Timer tick for the treasure hunt.
    pub fn spawn_treasure(&self, now: DateTime<Utc>) -> Vec<Reply> {
        let outcome = self.transact(now, treasure::spawn);
        self.settle("treasure spawn", outcome)
    }

    /// Look up a chatter this bot has already seen by login.
    pub fn find_user(&self, login: &str) -> Option<Target> {
        let found = self.store.read(|snapshot| {
            snapshot
                .users_with("login", PERSISTENT)
                .into_iter()
                .find(|(_, seen)| seen.as_text() == login)
                .map(|(id, _)| Target {
                    display_name: snapshot.text(&Scope::user(&id), "display_name", PERSISTENT),
                    login: login.to_string(),
                    id,
                })
        });

        match found {
            Ok(target) => target,
            Err(e) => {
                error!(error = %e, "couldn't read store while looking up user");
                None
            }
        }
    }

    fn transact(
        &self,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Ctx<'_>) -> Result<(), CommandError>,
    ) -> Result<(Vec<Reply>, Vec<Record>), CommandError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| CommandError::Internal("random source lock was poisoned".into()))?;
        let cfg = &*self.cfg;

        self.store.transaction(|txn| {
            let mut ctx = Ctx::new(txn, cfg, &mut *rng, now);
            f(&mut ctx)?;
            Ok(ctx.finish())
        })
    }

    fn settle(&self, name: &str, outcome: Result<(Vec<Reply>, Vec<Record>), CommandError>) -> Vec<Reply> {
        match outcome {
            Ok((replies, records)) => {
                for record in records {
                    self.logger.log(record);
                }
                replies
            }
            Err(CommandError::Rejected { reply, record }) => {
                if let Some(record) = record {
                    self.logger.log(*record);
                }
                vec![Reply::Say(reply)]
            }
            Err(CommandError::MissingArgument(arg)) => {
                warn!(command = name, arg, "command invoked without caller identity");
                Vec::new()
            }
            Err(e) => {
                self.logger.log(Record::error(
                    format!("{} Error", capitalize(name)),
                    format!("**Error:** {e}"),
                ));
                vec![Reply::Say(format!("⚠️ An error occurred during {name}"))]
            }
        }
    }
}

fn dispatch(ctx: &mut Ctx<'_>, action: Action, inv: &Invocation) -> Result<(), CommandError> {
    match action {
        Action::Balance => core::balance(ctx, inv),
        Action::Give => core::give(ctx, inv),
        Action::Daily => core::daily(ctx, inv),
        Action::Leaderboard => core::leaderboard(ctx, inv),
        Action::Work => earn::work(ctx, inv),
        Action::Collect => earn::collect(ctx, inv),
        Action::Magic => earn::magic(ctx, inv),
        Action::Bounty => earn::bounty(ctx, inv),
        Action::Scavenge => earn::scavenge(ctx, inv),
        Action::Battle => earn::battle(ctx, inv),
        Action::Luck => earn::luck(ctx, inv),
        Action::Crime => earn::crime(ctx, inv),
        Action::Coinflip => wager::coinflip(ctx, inv),
        Action::Dice => wager::dice(ctx, inv),
        Action::Crash => wager::crash(ctx, inv),
        Action::Plinko => wager::plinko(ctx, inv),
        Action::Rob => pvp::rob(ctx, inv),
        Action::Duel => pvp::duel(ctx, inv),
        Action::Blackjack => blackjack::play(ctx, inv),
        Action::Wordle => wordle::play(ctx, inv),
        Action::Loot => treasure::claim(ctx, inv),
        Action::Shoutout => social::shoutout(ctx, inv),
        Action::VideoRequest | Action::VideoStop => Err(CommandError::Internal(format!(
            "{} is handled by the video player, not the economy",
            action.name()
        ))),
    }
}

fn remember(ctx: &mut Ctx<'_>, user: &User) {
    let scope = Scope::user(&user.id);
    if ctx.vars.text(&scope, "login", PERSISTENT) != user.username {
        ctx.vars.set(&scope, "login", user.username.as_str().into(), PERSISTENT);
    }
    if ctx.vars.text(&scope, "display_name", PERSISTENT) != user.display_name {
        ctx.vars
            .set(&scope, "display_name", user.display_name.as_str().into(), PERSISTENT);
    }
}

pub(super) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::message::User;

    fn economy(seed: u64) -> Economy {
        Economy::with_rng(
            Arc::new(Store::in_memory()),
            Arc::new(Config::default()),
            Logger::disabled(),
            StdRng::seed_from_u64(seed),
        )
    }

    fn said(replies: &[Reply]) -> Vec<&str> {
        replies
            .iter()
            .filter_map(|r| match r {
                Reply::Say(s) => Some(s.as_str()),
                Reply::Pause(_) => None,
            })
            .collect()
    }

    #[test]
    fn second_work_inside_cooldown_changes_nothing() {
        let eco = economy(1);
        let alice = user("1", "Alice");

        eco.run(Action::Work, &invoke(&alice, &[]));
        let after_first = eco.store.read(|s| s.int(&Scope::user("1"), "cubcoins", PERSISTENT)).unwrap();
        assert!((25..=100).contains(&after_first));

        let mut again = invoke(&alice, &[]);
        again.now = again.now + chrono::Duration::minutes(5);
        let replies = eco.run(Action::Work, &again);

        assert_eq!(said(&replies), vec!["Alice, you're tired! Rest for 25m 0s before working again."]);
        let after_second = eco.store.read(|s| s.int(&Scope::user("1"), "cubcoins", PERSISTENT)).unwrap();
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn missing_identity_is_silent() {
        let eco = economy(1);
        let ghost = User::new(String::new(), "ghost".into(), "ghost".into(), vec![]);
        assert!(eco.run(Action::Daily, &invoke(&ghost, &[])).is_empty());
    }

    #[test]
    fn observed_users_can_be_found_by_login() {
        let eco = economy(1);
        let alice = user("1", "Alice");
        let greeting = eco.observe(&alice, now());
        assert_eq!(said(&greeting), vec!["👋 Welcome to the stream, Alice! 💜"]);

        assert_eq!(
            eco.find_user("alice"),
            Some(Target {
                id: "1".into(),
                login: "alice".into(),
                display_name: "Alice".into()
            })
        );
        assert_eq!(eco.find_user("bob"), None);
        assert!(eco.observe(&alice, now()).is_empty());
    }

    #[test]
    fn player_actions_get_the_generic_apology() {
        let eco = economy(1);
        let replies = eco.run(Action::VideoStop, &invoke(&user("1", "Alice"), &[]));
        assert_eq!(said(&replies), vec!["⚠️ An error occurred during video stop"]);
    }

    #[test]
    fn concurrent_gives_lose_no_updates() {
        let eco = Arc::new(economy(3));
        let bank = user("1", "Bank");
        eco.store
            .transaction(|txn| {
                txn.set(&Scope::user("1"), "cubcoins", 1000.into(), PERSISTENT);
                Ok::<_, CommandError>(())
            })
            .unwrap();

        std::thread::scope(|s| {
            for i in 0..8 {
                let eco = Arc::clone(&eco);
                let bank = bank.clone();
                s.spawn(move || {
                    let to = user(&format!("r{i}"), &format!("Rec{i}"));
                    for _ in 0..10 {
                        let inv = targeting(invoke(&bank, &[&to.username, "5"]), &to);
                        eco.run(Action::Give, &inv);
                    }
                });
            }
        });

        let bank_left = eco.store.read(|s| s.int(&Scope::user("1"), "cubcoins", PERSISTENT)).unwrap();
        assert_eq!(bank_left, 1000 - 8 * 10 * 5);
    }
}
