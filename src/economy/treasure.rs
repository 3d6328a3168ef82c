use rand::Rng;
use tracing::debug;

use crate::error::CommandError;
use crate::store::{Scope, Vars, PERSISTENT};
use crate::webhook::Record;

use super::{Ctx, Invocation};

const ACTIVE: &str = "treasure_loot_active";
const REWARD: &str = "treasure_loot_reward";
const RARITY: &str = "treasure_loot_rarity";
const EMOJI: &str = "treasure_loot_emoji";
const SPAWN_TIME: &str = "treasure_loot_spawn_time";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rarity {
    pub name: &'static str,
    pub emoji: &'static str,
    pub min_reward: i64,
    pub max_reward: i64,
}

/// Cumulative d100 thresholds, rarest first.
const RARITIES: [(i64, Rarity); 4] = [
    (3, Rarity { name: "LEGENDARY", emoji: "💎", min_reward: 500, max_reward: 1000 }),
    (15, Rarity { name: "EPIC", emoji: "🔮", min_reward: 150, max_reward: 300 }),
    (40, Rarity { name: "RARE", emoji: "✨", min_reward: 50, max_reward: 150 }),
    (100, Rarity { name: "COMMON", emoji: "📦", min_reward: 10, max_reward: 50 }),
];

pub fn rarity(roll: i64) -> Rarity {
    RARITIES
        .iter()
        .find(|(upto, _)| roll <= *upto)
        .map(|(_, rarity)| *rarity)
        .unwrap_or(RARITIES[3].1)
}

/// Timer tick. Maybe drops a chest into chat when none is waiting.
pub fn spawn(ctx: &mut Ctx<'_>) -> Result<(), CommandError> {
    let global = Scope::Global;
    if ctx.vars.flag(&global, ACTIVE, PERSISTENT) {
        debug!("treasure already active, skipping spawn");
        return Ok(());
    }
    if ctx.rng.gen_range(1..=100) > ctx.cfg.games.treasure.spawn_chance {
        debug!("treasure did not spawn this time");
        return Ok(());
    }

    let found = rarity(ctx.rng.gen_range(1..=100));
    let reward = ctx.rng.gen_range(found.min_reward..=found.max_reward);
    let currency = ctx.currency().to_string();

    ctx.vars.set(&global, ACTIVE, true.into(), PERSISTENT);
    ctx.vars.set(&global, REWARD, reward.into(), PERSISTENT);
    ctx.vars.set(&global, RARITY, found.name.into(), PERSISTENT);
    ctx.vars.set(&global, EMOJI, found.emoji.into(), PERSISTENT);
    ctx.vars.set_time(&global, SPAWN_TIME, ctx.now, PERSISTENT);

    let Rarity { name, emoji, .. } = found;
    ctx.say(format!("{emoji} {name} TREASURE appeared! Type !loot to claim ${reward} {currency}! {emoji}"));
    ctx.log(Record::success(
        "Treasure Hunt Spawned",
        format!("**Rarity:** {name}\n**Reward:** {reward} {currency}\n**Emoji:** {emoji}"),
    ));
    Ok(())
}

/// `!loot`: first claim inside the timeout takes the chest.
pub fn claim(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let global = Scope::Global;
    let currency = ctx.currency().to_string();
    let timeout = ctx.cfg.currency.inactivity_timeout_seconds;

    if !ctx.vars.flag(&global, ACTIVE, PERSISTENT) {
        return Err(CommandError::reject(format!(
            "{user}, there's no treasure available right now! Wait for the next spawn."
        ))
        .warned("Treasure Hunt - No Loot", format!("**User:** {user}\n**Reason:** No treasure available")));
    }

    if let Some(spawned) = ctx.vars.time(&global, SPAWN_TIME, PERSISTENT) {
        let idle = (ctx.now - spawned).num_seconds();
        if idle > timeout {
            ctx.vars.set(&global, ACTIVE, false.into(), PERSISTENT);
            ctx.say(format!("⏱️ The treasure despawned after {timeout} seconds! No one claimed it in time."));
            ctx.log(Record::warning("Treasure Hunt Timeout", format!("**Idle Time:** {idle} seconds")));
            return Ok(());
        }
    }

    let reward = ctx.vars.int(&global, REWARD, PERSISTENT);
    let name = ctx.vars.text(&global, RARITY, PERSISTENT);
    let emoji = ctx.vars.text(&global, EMOJI, PERSISTENT);

    let balance = ctx.ledger().credit(user_id, reward);
    ctx.vars.set(&global, ACTIVE, false.into(), PERSISTENT);
    let scope = Scope::user(user_id);
    let loots = ctx.vars.int(&scope, "treasure_loots_claimed", PERSISTENT) + 1;
    ctx.vars.set(&scope, "treasure_loots_claimed", loots.into(), PERSISTENT);

    ctx.say(format!(
        "{emoji} {user} claimed the {name} treasure and found ${reward} {currency}! Balance: ${balance} {emoji}"
    ));
    ctx.log(Record::success(
        "Treasure Hunt Claimed",
        format!(
            "**User:** {user}\n**Rarity:** {name}\n**Reward:** {reward} {currency}\n**New Balance:** {balance}\n**Total Loots:** {loots}"
        ),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::testing::*;
    use chrono::Duration;

    fn spawn_until_active(bench: &mut Bench) -> Vec<String> {
        bench.cfg.games.treasure.spawn_chance = 100;
        let said = bench.run(|ctx, _| spawn(ctx), &invoke(&user("0", "Timer"), &[])).unwrap();
        assert!(bench.vars.flag(&Scope::Global, ACTIVE, PERSISTENT));
        said
    }

    #[test]
    fn rarity_thresholds() {
        assert_eq!(rarity(1).name, "LEGENDARY");
        assert_eq!(rarity(3).name, "LEGENDARY");
        assert_eq!(rarity(4).name, "EPIC");
        assert_eq!(rarity(15).name, "EPIC");
        assert_eq!(rarity(40).name, "RARE");
        assert_eq!(rarity(41).name, "COMMON");
        assert_eq!(rarity(100).name, "COMMON");
    }

    #[test]
    fn spawn_announces_reward_in_range() {
        let mut bench = Bench::new(4);
        let said = spawn_until_active(&mut bench);

        let reward = bench.vars.int(&Scope::Global, REWARD, PERSISTENT);
        let name = bench.vars.text(&Scope::Global, RARITY, PERSISTENT);
        let tier = RARITIES.iter().map(|(_, r)| r).find(|r| r.name == name).copied().unwrap();
        assert!((tier.min_reward..=tier.max_reward).contains(&reward));
        assert_eq!(
            said,
            vec![format!(
                "{e} {name} TREASURE appeared! Type !loot to claim ${reward} Cub Coins! {e}",
                e = tier.emoji
            )]
        );
    }

    #[test]
    fn spawn_skips_while_loot_waits() {
        let mut bench = Bench::new(4);
        spawn_until_active(&mut bench);
        let reward = bench.vars.int(&Scope::Global, REWARD, PERSISTENT);

        let said = bench.run(|ctx, _| spawn(ctx), &invoke(&user("0", "Timer"), &[])).unwrap();
        assert!(said.is_empty());
        assert_eq!(bench.vars.int(&Scope::Global, REWARD, PERSISTENT), reward);
    }

    #[test]
    fn first_claim_wins() {
        let mut bench = Bench::new(4);
        spawn_until_active(&mut bench);
        let reward = bench.vars.int(&Scope::Global, REWARD, PERSISTENT);

        bench.run(claim, &invoke(&user("1", "Alice"), &[])).unwrap();
        assert_eq!(bench.balance("1"), reward);
        assert_eq!(bench.vars.int(&Scope::user("1"), "treasure_loots_claimed", PERSISTENT), 1);

        let err = bench.run(claim, &invoke(&user("2", "Bob"), &[])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Bob, there's no treasure available right now! Wait for the next spawn."
        );
    }

    #[test]
    fn stale_treasure_despawns() {
        let mut bench = Bench::new(4);
        spawn_until_active(&mut bench);

        let mut late = invoke(&user("1", "Alice"), &[]);
        late.now = now() + Duration::seconds(61);
        let said = bench.run(claim, &late).unwrap();

        assert_eq!(said, vec!["⏱️ The treasure despawned after 60 seconds! No one claimed it in time."]);
        assert_eq!(bench.balance("1"), 0);
        assert!(!bench.vars.flag(&Scope::Global, ACTIVE, PERSISTENT));
    }
}
