use rand::Rng;

use crate::config::RewardGame;
use crate::cooldown::{Cooldown, Rendering};
use crate::error::CommandError;
use crate::store::Scope;
use crate::webhook::Record;

use super::{Ctx, Invocation};

const JOBS: [&str; 10] = [
    "worked as a Twitch mod",
    "streamed for 8 hours",
    "farmed channel points",
    "clipped highlights",
    "raided another streamer",
    "donated subs",
    "posted emotes in chat",
    "lurked professionally",
    "organized raids",
    "became a VIP",
];

const SPELLS: [&str; 6] = ["✨ Transmutation", "🔮 Fortune", "⚡ Lightning", "🌟 Blessing", "💫 Luck", "🪄 Conjuration"];

const BOUNTIES: [&str; 5] = ["Bandit", "Outlaw", "Thief", "Rogue", "Criminal"];

const MONSTERS: [(&str, i64); 6] = [
    ("🐉 Dragon", 180),
    ("👹 Goblin", 100),
    ("👻 Ghost", 90),
    ("🧟 Zombie", 70),
    ("🦇 Bat", 50),
    ("🕷️ Spider", 35),
];

const CRIMES: [(&str, &str); 8] = [
    ("robbed a convenience store", "rob a convenience store"),
    ("hacked an ATM", "hack an ATM"),
    ("pickpocketed a tourist", "pickpocket a tourist"),
    ("scammed a viewer", "scam a viewer"),
    ("sold fake merch", "sell fake merch"),
    ("stole a car", "steal a car"),
    ("counterfeited channel points", "counterfeit channel points"),
    ("ran a Ponzi scheme", "run a Ponzi scheme"),
];

/// Scavenge loot by d100 roll: the first row whose bound covers the roll.
const SCAVENGE_TABLE: [(i64, &str, i64); 6] = [
    (3, "💰 CASH STASH", 150),
    (12, "📱 OLD PHONE", 100),
    (28, "🔋 BATTERIES", 65),
    (50, "🔧 TOOLS", 40),
    (75, "📦 SUPPLIES", 25),
    (100, "🗑️ SCRAP", 15),
];

pub fn scavenge_find(roll: i64) -> (&'static str, i64) {
    SCAVENGE_TABLE
        .iter()
        .find(|(bound, _, _)| roll <= *bound)
        .map(|(_, item, value)| (*item, *value))
        .unwrap_or(("🗑️ SCRAP", 15))
}

fn uniform(ctx: &mut Ctx<'_>, game: &RewardGame) -> i64 {
    let (lo, hi) = (game.min_reward.min(game.max_reward), game.min_reward.max(game.max_reward));
    ctx.rng.gen_range(lo..=hi)
}

pub fn work(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let game = ctx.cfg.games.work.clone();

    let cooldown = Cooldown::minutes("work_cooldown", game.cooldown_minutes, Rendering::MinutesSeconds);
    ctx.gate(&cooldown, &scope, "Work Cooldown Active", user, |left| {
        format!("{user}, you're tired! Rest for {left} before working again.")
    })?;

    let job = JOBS[ctx.rng.gen_range(0..JOBS.len())];
    let earned = uniform(ctx, &game);
    let balance = ctx.ledger().credit(user_id, earned);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    let currency = ctx.currency().to_string();
    ctx.say(format!("{user} {job} and earned ${earned} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Work Completed",
        format!("**User:** {user}\n**Job:** {job}\n**Earned:** ${earned}\n**New Balance:** ${balance}"),
    ));
    Ok(())
}

pub fn collect(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let game = ctx.cfg.games.collect.clone();

    let cooldown = Cooldown::minutes("collect_cooldown", game.cooldown_minutes, Rendering::HoursMinutes);
    ctx.gate(&cooldown, &scope, "Collect Cooldown Active", user, |left| {
        format!("{user}, next collection in {left}!")
    })?;

    let reward = uniform(ctx, &game);
    let balance = ctx.ledger().credit(user_id, reward);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    let currency = ctx.currency().to_string();
    ctx.say(format!("📦 {user} collected ${reward} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Collection Successful",
        format!("**User:** {user}\n**Collected:** ${reward}\n**New Balance:** ${balance}"),
    ));
    Ok(())
}

pub fn magic(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let game = ctx.cfg.games.magic.clone();

    let cooldown = Cooldown::minutes("magic_cooldown", game.cooldown_minutes, Rendering::MinutesSeconds);
    ctx.gate(&cooldown, &scope, "Magic Cooldown Active", user, |left| {
        format!("{user}, mana recharging! Wait {left}.")
    })?;

    let spell = SPELLS[ctx.rng.gen_range(0..SPELLS.len())];
    let coins = uniform(ctx, &game);
    let balance = ctx.ledger().credit(user_id, coins);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    let currency = ctx.currency().to_string();
    ctx.say(format!("{spell}! {user} conjured ${coins} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Magic Reward Given",
        format!("User: {user} | Spell: {spell} | Earned: ${coins} {currency} | Balance: ${balance}"),
    ));
    Ok(())
}

pub fn bounty(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let game = ctx.cfg.games.bounty.clone();

    let cooldown = Cooldown::minutes("bounty_cooldown", game.cooldown_minutes, Rendering::Minutes);
    ctx.gate(&cooldown, &scope, "Bounty Cooldown Active", user, |left| {
        format!("{user}, next bounty in {left}!")
    })?;

    let target = BOUNTIES[ctx.rng.gen_range(0..BOUNTIES.len())];
    let reward = uniform(ctx, &game);
    let balance = ctx.ledger().credit(user_id, reward);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    let currency = ctx.currency().to_string();
    ctx.say(format!("🎯 {user} captured a {target} for ${reward} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Bounty Captured",
        format!("**User:** {user}\n**Target:** {target}\n**Reward:** ${reward}\n**New Balance:** ${balance}"),
    ));
    Ok(())
}

pub fn scavenge(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);

    let cooldown = Cooldown::minutes(
        "scavenge_cooldown",
        ctx.cfg.games.scavenge.cooldown_minutes,
        Rendering::MinutesSeconds,
    );
    ctx.gate(&cooldown, &scope, "Scavenge Cooldown Active", user, |left| {
        format!("{user}, already scavenged! Wait {left}.")
    })?;

    let roll = ctx.rng.gen_range(1..=100);
    let (item, value) = scavenge_find(roll);
    let balance = ctx.ledger().credit(user_id, value);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    let currency = ctx.currency().to_string();
    ctx.say(format!("🔍 {user} scavenged {item} worth ${value} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Scavenge Successful",
        format!("**User:** {user}\n**Roll:** {roll}\n**Found:** {item}\n**Value:** ${value}\n**New Balance:** ${balance}"),
    ));
    Ok(())
}

pub fn battle(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);

    let cooldown = Cooldown::minutes(
        "battle_cooldown",
        ctx.cfg.games.battle.cooldown_minutes,
        Rendering::MinutesSeconds,
    );
    ctx.gate(&cooldown, &scope, "Battle Cooldown Active", user, |left| {
        format!("{user}, rest before next battle! Wait {left}.")
    })?;

    let won = ctx.rng.gen_range(1..=100) <= 50;
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    if !won {
        ctx.say(format!("💀 {user} was defeated in battle! Try again later!"));
        ctx.log(Record::warning("Battle Lost", format!("**User:** {user}")));
        return Ok(());
    }

    let (monster, reward) = MONSTERS[ctx.rng.gen_range(0..MONSTERS.len())];
    let balance = ctx.ledger().credit(user_id, reward);

    let currency = ctx.currency().to_string();
    ctx.say(format!("⚔️ {user} defeated a {monster} and earned ${reward} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Battle Won",
        format!("**User:** {user}\n**Monster:** {monster}\n**Reward:** ${reward}\n**New Balance:** ${balance}"),
    ));
    Ok(())
}

pub fn luck(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let game = ctx.cfg.games.luck.clone();

    let cooldown = Cooldown::minutes("luck_cooldown", game.cooldown_minutes, Rendering::MinutesSeconds);
    ctx.gate(&cooldown, &scope, "Luck Cooldown Active", user, |left| {
        format!("{user}, try your luck again in {left}!")
    })?;

    let lucky = ctx.rng.gen_bool(0.5);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    if !lucky {
        ctx.say(format!("😞 {user} wasn't lucky this time!"));
        ctx.log(Record::info("Luck Failed", format!("**User:** {user}")));
        return Ok(());
    }

    let multiplier = ctx.rng.gen_range(1..=game.max_mult.max(1));
    let reward = game.min_bet * multiplier;
    let balance = ctx.ledger().credit(user_id, reward);

    let currency = ctx.currency().to_string();
    ctx.say(format!("🍀 {user} got lucky with {multiplier}x and earned ${reward} {currency}! Balance: ${balance}"));
    ctx.log(Record::success(
        "Luck Successful",
        format!("**User:** {user}\n**Multiplier:** {multiplier}x\n**Reward:** ${reward}\n**New Balance:** ${balance}"),
    ));
    Ok(())
}

pub fn crime(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);

    let cooldown = Cooldown::minutes("crime_cooldown", ctx.cfg.games.crime.cooldown_minutes, Rendering::Minutes);
    ctx.gate(&cooldown, &scope, "Crime Cooldown Active", user, |left| {
        format!("{user}, lay low! Try again in {left}.")
    })?;

    let (done, attempt) = CRIMES[ctx.rng.gen_range(0..CRIMES.len())];
    let success = ctx.rng.gen_range(1..=100) <= 50;
    let currency = ctx.currency().to_string();

    if success {
        let reward = ctx.rng.gen_range(100..=400);
        let balance = ctx.ledger().credit(user_id, reward);
        ctx.say(format!("😈 {user} {done} and earned ${reward} {currency}! Balance: ${balance}"));
        ctx.log(Record::success(
            "Crime Successful",
            format!("**User:** {user}\n**Crime:** {done}\n**Reward:** ${reward}\n**New Balance:** ${balance}"),
        ));
    } else {
        let fine = ctx.rng.gen_range(50..=200);
        let balance = ctx.ledger().fine(user_id, fine);
        ctx.say(format!(
            "🚔 {user} tried to {attempt} but got caught! Paid ${fine} {currency} fine. Balance: ${balance}"
        ));
        ctx.log(Record::warning(
            "Crime Failed",
            format!("**User:** {user}\n**Crime:** {done}\n**Fine:** ${fine}\n**New Balance:** ${balance}"),
        ));
    }

    cooldown.stamp(ctx.vars, &scope, ctx.now);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::testing::*;
    use crate::store::{Vars, PERSISTENT};

    #[test]
    fn scavenge_table_boundaries() {
        assert_eq!(scavenge_find(1).1, 150);
        assert_eq!(scavenge_find(3).1, 150);
        assert_eq!(scavenge_find(4).1, 100);
        assert_eq!(scavenge_find(12).1, 100);
        assert_eq!(scavenge_find(28).1, 65);
        assert_eq!(scavenge_find(50).1, 40);
        assert_eq!(scavenge_find(75).1, 25);
        assert_eq!(scavenge_find(76).1, 15);
        assert_eq!(scavenge_find(100).1, 15);
    }

    #[test]
    fn rewards_land_in_configured_range() {
        for seed in 0..50 {
            let mut bench = Bench::new(seed);
            let alice = user("1", "Alice");

            bench.run(work, &invoke(&alice, &[])).unwrap();
            let after_work = bench.balance("1");
            assert!((25..=100).contains(&after_work), "work paid {after_work}");

            bench.run(bounty, &invoke(&alice, &[])).unwrap();
            let bounty_paid = bench.balance("1") - after_work;
            assert!((40..=180).contains(&bounty_paid), "bounty paid {bounty_paid}");
        }
    }

    #[test]
    fn work_stamps_cooldown() {
        let mut bench = Bench::new(9);
        let alice = user("1", "Alice");
        bench.run(work, &invoke(&alice, &[])).unwrap();

        let stamped = bench.vars.time(&Scope::user("1"), "work_cooldown", PERSISTENT);
        assert_eq!(stamped, Some(now()));
        assert!(bench.run(work, &invoke(&alice, &[])).is_err());
    }

    #[test]
    fn crime_outcomes_stay_in_bounds() {
        for seed in 0..50 {
            let mut bench = Bench::new(seed);
            bench.fund("1", 30);
            bench.run(crime, &invoke(&user("1", "Alice"), &[])).unwrap();

            let balance = bench.balance("1");
            let paid = balance - 30;
            assert!(balance == 0 || (100..=400).contains(&paid) || (-200..=-50).contains(&paid));
        }
    }

    #[test]
    fn battle_loss_still_costs_the_cooldown() {
        for seed in 0..20 {
            let mut bench = Bench::new(seed);
            let alice = user("1", "Alice");
            bench.run(battle, &invoke(&alice, &[])).unwrap();

            let gained = bench.balance("1");
            assert!(gained == 0 || MONSTERS.iter().any(|(_, r)| *r == gained));
            assert!(bench.vars.time(&Scope::user("1"), "battle_cooldown", PERSISTENT).is_some());
        }
    }

    #[test]
    fn luck_pays_multiples_of_min_bet() {
        for seed in 0..20 {
            let mut bench = Bench::new(seed);
            bench.run(luck, &invoke(&user("1", "Alice"), &[])).unwrap();
            let gained = bench.balance("1");
            assert_eq!(gained % 20, 0);
            assert!(gained <= 200);
        }
    }
}
