use rand::{Rng, RngCore};

use crate::config::WagerGame;
use crate::cooldown::Cooldown;
use crate::error::CommandError;
use crate::helpers::parse_amount;
use crate::store::Scope;
use crate::webhook::Record;

use super::{capitalize, Ctx, Invocation};

pub const PLINKO_SLOTS: [f64; 11] = [0.0, 0.5, 1.0, 2.0, 3.0, 5.0, 3.0, 2.0, 1.0, 0.5, 0.0];

/// A bet that passed validation, cooldown and balance checks and has been taken.
pub(super) struct Stake {
    pub user_id: String,
    pub bet: i64,
    pub balance: i64,
    pub cooldown: Cooldown,
    pub scope: Scope,
}

/// Shared opening of every wager: parse the bet, range-check it, respect the
/// cooldown and take the money.
pub(super) fn stake(
    ctx: &mut Ctx<'_>,
    inv: &Invocation,
    game: &WagerGame,
    game_name: &str,
    cooldown_key: &'static str,
    raw_bet: Option<&str>,
    usage: &str,
) -> Result<Stake, CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let currency = ctx.currency().to_string();

    let Some(raw_bet) = raw_bet else {
        return Err(CommandError::reject(format!("{user}, specify your bet! Usage: {usage}")));
    };
    let Some(bet) = parse_amount(raw_bet) else {
        return Err(CommandError::reject(format!("{user}, invalid bet amount! Usage: {usage}")));
    };
    if !game.accepts(bet) {
        return Err(CommandError::reject(format!(
            "{user}, bet must be between {} and {} {currency}!",
            game.min_bet, game.max_bet
        )));
    }

    let scope = Scope::user(user_id);
    let cooldown = Cooldown::seconds(cooldown_key, game.cooldown_seconds);
    let title = format!("{} Cooldown", capitalize(game_name));
    ctx.gate(&cooldown, &scope, &title, user, |left| {
        format!("{user}, {game_name} cooldown! Wait {left} before playing again.")
    })?;

    ctx.require(user_id, bet, |have| {
        format!("{user}, you need ${bet} {currency}! You have ${have}.")
    })?;
    let balance = ctx.ledger().debit(user_id, bet).unwrap_or_default();

    Ok(Stake {
        user_id: user_id.to_string(),
        bet,
        balance,
        cooldown,
        scope,
    })
}

pub fn dice_payout(die1: i64, die2: i64, bet: i64, win_mult: i64) -> i64 {
    let total = die1 + die2;
    if die1 == die2 && total == 12 {
        bet * win_mult * 5
    } else if die1 == die2 {
        bet * win_mult * 2
    } else if total == 7 {
        bet * win_mult + bet / 2
    } else if total >= 10 {
        bet * win_mult
    } else {
        0
    }
}

/// Weighted bucket, then uniform inside it.
fn bucketed(rng: &mut dyn RngCore, buckets: &[(i64, f64, f64)]) -> f64 {
    let roll = rng.gen_range(1..=100);
    let mut acc = 0;
    for (weight, lo, hi) in buckets {
        acc += weight;
        if roll <= acc {
            return if hi > lo { rng.gen_range(*lo..*hi) } else { *lo };
        }
    }
    buckets.last().map(|(_, lo, _)| *lo).unwrap_or(1.0)
}

pub fn crash_point(rng: &mut dyn RngCore, max_mult: f64) -> f64 {
    bucketed(rng, &[(30, 1.0, 2.0), (25, 2.0, 4.0), (25, 4.0, 7.0), (20, 7.0, max_mult.max(7.0))])
}

pub fn cash_out_target(rng: &mut dyn RngCore, max_mult: f64) -> f64 {
    bucketed(rng, &[(35, 1.3, 2.2), (30, 2.2, 4.5), (20, 4.5, 7.5), (15, 7.5, max_mult.max(7.5))])
}

/// Eight left/right bounces from the middle slot, held inside the board.
pub fn plinko_drop(rng: &mut dyn RngCore) -> usize {
    let mut position: i64 = 5;
    for _ in 0..8 {
        position += if rng.gen_bool(0.5) { -1 } else { 1 };
        position = position.clamp(0, PLINKO_SLOTS.len() as i64 - 1);
    }
    position as usize
}

pub fn coinflip(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let game = ctx.cfg.games.coinflip.clone();
    let user = inv.name();
    let usage = format!("!coinflip heads/tails {}-{}", game.min_bet, game.max_bet);

    inv.user_id()?;
    let choice = match inv.input(0).map(str::to_lowercase).as_deref() {
        Some("heads") | Some("h") => "heads",
        Some("tails") | Some("t") => "tails",
        Some(_) => return Err(CommandError::reject(format!("{user}, choose heads or tails! Usage: {usage}"))),
        None => return Err(CommandError::reject(format!("{user}, specify your bet! Usage: {usage}"))),
    };

    let Stake { user_id, bet, mut balance, cooldown, scope } =
        stake(ctx, inv, &game, "coinflip", "coinflip_last_played", inv.input(1), &usage)?;

    let result = if ctx.rng.gen_bool(0.5) { "heads" } else { "tails" };
    let currency = ctx.currency().to_string();

    if choice == result {
        let winnings = bet * game.win_mult;
        balance = ctx.ledger().credit(&user_id, winnings);
        ctx.say(format!("🪙 {}! {user} WON ${winnings} {currency}! Balance: ${balance}", result.to_uppercase()));
        ctx.log(Record::success(
            "Coinflip Win",
            format!("**User:** {user}\n**Choice:** {choice}\n**Result:** {result}\n**Bet:** ${bet}\n**Winnings:** ${winnings}\n**New Balance:** ${balance}"),
        ));
    } else {
        ctx.say(format!("🪙 {}! {user} LOST ${bet} {currency}. Balance: ${balance}", result.to_uppercase()));
        ctx.log(Record::warning(
            "Coinflip Loss",
            format!("**User:** {user}\n**Choice:** {choice}\n**Result:** {result}\n**Bet:** ${bet}\n**New Balance:** ${balance}"),
        ));
    }

    cooldown.stamp(ctx.vars, &scope, ctx.now);
    Ok(())
}

pub fn dice(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let game = ctx.cfg.games.dice.clone();
    let user = inv.name();
    let usage = format!("!dice {}-{}", game.min_bet, game.max_bet);

    let Stake { user_id, bet, mut balance, cooldown, scope } =
        stake(ctx, inv, &game, "dice", "dice_last_played", inv.input(0), &usage)?;

    let die1 = ctx.rng.gen_range(1..=6);
    let die2 = ctx.rng.gen_range(1..=6);
    let total = die1 + die2;
    let winnings = dice_payout(die1, die2, bet, game.win_mult);
    let currency = ctx.currency().to_string();

    if winnings > 0 {
        balance = ctx.ledger().credit(&user_id, winnings);
        ctx.say(format!("🎲 [{die1}] [{die2}] = {total} | {user} WON ${winnings} {currency}! Balance: ${balance}"));
        ctx.log(Record::success(
            "Dice Win",
            format!("**User:** {user}\n**Bet:** ${bet}\n**Roll:** [{die1}] [{die2}] = {total}\n**Winnings:** ${winnings}\n**New Balance:** ${balance}"),
        ));
    } else {
        ctx.say(format!("🎲 [{die1}] [{die2}] = {total} | {user} LOST ${bet} {currency}. Balance: ${balance}"));
        ctx.log(Record::warning(
            "Dice Loss",
            format!("**User:** {user}\n**Bet:** ${bet}\n**Roll:** [{die1}] [{die2}] = {total}\n**New Balance:** ${balance}"),
        ));
    }

    cooldown.stamp(ctx.vars, &scope, ctx.now);
    Ok(())
}

pub fn crash(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let game = ctx.cfg.games.crash.clone();
    let user = inv.name();
    let usage = format!("!crash {}-{}", game.min_bet, game.max_bet);

    let Stake { user_id, bet, mut balance, cooldown, scope } =
        stake(ctx, inv, &game, "crash", "crash_last_played", inv.input(0), &usage)?;

    let crash_at = crash_point(ctx.rng, game.max_mult);
    let cash_out = cash_out_target(ctx.rng, game.max_mult);
    let currency = ctx.currency().to_string();

    ctx.say(format!("🎮 {user} bet ${bet} | Attempting to cash out at {cash_out:.2}x..."));
    ctx.pause(1500);

    if cash_out <= crash_at {
        let winnings = (bet as f64 * cash_out).floor() as i64;
        let profit = winnings - bet;
        balance = ctx.ledger().credit(&user_id, winnings);
        ctx.say(format!(
            "✅ SUCCESS! | Your Cash-Out: {cash_out:.2}x | Crash Point: {crash_at:.2}x | Cashed out BEFORE crash! Won ${winnings} {currency} (+${profit} profit)! Balance: ${balance}"
        ));
        ctx.log(Record::success(
            "Crash Win",
            format!("**User:** {user}\n**Bet:** ${bet}\n**Cash-Out:** {cash_out:.2}x\n**Crash Point:** {crash_at:.2}x\n**Winnings:** ${winnings}\n**New Balance:** ${balance}"),
        ));
    } else {
        ctx.say(format!(
            "💥 CRASH! | Crash Point: {crash_at:.2}x | Your Cash-Out: {cash_out:.2}x | Game crashed BEFORE you cashed out - Too greedy! Lost ${bet} {currency}. Balance: ${balance}"
        ));
        ctx.log(Record::warning(
            "Crash Loss",
            format!("**User:** {user}\n**Bet:** ${bet}\n**Cash-Out:** {cash_out:.2}x\n**Crash Point:** {crash_at:.2}x\n**New Balance:** ${balance}"),
        ));
    }

    cooldown.stamp(ctx.vars, &scope, ctx.now);
    Ok(())
}

pub fn plinko(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let game = ctx.cfg.games.plinko.clone();
    let user = inv.name();
    let usage = format!("!plinko {}-{}", game.min_bet, game.max_bet);

    let Stake { user_id, bet, cooldown, scope, .. } =
        stake(ctx, inv, &game, "plinko", "plinko_last_played", inv.input(0), &usage)?;

    let slot = plinko_drop(ctx.rng);
    let multiplier = PLINKO_SLOTS[slot];
    let winnings = (bet as f64 * multiplier).floor() as i64;
    let balance = ctx.ledger().credit(&user_id, winnings);
    let profit = winnings - bet;
    let outcome = if profit > 0 { "WON" } else { "LOST" };
    let currency = ctx.currency().to_string();

    ctx.say(format!(
        "🔻 {user} dropped to slot {slot} ({multiplier}x) and {outcome} ${} {currency}! Balance: ${balance}",
        profit.abs()
    ));
    let detail = format!("User: {user} | Slot: {slot} | Multiplier: {multiplier}x | Bet: ${bet} | Net: ${profit} | Balance: ${balance}");
    ctx.log(if profit > 0 {
        Record::success("Plinko Win", detail)
    } else {
        Record::info("Plinko Loss", detail)
    });

    cooldown.stamp(ctx.vars, &scope, ctx.now);
    Ok(())
}
