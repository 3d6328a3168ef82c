use rand::Rng;

use crate::cooldown::{Cooldown, Rendering};
use crate::error::CommandError;
use crate::helpers::{normalize_login, parse_amount};
use crate::store::Scope;
use crate::webhook::Record;

use super::{Ctx, Invocation, Target};

const ROB_MIN_ROBBER_BALANCE: i64 = 50;
const ROB_MIN_TARGET_BALANCE: i64 = 10;
const ROB_FINE: i64 = 50;

/// `max(1, floor(balance * percent / 100))`
pub fn rob_take(target_balance: i64, percent: i64) -> i64 {
    (target_balance * percent / 100).max(1)
}

fn resolve<'i>(inv: &'i Invocation, user: &str, raw: &str) -> Result<&'i Target, CommandError> {
    inv.target.as_ref().ok_or_else(|| {
        let login = normalize_login(raw);
        CommandError::reject(format!("{user}, could not find user: {login}"))
            .warned("User Not Found", format!("**User:** {user}\n**Searched for:** {login}"))
    })
}

pub fn rob(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let game = ctx.cfg.games.rob.clone();
    let currency = ctx.currency().to_string();

    let Some(raw_target) = inv.input(0) else {
        return Err(CommandError::reject(format!(
            "{user}, who are you trying to rob? Usage: !rob @username"
        )));
    };
    let target = resolve(inv, user, raw_target)?;
    if target.id == user_id {
        return Err(CommandError::reject(format!("{user}, you can't rob yourself!")));
    }

    let cooldown = Cooldown::minutes("rob_cooldown", game.cooldown_minutes, Rendering::Minutes);
    ctx.gate(&cooldown, &scope, "Rob Cooldown Active", user, |left| {
        format!("{user}, you need to lay low! Try again in {left}.")
    })?;

    ctx.require(user_id, ROB_MIN_ROBBER_BALANCE, |_| {
        format!("{user}, you need at least {ROB_MIN_ROBBER_BALANCE} {currency} to attempt a robbery!")
    })?;
    let target_balance = ctx.ledger().balance(&target.id);
    if target_balance < ROB_MIN_TARGET_BALANCE {
        return Err(CommandError::reject(format!(
            "{user}, {} is too poor to rob!",
            target.display_name
        )));
    }

    // Stamped before the draw: a failed robbery costs the cooldown too.
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    if ctx.rng.gen_range(1..=100) <= game.success_rate {
        let (lo, hi) = (game.min_percent.min(game.max_percent), game.min_percent.max(game.max_percent));
        let percent = ctx.rng.gen_range(lo..=hi);
        let stolen = rob_take(target_balance, percent);

        let mut ledger = ctx.ledger();
        let victim_left = ledger.debit(&target.id, stolen).unwrap_or_default();
        let robber_now = ledger.credit(user_id, stolen);

        ctx.say(format!(
            "{user} successfully robbed ${stolen} {currency} from {}! Balance: ${robber_now}",
            target.display_name
        ));
        ctx.log(Record::success(
            "Robbery Successful",
            format!(
                "**Robber:** {user}\n**Victim:** {}\n**Stolen:** ${stolen} ({percent}%)\n**Robber Balance:** ${robber_now}\n**Victim Balance:** ${victim_left}",
                target.display_name
            ),
        ));
    } else {
        let robber_now = ctx.ledger().fine(user_id, ROB_FINE);
        ctx.say(format!(
            "{user} got caught trying to rob {} and paid a ${ROB_FINE} {currency} fine! Balance: ${robber_now}",
            target.display_name
        ));
        ctx.log(Record::warning(
            "Robbery Failed",
            format!(
                "**Robber:** {user}\n**Target:** {}\n**Fine:** ${ROB_FINE}\n**Balance:** ${robber_now}",
                target.display_name
            ),
        ));
    }
    Ok(())
}

pub fn duel(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let game = ctx.cfg.games.duel.clone();
    let currency = ctx.currency().to_string();
    let usage = format!("!duel @username {}-{}", game.min_bet, game.max_bet);

    let Some(raw_target) = inv.input(0) else {
        return Err(CommandError::reject(format!("{user}, who do you want to duel? Usage: {usage}")));
    };
    let Some(raw_bet) = inv.input(1) else {
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
    let target = resolve(inv, user, raw_target)?;
    if target.id == user_id {
        return Err(CommandError::reject(format!("{user}, you can't duel yourself!")));
    }
    let opponent = target.display_name.as_str();

    let scope = Scope::user(user_id);
    let cooldown = Cooldown::seconds("duel_last_played", game.cooldown_seconds);
    ctx.gate(&cooldown, &scope, "Duel Cooldown", user, |left| {
        format!("{user}, duel cooldown! Wait {left} before playing again.")
    })?;

    ctx.require(user_id, bet, |have| {
        format!("{user}, you only have ${have} {currency}! You need ${bet}.")
    })?;
    ctx.require(&target.id, bet, |have| {
        format!("{user}, {opponent} only has ${have} {currency}! They can't match your ${bet} bet.")
    })?;

    let mut ledger = ctx.ledger();
    ledger.debit(user_id, bet);
    ledger.debit(&target.id, bet);

    let challenger_roll = ctx.rng.gen_range(1..=100);
    let opponent_roll = ctx.rng.gen_range(1..=100);

    cooldown.stamp(ctx.vars, &scope, ctx.now);
    cooldown.stamp(ctx.vars, &Scope::user(&target.id), ctx.now);

    if challenger_roll == opponent_roll {
        let mut ledger = ctx.ledger();
        ledger.credit(user_id, bet);
        ledger.credit(&target.id, bet);
        ctx.say(format!(
            "⚔️ {user} ({challenger_roll}) vs {opponent} ({opponent_roll}) - IT'S A TIE! Bets returned."
        ));
        ctx.log(Record::info(
            "Duel Tie",
            format!("**Challenger:** {user} ({challenger_roll})\n**Opponent:** {opponent} ({opponent_roll})\n**Bet:** ${bet}"),
        ));
        return Ok(());
    }

    let (winner_id, winner, loser) = if challenger_roll > opponent_roll {
        (user_id, user, opponent)
    } else {
        (target.id.as_str(), opponent, user)
    };
    let winnings = bet * 2;
    let winner_balance = ctx.ledger().credit(winner_id, winnings);

    ctx.say(format!(
        "⚔️ {user} ({challenger_roll}) vs {opponent} ({opponent_roll}) - {winner} WINS ${winnings} {currency}!"
    ));
    ctx.log(Record::success(
        "Duel Won",
        format!("**Winner:** {winner}\n**Loser:** {loser}\n**Bet:** ${bet}\n**Winnings:** ${winnings}\n**Winner Balance:** ${winner_balance}"),
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::testing::*;
    use crate::store::{Vars, PERSISTENT};

    #[test]
    fn rob_take_rounds_down_but_takes_at_least_one() {
        assert_eq!(rob_take(100, 30), 30);
        assert_eq!(rob_take(15, 10), 1);
        assert_eq!(rob_take(99, 10), 9);
    }

    #[test]
    fn rob_checks_balances_before_stamping() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        let bob = user("2", "Bob");
        bench.fund("1", 49);
        bench.fund("2", 500);

        let err = bench.run(rob, &targeting(invoke(&alice, &["@bob"]), &bob)).unwrap_err();
        assert_eq!(err.to_string(), "Alice, you need at least 50 Cub Coins to attempt a robbery!");

        bench.fund("1", 100);
        bench.fund("2", 9);
        let err = bench.run(rob, &targeting(invoke(&alice, &["@bob"]), &bob)).unwrap_err();
        assert_eq!(err.to_string(), "Alice, Bob is too poor to rob!");
        assert!(bench.vars.time(&Scope::user("1"), "rob_cooldown", PERSISTENT).is_none());
    }

    #[test]
    fn rob_conserves_or_fines() {
        for seed in 0..40 {
            let mut bench = Bench::new(seed);
            let alice = user("1", "Alice");
            let bob = user("2", "Bob");
            bench.fund("1", 100);
            bench.fund("2", 200);

            bench.run(rob, &targeting(invoke(&alice, &["@bob"]), &bob)).unwrap();
            let (robber, victim) = (bench.balance("1"), bench.balance("2"));

            if victim == 200 {
                assert_eq!(robber, 50);
            } else {
                assert_eq!(robber + victim, 300);
                assert!((20..=60).contains(&(robber - 100)));
            }
            assert_eq!(bench.vars.time(&Scope::user("1"), "rob_cooldown", PERSISTENT), Some(now()));
        }
    }

    #[test]
    fn rob_yourself_is_rejected() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        let err = bench.run(rob, &targeting(invoke(&alice, &["@alice"]), &alice)).unwrap_err();
        assert_eq!(err.to_string(), "Alice, you can't rob yourself!");
    }

    #[test]
    fn duel_is_zero_sum_and_cools_both() {
        for seed in 0..40 {
            let mut bench = Bench::new(seed);
            let alice = user("1", "Alice");
            let bob = user("2", "Bob");
            bench.fund("1", 100);
            bench.fund("2", 100);

            bench.run(duel, &targeting(invoke(&alice, &["@bob", "50"]), &bob)).unwrap();
            let (a, b) = (bench.balance("1"), bench.balance("2"));

            assert_eq!(a + b, 200);
            assert!([(150, 50), (50, 150), (100, 100)].contains(&(a, b)));
            assert!(bench.vars.time(&Scope::user("2"), "duel_last_played", PERSISTENT).is_some());
        }
    }

    #[test]
    fn duel_needs_opponent_to_cover() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        let bob = user("2", "Bob");
        bench.fund("1", 100);
        bench.fund("2", 20);

        let err = bench.run(duel, &targeting(invoke(&alice, &["@bob", "50"]), &bob)).unwrap_err();
        assert_eq!(err.to_string(), "Alice, Bob only has $20 Cub Coins! They can't match your $50 bet.");
        assert_eq!(bench.balance("1"), 100);
    }
}
