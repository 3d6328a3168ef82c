use crate::cooldown::Cooldown;
use crate::error::CommandError;
use crate::helpers::{normalize_login, parse_amount};
use crate::store::{Scope, Vars, PERSISTENT};
use crate::webhook::Record;

use super::{Ctx, Invocation};

pub fn balance(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let currency = ctx.currency().to_string();

    let (holder_id, holder_name) = match (inv.input(0), &inv.target) {
        (Some(raw), None) => {
            let login = normalize_login(raw);
            return Err(CommandError::reject(format!("{user}, could not find user: {login}"))
                .warned("!balance - User Not Found", format!("**User:** {user}\n**Searched for:** {login}")));
        }
        (_, Some(target)) => (target.id.as_str(), target.display_name.as_str()),
        (None, None) => (user_id, user),
    };

    let balance = ctx.ledger().balance(holder_id);
    ctx.say(format!("{holder_name} has ${balance} {currency}."));
    ctx.log(Record::command("!balance", user, &format!("{holder_name}: ${balance}")));
    Ok(())
}

pub fn give(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let currency = ctx.currency().to_string();
    let min = ctx.cfg.currency.give_min_amount;
    let usage = || CommandError::reject(format!("Usage: !give @username {min}+"));

    let (Some(raw_target), Some(raw_amount)) = (inv.input(0), inv.input(1)) else {
        return Err(usage());
    };
    let Some(amount) = parse_amount(raw_amount) else {
        return Err(CommandError::reject(format!("{user}, please enter a valid number.")));
    };
    if amount < min {
        return Err(CommandError::reject(format!("{user}, you must give at least {min} {currency}.")));
    }
    let Some(target) = &inv.target else {
        let login = normalize_login(raw_target);
        return Err(CommandError::reject(format!("{user}, could not find user: {login}"))
            .warned("Give - User Not Found", format!("**User:** {user}\n**Searched for:** {login}")));
    };
    if target.id == user_id {
        return Err(CommandError::reject(format!("{user}, you cannot give {currency} to yourself!")));
    }

    ctx.require(user_id, amount, |have| {
        format!("{user}, you only have ${have} {currency}. You need ${amount}.")
    })?;

    let mut ledger = ctx.ledger();
    let sender_left = ledger.debit(user_id, amount).unwrap_or_default();
    let receiver_now = ledger.credit(&target.id, amount);

    ctx.say(format!("{user} gave ${amount} {currency} to {}!", target.display_name));
    ctx.log(Record::success(
        "Coins Transferred",
        format!(
            "**From:** {user} (${sender_left})\n**To:** {} (${receiver_now})\n**Amount:** ${amount}",
            target.display_name
        ),
    ));
    Ok(())
}

pub fn daily(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let currency = ctx.currency().to_string();
    let reward = ctx.cfg.currency.daily_reward;

    let cooldown = Cooldown::hours("daily_lastclaim", ctx.cfg.currency.daily_cooldown_hours);
    ctx.gate(&cooldown, &scope, "Daily Cooldown Active", user, |left| {
        format!("{user}, you already claimed your daily {currency}! Come back in {left}.")
    })?;

    let total = ctx.ledger().credit(user_id, reward);
    let count = ctx.vars.int(&scope, "daily_claimcount", PERSISTENT) + 1;
    ctx.vars.set(&scope, "daily_claimcount", count.into(), PERSISTENT);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    ctx.say(format!(
        "{user} claimed their daily ${reward} {currency}! (Day {count}) Balance: ${total} {currency}"
    ));
    ctx.log(Record::success(
        "Daily Claimed Successfully",
        format!("**User:** {user}\n**Reward:** {reward} {currency}\n**New Balance:** {total} {currency}\n**Claim Count:** {count}"),
    ));
    Ok(())
}

pub fn leaderboard(ctx: &mut Ctx<'_>, _inv: &Invocation) -> Result<(), CommandError> {
    let currency = ctx.currency().to_string();
    let top = ctx.cfg.currency.leaderboard_size;

    let mut holders: Vec<(String, i64)> = ctx
        .vars
        .users_with(&ctx.cfg.currency.key, PERSISTENT)
        .into_iter()
        .map(|(id, value)| (id, value.as_int()))
        .filter(|(_, balance)| *balance > 0)
        .map(|(id, balance)| {
            let login = ctx.vars.text(&Scope::user(&id), "login", PERSISTENT);
            (if login.is_empty() { id } else { login }, balance)
        })
        .collect();

    if holders.is_empty() {
        ctx.say(format!("No one has any {currency} yet!"));
        return Ok(());
    }

    holders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    holders.truncate(top);

    let ranks: Vec<String> = holders
        .iter()
        .enumerate()
        .map(|(i, (login, balance))| format!("{}. {login} (${balance})", i + 1))
        .collect();
    ctx.say(format!("Top {} {currency} holders: {}", holders.len(), ranks.join(" ")));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::testing::*;
    use crate::store::Value;

    #[test]
    fn daily_pays_then_blocks() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");

        let first = bench.run(daily, &invoke(&alice, &[])).unwrap();
        assert_eq!(first, vec!["Alice claimed their daily $100 Cub Coins! (Day 1) Balance: $100 Cub Coins"]);

        let mut later = invoke(&alice, &[]);
        later.now = later.now + chrono::Duration::minutes(90);
        let err = bench.run(daily, &later).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Alice, you already claimed your daily Cub Coins! Come back in 22h 30m."
        );
        assert_eq!(bench.balance("1"), 100);
    }

    #[test]
    fn give_moves_coins_between_users() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        let bob = user("2", "Bob");
        bench.fund("1", 80);

        let inv = targeting(invoke(&alice, &["@bob", "30"]), &bob);
        let said = bench.run(give, &inv).unwrap();

        assert_eq!(said, vec!["Alice gave $30 Cub Coins to Bob!"]);
        assert_eq!(bench.balance("1"), 50);
        assert_eq!(bench.balance("2"), 30);
    }

    #[test]
    fn give_rejections_write_nothing() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        let bob = user("2", "Bob");
        bench.fund("1", 10);

        let cases = [
            (targeting(invoke(&alice, &["@bob"]), &bob), "Usage: !give @username 1+"),
            (targeting(invoke(&alice, &["@bob", "ten"]), &bob), "Alice, please enter a valid number."),
            (targeting(invoke(&alice, &["@alice", "5"]), &alice), "Alice, you cannot give Cub Coins to yourself!"),
            (invoke(&alice, &["@nobody", "5"]), "Alice, could not find user: nobody"),
            (targeting(invoke(&alice, &["@bob", "11"]), &bob), "Alice, you only have $10 Cub Coins. You need $11."),
        ];

        for (inv, expected) in cases {
            let err = bench.run(give, &inv).unwrap_err();
            assert_eq!(err.to_string(), expected);
        }
        assert_eq!(bench.balance("1"), 10);
        assert_eq!(bench.balance("2"), 0);
    }

    #[test]
    fn balance_of_self_and_target() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        let bob = user("2", "Bob");
        bench.fund("2", 42);

        assert_eq!(bench.run(balance, &invoke(&alice, &[])).unwrap(), vec!["Alice has $0 Cub Coins."]);
        assert_eq!(
            bench.run(balance, &targeting(invoke(&alice, &["bob"]), &bob)).unwrap(),
            vec!["Bob has $42 Cub Coins."]
        );
    }

    #[test]
    fn leaderboard_ranks_positive_balances() {
        let mut bench = Bench::new(1);
        assert_eq!(
            bench.run(leaderboard, &invoke(&user("1", "Alice"), &[])).unwrap(),
            vec!["No one has any Cub Coins yet!"]
        );

        for (id, login, coins) in [("1", "alice", 50), ("2", "bob", 300), ("3", "cara", 0), ("4", "dan", 120)] {
            bench.fund(id, coins);
            bench.vars.set(&Scope::user(id), "login", Value::from(login), PERSISTENT);
        }
        bench.cfg.currency.leaderboard_size = 2;

        assert_eq!(
            bench.run(leaderboard, &invoke(&user("1", "Alice"), &[])).unwrap(),
            vec!["Top 2 Cub Coins holders: 1. bob ($300) 2. dan ($120)"]
        );
    }
}
