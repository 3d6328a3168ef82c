use rand::{Rng, RngCore};

use crate::config::WagerGame;
use crate::cooldown::Cooldown;
use crate::error::CommandError;
use crate::helpers::parse_amount;
use crate::store::{Scope, Vars, EPHEMERAL};
use crate::webhook::Record;

use super::{Ctx, Invocation};

const ACTIVE: &str = "blackjack_active";
const BET: &str = "blackjack_bet";
const PLAYER_HAND: &str = "blackjack_player_hand";
const DEALER_HAND: &str = "blackjack_dealer_hand";
const START_TIME: &str = "blackjack_start_time";

const DEALER_STANDS_AT: i64 = 16;

/// Rank 1 (ace) to 13 (king), drawn with replacement.
fn draw(rng: &mut dyn RngCore) -> i64 {
    rng.gen_range(1..=13)
}

/// Aces count 11 until that would bust, then 1. Face cards count 10.
pub fn hand_value(hand: &[i64]) -> i64 {
    let mut total = 0;
    let mut soft_aces = 0;
    for &card in hand {
        total += match card {
            1 => {
                soft_aces += 1;
                11
            }
            10.. => 10,
            n => n,
        };
    }
    while total > 21 && soft_aces > 0 {
        total -= 10;
        soft_aces -= 1;
    }
    total
}

pub fn card_label(card: i64) -> String {
    match card {
        1 => "A".into(),
        11 => "J".into(),
        12 => "Q".into(),
        13 => "K".into(),
        n => n.to_string(),
    }
}

fn show(hand: &[i64]) -> String {
    hand.iter().map(|&c| card_label(c)).collect::<Vec<_>>().join(", ")
}

fn encode(hand: &[i64]) -> String {
    hand.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}

fn load_hand(ctx: &Ctx<'_>, scope: &Scope, key: &str) -> Result<Vec<i64>, CommandError> {
    let raw = ctx.vars.text(scope, key, EPHEMERAL);
    raw.split(',')
        .map(|c| c.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| CommandError::Internal(format!("corrupt {key} '{raw}': {e}")))
}

fn clear(ctx: &mut Ctx<'_>, scope: &Scope) {
    for key in [ACTIVE, BET, PLAYER_HAND, DEALER_HAND, START_TIME] {
        ctx.vars.unset(scope, key, EPHEMERAL);
    }
}

/// One round against the dealer. Bets start a game; `hit`/`stand` continue it.
pub fn play(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let game = ctx.cfg.games.blackjack.clone();
    let currency = ctx.currency().to_string();
    let scope = Scope::user(user_id);
    let cooldown = Cooldown::seconds("blackjack_last_played", game.cooldown_seconds);

    let Some(choice) = inv.input(0) else {
        return Err(CommandError::reject(format!(
            "{user}, usage: !blackjack <{}-{}> to start, or !blackjack hit/stand",
            game.min_bet, game.max_bet
        )));
    };
    let choice = choice.to_lowercase();
    let active = ctx.vars.flag(&scope, ACTIVE, EPHEMERAL);

    match choice.as_str() {
        "hit" | "h" | "stand" | "s" if !active => Err(CommandError::reject(format!(
            "{user}, you don't have an active blackjack game! Start one with !blackjack <bet>"
        ))),
        "hit" | "h" => hit(ctx, inv, &game, &cooldown),
        "stand" | "s" => stand(ctx, inv, &game, &cooldown),
        raw_bet => {
            ctx.gate(&cooldown, &scope, "Blackjack Cooldown", user, |left| {
                format!("{user}, blackjack cooldown! Wait {left} before starting a new game.")
            })?;
            let Some(bet) = parse_amount(raw_bet) else {
                return Err(CommandError::reject(format!(
                    "{user}, invalid input! Usage: !blackjack <{}-{}> or !blackjack hit/stand",
                    game.min_bet, game.max_bet
                )));
            };
            if !game.accepts(bet) {
                return Err(CommandError::reject(format!(
                    "{user}, bet must be between {} and {} {currency}!",
                    game.min_bet, game.max_bet
                )));
            }
            if active {
                return Err(CommandError::reject(format!(
                    "{user}, you already have an active game! Use !blackjack hit or !blackjack stand"
                )));
            }
            ctx.require(user_id, bet, |have| {
                format!("{user}, you need ${bet} {currency}! You have ${have}.")
            })?;
            deal(ctx, inv, bet, &cooldown)
        }
    }
}

fn deal(ctx: &mut Ctx<'_>, inv: &Invocation, bet: i64, cooldown: &Cooldown) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let timeout = ctx.cfg.currency.inactivity_timeout_seconds;

    let balance = ctx.ledger().debit(user_id, bet).unwrap_or_default();
    let player = [draw(ctx.rng), draw(ctx.rng)];
    let dealer = [draw(ctx.rng), draw(ctx.rng)];
    let total = hand_value(&player);
    ctx.log(Record::command("!blackjack", user, &format!("Bet: ${bet} | Start Game")));

    if total == 21 {
        let winnings = bet * 5 / 2;
        let balance = ctx.ledger().credit(user_id, winnings);
        cooldown.stamp(ctx.vars, &scope, ctx.now);
        ctx.say(format!("🃏 {user} | BLACKJACK! You win ${winnings}! Balance: ${balance}"));
        ctx.log(Record::success(
            "Blackjack - Natural 21",
            format!("**User:** {user}\n**Winnings:** ${winnings}\n**Balance:** ${balance}"),
        ));
        return Ok(());
    }

    ctx.vars.set(&scope, ACTIVE, true.into(), EPHEMERAL);
    ctx.vars.set(&scope, BET, bet.into(), EPHEMERAL);
    ctx.vars.set(&scope, PLAYER_HAND, encode(&player).into(), EPHEMERAL);
    ctx.vars.set(&scope, DEALER_HAND, encode(&dealer).into(), EPHEMERAL);
    ctx.vars.set_time(&scope, START_TIME, ctx.now, EPHEMERAL);

    ctx.say(format!(
        "🃏 {user} | Your hand: {} = {total} | Dealer shows: {} | Type !blackjack hit or !blackjack stand ({timeout}s timer)",
        show(&player),
        card_label(dealer[0]),
    ));
    tracing::debug!(user, bet, balance, "blackjack game started");
    Ok(())
}

fn hit(ctx: &mut Ctx<'_>, inv: &Invocation, game: &WagerGame, cooldown: &Cooldown) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);
    let timeout = ctx.cfg.currency.inactivity_timeout_seconds;

    if let Some(started) = ctx.vars.time(&scope, START_TIME, EPHEMERAL) {
        if (ctx.now - started).num_seconds() > timeout {
            ctx.say(format!(
                "⏱️ {user}, your Blackjack game timed out after {timeout} seconds of inactivity! Auto-standing..."
            ));
            return stand(ctx, inv, game, cooldown);
        }
    }

    let mut hand = load_hand(ctx, &scope, PLAYER_HAND)?;
    let dealer = load_hand(ctx, &scope, DEALER_HAND)?;
    let card = draw(ctx.rng);
    hand.push(card);
    ctx.vars.set(&scope, PLAYER_HAND, encode(&hand).into(), EPHEMERAL);
    let total = hand_value(&hand);
    let drew = format!("🃏 {user} drew {} | Your hand: {} = {total}", card_label(card), show(&hand));

    if total == 21 {
        ctx.say(format!("{drew}! 🎉 PERFECT 21! Auto-standing..."));
        return stand(ctx, inv, game, cooldown);
    }

    if total > 21 {
        let bet = ctx.vars.int(&scope, BET, EPHEMERAL);
        let balance = ctx.ledger().balance(user_id);
        clear(ctx, &scope);
        cooldown.stamp(ctx.vars, &scope, ctx.now);
        ctx.say(format!("{drew} | 💥 BUST! You lose ${bet}."));
        ctx.log(Record::warning(
            "Blackjack Bust",
            format!("**User:** {user}\n**Hand:** {total}\n**Loss:** ${bet}\n**Balance:** ${balance}"),
        ));
        return Ok(());
    }

    ctx.vars.set_time(&scope, START_TIME, ctx.now, EPHEMERAL);
    let dealer_shows = dealer.first().copied().map(card_label).unwrap_or_default();
    ctx.say(format!(
        "{drew} | Dealer shows: {dealer_shows} | Type !blackjack hit or !blackjack stand ({timeout}s timer)"
    ));
    Ok(())
}

fn stand(ctx: &mut Ctx<'_>, inv: &Invocation, game: &WagerGame, cooldown: &Cooldown) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let scope = Scope::user(user_id);

    let bet = ctx.vars.int(&scope, BET, EPHEMERAL);
    let player = hand_value(&load_hand(ctx, &scope, PLAYER_HAND)?);
    let mut dealer = load_hand(ctx, &scope, DEALER_HAND)?;
    let mut dealer_total = hand_value(&dealer);

    let mut narration = format!("Dealer has: {} = {dealer_total}", show(&dealer));
    while dealer_total < DEALER_STANDS_AT {
        let card = draw(ctx.rng);
        dealer.push(card);
        dealer_total = hand_value(&dealer);
        narration.push_str(&format!(" | Dealer hits {} → {dealer_total}", card_label(card)));
    }
    if dealer_total <= 21 {
        narration.push_str(&format!(" | Dealer stands at {dealer_total}"));
    }

    let (winnings, result) = if dealer_total > 21 {
        (bet * game.win_mult, "DEALER BUST! You win!")
    } else if player > dealer_total {
        (bet * game.win_mult, "You win!")
    } else if player == dealer_total {
        (bet, "PUSH! Tie game.")
    } else {
        (0, "Dealer wins.")
    };

    let balance = ctx.ledger().credit(user_id, winnings);
    clear(ctx, &scope);
    cooldown.stamp(ctx.vars, &scope, ctx.now);

    ctx.say(format!("🃏 {narration}"));
    ctx.pause(1000);
    ctx.say(format!(
        "🃏 {user} had {player} | Dealer ended with {dealer_total} | {result} Balance: ${balance}"
    ));

    let busted = if dealer_total > 21 { "YES" } else { "NO" };
    let summary = format!(
        "**User:** {user}\n**Player:** {player}\n**Dealer:** {dealer_total} ({})\n**Dealer Busted:** {busted}",
        show(&dealer)
    );
    ctx.log(if winnings > bet {
        Record::success("Blackjack Win", format!("{summary}\n**Winnings:** ${winnings}\n**Balance:** ${balance}"))
    } else if winnings == bet {
        Record::info("Blackjack Push", format!("{summary}\n**Result:** Push\n**Balance:** ${balance}"))
    } else {
        Record::warning("Blackjack Loss", format!("{summary}\n**Loss:** ${bet}\n**Balance:** ${balance}"))
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::economy::testing::*;
    use crate::store::PERSISTENT;
    use chrono::Duration;

    fn seat(bench: &mut Bench, id: &str, bet: i64, player: &str, dealer: &str, started: chrono::DateTime<chrono::Utc>) {
        let scope = Scope::user(id);
        bench.vars.set(&scope, ACTIVE, true.into(), EPHEMERAL);
        bench.vars.set(&scope, BET, bet.into(), EPHEMERAL);
        bench.vars.set(&scope, PLAYER_HAND, player.into(), EPHEMERAL);
        bench.vars.set(&scope, DEALER_HAND, dealer.into(), EPHEMERAL);
        bench.vars.set_time(&scope, START_TIME, started, EPHEMERAL);
    }

    #[test]
    fn hand_values() {
        assert_eq!(hand_value(&[1, 13]), 21);
        assert_eq!(hand_value(&[1, 1]), 12);
        assert_eq!(hand_value(&[1, 1, 9]), 21);
        assert_eq!(hand_value(&[12, 11, 2]), 22);
        assert_eq!(hand_value(&[1, 5, 10]), 16);
    }

    #[test]
    fn card_labels() {
        let labels: Vec<String> = [1, 7, 10, 11, 12, 13].into_iter().map(card_label).collect();
        assert_eq!(labels, ["A", "7", "10", "J", "Q", "K"]);
    }

    #[test]
    fn stand_pays_win_multiplier() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        bench.fund("1", 50);
        seat(&mut bench, "1", 50, "10,9", "10,8", now());

        let said = bench.run(play, &invoke(&alice, &["stand"])).unwrap();
        assert_eq!(
            said,
            vec![
                "🃏 Dealer has: 10, 8 = 18 | Dealer stands at 18",
                "🃏 Alice had 19 | Dealer ended with 18 | You win! Balance: $150",
            ]
        );
        assert!(!bench.vars.flag(&Scope::user("1"), ACTIVE, EPHEMERAL));
        assert_eq!(bench.vars.time(&Scope::user("1"), "blackjack_last_played", PERSISTENT), Some(now()));
    }

    #[test]
    fn stand_settles_loss_and_push() {
        let mut bench = Bench::new(1);
        seat(&mut bench, "1", 40, "13,7", "12,1,9", now());
        let said = bench.run(play, &invoke(&user("1", "Alice"), &["s"])).unwrap();
        assert_eq!(said[1], "🃏 Alice had 17 | Dealer ended with 20 | Dealer wins. Balance: $0");

        seat(&mut bench, "1", 40, "13,7", "12,7", now());
        let said = bench.run(play, &invoke(&user("1", "Alice"), &["s"])).unwrap();
        assert_eq!(said[1], "🃏 Alice had 17 | Dealer ended with 17 | PUSH! Tie game. Balance: $40");
    }

    #[test]
    fn stale_hit_auto_stands() {
        let mut bench = Bench::new(1);
        seat(&mut bench, "1", 30, "10,9", "10,10", now() - Duration::seconds(61));

        let said = bench.run(play, &invoke(&user("1", "Alice"), &["hit"])).unwrap();
        assert_eq!(
            said[0],
            "⏱️ Alice, your Blackjack game timed out after 60 seconds of inactivity! Auto-standing..."
        );
        assert_eq!(said[2], "🃏 Alice had 19 | Dealer ended with 20 | Dealer wins. Balance: $0");
        assert_eq!(bench.vars.get(&Scope::user("1"), PLAYER_HAND, EPHEMERAL), None);
    }

    #[test]
    fn hit_on_twenty_always_ends_the_game() {
        for seed in 0..30 {
            let mut bench = Bench::new(seed);
            seat(&mut bench, "1", 30, "10,10", "10,7", now());
            let said = bench.run(play, &invoke(&user("1", "Alice"), &["h"])).unwrap();

            assert!(said[0].contains("BUST") || said[0].contains("PERFECT 21"), "{said:?}");
            assert!(!bench.vars.flag(&Scope::user("1"), ACTIVE, EPHEMERAL));
        }
    }

    #[test]
    fn cooldown_only_gates_new_games() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        bench.fund("1", 200);
        bench
            .vars
            .set_time(&Scope::user("1"), "blackjack_last_played", now() - Duration::seconds(5), PERSISTENT);

        let err = bench.run(play, &invoke(&alice, &["50"])).unwrap_err();
        assert_eq!(err.to_string(), "Alice, blackjack cooldown! Wait 25s before starting a new game.");

        seat(&mut bench, "1", 50, "10,9", "10,8", now());
        assert!(bench.run(play, &invoke(&alice, &["stand"])).is_ok());
    }

    #[test]
    fn new_game_takes_the_bet_or_pays_a_natural() {
        for seed in 0..30 {
            let mut bench = Bench::new(seed);
            let alice = user("1", "Alice");
            bench.fund("1", 100);
            let said = bench.run(play, &invoke(&alice, &["50"])).unwrap();

            if said[0].contains("BLACKJACK!") {
                assert_eq!(bench.balance("1"), 175);
            } else {
                assert_eq!(bench.balance("1"), 50);
                assert!(bench.vars.flag(&Scope::user("1"), ACTIVE, EPHEMERAL));
                assert!(said[0].ends_with("Type !blackjack hit or !blackjack stand (60s timer)"));
            }
        }
    }

    #[test]
    fn rejections() {
        let mut bench = Bench::new(1);
        let alice = user("1", "Alice");
        bench.fund("1", 10);

        let cases = [
            (vec![], "Alice, usage: !blackjack <25-500> to start, or !blackjack hit/stand"),
            (vec!["hit"], "Alice, you don't have an active blackjack game! Start one with !blackjack <bet>"),
            (vec!["maybe"], "Alice, invalid input! Usage: !blackjack <25-500> or !blackjack hit/stand"),
            (vec!["5"], "Alice, bet must be between 25 and 500 Cub Coins!"),
            (vec!["30"], "Alice, you need $30 Cub Coins! You have $10."),
        ];
        for (inputs, expected) in cases {
            let err = bench.run(play, &invoke(&alice, &inputs)).unwrap_err();
            assert_eq!(err.to_string(), expected);
        }

        seat(&mut bench, "1", 30, "10,2", "10,8", now());
        let err = bench.run(play, &invoke(&alice, &["30"])).unwrap_err();
        assert_eq!(err.to_string(), "Alice, you already have an active game! Use !blackjack hit or !blackjack stand");
    }
}
