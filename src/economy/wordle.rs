use rand::Rng;

use crate::cooldown::Cooldown;
use crate::error::CommandError;
use crate::store::{Scope, Vars, EPHEMERAL};
use crate::webhook::{Level, Record};

use super::{Ctx, Invocation};

const WORD: &str = "wordle_current_word";
const GUESS_COUNT: &str = "wordle_guess_count";
const GUESSES: &str = "wordle_guesses";
const OWNER_ID: &str = "wordle_game_owner_id";
const OWNER_NAME: &str = "wordle_game_owner_name";
const LAST_ACTION: &str = "wordle_last_action";

const WORD_LEN: usize = 5;

/// Per-letter marks for `guess` against `answer`. Exact matches claim their
/// letter first so a repeated guess letter only turns yellow while the answer
/// still has an unclaimed copy of it.
pub fn feedback(guess: &str, answer: &str) -> String {
    let guess: Vec<char> = guess.chars().collect();
    let answer: Vec<char> = answer.chars().collect();
    let mut marks = vec!["⬛"; guess.len()];
    let mut claimed = vec![false; answer.len()];

    for (i, g) in guess.iter().enumerate() {
        if answer.get(i) == Some(g) {
            marks[i] = "🟩";
            claimed[i] = true;
        }
    }
    for (i, g) in guess.iter().enumerate() {
        if marks[i] == "🟩" {
            continue;
        }
        if let Some(j) = (0..answer.len()).find(|&j| !claimed[j] && answer[j] == *g) {
            marks[i] = "🟨";
            claimed[j] = true;
        }
    }
    marks.concat()
}

fn clear(ctx: &mut Ctx<'_>) {
    for key in [WORD, GUESS_COUNT, GUESSES, OWNER_ID, OWNER_NAME, LAST_ACTION] {
        ctx.vars.unset(&Scope::Global, key, EPHEMERAL);
    }
}

/// The one chat-wide Wordle game. No argument starts a game; a word guesses.
pub fn play(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let game = ctx.cfg.games.wordle.clone();
    let currency = ctx.currency().to_string();
    let timeout = ctx.cfg.currency.inactivity_timeout_seconds;
    let max = game.max_guesses;
    let global = Scope::Global;
    let cooldown = Cooldown::seconds("wordle_last_played", game.cooldown_seconds).ephemeral();

    let pool = game.word_pool();
    if pool.is_empty() {
        return Err(CommandError::reject("⚠️ Wordle error: No words available.").logged(
            Level::Error,
            "Wordle Error",
            "No playable words configured under [games.wordle].words",
        ));
    }

    let guess = inv.input(0).map(str::to_uppercase);

    if let Some(last) = ctx.vars.time(&global, LAST_ACTION, EPHEMERAL) {
        let idle = ctx.now - last;
        if idle.num_milliseconds() > timeout * 1000 {
            let owner = ctx.vars.text(&global, OWNER_NAME, EPHEMERAL);
            clear(ctx);
            cooldown.stamp(ctx.vars, &global, ctx.now);
            ctx.say(format!("⏱️ Wordle game by {owner} timed out after {timeout} seconds of inactivity!"));
            ctx.log(Record::warning(
                "Wordle Timeout",
                format!("**Owner:** {owner}\n**Idle Time:** {} seconds", idle.num_seconds()),
            ));
            return Ok(());
        }
    }

    let word = ctx.vars.text(&global, WORD, EPHEMERAL);
    if word.is_empty() {
        if guess.is_some() {
            return Err(CommandError::reject(format!(
                "{user}, there's no active Wordle game! Use !wordle (no word) to start a new game first."
            )));
        }
        return start(ctx, inv, &pool);
    }

    let owner = ctx.vars.text(&global, OWNER_NAME, EPHEMERAL);
    let count = ctx.vars.int(&global, GUESS_COUNT, EPHEMERAL);
    let Some(guess) = guess else {
        return Err(CommandError::reject(format!(
            "{user}, there is currently a game by {owner}! Please try the command once they have finished their game. Guesses left: {}/{max}",
            max - count
        )));
    };
    if ctx.vars.text(&global, OWNER_ID, EPHEMERAL) != user_id {
        return Err(CommandError::reject(format!(
            "{user}, only {owner} can guess in their Wordle game! Wait for them to finish."
        )));
    }
    if guess.len() != WORD_LEN || !guess.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(CommandError::reject(format!("{user}, your guess must be exactly 5 letters!")));
    }
    let mut guesses: Vec<String> = ctx
        .vars
        .text(&global, GUESSES, EPHEMERAL)
        .split(',')
        .filter(|g| !g.is_empty())
        .map(str::to_string)
        .collect();
    if guesses.contains(&guess) {
        return Err(CommandError::reject(format!(
            "{user}, you already guessed '{guess}'! Try a different word."
        )));
    }

    let count = count + 1;
    let marks = feedback(&guess, &word);
    guesses.push(guess.clone());
    ctx.vars.set(&global, GUESSES, guesses.join(",").into(), EPHEMERAL);
    ctx.vars.set(&global, GUESS_COUNT, count.into(), EPHEMERAL);
    ctx.vars.set_time(&global, LAST_ACTION, ctx.now, EPHEMERAL);

    if guess == word {
        let balance = ctx.ledger().credit(user_id, game.win_reward);
        clear(ctx);
        cooldown.stamp(ctx.vars, &global, ctx.now);
        ctx.say(format!(
            "🎉 {marks} | {user} WON Wordle in {count}/{max} guesses! +${} {currency}! Balance: ${balance}",
            game.win_reward
        ));
        ctx.log(Record::success(
            "Wordle Win",
            format!(
                "**User:** {user}\n**Word:** {word}\n**Guesses:** {count}/{max}\n**Reward:** ${}\n**New Balance:** ${balance}",
                game.win_reward
            ),
        ));
        return Ok(());
    }

    if count >= max {
        clear(ctx);
        cooldown.stamp(ctx.vars, &global, ctx.now);
        ctx.say(format!("❌ {marks} | {user} ran out of guesses! The word was: {word}"));
        ctx.log(Record::warning(
            "Wordle Loss",
            format!("**User:** {user}\n**Word:** {word}\n**Guesses:** {count}/{max}"),
        ));
        return Ok(());
    }

    ctx.say(format!("🎯 {marks} | {user} has {} guesses left!", max - count));
    Ok(())
}

fn start(ctx: &mut Ctx<'_>, inv: &Invocation, pool: &[String]) -> Result<(), CommandError> {
    let user_id = inv.user_id()?;
    let user = inv.name();
    let game = ctx.cfg.games.wordle.clone();
    let currency = ctx.currency().to_string();
    let global = Scope::Global;

    let cooldown = Cooldown::seconds("wordle_last_played", game.cooldown_seconds).ephemeral();
    ctx.gate(&cooldown, &global, "Wordle Cooldown", user, |left| {
        format!("{user}, Wordle is on cooldown! Wait {left} before starting a new game.")
    })?;
    ctx.require(user_id, game.cost, |have| {
        format!("{user}, you need ${} {currency} to play Wordle! Balance: ${have}", game.cost)
    })?;

    ctx.ledger().debit(user_id, game.cost);
    let word = pool[ctx.rng.gen_range(0..pool.len())].clone();

    ctx.vars.set(&global, WORD, word.as_str().into(), EPHEMERAL);
    ctx.vars.set(&global, GUESS_COUNT, 0i64.into(), EPHEMERAL);
    ctx.vars.set(&global, GUESSES, "".into(), EPHEMERAL);
    ctx.vars.set(&global, OWNER_ID, user_id.into(), EPHEMERAL);
    ctx.vars.set(&global, OWNER_NAME, user.into(), EPHEMERAL);
    ctx.vars.set_time(&global, LAST_ACTION, ctx.now, EPHEMERAL);

    ctx.say(format!(
        "🎮 {user} started Wordle! Cost: ${} {currency}. Type !wordle [word] to guess! Guesses left: {}",
        game.cost, game.max_guesses
    ));
    ctx.log(Record::info(
        "Wordle Game Started",
        format!(
            "**User:** {user}\n**Cost:** ${}\n**Word:** {word}\n**Max Guesses:** {}",
            game.cost, game.max_guesses
        ),
    ));
    Ok(())
}
