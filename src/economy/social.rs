use chrono::Duration;

use crate::error::CommandError;
use crate::helpers::normalize_login;
use crate::message::{Group, User};
use crate::store::{Scope, Vars, EPHEMERAL, PERSISTENT};
use crate::webhook::Record;

use super::{Ctx, Invocation};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn greeting(user: &User) -> String {
    let name = &user.display_name;
    if user.is_moderator() {
        format!("👋 Welcome, Mod {name}! 🛡️")
    } else if user.is(Group::SUBSCRIBER) {
        format!("👋 Welcome, subscriber {name}! Thanks for the support! 💜")
    } else if user.is(Group::VIP) {
        format!("👋 Welcome, VIP {name}! ⭐")
    } else {
        format!("👋 Welcome to the stream, {name}! 💜")
    }
}

/// Greets a chatter on their first line of the UTC day.
pub fn welcome(ctx: &mut Ctx<'_>, user: &User) -> Result<(), CommandError> {
    let scope = Scope::user(&user.id);
    let today = ctx.now.format(DATE_FORMAT).to_string();
    if ctx.vars.text(&scope, "last_welcome_date", PERSISTENT) == today {
        return Ok(());
    }
    ctx.vars.set(&scope, "last_welcome_date", today.as_str().into(), PERSISTENT);
    ctx.say(greeting(user));

    let counter = format!("first_timers_{today}");
    let count = ctx.vars.int(&Scope::Global, &counter, EPHEMERAL) + 1;
    ctx.vars.set(&Scope::Global, &counter, count.into(), EPHEMERAL);
    let yesterday = (ctx.now - Duration::days(1)).format(DATE_FORMAT);
    ctx.vars.unset(&Scope::Global, &format!("first_timers_{yesterday}"), EPHEMERAL);

    ctx.log(Record::success(
        "First Timer Welcomed",
        format!("**User:** {}\n**Date:** {today}\n**Daily Count:** {count}", user.display_name),
    ));
    Ok(())
}

pub fn shoutout(ctx: &mut Ctx<'_>, inv: &Invocation) -> Result<(), CommandError> {
    let user = inv.name();
    let Some(raw) = inv.input(0) else {
        return Err(CommandError::reject("Usage: !so @username or !shoutout @username"));
    };
    let Some(target) = &inv.target else {
        let login = normalize_login(raw);
        return Err(CommandError::reject(format!("Could not find user: {login}"))
            .warned("Shoutout - User Not Found", format!("**User:** {user}\n**Target:** {login}")));
    };

    let channel = &target.login;
    ctx.say(format!("Check out {channel} at https://twitch.tv/{channel} - They're a good creature!"));
    ctx.log(Record::success("Shoutout Complete", format!("**User:** {user}\n**Target:** {channel}")));
    Ok(())
}
