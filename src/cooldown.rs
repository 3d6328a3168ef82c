use chrono::{DateTime, Duration, Utc};

use crate::store::{Scope, Vars};

/// How a command words the time left on its cooldown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rendering {
    /// `12m 5s`
    MinutesSeconds,
    /// `20 minutes`
    Minutes,
    /// `3h 41m`
    HoursMinutes,
    /// `14s`, or `1m 5s` once past a minute
    Short,
}

pub fn render(remaining: Duration, rendering: Rendering) -> String {
    let total_secs = remaining.num_seconds().max(0);
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;

    match rendering {
        Rendering::MinutesSeconds => format!("{minutes}m {seconds}s"),
        Rendering::Minutes => format!("{minutes} minutes"),
        Rendering::HoursMinutes => format!("{}h {}m", minutes / 60, minutes % 60),
        Rendering::Short if total_secs < 60 => format!("{total_secs}s"),
        Rendering::Short => format!("{minutes}m {seconds}s"),
    }
}

/// A last-used timestamp stored under `key`, blocking reuse for `duration`.
#[derive(Clone, Debug)]
pub struct Cooldown {
    pub key: &'static str,
    pub duration: Duration,
    pub rendering: Rendering,
    pub persisted: bool,
}

impl Cooldown {
    pub fn minutes(key: &'static str, minutes: i64, rendering: Rendering) -> Self {
        Cooldown {
            key,
            duration: Duration::minutes(minutes),
            rendering,
            persisted: true,
        }
    }

    pub fn hours(key: &'static str, hours: i64) -> Self {
        Cooldown {
            key,
            duration: Duration::hours(hours),
            rendering: Rendering::HoursMinutes,
            persisted: true,
        }
    }

    pub fn seconds(key: &'static str, seconds: i64) -> Self {
        Cooldown {
            key,
            duration: Duration::seconds(seconds),
            rendering: Rendering::Short,
            persisted: true,
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.persisted = false;
        self
    }

    /// Time left, or `None` once `now - last >= duration` or nothing was ever stamped.
    pub fn remaining(&self, vars: &dyn Vars, scope: &Scope, now: DateTime<Utc>) -> Option<Duration> {
        let last = vars.time(scope, self.key, self.persisted)?;
        let remaining = self.duration - (now - last);
        (remaining > Duration::zero()).then_some(remaining)
    }

    /// Rendered time left while the cooldown is active.
    pub fn active(&self, vars: &dyn Vars, scope: &Scope, now: DateTime<Utc>) -> Option<String> {
        self.remaining(vars, scope, now)
            .map(|remaining| render(remaining, self.rendering))
    }

    pub fn stamp(&self, vars: &mut dyn Vars, scope: &Scope, now: DateTime<Utc>) {
        vars.set_time(scope, self.key, now, self.persisted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Snapshot, Value, PERSISTENT};
    use proptest::prelude::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn thirty_minute_cooldown_used_ten_minutes_ago() {
        let mut vars = Snapshot::default();
        let scope = Scope::user("7");
        let rob = Cooldown::minutes("rob_cooldown", 30, Rendering::Minutes);

        rob.stamp(&mut vars, &scope, at(0));
        assert_eq!(rob.active(&vars, &scope, at(10 * 60)).as_deref(), Some("20 minutes"));
    }

    #[test]
    fn renderings_truncate() {
        let left = Duration::seconds(3 * 3600 + 41 * 60 + 59);
        assert_eq!(render(left, Rendering::HoursMinutes), "3h 41m");
        assert_eq!(render(left, Rendering::MinutesSeconds), "221m 59s");
        assert_eq!(render(Duration::milliseconds(14_900), Rendering::Short), "14s");
        assert_eq!(render(Duration::seconds(65), Rendering::Short), "1m 5s");
        assert_eq!(render(Duration::seconds(59), Rendering::Minutes), "0 minutes");
    }

    #[test]
    fn expires_exactly_at_duration() {
        let mut vars = Snapshot::default();
        let scope = Scope::user("7");
        let dice = Cooldown::seconds("dice_last_played", 15);

        dice.stamp(&mut vars, &scope, at(0));
        assert!(dice.remaining(&vars, &scope, at(14)).is_some());
        assert!(dice.remaining(&vars, &scope, at(15)).is_none());
    }

    #[test]
    fn garbage_timestamp_counts_as_never_used() {
        let mut vars = Snapshot::default();
        let scope = Scope::user("7");
        vars.set(&scope, "work_cooldown", Value::Text("not a date".into()), PERSISTENT);

        let work = Cooldown::minutes("work_cooldown", 30, Rendering::MinutesSeconds);
        assert!(work.active(&vars, &scope, at(0)).is_none());
    }

    proptest! {
        #[test]
        fn stamped_cooldown_blocks_until_elapsed(duration in 1i64..100_000, elapsed in 0i64..200_000) {
            let mut vars = Snapshot::default();
            let scope = Scope::user("p");
            let cd = Cooldown::seconds("crash_last_played", duration);

            cd.stamp(&mut vars, &scope, at(0));
            let remaining = cd.remaining(&vars, &scope, at(elapsed));

            prop_assert_eq!(remaining.is_some(), elapsed < duration);
            if let Some(left) = remaining {
                prop_assert_eq!(left.num_seconds(), duration - elapsed);
            }
        }
    }
}
