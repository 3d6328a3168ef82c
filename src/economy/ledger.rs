use crate::store::{Scope, Vars, PERSISTENT};

/// Balance arithmetic over the store, keyed by the configured currency key.
pub struct Ledger<'a> {
    vars: &'a mut dyn Vars,
    key: &'a str,
}

impl<'a> Ledger<'a> {
    pub fn new(vars: &'a mut dyn Vars, key: &'a str) -> Self {
        Ledger { vars, key }
    }

    pub fn balance(&self, user_id: &str) -> i64 {
        self.vars.int(&Scope::user(user_id), self.key, PERSISTENT)
    }

    /// Add `amount` and return the new balance.
    pub fn credit(&mut self, user_id: &str, amount: i64) -> i64 {
        let balance = self.balance(user_id) + amount;
        self.write(user_id, balance);
        balance
    }

    /// Take `amount` if the user can cover it. Returns the new balance, or
    /// `None` without writing anything when they can't.
    pub fn debit(&mut self, user_id: &str, amount: i64) -> Option<i64> {
        let balance = self.balance(user_id);
        if amount < 0 || balance < amount {
            return None;
        }
        self.write(user_id, balance - amount);
        Some(balance - amount)
    }

    /// Take up to `amount`, stopping at zero. Returns the new balance.
    pub fn fine(&mut self, user_id: &str, amount: i64) -> i64 {
        let balance = (self.balance(user_id) - amount).max(0);
        self.write(user_id, balance);
        balance
    }

    fn write(&mut self, user_id: &str, balance: i64) {
        self.vars
            .set(&Scope::user(user_id), self.key, balance.into(), PERSISTENT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Snapshot;
    use proptest::prelude::*;

    #[test]
    fn bet_fifty_win_double() {
        let mut vars = Snapshot::default();
        let mut ledger = Ledger::new(&mut vars, "cubcoins");
        ledger.credit("1", 100);

        assert_eq!(ledger.debit("1", 50), Some(50));
        assert_eq!(ledger.credit("1", 50 * 2), 150);
    }

    #[test]
    fn overdraw_writes_nothing() {
        let mut vars = Snapshot::default();
        let mut ledger = Ledger::new(&mut vars, "cubcoins");
        ledger.credit("1", 20);

        assert_eq!(ledger.debit("1", 21), None);
        assert_eq!(ledger.balance("1"), 20);
        assert_eq!(ledger.fine("1", 50), 0);
    }

    proptest! {
        #[test]
        fn debit_never_goes_negative(start in 0i64..10_000, cost in 0i64..20_000) {
            let mut vars = Snapshot::default();
            let mut ledger = Ledger::new(&mut vars, "cubcoins");
            ledger.credit("u", start);

            match ledger.debit("u", cost) {
                Some(left) => {
                    prop_assert_eq!(left, start - cost);
                    prop_assert!(left >= 0);
                }
                None => {
                    prop_assert!(cost > start);
                    prop_assert_eq!(ledger.balance("u"), start);
                }
            }
        }

        #[test]
        fn fines_floor_at_zero(start in 0i64..1_000, fine in 0i64..2_000) {
            let mut vars = Snapshot::default();
            let mut ledger = Ledger::new(&mut vars, "cubcoins");
            ledger.credit("u", start);
            prop_assert_eq!(ledger.fine("u", fine), (start - fine).max(0));
        }
    }
}
