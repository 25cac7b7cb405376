//! Predicates over stats and flags.
use crate::data::{Condition, FlagCheck};
use crate::stats::{Flags, Stats};

/// Evaluate one condition. Unknown stat names never hold.
#[must_use]
pub fn check_condition(stats: &Stats, condition: &Condition, flags: &Flags) -> bool {
    match condition {
        Condition::Stat {
            stat,
            operator,
            value,
        } => stat
            .key()
            .is_some_and(|key| operator.holds(stats.get(key), *value)),
        Condition::Flag { flag, operator } => {
            let present = flags.contains(flag);
            match operator {
                FlagCheck::HasFlag => present,
                FlagCheck::NotFlag => !present,
            }
        }
    }
}

/// Conjunction of `conditions`; an empty list holds.
#[must_use]
pub fn check_all_conditions(stats: &Stats, conditions: &[Condition], flags: &Flags) -> bool {
    conditions
        .iter()
        .all(|condition| check_condition(stats, condition, flags))
}
