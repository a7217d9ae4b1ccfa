//! Combine per-condition verdicts into one description verdict.
//!
//! Conditions fold left to right. The first condition seeds the accumulator
//! and its connector is ignored; every later condition applies its own
//! connector against the accumulator. There is no precedence, so
//! `A AND B OR C` is `(A AND B) OR C`.

use crate::incidents::{Condition, Connector};

/// Fold `conditions` with short-circuit evaluation. `eval` runs only for
/// conditions whose verdict can still change the accumulator; the first
/// error aborts the fold. An empty list yields `false`.
pub fn aggregate<E, F>(conditions: &[Condition], mut eval: F) -> Result<bool, E>
where
    F: FnMut(&Condition) -> Result<bool, E>,
{
    let mut iter = conditions.iter();
    let mut acc = match iter.next() {
        Some(first) => eval(first)?,
        None => return Ok(false),
    };

    for condition in iter {
        acc = match (condition.connector, acc) {
            (Connector::And, false) => false,
            (Connector::Or, true) => true,
            (Connector::And, true) | (Connector::Or, false) => eval(condition)?,
        };
    }

    Ok(acc)
}
