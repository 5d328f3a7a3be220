//! Status condition helpers with set-if-changed semantics.

use chrono::{DateTime, Utc};
use snapgate_state::Condition;

/// Set `new` in `conditions`, replacing any condition of the same type.
///
/// `last_transition_time` moves only when the status changes. Returns `true`
/// if anything observable changed; callers skip the store write otherwise.
pub fn set_status_condition(
    conditions: &mut Vec<Condition>,
    mut new: Condition,
    now: DateTime<Utc>,
) -> bool {
    match conditions
        .iter_mut()
        .find(|c| c.condition_type == new.condition_type)
    {
        None => {
            new.last_transition_time = Some(now);
            conditions.push(new);
            true
        }
        Some(existing) => {
            let mut changed = false;
            if existing.status != new.status {
                existing.status = new.status;
                existing.last_transition_time = Some(now);
                changed = true;
            }
            if existing.reason != new.reason {
                existing.reason = new.reason;
                changed = true;
            }
            if existing.message != new.message {
                existing.message = new.message;
                changed = true;
            }
            changed
        }
    }
}
