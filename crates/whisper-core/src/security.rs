use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use crate::domain::UserId;

// ============== Authorization ==============

/// Admin commands are only for ids listed in the config. An empty list means nobody.
pub fn is_admin(user_id: Option<UserId>, admin_users: &[i64]) -> bool {
    let Some(user_id) = user_id else {
        return false;
    };
    admin_users.contains(&user_id.0)
}

// ============== Query Cooldown ==============

#[derive(Clone, Debug)]
struct LastQuery {
    at: Instant,
    text: String,
}

/// Last-seen throttle for inline queries.
///
/// A query is dropped when the same sender sent the identical text less than
/// `interval` ago. A changed query always goes through, so the newest keystroke
/// is never the one swallowed. A zero interval disables the check.
#[derive(Clone, Debug)]
pub struct QueryCooldown {
    interval: Duration,
    last: HashMap<UserId, LastQuery>,
}

impl QueryCooldown {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: HashMap::new(),
        }
    }

    pub fn check(&mut self, user_id: UserId, query: &str) -> bool {
        self.check_at(user_id, query, Instant::now())
    }

    /// `true` if the query may proceed. Allowed queries refresh the last-seen stamp.
    pub fn check_at(&mut self, user_id: UserId, query: &str, now: Instant) -> bool {
        if self.interval.is_zero() {
            return true;
        }

        if let Some(prev) = self.last.get(&user_id) {
            let within = now.saturating_duration_since(prev.at) < self.interval;
            if within && prev.text == query {
                return false;
            }
        }

        self.last.insert(
            user_id,
            LastQuery {
                at: now,
                text: query.to_string(),
            },
        );
        true
    }

    /// Forget senders idle for longer than the interval.
    pub fn prune(&mut self, now: Instant) {
        let interval = self.interval;
        self.last
            .retain(|_, q| now.saturating_duration_since(q.at) < interval);
    }

    pub fn tracked(&self) -> usize {
        self.last.len()
    }
}
