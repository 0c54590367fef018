//! Session-scoped capability cache for anonymous-token reveals. A grant
//! remembers that (ticket, actor) proved their right to see the token, so
//! repeated reads within the TTL skip password re-verification. Not part of
//! the durable data model.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub struct RevealCache {
    ttl: Duration,
    grants: Mutex<HashMap<(Uuid, Uuid), DateTime<Utc>>>,
}

impl RevealCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            grants: Mutex::new(HashMap::new()),
        }
    }

    pub fn grant(&self, ticket_id: Uuid, user_id: Uuid) {
        let expires_at = Utc::now() + self.ttl;
        let mut grants = self.grants.lock().expect("reveal cache poisoned");
        grants.insert((ticket_id, user_id), expires_at);
    }

    pub fn is_granted(&self, ticket_id: Uuid, user_id: Uuid) -> bool {
        let now = Utc::now();
        let mut grants = self.grants.lock().expect("reveal cache poisoned");
        match grants.get(&(ticket_id, user_id)) {
            Some(expires_at) if *expires_at > now => true,
            Some(_) => {
                grants.remove(&(ticket_id, user_id));
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grant_is_scoped_to_ticket_and_user() {
        let cache = RevealCache::new(Duration::minutes(5));
        let ticket = Uuid::new_v4();
        let user = Uuid::new_v4();

        cache.grant(ticket, user);
        assert!(cache.is_granted(ticket, user));
        assert!(!cache.is_granted(ticket, Uuid::new_v4()));
        assert!(!cache.is_granted(Uuid::new_v4(), user));
    }

    #[test]
    fn expired_grants_are_dropped() {
        let cache = RevealCache::new(Duration::minutes(-1));
        let ticket = Uuid::new_v4();
        let user = Uuid::new_v4();

        cache.grant(ticket, user);
        assert!(!cache.is_granted(ticket, user));
        // Second lookup hits the removed-entry path.
        assert!(!cache.is_granted(ticket, user));
    }
}
