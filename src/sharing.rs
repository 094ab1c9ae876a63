use crate::chat::ChatSession;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A read-only, token-addressed snapshot of a test conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    pub token: Uuid,
    pub session: ChatSession,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl ShareLink {
    pub fn new(session: ChatSession, created_by: Uuid, ttl: Option<Duration>) -> Self {
        let created_at = Utc::now();
        Self {
            token: Uuid::new_v4(),
            session,
            created_by,
            created_at,
            expires_at: ttl.map(|t| created_at + t),
            revoked: false,
        }
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at.is_none_or(|exp| now < exp)
    }

    pub fn revoke(&mut self) {
        self.revoked = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> ChatSession {
        let mut s = ChatSession::new(Uuid::new_v4(), 1, Uuid::new_v4());
        s.push_user("hi");
        s
    }

    #[test]
    fn link_expires() {
        let link = ShareLink::new(session(), Uuid::new_v4(), Some(Duration::hours(1)));
        assert!(link.is_active(link.created_at));
        assert!(!link.is_active(link.created_at + Duration::hours(1)));
    }

    #[test]
    fn link_without_ttl_lives_until_revoked() {
        let mut link = ShareLink::new(session(), Uuid::new_v4(), None);
        assert!(link.is_active(link.created_at + Duration::days(365)));
        link.revoke();
        assert!(!link.is_active(link.created_at));
    }

    #[test]
    fn snapshot_is_detached() {
        let mut original = session();
        let link = ShareLink::new(original.clone(), Uuid::new_v4(), None);
        original.push_agent("later");
        assert_eq!(link.session.messages.len(), 1);
    }
}
