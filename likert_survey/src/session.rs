//! Per-respondent form state.
//!
//! A session is created on the first visit, touched on every access and torn
//! down once it has been idle for longer than the time-to-live.

use log::{debug, info};
use std::collections::HashMap;
use std::fmt::Display;

use crate::config::*;

#[derive(Eq, PartialEq, Debug, Clone, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(s: &str) -> SessionId {
        SessionId(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is answering, and for which organization.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Identity {
    pub respondent: String,
    pub date: String,
    pub organization: String,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub identity: Identity,
    pub responses: Response,
    pub observations: Option<String>,
    /// Set once the rows have been appended to the store.
    pub submitted: bool,
    pub created_at: u64,
    pub last_seen: u64,
}

impl Session {
    fn is_expired(&self, now: u64, ttl_secs: u64) -> bool {
        now.saturating_sub(self.last_seen) > ttl_secs
    }
}

pub struct SessionStore {
    sessions: HashMap<SessionId, Session>,
    ttl_secs: u64,
    // Makes ids unique even when two sessions open in the same second.
    counter: u64,
}

impl SessionStore {
    pub fn new(ttl_secs: u64) -> SessionStore {
        SessionStore {
            sessions: HashMap::new(),
            ttl_secs,
            counter: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn next_id(&mut self, organization: &str, now: u64) -> SessionId {
        self.counter += 1;
        let seed = format!("{}|{}|{}", organization, now, self.counter);
        let digest = sha256::digest(seed.as_str());
        SessionId(digest[..16].to_string())
    }

    /// Returns the live session with this id, or starts a new one for the organization.
    ///
    /// A known but expired id is torn down and replaced by a fresh session.
    pub fn open(&mut self, id: Option<&SessionId>, organization: &str, now: u64) -> &mut Session {
        let ttl = self.ttl_secs;
        let sid = match id {
            Some(sid) => match self.sessions.get(sid) {
                Some(s) if !s.is_expired(now, ttl) => sid.clone(),
                Some(_) => {
                    info!("SessionStore::open: session {} expired", sid);
                    self.sessions.remove(sid);
                    self.next_id(organization, now)
                }
                None => self.next_id(organization, now),
            },
            None => self.next_id(organization, now),
        };
        let session = self.sessions.entry(sid.clone()).or_insert_with(|| {
            info!(
                "SessionStore::open: new session {} for {:?}",
                sid, organization
            );
            Session {
                id: sid.clone(),
                identity: Identity {
                    organization: organization.to_string(),
                    ..Identity::default()
                },
                responses: Response::new(),
                observations: None,
                submitted: false,
                created_at: now,
                last_seen: now,
            }
        });
        session.last_seen = now;
        session
    }

    /// Accesses a live session, refreshing its idle timer.
    pub fn get_mut(&mut self, id: &SessionId, now: u64) -> Result<&mut Session, SurveyError> {
        let ttl = self.ttl_secs;
        match self.sessions.get_mut(id) {
            Some(s) if !s.is_expired(now, ttl) => {
                s.last_seen = now;
                Ok(s)
            }
            _ => Err(SurveyError::UnknownSession(id.to_string())),
        }
    }

    /// Moves the state of an idle session into a fresh one and returns the new id.
    ///
    /// Live sessions keep their id. `None` if the id was never opened or was torn down.
    pub fn renew(&mut self, id: &SessionId, now: u64) -> Option<SessionId> {
        let ttl = self.ttl_secs;
        let old = match self.sessions.get(id) {
            Some(s) if !s.is_expired(now, ttl) => return Some(id.clone()),
            Some(_) => self.sessions.remove(id)?,
            None => return None,
        };
        let sid = self.next_id(&old.identity.organization, now);
        info!("SessionStore::renew: session {} continues as {}", id, sid);
        self.sessions.insert(
            sid.clone(),
            Session {
                id: sid.clone(),
                created_at: now,
                last_seen: now,
                ..old
            },
        );
        Some(sid)
    }

    /// Ends a session explicitly, returning its final state.
    pub fn close(&mut self, id: &SessionId) -> Option<Session> {
        debug!("SessionStore::close: {}", id);
        self.sessions.remove(id)
    }

    /// Tears down all the idle sessions. Returns the ids that were removed.
    pub fn expire(&mut self, now: u64) -> Vec<SessionId> {
        let ttl = self.ttl_secs;
        let mut expired: Vec<SessionId> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(now, ttl))
            .map(|s| s.id.clone())
            .collect();
        expired.sort();
        for sid in expired.iter() {
            self.sessions.remove(sid);
        }
        if !expired.is_empty() {
            info!("SessionStore::expire: removed {} sessions", expired.len());
        }
        expired
    }
}
