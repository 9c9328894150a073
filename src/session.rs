/*!
The session/access gate.

Logged-in identity lives server-side in an in-memory registry keyed by
an opaque cookie value. Each session carries one activity deadline that
every request (and the client-side heartbeat) rearms; there is no
per-request timer. A background sweeper drops sessions idle past the
window, and `touch()` also refuses them on contact, so an expired
session behaves as logged out even between sweeps.
*/
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};

/// Idle window after which a session counts as logged out.
pub const IDLE_WINDOW: Duration = Duration::from_secs(300);

use crate::user::User;

#[derive(Debug)]
struct Session {
    user: User,
    last_active: Instant,
}

/// Registry of live sessions.
#[derive(Debug)]
pub struct Sessions {
    idle: Duration,
    map: RwLock<HashMap<String, Session>>,
}

fn generate_key() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    let mut key = String::with_capacity(32);
    for b in bytes.iter() {
        write!(&mut key, "{:02x}", b).unwrap();
    }
    key
}

impl Sessions {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Open a session for `user`, returning the cookie value.
    pub async fn open(&self, user: User) -> String {
        let key = generate_key();
        log::trace!("Sessions::open() for {:?}.", &user.email);

        let session = Session {
            user,
            last_active: Instant::now(),
        };
        self.map.write().await.insert(key.clone(), session);

        key
    }

    /// Refresh the activity deadline for `key` and return a snapshot of
    /// the logged-in user.
    ///
    /// A session idle past the window is removed and treated exactly
    /// like a missing one, so callers see an implicit logout.
    pub async fn touch(&self, key: &str) -> Option<User> {
        let mut map = self.map.write().await;
        let session = map.get_mut(key)?;

        if session.last_active.elapsed() > self.idle {
            log::info!(
                "Session for {:?} idle past window; dropping.",
                &session.user.email
            );
            map.remove(key);
            return None;
        }

        session.last_active = Instant::now();
        Some(session.user.clone())
    }

    /// Replace the stored user snapshot (e.g. after a score update) and
    /// rearm the deadline.
    pub async fn update_user(&self, key: &str, user: User) {
        if let Some(session) = self.map.write().await.get_mut(key) {
            session.user = user;
            session.last_active = Instant::now();
        }
    }

    /// Destroy a session (logout).
    pub async fn close(&self, key: &str) {
        if let Some(session) = self.map.write().await.remove(key) {
            log::trace!("Session closed for {:?}.", &session.user.email);
        }
    }

    /// Drop every session idle past the window; returns how many went.
    pub async fn sweep(&self) -> usize {
        let mut map = self.map.write().await;
        let before = map.len();
        let idle = self.idle;
        map.retain(|_, s| s.last_active.elapsed() <= idle);
        before - map.len()
    }
}

/// Start the background task that periodically sweeps expired sessions.
pub fn spawn_sweeper(
    sessions: Arc<Sessions>,
    every: Duration
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let n = sessions.sweep().await;
            if n > 0 {
                log::info!("Session sweep dropped {} idle session(s).", n);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::Role;

    fn visitor(email: &str) -> User {
        User {
            id: 1,
            name: "A Visitor".to_owned(),
            email: email.to_owned(),
            role: Role::Student,
            verified: true,
            score: None,
            password_hash: String::new(),
            verification_code: None,
            reset_token: None,
            reset_expires: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn touch_rearms_the_deadline() {
        let sessions = Sessions::new(Duration::from_secs(300));
        let key = sessions.open(visitor("a@x.com")).await;

        // keep poking just inside the window; the session must survive
        // well past one idle window's worth of wall time
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(200)).await;
            assert!(sessions.touch(&key).await.is_some());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_an_implicit_logout() {
        let sessions = Sessions::new(Duration::from_secs(300));
        let key = sessions.open(visitor("a@x.com")).await;

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(sessions.touch(&key).await.is_none());
        // and it's gone, not just inactive
        assert!(sessions.touch(&key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() {
        let sessions = Sessions::new(Duration::from_secs(300));
        let stale = sessions.open(visitor("a@x.com")).await;
        tokio::time::advance(Duration::from_secs(250)).await;
        let fresh = sessions.open(visitor("b@y.com")).await;
        tokio::time::advance(Duration::from_secs(100)).await;

        assert_eq!(sessions.sweep().await, 1);
        assert!(sessions.touch(&stale).await.is_none());
        assert!(sessions.touch(&fresh).await.is_some());
    }

    #[tokio::test]
    async fn close_destroys_the_session() {
        let sessions = Sessions::new(Duration::from_secs(300));
        let key = sessions.open(visitor("a@x.com")).await;

        sessions.close(&key).await;
        assert!(sessions.touch(&key).await.is_none());
    }

    #[tokio::test]
    async fn keys_are_opaque_and_distinct() {
        let sessions = Sessions::new(Duration::from_secs(300));
        let a = sessions.open(visitor("a@x.com")).await;
        let b = sessions.open(visitor("b@y.com")).await;

        assert_ne!(a, b);
        assert_eq!(sessions.touch(&a).await.unwrap().email, "a@x.com");
        assert_eq!(sessions.touch(&b).await.unwrap().email, "b@y.com");
    }
}
