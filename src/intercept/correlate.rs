use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use log::trace;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;
use crate::flow::Key;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Target {
    pub server: SocketAddr,
    pub key:    Key,
}

/// Matches connections arriving at the proxy with the handshakes seen on
/// the wire, keyed by the client's address. Registrations nobody looks up
/// expire after `ttl`.
pub struct Correlation {
    inner: Mutex<Inner>,
    ttl:   Duration,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SocketAddr, (Target, Instant)>,
    waiters: HashMap<SocketAddr, oneshot::Sender<Target>>,
}

impl Correlation {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttl:   ttl,
        }
    }

    pub fn register(&self, client: SocketAddr, target: Target) {
        let mut inner = self.inner.lock();
        let now       = Instant::now();

        inner.expire(now, self.ttl);

        if let Some(tx) = inner.waiters.remove(&client) {
            match tx.send(target) {
                Ok(())      => return,
                Err(target) => trace!("waiter for {} gone, keeping {}", client, target.key),
            }
        }

        inner.entries.insert(client, (target, now));
    }

    /// Take the registration for `client`, waiting up to `wait` for it to
    /// appear. Returns `None` on timeout or when the table is cleared.
    pub async fn lookup(&self, client: SocketAddr, wait: Duration) -> Option<Target> {
        let rx = {
            let mut inner = self.inner.lock();
            inner.expire(Instant::now(), self.ttl);
            if let Some((target, _)) = inner.entries.remove(&client) {
                return Some(target);
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.insert(client, tx);
            rx
        };

        match timeout(wait, rx).await {
            Ok(Ok(target)) => Some(target),
            _              => {
                self.inner.lock().waiters.retain(|_, tx| !tx.is_closed());
                None
            }
        }
    }

    pub fn pending(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.expire(Instant::now(), self.ttl);
        inner.entries.len()
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.waiters.clear();
    }
}

impl Inner {
    fn expire(&mut self, now: Instant, ttl: Duration) {
        let before = self.entries.len();
        self.entries.retain(|_, (_, at)| now.duration_since(*at) < ttl);
        let expired = before - self.entries.len();
        if expired > 0 {
            trace!("expired {} registrations", expired);
        }
    }
}
