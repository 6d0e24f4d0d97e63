use std::ops::Add;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use serde::{Serialize, Deserialize};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Timestamp(pub Duration);

impl Timestamp {
    pub fn now() -> Self {
        let now = SystemTime::now();
        Self(now.duration_since(UNIX_EPOCH).unwrap_or_default())
    }

    pub fn zero() -> Self {
        Self(Duration::from_secs(0))
    }

    pub fn from_timeval(sec: i64, usec: i64) -> Self {
        let sec  = sec.max(0) as u64;
        let nsec = (usec.max(0) as u32).saturating_mul(1_000);
        Self(Duration::new(sec, nsec.min(999_999_999)))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        Timestamp(self.0 + rhs)
    }
}

/// Fires at most once per `delay` of timestamp progress.
pub struct Timer {
    delay: Duration,
    next:  Timestamp,
}

impl Timer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay,
            next:  Timestamp::zero(),
        }
    }

    pub fn ready(&mut self, ts: Timestamp) -> bool {
        let ready = self.next <= ts;
        if ready {
            self.next = ts + self.delay;
        }
        ready
    }
}
