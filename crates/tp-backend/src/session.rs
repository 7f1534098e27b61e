//! Session id generation.
//!
//! Ids look like `session_1760000000000_k3j9x0q2a`: the creation time in
//! Unix milliseconds and nine base-36 characters of randomness. Time and
//! randomness are injected so ids are reproducible in tests.

use std::time::{SystemTime, UNIX_EPOCH};

use tp_protocol::SessionId;
use uuid::Uuid;

const SUFFIX_LEN: usize = 9;
const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Source of the current time.
pub trait Clock {
    fn now_millis(&self) -> u64;
}

/// Source of random bits.
pub trait RandomSource {
    fn next_u64(&mut self) -> u64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Randomness drawn from v4 UUIDs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRandom;

impl RandomSource for UuidRandom {
    fn next_u64(&mut self) -> u64 {
        Uuid::new_v4().as_u64_pair().0
    }
}

impl<F: FnMut() -> u64> RandomSource for F {
    fn next_u64(&mut self) -> u64 {
        self()
    }
}

fn base36_suffix(mut n: u64) -> String {
    let mut digits = [b'0'; SUFFIX_LEN];
    for slot in digits.iter_mut().rev() {
        *slot = ALPHABET[(n % 36) as usize];
        n /= 36;
    }
    digits.iter().map(|&b| char::from(b)).collect()
}

/// Produce a fresh session id.
pub fn generate_session_id(clock: &impl Clock, rng: &mut impl RandomSource) -> SessionId {
    let millis = clock.now_millis();
    let suffix = base36_suffix(rng.next_u64());
    SessionId::new(format!("session_{millis}_{suffix}"))
}

/// Produce a session id from the system clock and UUID randomness.
pub fn new_session_id() -> SessionId {
    generate_session_id(&SystemClock, &mut UuidRandom)
}
