use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use rand::Rng;

/// Length of a session code.
pub const SESSION_CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random session code, uniform over `[A-Z0-9]{6}`.
pub fn generate_session_code() -> String {
    let mut rng = rand::rng();
    (0..SESSION_CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Whether `code` has the session code shape.
pub fn is_session_code(code: &str) -> bool {
    code.len() == SESSION_CODE_LEN
        && code
            .bytes()
            .all(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
}

/// Id handed out by [`SessionCoordinator::get_or_create_active`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: String,
    /// True when this call allocated the id.
    pub created: bool,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    active: Option<String>,
    last_activity: Option<Instant>,
    issued: HashSet<String>,
}

/// Allocates the single session code shared by every client of one process.
///
/// Expiry check, allocation and activity stamp happen under one lock, so concurrent first polls
/// observe the same code.
#[derive(Debug)]
pub struct SessionCoordinator {
    threshold: Duration,
    state: Mutex<CoordinatorState>,
}

impl SessionCoordinator {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            state: Mutex::new(CoordinatorState::default()),
        }
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Current id, without touching it.
    pub fn active(&self) -> Option<String> {
        self.lock().active.clone()
    }

    pub fn get_or_create_active(&self) -> ActiveSession {
        self.get_or_create_active_at(Instant::now())
    }

    /// [`Self::get_or_create_active`] against an explicit clock.
    pub fn get_or_create_active_at(&self, now: Instant) -> ActiveSession {
        let mut state = self.lock();
        let expired = state
            .last_activity
            .is_none_or(|last| now.saturating_duration_since(last) > self.threshold);

        if let Some(id) = state.active.clone().filter(|_| !expired) {
            return ActiveSession { id, created: false };
        }

        let id = allocate(&mut state);
        state.last_activity = Some(now);
        ActiveSession { id, created: true }
    }

    /// Keep the active id regardless of idle time, allocating only when none is set.
    pub fn keep_or_allocate(&self) -> ActiveSession {
        self.keep_or_allocate_at(Instant::now())
    }

    pub fn keep_or_allocate_at(&self, now: Instant) -> ActiveSession {
        let mut state = self.lock();
        state.last_activity = Some(now);
        if let Some(id) = state.active.clone() {
            return ActiveSession { id, created: false };
        }
        let id = allocate(&mut state);
        ActiveSession { id, created: true }
    }

    pub fn touch(&self) {
        self.touch_at(Instant::now());
    }

    pub fn touch_at(&self, now: Instant) {
        self.lock().last_activity = Some(now);
    }

    /// Replace the active id with a fresh one, only if `expected` is still active.
    ///
    /// Returns the new id, or `None` when another caller already moved on.
    pub fn supersede(&self, expected: &str) -> Option<String> {
        self.supersede_at(expected, Instant::now())
    }

    pub fn supersede_at(&self, expected: &str, now: Instant) -> Option<String> {
        let mut state = self.lock();
        if state.active.as_deref() != Some(expected) {
            return None;
        }
        let id = allocate(&mut state);
        state.last_activity = Some(now);
        Some(id)
    }

    /// Forget `expected` if it is still the active id.
    pub fn retire(&self, expected: &str) -> bool {
        let mut state = self.lock();
        if state.active.as_deref() != Some(expected) {
            return false;
        }
        state.active = None;
        state.last_activity = None;
        true
    }

    /// Forget the active id. The next poll allocates a new one.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.active = None;
        state.last_activity = None;
    }

    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn allocate(state: &mut CoordinatorState) -> String {
    let id = loop {
        let candidate = generate_session_code();
        if state.issued.insert(candidate.clone()) {
            break candidate;
        }
    };
    state.active = Some(id.clone());
    id
}
