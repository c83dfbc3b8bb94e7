//! Scoring-client side: backend access, the session poll loop and the live scoring state.

pub mod gateway;
pub mod live;
pub mod sync;
