//! Messenger abstractions (Telegram is the only adapter).

pub mod port;
pub mod throttled;
pub mod types;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;
