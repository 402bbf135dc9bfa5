//! Core domain + application logic for the keyboard logger report mailer,
//! the news translation bot and the keystroke recorder.
//!
//! This crate is framework-agnostic. Telegram, OpenAI, SQLite and SMTP live
//! behind ports (traits) implemented in adapter crates.

pub mod bot;
pub mod config;
pub mod domain;
pub mod errors;
pub mod extract;
pub mod fetch;
pub mod formatting;
pub mod http;
pub mod logging;
pub mod messaging;
pub mod news;
pub mod poller;
pub mod recorder;
pub mod report;
pub mod sessions_csv;
pub mod translate;
pub mod utils;

pub use errors::{Error, Result};
