//! Core of a floating YouTube desktop shell.
//!
//! Persisted configuration items with live effects on the host window, a
//! URL-pattern request filter for the player session, and the JSON settings
//! store behind both. The native window lives behind the [`services::Host`]
//! trait; [`services::HeadlessHost`] is the in-process implementation.

pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod services;
pub mod settings;
pub mod tray;
pub mod utils;

pub use error::{Result, ShellError};
