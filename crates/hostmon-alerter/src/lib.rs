//! Threshold alerting over the shared sample database.
//!
//! [`config::AlerterConfig`] describes what to watch, [`runner`] builds the
//! engine from it and drives the periodic check loop.

pub mod config;
pub mod runner;
