//! stargazers library crate.
//!
//! Watches a GitHub repository's stargazers, detects stars and unstars, and
//! delivers notifications through Lark, Slack, WeCom or webhooks.

pub mod config;
pub mod domain;
pub mod error;
pub mod kol;
pub mod logging;
pub mod monitor;
pub mod notification;
pub mod source;

pub use error::{Error, Result};
