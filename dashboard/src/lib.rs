//! ASPIRE TRADE dashboard client.
//!
//! Polls the bot's JSON API on a fixed interval and renders each section of
//! the trader or admin dashboard into an in-process [`view::Page`]. Access is
//! gated by a persisted [`session::Session`] created through a configurable
//! [`auth::CredentialCheck`].

pub mod app;
pub mod auth;
pub mod config;
pub mod fetcher;
pub mod mirror;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod types;
pub mod view;
pub mod whitelist;

pub use app::{AppContext, View};
pub use config::DashboardConfig;
