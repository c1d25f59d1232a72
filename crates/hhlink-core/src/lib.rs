//! Core library for hhlink.
//!
//! Links hh.ru applicant accounts to a registered application and runs a
//! handful of authenticated operations on their behalf.
//!
//! - [`auth`]: the application credential and per-user OAuth sessions
//! - [`api`]: HTTP transport and error classification
//! - [`store`]: persistence of linked users keyed by email
//! - [`link`]: resolve-or-create and ensure-fresh workflow over a store
//! - [`web`]: the two callback routes used to link an account from a browser

pub mod api;
pub mod auth;
pub mod config;
pub mod link;
pub mod store;
pub mod web;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError};
pub use auth::{AppCredential, ApplyOutcome, TokenSet, TokenValidity, UserSession};
pub use config::AppConfig;
pub use store::{JsonFileStore, MemoryStore, RecordUpdate, StoreError, UserRecord, UserStore};
