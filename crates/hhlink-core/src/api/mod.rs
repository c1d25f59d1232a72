//! REST API client module for hh.ru.
//!
//! This module provides the `ApiClient` transport and the `ApiError`
//! taxonomy every authenticated call reports through.
//!
//! The API uses OAuth2 bearer tokens issued by `api.hh.ru/token`.

pub mod client;
pub mod error;

pub use client::{ApiClient, USER_AGENT_HEADER};
pub use error::ApiError;
