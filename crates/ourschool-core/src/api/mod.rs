//! REST API client module for the OurSchool backend.
//!
//! This module provides the `ApiClient` used to renew session tokens and
//! look up the signed-in user. The backend issues JWT bearer tokens; every
//! request here is authenticated with one.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
