//! Timesheet retrieval from the GHRS reporting portal.
//!
//! The portal has no API. A session is established by walking its single
//! sign-on redirect chain ([`session`]), a query is run by resubmitting the
//! scraped query form twice ([`form`], [`query`]), and the resulting XML
//! export is turned into typed records ([`export`]) that can be summed per
//! week ([`summary`]).

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod export;
pub mod form;
pub mod model;
pub mod query;
pub mod session;
pub mod summary;
pub mod window;

pub use client::GhrsClient;
pub use error::{GhrsError, Result};
