//! Data models for officegate.
//!
//! Defines the domain types shared by the gateway and the leave service:
//! tenant scopes, employee roles, holiday kinds and leave request states.

mod employee;
mod leave;
mod tenant;

pub use employee::*;
pub use leave::*;
pub use tenant::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
