//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod messages;
pub mod users;
pub mod validation;
