//! Application services layered over the repository traits.

pub mod accounts;
pub mod error;
pub mod feed;
pub mod messages;
pub mod passwords;
pub mod repos;
pub mod social;
