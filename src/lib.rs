//! Warbler: a small server-rendered social network.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
