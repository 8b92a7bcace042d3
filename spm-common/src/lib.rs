//! # SPM Common Library
//!
//! Shared code for the shop-performance services including:
//! - Error type shared by the database layer and services
//! - Bootstrap configuration loading (CLI → ENV → TOML → defaults)
//! - SQLite schema initialization and runtime settings
//! - Row models for markets, stores and advisor accounts

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
