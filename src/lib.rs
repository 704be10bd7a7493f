//! fieldcheck - dynamic checklist engine for field installation tracking
//!
//! This crate provides:
//! - A relational store for checklist templates, drafts and submissions (SQLite)
//! - Atomic checklist submission with answer projection and installation side effects
//! - A JSON REST API over the store, plus CLI commands for administration

pub mod api;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
pub mod projection;
pub mod rules;

pub use config::Config;
pub use error::{Error, Result};
