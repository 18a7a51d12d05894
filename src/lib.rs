//! exam-watch - Watches a public exam booking service for free practical exam slots.
//!
//! This crate provides:
//! - A throttled client for the upstream booking API
//! - Availability probing with readable slot labels
//! - A single-flight scheduler that notifies each subscriber once per slot
//! - Email and Telegram notification channels

pub mod config;
pub mod entity;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod repository;
pub mod service;
pub mod task;
pub mod upstream;
