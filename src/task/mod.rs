//! Background tasks driving the recurring availability check.

pub mod monitor_scheduler;
pub mod schedule;
