//! Smart Pantry library
//!
//! Expiration reminder scheduling for inventory lists: plans one wake timer
//! per (item, notice interval), keeps the platform timers in step with the
//! stored lists, and folds fired reminders into one notification per list.

pub mod app;
pub mod commands;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod platform;
pub mod services;
pub mod storage;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;
