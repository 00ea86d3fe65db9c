//! Carpet Notes library
//!
//! Record keeping for a carpet cleaning business: jobs per day, measured
//! carpets, priced totals and an offline asset cache. The binary is a thin
//! command-line front end over this library.

pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod format;
pub mod notice;
pub mod services;
pub mod storage;
