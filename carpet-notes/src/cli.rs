//! Command-line interface definitions

use crate::config::{DATA_DIR_ENV, DEFAULT_ASSET_ORIGIN};
use crate::database::Currency;
use crate::format::parse_date;
use crate::services::CarpetRow;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "carpet-notes")]
#[command(about = "Учёт заказов на чистку ковров", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory (defaults to the platform data dir)
    #[arg(long, env = DATA_DIR_ENV, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List records for a day
    List {
        /// Day to show, YYYY-MM-DD (default: today)
        #[arg(short, long, value_parser = date_arg)]
        date: Option<NaiveDate>,

        /// Shift the day by N days
        #[arg(long, allow_negative_numbers = true, default_value_t = 0)]
        offset: i64,
    },

    /// Show one record
    Show {
        id: String,
    },

    /// Create a record
    Add {
        #[arg(short, long)]
        address: String,

        /// Record day, YYYY-MM-DD (default: today)
        #[arg(short, long, value_parser = date_arg)]
        date: Option<NaiveDate>,

        #[arg(long, value_parser = date_arg)]
        deadline: Option<NaiveDate>,

        /// Mark the job as done
        #[arg(long)]
        done: bool,

        /// Carpet size as WIDTHxLENGTH, repeatable
        #[arg(short, long = "carpet", value_parser = carpet_arg)]
        carpets: Vec<CarpetRow>,
    },

    /// Change an existing record
    Edit {
        id: String,

        #[arg(short, long)]
        address: Option<String>,

        #[arg(short, long, value_parser = date_arg)]
        date: Option<NaiveDate>,

        #[arg(long, value_parser = date_arg, conflicts_with = "no_deadline")]
        deadline: Option<NaiveDate>,

        /// Remove the deadline
        #[arg(long)]
        no_deadline: bool,

        /// Set the done flag
        #[arg(long)]
        done: Option<bool>,

        /// Replace all carpets, WIDTHxLENGTH, repeatable
        #[arg(short, long = "carpet", value_parser = carpet_arg)]
        carpets: Vec<CarpetRow>,
    },

    /// Show or change pricing settings
    Settings {
        /// Price per square metre
        #[arg(long)]
        rate: Option<String>,

        #[arg(long)]
        currency: Option<Currency>,
    },

    /// Manage the offline asset cache
    Assets {
        /// Origin that relative asset paths resolve against
        #[arg(long, default_value = DEFAULT_ASSET_ORIGIN)]
        origin: Url,

        #[command(subcommand)]
        action: AssetCommand,
    },
}

#[derive(Subcommand)]
pub enum AssetCommand {
    /// Download and cache the static and core files
    Install,

    /// Drop caches from older versions
    Activate,

    /// Serve one asset, cache first
    Fetch {
        url: String,

        /// Write the body here instead of printing a summary
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).ok_or_else(|| format!("expected YYYY-MM-DD, got {}", value))
}

/// Parse `2x3`, `2,5x3` or `2.5*3`
pub fn carpet_arg(value: &str) -> Result<CarpetRow, String> {
    let (width, length) = value
        .split_once(['x', 'X', '*', '×'])
        .ok_or_else(|| format!("expected WIDTHxLENGTH, got {}", value))?;
    let row = CarpetRow::parse(width, length);
    if row.width.is_none() || row.length.is_none() {
        return Err(format!("invalid carpet size: {}", value));
    }
    Ok(row)
}
