// Carpet Notes - field notebook for carpet cleaning jobs
// Entry point and command dispatch

use anyhow::{Context, Result};
use carpet_notes::app::AppState;
use carpet_notes::cli::{AssetCommand, Cli, Commands};
use carpet_notes::database::Record;
use carpet_notes::error::AppError;
use carpet_notes::format::{format_area, format_money, record_card, status_text};
use carpet_notes::notice::Notice;
use carpet_notes::services::{AssetSource, CarpetRow, CommitForm, HttpFetcher};
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "carpet_notes=debug,info"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    let mut state = AppState::open(data_dir).await?;

    let result = run(&mut state, cli.command).await;
    state.shutdown().await;
    result
}

fn default_data_dir() -> Result<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join("carpet-notes"))
        .context("Could not determine a data directory, pass --data-dir")
}

async fn run(state: &mut AppState, command: Commands) -> Result<()> {
    match command {
        Commands::List { date, offset } => {
            if let Some(date) = date {
                state.set_date(date);
            }
            let day = state.change_date(offset);
            let currency = state.settings().currency;
            let records = state.records_for_current_date();

            println!("{}", day.format("%Y-%m-%d"));
            if records.is_empty() {
                println!("Нет записей");
            }
            for record in records {
                println!("\n[{}]\n{}", record.id, record_card(record, currency));
            }
        }

        Commands::Show { id } => {
            let record = state
                .records()
                .find_by_id(&id)
                .ok_or_else(|| AppError::RecordNotFound(id.clone()))?;
            print_record(record, state);
        }

        Commands::Add {
            address,
            date,
            deadline,
            done,
            carpets,
        } => {
            state.set_date(date.unwrap_or_else(|| Local::now().date_naive()));
            state.begin_new_record();
            replace_rows(state, &carpets).map_err(user_error)?;

            let form = CommitForm {
                address,
                date: state.current_date(),
                deadline,
                is_done: done,
            };
            commit(state, form).await?;
        }

        Commands::Edit {
            id,
            address,
            date,
            deadline,
            no_deadline,
            done,
            carpets,
        } => {
            state.begin_edit(&id).map_err(user_error)?;
            if !carpets.is_empty() {
                replace_rows(state, &carpets).map_err(user_error)?;
            }

            let mut form = state
                .editor()
                .form()
                .cloned()
                .ok_or(AppError::EditorClosed)?;
            if let Some(address) = address {
                form.address = address;
            }
            if let Some(date) = date {
                form.date = date;
            }
            if no_deadline {
                form.deadline = None;
            } else if deadline.is_some() {
                form.deadline = deadline;
            }
            if let Some(done) = done {
                form.is_done = done;
            }
            commit(state, form).await?;
        }

        Commands::Settings { rate, currency } => {
            if rate.is_some() || currency.is_some() {
                let current = state.settings();
                let rate_input = rate.unwrap_or_else(|| current.rate_per_sq_m.to_string());
                let notice = state
                    .save_settings(&rate_input, currency.unwrap_or(current.currency))
                    .await
                    .map_err(user_error)?;
                println!("{}", notice);
            }

            let settings = state.settings();
            println!(
                "Цена за м²: {}",
                format_money(settings.rate_per_sq_m, settings.currency)
            );
            println!("Валюта: {}", settings.currency);
        }

        Commands::Assets { origin, action } => {
            let cache = state.asset_cache(origin);
            cache.initialize().await?;
            let fetcher = HttpFetcher::new()?;

            match action {
                AssetCommand::Install => {
                    let report = cache.install(&fetcher).await?;
                    println!(
                        "Cached {} static and {} core files",
                        report.static_files, report.core_files
                    );
                }
                AssetCommand::Activate => {
                    let report = cache.activate().await?;
                    for name in &report.removed_caches {
                        println!("Removed cache {}", name);
                    }
                    println!("Pruned {} unreferenced blobs", report.pruned_blobs);
                }
                AssetCommand::Fetch { url, output } => {
                    let asset = cache.fetch(&url, &fetcher).await?;
                    let source = match &asset.source {
                        AssetSource::Cache(name) => name.as_str(),
                        AssetSource::Network => "network",
                    };
                    match output {
                        Some(path) => {
                            tokio::fs::write(&path, &asset.body)
                                .await
                                .with_context(|| format!("Failed to write {}", path.display()))?;
                            println!("{} -> {} ({})", asset.url, path.display(), source);
                        }
                        None => println!(
                            "{} {} bytes, {} ({})",
                            asset.url,
                            asset.body.len(),
                            asset.content_type.as_deref().unwrap_or("unknown type"),
                            source
                        ),
                    }
                }
            }
        }
    }

    Ok(())
}

/// Make the editor rows match `rows`, keeping at least one row
fn replace_rows(state: &mut AppState, rows: &[CarpetRow]) -> carpet_notes::error::Result<()> {
    for (index, row) in rows.iter().enumerate() {
        if index < state.editor().rows().len() {
            state.set_carpet_row(index, *row)?;
        } else {
            state.add_carpet_row(Some(*row))?;
        }
    }
    while state.editor().rows().len() > rows.len().max(1) {
        let last = state.editor().rows().len() - 1;
        state.remove_carpet_row(last)?;
    }
    Ok(())
}

async fn commit(state: &mut AppState, form: CommitForm) -> Result<()> {
    let outcome = state.save_record(form).await.map_err(user_error)?;
    println!("{}", outcome.notice);
    if !outcome.persisted {
        eprintln!("{}", Notice::StorageWriteFailed);
    }
    print_record(&outcome.record, state);
    Ok(())
}

fn print_record(record: &Record, state: &AppState) {
    let currency = state.settings().currency;
    println!("[{}] {}", record.id, record.date.format("%Y-%m-%d"));
    println!("{}", record_card(record, currency));
    for (index, carpet) in record.carpets.iter().enumerate() {
        println!(
            "  {}. {} × {} = {}",
            index + 1,
            carpet.width,
            carpet.length,
            format_area(carpet.area)
        );
    }
    println!(
        "Итого: {}, {} ({})",
        format_area(record.total_area),
        format_money(record.total_price, currency),
        status_text(record.is_done)
    );
}

/// Replace user-facing errors with their notice text
fn user_error(err: AppError) -> anyhow::Error {
    match Notice::from_error(&err) {
        Some(notice) => anyhow::anyhow!(notice.message()),
        None => err.into(),
    }
}
