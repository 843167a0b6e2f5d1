use std::path::PathBuf;

use tauri::Manager;

pub mod calendar;
pub mod commands;
pub mod config;
pub mod context;
mod db;
pub mod error;
#[cfg(test)]
mod integration_test;
pub mod inference;
pub mod learning;
pub mod matcher;
pub mod rules;
pub mod schedule;
pub mod timing;

use db::connection::establish_pool;
use db::migrations::run_migrations;
use rules::RuleCatalog;
use timing::TimingStore;

/// Shared engine state: the SQLite pool plus the two in-memory stores
/// (spec §5) that every command reads and writes through.
pub struct DbState {
    pub pool: sqlx::Pool<sqlx::Sqlite>,
    pub rules: RuleCatalog,
    pub timing: TimingStore,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_log::Builder::default().build())
        .setup(|app| {
            let app_handle = app.handle().clone();
            tauri::async_runtime::block_on(async move {
                let mut app_dir = app_handle
                    .path()
                    .app_config_dir()
                    .unwrap_or_else(|_| PathBuf::from("."));
                app_dir.push("suggestion-engine.sqlite");

                log::info!("SQLite DB path: {}", app_dir.to_string_lossy());

                let pool = establish_pool(app_dir)
                    .await
                    .expect("failed to connect to sqlite");
                run_migrations(&pool).await.expect("failed to run migrations");

                let rules = RuleCatalog::load(pool.clone())
                    .await
                    .expect("failed to load rule catalog");
                let timing = TimingStore::load(pool.clone())
                    .await
                    .expect("failed to load timing store");

                app_handle.manage(DbState {
                    pool,
                    rules,
                    timing,
                });
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::inference::get_suggestions,
            commands::inference::record_feedback,
            commands::rules::list_rules,
            commands::rules::create_rule,
            commands::rules::deactivate_rule,
            commands::calendar::ingest_calendar_events,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
