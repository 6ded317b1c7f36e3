//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `tasklist_core` linkage without the mobile runtime.
//! - Print per-view task counts for the configured database.

use std::process::ExitCode;
use std::sync::Arc;
use tasklist_core::{CoreConfig, SqliteItemStore, TaskService, TaskView};

fn main() -> ExitCode {
    println!("tasklist_core ping={}", tasklist_core::ping());
    println!("tasklist_core version={}", tasklist_core::core_version());

    let config = CoreConfig::from_env();
    if let Err(err) = config.init_logging() {
        eprintln!("logging init failed: {err}");
        return ExitCode::FAILURE;
    }

    match print_view_counts(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn print_view_counts(config: &CoreConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("db_path={}", config.db_path.display());
    let store = SqliteItemStore::open(&config.db_path)?;
    let service = TaskService::new(Arc::new(store))?;
    for view in TaskView::ALL {
        let items = service.snapshot(view)?;
        println!("view={} count={}", view.label(), items.len());
    }
    service.close();
    Ok(())
}
