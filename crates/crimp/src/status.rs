// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `crimp status` command implementation.
//!
//! Reports row counts and queue depths from the shared database. With
//! `--json`, prints a machine-readable report for scripting.

use serde::Serialize;

use crimp_config::model::CrimpConfig;
use crimp_core::types::{RESULTS_QUEUE, TASKS_QUEUE};
use crimp_core::CrimpError;
use crimp_storage::queries::queue;
use crimp_storage::Database;

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub database_path: String,
    pub users: i64,
    pub abonements_active: i64,
    pub abonements_hidden: i64,
    pub visits: i64,
    pub tasks: i64,
    pub notifications: i64,
    pub tasks_queue_depth: i64,
    pub results_queue_depth: i64,
}

/// Runs the `crimp status` command.
pub async fn run_status(config: &CrimpConfig, json: bool) -> Result<(), CrimpError> {
    let db = Database::open(&config.storage.database_path).await?;

    let (users, abonements_active, abonements_hidden, visits, tasks, notifications) = db
        .connection()
        .call(|conn| {
            let count = |sql: &str| -> Result<i64, rusqlite::Error> {
                conn.query_row(sql, [], |row| row.get(0))
            };
            Ok::<_, rusqlite::Error>((
                count("SELECT COUNT(*) FROM users")?,
                count("SELECT COUNT(*) FROM abonements WHERE hidden = 0")?,
                count("SELECT COUNT(*) FROM abonements WHERE hidden = 1")?,
                count("SELECT COUNT(*) FROM visits")?,
                count("SELECT COUNT(*) FROM tasks")?,
                count("SELECT COUNT(*) FROM notifications")?,
            ))
        })
        .await
        .map_err(|e| CrimpError::Storage { source: Box::new(e) })?;

    let report = StatusReport {
        database_path: config.storage.database_path.clone(),
        users,
        abonements_active,
        abonements_hidden,
        visits,
        tasks,
        notifications,
        tasks_queue_depth: queue::depth(&db, TASKS_QUEUE).await?,
        results_queue_depth: queue::depth(&db, RESULTS_QUEUE).await?,
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report)
                .unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        println!("database:       {}", report.database_path);
        println!("users:          {}", report.users);
        println!(
            "abonements:     {} active, {} hidden",
            report.abonements_active, report.abonements_hidden
        );
        println!("visits:         {}", report.visits);
        println!("tasks:          {}", report.tasks);
        println!("notifications:  {}", report.notifications);
        println!(
            "queues:         {} tasks pending, {} results pending",
            report.tasks_queue_depth, report.results_queue_depth
        );
    }

    db.close().await?;
    Ok(())
}
