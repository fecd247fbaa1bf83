// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-stack test harness: temp SQLite, the shared bus, and all three
//! process roles (bot wizard, worker, notifier) wired to mocks.

use std::sync::Arc;

use crimp_bus::SqliteBus;
use crimp_config::model::TableSpec;
use crimp_core::CrimpError;
use crimp_engine::AbonementEngine;
use crimp_jobs::JobProducer;
use crimp_notifier::Notifier;
use crimp_storage::queries::users;
use crimp_storage::{Database, User};
use crimp_wizard::{Wizard, WizardLimits};
use crimp_worker::Worker;

use crate::mock_channel::MockChat;
use crate::mock_sheets::{MockExporter, MockRenderer, MockSheets};

/// Chat id the harness designates as the administrative fallback.
pub const ADMIN_CHAT_ID: i64 = 999_000;

/// A complete single-database deployment with mock collaborators.
pub struct TestHarness {
    pub db: Database,
    pub bus: SqliteBus,
    pub engine: AbonementEngine,
    pub producer: JobProducer,
    pub wizard: Wizard,
    pub worker: Worker,
    pub notifier: Notifier,
    pub chat: Arc<MockChat>,
    pub sheets: Arc<MockSheets>,
    pub exporter: Arc<MockExporter>,
    pub renderer: Arc<MockRenderer>,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Build the full stack over a fresh temp database.
    pub async fn new() -> Result<Self, CrimpError> {
        let temp_dir = tempfile::TempDir::new()
            .map_err(|e| CrimpError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("harness.db");
        let db = Database::open(&db_path.to_string_lossy()).await?;

        let bus = SqliteBus::new(db.clone(), 3);
        let engine = AbonementEngine::new(db.clone());
        let producer = JobProducer::new(db.clone(), Arc::new(bus.clone()));
        let chat = Arc::new(MockChat::new());
        let sheets = Arc::new(MockSheets::new());
        let exporter = Arc::new(MockExporter::new());
        let renderer = Arc::new(MockRenderer::new());
        let tables = vec![
            TableSpec {
                name: "schedule".into(),
                title: "Climbing schedule".into(),
                sheet_id: "src-schedule".into(),
                output_file: "schedule.js".into(),
            },
            TableSpec {
                name: "prices".into(),
                title: "Prices".into(),
                sheet_id: "src-prices".into(),
                output_file: "prices.js".into(),
            },
        ];

        let wizard = Wizard::new(
            db.clone(),
            engine.clone(),
            producer.clone(),
            chat.clone(),
            WizardLimits {
                max_visits: 1000,
                page_limit: 10,
            },
        );
        let worker = Worker::new(
            db.clone(),
            Arc::new(bus.clone()),
            sheets.clone(),
            exporter.clone(),
            renderer.clone(),
            tables.clone(),
        );
        let notifier = Notifier::new(
            db.clone(),
            Arc::new(bus.clone()),
            chat.clone(),
            Some(ADMIN_CHAT_ID),
            tables,
        );

        Ok(Self {
            db,
            bus,
            engine,
            producer,
            wizard,
            worker,
            notifier,
            chat,
            sheets,
            exporter,
            renderer,
            _temp_dir: temp_dir,
        })
    }

    /// Register (or fetch) a user by chat id.
    pub async fn user(&self, chat_id: i64, name: &str) -> Result<User, CrimpError> {
        users::ensure_user(&self.db, chat_id, Some(name.to_string()), None, None).await
    }

    /// Drive the pipeline to completion: worker drains the tasks queue,
    /// then the notifier drains the results queue.
    pub async fn run_pipeline(&self) -> Result<(), CrimpError> {
        while self.worker.step().await? {}
        while self.notifier.step().await? {}
        Ok(())
    }
}
