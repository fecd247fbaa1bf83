// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker process: consumes the tasks queue one message at a time,
//! dispatches purely on job type, and acknowledges only after every side
//! effect -- including publishing the result -- has completed.

mod sheet_sync;

pub use sheet_sync::{apply_visit, resync};

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crimp_bus::Disposition;
use crimp_config::model::TableSpec;
use crimp_core::types::{RESULTS_QUEUE, TASKS_QUEUE};
use crimp_core::{CrimpError, PictureRenderer, QueueClient, SheetClient, TableExporter};
use crimp_storage::Database;

use crimp_jobs::{decode, encode, Job, JobResult, RESULT_DONE};

/// The worker's wiring: queue, store, and the external side-effect clients.
pub struct Worker {
    db: Database,
    bus: Arc<dyn QueueClient>,
    sheets: Arc<dyn SheetClient>,
    exporter: Arc<dyn TableExporter>,
    renderer: Arc<dyn PictureRenderer>,
    tables: Vec<TableSpec>,
}

impl Worker {
    pub fn new(
        db: Database,
        bus: Arc<dyn QueueClient>,
        sheets: Arc<dyn SheetClient>,
        exporter: Arc<dyn TableExporter>,
        renderer: Arc<dyn PictureRenderer>,
        tables: Vec<TableSpec>,
    ) -> Self {
        Self {
            db,
            bus,
            sheets,
            exporter,
            renderer,
            tables,
        }
    }

    /// Run the consume loop until cancelled.
    pub async fn run(
        &self,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<(), CrimpError> {
        crimp_bus::consume(
            self.bus.as_ref(),
            TASKS_QUEUE,
            poll_interval,
            cancel,
            |delivery| async move { self.handle(&delivery.payload).await },
        )
        .await
    }

    /// Process at most one pending job. Returns whether one was handled.
    pub async fn step(&self) -> Result<bool, CrimpError> {
        crimp_bus::consume_one(self.bus.as_ref(), TASKS_QUEUE, |delivery| async move {
            self.handle(&delivery.payload).await
        })
        .await
    }

    /// Handle one job payload.
    ///
    /// Undecodable payloads are discarded: redelivering them can never
    /// succeed. Everything else either completes (ack) or propagates an
    /// error, which the consume loop turns into a redelivery.
    async fn handle(&self, payload: &str) -> Result<Disposition, CrimpError> {
        let job = match decode::<Job>(payload) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, payload, "dropping undecodable job");
                return Ok(Disposition::Discard);
            }
        };

        match job {
            Job::TableGenerator { uuid, task_id, job } => {
                self.generate_tables(&uuid, task_id, &job).await?;
            }
            Job::PicturesGenerator { uuid, task_id, job } => {
                info!(task_id, job = job.as_str(), "rendering pictures");
                self.renderer.render(&job).await?;
                let result = JobResult::PicturesGenerator {
                    uuid,
                    task_id,
                    job,
                    result: RESULT_DONE.to_string(),
                };
                self.bus
                    .publish(RESULTS_QUEUE, &encode(&result)?)
                    .await?;
            }
            Job::AbonementUpdate { abonement_id, .. } => {
                // Full resync terminates here: there is nothing to notify.
                sheet_sync::resync(&self.db, self.sheets.as_ref(), abonement_id).await?;
            }
            Job::AbonementVisit(change) => {
                sheet_sync::apply_visit(&self.db, self.sheets.as_ref(), &change).await?;
                // Forward for the notification fan-out. The ack below
                // happens only after this publish, so a crash in between
                // redelivers the whole job; the sheet upsert is keyed by
                // visit id and absorbs the repeat.
                let result = JobResult::AbonementVisit(change);
                self.bus
                    .publish(RESULTS_QUEUE, &encode(&result)?)
                    .await?;
            }
        }
        Ok(Disposition::Ack)
    }

    /// Regenerate every configured table matching the job name ("all" for
    /// all of them), publishing one result per table.
    async fn generate_tables(
        &self,
        uuid: &str,
        task_id: i64,
        job: &str,
    ) -> Result<(), CrimpError> {
        let mut matched = false;
        for table in &self.tables {
            if job != "all" && job != table.name {
                continue;
            }
            matched = true;
            info!(task_id, table = table.name.as_str(), "exporting table");
            self.exporter.export(&table.name).await?;
            let result = JobResult::TableGenerator {
                uuid: uuid.to_string(),
                task_id,
                job: job.to_string(),
                table: table.name.clone(),
                result: RESULT_DONE.to_string(),
            };
            self.bus
                .publish(RESULTS_QUEUE, &encode(&result)?)
                .await?;
            info!(task_id, table = table.name.as_str(), "table done");
        }
        if !matched {
            warn!(task_id, job, "no configured table matches the job");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crimp_core::Highlight;
    use crimp_jobs::{JobProducer, VisitChange, VisitEvent};
    use crimp_storage::queries::{abonements, users, visits};
    use crimp_test_utils::{MockExporter, MockRenderer, MockSheets};
    use crimp_bus::SqliteBus;
    use chrono::Utc;
    use tempfile::tempdir;

    struct Fixture {
        worker: Worker,
        bus: SqliteBus,
        db: Database,
        sheets: Arc<MockSheets>,
        exporter: Arc<MockExporter>,
        renderer: Arc<MockRenderer>,
        producer: JobProducer,
        _dir: tempfile::TempDir,
        user_id: i64,
    }

    fn table(name: &str) -> TableSpec {
        TableSpec {
            name: name.to_string(),
            title: format!("Table {name}"),
            sheet_id: format!("src-{name}"),
            output_file: format!("{name}.js"),
        }
    }

    async fn setup() -> Fixture {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("worker.db").to_str().unwrap())
            .await
            .unwrap();
        let bus = SqliteBus::new(db.clone(), 3);
        let sheets = Arc::new(MockSheets::new());
        let exporter = Arc::new(MockExporter::new());
        let renderer = Arc::new(MockRenderer::new());
        let user = users::ensure_user(&db, 1, Some("Req".into()), None, None)
            .await
            .unwrap();
        let producer = JobProducer::new(db.clone(), Arc::new(bus.clone()));
        let worker = Worker::new(
            db.clone(),
            Arc::new(bus.clone()),
            sheets.clone(),
            exporter.clone(),
            renderer.clone(),
            vec![table("schedule"), table("prices")],
        );
        Fixture {
            worker,
            bus,
            db,
            sheets,
            exporter,
            renderer,
            producer,
            _dir: dir,
            user_id: user.id,
        }
    }

    async fn results(bus: &SqliteBus) -> Vec<JobResult> {
        let mut out = Vec::new();
        while let Some(delivery) = bus.next(RESULTS_QUEUE).await.unwrap() {
            out.push(decode::<JobResult>(&delivery.payload).unwrap());
            bus.ack(&delivery).await.unwrap();
        }
        out
    }

    #[tokio::test]
    async fn table_job_exports_and_publishes_per_table() {
        let f = setup().await;
        let task = f.producer.submit_table_job(f.user_id, "all").await.unwrap();

        assert!(f.worker.step().await.unwrap());

        assert_eq!(f.exporter.exported().await, vec!["schedule", "prices"]);
        let results = results(&f.bus).await;
        assert_eq!(results.len(), 2);
        for result in &results {
            match result {
                JobResult::TableGenerator {
                    task_id, result, ..
                } => {
                    assert_eq!(*task_id, task.id);
                    assert_eq!(result, RESULT_DONE);
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn named_table_job_exports_only_that_table() {
        let f = setup().await;
        f.producer
            .submit_table_job(f.user_id, "prices")
            .await
            .unwrap();

        f.worker.step().await.unwrap();

        assert_eq!(f.exporter.exported().await, vec!["prices"]);
        assert_eq!(results(&f.bus).await.len(), 1);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pictures_job_renders_and_publishes() {
        let f = setup().await;
        f.producer
            .submit_pictures_job(f.user_id, "contest")
            .await
            .unwrap();

        f.worker.step().await.unwrap();

        assert_eq!(f.renderer.rendered().await, vec!["contest"]);
        let results = results(&f.bus).await;
        assert_eq!(results.len(), 1);
        assert!(matches!(&results[0],
            JobResult::PicturesGenerator { job, result, .. }
            if job == "contest" && result == RESULT_DONE));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn undecodable_job_is_discarded_not_retried() {
        let f = setup().await;
        f.bus.publish(TASKS_QUEUE, "{broken").await.unwrap();

        assert!(f.worker.step().await.unwrap());
        // Discarded: nothing pending, nothing produced.
        assert_eq!(f.bus.depth(TASKS_QUEUE).await.unwrap(), 0);
        assert!(results(&f.bus).await.is_empty());
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn failing_export_leaves_job_for_redelivery() {
        let f = setup().await;
        f.exporter.fail_next().await;
        f.producer.submit_table_job(f.user_id, "all").await.unwrap();

        assert!(f.worker.step().await.unwrap());
        // Rejected back to pending.
        assert_eq!(f.bus.depth(TASKS_QUEUE).await.unwrap(), 1);

        // Second attempt succeeds.
        assert!(f.worker.step().await.unwrap());
        assert_eq!(f.bus.depth(TASKS_QUEUE).await.unwrap(), 0);
        assert_eq!(results(&f.bus).await.len(), 2);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn abonement_update_creates_sheet_lazily_and_is_idempotent() {
        let f = setup().await;
        let abonement = abonements::create(&f.db, f.user_id, "Pass".into(), 10, None, None)
            .await
            .unwrap();
        for i in 0..3 {
            visits::record_checked(
                &f.db,
                abonement.id,
                f.user_id,
                Utc::now() + chrono::Duration::minutes(i),
            )
            .await
            .unwrap()
            .unwrap();
        }

        f.producer
            .publish_abonement_update(abonement.id)
            .await
            .unwrap();
        f.worker.step().await.unwrap();

        let sheet_id = abonements::get(&f.db, abonement.id)
            .await
            .unwrap()
            .unwrap()
            .sheet_id
            .expect("sheet assigned lazily");
        assert_eq!(f.sheets.visit_rows(&sheet_id).await.len(), 3);
        let header = f.sheets.header(&sheet_id).await.unwrap();
        assert_eq!(header.name, "Pass");
        assert_eq!(header.owner_name, "Req");

        // Re-running the resync appends nothing new.
        f.producer
            .publish_abonement_update(abonement.id)
            .await
            .unwrap();
        f.worker.step().await.unwrap();
        assert_eq!(f.sheets.visit_rows(&sheet_id).await.len(), 3);
        assert_eq!(f.sheets.sheets_created().await, 1);

        // No result hop for updates.
        assert!(results(&f.bus).await.is_empty());
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn visit_events_upsert_by_visit_id_and_forward() {
        let f = setup().await;
        let abonement = abonements::create(&f.db, f.user_id, "Pass".into(), 0, None, None)
            .await
            .unwrap();
        let visit = visits::record_checked(&f.db, abonement.id, f.user_id, Utc::now())
            .await
            .unwrap()
            .unwrap();

        let change = VisitChange {
            uuid: "u-1".into(),
            msg_type: VisitEvent::VisitNew,
            abonement_id: abonement.id,
            visit_id: visit.id,
            actor_id: f.user_id,
            ts: "05.08.2026 10:00".into(),
            ts_new: None,
        };
        f.bus
            .publish(TASKS_QUEUE, &encode(&Job::AbonementVisit(change.clone())).unwrap())
            .await
            .unwrap();
        f.worker.step().await.unwrap();

        let sheet_id = abonements::get(&f.db, abonement.id)
            .await
            .unwrap()
            .unwrap()
            .sheet_id
            .unwrap();
        let rows = f.sheets.visit_rows(&sheet_id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].visit_id, visit.id);
        assert!(rows[0].active);

        // Redelivery of the same add does not duplicate the row.
        f.bus
            .publish(TASKS_QUEUE, &encode(&Job::AbonementVisit(change.clone())).unwrap())
            .await
            .unwrap();
        f.worker.step().await.unwrap();
        assert_eq!(f.sheets.visit_rows(&sheet_id).await.len(), 1);

        // Edit rewrites the timestamp with a highlight.
        let edit = VisitChange {
            msg_type: VisitEvent::VisitEdit,
            ts_new: Some("05.08.2026 19:00".into()),
            ..change.clone()
        };
        f.bus
            .publish(TASKS_QUEUE, &encode(&Job::AbonementVisit(edit)).unwrap())
            .await
            .unwrap();
        f.worker.step().await.unwrap();
        let rows = f.sheets.visit_rows(&sheet_id).await;
        assert_eq!(rows[0].ts, "05.08.2026 19:00");
        assert_eq!(
            f.sheets.highlight(&sheet_id, visit.id).await,
            Some(Highlight::Edited)
        );

        // Delete marks the row removed but keeps it.
        let delete = VisitChange {
            msg_type: VisitEvent::VisitDelete,
            ..change.clone()
        };
        f.bus
            .publish(TASKS_QUEUE, &encode(&Job::AbonementVisit(delete)).unwrap())
            .await
            .unwrap();
        f.worker.step().await.unwrap();
        let rows = f.sheets.visit_rows(&sheet_id).await;
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].active);
        assert_eq!(
            f.sheets.highlight(&sheet_id, visit.id).await,
            Some(Highlight::Removed)
        );

        // Every visit event was forwarded to the results queue.
        assert_eq!(results(&f.bus).await.len(), 4);
        f.db.close().await.unwrap();
    }
}
