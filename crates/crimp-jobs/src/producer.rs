// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Producer side of the job pipeline.
//!
//! Task-style jobs persist their Task row before the message is published:
//! a crash between the two leaves an orphaned Task, which is visible for
//! diagnostics, rather than a message with no correlation row.

use std::sync::Arc;

use tracing::info;

use crimp_core::types::TASKS_QUEUE;
use crimp_core::{CrimpError, QueueClient};
use crimp_storage::queries::tasks;
use crimp_storage::{Database, Task};

use crate::envelope::{encode, Job, VisitChange, VisitEvent};

/// Publishes jobs to the tasks queue.
#[derive(Clone)]
pub struct JobProducer {
    db: Database,
    bus: Arc<dyn QueueClient>,
}

impl JobProducer {
    pub fn new(db: Database, bus: Arc<dyn QueueClient>) -> Self {
        Self { db, bus }
    }

    /// Request regeneration of a named site table ("all" for every table).
    /// Returns the Task correlating the eventual result to the requester.
    pub async fn submit_table_job(
        &self,
        requester_id: i64,
        job: &str,
    ) -> Result<Task, CrimpError> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let task = tasks::create(&self.db, uuid.clone(), requester_id).await?;
        let envelope = Job::TableGenerator {
            uuid,
            task_id: task.id,
            job: job.to_string(),
        };
        self.bus.publish(TASKS_QUEUE, &encode(&envelope)?).await?;
        info!(task_id = task.id, requester_id, job, "table job submitted");
        Ok(task)
    }

    /// Request rendering of a picture set.
    pub async fn submit_pictures_job(
        &self,
        requester_id: i64,
        job: &str,
    ) -> Result<Task, CrimpError> {
        let uuid = uuid::Uuid::new_v4().to_string();
        let task = tasks::create(&self.db, uuid.clone(), requester_id).await?;
        let envelope = Job::PicturesGenerator {
            uuid,
            task_id: task.id,
            job: job.to_string(),
        };
        self.bus.publish(TASKS_QUEUE, &encode(&envelope)?).await?;
        info!(task_id = task.id, requester_id, job, "pictures job submitted");
        Ok(task)
    }

    /// Request a full external-sheet resync for an abonement.
    ///
    /// No Task row: the recipients of any follow-up are resolved through
    /// the abonement itself, not through a requester.
    pub async fn publish_abonement_update(&self, abonement_id: i64) -> Result<(), CrimpError> {
        let envelope = Job::AbonementUpdate {
            uuid: uuid::Uuid::new_v4().to_string(),
            abonement_id,
        };
        self.bus.publish(TASKS_QUEUE, &encode(&envelope)?).await?;
        info!(abonement_id, "abonement update job published");
        Ok(())
    }

    /// Publish a visit add/edit/delete for sheet sync and notification
    /// fan-out.
    pub async fn publish_visit_event(
        &self,
        msg_type: VisitEvent,
        abonement_id: i64,
        visit_id: i64,
        actor_id: i64,
        ts: String,
        ts_new: Option<String>,
    ) -> Result<(), CrimpError> {
        let envelope = Job::AbonementVisit(VisitChange {
            uuid: uuid::Uuid::new_v4().to_string(),
            msg_type,
            abonement_id,
            visit_id,
            actor_id,
            ts,
            ts_new,
        });
        self.bus.publish(TASKS_QUEUE, &encode(&envelope)?).await?;
        info!(abonement_id, visit_id, actor_id, "visit event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::decode;
    use crimp_bus::SqliteBus;
    use crimp_storage::queries::users;
    use tempfile::tempdir;

    async fn setup() -> (JobProducer, SqliteBus, Database, tempfile::TempDir, i64) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("jobs.db").to_str().unwrap())
            .await
            .unwrap();
        let bus = SqliteBus::new(db.clone(), 3);
        let user = users::ensure_user(&db, 10, None, None, None).await.unwrap();
        let producer = JobProducer::new(db.clone(), Arc::new(bus.clone()));
        (producer, bus, db, dir, user.id)
    }

    #[tokio::test]
    async fn submit_persists_task_then_publishes() {
        let (producer, bus, db, _dir, user_id) = setup().await;

        let task = producer.submit_table_job(user_id, "all").await.unwrap();

        // The task row exists and matches the published envelope.
        let stored = tasks::get(&db, task.id).await.unwrap().unwrap();
        assert_eq!(stored.user_id, user_id);

        let delivery = bus.next(TASKS_QUEUE).await.unwrap().unwrap();
        match decode::<Job>(&delivery.payload).unwrap() {
            Job::TableGenerator { uuid, task_id, job } => {
                assert_eq!(uuid, stored.uuid);
                assert_eq!(task_id, task.id);
                assert_eq!(job, "all");
            }
            other => panic!("unexpected job: {other:?}"),
        }
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn abonement_jobs_carry_no_task() {
        let (producer, bus, db, _dir, user_id) = setup().await;

        producer.publish_abonement_update(5).await.unwrap();
        producer
            .publish_visit_event(
                VisitEvent::VisitNew,
                5,
                1,
                user_id,
                "03.08.2026 12:00".into(),
                None,
            )
            .await
            .unwrap();

        let first = bus.next(TASKS_QUEUE).await.unwrap().unwrap();
        bus.ack(&first).await.unwrap();
        assert!(matches!(
            decode::<Job>(&first.payload).unwrap(),
            Job::AbonementUpdate { abonement_id: 5, .. }
        ));

        let second = bus.next(TASKS_QUEUE).await.unwrap().unwrap();
        match decode::<Job>(&second.payload).unwrap() {
            Job::AbonementVisit(change) => {
                assert_eq!(change.msg_type, VisitEvent::VisitNew);
                assert_eq!(change.abonement_id, 5);
                assert!(change.ts_new.is_none());
            }
            other => panic!("unexpected job: {other:?}"),
        }
        db.close().await.unwrap();
    }
}
