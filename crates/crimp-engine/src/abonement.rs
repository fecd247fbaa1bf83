// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine operations over abonements, memberships, and visits.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crimp_core::CrimpError;
use crimp_storage::queries::{abonements, memberships, settings, visits};
use crimp_storage::{Abonement, Database, Visit};

/// Why a join attempt was refused. Each variant maps to its own
/// user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JoinError {
    /// No abonement carries the supplied token.
    #[error("unknown abonement key")]
    BadKey,
    /// Owners cannot join their own abonement.
    #[error("cannot join own abonement")]
    IsOwner,
    /// The actor already holds a membership.
    #[error("already a member")]
    AlreadyMember,
    /// The abonement was deleted by its owner.
    #[error("abonement is deleted")]
    Hidden,
}

/// Why an edit was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EditError {
    /// No such abonement.
    #[error("abonement not found")]
    NotFound,
    /// Only the owner may edit.
    #[error("not the owner")]
    NotOwner,
    /// Hidden abonements accept no edits.
    #[error("abonement is deleted")]
    Hidden,
}

/// What `delete` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The actor owned the abonement; it is now hidden.
    Deleted,
    /// The actor was a member; only their membership was removed.
    Unlinked,
    /// The actor was neither owner nor member.
    Refused,
}

impl DeleteOutcome {
    /// Whether anything changed.
    pub fn applied(&self) -> bool {
        !matches!(self, DeleteOutcome::Refused)
    }
}

/// Domain operations over abonements. Cheap to clone; all state lives in
/// the shared database.
#[derive(Clone)]
pub struct AbonementEngine {
    db: Database,
}

impl AbonementEngine {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create an abonement owned by `owner_id` with a fresh token.
    pub async fn create(
        &self,
        owner_id: i64,
        name: String,
        total_visits: i64,
        expiry_date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Result<Abonement, CrimpError> {
        let abonement =
            abonements::create(&self.db, owner_id, name, total_visits, expiry_date, description)
                .await?;
        info!(abonement_id = abonement.id, owner_id, "abonement created");
        Ok(abonement)
    }

    /// Edit an abonement's fields. Owner-only; hidden abonements refuse edits.
    pub async fn edit(
        &self,
        id: i64,
        actor_id: i64,
        name: String,
        total_visits: i64,
        expiry_date: Option<NaiveDate>,
        description: Option<String>,
    ) -> Result<Result<Abonement, EditError>, CrimpError> {
        let Some(abonement) = abonements::get(&self.db, id).await? else {
            return Ok(Err(EditError::NotFound));
        };
        if abonement.owner_id != actor_id {
            return Ok(Err(EditError::NotOwner));
        }
        if abonement.hidden {
            return Ok(Err(EditError::Hidden));
        }
        abonements::update(&self.db, id, name, total_visits, expiry_date, description).await?;
        info!(abonement_id = id, actor_id, "abonement edited");
        match abonements::get(&self.db, id).await? {
            Some(updated) => Ok(Ok(updated)),
            None => Ok(Err(EditError::NotFound)),
        }
    }

    /// Delete or unlink, depending on who asks: the owner soft-deletes the
    /// abonement, a member removes only their own membership.
    pub async fn delete(&self, id: i64, actor_id: i64) -> Result<DeleteOutcome, CrimpError> {
        let Some(abonement) = abonements::get(&self.db, id).await? else {
            return Ok(DeleteOutcome::Refused);
        };
        if abonement.owner_id == actor_id {
            abonements::set_hidden(&self.db, id).await?;
            info!(abonement_id = id, actor_id, "abonement hidden");
            return Ok(DeleteOutcome::Deleted);
        }
        if memberships::remove(&self.db, id, actor_id).await? {
            info!(abonement_id = id, actor_id, "membership unlinked");
            return Ok(DeleteOutcome::Unlinked);
        }
        Ok(DeleteOutcome::Refused)
    }

    /// Validate a join without side effects.
    ///
    /// Checks run in a fixed order -- token exists, actor is not the owner,
    /// actor is not already a member, abonement is not hidden -- so the
    /// caller sees one stable failure per situation.
    pub async fn join_preview(
        &self,
        token: &str,
        actor_id: i64,
    ) -> Result<Result<Abonement, JoinError>, CrimpError> {
        let Some(abonement) = abonements::get_by_token(&self.db, token.to_string()).await? else {
            return Ok(Err(JoinError::BadKey));
        };
        if abonement.owner_id == actor_id {
            return Ok(Err(JoinError::IsOwner));
        }
        if memberships::find(&self.db, abonement.id, actor_id).await?.is_some() {
            return Ok(Err(JoinError::AlreadyMember));
        }
        if abonement.hidden {
            return Ok(Err(JoinError::Hidden));
        }
        Ok(Ok(abonement))
    }

    /// Join an abonement by token, inserting the membership.
    pub async fn join_by_token(
        &self,
        token: &str,
        actor_id: i64,
    ) -> Result<Result<Abonement, JoinError>, CrimpError> {
        let abonement = match self.join_preview(token, actor_id).await? {
            Ok(abonement) => abonement,
            Err(e) => return Ok(Err(e)),
        };
        memberships::add(&self.db, abonement.id, actor_id).await?;
        info!(abonement_id = abonement.id, actor_id, "member joined");
        Ok(Ok(abonement))
    }

    /// Load an abonement by id and re-validate the supplied token.
    ///
    /// Numeric ids round-trip through the UI and can go stale; every action
    /// referencing one must present the token it saw, and a mismatch makes
    /// the action fail rather than operate on the wrong row.
    pub async fn resolve(&self, id: i64, token: &str) -> Result<Option<Abonement>, CrimpError> {
        let abonement = abonements::get(&self.db, id).await?;
        Ok(abonement.filter(|a| a.token == token))
    }

    /// Record a visit. Returns `None` -- not an error -- when the abonement
    /// is missing, hidden, or out of capacity: a racing concurrent visit or
    /// an owner deleting the pass mid-flow are expected outcomes.
    pub async fn record_visit(
        &self,
        abonement_id: i64,
        actor_id: i64,
        ts: DateTime<Utc>,
    ) -> Result<Option<Visit>, CrimpError> {
        let visit = visits::record_checked(&self.db, abonement_id, actor_id, ts).await?;
        match &visit {
            Some(visit) => info!(abonement_id, actor_id, visit_id = visit.id, "visit recorded"),
            None => debug!(abonement_id, actor_id, "visit refused"),
        }
        Ok(visit)
    }

    /// Remaining capacity. `None` means unlimited.
    pub async fn visits_left(&self, abonement: &Abonement) -> Result<Option<i64>, CrimpError> {
        if abonement.unlimited() {
            return Ok(None);
        }
        let used = visits::count(&self.db, abonement.id).await?;
        Ok(Some(abonement.total_visits - used))
    }

    /// Total visits recorded for the abonement.
    pub async fn visit_count(&self, abonement_id: i64) -> Result<i64, CrimpError> {
        visits::count(&self.db, abonement_id).await
    }

    /// Visits recorded by one user.
    pub async fn visit_count_by_user(
        &self,
        abonement_id: i64,
        user_id: i64,
    ) -> Result<i64, CrimpError> {
        visits::count_by_user(&self.db, abonement_id, user_id).await
    }

    /// One page of the visit history, newest first, with visitor names.
    pub async fn list_visits(
        &self,
        abonement_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<(Visit, String)>, CrimpError> {
        visits::list_page(&self.db, abonement_id, limit, offset).await
    }

    /// Look up one visit.
    pub async fn get_visit(&self, visit_id: i64) -> Result<Option<Visit>, CrimpError> {
        visits::get(&self.db, visit_id).await
    }

    /// Move a visit to a new timestamp. Permitted for the visit's user and
    /// the abonement's owner; a no-op `false` for anyone else.
    pub async fn edit_visit(
        &self,
        visit_id: i64,
        actor_id: i64,
        new_ts: DateTime<Utc>,
    ) -> Result<bool, CrimpError> {
        visits::update_checked(&self.db, visit_id, actor_id, new_ts).await
    }

    /// Delete a visit under the same permission rule as [`edit_visit`].
    pub async fn delete_visit(&self, visit_id: i64, actor_id: i64) -> Result<bool, CrimpError> {
        visits::delete_checked(&self.db, visit_id, actor_id).await
    }

    /// Non-hidden abonements the user owns.
    pub async fn list_mine(&self, owner_id: i64) -> Result<Vec<Abonement>, CrimpError> {
        abonements::list_by_owner(&self.db, owner_id).await
    }

    /// Non-hidden abonements the user has joined.
    pub async fn list_joined(&self, user_id: i64) -> Result<Vec<Abonement>, CrimpError> {
        abonements::list_joined(&self.db, user_id).await
    }

    /// Whether the user has opted in to visit notifications for the abonement.
    pub async fn notify_enabled(
        &self,
        user_id: i64,
        abonement_id: i64,
    ) -> Result<bool, CrimpError> {
        let value = settings::get(&self.db, user_id, settings::notify_key(abonement_id)).await?;
        Ok(value.as_deref() == Some(settings::NOTIFY_ALL))
    }

    /// Flip the notification opt-in. Returns the new state.
    pub async fn toggle_notify(
        &self,
        user_id: i64,
        abonement_id: i64,
    ) -> Result<bool, CrimpError> {
        let key = settings::notify_key(abonement_id);
        if self.notify_enabled(user_id, abonement_id).await? {
            settings::unset(&self.db, user_id, key).await?;
            Ok(false)
        } else {
            settings::set(&self.db, user_id, key, settings::NOTIFY_ALL.to_string()).await?;
            Ok(true)
        }
    }
}
