// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification fan-out for visit events.
//!
//! Recipients are the abonement's owner plus every current member, minus
//! the acting user, filtered by the per-user opt-in setting. One
//! Notification row is recorded per recipient before the delivery attempt,
//! and a failed delivery to one recipient never blocks the others.

use tracing::{debug, info, warn};

use crimp_core::{ChatChannel, CrimpError};
use crimp_jobs::{VisitChange, VisitEvent};
use crimp_storage::queries::{abonements, memberships, notifications, settings, users, visits};
use crimp_storage::{Abonement, Database};

/// Deliver a visit event to every eligible, opted-in recipient.
pub async fn fan_out(
    db: &Database,
    channel: &dyn ChatChannel,
    change: &VisitChange,
) -> Result<(), CrimpError> {
    let Some(abonement) = abonements::get(db, change.abonement_id).await? else {
        warn!(
            abonement_id = change.abonement_id,
            "visit event for a missing abonement, skipping fan-out"
        );
        return Ok(());
    };

    let mut recipients = vec![abonement.owner_id];
    recipients.extend(memberships::member_user_ids(db, abonement.id).await?);
    recipients.sort_unstable();
    recipients.dedup();
    recipients.retain(|&user_id| user_id != change.actor_id);

    let actor_name = users::get(db, change.actor_id)
        .await?
        .map(|user| user.display())
        .unwrap_or_else(|| change.actor_id.to_string());

    let visits_left = if abonement.unlimited() {
        None
    } else {
        let used = visits::count(db, abonement.id).await?;
        Some(abonement.total_visits - used)
    };

    let text = compose(change, &abonement, &actor_name, visits_left);

    let mut delivered = 0;
    for user_id in recipients {
        let opted_in = settings::get(db, user_id, settings::notify_key(abonement.id))
            .await?
            .as_deref()
            == Some(settings::NOTIFY_ALL);
        if !opted_in {
            debug!(user_id, abonement_id = abonement.id, "recipient opted out");
            continue;
        }
        let Some(user) = users::get(db, user_id).await? else {
            warn!(user_id, "recipient row vanished, skipping");
            continue;
        };

        notifications::add(db, user.id, text.clone()).await?;
        match channel.send_text(user.chat_id, &text).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                // One broken recipient must not fail the job.
                warn!(user_id, chat_id = user.chat_id, error = %e, "delivery failed");
            }
        }
    }
    info!(
        abonement_id = abonement.id,
        visit_id = change.visit_id,
        delivered,
        "visit fan-out done"
    );
    Ok(())
}

fn compose(
    change: &VisitChange,
    abonement: &Abonement,
    actor_name: &str,
    visits_left: Option<i64>,
) -> String {
    let mut lines = vec![
        match change.msg_type {
            VisitEvent::VisitNew => "Visit recorded",
            VisitEvent::VisitEdit => "Visit date changed",
            VisitEvent::VisitDelete => "Visit deleted",
        }
        .to_string(),
        format!("Pass: {}", abonement.name),
        format!("By: {actor_name}"),
    ];
    match (&change.msg_type, &change.ts_new) {
        (VisitEvent::VisitEdit, Some(ts_new)) => {
            lines.push(format!("When: {} -> {}", change.ts, ts_new));
        }
        _ => lines.push(format!("When: {}", change.ts)),
    }
    if let Some(left) = visits_left {
        lines.push(format!("Visits left: {left}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn abonement(total_visits: i64) -> Abonement {
        Abonement {
            id: 1,
            token: "tok".into(),
            owner_id: 1,
            name: "Gym Pass".into(),
            total_visits,
            expiry_date: NaiveDate::from_ymd_opt(2026, 12, 31),
            description: None,
            hidden: false,
            sheet_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn change(msg_type: VisitEvent, ts_new: Option<&str>) -> VisitChange {
        VisitChange {
            uuid: "u".into(),
            msg_type,
            abonement_id: 1,
            visit_id: 2,
            actor_id: 3,
            ts: "01.08.2026 10:00".into(),
            ts_new: ts_new.map(Into::into),
        }
    }

    #[test]
    fn compose_names_event_pass_actor_and_capacity() {
        let text = compose(
            &change(VisitEvent::VisitNew, None),
            &abonement(10),
            "Alice",
            Some(7),
        );
        assert!(text.contains("Visit recorded"));
        assert!(text.contains("Pass: Gym Pass"));
        assert!(text.contains("By: Alice"));
        assert!(text.contains("When: 01.08.2026 10:00"));
        assert!(text.contains("Visits left: 7"));
    }

    #[test]
    fn compose_shows_old_and_new_for_edits() {
        let text = compose(
            &change(VisitEvent::VisitEdit, Some("02.08.2026 19:30")),
            &abonement(0),
            "Alice",
            None,
        );
        assert!(text.contains("Visit date changed"));
        assert!(text.contains("When: 01.08.2026 10:00 -> 02.08.2026 19:30"));
        // Unlimited passes report no remaining count.
        assert!(!text.contains("Visits left"));
    }
}
