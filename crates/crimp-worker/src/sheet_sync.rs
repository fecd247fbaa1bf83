// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! External sheet mirroring for abonements.
//!
//! Every operation is an upsert keyed by visit id, so at-least-once
//! delivery of the driving queue messages cannot corrupt the sheet. The
//! sheet itself is created lazily on first use and recorded on the
//! abonement row.

use tracing::{info, warn};

use crimp_core::types::{DATE_FMT, DATE_TIME_FMT};
use crimp_core::{CrimpError, Highlight, SheetClient, SheetHeader, SheetVisitRow};
use crimp_jobs::{VisitChange, VisitEvent};
use crimp_storage::queries::{abonements, users, visits};
use crimp_storage::{Abonement, Database};

/// Full resync: lazily create the sheet, rewrite the header, and append
/// every visit id not already present. Safe to re-run at any time.
pub async fn resync(
    db: &Database,
    sheets: &dyn SheetClient,
    abonement_id: i64,
) -> Result<(), CrimpError> {
    let Some(abonement) = abonements::get(db, abonement_id).await? else {
        warn!(abonement_id, "resync for a missing abonement, skipping");
        return Ok(());
    };
    let sheet_id = ensure_sheet(db, sheets, &abonement).await?;

    let header = build_header(db, &abonement).await?;
    sheets.update_header(&sheet_id, &header).await?;

    let present = sheets.list_visit_ids(&sheet_id).await?;
    let mut appended = 0;
    for (visit, user_name) in visits::list_all(db, abonement.id).await? {
        if present.contains(&visit.id) {
            continue;
        }
        sheets
            .append_visit(
                &sheet_id,
                &SheetVisitRow {
                    visit_id: visit.id,
                    ts: visit.ts.format(DATE_TIME_FMT).to_string(),
                    user_name,
                    active: true,
                },
            )
            .await?;
        appended += 1;
    }
    info!(abonement_id, appended, "sheet resync done");
    Ok(())
}

/// Apply one visit mutation to the sheet, keyed by visit id.
pub async fn apply_visit(
    db: &Database,
    sheets: &dyn SheetClient,
    change: &VisitChange,
) -> Result<(), CrimpError> {
    let Some(abonement) = abonements::get(db, change.abonement_id).await? else {
        warn!(
            abonement_id = change.abonement_id,
            "visit event for a missing abonement, skipping"
        );
        return Ok(());
    };
    let sheet_id = ensure_sheet(db, sheets, &abonement).await?;

    match change.msg_type {
        VisitEvent::VisitNew => {
            if sheets.find_visit(&sheet_id, change.visit_id).await?.is_some() {
                // Redelivered add; the row is already there.
                return Ok(());
            }
            let user_name = display_name(db, change.actor_id).await?;
            sheets
                .append_visit(
                    &sheet_id,
                    &SheetVisitRow {
                        visit_id: change.visit_id,
                        ts: change.ts.clone(),
                        user_name,
                        active: true,
                    },
                )
                .await?;
        }
        VisitEvent::VisitEdit => {
            match sheets.find_visit(&sheet_id, change.visit_id).await? {
                Some(mut row) => {
                    if let Some(ts_new) = &change.ts_new {
                        row.ts = ts_new.clone();
                    }
                    sheets.rewrite_visit(&sheet_id, &row, Highlight::Edited).await?;
                }
                None => warn!(visit_id = change.visit_id, "edited visit not in sheet"),
            }
        }
        VisitEvent::VisitDelete => {
            match sheets.find_visit(&sheet_id, change.visit_id).await? {
                Some(mut row) => {
                    row.active = false;
                    sheets
                        .rewrite_visit(&sheet_id, &row, Highlight::Removed)
                        .await?;
                }
                None => warn!(visit_id = change.visit_id, "deleted visit not in sheet"),
            }
        }
    }
    Ok(())
}

/// The sheet id for an abonement, creating and recording it on first use.
async fn ensure_sheet(
    db: &Database,
    sheets: &dyn SheetClient,
    abonement: &Abonement,
) -> Result<String, CrimpError> {
    if let Some(sheet_id) = &abonement.sheet_id {
        return Ok(sheet_id.clone());
    }
    let sheet_id = sheets.create_from_template(&abonement.name).await?;
    abonements::set_sheet_id(db, abonement.id, sheet_id.clone()).await?;
    let header = build_header(db, abonement).await?;
    sheets.update_header(&sheet_id, &header).await?;
    info!(abonement_id = abonement.id, sheet_id = sheet_id.as_str(), "sheet created");
    Ok(sheet_id)
}

async fn build_header(db: &Database, abonement: &Abonement) -> Result<SheetHeader, CrimpError> {
    let owner_name = display_name(db, abonement.owner_id).await?;
    Ok(SheetHeader {
        name: abonement.name.clone(),
        token: abonement.token.clone(),
        expiry: abonement
            .expiry_date
            .map(|d| d.format(DATE_FMT).to_string())
            .unwrap_or_default(),
        total_visits: if abonement.unlimited() {
            String::new()
        } else {
            abonement.total_visits.to_string()
        },
        description: abonement.description.clone().unwrap_or_default(),
        owner_name,
    })
}

async fn display_name(db: &Database, user_id: i64) -> Result<String, CrimpError> {
    Ok(users::get(db, user_id)
        .await?
        .map(|user| user.display())
        .unwrap_or_else(|| user_id.to_string()))
}
