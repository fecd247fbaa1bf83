// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User-facing reply texts. Every refusal gets its own message so the user
//! always knows which rule fired.

use chrono::NaiveDate;
use crimp_core::types::{DATE_FMT, DATE_TIME_FMT};
use crimp_engine::JoinError;
use crimp_storage::Abonement;

use crate::input::{Action, ActionKind};

pub fn help_idle() -> String {
    [
        "Working with visit passes:",
        "/register - introduce yourself",
        "/new - create a pass",
        "/join - join a pass by key",
        "/list - list your passes",
        "/cancel - abort the current step",
    ]
    .join("\n")
}

pub fn unknown() -> String {
    "Unknown command. Help - /help, exit - /cancel".to_string()
}

pub fn cancelled() -> String {
    "Cancelled. You are back in the main menu.".to_string()
}

pub fn generic_failure() -> String {
    "Something went wrong. The current step was reset, please start over.".to_string()
}

pub fn not_permitted() -> String {
    "You are not permitted to do that.".to_string()
}

pub fn generation_queued(task_id: i64) -> String {
    format!("Generation queued, task {task_id}. The result will arrive here.")
}

pub fn visit_missing() -> String {
    "That visit no longer exists.".to_string()
}

pub fn bad_deep_link() -> String {
    format!("Could not read the link parameters.\n{}", help_idle())
}

pub fn stale_card() -> String {
    "This pass is no longer available. Open it again from /list.".to_string()
}

// --- registration chain ---

pub fn ask_phone() -> String {
    [
        "Registration: share your phone number.",
        "It stays hidden from other users.",
        "/cancel - abort",
    ]
    .join("\n")
}

pub fn bad_phone() -> String {
    "That does not look like a phone number. Digits with an optional leading +, please.".to_string()
}

pub fn ask_display_name(current: Option<&str>) -> String {
    let mut lines = vec![
        "Enter your name".to_string(),
        "Other users of your passes will see it.".to_string(),
    ];
    if let Some(current) = current {
        lines.push(format!("Current: {current}"));
        lines.push("/skip - keep it".to_string());
    }
    lines.push("/cancel - abort".to_string());
    lines.join("\n")
}

pub fn registered(name: &str) -> String {
    format!("Registration complete, {name}. You are back in the main menu.")
}

// --- create / edit chain ---

pub fn ask_name(current: Option<&str>) -> String {
    let mut lines = vec![
        "Enter the pass name".to_string(),
        "Format: <where> until <when> for <whom>".to_string(),
    ];
    if let Some(current) = current {
        lines.push(format!("Current: {current}"));
        lines.push("/skip - keep it".to_string());
    }
    lines.push("/cancel - abort".to_string());
    lines.join("\n")
}

pub fn bad_name() -> String {
    "That name does not work, plain text is needed. Try another one, or /cancel.".to_string()
}

pub fn skip_rejected() -> String {
    "There is nothing to keep yet, enter a value. Exit - /cancel".to_string()
}

pub fn ask_total_visits(max: i64, current: Option<i64>) -> String {
    let mut lines = vec![
        "Enter the number of visits".to_string(),
        format!("A number from 1 to {max}, or /empty if visits are not limited"),
    ];
    if let Some(current) = current {
        lines.push(format!("Current: {}", format_total(current)));
        lines.push("/skip - keep it".to_string());
    }
    lines.push("/cancel - abort".to_string());
    lines.join("\n")
}

pub fn bad_total_visits(max: i64) -> String {
    format!("Visit count does not fit: 0..{max}. Send a number, /empty for unlimited, or /cancel.")
}

pub fn ask_expiry(current: Option<NaiveDate>) -> String {
    let mut lines = vec![
        format!("Enter the expiry date, format {}", "DD.MM.YYYY"),
        "/empty - no expiry date".to_string(),
    ];
    if let Some(current) = current {
        lines.push(format!("Current: {}", current.format(DATE_FMT)));
    }
    lines.push("/skip - keep it (when editing)".to_string());
    lines.push("/cancel - abort".to_string());
    lines.join("\n")
}

pub fn bad_expiry() -> String {
    "Could not read that date. Format: DD.MM.YYYY, or /empty for no expiry.".to_string()
}

pub fn ask_description(current: Option<&str>) -> String {
    let mut lines = vec![
        "Enter the description".to_string(),
        "Everything users of the pass should know.".to_string(),
        "/empty - no description".to_string(),
    ];
    if let Some(current) = current {
        lines.push(format!("Current: {current}"));
        lines.push("/skip - keep it".to_string());
    }
    lines.push("/cancel - abort".to_string());
    lines.join("\n")
}

pub fn created(abonement: &Abonement, link: &str) -> String {
    [
        "Pass created.".to_string(),
        abonement.name.clone(),
        format!("Key: {}", abonement.token),
        "Share this link to invite others:".to_string(),
        link.to_string(),
    ]
    .join("\n")
}

pub fn edited(abonement: &Abonement) -> String {
    let mut lines = vec!["Pass updated.".to_string(), abonement.name.clone()];
    if let Some(description) = &abonement.description {
        lines.push(description.clone());
    }
    lines.push(match abonement.expiry_date {
        Some(date) => format!("Until: {}", date.format(DATE_FMT)),
        None => "Until: unlimited".to_string(),
    });
    lines.push(format!("Visits: {}", format_total(abonement.total_visits)));
    lines.push(format!("Key: {}", abonement.token));
    lines.join("\n")
}

// --- join chain ---

pub fn join_prompt() -> String {
    "Joining a pass. Enter its key (UUID format).".to_string()
}

pub fn bad_key_format() -> String {
    "That does not look like a pass key. Expected UUID format, like 123e4567-e89b-12d3-a456-426614174000.".to_string()
}

pub fn join_error(error: JoinError) -> String {
    match error {
        JoinError::BadKey => "Unknown pass key.".to_string(),
        JoinError::IsOwner => "You cannot join your own pass.".to_string(),
        JoinError::AlreadyMember => "You are already joined to this pass.".to_string(),
        JoinError::Hidden => "This pass was deleted by its owner.".to_string(),
    }
}

pub fn join_ask(name: &str) -> String {
    format!("Join the pass {name}? Answer yes or no.")
}

pub fn joined(name: &str) -> String {
    format!("You joined the pass {name}.")
}

pub fn join_declined() -> String {
    "Fine, not joining. You are back in the main menu.".to_string()
}

pub fn bad_yes_no() -> String {
    "Please answer yes or no, or /cancel.".to_string()
}

// --- listing and the open card ---

pub fn list_empty() -> String {
    "No passes yet. Create one with /new or join one with /join.".to_string()
}

pub fn list_abonements(own: &[Abonement], joined: &[Abonement]) -> String {
    let mut lines = Vec::new();
    if !own.is_empty() {
        lines.push("My passes:".to_string());
        for abonement in own {
            lines.push(format!(
                "- {} (open: {})",
                abonement.name,
                Action::new(ActionKind::Open, abonement.id, abonement.token.clone()).encode()
            ));
        }
    }
    if !joined.is_empty() {
        lines.push("Joined passes:".to_string());
        for abonement in joined {
            lines.push(format!(
                "- {} (open: {})",
                abonement.name,
                Action::new(ActionKind::Open, abonement.id, abonement.token.clone()).encode()
            ));
        }
    }
    lines.join("\n")
}

pub fn info_card(
    abonement: &Abonement,
    visits_count: i64,
    my_visits_count: i64,
    visits_left: Option<i64>,
    notify: bool,
    today: NaiveDate,
) -> String {
    let mut lines = vec!["Selected pass".to_string(), abonement.name.clone()];
    if let Some(description) = &abonement.description {
        lines.push(description.clone());
    }
    match abonement.expiry_date {
        Some(date) => {
            lines.push(format!("Until {}", date.format(DATE_FMT)));
            let days_left = (date - today).num_days() + 1;
            if days_left > 1 {
                lines.push(format!("Days left: {days_left}"));
            } else if days_left == 1 {
                lines.push("Today is the last day".to_string());
            } else {
                lines.push("Expired".to_string());
            }
        }
        None => lines.push("No expiry date".to_string()),
    }
    lines.push(format!("Visits: {}", format_total(abonement.total_visits)));
    lines.push(format!("Recorded visits: {visits_count}"));
    lines.push(format!("Of them mine: {my_visits_count}"));
    if let Some(left) = visits_left {
        lines.push(format!("Visits left: {left}"));
    }
    lines.push(if notify {
        "Visit notifications: on".to_string()
    } else {
        "Visit notifications: off".to_string()
    });
    lines.join("\n")
}

pub fn share(abonement: &Abonement, link: &str) -> String {
    let mut lines = vec!["Invite to the pass".to_string(), abonement.name.clone()];
    if let Some(description) = &abonement.description {
        lines.push(description.clone());
    }
    lines.push("Join link:".to_string());
    lines.push(link.to_string());
    lines.join("\n")
}

pub fn notify_state(on: bool) -> String {
    if on {
        "Visit notifications for this pass are now on.".to_string()
    } else {
        "Visit notifications for this pass are now off.".to_string()
    }
}

// --- visits ---

pub fn visit_ask(name: &str) -> String {
    format!("Record a visit for {name}? Answer yes or no.")
}

pub fn visit_done(ts: &chrono::DateTime<chrono::Utc>) -> String {
    format!("Visit recorded: {}", ts.format(DATE_TIME_FMT))
}

pub fn visit_refused() -> String {
    "No visit recorded: the pass is out of visits or was deleted.".to_string()
}

pub fn visit_declined() -> String {
    "No visit recorded.".to_string()
}

pub fn page_header(offset: i64, total: i64, shown: usize) -> String {
    if total == 0 {
        "No visits yet.".to_string()
    } else {
        format!(
            "Visits {} to {} of {total}",
            offset + 1,
            offset + shown as i64
        )
    }
}

pub fn visit_line(
    visit: &crimp_storage::Visit,
    user_name: &str,
    abonement_token: &str,
) -> String {
    format!(
        "{} {} (pick: {})",
        visit.ts.format(DATE_TIME_FMT),
        user_name,
        Action::new(
            ActionKind::SelectVisit(visit.id),
            visit.abonement_id,
            abonement_token,
        )
        .encode()
    )
}

pub fn visit_selected(
    visit: &crimp_storage::Visit,
    user_name: &str,
    abonement_token: &str,
) -> String {
    [
        format!("Visit {} by {}", visit.ts.format(DATE_TIME_FMT), user_name),
        format!(
            "Edit date: {}",
            Action::new(ActionKind::EditVisit, visit.abonement_id, abonement_token).encode()
        ),
        format!(
            "Delete: {}",
            Action::new(ActionKind::DeleteVisit, visit.abonement_id, abonement_token).encode()
        ),
    ]
    .join("\n")
}

pub fn ask_visit_ts(current: &chrono::DateTime<chrono::Utc>) -> String {
    [
        "Changing the visit date.".to_string(),
        format!("Current: {}", current.format(DATE_TIME_FMT)),
        "Send the new date as DD.MM.YYYY HH:MM, or /cancel.".to_string(),
    ]
    .join("\n")
}

pub fn bad_visit_ts() -> String {
    "Could not read that date. Format: DD.MM.YYYY HH:MM, or /cancel.".to_string()
}

pub fn ask_visit_delete() -> String {
    "Send yes to delete this visit, or /cancel.".to_string()
}

pub fn done() -> String {
    "Done.".to_string()
}

pub fn not_done() -> String {
    "Not done.".to_string()
}

// --- delete / unlink ---

pub fn delete_ask(is_owner: bool, name: &str) -> String {
    let (title, verb) = if is_owner {
        ("Deleting the pass", "delete")
    } else {
        ("Unlinking from the pass", "unlink")
    };
    [
        format!("{title} {name}"),
        format!("Send yes to {verb} it, or /cancel."),
    ]
    .join("\n")
}

pub fn delete_result(unlink: bool, applied: bool, token: &str) -> String {
    let verb = if unlink { "unlinked" } else { "deleted" };
    let head = if applied {
        format!("Pass {verb}.")
    } else {
        format!("Pass NOT {verb}.")
    };
    format!("{head}\nKey: {token}")
}

pub fn not_deleted() -> String {
    "Pass not deleted.".to_string()
}

fn format_total(total_visits: i64) -> String {
    if total_visits == 0 {
        "unlimited".to_string()
    } else {
        total_visits.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_abonement() -> Abonement {
        Abonement {
            id: 1,
            token: "tok".into(),
            owner_id: 1,
            name: "Gym Pass".into(),
            total_visits: 10,
            expiry_date: NaiveDate::from_ymd_opt(2026, 12, 31),
            description: Some("Ten visits".into()),
            hidden: false,
            sheet_id: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn info_card_counts_days() {
        let abonement = sample_abonement();
        let today = NaiveDate::from_ymd_opt(2026, 12, 21).unwrap();
        let card = info_card(&abonement, 3, 1, Some(7), true, today);
        assert!(card.contains("Days left: 11"));
        assert!(card.contains("Visits left: 7"));
        assert!(card.contains("notifications: on"));

        let last_day = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert!(info_card(&abonement, 3, 1, None, false, last_day)
            .contains("Today is the last day"));

        let after = NaiveDate::from_ymd_opt(2027, 1, 2).unwrap();
        assert!(info_card(&abonement, 3, 1, None, false, after).contains("Expired"));
    }

    #[test]
    fn page_header_handles_empty_history() {
        assert_eq!(page_header(0, 0, 0), "No visits yet.");
        assert_eq!(page_header(10, 23, 5), "Visits 11 to 15 of 23");
    }

    #[test]
    fn join_errors_have_distinct_texts() {
        let texts: Vec<String> = [
            JoinError::BadKey,
            JoinError::IsOwner,
            JoinError::AlreadyMember,
            JoinError::Hidden,
        ]
        .into_iter()
        .map(join_error)
        .collect();
        for (i, a) in texts.iter().enumerate() {
            for b in texts.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
