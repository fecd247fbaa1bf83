// SPDX-FileCopyrightText: 2026 Crimp Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The wizard's transition function.
//!
//! Every handler returns the next state plus the replies to send; the
//! caller persists the state afterwards. Actions always re-validate their
//! token against the current row before touching anything, and every
//! commit that must be mirrored externally publishes exactly one job.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{debug, info, warn};

use crimp_core::types::DATE_TIME_FMT;
use crimp_core::{ChatChannel, CrimpError};
use crimp_engine::{AbonementEngine, DeleteOutcome};
use crimp_jobs::{JobProducer, VisitEvent};
use crimp_storage::queries::{users, wizard as wizard_store};
use crimp_storage::{Abonement, Database, User};

use crate::input::{
    parse_expiry, parse_visit_count, parse_visit_ts, parse_yes_no, valid_name, valid_phone,
    Action, ActionKind, Command, Input,
};
use crate::replies;
use crate::state::{Draft, WizardState};

/// Business limits the wizard enforces on numeric input and paging.
#[derive(Debug, Clone, Copy)]
pub struct WizardLimits {
    /// Largest accepted visit budget.
    pub max_visits: i64,
    /// Page size of the visit history.
    pub page_limit: i64,
}

/// The per-chat conversation wizard.
#[derive(Clone)]
pub struct Wizard {
    db: Database,
    engine: AbonementEngine,
    producer: JobProducer,
    channel: Arc<dyn ChatChannel>,
    limits: WizardLimits,
}

impl Wizard {
    pub fn new(
        db: Database,
        engine: AbonementEngine,
        producer: JobProducer,
        channel: Arc<dyn ChatChannel>,
        limits: WizardLimits,
    ) -> Self {
        Self {
            db,
            engine,
            producer,
            channel,
            limits,
        }
    }

    /// Current state of a chat. Undecodable persisted state degrades to idle.
    pub async fn state(&self, chat_id: i64) -> Result<WizardState, CrimpError> {
        match wizard_store::load(&self.db, chat_id).await? {
            Some((_, data)) => match serde_json::from_str(&data) {
                Ok(state) => Ok(state),
                Err(e) => {
                    warn!(chat_id, error = %e, "undecodable wizard state, resetting");
                    Ok(WizardState::Idle)
                }
            },
            None => Ok(WizardState::Idle),
        }
    }

    /// Clear a chat's state back to idle.
    pub async fn reset(&self, chat_id: i64) -> Result<(), CrimpError> {
        wizard_store::clear(&self.db, chat_id).await
    }

    async fn save(&self, chat_id: i64, state: &WizardState) -> Result<(), CrimpError> {
        if *state == WizardState::Idle {
            return wizard_store::clear(&self.db, chat_id).await;
        }
        let data = serde_json::to_string(state)
            .map_err(|e| CrimpError::Internal(format!("encode wizard state: {e}")))?;
        wizard_store::save(&self.db, chat_id, state.step_name().to_string(), data).await
    }

    /// Handle one inbound message for a chat.
    pub async fn handle_text(
        &self,
        chat_id: i64,
        actor: &User,
        text: &str,
    ) -> Result<Vec<String>, CrimpError> {
        let input = Input::parse(text);
        if let Input::Action(action) = &input {
            return self.handle_action(chat_id, actor, action.clone()).await;
        }

        let state = self.state(chat_id).await?;
        debug!(chat_id, state = state.step_name(), "wizard input");

        // Cancel works everywhere.
        if input == Input::Command(Command::Cancel) {
            self.save(chat_id, &WizardState::Idle).await?;
            return Ok(vec![replies::cancelled()]);
        }
        if input == Input::Command(Command::Help) {
            return Ok(vec![replies::help_idle()]);
        }

        let (next, replies) = match state {
            WizardState::Idle => self.on_idle(actor, input).await?,
            WizardState::RegisterPhone => self.on_register_phone(input),
            WizardState::RegisterName { phone } => {
                self.on_register_name(actor, phone, input).await?
            }
            WizardState::Name { draft } => self.on_name(draft, input),
            WizardState::TotalVisits { draft } => self.on_total_visits(draft, input),
            WizardState::ExpiryDate { draft } => self.on_expiry(draft, input),
            WizardState::Description { draft } => self.on_description(actor, draft, input).await?,
            WizardState::Join => self.on_join(actor, input).await?,
            WizardState::JoinAccept {
                abonement_id,
                token,
            } => self.on_join_accept(actor, abonement_id, token, input).await?,
            WizardState::VisitConfirm {
                abonement_id,
                token,
            } => self.on_visit_confirm(actor, abonement_id, token, input).await?,
            WizardState::VisitEditConfirm {
                abonement_id,
                token,
                visit_id,
            } => {
                self.on_visit_edit_confirm(actor, abonement_id, token, visit_id, input)
                    .await?
            }
            WizardState::VisitDeleteConfirm {
                abonement_id,
                token,
                visit_id,
            } => {
                self.on_visit_delete_confirm(actor, abonement_id, token, visit_id, input)
                    .await?
            }
            WizardState::DeleteConfirm {
                abonement_id,
                token,
                unlink,
            } => {
                self.on_delete_confirm(actor, abonement_id, token, unlink, input)
                    .await?
            }
            state @ (WizardState::Open { .. }
            | WizardState::History { .. }
            | WizardState::SelectVisit { .. }) => (state, vec![replies::unknown()]),
        };

        self.save(chat_id, &next).await?;
        Ok(replies)
    }

    /// Handle a `/start` deep link: `pass_<token>` joins that abonement.
    pub async fn handle_deep_link(
        &self,
        chat_id: i64,
        actor: &User,
        payload: &str,
    ) -> Result<Vec<String>, CrimpError> {
        self.save(chat_id, &WizardState::Idle).await?;
        let Some(token) = parse_pass_payload(payload) else {
            return Ok(vec![replies::bad_deep_link()]);
        };
        match self.engine.join_by_token(&token, actor.id).await? {
            Ok(abonement) => {
                info!(chat_id, abonement_id = abonement.id, "joined via deep link");
                Ok(vec![replies::joined(&abonement.name)])
            }
            Err(e) => Ok(vec![replies::join_error(e)]),
        }
    }

    // --- idle ---

    async fn on_idle(
        &self,
        actor: &User,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let Input::Text(text) = input else {
            return Ok((WizardState::Idle, vec![replies::unknown()]));
        };
        let (command, argument) = match text.split_once(' ') {
            Some((head, tail)) => (head, tail.trim()),
            None => (text.as_str(), ""),
        };
        match command {
            "/register" => Ok((
                WizardState::RegisterPhone,
                vec![replies::ask_phone()],
            )),
            "/new" => Ok((
                WizardState::Name {
                    draft: Draft::default(),
                },
                vec![replies::ask_name(None)],
            )),
            "/join" => Ok((WizardState::Join, vec![replies::join_prompt()])),
            "/list" => {
                let own = self.engine.list_mine(actor.id).await?;
                let joined = self.engine.list_joined(actor.id).await?;
                let reply = if own.is_empty() && joined.is_empty() {
                    replies::list_empty()
                } else {
                    replies::list_abonements(&own, &joined)
                };
                Ok((WizardState::Idle, vec![reply]))
            }
            "/generate" => {
                if !actor.roles.contains(crimp_core::Role::Admin) {
                    return Ok((WizardState::Idle, vec![replies::not_permitted()]));
                }
                let job = if argument.is_empty() { "all" } else { argument };
                let task = self.producer.submit_table_job(actor.id, job).await?;
                Ok((
                    WizardState::Idle,
                    vec![replies::generation_queued(task.id)],
                ))
            }
            "/pictures" => {
                if !actor.roles.contains(crimp_core::Role::Admin) {
                    return Ok((WizardState::Idle, vec![replies::not_permitted()]));
                }
                let job = if argument.is_empty() { "all" } else { argument };
                let task = self.producer.submit_pictures_job(actor.id, job).await?;
                Ok((
                    WizardState::Idle,
                    vec![replies::generation_queued(task.id)],
                ))
            }
            _ => Ok((WizardState::Idle, vec![replies::unknown()])),
        }
    }

    // --- registration chain ---

    fn on_register_phone(&self, input: Input) -> (WizardState, Vec<String>) {
        match input {
            Input::Text(text) => match valid_phone(&text) {
                Some(phone) => (
                    WizardState::RegisterName { phone },
                    vec![replies::ask_display_name(None)],
                ),
                None => (WizardState::RegisterPhone, vec![replies::bad_phone()]),
            },
            _ => (WizardState::RegisterPhone, vec![replies::bad_phone()]),
        }
    }

    async fn on_register_name(
        &self,
        actor: &User,
        phone: String,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let name = match input {
            Input::Command(Command::Skip) => match &actor.display_name {
                Some(current) => current.clone(),
                None => {
                    return Ok((
                        WizardState::RegisterName { phone },
                        vec![replies::skip_rejected()],
                    ))
                }
            },
            Input::Text(text) => match valid_name(&text) {
                Some(name) => name,
                None => {
                    return Ok((
                        WizardState::RegisterName { phone },
                        vec![replies::bad_name()],
                    ))
                }
            },
            _ => {
                return Ok((
                    WizardState::RegisterName { phone },
                    vec![replies::ask_display_name(actor.display_name.as_deref())],
                ))
            }
        };
        users::register(&self.db, actor.id, phone, name.clone()).await?;
        info!(user_id = actor.id, "user registered");
        Ok((WizardState::Idle, vec![replies::registered(&name)]))
    }

    // --- create / edit chain ---

    fn on_name(&self, mut draft: Draft, input: Input) -> (WizardState, Vec<String>) {
        match input {
            Input::Command(Command::Skip) if draft.is_edit() && draft.name.is_some() => {
                let ask = replies::ask_total_visits(
                    self.limits.max_visits,
                    draft.total_visits.filter(|_| draft.is_edit()),
                );
                (WizardState::TotalVisits { draft }, vec![ask])
            }
            Input::Command(Command::Skip) => {
                (WizardState::Name { draft }, vec![replies::skip_rejected()])
            }
            Input::Text(text) => match valid_name(&text) {
                Some(name) => {
                    draft.name = Some(name);
                    let ask = replies::ask_total_visits(
                        self.limits.max_visits,
                        draft.total_visits.filter(|_| draft.is_edit()),
                    );
                    (WizardState::TotalVisits { draft }, vec![ask])
                }
                None => (WizardState::Name { draft }, vec![replies::bad_name()]),
            },
            _ => (WizardState::Name { draft }, vec![replies::bad_name()]),
        }
    }

    fn on_total_visits(&self, mut draft: Draft, input: Input) -> (WizardState, Vec<String>) {
        let advance = |draft: Draft| {
            let ask = replies::ask_expiry(draft.expiry_date.filter(|_| draft.is_edit()));
            (WizardState::ExpiryDate { draft }, vec![ask])
        };
        match input {
            Input::Command(Command::Skip) if draft.is_edit() && draft.total_visits.is_some() => {
                advance(draft)
            }
            Input::Command(Command::Skip) => (
                WizardState::TotalVisits { draft },
                vec![replies::skip_rejected()],
            ),
            Input::Command(Command::Empty) => {
                draft.total_visits = Some(0);
                advance(draft)
            }
            Input::Text(text) => match parse_visit_count(&text, self.limits.max_visits) {
                Some(count) => {
                    draft.total_visits = Some(count);
                    advance(draft)
                }
                None => (
                    WizardState::TotalVisits { draft },
                    vec![replies::bad_total_visits(self.limits.max_visits)],
                ),
            },
            _ => (
                WizardState::TotalVisits { draft },
                vec![replies::bad_total_visits(self.limits.max_visits)],
            ),
        }
    }

    fn on_expiry(&self, mut draft: Draft, input: Input) -> (WizardState, Vec<String>) {
        let advance = |draft: Draft| {
            let current = draft
                .description
                .clone()
                .filter(|_| draft.is_edit());
            let ask = replies::ask_description(current.as_deref());
            (WizardState::Description { draft }, vec![ask])
        };
        match input {
            Input::Command(Command::Skip) if draft.is_edit() => advance(draft),
            Input::Command(Command::Skip) => (
                WizardState::ExpiryDate { draft },
                vec![replies::skip_rejected()],
            ),
            Input::Command(Command::Empty) => {
                draft.expiry_date = None;
                advance(draft)
            }
            Input::Text(text) => match parse_expiry(&text) {
                Some(date) => {
                    draft.expiry_date = Some(date);
                    advance(draft)
                }
                None => (
                    WizardState::ExpiryDate { draft },
                    vec![replies::bad_expiry()],
                ),
            },
            _ => (
                WizardState::ExpiryDate { draft },
                vec![replies::bad_expiry()],
            ),
        }
    }

    async fn on_description(
        &self,
        actor: &User,
        mut draft: Draft,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        match input {
            Input::Command(Command::Skip) if draft.is_edit() => self.commit(actor, draft).await,
            Input::Command(Command::Skip) => Ok((
                WizardState::Description { draft },
                vec![replies::skip_rejected()],
            )),
            Input::Command(Command::Empty) => {
                draft.description = None;
                self.commit(actor, draft).await
            }
            Input::Text(text) => {
                draft.description = Some(text.trim().to_string());
                self.commit(actor, draft).await
            }
            _ => Ok((
                WizardState::Description { draft },
                vec![replies::ask_description(None)],
            )),
        }
    }

    async fn commit(
        &self,
        actor: &User,
        draft: Draft,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let (Some(name), Some(total_visits)) = (draft.name.clone(), draft.total_visits) else {
            warn!(user_id = actor.id, "wizard commit with incomplete draft");
            return Ok((WizardState::Idle, vec![replies::generic_failure()]));
        };

        if let Some(target) = &draft.editing {
            if self
                .engine
                .resolve(target.abonement_id, &target.token)
                .await?
                .is_none()
            {
                return Ok((WizardState::Idle, vec![replies::stale_card()]));
            }
            let edited = self
                .engine
                .edit(
                    target.abonement_id,
                    actor.id,
                    name,
                    total_visits,
                    draft.expiry_date,
                    draft.description.clone(),
                )
                .await?;
            let reply = match edited {
                Ok(abonement) => {
                    self.producer.publish_abonement_update(abonement.id).await?;
                    replies::edited(&abonement)
                }
                Err(crimp_engine::EditError::NotOwner) => replies::not_permitted(),
                Err(_) => replies::stale_card(),
            };
            return Ok((WizardState::Idle, vec![reply]));
        }

        let abonement = self
            .engine
            .create(
                actor.id,
                name,
                total_visits,
                draft.expiry_date,
                draft.description.clone(),
            )
            .await?;
        self.producer.publish_abonement_update(abonement.id).await?;
        let link = self.channel.deep_link(&format!("pass_{}", abonement.token));
        Ok((
            WizardState::Idle,
            vec![replies::created(&abonement, &link)],
        ))
    }

    // --- join chain ---

    async fn on_join(
        &self,
        actor: &User,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let Input::Text(text) = input else {
            return Ok((WizardState::Join, vec![replies::bad_key_format()]));
        };
        let token = text.trim().to_lowercase();
        if uuid::Uuid::parse_str(&token).is_err() {
            return Ok((WizardState::Join, vec![replies::bad_key_format()]));
        }
        match self.engine.join_preview(&token, actor.id).await? {
            Ok(abonement) => Ok((
                WizardState::JoinAccept {
                    abonement_id: abonement.id,
                    token,
                },
                vec![replies::join_ask(&abonement.name)],
            )),
            Err(e) => Ok((WizardState::Join, vec![replies::join_error(e)])),
        }
    }

    async fn on_join_accept(
        &self,
        actor: &User,
        abonement_id: i64,
        token: String,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let Input::Text(text) = input else {
            return Ok((
                WizardState::JoinAccept {
                    abonement_id,
                    token,
                },
                vec![replies::bad_yes_no()],
            ));
        };
        match parse_yes_no(&text) {
            Some(true) => {
                // Re-validates everything: the owner may have deleted the
                // pass while we waited for the answer.
                let reply = match self.engine.join_by_token(&token, actor.id).await? {
                    Ok(abonement) => replies::joined(&abonement.name),
                    Err(e) => replies::join_error(e),
                };
                Ok((WizardState::Idle, vec![reply]))
            }
            Some(false) => Ok((WizardState::Idle, vec![replies::join_declined()])),
            None => Ok((
                WizardState::JoinAccept {
                    abonement_id,
                    token,
                },
                vec![replies::bad_yes_no()],
            )),
        }
    }

    // --- structured actions ---

    async fn handle_action(
        &self,
        chat_id: i64,
        actor: &User,
        action: Action,
    ) -> Result<Vec<String>, CrimpError> {
        // Numeric ids can be stale across UI round-trips; the token decides.
        let Some(abonement) = self
            .engine
            .resolve(action.abonement_id, &action.token)
            .await?
        else {
            debug!(chat_id, abonement_id = action.abonement_id, "stale action token");
            return Ok(vec![replies::stale_card()]);
        };

        let state = self.state(chat_id).await?;
        let (next, replies) = match action.kind {
            ActionKind::Open => {
                let card = self.render_card(actor, &abonement).await?;
                (
                    WizardState::Open {
                        abonement_id: abonement.id,
                        token: abonement.token.clone(),
                    },
                    vec![card],
                )
            }
            ActionKind::Exit => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => {
                    (WizardState::Idle, vec![replies::cancelled()])
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::Visit => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => (
                    WizardState::VisitConfirm {
                        abonement_id: abonement.id,
                        token: abonement.token.clone(),
                    },
                    vec![replies::visit_ask(&abonement.name)],
                ),
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::History => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => {
                    let limit = self.limits.page_limit;
                    let page = self.render_history(&abonement, 0, limit).await?;
                    (
                        WizardState::History {
                            abonement_id: abonement.id,
                            token: abonement.token.clone(),
                            offset: 0,
                            limit,
                        },
                        vec![page],
                    )
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::Prev | ActionKind::Next => match state {
                WizardState::History {
                    abonement_id,
                    token,
                    offset,
                    limit,
                } if abonement_id == abonement.id => {
                    let total = self.engine.visit_count(abonement.id).await?;
                    // Both directions are bounded no-ops, never errors.
                    let offset = match action.kind {
                        ActionKind::Prev => offset.saturating_sub(limit),
                        _ => {
                            if offset + limit < total {
                                offset + limit
                            } else {
                                offset
                            }
                        }
                    };
                    let page = self.render_history(&abonement, offset, limit).await?;
                    (
                        WizardState::History {
                            abonement_id,
                            token,
                            offset,
                            limit,
                        },
                        vec![page],
                    )
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::Share => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => {
                    let link = self
                        .channel
                        .deep_link(&format!("pass_{}", abonement.token));
                    (state, vec![replies::share(&abonement, &link)])
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::Notify => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => {
                    let on = self.engine.toggle_notify(actor.id, abonement.id).await?;
                    (state, vec![replies::notify_state(on)])
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::Edit => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => {
                    if abonement.owner_id != actor.id {
                        (state, vec![replies::not_permitted()])
                    } else {
                        let draft = Draft::for_edit(
                            abonement.id,
                            abonement.token.clone(),
                            abonement.name.clone(),
                            abonement.total_visits,
                            abonement.expiry_date,
                            abonement.description.clone(),
                        );
                        let ask = replies::ask_name(draft.name.as_deref());
                        (WizardState::Name { draft }, vec![ask])
                    }
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::Delete => match state {
                WizardState::Open { abonement_id, .. } if abonement_id == abonement.id => {
                    let unlink = abonement.owner_id != actor.id;
                    (
                        WizardState::DeleteConfirm {
                            abonement_id: abonement.id,
                            token: abonement.token.clone(),
                            unlink,
                        },
                        vec![replies::delete_ask(!unlink, &abonement.name)],
                    )
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::SelectVisit(visit_id) => match state {
                WizardState::History { abonement_id, .. } if abonement_id == abonement.id => {
                    match self.engine.get_visit(visit_id).await? {
                        Some(visit) if visit.abonement_id == abonement.id => {
                            let visitor = users::get(&self.db, visit.user_id).await?;
                            let name = visitor
                                .map(|u| u.display())
                                .unwrap_or_else(|| visit.user_id.to_string());
                            (
                                WizardState::SelectVisit {
                                    abonement_id: abonement.id,
                                    token: abonement.token.clone(),
                                    visit_id,
                                },
                                vec![replies::visit_selected(&visit, &name, &abonement.token)],
                            )
                        }
                        _ => (state, vec![replies::visit_missing()]),
                    }
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::EditVisit => match state {
                WizardState::SelectVisit {
                    abonement_id,
                    token,
                    visit_id,
                } if abonement_id == abonement.id => {
                    match self.engine.get_visit(visit_id).await? {
                        Some(visit) => (
                            WizardState::VisitEditConfirm {
                                abonement_id,
                                token,
                                visit_id,
                            },
                            vec![replies::ask_visit_ts(&visit.ts)],
                        ),
                        None => (
                            WizardState::Open {
                                abonement_id,
                                token,
                            },
                            vec![replies::visit_missing()],
                        ),
                    }
                }
                other => (other, vec![replies::unknown()]),
            },
            ActionKind::DeleteVisit => match state {
                WizardState::SelectVisit {
                    abonement_id,
                    token,
                    visit_id,
                } if abonement_id == abonement.id => (
                    WizardState::VisitDeleteConfirm {
                        abonement_id,
                        token,
                        visit_id,
                    },
                    vec![replies::ask_visit_delete()],
                ),
                other => (other, vec![replies::unknown()]),
            },
        };

        self.save(chat_id, &next).await?;
        Ok(replies)
    }

    // --- confirmations ---

    async fn on_visit_confirm(
        &self,
        actor: &User,
        abonement_id: i64,
        token: String,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let stay = |replies: Vec<String>| {
            (
                WizardState::VisitConfirm {
                    abonement_id,
                    token: token.clone(),
                },
                replies,
            )
        };
        let Input::Text(text) = input else {
            return Ok(stay(vec![replies::bad_yes_no()]));
        };
        match parse_yes_no(&text) {
            Some(true) => {
                let back = WizardState::Open {
                    abonement_id,
                    token: token.clone(),
                };
                if self.engine.resolve(abonement_id, &token).await?.is_none() {
                    return Ok((WizardState::Idle, vec![replies::stale_card()]));
                }
                match self
                    .engine
                    .record_visit(abonement_id, actor.id, Utc::now())
                    .await?
                {
                    Some(visit) => {
                        self.producer
                            .publish_visit_event(
                                VisitEvent::VisitNew,
                                abonement_id,
                                visit.id,
                                actor.id,
                                visit.ts.format(DATE_TIME_FMT).to_string(),
                                None,
                            )
                            .await?;
                        Ok((back, vec![replies::visit_done(&visit.ts)]))
                    }
                    None => Ok((back, vec![replies::visit_refused()])),
                }
            }
            Some(false) => Ok((
                WizardState::Open {
                    abonement_id,
                    token,
                },
                vec![replies::visit_declined()],
            )),
            None => Ok(stay(vec![replies::bad_yes_no()])),
        }
    }

    async fn on_visit_edit_confirm(
        &self,
        actor: &User,
        abonement_id: i64,
        token: String,
        visit_id: i64,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let stay = |replies: Vec<String>| {
            (
                WizardState::VisitEditConfirm {
                    abonement_id,
                    token: token.clone(),
                    visit_id,
                },
                replies,
            )
        };
        let Input::Text(text) = input else {
            return Ok(stay(vec![replies::bad_visit_ts()]));
        };
        let Some(naive) = parse_visit_ts(&text) else {
            return Ok(stay(vec![replies::bad_visit_ts()]));
        };
        let new_ts = Utc.from_utc_datetime(&naive);

        if self.engine.resolve(abonement_id, &token).await?.is_none() {
            return Ok((WizardState::Idle, vec![replies::stale_card()]));
        }
        let back = WizardState::Open {
            abonement_id,
            token: token.clone(),
        };
        let Some(old) = self.engine.get_visit(visit_id).await? else {
            return Ok((back, vec![replies::visit_missing()]));
        };
        if self.engine.edit_visit(visit_id, actor.id, new_ts).await? {
            self.producer
                .publish_visit_event(
                    VisitEvent::VisitEdit,
                    abonement_id,
                    visit_id,
                    actor.id,
                    old.ts.format(DATE_TIME_FMT).to_string(),
                    Some(new_ts.format(DATE_TIME_FMT).to_string()),
                )
                .await?;
            Ok((back, vec![replies::done()]))
        } else {
            Ok((back, vec![replies::not_permitted()]))
        }
    }

    async fn on_visit_delete_confirm(
        &self,
        actor: &User,
        abonement_id: i64,
        token: String,
        visit_id: i64,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let stay = |replies: Vec<String>| {
            (
                WizardState::VisitDeleteConfirm {
                    abonement_id,
                    token: token.clone(),
                    visit_id,
                },
                replies,
            )
        };
        let Input::Text(text) = input else {
            return Ok(stay(vec![replies::bad_yes_no()]));
        };
        let back = WizardState::Open {
            abonement_id,
            token: token.clone(),
        };
        match parse_yes_no(&text) {
            Some(true) => {
                if self.engine.resolve(abonement_id, &token).await?.is_none() {
                    return Ok((WizardState::Idle, vec![replies::stale_card()]));
                }
                let Some(old) = self.engine.get_visit(visit_id).await? else {
                    return Ok((back, vec![replies::visit_missing()]));
                };
                if self.engine.delete_visit(visit_id, actor.id).await? {
                    self.producer
                        .publish_visit_event(
                            VisitEvent::VisitDelete,
                            abonement_id,
                            visit_id,
                            actor.id,
                            old.ts.format(DATE_TIME_FMT).to_string(),
                            None,
                        )
                        .await?;
                    Ok((back, vec![replies::done()]))
                } else {
                    Ok((back, vec![replies::not_permitted()]))
                }
            }
            Some(false) => Ok((back, vec![replies::not_done()])),
            None => Ok(stay(vec![replies::bad_yes_no()])),
        }
    }

    async fn on_delete_confirm(
        &self,
        actor: &User,
        abonement_id: i64,
        token: String,
        unlink: bool,
        input: Input,
    ) -> Result<(WizardState, Vec<String>), CrimpError> {
        let stay = |replies: Vec<String>| {
            (
                WizardState::DeleteConfirm {
                    abonement_id,
                    token: token.clone(),
                    unlink,
                },
                replies,
            )
        };
        let Input::Text(text) = input else {
            return Ok(stay(vec![replies::bad_yes_no()]));
        };
        match parse_yes_no(&text) {
            Some(true) => {
                if self.engine.resolve(abonement_id, &token).await?.is_none() {
                    return Ok((WizardState::Idle, vec![replies::stale_card()]));
                }
                let outcome = self.engine.delete(abonement_id, actor.id).await?;
                let reply = match outcome {
                    DeleteOutcome::Refused => replies::not_permitted(),
                    _ => replies::delete_result(unlink, outcome.applied(), &token),
                };
                Ok((WizardState::Idle, vec![reply]))
            }
            Some(false) => Ok((WizardState::Idle, vec![replies::not_deleted()])),
            None => Ok(stay(vec![replies::bad_yes_no()])),
        }
    }

    // --- rendering helpers ---

    async fn render_card(&self, actor: &User, abonement: &Abonement) -> Result<String, CrimpError> {
        let visits_count = self.engine.visit_count(abonement.id).await?;
        let my_visits_count = self
            .engine
            .visit_count_by_user(abonement.id, actor.id)
            .await?;
        let visits_left = self.engine.visits_left(abonement).await?;
        let notify = self.engine.notify_enabled(actor.id, abonement.id).await?;
        Ok(replies::info_card(
            abonement,
            visits_count,
            my_visits_count,
            visits_left,
            notify,
            Utc::now().date_naive(),
        ))
    }

    async fn render_history(
        &self,
        abonement: &Abonement,
        offset: i64,
        limit: i64,
    ) -> Result<String, CrimpError> {
        let total = self.engine.visit_count(abonement.id).await?;
        let page = self.engine.list_visits(abonement.id, limit, offset).await?;
        let mut lines = vec![replies::page_header(offset, total, page.len())];
        for (visit, user_name) in &page {
            lines.push(replies::visit_line(visit, user_name, &abonement.token));
        }
        if offset > 0 {
            lines.push(format!(
                "Back: {}",
                Action::new(ActionKind::Prev, abonement.id, abonement.token.clone()).encode()
            ));
        }
        if offset + limit < total {
            lines.push(format!(
                "More: {}",
                Action::new(ActionKind::Next, abonement.id, abonement.token.clone()).encode()
            ));
        }
        Ok(lines.join("\n"))
    }
}

/// Extract the abonement token from a `pass_<uuid>` deep-link payload.
pub fn parse_pass_payload(payload: &str) -> Option<String> {
    let token = payload.strip_prefix("pass_")?.to_lowercase();
    uuid::Uuid::parse_str(&token).ok()?;
    Some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crimp_bus::SqliteBus;
    use crimp_core::types::TASKS_QUEUE;
    use crimp_core::QueueClient;
    use crimp_jobs::{decode, Job};
    use std::path::Path;
    use tempfile::tempdir;

    struct FakeChat;

    #[async_trait]
    impl ChatChannel for FakeChat {
        async fn send_text(&self, _chat_id: i64, _text: &str) -> Result<(), CrimpError> {
            Ok(())
        }
        async fn send_document(
            &self,
            _chat_id: i64,
            _caption: &str,
            _path: &Path,
        ) -> Result<(), CrimpError> {
            Ok(())
        }
        fn deep_link(&self, payload: &str) -> String {
            format!("https://t.me/test_bot?start={payload}")
        }
    }

    struct Fixture {
        wizard: Wizard,
        engine: AbonementEngine,
        bus: SqliteBus,
        db: Database,
        _dir: tempfile::TempDir,
        owner: User,
        member: User,
    }

    async fn setup() -> Fixture {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("wizard.db").to_str().unwrap())
            .await
            .unwrap();
        let bus = SqliteBus::new(db.clone(), 3);
        let engine = AbonementEngine::new(db.clone());
        let producer = JobProducer::new(db.clone(), Arc::new(bus.clone()));
        let wizard = Wizard::new(
            db.clone(),
            engine.clone(),
            producer,
            Arc::new(FakeChat),
            WizardLimits {
                max_visits: 100,
                page_limit: 3,
            },
        );
        let owner = users::ensure_user(&db, 1, Some("Owner".into()), None, None)
            .await
            .unwrap();
        let member = users::ensure_user(&db, 2, Some("Member".into()), None, None)
            .await
            .unwrap();
        Fixture {
            wizard,
            engine,
            bus,
            db,
            _dir: dir,
            owner,
            member,
        }
    }

    async fn say(f: &Fixture, chat_id: i64, actor: &User, text: &str) -> Vec<String> {
        f.wizard.handle_text(chat_id, actor, text).await.unwrap()
    }

    async fn drain_jobs(bus: &SqliteBus) -> Vec<Job> {
        let mut jobs = Vec::new();
        while let Some(delivery) = bus.next(TASKS_QUEUE).await.unwrap() {
            jobs.push(decode::<Job>(&delivery.payload).unwrap());
            bus.ack(&delivery).await.unwrap();
        }
        jobs
    }

    #[tokio::test]
    async fn create_chain_walks_all_steps_and_publishes_one_job() {
        let f = setup().await;
        let chat = 11;

        say(&f, chat, &f.owner, "/new").await;
        assert_eq!(
            f.wizard.state(chat).await.unwrap().step_name(),
            "name"
        );

        say(&f, chat, &f.owner, "Gym Pass").await;
        say(&f, chat, &f.owner, "10").await;
        say(&f, chat, &f.owner, "31.12.2026").await;
        let replies = say(&f, chat, &f.owner, "Ten visits, main hall").await;

        assert!(replies[0].contains("Pass created."));
        assert!(replies[0].contains("https://t.me/test_bot?start=pass_"));
        assert_eq!(f.wizard.state(chat).await.unwrap(), WizardState::Idle);

        let created = &f.engine.list_mine(f.owner.id).await.unwrap()[0];
        assert_eq!(created.total_visits, 10);
        assert_eq!(
            created.expiry_date,
            chrono::NaiveDate::from_ymd_opt(2026, 12, 31)
        );

        let jobs = drain_jobs(&f.bus).await;
        assert_eq!(jobs.len(), 1);
        assert!(matches!(jobs[0], Job::AbonementUpdate { abonement_id, .. } if abonement_id == created.id));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn create_rejects_skip_and_reprompts_bad_input() {
        let f = setup().await;
        let chat = 12;

        say(&f, chat, &f.owner, "/new").await;
        let replies = say(&f, chat, &f.owner, "/skip").await;
        assert!(replies[0].contains("nothing to keep"));
        assert_eq!(f.wizard.state(chat).await.unwrap().step_name(), "name");

        say(&f, chat, &f.owner, "Pass").await;
        // Out of range and non-numeric both re-prompt without advancing.
        let replies = say(&f, chat, &f.owner, "101").await;
        assert!(replies[0].contains("does not fit"));
        let replies = say(&f, chat, &f.owner, "lots").await;
        assert!(replies[0].contains("does not fit"));
        assert_eq!(
            f.wizard.state(chat).await.unwrap().step_name(),
            "total_visits"
        );

        say(&f, chat, &f.owner, "10").await;
        let replies = say(&f, chat, &f.owner, "tomorrow").await;
        assert!(replies[0].contains("Could not read that date"));
        assert_eq!(
            f.wizard.state(chat).await.unwrap().step_name(),
            "expiry_date"
        );
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn cancel_works_at_every_step() {
        let f = setup().await;
        let chat = 13;

        for step in ["/new", "/join"] {
            say(&f, chat, &f.owner, step).await;
            let replies = say(&f, chat, &f.owner, "/cancel").await;
            assert!(replies[0].contains("Cancelled"));
            assert_eq!(f.wizard.state(chat).await.unwrap(), WizardState::Idle);
        }
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn join_chain_validates_then_confirms() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Shared".into(), 0, None, None)
            .await
            .unwrap();
        let chat = 14;

        say(&f, chat, &f.member, "/join").await;
        let replies = say(&f, chat, &f.member, "not-a-key").await;
        assert!(replies[0].contains("does not look like a pass key"));

        let replies = say(&f, chat, &f.member, &abonement.token).await;
        assert!(replies[0].contains("Join the pass Shared?"));

        let replies = say(&f, chat, &f.member, "maybe").await;
        assert!(replies[0].contains("yes or no"));

        let replies = say(&f, chat, &f.member, "yes").await;
        assert!(replies[0].contains("You joined the pass Shared"));
        assert_eq!(f.wizard.state(chat).await.unwrap(), WizardState::Idle);

        // Second join reports AlreadyMember through the same chain.
        say(&f, chat, &f.member, "/join").await;
        let replies = say(&f, chat, &f.member, &abonement.token).await;
        assert!(replies[0].contains("already joined"));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn deep_link_joins_directly() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Linked".into(), 0, None, None)
            .await
            .unwrap();

        let replies = f
            .wizard
            .handle_deep_link(15, &f.member, &format!("pass_{}", abonement.token))
            .await
            .unwrap();
        assert!(replies[0].contains("You joined the pass Linked"));

        let replies = f
            .wizard
            .handle_deep_link(15, &f.owner, &format!("pass_{}", abonement.token))
            .await
            .unwrap();
        assert!(replies[0].contains("cannot join your own"));

        let replies = f
            .wizard
            .handle_deep_link(15, &f.member, "garbage")
            .await
            .unwrap();
        assert!(replies[0].contains("Could not read the link"));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn visit_flow_confirms_and_publishes() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Pass".into(), 2, None, None)
            .await
            .unwrap();
        let chat = 16;

        let open = Action::new(ActionKind::Open, abonement.id, abonement.token.clone());
        let replies = say(&f, chat, &f.owner, &open.encode()).await;
        assert!(replies[0].contains("Selected pass"));
        assert_eq!(f.wizard.state(chat).await.unwrap().step_name(), "open");

        let visit = Action::new(ActionKind::Visit, abonement.id, abonement.token.clone());
        let replies = say(&f, chat, &f.owner, &visit.encode()).await;
        assert!(replies[0].contains("Record a visit"));

        let replies = say(&f, chat, &f.owner, "yes").await;
        assert!(replies[0].contains("Visit recorded"));
        assert_eq!(f.wizard.state(chat).await.unwrap().step_name(), "open");

        let jobs = drain_jobs(&f.bus).await;
        assert_eq!(jobs.len(), 2); // abonement_update from create + visit event
        assert!(matches!(&jobs[1], Job::AbonementVisit(change)
            if change.msg_type == crimp_jobs::VisitEvent::VisitNew
            && change.abonement_id == abonement.id));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn visit_refused_when_capacity_exhausted() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Tiny".into(), 1, None, None)
            .await
            .unwrap();
        f.engine
            .record_visit(abonement.id, f.owner.id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        let chat = 17;

        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Open, abonement.id, abonement.token.clone()).encode(),
        )
        .await;
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Visit, abonement.id, abonement.token.clone()).encode(),
        )
        .await;
        let replies = say(&f, chat, &f.owner, "yes").await;
        assert!(replies[0].contains("out of visits or was deleted"));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn stale_token_blocks_actions() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Pass".into(), 0, None, None)
            .await
            .unwrap();
        let chat = 18;

        let stale = Action::new(ActionKind::Open, abonement.id, "wrong-token");
        let replies = say(&f, chat, &f.owner, &stale.encode()).await;
        assert!(replies[0].contains("no longer available"));
        assert_eq!(f.wizard.state(chat).await.unwrap(), WizardState::Idle);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn history_pagination_round_trips() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Busy".into(), 0, None, None)
            .await
            .unwrap();
        let base = Utc::now();
        for i in 0..7 {
            f.engine
                .record_visit(
                    abonement.id,
                    f.owner.id,
                    base + chrono::Duration::minutes(i),
                )
                .await
                .unwrap()
                .unwrap();
        }
        let chat = 19;
        let token = abonement.token.clone();

        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Open, abonement.id, token.clone()).encode(),
        )
        .await;
        let first = say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::History, abonement.id, token.clone()).encode(),
        )
        .await;
        assert!(first[0].contains("Visits 1 to 3 of 7"));

        let next = Action::new(ActionKind::Next, abonement.id, token.clone()).encode();
        let prev = Action::new(ActionKind::Prev, abonement.id, token.clone()).encode();

        let second = say(&f, chat, &f.owner, &next).await;
        assert!(second[0].contains("Visits 4 to 6 of 7"));

        // next then prev returns to the original page.
        let back = say(&f, chat, &f.owner, &prev).await;
        assert_eq!(back[0], first[0]);

        // prev at the first page is a no-op.
        let still_first = say(&f, chat, &f.owner, &prev).await;
        assert_eq!(still_first[0], first[0]);

        // Walk to the last page; next there is a no-op.
        say(&f, chat, &f.owner, &next).await;
        let last = say(&f, chat, &f.owner, &next).await;
        assert!(last[0].contains("Visits 7 to 7 of 7"));
        let still_last = say(&f, chat, &f.owner, &next).await;
        assert_eq!(still_last[0], last[0]);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn edit_chain_prepopulates_and_accepts_skip() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(
                f.owner.id,
                "Original".into(),
                5,
                None,
                Some("old desc".into()),
            )
            .await
            .unwrap();
        let chat = 20;
        let token = abonement.token.clone();

        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Open, abonement.id, token.clone()).encode(),
        )
        .await;
        let ask = say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Edit, abonement.id, token.clone()).encode(),
        )
        .await;
        assert!(ask[0].contains("Current: Original"));

        say(&f, chat, &f.owner, "Renamed").await; // new name
        say(&f, chat, &f.owner, "/skip").await; // keep 5 visits
        say(&f, chat, &f.owner, "/skip").await; // keep no expiry
        let replies = say(&f, chat, &f.owner, "/skip").await; // keep description, commit
        assert!(replies[0].contains("Pass updated."));
        assert!(replies[0].contains("Renamed"));

        let reloaded = f.engine.resolve(abonement.id, &token).await.unwrap().unwrap();
        assert_eq!(reloaded.name, "Renamed");
        assert_eq!(reloaded.total_visits, 5);
        assert_eq!(reloaded.description.as_deref(), Some("old desc"));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn edit_is_owner_only() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Mine".into(), 0, None, None)
            .await
            .unwrap();
        f.engine
            .join_by_token(&abonement.token, f.member.id)
            .await
            .unwrap()
            .unwrap();
        let chat = 21;

        say(
            &f,
            chat,
            &f.member,
            &Action::new(ActionKind::Open, abonement.id, abonement.token.clone()).encode(),
        )
        .await;
        let replies = say(
            &f,
            chat,
            &f.member,
            &Action::new(ActionKind::Edit, abonement.id, abonement.token.clone()).encode(),
        )
        .await;
        assert!(replies[0].contains("not permitted"));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn delete_confirm_owner_hides_member_unlinks() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Shared".into(), 0, None, None)
            .await
            .unwrap();
        f.engine
            .join_by_token(&abonement.token, f.member.id)
            .await
            .unwrap()
            .unwrap();
        let token = abonement.token.clone();

        // Member unlinks.
        let chat_m = 22;
        say(
            &f,
            chat_m,
            &f.member,
            &Action::new(ActionKind::Open, abonement.id, token.clone()).encode(),
        )
        .await;
        let ask = say(
            &f,
            chat_m,
            &f.member,
            &Action::new(ActionKind::Delete, abonement.id, token.clone()).encode(),
        )
        .await;
        assert!(ask[0].contains("Unlinking"));
        let replies = say(&f, chat_m, &f.member, "yes").await;
        assert!(replies[0].contains("Pass unlinked."));
        assert!(f.engine.list_joined(f.member.id).await.unwrap().is_empty());

        // Owner deletes.
        let chat_o = 23;
        say(
            &f,
            chat_o,
            &f.owner,
            &Action::new(ActionKind::Open, abonement.id, token.clone()).encode(),
        )
        .await;
        let ask = say(
            &f,
            chat_o,
            &f.owner,
            &Action::new(ActionKind::Delete, abonement.id, token.clone()).encode(),
        )
        .await;
        assert!(ask[0].contains("Deleting"));
        let replies = say(&f, chat_o, &f.owner, "yes").await;
        assert!(replies[0].contains("Pass deleted."));
        assert!(f
            .engine
            .resolve(abonement.id, &token)
            .await
            .unwrap()
            .unwrap()
            .hidden);
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn visit_edit_and_delete_publish_events() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Pass".into(), 0, None, None)
            .await
            .unwrap();
        let visit = f
            .engine
            .record_visit(abonement.id, f.owner.id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        let chat = 24;
        let token = abonement.token.clone();
        drain_jobs(&f.bus).await; // drop the create-time update job

        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Open, abonement.id, token.clone()).encode(),
        )
        .await;
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::History, abonement.id, token.clone()).encode(),
        )
        .await;
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::SelectVisit(visit.id), abonement.id, token.clone()).encode(),
        )
        .await;
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::EditVisit, abonement.id, token.clone()).encode(),
        )
        .await;

        // Bad date re-prompts.
        let replies = say(&f, chat, &f.owner, "later").await;
        assert!(replies[0].contains("Could not read that date"));

        let replies = say(&f, chat, &f.owner, "01.08.2026 18:30").await;
        assert_eq!(replies[0], "Done.");

        let jobs = drain_jobs(&f.bus).await;
        assert_eq!(jobs.len(), 1);
        match &jobs[0] {
            Job::AbonementVisit(change) => {
                assert_eq!(change.msg_type, crimp_jobs::VisitEvent::VisitEdit);
                assert_eq!(change.ts_new.as_deref(), Some("01.08.2026 18:30"));
            }
            other => panic!("unexpected job: {other:?}"),
        }

        // Now delete the visit through the wizard.
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::History, abonement.id, token.clone()).encode(),
        )
        .await;
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::SelectVisit(visit.id), abonement.id, token.clone()).encode(),
        )
        .await;
        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::DeleteVisit, abonement.id, token.clone()).encode(),
        )
        .await;
        let replies = say(&f, chat, &f.owner, "yes").await;
        assert_eq!(replies[0], "Done.");
        assert!(f.engine.get_visit(visit.id).await.unwrap().is_none());

        let jobs = drain_jobs(&f.bus).await;
        assert!(matches!(&jobs[0], Job::AbonementVisit(change)
            if change.msg_type == crimp_jobs::VisitEvent::VisitDelete));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn generate_commands_are_admin_only() {
        let f = setup().await;
        let chat = 25;

        let replies = say(&f, chat, &f.owner, "/generate all").await;
        assert!(replies[0].contains("not permitted"));

        let mut roles = f.owner.roles.clone();
        roles.insert(crimp_core::Role::Admin);
        users::set_roles(&f.db, f.owner.id, roles.clone()).await.unwrap();
        let admin = users::get(&f.db, f.owner.id).await.unwrap().unwrap();

        let replies = say(&f, chat, &admin, "/generate schedule").await;
        assert!(replies[0].contains("Generation queued"));

        let jobs = drain_jobs(&f.bus).await;
        assert!(matches!(&jobs[0], Job::TableGenerator { job, .. } if job == "schedule"));
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn registration_chain_stores_contact_and_flips_role() {
        let f = setup().await;
        let chat = 27;

        say(&f, chat, &f.member, "/register").await;
        let replies = say(&f, chat, &f.member, "call me maybe").await;
        assert!(replies[0].contains("does not look like a phone number"));

        say(&f, chat, &f.member, "+79990001122").await;
        // No display name yet, so skip is rejected.
        let replies = say(&f, chat, &f.member, "/skip").await;
        assert!(replies[0].contains("nothing to keep"));

        let replies = say(&f, chat, &f.member, "Masha K.").await;
        assert!(replies[0].contains("Registration complete, Masha K."));

        let reloaded = users::get(&f.db, f.member.id).await.unwrap().unwrap();
        assert!(reloaded.roles.contains(crimp_core::Role::Registered));
        assert_eq!(reloaded.phone.as_deref(), Some("+79990001122"));
        assert_eq!(reloaded.display(), "Masha K.");
        f.db.close().await.unwrap();
    }

    #[tokio::test]
    async fn notify_toggle_through_action() {
        let f = setup().await;
        let abonement = f
            .engine
            .create(f.owner.id, "Pass".into(), 0, None, None)
            .await
            .unwrap();
        let chat = 26;
        let token = abonement.token.clone();

        say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Open, abonement.id, token.clone()).encode(),
        )
        .await;
        let replies = say(
            &f,
            chat,
            &f.owner,
            &Action::new(ActionKind::Notify, abonement.id, token.clone()).encode(),
        )
        .await;
        assert!(replies[0].contains("now on"));
        assert!(f.engine.notify_enabled(f.owner.id, abonement.id).await.unwrap());
        f.db.close().await.unwrap();
    }
}
