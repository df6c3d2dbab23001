//! Per-group consecutive-message flood control.
//!
//! Each group tracks who spoke last and how many messages in a row they
//! sent. Crossing the configured limit fires the group's punishment once and
//! resets the streak. States are computed whole and then swapped in.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::database::{FloodPenalty, FloodSettings, GatewayStore};
use crate::gateway::api::{ApiError, Restriction};
use crate::gateway::context::MessageEvent;
use crate::gateway::error::GatewayError;
use crate::gateway::Gateway;
use crate::utils::{format_duration, mention_html, parse_duration};

/// Count a fresh streak starts at.
pub const DEFAULT_COUNT: u32 = 1;

/// Flood accounting for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodState {
    pub last_user: Option<u64>,
    pub count: u32,
    /// 0 disables flood control.
    pub limit: u32,
}

impl FloodState {
    pub fn new(limit: u32) -> Self {
        Self {
            last_user: None,
            count: DEFAULT_COUNT,
            limit,
        }
    }

    /// Next state after a message from `user`, and whether to punish.
    ///
    /// `None` (an exempt speaker) always starts over.
    pub fn advance(self, user: Option<u64>) -> (Self, bool) {
        if self.limit == 0 {
            return (self, false);
        }

        if user.is_none() || user != self.last_user {
            return (
                Self {
                    last_user: user,
                    count: DEFAULT_COUNT,
                    limit: self.limit,
                },
                false,
            );
        }

        let count = self.count + 1;
        if count > self.limit {
            return (Self::new(self.limit), true);
        }

        (
            Self {
                last_user: user,
                count,
                limit: self.limit,
            },
            false,
        )
    }
}

/// What happened to a message passed through flood control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FloodVerdict {
    /// Not a group, or flood control is off.
    Skipped,
    /// Admin, privileged tier or approved user.
    Exempt,
    Counted,
    Punished(FloodPenalty),
    /// The platform refused the punishment; flood control is now off.
    Disabled,
    /// Punishment failed for a transient reason.
    Failed,
}

pub struct FloodGuard {
    store: Arc<dyn GatewayStore>,
    states: DashMap<i64, FloodState>,
    settings: DashMap<i64, FloodSettings>,
    approved: DashMap<i64, HashSet<u64>>,
    exempt_interrupts: bool,
}

impl FloodGuard {
    /// `exempt_interrupts`: whether an exempt speaker resets the streak.
    pub fn new(store: Arc<dyn GatewayStore>, exempt_interrupts: bool) -> Self {
        Self {
            store,
            states: DashMap::new(),
            settings: DashMap::new(),
            approved: DashMap::new(),
            exempt_interrupts,
        }
    }

    pub fn hydrate(&self, settings: Vec<FloodSettings>, approvals: Vec<(i64, u64)>) {
        self.states.clear();
        self.settings.clear();
        self.approved.clear();
        for row in settings {
            self.states.insert(row.chat_id, FloodState::new(row.limit));
            self.settings.insert(row.chat_id, row);
        }
        for (chat_id, user_id) in approvals {
            self.approved.entry(chat_id).or_default().insert(user_id);
        }
    }

    /// Settings of a chat (defaults when never configured).
    pub fn settings(&self, chat_id: i64) -> FloodSettings {
        self.settings
            .get(&chat_id)
            .map(|s| s.value().clone())
            .unwrap_or_else(|| FloodSettings::new(chat_id))
    }

    pub fn limit(&self, chat_id: i64) -> u32 {
        self.states.get(&chat_id).map(|s| s.limit).unwrap_or(0)
    }

    pub fn state(&self, chat_id: i64) -> FloodState {
        self.states
            .get(&chat_id)
            .map(|s| *s)
            .unwrap_or_else(|| FloodState::new(0))
    }

    /// Feed one message. Returns true when the sender must be punished.
    pub fn update(&self, chat_id: i64, user_id: Option<u64>) -> bool {
        let Some(mut state) = self.states.get_mut(&chat_id) else {
            return false;
        };
        let (next, punish) = state.advance(user_id);
        *state = next;
        punish
    }

    /// Set the limit (0 disables). The streak starts over.
    pub async fn set_limit(&self, chat_id: i64, limit: u32) -> Result<(), GatewayError> {
        let mut settings = self.settings(chat_id);
        settings.limit = limit;
        self.store.save_flood_settings(&settings).await?;

        self.states.insert(chat_id, FloodState::new(limit));
        self.settings.insert(chat_id, settings);
        info!("Flood limit of chat {} set to {}", chat_id, limit);
        Ok(())
    }

    /// Set the penalty and, for timed penalties, its duration string.
    pub async fn set_penalty(
        &self,
        chat_id: i64,
        penalty: FloodPenalty,
        duration: Option<String>,
    ) -> Result<(), GatewayError> {
        let mut settings = self.settings(chat_id);
        settings.penalty = penalty;
        settings.duration = duration;
        self.store.save_flood_settings(&settings).await?;

        self.settings.insert(chat_id, settings);
        info!("Flood penalty of chat {} set to {:?}", chat_id, penalty);
        Ok(())
    }

    pub fn is_approved(&self, chat_id: i64, user_id: u64) -> bool {
        self.approved
            .get(&chat_id)
            .is_some_and(|set| set.contains(&user_id))
    }

    /// Approved users of a chat, sorted.
    pub fn approved(&self, chat_id: i64) -> Vec<u64> {
        let mut users: Vec<u64> = self
            .approved
            .get(&chat_id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        users.sort_unstable();
        users
    }

    pub async fn approve(&self, chat_id: i64, user_id: u64) -> Result<bool, GatewayError> {
        self.store.approve(chat_id, user_id).await?;
        Ok(self.approved.entry(chat_id).or_default().insert(user_id))
    }

    pub async fn unapprove(&self, chat_id: i64, user_id: u64) -> Result<bool, GatewayError> {
        self.store.unapprove(chat_id, user_id).await?;
        let removed = self
            .approved
            .get_mut(&chat_id)
            .is_some_and(|mut set| set.remove(&user_id));
        self.approved.remove_if(&chat_id, |_, set| set.is_empty());
        Ok(removed)
    }

    pub async fn migrate(&self, old_chat_id: i64, new_chat_id: i64) -> Result<(), GatewayError> {
        self.store.migrate_flood(old_chat_id, new_chat_id).await?;
        if let Some((_, mut settings)) = self.settings.remove(&old_chat_id) {
            settings.chat_id = new_chat_id;
            self.states.insert(new_chat_id, FloodState::new(settings.limit));
            self.settings.insert(new_chat_id, settings);
        }
        self.states.remove(&old_chat_id);
        if let Some((_, users)) = self.approved.remove(&old_chat_id) {
            self.approved.entry(new_chat_id).or_default().extend(users);
        }
        Ok(())
    }

    /// Chats with flood control enabled.
    pub fn enabled_chats(&self) -> usize {
        self.states.iter().filter(|s| s.limit > 0).count()
    }

    /// Run flood control for one group message.
    pub async fn enforce(&self, gw: &Gateway, event: &MessageEvent) -> FloodVerdict {
        if !event.chat.is_group() || event.user.is_bot || self.limit(event.chat.id) == 0 {
            return FloodVerdict::Skipped;
        }

        let chat_id = event.chat.id;
        let user_id = event.user.id;

        if self.is_approved(chat_id, user_id) || gw.is_admin(&event.chat, user_id).await {
            if self.exempt_interrupts {
                self.update(chat_id, None);
            }
            debug!("User {} is exempt from flood control in chat {}", user_id, chat_id);
            return FloodVerdict::Exempt;
        }

        if !self.update(chat_id, Some(user_id)) {
            return FloodVerdict::Counted;
        }

        let settings = self.settings(chat_id);
        let restriction = restriction_for(&settings);
        info!(
            "Flood limit exceeded by {} in chat {}, applying {:?}",
            user_id, chat_id, settings.penalty
        );

        match gw.api().restrict(chat_id, user_id, restriction).await {
            Ok(()) => {
                let text = format!(
                    "Beep Boop! Boop Beep!\n{} {}!",
                    settings.penalty.verb(),
                    mention_html(user_id, &event.user.first_name)
                );
                let text = match timed_duration(&settings) {
                    Some(secs) => format!("{} For {}.", text, format_duration(secs)),
                    None => text,
                };
                if let Err(e) = gw.api().send_text(chat_id, &text, None).await {
                    warn!("Could not announce flood punishment in chat {}: {}", chat_id, e);
                }
                FloodVerdict::Punished(settings.penalty)
            }
            Err(ApiError::Rejected(reason)) => {
                warn!("Flood punishment rejected in chat {} ({}), disabling antiflood", chat_id, reason);
                if let Err(e) = self.set_limit(chat_id, 0).await {
                    warn!("Could not persist antiflood shutdown for chat {}: {}", chat_id, e);
                    self.states.insert(chat_id, FloodState::new(0));
                }
                let notice = "I can't restrict people here, give me permissions first! Until then, I'll disable anti-flood.";
                if let Err(e) = gw.api().send_text(chat_id, notice, None).await {
                    warn!("Could not send antiflood notice to chat {}: {}", chat_id, e);
                }
                FloodVerdict::Disabled
            }
            Err(e) => {
                warn!("Flood punishment failed in chat {}: {}", chat_id, e);
                FloodVerdict::Failed
            }
        }
    }
}

/// Seconds of a timed penalty, if the stored duration parses.
fn timed_duration(settings: &FloodSettings) -> Option<u64> {
    if !settings.penalty.is_timed() {
        return None;
    }
    settings
        .duration
        .as_deref()
        .and_then(parse_duration)
        .map(|d| d.as_secs())
}

/// Platform restriction for a chat's penalty.
///
/// A timed penalty with an unreadable duration falls back to its permanent form.
pub fn restriction_for(settings: &FloodSettings) -> Restriction {
    let until = timed_duration(settings).map(|secs| Utc::now() + chrono::Duration::seconds(secs as i64));
    match settings.penalty {
        FloodPenalty::Ban | FloodPenalty::TempBan => Restriction::Ban { until },
        FloodPenalty::Kick => Restriction::Kick,
        FloodPenalty::Mute | FloodPenalty::TempMute => Restriction::Mute { until },
    }
}

/// Human description of a chat's penalty ("tmute for 3 days").
pub fn describe_penalty(settings: &FloodSettings) -> String {
    match (settings.penalty, timed_duration(settings)) {
        (FloodPenalty::Ban, _) => "ban".to_string(),
        (FloodPenalty::Kick, _) => "kick".to_string(),
        (FloodPenalty::Mute, _) => "mute".to_string(),
        (FloodPenalty::TempBan, Some(secs)) => format!("tban for {}", format_duration(secs)),
        (FloodPenalty::TempMute, Some(secs)) => format!("tmute for {}", format_duration(secs)),
        (FloodPenalty::TempBan, None) => "ban".to_string(),
        (FloodPenalty::TempMute, None) => "mute".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn feed(state: FloodState, users: &[u64]) -> (FloodState, Vec<bool>) {
        users.iter().fold((state, Vec::new()), |(state, mut out), user| {
            let (next, punish) = state.advance(Some(*user));
            out.push(punish);
            (next, out)
        })
    }

    #[test]
    fn punishes_once_when_the_limit_is_exceeded() {
        let (state, verdicts) = feed(FloodState::new(5), &[9; 6]);
        assert_eq!(verdicts, vec![false, false, false, false, false, true]);
        assert_eq!(state, FloodState::new(5));

        let (next, punish) = state.advance(Some(9));
        assert!(!punish);
        assert_eq!((next.last_user, next.count), (Some(9), 1));
    }

    #[test]
    fn other_speakers_reset_the_streak() {
        for limit in 1..=6 {
            let users: Vec<u64> = (0..20).map(|i| if i % 2 == 0 { 1 } else { 2 }).collect();
            let (state, verdicts) = feed(FloodState::new(limit), &users);
            assert!(verdicts.iter().all(|p| !p), "limit {}", limit);
            assert_eq!(state.count, 1);
        }
    }

    #[test]
    fn disabled_state_never_punishes() {
        let (state, verdicts) = feed(FloodState::new(0), &[3; 50]);
        assert!(verdicts.iter().all(|p| !p));
        assert_eq!(state, FloodState::new(0));
    }

    #[test]
    fn exempt_speaker_starts_over() {
        let (state, _) = feed(FloodState::new(3), &[4, 4, 4]);
        let (state, punish) = state.advance(None);
        assert!(!punish);
        assert_eq!((state.last_user, state.count), (None, 1));
        let (_, verdicts) = feed(state, &[4, 4, 4]);
        assert_eq!(verdicts, vec![false, false, false]);
    }

    #[tokio::test]
    async fn limits_persist_and_reset_state() {
        let store = Arc::new(MemoryStore::new());
        let guard = FloodGuard::new(store.clone(), true);
        assert!(!guard.update(-1, Some(1)));

        guard.set_limit(-1, 2).await.unwrap();
        assert!(!guard.update(-1, Some(1)));
        assert!(!guard.update(-1, Some(1)));
        assert!(guard.update(-1, Some(1)));
        assert_eq!(store.flood_settings().await.unwrap()[0].limit, 2);

        guard.set_limit(-1, 0).await.unwrap();
        assert!(!guard.update(-1, Some(1)));
        assert_eq!(guard.enabled_chats(), 0);
    }

    #[test]
    fn restrictions_follow_the_penalty() {
        let mut settings = FloodSettings::new(-1);
        assert_eq!(restriction_for(&settings), Restriction::Ban { until: None });

        settings.penalty = FloodPenalty::Kick;
        assert_eq!(restriction_for(&settings), Restriction::Kick);

        settings.penalty = FloodPenalty::TempMute;
        settings.duration = Some("3d".to_string());
        assert!(matches!(restriction_for(&settings), Restriction::Mute { until: Some(_) }));
        assert_eq!(describe_penalty(&settings), "tmute for 3 days");

        settings.duration = Some("bogus".to_string());
        assert_eq!(restriction_for(&settings), Restriction::Mute { until: None });
    }
}
