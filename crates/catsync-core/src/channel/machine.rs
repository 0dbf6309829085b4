//! Push channel state machine.
//!
//! `transition` is a pure reducer over (state, event) returning the next state
//! and the effects the owner must carry out. It never touches a socket or a
//! timer itself, so every path can be exercised without a network.
//!
//! ```text
//! Disconnected --Connect--> Connecting --Opened--> Connected
//!      ^                         |                     |
//!      |                     Errored            Closed / Errored
//!      +---- ReconnectDue <------+---------------------+
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{
    active_top_level, nodes_from_values, CategoryNode, Inbound, ServerMessage, UpdateAction,
};

use super::ReconnectPolicy;

/// Close code for an intentional shutdown; the only one that doesn't reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub status: ConnectionStatus,
    /// Automatic reconnects scheduled since the last successful open.
    pub reconnect_attempt: u32,
    pub reconnect_pending: bool,
}

impl ChannelState {
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    fn is_active(&self) -> bool {
        matches!(
            self.status,
            ConnectionStatus::Connecting | ConnectionStatus::Connected
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Initial start or a manual reconnect.
    Connect,
    /// The reconnect timer fired.
    ReconnectDue,
    Opened,
    Message(Inbound),
    Closed { code: Option<u16> },
    Errored(String),
    KeepaliveDue,
    Dispose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenSocket,
    /// Release the socket, sending a close frame if it is still open.
    CloseSocket,
    StartKeepalive,
    StopKeepalive,
    SendPing,
    ScheduleReconnect(Duration),
    CancelReconnect,
    Fetch,
    RemoveCategory(i64),
    ReplaceCategories(Vec<CategoryNode>),
}

pub fn transition(
    state: &ChannelState,
    event: ChannelEvent,
    policy: &ReconnectPolicy,
) -> (ChannelState, Vec<Effect>) {
    let mut next = *state;
    let mut effects = Vec::new();
    let manual = matches!(event, ChannelEvent::Connect);

    match event {
        ChannelEvent::Connect | ChannelEvent::ReconnectDue => {
            if state.is_active() {
                debug!(status = ?state.status, "Push channel already open, ignoring connect");
                return (next, effects);
            }
            // A fired timer is already spent; only a manual connect preempts one.
            if state.reconnect_pending && manual {
                effects.push(Effect::CancelReconnect);
            }
            next.status = ConnectionStatus::Connecting;
            next.reconnect_pending = false;
            effects.push(Effect::OpenSocket);
        }

        ChannelEvent::Opened => {
            if state.status != ConnectionStatus::Connecting {
                warn!(status = ?state.status, "Unexpected open, releasing socket");
                effects.push(Effect::CloseSocket);
                return (next, effects);
            }
            info!("Push channel connected");
            next.status = ConnectionStatus::Connected;
            next.reconnect_attempt = 0;
            effects.push(Effect::StartKeepalive);
            effects.push(Effect::Fetch);
        }

        ChannelEvent::Message(inbound) => {
            if !state.is_connected() {
                debug!("Dropping message received while not connected");
                return (next, effects);
            }
            if let Some(effect) = message_effect(inbound) {
                effects.push(effect);
            }
        }

        ChannelEvent::Closed { code } => {
            if !state.is_active() {
                return (next, effects);
            }
            info!(code = ?code, "Push channel closed");
            if state.is_connected() {
                effects.push(Effect::StopKeepalive);
            }
            effects.push(Effect::CloseSocket);
            next.status = ConnectionStatus::Disconnected;
            if code != Some(NORMAL_CLOSURE) {
                schedule_reconnect(&mut next, &mut effects, policy);
            }
        }

        ChannelEvent::Errored(reason) => {
            if !state.is_active() {
                return (next, effects);
            }
            warn!(error = %reason, "Push channel error");
            if state.is_connected() {
                effects.push(Effect::StopKeepalive);
            }
            effects.push(Effect::CloseSocket);
            next.status = ConnectionStatus::Disconnected;
            schedule_reconnect(&mut next, &mut effects, policy);
        }

        ChannelEvent::KeepaliveDue => {
            if state.is_connected() {
                effects.push(Effect::SendPing);
            }
        }

        ChannelEvent::Dispose => {
            next.status = ConnectionStatus::Disconnected;
            next.reconnect_pending = false;
            effects.push(Effect::CancelReconnect);
            effects.push(Effect::StopKeepalive);
            effects.push(Effect::CloseSocket);
        }
    }

    (next, effects)
}

fn schedule_reconnect(next: &mut ChannelState, effects: &mut Vec<Effect>, policy: &ReconnectPolicy) {
    match policy.next_delay(next.reconnect_attempt) {
        Some(delay) => {
            next.reconnect_attempt += 1;
            next.reconnect_pending = true;
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = next.reconnect_attempt,
                max_attempts = policy.max_attempts,
                "Scheduling push channel reconnect"
            );
            effects.push(Effect::ScheduleReconnect(delay));
        }
        None => {
            warn!(
                attempts = next.reconnect_attempt,
                "Push channel reconnect attempts exhausted, waiting for manual reconnect"
            );
        }
    }
}

fn message_effect(inbound: Inbound) -> Option<Effect> {
    let message = match inbound {
        Inbound::Message(message) => message,
        Inbound::Unparseable(reason) => {
            warn!(error = %reason, "Dropping unparseable push message");
            return None;
        }
    };

    match message {
        ServerMessage::CategoryUpdate { payload } => {
            debug!(action = ?payload.action, id = payload.id, name = ?payload.name, "Category update");
            if payload.action == UpdateAction::Delete {
                Some(Effect::RemoveCategory(payload.id))
            } else {
                Some(Effect::Fetch)
            }
        }
        ServerMessage::ConnectionEstablished { message } => {
            debug!(message = ?message, "Server confirmed push channel");
            Some(Effect::Fetch)
        }
        ServerMessage::CategoriesList { categories, .. } => match categories {
            Some(rows) if !rows.is_empty() => {
                Some(Effect::ReplaceCategories(active_top_level(nodes_from_values(rows))))
            }
            _ => {
                debug!("Ignoring empty category snapshot");
                None
            }
        },
        ServerMessage::Pong => None,
        ServerMessage::Unknown => {
            debug!("Ignoring push message of unknown type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectPolicy {
        ReconnectPolicy::default()
    }

    fn step(state: &mut ChannelState, event: ChannelEvent) -> Vec<Effect> {
        let (next, effects) = transition(state, event, &policy());
        *state = next;
        effects
    }

    fn connected() -> ChannelState {
        let mut state = ChannelState::default();
        step(&mut state, ChannelEvent::Connect);
        step(&mut state, ChannelEvent::Opened);
        state
    }

    fn message(text: &str) -> ChannelEvent {
        ChannelEvent::Message(Inbound::parse(text))
    }

    #[test]
    fn test_connect_and_open() {
        let mut state = ChannelState::default();
        assert_eq!(step(&mut state, ChannelEvent::Connect), vec![Effect::OpenSocket]);
        assert_eq!(state.status, ConnectionStatus::Connecting);

        assert_eq!(
            step(&mut state, ChannelEvent::Opened),
            vec![Effect::StartKeepalive, Effect::Fetch]
        );
        assert!(state.is_connected());
    }

    #[test]
    fn test_duplicate_connect_is_noop() {
        let mut state = ChannelState::default();
        step(&mut state, ChannelEvent::Connect);
        assert!(step(&mut state, ChannelEvent::Connect).is_empty());

        let mut state = connected();
        assert!(step(&mut state, ChannelEvent::Connect).is_empty());
        assert!(step(&mut state, ChannelEvent::ReconnectDue).is_empty());
        assert!(state.is_connected());
    }

    #[test]
    fn test_backoff_sequence_stops_after_five_attempts() {
        let mut state = ChannelState::default();
        step(&mut state, ChannelEvent::Connect);

        let mut delays = Vec::new();
        for _ in 0..6 {
            let effects = step(&mut state, ChannelEvent::Errored("refused".to_string()));
            for effect in effects {
                if let Effect::ScheduleReconnect(delay) = effect {
                    delays.push(delay.as_secs_f64() * 1000.0);
                }
            }
            if !state.reconnect_pending {
                break;
            }
            assert_eq!(step(&mut state, ChannelEvent::ReconnectDue), vec![Effect::OpenSocket]);
        }

        assert_eq!(delays, vec![3000.0, 4500.0, 6750.0, 10125.0, 15187.5]);
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert_eq!(state.reconnect_attempt, 5);
        assert!(!state.reconnect_pending);

        // Manual reconnect still works, but a failure doesn't schedule a 6th attempt.
        assert_eq!(step(&mut state, ChannelEvent::Connect), vec![Effect::OpenSocket]);
        let effects = step(&mut state, ChannelEvent::Closed { code: Some(1006) });
        assert!(!effects.iter().any(|e| matches!(e, Effect::ScheduleReconnect(_))));
    }

    #[test]
    fn test_open_resets_attempts() {
        let mut state = connected();
        step(&mut state, ChannelEvent::Closed { code: None });
        step(&mut state, ChannelEvent::ReconnectDue);
        step(&mut state, ChannelEvent::Errored("reset".to_string()));
        assert_eq!(state.reconnect_attempt, 2);

        step(&mut state, ChannelEvent::ReconnectDue);
        step(&mut state, ChannelEvent::Opened);
        assert_eq!(state.reconnect_attempt, 0);
    }

    #[test]
    fn test_normal_close_does_not_reconnect() {
        let mut state = connected();
        let effects = step(&mut state, ChannelEvent::Closed { code: Some(NORMAL_CLOSURE) });
        assert_eq!(effects, vec![Effect::StopKeepalive, Effect::CloseSocket]);
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(!state.reconnect_pending);
    }

    #[test]
    fn test_abnormal_close_reconnects() {
        let mut state = connected();
        let effects = step(&mut state, ChannelEvent::Closed { code: Some(1011) });
        assert_eq!(
            effects,
            vec![
                Effect::StopKeepalive,
                Effect::CloseSocket,
                Effect::ScheduleReconnect(Duration::from_secs(3))
            ]
        );
    }

    #[test]
    fn test_manual_connect_cancels_pending_timer() {
        let mut state = connected();
        step(&mut state, ChannelEvent::Errored("broken pipe".to_string()));
        assert_eq!(
            step(&mut state, ChannelEvent::Connect),
            vec![Effect::CancelReconnect, Effect::OpenSocket]
        );
    }

    #[test]
    fn test_delete_removes_locally() {
        let mut state = connected();
        let effects = step(
            &mut state,
            message(r#"{"type":"category_update","payload":{"action":"delete","id":2}}"#),
        );
        assert_eq!(effects, vec![Effect::RemoveCategory(2)]);
    }

    #[test]
    fn test_create_and_update_refetch() {
        let mut state = connected();
        for action in ["create", "update", "archive"] {
            let text = format!(
                r#"{{"type":"category_update","payload":{{"action":"{}","id":9}}}}"#,
                action
            );
            assert_eq!(step(&mut state, message(&text)), vec![Effect::Fetch]);
        }
        assert_eq!(
            step(&mut state, message(r#"{"type":"connection_established","message":"hi"}"#)),
            vec![Effect::Fetch]
        );
    }

    #[test]
    fn test_categories_list_replaces() {
        let mut state = connected();
        let effects = step(
            &mut state,
            message(
                r#"{"type":"categories_list","categories":[
                    {"id":5,"name":"E","is_active":true,"parent":null,"order":2},
                    {"id":6,"name":"F","is_active":false,"parent":null,"order":0},
                    {"id":7,"name":"G","is_active":true,"parent":5,"order":0},
                    {"id":8,"name":"H","is_active":true,"parent":null,"order":1}
                ]}"#,
            ),
        );
        match effects.as_slice() {
            [Effect::ReplaceCategories(nodes)] => {
                let ids: Vec<i64> = nodes.iter().map(|c| c.id).collect();
                assert_eq!(ids, vec![8, 5]);
            }
            other => panic!("unexpected effects: {:?}", other),
        }

        assert!(step(&mut state, message(r#"{"type":"categories_list","categories":[]}"#)).is_empty());
    }

    #[test]
    fn test_noise_leaves_state_alone() {
        let mut state = connected();
        let before = state;
        assert!(step(&mut state, message(r#"{"type":"pong"}"#)).is_empty());
        assert!(step(&mut state, message("{{{")).is_empty());
        assert!(step(&mut state, message(r#"{"type":"flash_sale"}"#)).is_empty());
        assert_eq!(state, before);
    }

    #[test]
    fn test_keepalive_only_when_connected() {
        let mut state = connected();
        assert_eq!(step(&mut state, ChannelEvent::KeepaliveDue), vec![Effect::SendPing]);

        let mut idle = ChannelState::default();
        assert!(step(&mut idle, ChannelEvent::KeepaliveDue).is_empty());
    }

    #[test]
    fn test_dispose_releases_everything() {
        let mut state = connected();
        step(&mut state, ChannelEvent::Errored("timeout".to_string()));
        let effects = step(&mut state, ChannelEvent::Dispose);
        assert_eq!(
            effects,
            vec![Effect::CancelReconnect, Effect::StopKeepalive, Effect::CloseSocket]
        );
        assert_eq!(state.status, ConnectionStatus::Disconnected);
        assert!(!state.reconnect_pending);
    }
}
