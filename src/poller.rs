//! Unread-count polling and the decision of what to render for each cycle.
//!
//! A cycle fetches a [`Snapshot`], runs [`decide`] against the previous
//! observation and hands the resulting [`Intent`] back to the caller. Cycles
//! may overlap (scheduled tick plus a manual trigger); each one draws a ticket
//! before fetching and a result is only applied if no newer ticket has been
//! applied in the meantime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::Result;
use crate::api::MessagesClient;
use crate::types::{Message, Snapshot};

/// Observation carried from one cycle to the next.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PollerState {
    pub last_count: u64,
    pub last_message_id: i64,
    pub initialized: bool,
    applied_generation: u64,
}

/// What a cycle asks the surfaces to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Intent {
    /// New messages arrived since the last observation: toast, badge and sound.
    Notify {
        new_messages: u64,
        unread: u64,
        latest: Option<Message>,
    },
    /// First load with unread messages already waiting: badge only.
    BadgeOnly { unread: u64 },
    Nothing,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    Applied(Intent),
    /// A newer cycle was applied while this one was in flight.
    Superseded,
}

/// Payload handed to the toast and sound paths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Alert {
    pub new_messages: u64,
    pub latest: Option<Message>,
}

impl PollerState {
    pub const fn new() -> Self {
        Self {
            last_count: 0,
            last_message_id: 0,
            initialized: false,
            applied_generation: 0,
        }
    }

    fn apply(&mut self, snapshot: &Snapshot) {
        self.last_count = snapshot.unread.count;
        if let Some(max_id) = snapshot.latest.max_id() {
            self.last_message_id = max_id;
        }
        self.initialized = true;
    }
}

/// Compare a fresh snapshot with the previous observation.
///
/// Growth only produces a toast once a non-zero count has been observed, so
/// the very first cycle never reports pre-existing unread messages as new;
/// those only update the badge while the poller is not yet initialized.
pub fn decide(state: &PollerState, snapshot: &Snapshot) -> Intent {
    let count = snapshot.unread.count;
    if count > state.last_count && state.last_count > 0 {
        Intent::Notify {
            new_messages: count - state.last_count,
            unread: count,
            latest: snapshot.latest.latest().cloned(),
        }
    } else if count > 0 && !state.initialized {
        Intent::BadgeOnly { unread: count }
    } else {
        Intent::Nothing
    }
}

impl Intent {
    pub const fn badge_count(&self) -> Option<u64> {
        match self {
            Self::Notify { unread, .. } | Self::BadgeOnly { unread } => Some(*unread),
            Self::Nothing => None,
        }
    }

    pub fn alert(&self) -> Option<Alert> {
        match self {
            Self::Notify {
                new_messages,
                latest,
                ..
            } => Some(Alert {
                new_messages: *new_messages,
                latest: latest.clone(),
            }),
            _ => None,
        }
    }
}

impl Alert {
    /// A single fabricated message, used to check the toast and sound paths
    /// without a server.
    pub fn synthetic() -> Self {
        Self {
            new_messages: 1,
            latest: Some(Message {
                id: 999,
                sender: "Test user".to_string(),
                content: "This is a test notification for a new message!".to_string(),
                sent_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            }),
        }
    }
}

#[derive(Clone)]
pub struct Poller {
    client: MessagesClient,
    state: Arc<Mutex<PollerState>>,
    tickets: Arc<AtomicU64>,
}

impl Poller {
    pub fn new(client: MessagesClient) -> Self {
        Self {
            client,
            state: Arc::new(Mutex::new(PollerState::new())),
            tickets: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn state(&self) -> PollerState {
        self.state.lock().await.clone()
    }

    /// Run one cycle. On error nothing is mutated.
    pub async fn check(&self) -> Result<Outcome> {
        let ticket = self.next_ticket();
        let snapshot = self.client.snapshot().await?;
        Ok(self.commit(ticket, &snapshot).await)
    }

    /// Out-of-schedule check for diagnostics.
    pub async fn force_check(&self) -> Result<Outcome> {
        info!("forced check of new messages");
        self.check().await
    }

    fn next_ticket(&self) -> u64 {
        self.tickets.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn commit(&self, ticket: u64, snapshot: &Snapshot) -> Outcome {
        let mut state = self.state.lock().await;
        if ticket <= state.applied_generation {
            debug!(
                ticket,
                applied = state.applied_generation,
                "discarding superseded poll result"
            );
            return Outcome::Superseded;
        }

        let intent = decide(&state, snapshot);
        debug!(
            count = snapshot.unread.count,
            last_count = state.last_count,
            initialized = state.initialized,
            messages = snapshot.latest.messages.len(),
            ?intent,
            "poll cycle evaluated"
        );
        state.apply(snapshot);
        state.applied_generation = ticket;
        Outcome::Applied(intent)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::{Intent, Outcome, Poller, PollerState, decide};
    use crate::api::MessagesClient;
    use crate::types::{CountResponse, Message, MessagesResponse, Snapshot};

    fn message(id: i64, sender: &str) -> Message {
        Message {
            id,
            sender: sender.to_string(),
            content: format!("hello from {sender}"),
            sent_at: "2024-05-01 10:00".to_string(),
        }
    }

    fn snapshot(count: u64, ids: &[i64]) -> Snapshot {
        Snapshot {
            unread: CountResponse { count },
            latest: MessagesResponse {
                messages: ids.iter().map(|id| message(*id, "alice")).collect(),
            },
        }
    }

    fn state(last_count: u64, initialized: bool) -> PollerState {
        PollerState {
            last_count,
            initialized,
            ..PollerState::new()
        }
    }

    fn poller(server: &MockServer) -> Poller {
        let client = MessagesClient::new(
            Url::parse(&server.uri()).unwrap(),
            None,
            Duration::from_secs(2),
            Duration::from_secs(1),
            true,
        )
        .unwrap();
        Poller::new(client)
    }

    #[test]
    fn first_load_with_unread_only_updates_badge() {
        let intent = decide(&state(0, false), &snapshot(3, &[5]));
        assert_eq!(intent, Intent::BadgeOnly { unread: 3 });
        assert!(intent.alert().is_none());
        assert_eq!(intent.badge_count(), Some(3));
    }

    #[test]
    fn growth_notifies_with_delta() {
        let intent = decide(&state(2, true), &snapshot(5, &[9, 8]));
        assert_eq!(
            intent,
            Intent::Notify {
                new_messages: 3,
                unread: 5,
                latest: Some(message(9, "alice")),
            }
        );
        let alert = intent.alert().unwrap();
        assert_eq!(alert.new_messages, 3);
        assert_eq!(intent.badge_count(), Some(5));
    }

    #[test]
    fn flat_or_falling_count_leaves_badge_alone() {
        assert_eq!(decide(&state(4, true), &snapshot(4, &[1])), Intent::Nothing);
        assert_eq!(decide(&state(4, true), &snapshot(1, &[1])), Intent::Nothing);
    }

    #[test]
    fn flat_count_before_first_cycle_still_sets_badge() {
        assert_eq!(
            decide(&state(4, false), &snapshot(4, &[1])),
            Intent::BadgeOnly { unread: 4 }
        );
    }

    #[test]
    fn growth_from_zero_after_initialization_is_silent() {
        assert_eq!(decide(&state(0, true), &snapshot(2, &[3])), Intent::Nothing);
    }

    #[test]
    fn notify_without_messages_has_no_preview() {
        let intent = decide(&state(1, true), &snapshot(2, &[]));
        assert_eq!(
            intent,
            Intent::Notify {
                new_messages: 1,
                unread: 2,
                latest: None,
            }
        );
    }

    #[test]
    fn apply_records_count_and_max_id() {
        let mut st = PollerState::new();
        st.apply(&snapshot(2, &[4, 11, 7]));
        assert_eq!(st.last_count, 2);
        assert_eq!(st.last_message_id, 11);
        assert!(st.initialized);

        st.apply(&snapshot(0, &[]));
        assert_eq!(st.last_count, 0);
        assert_eq!(st.last_message_id, 11);
    }

    #[tokio::test]
    async fn zero_count_cycles_then_growth() {
        let server = MockServer::start().await;
        let poller = poller(&server);
        for _ in 0..3 {
            let ticket = poller.next_ticket();
            let outcome = poller.commit(ticket, &snapshot(0, &[])).await;
            assert_eq!(outcome, Outcome::Applied(Intent::Nothing));
        }
        let ticket = poller.next_ticket();
        let outcome = poller.commit(ticket, &snapshot(2, &[1])).await;
        assert_eq!(outcome, Outcome::Applied(Intent::Nothing));

        let ticket = poller.next_ticket();
        let outcome = poller.commit(ticket, &snapshot(3, &[2, 1])).await;
        assert!(matches!(
            outcome,
            Outcome::Applied(Intent::Notify { new_messages: 1, unread: 3, .. })
        ));
    }

    #[tokio::test]
    async fn slower_older_cycle_is_discarded() {
        let server = MockServer::start().await;
        let poller = poller(&server);

        let older = poller.next_ticket();
        let newer = poller.next_ticket();
        assert_eq!(
            poller.commit(newer, &snapshot(6, &[20])).await,
            Outcome::Applied(Intent::BadgeOnly { unread: 6 })
        );
        assert_eq!(
            poller.commit(older, &snapshot(4, &[18])).await,
            Outcome::Superseded
        );

        let st = poller.state().await;
        assert_eq!(st.last_count, 6);
        assert_eq!(st.last_message_id, 20);
    }

    #[tokio::test]
    async fn check_runs_both_endpoints() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/api/unread-count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 2})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages/api/latest-messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [
                    {"id": 31, "sender": "bob", "content": "ping", "sent_at": "now"},
                    {"id": 30, "sender": "bob", "content": "pong", "sent_at": "earlier"}
                ]
            })))
            .mount(&server)
            .await;

        let poller = poller(&server);
        let outcome = poller.check().await.unwrap();
        assert_eq!(outcome, Outcome::Applied(Intent::BadgeOnly { unread: 2 }));
        let st = poller.state().await;
        assert_eq!(st.last_count, 2);
        assert_eq!(st.last_message_id, 31);
        assert!(st.initialized);
    }

    #[tokio::test]
    async fn failed_fetch_leaves_state_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages/api/unread-count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"count": 9})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/messages/api/latest-messages"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let poller = poller(&server);
        let ticket = poller.next_ticket();
        poller.commit(ticket, &snapshot(4, &[12])).await;
        let before = poller.state().await;

        assert!(poller.check().await.is_err());
        assert_eq!(poller.state().await, before);
    }
}
