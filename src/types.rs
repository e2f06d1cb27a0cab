use serde::{Deserialize, Serialize};

/// Message tel que renvoyé par `/messages/api/latest-messages`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Message {
    pub id: i64,
    pub sender: String,
    pub content: String,
    pub sent_at: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Liste ordonnée du plus récent au plus ancien.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

impl MessagesResponse {
    pub fn latest(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn max_id(&self) -> Option<i64> {
        self.messages.iter().map(|m| m.id).max()
    }
}

/// Both endpoint responses from a single polling cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Snapshot {
    pub unread: CountResponse,
    pub latest: MessagesResponse,
}

#[cfg(test)]
mod tests {
    use super::{CountResponse, MessagesResponse};

    #[test]
    fn messages_response_tracks_latest_and_max_id() {
        let parsed: MessagesResponse = serde_json::from_str(
            r#"{"messages":[
                {"id":7,"sender":"bob","content":"hi","sent_at":"2024-05-01 10:00"},
                {"id":12,"sender":"eve","content":"old","sent_at":"2024-04-30 09:00"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.latest().map(|m| m.sender.as_str()), Some("bob"));
        assert_eq!(parsed.max_id(), Some(12));
    }

    #[test]
    fn empty_list_has_no_max_id() {
        let parsed: MessagesResponse = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
        assert!(parsed.latest().is_none());
        assert_eq!(parsed.max_id(), None);
    }

    #[test]
    fn missing_messages_key_is_rejected() {
        assert!(serde_json::from_str::<MessagesResponse>(r#"{"items":[]}"#).is_err());
    }

    #[test]
    fn negative_count_is_rejected() {
        assert!(serde_json::from_str::<CountResponse>(r#"{"count":-1}"#).is_err());
    }
}
