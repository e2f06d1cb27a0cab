use crate::Result;
use crate::types::{CountResponse, MessagesResponse, Snapshot};

use super::{LATEST_MESSAGES_PATH, MessagesClient, UNREAD_COUNT_PATH};

impl MessagesClient {
    pub async fn unread_count(&self) -> Result<CountResponse> {
        self.get_json(UNREAD_COUNT_PATH).await
    }

    pub async fn latest_messages(&self) -> Result<MessagesResponse> {
        self.get_json(LATEST_MESSAGES_PATH).await
    }

    /// Fetch both endpoints concurrently. The snapshot fails as a unit as soon
    /// as either request fails.
    pub async fn snapshot(&self) -> Result<Snapshot> {
        let (unread, latest) = tokio::try_join!(self.unread_count(), self.latest_messages())?;
        Ok(Snapshot { unread, latest })
    }
}
