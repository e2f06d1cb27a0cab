pub(crate) mod body;
pub(crate) mod client;
pub(crate) mod ops;

pub use client::MessagesClient;

pub const UNREAD_COUNT_PATH: &str = "/messages/api/unread-count";
pub const LATEST_MESSAGES_PATH: &str = "/messages/api/latest-messages";
pub const MESSAGES_PAGE_PATH: &str = "/messages/";
