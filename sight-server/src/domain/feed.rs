//! Feed metadata.

/// Publisher information for a loaded feed.
///
/// Feeds without a `feed_info.txt` get a record with only the id and the
/// configured display name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Feed {
    pub feed_id: String,
    pub display_name: String,
    pub publisher_name: String,
    pub publisher_url: String,
    pub lang: String,
    pub version: String,
}

impl Feed {
    pub fn new(feed_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            feed_id: feed_id.into(),
            display_name: display_name.into(),
            ..Self::default()
        }
    }
}
