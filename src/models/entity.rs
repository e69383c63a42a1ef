//! Behaviour shared by every synchronized entity type.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::Stored;

/// A record kept in the remote store and mirrored into the local cache.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind name, also used as the id prefix.
    const KIND: &'static str;
    /// Remote table name.
    const TABLE: &'static str;
    /// Local storage key holding the mirror.
    const MIRROR_KEY: &'static str;

    /// The record id, empty when not assigned yet.
    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    fn has_id(&self) -> bool {
        !self.id().is_empty()
    }

    /// Assign a generated id unless one is already present. Existing ids are never replaced.
    fn ensure_id(&mut self) {
        if !self.has_id() {
            self.set_id(generate_id(Self::KIND));
        }
    }
}

impl<T: Entity> Stored<T> {
    /// The record id; off-shape entries are matched by their raw `id` field.
    pub fn id(&self) -> Option<&str> {
        match self {
            Stored::Typed(item) => Some(item.id()),
            Stored::Raw(value) => value.get("id").and_then(Value::as_str),
        }
    }
}

/// Generate an id of the form `prefix-<unix millis>-<9 random chars>`.
pub fn generate_id(prefix: &str) -> String {
    let suffix: String = uuid::Uuid::new_v4().simple().to_string()[..9].to_string();
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}
