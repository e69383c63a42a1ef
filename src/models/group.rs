//! Group model and per-user group drafts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{timestamp, Entity};

/// A directory group.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_count"
    )]
    pub members: Option<u64>,
    /// `None` marks a legacy record written before moderation existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Fields this service does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Member counts arrive as numbers or numeric strings.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Option::<Count>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Count::Number(n)) => Ok(Some(n)),
        Some(Count::Text(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

impl Group {
    /// Whether the group belongs in the public listing.
    pub fn is_public(&self) -> bool {
        self.approved != Some(false)
    }
}

impl Entity for Group {
    const KIND: &'static str = "group";
    const TABLE: &'static str = "groups";
    const MIRROR_KEY: &'static str = "groups";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Moderation state of a user-submitted group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DraftStatus {
    Pending,
    Approved,
    Rejected,
}

/// A group as submitted by a user, kept under `userGroups_<userId>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupDraft {
    #[serde(flatten)]
    pub group: Group,
    pub status: DraftStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_group_tri_state_approved() {
        let legacy: Group = serde_json::from_value(json!({"id": "g1", "name": "A"})).unwrap();
        assert_eq!(legacy.approved, None);
        assert!(legacy.is_public());

        let pending: Group =
            serde_json::from_value(json!({"id": "g2", "name": "B", "approved": false})).unwrap();
        assert!(!pending.is_public());
    }

    #[test]
    fn test_group_accepts_loose_shapes() {
        let group: Group = serde_json::from_value(json!({
            "id": "g1",
            "members": "100",
            "createdAt": 1714564800000i64
        }))
        .unwrap();
        assert_eq!(group.members, Some(100));
        assert_eq!(
            group.created_at.map(|ts| timestamp::format(&ts)).as_deref(),
            Some("2024-05-01T12:00:00.000Z")
        );
    }

    #[test]
    fn test_group_preserves_unknown_fields() {
        let raw = json!({"id": "g1", "name": "A", "members": 100, "whatsappOnly": true});
        let group: Group = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(group.members, Some(100));
        assert_eq!(serde_json::to_value(&group).unwrap(), raw);
    }

    #[test]
    fn test_draft_status_is_top_level() {
        let draft = GroupDraft {
            group: Group {
                id: "g1".to_string(),
                name: "A".to_string(),
                ..Default::default()
            },
            status: DraftStatus::Pending,
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["status"], "pending");
        assert_eq!(value["id"], "g1");

        let back: GroupDraft = serde_json::from_value(value).unwrap();
        assert_eq!(back, draft);
        assert!(back.group.extra.is_empty());
    }
}
