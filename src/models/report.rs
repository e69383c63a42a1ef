//! Group abuse reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{timestamp, Entity};

/// Moderation status of a report. Any status may follow any other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

/// A report filed against a group. `group_id` may point at a group that no longer exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub id: String,
    pub group_id: String,
    pub user_id: String,
    pub reason: String,
    #[serde(default)]
    pub group_name: String,
    #[serde(with = "timestamp")]
    pub reported_at: DateTime<Utc>,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "timestamp::option"
    )]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Entity for Report {
    const KIND: &'static str = "report";
    const TABLE: &'static str = "reports";
    const MIRROR_KEY: &'static str = "groupReports";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }
}

/// Request body for filing a report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReport {
    pub group_id: String,
    pub user_id: String,
    pub reason: String,
    #[serde(default)]
    pub group_name: String,
}

impl NewReport {
    /// Build a pending report stamped with `now`.
    pub fn into_report(self, now: DateTime<Utc>) -> Report {
        let mut report = Report {
            id: String::new(),
            group_id: self.group_id,
            user_id: self.user_id,
            reason: self.reason,
            group_name: self.group_name,
            reported_at: now,
            status: ReportStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            notes: None,
        };
        report.ensure_id();
        report
    }
}

/// Request body for a moderation action.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateReportStatusRequest {
    pub status: ReportStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
}
