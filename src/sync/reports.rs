//! Report service with an explicit remote-then-local fallback chain.
//!
//! Unlike [`SyncService`](super::SyncService) the local store is not a cache here:
//! when the remote fails, the local list is the only place the operation lands.
//! Reports created that way are queued under `unsyncedReports` and replayed by
//! [`ReportService::sync_local_reports`].

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use super::Synced;
use crate::models::{timestamp, NewReport, Report, ReportStatus};
use crate::remote::RemoteStore;
use crate::store::{
    keys, read_json, read_list, read_typed, write_json, LocalStore, StoreError, Stored,
};

pub struct ReportService {
    remote: Option<Arc<dyn RemoteStore<Report>>>,
    local: Arc<dyn LocalStore>,
    lock: Mutex<()>,
}

impl ReportService {
    /// `remote = None` means reports live only in the local store.
    pub fn new(remote: Option<Arc<dyn RemoteStore<Report>>>, local: Arc<dyn LocalStore>) -> Self {
        Self {
            remote,
            local,
            lock: Mutex::new(()),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// File a new pending report.
    pub async fn report_group(&self, request: NewReport) -> Result<Synced<Report>, StoreError> {
        let report = request.into_report(timestamp::now());

        if let Some(remote) = &self.remote {
            match remote.insert(&report).await {
                Ok(stored) => return Ok(Synced::remote(stored)),
                Err(e) => {
                    tracing::warn!("Filing report remotely failed, keeping it local: {}", e);
                    self.insert_local(report.clone(), true).await?;
                    return Ok(Synced::cached(report));
                }
            }
        }

        self.insert_local(report.clone(), false).await?;
        Ok(Synced::cached(report))
    }

    pub async fn get_reports(&self) -> Result<Synced<Vec<Report>>, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.list().await {
                Ok(reports) => return Ok(Synced::remote(reports)),
                Err(e) => tracing::warn!("Loading reports remotely failed: {}", e),
            }
        }
        Ok(Synced::cached(self.local_reports().await?))
    }

    /// Set a report's status. Any status may follow any other; `reviewedAt` is always
    /// stamped, `notes`/`reviewedBy` only overwrite when given.
    pub async fn update_report_status(
        &self,
        id: &str,
        status: ReportStatus,
        notes: Option<String>,
        reviewed_by: Option<String>,
    ) -> Result<bool, StoreError> {
        let now = timestamp::now();

        if let Some(remote) = &self.remote {
            let mut patch = json!({
                "status": status,
                "reviewedAt": timestamp::format(&now),
            });
            if let Value::Object(fields) = &mut patch {
                if let Some(notes) = &notes {
                    fields.insert("notes".to_string(), json!(notes));
                }
                if let Some(reviewer) = &reviewed_by {
                    fields.insert("reviewedBy".to_string(), json!(reviewer));
                }
            }

            match remote.update(id, &patch).await {
                Ok(()) => return Ok(true),
                Err(e) => tracing::warn!("Updating report {} remotely failed: {}", id, e),
            }
        }

        let _guard = self.lock.lock().await;
        let mut reports = self.local_entries().await?;
        let Some(report) = reports
            .iter_mut()
            .filter_map(Stored::typed_mut)
            .find(|r| r.id == id)
        else {
            return Ok(false);
        };
        report.status = status;
        report.reviewed_at = Some(now);
        if notes.is_some() {
            report.notes = notes;
        }
        if reviewed_by.is_some() {
            report.reviewed_by = reviewed_by;
        }
        write_json(self.local.as_ref(), keys::GROUP_REPORTS, &reports).await?;
        Ok(true)
    }

    pub async fn delete_report(&self, id: &str) -> Result<bool, StoreError> {
        if let Some(remote) = &self.remote {
            match remote.delete(id).await {
                Ok(()) => return Ok(true),
                Err(e) => tracing::warn!("Deleting report {} remotely failed: {}", id, e),
            }
        }

        let _guard = self.lock.lock().await;
        let mut reports = self.local_entries().await?;
        let before = reports.len();
        reports.retain(|r| r.id() != Some(id));
        if reports.len() == before {
            return Ok(false);
        }
        write_json(self.local.as_ref(), keys::GROUP_REPORTS, &reports).await?;

        let mut unsynced: Vec<String> =
            read_json(self.local.as_ref(), keys::UNSYNCED_REPORTS).await?;
        if unsynced.iter().any(|u| u == id) {
            unsynced.retain(|u| u != id);
            write_json(self.local.as_ref(), keys::UNSYNCED_REPORTS, &unsynced).await?;
        }
        Ok(true)
    }

    /// Push reports that were filed locally during a remote outage.
    ///
    /// Stops at the first remote failure; returns how many were flushed. Local
    /// status changes and deletes made during the outage are not replayed.
    pub async fn sync_local_reports(&self) -> Result<usize, StoreError> {
        let Some(remote) = &self.remote else {
            return Ok(0);
        };

        let _guard = self.lock.lock().await;
        let pending: Vec<String> = read_json(self.local.as_ref(), keys::UNSYNCED_REPORTS).await?;
        if pending.is_empty() {
            return Ok(0);
        }

        let reports = self.local_reports().await?;
        let mut remaining = Vec::new();
        let mut flushed = 0;
        let mut remote_down = false;

        for id in pending {
            if remote_down {
                remaining.push(id);
                continue;
            }
            // Deleted locally since; nothing to replay.
            let Some(report) = reports.iter().find(|r| r.id == id) else {
                continue;
            };
            match remote.insert(report).await {
                Ok(_) => flushed += 1,
                Err(e) => {
                    tracing::warn!("Report sync stopped at {}: {}", id, e);
                    remote_down = true;
                    remaining.push(id);
                }
            }
        }

        write_json(self.local.as_ref(), keys::UNSYNCED_REPORTS, &remaining).await?;
        if flushed > 0 {
            tracing::info!("Synced {} locally filed reports", flushed);
        }
        Ok(flushed)
    }

    /// Ids of reports that exist only locally.
    pub async fn unsynced_ids(&self) -> Result<Vec<String>, StoreError> {
        read_json(self.local.as_ref(), keys::UNSYNCED_REPORTS).await
    }

    async fn local_reports(&self) -> Result<Vec<Report>, StoreError> {
        read_typed(self.local.as_ref(), keys::GROUP_REPORTS).await
    }

    async fn local_entries(&self) -> Result<Vec<Stored<Report>>, StoreError> {
        read_list(self.local.as_ref(), keys::GROUP_REPORTS).await
    }

    async fn insert_local(&self, report: Report, unsynced: bool) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut reports = self.local_entries().await?;
        let id = report.id.clone();
        reports.push(Stored::Typed(report));
        write_json(self.local.as_ref(), keys::GROUP_REPORTS, &reports).await?;

        if unsynced {
            let mut pending: Vec<String> =
                read_json(self.local.as_ref(), keys::UNSYNCED_REPORTS).await?;
            pending.push(id);
            write_json(self.local.as_ref(), keys::UNSYNCED_REPORTS, &pending).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use crate::store::MemoryStore;
    use crate::sync::Source;

    fn new_report(group_id: &str) -> NewReport {
        NewReport {
            group_id: group_id.to_string(),
            user_id: "u1".to_string(),
            reason: "spam".to_string(),
            group_name: "Spam Group".to_string(),
        }
    }

    fn local_only() -> (ReportService, Arc<MemoryStore>) {
        let local = Arc::new(MemoryStore::new());
        (ReportService::new(None, local.clone()), local)
    }

    fn with_remote() -> (ReportService, Arc<MemoryRemote<Report>>, Arc<MemoryStore>) {
        let local = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemote::<Report>::new());
        let shared: Arc<dyn RemoteStore<Report>> = remote.clone();
        let service = ReportService::new(Some(shared), local.clone());
        (service, remote, local)
    }

    #[tokio::test]
    async fn test_unconfigured_remote_uses_local() {
        let (service, local) = local_only();

        let filed = service.report_group(new_report("g1")).await.unwrap();
        assert_eq!(filed.source, Source::Cached);
        assert!(filed.data.id.starts_with("report-"));
        assert_eq!(filed.data.status, ReportStatus::Pending);

        let listed = service.get_reports().await.unwrap();
        assert_eq!(listed.data, vec![filed.data.clone()]);
        assert_eq!(listed.data[0].group_id, "g1");
        assert_eq!(listed.data[0].reason, "spam");

        // No remote to reconcile with.
        assert_eq!(local.get(keys::UNSYNCED_REPORTS).await.unwrap(), None);
        assert_eq!(service.sync_local_reports().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remote_success_does_not_touch_local() {
        let (service, remote, local) = with_remote();

        let filed = service.report_group(new_report("g1")).await.unwrap();
        assert_eq!(filed.source, Source::Remote);
        assert_eq!(remote.records().len(), 1);
        assert_eq!(local.len().await.unwrap(), 0);

        let listed = service.get_reports().await.unwrap();
        assert!(listed.is_fresh());
        assert_eq!(listed.data.len(), 1);
    }

    #[tokio::test]
    async fn test_split_brain_then_sync() {
        let (service, remote, _local) = with_remote();
        remote.set_available(false);

        let filed = service.report_group(new_report("g1")).await.unwrap();
        assert_eq!(filed.source, Source::Cached);
        assert_eq!(service.unsynced_ids().await.unwrap(), vec![filed.data.id.clone()]);

        // Still down: nothing flushed, queue kept.
        assert_eq!(service.sync_local_reports().await.unwrap(), 0);
        assert_eq!(service.unsynced_ids().await.unwrap().len(), 1);

        remote.set_available(true);
        // Remote readers cannot see it yet.
        assert!(service.get_reports().await.unwrap().data.is_empty());

        assert_eq!(service.sync_local_reports().await.unwrap(), 1);
        assert!(service.unsynced_ids().await.unwrap().is_empty());
        assert_eq!(remote.records(), vec![filed.data]);
    }

    #[tokio::test]
    async fn test_update_status_local_stamps_review() {
        let (service, _local) = local_only();
        let filed = service.report_group(new_report("g1")).await.unwrap().data;

        let updated = service
            .update_report_status(
                &filed.id,
                ReportStatus::Resolved,
                Some("removed".to_string()),
                Some("mod1".to_string()),
            )
            .await
            .unwrap();
        assert!(updated);

        // Skipping straight from resolved back to pending is allowed; prior notes stay.
        service
            .update_report_status(&filed.id, ReportStatus::Pending, None, None)
            .await
            .unwrap();

        let report = service.get_reports().await.unwrap().data.remove(0);
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.notes.as_deref(), Some("removed"));
        assert_eq!(report.reviewed_by.as_deref(), Some("mod1"));
        assert!(report.reviewed_at.is_some());

        assert!(!service
            .update_report_status("missing", ReportStatus::Dismissed, None, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_status_remote_patch() {
        let (service, remote, _local) = with_remote();
        let filed = service.report_group(new_report("g1")).await.unwrap().data;

        service
            .update_report_status(&filed.id, ReportStatus::Reviewed, None, Some("mod2".into()))
            .await
            .unwrap();

        let stored = remote.records().remove(0);
        assert_eq!(stored.status, ReportStatus::Reviewed);
        assert_eq!(stored.reviewed_by.as_deref(), Some("mod2"));
        assert!(stored.reviewed_at.is_some());
        assert_eq!(stored.notes, None);
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_local() {
        let (service, remote, _local) = with_remote();
        remote.set_available(false);
        let filed = service.report_group(new_report("g1")).await.unwrap().data;

        assert!(service.delete_report(&filed.id).await.unwrap());
        assert!(service.get_reports().await.unwrap().data.is_empty());
        assert!(service.unsynced_ids().await.unwrap().is_empty());
        assert!(!service.delete_report(&filed.id).await.unwrap());
    }
}
