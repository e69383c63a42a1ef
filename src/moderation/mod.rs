//! Group moderation workflow.
//!
//! Group create/approve/reject/delete calls go through [`SyncService`], and the
//! derived state lives next to it: the `publicGroups` mirror, the per-user
//! drafts and the counters. They are only touched after the remote call
//! succeeded, and they can be rebuilt with [`GroupModeration::reconcile_counters`]
//! and [`GroupModeration::refresh_public_groups`] when they drift.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::counters::{Counter, CounterLedger, CounterSnapshot};
use crate::models::{timestamp, DraftStatus, Group, GroupDraft, Report, ReportStatus};
use crate::store::{
    keys, keys_with_prefix, read_list, read_typed, write_json, LocalStore, StoreError, Stored,
};
use crate::sync::{ReportService, Synced, SyncService};

/// Outcome of a moderation action on an existing group.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Applied(Group),
    NotFound,
    RemoteFailed,
}

/// A report whose group still exists.
#[derive(Debug, Clone, Serialize)]
pub struct FlaggedGroup {
    pub report: Report,
    pub group: Group,
}

pub struct GroupModeration {
    groups: Arc<SyncService<Group>>,
    counters: Arc<CounterLedger>,
    local: Arc<dyn LocalStore>,
    drafts_lock: Mutex<()>,
}

impl GroupModeration {
    pub fn new(groups: Arc<SyncService<Group>>, counters: Arc<CounterLedger>) -> Self {
        let local = groups.local().clone();
        Self {
            groups,
            counters,
            local,
            drafts_lock: Mutex::new(()),
        }
    }

    /// List groups; a fresh list also rebuilds `publicGroups`.
    pub async fn list_groups(&self) -> Result<Synced<Vec<Group>>, StoreError> {
        let listed = self.groups.list().await?;
        if listed.is_fresh() {
            self.refresh_public_groups().await?;
        }
        Ok(listed)
    }

    pub async fn public_groups(&self) -> Result<Vec<Group>, StoreError> {
        read_typed(self.local.as_ref(), keys::PUBLIC_GROUPS).await
    }

    /// Rewrite `publicGroups` from the group mirror.
    pub async fn refresh_public_groups(&self) -> Result<usize, StoreError> {
        let public: Vec<Group> = self
            .groups
            .cached()
            .await?
            .into_iter()
            .filter(Group::is_public)
            .collect();
        write_json(self.local.as_ref(), keys::PUBLIC_GROUPS, &public).await?;
        Ok(public.len())
    }

    /// Add a group directly (admin path). Counts it by its `approved` flag.
    pub async fn add_group(&self, group: Group) -> Result<Option<Group>, StoreError> {
        let Some(created) = self.groups.create(group).await? else {
            return Ok(None);
        };

        match created.approved {
            Some(true) => {
                self.counters.increment(Counter::Approved).await?;
            }
            Some(false) => {
                self.counters.increment(Counter::Pending).await?;
            }
            None => {}
        }
        self.refresh_public_groups().await?;
        Ok(Some(created))
    }

    /// Submit a group for review on behalf of `user_id`.
    pub async fn submit_group(
        &self,
        user_id: &str,
        mut group: Group,
    ) -> Result<Option<Group>, StoreError> {
        group.approved = Some(false);
        group.user_id = Some(user_id.to_string());
        group.created_at.get_or_insert_with(timestamp::now);

        let Some(created) = self.groups.create(group).await? else {
            return Ok(None);
        };

        {
            let _guard = self.drafts_lock.lock().await;
            let key = keys::user_groups(user_id);
            let mut drafts: Vec<Stored<GroupDraft>> = read_list(self.local.as_ref(), &key).await?;
            drafts.insert(
                0,
                Stored::Typed(GroupDraft {
                    group: created.clone(),
                    status: DraftStatus::Pending,
                }),
            );
            write_json(self.local.as_ref(), &key, &drafts).await?;
        }

        self.counters.increment(Counter::Pending).await?;
        self.refresh_public_groups().await?;
        tracing::info!("Group {} submitted by {}", created.id, user_id);
        Ok(Some(created))
    }

    pub async fn drafts(&self, user_id: &str) -> Result<Vec<GroupDraft>, StoreError> {
        read_typed(self.local.as_ref(), &keys::user_groups(user_id)).await
    }

    /// Update a group and keep `publicGroups` in step.
    pub async fn update_group(&self, group: Group) -> Result<bool, StoreError> {
        let updated = self.groups.update(group).await?;
        if updated {
            self.refresh_public_groups().await?;
        }
        Ok(updated)
    }

    pub async fn approve_group(&self, id: &str) -> Result<Decision, StoreError> {
        let Some(mut group) = self.find(id).await? else {
            return Ok(Decision::NotFound);
        };
        let previous = group.approved;
        group.approved = Some(true);

        if !self.groups.update(group.clone()).await? {
            return Ok(Decision::RemoteFailed);
        }

        if previous == Some(false) {
            self.counters.decrement(Counter::Pending).await?;
        }
        if previous != Some(true) {
            self.counters.increment(Counter::Approved).await?;
        }
        self.set_draft_status(id, DraftStatus::Approved).await?;
        self.refresh_public_groups().await?;
        tracing::info!("Group {} approved", id);
        Ok(Decision::Applied(group))
    }

    /// Reject a group: it is deleted remotely and counted as rejected.
    pub async fn reject_group(&self, id: &str) -> Result<Decision, StoreError> {
        let Some(group) = self.find(id).await? else {
            return Ok(Decision::NotFound);
        };

        if !self.groups.delete(id).await? {
            return Ok(Decision::RemoteFailed);
        }

        self.uncount(&group).await?;
        self.counters.increment(Counter::Rejected).await?;
        self.set_draft_status(id, DraftStatus::Rejected).await?;
        self.refresh_public_groups().await?;
        tracing::info!("Group {} rejected", id);
        Ok(Decision::Applied(group))
    }

    pub async fn remove_group(&self, id: &str) -> Result<Decision, StoreError> {
        let Some(group) = self.find(id).await? else {
            return Ok(Decision::NotFound);
        };

        if !self.groups.delete(id).await? {
            return Ok(Decision::RemoteFailed);
        }

        self.uncount(&group).await?;
        self.refresh_public_groups().await?;
        Ok(Decision::Applied(group))
    }

    /// Recompute the counters from the group mirror and the drafts.
    ///
    /// Approved and pending come from the mirror's `approved` flag; rejected groups
    /// are deleted remotely, so they are only known through their drafts.
    pub async fn reconcile_counters(&self) -> Result<CounterSnapshot, StoreError> {
        let groups = self.groups.cached().await?;
        let approved = groups.iter().filter(|g| g.approved == Some(true)).count() as u64;
        let pending = groups.iter().filter(|g| g.approved == Some(false)).count() as u64;

        let mut rejected = 0;
        for key in keys_with_prefix(self.local.as_ref(), keys::USER_GROUPS_PREFIX).await? {
            let drafts: Vec<GroupDraft> = read_typed(self.local.as_ref(), &key).await?;
            rejected += drafts
                .iter()
                .filter(|d| d.status == DraftStatus::Rejected)
                .count() as u64;
        }

        let before = self.counters.snapshot().await?;
        self.counters.set(Counter::Approved, approved).await?;
        self.counters.set(Counter::Pending, pending).await?;
        self.counters.set(Counter::Rejected, rejected).await?;
        let after = self.counters.snapshot().await?;

        if before != after {
            tracing::warn!("Counters drifted: {:?} -> {:?}", before, after);
        }
        Ok(after)
    }

    /// Unresolved reports joined with their group; reports for deleted groups are skipped.
    pub async fn open_reports(&self, reports: &ReportService) -> Result<Vec<FlaggedGroup>, StoreError> {
        let groups = self.groups.cached().await?;
        let flagged = reports
            .get_reports()
            .await?
            .data
            .into_iter()
            .filter(|r| matches!(r.status, ReportStatus::Pending | ReportStatus::Reviewed))
            .filter_map(|report| {
                let group = groups.iter().find(|g| g.id == report.group_id)?.clone();
                Some(FlaggedGroup { report, group })
            })
            .collect();
        Ok(flagged)
    }

    async fn find(&self, id: &str) -> Result<Option<Group>, StoreError> {
        Ok(self.groups.cached().await?.into_iter().find(|g| g.id == id))
    }

    /// Take a group that is going away out of the approved/pending counts.
    async fn uncount(&self, group: &Group) -> Result<(), StoreError> {
        match group.approved {
            Some(true) => {
                self.counters.decrement(Counter::Approved).await?;
            }
            Some(false) => {
                self.counters.decrement(Counter::Pending).await?;
            }
            None => {}
        }
        Ok(())
    }

    async fn set_draft_status(&self, group_id: &str, status: DraftStatus) -> Result<(), StoreError> {
        let _guard = self.drafts_lock.lock().await;
        for key in keys_with_prefix(self.local.as_ref(), keys::USER_GROUPS_PREFIX).await? {
            let mut drafts: Vec<Stored<GroupDraft>> = read_list(self.local.as_ref(), &key).await?;
            let mut touched = false;
            for draft in drafts
                .iter_mut()
                .filter_map(Stored::typed_mut)
                .filter(|d| d.group.id == group_id)
            {
                draft.status = status;
                touched = true;
            }
            if touched {
                write_json(self.local.as_ref(), &key, &drafts).await?;
            }
        }
        Ok(())
    }
}
