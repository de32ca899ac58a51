use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::workflows::applicants::admin::{AdminGateway, RoleProvider};
use crate::workflows::applicants::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission, AuditEntry,
};
use crate::workflows::applicants::repository::{
    ApplicationRepository, AuditError, AuditTrail, Notification, NotificationError,
    NotificationGateway, RepositoryError,
};
use crate::workflows::applicants::service::{ApplicationLifecycle, LifecyclePolicy};

pub(super) fn fixed_now() -> DateTime<Utc> {
    "2026-04-10T12:00:00Z".parse().expect("valid timestamp")
}

pub(super) fn submission() -> ApplicationSubmission {
    submission_for("judge@example.com")
}

pub(super) fn submission_for(email: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        email: email.to_string(),
        full_name: "Dana Reyes".to_string(),
        phone: Some("+1-515-555-0117".to_string()),
        region: Some("Midwest".to_string()),
        education: Some("JD, Drake University".to_string()),
        experience: Some("Nine seasons judging regional showcases".to_string()),
        motivation: Some("Keep the judging bench independent".to_string()),
        attachments: Vec::new(),
    }
}

pub(super) fn auto_policy() -> LifecyclePolicy {
    LifecyclePolicy {
        auto_approve_on_verify: true,
        public_base_url: "https://judges.example.org".to_string(),
    }
}

pub(super) fn manual_policy() -> LifecyclePolicy {
    LifecyclePolicy {
        auto_approve_on_verify: false,
        ..auto_policy()
    }
}

pub(super) type MemoryLifecycle = ApplicationLifecycle<MemoryRepository, MemoryAudit, MemoryNotifier>;

pub(super) fn build_lifecycle(
    policy: LifecyclePolicy,
) -> (
    MemoryLifecycle,
    Arc<MemoryRepository>,
    Arc<MemoryAudit>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let audit = Arc::new(MemoryAudit::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let lifecycle =
        ApplicationLifecycle::new(repository.clone(), audit.clone(), notifier.clone(), policy);
    (lifecycle, repository, audit, notifier)
}

pub(super) fn build_admin_gateway(
    lifecycle: MemoryLifecycle,
    admins: &[&str],
) -> AdminGateway<MemoryRepository, MemoryAudit, MemoryNotifier, StaticRoles> {
    AdminGateway::new(Arc::new(lifecycle), Arc::new(StaticRoles::new(admins)))
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    records: Arc<Mutex<HashMap<String, ApplicationRecord>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&record.email) {
            return Err(RepositoryError::DuplicateEmail);
        }
        guard.insert(record.email.clone(), record.clone());
        Ok(record)
    }

    fn update(
        &self,
        mut record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let stored = guard
            .get_mut(&record.email)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict);
        }
        record.version = expected_version + 1;
        *stored = record.clone();
        Ok(record)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(email).cloned())
    }

    fn find_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.values().find(|record| &record.id == id).cloned())
    }

    fn pending_review(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut pending: Vec<ApplicationRecord> = guard
            .values()
            .filter(|record| record.status == ApplicationStatus::PendingApproval)
            .cloned()
            .collect();
        pending.sort_by_key(|record| record.created_at);
        pending.truncate(limit);
        Ok(pending)
    }
}

/// Delegates to an inner memory repository but answers `VersionConflict` for
/// the next `n` update calls, to exercise the retry loop.
pub(super) struct ConflictingUpdates {
    pub(super) inner: MemoryRepository,
    remaining: AtomicUsize,
}

impl ConflictingUpdates {
    pub(super) fn failing_times(n: usize) -> Self {
        Self {
            inner: MemoryRepository::default(),
            remaining: AtomicUsize::new(n),
        }
    }
}

impl ApplicationRepository for ConflictingUpdates {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        self.inner.insert(record)
    }

    fn update(
        &self,
        record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        if self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RepositoryError::VersionConflict);
        }
        self.inner.update(record, expected_version)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.find_by_email(email)
    }

    fn find_by_id(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        self.inner.find_by_id(id)
    }

    fn pending_review(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        self.inner.pending_review(limit)
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _record: ApplicationRecord,
        _expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_email(&self, _email: &str) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_id(
        &self,
        _id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn pending_review(&self, _limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditTrail for MemoryAudit {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }

    fn list_by_email(&self, email: &str) -> Result<Vec<AuditEntry>, AuditError> {
        let guard = self.entries.lock().expect("audit mutex poisoned");
        Ok(guard
            .iter()
            .rev()
            .filter(|entry| entry.email == email)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationGateway for MemoryNotifier {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct FailingNotifier;

impl NotificationGateway for FailingNotifier {
    fn send(&self, _notification: Notification) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp offline".to_string()))
    }
}

pub(super) struct StaticRoles {
    admins: Vec<String>,
}

impl StaticRoles {
    pub(super) fn new(admins: &[&str]) -> Self {
        Self {
            admins: admins.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl RoleProvider for StaticRoles {
    fn is_admin(&self, actor: &str) -> bool {
        self.admins.iter().any(|admin| admin == actor)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
