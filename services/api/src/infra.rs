use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

use judgedesk::config::LifecycleSettings;
use judgedesk::workflows::applicants::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, AuditEntry,
    AuditError, AuditTrail, LifecyclePolicy, Notification, NotificationError, NotificationGateway,
    RepositoryError, RoleProvider,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn lifecycle_policy(settings: &LifecycleSettings) -> LifecyclePolicy {
    LifecyclePolicy {
        auto_approve_on_verify: settings.auto_approve_on_verify,
        public_base_url: settings.public_base_url.clone(),
    }
}

/// Mutex-guarded map keyed by the email natural key. Honors the same
/// compare-and-swap contract a transactional store would, so concurrent
/// decisions conflict instead of losing writes.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    records: Arc<Mutex<HashMap<String, ApplicationRecord>>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
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

#[derive(Default, Clone)]
pub(crate) struct InMemoryAuditTrail {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl AuditTrail for InMemoryAuditTrail {
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

/// Stand-in for the template/transport collaborator: logs the dispatch so an
/// operator tailing the service sees what would have been mailed.
#[derive(Default, Clone)]
pub(crate) struct LoggingNotificationGateway;

impl NotificationGateway for LoggingNotificationGateway {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        info!(
            template = notification.kind.template_key(),
            recipient = %notification.recipient,
            "dispatching notification"
        );
        Ok(())
    }
}

/// Records dispatched notifications so the demo can show them afterwards.
#[derive(Default, Clone)]
pub(crate) struct RecordingNotificationGateway {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotificationGateway {
    pub(crate) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl NotificationGateway for RecordingNotificationGateway {
    fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Role check backed by the configured operator allowlist.
#[derive(Clone)]
pub(crate) struct AllowlistRoleProvider {
    actors: Vec<String>,
}

impl AllowlistRoleProvider {
    pub(crate) fn new(actors: Vec<String>) -> Self {
        Self { actors }
    }
}

impl RoleProvider for AllowlistRoleProvider {
    fn is_admin(&self, actor: &str) -> bool {
        self.actors.iter().any(|admin| admin == actor)
    }
}
