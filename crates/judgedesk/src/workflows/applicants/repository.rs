use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{ApplicationId, ApplicationRecord, AuditEntry};

/// Storage abstraction so the lifecycle can be exercised against anything
/// from the in-memory adapter to a transactional store.
///
/// `update` carries compare-and-swap semantics: the write only lands when the
/// stored version still equals `expected_version`, and the store bumps the
/// version on success. Lost updates surface as `VersionConflict` instead of
/// silently overwriting a concurrent decision.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(
        &self,
        record: ApplicationRecord,
        expected_version: u64,
    ) -> Result<ApplicationRecord, RepositoryError>;
    fn find_by_email(&self, email: &str) -> Result<Option<ApplicationRecord>, RepositoryError>;
    fn find_by_id(&self, id: &ApplicationId)
        -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Applications awaiting an operator decision, oldest first.
    fn pending_review(&self, limit: usize) -> Result<Vec<ApplicationRecord>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("an application already exists for this email")]
    DuplicateEmail,
    #[error("record not found")]
    NotFound,
    #[error("stored version no longer matches the expected version")]
    VersionConflict,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Durable, append-only log of status transitions.
pub trait AuditTrail: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), AuditError>;
    /// Entries for one applicant, most recent first.
    fn list_by_email(&self, email: &str) -> Result<Vec<AuditEntry>, AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit storage unavailable: {0}")]
    Unavailable(String),
}

/// Message kinds the notification collaborator knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Verification,
    Approval,
    Decline,
}

impl NotificationKind {
    pub const fn template_key(self) -> &'static str {
        match self {
            NotificationKind::Verification => "verification",
            NotificationKind::Approval => "approval",
            NotificationKind::Decline => "decline",
        }
    }
}

/// Outbound email request handed to the external gateway; rendering and
/// transport happen on the other side of this boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: String,
    pub details: BTreeMap<String, String>,
}

/// Trait describing the outbound email hook.
pub trait NotificationGateway: Send + Sync {
    fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Notification dispatch error. Delivery is best-effort: the lifecycle logs
/// these and never lets them roll back a committed transition.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}
