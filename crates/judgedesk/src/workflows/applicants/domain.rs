use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::token::IssuedToken;

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inbound judge application as collected by the public form.
///
/// Everything besides `email` is an opaque payload to the lifecycle; it is
/// stored and echoed back but never interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub experience: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentDescriptor>,
}

/// Metadata for uploaded supporting material (CV, photo); the file itself
/// lives in external storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    pub name: String,
    pub storage_key: String,
}

/// High level status tracked throughout the application lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    PendingApproval,
    Approved,
    Declined,
    AccountCreated,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::PendingApproval => "pending_approval",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Declined => "declined",
            ApplicationStatus::AccountCreated => "account_created",
        }
    }

    /// Whether the status graph permits moving from `self` to `next`.
    ///
    /// `Declined` and `AccountCreated` are terminal; there is no reopen
    /// operation, so nothing leaves them.
    pub fn can_transition_to(self, next: ApplicationStatus) -> bool {
        use ApplicationStatus::*;
        matches!(
            (self, next),
            (Submitted, PendingApproval | Approved | Declined)
                | (PendingApproval, Approved | Declined)
                | (Approved, Declined | AccountCreated)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ApplicationStatus::Declined | ApplicationStatus::AccountCreated
        )
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who caused a status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Actor {
    /// Self-service transitions such as the applicant's verification click.
    System,
    /// An operator acting through the admin gateway.
    Operator(String),
}

impl Actor {
    pub fn name(&self) -> &str {
        match self {
            Actor::System => "system",
            Actor::Operator(name) => name,
        }
    }
}

/// Repository record for one applicant, keyed by email.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    /// Unique natural key; normalized to trimmed ASCII lowercase at intake.
    pub email: String,
    pub submission: ApplicationSubmission,
    pub status: ApplicationStatus,
    /// Monotonic false -> true; never reset once verification succeeds.
    pub verified: bool,
    /// Present while unconsumed; cleared in the same write that sets
    /// `verified` so a replayed token can never validate twice.
    pub verification_token: Option<IssuedToken>,
    /// Present only after issuance; each re-issue supersedes the previous.
    pub signup_token: Option<IssuedToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optimistic-concurrency guard, bumped by the store on every update.
    pub version: u64,
}

impl ApplicationRecord {
    /// Sanitized representation safe to return to callers; token secrets
    /// never leave the record.
    pub fn public_view(&self) -> ApplicationView {
        ApplicationView {
            id: self.id.clone(),
            email: self.email.clone(),
            full_name: self.submission.full_name.clone(),
            region: self.submission.region.clone(),
            status: self.status,
            verified: self.verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Publicly exposed slice of an application record.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub id: ApplicationId,
    pub email: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub status: ApplicationStatus,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Append-only record of one status transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub application_id: ApplicationId,
    pub email: String,
    pub previous_status: ApplicationStatus,
    pub new_status: ApplicationStatus,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub actor: Actor,
}

/// Canonical form of the natural key: trimmed, ASCII lowercased.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Judge@Example.COM "), "judge@example.com");
    }

    #[test]
    fn terminal_states_have_no_outgoing_transitions() {
        use ApplicationStatus::*;
        for target in [Submitted, PendingApproval, Approved, Declined, AccountCreated] {
            assert!(!Declined.can_transition_to(target));
            assert!(!AccountCreated.can_transition_to(target));
        }
    }

    #[test]
    fn approved_can_still_be_declined() {
        assert!(ApplicationStatus::Approved.can_transition_to(ApplicationStatus::Declined));
        assert!(!ApplicationStatus::Declined.can_transition_to(ApplicationStatus::Approved));
    }

    #[test]
    fn account_creation_requires_prior_approval() {
        use ApplicationStatus::*;
        assert!(Approved.can_transition_to(AccountCreated));
        assert!(!Submitted.can_transition_to(AccountCreated));
        assert!(!PendingApproval.can_transition_to(AccountCreated));
    }
}
