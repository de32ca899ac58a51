use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::domain::{
    normalize_email, Actor, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationSubmission, ApplicationView, AuditEntry,
};
use super::repository::{
    ApplicationRepository, AuditError, AuditTrail, Notification, NotificationGateway,
    NotificationKind, RepositoryError,
};
use super::token::TokenService;

/// Bounded retries for compare-and-swap writes before surfacing `Conflict`.
const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Deployment-level dials for the lifecycle.
///
/// The judge flow historically auto-approved on email verification while the
/// endorsement flow parked applications for an operator decision; the flag
/// keeps both deployments on the same engine.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub auto_approve_on_verify: bool,
    /// Base for the verification and signup links embedded in outgoing mail.
    pub public_base_url: String,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            auto_approve_on_verify: true,
            public_base_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Service composing the repository, audit trail, token service, and the
/// outbound notification hook into the application state machine.
pub struct ApplicationLifecycle<R, T, N> {
    repository: Arc<R>,
    audit: Arc<T>,
    notifications: Arc<N>,
    tokens: TokenService,
    policy: LifecyclePolicy,
}

impl<R, T, N> ApplicationLifecycle<R, T, N>
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
{
    pub fn new(
        repository: Arc<R>,
        audit: Arc<T>,
        notifications: Arc<N>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            repository,
            audit,
            notifications,
            tokens: TokenService::verification(),
            policy,
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Intake a new application: create the record, issue a verification
    /// token, and request the "verify your email" notification.
    ///
    /// The one mutation with no audit entry, since there is no prior status
    /// to transition from.
    pub fn submit(
        &self,
        submission: ApplicationSubmission,
    ) -> Result<ApplicationRecord, LifecycleError> {
        self.submit_at(submission, Utc::now())
    }

    pub fn submit_at(
        &self,
        mut submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Result<ApplicationRecord, LifecycleError> {
        let email = normalize_email(&submission.email);
        if email.is_empty() {
            return Err(LifecycleError::MissingField("email"));
        }
        if !email.contains('@') {
            return Err(LifecycleError::InvalidEmail);
        }
        if submission.full_name.trim().is_empty() {
            return Err(LifecycleError::MissingField("full_name"));
        }
        submission.email = email.clone();

        let token = self.tokens.issue_at(now);
        let record = ApplicationRecord {
            id: ApplicationId(Uuid::new_v4().to_string()),
            email,
            submission,
            status: ApplicationStatus::Submitted,
            verified: false,
            verification_token: Some(token.clone()),
            signup_token: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let stored = match self.repository.insert(record) {
            Ok(stored) => stored,
            Err(RepositoryError::DuplicateEmail) => return Err(LifecycleError::DuplicateApplicant),
            Err(other) => return Err(other.into()),
        };

        let mut details = BTreeMap::new();
        details.insert(
            "full_name".to_string(),
            stored.submission.full_name.clone(),
        );
        details.insert(
            "verification_url".to_string(),
            self.verification_url(&stored.email, &token.secret),
        );
        self.dispatch(Notification {
            kind: NotificationKind::Verification,
            recipient: stored.email.clone(),
            details,
        });

        Ok(stored)
    }

    /// Redeem a verification token.
    ///
    /// Idempotent-safe: the token is cleared in the same write that sets
    /// `verified`, so a retried call after success answers `AlreadyVerified`
    /// instead of re-applying the transition.
    pub fn verify_email(
        &self,
        email: &str,
        token: &str,
    ) -> Result<ApplicationRecord, LifecycleError> {
        self.verify_email_at(email, token, Utc::now())
    }

    pub fn verify_email_at(
        &self,
        email: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplicationRecord, LifecycleError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(LifecycleError::MissingField("email"));
        }
        if token.trim().is_empty() {
            return Err(LifecycleError::MissingField("token"));
        }

        for _attempt in 0..MAX_UPDATE_ATTEMPTS {
            let record = self
                .repository
                .find_by_email(&email)?
                .ok_or(LifecycleError::NotFound)?;

            if record.verified {
                return Err(LifecycleError::AlreadyVerified);
            }
            let issued = record
                .verification_token
                .clone()
                .ok_or(LifecycleError::NotFound)?;
            if !issued.matches(token) {
                return Err(LifecycleError::NotFound);
            }
            if self.tokens.is_expired(&issued, now) {
                return Err(LifecycleError::TokenExpired);
            }

            let previous_status = record.status;
            let new_status = if self.policy.auto_approve_on_verify {
                ApplicationStatus::Approved
            } else {
                ApplicationStatus::PendingApproval
            };

            let mut updated = record.clone();
            updated.verified = true;
            updated.verification_token = None;
            updated.status = new_status;
            updated.updated_at = now;

            match self.repository.update(updated, record.version) {
                Ok(stored) => {
                    self.record_transition(
                        &stored,
                        previous_status,
                        new_status,
                        Actor::System,
                        None,
                        now,
                    )?;

                    let mut details = BTreeMap::new();
                    details.insert(
                        "full_name".to_string(),
                        stored.submission.full_name.clone(),
                    );
                    details.insert("status".to_string(), new_status.label().to_string());
                    self.dispatch(Notification {
                        kind: NotificationKind::Approval,
                        recipient: stored.email.clone(),
                        details,
                    });

                    return Ok(stored);
                }
                Err(RepositoryError::VersionConflict) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Err(LifecycleError::Conflict)
    }

    /// Operator approval. Authorization lives in the admin gateway; this is
    /// the raw transition.
    pub fn approve(
        &self,
        id: &ApplicationId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<DecisionOutcome, LifecycleError> {
        self.approve_at(id, actor, notes, Utc::now())
    }

    pub fn approve_at(
        &self,
        id: &ApplicationId,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, LifecycleError> {
        self.decide_at(id, ApplicationStatus::Approved, actor, notes, now)
    }

    pub fn decline(
        &self,
        id: &ApplicationId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<DecisionOutcome, LifecycleError> {
        self.decline_at(id, actor, notes, Utc::now())
    }

    pub fn decline_at(
        &self,
        id: &ApplicationId,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, LifecycleError> {
        self.decide_at(id, ApplicationStatus::Declined, actor, notes, now)
    }

    fn decide_at(
        &self,
        id: &ApplicationId,
        target: ApplicationStatus,
        actor: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DecisionOutcome, LifecycleError> {
        let actor = Actor::Operator(actor.to_string());

        for _attempt in 0..MAX_UPDATE_ATTEMPTS {
            let record = self
                .repository
                .find_by_id(id)?
                .ok_or(LifecycleError::NotFound)?;

            // A loser of a concurrent race re-reads here and sees the already
            // updated status, so it reports the conflict instead of stacking
            // a second identical transition on the trail.
            if !record.status.can_transition_to(target) {
                return Err(LifecycleError::InvalidTransition {
                    from: record.status,
                    to: target,
                });
            }

            let previous_status = record.status;
            let mut updated = record.clone();
            updated.status = target;
            updated.updated_at = now;

            match self.repository.update(updated, record.version) {
                Ok(stored) => {
                    self.record_transition(
                        &stored,
                        previous_status,
                        target,
                        actor.clone(),
                        notes.clone(),
                        now,
                    )?;

                    let kind = if target == ApplicationStatus::Declined {
                        NotificationKind::Decline
                    } else {
                        NotificationKind::Approval
                    };
                    let mut details = BTreeMap::new();
                    details.insert("decided_by".to_string(), actor.name().to_string());
                    details.insert("status".to_string(), target.label().to_string());
                    if let Some(notes) = &notes {
                        details.insert("notes".to_string(), notes.clone());
                    }
                    self.dispatch(Notification {
                        kind,
                        recipient: stored.email.clone(),
                        details,
                    });

                    return Ok(DecisionOutcome {
                        application_id: stored.id,
                        email: stored.email,
                        previous_status,
                        new_status: target,
                    });
                }
                Err(RepositoryError::VersionConflict) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Err(LifecycleError::Conflict)
    }

    /// Mint a one-time account-creation link for a verified applicant.
    ///
    /// Re-issuing supersedes the previous signup token; only one is ever
    /// active. Unverified or unknown applicants both answer `NotFound`.
    pub fn issue_signup_link(&self, email: &str) -> Result<SignupLink, LifecycleError> {
        self.issue_signup_link_at(email, Utc::now())
    }

    pub fn issue_signup_link_at(
        &self,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<SignupLink, LifecycleError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(LifecycleError::MissingField("email"));
        }

        for _attempt in 0..MAX_UPDATE_ATTEMPTS {
            let record = self
                .repository
                .find_by_email(&email)?
                .ok_or(LifecycleError::NotFound)?;
            if !record.verified {
                return Err(LifecycleError::NotFound);
            }

            let token = self.tokens.issue_at(now);
            let mut updated = record.clone();
            updated.signup_token = Some(token.clone());
            updated.updated_at = now;

            match self.repository.update(updated, record.version) {
                Ok(stored) => {
                    return Ok(SignupLink {
                        signup_url: format!(
                            "{}/signup?email={}&token={}",
                            self.base_url(),
                            stored.email,
                            token.secret
                        ),
                        token: token.secret,
                    });
                }
                Err(RepositoryError::VersionConflict) => continue,
                Err(other) => return Err(other.into()),
            }
        }

        Err(LifecycleError::Conflict)
    }

    /// Existence and verification state for one email, with a sanitized view
    /// of the record when present.
    pub fn check_verification(&self, email: &str) -> Result<VerificationStatus, LifecycleError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(LifecycleError::MissingField("email"));
        }

        Ok(match self.repository.find_by_email(&email)? {
            Some(record) => VerificationStatus {
                exists: true,
                verified: record.verified,
                application: Some(record.public_view()),
            },
            None => VerificationStatus {
                exists: false,
                verified: false,
                application: None,
            },
        })
    }

    /// The application plus its status transitions, most recent first.
    pub fn audit_history(&self, email: &str) -> Result<ApplicationHistory, LifecycleError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(LifecycleError::MissingField("email"));
        }

        let record = self
            .repository
            .find_by_email(&email)?
            .ok_or(LifecycleError::NotFound)?;
        let status_history = self.audit.list_by_email(&email)?;

        Ok(ApplicationHistory {
            application: record.public_view(),
            status_history,
        })
    }

    /// Applications awaiting an operator decision.
    pub fn pending_review(&self, limit: usize) -> Result<Vec<ApplicationView>, LifecycleError> {
        let records = self.repository.pending_review(limit)?;
        Ok(records.iter().map(ApplicationRecord::public_view).collect())
    }

    fn record_transition(
        &self,
        record: &ApplicationRecord,
        previous_status: ApplicationStatus,
        new_status: ApplicationStatus,
        actor: Actor,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), LifecycleError> {
        self.audit.append(AuditEntry {
            application_id: record.id.clone(),
            email: record.email.clone(),
            previous_status,
            new_status,
            occurred_at: now,
            notes,
            actor,
        })?;
        Ok(())
    }

    /// Best-effort dispatch after the repository write has committed; a
    /// failed delivery is logged and dropped, never propagated.
    fn dispatch(&self, notification: Notification) {
        let template = notification.kind.template_key();
        let recipient = notification.recipient.clone();
        if let Err(err) = self.notifications.send(notification) {
            warn!(template, %recipient, error = %err, "notification delivery failed, dropping");
        }
    }

    fn base_url(&self) -> &str {
        self.policy.public_base_url.trim_end_matches('/')
    }

    fn verification_url(&self, email: &str, secret: &str) -> String {
        format!(
            "{}/verify?email={}&token={}",
            self.base_url(),
            email,
            secret
        )
    }
}

/// Error raised by the lifecycle engine.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("email address is not valid")]
    InvalidEmail,
    #[error("an application already exists for this email")]
    DuplicateApplicant,
    #[error("no matching application found")]
    NotFound,
    #[error("email is already verified")]
    AlreadyVerified,
    #[error("verification token has expired")]
    TokenExpired,
    #[error("cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("concurrent updates kept conflicting, giving up")]
    Conflict,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

/// Result of an operator decision, echoing the transition that was applied.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub application_id: ApplicationId,
    pub email: String,
    pub previous_status: ApplicationStatus,
    pub new_status: ApplicationStatus,
}

/// One-time account-creation link for a verified applicant.
#[derive(Debug, Clone, Serialize)]
pub struct SignupLink {
    pub signup_url: String,
    pub token: String,
}

/// Answer to a verification status probe.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationStatus {
    pub exists: bool,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application: Option<ApplicationView>,
}

/// Application view plus its append-only transition history.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationHistory {
    pub application: ApplicationView,
    pub status_history: Vec<AuditEntry>,
}
