//! Applicant intake, email verification, and approval lifecycle.
//!
//! The state machine lives in [`service::ApplicationLifecycle`]; storage,
//! audit, and outbound email are contracts implemented by the hosting
//! service. Everything here is deliberately synchronous and transactional per
//! operation so concurrent operator actions cannot lose each other's writes.

pub mod admin;
pub mod domain;
pub mod repository;
pub mod router;
pub mod service;
pub mod token;

#[cfg(test)]
mod tests;

pub use admin::{AdminError, AdminGateway, RoleProvider};
pub use domain::{
    normalize_email, Actor, ApplicationId, ApplicationRecord, ApplicationStatus,
    ApplicationSubmission, ApplicationView, AttachmentDescriptor, AuditEntry,
};
pub use repository::{
    ApplicationRepository, AuditError, AuditTrail, Notification, NotificationError,
    NotificationGateway, NotificationKind, RepositoryError,
};
pub use router::{admin_router, application_router};
pub use service::{
    ApplicationHistory, ApplicationLifecycle, DecisionOutcome, LifecycleError, LifecyclePolicy,
    SignupLink, VerificationStatus,
};
pub use token::{IssuedToken, TokenService, VERIFICATION_TOKEN_TTL_HOURS};
