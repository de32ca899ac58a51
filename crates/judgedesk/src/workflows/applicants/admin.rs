use std::sync::Arc;

use super::domain::ApplicationId;
use super::repository::{ApplicationRepository, AuditTrail, NotificationGateway};
use super::service::{ApplicationLifecycle, DecisionOutcome, LifecycleError};

/// Answers whether a caller holds the administrator role. Supplied by the
/// deployment's auth collaborator; the core never sees credentials.
pub trait RoleProvider: Send + Sync {
    fn is_admin(&self, actor: &str) -> bool;
}

/// Thin authorization wrapper exposing approve/decline to operator-facing
/// callers. The role check happens before the lifecycle is touched.
pub struct AdminGateway<R, T, N, P> {
    lifecycle: Arc<ApplicationLifecycle<R, T, N>>,
    roles: Arc<P>,
}

impl<R, T, N, P> AdminGateway<R, T, N, P>
where
    R: ApplicationRepository + 'static,
    T: AuditTrail + 'static,
    N: NotificationGateway + 'static,
    P: RoleProvider + 'static,
{
    pub fn new(lifecycle: Arc<ApplicationLifecycle<R, T, N>>, roles: Arc<P>) -> Self {
        Self { lifecycle, roles }
    }

    pub fn approve(
        &self,
        id: &ApplicationId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<DecisionOutcome, AdminError> {
        self.authorize(actor)?;
        Ok(self.lifecycle.approve(id, actor, notes)?)
    }

    pub fn decline(
        &self,
        id: &ApplicationId,
        actor: &str,
        notes: Option<String>,
    ) -> Result<DecisionOutcome, AdminError> {
        self.authorize(actor)?;
        Ok(self.lifecycle.decline(id, actor, notes)?)
    }

    fn authorize(&self, actor: &str) -> Result<(), AdminError> {
        if actor.trim().is_empty() || !self.roles.is_admin(actor) {
            return Err(AdminError::Unauthorized);
        }
        Ok(())
    }
}

/// Error taxonomy of the admin surface: everything the lifecycle can raise,
/// plus the authorization failure.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("actor is not authorized for administrative decisions")]
    Unauthorized,
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
