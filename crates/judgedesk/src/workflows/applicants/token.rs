use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a verification token stays redeemable after issuance.
pub const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

/// An opaque single-use credential plus its issuance time.
///
/// The secret is a random UUID v4, so two issuances cannot plausibly collide
/// and the value cannot be guessed from the applicant's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub secret: String,
    pub issued_at: DateTime<Utc>,
}

impl IssuedToken {
    pub fn matches(&self, presented: &str) -> bool {
        self.secret == presented
    }
}

/// Issues tokens and answers window checks.
///
/// The service is pure with respect to state: marking a token consumed is the
/// lifecycle's responsibility, which is what keeps a token from validating
/// twice inside the same window.
#[derive(Debug, Clone)]
pub struct TokenService {
    validity: Duration,
}

impl TokenService {
    pub fn with_validity(validity: Duration) -> Self {
        Self { validity }
    }

    /// Service configured with the standard verification window.
    pub fn verification() -> Self {
        Self::with_validity(Duration::hours(VERIFICATION_TOKEN_TTL_HOURS))
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    pub fn issue(&self) -> IssuedToken {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> IssuedToken {
        IssuedToken {
            secret: Uuid::new_v4().to_string(),
            issued_at: now,
        }
    }

    pub fn is_expired(&self, issued: &IssuedToken, now: DateTime<Utc>) -> bool {
        now - issued.issued_at > self.validity
    }

    /// True iff the presented secret matches and the window has not elapsed.
    /// Callers still have to check the token has not already been consumed.
    pub fn is_valid(&self, issued: &IssuedToken, presented: &str, now: DateTime<Utc>) -> bool {
        issued.matches(presented) && !self.is_expired(issued, now)
    }
}

impl Default for TokenService {
    fn default() -> Self {
        Self::verification()
    }
}
