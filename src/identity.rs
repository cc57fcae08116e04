use axum::http::HeaderMap;
use uuid::Uuid;

use crate::error::{Error, Result};

pub const USER_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";

/// Caller identity as asserted by the upstream auth gateway. Trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub is_admin: bool,
}

impl Identity {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let user_id = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok());
        let is_admin = headers
            .get(ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|r| r.eq_ignore_ascii_case("admin"));
        Self { user_id, is_admin }
    }

    pub fn user(&self) -> Result<Uuid> {
        self.user_id.ok_or(Error::Unauthenticated)
    }

    pub fn require_admin(&self) -> Result<()> {
        self.user()?;
        if self.is_admin {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }

    /// The user an operation applies to: the caller, or `other` when an
    /// administrator acts on someone else's record.
    pub fn acting_on(&self, other: Option<Uuid>) -> Result<Uuid> {
        let me = self.user()?;
        match other {
            Some(target) if target != me => {
                self.require_admin()?;
                Ok(target)
            }
            _ => Ok(me),
        }
    }
}
