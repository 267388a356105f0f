//! Password reset token delivery
//!
//! Sending mail is outside this service. The default channel only records
//! that a reset was issued; deployments plug in their own [`ResetDelivery`].

use async_trait::async_trait;

use super::models::PasswordResetTicket;
use crate::audit::{audit_log, AuditEvent};
use crate::error::AppError;

/// Channel that hands a reset token to the account owner
#[async_trait]
pub trait ResetDelivery: Send + Sync {
    async fn deliver(&self, ticket: &PasswordResetTicket) -> Result<(), AppError>;
}

/// Records reset issuance on the audit target without the token itself
#[derive(Debug, Default, Clone, Copy)]
pub struct LogResetDelivery;

#[async_trait]
impl ResetDelivery for LogResetDelivery {
    async fn deliver(&self, ticket: &PasswordResetTicket) -> Result<(), AppError> {
        audit_log(&AuditEvent::PasswordResetRequested {
            user_id: ticket.user.id,
            expires_at: ticket.expires_at,
        });
        Ok(())
    }
}

/// Keeps delivered tickets in memory so tests can read the raw token
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Default)]
pub struct CapturingResetDelivery {
    tickets: std::sync::Mutex<Vec<PasswordResetTicket>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl CapturingResetDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of the most recently delivered ticket
    pub fn last_token(&self) -> Option<String> {
        self.tickets
            .lock()
            .ok()
            .and_then(|tickets| tickets.last().map(|t| t.token.clone()))
    }

    pub fn count(&self) -> usize {
        self.tickets.lock().map(|t| t.len()).unwrap_or(0)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl ResetDelivery for CapturingResetDelivery {
    async fn deliver(&self, ticket: &PasswordResetTicket) -> Result<(), AppError> {
        self.tickets
            .lock()
            .map_err(|_| AppError::Internal("reset delivery lock poisoned".to_string()))?
            .push(ticket.clone());
        Ok(())
    }
}
