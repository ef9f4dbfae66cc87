// Feedback Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Free-form feedback about the application (append-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub name: Option<String>,
    pub email: String,
    pub message: String,
    pub created_at: i64, // epoch ms
}

impl Feedback {
    /// Build a feedback entry; email and message are required
    pub fn new(
        name: Option<String>,
        email: impl Into<String>,
        message: impl Into<String>,
        created_at: i64,
    ) -> Result<Self> {
        let email = email.into().trim().to_string();
        let message = message.into().trim().to_string();

        if email.is_empty() {
            return Err(DomainError::Validation("email is required".to_string()));
        }
        if message.is_empty() {
            return Err(DomainError::Validation("message is required".to_string()));
        }

        Ok(Self {
            name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            email,
            message,
            created_at,
        })
    }
}
