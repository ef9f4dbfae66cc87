// Feedback submission use case

use crate::domain::Feedback;
use crate::error::Result;
use crate::port::{FeedbackRepository, TimeProvider};
use std::sync::Arc;
use tracing::{error, info};

/// Appends feedback to the primary backend; no fallback tier
pub struct FeedbackService {
    repo: Arc<dyn FeedbackRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl FeedbackService {
    pub fn new(repo: Arc<dyn FeedbackRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            repo,
            time_provider,
        }
    }

    /// Validate and store one feedback entry
    pub async fn submit(
        &self,
        name: Option<String>,
        email: &str,
        message: &str,
    ) -> Result<Feedback> {
        let feedback = Feedback::new(name, email, message, self.time_provider.now_millis())?;

        if let Err(e) = self.repo.insert(&feedback).await {
            error!(error = %e, "Failed to store feedback");
            return Err(e);
        }

        info!(has_name = feedback.name.is_some(), "Feedback received");
        Ok(feedback)
    }
}
