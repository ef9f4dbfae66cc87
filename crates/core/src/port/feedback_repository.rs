// Feedback Repository Port

use crate::domain::Feedback;
use crate::error::Result;
use async_trait::async_trait;

/// Append-only sink for the `feedback` relation
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    async fn insert(&self, feedback: &Feedback) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingFeedbackRepository {
        pub entries: Mutex<Vec<Feedback>>,
    }

    #[async_trait]
    impl FeedbackRepository for RecordingFeedbackRepository {
        async fn insert(&self, feedback: &Feedback) -> Result<()> {
            self.entries.lock().unwrap().push(feedback.clone());
            Ok(())
        }
    }
}
