use crate::error::AppResult;
use async_trait::async_trait;

/// Outbound text message delivery.
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> AppResult<()>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::error::AppError;
    use std::sync::Mutex;

    /// Records every message and optionally fails for chosen recipients.
    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<(String, String)>>,
        pub fail_for: Vec<String>,
    }

    impl RecordingSender {
        pub fn failing_for(numbers: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: numbers.iter().map(|n| n.to_string()).collect(),
            }
        }

        pub fn sent(&self) -> Vec<(String, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSender {
        async fn send(&self, to: &str, body: &str) -> AppResult<()> {
            if self.fail_for.iter().any(|n| n == to) {
                return Err(AppError::ExternalApiError(format!("undeliverable: {to}")));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            Ok(())
        }
    }
}
