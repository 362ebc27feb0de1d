//! The model behind a narrow interface: text in, text out

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Semaphore;

/// One generation call
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    pub system: String,
    pub prompt: String,
    /// JSON schema the output must satisfy
    pub schema: serde_json::Value,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum InferenceError {
    #[error("request failed: {0}")]
    Http(String),

    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode backend response: {0}")]
    Decode(String),

    #[error("inference pool closed")]
    Closed,
}

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError>;

    /// Model name, for logs
    fn model(&self) -> &str;
}

/// A backend shared by every battle, with a bound on concurrent generations
#[derive(Clone)]
pub struct InferencePool {
    backend: Arc<dyn InferenceBackend>,
    permits: Arc<Semaphore>,
}

impl InferencePool {
    pub fn new(backend: Arc<dyn InferenceBackend>, max_concurrent: usize) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Wait for a free slot, then generate. Dropping the returned future
    /// releases the slot and abandons the call.
    pub async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| InferenceError::Closed)?;
        self.backend.generate(request).await
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn model(&self) -> &str {
        self.backend.model()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    /// Answers from a script, one per call; records every request
    pub struct ScriptedBackend {
        answers: Mutex<VecDeque<Result<String, InferenceError>>>,
        pub requests: Mutex<Vec<InferenceRequest>>,
        delay: Option<Duration>,
    }

    impl ScriptedBackend {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().map(|a| Ok(a.to_string())).collect()),
                requests: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        pub fn with_results(answers: Vec<Result<String, InferenceError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                requests: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Every call sleeps this long before answering
        pub fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate(&self, request: &InferenceRequest) -> Result<String, InferenceError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(InferenceError::Http("script exhausted".to_string())))
        }

        fn model(&self) -> &str {
            "scripted"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::ScriptedBackend;
    use super::*;

    fn request() -> InferenceRequest {
        InferenceRequest {
            system: "system".to_string(),
            prompt: "prompt".to_string(),
            schema: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_pool_forwards_to_backend() {
        let backend = Arc::new(ScriptedBackend::new(&["thunderbolt"]));
        let pool = InferencePool::new(backend.clone(), 2);
        assert_eq!(pool.generate(&request()).await.unwrap(), "thunderbolt");
        assert_eq!(backend.calls(), 1);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_releases_permit() {
        let backend = Arc::new(ScriptedBackend::new(&["a", "b"]).slow(Duration::from_secs(30)));
        let pool = InferencePool::new(backend, 1);

        let req = request();
        let timed_out = tokio::time::timeout(Duration::from_secs(1), pool.generate(&req)).await;
        assert!(timed_out.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let backend = Arc::new(ScriptedBackend::new(&["a", "b"]).slow(Duration::from_secs(10)));
        let pool = InferencePool::new(backend.clone(), 1);

        let first = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.generate(&request()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(pool.available(), 0);

        let second = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.generate(&request()).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        // the second call is still waiting for the permit
        assert_eq!(backend.calls(), 1);

        assert_eq!(first.await.unwrap().unwrap(), "a");
        assert_eq!(second.await.unwrap().unwrap(), "b");
        assert_eq!(backend.calls(), 2);
    }
}
