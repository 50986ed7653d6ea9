use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

/// Cancellation tokens of in-flight research requests, keyed by request id.
#[derive(Clone, Default)]
pub struct ActiveResearch {
    tokens: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

/// Registration of one in-flight request; unregisters on drop.
pub struct ActiveRequest {
    request_id: String,
    token: CancellationToken,
    registry: ActiveResearch,
}

impl ActiveRequest {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.registry.remove(&self.request_id);
    }
}

impl ActiveResearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request id; `None` when the id is already in flight.
    pub fn register(&self, request_id: &str) -> Option<ActiveRequest> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        if tokens.contains_key(request_id) {
            return None;
        }
        let token = CancellationToken::new();
        tokens.insert(request_id.to_string(), token.clone());
        Some(ActiveRequest {
            request_id: request_id.to_string(),
            token,
            registry: self.clone(),
        })
    }

    /// Cancel a request; `false` if the id is unknown.
    pub fn cancel(&self, request_id: &str) -> bool {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        match tokens.get(request_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, request_id: &str) {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(request_id);
    }
}
