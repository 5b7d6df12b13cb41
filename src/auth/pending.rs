// Single-slot holding area for an operation blocked on authentication

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

/// An operation deferred for lack of authentication
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub operation_name: String,
    pub arguments: Value,
    pub timestamp: DateTime<Utc>,
}

/// Holds zero or one pending request.
///
/// Last write wins: two callers blocked before either authenticates leave
/// only the second request here. This matches the single-tenant model.
#[derive(Default)]
pub struct PendingRequestSlot {
    slot: Mutex<Option<PendingRequest>>,
}

impl PendingRequestSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store(&self, operation_name: &str, arguments: Value) {
        let mut slot = self.slot.lock().await;
        if let Some(previous) = slot.as_ref() {
            tracing::debug!(
                discarded = %previous.operation_name,
                replacement = %operation_name,
                "Overwriting pending request"
            );
        }
        *slot = Some(PendingRequest {
            operation_name: operation_name.to_string(),
            arguments,
            timestamp: Utc::now(),
        });
    }

    /// Read-once: returns the pending request and empties the slot
    pub async fn take(&self) -> Option<PendingRequest> {
        self.slot.lock().await.take()
    }

    pub async fn clear(&self) {
        self.slot.lock().await.take();
    }
}
