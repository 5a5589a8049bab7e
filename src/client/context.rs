use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::AuthEntry;
use crate::ClientSettings;
use crate::Coordinator;
use crate::DelayRetryPolicy;

/// Immutable per-client state shared by the base client and every strategy it
/// activates.
#[derive(Clone)]
pub struct ClientContext {
    pub settings: Arc<ClientSettings>,
    pub root_path: String,
    pub holder: Arc<dyn Coordinator>,
    pub authorities: Vec<AuthEntry>,
    pub retry_policy: DelayRetryPolicy,
    /// Cancelled on shutdown; aborts pending backoff and lock waits
    pub cancel: CancellationToken,
}

impl ClientContext {
    /// Takes root path, authorities and retry policy from `settings`.
    pub fn new(
        settings: ClientSettings,
        holder: Arc<dyn Coordinator>,
    ) -> Self {
        Self {
            root_path: settings.client.root_path.clone(),
            authorities: settings.client.auths.clone(),
            retry_policy: settings.retry,
            settings: Arc::new(settings),
            holder,
            cancel: CancellationToken::new(),
        }
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("root_path", &self.root_path)
            .field("authorities", &self.authorities.len())
            .field("retry_policy", &self.retry_policy)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
