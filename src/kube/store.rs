use crate::kube::{KubeClient, KubeConfig, KubeResult};
use crate::resource::{EmailStatus, ResourceRef};
use crate::status::StatusStore;
use async_trait::async_trait;
use once_cell::sync::OnceCell;

type Loader = Box<dyn Fn() -> KubeResult<KubeClient> + Send + Sync>;

/// Status store backed by the API server of the surrounding cluster
///
/// The client is acquired on first use and then shared by every request of
/// the process. A failed acquisition is not cached; the next write retries.
pub struct InClusterStore {
    loader: Loader,
    client: OnceCell<KubeClient>,
}

impl InClusterStore {
    pub fn new() -> Self {
        Self::with_loader(|| KubeClient::new(KubeConfig::in_cluster()?))
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> KubeResult<KubeClient> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            client: OnceCell::new(),
        }
    }

    fn client(&self) -> KubeResult<&KubeClient> {
        self.client.get_or_try_init(|| {
            let client = (self.loader)();
            match &client {
                Ok(_) => tracing::info!("Resource store client initialized"),
                Err(e) => tracing::error!("Failed to initialize resource store client: {}", e),
            }
            client
        })
    }
}

impl Default for InClusterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusStore for InClusterStore {
    async fn patch_status(&self, resource: &ResourceRef, status: &EmailStatus) -> KubeResult<()> {
        self.client()?.patch_status(resource, status).await
    }
}

#[async_trait]
impl StatusStore for KubeClient {
    async fn patch_status(&self, resource: &ResourceRef, status: &EmailStatus) -> KubeResult<()> {
        KubeClient::patch_status(self, resource, status).await
    }
}
