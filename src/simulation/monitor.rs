use std::{future::Future, sync::Arc};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dao::{
    fact_store::{FactQuery, FactStore},
    facts::{FactHash, Playground},
    repository::Stored,
};

/// Watches a tenant for newly created playgrounds and hands each one to a handler.
///
/// The subscription is established before `start` returns, so any playground created
/// afterwards is observed.
pub struct PlaygroundMonitor {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PlaygroundMonitor {
    pub fn start<F, Fut>(store: Arc<dyn FactStore>, tenant: FactHash, handler: F) -> Self
    where
        F: Fn(Stored<Playground>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut subscription = store.watch(FactQuery::Playgrounds {
            tenant: tenant.clone(),
        });
        let cancel = subscription.stop_handle();
        let handler = Arc::new(handler);

        let task = tokio::spawn(async move {
            info!(%tenant, "playground monitor started");
            while let Some(record) = subscription.next().await {
                let Some(playground) = record.as_playground().cloned() else {
                    warn!(hash = %record.hash, "playground watch delivered another fact type");
                    continue;
                };
                debug!(code = %playground.code, "new playground observed");
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler(Stored {
                        hash: record.hash,
                        fact: playground,
                    })
                    .await;
                });
            }
            info!(%tenant, "playground monitor stopped");
        });

        Self { cancel, task }
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.task.is_finished()
    }

    /// Stop watching and wait for the watch loop to end.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            warn!(error = %err, "playground monitor task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::dao::{
        fact_store::MemoryFactStore,
        facts::{Fact, Tenant},
        repository::FleetRepository,
    };

    async fn tenant(store: &MemoryFactStore, key: &str) -> FactHash {
        store
            .fact(Fact::Tenant(Tenant {
                public_key: key.into(),
            }))
            .await
            .unwrap()
            .hash
    }

    #[tokio::test]
    async fn handler_sees_new_playgrounds_of_its_tenant_only() {
        let store = MemoryFactStore::new();
        let ours = tenant(&store, "ours").await;
        let theirs = tenant(&store, "theirs").await;
        let repository = FleetRepository::new(Arc::new(store.clone()));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let monitor = PlaygroundMonitor::start(Arc::new(store), ours.clone(), move |playground| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(playground.fact.code);
            }
        });

        repository.create_playground(&theirs, "OTHERS").await.unwrap();
        repository.create_playground(&ours, "ABCDEF").await.unwrap();

        let code = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(code, "ABCDEF");
        assert!(monitor.is_running());

        monitor.stop().await;
        repository.create_playground(&ours, "GHIJKL").await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
