//! Fan-out/fan-in over the cluster inventory
//!
//! Every cluster gets its own task. A slow, failing, or panicking cluster
//! affects only its own outcome; the dispatcher returns once every task has
//! finished.

use crate::client::ClusterError;
use crate::models::ClusterEndpoint;
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::any::Any;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct DispatchConfig {
    /// Upper bound for one cluster's task; `None` waits indefinitely
    pub deadline: Option<Duration>,
}

#[derive(Debug)]
pub struct ClusterOutcome<T> {
    pub cluster: ClusterEndpoint,
    pub result: Result<T, ClusterError>,
    pub elapsed: Duration,
}

pub struct Dispatcher {
    clusters: Vec<ClusterEndpoint>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(clusters: Vec<ClusterEndpoint>, config: DispatchConfig) -> Self {
        Self { clusters, config }
    }

    pub fn clusters(&self) -> &[ClusterEndpoint] {
        &self.clusters
    }

    /// Run `op` once per cluster, concurrently.
    ///
    /// `on_complete` sees each outcome as soon as its cluster finishes; the
    /// returned vector holds all of them in completion order.
    pub async fn dispatch<T, F, Fut>(
        &self,
        op: F,
        mut on_complete: impl FnMut(&ClusterOutcome<T>),
    ) -> Vec<ClusterOutcome<T>>
    where
        F: Fn(ClusterEndpoint) -> Fut,
        Fut: Future<Output = Result<T, ClusterError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut pending: FuturesUnordered<_> = self
            .clusters
            .iter()
            .cloned()
            .map(|cluster| {
                let started = Instant::now();
                let deadline = self.config.deadline;
                let task = op(cluster.clone());

                let handle = tokio::spawn(async move {
                    match deadline {
                        Some(limit) => tokio::time::timeout(limit, task)
                            .await
                            .unwrap_or(Err(ClusterError::TimedOut(limit))),
                        None => task.await,
                    }
                });

                async move {
                    let result = match handle.await {
                        Ok(result) => result,
                        Err(err) if err.is_panic() => {
                            Err(ClusterError::Aborted(panic_message(err.into_panic())))
                        }
                        Err(_) => Err(ClusterError::Aborted("task cancelled".to_string())),
                    };

                    ClusterOutcome {
                        cluster,
                        result,
                        elapsed: started.elapsed(),
                    }
                }
            })
            .collect();

        let mut outcomes = Vec::with_capacity(self.clusters.len());
        while let Some(outcome) = pending.next().await {
            match &outcome.result {
                Ok(_) => debug!(
                    cluster = %outcome.cluster.name,
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Cluster operation completed"
                ),
                Err(err) => warn!(
                    cluster = %outcome.cluster.name,
                    error = %err,
                    "Cluster operation failed"
                ),
            }
            on_complete(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}
