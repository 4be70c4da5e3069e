//! Command implementations
//!
//! Each command builds one request and sends it to every cluster in the
//! inventory through the dispatcher.

pub mod get;
pub mod logs;
pub mod manifest;

use crate::output::{self, OutputFormat, Render};
use agent_lib::{
    AgentClient, ClientConfig, ClientConfigBuilder, ClusterEndpoint, ClusterError,
    ClusterOutcome, DispatchConfig, Dispatcher,
};
use std::future::Future;
use std::time::Duration;

/// Everything one invocation needs, fixed before anything is dispatched
pub struct Context {
    dispatcher: Dispatcher,
    client: ClientConfig,
    format: OutputFormat,
}

impl Context {
    pub fn new(clusters: Vec<ClusterEndpoint>, timeout: Option<Duration>, format: OutputFormat) -> Self {
        let client = match timeout {
            Some(limit) => ClientConfigBuilder::new().request_timeout(limit).build(),
            None => ClientConfig::default(),
        };

        Self {
            dispatcher: Dispatcher::new(clusters, DispatchConfig { deadline: timeout }),
            client,
            format,
        }
    }

    /// Connect to every cluster and run `call` against it. Each cluster's
    /// block is printed as soon as that cluster finishes.
    pub async fn run<T, F, Fut>(&self, title: &str, call: F) -> Vec<ClusterOutcome<T>>
    where
        T: Render + Send + 'static,
        F: Fn(AgentClient) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, ClusterError>> + Send + 'static,
    {
        let clusters = self.dispatcher.clusters().len();
        output::print_header(
            &format!("{} ({} cluster{})", title, clusters, if clusters == 1 { "" } else { "s" }),
            self.format,
        );

        let format = self.format;
        let client_config = self.client.clone();
        self.dispatcher
            .dispatch(
                move |cluster| {
                    let client_config = client_config.clone();
                    let call = call.clone();
                    async move {
                        let client = AgentClient::connect(&cluster, &client_config).await?;
                        call(client).await
                    }
                },
                |outcome| output::write_block(&output::render_outcome(outcome, format)),
            )
            .await
    }
}
