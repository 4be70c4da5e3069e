//! Node and pod reads

use super::Context;
use crate::output::{Render, Rows};
use agent_lib::proto::{NodeInfo, NodeSummary, PodInfo, PodSummary};
use agent_lib::ClusterError;
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize)]
pub struct NodeDetail {
    pub name: String,
    pub internal_ip: String,
    pub arch: String,
    pub kernel_version: String,
}

impl From<NodeInfo> for NodeDetail {
    fn from(node: NodeInfo) -> Self {
        Self {
            name: node.name,
            internal_ip: node.internal_ip,
            arch: node.arch,
            kernel_version: node.kernel_version,
        }
    }
}

impl Render for NodeDetail {
    fn render(&self) -> String {
        format!(
            "Name:           {}\nInternal IP:    {}\nArchitecture:   {}\nKernel Version: {}",
            self.name, self.internal_ip, self.arch, self.kernel_version
        )
    }
}

/// Row for the node list table
#[derive(Debug, Serialize, Tabled)]
pub struct NodeRow {
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "INTERNAL-IP")]
    pub internal_ip: String,
}

impl From<NodeSummary> for NodeRow {
    fn from(node: NodeSummary) -> Self {
        Self {
            name: node.name,
            internal_ip: node.internal_ip,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PodDetail {
    pub name: String,
    pub namespace: String,
    pub phase: String,
    pub status: String,
    pub label: String,
    pub image: String,
}

impl From<PodInfo> for PodDetail {
    fn from(pod: PodInfo) -> Self {
        Self {
            name: pod.name,
            namespace: pod.namespace,
            phase: pod.phase,
            status: pod.status,
            label: pod.label,
            image: pod.image,
        }
    }
}

impl Render for PodDetail {
    fn render(&self) -> String {
        format!(
            "Name:      {}\nNamespace: {}\nPhase:     {}\nStatus:    {}\nApp:       {}\nImage:     {}",
            self.name,
            self.namespace,
            self.phase,
            self.status,
            or_none(&self.label),
            or_none(&self.image)
        )
    }
}

/// Row for the pod list table
#[derive(Debug, Serialize, Tabled)]
pub struct PodRow {
    #[tabled(rename = "NAME")]
    pub name: String,
    #[tabled(rename = "NAMESPACE")]
    pub namespace: String,
    #[tabled(rename = "PHASE")]
    pub phase: String,
    #[tabled(rename = "STATUS")]
    pub status: String,
}

impl From<PodSummary> for PodRow {
    fn from(pod: PodSummary) -> Self {
        Self {
            name: pod.name,
            namespace: pod.namespace,
            phase: pod.phase,
            status: pod.status,
        }
    }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() {
        "<none>"
    } else {
        value
    }
}

pub async fn node(ctx: &Context, name: &str) {
    let name = name.to_string();
    ctx.run(&format!("Node {}", name), move |mut client| {
        let name = name.clone();
        async move { client.get_node(&name).await.map(NodeDetail::from) }
    })
    .await;
}

pub async fn nodes(ctx: &Context) {
    ctx.run("Nodes", |mut client| async move {
        let nodes = client.get_nodes().await?;
        Ok::<_, ClusterError>(Rows(nodes.into_iter().map(NodeRow::from).collect()))
    })
    .await;
}

pub async fn pod(ctx: &Context, namespace: &str, name: &str) {
    let (namespace, name) = (namespace.to_string(), name.to_string());
    ctx.run(&format!("Pod {}/{}", namespace, name), move |mut client| {
        let (namespace, name) = (namespace.clone(), name.clone());
        async move {
            client
                .get_pod(&namespace, &name)
                .await
                .map(PodDetail::from)
        }
    })
    .await;
}

pub async fn pods(ctx: &Context, namespace: &str) {
    let namespace = namespace.to_string();
    ctx.run(&format!("Pods in {}", namespace), move |mut client| {
        let namespace = namespace.clone();
        async move {
            let pods = client.get_pods(&namespace).await?;
            Ok::<_, ClusterError>(Rows(pods.into_iter().map(PodRow::from).collect()))
        }
    })
    .await;
}
