//! Pod log tails

use super::Context;
use crate::output::Render;
use agent_lib::logs::tail_lines;
use agent_lib::ClusterError;
use serde::Serialize;

/// Last lines of one pod's log on one cluster
#[derive(Debug, Serialize)]
pub struct LogTail {
    pub lines: Vec<String>,
}

impl LogTail {
    /// The stream is only trimmed once it has been fully reassembled.
    pub fn from_text(text: &str, count: usize) -> Self {
        Self {
            lines: tail_lines(text, count)
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl Render for LogTail {
    fn render(&self) -> String {
        if self.lines.is_empty() {
            return "(no log output)".to_string();
        }
        self.lines.join("\n")
    }
}

pub async fn logs(ctx: &Context, namespace: &str, name: &str, lines: usize) {
    let (namespace, name) = (namespace.to_string(), name.to_string());
    let title = match lines {
        0 => format!("Logs of {}/{}", namespace, name),
        n => format!("Logs of {}/{} (last {} lines)", namespace, name, n),
    };

    ctx.run(&title, move |mut client| {
        let (namespace, name) = (namespace.clone(), name.clone());
        async move {
            let text = client.pod_logs(&namespace, &name).await?;
            Ok::<_, ClusterError>(LogTail::from_text(&text, lines))
        }
    })
    .await;
}
