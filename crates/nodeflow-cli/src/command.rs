//! Implementations of the `validate` and `run` commands.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use nodeflow_runtime::definition::GraphDocument;
use nodeflow_runtime::engine::{ExecuteOptions, ExecutionReport};
use nodeflow_runtime::graph::Graph;
use nodeflow_runtime::node::NodeRegistry;
use nodeflow_runtime::Error;
use tokio_util::sync::CancellationToken;

use crate::TRACING_TARGET_COMMAND;
use crate::config::RunArgs;

/// Size of a loaded graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub name: Option<String>,
    pub nodes: usize,
    pub links: usize,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} node(s), {} link(s)",
            self.name.as_deref().unwrap_or("unnamed graph"),
            self.nodes,
            self.links
        )
    }
}

/// Loads a document and builds its graph from the built-in node types.
pub async fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = GraphDocument::from_json(&json)
        .with_context(|| format!("{} is not a graph document", path.display()))?;

    let graph = Graph::from_document(&document, &NodeRegistry::with_builtins())
        .with_context(|| format!("failed to load {}", path.display()))?;

    tracing::debug!(
        target: TRACING_TARGET_COMMAND,
        path = %path.display(),
        nodes = graph.node_count(),
        links = graph.link_count(),
        "graph loaded"
    );
    Ok(graph)
}

/// Checks that a document loads.
pub async fn validate(path: &Path) -> anyhow::Result<Summary> {
    let graph = load_graph(path).await?;
    Ok(Summary {
        name: graph.metadata.name.clone(),
        nodes: graph.node_count(),
        links: graph.link_count(),
    })
}

/// Loads a document and executes it once.
///
/// Node failures are printed one per line before the error is returned.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> anyhow::Result<ExecutionReport> {
    let config = args.engine_config()?;
    let graph = load_graph(&args.file).await?;

    tracing::info!(
        target: TRACING_TARGET_COMMAND,
        path = %args.file.display(),
        parameters = args.params.len(),
        "running graph"
    );

    let options = ExecuteOptions::new()
        .with_parameters(args.parameters())
        .with_cancellation(cancel);

    match graph.create_executor_with(config).execute(options).await {
        Ok(report) => Ok(report),
        Err(Error::Execution(aggregate)) => {
            for failure in &aggregate.failures {
                eprintln!("  {failure}");
            }
            Err(Error::Execution(aggregate)).context("graph execution failed")
        }
        Err(error) => Err(error).context("graph execution failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use nodeflow_runtime::definition::GraphMetadata;
    use nodeflow_runtime::nodes::{ForLoop, Parameter, Sequence, Start};

    use super::*;

    fn write_document(graph: &Graph) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let json = graph.to_document().unwrap().to_json_pretty().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn run_args(file: &tempfile::NamedTempFile, params: Vec<(String, serde_json::Value)>) -> RunArgs {
        RunArgs {
            file: file.path().to_path_buf(),
            params,
            max_concurrency: Some(2),
            node_timeout_ms: None,
        }
    }

    fn loop_graph() -> Graph {
        let mut graph = Graph::new();
        graph.metadata = GraphMetadata::new().with_name("loop");
        let start = graph.add_node(Start);
        let looping = graph.add_node(ForLoop::new(3));
        let sequence = graph.add_node(Sequence);
        assert!(graph.connect_exec(start, 0, looping, 0));
        assert!(graph.connect_exec(looping, 0, sequence, 0));
        assert!(graph.connect_exec(sequence, 1, looping, 0));
        graph
    }

    #[tokio::test]
    async fn test_validate_reports_size() {
        let file = write_document(&loop_graph());

        let summary = validate(file.path()).await.unwrap();
        assert_eq!(
            summary,
            Summary {
                name: Some("loop".to_owned()),
                nodes: 3,
                links: 3,
            }
        );
        assert_eq!(summary.to_string(), "loop: 3 node(s), 3 link(s)");
    }

    #[tokio::test]
    async fn test_validate_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        assert!(validate(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_run_executes_loop() {
        let file = write_document(&loop_graph());

        let report = run(&run_args(&file, Vec::new()), CancellationToken::new())
            .await
            .unwrap();
        // start + 4 loop entries + 3 sequence runs
        assert_eq!(report.total_runs(), 8);
    }

    #[tokio::test]
    async fn test_run_reports_missing_parameter() {
        let mut graph = Graph::new();
        graph.add_node(Parameter::new("limit"));
        let file = write_document(&graph);

        let error = run(&run_args(&file, Vec::new()), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<Error>(),
            Some(Error::Execution(_))
        ));

        let params = vec![("limit".to_owned(), serde_json::json!(5))];
        run(&run_args(&file, params), CancellationToken::new())
            .await
            .unwrap();
    }
}
