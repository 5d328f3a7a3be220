//! Snapgate CLI
//!
//! The `snapgate` command replays PipelineRun completions against a store
//! loaded from a JSON fixture, the same way the controller reacts to them.
//!
//! ## Commands
//!
//! - `reconcile`: Handle one completed PipelineRun and print the outcome
//! - `digest`: Show the content digest and canonical name of a Snapshot

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};

use snapgate_core::{
    canonical_components, snapshot_digest, snapshot_name, OperationResult, Reconciler,
    ReconcilerConfig,
};
use snapgate_state::fakes::MemoryObjectStore;
use snapgate_state::{
    Application, Component, PipelineRun, Resource, Snapshot, StoredObject, TestScenario,
};

#[derive(Parser)]
#[command(name = "snapgate")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Snapshot matching and test verdicts for build pipelines", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle one completed PipelineRun from a fixture
    Reconcile {
        /// Path to the store fixture (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Name of the PipelineRun to handle
        #[arg(short, long)]
        pipeline_run: String,

        /// Namespace of the PipelineRun
        #[arg(short, long, default_value = "default")]
        namespace: String,

        /// Write the resulting store contents to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the content digest of a Snapshot's components
    Digest {
        /// Path to the store fixture (JSON)
        #[arg(short, long)]
        fixture: PathBuf,

        /// Name of the Snapshot
        #[arg(short, long)]
        snapshot: String,

        /// Namespace of the Snapshot
        #[arg(short, long, default_value = "default")]
        namespace: String,
    },
}

/// Store contents as read from and written to disk.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Fixture {
    #[serde(default)]
    objects: Vec<StoredObject>,
}

impl Fixture {
    fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {:?}", path))?;
        serde_json::from_str(&data).with_context(|| format!("Failed to parse fixture {:?}", path))
    }

    fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data).with_context(|| format!("Failed to write fixture {:?}", path))
    }

    fn into_store(self) -> MemoryObjectStore {
        MemoryObjectStore::with_objects(self.objects)
    }

    fn from_store(store: &MemoryObjectStore) -> Self {
        let mut objects: Vec<StoredObject> = Vec::new();
        objects.extend(store.all::<Application>().into_iter().map(Resource::into_object));
        objects.extend(store.all::<Component>().into_iter().map(Resource::into_object));
        objects.extend(store.all::<TestScenario>().into_iter().map(Resource::into_object));
        objects.extend(store.all::<Snapshot>().into_iter().map(Resource::into_object));
        objects.extend(store.all::<PipelineRun>().into_iter().map(Resource::into_object));
        Self { objects }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    snapgate_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Reconcile {
            fixture,
            pipeline_run,
            namespace,
            output,
        } => cmd_reconcile(&fixture, &namespace, &pipeline_run, output.as_deref()).await,
        Commands::Digest {
            fixture,
            snapshot,
            namespace,
        } => cmd_digest(&fixture, &namespace, &snapshot),
    }
}

async fn cmd_reconcile(
    fixture: &Path,
    namespace: &str,
    pipeline_run: &str,
    output: Option<&Path>,
) -> Result<()> {
    let config = ReconcilerConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("Invalid reconciler configuration")?;
    let store = Arc::new(Fixture::load(fixture)?.into_store());
    let run: PipelineRun = store
        .peek(namespace, pipeline_run)
        .with_context(|| format!("PipelineRun {}/{} not in fixture", namespace, pipeline_run))?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let reconciler = Reconciler::new(store.clone(), config);
    let result = reconciler.handle(&run, cancel).await;
    info!(pipeline_run = %run.metadata.name, result = result.label(), "event handled");

    print_result(&result);
    print_snapshots(&store, &reconciler.config().verdict_condition_type);

    if let Some(path) = output {
        Fixture::from_store(&store).save(path)?;
        println!("Wrote store contents to {:?}", path);
    }

    if let Some(err) = result.error() {
        bail!("event would be redelivered: {}", err);
    }
    Ok(())
}

fn cmd_digest(fixture: &Path, namespace: &str, name: &str) -> Result<()> {
    let store = Fixture::load(fixture)?.into_store();
    let snapshot: Snapshot = store
        .peek(namespace, name)
        .with_context(|| format!("Snapshot {}/{} not in fixture", namespace, name))?;

    let digest = snapshot_digest(&snapshot.spec.components);
    let canonical = snapshot_name(&snapshot.spec.application, &digest);
    println!("Components: {}", canonical_components(&snapshot.spec.components));
    println!("Digest:     {}", digest);
    println!("Canonical:  {}", canonical);
    if canonical != snapshot.metadata.name {
        println!("Note: stored name {} is not content-addressed", snapshot.metadata.name);
    }
    Ok(())
}

fn print_result(result: &OperationResult) {
    match result.cause() {
        Some(cause) => println!("Result: {} ({})", result.label(), cause),
        None => println!("Result: {}", result.label()),
    }
}

fn print_snapshots(store: &MemoryObjectStore, verdict_condition: &str) {
    let snapshots = store.all::<Snapshot>();
    if snapshots.is_empty() {
        println!("No snapshots.");
        return;
    }
    for snapshot in snapshots {
        let verdict = snapshot
            .condition(verdict_condition)
            .map(|c| format!("{:?} ({})", c.status, c.reason))
            .unwrap_or_else(|| "pending".to_string());
        println!(
            "{}/{}  app={}  {}={}",
            snapshot.metadata.namespace,
            snapshot.metadata.name,
            snapshot.spec.application,
            verdict_condition,
            verdict
        );
        for component in &snapshot.spec.components {
            println!("    {} = {}", component.name, component.container_image);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use snapgate_state::{labels, ConditionStatus, PipelineType, TaskResult};

    fn build_fixture() -> Fixture {
        let run = PipelineRun::new("default", "build-1", PipelineType::Build)
            .with_label(labels::COMPONENT, "A")
            .with_task_result(TaskResult::new("IMAGE_URL", "quay.io/org/a:v1"))
            .with_task_result(TaskResult::new("IMAGE_DIGEST", "sha256:abc"))
            .completed(true, fixed_timestamp());
        Fixture {
            objects: vec![
                Application::new("default", "app1").into_object(),
                Component::new("default", "A", "app1").into_object(),
                run.into_object(),
            ],
        }
    }

    fn fixed_timestamp() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_fixture_parses_tagged_objects() {
        let data = r#"{
            "objects": [
                {"kind": "Application", "metadata": {"name": "app1", "namespace": "default"}},
                {"kind": "Component",
                 "metadata": {"name": "A", "namespace": "default"},
                 "spec": {"application": "app1"},
                 "status": {"container_image": "quay.io/org/a@sha256:1"}}
            ]
        }"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.json");
        std::fs::write(&path, data).unwrap();

        let store = Fixture::load(&path).unwrap().into_store();
        let component: Component = store.peek("default", "A").unwrap();
        assert_eq!(component.spec.application, "app1");
        assert_eq!(
            component.status.container_image.as_deref(),
            Some("quay.io/org/a@sha256:1")
        );
    }

    #[test]
    fn test_fixture_load_reports_path() {
        let err = Fixture::load(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert!(err.to_string().contains("fixture.json"));
    }

    #[tokio::test]
    async fn test_cmd_reconcile_writes_snapshot_to_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        build_fixture().save(&input).unwrap();

        cmd_reconcile(&input, "default", "build-1", Some(output.as_path()))
            .await
            .unwrap();

        let store = Fixture::load(&output).unwrap().into_store();
        let snapshots = store.all::<Snapshot>();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(
            snapshots[0].spec.components[0].container_image,
            "quay.io/org/a@sha256:abc"
        );
        assert!(cmd_digest(&output, "default", &snapshots[0].metadata.name).is_ok());
    }

    #[tokio::test]
    async fn test_cmd_reconcile_records_stop_on_pipeline_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.json");
        let orphan = PipelineRun::new("default", "test-1", PipelineType::Test)
            .completed(true, fixed_timestamp());
        Fixture {
            objects: vec![orphan.into_object()],
        }
        .save(&input)
        .unwrap();

        cmd_reconcile(&input, "default", "test-1", Some(output.as_path()))
            .await
            .unwrap();

        let store = Fixture::load(&output).unwrap().into_store();
        let run: PipelineRun = store.peek("default", "test-1").unwrap();
        assert_eq!(run.status.conditions[0].status, ConditionStatus::False);
        assert_eq!(run.status.conditions[0].reason, "MissingSnapshot");
    }

    #[tokio::test]
    async fn test_cmd_reconcile_unknown_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        build_fixture().save(&input).unwrap();

        let err = cmd_reconcile(&input, "default", "missing", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("default/missing"));
    }
}
