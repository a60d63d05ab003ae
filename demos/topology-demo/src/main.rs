//! A tiny harness for exercising `topology-dag` by hand: load a topology's
//! shape from JSON/YAML, wire up demo actions (echo for work nodes,
//! first-dependent for branching, auto-complete for suspension), run it,
//! and print the resulting snapshot. Not a production CLI/HTTP/IPC
//! surface; this is a manual-verification tool, same role `vwf-cli` plays
//! next to `vwf-core`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use topology_action::{ActionContext, ActionFuture, BranchOutcome, FnBranchAction, FnNodeAction};
use topology_dag::{
    resume_topology, run_topology, topology_from_spec, ActionRegistry, Event, FileSnapshotStore,
    NodeName, RegisteredAction, ResumeOptions, Snapshot, SnapshotStore, StartOptions,
    TopologySpec,
};

#[derive(Parser, Debug)]
#[command(name = "topology-demo", version, about = "DAG topology engine demo harness")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a topology shape file and print it back as pretty JSON.
    Show { topology: PathBuf },
    /// Run a topology with demo actions and print the final snapshot.
    Run {
        topology: PathBuf,
        /// JSON value fed as `data` to every dependency-free node.
        #[arg(long)]
        data: Option<String>,
        /// Write the final snapshot here, in addition to stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Resume a previously suspended or errored run from a saved snapshot.
    Resume {
        topology: PathBuf,
        snapshot: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn load_spec(path: &PathBuf) -> Result<TopologySpec> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_str(&text).context("parse topology json")
    } else {
        serde_yaml::from_str(&text).context("parse topology yaml")
    }
}

/// Direct dependents of `name`: every node whose declared deps include it.
fn direct_dependents(spec: &TopologySpec, name: &NodeName) -> Vec<NodeName> {
    spec.iter()
        .filter(|(_, shape)| shape.deps.contains(name))
        .map(|(n, _)| n.clone())
        .collect()
}

/// Build a demo action registry: work nodes echo their first input (or
/// their own name, if they have none), branching nodes deterministically
/// pick their first declared dependent (or `none` if they have none), and
/// suspension nodes carry no action at all. They complete immediately and
/// suspend their dependents, so a demo run of any topology with a
/// suspension node always stops there on its first `run`.
fn demo_actions(spec: &TopologySpec) -> ActionRegistry {
    let mut actions = ActionRegistry::new();
    for (name, shape) in spec {
        let entry = match shape.kind {
            topology_dag::NodeKind::Work => {
                let node_name = name.clone();
                RegisteredAction::Work(Arc::new(FnNodeAction::new(
                    move |ctx: ActionContext| -> ActionFuture<Result<Value>> {
                        let node_name = node_name.clone();
                        Box::pin(async move {
                            Ok(ctx
                                .data
                                .first()
                                .cloned()
                                .unwrap_or_else(|| Value::String(node_name.to_string())))
                        })
                    },
                )))
            }
            topology_dag::NodeKind::Branching => {
                let target = direct_dependents(spec, name).into_iter().next();
                RegisteredAction::Branching(Arc::new(FnBranchAction::new(
                    move |_ctx: &ActionContext| match &target {
                        Some(t) => BranchOutcome::branch(t.clone(), Some("demo default")),
                        None => BranchOutcome::none(Some("demo default")),
                    },
                )))
            }
            topology_dag::NodeKind::Suspension => RegisteredAction::Suspension(None),
        };
        actions.insert(name.clone(), entry);
    }
    actions
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<Event>) {
    while let Ok(event) = rx.recv().await {
        match event {
            Event::Data(_) => tracing::debug!("snapshot updated"),
            Event::Error(_) => tracing::warn!("run finalized with errors"),
            Event::Done(_) => tracing::info!("run finalized"),
        }
    }
}

fn print_snapshot(snapshot: &Snapshot, out: Option<&PathBuf>) -> Result<()> {
    let text = serde_json::to_string_pretty(snapshot)?;
    println!("{text}");
    if let Some(out) = out {
        FileSnapshotStore::new(out).save(snapshot)?;
        eprintln!("wrote {}", out.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Show { topology } => {
            let spec = load_spec(&topology)?;
            println!("{}", serde_json::to_string_pretty(&spec)?);
            Ok(())
        }
        Cmd::Run { topology, data, out } => {
            let spec = load_spec(&topology)?;
            let actions = demo_actions(&spec);
            let built = topology_from_spec(&spec, actions)?;

            let initial_data = data
                .map(|raw| serde_json::from_str::<Value>(&raw))
                .transpose()
                .context("parse --data as json")?;

            let handle = run_topology(
                built,
                StartOptions {
                    data: initial_data,
                    context: None,
                    filter: Default::default(),
                },
            )?;
            tokio::spawn(print_events(handle.events()));

            let result = handle.wait().await;
            print_snapshot(&handle.get_snapshot(), out.as_ref())?;
            if let Err(err) = result {
                return Err(anyhow::Error::new(err));
            }
            Ok(())
        }
        Cmd::Resume {
            topology,
            snapshot,
            out,
        } => {
            let spec = load_spec(&topology)?;
            let actions = demo_actions(&spec);
            let built = topology_from_spec(&spec, actions)?;

            let store = FileSnapshotStore::new(&snapshot);
            let loaded = store
                .load()
                .context("load snapshot")?
                .context("no snapshot found at that path")?;

            let handle = resume_topology(built, Some(&loaded), ResumeOptions::default())?;
            tokio::spawn(print_events(handle.events()));

            let result = handle.wait().await;
            print_snapshot(&handle.get_snapshot(), out.as_ref())?;
            if let Err(err) = result {
                return Err(anyhow::Error::new(err));
            }
            Ok(())
        }
    }
}
