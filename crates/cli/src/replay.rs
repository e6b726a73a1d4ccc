//! `vigil replay` -- feed a recorded result stream through the full
//! engine (worker, archive, hook) against in-memory backends and report
//! what happened. Useful for reproducing hysteresis behavior from
//! captured production traffic.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use vigil_archive::MemoryArchive;
use vigil_core::{Check, CheckResult, StateId};
use vigil_engine::{
    ChannelAlertSink, Consumer, ConsumerOutcome, SnapshotAlertHook, WorkerOutcome,
};
use vigil_storage::{CheckStore, MemoryStore};

use crate::OutputFormat;

#[derive(Serialize)]
struct ReplayReport {
    results_replayed: usize,
    discarded: usize,
    stale: usize,
    unknown_check: usize,
    transitions: Vec<TransitionRecord>,
    alerts: Vec<AlertRecord>,
    final_states: Vec<FinalState>,
}

#[derive(Serialize)]
struct TransitionRecord {
    check_id: String,
    from: StateId,
    to: StateId,
}

#[derive(Serialize)]
struct AlertRecord {
    check_id: String,
    state: StateId,
    bastion_id: String,
}

#[derive(Serialize)]
struct FinalState {
    check_id: String,
    state: StateId,
    failing_count: i32,
    response_count: i32,
}

pub(crate) async fn cmd_replay(
    checks_path: &Path,
    results_path: &Path,
    output: OutputFormat,
    quiet: bool,
) -> Result<(), String> {
    let checks: Vec<Check> = read_json(checks_path)?;
    let results: Vec<CheckResult> = read_json(results_path)?;

    let store = Arc::new(MemoryStore::new());
    for check in &checks {
        store
            .put_check(check.clone())
            .await
            .map_err(|e| e.to_string())?;
    }
    let archive = Arc::new(MemoryArchive::new());
    let (sink, mut alerts_rx) = ChannelAlertSink::new();
    let hook = SnapshotAlertHook::new(Arc::clone(&store), Arc::clone(&archive), sink);
    let consumer = Consumer::new(Arc::clone(&store), Arc::clone(&archive), hook);

    let mut transitions = Vec::new();
    let mut discarded = 0;
    let mut stale = 0;
    let mut unknown_check = 0;

    for result in &results {
        let payload = serde_json::to_vec(result).map_err(|e| e.to_string())?;
        match consumer
            .handle_message(&payload)
            .await
            .map_err(|e| e.to_string())?
        {
            ConsumerOutcome::Discarded => discarded += 1,
            ConsumerOutcome::Handled(WorkerOutcome::StaleResult) => stale += 1,
            ConsumerOutcome::Handled(WorkerOutcome::CheckNotFound) => unknown_check += 1,
            ConsumerOutcome::Handled(WorkerOutcome::Completed(change)) => {
                if change.changed() {
                    transitions.push(TransitionRecord {
                        check_id: change.check_id,
                        from: change.from,
                        to: change.to,
                    });
                }
            }
        }
    }

    let mut alerts = Vec::new();
    while let Ok(alert) = alerts_rx.try_recv() {
        alerts.push(AlertRecord {
            check_id: alert.check_id,
            state: alert.state,
            bastion_id: alert.result.bastion_id,
        });
    }

    let mut final_states = Vec::new();
    for check in &checks {
        let state = store
            .get_state(&check.customer_id, &check.id)
            .await
            .map_err(|e| e.to_string())?;
        if let Some(state) = state {
            final_states.push(FinalState {
                check_id: check.id.clone(),
                state: state.id,
                failing_count: state.failing_count,
                response_count: state.response_count,
            });
        }
    }

    let report = ReplayReport {
        results_replayed: results.len(),
        discarded,
        stale,
        unknown_check,
        transitions,
        alerts,
        final_states,
    };

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?
        ),
        OutputFormat::Text => print_text(&report, quiet),
    }
    Ok(())
}

fn print_text(report: &ReplayReport, quiet: bool) {
    if !quiet {
        println!(
            "replayed {} results ({} stale, {} discarded, {} for unknown checks)",
            report.results_replayed, report.stale, report.discarded, report.unknown_check
        );
        for t in &report.transitions {
            println!("transition: {} {} -> {}", t.check_id, t.from, t.to);
        }
        for a in &report.alerts {
            println!("alert: {} {} (bastion {})", a.check_id, a.state, a.bastion_id);
        }
    }
    for s in &report.final_states {
        println!(
            "{} {} failing {}/{}",
            s.check_id, s.state, s.failing_count, s.response_count
        );
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let data = fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    serde_json::from_slice(&data).map_err(|e| format!("{}: {e}", path.display()))
}
