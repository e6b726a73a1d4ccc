//! `vigil conformance` -- run the storage conformance suite against the
//! in-memory backend and report the results. Exits nonzero on any
//! failure so it can gate CI for new backends.

use vigil_storage::conformance::run_conformance_suite;
use vigil_storage::MemoryStore;

use crate::OutputFormat;

/// Returns whether the whole suite passed.
pub(crate) async fn cmd_conformance(output: OutputFormat, quiet: bool) -> bool {
    let report = run_conformance_suite(|| async { MemoryStore::new() }).await;

    match output {
        OutputFormat::Json => {
            let failures = report
                .results
                .iter()
                .filter(|r| !r.passed)
                .map(|r| {
                    serde_json::json!({
                        "category": r.category,
                        "name": r.name,
                        "message": r.message,
                    })
                })
                .collect::<Vec<_>>();
            let doc = serde_json::json!({
                "passed": report.passed,
                "failed": report.failed,
                "total": report.total,
                "failures": failures,
            });
            match serde_json::to_string_pretty(&doc) {
                Ok(body) => println!("{body}"),
                Err(e) => eprintln!("error: {e}"),
            }
        }
        OutputFormat::Text => {
            if !quiet {
                for r in &report.results {
                    let verdict = if r.passed { "ok" } else { "FAIL" };
                    println!("  {verdict} [{}] {}", r.category, r.name);
                }
            }
            print!("{report}");
        }
    }

    report.failed == 0
}
