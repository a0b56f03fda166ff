use std::fmt;

use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AuditPlan;
use crate::error::PlexError;
use crate::feature::Feature;
use crate::plex::{MediaServer, PlexClient};
use crate::walker::{WalkOutcome, Walker};

/// Phase of a pass, reported when the pass fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Connecting,
    Running,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Connecting => f.write_str("connecting"),
            RunState::Running => f.write_str("running"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LibraryResult {
    pub library: String,
    pub outcome: WalkOutcome,
}

/// Outcome of one feature across every library.
#[derive(Debug, Clone)]
pub struct FeatureReport {
    pub feature: Feature,
    pub libraries: Vec<LibraryResult>,
}

impl FeatureReport {
    pub fn missing(&self) -> usize {
        self.libraries.iter().map(|l| l.outcome.missing()).sum()
    }

    /// Libraries that were actually traversed.
    pub fn audited(&self) -> usize {
        self.libraries
            .iter()
            .filter(|l| matches!(l.outcome, WalkOutcome::Audited { .. }))
            .count()
    }
}

/// Summary of a single pass. Dropped once logged; never persisted.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub features: Vec<FeatureReport>,
}

impl RunReport {
    pub fn total_missing(&self) -> usize {
        self.features.iter().map(|f| f.missing()).sum()
    }

    pub fn feature(&self, feature: Feature) -> Option<&FeatureReport> {
        self.features.iter().find(|f| f.feature == feature)
    }
}

/// Audit every library for every enabled feature.
///
/// The library list is fetched once and reused for every feature.
pub async fn audit<S>(server: &S, plan: &AuditPlan, run_id: Uuid) -> Result<RunReport, PlexError>
where
    S: MediaServer + ?Sized,
{
    let libraries = server.libraries().await?;
    info!("[{}] Found {} libraries", run_id, libraries.len());

    let walker = Walker::new(server, &plan.skip_types, &plan.skip_names);
    let mut features = Vec::with_capacity(plan.features.len());

    for &feature in &plan.features {
        info!("[{}] Checking libraries for missing {}", run_id, feature);
        let mut results = Vec::with_capacity(libraries.len());
        for library in &libraries {
            let outcome = walker.walk(library, feature).await?;
            results.push(LibraryResult {
                library: library.title.clone(),
                outcome,
            });
        }
        let report = FeatureReport {
            feature,
            libraries: results,
        };
        info!(
            "[{}] Finished {}: {} missing across {} audited libraries",
            run_id,
            feature,
            report.missing(),
            report.audited()
        );
        features.push(report);
    }

    Ok(RunReport { run_id, features })
}

/// Connect, audit, and log a summary. Failures are logged and absorbed so
/// the scheduler can try again at the next run.
pub async fn run_pass(plan: &AuditPlan) -> Option<RunReport> {
    let run_id = Uuid::new_v4();
    let started = Utc::now();
    info!("[{}] Starting audit of {}", run_id, plan.server_url);

    let client = match PlexClient::connect(&plan.server_url, &plan.token, plan.timeout).await {
        Ok((client, identity)) => {
            info!(
                "[{}] Connected to {} (version {})",
                run_id,
                identity.friendly_name.as_deref().unwrap_or("Plex Media Server"),
                identity.version.as_deref().unwrap_or("unknown")
            );
            client
        }
        Err(e) => {
            report_failure(run_id, RunState::Connecting, e);
            return None;
        }
    };

    match audit(&client, plan, run_id).await {
        Ok(report) => {
            log_summary(&report, Utc::now() - started);
            Some(report)
        }
        Err(e) => {
            report_failure(run_id, RunState::Running, e);
            None
        }
    }
}

fn report_failure(run_id: Uuid, state: RunState, err: PlexError) {
    let err = anyhow::Error::new(err).context(format!("audit run {} failed while {}", run_id, state));
    error!("{:#}", err);
    debug!("{:?}", err);
}

fn log_summary(report: &RunReport, elapsed: chrono::Duration) {
    info!(
        "[{}] Audit complete in {}",
        report.run_id,
        format_duration(elapsed)
    );
    for feature in &report.features {
        for lib in &feature.libraries {
            match lib.outcome {
                WalkOutcome::Skipped(reason) => {
                    debug!("  {} / {}: skipped ({})", feature.feature, lib.library, reason.describe())
                }
                WalkOutcome::Audited { checked, missing } => info!(
                    "  {} / {}: {} missing of {} checked",
                    feature.feature, lib.library, missing, checked
                ),
            }
        }
        if feature.missing() > 0 {
            warn!(
                "[{}] {} missing {} in total",
                report.run_id,
                feature.missing(),
                feature.feature
            );
        } else {
            info!("[{}] No missing {}", report.run_id, feature.feature);
        }
    }
}

fn format_duration(d: chrono::Duration) -> String {
    let hours = d.num_hours();
    let minutes = d.num_minutes() % 60;
    let seconds = d.num_seconds() % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}
