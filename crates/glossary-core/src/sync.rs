//! Top-down synchronization of an ordered hierarchy against the remote catalog.

use crate::hierarchy::{self, OrderedHierarchy};
use crate::matcher::find_existing;
use crate::{
    LocationMap, OverwritePrompt, RemoteIndex, RemoteTermService, Result,
    ServiceResult, TermPayload, TermRecord,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// What to do with a term that already exists remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverwritePolicy {
    /// Replace the remote term with the input definition
    #[default]
    Always,
    /// Leave the remote term untouched
    Never,
    /// Ask an [`OverwritePrompt`] per term
    Prompt,
}

/// What to do after a remote call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep going; descendants of the failed term are reported as unresolvable
    #[default]
    Continue,
    /// Stop the run after the batch containing the failure
    Abort,
}

impl FromStr for OverwritePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" | "true" | "yes" => Ok(Self::Always),
            "never" | "false" | "no" => Ok(Self::Never),
            "prompt" | "ask" => Ok(Self::Prompt),
            other => Err(format!(
                "Invalid overwrite policy: {other}. Must be one of: always, never, prompt"
            )),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(format!(
                "Invalid failure policy: {other}. Must be one of: continue, abort"
            )),
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverwritePolicy::Always => write!(f, "always"),
            OverwritePolicy::Never => write!(f, "never"),
            OverwritePolicy::Prompt => write!(f, "prompt"),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Continue => write!(f, "continue"),
            FailurePolicy::Abort => write!(f, "abort"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    pub overwrite: OverwritePolicy,
    pub on_error: FailurePolicy,
    /// Sibling terms sent to the service at once. `1` is fully sequential.
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            overwrite: OverwritePolicy::Always,
            on_error: FailurePolicy::Continue,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TermOutcome {
    Created { location: String },
    Updated { location: String },
    /// Already present remotely and left as is
    Kept { location: String },
    Failed { error: String },
    /// Never sent because its parent has no remote location
    Unresolvable { parent_id: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct TermReport {
    pub id: String,
    pub name_path: Vec<String>,
    #[serde(flatten)]
    pub outcome: TermOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub created: usize,
    pub updated: usize,
    pub kept: usize,
    pub failed: usize,
    pub unresolvable: usize,
    pub not_processed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub terms: Vec<TermReport>,
    pub locations: LocationMap,
    pub cancelled: bool,
    pub aborted: bool,
    /// Terms in the input that the run never reached
    pub not_processed: usize,
}

impl SyncReport {
    pub fn summary(&self) -> SyncSummary {
        let mut summary = SyncSummary {
            not_processed: self.not_processed,
            ..SyncSummary::default()
        };
        for term in &self.terms {
            match term.outcome {
                TermOutcome::Created { .. } => summary.created += 1,
                TermOutcome::Updated { .. } => summary.updated += 1,
                TermOutcome::Kept { .. } => summary.kept += 1,
                TermOutcome::Failed { .. } => summary.failed += 1,
                TermOutcome::Unresolvable { .. } => summary.unresolvable += 1,
            }
        }
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = &TermReport> {
        self.terms
            .iter()
            .filter(|t| matches!(t.outcome, TermOutcome::Failed { .. }))
    }

    /// True when every term reached the catalog.
    pub fn is_complete(&self) -> bool {
        let summary = self.summary();
        !self.cancelled
            && !self.aborted
            && summary.failed == 0
            && summary.unresolvable == 0
            && summary.not_processed == 0
    }
}

enum RemoteCall {
    Create(TermPayload),
    Update { location: String, payload: TermPayload },
}

struct BatchOutcome {
    processed: usize,
    failed: bool,
}

enum Step {
    Done(TermOutcome),
    Call(RemoteCall),
}

/// Publishes terms parent-first, translating input identifiers into remote locations.
pub struct Synchronizer {
    service: Arc<dyn RemoteTermService>,
    options: SyncOptions,
    prompt: Option<Arc<dyn OverwritePrompt>>,
    cancel: CancellationToken,
}

impl Synchronizer {
    pub fn new(service: Arc<dyn RemoteTermService>, options: SyncOptions) -> Self {
        Self {
            service,
            options,
            prompt: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_prompt(mut self, prompt: Arc<dyn OverwritePrompt>) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Orders `records`, snapshots the remote hierarchy and runs [`Self::run`].
    ///
    /// Hierarchy validation and the remote listing happen before any write; a failure in
    /// either is returned as an error.
    pub async fn sync_records(&self, records: Vec<TermRecord>) -> Result<SyncReport> {
        let hierarchy = hierarchy::order(records)?;
        let remote = self.service.list_all().await?;
        info!(
            "Found {} existing glossary terms, {} terms to publish",
            remote.len(),
            hierarchy.len()
        );
        let index = RemoteIndex::build(&remote);
        Ok(self.run(&hierarchy, &index).await)
    }

    /// Publishes every term of `hierarchy`, matching against the pre-run `index`.
    pub async fn run(&self, hierarchy: &OrderedHierarchy, index: &RemoteIndex) -> SyncReport {
        let mut report = SyncReport::default();
        let batch_size = self.options.concurrency.max(1);
        let mut visited = 0usize;

        'levels: for level in hierarchy.levels() {
            for batch in level.chunks(batch_size) {
                if self.cancel.is_cancelled() {
                    warn!("Synchronization cancelled, {} terms left", hierarchy.len() - visited);
                    report.cancelled = true;
                    break 'levels;
                }

                let outcome = self.run_batch(batch, hierarchy, index, &mut report).await;
                visited += outcome.processed;

                if outcome.processed < batch.len() {
                    warn!("Synchronization cancelled, {} terms left", hierarchy.len() - visited);
                    report.cancelled = true;
                    break 'levels;
                }

                if outcome.failed && self.options.on_error == FailurePolicy::Abort {
                    warn!("Aborting synchronization after failure");
                    report.aborted = true;
                    break 'levels;
                }
            }
        }

        report.not_processed = hierarchy.len() - visited;
        report
    }

    /// Plans the terms of `batch` in order, issues the remote calls together and
    /// records the results.
    ///
    /// Planning may ask the overwrite prompt, so cancellation is checked before each
    /// term; terms after a cancellation are neither planned nor sent.
    async fn run_batch(
        &self,
        batch: &[TermRecord],
        hierarchy: &OrderedHierarchy,
        index: &RemoteIndex,
        report: &mut SyncReport,
    ) -> BatchOutcome {
        let paths: Vec<Vec<String>> = batch.iter().map(|t| hierarchy.name_path(&t.id)).collect();
        let mut steps: Vec<Step> = Vec::with_capacity(batch.len());
        for (term, path) in batch.iter().zip(&paths) {
            if self.cancel.is_cancelled() {
                break;
            }
            steps.push(self.plan(term, path, index, &report.locations));
        }
        let processed = steps.len();

        let calls = steps.iter().filter_map(|step| match step {
            Step::Call(call) => Some(self.execute(call)),
            Step::Done(_) => None,
        });
        let mut results = join_all(calls).await.into_iter();

        let mut failed = false;
        for ((term, name_path), step) in batch.iter().zip(paths).zip(steps) {
            let outcome = match step {
                Step::Done(outcome) => outcome,
                Step::Call(call) => match results.next() {
                    Some(Ok(location)) => match call {
                        RemoteCall::Create(_) => {
                            info!("Published glossary term: {}, term url: {}", term.name, location);
                            TermOutcome::Created { location }
                        }
                        RemoteCall::Update { .. } => {
                            info!("Updated glossary term: {}, term url: {}", term.name, location);
                            TermOutcome::Updated { location }
                        }
                    },
                    Some(Err(e)) => {
                        error!(
                            "Failed to publish glossary term {} ({}): {}",
                            name_path.join("->"),
                            term.id,
                            e
                        );
                        failed = true;
                        TermOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                    None => TermOutcome::Failed {
                        error: "remote call produced no result".to_string(),
                    },
                },
            };

            match &outcome {
                TermOutcome::Created { location }
                | TermOutcome::Updated { location }
                | TermOutcome::Kept { location } => {
                    report.locations.insert(term.id.clone(), location.clone());
                }
                TermOutcome::Failed { .. } | TermOutcome::Unresolvable { .. } => {}
            }

            report.terms.push(TermReport {
                id: term.id.clone(),
                name_path,
                outcome,
            });
        }

        BatchOutcome { processed, failed }
    }

    fn plan(
        &self,
        term: &TermRecord,
        name_path: &[String],
        index: &RemoteIndex,
        locations: &LocationMap,
    ) -> Step {
        let parent_location = match &term.parent_id {
            None => None,
            Some(parent) => match locations.get(parent) {
                Some(location) => Some(location.to_string()),
                None => {
                    warn!(
                        "Skipping glossary term {}: parent {} has no remote location",
                        name_path.join("->"),
                        parent
                    );
                    return Step::Done(TermOutcome::Unresolvable {
                        parent_id: parent.clone(),
                    });
                }
            },
        };

        let payload = TermPayload::from_record(term, parent_location);
        match find_existing(name_path, index) {
            Some(location) if self.should_overwrite(name_path) => {
                Step::Call(RemoteCall::Update { location, payload })
            }
            Some(location) => {
                info!("Keeping existing glossary term {}", name_path.join("->"));
                Step::Done(TermOutcome::Kept { location })
            }
            None => Step::Call(RemoteCall::Create(payload)),
        }
    }

    fn should_overwrite(&self, name_path: &[String]) -> bool {
        match self.options.overwrite {
            OverwritePolicy::Always => true,
            OverwritePolicy::Never => false,
            OverwritePolicy::Prompt => match &self.prompt {
                Some(prompt) => prompt.confirm_overwrite(name_path),
                None => {
                    warn!("Overwrite prompt requested but none configured, keeping existing term");
                    false
                }
            },
        }
    }

    async fn execute(&self, call: &RemoteCall) -> ServiceResult<String> {
        match call {
            RemoteCall::Create(payload) => self.service.create(payload).await,
            RemoteCall::Update { location, payload } => {
                self.service.update(location, payload).await
            }
        }
    }
}

/// Validates, snapshots and publishes `records` with default wiring.
pub async fn synchronize(
    records: Vec<TermRecord>,
    service: Arc<dyn RemoteTermService>,
    options: SyncOptions,
) -> Result<SyncReport> {
    Synchronizer::new(service, options).sync_records(records).await
}
