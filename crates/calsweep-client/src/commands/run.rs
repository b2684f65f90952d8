//! The bulk run: recolor by default, `--delete`, or `--copy-to`.

use calsweep_core::{RuleSet, TimeError, TimeWindow, parse_bound};
use calsweep_providers::CalendarStore;
use chrono::{DateTime, Local, Utc};
use tracing::warn;

use crate::cli::Mode;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::runner::BulkOperationRunner;

/// A compiled operation, ready to run.
#[derive(Debug)]
pub enum Operation {
    Recolor(RuleSet),
    Delete(RuleSet),
    Copy { target_start: DateTime<Utc> },
}

/// Everything a run needs, checked before any store call.
#[derive(Debug)]
pub struct RunPlan {
    pub calendar_id: String,
    pub window: TimeWindow,
    pub operation: Operation,
    pub default_zone: Option<String>,
}

impl RunPlan {
    /// Parses the window and compiles the rules the mode needs.
    ///
    /// Dates without an offset are read in the configured zone, or in the
    /// system zone when none is configured.
    pub fn new(start: &str, end: &str, mode: &Mode, config: &ClientConfig) -> ClientResult<Self> {
        let zone = config.google.zone()?;
        let parse = |text: &str| -> Result<DateTime<Utc>, TimeError> {
            match zone {
                Some(tz) => parse_bound(text, &tz),
                None => parse_bound(text, &Local),
            }
        };

        let window = TimeWindow::new(parse(start)?, parse(end)?)?;
        let operation = match mode {
            Mode::Recolor => Operation::Recolor(non_empty(config.color_rule_set()?, "color")),
            Mode::Delete => Operation::Delete(non_empty(config.delete_rule_set()?, "delete")),
            Mode::Copy { target } => Operation::Copy {
                target_start: parse(target)?,
            },
        };

        Ok(Self {
            calendar_id: config.google.calendar_id().to_string(),
            window,
            operation,
            default_zone: zone.map(|tz| tz.name().to_string()),
        })
    }

    /// Runs the operation and returns the closing summary line.
    pub async fn execute(&self, store: &dyn CalendarStore) -> ClientResult<String> {
        let runner = BulkOperationRunner::new(store, &self.calendar_id);
        let line = match &self.operation {
            Operation::Recolor(rules) => {
                let summary = runner.recolor(self.window, rules).await?;
                format!("Done. Updated: {}", summary.updated)
            }
            Operation::Delete(rules) => {
                let summary = runner.delete(self.window, rules).await?;
                format!("Done. Deleted: {}", summary.deleted)
            }
            Operation::Copy { target_start } => {
                let summary = runner
                    .copy(self.window, *target_start, self.default_zone.as_deref())
                    .await?;
                format!(
                    "Copy finished. Created: {}, Skipped (duplicates): {}",
                    summary.created, summary.skipped
                )
            }
        };
        Ok(line)
    }
}

fn non_empty(rules: RuleSet, kind: &str) -> RuleSet {
    if rules.is_empty() {
        warn!("no {kind} rules configured, nothing will change");
    }
    rules
}

/// Validates, opens the configured store and runs.
pub async fn run(start: &str, end: &str, mode: &Mode, config: &ClientConfig) -> ClientResult<()> {
    let plan = RunPlan::new(start, end, mode, config)?;
    let store = open_store(config)?;
    let line = plan.execute(store.as_ref()).await?;
    println!();
    println!("{line}");
    Ok(())
}

#[cfg(feature = "google")]
fn open_store(config: &ClientConfig) -> ClientResult<Box<dyn CalendarStore>> {
    use calsweep_providers::google::GoogleStore;

    let store = GoogleStore::new(config.google.to_provider_config()?)?;
    if store.needs_reauth() {
        return Err(ClientError::AuthRequired(
            "no usable Google tokens, run `calsweep auth google` first".to_string(),
        ));
    }
    Ok(Box::new(store))
}

#[cfg(not(feature = "google"))]
fn open_store(_config: &ClientConfig) -> ClientResult<Box<dyn CalendarStore>> {
    Err(ClientError::Config(
        "calsweep was built without a calendar backend (enable the `google` feature)".to_string(),
    ))
}
