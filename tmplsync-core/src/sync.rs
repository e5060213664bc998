use crate::admin::AdminReporter;
use crate::data::{Database, RunStatus};
use crate::error::{Result, SyncError};
use crate::model::Template;
use crate::normalize::normalize_listing_detail;
use crate::state::{ScraperState, StateStore};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tmplsync_fetch::client::DEFAULT_ROWS_PER_PAGE;
use tmplsync_fetch::{ListingSummary, TemplateClient};
use tracing::{debug, info, warn};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(300);

/// Options for one sync run.
pub struct SyncOptions {
    pub batch_size: usize,
    /// Pause after every processed template.
    pub delay: Duration,
    /// Maximum templates to process, 0 for all.
    pub limit: usize,
    /// Extra listing entries to skip on top of the resume point.
    pub skip: usize,
    /// Ignore any saved state.
    pub no_resume: bool,
    /// Fetch and normalize only.
    pub dry_run: bool,
    /// Re-upload templates that are already stored.
    pub refresh: bool,
    pub rows_per_page: u32,
    pub show_progress_bars: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            delay: DEFAULT_DELAY,
            limit: 0,
            skip: 0,
            no_resume: false,
            dry_run: false,
            refresh: false,
            rows_per_page: DEFAULT_ROWS_PER_PAGE,
            show_progress_bars: false,
        }
    }
}

/// Where a previous run left off in the current listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ResumePoint {
    pub last_source_id: String,
    /// Number of leading listing entries already synced.
    pub already_synced: usize,
    pub total_synced: u64,
    pub total_errors: u64,
}

/// Callback for reporting per-batch progress lines
pub type SyncProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Asked before resuming; returning false starts from scratch.
pub type ResumeCallback = Arc<dyn Fn(&ResumePoint) -> bool + Send + Sync>;

/// Everything a sync run talks to.
pub struct SyncTargets<'a> {
    pub client: &'a TemplateClient,
    /// Store to upload into. Also used to skip templates already present.
    pub database: Option<&'a Database>,
    pub state: &'a StateStore,
    pub admin: Option<&'a AdminReporter<'a>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSummary {
    pub listed: usize,
    /// Entries left after resume, skip and limit.
    pub planned: usize,
    pub resumed_from: Option<usize>,
    pub skipped_existing: usize,
    /// Successes and errors in this run.
    pub ok: u64,
    pub errors: u64,
    /// Running totals including resumed state.
    pub total_ok: u64,
    pub total_errors: u64,
}

/// Locate the saved `last_source_id` in the listing. `None` when there is no
/// state or the id is no longer listed, meaning a fresh start.
pub fn plan_resume(listings: &[ListingSummary], state: Option<&ScraperState>) -> Option<ResumePoint> {
    let state = state?;
    let position = listings
        .iter()
        .position(|item| item.source_id() == state.last_source_id)?;

    Some(ResumePoint {
        last_source_id: state.last_source_id.clone(),
        already_synced: position + 1,
        total_synced: state.total_synced,
        total_errors: state.total_errors,
    })
}

/// Drop the first `start` entries, then keep at most `limit` (0 keeps all).
pub fn apply_window<T>(items: Vec<T>, start: usize, limit: usize) -> Vec<T> {
    let remaining = items.into_iter().skip(start);
    if limit > 0 {
        remaining.take(limit).collect()
    } else {
        remaining.collect()
    }
}

fn batch_progress_bar(total: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Fetch, normalize and (unless uploads are off) store one listing entry.
async fn sync_one(
    client: &TemplateClient,
    database: Option<&Database>,
    item: &ListingSummary,
) -> Result<Template> {
    let source_id = item.source_id();
    let workflow = client
        .fetch_workflow(&source_id)
        .await?
        .ok_or_else(|| SyncError::Payload {
            source_id: source_id.clone(),
            reason: "no workflow graph in detail response".to_string(),
        })?;

    let template = normalize_listing_detail(item, workflow).ok_or_else(|| SyncError::Payload {
        source_id: source_id.clone(),
        reason: "workflow has no nodes".to_string(),
    })?;

    if let Some(db) = database {
        let row_id = db.upsert_template(&template)?;
        debug!("Stored template {} as row {}", source_id, row_id);
    }
    Ok(template)
}

/// Run the listing -> detail -> normalize -> upload loop.
///
/// Per-template failures are counted and logged; only a failed listing
/// fetch or an unreadable store aborts the run. State is checkpointed once
/// per batch after its last success.
pub async fn execute_sync(
    options: SyncOptions,
    targets: SyncTargets<'_>,
    progress_callback: Option<SyncProgressCallback>,
    resume_callback: Option<ResumeCallback>,
) -> Result<SyncSummary> {
    let SyncTargets {
        client,
        database,
        state,
        admin,
    } = targets;
    let uploads = if options.dry_run { None } else { database };
    let batch_size = options.batch_size.max(1);

    let report = |msg: String| match &progress_callback {
        Some(cb) => cb(msg),
        None => info!("{}", msg),
    };

    report(format!("Fetching listing from {}...", client.api_base()));
    let listings = client.fetch_all_listings(options.rows_per_page).await?;
    report(format!("Found {} templates", listings.len()));

    let mut summary = SyncSummary {
        listed: listings.len(),
        ..Default::default()
    };

    let saved = if options.no_resume { None } else { state.load() };
    let mut start_index = 0;
    if let Some(point) = plan_resume(&listings, saved.as_ref()) {
        report(format!(
            "Existing state: last_source_id={} (position {}), total_synced={}, total_errors={}",
            point.last_source_id, point.already_synced, point.total_synced, point.total_errors
        ));
        let accepted = resume_callback.as_ref().map(|cb| cb(&point)).unwrap_or(true);
        if accepted {
            start_index = point.already_synced;
            summary.total_ok = point.total_synced;
            summary.total_errors = point.total_errors;
            summary.resumed_from = Some(point.already_synced);
        }
    } else if let Some(saved) = &saved {
        warn!(
            "Saved last_source_id {} is not in the current listing; starting from the beginning",
            saved.last_source_id
        );
    }

    if options.skip > 0 {
        start_index += options.skip;
        report(format!(
            "Explicit skip: additional {} templates (start index {})",
            options.skip, start_index
        ));
    }

    if start_index > 0 {
        report(format!(
            "Starting from index {}, {} templates remaining",
            start_index,
            summary.listed.saturating_sub(start_index)
        ));
    }
    if options.limit > 0 {
        report(format!("Limited to {} templates from starting position", options.limit));
    }

    let listings = apply_window(listings, start_index, options.limit);
    summary.planned = listings.len();

    if listings.is_empty() {
        report("Nothing to do (no templates after applying resume/skip/limit).".to_string());
        if let Some(admin) = admin {
            admin.finish(RunStatus::Completed, 0, 0);
        }
        return Ok(summary);
    }

    let existing: HashSet<String> = match uploads {
        Some(db) if !options.refresh => {
            let ids = db.existing_source_ids()?;
            report(format!("Loaded {} existing templates for skipping", ids.len()));
            ids
        }
        _ => HashSet::new(),
    };

    let total_count = listings.len();
    report(format!(
        "Processing {} templates in batches of {} (dry_run={})",
        total_count, batch_size, options.dry_run
    ));
    if let Some(admin) = admin {
        admin.progress(summary.total_ok, summary.total_errors, total_count);
    }

    let pb = batch_progress_bar(total_count, options.show_progress_bars);

    for (batch_index, batch) in listings.chunks(batch_size).enumerate() {
        let batch_start = batch_index * batch_size;
        let mut batch_ok = 0u64;
        let mut batch_err = 0u64;
        let mut last_success_id: Option<String> = None;

        for item in batch {
            pb.inc(1);
            let source_id = item.source_id();
            if existing.contains(&source_id) {
                summary.skipped_existing += 1;
                continue;
            }
            pb.set_message(format!("{} {}", source_id, item.name));

            match sync_one(client, uploads, item).await {
                Ok(template) => {
                    batch_ok += 1;
                    last_success_id = Some(template.source_id);
                }
                Err(e) => {
                    batch_err += 1;
                    warn!("Error template {}: {}", source_id, e);
                }
            }

            if !options.delay.is_zero() {
                tokio::time::sleep(options.delay).await;
            }
        }

        summary.ok += batch_ok;
        summary.errors += batch_err;
        summary.total_ok += batch_ok;
        summary.total_errors += batch_err;

        let batch_end = (batch_start + batch_size).min(total_count);
        let line = format!(
            "Batch {}-{}/{} done: ok={} err={} (total ok={} err={})",
            batch_start + 1,
            batch_end,
            total_count,
            batch_ok,
            batch_err,
            summary.total_ok,
            summary.total_errors
        );
        pb.suspend(|| report(line));

        if let Some(admin) = admin {
            admin.progress(summary.total_ok, summary.total_errors, total_count);
        }

        if let Some(last_id) = last_success_id {
            let checkpoint = ScraperState::new(last_id, summary.total_ok, summary.total_errors);
            if let Err(e) = state.save(&checkpoint) {
                warn!("Could not save state to {}: {}", state.path().display(), e);
            }
        }
    }

    pb.finish_and_clear();
    report(format!("Done. ok={} err={}", summary.total_ok, summary.total_errors));
    if let Some(admin) = admin {
        admin.finish(RunStatus::Completed, summary.total_ok, summary.total_errors);
    }
    Ok(summary)
}
