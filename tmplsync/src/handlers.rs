use anyhow::{Context, bail};
use clap::ArgMatches;
use colored::Colorize;
use serde_json::json;
use std::fmt::Display;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tmplsync_core::admin::AdminReporter;
use tmplsync_core::categorizer::AiCategorizer;
use tmplsync_core::config::{
    CategorizerSettings, DATABASE_FILE_NAME, DEFAULT_CONFIG_DIR, resolve_admin_run_id,
};
use tmplsync_core::data::{Database, RunStatus};
use tmplsync_core::enrich::{EnrichOptions, execute_enrich};
use tmplsync_core::local::import_local;
use tmplsync_core::stacks::{BUNDLED_LABELS, render_stacks_sql, stack_pairs};
use tmplsync_core::state::StateStore;
use tmplsync_core::sync::{
    DEFAULT_BATCH_SIZE, DEFAULT_DELAY, ResumeCallback, ResumePoint, SyncOptions,
    SyncProgressCallback, SyncTargets, execute_sync,
};
use tmplsync_fetch::TemplateClient;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

// Process setup

/// Load a `.env` file from the working directory, if there is one, before
/// clap reads its `env` fallbacks.
pub fn load_dotenv() {
    if let Err(err) = dotenvy::dotenv()
        && !err.not_found()
    {
        eprintln!("Warning: failed to load .env file: {err}");
    }
}

pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

// Prompt helpers

/// Parse a numeric answer. Blank means `default`; `None` for anything that
/// does not parse.
pub fn parse_number_answer<T: FromStr>(raw: &str, default: T) -> Option<T> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(default);
    }
    raw.parse().ok()
}

/// Parse a yes/no answer. Blank means `default_yes`; `None` when the
/// answer is neither.
pub fn parse_yes_no_answer(raw: &str, default_yes: bool) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "" => Some(default_yes),
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

fn read_answer<R: BufRead, W: Write>(input: &mut R, output: &mut W, prompt: &str) -> Option<String> {
    let _ = write!(output, "{} ", prompt.bright_cyan().bold());
    let _ = output.flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

/// Ask for a number; end of input or an invalid answer falls back to
/// `default`.
pub fn prompt_number<T, R, W>(input: &mut R, output: &mut W, prompt: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    R: BufRead,
    W: Write,
{
    let Some(answer) = read_answer(input, output, &format!("{} [{}]:", prompt, default)) else {
        return default;
    };
    parse_number_answer(&answer, default).unwrap_or_else(|| {
        let _ = writeln!(output, "  Invalid number, using default.");
        default
    })
}

pub fn prompt_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    default_yes: bool,
) -> bool {
    let label = if default_yes { "Y/n" } else { "y/N" };
    let Some(answer) = read_answer(input, output, &format!("{} [{}]:", prompt, label)) else {
        return default_yes;
    };
    parse_yes_no_answer(&answer, default_yes).unwrap_or_else(|| {
        let _ = writeln!(output, "  Invalid choice, using default.");
        default_yes
    })
}

// Path resolution

/// Database file from `--db`/`TMPLSYNC_DB`, or the default location. A
/// directory argument gets the default file name appended.
pub fn resolve_db_path(db_arg: Option<&str>) -> PathBuf {
    let Some(raw) = db_arg else {
        let dir = shellexpand::tilde(DEFAULT_CONFIG_DIR);
        return Path::new(dir.as_ref()).join(DATABASE_FILE_NAME);
    };

    let expanded = shellexpand::tilde(raw);
    let path = PathBuf::from(expanded.as_ref());
    if raw.ends_with('/') || path.is_dir() {
        path.join(DATABASE_FILE_NAME)
    } else {
        path
    }
}

/// Checkpoint file from `--state-file`, or next to the database.
pub fn resolve_state_store(state_file: Option<&PathBuf>, db_path: &Path) -> StateStore {
    match state_file {
        Some(path) => StateStore::new(shellexpand::tilde(&path.to_string_lossy()).as_ref()),
        None => StateStore::in_dir(db_path.parent().unwrap_or_else(|| Path::new("."))),
    }
}

fn open_database(db_path: &Path) -> anyhow::Result<Database> {
    if !Database::exists(db_path) {
        bail!(
            "Database not found at {}. Run `tmplsync init` first or pass --db.",
            db_path.display()
        );
    }
    Database::new(db_path).with_context(|| format!("Failed to open database {}", db_path.display()))
}

fn template_client(args: &ArgMatches) -> anyhow::Result<TemplateClient> {
    let api_base = args
        .get_one::<Url>("api-base")
        .map(Url::as_str)
        .unwrap_or(tmplsync_fetch::client::DEFAULT_API_BASE);
    Ok(TemplateClient::new(api_base)?)
}

fn db_arg(args: &ArgMatches) -> Option<&str> {
    args.get_one::<String>("db").map(String::as_str)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

// Handlers

pub fn handle_init(args: &ArgMatches) -> anyhow::Result<()> {
    print_divider();
    println!("{}", "  TMPLSYNC INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_arg = args
        .get_one::<String>("PATH")
        .map(String::as_str)
        .unwrap_or(DEFAULT_CONFIG_DIR);
    let force = args.get_flag("force");
    let expanded_config_dir = shellexpand::tilde(config_arg);
    let config_dir = Path::new(expanded_config_dir.as_ref());
    let db_path = config_dir.join(DATABASE_FILE_NAME);

    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if !config_dir.exists() {
        println!("{} Creating directory structure...", "→".blue());
        fs::create_dir_all(config_dir)
            .with_context(|| format!("Failed to create {}", config_dir.display()))?;
        println!(
            "  {} {}",
            "✓".green(),
            config_dir.display().to_string().bright_white()
        );
        println!();
    }

    if Database::exists(&db_path) {
        let overwrite = if force {
            println!(
                "{} Deleting existing database (force mode)",
                "→".yellow().bold()
            );
            true
        } else {
            println!("{}", "⚠ WARNING".yellow().bold());
            println!("Database already exists at:");
            println!(
                "  {} {}",
                "•".yellow(),
                db_path.display().to_string().bright_white()
            );
            println!();
            let stdin = io::stdin();
            prompt_yes_no(
                &mut stdin.lock(),
                &mut io::stdout(),
                "Would you like to overwrite it?",
                false,
            )
        };

        if overwrite {
            Database::drop(&db_path)
                .with_context(|| format!("Failed to remove {}", db_path.display()))?;
            println!("{} Existing database removed", "✓".green().bold());
        } else {
            println!("{} Keeping existing database", "→".blue());
        }
        println!();
    }

    if !Database::exists(&db_path) {
        println!("{} Creating database...", "→".blue());
    }
    Database::new(&db_path)
        .with_context(|| format!("Failed to create database {}", db_path.display()))?;

    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

/// Millisecond resolution; negative or non-finite input gives the default.
fn delay_from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs >= 0.0 {
        Duration::from_millis((secs * 1000.0).round() as u64)
    } else {
        DEFAULT_DELAY
    }
}

/// Settings for a sync run after flags and (when interactive) prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub batch_size: usize,
    pub delay: Duration,
    pub limit: usize,
}

/// Resolve batch size, delay and limit. Zero or absent flags are prompted
/// for when `input` is given, otherwise defaulted.
pub fn resolve_sync_settings<R: BufRead, W: Write>(
    batch_size: Option<usize>,
    delay_secs: Option<f64>,
    limit: Option<usize>,
    prompt: Option<(&mut R, &mut W)>,
) -> SyncSettings {
    let batch_size = batch_size.filter(|n| *n > 0);
    let delay_secs = delay_secs.filter(|d| *d > 0.0);
    let limit = limit.filter(|n| *n > 0);
    let default_delay = DEFAULT_DELAY.as_secs_f64();

    let (batch_size, delay_secs, limit) = match prompt {
        Some((input, output)) => (
            batch_size.unwrap_or_else(|| {
                prompt_number(
                    input,
                    output,
                    "Templates per batch (state saved after each)",
                    DEFAULT_BATCH_SIZE,
                )
            }),
            delay_secs.unwrap_or_else(|| {
                prompt_number(input, output, "Delay between requests (seconds)", default_delay)
            }),
            limit.unwrap_or_else(|| {
                prompt_number(input, output, "Max templates to sync (0 = all)", 0usize)
            }),
        ),
        None => (
            batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            delay_secs.unwrap_or(default_delay),
            limit.unwrap_or(0),
        ),
    };

    SyncSettings {
        batch_size: batch_size.max(1),
        delay: delay_from_secs(delay_secs),
        limit,
    }
}

pub async fn handle_sync(args: &ArgMatches) -> anyhow::Result<()> {
    let dry_run = args.get_flag("dry-run");
    let interactive = !args.get_flag("non-interactive") && io::stdin().is_terminal();

    let settings = {
        let batch_size = args.get_one::<usize>("batch-size").copied();
        let delay = args.get_one::<f64>("delay").copied();
        let limit = args.get_one::<usize>("limit").copied();
        if interactive {
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            resolve_sync_settings(batch_size, delay, limit, Some((&mut input, &mut output)))
        } else {
            resolve_sync_settings::<io::StdinLock, io::Stdout>(batch_size, delay, limit, None)
        }
    };

    let db_path = resolve_db_path(db_arg(args));
    let database = if Database::exists(&db_path) {
        Some(open_database(&db_path)?)
    } else if dry_run {
        None
    } else {
        bail!(
            "Database not found at {}. Run `tmplsync init` first or pass --db.",
            db_path.display()
        );
    };
    let state = resolve_state_store(args.get_one::<PathBuf>("state-file"), &db_path);
    let client = template_client(args)?;

    let admin = database
        .as_ref()
        .map(|db| AdminReporter::new(db, resolve_admin_run_id(), "sync"));

    let options = SyncOptions {
        batch_size: settings.batch_size,
        delay: settings.delay,
        limit: settings.limit,
        skip: args.get_one::<usize>("skip").copied().unwrap_or(0),
        no_resume: args.get_flag("no-resume"),
        dry_run,
        refresh: args.get_flag("refresh"),
        show_progress_bars: interactive,
        ..Default::default()
    };

    println!(
        "\n{} Syncing templates from {}",
        "→".blue(),
        client.api_base().as_str().bright_white()
    );
    println!("Batch size: {}", options.batch_size);
    println!("Delay: {:.2}s", options.delay.as_secs_f64());
    println!("State: {}\n", state.path().display());

    let progress_callback: SyncProgressCallback = Arc::new(|msg: String| {
        println!("{}", msg);
    });

    let resume_callback: ResumeCallback = if interactive {
        Arc::new(|point: &ResumePoint| {
            let stdin = io::stdin();
            prompt_yes_no(
                &mut stdin.lock(),
                &mut io::stdout(),
                &format!(
                    "Resume from last run (skip {} already synced)?",
                    point.already_synced
                ),
                true,
            )
        })
    } else {
        Arc::new(|_: &ResumePoint| true)
    };

    let result = execute_sync(
        options,
        SyncTargets {
            client: &client,
            database: database.as_ref(),
            state: &state,
            admin: admin.as_ref(),
        },
        Some(progress_callback),
        Some(resume_callback),
    )
    .await;

    match result {
        Ok(summary) => {
            println!();
            println!("{} Sync complete!", "✓".green().bold());
            println!(
                "  {} ok={} err={} (this run: ok={} err={}, skipped existing={})",
                "•".blue(),
                summary.total_ok.to_string().green(),
                summary.total_errors.to_string().red(),
                summary.ok,
                summary.errors,
                summary.skipped_existing
            );
            Ok(())
        }
        Err(e) => {
            if let Some(admin) = &admin {
                admin.fail(&e.to_string());
            }
            Err(anyhow::Error::new(e).context("Sync failed"))
        }
    }
}

pub async fn handle_enrich(args: &ArgMatches) -> anyhow::Result<()> {
    let db_path = resolve_db_path(db_arg(args));
    let database = open_database(&db_path)?;
    let client = template_client(args)?;
    let use_ai = !args.get_flag("no-ai");

    let categorizer = if use_ai {
        AiCategorizer::from_settings(CategorizerSettings::from_env())?
    } else {
        None
    };

    let admin = AdminReporter::new(&database, resolve_admin_run_id(), "enrich");
    let options = EnrichOptions {
        page_size: args
            .get_one::<usize>("page-size")
            .copied()
            .unwrap_or(tmplsync_core::enrich::DEFAULT_PAGE_SIZE),
        use_ai,
    };

    println!(
        "\n{} Enriching stored templates (AI: {})\n",
        "→".blue(),
        if categorizer.is_some() { "on" } else { "off" }
    );

    match execute_enrich(options, &client, &database, categorizer.as_ref()).await {
        Ok(summary) => {
            admin.finish_with(
                RunStatus::Completed,
                json!({ "updated": summary.updated, "skipped": summary.skipped }),
            );
            println!(
                "{} Enrichment complete. updated={} skipped={}",
                "✓".green().bold(),
                summary.updated.to_string().green(),
                summary.skipped
            );
            Ok(())
        }
        Err(e) => {
            admin.fail(&e.to_string());
            Err(anyhow::Error::new(e).context("Enrichment failed"))
        }
    }
}

pub fn handle_import(args: &ArgMatches) -> anyhow::Result<()> {
    let dir = args
        .get_one::<PathBuf>("DIR")
        .context("an import directory is required")?;
    let skip = args.get_one::<usize>("skip").copied().unwrap_or(0);
    let limit = args.get_one::<usize>("limit").copied().unwrap_or(0);

    let db_path = resolve_db_path(db_arg(args));
    let database = open_database(&db_path)?;

    println!(
        "\n{} Importing workflow files from {}\n",
        "→".blue(),
        dir.display().to_string().bright_white()
    );
    let summary = import_local(dir, skip, limit, &database)?;

    println!(
        "{} Import complete. found={} ok={} err={}",
        "✓".green().bold(),
        summary.found,
        summary.ok.to_string().green(),
        summary.errors.to_string().red()
    );
    Ok(())
}

fn state_store_from(args: &ArgMatches) -> StateStore {
    let db_path = resolve_db_path(db_arg(args));
    resolve_state_store(args.get_one::<PathBuf>("state-file"), &db_path)
}

pub fn handle_state_show(args: &ArgMatches) -> anyhow::Result<()> {
    let store = state_store_from(args);
    match store.load() {
        Some(state) => {
            println!("{} {}", "State file:".blue(), store.path().display());
            println!("  last_source_id: {}", state.last_source_id.bright_white());
            println!("  last_run_utc:   {}", state.last_run_utc);
            println!("  total_synced:   {}", state.total_synced);
            println!("  total_errors:   {}", state.total_errors);
        }
        None => println!(
            "{} No saved state at {}",
            "ℹ".blue(),
            store.path().display()
        ),
    }
    Ok(())
}

pub fn handle_state_clear(args: &ArgMatches) -> anyhow::Result<()> {
    let store = state_store_from(args);
    if store.clear()? {
        println!(
            "{} Removed {}",
            "✓".green().bold(),
            store.path().display()
        );
    } else {
        println!(
            "{} No saved state at {}",
            "ℹ".blue(),
            store.path().display()
        );
    }
    Ok(())
}

/// Render the stacks seed SQL from a label file, or the bundled list.
pub fn stacks_sql_from(labels: Option<&Path>) -> anyhow::Result<String> {
    let owned;
    let raw = match labels {
        Some(path) => {
            owned = fs::read_to_string(path)
                .with_context(|| format!("Failed to read labels file {}", path.display()))?;
            owned.as_str()
        }
        None => BUNDLED_LABELS,
    };
    Ok(render_stacks_sql(&stack_pairs(raw)))
}

pub fn handle_stacks_sql(args: &ArgMatches) -> anyhow::Result<()> {
    let sql = stacks_sql_from(args.get_one::<PathBuf>("labels").map(PathBuf::as_path))?;

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            fs::write(path, &sql).with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("{} Wrote {}", "✓".green().bold(), path.display());
        }
        None => print!("{}", sql),
    }
    Ok(())
}
