// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used helpers for convenience
pub use handlers::{
    parse_number_answer, parse_yes_no_answer, prompt_number, prompt_yes_no, resolve_db_path,
    resolve_state_store, resolve_sync_settings, stacks_sql_from, SyncSettings,
};

// Re-export the sync entry points from tmplsync-core
pub use tmplsync_core::sync::{
    execute_sync, ResumeCallback, ResumePoint, SyncOptions, SyncProgressCallback, SyncSummary,
    SyncTargets,
};
