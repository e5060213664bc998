pub mod admin;
pub mod categorizer;
pub mod config;
pub mod data;
pub mod enrich;
pub mod error;
pub mod local;
pub mod model;
pub mod normalize;
pub mod stacks;
pub mod state;
pub mod sync;
pub mod taxonomy;

use colored::Colorize;

pub use error::{Result, SyncError};
pub use model::{Category, Template};

const BANNER: &str = r#"
  _                 _
 | |_ _ __ ___  _ __ | |___ _   _ _ __   ___
 | __| '_ ` _ \| '_ \| / __| | | | '_ \ / __|
 | |_| | | | | | |_) | \__ \ |_| | | | | (__
  \__|_| |_| |_| .__/|_|___/\__, |_| |_|\___|
               |_|          |___/
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "workflow template catalog sync".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
