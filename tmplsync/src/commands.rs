use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use tmplsync_fetch::client::DEFAULT_API_BASE;
use url::Url;

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("tmplsync")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("tmplsync")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log debug output (RUST_LOG takes precedence)")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"db" <PATH>)
                .required(false)
                .global(true)
                .env("TMPLSYNC_DB")
                .help("Path to the template database (default: ~/.config/tmplsync/tmplsync.db)"),
        )
        .arg(
            arg!(--"api-base" <URL>)
                .required(false)
                .global(true)
                .env("TMPLSYNC_API_BASE")
                .help("Base URL of the template API")
                .value_parser(clap::value_parser!(Url))
                .default_value(DEFAULT_API_BASE),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the tmplsync database on your filesystem")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the tmplsync database")
                        .default_value("~/.config/tmplsync/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            command!("sync")
                .about(
                    "Fetch the public template listing and store every template, resuming \
                from the last checkpoint.",
                )
                .arg(
                    arg!(--"limit" <N>)
                        .required(false)
                        .help("Max templates to sync, 0 for all (prompted when interactive)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"skip" <N>)
                        .required(false)
                        .help("Skip the first N listing entries, applied after resume")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"batch-size" <N>)
                        .required(false)
                        .help("Templates per batch; state is saved after each (default: 50)")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"delay" <SECONDS>)
                        .required(false)
                        .help("Delay between template requests in seconds (default: 0.3)")
                        .value_parser(clap::value_parser!(f64)),
                )
                .arg(
                    arg!(--"no-resume")
                        .required(false)
                        .help("Ignore any saved state and start from scratch")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"dry-run")
                        .required(false)
                        .help("Fetch and normalize only; do not write to the database")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"refresh")
                        .required(false)
                        .help("Re-upload templates that are already stored")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"non-interactive")
                        .required(false)
                        .help("Never prompt, even when stdin is a terminal")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"state-file" <PATH>)
                        .required(false)
                        .help("Checkpoint file (default: scraper_state.json next to the database)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("enrich")
                .about("Refresh tags and categories of stored templates")
                .arg(
                    arg!(--"no-ai")
                        .required(false)
                        .help("Do not ask the language model for missing or generic categories")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"page-size" <N>)
                        .required(false)
                        .help("Stored templates read per page")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("500"),
                ),
        )
        .subcommand(
            command!("import")
                .about("Import exported workflow JSON files from a directory")
                .arg(
                    arg!(<DIR>)
                        .required(true)
                        .help("Directory searched recursively for *.json files")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"limit" <N>)
                        .required(false)
                        .help("Max files to import, 0 for all")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"skip" <N>)
                        .required(false)
                        .help("Skip the first N files")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("0"),
                ),
        )
        .subcommand(
            command!("state")
                .about("Inspect or reset the sync checkpoint")
                .arg(
                    arg!(--"state-file" <PATH>)
                        .required(false)
                        .global(true)
                        .help("Checkpoint file (default: scraper_state.json next to the database)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .subcommand_required(true)
                .subcommand(command!("show").about("Print the saved checkpoint"))
                .subcommand(command!("clear").about("Delete the saved checkpoint")),
        )
        .subcommand(
            command!("stacks-sql")
                .about("Print the SQL that seeds the integration stacks table")
                .arg(
                    arg!(--"labels" <PATH>)
                        .required(false)
                        .help("Newline-delimited label file (default: bundled list)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Write the SQL to a file instead of stdout")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
