use colored::Colorize;
use commands::command_argument_builder;
use tmplsync::handlers::{
    handle_enrich, handle_import, handle_init, handle_stacks_sql, handle_state_clear,
    handle_state_show, handle_sync, init_tracing, load_dotenv,
};
use tmplsync_core::print_banner;

mod commands;

#[tokio::main]
async fn main() {
    load_dotenv();

    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_tracing(chosen_command.get_flag("verbose"));

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    let outcome = match chosen_command.subcommand() {
        Some(("init", primary_command)) => handle_init(primary_command),
        Some(("sync", primary_command)) => handle_sync(primary_command).await,
        Some(("enrich", primary_command)) => handle_enrich(primary_command).await,
        Some(("import", primary_command)) => handle_import(primary_command),
        Some(("state", primary_command)) => match primary_command.subcommand() {
            Some(("show", _)) => handle_state_show(primary_command),
            Some(("clear", _)) => handle_state_clear(primary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        Some(("stacks-sql", primary_command)) => handle_stacks_sql(primary_command),
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = outcome {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
