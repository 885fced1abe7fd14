use clap::ArgMatches;
use colored::Colorize;
use seoscope::commands::command_argument_builder;
use seoscope::handlers::{
    handle_audit, handle_check_links, handle_crawl, handle_lighthouse, handle_seo,
    handle_sitemap_diff, print_banner,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    if !quiet {
        print_banner();
    }

    if let Err(e) = dispatch(&chosen_command, quiet).await {
        eprintln!("{} {}", "✗ Error:".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".bright_black(), cause);
        }
        std::process::exit(1);
    }
}

/// Log to stderr, filtered by RUST_LOG (default: warnings only).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(matches: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    match matches.subcommand() {
        Some(("audit", sub_matches)) => handle_audit(sub_matches, quiet).await,
        Some(("crawl", sub_matches)) => handle_crawl(sub_matches, quiet).await,
        Some(("check-links", sub_matches)) => handle_check_links(sub_matches, quiet).await,
        Some(("seo", sub_matches)) => handle_seo(sub_matches),
        Some(("lighthouse", sub_matches)) => handle_lighthouse(sub_matches, quiet).await,
        Some(("sitemap-diff", sub_matches)) => handle_sitemap_diff(sub_matches, quiet).await,
        _ => Ok(()),
    }
}
