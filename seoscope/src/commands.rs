use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;
use url::Url;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("seoscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("seoscope")
        .about("Technical SEO audits: crawl, broken links, on-page checks, Lighthouse and sitemap coverage")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and progress bars")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-o --"output-dir" <DIR>)
                .required(false)
                .help("Directory that receives one sub-directory per run")
                .default_value("./output")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            command!("audit")
                .about("Run the full pipeline: crawl, link check, SEO analysis, Lighthouse, sitemap diff")
                .arg(
                    arg!(<URL>)
                        .help("Site to audit")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(max_pages_arg())
                .arg(
                    arg!(--"sample" <N>)
                        .required(false)
                        .help("Number of URLs audited with Lighthouse")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"sitemap" <SITEMAP_URL>)
                        .required(false)
                        .help("Sitemap to compare the crawl against")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(concurrency_arg())
                .arg(
                    arg!(--"urls" <FILE>)
                        .required(false)
                        .help("Use this newline-delimited URL list instead of crawling")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("manifest"),
                )
                .arg(
                    arg!(--"manifest" <FILE>)
                        .required(false)
                        .help("Reuse the URL list and pages of an earlier run's manifest.json")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("urls"),
                )
                .arg(
                    arg!(--"skip-crawl")
                        .required(false)
                        .help("Do not crawl; requires --urls or --manifest")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(skip_arg("skip-links", "Skip the broken link check"))
                .arg(skip_arg("skip-seo", "Skip on-page SEO analysis"))
                .arg(skip_arg("skip-lighthouse", "Skip Lighthouse audits"))
                .arg(skip_arg("skip-sitemap", "Skip the sitemap comparison")),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl a site and record on-page data for every page")
                .arg(
                    arg!(<URL>)
                        .help("Start URL")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(max_pages_arg())
                .arg(
                    arg!(-w --"workers" <N>)
                        .required(false)
                        .help("Pages fetched at the same time")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                )
                .arg(
                    arg!(--"max-depth" <N>)
                        .required(false)
                        .help("Do not follow links deeper than this many hops from the start page")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            command!("check-links")
                .about("Check every URL in a list with a HEAD request")
                .arg(urls_file_arg())
                .arg(concurrency_arg())
                .arg(
                    arg!(--"timeout" <SECONDS>)
                        .required(false)
                        .help("Per-request timeout in seconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10"),
                ),
        )
        .subcommand(
            command!("seo")
                .about("Report on-page SEO issues from a crawl's page records")
                .arg(
                    arg!(<PAGES_FILE>)
                        .help("crawl.json from an earlier run, or a JSON array of pages")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("lighthouse")
                .about("Run Lighthouse against the first N URLs of a list, one at a time")
                .arg(urls_file_arg())
                .arg(
                    arg!(--"sample" <N>)
                        .required(false)
                        .help("Number of URLs to audit")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("10"),
                ),
        )
        .subcommand(
            command!("sitemap-diff")
                .about("Compare a sitemap with a list of crawled URLs")
                .arg(
                    arg!(<SITEMAP_URL>)
                        .help("Sitemap or sitemap index")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(urls_file_arg()),
        )
}

fn max_pages_arg() -> clap::Arg {
    arg!(--"max-pages" <N>)
        .required(false)
        .help("Stop after this many pages have been recorded")
        .value_parser(clap::value_parser!(usize))
        .default_value("1000")
}

fn concurrency_arg() -> clap::Arg {
    arg!(-c --"concurrency" <N>)
        .required(false)
        .help("Link checks in flight at the same time")
        .value_parser(clap::value_parser!(usize))
        .default_value("10")
}

fn urls_file_arg() -> clap::Arg {
    arg!(<URLS_FILE>)
        .help("Newline-delimited list of URLs")
        .value_parser(clap::value_parser!(PathBuf))
}

fn skip_arg(name: &'static str, help: &'static str) -> clap::Arg {
    clap::Arg::new(name)
        .long(name)
        .required(false)
        .help(help)
        .action(clap::ArgAction::SetTrue)
}
