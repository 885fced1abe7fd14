use seoscope::commands::command_argument_builder;
use seoscope::handlers::*;
use seoscope_core::pipeline::{UrlSource, load_url_file};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

// ============================================================================
// URL List Tests
// ============================================================================

#[test]
fn test_parse_url_line_with_scheme() {
    assert_eq!(parse_url_line("https://example.com"), "https://example.com");
}

#[test]
fn test_parse_url_line_without_scheme() {
    assert_eq!(parse_url_line("example.com/about"), "https://example.com/about");
}

#[test]
fn test_parse_url_line_invalid_is_kept() {
    assert_eq!(parse_url_line("not a valid url!!!"), "not a valid url!!!");
}

#[test]
fn test_load_urls_from_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "https://example.com")?;
    writeln!(temp_file)?;
    writeln!(temp_file, "   ")?;
    writeln!(temp_file, "example.com/missing")?;

    let urls = load_urls_from_file(temp_file.path())?;

    assert_eq!(urls, vec!["https://example.com", "https://example.com/missing"]);
    Ok(())
}

#[test]
fn test_subcommands_and_audit_read_url_lists_alike() -> Result<(), Box<dyn std::error::Error>> {
    let mut temp_file = NamedTempFile::new()?;
    writeln!(temp_file, "example.com/")?;
    writeln!(temp_file, "http://example.com/plain")?;
    writeln!(temp_file, "not a valid url!!!")?;

    let urls = load_urls_from_file(temp_file.path())?;

    assert_eq!(urls, load_url_file(temp_file.path())?);
    assert_eq!(
        urls,
        vec![
            "https://example.com/",
            "http://example.com/plain",
            "not a valid url!!!"
        ]
    );
    Ok(())
}

#[test]
fn test_load_urls_from_file_empty() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file).unwrap();
    writeln!(temp_file, "   ").unwrap();

    let error = load_urls_from_file(temp_file.path()).unwrap_err();
    assert!(error.to_string().contains("No URLs found"));
}

#[test]
fn test_load_urls_from_missing_file() {
    let result = load_urls_from_file(&PathBuf::from("/nonexistent/seoscope/urls.txt"));
    assert!(result.is_err());
}

#[test]
fn test_expand_path_leaves_plain_paths_alone() {
    assert_eq!(expand_path("./output"), PathBuf::from("./output"));
}

// ============================================================================
// Command Line Tests
// ============================================================================

#[test]
fn test_command_definition_is_valid() {
    command_argument_builder().debug_assert();
}

#[test]
fn test_audit_defaults_to_crawling() {
    let matches = command_argument_builder()
        .try_get_matches_from(["seoscope", "audit", "https://a.com/"])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    let options = audit_options(sub).unwrap();

    assert_eq!(options.source, UrlSource::Crawl);
    assert_eq!(options.target, "https://a.com/");
    assert_eq!(options.crawl.max_pages, 1000);
    assert_eq!(options.audit.sample_size, 10);
    assert_eq!(options.link_check.concurrency, 10);
    assert!(options.sitemap_url.is_none());
}

#[test]
fn test_audit_options_from_flags() {
    let matches = command_argument_builder()
        .try_get_matches_from([
            "seoscope",
            "-q",
            "audit",
            "https://a.com/",
            "--max-pages",
            "50",
            "--sample",
            "3",
            "--concurrency",
            "4",
            "--sitemap",
            "https://a.com/sitemap.xml",
            "--urls",
            "urls.txt",
            "--skip-lighthouse",
        ])
        .unwrap();
    assert!(matches.get_flag("quiet"));

    let (_, sub) = matches.subcommand().unwrap();
    let options = audit_options(sub).unwrap();

    assert_eq!(options.source, UrlSource::UrlFile(PathBuf::from("urls.txt")));
    assert_eq!(options.crawl.max_pages, 50);
    assert_eq!(options.audit.sample_size, 3);
    assert_eq!(options.link_check.concurrency, 4);
    assert_eq!(
        options.sitemap_url.as_deref(),
        Some("https://a.com/sitemap.xml")
    );
    assert!(options.skip.lighthouse);
    assert!(!options.skip.links);
}

#[test]
fn test_skip_crawl_needs_a_url_list() {
    let matches = command_argument_builder()
        .try_get_matches_from(["seoscope", "audit", "https://a.com/", "--skip-crawl"])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();

    assert!(audit_options(sub).is_err());
}

#[test]
fn test_urls_and_manifest_conflict() {
    let result = command_argument_builder().try_get_matches_from([
        "seoscope",
        "audit",
        "https://a.com/",
        "--urls",
        "urls.txt",
        "--manifest",
        "manifest.json",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_output_dir_is_global() {
    let matches = command_argument_builder()
        .try_get_matches_from(["seoscope", "seo", "crawl.json", "-o", "/tmp/seo-runs"])
        .unwrap();
    let (name, sub) = matches.subcommand().unwrap();

    assert_eq!(name, "seo");
    assert_eq!(output_root(sub), PathBuf::from("/tmp/seo-runs"));
}

#[test]
fn test_invalid_start_url_is_rejected() {
    let result =
        command_argument_builder().try_get_matches_from(["seoscope", "crawl", "not a url"]);
    assert!(result.is_err());
}

// ============================================================================
// Handler Tests
// ============================================================================

#[test]
fn test_handle_seo_writes_report_into_run_directory() {
    let output = tempfile::TempDir::new().unwrap();
    let mut pages = NamedTempFile::new().unwrap();
    write!(
        pages,
        r#"[{{"url":"https://a.com/","title":"","statusCode":404}}]"#
    )
    .unwrap();

    let matches = command_argument_builder()
        .try_get_matches_from([
            "seoscope",
            "-o",
            output.path().to_str().unwrap(),
            "seo",
            pages.path().to_str().unwrap(),
        ])
        .unwrap();
    let (_, sub) = matches.subcommand().unwrap();
    handle_seo(sub).unwrap();

    let runs: Vec<_> = std::fs::read_dir(output.path()).unwrap().collect();
    assert_eq!(runs.len(), 1);
    let run_dir = runs[0].as_ref().unwrap().path();
    assert!(run_dir.join("seo.json").exists());
    assert!(run_dir.join("manifest.json").exists());
}
