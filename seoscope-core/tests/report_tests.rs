// Tests for report persistence and run manifests

use seoscope_core::report::{generate_json_report, load_json, write_json_report, write_url_list};
use seoscope_core::run::{MANIFEST_FILE, RunContext, RunManifest, Stage};
use seoscope_scanner::{LinkCheckReport, SitemapDiffReport, reconcile};
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

// ============================================================================
// Report Tests
// ============================================================================

#[test]
fn test_json_report_is_timestamped() {
    let report = LinkCheckReport::default();
    let json: Value = serde_json::from_str(&generate_json_report(&report).unwrap()).unwrap();

    let timestamp = json["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert_eq!(json["summary"]["total"], 0);
    assert!(json["broken"].as_array().unwrap().is_empty());
}

#[test]
fn test_sitemap_report_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sitemap-diff.json");

    let diff = reconcile(["/x", "/y", "/z"], ["/x", "/y", "/w"]);
    write_json_report(&SitemapDiffReport::new(&diff, Vec::new()), &path).unwrap();

    let json: Value = load_json(&path).unwrap();
    assert_eq!(json["summary"]["coverage"], "66.67%");
    assert_eq!(json["missingPages"][0], "/z");
    assert_eq!(json["orphanedPages"][0], "/w");
}

#[test]
fn test_write_url_list() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("urls.txt");

    write_url_list(
        &["https://a.com/".to_string(), "https://a.com/b".to_string()],
        &path,
    )
    .unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "https://a.com/\nhttps://a.com/b\n"
    );

    write_url_list(&[], &path).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), "");
}

#[test]
fn test_load_json_missing_file() {
    let dir = TempDir::new().unwrap();
    let result: anyhow::Result<Value> = load_json(&dir.path().join("nope.json"));
    assert!(result.is_err());
}

// ============================================================================
// Run Context Tests
// ============================================================================

#[test]
fn test_run_context_creates_directory_and_manifest() {
    let dir = TempDir::new().unwrap();
    let context = RunContext::create(dir.path(), Some("https://a.com/")).unwrap();

    assert!(context.dir().is_dir());
    assert_eq!(
        context.dir(),
        dir.path()
            .canonicalize()
            .unwrap()
            .join(context.run_id().to_string())
    );

    let manifest = RunManifest::load(&context.dir().join(MANIFEST_FILE)).unwrap();
    assert_eq!(manifest.run_id, context.run_id());
    assert_eq!(manifest.target.as_deref(), Some("https://a.com/"));
    assert!(manifest.artifact(Stage::Crawl).is_none());
}

#[test]
fn test_record_rewrites_manifest() {
    let dir = TempDir::new().unwrap();
    let mut context = RunContext::create(dir.path(), None).unwrap();

    let urls_path = context.artifact_path(Stage::Urls);
    write_url_list(&["https://a.com/".to_string()], &urls_path).unwrap();
    context.record(Stage::Urls, urls_path.clone()).unwrap();

    let manifest = RunManifest::load(&context.manifest_path()).unwrap();
    assert_eq!(manifest.artifact(Stage::Urls), Some(urls_path.as_path()));
    assert!(manifest.artifact(Stage::Links).is_none());

    let raw: Value = load_json(&context.manifest_path()).unwrap();
    assert!(raw["artifacts"]["urls"].as_str().unwrap().ends_with("urls.txt"));
    assert!(raw["runId"].is_string());
    assert!(raw["startedAt"].is_string());
}

#[test]
fn test_run_directory_is_recorded_as_absolute_path() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    let indirect = dir.path().join("nested").join("..").join("runs");

    let mut context = RunContext::create(&indirect, None).unwrap();
    let urls_path = context.artifact_path(Stage::Urls);
    write_url_list(&["https://a.com/".to_string()], &urls_path).unwrap();
    context.record(Stage::Urls, urls_path).unwrap();

    let manifest = RunManifest::load(&context.manifest_path()).unwrap();
    assert!(manifest.output_dir.is_absolute());
    assert!(
        !manifest
            .output_dir
            .components()
            .any(|c| c == std::path::Component::ParentDir)
    );
    assert_eq!(
        manifest.output_dir,
        dir.path().canonicalize().unwrap().join("runs").join(context.run_id().to_string())
    );
    assert!(manifest.artifact(Stage::Urls).unwrap().is_absolute());
}

#[test]
fn test_runs_are_independent() {
    let dir = TempDir::new().unwrap();
    let first = RunContext::create(dir.path(), None).unwrap();
    let second = RunContext::create(dir.path(), None).unwrap();

    assert_ne!(first.run_id(), second.run_id());
    assert_ne!(first.dir(), second.dir());
}

#[test]
fn test_stage_file_names() {
    assert_eq!(Stage::Urls.file_name(), "urls.txt");
    assert_eq!(Stage::Audit.file_name(), "lighthouse.json");
    assert_eq!(Stage::Sitemap.file_name(), "sitemap-diff.json");
}
