//! Prerender worker integration tests against a real headless Chrome.
//!
//! A tiny single-page app renders the template id from the URL, then
//! dispatches `prerender-ready`, except for templates whose id starts with
//! `stuck`, which never signal.
//!
//! Run with: `cargo test --test browser_prerender -- --ignored`

use serde_json::json;
use std::fs;
use std::net::TcpListener;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const CATALOG: &str = "1b4e28ba-2fa1-4d2b-a883-6b1e0f6c1a01";

const APP: &str = r#"<!doctype html>
<html>
<head><title>catalog</title></head>
<body class="app">
<div id="root">loading</div>
<script>
  const parts = location.pathname.split("/");
  const template = parts[parts.length - 1];
  setTimeout(() => {
    const consent = localStorage.getItem("tosAcceptedDate") ? "consented" : "no-consent";
    document.getElementById("root").textContent = "template " + template + " " + consent;
    if (!template.startsWith("stuck")) {
      document.dispatchEvent(new Event("prerender-ready"));
    }
  }, 50);
</script>
</body>
</html>"#;

fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn setup(templates: &[&str]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    let dist = tmp.path().join("dist");
    let catalog_dir = dist.join("democatalogs").join(CATALOG);
    fs::create_dir_all(&catalog_dir).unwrap();
    fs::write(dist.join("index.html"), APP).unwrap();

    let records: Vec<_> = templates.iter().map(|t| json!({"id": t})).collect();
    fs::write(
        catalog_dir.join("catalog.json"),
        json!({"id": CATALOG, "owner": "owner", "templates": records}).to_string(),
    )
    .unwrap();
    fs::write(
        tmp.path().join("catalog-prerender.toml"),
        "[prerender]\nready_timeout_secs = 2\n",
    )
    .unwrap();
    tmp
}

fn run_worker(dir: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_catalog-prerender"))
        .current_dir(dir)
        .args([
            "prerender-worker",
            "democatalogs",
            CATALOG,
            "--port",
            &free_port().to_string(),
        ])
        .env("CATALOG_PRERENDER_ENV", "production")
        .output()
        .expect("failed to run catalog-prerender")
}

fn snapshot(dir: &Path, template: &str) -> std::path::PathBuf {
    dir.join(format!("dist/catalogs/{CATALOG}/templates/{template}/index.html"))
}

#[test]
#[ignore]
fn worker_snapshots_ready_pages() {
    let tmp = setup(&["t1", "t2"]);
    let out = run_worker(tmp.path());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(out.status.success(), "{stderr}");
    assert!(stderr.contains("mode=production"), "{stderr}");

    for t in ["t1", "t2"] {
        let html = fs::read_to_string(snapshot(tmp.path(), t)).unwrap();
        assert!(html.contains(r#"<body class="unhydrated app">"#), "{html}");
        assert!(html.contains(&format!("template {t} consented")), "{html}");
    }
}

#[test]
#[ignore]
fn stuck_route_is_skipped_and_later_routes_still_render() {
    let tmp = setup(&["stuck-1", "t2"]);
    let out = run_worker(tmp.path());
    let stdout = String::from_utf8_lossy(&out.stdout);

    assert!(out.status.success(), "teardown reached, so the worker exits 0");
    assert!(stdout.contains("Failed: Timed out after 2s waiting for `prerender-ready`"));
    assert!(stdout.contains("Prerendered 1 of 2 routes"));
    assert!(!snapshot(tmp.path(), "stuck-1").exists());
    assert!(snapshot(tmp.path(), "t2").is_file());
}

#[test]
#[ignore]
fn missing_content_document_renders_nothing() {
    let tmp = setup(&[]);
    fs::remove_file(tmp.path().join(format!("dist/democatalogs/{CATALOG}/catalog.json"))).unwrap();
    let out = run_worker(tmp.path());
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stdout).contains("Prerendered 0 of 0 routes"));
}
