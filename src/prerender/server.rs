//! Local static file server for the distributable tree.
//!
//! Serves files from the root directory and falls back to `index.html` for
//! any path without a file extension, so the browser can navigate straight to
//! deep application routes. The server runs on a background thread and stops
//! when the [`StaticServer`] is dropped.

use percent_encoding::percent_decode_str;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};
use tracing::debug;

/// Document served for extension-less paths.
pub const FALLBACK_DOCUMENT: &str = "index.html";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind 127.0.0.1:{port}: {message}")]
    Bind { port: u16, message: String },
}

/// A running static file server. Dropping it stops the server.
pub struct StaticServer {
    server: Arc<Server>,
    port: u16,
    handle: Option<JoinHandle<()>>,
}

impl StaticServer {
    /// Start serving `root` on `127.0.0.1:port`. Port 0 picks a free port.
    pub fn start(root: &Path, port: u16) -> Result<Self, ServerError> {
        let server = Server::http(("127.0.0.1", port)).map_err(|e| ServerError::Bind {
            port,
            message: e.to_string(),
        })?;
        let port = server
            .server_addr()
            .to_ip()
            .map(|addr| addr.port())
            .unwrap_or(port);
        let server = Arc::new(server);

        let root = root.to_path_buf();
        let worker = Arc::clone(&server);
        let handle = thread::spawn(move || {
            for request in worker.incoming_requests() {
                serve(&root, request);
            }
        });

        debug!(port, "static server started");
        Ok(Self {
            server,
            port,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        debug!(port = self.port, "static server stopped");
    }
}

/// Map a request path to the file that should answer it.
///
/// - an existing file under `root` is served as-is
/// - a missing path with an extension is a 404
/// - any other path gets the fallback document
/// - `..` segments are always a 404, checked after percent-decoding
/// - a path that does not decode to UTF-8 is a 404
pub fn resolve_request(root: &Path, url: &str) -> Option<PathBuf> {
    let raw = url.split(['?', '#']).next().unwrap_or_default();
    let path = percent_decode_str(raw).decode_utf8().ok()?;
    let relative = Path::new(path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }

    let candidate = root.join(relative);
    if !relative.as_os_str().is_empty() && candidate.is_file() {
        return Some(candidate);
    }
    if relative.extension().is_some() {
        return None;
    }
    Some(root.join(FALLBACK_DOCUMENT))
}

fn content_type(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "html" => "text/html; charset=utf-8",
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "json" | "webmanifest" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

fn serve(root: &Path, request: Request) {
    let url = request.url().to_string();
    let file = resolve_request(root, &url).and_then(|p| fs::File::open(&p).ok().map(|f| (p, f)));

    let result = match file {
        Some((path, file)) => {
            let mut response = Response::from_file(file);
            if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], content_type(&path).as_bytes()) {
                response.add_header(header);
            }
            request.respond(response)
        }
        None => request.respond(Response::from_string("Not Found").with_status_code(404)),
    };
    if let Err(e) = result {
        debug!(%url, error = %e, "failed to send response");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;
    use tempfile::TempDir;

    fn site() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("index.html"), "<html>shell</html>").unwrap();
        fs::create_dir_all(tmp.path().join("assets")).unwrap();
        fs::write(tmp.path().join("assets/app.js"), "console.log(1)").unwrap();
        tmp
    }

    fn get(port: u16, path: &str) -> String {
        let mut stream = TcpStream::connect(("127.0.0.1", port)).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").unwrap();
        let mut body = String::new();
        stream.read_to_string(&mut body).unwrap();
        body
    }

    #[test]
    fn existing_file_is_served() {
        let tmp = site();
        assert_eq!(
            resolve_request(tmp.path(), "/assets/app.js"),
            Some(tmp.path().join("assets/app.js"))
        );
    }

    #[test]
    fn deep_route_falls_back_to_index() {
        let tmp = site();
        assert_eq!(
            resolve_request(tmp.path(), "/catalogs/c/templates/t1?x=1"),
            Some(tmp.path().join("index.html"))
        );
        assert_eq!(resolve_request(tmp.path(), "/"), Some(tmp.path().join("index.html")));
    }

    #[test]
    fn missing_file_with_extension_is_not_found() {
        let tmp = site();
        assert_eq!(resolve_request(tmp.path(), "/assets/missing.css"), None);
    }

    #[test]
    fn parent_segments_are_rejected() {
        let tmp = site();
        assert_eq!(resolve_request(tmp.path(), "/../etc/passwd"), None);
        assert_eq!(resolve_request(tmp.path(), "/assets/../../x"), None);
    }

    #[test]
    fn escaped_names_are_decoded() {
        let tmp = site();
        fs::write(tmp.path().join("assets/my pic.png"), "png").unwrap();
        fs::write(tmp.path().join("assets/café.svg"), "svg").unwrap();
        assert_eq!(
            resolve_request(tmp.path(), "/assets/my%20pic.png"),
            Some(tmp.path().join("assets/my pic.png"))
        );
        assert_eq!(
            resolve_request(tmp.path(), "/assets/caf%C3%A9.svg?v=2"),
            Some(tmp.path().join("assets/café.svg"))
        );
    }

    #[test]
    fn encoded_parent_segments_and_bad_utf8_are_rejected() {
        let tmp = site();
        assert_eq!(resolve_request(tmp.path(), "/%2e%2e/etc/passwd"), None);
        assert_eq!(resolve_request(tmp.path(), "/assets%2F..%2F..%2Fx"), None);
        assert_eq!(resolve_request(tmp.path(), "/assets/%FF.png"), None);
    }

    #[test]
    fn content_type_by_extension() {
        assert_eq!(content_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(content_type(Path::new("a.JS")), "application/javascript");
        assert_eq!(content_type(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn server_answers_files_and_fallback_then_stops() {
        let tmp = site();
        let server = StaticServer::start(tmp.path(), 0).unwrap();
        let port = server.port();
        assert_ne!(port, 0);

        let js = get(port, "/assets/app.js");
        assert!(js.starts_with("HTTP/1.1 200"));
        assert!(js.contains("application/javascript"));
        assert!(js.ends_with("console.log(1)"));

        let shell = get(port, "/catalogs/c/templates/t1");
        assert!(shell.ends_with("<html>shell</html>"));

        fs::write(tmp.path().join("assets/my pic.png"), "png").unwrap();
        let escaped = get(port, "/assets/my%20pic.png");
        assert!(escaped.starts_with("HTTP/1.1 200"));
        assert!(escaped.ends_with("png"));

        let missing = get(port, "/nope.png");
        assert!(missing.starts_with("HTTP/1.1 404"));

        // Drop joins the serving thread
        drop(server);
    }
}
