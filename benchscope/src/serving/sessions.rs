//! # Session Route Table and Server
//!
//! ## Namespace
//!
//! ```text
//! GET /{index}/{view}   → view of session {index}
//! GET /{index}          → 302 /{index}/
//! GET /{view}           → 302 /{latest}/{view}
//! ```
//!
//! ## Invariants
//!
//! - Indices start at 0, increase by one per successful registration and are
//!   never reused. Decoding happens before the table lock is taken, so an
//!   artifact that fails to parse never consumes an index.
//! - Routes are only ever added.
//! - The unprefixed redirect routes are installed on the first registration
//!   only, and resolve the latest index at request time.
//!
//! Registration is expected from a single writer (startup scan, then the
//! coordinator's stop); the table lock serialises it regardless.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use log::{info, warn};
use walkdir::WalkDir;

use super::{ProfileData, ProfileViewer, ViewHandler};
use crate::domain::{ServeError, SessionIndex};

/// File extension of CPU-profile artifacts.
pub const PROFILE_EXTENSION: &str = "pprof";

/// What a path resolves to.
#[derive(Clone)]
enum Route {
    View(ViewHandler),
    RedirectToLatest,
}

/// Resolution of one request path against the table.
#[derive(Clone)]
pub enum Resolution {
    View(ViewHandler),
    Redirect(String),
    NotFound,
}

/// Mapping from request paths to handlers.
#[derive(Default)]
pub struct RouteTable {
    routes: HashMap<String, Route>,
    next_index: usize,
    latest: Option<SessionIndex>,
    redirect_installed: bool,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount one session's handlers under the next index and return it.
    pub fn insert_session(&mut self, handlers: Vec<(String, ViewHandler)>) -> SessionIndex {
        let index = SessionIndex(self.next_index);

        if !self.redirect_installed {
            for (route, _) in &handlers {
                self.routes.insert(route.clone(), Route::RedirectToLatest);
            }
            self.redirect_installed = true;
        }

        for (route, handler) in handlers {
            let prefixed = format!("{}/{}", index.prefix(), route.trim_start_matches('/'));
            self.routes.insert(prefixed, Route::View(handler));
        }

        self.next_index += 1;
        self.latest = Some(index);
        index
    }

    /// Most recently registered session.
    #[must_use]
    pub fn latest(&self) -> Option<SessionIndex> {
        self.latest
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.next_index
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.next_index == 0
    }

    /// Resolve a request path (and optional query) to a handler or redirect.
    #[must_use]
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Resolution {
        let with_query = |location: String| match query {
            Some(q) if !q.is_empty() => format!("{location}?{q}"),
            _ => location,
        };

        match self.routes.get(path) {
            Some(Route::View(handler)) => Resolution::View(Arc::clone(handler)),
            Some(Route::RedirectToLatest) => match self.latest {
                Some(latest) => {
                    Resolution::Redirect(with_query(format!("{}{path}", latest.prefix())))
                }
                None => Resolution::NotFound,
            },
            None => {
                // "/3" → "/3/" so relative links on the index page resolve
                let index_route = format!("{path}/");
                let is_session_root = path.len() > 1
                    && path[1..].bytes().all(|b| b.is_ascii_digit())
                    && self.routes.contains_key(&index_route);
                if is_session_root {
                    Resolution::Redirect(with_query(index_route))
                } else {
                    Resolution::NotFound
                }
            }
        }
    }
}

/// Serves every registered CPU-profile session over HTTP.
pub struct SessionServer {
    base_dir: PathBuf,
    viewer: ProfileViewer,
    table: RwLock<RouteTable>,
    scanned: AtomicBool,
    serving: AtomicBool,
}

impl SessionServer {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            viewer: ProfileViewer::new(),
            table: RwLock::new(RouteTable::new()),
            scanned: AtomicBool::new(false),
            serving: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// True once [`SessionServer::serve`] has finished its startup scan.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.serving.load(Ordering::Acquire)
    }

    /// Decode an artifact and mount it as the next session.
    ///
    /// # Errors
    /// Returns an error if the file can't be read or parsed; no index is
    /// consumed in that case.
    pub fn register_session(&self, artifact: &Path) -> Result<SessionIndex, ServeError> {
        let bytes = std::fs::read(artifact)
            .map_err(|source| ServeError::Read {
                path: artifact.to_path_buf(),
                source,
            })?;
        let data = ProfileData::decode(bytes)
            .map_err(|reason| ServeError::Decode {
                path: artifact.to_path_buf(),
                reason,
            })?;

        let title = artifact
            .file_name()
            .map_or_else(|| artifact.display().to_string(), |n| n.to_string_lossy().into_owned());
        let handlers = self.viewer.handlers(&title, Arc::new(data));

        let index = self.write_table().insert_session(handlers);
        info!("Registered session {index}: {}", artifact.display());
        Ok(index)
    }

    /// Artifacts under the base directory, oldest first.
    ///
    /// # Errors
    /// Returns an error if the directory walk fails.
    pub fn discover_artifacts(&self) -> Result<Vec<PathBuf>, ServeError> {
        let mut found: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.base_dir).follow_links(false) {
            let entry = entry.map_err(|e| {
                let msg = e.to_string();
                ServeError::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other(msg)))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PROFILE_EXTENSION) {
                continue;
            }
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((modified, path.to_path_buf()));
        }
        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Register every artifact already on disk.
    ///
    /// Unparseable artifacts are skipped with a warning so one corrupt file
    /// doesn't hide the rest of the history.
    ///
    /// # Errors
    /// Returns an error if the base directory can't be created or walked.
    pub fn load_existing(&self) -> Result<usize, ServeError> {
        std::fs::create_dir_all(&self.base_dir)?;
        let mut loaded = 0;
        for artifact in self.discover_artifacts()? {
            match self.register_session(&artifact) {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Skipping artifact: {e}"),
            }
        }
        Ok(loaded)
    }

    /// Router that dispatches every request through the route table.
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new().fallback(dispatch).with_state(Arc::clone(self))
    }

    /// Scan the base directory (first call only), then serve until the
    /// listener fails. Retrying after a failed bind does not register the
    /// same artifacts again.
    ///
    /// # Errors
    /// Returns an error if startup fails or the server stops with an error.
    pub async fn serve(self: Arc<Self>, addr: SocketAddr) -> Result<(), ServeError> {
        if self.scanned.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            let scanner = Arc::clone(&self);
            let scan = tokio::task::spawn_blocking(move || scanner.load_existing())
                .await
                .map_err(|e| ServeError::Io(std::io::Error::other(e)))
                .and_then(|loaded| loaded);
            match scan {
                Ok(loaded) => {
                    info!("Loaded {loaded} profile sessions from {}", self.base_dir.display());
                }
                Err(e) => {
                    // Nothing was registered; let the next call scan again.
                    self.scanned.store(false, Ordering::Release);
                    return Err(e);
                }
            }
        }
        self.serving.store(true, Ordering::Release);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServeError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("Serving profiles on http://{addr}");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Resolve a path against the current table.
    #[must_use]
    pub fn resolve(&self, path: &str, query: Option<&str>) -> Resolution {
        self.read_table().resolve(path, query)
    }

    /// Most recently registered session.
    #[must_use]
    pub fn latest(&self) -> Option<SessionIndex> {
        self.read_table().latest()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.read_table().len()
    }

    // A panicking writer can't leave the table half-updated (insert_session
    // only appends), so a poisoned lock is still safe to use.
    fn read_table(&self) -> RwLockReadGuard<'_, RouteTable> {
        self.table.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write_table(&self) -> RwLockWriteGuard<'_, RouteTable> {
        self.table.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

async fn dispatch(State(server): State<Arc<SessionServer>>, uri: Uri) -> Response {
    match server.resolve(uri.path(), uri.query()) {
        Resolution::View(handler) => match tokio::task::spawn_blocking(move || handler()).await {
            Ok(Ok(view)) => {
                ([(header::CONTENT_TYPE, view.content_type)], view.body).into_response()
            }
            Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        },
        Resolution::Redirect(location) => (
            StatusCode::FOUND,
            [(header::LOCATION, location.as_str()), (header::CACHE_CONTROL, "no-store")],
        )
            .into_response(),
        Resolution::NotFound => (StatusCode::NOT_FOUND, "404 page not found\n").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serving::viewer::ViewResponse;

    fn fake_handlers(tag: &'static str) -> Vec<(String, ViewHandler)> {
        ["/", "/top"]
            .iter()
            .map(|route| {
                let handler: ViewHandler = Arc::new(move || {
                    Ok(ViewResponse {
                        content_type: "text/plain",
                        body: tag.as_bytes().to_vec(),
                    })
                });
                ((*route).to_string(), handler)
            })
            .collect()
    }

    fn body(resolution: Resolution) -> String {
        match resolution {
            Resolution::View(handler) => {
                String::from_utf8(handler().expect("render").body).expect("utf8")
            }
            Resolution::Redirect(to) => format!("redirect {to}"),
            Resolution::NotFound => "not found".to_string(),
        }
    }

    #[test]
    fn test_indices_start_at_zero_and_increase() {
        let mut table = RouteTable::new();
        assert_eq!(table.insert_session(fake_handlers("a")), SessionIndex(0));
        assert_eq!(table.insert_session(fake_handlers("b")), SessionIndex(1));
        assert_eq!(table.insert_session(fake_handlers("c")), SessionIndex(2));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_prefixed_routes_do_not_collide() {
        let mut table = RouteTable::new();
        table.insert_session(fake_handlers("first"));
        table.insert_session(fake_handlers("second"));

        assert_eq!(body(table.resolve("/0/top", None)), "first");
        assert_eq!(body(table.resolve("/1/top", None)), "second");
        assert_eq!(body(table.resolve("/1/", None)), "second");
    }

    #[test]
    fn test_redirect_follows_latest_session() {
        let mut table = RouteTable::new();
        assert_eq!(body(table.resolve("/top", None)), "not found");

        table.insert_session(fake_handlers("a"));
        assert_eq!(body(table.resolve("/top", None)), "redirect /0/top");

        table.insert_session(fake_handlers("b"));
        assert_eq!(body(table.resolve("/top", None)), "redirect /1/top");
        assert_eq!(body(table.resolve("/", Some("x=1"))), "redirect /1/?x=1");
    }

    #[test]
    fn test_session_root_redirects_to_trailing_slash() {
        let mut table = RouteTable::new();
        table.insert_session(fake_handlers("a"));
        assert_eq!(body(table.resolve("/0", None)), "redirect /0/");
        assert_eq!(body(table.resolve("/7", None)), "not found");
        assert_eq!(body(table.resolve("/0/missing", None)), "not found");
    }

    #[test]
    fn test_failed_registration_does_not_consume_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = SessionServer::new(dir.path());

        let bad = dir.path().join("broken.pprof");
        std::fs::write(&bad, [0xff, 0xff, 0xff]).expect("write");
        assert!(matches!(server.register_session(&bad), Err(ServeError::Decode { .. })));
        assert!(server.register_session(&dir.path().join("missing.pprof")).is_err());

        let good = dir.path().join("good.pprof");
        std::fs::write(&good, crate::serving::profile_data::tests::sample_profile_bytes())
            .expect("write");
        assert_eq!(server.register_session(&good).expect("register"), SessionIndex(0));
    }

    #[test]
    fn test_discover_filters_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(dir.path().join("nested")).expect("mkdir");
        std::fs::write(dir.path().join("a.pprof"), b"x").expect("write");
        std::fs::write(dir.path().join("nested/b.pprof"), b"x").expect("write");
        std::fs::write(dir.path().join("notes.txt"), b"x").expect("write");

        let server = SessionServer::new(dir.path());
        let found = server.discover_artifacts().expect("discover");
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.extension().is_some_and(|e| e == "pprof")));
    }

    #[tokio::test]
    async fn test_serve_retry_does_not_rescan() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("2024_01_01_00_00_00.pprof"),
            crate::serving::profile_data::tests::sample_profile_bytes(),
        )
        .expect("write");
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = occupied.local_addr().expect("addr");
        let server = Arc::new(SessionServer::new(dir.path()));

        let first = Arc::clone(&server).serve(addr).await;
        assert!(matches!(first, Err(ServeError::Bind { .. })));
        assert_eq!(server.session_count(), 1);

        let second = Arc::clone(&server).serve(addr).await;
        assert!(matches!(second, Err(ServeError::Bind { .. })));
        assert_eq!(server.session_count(), 1);
        assert_eq!(server.latest(), Some(SessionIndex(0)));
    }
}
