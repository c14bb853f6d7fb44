// In-process HTTP fixture for download tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

struct Fixture {
    routes: HashMap<String, (StatusCode, Vec<u8>)>,
    hits: Mutex<HashMap<String, usize>>,
}

pub struct FixtureServer {
    pub addr: SocketAddr,
    fixture: Arc<Fixture>,
    handle: JoinHandle<()>,
}

impl FixtureServer {
    /// Serve the given `(path, status, body)` routes; anything else is a 404.
    pub async fn start(routes: Vec<(&str, StatusCode, Vec<u8>)>) -> Self {
        let fixture = Arc::new(Fixture {
            routes: routes
                .into_iter()
                .map(|(path, status, body)| (path.to_owned(), (status, body)))
                .collect(),
            hits: Mutex::new(HashMap::new()),
        });
        let app = Router::new()
            .fallback(serve_route)
            .with_state(fixture.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            fixture,
            handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/media/", self.addr)
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}/{path}", self.addr)).unwrap()
    }

    /// Number of requests seen for an exact request path.
    pub fn hits(&self, path: &str) -> usize {
        self.fixture
            .hits
            .lock()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(0)
    }
}

impl Drop for FixtureServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_route(State(fixture): State<Arc<Fixture>>, uri: Uri) -> Response {
    let path = uri.path().to_owned();
    *fixture.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    match fixture.routes.get(&path) {
        Some((status, body)) => (*status, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Deterministic non-repeating-looking content of `len` bytes.
pub fn patterned_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn md5_hex(bytes: &[u8]) -> String {
    use md5::{Digest, Md5};
    format!("{:x}", Md5::digest(bytes))
}
