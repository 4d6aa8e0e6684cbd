//! A stand-in backend.  It records every request it is sent and
//! answers from a routing closure.
#![allow(dead_code)]

use edu_admin::api_client::ApiClient;
use edu_admin::config::ClientConfig;
use edu_admin::token_store::{MemoryTokenStore, TokenStore};
use hyper::body;
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server, StatusCode};
use serde_json::Value;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    /// Path and query, as sent
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Request body is JSON")
    }
}

type Router = dyn Fn(&Recorded) -> Response<Body> + Send + Sync;

pub struct Backend {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Backend {
    /// Serve on an ephemeral port until the test's runtime stops
    pub async fn start(router: impl Fn(&Recorded) -> Response<Body> + Send + Sync + 'static) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let router: Arc<Router> = Arc::new(router);
        let log = Arc::clone(&requests);
        let service = make_service_fn(move |_| {
            let router = Arc::clone(&router);
            let log = Arc::clone(&log);
            async move {
                Ok::<_, Infallible>(service_fn(move |req: Request<Body>| {
                    let router = Arc::clone(&router);
                    let log = Arc::clone(&log);
                    async move {
                        let (parts, body) = req.into_parts();
                        let bytes = body::to_bytes(body).await.expect("Read request body");
                        let recorded = Recorded {
                            method: parts.method.to_string(),
                            uri: parts
                                .uri
                                .path_and_query()
                                .map(|pq| pq.as_str().to_string())
                                .unwrap_or_default(),
                            headers: parts.headers,
                            body: bytes.to_vec(),
                        };
                        let response = router(&recorded);
                        log.lock().unwrap().push(recorded);
                        Ok::<_, Infallible>(response)
                    }
                }))
            }
        });
        let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(service);
        let addr = server.local_addr();
        tokio::spawn(server);
        Self { addr, requests }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last(&self) -> Recorded {
        self.requests()
            .pop()
            .expect("Backend received no requests")
    }

    pub fn client(&self, store: Arc<MemoryTokenStore>) -> ApiClient {
        let store: Arc<dyn TokenStore> = store;
        ApiClient::new(&ClientConfig::new(self.url().as_str()), store).expect("Build client")
    }
}

pub fn json(status: StatusCode, value: Value) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

pub fn text(status: StatusCode, content_type: &str, text: &str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(text.to_string()))
        .unwrap()
}

/// Answers every request with the request's own path in a JSON object
pub fn echo_path(req: &Recorded) -> Response<Body> {
    json(
        StatusCode::OK,
        serde_json::json!({ "method": req.method, "uri": req.uri }),
    )
}
