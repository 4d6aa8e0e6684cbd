use crate::api_error::ApiError;
use crate::api_error::ApiErrorType;
use crate::api_result::ApiResult;
use crate::api_result::ResponseBody;
use crate::config::{ClientConfig, ErrorMessages};
use crate::session::{LogRedirect, Session, SessionExpired};
use crate::token_store::{FileTokenStore, TokenStore};
use reqwest::header::HeaderMap;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fmt::Display;
use std::path::Path;
use std::result::Result;
use std::sync::Arc;

/// Path of the OAuth2 password-grant endpoint
pub const TOKEN_PATH: &str = "/token";
pub const CURRENT_USER_PATH: &str = "/users/me";

/// A file on its way to a multipart endpoint
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime: Option<String>,
}

impl UploadFile {
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            bytes,
            mime: None,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, ApiError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| ApiError::bare(ApiErrorType::File(format!("{}: {err}", path.display()))))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self {
            file_name,
            bytes,
            mime: None,
        })
    }

    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.to_string());
        self
    }

    fn into_part(self) -> Result<multipart::Part, ApiError> {
        let part = multipart::Part::bytes(self.bytes).file_name(self.file_name);
        match self.mime {
            Some(mime) => part
                .mime_str(mime.as_str())
                .map_err(|err| ApiError::bare(ApiErrorType::File(format!("{mime}: {err}")))),
            None => Ok(part),
        }
    }
}

pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(multipart::Form),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Json(value) => write!(f, "Json({value})"),
            RequestBody::Multipart(form) => write!(f, "Multipart({})", form.boundary()),
        }
    }
}

/// One call to the backend.  Built per request and consumed by
/// `ApiClient::request`
#[derive(Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
    /// Applied over the computed headers
    pub headers: HeaderMap,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
        }
    }

    pub fn json(mut self, value: Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn multipart(mut self, form: multipart::Form) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }

    pub fn header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

/// The one way this crate talks to the education backend.  Cloning is
/// cheap and clones share the session.
#[derive(Clone)]
pub struct ApiClient {
    /// Handles the communications with the backend
    client: Client,

    /// Everything before the resource path
    base_url: String,

    /// The bearer token and where it is persisted
    session: Arc<Session>,

    /// Called when a request comes back 401
    on_expired: Arc<dyn SessionExpired>,

    messages: ErrorMessages,
}

impl Display for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Backend: {}\n\
             Authenticated: {}\n\
             Token key: {}",
            self.base_url,
            self.session.is_authenticated(),
            self.session.key(),
        )
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("session", &self.session)
            .field("messages", &self.messages)
            .finish()
    }
}

impl ApiClient {
    /// Build a client over `store`, picking up any token already in it
    pub fn new(config: &ClientConfig, store: Arc<dyn TokenStore>) -> Result<ApiClient, ApiError> {
        let mut builder = ClientBuilder::new();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let session = Session::restore(config.token_key.as_str(), store)?;
        Ok(ApiClient {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session: Arc::new(session),
            on_expired: Arc::new(LogRedirect {
                entry_page: config.entry_page.clone(),
            }),
            messages: config.messages.clone(),
        })
    }

    /// A client whose token lives in the configured file, or the per
    /// user default file
    pub fn with_file_store(config: &ClientConfig) -> Result<ApiClient, ApiError> {
        let store = match config.token_file {
            Some(ref path) => FileTokenStore::new(path),
            None => FileTokenStore::at_default_location()?,
        };
        Self::new(config, Arc::new(store))
    }

    /// Replace what happens when the session expires
    pub fn on_session_expired(mut self, handler: impl SessionExpired + 'static) -> Self {
        self.on_expired = Arc::new(handler);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn token(&self) -> Option<String> {
        self.session.token()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// No validation of the token's format
    pub fn set_token(&self, token: &str) -> Result<(), ApiError> {
        self.session.set_token(token)
    }

    pub fn remove_token(&self) -> Result<(), ApiError> {
        self.session.clear()
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.remove_token()
    }

    /// `Content-Type: application/json` when `json`, and the bearer
    /// token if there is one.  Multipart requests pass `json = false`
    /// and let the transport write the boundary.  A token that cannot
    /// be sent as a header is an error, never silently left off.
    pub fn build_headers(&self, json: bool) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        if json {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(token) = self.session.token() {
            let mut value = HeaderValue::from_str(format!("Bearer {token}").as_str())
                .map_err(|err| ApiError::bare(ApiErrorType::InvalidToken(err.to_string())))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Send `descriptor` and normalise the outcome.
    ///
    /// * 401: the token is dropped, the session-expired handler runs
    ///   and the caller gets `Unauthorized`
    /// * other non-2xx: `Status` with the server's `detail` if it sent one
    /// * JSON success: the decoded value
    /// * anything else: the unread response
    pub async fn request(
        &self,
        descriptor: RequestDescriptor,
    ) -> Result<ApiResult<ResponseBody>, ApiError> {
        let uri = format!("{}{}", self.base_url, descriptor.path);
        let multipart = descriptor.is_multipart();
        let mut headers = self.build_headers(!multipart)?;
        for (name, value) in descriptor.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }
        log::debug!("{} {uri}", descriptor.method);

        let mut builder = self.client.request(descriptor.method, uri.as_str()).headers(headers);
        builder = match descriptor.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(serde_json::to_vec(&value)?),
            RequestBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = Self::header_map_to_hash_map(response.headers());

        if status == StatusCode::UNAUTHORIZED {
            self.expire_session().await;
            return Err(ApiError::new(
                ApiErrorType::Unauthorized(self.messages.unauthorized.clone()),
                headers,
            ));
        }
        if !status.is_success() {
            let fallback = if multipart {
                self.messages.upload_failed.as_str()
            } else {
                self.messages.request_failed.as_str()
            };
            let text = response.text().await.unwrap_or_default();
            let reason = error_detail(text.as_str())
                .unwrap_or_else(|| format!("{fallback} status: {}", status.as_u16()));
            log::warn!("{uri}: {status} {reason}");
            return Err(ApiError::new(ApiErrorType::Status(status, reason), headers));
        }

        if Self::is_json(response.headers()) {
            let bytes = response.bytes().await?;
            let value: Value = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).map_err(|err| {
                    ApiError::new(ApiErrorType::BadJson(format!("{err}")), headers.clone())
                })?
            };
            Ok(ApiResult::new(ResponseBody::Json(value), headers))
        } else {
            Ok(ApiResult::new(ResponseBody::Raw(response), headers))
        }
    }

    pub async fn get(&self, path: &str) -> Result<ApiResult<ResponseBody>, ApiError> {
        self.request(RequestDescriptor::new(Method::GET, path)).await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<ApiResult<ResponseBody>, ApiError> {
        let value = serde_json::to_value(data)?;
        self.request(RequestDescriptor::new(Method::POST, path).json(value))
            .await
    }

    /// POST with no body at all
    pub async fn post_empty(&self, path: &str) -> Result<ApiResult<ResponseBody>, ApiError> {
        self.request(RequestDescriptor::new(Method::POST, path)).await
    }

    pub async fn put<T: Serialize + ?Sized>(
        &self,
        path: &str,
        data: &T,
    ) -> Result<ApiResult<ResponseBody>, ApiError> {
        let value = serde_json::to_value(data)?;
        self.request(RequestDescriptor::new(Method::PUT, path).json(value))
            .await
    }

    /// PUT with no body at all
    pub async fn put_empty(&self, path: &str) -> Result<ApiResult<ResponseBody>, ApiError> {
        self.request(RequestDescriptor::new(Method::PUT, path)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResult<ResponseBody>, ApiError> {
        self.request(RequestDescriptor::new(Method::DELETE, path)).await
    }

    /// Upload `file` as the multipart field `file`, with every entry of
    /// `extra_fields` as a text field beside it.
    pub async fn upload_file(
        &self,
        path: &str,
        file: UploadFile,
        extra_fields: &BTreeMap<String, String>,
    ) -> Result<ApiResult<ResponseBody>, ApiError> {
        let mut form = multipart::Form::new().part("file", file.into_part()?);
        for (key, value) in extra_fields {
            form = form.text(key.clone(), value.clone());
        }
        self.request(RequestDescriptor::new(Method::POST, path).multipart(form))
            .await
    }

    /// Exchange credentials for a token.
    ///
    /// The token endpoint takes an OAuth2 password-grant form, not
    /// JSON, and its error bodies do not follow the rest of the API, so
    /// this does not go through `request`.  On success the token is
    /// stored and the whole decoded response returned.
    pub async fn login(&self, email: &str, password: &str) -> Result<ApiResult<Value>, ApiError> {
        let uri = format!("{}{TOKEN_PATH}", self.base_url);
        let form = multipart::Form::new()
            .text("username", email.to_string())
            .text("password", password.to_string());
        log::debug!("POST {uri}");
        let response = self.client.post(uri.as_str()).multipart(form).send().await?;

        let status = response.status();
        let headers = Self::header_map_to_hash_map(response.headers());
        let text = response.text().await?;
        if !status.is_success() {
            let reason =
                error_detail(text.as_str()).unwrap_or_else(|| self.messages.login_failed.clone());
            log::warn!("Login refused: {status} {reason}");
            return Err(ApiError::new(ApiErrorType::Login(reason), headers));
        }

        let data: Value = match serde_json::from_str(text.as_str()) {
            Ok(data) => data,
            Err(err) => {
                return Err(ApiError::new(
                    ApiErrorType::BadJson(format!("{err}")),
                    headers,
                ))
            }
        };
        let token = match data.get("access_token").and_then(Value::as_str) {
            Some(token) => token.to_string(),
            None => {
                return Err(ApiError::new(
                    ApiErrorType::BadJson("Login response has no access_token".to_string()),
                    headers,
                ))
            }
        };
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || session.set_token(token.as_str()))
            .await
            .map_err(|err| ApiError::bare(ApiErrorType::Storage(err.to_string())))??;
        Ok(ApiResult::new(data, headers))
    }

    /// Who the token belongs to.  Refuses to ask without a token.
    pub async fn get_current_user(&self) -> Result<ApiResult<ResponseBody>, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::bare(ApiErrorType::NoToken(
                self.messages.no_token.clone(),
            )));
        }
        self.get(CURRENT_USER_PATH).await
    }

    /// Drop the token and tell the host.  A failure to forget the
    /// persisted token must not hide the 401 from the caller.
    async fn expire_session(&self) {
        let session = Arc::clone(&self.session);
        match tokio::task::spawn_blocking(move || session.clear()).await {
            Ok(Ok(())) => (),
            Ok(Err(err)) => log::error!("Failed to remove persisted token: {err}"),
            Err(err) => log::error!("Token removal did not finish: {err}"),
        }
        self.on_expired.session_expired();
    }

    fn is_json(headers: &HeaderMap) -> bool {
        headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false)
    }

    /// Used to adapt headers reported from Reqwest
    fn header_map_to_hash_map(header_map: &HeaderMap) -> HashMap<String, String> {
        let mut hash_map = HashMap::new();
        for (header_name, header_value) in header_map.iter() {
            if let Ok(value) = header_value.to_str() {
                hash_map.insert(header_name.as_str().to_string(), value.to_string());
            }
        }
        hash_map
    }
}

/// The `detail` of a JSON error body.  FastAPI sends a string for
/// handled errors and a list for validation failures.
fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(detail) => Some(detail.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
