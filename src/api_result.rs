use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug)]
pub struct ApiResult<T> {
    pub headers: HashMap<String, String>,
    pub body: T,
}

impl<T> ApiResult<T> {
    pub fn new(body: T, headers: HashMap<String, String>) -> Self {
        Self { headers, body }
    }
}

/// What a successful call hands back.  JSON responses are decoded,
/// anything else is left unread for the caller.
#[derive(Debug)]
pub enum ResponseBody {
    Json(Value),
    Raw(reqwest::Response),
}

impl ResponseBody {
    pub fn json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            ResponseBody::Json(value) => Some(value),
            ResponseBody::Raw(_) => None,
        }
    }
}

impl ApiResult<ResponseBody> {
    pub fn json(&self) -> Option<&Value> {
        self.body.json()
    }
}
