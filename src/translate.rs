use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Url,
};

use crate::{
    descriptor::{FormBody, JsonBody},
    ClientError, Method, RequestDescriptor, Result,
};

pub(crate) const APPLICATION_JSON: &str = "application/json";
pub(crate) const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Value of the `Authorization` header for these credentials.
    pub fn header_value(&self) -> Result<HeaderValue> {
        let encoded = STANDARD.encode(format!("{}:{}", self.username, self.password));
        let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
            .map_err(|err| ClientError::Translation(format!("invalid basic auth header: {err}")))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client-level values every request inherits.
#[derive(Clone, Debug, Default)]
pub struct RequestDefaults {
    pub base_url: String,
    pub headers: HeaderMap,
    pub basic_auth: Option<BasicAuth>,
}

/// Wire request produced from a descriptor. Read-only once built.
#[derive(Clone, Debug)]
pub struct ResolvedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Vec<u8>>,
}

impl ResolvedRequest {
    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

/// Resolves `descriptor` against the client defaults.
pub fn translate(
    descriptor: &RequestDescriptor,
    defaults: &RequestDefaults,
) -> Result<ResolvedRequest> {
    let (body, content_type) = encode_body(descriptor)?;
    let url = build_url(&defaults.base_url, &descriptor.path, &descriptor.query)?;

    let mut headers = descriptor.headers.clone();
    if let Some(content_type) = content_type {
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }
    for name in defaults.headers.keys() {
        if headers.contains_key(name) {
            continue;
        }
        for value in defaults.headers.get_all(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    if let Some(auth) = &defaults.basic_auth {
        if !headers.contains_key(AUTHORIZATION) {
            headers.insert(AUTHORIZATION, auth.header_value()?);
        }
    }

    Ok(ResolvedRequest {
        method: descriptor.method,
        url,
        headers,
        body,
    })
}

fn encode_body(descriptor: &RequestDescriptor) -> Result<(Option<Vec<u8>>, Option<&'static str>)> {
    match (&descriptor.json, &descriptor.form) {
        (Some(_), Some(_)) => Err(ClientError::Config(
            "a request cannot carry both a JSON body and a form body".to_owned(),
        )),
        (Some(JsonBody::Invalid(err)), None) => Err(ClientError::Translation(format!(
            "failed to serialize JSON body: {err}"
        ))),
        (Some(JsonBody::Value(value)), None) => {
            let bytes = serde_json::to_vec(value).map_err(|err| {
                ClientError::Translation(format!("failed to serialize JSON body: {err}"))
            })?;
            Ok((Some(bytes), Some(APPLICATION_JSON)))
        }
        (None, Some(FormBody::Invalid(err))) => Err(ClientError::Translation(format!(
            "failed to encode form body: {err}"
        ))),
        (None, Some(FormBody::Encoded(encoded))) => {
            Ok((Some(encoded.clone().into_bytes()), Some(FORM_URLENCODED)))
        }
        (None, None) => Ok((None, None)),
    }
}

fn build_url(base_url: &str, path: &str, query: &[(String, String)]) -> Result<Url> {
    let raw = format!("{base_url}{path}");
    let mut url = Url::parse(&raw)
        .map_err(|err| ClientError::Translation(format!("invalid request URL '{raw}': {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ClientError::Translation(format!(
            "request URL '{raw}' must be an absolute http or https URL"
        )));
    }
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}
