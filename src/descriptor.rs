use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

/// HTTP method of a [`RequestDescriptor`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// JSON body captured when the descriptor is built.
///
/// A value that fails to serialize is kept as its error message so the
/// failure surfaces at translation time.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum JsonBody {
    Value(serde_json::Value),
    Invalid(String),
}

/// Form body encoded when the descriptor is built, or the encoding error.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum FormBody {
    Encoded(String),
    Invalid(String),
}

/// Declarative description of one HTTP call.
#[derive(Clone, Debug, Default)]
pub struct RequestDescriptor {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) headers: HeaderMap,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) json: Option<JsonBody>,
    pub(crate) form: Option<FormBody>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Adds a header override. Overrides always win over client defaults.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Adds every entry of `headers` as an override.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in &headers {
            self.headers.append(name.clone(), value.clone());
        }
        self
    }

    /// Appends one query parameter. Duplicate keys are kept in order.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Sets a JSON body.
    ///
    /// Serialization happens here; an unserializable value makes translation
    /// fail later with [`crate::ClientError::Translation`].
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.json = Some(match serde_json::to_value(body) {
            Ok(value) => JsonBody::Value(value),
            Err(err) => JsonBody::Invalid(err.to_string()),
        });
        self
    }

    /// Sets a URL-encoded form body from a struct, map or list of pairs.
    ///
    /// Nested values cannot be form-encoded; they make translation fail with
    /// [`crate::ClientError::Translation`].
    pub fn form<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        self.form = Some(match serde_urlencoded::to_string(body) {
            Ok(encoded) => FormBody::Encoded(encoded),
            Err(err) => FormBody::Invalid(err.to_string()),
        });
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header_overrides(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn query_params(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn has_json_body(&self) -> bool {
        self.json.is_some()
    }

    pub fn has_form_body(&self) -> bool {
        self.form.is_some()
    }
}
