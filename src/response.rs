use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::{ClientError, RequestDescriptor, ResponseBody, Result};

/// Terminal outcome of [`crate::Client::execute`].
#[derive(Clone, Debug)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HeaderMap,
    /// Raw response bytes.
    pub data: Vec<u8>,
    /// Body decoded according to `Content-Type`.
    pub body: ResponseBody,
    /// Descriptor that produced this response.
    pub request: RequestDescriptor,
    /// Number of requests sent, retries included.
    pub attempts: usize,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserializes the raw body as JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.data).map_err(|err| {
            ClientError::Decode(format!("cannot deserialize response body: {err}"))
        })
    }

    /// Raw body as UTF-8 text.
    pub fn text(&self) -> Result<&str> {
        std::str::from_utf8(&self.data)
            .map_err(|err| ClientError::Decode(format!("response body is not UTF-8: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderMap;
    use serde::Deserialize;

    use crate::{ClientError, RequestDescriptor, Response, ResponseBody};

    fn response(status: u16, data: &[u8]) -> Response {
        Response {
            status,
            headers: HeaderMap::new(),
            data: data.to_vec(),
            body: ResponseBody::Raw(data.to_vec()),
            request: RequestDescriptor::get("/"),
            attempts: 1,
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u64,
        name: String,
    }

    #[test]
    fn typed_json_helper() {
        let user: User = response(200, br#"{"id":7,"name":"Kit"}"#)
            .json()
            .expect("must deserialize");
        assert_eq!(
            user,
            User {
                id: 7,
                name: "Kit".to_owned()
            }
        );
    }

    #[test]
    fn typed_json_helper_reports_decode_error() {
        let err = response(200, b"nope").json::<User>().expect_err("must fail");
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn success_range() {
        assert!(response(204, b"").is_success());
        assert!(!response(404, b"").is_success());
        assert_eq!(response(200, b"hi").text().expect("utf-8"), "hi");
    }
}
