use serde::Serialize;

use crate::body::Body;
use crate::error::EdgeError;
use crate::http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    response_builder, HeaderValue, Response, StatusCode,
};

/// Convert common return types into `Response`.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response {
        self
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, self)
    }
}

impl IntoResponse for &str {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::OK, Body::text(self))
    }
}

impl IntoResponse for () {
    fn into_response(self) -> Response {
        response_with_body(StatusCode::NO_CONTENT, Body::empty())
    }
}

impl<T> IntoResponse for (StatusCode, T)
where
    T: IntoResponse,
{
    fn into_response(self) -> Response {
        let (status, inner) = self;
        let mut response = inner.into_response();
        *response.status_mut() = status;
        response
    }
}

pub fn response_with_body(status: StatusCode, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;

    let buffered_len = match response.body() {
        Body::Once(bytes) => Some(bytes.len()),
        Body::Stream(_) => None,
    };
    if let Some(len) = buffered_len {
        if len > 0 {
            let length = HeaderValue::from(len);
            let headers = response.headers_mut();
            headers.insert(CONTENT_LENGTH, length);
            headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
    }

    response
}

/// Serialize `value` into a JSON response with the given status.
pub fn json_response<T>(status: StatusCode, value: &T) -> Result<Response, EdgeError>
where
    T: Serialize,
{
    let body = Body::json(value).map_err(EdgeError::internal)?;
    response_builder()
        .status(status)
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .body(body)
        .map_err(EdgeError::internal)
}
