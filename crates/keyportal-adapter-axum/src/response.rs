use axum::body::Body as AxumBody;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use futures::executor::block_on;
use tracing::error;

use keyportal_core::body::Body;
use keyportal_core::http::Response as CoreResponse;

/// Convert a core response into an axum response.
///
/// Core streams are `!Send`, so streaming handler output is collected before it is handed to
/// hyper. Forwarded upstream bodies arrive buffered and are moved across as-is.
pub fn into_axum_response(response: CoreResponse) -> Response<AxumBody> {
    let (parts, body) = response.into_parts();
    let body = match body {
        Body::Once(bytes) => AxumBody::from(bytes),
        stream @ Body::Stream(_) => match block_on(stream.collect()) {
            Ok(bytes) => AxumBody::from(bytes),
            Err(err) => {
                error!("streaming response error: {err}");
                let mut response = Response::new(AxumBody::from("streaming response error"));
                *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                return response;
            }
        },
    };

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;
    use keyportal_core::http::response_builder;

    async fn body_bytes(response: Response<AxumBody>) -> Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
    }

    #[tokio::test]
    async fn buffered_bodies_keep_status_and_headers() {
        let response = response_builder()
            .status(StatusCode::UNAUTHORIZED)
            .header("content-type", "application/json")
            .header("x-upstream", "worker")
            .body(Body::from(r#"{"error":"expired"}"#))
            .expect("response");

        let converted = into_axum_response(response);
        assert_eq!(converted.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(converted.headers()["x-upstream"], "worker");
        assert_eq!(
            body_bytes(converted).await.as_ref(),
            br#"{"error":"expired"}"#
        );
    }

    #[tokio::test]
    async fn streams_are_collected() {
        let body = Body::stream(stream::iter(vec![
            Bytes::from_static(b"hel"),
            Bytes::from_static(b"lo"),
        ]));
        let response = response_builder()
            .status(StatusCode::OK)
            .body(body)
            .expect("response");

        let converted = into_axum_response(response);
        assert_eq!(body_bytes(converted).await.as_ref(), b"hello");
    }

    #[tokio::test]
    async fn failing_streams_become_500() {
        let body = Body::from_stream(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(anyhow::anyhow!("upstream reset")),
        ]));
        let response = response_builder()
            .status(StatusCode::OK)
            .body(body)
            .expect("response");

        let converted = into_axum_response(response);
        assert_eq!(converted.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
