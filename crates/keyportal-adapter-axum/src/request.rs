use axum::body::Body as AxumBody;
use axum::http::Request;
use http::header::{CONTENT_TYPE, HOST};
use http::{HeaderMap, HeaderValue, Uri};
use keyportal_core::body::Body;
use keyportal_core::error::EdgeError;
use keyportal_core::http::Request as CoreRequest;

const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Convert a hyper request into a core request.
///
/// Hyper hands servers origin-form URIs (`/api/keys?x=1`); the URI is made absolute from the
/// `Host` header so handlers see the same shape of URL a Worker does. JSON bodies are buffered,
/// everything else stays streaming.
pub async fn into_core_request(request: Request<AxumBody>) -> Result<CoreRequest, EdgeError> {
    let (mut parts, body) = request.into_parts();
    parts.uri = absolute_uri(&parts.uri, &parts.headers)?;

    let body = if parts.headers.get(CONTENT_TYPE).is_some_and(is_json) {
        let bytes = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|err| EdgeError::bad_request(format!("failed to read request body: {err}")))?;
        Body::from_bytes(bytes)
    } else {
        Body::from_stream(body.into_data_stream())
    };

    Ok(CoreRequest::from_parts(parts, body))
}

fn absolute_uri(uri: &Uri, headers: &HeaderMap) -> Result<Uri, EdgeError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Ok(uri.clone());
    }

    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .unwrap_or("localhost");
    let scheme = headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    format!("{scheme}://{host}{path_and_query}")
        .parse()
        .map_err(|err| EdgeError::bad_request(format!("invalid request URL: {err}")))
}

fn is_json(value: &HeaderValue) -> bool {
    let Ok(raw) = value.to_str() else {
        return false;
    };
    let media_type = raw.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    match media_type.split_once('/') {
        Some(("application", "json")) => true,
        Some(("application", subtype)) => subtype.ends_with("+json"),
        _ => false,
    }
}
