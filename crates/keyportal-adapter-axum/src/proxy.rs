use std::time::Duration;

use async_trait::async_trait;
use keyportal_core::body::Body;
use keyportal_core::error::EdgeError;
use keyportal_core::http::{header::HOST, HeaderName, HeaderValue, Method, StatusCode, Uri};
use keyportal_core::proxy::{ProxyClient, ProxyRequest, ProxyResponse};
use reqwest::{header, Client};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// reqwest-backed transport standing in for a platform service binding.
///
/// Without an upstream the request URL is used as-is. [`AxumProxyClient::bound_to`] re-targets
/// every request at a fixed origin, keeping path and query, which is what a Worker service
/// binding does for the forwarder.
#[derive(Clone, Debug)]
pub struct AxumProxyClient {
    client: Client,
    upstream: Option<Uri>,
}

impl AxumProxyClient {
    pub fn new() -> Result<Self, EdgeError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(EdgeError::internal)?;
        Ok(Self {
            client,
            upstream: None,
        })
    }

    /// Send every request to `origin` (scheme and authority only).
    pub fn bound_to(mut self, origin: Uri) -> Self {
        self.upstream = Some(origin);
        self
    }

    pub fn upstream(&self) -> Option<&Uri> {
        self.upstream.as_ref()
    }

    fn target(&self, uri: &Uri) -> Result<Uri, EdgeError> {
        let Some(origin) = &self.upstream else {
            return Ok(uri.clone());
        };
        let (Some(scheme), Some(authority)) = (origin.scheme_str(), origin.authority()) else {
            return Err(EdgeError::upstream(format!(
                "upstream origin `{origin}` must include scheme and host"
            )));
        };
        let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
        format!("{scheme}://{authority}{path_and_query}")
            .parse()
            .map_err(EdgeError::internal)
    }
}

#[async_trait(?Send)]
impl ProxyClient for AxumProxyClient {
    async fn send(&self, request: ProxyRequest) -> Result<ProxyResponse, EdgeError> {
        let (method, uri, headers, body, _extensions) = request.into_parts();
        let target = self.target(&uri)?;
        let retargeted = target != uri;
        log::debug!("upstream request method={} url={}", method, target);

        let mut builder = self
            .client
            .request(reqwest_method(&method)?, target.to_string());

        for (name, value) in headers.iter() {
            if retargeted && *name == HOST {
                continue;
            }
            let header_name = header::HeaderName::from_bytes(name.as_str().as_bytes())
                .map_err(EdgeError::internal)?;
            let header_value =
                header::HeaderValue::from_bytes(value.as_bytes()).map_err(EdgeError::internal)?;
            builder = builder.header(header_name, header_value);
        }

        let payload = body.collect().await.map_err(EdgeError::internal)?;
        if !payload.is_empty() {
            builder = builder.body(payload);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| EdgeError::upstream(err.to_string()))?;
        let status =
            StatusCode::from_u16(response.status().as_u16()).map_err(EdgeError::internal)?;
        let mut proxy_response = ProxyResponse::new(status, Body::empty());

        for (name, value) in response.headers().iter() {
            let header_name =
                HeaderName::from_bytes(name.as_str().as_bytes()).map_err(EdgeError::internal)?;
            let header_value =
                HeaderValue::from_bytes(value.as_bytes()).map_err(EdgeError::internal)?;
            proxy_response
                .headers_mut()
                .append(header_name, header_value);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| EdgeError::upstream(err.to_string()))?;
        *proxy_response.body_mut() = Body::from_bytes(bytes);

        Ok(proxy_response)
    }
}

fn reqwest_method(method: &Method) -> Result<reqwest::Method, EdgeError> {
    reqwest::Method::from_bytes(method.as_str().as_bytes()).map_err(EdgeError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_all_methods_to_reqwest() {
        let cases = [
            (Method::GET, reqwest::Method::GET),
            (Method::POST, reqwest::Method::POST),
            (Method::PUT, reqwest::Method::PUT),
            (Method::DELETE, reqwest::Method::DELETE),
            (Method::PATCH, reqwest::Method::PATCH),
            (Method::HEAD, reqwest::Method::HEAD),
            (Method::OPTIONS, reqwest::Method::OPTIONS),
        ];
        for (input, expected) in cases {
            assert_eq!(reqwest_method(&input).expect("method"), expected);
        }
    }

    #[test]
    fn unbound_client_keeps_request_url() {
        let client = AxumProxyClient::new().expect("client");
        assert!(client.upstream().is_none());
        let uri = Uri::from_static("https://portal.example.com/keys?x=1");
        assert_eq!(client.target(&uri).expect("target"), uri);
    }

    #[test]
    fn bound_client_retargets_origin_only() {
        let client = AxumProxyClient::new()
            .expect("client")
            .bound_to(Uri::from_static("http://127.0.0.1:8788"));
        let target = client
            .target(&Uri::from_static(
                "https://portal.example.com/keys?status=active&limit=10",
            ))
            .expect("target");
        assert_eq!(
            target.to_string(),
            "http://127.0.0.1:8788/keys?status=active&limit=10"
        );
    }

    #[test]
    fn bound_client_rejects_relative_origin() {
        let client = AxumProxyClient::new()
            .expect("client")
            .bound_to(Uri::from_static("/relative"));
        let err = client
            .target(&Uri::from_static("https://a.test/keys"))
            .expect_err("error");
        assert!(err.message().contains("scheme and host"));
    }
}
