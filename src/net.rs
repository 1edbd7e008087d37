use super::ParserError;
use crate::settings::Settings;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tower::limit::RateLimit;
use tower::{Service, ServiceBuilder};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub(crate) url: String,
}

impl ApiRequest {
    pub fn new(url: impl ToString) -> Self {
        Self {
            url: url.to_string(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub(crate) status: u16,
    pub(crate) body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ParserError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Plain HTTP transport; statuses are handed back to the caller untouched.
#[derive(Debug, Clone)]
pub struct Requestor {
    client: reqwest::Client,
}

impl Requestor {
    pub fn new(settings: &Settings) -> Result<Self, ParserError> {
        let mut headers = HeaderMap::new();
        if !settings.custom.token.is_empty() {
            let token = HeaderValue::from_str(&settings.custom.token)
                .map_err(|_e| ParserError::InvalidToken)?;
            headers.insert(AUTHORIZATION, token);
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self { client })
    }
}

impl Service<ApiRequest> for Requestor {
    type Response = ApiResponse;
    type Error = ParserError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ApiRequest) -> Self::Future {
        let client = self.client.clone();
        Box::pin(async move {
            debug!(url = %req.url, "GET");
            let response = client.get(&req.url).send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?.to_vec();
            Ok(ApiResponse { status, body })
        })
    }
}

/// Builds the transport paced to one request per configured delay.
pub fn service(settings: &Settings) -> Result<RateLimit<Requestor>, ParserError> {
    Ok(ServiceBuilder::new()
        .rate_limit(1, settings.delay())
        .service(Requestor::new(settings)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_response_json() {
        #[derive(serde::Deserialize)]
        struct Body {
            results: Vec<u32>,
        }

        let response = ApiResponse::new(200, r#"{"results": [1, 2]}"#);
        assert!(response.is_success());
        assert_eq!(response.json::<Body>().unwrap().results, vec![1, 2]);
        assert!(ApiResponse::new(200, "oops").json::<Body>().is_err());
        assert!(!ApiResponse::new(423, "").is_success());
    }

    #[test]
    fn test_invalid_token() {
        let mut settings = Settings::default();
        settings.custom.token = String::from("bad\ntoken");
        assert!(matches!(
            Requestor::new(&settings),
            Err(ParserError::InvalidToken)
        ));
    }
}
