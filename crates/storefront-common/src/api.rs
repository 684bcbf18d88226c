use std::time::Duration;

use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::model::{
    BrandsEnvelope, CategoriesEnvelope, HistoryAppendRequest, HistorySnapshot, Preferences,
    PreferencesEnvelope, Product, ProductEnvelope, ProductListEnvelope, Recommendation,
    RecommendationsEnvelope, StatusResponse,
};

const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Clone, Debug)]
pub struct ApiClientConfig {
    pub base_url: String,
    /// `None` leaves the HTTP stack default in place.
    pub timeout: Option<Duration>,
    pub max_error_body_bytes: usize,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
            max_error_body_bytes: 8 * 1024,
        }
    }
}

impl ApiClientConfig {
    /// Optional:
    /// - `STOREFRONT_API_URL` (default: "http://localhost:5000/api")
    /// - `STOREFRONT_TIMEOUT_SECS`
    /// - `STOREFRONT_MAX_ERROR_BODY_BYTES` (default: 8192)
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("STOREFRONT_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        let timeout = parse_timeout_secs(std::env::var("STOREFRONT_TIMEOUT_SECS").ok().as_deref());

        let max_error_body_bytes = std::env::var("STOREFRONT_MAX_ERROR_BODY_BYTES")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(8 * 1024);

        Self::new(base_url)
            .with_timeout(timeout)
            .with_max_error_body_bytes(max_error_body_bytes)
    }

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_error_body_bytes(mut self, bytes: usize) -> Self {
        self.max_error_body_bytes = bytes;
        self
    }
}

/// Whole seconds; `0` or anything unparsable means no client-side timeout.
fn parse_timeout_secs(raw: Option<&str>) -> Option<Duration> {
    raw.and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .map(Duration::from_secs)
}

/// Thin client over the storefront backend.
///
/// One method per endpoint, one HTTP request per call. No retries and no
/// caching: every call reflects the backend's current state.
#[derive(Clone)]
pub struct ApiClient {
    config: ApiClientConfig,
    base_url: Url,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiClientConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| ApiError::InvalidBaseUrl(config.base_url.clone()))?;
        let http = reqwest::Client::builder()
            .user_agent("storefront-mcp")
            .build()?;
        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    /// `GET /products`, optionally filtered server-side by category.
    pub async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, ApiError> {
        let mut req = self.request(Method::GET, &["products"]);
        if let Some(category) = category {
            req = req.query(&[("category", category)]);
        }
        let envelope: ProductListEnvelope = self.send(req).await?;
        Ok(envelope.products)
    }

    pub async fn get_product(&self, product_id: &str) -> Result<Product, ApiError> {
        let req = self.request(Method::GET, &["products", product_id]);
        let envelope: ProductEnvelope = self.send(req).await?;
        Ok(envelope.product)
    }

    pub async fn list_categories(&self) -> Result<Vec<String>, ApiError> {
        let envelope: CategoriesEnvelope =
            self.send(self.request(Method::GET, &["categories"])).await?;
        Ok(envelope.categories)
    }

    pub async fn list_brands(&self) -> Result<Vec<String>, ApiError> {
        let envelope: BrandsEnvelope = self.send(self.request(Method::GET, &["brands"])).await?;
        Ok(envelope.brands)
    }

    pub async fn get_preferences(&self) -> Result<Preferences, ApiError> {
        let envelope: PreferencesEnvelope =
            self.send(self.request(Method::GET, &["preferences"])).await?;
        Ok(envelope.preferences)
    }

    /// Sends the full preferences object and returns the backend's acknowledged copy.
    pub async fn update_preferences(
        &self,
        preferences: &Preferences,
    ) -> Result<Preferences, ApiError> {
        let req = self.request(Method::POST, &["preferences"]).json(preferences);
        let envelope: PreferencesEnvelope = self.send(req).await?;
        Ok(envelope.preferences)
    }

    pub async fn get_browsing_history(&self) -> Result<HistorySnapshot, ApiError> {
        self.send(self.request(Method::GET, &["browsing-history"])).await
    }

    pub async fn add_to_browsing_history(
        &self,
        product_id: &str,
    ) -> Result<StatusResponse, ApiError> {
        let req = self
            .request(Method::POST, &["browsing-history"])
            .json(&HistoryAppendRequest { product_id });
        self.send(req).await
    }

    pub async fn clear_browsing_history(&self) -> Result<StatusResponse, ApiError> {
        self.send(self.request(Method::DELETE, &["browsing-history"]))
            .await
    }

    pub async fn get_recommendations(&self) -> Result<Vec<Recommendation>, ApiError> {
        let envelope: RecommendationsEnvelope =
            self.send(self.request(Method::GET, &["recommendations"])).await?;
        Ok(envelope.recommendations)
    }

    /// `GET /test-llm`: asks the backend to check its recommendation model connection.
    pub async fn test_connection(&self) -> Result<StatusResponse, ApiError> {
        self.send(self.request(Method::GET, &["test-llm"])).await
    }

    /// Each segment is percent-encoded, so ids containing `/`, `?` or `#` stay
    /// a single path segment.
    fn request(&self, method: Method, segments: &[&str]) -> reqwest::RequestBuilder {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        let req = self.http.request(method, url);
        match self.config.timeout {
            Some(timeout) => req.timeout(timeout),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let resp = req.send().await?;
        debug!(status = %resp.status(), url = %resp.url(), "backend responded");
        Self::parse_json_response(resp, self.config.max_error_body_bytes).await
    }

    async fn parse_json_response<T: DeserializeOwned>(
        resp: reqwest::Response,
        max_error_body_bytes: usize,
    ) -> Result<T, ApiError> {
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            return Ok(serde_json::from_slice::<T>(&bytes)?);
        }
        Err(Self::to_upstream_error(resp, max_error_body_bytes).await)
    }

    async fn to_upstream_error(resp: reqwest::Response, max_error_body_bytes: usize) -> ApiError {
        let status = resp.status();
        let body = read_limited_text(resp, max_error_body_bytes).await;
        if let Some(message) = detail_message(&body) {
            return ApiError::Upstream { status, message };
        }
        ApiError::UpstreamBody { status, body }
    }
}

/// Backend errors arrive as `{"detail": "..."}`; validation errors carry a list instead.
fn detail_message(body: &str) -> Option<String> {
    let envelope = serde_json::from_str::<DetailEnvelope>(body).ok()?;
    match envelope.detail {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

async fn read_limited_text(resp: reqwest::Response, max_bytes: usize) -> String {
    match resp.bytes().await {
        Ok(mut b) => {
            if b.len() > max_bytes {
                b.truncate(max_bytes);
            }
            String::from_utf8_lossy(&b).to_string()
        }
        Err(e) => {
            warn!(error = %e, "failed to read backend error body");
            "<failed to read error body>".to_string()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct DetailEnvelope {
    #[serde(default)]
    detail: serde_json::Value,
}

/// True when a failure came back as an HTTP status rather than a transport error.
pub fn is_status_error(err: &ApiError, status: StatusCode) -> bool {
    err.status() == Some(status)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;

    type Seen = Arc<Mutex<Vec<String>>>;

    async fn products(
        State(seen): State<Seen>,
        Query(q): Query<std::collections::HashMap<String, String>>,
    ) -> Json<Value> {
        seen.lock().unwrap().push(format!(
            "GET /products category={}",
            q.get("category").cloned().unwrap_or_default()
        ));
        Json(json!({
            "products": [{
                "id": "p1", "name": "Trail Shoe", "description": "Grippy",
                "category": "Footwear", "brand": "Stride", "price": 89.5,
                "tags": ["outdoor"]
            }],
            "count": 1
        }))
    }

    async fn product(Path(id): Path<String>) -> (AxumStatus, Json<Value>) {
        if id == "kit/01?#x" {
            return (
                AxumStatus::OK,
                Json(json!({"status": "success", "product": {
                    "id": id, "name": "Tool Kit", "category": "Tools",
                    "brand": "Fixit", "price": 12.0
                }})),
            );
        }
        if id == "p1" {
            return (
                AxumStatus::OK,
                Json(json!({"status": "success", "product": {
                    "id": "p1", "name": "Trail Shoe", "description": "Grippy",
                    "category": "Footwear", "brand": "Stride", "price": 89.5
                }})),
            );
        }
        (
            AxumStatus::NOT_FOUND,
            Json(json!({"detail": format!("Product with ID {id} not found")})),
        )
    }

    async fn spawn_backend() -> (ApiClient, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/api/products", get(products))
            .route("/api/products/{id}", get(product))
            .route(
                "/api/recommendations",
                get(|| async { (AxumStatus::BAD_GATEWAY, "upstream exploded") }),
            )
            .route(
                "/api/preferences",
                get(|| async { Json(json!({"preferences": {}})) }),
            )
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = ApiClient::new(ApiClientConfig::new(format!("http://{addr}/api/"))).unwrap();
        (client, seen)
    }

    #[test]
    fn config_trims_trailing_slash() {
        let config = ApiClientConfig::new("http://shop.local/api///");
        assert_eq!(config.base_url, "http://shop.local/api");
        assert!(config.timeout.is_none());
    }

    #[tokio::test]
    async fn list_products_sends_encoded_category() {
        let (client, seen) = spawn_backend().await;
        let products = client.list_products(Some("Home & Garden")).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].tags.as_deref(), Some(&["outdoor".to_string()][..]));
        assert_eq!(
            seen.lock().unwrap().as_slice(),
            ["GET /products category=Home & Garden".to_string()]
        );
    }

    #[tokio::test]
    async fn get_product_unwraps_envelope() {
        let (client, _) = spawn_backend().await;
        let product = client.get_product("p1").await.unwrap();
        assert_eq!(product.name, "Trail Shoe");
    }

    #[tokio::test]
    async fn product_id_is_sent_as_one_encoded_segment() {
        let (client, _) = spawn_backend().await;
        let product = client.get_product("kit/01?#x").await.unwrap();
        assert_eq!(product.id, "kit/01?#x");
        assert_eq!(product.name, "Tool Kit");
    }

    #[test]
    fn zero_or_garbage_timeout_means_none() {
        assert_eq!(parse_timeout_secs(Some("30")), Some(Duration::from_secs(30)));
        assert_eq!(parse_timeout_secs(Some("0")), None);
        assert_eq!(parse_timeout_secs(Some("soon")), None);
        assert_eq!(parse_timeout_secs(None), None);
    }

    #[test]
    fn non_http_base_url_is_rejected() {
        let err = ApiClient::new(ApiClientConfig::new("mailto:shop@example.com")).err();
        assert!(matches!(err, Some(ApiError::InvalidBaseUrl(_))));
    }

    #[tokio::test]
    async fn not_found_surfaces_detail_and_status() {
        let (client, _) = spawn_backend().await;
        let err = client.get_product("missing").await.unwrap_err();
        assert!(is_status_error(&err, StatusCode::NOT_FOUND));
        match err {
            ApiError::Upstream { message, .. } => {
                assert_eq!(message, "Product with ID missing not found")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_json_error_body_is_kept() {
        let (client, _) = spawn_backend().await;
        let err = client.get_recommendations().await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert!(err.to_string().starts_with("request failed"));
        assert!(matches!(err, ApiError::UpstreamBody { ref body, .. } if body == "upstream exploded"));
    }

    #[tokio::test]
    async fn empty_preferences_decode_to_default() {
        let (client, _) = spawn_backend().await;
        let prefs = client.get_preferences().await.unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[tokio::test]
    async fn unreachable_backend_is_request_error() {
        let client = ApiClient::new(ApiClientConfig::new("http://127.0.0.1:1/api")).unwrap();
        let err = client.list_categories().await.unwrap_err();
        assert!(matches!(err, ApiError::Request(_)));
        assert!(err.status().is_none());
    }
}
