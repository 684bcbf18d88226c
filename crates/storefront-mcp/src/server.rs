/// MCP server exposing the storefront as tools.
///
/// Each tool is one user action or one rendered panel:
/// - `reload`, `status`: bootstrap and session phase
/// - `browse_catalog`, `list_products`, `get_product`, `list_categories`, `list_brands`
/// - `get_preferences`, `toggle_preference`, `set_price_range`, `submit_preferences`
/// - `click_product`, `get_history`, `clear_history`
/// - `get_recommendations`, `check_backend`
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use storefront_common::model::{Preferences, Product, StatusResponse};

use crate::catalog::{self, CatalogFilter, CatalogView};
use crate::error::AppError;
use crate::preferences::{self, PreferenceField, PreferenceOptions, PreferencesDraft};
use crate::session::{Phase, Session, SessionSnapshot};
use crate::views::{self, HistoryView, RecommendationsView};

#[derive(Debug, Deserialize, JsonSchema)]
struct ListProductsParams {
    /// Server-side category filter (case-insensitive). Omit for all products.
    category: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ProductParams {
    product_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct TogglePreferenceParams {
    /// Which list to edit: "category", "brand" or "style".
    field: PreferenceField,
    value: String,
    /// true adds the value, false removes it.
    checked: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PriceRangeParams {
    min: Option<f64>,
    max: Option<f64>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct StatusView {
    /// "loading", "ready" or "failed".
    phase: &'static str,
    /// Why the last load failed, when the phase is "failed".
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    products: usize,
    history: usize,
    preferences_set: bool,
    recommendations: usize,
    recommendations_loading: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ProductListResponse {
    products: Vec<Product>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct NameListResponse {
    items: Vec<String>,
}

#[derive(Debug, Serialize, JsonSchema)]
struct PreferencesResponse {
    draft: PreferencesDraft,
    saved: Preferences,
    options: PreferenceOptions,
}

#[derive(Debug, Serialize, JsonSchema)]
struct PreferenceUpdateResponse {
    preferences: Preferences,
    recommendations_refreshing: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
struct ClickResponse {
    recorded: bool,
    recommendations_refreshing: bool,
    history: HistoryView,
}

#[derive(Debug, Serialize, JsonSchema)]
struct HistoryResponse {
    history: HistoryView,
}

#[derive(Debug, Serialize, JsonSchema)]
struct RecommendationsResponse {
    recommendations: RecommendationsView,
}

#[derive(Debug, Serialize, JsonSchema)]
struct OkResponse {
    ok: bool,
}

#[derive(Clone)]
pub struct StorefrontServer {
    session: Session,
    draft: Arc<Mutex<PreferencesDraft>>,
    tool_router: ToolRouter<StorefrontServer>,
}

impl StorefrontServer {
    pub async fn new(session: Session) -> Self {
        let draft = PreferencesDraft::from_preferences(&session.snapshot().await.preferences);
        Self {
            session,
            draft: Arc::new(Mutex::new(draft)),
            tool_router: Self::tool_router(),
        }
    }

    async fn ready_snapshot(&self) -> Result<SessionSnapshot, String> {
        let snapshot = self.session.snapshot().await;
        if snapshot.phase != Phase::Ready {
            return Err(AppError::NotReady(snapshot.phase.name()).to_string());
        }
        Ok(snapshot)
    }

    async fn status_view(&self) -> StatusView {
        let snap = self.session.snapshot().await;
        StatusView {
            products: snap.products.len(),
            history: snap.history.browsing_history.len(),
            preferences_set: snap.preferences.has_any_field(),
            recommendations: snap.recommendations.len(),
            recommendations_loading: snap.recommendations_loading,
            phase: snap.phase.name(),
            error: snap.phase.error().map(str::to_string),
        }
    }

    /// Sends `preferences` and, once no newer preference update is outstanding,
    /// resyncs the draft with the stored copy.
    async fn push_preferences(
        &self,
        preferences: Preferences,
    ) -> Result<Json<PreferenceUpdateResponse>, String> {
        let update = self
            .session
            .update_preferences(preferences)
            .await
            .map_err(|e| format!("failed to update preferences, please try again: {e}"))?;
        let mut draft = self.draft.lock().await;
        if let Some(settled) = self.session.settled_preferences().await {
            draft.resync(&settled);
        }
        drop(draft);
        Ok(Json(PreferenceUpdateResponse {
            preferences: update.preferences,
            recommendations_refreshing: !update.refresh.is_finished(),
        }))
    }
}

#[tool_router]
impl StorefrontServer {
    #[tool(description = "Load products, preferences and browsing history from the backend. Use after a failed start to try again.")]
    async fn reload(&self) -> Result<Json<StatusView>, String> {
        info!("reload tool invoked");
        self.session.bootstrap().await.map_err(|e| e.to_string())?;
        let prefs = self.session.snapshot().await.preferences;
        self.draft.lock().await.resync(&prefs);
        Ok(Json(self.status_view().await))
    }

    #[tool(description = "Report the session phase (loading, ready, failed) and how much data is loaded.")]
    async fn status(&self) -> Result<Json<StatusView>, String> {
        Ok(Json(self.status_view().await))
    }

    #[tool(description = "Browse the loaded catalog. Filter by category (\"All\" for every category) and by a case-insensitive search over name and description. Products already in the browsing history are flagged.")]
    async fn browse_catalog(
        &self,
        Parameters(filter): Parameters<CatalogFilter>,
    ) -> Result<Json<CatalogView>, String> {
        let snap = self.ready_snapshot().await?;
        Ok(Json(catalog::build_view(
            &snap.products,
            &filter,
            &snap.history,
        )))
    }

    #[tool(description = "Fetch products from the backend, optionally filtered by category.")]
    async fn list_products(
        &self,
        Parameters(params): Parameters<ListProductsParams>,
    ) -> Result<Json<ProductListResponse>, String> {
        let category = params
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let products = self
            .session
            .api()
            .list_products(category)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(ProductListResponse { products }))
    }

    #[tool(description = "Fetch a single product by ID from the backend.")]
    async fn get_product(
        &self,
        Parameters(params): Parameters<ProductParams>,
    ) -> Result<Json<Product>, String> {
        let product_id = params.product_id.trim().to_string();
        if product_id.is_empty() {
            return Err("product_id must not be empty".to_string());
        }
        let product = self
            .session
            .api()
            .get_product(&product_id)
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(product))
    }

    #[tool(description = "List every product category known to the backend.")]
    async fn list_categories(&self) -> Result<Json<NameListResponse>, String> {
        let items = self
            .session
            .api()
            .list_categories()
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(NameListResponse { items }))
    }

    #[tool(description = "List every product brand known to the backend.")]
    async fn list_brands(&self) -> Result<Json<NameListResponse>, String> {
        let items = self
            .session
            .api()
            .list_brands()
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(NameListResponse { items }))
    }

    #[tool(description = "Show the preferences form: the current draft, the last saved preferences, and the category, brand and style options derived from the catalog.")]
    async fn get_preferences(&self) -> Result<Json<PreferencesResponse>, String> {
        let snap = self.ready_snapshot().await?;
        let draft = self.draft.lock().await.clone();
        Ok(Json(PreferencesResponse {
            draft,
            saved: snap.preferences,
            options: preferences::preference_options(&snap.products),
        }))
    }

    #[tool(description = "Add or remove a preferred category, brand or style tag. The change is saved immediately and recommendations are refreshed in the background.")]
    async fn toggle_preference(
        &self,
        Parameters(params): Parameters<TogglePreferenceParams>,
    ) -> Result<Json<PreferenceUpdateResponse>, String> {
        let value = params.value.trim();
        if value.is_empty() {
            return Err("value must not be empty".to_string());
        }
        self.ready_snapshot().await?;
        let preferences = self
            .draft
            .lock()
            .await
            .toggle(params.field, value, params.checked);
        self.push_preferences(preferences).await
    }

    #[tool(description = "Change the minimum and/or maximum price. The change is saved immediately and recommendations are refreshed in the background.")]
    async fn set_price_range(
        &self,
        Parameters(params): Parameters<PriceRangeParams>,
    ) -> Result<Json<PreferenceUpdateResponse>, String> {
        if params.min.is_none() && params.max.is_none() {
            return Err("provide min, max, or both".to_string());
        }
        self.ready_snapshot().await?;
        let preferences = self
            .draft
            .lock()
            .await
            .set_price_range(params.min, params.max)
            .map_err(|e| e.to_string())?;
        self.push_preferences(preferences).await
    }

    #[tool(description = "Save the current preferences draft as-is.")]
    async fn submit_preferences(&self) -> Result<Json<PreferenceUpdateResponse>, String> {
        self.ready_snapshot().await?;
        let preferences = self.draft.lock().await.to_preferences();
        self.push_preferences(preferences).await
    }

    #[tool(description = "Open a product: records it in the browsing history and refreshes recommendations when preferences are set.")]
    async fn click_product(
        &self,
        Parameters(params): Parameters<ProductParams>,
    ) -> Result<Json<ClickResponse>, String> {
        let product_id = params.product_id.trim().to_string();
        if product_id.is_empty() {
            return Err("product_id must not be empty".to_string());
        }
        let outcome = self
            .session
            .record_click(&product_id)
            .await
            .map_err(|e| e.to_string())?;
        let snap = self.session.snapshot().await;
        Ok(Json(ClickResponse {
            recorded: outcome.recorded,
            recommendations_refreshing: outcome.refresh.is_some_and(|h| !h.is_finished()),
            history: views::history_view(&snap.history),
        }))
    }

    #[tool(description = "Show the products in the browsing history, in click order.")]
    async fn get_history(&self) -> Result<Json<HistoryResponse>, String> {
        let snap = self.ready_snapshot().await?;
        Ok(Json(HistoryResponse {
            history: views::history_view(&snap.history),
        }))
    }

    #[tool(description = "Delete the whole browsing history.")]
    async fn clear_history(&self) -> Result<Json<OkResponse>, String> {
        self.session
            .clear_history()
            .await
            .map_err(|e| format!("failed to clear browsing history, please try again: {e}"))?;
        Ok(Json(OkResponse { ok: true }))
    }

    #[tool(description = "Show personalized recommendations with confidence bars. Reports a loading state while a refresh is running.")]
    async fn get_recommendations(&self) -> Result<Json<RecommendationsResponse>, String> {
        let snap = self.ready_snapshot().await?;
        Ok(Json(RecommendationsResponse {
            recommendations: views::recommendations_view(
                &snap.recommendations,
                snap.recommendations_loading,
            ),
        }))
    }

    #[tool(description = "Ask the backend to test its connection to the recommendation model.")]
    async fn check_backend(&self) -> Result<Json<StatusResponse>, String> {
        let status = self
            .session
            .api()
            .test_connection()
            .await
            .map_err(|e| e.to_string())?;
        Ok(Json(status))
    }
}

#[tool_handler]
impl ServerHandler for StorefrontServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "storefront-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Storefront client. Call status first; if the phase is failed, call reload. \
Use browse_catalog to find products and click_product to open one. Edit preferences with \
toggle_preference and set_price_range (saved immediately), then read get_recommendations. \
get_history and clear_history manage the browsing history."
                    .to_string(),
            ),
        }
    }
}
