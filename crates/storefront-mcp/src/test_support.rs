/// In-process mock of the storefront backend for async tests.
///
/// Every request is recorded as `"METHOD /path"` so tests can assert call order.
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use storefront_common::api::{ApiClient, ApiClientConfig};

type Reply = (StatusCode, Json<Value>);

#[derive(Default)]
pub struct MockState {
    pub products: Vec<Value>,
    pub preferences: Value,
    pub history: Vec<String>,
    pub recommendations: Vec<Value>,
    pub calls: Vec<String>,
    /// Calls (as recorded) that answer 500.
    pub failing: HashSet<String>,
    /// Delay applied to successive `POST /preferences` calls.
    pub preference_delays_ms: VecDeque<u64>,
    /// Delay applied to successive `GET /browsing-history` calls.
    pub history_delays_ms: VecDeque<u64>,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn with_products(products: Vec<Value>) -> Self {
        let backend = Self::default();
        {
            let mut state = backend.state();
            state.products = products;
            state.preferences = json!({});
        }
        backend
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn fail(&self, call: &str) {
        self.state().failing.insert(call.to_string());
    }

    pub fn heal(&self, call: &str) {
        self.state().failing.remove(call);
    }

    pub async fn spawn(&self) -> ApiClient {
        let app = Router::new()
            .route("/api/products", get(list_products))
            .route("/api/products/{id}", get(get_product))
            .route("/api/categories", get(list_categories))
            .route("/api/brands", get(list_brands))
            .route("/api/preferences", get(get_preferences).post(post_preferences))
            .route(
                "/api/browsing-history",
                get(get_history).post(post_history).delete(delete_history),
            )
            .route("/api/recommendations", get(get_recommendations))
            .route("/api/test-llm", get(test_llm))
            .with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        ApiClient::new(ApiClientConfig::new(format!("http://{addr}/api"))).unwrap()
    }

    /// Records the call; returns an error reply if the call is marked failing.
    fn record(&self, call: &str) -> Result<MutexGuard<'_, MockState>, Reply> {
        let mut state = self.state();
        state.calls.push(call.to_string());
        if state.failing.contains(call) {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": format!("{call} failed")})),
            ));
        }
        Ok(state)
    }
}

pub fn product_json(id: &str, name: &str, category: &str, brand: &str, price: f64) -> Value {
    json!({
        "id": id,
        "name": name,
        "description": format!("{name} description"),
        "category": category,
        "brand": brand,
        "price": price,
        "tags": ["everyday"],
    })
}

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn find_product(state: &MockState, id: &str) -> Option<Value> {
    state.products.iter().find(|p| p["id"] == id).cloned()
}

async fn list_products(
    State(b): State<MockBackend>,
    Query(q): Query<HashMap<String, String>>,
) -> Reply {
    let state = match b.record("GET /products") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    let products: Vec<Value> = match q.get("category") {
        Some(c) => state
            .products
            .iter()
            .filter(|p| p["category"].as_str().is_some_and(|pc| pc.eq_ignore_ascii_case(c)))
            .cloned()
            .collect(),
        None => state.products.clone(),
    };
    ok(json!({"products": products, "count": products.len()}))
}

async fn get_product(State(b): State<MockBackend>, Path(id): Path<String>) -> Reply {
    let state = match b.record("GET /products/{id}") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    match find_product(&state, &id) {
        Some(p) => ok(json!({"status": "success", "product": p})),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": format!("Product with ID {id} not found")})),
        ),
    }
}

async fn list_categories(State(b): State<MockBackend>) -> Reply {
    let state = match b.record("GET /categories") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    let mut categories: Vec<String> = state
        .products
        .iter()
        .filter_map(|p| p["category"].as_str().map(str::to_string))
        .collect();
    categories.sort();
    categories.dedup();
    ok(json!({"categories": categories, "count": categories.len()}))
}

async fn list_brands(State(b): State<MockBackend>) -> Reply {
    let state = match b.record("GET /brands") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    let mut brands: Vec<String> = state
        .products
        .iter()
        .filter_map(|p| p["brand"].as_str().map(str::to_string))
        .collect();
    brands.sort();
    brands.dedup();
    ok(json!({"brands": brands, "count": brands.len()}))
}

async fn get_preferences(State(b): State<MockBackend>) -> Reply {
    match b.record("GET /preferences") {
        Ok(state) => ok(json!({"preferences": state.preferences})),
        Err(reply) => reply,
    }
}

async fn post_preferences(State(b): State<MockBackend>, Json(body): Json<Value>) -> Reply {
    let delay = {
        let mut state = match b.record("POST /preferences") {
            Ok(state) => state,
            Err(reply) => return reply,
        };
        state.preferences = body.clone();
        state.preference_delays_ms.pop_front().unwrap_or(0)
    };
    tokio::time::sleep(Duration::from_millis(delay)).await;
    ok(json!({
        "status": "success",
        "message": "Preferences updated successfully",
        "preferences": body,
    }))
}

async fn get_history(State(b): State<MockBackend>) -> Reply {
    let (body, delay) = {
        let mut state = match b.record("GET /browsing-history") {
            Ok(state) => state,
            Err(reply) => return reply,
        };
        let products: Vec<Value> = state
            .history
            .iter()
            .filter_map(|id| find_product(&state, id))
            .collect();
        let body = json!({
            "browsing_history": state.history,
            "products": products,
            "count": products.len(),
        });
        (body, state.history_delays_ms.pop_front().unwrap_or(0))
    };
    tokio::time::sleep(Duration::from_millis(delay)).await;
    ok(body)
}

#[derive(serde::Deserialize)]
struct HistoryItem {
    product_id: String,
}

async fn post_history(State(b): State<MockBackend>, Json(item): Json<HistoryItem>) -> Reply {
    let mut state = match b.record("POST /browsing-history") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    if find_product(&state, &item.product_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"detail": format!("Product with ID {} not found", item.product_id)})),
        );
    }
    if !state.history.contains(&item.product_id) {
        state.history.push(item.product_id);
    }
    ok(json!({"status": "success", "message": "Browsing history updated"}))
}

async fn delete_history(State(b): State<MockBackend>) -> Reply {
    let mut state = match b.record("DELETE /browsing-history") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    state.history.clear();
    ok(json!({"status": "success", "message": "Browsing history cleared"}))
}

async fn get_recommendations(State(b): State<MockBackend>) -> Reply {
    let state = match b.record("GET /recommendations") {
        Ok(state) => state,
        Err(reply) => return reply,
    };
    if state.preferences.as_object().map_or(true, |o| o.is_empty()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "No user preferences found. Please set preferences first."})),
        );
    }
    ok(json!({
        "status": "success",
        "recommendations": state.recommendations,
        "count": state.recommendations.len(),
    }))
}

async fn test_llm(State(b): State<MockBackend>) -> Reply {
    match b.record("GET /test-llm") {
        Ok(_) => ok(json!({"status": "success", "message": "Successfully connected to LLM API"})),
        Err(reply) => reply,
    }
}
