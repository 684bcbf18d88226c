/// Root coordinator: owns every piece of server-mirrored state and sequences
/// the bootstrap load and the mutation flows against the backend.
///
/// Failure policy:
/// - bootstrap: all-or-nothing, a failure leaves the session in `Phase::Failed`
///   until `bootstrap` succeeds again
/// - preference update, history clear: returned to the caller, state unchanged
/// - history append, recommendation refresh: logged only, state keeps its last value
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use storefront_common::api::{is_status_error, ApiClient};
use storefront_common::error::ApiError;
use storefront_common::model::{HistorySnapshot, Preferences, Product, Recommendation};

use crate::cache::ClientCache;
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Ready,
    Failed(String),
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Loading => "loading",
            Phase::Ready => "ready",
            Phase::Failed(_) => "failed",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Phase::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Point-in-time copy of the session, for building views.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub products: Vec<Product>,
    pub preferences: Preferences,
    pub history: HistorySnapshot,
    pub recommendations: Vec<Recommendation>,
    pub recommendations_loading: bool,
}

pub struct PreferenceUpdate {
    /// The preferences held locally once the acknowledgement was reconciled.
    pub preferences: Preferences,
    pub refresh: JoinHandle<()>,
}

pub struct ClickOutcome {
    pub recorded: bool,
    /// Present when a recommendation refresh was started.
    pub refresh: Option<JoinHandle<()>>,
}

struct SessionState {
    phase: Phase,
    cache: ClientCache,
}

#[derive(Clone)]
pub struct Session {
    api: Arc<ApiClient>,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self {
            api,
            state: Arc::new(RwLock::new(SessionState {
                phase: Phase::Loading,
                cache: ClientCache::default(),
            })),
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub async fn phase(&self) -> Phase {
        self.state.read().await.phase.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            phase: state.phase.clone(),
            products: state.cache.products.value().clone(),
            preferences: state.cache.preferences.value().clone(),
            history: state.cache.history.value().clone(),
            recommendations: state.cache.recommendations.value().clone(),
            recommendations_loading: state.cache.recommendations.is_pending(),
        }
    }

    /// The stored preferences, or `None` while a preference update is still in flight.
    pub async fn settled_preferences(&self) -> Option<Preferences> {
        let state = self.state.read().await;
        let slot = &state.cache.preferences;
        (!slot.is_pending()).then(|| slot.value().clone())
    }

    /// Loads products, preferences and browsing history, in that order.
    ///
    /// Nothing becomes visible unless all three succeed.
    pub async fn bootstrap(&self) -> Result<(), AppError> {
        let (products_t, preferences_t, history_t) = {
            let mut state = self.state.write().await;
            state.phase = Phase::Loading;
            (
                state.cache.products.issue(),
                state.cache.preferences.issue(),
                state.cache.history.issue(),
            )
        };

        info!("loading initial storefront data");
        match self.load_initial().await {
            Ok((products, preferences, history)) => {
                let mut state = self.state.write().await;
                info!(
                    products = products.len(),
                    history = history.browsing_history.len(),
                    preferences_set = preferences.has_any_field(),
                    "initial data loaded"
                );
                state.cache.products.apply(products_t, products);
                state.cache.preferences.apply(preferences_t, preferences);
                state.cache.history.apply(history_t, history);
                state.phase = Phase::Ready;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to load initial data");
                let mut state = self.state.write().await;
                state.cache.products.abandon(products_t);
                state.cache.preferences.abandon(preferences_t);
                state.cache.history.abandon(history_t);
                state.phase = Phase::Failed(e.to_string());
                Err(AppError::Bootstrap(e))
            }
        }
    }

    async fn load_initial(&self) -> Result<(Vec<Product>, Preferences, HistorySnapshot), ApiError> {
        let products = self.api.list_products(None).await?;
        let preferences = self.api.get_preferences().await?;
        let history = self.api.get_browsing_history().await?;
        Ok((products, preferences, history))
    }

    /// Sends the full preferences object, reconciles the acknowledged copy, then
    /// starts a best-effort recommendation refresh.
    pub async fn update_preferences(
        &self,
        preferences: Preferences,
    ) -> Result<PreferenceUpdate, AppError> {
        let ticket = {
            let mut state = self.ready_state().await?;
            state.cache.preferences.issue()
        };

        let acked = match self.api.update_preferences(&preferences).await {
            Ok(acked) => acked,
            Err(e) => {
                error!(error = %e, "failed to update preferences");
                self.state.write().await.cache.preferences.abandon(ticket);
                return Err(e.into());
            }
        };

        let preferences = {
            let mut state = self.state.write().await;
            state.cache.preferences.apply(ticket, acked);
            state.cache.preferences.value().clone()
        };

        let refresh = self.refresh_recommendations().await;
        Ok(PreferenceUpdate {
            preferences,
            refresh,
        })
    }

    /// Records a product click, refetches the browsing history and, when the user
    /// has any preference set, starts a recommendation refresh.
    pub async fn record_click(&self, product_id: &str) -> Result<ClickOutcome, AppError> {
        drop(self.ready_state().await?);

        if let Err(e) = self.api.add_to_browsing_history(product_id).await {
            warn!(product_id, error = %e, "failed to record product click");
            return Ok(ClickOutcome {
                recorded: false,
                refresh: None,
            });
        }

        let ticket = self.state.write().await.cache.history.issue();
        let has_preferences = match self.api.get_browsing_history().await {
            Ok(history) => {
                let mut state = self.state.write().await;
                state.cache.history.apply(ticket, history);
                state.cache.preferences.value().has_any_field()
            }
            Err(e) => {
                warn!(product_id, error = %e, "failed to refresh browsing history");
                self.state.write().await.cache.history.abandon(ticket);
                return Ok(ClickOutcome {
                    recorded: true,
                    refresh: None,
                });
            }
        };

        let refresh = if has_preferences {
            Some(self.refresh_recommendations().await)
        } else {
            None
        };
        Ok(ClickOutcome {
            recorded: true,
            refresh,
        })
    }

    /// Deletes the history server-side and empties the local copy without refetching.
    pub async fn clear_history(&self) -> Result<(), AppError> {
        let ticket = {
            let mut state = self.ready_state().await?;
            state.cache.history.issue()
        };

        match self.api.clear_browsing_history().await {
            Ok(_) => {
                self.state
                    .write()
                    .await
                    .cache
                    .history
                    .apply(ticket, HistorySnapshot::default());
                info!("browsing history cleared");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "failed to clear browsing history");
                self.state.write().await.cache.history.abandon(ticket);
                Err(e.into())
            }
        }
    }

    /// Fetches recommendations on a background task. Failures are logged and the
    /// previous recommendations stay in place.
    pub async fn refresh_recommendations(&self) -> JoinHandle<()> {
        let ticket = self.state.write().await.cache.recommendations.issue();
        let session = self.clone();
        tokio::spawn(async move {
            let result = session.api.get_recommendations().await;
            let mut state = session.state.write().await;
            match result {
                Ok(recs) => {
                    let count = recs.len();
                    if state.cache.recommendations.apply(ticket, recs) {
                        debug!(count, "recommendations refreshed");
                    }
                }
                Err(e) => {
                    state.cache.recommendations.abandon(ticket);
                    if is_status_error(&e, reqwest::StatusCode::BAD_REQUEST) {
                        debug!(error = %e, "recommendations not available yet");
                    } else {
                        warn!(error = %e, "failed to refresh recommendations");
                    }
                }
            }
        })
    }

    async fn ready_state(&self) -> Result<tokio::sync::RwLockWriteGuard<'_, SessionState>, AppError> {
        let state = self.state.write().await;
        match state.phase {
            Phase::Ready => Ok(state),
            ref other => Err(AppError::NotReady(other.name())),
        }
    }
}
