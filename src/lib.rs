pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;

use axum::{http::HeaderValue, middleware::from_fn_with_state, routing::get, Router};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::auth::{LogNotifier, PasswordHasher, ResetNotifier, TokenIssuer};
use crate::config::AppConfig;
use crate::database::models::{Review, Tour, User};
use crate::database::{DatabaseManager, MemoryStore, PgStore, ResourceStore, UserStore};
use crate::middleware::{apply_security_headers, error_responder, rate_limit, RateLimit};

/// Everything a request handler may touch, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tours: Arc<dyn ResourceStore<Tour>>,
    pub reviews: Arc<dyn ResourceStore<Review>>,
    /// Account and credential access for the auth flows
    pub users: Arc<dyn UserStore>,
    /// The same user collection seen through the generic handlers
    pub user_records: Arc<dyn ResourceStore<User>>,
    pub tokens: TokenIssuer,
    pub passwords: PasswordHasher,
    pub notifier: Arc<dyn ResetNotifier>,
    /// Present when backed by PostgreSQL; used by the health check
    pub database: Option<PgPool>,
}

impl AppState {
    fn with_stores<T, V, U>(config: AppConfig, tours: T, reviews: V, users: U, database: Option<PgPool>) -> Self
    where
        T: ResourceStore<Tour> + 'static,
        V: ResourceStore<Review> + 'static,
        U: ResourceStore<User> + UserStore + 'static,
    {
        let users = Arc::new(users);
        Self {
            tokens: TokenIssuer::new(&config.security.jwt_secret, config.jwt_expiry()),
            passwords: PasswordHasher::default(),
            notifier: Arc::new(LogNotifier::new(config.is_development())),
            config: Arc::new(config),
            tours: Arc::new(tours),
            reviews: Arc::new(reviews),
            users: users.clone(),
            user_records: users,
            database,
        }
    }

    /// State backed by PostgreSQL through the manager's pool
    pub fn postgres(config: AppConfig, manager: &DatabaseManager) -> Self {
        let pool = manager.pool().clone();
        Self::with_stores(
            config,
            PgStore::<Tour>::new(pool.clone()),
            PgStore::<Review>::new(pool.clone()),
            PgStore::<User>::new(pool.clone()),
            Some(pool),
        )
    }

    /// State held entirely in process memory
    pub fn in_memory(config: AppConfig) -> Self {
        Self::with_stores(
            config,
            MemoryStore::<Tour>::new(),
            MemoryStore::<Review>::new(),
            MemoryStore::<User>::new(),
            None,
        )
    }

    pub fn with_passwords(mut self, passwords: PasswordHasher) -> Self {
        self.passwords = passwords;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn ResetNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

/// Assemble the full router with its global layers
pub fn app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut api = Router::new()
        .nest("/v1/tours", handlers::tours::routes(&state))
        .nest("/v1/reviews", handlers::reviews::routes(&state))
        .nest("/v1/users", handlers::users::routes(&state));

    if config.api.enable_rate_limiting {
        let window = Duration::from_secs(config.api.rate_limit_window_secs);
        match RateLimit::new(config.api.rate_limit_requests, window) {
            Some(limit) => api = api.layer(from_fn_with_state(limit, rate_limit)),
            None => tracing::warn!("Rate limiting enabled with an empty quota; skipping"),
        }
    }

    let mut app = Router::new()
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .nest("/api", api)
        .fallback(handlers::system::not_found)
        .with_state(state);

    app = apply_security_headers(app, &config.security);
    app = app.layer(
        ServiceBuilder::new()
            .layer(cors_layer(&config))
            .layer(from_fn_with_state(config.clone(), error_responder))
            .layer(RequestBodyLimitLayer::new(config.api.max_request_size_bytes)),
    );

    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }
    app
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.security.cors_origins.iter().any(|o| o == "*") {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}
