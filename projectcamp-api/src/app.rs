/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use projectcamp_api::{app::AppState, config::Config};
/// use projectcamp_shared::clock::SystemClock;
/// use projectcamp_shared::mail::LogMailer;
/// use projectcamp_shared::store::memory::MemoryStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store = Arc::new(MemoryStore::new());
/// let state = AppState::new(
///     config,
///     store.clone(),
///     store,
///     Arc::new(LogMailer),
///     Arc::new(SystemClock),
/// );
/// let app = projectcamp_api::app::build_router(state);
/// # let _ = app;
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    middleware::{auth::authenticate, project::ProjectRoutes, security::SecurityHeadersLayer},
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use projectcamp_shared::clock::Clock;
use projectcamp_shared::mail::Mailer;
use projectcamp_shared::models::membership::ProjectRole;
use projectcamp_shared::service::{AuthServices, AuthSettings};
use projectcamp_shared::store::{MembershipStore, UserStore};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Session, verification and access services
    pub auth: AuthServices,

    /// Credential store
    pub users: Arc<dyn UserStore>,

    /// Membership store
    pub memberships: Arc<dyn MembershipStore>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates application state with the settings derived from `config`
    pub fn new(
        config: Config,
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let settings = config.auth_settings();
        Self::with_settings(config, settings, users, memberships, mailer, clock)
    }

    /// Creates application state with explicit auth settings
    pub fn with_settings(
        config: Config,
        settings: AuthSettings,
        users: Arc<dyn UserStore>,
        memberships: Arc<dyn MembershipStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let auth = AuthServices::new(
            settings,
            users.clone(),
            memberships.clone(),
            mailer,
            clock,
        );

        Self {
            auth,
            users,
            memberships,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                                   # Health check (public)
/// └── /v1/
///     ├── /users/
///     │   ├── POST /register
///     │   ├── POST /login
///     │   ├── POST /refresh-token
///     │   ├── GET  /verify-email/:token
///     │   ├── POST /forgot-password
///     │   ├── POST /reset-password/:token
///     │   ├── POST /logout                       # authenticated
///     │   ├── GET  /current-user                 # authenticated
///     │   ├── POST /resend-email-verification    # authenticated
///     │   └── POST /change-password              # authenticated
///     └── /projects/
///         ├── POST   /                           # authenticated
///         ├── GET    /:project_id/members        # any member
///         ├── POST   /:project_id/members        # admin
///         ├── PUT    /:project_id/members/:user_id   # admin
///         └── DELETE /:project_id/members/:user_id   # admin
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication and project authorization (per route)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Account routes reachable without a session
    let public_user_routes = Router::new()
        .route("/register", post(routes::users::register))
        .route("/login", post(routes::users::login))
        .route("/refresh-token", post(routes::users::refresh_token))
        .route("/verify-email/:token", get(routes::users::verify_email))
        .route("/forgot-password", post(routes::users::forgot_password))
        .route("/reset-password/:token", post(routes::users::reset_password));

    let session_user_routes = Router::new()
        .route("/logout", post(routes::users::logout))
        .route("/current-user", get(routes::users::current_user))
        .route(
            "/resend-email-verification",
            post(routes::users::resend_email_verification),
        )
        .route("/change-password", post(routes::users::change_password))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let project_create_routes = Router::new()
        .route("/", post(routes::projects::create_project))
        .route_layer(from_fn_with_state(state.clone(), authenticate));

    let project_member_routes = ProjectRoutes::new(state.clone())
        .route(
            "/:project_id/members",
            &ProjectRole::ALL,
            get(routes::projects::list_members),
        )
        .route(
            "/:project_id/members",
            &ProjectRole::ADMIN_ONLY,
            post(routes::projects::add_member),
        )
        .route(
            "/:project_id/members/:user_id",
            &ProjectRole::ADMIN_ONLY,
            put(routes::projects::update_member_role),
        )
        .route(
            "/:project_id/members/:user_id",
            &ProjectRole::ADMIN_ONLY,
            delete(routes::projects::remove_member),
        )
        .into_router();

    let v1_routes = Router::new()
        .nest("/users", public_user_routes.merge(session_user_routes))
        .nest(
            "/projects",
            project_create_routes.merge(project_member_routes),
        );

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        // Explicit origins so cookies can be sent cross-origin
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.production;

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
