//! HTTP server wiring: pool, migrations, router, middleware, outbox worker.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod email;
pub mod handlers;

pub use email::EmailWorkerConfig;

use handlers::auth;

/// OpenAPI document for every route the service registers. Also the route
/// inventory behind the `report` command.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::me::get_me,
        handlers::auth::signup::signup,
        handlers::auth::login::login,
        handlers::auth::verification::verify_email,
        handlers::auth::reset::forgot_password,
        handlers::auth::reset::reset_password,
    ),
    components(schemas(
        handlers::health::Health,
        handlers::auth::types::ApiMessage,
        handlers::auth::types::SignupRequest,
        handlers::auth::types::SignupResponse,
        handlers::auth::types::LoginRequest,
        handlers::auth::types::LoginResponse,
        handlers::auth::types::UserProfile,
        handlers::auth::types::ForgotPasswordRequest,
        handlers::auth::types::ResetPasswordRequest,
    )),
    tags(
        (name = "auth", description = "Account workflow: signup, verification, login, reset"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Start the server.
///
/// # Errors
/// Returns an error if the database is unreachable, migrations fail, or the
/// listener cannot bind.
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: auth::AuthConfig,
    email_config: EmailWorkerConfig,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    let app_origin = app_origin(auth_config.app_base_url())?;
    let auth_state = Arc::new(auth::AuthState::new(auth_config));

    // Background worker drains the email outbox; handlers only ever enqueue.
    email::spawn_outbox_worker(pool.clone(), Arc::new(email::LogEmailSender), email_config);

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(app_origin));

    let app = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api/v1/auth", auth_routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn auth_routes() -> Router {
    Router::new()
        .route("/signup", post(auth::signup::signup))
        .route("/login", post(auth::login::login))
        .route("/verify-email/:token", get(auth::verification::verify_email))
        .route("/forgot-password", post(auth::reset::forgot_password))
        .route("/reset-password/:token", post(auth::reset::reset_password))
        .route("/me", get(handlers::me::get_me))
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn app_origin(app_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(app_base_url)
        .with_context(|| format!("Invalid application base URL: {app_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Application base URL must include a valid host: {app_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build application origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_origin_strips_path_and_keeps_port() -> Result<()> {
        let origin = app_origin("http://localhost:3000/some/path")?;
        assert_eq!(origin, HeaderValue::from_static("http://localhost:3000"));
        Ok(())
    }

    #[test]
    fn app_origin_rejects_invalid_url() {
        assert!(app_origin("not a url").is_err());
    }

    #[test]
    fn openapi_lists_every_route() {
        let openapi = ApiDoc::openapi();
        let paths: Vec<&str> = openapi.paths.paths.keys().map(String::as_str).collect();
        assert!(paths.contains(&"/api/v1/auth/signup"));
        assert!(paths.contains(&"/api/v1/auth/login"));
        assert!(paths.contains(&"/api/v1/auth/verify-email/{token}"));
        assert!(paths.contains(&"/api/v1/auth/forgot-password"));
        assert!(paths.contains(&"/api/v1/auth/reset-password/{token}"));
        assert!(paths.contains(&"/api/v1/auth/me"));
        assert!(paths.contains(&"/health"));
    }
}
