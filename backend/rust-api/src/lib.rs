use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

type SharedState = Arc<AppState>;

/// CSP middleware adds Content-Security-Policy header to all responses
async fn csp_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(
            "default-src 'self'; \
             img-src 'self' data: https:; \
             connect-src 'self'; \
             frame-ancestors 'none'",
        ),
    );
    response
}

pub fn create_router(app_state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(middlewares::csrf::CSRF_HEADER_NAME),
        ])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler)
                .layer(middleware::from_fn(handlers::metrics_auth_middleware)),
        )
        .merge(auth_routes(app_state.clone()))
        .merge(public_routes(app_state.clone()))
        .merge(member_routes(app_state.clone()))
        .merge(admin_routes(app_state.clone()))
        .with_state(app_state)
        .layer(middleware::from_fn(csp_middleware))
        .layer(middleware::from_fn(middlewares::metrics::metrics_middleware))
        .layer(middleware::from_fn(middlewares::trace::trace_context_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(CompressionLayer::new())
}

/// Respondent-facing endpoints, no account needed
fn public_routes(app_state: SharedState) -> Router<SharedState> {
    let contact_route = Router::new()
        .route("/api/contact", post(handlers::contact::submit_contact))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::rate_limit::contact_rate_limit_middleware,
        ));

    Router::new()
        .route("/api/surveys/{id}", get(handlers::surveys::get_survey))
        .route(
            "/api/surveys/{id}/responses",
            post(handlers::surveys::submit_response),
        )
        .route(
            "/api/templates/{template_id}",
            get(handlers::templates::get_template),
        )
        .merge(contact_route)
}

/// Any signed-in user; ownership is checked by the services
fn member_routes(app_state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/api/surveys", get(handlers::surveys::list_surveys))
        .route(
            "/api/surveys/from-template",
            post(handlers::surveys::create_from_template),
        )
        .route(
            "/api/surveys/{id}",
            put(handlers::surveys::update_survey)
                .delete(handlers::surveys::delete_survey),
        )
        .route(
            "/api/surveys/{id}/duplicate",
            post(handlers::surveys::duplicate_survey),
        )
        .route(
            "/api/surveys/{id}/analytics",
            get(handlers::analytics::survey_analytics),
        )
        .route(
            "/api/responses/{id}",
            get(handlers::responses::get_response).delete(handlers::responses::delete_response),
        )
        .route("/api/templates", get(handlers::templates::list_templates))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn admin_routes(app_state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/api/surveys", post(handlers::surveys::create_survey))
        .route(
            "/api/surveys/{id}/publish",
            post(handlers::surveys::publish_survey),
        )
        .route(
            "/api/surveys/{id}/responses",
            get(handlers::surveys::list_survey_responses),
        )
        .route("/api/responses", get(handlers::analytics::analytics_overview))
        .route(
            "/api/responses/recent",
            get(handlers::responses::recent_responses),
        )
        .route(
            "/api/analysis/survey",
            post(handlers::analytics::narrative_analysis),
        )
        .route("/api/templates", post(handlers::templates::create_template))
        .route(
            "/api/admin/contact-messages",
            get(handlers::contact::list_contact_messages),
        )
        .route(
            "/api/admin/contact-messages/{id}",
            delete(handlers::contact::delete_contact_message),
        )
        .route_layer(middleware::from_fn(
            middlewares::auth::admin_guard_middleware,
        ))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ))
}

fn auth_routes(app_state: SharedState) -> Router<SharedState> {
    let signup_route = Router::new()
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::signup_rate_limit_middleware,
        ));

    let login_route = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            middlewares::rate_limit::login_rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/api/auth/csrf-token", get(handlers::auth::get_csrf_token))
        .route("/api/auth/verify", post(handlers::auth::verify))
        .merge(signup_route)
        .merge(login_route);

    let protected_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::get_current_user))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route_layer(middleware::from_fn(middlewares::csrf::csrf_middleware))
        .route_layer(middleware::from_fn_with_state(
            app_state,
            middlewares::auth::auth_middleware,
        ));

    public_routes.merge(protected_routes)
}
