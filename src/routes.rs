// src/routes.rs

use axum::{
    Router,
    http::Method,
    middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{self, attempt, teacher},
    state::AppState,
    utils::jwt::{auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Student routes (quiz attempt, save, submit, focus loss) require a valid token.
/// * Teacher routes additionally require the teacher role.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            axum::http::HeaderValue::from_static("http://localhost:3000"),
            axum::http::HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let quiz_routes = Router::new()
        .route("/{quiz_id}/attempt", get(attempt::get_attempt))
        .route("/{quiz_id}/status", get(attempt::get_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let attempt_routes = Router::new()
        .route("/save", post(attempt::save_answers))
        .route("/submit", post(attempt::submit))
        .route("/focus-loss", post(attempt::record_focus_loss))
        .route("/{attempt_id}/result", get(attempt::get_result))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let teacher_routes = Router::new()
        .route("/attempts/close", post(teacher::close_attempt))
        .route("/attempts/reopen", post(teacher::reopen_attempt))
        .route("/attempts/grade", post(teacher::override_grade))
        .route("/attempts/{attempt_id}", get(teacher::review_attempt))
        .route("/quizzes/{quiz_id}/attempts", get(teacher::list_attempts))
        // Double middleware protection: Auth first, then Teacher check
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/api/health", get(handlers::health))
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/teacher", teacher_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{config::Config, store::MemoryStore};

    fn app() -> Router {
        create_router(AppState {
            store: Arc::new(MemoryStore::new()),
            config: Config {
                database_url: String::new(),
                jwt_secret: "secret".to_string(),
                rust_log: "error".to_string(),
                port: 0,
                db_max_connections: 1,
            },
        })
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        assert_eq!(status_of("GET", "/api/health").await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_attempt_routes_require_token() {
        assert_eq!(
            status_of("GET", "/api/quizzes/1/attempt").await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of("POST", "/api/attempts/submit").await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of("GET", "/api/teacher/quizzes/1/attempts").await,
            StatusCode::UNAUTHORIZED
        );
    }
}
