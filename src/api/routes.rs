//! API Routes
//!
//! Configures the Axum router with all plan API endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, clear_cache_handler, create_communication_plan,
    create_matrix_entries_bulk, create_matrix_entry, create_project, create_stakeholder,
    create_stakeholders_bulk, create_user, delete_matrix_entry, delete_project,
    delete_stakeholder, delete_user, get_communication_plan, get_project, get_stakeholder,
    get_user, health_handler, list_matrix_entries, list_projects, list_stakeholders, list_users,
    update_communication_plan, update_matrix_entry, update_project, update_stakeholder,
    update_user, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: allows any origin, answers preflight requests
/// - Tracing: logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route(
            "/api/projects/:id/stakeholders",
            get(list_stakeholders).post(create_stakeholder),
        )
        .route(
            "/api/projects/:id/stakeholders/bulk",
            post(create_stakeholders_bulk),
        )
        .route(
            "/api/projects/:id/communication-plan",
            get(get_communication_plan)
                .post(create_communication_plan)
                .put(update_communication_plan),
        )
        .route(
            "/api/communication-plans/:id/matrix",
            get(list_matrix_entries).post(create_matrix_entry),
        )
        .route(
            "/api/communication-plans/:id/matrix/bulk",
            post(create_matrix_entries_bulk),
        )
        .route(
            "/api/matrix/:id",
            put(update_matrix_entry).delete(delete_matrix_entry),
        )
        .route(
            "/api/stakeholders/:id",
            get(get_stakeholder)
                .put(update_stakeholder)
                .delete(delete_stakeholder),
        )
        .route(
            "/api/cache/stats",
            get(cache_stats_handler).delete(clear_cache_handler),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        create_router(AppState::in_memory(&Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let response = create_test_app()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/api/projects")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_bulk_routes_accept_post_only() {
        for uri in [
            "/api/projects/p1/stakeholders/bulk",
            "/api/communication-plans/c1/matrix/bulk",
        ] {
            let response = create_test_app()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_matrix_entry_has_no_get() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/api/matrix/m1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = create_test_app()
            .oneshot(Request::builder().uri("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
