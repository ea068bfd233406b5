// src/routes.rs

use axum::{
    Router,
    http::{Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    handlers::{admin, student},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Admin routes manage exam definitions, results and the violation monitor.
/// * Student routes list, start, submit and report against the caller's own sessions.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| {
            origin
                .to_str()
                .map(|o| o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1"))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let admin_routes = Router::new()
        .route("/exams", get(admin::list_exams).post(admin::create_exam))
        .route(
            "/exams/{id}",
            get(admin::get_exam)
                .put(admin::update_exam)
                .delete(admin::delete_exam),
        )
        .route("/exams/{id}/results", get(admin::list_results))
        .route("/exams/{id}/violations", get(admin::list_violations))
        .route("/results/{result_id}", get(admin::get_result))
        .route("/results/{result_id}/grade", put(admin::grade_result))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let student_routes = Router::new()
        .route("/", get(student::list_my_exams))
        .route("/{id}/start", post(student::start_exam))
        .route("/{id}/submit", post(student::submit_exam))
        .route("/{id}/violation", post(student::report_violation))
        .route("/{id}/result", get(student::get_my_result))
        .layer(middleware::from_fn(student_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/admin", admin_routes)
        .nest("/api/student/exams", student_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
