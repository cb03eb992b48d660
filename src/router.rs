use axum::{Router, middleware, routing::get};
use tower_http::trace::TraceLayer;

use crate::AppState;
use crate::middleware::{log_errors, rate_limit, response_time};
use crate::routes;

// 角色相关的路由，先限流再进入处理函数
fn character_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/character", get(routes::character::list_characters))
        .route("/character/{id}", get(routes::character::get_character))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
}

// 创建主路由
pub fn create_router(state: AppState) -> Router {
    let characters = character_routes(&state);
    let base = state.config.api_base_uri.clone();

    // axum 不允许在根路径 nest
    let api = if base.is_empty() {
        characters
    } else {
        Router::new().nest(&base, characters)
    };

    let router = Router::new()
        .route("/ping", get(routes::health::ping))
        .merge(api)
        .layer(middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(response_time));

    // 开发模式下允许所有来源
    #[cfg(debug_assertions)]
    let router = router.layer(tower_http::cors::CorsLayer::permissive());

    router.with_state(state)
}
