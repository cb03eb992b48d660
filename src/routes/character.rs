use axum::{
    extract::{Path, State},
    http::{HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::cache::Fetched;
use crate::error::AppError;
use crate::keys::{CHARACTER_COLLECTION, character_key};

pub const X_CACHE: &str = "x-cache";

/// 单个 id 或逗号分隔的多个 id，例如 `1` 或 `1,2,3`
fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .split(',')
            .all(|part| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()))
}

fn render(fetched: Fetched) -> Response {
    let cache_status = if fetched.served_from_cache { "HIT" } else { "MISS" };
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (HeaderName::from_static(X_CACHE), HeaderValue::from_static(cache_status)),
        ],
        fetched.payload,
    )
        .into_response()
}

#[axum::debug_handler]
pub async fn list_characters(State(state): State<AppState>) -> Result<Response, AppError> {
    let fetched = state.gateway.fetch(CHARACTER_COLLECTION).await?;
    Ok(render(fetched))
}

#[axum::debug_handler]
pub async fn get_character(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if !is_valid_id(&id) {
        return Err(AppError::BadRequest(format!("invalid character id: {}", id)));
    }
    let fetched = state.gateway.fetch(&character_key(&id)).await?;
    Ok(render(fetched))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_single_and_multiple_ids() {
        assert!(is_valid_id("1"));
        assert!(is_valid_id("1,2,183"));
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("rick"));
        assert!(!is_valid_id("1,,2"));
        assert!(!is_valid_id("1,"));
        assert!(!is_valid_id("-1"));
        assert!(!is_valid_id("1.5"));
    }
}
