//! HTTP read API endpoints.
//!
//! Thin accessors over chain state, consumed by miners and explorers:
//! heights, blocks, mempool, difficulty, balances, token registry queries,
//! history and search scans.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use cinder_core::params::SYNC_BATCH;
use cinder_store::BlockStore;

use crate::server::ApiState;

/// Maximum transaction search results per query.
const SEARCH_LIMIT: usize = 100;

/// REST API error response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = json!({
            "error": self.to_string(),
            "code": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<cinder_core::Error> for ApiError {
    fn from(e: cinder_core::Error) -> Self {
        ApiError::Internal(e.to_string())
    }
}

/// Split an `addr` or `addr.TOKEN` path segment.
fn split_addr_token(segment: &str) -> (&str, Option<&str>) {
    match segment.split_once('.') {
        Some((addr, token)) if !token.is_empty() => (addr, Some(token)),
        _ => (segment, None),
    }
}

/// Build the read-API router.
pub fn router<S: BlockStore + 'static>() -> Router<Arc<ApiState<S>>> {
    Router::new()
        .route("/height", get(height::<S>))
        .route("/block/{h}", get(block::<S>))
        .route("/blocks", get(blocks::<S>))
        .route("/mempool", get(mempool::<S>))
        .route("/diff", get(diff::<S>))
        .route("/mint-fee", get(mint_fee::<S>))
        .route("/reward", get(reward::<S>))
        .route("/balance/{addr}", get(balance::<S>))
        .route("/locked/{addr}", get(locked::<S>))
        .route("/balance-mempool/{addr}", get(balance_mempool::<S>))
        .route("/tokens/{addr}", get(tokens::<S>))
        .route("/token-info/{token}", get(token_info::<S>))
        .route("/token-count", get(token_count::<S>))
        .route("/token/{i}", get(token_at::<S>))
        .route("/history/{addr}", get(history::<S>))
        .route("/search-blocks/{hash}", get(search_blocks::<S>))
        .route("/search-tx/{query}", get(search_tx::<S>))
}

async fn height<S: BlockStore>(State(state): State<Arc<ApiState<S>>>) -> Json<serde_json::Value> {
    Json(json!({ "height": state.chain().read().height() }))
}

async fn block<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(h): Path<u64>,
) -> Result<Json<cinder_core::Block>, ApiError> {
    let block = state.chain().read().block(h)?;
    block
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("block {h}")))
}

#[derive(Debug, Deserialize)]
struct BlocksQuery {
    start: u64,
    end: u64,
}

async fn blocks<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Query(query): Query<BlocksQuery>,
) -> Result<Json<Vec<cinder_core::Block>>, ApiError> {
    if query.end < query.start {
        return Err(ApiError::BadRequest("end before start".into()));
    }
    if query.end - query.start > SYNC_BATCH {
        return Err(ApiError::BadRequest(format!(
            "range wider than {SYNC_BATCH} blocks"
        )));
    }
    Ok(Json(state.chain().read().blocks(query.start, query.end)?))
}

async fn mempool<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
) -> Json<Vec<cinder_core::Transaction>> {
    Json(state.chain().read().mempool_txs())
}

async fn diff<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let diff = state.chain().read().diff_hex()?;
    Ok(Json(json!({ "diff": diff })))
}

async fn mint_fee<S: BlockStore>(State(state): State<Arc<ApiState<S>>>) -> Json<serde_json::Value> {
    Json(json!({ "fee": state.chain().read().mint_fee_now() }))
}

async fn reward<S: BlockStore>(State(state): State<Arc<ApiState<S>>>) -> Json<serde_json::Value> {
    Json(json!({ "reward": state.chain().read().reward_now() }))
}

async fn balance<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(segment): Path<String>,
) -> Json<u64> {
    let (addr, token) = split_addr_token(&segment);
    Json(state.chain().read().balance(addr, token))
}

async fn locked<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(segment): Path<String>,
) -> Json<u64> {
    let (addr, token) = split_addr_token(&segment);
    Json(state.chain().read().locked_balance(addr, token))
}

async fn balance_mempool<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(segment): Path<String>,
) -> Json<u64> {
    let (addr, token) = split_addr_token(&segment);
    Json(state.chain().read().mempool_balance(addr, token))
}

async fn tokens<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(addr): Path<String>,
) -> Json<Vec<String>> {
    Json(state.chain().read().tokens_of(&addr))
}

async fn token_info<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(token): Path<String>,
) -> Result<Json<cinder_chain::MintInfo>, ApiError> {
    state
        .chain()
        .read()
        .token_info(&token)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("token {token}")))
}

async fn token_count<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
) -> Json<serde_json::Value> {
    Json(json!({ "count": state.chain().read().token_count() }))
}

async fn token_at<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(i): Path<usize>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entry = state.chain().read().token_at(i);
    match entry {
        Some((token, info)) => Ok(Json(json!({
            "token": token,
            "miningReward": info.mining_reward,
            "airdrop": info.airdrop,
        }))),
        None => Err(ApiError::NotFound(format!("token index {i}"))),
    }
}

async fn history<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(addr): Path<String>,
) -> Result<Json<Vec<cinder_chain::HistoryEntry>>, ApiError> {
    Ok(Json(state.chain().read().history(&addr)?))
}

async fn search_blocks<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(hash): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let found = state.chain().read().find_block(&hash)?;
    match found {
        Some((height, block)) => Ok(Json(json!({ "block": block, "height": height }))),
        None => Err(ApiError::NotFound(format!("block {hash}"))),
    }
}

async fn search_tx<S: BlockStore>(
    State(state): State<Arc<ApiState<S>>>,
    Path(query): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let results = state.chain().read().search_txs(&query, SEARCH_LIMIT)?;
    Ok(Json(json!({ "results": results })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_addr_token() {
        assert_eq!(split_addr_token("02ab"), ("02ab", None));
        assert_eq!(split_addr_token("02ab.FOO"), ("02ab", Some("FOO")));
        assert_eq!(split_addr_token("02ab."), ("02ab.", None));
    }
}
