use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::bidding::engine::{process_auction, AuctionResponse};
use crate::model::auction::AuctionRequest;
use crate::AppState;

/// **处理竞价请求**
/// 合作方失败只体现在各自的 bidder_status 条目里，响应始终 200。
pub async fn handle_auction_request(
    State(state): State<Arc<AppState>>,
    Json(auction_request): Json<AuctionRequest>,
) -> (StatusCode, Json<AuctionResponse>) {
    let response = process_auction(auction_request, &state.adapters, &state.runtime_logger).await;
    (StatusCode::OK, Json(response))
}
