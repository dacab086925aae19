// src/bidding/engine.rs

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use crate::adapters::Adapter;
use crate::logging::auction_log::AuctionLog;
use crate::logging::runtime_logger::RuntimeLogger;
use crate::model::auction::AuctionRequest;
use crate::model::bid::CanonicalBid;
use crate::model::partner::{DebugRecord, PartnerRequest, PartnerUnit};
use crate::model::usersync::UsersyncInfo;

/// 单个合作方的调用结果摘要，随竞价响应返回
#[derive(Serialize, Debug)]
pub struct PartnerStatus {
    pub partner: String,
    pub response_time_ms: u128,
    pub num_bids: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_cookie: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usersync: Option<UsersyncInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Vec<DebugRecord>>,
}

/// 竞价响应：成功合作方的全部出价 + 每个合作方的诊断条目。
/// 本层不做排序/去重，排序属于下游。
#[derive(Serialize, Debug)]
pub struct AuctionResponse {
    pub tid: String,
    pub status: String,
    pub bids: Vec<CanonicalBid>,
    pub bidder_status: Vec<PartnerStatus>,
}

/// 按合作方分组广告位，缺失的 bid_id 在此生成，
/// 由此建立规范 bid id 与线级 impression id 的对账表。
fn partner_requests(req: &AuctionRequest) -> Vec<PartnerRequest> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<PartnerUnit>> = HashMap::new();
    for unit in &req.ad_units {
        for bid in &unit.bids {
            let bid_id = if bid.bid_id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                bid.bid_id.clone()
            };
            if !grouped.contains_key(&bid.bidder) {
                order.push(bid.bidder.clone());
            }
            grouped.entry(bid.bidder.clone()).or_default().push(PartnerUnit {
                code: unit.code.clone(),
                bid_id,
                sizes: unit.sizes.clone(),
                media_types: unit.media_types.clone(),
                topframe: unit.topframe,
                video: unit.video.clone(),
                params: bid.params.clone(),
            });
        }
    }
    order
        .into_iter()
        .map(|code| {
            let units = grouped.remove(&code).unwrap_or_default();
            PartnerRequest::new(&code, units)
        })
        .collect()
}

/// 处理一次竞价：每个合作方一个独立任务，join 后合并出价与调试记录。
/// 单个合作方失败只体现在它自己的 bidder_status 里，竞价照常进行。
pub async fn process_auction(
    mut auction: AuctionRequest,
    adapters: &HashMap<String, Arc<dyn Adapter>>,
    runtime_logger: &Arc<RuntimeLogger>,
) -> AuctionResponse {
    auction.arm();
    let partners = partner_requests(&auction);
    let auction = Arc::new(auction);

    let mut statuses: Vec<PartnerStatus> = Vec::new();
    let mut tasks = Vec::new();
    for partner in partners {
        let adapter = match adapters.get(&partner.partner_code) {
            Some(adapter) => Arc::clone(adapter),
            None => {
                statuses.push(PartnerStatus {
                    partner: partner.partner_code.clone(),
                    response_time_ms: 0,
                    num_bids: 0,
                    error: Some(format!("unknown bidder '{}'", partner.partner_code)),
                    no_cookie: None,
                    usersync: None,
                    debug: None,
                });
                continue;
            }
        };
        if adapter.skip_no_cookies() && auction.user.is_none() {
            statuses.push(PartnerStatus {
                partner: partner.partner_code.clone(),
                response_time_ms: 0,
                num_bids: 0,
                error: None,
                no_cookie: Some(true),
                usersync: Some(adapter.usersync_info().clone()),
                debug: None,
            });
            continue;
        }
        let req = Arc::clone(&auction);
        tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let mut partner = partner;
            let result = adapter.call(&req, &mut partner).await;
            (partner, result, started.elapsed().as_millis())
        }));
    }

    let mut bids: Vec<CanonicalBid> = Vec::new();
    let mut log = AuctionLog::new(&auction.tid);
    for joined in join_all(tasks).await {
        let (mut partner, result, elapsed_ms) = match joined {
            Ok(value) => value,
            Err(err) => {
                warn!("partner task failed to join: {}", err);
                continue;
            }
        };

        let mut status = PartnerStatus {
            partner: partner.partner_code.clone(),
            response_time_ms: elapsed_ms,
            num_bids: 0,
            error: None,
            no_cookie: None,
            usersync: None,
            debug: None,
        };
        if auction.user.is_none() {
            if let Some(adapter) = adapters.get(&partner.partner_code) {
                status.no_cookie = Some(true);
                status.usersync = Some(adapter.usersync_info().clone());
            }
        }

        match result.outcome {
            Ok(mut partner_bids) => {
                status.num_bids = partner_bids.len();
                log.add_partner_call(&partner.partner_code, partner_bids.len(), "success", elapsed_ms);
                bids.append(&mut partner_bids);
            }
            Err(err) => {
                let class = if err.is_bookkeeping() {
                    "bookkeeping_error"
                } else {
                    "call_failed"
                };
                log.add_partner_call(&partner.partner_code, 0, class, elapsed_ms);
                runtime_logger
                    .log(
                        "ERROR",
                        &json!({
                            "tid": auction.tid,
                            "hbs_log": class,
                            "partner": partner.partner_code,
                            "error": err.to_string(),
                            "status_code": result.status_code,
                        })
                        .to_string(),
                    )
                    .await;
                status.error = Some(err.to_string());
            }
        }

        if auction.is_debug {
            status.debug = Some(std::mem::take(&mut partner.debug));
        }
        statuses.push(status);
    }

    log.set_result(bids.len());
    runtime_logger
        .log("INFO", &serde_json::to_string(&log).unwrap_or_default())
        .await;

    AuctionResponse {
        tid: auction.tid.clone(),
        status: "OK".to_string(),
        bids,
        bidder_status: statuses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::xhb::XhbAdapter;
    use crate::adapters::{HttpAdapter, HttpAdapterConfig};
    use serde_json::json;

    fn auction_json(bidders: &[&str]) -> AuctionRequest {
        let bids: Vec<serde_json::Value> = bidders
            .iter()
            .map(|b| json!({"bidder": b, "params": {"placementId": 123}}))
            .collect();
        serde_json::from_value(json!({
            "tid": "auction-42",
            "is_debug": true,
            "timeout_ms": 1500,
            "ad_units": [{
                "code": "div-1",
                "sizes": [{"w": 300, "h": 250}],
                "bids": bids
            }]
        }))
        .unwrap()
    }

    fn registry(entries: Vec<(&str, XhbAdapter)>) -> HashMap<String, Arc<dyn Adapter>> {
        entries
            .into_iter()
            .map(|(code, adapter)| (code.to_string(), Arc::new(adapter) as Arc<dyn Adapter>))
            .collect()
    }

    fn test_logger() -> Arc<RuntimeLogger> {
        let log_dir = std::env::temp_dir().join("hbs_engine_test_logs");
        std::fs::create_dir_all(&log_dir).unwrap();
        RuntimeLogger::new(log_dir.to_str().unwrap(), "engine_test", 16, 4, 100)
    }

    #[tokio::test]
    async fn failing_partner_does_not_block_sibling() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/openrtb2")
            .with_status(200)
            .with_body(
                json!({
                    "id": "auction-42",
                    "seatbid": [{"bid": [{"id": "1", "impid": "div-1", "price": 0.80}]}]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let http = HttpAdapter::new(&HttpAdapterConfig::default(), &[]).unwrap();
        let good = XhbAdapter::new(
            http.clone(),
            "http://hbs.example.com",
            &format!("{}/openrtb2", server.url()),
        );
        // 无人监听的端口：传输错误，只影响该合作方
        let bad = XhbAdapter::new(http, "http://hbs.example.com", "http://127.0.0.1:9/openrtb2");

        let adapters = registry(vec![("xhb", good), ("xhb_backup", bad)]);
        let runtime_logger = test_logger();
        let response = process_auction(auction_json(&["xhb", "xhb_backup"]), &adapters, &runtime_logger).await;

        assert_eq!(response.tid, "auction-42");
        assert_eq!(response.bids.len(), 1);
        assert_eq!(response.bids[0].partner_code, "xhb");
        assert!(!response.bids[0].bid_id.is_empty());

        let good_status = response.bidder_status.iter().find(|s| s.partner == "xhb").unwrap();
        assert_eq!(good_status.num_bids, 1);
        assert!(good_status.error.is_none());
        assert!(good_status.debug.is_some());

        let bad_status = response
            .bidder_status
            .iter()
            .find(|s| s.partner == "xhb_backup")
            .unwrap();
        assert_eq!(bad_status.num_bids, 0);
        assert!(bad_status.error.is_some());
    }

    #[tokio::test]
    async fn unknown_bidder_is_reported_not_fatal() {
        let adapters: HashMap<String, Arc<dyn Adapter>> = HashMap::new();
        let runtime_logger = test_logger();
        let response = process_auction(auction_json(&["ghost"]), &adapters, &runtime_logger).await;
        assert!(response.bids.is_empty());
        assert_eq!(response.bidder_status.len(), 1);
        assert!(response.bidder_status[0]
            .error
            .as_deref()
            .unwrap()
            .contains("unknown bidder"));
    }
}
