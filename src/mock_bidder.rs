use axum::serve;
use axum::{routing::post, Json, Router};
use rand::Rng;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};
use tracing::info;

use crate::openrtb::request::BidRequest;
use crate::openrtb::response::{Bid, BidResponse, SeatBid};

/// 模拟合作方竞价响应：按 impression 类型随机出价，
/// banner 返回 HTML 创意，video 返回 VAST 创意。
async fn handle_partner_bid(Json(request): Json<BidRequest>) -> Json<BidResponse> {
    info!(
        "Mock bidder received BidRequest: id={}, imp_count={}",
        request.id,
        request.imp.len()
    );

    // 模拟合作方处理延迟（10 ~ 80 毫秒）
    let delay_ms = rand::thread_rng().gen_range(10..80);
    sleep(Duration::from_millis(delay_ms)).await;

    let mut bids = Vec::new();
    for imp in &request.imp {
        let bid_id = format!("bid-{}", imp.id);
        let floor = imp.bidfloor.unwrap_or(0.10);
        let multiplier = if let Some(banner) = &imp.banner {
            if banner.w == Some(300) && banner.h == Some(250) {
                rand::thread_rng().gen_range(1.0..3.0)
            } else {
                rand::thread_rng().gen_range(0.8..1.5)
            }
        } else if imp.video.is_some() {
            rand::thread_rng().gen_range(1.2..2.5)
        } else {
            rand::thread_rng().gen_range(1.0..2.0)
        };
        let price = floor * multiplier;

        let adm = if imp.video.is_some() {
            format!(
                r#"<VAST version="3.0"><Ad id="{bid_id}"><InLine><AdSystem>Mock Bidder</AdSystem><AdTitle>Mock Video Ad</AdTitle><Impression><![CDATA[http://tk.mock-bidder.local/impression?bid={bid_id}]]></Impression></InLine></Ad></VAST>"#,
                bid_id = bid_id
            )
        } else {
            format!(
                "<html><body>Mock Bidder Ad<img src=\"http://tk.mock-bidder.local/impression?bid={bid_id}\" style=\"display:none;\" /></body></html>",
                bid_id = bid_id
            )
        };

        bids.push(Bid {
            id: bid_id.clone(),
            impid: imp.id.clone(),
            price,
            adm: Some(adm),
            nurl: Some(format!("http://tk.mock-bidder.local/win?bid={}", bid_id)),
            crid: Some(format!("cr-{}", imp.id)),
            cid: None,
            dealid: None,
            adomain: None,
            w: imp.banner.as_ref().and_then(|b| b.w).map(|w| w as u64),
            h: imp.banner.as_ref().and_then(|b| b.h).map(|h| h as u64),
        });
    }

    Json(BidResponse {
        id: request.id.clone(),
        seatbid: vec![SeatBid {
            bid: bids,
            seat: Some("mock_seat".to_string()),
            group: Some(0),
        }],
        bidid: None,
        cur: Some("USD".to_string()),
        nbr: None,
    })
}

/// 启动 Mock 合作方服务
/// 路由为 `/openrtb2`，与 static/partner_info.json 中的地址保持一致
pub async fn start_mock_bidder_server(port: u16) {
    let app = Router::new().route("/openrtb2", post(handle_partner_bid));

    let addr = format!("0.0.0.0:{}", port);
    info!("Mock bidder running at http://{}", addr);

    let listener = TcpListener::bind(&addr).await.unwrap();
    serve(listener, app).await.unwrap();
}
