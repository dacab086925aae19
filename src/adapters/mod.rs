// src/adapters/mod.rs

pub mod error;
pub mod openrtb;
pub mod xhb;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Certificate, Client};
use tokio::time::{timeout_at, Duration, Instant};

use crate::model::auction::AuctionRequest;
use crate::model::bid::CanonicalBid;
use crate::model::partner::{DebugRecord, PartnerRequest};
use crate::model::usersync::UsersyncInfo;
use crate::openrtb::request::BidRequest;
use error::AdapterError;

/// 出站 HTTP 连接池配置
#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    pub max_idle_conns: usize,
    pub max_idle_conns_per_host: usize,
    pub idle_conn_timeout: Duration,
}

impl Default for HttpAdapterConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: 50,
            max_idle_conns_per_host: 10,
            idle_conn_timeout: Duration::from_secs(60),
        }
    }
}

/// 进程级共享的出站 HTTP 客户端。启动时构造一次，
/// 注入到每个 adapter 实例，不按调用重建。
#[derive(Clone)]
pub struct HttpAdapter {
    pub client: Client,
}

impl HttpAdapter {
    pub fn new(config: &HttpAdapterConfig, root_certs: &[Certificate]) -> reqwest::Result<Self> {
        // reqwest 按 host 维护连接池，总闲置上限收紧为 per-host 上限
        let mut builder = Client::builder()
            .pool_max_idle_per_host(config.max_idle_conns_per_host.min(config.max_idle_conns))
            .pool_idle_timeout(config.idle_conn_timeout);
        for cert in root_certs {
            builder = builder.add_root_certificate(cert.clone());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

/// 一次合作方调用的结果：规范化出价或错误，
/// 并无论成败都带上原始 HTTP 状态与 body 供排查。
#[derive(Debug)]
pub struct CallResult {
    pub outcome: std::result::Result<Vec<CanonicalBid>, AdapterError>,
    pub status_code: Option<u16>,
    pub response_body: Option<String>,
}

impl CallResult {
    pub fn from_error(err: AdapterError) -> Self {
        Self {
            outcome: Err(err),
            status_code: None,
            response_body: None,
        }
    }
}

/// 历史 Adapter 接口：合作方实现的调用约定。
#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str;
    /// cookie 空间名（usersync 用）
    fn family_name(&self) -> &'static str;
    /// 无同步用户 id 时是否跳过本合作方
    fn skip_no_cookies(&self) -> bool;
    fn usersync_info(&self) -> &UsersyncInfo;
    /// 发起一次合作方调用。错误只作用于本合作方的结果。
    async fn call(&self, req: &AuctionRequest, partner: &mut PartnerRequest) -> CallResult;
}

/// 一次出站调用的完整描述：目标 URI、序列化后的请求体，
/// 以及用于译码的线级请求结构。
#[derive(Debug, Clone)]
pub struct WireCall {
    pub uri: String,
    pub body: Vec<u8>,
    pub bid_request: BidRequest,
}

/// 新 Bidder 契约：把一次调用拆成两个无副作用的纯函数，
/// 各合作方的翻译逻辑不经网络即可测试。
pub trait Bidder: Send + Sync {
    /// 规范请求 → 出站线级请求集合
    fn make_wire_requests(
        &self,
        req: &AuctionRequest,
        partner: &PartnerRequest,
    ) -> error::Result<Vec<WireCall>>;

    /// 线级响应 body → 规范化出价
    fn make_bids(
        &self,
        call: &WireCall,
        body: &mut [u8],
        partner: &PartnerRequest,
    ) -> error::Result<Vec<CanonicalBid>>;
}

/// 共享调用驱动：Bidder 的两个纯函数之间的全部副作用都在这里。
/// 截止时间一到立即放弃在途调用，并且不再发起新的网络调用；重试属于编排器。
pub async fn execute_call<B: Bidder + ?Sized>(
    bidder: &B,
    http: &HttpAdapter,
    req: &AuctionRequest,
    partner: &mut PartnerRequest,
) -> CallResult {
    let calls = match bidder.make_wire_requests(req, partner) {
        Ok(calls) => calls,
        Err(err) => return CallResult::from_error(err),
    };

    let mut bids: Vec<CanonicalBid> = Vec::new();
    let mut status_code = None;
    let mut response_body = None;

    for call in calls {
        // 请求快照先于网络调用写入，失败的调用同样可审计
        let debug_idx = if req.is_debug {
            partner.debug.push(DebugRecord {
                request_uri: call.uri.clone(),
                request_body: Some(String::from_utf8_lossy(&call.body).into_owned()),
                response_body: None,
                status_code: 0,
            });
            Some(partner.debug.len() - 1)
        } else {
            None
        };

        if Instant::now() >= req.deadline {
            return CallResult {
                outcome: Err(AdapterError::TimedOut),
                status_code,
                response_body,
            };
        }

        let send = http
            .client
            .post(&call.uri)
            .header(CONTENT_TYPE, "application/json;charset=utf-8")
            .header(ACCEPT, "application/json")
            .body(call.body.clone())
            .send();
        let resp = match timeout_at(req.deadline, send).await {
            Err(_) => {
                return CallResult {
                    outcome: Err(AdapterError::TimedOut),
                    status_code,
                    response_body,
                }
            }
            Ok(Err(err)) => {
                return CallResult {
                    outcome: Err(err.into()),
                    status_code,
                    response_body,
                }
            }
            Ok(Ok(resp)) => resp,
        };

        let status = resp.status().as_u16();
        status_code = Some(status);
        if let Some(idx) = debug_idx {
            partner.debug[idx].status_code = status;
        }

        // 204：合作方明确不出价，不算错误
        if status == 204 {
            continue;
        }

        let body = match timeout_at(req.deadline, resp.bytes()).await {
            Err(_) => {
                return CallResult {
                    outcome: Err(AdapterError::TimedOut),
                    status_code,
                    response_body,
                }
            }
            Ok(Err(err)) => {
                return CallResult {
                    outcome: Err(err.into()),
                    status_code,
                    response_body,
                }
            }
            Ok(Ok(body)) => body,
        };
        let raw = String::from_utf8_lossy(&body).into_owned();
        response_body = Some(raw.clone());

        if status != 200 {
            return CallResult {
                outcome: Err(AdapterError::BadStatus { status, body: raw }),
                status_code,
                response_body,
            };
        }

        if let Some(idx) = debug_idx {
            partner.debug[idx].response_body = Some(raw);
        }

        let mut buf = body.to_vec();
        match bidder.make_bids(&call, &mut buf, partner) {
            Ok(mut translated) => bids.append(&mut translated),
            Err(err) => {
                return CallResult {
                    outcome: Err(err),
                    status_code,
                    response_body,
                }
            }
        }
    }

    CallResult {
        outcome: Ok(bids),
        status_code,
        response_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pool_config() {
        let config = HttpAdapterConfig::default();
        assert_eq!(config.max_idle_conns, 50);
        assert_eq!(config.max_idle_conns_per_host, 10);
        assert_eq!(config.idle_conn_timeout, Duration::from_secs(60));
    }

    #[test]
    fn shared_client_builds_without_extra_roots() {
        let adapter = HttpAdapter::new(&HttpAdapterConfig::default(), &[]);
        assert!(adapter.is_ok());
    }
}
