// src/adapters/xhb.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use url::form_urlencoded;

use crate::adapters::error::{AdapterError, Result};
use crate::adapters::openrtb::{make_openrtb_generic, translate_bids};
use crate::adapters::{execute_call, Adapter, Bidder, CallResult, HttpAdapter, WireCall};
use crate::model::auction::{AuctionRequest, MediaType};
use crate::model::bid::CanonicalBid;
use crate::model::partner::PartnerRequest;
use crate::model::usersync::UsersyncInfo;
use crate::openrtb::request::{AD_POSITION_ABOVE_THE_FOLD, AD_POSITION_BELOW_THE_FOLD};
use crate::openrtb::response::BidResponse;

pub const DEFAULT_ENDPOINT: &str = "http://ib.xhb-exchange.com/openrtb2";
const USERSYNC_URL: &str = "//ib.xhb-exchange.com/getuid?";

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct KeyVal {
    pub key: String,
    #[serde(rename = "value", default)]
    pub values: Vec<String>,
}

/// xhb 广告位私有参数：params blob 在校验阶段一次性解码成这个形态，
/// 之后只操作强类型字段。
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct XhbParams {
    pub placement_id: u64,
    pub inv_code: String,
    pub account: String,
    pub keywords: Vec<KeyVal>,
    pub traffic_source_code: String,
    pub reserve: f64,
    pub position: String,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

#[derive(Serialize, Debug)]
struct XhbImpExt {
    xhb: XhbImpExtInner,
}

#[derive(Serialize, Debug)]
struct XhbImpExtInner {
    #[serde(skip_serializing_if = "is_zero")]
    placement_id: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    keywords: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    traffic_source_code: String,
}

/// keywords 摊平成 xhb 原生编码：`key=value` 逗号连接，无值的 key 单独输出
fn flatten_keywords(keywords: &[KeyVal]) -> String {
    let mut kvs = Vec::with_capacity(keywords.len() * 2);
    for kv in keywords {
        if kv.values.is_empty() {
            kvs.push(kv.key.clone());
        } else {
            for value in &kv.values {
                kvs.push(format!("{}={}", kv.key, value));
            }
        }
    }
    kvs.join(",")
}

fn decode_params(raw: &OwnedValue) -> Result<XhbParams> {
    let json = serde_json::to_string(raw)
        .map_err(|err| AdapterError::BadParams(err.to_string()))?;
    serde_json::from_str(&json)
        .map_err(|err| AdapterError::BadParams(format!("unable to decode xhb params: {}", err)))
}

/// xhb 合作方 adapter
pub struct XhbAdapter {
    http: HttpAdapter,
    uri: String,
    usersync_info: UsersyncInfo,
}

impl XhbAdapter {
    pub fn new(http: HttpAdapter, external_url: &str, endpoint: &str) -> Self {
        let redirect_uri = format!("{}/setuid?bidder=xhb&uid=$UID", external_url);
        let escaped: String = form_urlencoded::byte_serialize(redirect_uri.as_bytes()).collect();
        let usersync_info = UsersyncInfo {
            url: format!("{}{}", USERSYNC_URL, escaped),
            kind: "redirect".to_string(),
            support_cors: false,
        };
        Self {
            http,
            uri: endpoint.to_string(),
            usersync_info,
        }
    }
}

impl Bidder for XhbAdapter {
    fn make_wire_requests(
        &self,
        req: &AuctionRequest,
        partner: &PartnerRequest,
    ) -> Result<Vec<WireCall>> {
        let supported = [MediaType::Banner, MediaType::Video];
        let mut wire_req = make_openrtb_generic(req, partner, &supported, true)?;

        let mut uri = self.uri.clone();
        for imp in wire_req.imp.iter_mut() {
            let unit = partner
                .ad_units
                .iter()
                .find(|u| u.code == imp.id)
                .ok_or_else(|| {
                    AdapterError::BadParams(format!("no ad unit for imp '{}'", imp.id))
                })?;
            let params = decode_params(&unit.params)?;

            if params.placement_id == 0
                && (params.inv_code.is_empty() || params.account.is_empty())
            {
                return Err(AdapterError::BadParams(
                    "no placement or account+invcode provided".to_string(),
                ));
            }

            if !params.inv_code.is_empty() {
                imp.tagid = Some(params.inv_code.clone());
                if !params.account.is_empty() {
                    // 不同广告位可能属于不同账号，目标 URI 每次重算、不缓存
                    uri = format!("{}?account_id={}", self.uri, params.account);
                }
            }
            if params.reserve > 0.0 {
                imp.bidfloor = Some(params.reserve); // TODO: 非 USD 的 reserve 需要换算货币
            }
            if let Some(banner) = imp.banner.as_mut() {
                match params.position.as_str() {
                    "above" => banner.pos = Some(AD_POSITION_ABOVE_THE_FOLD),
                    "below" => banner.pos = Some(AD_POSITION_BELOW_THE_FOLD),
                    _ => {}
                }
            }

            let ext = XhbImpExt {
                xhb: XhbImpExtInner {
                    placement_id: params.placement_id,
                    keywords: flatten_keywords(&params.keywords),
                    traffic_source_code: params.traffic_source_code.clone(),
                },
            };
            imp.ext = Some(
                serde_json::to_value(&ext)
                    .map_err(|err| AdapterError::BadParams(err.to_string()))?,
            );
        }

        let body = serde_json::to_vec(&wire_req)
            .map_err(|err| AdapterError::BadParams(err.to_string()))?;
        Ok(vec![WireCall {
            uri,
            body,
            bid_request: wire_req,
        }])
    }

    fn make_bids(
        &self,
        call: &WireCall,
        body: &mut [u8],
        partner: &PartnerRequest,
    ) -> Result<Vec<CanonicalBid>> {
        let resp: BidResponse = simd_json::from_slice(body)
            .map_err(|err| AdapterError::BadResponse(err.to_string()))?;
        translate_bids(&resp, &call.bid_request, partner)
    }
}

#[async_trait]
impl Adapter for XhbAdapter {
    fn name(&self) -> &'static str {
        "xhb"
    }

    fn family_name(&self) -> &'static str {
        "xhb"
    }

    fn skip_no_cookies(&self) -> bool {
        false
    }

    fn usersync_info(&self) -> &UsersyncInfo {
        &self.usersync_info
    }

    async fn call(&self, req: &AuctionRequest, partner: &mut PartnerRequest) -> CallResult {
        execute_call(self, &self.http, req, partner).await
    }
}
