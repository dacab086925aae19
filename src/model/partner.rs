// src/model/partner.rs

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use std::collections::HashMap;

use crate::model::auction::{MediaType, VideoParams};
use crate::openrtb::request::Format;

/// 调试记录：一次出站调用的请求与响应快照。
/// 仅在 is_debug 时生成，请求体在发起调用之前写入。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DebugRecord {
    pub request_uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(default)]
    pub status_code: u16,
}

/// 单个合作方视角下的广告位配置
#[derive(Debug, Clone)]
pub struct PartnerUnit {
    pub code: String,
    /// 发布方请求的规范 bid 标识，译码时经查找表反查，绝不凭空生成
    pub bid_id: String,
    pub sizes: Vec<Format>,
    pub media_types: Vec<MediaType>,
    pub topframe: i32,
    pub video: Option<VideoParams>,
    /// 合作方私有参数（原始 JSON），由 adapter 在校验阶段解码一次
    pub params: Box<OwnedValue>,
}

/// 单个合作方在一次竞价中的调用视图。
/// 每个合作方任务独占一份，debug 列表由编排器在 join 之后合并。
#[derive(Debug)]
pub struct PartnerRequest {
    pub partner_code: String,
    pub ad_units: Vec<PartnerUnit>,
    pub debug: Vec<DebugRecord>,
    bid_id_index: OnceCell<HashMap<String, String>>,
}

impl PartnerRequest {
    pub fn new(partner_code: &str, ad_units: Vec<PartnerUnit>) -> Self {
        Self {
            partner_code: partner_code.to_string(),
            ad_units,
            debug: Vec::new(),
            bid_id_index: OnceCell::new(),
        }
    }

    /// 线级 impression id（即广告位 code）反查规范 bid id。
    /// 索引首次使用时构建并缓存。
    pub fn lookup_bid_id(&self, code: &str) -> Option<&str> {
        self.bid_id_index
            .get_or_init(|| {
                self.ad_units
                    .iter()
                    .map(|u| (u.code.clone(), u.bid_id.clone()))
                    .collect()
            })
            .get(code)
            .map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(code: &str, bid_id: &str) -> PartnerUnit {
        PartnerUnit {
            code: code.to_string(),
            bid_id: bid_id.to_string(),
            sizes: vec![Format { w: 300, h: 250 }],
            media_types: vec![MediaType::Banner],
            topframe: 0,
            video: None,
            params: Box::new(OwnedValue::default()),
        }
    }

    #[test]
    fn lookup_resolves_known_codes_only() {
        let partner = PartnerRequest::new("xhb", vec![unit("div-1", "bid-a"), unit("div-2", "bid-b")]);
        assert_eq!(partner.lookup_bid_id("div-1"), Some("bid-a"));
        assert_eq!(partner.lookup_bid_id("div-2"), Some("bid-b"));
        assert_eq!(partner.lookup_bid_id("div-3"), None);
    }
}
