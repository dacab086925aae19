// src/model/bid.rs

use serde::{Deserialize, Serialize};

use crate::model::auction::MediaType;

/// 规范化出价：合作方响应中的一条 bid 译码后的结果，
/// 返回后所有权移交编排器，本层不做去重/排序。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CanonicalBid {
    /// 经 PartnerRequest 查找表解析出的 bid 标识
    pub bid_id: String,
    pub ad_unit_code: String,
    pub partner_code: String,
    pub creative_media_type: MediaType,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nurl: Option<String>,
}
