// src/model/auction.rs

use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use std::fmt;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

use crate::openrtb::request::Format;

/// 竞价超时默认值 / 上限（毫秒）
const DEFAULT_TMAX_MS: u64 = 250;
const MAX_TMAX_MS: u64 = 2000;

fn default_tmax() -> u64 {
    DEFAULT_TMAX_MS
}

fn default_deadline() -> Instant {
    Instant::now()
}

/// 广告位支持的媒体类型
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Banner => "banner",
            MediaType::Video => "video",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_media_types() -> Vec<MediaType> {
    vec![MediaType::Banner]
}

/// 广告位的视频配置（声明 video 媒体类型时必填）
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VideoParams {
    pub mimes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startdelay: Option<i32>,
}

/// 广告位上单个合作方的出价配置。
/// params 为合作方私有 JSON，此处不解析，由对应 adapter 在校验阶段解码。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdUnitBid {
    pub bidder: String,
    #[serde(default)]
    pub bid_id: String,
    pub params: Box<OwnedValue>,
}

/// 发布方广告位
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdUnit {
    pub code: String,
    #[serde(default)]
    pub sizes: Vec<Format>,
    #[serde(default = "default_media_types")]
    pub media_types: Vec<MediaType>,
    #[serde(default)]
    pub topframe: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoParams>,
    pub bids: Vec<AdUnitBid>,
}

/// 一次竞价的规范化入站请求。
/// 分发开始后对各 adapter 只读；deadline 在分发前由 arm() 固定。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuctionRequest {
    #[serde(default)]
    pub tid: String,
    #[serde(default)]
    pub is_debug: bool,
    #[serde(default = "default_tmax")]
    pub timeout_ms: u64,
    pub ad_units: Vec<AdUnit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<OwnedValue>>,
    /// 所有出站调用共享的截止时间（不参与序列化）
    #[serde(skip, default = "default_deadline")]
    pub deadline: Instant,
}

impl AuctionRequest {
    /// 固定本次竞价的 tid 与共享截止时间，必须在分发前调用一次。
    pub fn arm(&mut self) {
        if self.tid.is_empty() {
            self.tid = Uuid::new_v4().to_string();
        }
        if self.timeout_ms == 0 || self.timeout_ms > MAX_TMAX_MS {
            self.timeout_ms = DEFAULT_TMAX_MS;
        }
        self.deadline = Instant::now() + Duration::from_millis(self.timeout_ms);
    }
}
