// src/openrtb/request.rs

use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;

/// 广告位置常量（OpenRTB AdPosition）
pub const AD_POSITION_ABOVE_THE_FOLD: i32 = 1;
pub const AD_POSITION_BELOW_THE_FOLD: i32 = 3;

/// 出站 OpenRTB BidRequest（合作方线格式）。
/// 每次调用单独构造，构造期间可变，序列化之后不再修改；
/// site/app/device/user 等大字段按原始 JSON（OwnedValue）透传，不做二次解析。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BidRequest {
    pub id: String,
    pub imp: Vec<Imp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Box<OwnedValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tmax: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<i32>,
}

/// 单个广告展示（imp）
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Imp {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bidfloor: Option<f64>,
    /// 合作方自定义扩展（如 {"xhb": {...}}）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Format {
    pub w: i32,
    pub h: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Banner {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub format: Vec<Format>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topframe: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos: Option<i32>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Video {
    pub mimes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minduration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxduration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub startdelay: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub w: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h: Option<i32>,
}
