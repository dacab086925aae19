// src/model/usersync.rs

use serde::{Deserialize, Serialize};

/// 合作方 Usersync 静态描述，adapter 构造时固定，与单次调用无关。
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UsersyncInfo {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub support_cors: bool,
}
