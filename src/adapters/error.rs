// src/adapters/error.rs

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdapterError>;

/// 合作方调用错误。任何一种都只终止当前合作方的调用，
/// 不影响同一竞价内的其它合作方。
#[derive(Debug, Error)]
pub enum AdapterError {
    /// 合作方参数缺失或格式错误，在任何网络调用之前发现
    #[error("invalid partner params: {0}")]
    BadParams(String),

    /// 共享截止时间已到（调用中止或未发起），本层不重试
    #[error("partner call timed out")]
    TimedOut,

    /// DNS / 连接 / TLS 等传输层失败，无 HTTP 状态
    #[error("transport error: {0}")]
    Transport(String),

    /// 非 200/204 状态，body 原样保留供排查
    #[error("HTTP status {status}; body: {body}")]
    BadStatus { status: u16, body: String },

    /// 响应 JSON 解析失败
    #[error("invalid partner response: {0}")]
    BadResponse(String),

    /// 响应引用了请求中不存在的广告位 code，
    /// 属于内部账目错误而非合作方行为，需单独标记上报
    #[error("unknown ad unit code '{0}'")]
    UnknownAdUnit(String),
}

impl AdapterError {
    pub fn is_bookkeeping(&self) -> bool {
        matches!(self, AdapterError::UnknownAdUnit(_))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::TimedOut
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}
