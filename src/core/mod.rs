// Core module - shared types, errors and pacing
// 核心模块 - 公共类型、错误定义与等待控制

mod pacer;
pub use pacer::{Pacer, TokioPacer};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use thiserror::Error;

/// 话题类型标记（提交时平台要求 type = "topic"）
pub const TOPIC_TYPE: &str = "topic";

/// 描述中话题的展示后缀
pub const TOPIC_MARKER: &str = "[话题]";

/// 平台话题
///
/// 话题建议接口返回的记录，`name` 之外的字段原样保留，提交笔记时整体回传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    #[serde(rename = "type", default)]
    pub topic_type: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Topic {
    /// 从平台返回的 JSON 构建话题，缺少 name 时返回 None
    pub fn from_value(value: &Value) -> Option<Self> {
        let mut topic: Topic = serde_json::from_value(value.clone()).ok()?;
        topic.topic_type = TOPIC_TYPE.to_string();
        Some(topic)
    }
}

/// 上传请求
///
/// 一次上传调用中构造一次，构造后不再修改，交给平台客户端提交
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// 视频文件路径
    pub video_path: PathBuf,
    /// 标题（已截断到平台上限）
    pub title: String,
    /// 完整描述（含话题后缀）
    pub description: String,
    /// 封面图片路径
    pub cover_path: Option<PathBuf>,
    /// 已解析的平台话题
    pub topics: Vec<Topic>,
    /// 是否私密发布
    pub is_private: bool,
    /// 定时发布时间（已校验的 `YYYY-MM-DD HH:MM:SS`）
    pub post_time: Option<String>,
}

/// 签名请求
#[derive(Debug, Clone, Default, Serialize)]
pub struct SignRequest {
    pub uri: String,
    pub data: Option<Value>,
    pub a1: String,
    pub web_session: String,
}

/// 签名结果（x-s / x-t 请求头）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedHeaders {
    #[serde(rename = "x-s")]
    pub x_s: String,
    #[serde(rename = "x-t")]
    pub x_t: String,
}

/// 上传失败分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 视频文件不存在或不是普通文件
    NotFound,
    /// 不支持的视频格式
    UnsupportedFormat,
    /// 无法获取凭证或凭证校验失败
    Unauthorized,
    /// 提交笔记失败
    UploadFailed,
}

impl ErrorKind {
    /// 对应的状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::UnsupportedFormat => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::UploadFailed => 500,
        }
    }
}

/// Upload result
///
/// 上传编排器的唯一出口：成功携带平台返回的笔记数据，失败携带分类和可读信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadResult {
    Success { data: Value },
    Failure { kind: ErrorKind, error: String },
}

impl UploadResult {
    pub fn failure(kind: ErrorKind, error: impl Into<String>) -> Self {
        UploadResult::Failure {
            kind,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadResult::Success { .. })
    }

    /// 200 表示成功，其余为失败分类码
    pub fn status_code(&self) -> u16 {
        match self {
            UploadResult::Success { .. } => 200,
            UploadResult::Failure { kind, .. } => kind.status_code(),
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            UploadResult::Success { .. } => None,
            UploadResult::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            UploadResult::Success { data } => Some(data),
            UploadResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            UploadResult::Success { .. } => None,
            UploadResult::Failure { error, .. } => Some(error),
        }
    }
}

/// Platform errors
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Browser error: {0}")]
    BrowserError(String),

    #[error("Signing failed: {0}")]
    SigningFailed(String),

    #[error("IP blocked by platform: {0}")]
    IpBlocked(String),

    #[error("Signature rejected by platform: {0}")]
    SignatureRejected(String),

    #[error("Data fetch failed: {0}")]
    DataFetch(String),

    #[error("Video upload failed: {0}")]
    VideoUploadFailed(String),

    #[error("Publication failed: {0}")]
    PublicationFailed(String),
}

impl std::convert::From<std::io::Error> for PlatformError {
    fn from(e: std::io::Error) -> Self {
        PlatformError::InvalidInput(e.to_string())
    }
}

impl std::convert::From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        PlatformError::NetworkError(e.to_string())
    }
}
