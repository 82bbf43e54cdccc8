//! 平台客户端 traits 定义
//!
//! 发布编排器只通过这两个接口访问平台，
//! 真实的 HTTP 客户端与测试替身都实现它们

use crate::core::{PlatformError, UploadRequest};
use serde_json::Value;
use std::sync::Arc;

/// 笔记相关的平台接口
#[async_trait::async_trait]
pub trait NoteApi: Send + Sync {
    /// 获取视频首帧图片ID
    ///
    /// 也用作凭证有效性的轻量校验
    async fn get_video_first_frame_image_id(&self, video_id: &str) -> Result<Value, PlatformError>;

    /// 搜索话题建议，按平台返回顺序排列
    async fn get_suggest_topic(&self, keyword: &str) -> Result<Vec<Value>, PlatformError>;

    /// 创建视频笔记
    ///
    /// # 返回
    ///
    /// 平台返回的笔记数据
    async fn create_video_note(&self, request: &UploadRequest) -> Result<Value, PlatformError>;
}

/// 平台客户端连接器
///
/// 用解析出的 Cookie 构造绑定到该账号的客户端
pub trait NoteApiConnector: Send + Sync {
    fn connect(&self, cookies: &str) -> Result<Arc<dyn NoteApi>, PlatformError>;
}
