// Xiaohongshu Platform Module
// 小红书平台模块
//
// # 模块结构
//
// - [sign](sign/index.html) - 请求签名（本地浏览器 / 远程服务）
// - [xhs_client](xhs_client/index.html) - HTTP客户端
// - [topics](topics/index.html) - 标签解析与话题查询
// - [utils](utils/index.html) - 标题、描述、时间工具函数
// - [publish_strategy](publish_strategy/index.html) - 视频发布流程

pub mod publish_strategy;
pub mod sign;
pub mod topics;
pub mod utils;
pub mod xhs_client;

pub use publish_strategy::{upload_video_to_xhs, UploadOptions, XhsPublisher, SUPPORTED_EXTENSIONS};
pub use sign::{LocalSigner, RemoteSigner, RequestSigner, SignerFactory, SignerTimings};
pub use topics::{parse_tags, TopicResolver};
pub use xhs_client::{XhsClient, XhsConnector, XhsHosts};
