// Core modules
// 核心模块
pub mod browser;
pub mod cli;
pub mod config;
pub mod core;
pub mod credentials;
pub mod platforms;

// Re-export the upload entry point for easy access
// 重新导出上传入口以便轻松访问
pub use crate::config::AppConfig;
pub use crate::core::{ErrorKind, PlatformError, UploadResult};
pub use crate::platforms::xiaohongshu::{upload_video_to_xhs, UploadOptions, XhsPublisher};

// Initialize tracing for logging
// 初始化 tracing 用于日志输出，RUST_LOG 可覆盖默认级别
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("xhs_uploader=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .init();
}
