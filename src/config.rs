//! 运行配置
//!
//! 从环境变量解析基础目录、默认账号配置文件、反检测脚本路径和签名服务地址

use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// 基础目录环境变量
pub const HOME_ENV: &str = "XHS_UPLOADER_HOME";

/// 签名服务地址环境变量
pub const SIGN_SERVER_ENV: &str = "XHS_SIGN_SERVER";

/// 默认账号配置文件名
const ACCOUNTS_FILE: &str = "accounts.ini";

/// 平台客户端请求超时（秒）
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 基础目录
    pub base_dir: PathBuf,
    /// 远程签名服务地址，设置后使用远程签名
    pub sign_server: Option<Url>,
    /// 是否运行在容器中
    pub in_container: bool,
    /// 平台客户端请求超时
    pub request_timeout: Duration,
}

impl AppConfig {
    /// 从环境变量构建配置
    pub fn from_env() -> Self {
        let base_dir = std::env::var_os(HOME_ENV)
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let sign_server = std::env::var(SIGN_SERVER_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match Url::parse(s.trim()) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("[Config] {} 无法解析 ({}): {}，改用本地签名", SIGN_SERVER_ENV, s, e);
                    None
                }
            });

        Self {
            base_dir,
            sign_server,
            in_container: detect_container(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// 以指定基础目录构建配置（不读取签名服务环境变量）
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            sign_server: None,
            in_container: false,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }

    /// 设置远程签名服务地址
    pub fn with_sign_server(mut self, sign_server: Option<Url>) -> Self {
        self.sign_server = sign_server;
        self
    }

    /// 默认账号配置文件
    pub fn default_accounts_file(&self) -> PathBuf {
        self.base_dir.join(ACCOUNTS_FILE)
    }

    /// 反检测脚本路径
    pub fn stealth_script_path(&self) -> PathBuf {
        self.base_dir.join("utils").join("stealth.min.js")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::with_base_dir(".")
    }
}

/// 检测是否运行在 Docker 容器中
fn detect_container() -> bool {
    Path::new("/.dockerenv").exists()
        || std::env::var("DOCKER_ENV").map(|v| v == "1").unwrap_or(false)
}
