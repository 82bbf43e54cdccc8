//! 凭证解析
//!
//! 按固定优先级获取账号 Cookie：
//!
//! 1. 直接传入的 Cookie 字符串
//! 2. Cookie 文件（整个文件内容去除首尾空白）
//! 3. INI 配置文件中以账号名命名的小节的 `cookies` 键
//!
//! 前一个来源存在时不会再尝试后面的来源；来源存在但读取失败直接报错

use crate::core::PlatformError;
use ini::{Ini, ParseOption};
use std::path::{Path, PathBuf};

/// 配置文件中存放 Cookie 的键
const COOKIES_KEY: &str = "cookies";

/// 凭证来源
#[derive(Debug, Clone, Copy, Default)]
pub struct CredentialSources<'a> {
    /// 直接传入的 Cookie 字符串
    pub cookies: Option<&'a str>,
    /// Cookie 文件路径
    pub cookie_file: Option<&'a Path>,
    /// INI 配置文件路径（为空时使用默认路径）
    pub config_file: Option<&'a Path>,
    /// 账号名（INI 小节名）
    pub account: &'a str,
}

/// 凭证解析器
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    default_config_file: PathBuf,
}

impl CredentialResolver {
    pub fn new(default_config_file: impl Into<PathBuf>) -> Self {
        Self {
            default_config_file: default_config_file.into(),
        }
    }

    /// 按优先级解析 Cookie
    pub fn resolve(&self, sources: &CredentialSources<'_>) -> Result<String, PlatformError> {
        if let Some(cookies) = sources.cookies.filter(|c| !c.is_empty()) {
            tracing::info!("[Cookie] 使用直接传入的 Cookie");
            return Ok(cookies.to_string());
        }

        if let Some(cookie_file) = sources.cookie_file {
            tracing::info!("[Cookie] 从文件读取 Cookie: {}", cookie_file.display());
            return read_cookie_file(cookie_file);
        }

        let config_file = sources.config_file.unwrap_or(&self.default_config_file);
        tracing::info!(
            "[Cookie] 从配置文件读取账号 {} 的 Cookie: {}",
            sources.account,
            config_file.display()
        );
        read_account_cookies(config_file, sources.account)
    }
}

/// 读取 Cookie 文件
fn read_cookie_file(path: &Path) -> Result<String, PlatformError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PlatformError::InvalidCredentials(format!(
            "Failed to read cookie file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let cookies = content.trim();
    if cookies.is_empty() {
        return Err(PlatformError::InvalidCredentials(format!(
            "Cookie file '{}' is empty",
            path.display()
        )));
    }
    Ok(cookies.to_string())
}

/// 从 INI 配置文件读取指定账号的 Cookie
///
/// `cookies` 键存在但值为空同样视为失败
fn read_account_cookies(path: &Path, account: &str) -> Result<String, PlatformError> {
    if !path.exists() {
        return Err(PlatformError::InvalidCredentials(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    // Cookie 中可能包含反斜杠和引号，按原样读取
    let option = ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    };
    let config = Ini::load_from_file_opt(path, option).map_err(|e| {
        PlatformError::InvalidCredentials(format!(
            "Failed to read cookies for account '{}' from config file '{}': {}",
            account,
            path.display(),
            e
        ))
    })?;

    let section = config.section(Some(account)).ok_or_else(|| {
        PlatformError::InvalidCredentials(format!(
            "Account '{}' not found in config file '{}'",
            account,
            path.display()
        ))
    })?;

    match section.get(COOKIES_KEY).map(str::trim) {
        Some(cookies) if !cookies.is_empty() => Ok(cookies.to_string()),
        _ => Err(PlatformError::InvalidCredentials(format!(
            "No 'cookies' found for account '{}' in config file '{}'",
            account,
            path.display()
        ))),
    }
}
