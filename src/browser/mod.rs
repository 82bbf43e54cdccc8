// Browser Automation Module
// 浏览器自动化模块 - 为本地签名提供隔离的页面环境

mod chrome;

pub use chrome::{ChromeDriver, ChromeLaunchConfig};

use serde_json::Value;

/// 页面自动化能力
///
/// 每次 `open` 启动一个隔离的浏览器上下文，返回的页面在 drop 时关闭上下文
pub trait PageDriver: Send + Sync {
    fn open(&self) -> Result<Box<dyn SigningPage>, String>;
}

/// 单个隔离页面
pub trait SigningPage: Send {
    /// 注册在每个文档加载前执行的脚本
    fn add_init_script(&self, source: &str) -> Result<(), String>;

    /// 导航并等待页面加载完成
    fn goto(&self, url: &str) -> Result<(), String>;

    /// 仅发起导航，不等待加载完成
    fn goto_no_wait(&self, url: &str) -> Result<(), String>;

    /// 写入 Cookie，写入后导航到该域名的页面都会携带
    fn set_cookie(&self, name: &str, value: &str, domain: &str, path: &str) -> Result<(), String>;

    /// 刷新并等待加载完成
    fn reload(&self) -> Result<(), String>;

    /// 执行表达式并返回 JSON 值
    fn evaluate(&self, expression: &str) -> Result<Value, String>;
}
