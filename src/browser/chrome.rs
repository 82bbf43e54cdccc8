// Chrome Page Driver
// 基于 headless_chrome 的页面驱动，每次打开都会启动独立的浏览器进程

use super::{PageDriver, SigningPage};
use headless_chrome::protocol::cdp::{Network, Page};
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// 签名页面使用的桌面 User-Agent
pub const DESKTOP_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// 容器环境下的浏览器启动参数
const CONTAINER_ARGS: &[&str] = &[
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-web-security",
    "--disable-features=VizDisplayCompositor",
    "--disable-extensions",
    "--disable-plugins",
    "--disable-images",
    "--disable-javascript-harmony-shipping",
    "--disable-ipc-flooding-protection",
    "--disable-background-timer-throttling",
    "--disable-renderer-backgrounding",
    "--disable-backgrounding-occluded-windows",
    "--disable-client-side-phishing-detection",
    "--disable-sync",
    "--disable-translate",
    "--disable-default-apps",
    "--no-first-run",
    "--no-default-browser-check",
    "--memory-pressure-off",
    "--max_old_space_size=4096",
    "--single-process",
];

/// 普通环境下的浏览器启动参数
const DEFAULT_ARGS: &[&str] = &["--disable-dev-shm-usage"];

/// 浏览器启动配置
#[derive(Debug, Clone)]
pub struct ChromeLaunchConfig {
    pub headless: bool,
    /// 是否使用容器环境参数
    pub in_container: bool,
    pub user_agent: String,
    /// 页面操作默认超时
    pub page_timeout: Duration,
    /// 自定义 Chrome 浏览器路径
    pub chrome_path: Option<PathBuf>,
}

impl Default for ChromeLaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            in_container: false,
            user_agent: DESKTOP_USER_AGENT.to_string(),
            page_timeout: Duration::from_secs(30),
            chrome_path: None,
        }
    }
}

/// headless_chrome 页面驱动
#[derive(Debug, Clone, Default)]
pub struct ChromeDriver {
    config: ChromeLaunchConfig,
}

impl ChromeDriver {
    pub fn new(config: ChromeLaunchConfig) -> Self {
        Self { config }
    }

    /// 启动浏览器
    fn launch_browser(&self) -> Result<Browser, String> {
        let user_agent_arg = format!("--user-agent={}", self.config.user_agent);
        let base_args = if self.config.in_container { CONTAINER_ARGS } else { DEFAULT_ARGS };

        let mut args: Vec<&OsStr> = base_args.iter().map(OsStr::new).collect();
        args.push(OsStr::new(&user_agent_arg));

        let launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false)
            .path(self.config.chrome_path.clone())
            .args(args)
            .build()
            .map_err(|e| format!("构建启动选项失败: {}", e))?;

        Browser::new(launch_options).map_err(|e| format!("启动浏览器失败: {}", e))
    }
}

impl PageDriver for ChromeDriver {
    fn open(&self) -> Result<Box<dyn SigningPage>, String> {
        let browser = self.launch_browser()?;
        let tab = browser.new_tab().map_err(|e| format!("创建标签页失败: {}", e))?;
        tab.set_default_timeout(self.config.page_timeout);
        tracing::debug!("[Browser] 浏览器已启动");

        Ok(Box::new(ChromePage { tab, _browser: browser }))
    }
}

/// 单次签名尝试使用的页面
///
/// 持有浏览器进程，drop 时进程随之关闭
struct ChromePage {
    tab: Arc<Tab>,
    _browser: Browser,
}

impl SigningPage for ChromePage {
    fn add_init_script(&self, source: &str) -> Result<(), String> {
        self.tab
            .call_method(Page::AddScriptToEvaluateOnNewDocument {
                source: source.to_string(),
                world_name: None,
                include_command_line_api: None,
                run_immediately: None,
            })
            .map(|_| ())
            .map_err(|e| format!("注入初始化脚本失败: {}", e))
    }

    fn goto(&self, url: &str) -> Result<(), String> {
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| format!("导航失败: {}", e))
    }

    fn goto_no_wait(&self, url: &str) -> Result<(), String> {
        self.tab
            .navigate_to(url)
            .map(|_| ())
            .map_err(|e| format!("导航失败: {}", e))
    }

    /// 通过 DevTools 协议写入浏览器 Cookie 存储，不依赖当前文档是否加载完成
    fn set_cookie(&self, name: &str, value: &str, domain: &str, path: &str) -> Result<(), String> {
        self.tab
            .set_cookies(vec![Network::CookieParam {
                name: name.to_string(),
                value: value.to_string(),
                url: Some(cookie_url(domain, path)),
                domain: Some(domain.to_string()),
                path: Some(path.to_string()),
                secure: None,
                http_only: None,
                same_site: None,
                expires: None,
                priority: None,
                same_party: None,
                source_scheme: None,
                source_port: None,
                partition_key: None,
            }])
            .map_err(|e| format!("写入 Cookie 失败: {}", e))
    }

    fn reload(&self) -> Result<(), String> {
        self.tab
            .reload(false, None)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| format!("刷新页面失败: {}", e))
    }

    fn evaluate(&self, expression: &str) -> Result<Value, String> {
        let result = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| format!("执行脚本失败: {}", e))?;
        Ok(result.value.unwrap_or(Value::Null))
    }
}

/// Cookie 作用域对应的 URL，显式给出后不再取标签页当前地址
fn cookie_url(domain: &str, path: &str) -> String {
    format!("https://{}{}", domain.trim_start_matches('.'), path)
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        tracing::debug!("[Browser] 关闭浏览器");
    }
}
