//! 小红书请求签名
//!
//! 平台每个接口都要求 `x-s` / `x-t` 请求头，由网页端脚本挂在 `window._webmsxyw` 上的函数生成。
//! 提供两种实现，构造时按配置选定：
//!
//! - [`LocalSigner`] - 在无头浏览器中打开首页，等待签名函数出现后直接调用
//! - [`RemoteSigner`] - 调用独立部署的签名服务 `POST {base}/sign`

use crate::browser::{ChromeDriver, ChromeLaunchConfig, PageDriver, SigningPage};
use crate::config::AppConfig;
use crate::core::{PlatformError, SignRequest, SignedHeaders};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// 小红书首页
const HOME_URL: &str = "https://www.xiaohongshu.com";

/// 设备标识 Cookie 的作用域
const COOKIE_DOMAIN: &str = ".xiaohongshu.com";

/// 探测签名函数是否就绪
const SIGN_FN_CHECK: &str = "typeof window._webmsxyw === 'function'";

/// 签名接口
#[async_trait::async_trait]
pub trait RequestSigner: Send + Sync {
    /// 为请求生成 x-s / x-t
    async fn sign(&self, request: &SignRequest) -> Result<SignedHeaders, PlatformError>;
}

/// 签名器工厂
pub struct SignerFactory;

impl SignerFactory {
    /// 按配置选择签名实现：配置了签名服务地址则走远程，否则本地浏览器签名
    pub fn from_config(config: &AppConfig) -> Arc<dyn RequestSigner> {
        match &config.sign_server {
            Some(base) => {
                tracing::info!("[Sign] 使用远程签名服务: {}", base);
                Arc::new(RemoteSigner::new(base.clone()))
            }
            None => {
                tracing::info!("[Sign] 使用本地浏览器签名");
                let driver = ChromeDriver::new(ChromeLaunchConfig {
                    in_container: config.in_container,
                    ..ChromeLaunchConfig::default()
                });
                Arc::new(LocalSigner::new(
                    Arc::new(driver),
                    config.stealth_script_path(),
                    SignerTimings::standard(config.in_container),
                ))
            }
        }
    }
}

// ============================================================================
// 本地签名
// ============================================================================

/// 本地签名的重试节奏
#[derive(Debug, Clone)]
pub struct SignerTimings {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 刷新后等待页面脚本执行的时长
    pub settle: Duration,
    /// 签名函数未就绪时的重试间隔
    pub missing_fn_pause: Duration,
    /// 异常重试的基础延迟
    pub backoff_base: Duration,
    /// 每次异常重试递增的延迟
    pub backoff_step: Duration,
}

impl SignerTimings {
    /// 默认节奏：容器中页面加载更慢，多等一秒
    pub fn standard(in_container: bool) -> Self {
        Self {
            max_attempts: 10,
            settle: Duration::from_secs(if in_container { 3 } else { 2 }),
            missing_fn_pause: Duration::from_secs(1),
            backoff_base: Duration::from_secs(1),
            backoff_step: Duration::from_millis(500),
        }
    }

    /// 第 `attempt` 次（从0开始）异常后的等待时长
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base + self.backoff_step * attempt
    }
}

impl Default for SignerTimings {
    fn default() -> Self {
        Self::standard(false)
    }
}

/// 单次尝试的结果
enum AttemptOutcome {
    Signed(SignedHeaders),
    FunctionMissing,
}

/// 本地浏览器签名
#[derive(Clone)]
pub struct LocalSigner {
    driver: Arc<dyn PageDriver>,
    stealth_script: PathBuf,
    timings: SignerTimings,
}

impl LocalSigner {
    pub fn new(driver: Arc<dyn PageDriver>, stealth_script: PathBuf, timings: SignerTimings) -> Self {
        Self {
            driver,
            stealth_script,
            timings,
        }
    }

    /// 阻塞式签名（在阻塞线程池中执行）
    ///
    /// 每次尝试都打开新的隔离页面，尝试结束前页面即被关闭
    pub fn sign_blocking(&self, request: &SignRequest) -> Result<SignedHeaders, PlatformError> {
        let max_attempts = self.timings.max_attempts;

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;

            let outcome = match self.driver.open() {
                Ok(page) => {
                    let outcome = self.run_attempt(page.as_ref(), request, attempt);
                    drop(page);
                    outcome
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(AttemptOutcome::Signed(headers)) => {
                    tracing::info!("[Sign] 第 {} 次尝试签名成功", attempt + 1);
                    return Ok(headers);
                }
                Ok(AttemptOutcome::FunctionMissing) => {
                    if !is_last {
                        std::thread::sleep(self.timings.missing_fn_pause);
                    }
                }
                Err(e) => {
                    tracing::warn!("[Sign] 第 {} 次签名尝试失败: {}", attempt + 1, e);
                    if !is_last {
                        std::thread::sleep(self.timings.backoff(attempt));
                    }
                }
            }
        }

        Err(PlatformError::SigningFailed(format!(
            "重试 {} 次后仍无法签名",
            max_attempts
        )))
    }

    /// 执行一次签名尝试
    fn run_attempt(
        &self,
        page: &dyn SigningPage,
        request: &SignRequest,
        attempt: u32,
    ) -> Result<AttemptOutcome, String> {
        self.install_stealth_script(page);

        if let Err(e) = page.goto(HOME_URL) {
            tracing::warn!("[Sign] 页面加载告警 (第 {} 次): {}", attempt + 1, e);
            page.goto_no_wait(HOME_URL)?;
        }

        page.set_cookie("a1", &request.a1, COOKIE_DOMAIN, "/")?;
        page.reload()?;

        std::thread::sleep(self.timings.settle);

        match page.evaluate(SIGN_FN_CHECK) {
            Ok(Value::Bool(true)) => {}
            Ok(_) => {
                tracing::warn!("[Sign] window._webmsxyw 未就绪 (第 {} 次)", attempt + 1);
                return Ok(AttemptOutcome::FunctionMissing);
            }
            Err(e) => {
                tracing::warn!("[Sign] 检查签名函数出错 (第 {} 次): {}", attempt + 1, e);
                return Ok(AttemptOutcome::FunctionMissing);
            }
        }

        let expression = build_sign_expression(request)?;
        let raw = page.evaluate(&expression)?;
        parse_sign_result(&raw).map(AttemptOutcome::Signed)
    }

    /// 注入反检测脚本，文件不存在时仅告警
    fn install_stealth_script(&self, page: &dyn SigningPage) {
        match std::fs::read_to_string(&self.stealth_script) {
            Ok(source) => {
                if let Err(e) = page.add_init_script(&source) {
                    tracing::warn!("[Sign] {}", e);
                }
            }
            Err(_) => {
                tracing::warn!("[Sign] stealth.min.js not found at {}", self.stealth_script.display());
            }
        }
    }
}

#[async_trait::async_trait]
impl RequestSigner for LocalSigner {
    async fn sign(&self, request: &SignRequest) -> Result<SignedHeaders, PlatformError> {
        let signer = self.clone();
        let request = request.clone();
        // 阻塞线程沿用当前的日志订阅者（静默模式下同样静默）
        let dispatch = tracing::dispatcher::get_default(|d| d.clone());

        tokio::task::spawn_blocking(move || {
            tracing::dispatcher::with_default(&dispatch, || signer.sign_blocking(&request))
        })
        .await
        .map_err(|e| PlatformError::SigningFailed(format!("签名任务异常退出: {}", e)))?
    }
}

/// 构建调用签名函数的表达式
fn build_sign_expression(request: &SignRequest) -> Result<String, String> {
    let uri = serde_json::to_string(&request.uri).map_err(|e| e.to_string())?;
    let data = serde_json::to_string(&request.data).map_err(|e| e.to_string())?;
    Ok(format!("JSON.stringify(window._webmsxyw({}, {}))", uri, data))
}

/// 解析签名函数返回的 `{X-s, X-t}`
fn parse_sign_result(raw: &Value) -> Result<SignedHeaders, String> {
    let parsed;
    let result = match raw {
        Value::String(s) => {
            parsed = serde_json::from_str::<Value>(s).map_err(|e| format!("签名结果不是合法JSON: {}", e))?;
            &parsed
        }
        other => other,
    };

    let x_s = result
        .get("X-s")
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("签名结果缺少 X-s: {}", result))?;
    let x_t = result
        .get("X-t")
        .and_then(value_to_string)
        .ok_or_else(|| format!("签名结果缺少 X-t: {}", result))?;

    Ok(SignedHeaders {
        x_s: x_s.to_string(),
        x_t,
    })
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// 远程签名
// ============================================================================

/// 远程签名服务
#[derive(Debug, Clone)]
pub struct RemoteSigner {
    endpoint: String,
    http_client: reqwest::Client,
}

impl RemoteSigner {
    pub fn new(base: Url) -> Self {
        Self {
            endpoint: format!("{}/sign", base.as_str().trim_end_matches('/')),
            http_client: reqwest::Client::new(),
        }
    }

    /// 签名接口地址
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl RequestSigner for RemoteSigner {
    async fn sign(&self, request: &SignRequest) -> Result<SignedHeaders, PlatformError> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        let signs: Value = response.json().await?;

        let x_s = signs.get("x-s").and_then(value_to_string);
        let x_t = signs.get("x-t").and_then(value_to_string);
        match (x_s, x_t) {
            (Some(x_s), Some(x_t)) => Ok(SignedHeaders { x_s, x_t }),
            _ => Err(PlatformError::NetworkError(format!(
                "签名服务返回格式错误: {}",
                signs
            ))),
        }
    }
}
