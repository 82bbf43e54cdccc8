//! 小红书视频发布流程
//!
//! # 发布流程（8步）
//!
//! 1. **校验视频文件** - 文件存在且为支持的格式
//! 2. **解析凭证** - 直接传入 > Cookie 文件 > 账号配置文件
//! 3. **连接客户端** - 构造客户端并用首帧接口校验 Cookie
//! 4. **准备标题与标签** - 标题缺省取文件名，解析标签串
//! 5. **解析话题** - 逐个查询官方话题，拼接描述
//! 6. **校验定时发布时间** - 格式错误时告警并改为立即发布
//! 7. **提交笔记** - 标题截断到 20 个字符后提交
//! 8. **冷却** - 发布后等待，降低触发风控的概率
//!
//! # 使用示例
//!
//! ```no_run
//! use xhs_uploader::platforms::xiaohongshu::{upload_video_to_xhs, UploadOptions};
//!
//! # async fn run() {
//! let options = UploadOptions::new("/path/to/video.mp4")
//!     .with_title("周末去爬山")
//!     .with_tags("#旅行 #户外");
//!
//! let result = upload_video_to_xhs(options).await;
//! if result.is_success() {
//!     println!("{:?}", result.data());
//! }
//! # }
//! ```

use super::sign::SignerFactory;
use super::topics::{parse_tags, TopicResolver};
use super::utils::{build_description, truncate_title, validate_post_time};
use super::xhs_client::XhsConnector;
use crate::config::AppConfig;
use crate::core::{ErrorKind, Pacer, TokioPacer, UploadRequest, UploadResult};
use crate::credentials::{CredentialResolver, CredentialSources};
use crate::platforms::NoteApiConnector;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument::WithSubscriber;
use tracing::subscriber::NoSubscriber;
use tracing::Dispatch;

/// 支持的视频扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["mp4", "mov", "avi", "mkv"];

/// 校验 Cookie 时查询的视频ID
const CHECK_VIDEO_ID: &str = "3214";

/// 默认账号名
pub const DEFAULT_ACCOUNT: &str = "account1";

/// 默认发布后冷却时长（秒）
pub const DEFAULT_SLEEP_SECS: u64 = 30;

/// 默认话题查询间隔（秒）
pub const DEFAULT_TAG_DELAY_SECS: f64 = 1.0;

/// 默认最多处理的标签数
pub const DEFAULT_MAX_TAGS: i64 = 20;

/// 上传参数
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// 视频文件路径
    pub video_path: PathBuf,
    /// 标题，缺省取文件名（不含扩展名）
    pub title: Option<String>,
    /// 标签串，如 `#旅行 #美食`
    pub tags: Option<String>,
    /// 描述，缺省取标题
    pub desc: Option<String>,
    pub cover_path: Option<PathBuf>,
    pub cookie_file: Option<PathBuf>,
    /// 直接传入的 Cookie
    pub cookies: Option<String>,
    /// 账号名（配置文件中的小节）
    pub account: String,
    /// 账号配置文件，缺省使用基础目录下的 accounts.ini
    pub config_file: Option<PathBuf>,
    /// 定时发布时间 `YYYY-MM-DD HH:MM:SS`
    pub publish_time: Option<String>,
    pub private: bool,
    /// 跳过发布后冷却
    pub no_sleep: bool,
    pub sleep_time: Duration,
    /// 话题查询间隔
    pub tag_delay: Duration,
    /// 最多处理的标签数，<= 0 表示不限制
    pub max_tags: i64,
    /// 静默模式，不输出过程日志
    pub silent: bool,
}

impl UploadOptions {
    pub fn new(video_path: impl Into<PathBuf>) -> Self {
        Self {
            video_path: video_path.into(),
            title: None,
            tags: None,
            desc: None,
            cover_path: None,
            cookie_file: None,
            cookies: None,
            account: DEFAULT_ACCOUNT.to_string(),
            config_file: None,
            publish_time: None,
            private: false,
            no_sleep: false,
            sleep_time: Duration::from_secs(DEFAULT_SLEEP_SECS),
            tag_delay: Duration::from_secs_f64(DEFAULT_TAG_DELAY_SECS),
            max_tags: DEFAULT_MAX_TAGS,
            silent: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_cookies(mut self, cookies: impl Into<String>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    pub fn with_publish_time(mut self, publish_time: impl Into<String>) -> Self {
        self.publish_time = Some(publish_time.into());
        self
    }

    /// 关闭发布后冷却
    pub fn without_cooldown(mut self) -> Self {
        self.no_sleep = true;
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self::new(PathBuf::new())
    }
}

/// 小红书视频发布器
#[derive(Clone)]
pub struct XhsPublisher {
    config: AppConfig,
    connector: Arc<dyn NoteApiConnector>,
    pacer: Arc<dyn Pacer>,
}

impl XhsPublisher {
    pub fn new(config: AppConfig, connector: Arc<dyn NoteApiConnector>, pacer: Arc<dyn Pacer>) -> Self {
        Self {
            config,
            connector,
            pacer,
        }
    }

    /// 按配置组装签名器、客户端连接器和计时器
    pub fn from_config(config: AppConfig) -> Self {
        let signer = SignerFactory::from_config(&config);
        let connector = Arc::new(XhsConnector::new(signer, config.request_timeout));
        Self::new(config, connector, Arc::new(TokioPacer))
    }

    /// 发布视频
    ///
    /// 静默模式下整个流程（包括阻塞线程中的签名）不输出日志，
    /// 只有定时时间无效的告警和冷却提示仍然输出
    ///
    /// # 返回
    ///
    /// 成功时携带平台返回的笔记数据，失败时携带分类与原因，不会 panic 或返回 Err
    pub async fn publish(&self, options: UploadOptions) -> UploadResult {
        let notices = tracing::dispatcher::get_default(|d| d.clone());

        if options.silent {
            self.run(&options, &notices)
                .with_subscriber(NoSubscriber::default())
                .await
        } else {
            self.run(&options, &notices).await
        }
    }

    async fn run(&self, options: &UploadOptions, notices: &Dispatch) -> UploadResult {
        // ========== 步骤1: 校验视频文件 ==========
        tracing::info!("[Publish] ====== 步骤1: 校验视频文件 ======");

        let video_path = options.video_path.as_path();
        if let Err(result) = check_video_file(video_path) {
            tracing::error!("[Publish] {}", result.error().unwrap_or_default());
            return result;
        }

        // ========== 步骤2: 解析凭证 ==========
        tracing::info!("[Publish] ====== 步骤2: 解析凭证 ======");

        let resolver = CredentialResolver::new(self.config.default_accounts_file());
        let sources = CredentialSources {
            cookies: options.cookies.as_deref(),
            cookie_file: options.cookie_file.as_deref(),
            config_file: options.config_file.as_deref(),
            account: &options.account,
        };
        let cookies = match resolver.resolve(&sources) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("[Publish] 获取 Cookie 失败: {}", e);
                return UploadResult::failure(ErrorKind::Unauthorized, e.to_string());
            }
        };

        // ========== 步骤3: 连接客户端并校验 Cookie ==========
        tracing::info!("[Publish] ====== 步骤3: 连接客户端并校验 Cookie ======");

        let api = match self.connector.connect(&cookies) {
            Ok(api) => api,
            Err(e) => {
                return UploadResult::failure(ErrorKind::Unauthorized, format!("Cookie validation failed: {}", e));
            }
        };
        if let Err(e) = api.get_video_first_frame_image_id(CHECK_VIDEO_ID).await {
            tracing::error!("[Publish] Cookie 校验失败: {}", e);
            return UploadResult::failure(ErrorKind::Unauthorized, format!("Cookie validation failed: {}", e));
        }

        // ========== 步骤4: 准备标题与标签 ==========
        tracing::info!("[Publish] ====== 步骤4: 准备标题与标签 ======");

        let title = match options.title.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => file_stem(video_path),
        };
        let tags = options.tags.as_deref().map(parse_tags).unwrap_or_default();
        tracing::info!("[Publish] 标题: {}, 标签: {:?}", title, tags);

        // ========== 步骤5: 解析话题 ==========
        tracing::info!("[Publish] ====== 步骤5: 解析话题 ======");

        let topics = if tags.is_empty() {
            Vec::new()
        } else {
            TopicResolver::new(options.max_tags, options.tag_delay)
                .resolve(api.as_ref(), &tags, self.pacer.as_ref())
                .await
        };
        let description = build_description(options.desc.as_deref(), &title, &topics);
        tracing::info!("[Publish] 话题数: {}", topics.len());

        // ========== 步骤6: 校验定时发布时间 ==========
        tracing::info!("[Publish] ====== 步骤6: 校验定时发布时间 ======");

        let post_time = match options.publish_time.as_deref().filter(|t| !t.is_empty()) {
            Some(raw) => {
                let validated = validate_post_time(raw);
                if validated.is_none() {
                    tracing::dispatcher::with_default(notices, || {
                        tracing::warn!(
                            "[Publish] Invalid publish_time format ('{}'). Publishing immediately. Use YYYY-MM-DD HH:MM:SS.",
                            raw
                        );
                    });
                }
                validated
            }
            None => None,
        };

        // ========== 步骤7: 提交笔记 ==========
        tracing::info!("[Publish] ====== 步骤7: 提交笔记 ======");

        let request = UploadRequest {
            video_path: video_path.to_path_buf(),
            title: truncate_title(&title),
            description,
            cover_path: options.cover_path.clone(),
            topics,
            is_private: options.private,
            post_time,
        };

        let note = match api.create_video_note(&request).await {
            Ok(note) => note,
            Err(e) => {
                tracing::error!("[Publish] 提交笔记失败: {}", e);
                return UploadResult::failure(ErrorKind::UploadFailed, format!("XHS API upload failed: {}", e));
            }
        };
        tracing::info!("[Publish] 笔记发布成功");

        // ========== 步骤8: 冷却 ==========
        if !options.no_sleep {
            tracing::dispatcher::with_default(notices, || {
                tracing::info!(
                    "[Publish] Sleeping for {} seconds to avoid rate limits...",
                    options.sleep_time.as_secs_f64()
                );
            });
            self.pacer.pause(options.sleep_time).await;
        }

        UploadResult::Success { data: note }
    }
}

/// 校验视频文件存在且格式受支持
fn check_video_file(path: &Path) -> Result<(), UploadResult> {
    if !path.is_file() {
        return Err(UploadResult::failure(
            ErrorKind::NotFound,
            format!("Video file not found or is not a file: {}", path.display()),
        ));
    }

    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        let suffix = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        return Err(UploadResult::failure(
            ErrorKind::UnsupportedFormat,
            format!("Unsupported video format: {}. Supported: .mp4, .mov, .avi, .mkv", suffix),
        ));
    }

    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// 使用环境变量配置上传视频
pub async fn upload_video_to_xhs(options: UploadOptions) -> UploadResult {
    XhsPublisher::from_config(AppConfig::from_env()).publish(options).await
}
