//! 命令行参数
//!
//! 每个参数对应 [`UploadOptions`] 的一个字段，另有 `--sign-server` 选择远程签名

use crate::config::SIGN_SERVER_ENV;
use crate::platforms::xiaohongshu::publish_strategy::{
    UploadOptions, DEFAULT_ACCOUNT, DEFAULT_MAX_TAGS, DEFAULT_SLEEP_SECS, DEFAULT_TAG_DELAY_SECS,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// 话题查询间隔上限（秒）
const MAX_TAG_DELAY_SECS: f64 = 3600.0;

#[derive(Debug, Parser)]
#[command(name = "xhs-uploader")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Upload a video note to Xiaohongshu")]
#[command(long_about = None)]
pub struct Args {
    /// Path to the video file
    #[arg(long = "video-path", alias = "video_path")]
    pub video_path: PathBuf,

    /// Video title, defaults to the file name
    #[arg(long)]
    pub title: Option<String>,

    /// Space separated tags, e.g. "#tag1 #tag2"
    #[arg(long)]
    pub tags: Option<String>,

    /// Video description, defaults to the title
    #[arg(long)]
    pub desc: Option<String>,

    /// Path to the cover image
    #[arg(long)]
    pub cover: Option<PathBuf>,

    /// Path to a file holding the cookie string
    #[arg(long = "cookie-file", alias = "cookie_file")]
    pub cookie_file: Option<PathBuf>,

    /// Cookie string, takes priority over --cookie-file and the config file
    #[arg(long)]
    pub cookies: Option<String>,

    /// Account section in the config file
    #[arg(long, default_value = DEFAULT_ACCOUNT)]
    pub account: String,

    /// INI file with one section per account
    #[arg(long = "config-file", alias = "config_file")]
    pub config_file: Option<PathBuf>,

    /// Scheduled publish time "YYYY-MM-DD HH:MM:SS"
    #[arg(long = "publish-time", alias = "publish_time")]
    pub publish_time: Option<String>,

    /// Publish as a private note
    #[arg(long)]
    pub private: bool,

    /// Skip the cooldown after publishing
    #[arg(long = "no-sleep", alias = "no_sleep")]
    pub no_sleep: bool,

    /// Cooldown after publishing, in seconds
    #[arg(long = "sleep-time", alias = "sleep_time", default_value_t = DEFAULT_SLEEP_SECS)]
    pub sleep_time: u64,

    /// Delay between topic lookups, in seconds
    #[arg(long = "tag-delay", alias = "tag_delay", default_value_t = DEFAULT_TAG_DELAY_SECS)]
    pub tag_delay: f64,

    /// Maximum number of tags to look up, 0 or less means no limit
    #[arg(long = "max-tags", alias = "max_tags", default_value_t = DEFAULT_MAX_TAGS, allow_negative_numbers = true)]
    pub max_tags: i64,

    /// Remote signing service base URL, local browser signing when absent
    #[arg(long = "sign-server", env = SIGN_SERVER_ENV)]
    pub sign_server: Option<Url>,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// 转换为上传参数
    pub fn to_options(&self) -> UploadOptions {
        UploadOptions {
            video_path: self.video_path.clone(),
            title: self.title.clone(),
            tags: self.tags.clone(),
            desc: self.desc.clone(),
            cover_path: self.cover.clone(),
            cookie_file: self.cookie_file.clone(),
            cookies: self.cookies.clone(),
            account: self.account.clone(),
            config_file: self.config_file.clone(),
            publish_time: self.publish_time.clone(),
            private: self.private,
            no_sleep: self.no_sleep,
            sleep_time: Duration::from_secs(self.sleep_time),
            tag_delay: tag_delay(self.tag_delay),
            max_tags: self.max_tags,
            silent: self.quiet,
        }
    }
}

/// 负数和 NaN 视为不等待，过大的值截断到上限
fn tag_delay(secs: f64) -> Duration {
    if secs > 0.0 {
        Duration::from_secs_f64(secs.min(MAX_TAG_DELAY_SECS))
    } else {
        Duration::ZERO
    }
}
