//! 小红书发布工具函数
//!
//! 标题截断、描述拼接、定时发布时间校验、Cookie 解析

use crate::core::{Topic, TOPIC_MARKER};
use chrono::{Local, NaiveDateTime, TimeZone};
use indexmap::IndexMap;

/// 标题最大字符数
pub const TITLE_MAX_CHARS: usize = 20;

/// 定时发布时间格式
pub const POST_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 描述正文与话题之间的分隔
const TOPIC_SEPARATOR: &str = "\n\n\n";

/// 按字符截断标题
pub fn truncate_title(title: &str) -> String {
    title.chars().take(TITLE_MAX_CHARS).collect()
}

/// 拼接最终描述
///
/// 正文为空时使用标题；有话题时在正文后追加 `#名称[话题]#`，以空格分隔
///
/// # 参数
///
/// * `desc` - 用户提供的描述
/// * `title` - 未截断的标题
/// * `topics` - 已解析的话题
pub fn build_description(desc: Option<&str>, title: &str, topics: &[Topic]) -> String {
    let mut description = match desc {
        Some(d) if !d.is_empty() => d.to_string(),
        _ => title.to_string(),
    };

    if !topics.is_empty() {
        let tags = topics
            .iter()
            .map(|t| format!("#{}{}#", t.name, TOPIC_MARKER))
            .collect::<Vec<_>>()
            .join(" ");
        description.push_str(TOPIC_SEPARATOR);
        description.push_str(&tags);
    }

    description
}

/// 校验定时发布时间，格式不合法返回 None
pub fn validate_post_time(post_time: &str) -> Option<String> {
    NaiveDateTime::parse_from_str(post_time, POST_TIME_FORMAT)
        .ok()
        .map(|_| post_time.to_string())
}

/// 定时发布时间转换为本地时区的毫秒时间戳
pub fn post_time_millis(post_time: &str) -> Option<i64> {
    let naive = NaiveDateTime::parse_from_str(post_time, POST_TIME_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.timestamp_millis())
}

/// 解析 `k1=v1; k2=v2` 形式的 Cookie 字符串，保留原始顺序
pub fn parse_cookie_string(cookies: &str) -> IndexMap<String, String> {
    cookies
        .split(';')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}
