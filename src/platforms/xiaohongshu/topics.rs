//! 话题解析
//!
//! 把用户输入的标签串拆成标签列表，再逐个查询平台的话题建议，取首条作为官方话题

use crate::core::{Pacer, Topic};
use crate::platforms::NoteApi;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

/// `#标签` 匹配
static TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"#([^#\s]+)").expect("tag pattern is a valid regex"));

/// 解析标签串
///
/// 优先级依次为：
/// 1. `#标签` 形式逐个提取
/// 2. 以 `#` 开头但没有匹配时，去掉首个 `#` 后整体作为一个标签
/// 3. 按空白拆分
///
/// # 示例
///
/// ```
/// use xhs_uploader::platforms::xiaohongshu::parse_tags;
///
/// assert_eq!(parse_tags("#旅行 #美食"), vec!["旅行", "美食"]);
/// assert_eq!(parse_tags("旅行 美食"), vec!["旅行", "美食"]);
/// ```
pub fn parse_tags(raw: &str) -> Vec<String> {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut matches: Vec<String> = TAG_PATTERN
        .captures_iter(&normalized)
        .map(|caps| caps[1].to_string())
        .collect();
    let mut parsed: Vec<String> = Vec::new();

    if matches.is_empty() {
        if let Some(rest) = normalized.strip_prefix('#') {
            matches.push(rest.to_string());
        } else if !normalized.is_empty() {
            parsed = normalized.split(' ').map(str::to_string).collect();
        }
    }

    if !matches.is_empty() {
        parsed = matches
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
    } else if parsed.is_empty() && !raw.is_empty() && !raw.starts_with('#') {
        parsed = raw.split_whitespace().map(str::to_string).collect();
    }

    parsed
}

/// 话题解析器
#[derive(Debug, Clone)]
pub struct TopicResolver {
    /// 最多处理的标签数，<= 0 表示不限制
    max_tags: i64,
    /// 两次查询之间的间隔
    delay: Duration,
}

impl TopicResolver {
    pub fn new(max_tags: i64, delay: Duration) -> Self {
        Self { max_tags, delay }
    }

    /// 本次实际要查询的标签
    fn select<'a>(&self, tags: &'a [String]) -> &'a [String] {
        if self.max_tags > 0 {
            let cap = usize::try_from(self.max_tags).unwrap_or(usize::MAX);
            &tags[..tags.len().min(cap)]
        } else {
            tags
        }
    }

    /// 逐个查询标签对应的官方话题
    ///
    /// 单个标签失败只记录告警，随后等待两倍间隔继续下一个；最后一个标签之后不等待
    ///
    /// # 返回
    ///
    /// 成功解析的话题，顺序与标签一致
    pub async fn resolve(&self, api: &dyn NoteApi, tags: &[String], pacer: &dyn Pacer) -> Vec<Topic> {
        let selected = self.select(tags);
        let mut topics = Vec::new();

        if selected.len() < tags.len() {
            tracing::info!("[Topic] 标签数 {} 超过上限 {}，只处理前 {} 个", tags.len(), self.max_tags, selected.len());
        }

        for (idx, tag) in selected.iter().enumerate() {
            let has_next = idx + 1 < selected.len();

            let pause = match api.get_suggest_topic(tag).await {
                Ok(suggestions) => {
                    match suggestions.first() {
                        Some(first) => match Topic::from_value(first) {
                            Some(topic) => {
                                tracing::info!("[Topic] 标签 '{}' -> 话题 '{}'", tag, topic.name);
                                topics.push(topic);
                                self.delay
                            }
                            None => {
                                tracing::warn!("[Topic] Failed to get topic for tag '{}': 话题缺少 name 字段", tag);
                                self.delay.saturating_mul(2)
                            }
                        },
                        None => {
                            tracing::info!("[Topic] 标签 '{}' 没有匹配的话题", tag);
                            self.delay
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("[Topic] Failed to get topic for tag '{}': {}", tag, e);
                    self.delay.saturating_mul(2)
                }
            };

            if has_next && !self.delay.is_zero() {
                pacer.pause(pause).await;
            }
        }

        topics
    }
}
