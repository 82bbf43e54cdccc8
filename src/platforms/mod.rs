// Platforms module
// 平台模块
//
// 平台客户端能力接口与小红书实现
//
// # 模块结构
//
// - [xiaohongshu](xiaohongshu/index.html) - 小红书签名、客户端、话题解析与发布编排

pub mod traits;
pub mod xiaohongshu;

pub use traits::{NoteApi, NoteApiConnector};
