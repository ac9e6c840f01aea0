//! 观察者线上消息：每个事件序列化为一条 `{"Kind": ..., "Value": ...}` 文本

use crate::core::Event;

/// 中途加入的观察者收到的提示
pub const JOINED_MID_CONVERSATION: &str = "<joined in the middle of a conversation>";

/// 序列化一个事件；同一结果原样发给所有观察者
pub fn encode_event(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(event)
}
