//! 对话引擎：驱动一次陌生人会话，转发相关事件、积累训练数据、决定机器人何时发言

mod engine;
mod relay;

pub use engine::{
    Conversation, ConversationEngine, ConversationOutcome, ConversationReport, EngineConfig,
};
