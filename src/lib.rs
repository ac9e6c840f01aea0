//! Chatrelay - 陌生人聊天中继
//!
//! 机器人与一位远端陌生人实时对话并从中学习，任意数量的观察者通过 WebSocket 旁观。
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 事件模型、错误类型、优雅关闭
//! - **conversation**: 对话引擎（事件转发、回复节奏、会后训练）
//! - **gateway**: Hub 生命周期状态机、看门狗、观察者 WebSocket 接入
//! - **model**: 文本模型抽象、Mock 实现、启动语料加载
//! - **observability**: 日志初始化
//! - **session**: 陌生人会话抽象与模拟实现

pub mod config;
pub mod conversation;
pub mod core;
pub mod gateway;
pub mod model;
pub mod observability;
pub mod session;

pub use conversation::{ConversationEngine, EngineConfig};
pub use gateway::{Hub, HubConfig, HubHandle};
