//! 轮毂式网关：Hub 控制循环与观察者 WebSocket 接入
//!
//! ## Hub（中枢）
//!
//! 观察者集合与对话生命周期的唯一所有者，串行处理注册、注销、会话事件、
//! 对话结束与看门狗超时，并把相关事件广播给所有观察者。
//!
//! ## 观察者连接
//!
//! 每个 WebSocket 客户端一个出站队列，读泵负责存活检测，写泵负责投递与心跳。

mod connection;
mod hub;
mod message;
mod server;
mod watchdog;

pub use connection::TransportConfig;
pub use hub::{ClientHandle, ClientId, Hub, HubConfig, HubHandle, HubSnapshot};
pub use message::{encode_event, JOINED_MID_CONVERSATION};
pub use server::{ServerConfig, WsServer};
pub use watchdog::{Strike, Watchdog, WatchdogAction};
