//! 核心：事件模型、错误类型、优雅关闭

pub mod error;
pub mod event;
pub mod shutdown;

pub use error::{HubClosed, ModelError, SessionError, TransportError};
pub use event::{Event, EventKind};
pub use shutdown::{ShutdownManager, ShutdownReason};
