//! 会话层：陌生人会话抽象与模拟实现

pub mod simulated;
pub mod traits;

pub use simulated::{SimulatedConnector, SimulatedSession};
pub use traits::{ChatSession, SessionConnector};
