//! 优雅关闭
//!
//! 进程内只有一个关闭令牌：观察者监听循环与 Hub 控制循环都在它取消后退出。
//! 进行中的陌生人会话只会收到一次建议性的断开请求，不等待其结束。

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// 触发关闭的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// 代码内主动请求（测试、嵌入方）
    Requested,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShutdownReason::Interrupt => "interrupt",
            ShutdownReason::Terminate => "terminate",
            ShutdownReason::Requested => "requested",
        };
        f.write_str(s)
    }
}

/// 关闭协调器：持有取消令牌与首个关闭原因
pub struct ShutdownManager {
    token: CancellationToken,
    reason: watch::Sender<Option<ShutdownReason>>,
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (reason, _) = watch::channel(None);
        Self {
            token: CancellationToken::new(),
            reason,
        }
    }

    /// 交给 Hub 与监听循环的令牌
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// 触发关闭；只记录第一次的原因，重复调用无副作用
    pub fn shutdown(&self, reason: ShutdownReason) {
        let first = self.reason.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if first {
            tracing::info!("Shutdown requested ({})", reason);
        }
        self.token.cancel();
    }

    /// 已触发时返回首个关闭原因
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.reason.borrow()
    }

    /// 监听 Ctrl+C 与 SIGTERM
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => manager.shutdown(ShutdownReason::Interrupt),
                Err(e) => tracing::warn!("Unable to listen for Ctrl+C: {}", e),
            }
        });

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let manager = Arc::clone(self);
            tokio::spawn(async move {
                match signal(SignalKind::terminate()) {
                    Ok(mut sigterm) => {
                        if sigterm.recv().await.is_some() {
                            manager.shutdown(ShutdownReason::Terminate);
                        }
                    }
                    Err(e) => tracing::warn!("Unable to listen for SIGTERM: {}", e),
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}
