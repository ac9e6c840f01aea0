//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `CHATRELAY__*` 覆盖
//! （双下划线表示嵌套，如 `CHATRELAY__HUB__MAX_RECV=100`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// tokio interval 不接受零周期，周期类配置至少 1ms
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSection,
    pub hub: HubSection,
    pub conversation: ConversationSection,
    pub transport: TransportSection,
    pub model: ModelSection,
    pub session: SessionSection,
}

/// [server] 段：监听地址与 WebSocket 路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
    pub ws_path: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            ws_path: "/ws".to_string(),
        }
    }
}

/// [hub] 段：看门狗间隔、学习上限、催促消息长度
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// 陌生人沉默多久触发看门狗（秒）
    pub stranger_timeout_secs: u64,
    /// 收到超过这么多条消息后请求断开
    pub max_recv: usize,
    pub prompt_min_tokens: usize,
    pub prompt_max_tokens: usize,
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            stranger_timeout_secs: 15,
            max_recv: 200,
            prompt_min_tokens: 1,
            prompt_max_tokens: 3,
        }
    }
}

/// [conversation] 段：回复节奏与长度、事件缓冲
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConversationSection {
    /// 两条陌生人消息间隔不超过该值时不回复（毫秒）
    pub min_response_delta_ms: u64,
    pub reply_min_tokens: usize,
    pub reply_max_tokens: usize,
    /// 会话内部事件缓冲容量
    pub event_buffer: usize,
}

impl Default for ConversationSection {
    fn default() -> Self {
        Self {
            min_response_delta_ms: 2000,
            reply_min_tokens: 2,
            reply_max_tokens: 10,
            event_buffer: 64,
        }
    }
}

/// [transport] 段：观察者 WebSocket 的读写期限、心跳与容错
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportSection {
    pub write_wait_secs: u64,
    pub read_wait_secs: u64,
    /// 连续读超时超过该次数才断开
    pub allowed_timeouts: u32,
    /// 客户端单条消息上限（字节）
    pub max_message_size: usize,
}

impl Default for TransportSection {
    fn default() -> Self {
        Self {
            write_wait_secs: 10,
            read_wait_secs: 10,
            allowed_timeouts: 5,
            max_message_size: 512,
        }
    }
}

/// [model] 段：启动语料
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    pub corpus_path: PathBuf,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("irccorpus"),
        }
    }
}

/// [session] 段：模拟陌生人
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// 脚本文件，未设置时用内置脚本
    pub script_path: Option<PathBuf>,
    /// 两句之间的间隔（毫秒）
    pub pace_ms: u64,
    pub max_lines: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            script_path: None,
            pace_ms: 3000,
            max_lines: 50,
        }
    }
}

impl HubSection {
    pub fn stranger_timeout(&self) -> Duration {
        Duration::from_secs(self.stranger_timeout_secs)
    }
}

impl ConversationSection {
    pub fn min_response_delta(&self) -> Duration {
        Duration::from_millis(self.min_response_delta_ms)
    }
}

impl TransportSection {
    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }

    pub fn read_wait(&self) -> Duration {
        Duration::from_secs(self.read_wait_secs)
    }

    /// 心跳周期，必须小于读期限
    pub fn ping_period(&self) -> Duration {
        (self.read_wait() * 9 / 10).max(MIN_PERIOD)
    }
}

impl SessionSection {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms).max(MIN_PERIOD)
    }
}

/// 从 config 目录加载配置，环境变量 CHATRELAY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，
///    找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 CHATRELAY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("CHATRELAY")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.hub.stranger_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.hub.max_recv, 200);
        assert_eq!(cfg.conversation.event_buffer, 64);
        assert_eq!(cfg.transport.ping_period(), Duration::from_secs(9));
        assert!(cfg.transport.ping_period() < cfg.transport.read_wait());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[hub]\nmax_recv = 7\n\n[conversation]\nreply_max_tokens = 4\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.hub.max_recv, 7);
        assert_eq!(cfg.hub.stranger_timeout_secs, 15);
        assert_eq!(cfg.conversation.reply_max_tokens, 4);
        assert_eq!(cfg.conversation.reply_min_tokens, 2);
    }

    #[test]
    fn test_zero_periods_are_clamped() {
        let transport = TransportSection {
            read_wait_secs: 0,
            ..TransportSection::default()
        };
        assert_eq!(transport.ping_period(), MIN_PERIOD);

        let session = SessionSection {
            pace_ms: 0,
            ..SessionSection::default()
        };
        assert_eq!(session.pace(), MIN_PERIOD);
    }
}
