//! 文本模型抽象
//!
//! 所有后端实现 TextModel：respond（按种子生成有界长度的回复）、update（增量训练）。

use async_trait::async_trait;

use crate::core::ModelError;

/// 文本模型 trait：启动时一次性加载语料后，需要承受大量顺序 update 调用
#[async_trait]
pub trait TextModel: Send + Sync {
    /// 以 seed 为种子生成 min_tokens..=max_tokens 个词的回复；seed 为空表示无种子
    async fn respond(
        &self,
        seed: &str,
        min_tokens: usize,
        max_tokens: usize,
    ) -> Result<String, ModelError>;

    /// 用一行文本训练模型
    async fn update(&self, text: &str);

    /// 已训练的行数；默认返回 0，具体实现可覆盖
    async fn trained_lines(&self) -> usize {
        0
    }
}
