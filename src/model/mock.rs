//! Mock 文本模型（无需真实生成算法）
//!
//! 记住最近训练过的行；回复时先复述种子中的词，再用最近一行补足，长度限制在 [min, max] 内。

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::ModelError;
use crate::model::TextModel;

const RECENT_CAPACITY: usize = 256;

#[derive(Debug, Default)]
struct MockState {
    recent: VecDeque<String>,
    trained: usize,
}

/// Mock 模型：小写、按空白分词
#[derive(Debug, Default)]
pub struct MockTextModel {
    state: RwLock<MockState>,
}

impl MockTextModel {
    pub fn new() -> Self {
        Self::default()
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().map(str::to_lowercase)
}

#[async_trait]
impl TextModel for MockTextModel {
    async fn respond(
        &self,
        seed: &str,
        min_tokens: usize,
        max_tokens: usize,
    ) -> Result<String, ModelError> {
        if min_tokens > max_tokens {
            return Err(ModelError::InvalidBounds {
                min: min_tokens,
                max: max_tokens,
            });
        }

        let state = self.state.read().await;
        let filler = state.recent.back().map(String::as_str).unwrap_or("");
        let words: Vec<String> = tokenize(seed)
            .chain(tokenize(filler))
            .take(max_tokens)
            .collect();

        if words.len() < min_tokens {
            return Err(ModelError::InsufficientTokens {
                wanted: min_tokens,
                available: words.len(),
            });
        }
        Ok(words.join(" "))
    }

    async fn update(&self, text: &str) {
        let line = text.trim();
        if line.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        if state.recent.len() == RECENT_CAPACITY {
            state.recent.pop_front();
        }
        state.recent.push_back(line.to_string());
        state.trained += 1;
    }

    async fn trained_lines(&self) -> usize {
        self.state.read().await.trained
    }
}
