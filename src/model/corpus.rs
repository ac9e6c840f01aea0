//! 启动语料：进程启动时读取一次，每行训练一次模型

use std::path::Path;

use crate::model::TextModel;

/// 从文件加载语料并逐行训练；文件不可读时记录警告并返回 0
pub async fn load_corpus(model: &dyn TextModel, path: &Path) -> usize {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Corpus {} unavailable ({}), starting untrained", path.display(), e);
            return 0;
        }
    };

    let mut lines = 0;
    for line in text.lines() {
        model.update(line).await;
        lines += 1;
    }
    tracing::info!("Loaded {} corpus lines from {}", lines, path.display());
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MockTextModel;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_corpus_trains_every_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello world").unwrap();
        writeln!(file, "how are you").unwrap();
        writeln!(file).unwrap();

        let model = MockTextModel::new();
        let lines = load_corpus(&model, file.path()).await;
        assert_eq!(lines, 3);
        assert_eq!(model.trained_lines().await, 2);
    }

    #[tokio::test]
    async fn test_missing_corpus_is_not_fatal() {
        let model = MockTextModel::new();
        let lines = load_corpus(&model, Path::new("/nonexistent/irccorpus")).await;
        assert_eq!(lines, 0);
    }
}
