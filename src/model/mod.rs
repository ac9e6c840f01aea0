//! 模型层：文本模型抽象、Mock 实现与启动语料加载

pub mod corpus;
pub mod mock;
pub mod traits;

pub use corpus::load_corpus;
pub use mock::MockTextModel;
pub use traits::TextModel;
