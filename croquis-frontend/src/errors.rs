use std::path::PathBuf;

use croquis_engine::errors::EngineError;
use croquis_io::IoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("草图存储操作失败: {0}")]
    Store(#[from] IoError),
    #[error("草图「{name}」有未保存的修改")]
    UnsavedChanges { name: String },
        #[error("编辑器操作失败: {0}")]
    Engine(#[from] EngineError),
    #[error("快照渲染失败: {0}")]
    Render(String),
    #[error("快照编码失败: {0}")]
    Encode(#[from] image::ImageError),
    #[error("写入快照 {path:?} 失败: {source}")]
    WriteSnapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
