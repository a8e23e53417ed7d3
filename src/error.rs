//! 错误类型 (Error taxonomy)
//!
//! 各工作单元的失败都在单元边界被捕获, 记录日志后以 `WorkerStatus` 通知渲染端,
//! 只有启动时视频源无法打开才会终止进程。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// 视频源无法打开
    #[error("无法打开视频源 {location}: {reason}")]
    SourceOpen { location: String, reason: String },

    /// 读取帧失败 (流中断 / 解码错误)
    #[error("读取视频帧失败: {0}")]
    SourceRead(String),

    /// 检测模型内部错误
    #[error("检测失败: {0}")]
    Detection(String),

    /// 模型加载失败
    #[error("模型加载失败: {0}")]
    ModelLoad(String),

    /// 画面缩放失败
    #[error("画面缩放失败: {0}")]
    Canvas(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("图像错误: {0}")]
    Image(#[from] image::ImageError),
}

impl PipelineError {
    pub fn source_open(location: impl Into<String>, reason: impl ToString) -> Self {
        PipelineError::SourceOpen {
            location: location.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_open_display() {
        let err = PipelineError::source_open("qq1.mp4", "no such file");
        let text = err.to_string();
        assert!(text.contains("qq1.mp4"));
        assert!(text.contains("no such file"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: PipelineError = io.into();
        assert!(matches!(err, PipelineError::Io(_)));
    }
}
