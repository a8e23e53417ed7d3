/// 视频输入系统 (Video Input System)
///
/// 独立工作线程,负责按固定节奏读帧并分发
/// - VideoSource: 视频源接口 (打开 → 逐帧读取 → 结束)
/// - ImageSequence: 图片目录 (按文件名排序)
/// - Pattern: 合成测试画面
/// - FfmpegSource: FFmpeg解码 (视频文件/RTSP/摄像头, 需启用 `ffmpeg` 特性)
/// - FrameSource: 读帧线程, 分发到预览队列与检测队列
pub mod pattern;
pub mod sequence;
pub mod source;

#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;

use std::path::Path;

use image::RgbImage;

use crate::error::{PipelineError, Result};
use crate::pipeline::CancelToken;

pub use pattern::PatternSource;
pub use sequence::ImageSequence;
pub use source::FrameSource;

#[cfg(feature = "ffmpeg")]
pub use ffmpeg::FfmpegSource;

/// 视频源: 惰性、不可重启的帧序列
pub trait VideoSource: Send {
    /// 读取下一帧, `Ok(None)` 表示流结束
    fn read(&mut self) -> Result<Option<RgbImage>>;

    /// 用于日志的描述
    fn describe(&self) -> String;

    /// 读帧线程启动时传入取消信号; 可能长时间阻塞的源应在取消后让 `read` 尽快返回 `Ok(None)`
    fn watch_cancel(&mut self, _cancel: &CancelToken) {}
}

/// 根据描述打开视频源
///
/// - `pattern:<帧数>[@<宽>x<高>]` 合成画面 (帧数为0表示无限)
/// - 已存在的目录: 图片序列
/// - 其他: FFmpeg (视频文件/流地址)
pub fn open_source(spec: &str) -> Result<Box<dyn VideoSource>> {
    if let Some(rest) = spec.strip_prefix("pattern:") {
        return Ok(Box::new(PatternSource::parse(rest)?));
    }

    let path = Path::new(spec);
    if path.is_dir() {
        return Ok(Box::new(ImageSequence::open(path)?));
    }

    open_stream(spec)
}

#[cfg(feature = "ffmpeg")]
fn open_stream(spec: &str) -> Result<Box<dyn VideoSource>> {
    Ok(Box::new(FfmpegSource::open(spec)?))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_stream(spec: &str) -> Result<Box<dyn VideoSource>> {
    Err(PipelineError::source_open(
        spec,
        "不是图片目录或 pattern 源, 解码视频需启用 ffmpeg 特性",
    ))
}
