/// 视频处理流水线 (Video Processing Pipeline)
///
/// 三个并发单元,通过有界队列单向传递数据:
/// - FrameSource:     读帧 (独立线程) → 预览队列 + 检测队列
/// - DetectionWorker: 目标检测 (独立线程) → 结果队列
/// - Presenter:       渲染与统计 (主线程定时tick)
///
/// 两个工作线程只通过 `WorkerStatus` 向渲染端报告状态, 不存在反向数据流。
pub mod cancel;
pub mod queue;

use std::sync::Arc;

use image::RgbImage;

pub use cancel::CancelToken;
pub use queue::{handoff, OverflowPolicy, PublishError, PublishOutcome, Publisher, Subscriber, TakeError};

// ========== 消息类型定义 ==========

/// 原始帧 (读帧线程 → 检测线程 + 渲染线程)
#[derive(Clone, Debug)]
pub struct Frame {
    pub seq: u64,              // 帧序号 (从1开始)
    pub image: Arc<RgbImage>,  // 使用Arc共享数据,避免复制
}

impl Frame {
    pub fn new(seq: u64, image: RgbImage) -> Self {
        Self {
            seq,
            image: Arc::new(image),
        }
    }
}

/// 检测结果 (检测线程 → 渲染线程)
///
/// 标注图像与类别序列作为一条消息发送, 不会被拆开或错配
#[derive(Clone, Debug)]
pub struct DetectionResult {
    pub seq: u64,             // 对应的帧序号
    pub image: RgbImage,      // 标注后的图像
    pub labels: Vec<String>,  // 每个检测实例一个类别 (允许重复)
    pub rate: f64,            // 检测速率估计
    pub inference_ms: f64,
}

/// 工作线程状态通知 (工作线程 → 渲染线程)
#[derive(Clone, Debug, PartialEq)]
pub enum WorkerStatus {
    SourceEnded { frames: u64 },
    SourceFailed(String),
    DetectionEnded { results: u64 },
    DetectionStopped(String),
}
