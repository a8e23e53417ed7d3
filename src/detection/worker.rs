//! 检测线程 (Detection worker)
//! 职责: 检测队列取帧 → 模型检测 → 发送 DetectionResult
//!
//! 模型出错或崩溃时只停止本线程, 并通过状态通道通知渲染端。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use super::{Detector, FpsOverlay, RateMeter};
use crate::pipeline::{CancelToken, DetectionResult, Frame, PublishError, Publisher, Subscriber, TakeError, WorkerStatus};

pub struct DetectionWorker {
    detector: Box<dyn Detector>,
    frames: Subscriber<Frame>,
    results: Publisher<DetectionResult>,
    status: Sender<WorkerStatus>,
    cancel: CancelToken,
    poll_interval: Duration,
    overlay: FpsOverlay,
    meter: RateMeter,
}

impl DetectionWorker {
    pub fn new(
        detector: Box<dyn Detector>,
        frames: Subscriber<Frame>,
        results: Publisher<DetectionResult>,
        status: Sender<WorkerStatus>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            detector,
            frames,
            results,
            status,
            cancel,
            poll_interval: Duration::from_millis(50),
            overlay: FpsOverlay::disabled(),
            meter: RateMeter::new(),
        }
    }

    /// 等待新帧的超时 (决定响应取消的速度)
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_overlay(mut self, overlay: FpsOverlay) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("detection".to_string())
            .spawn(move || self.run())
    }

    /// 运行检测循环, 返回已发布的结果数
    pub fn run(mut self) -> u64 {
        log::info!("🔍 检测线程启动 (模型: {})", self.detector.name());
        let mut processed = 0u64;
        let mut total_ms = 0.0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let frame = match self.frames.take_timeout(self.poll_interval) {
                Ok(frame) => frame,
                Err(TakeError::Timeout) => continue,
                Err(TakeError::Disconnected) => {
                    log::info!("📭 检测队列已关闭, 共处理 {} 帧", processed);
                    let _ = self.status.send(WorkerStatus::DetectionEnded { results: processed });
                    return processed;
                }
            };

            let started = Instant::now();
            let detector = &mut self.detector;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&frame.image)));
            let detections = match outcome {
                Ok(Ok(detections)) => detections,
                Ok(Err(e)) => {
                    log::error!("❌ 帧 #{} 检测失败: {}", frame.seq, e);
                    let _ = self.status.send(WorkerStatus::DetectionStopped(e.to_string()));
                    return processed;
                }
                Err(payload) => {
                    let reason = format!("检测模型崩溃: {}", panic_message(payload.as_ref()));
                    log::error!("❌ 帧 #{} {}", frame.seq, reason);
                    let _ = self.status.send(WorkerStatus::DetectionStopped(reason));
                    return processed;
                }
            };
            let latency = started.elapsed();
            let inference_ms = latency.as_secs_f64() * 1000.0;

            let rate = self.meter.update(latency);
            let mut image = detections.annotated;
            self.overlay.draw(&mut image, rate);

            let result = DetectionResult {
                seq: frame.seq,
                image,
                labels: detections.labels,
                rate,
                inference_ms,
            };

            match self.results.publish(result, &self.cancel) {
                Ok(_) => processed += 1,
                Err(PublishError::Disconnected(_)) => {
                    log::info!("🛑 结果队列已关闭, 检测线程退出");
                    return processed;
                }
                Err(PublishError::Cancelled(_)) => break,
            }

            total_ms += inference_ms;
            if processed % 30 == 0 {
                log::debug!(
                    "🔍 检测统计: 已处理{}帧 | 速率{:.2} | 平均耗时{:.1}ms",
                    processed,
                    rate,
                    total_ms / processed as f64
                );
            }
        }

        log::info!("🛑 检测线程已取消 (已处理 {} 帧)", processed);
        processed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
