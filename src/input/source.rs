/// 读帧线程 (Frame source worker)
///
/// 按固定间隔从视频源读帧, 每帧发往预览队列; 检测队列按采样间隔接收。
/// 流结束或读取失败时通过状态通道通知渲染端, 然后退出。
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use super::VideoSource;
use crate::pipeline::{CancelToken, Frame, PublishError, PublishOutcome, Publisher, WorkerStatus};

pub struct FrameSource {
    source: Box<dyn VideoSource>,
    preview: Publisher<Frame>,
    detect: Publisher<Frame>,
    status: Sender<WorkerStatus>,
    cancel: CancelToken,
    frame_interval: Duration,
    sample_interval: Option<Duration>,
}

/// 读帧统计 (每秒打印一次)
struct SourceStats {
    frames: u64,
    sampled: u64,
    dropped: u64,
    last: Instant,
}

impl SourceStats {
    fn new() -> Self {
        Self {
            frames: 0,
            sampled: 0,
            dropped: 0,
            last: Instant::now(),
        }
    }

    fn report(&mut self) {
        let elapsed = self.last.elapsed().as_secs_f64();
        if elapsed < 1.0 {
            return;
        }
        log::debug!(
            "📺 读帧统计: {:.1}fps | 送检{} | 队列丢弃{}",
            self.frames as f64 / elapsed,
            self.sampled,
            self.dropped
        );
        self.frames = 0;
        self.sampled = 0;
        self.dropped = 0;
        self.last = Instant::now();
    }
}

impl FrameSource {
    pub fn new(
        source: Box<dyn VideoSource>,
        preview: Publisher<Frame>,
        detect: Publisher<Frame>,
        status: Sender<WorkerStatus>,
        cancel: CancelToken,
    ) -> Self {
        let mut source = source;
        source.watch_cancel(&cancel);
        Self {
            source,
            preview,
            detect,
            status,
            cancel,
            frame_interval: Duration::from_millis(30),
            sample_interval: None,
        }
    }

    /// 读帧间隔 (0 = 不限速)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// 送检采样间隔 (None = 每帧送检)
    pub fn with_sampling(mut self, interval: Option<Duration>) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn spawn(self) -> std::io::Result<JoinHandle<u64>> {
        thread::Builder::new()
            .name("frame-source".to_string())
            .spawn(move || self.run())
    }

    /// 运行读帧循环, 返回读取的帧数
    pub fn run(mut self) -> u64 {
        log::info!("🎬 读帧线程启动: {}", self.source.describe());

        let mut seq = 0u64;
        let mut last_sample: Option<Instant> = None;
        let mut preview_open = true;
        let mut detect_open = true;
        let mut stats = SourceStats::new();

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let image = match self.source.read() {
                Ok(Some(image)) => image,
                Ok(None) if self.cancel.is_cancelled() => break,
                Ok(None) => {
                    log::info!("📼 视频源已结束, 共 {} 帧", seq);
                    let _ = self.status.send(WorkerStatus::SourceEnded { frames: seq });
                    return seq;
                }
                Err(e) => {
                    log::error!("❌ 读帧失败: {}", e);
                    let _ = self.status.send(WorkerStatus::SourceFailed(e.to_string()));
                    return seq;
                }
            };

            seq += 1;
            stats.frames += 1;
            let frame = Frame::new(seq, image);

            if detect_open && self.should_sample(&mut last_sample) {
                stats.sampled += 1;
                match self.detect.publish(frame.clone(), &self.cancel) {
                    Ok(PublishOutcome::DroppedOldest(n)) => stats.dropped += n,
                    Ok(PublishOutcome::Delivered) => {}
                    Err(PublishError::Disconnected(_)) => {
                        log::warn!("⚠️  检测队列已关闭, 停止送检");
                        detect_open = false;
                    }
                    Err(PublishError::Cancelled(_)) => break,
                }
            }

            if preview_open {
                match self.preview.publish(frame, &self.cancel) {
                    Ok(_) => {}
                    Err(PublishError::Disconnected(_)) => preview_open = false,
                    Err(PublishError::Cancelled(_)) => break,
                }
            }

            if !preview_open && !detect_open {
                log::info!("🛑 下游已全部关闭, 读帧线程退出");
                return seq;
            }

            stats.report();

            if !self.frame_interval.is_zero() && self.cancel.wait_timeout(self.frame_interval) {
                break;
            }
        }

        log::info!("🛑 读帧线程已取消 (已读 {} 帧)", seq);
        seq
    }

    fn should_sample(&self, last_sample: &mut Option<Instant>) -> bool {
        let due = match (self.sample_interval, *last_sample) {
            (Some(interval), Some(last)) => last.elapsed() >= interval,
            _ => true,
        };
        if due {
            *last_sample = Some(Instant::now());
        }
        due
    }
}
