//! 流水线装配: 打开视频源 → 创建队列 → 启动读帧/检测线程 → 返回渲染端
//!
//! 队列布局:
//! - 预览队列 (读帧 → 渲染): 总是丢弃最旧帧, 识别中不消费它也不会拖住读帧
//! - 检测队列 (读帧 → 检测): 按配置的溢出策略
//! - 结果队列 (检测 → 渲染): 总是丢弃最旧结果, 原始画面模式下不消费它

use std::thread::JoinHandle;

use crate::config::AppConfig;
use crate::detection::{DetectionWorker, Detector, FpsOverlay};
use crate::error::Result;
use crate::input::{open_source, FrameSource, VideoSource};
use crate::pipeline::{handoff, CancelToken, OverflowPolicy};
use crate::presenter::Presenter;

/// 关闭时的汇总
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PipelineSummary {
    pub frames: Option<u64>,  // None = 线程异常退出
    pub results: Option<u64>,
}

pub struct Pipeline {
    cancel: CancelToken,
    source: Option<JoinHandle<u64>>,
    detection: Option<JoinHandle<u64>>,
}

impl Pipeline {
    /// 打开配置中的视频源并启动流水线; 视频源无法打开时返回错误
    pub fn start(config: &AppConfig, detector: Box<dyn Detector>) -> Result<(Pipeline, Presenter)> {
        let source = open_source(&config.source)?;
        Self::start_with_source(config, source, detector)
    }

    pub fn start_with_source(
        config: &AppConfig,
        source: Box<dyn VideoSource>,
        detector: Box<dyn Detector>,
    ) -> Result<(Pipeline, Presenter)> {
        config.validate()?;
        log::info!("🚀 启动流水线: {}", source.describe());

        let cancel = CancelToken::new();
        let (preview_tx, preview_rx) = handoff(config.frame_queue_capacity, OverflowPolicy::DropOldest);
        let (detect_tx, detect_rx) = handoff(config.frame_queue_capacity, config.overflow);
        let (result_tx, result_rx) = handoff(config.result_queue_capacity, OverflowPolicy::DropOldest);
        let (status_tx, status_rx) = crossbeam_channel::unbounded();

        let overlay = FpsOverlay::load(config.font_path.as_deref());
        let detection = DetectionWorker::new(detector, detect_rx, result_tx, status_tx.clone(), cancel.clone())
            .with_poll_interval(config.poll_interval())
            .with_overlay(overlay)
            .spawn()?;

        let source = match FrameSource::new(source, preview_tx, detect_tx, status_tx, cancel.clone())
            .with_interval(config.frame_interval())
            .with_sampling(config.sample_interval())
            .spawn()
        {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                let _ = detection.join();
                return Err(e.into());
            }
        };

        let presenter = Presenter::new(config, preview_rx, result_rx, status_rx);
        Ok((
            Pipeline {
                cancel,
                source: Some(source),
                detection: Some(detection),
            },
            presenter,
        ))
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// 两个工作线程是否都已退出
    pub fn is_idle(&self) -> bool {
        [&self.source, &self.detection]
            .iter()
            .all(|handle| handle.as_ref().map_or(true, |h| h.is_finished()))
    }

    /// 取消工作线程, 释放渲染端并等待线程退出
    pub fn shutdown(mut self, presenter: Presenter) -> PipelineSummary {
        log::info!("🛑 正在关闭流水线...");
        self.cancel.cancel();
        drop(presenter);
        let summary = PipelineSummary {
            frames: join_worker("读帧线程", self.source.take()),
            results: join_worker("检测线程", self.detection.take()),
        };
        log::info!(
            "✅ 流水线已关闭 (读帧 {:?}, 检测结果 {:?})",
            summary.frames,
            summary.results
        );
        summary
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if self.source.is_some() || self.detection.is_some() {
            self.cancel.cancel();
            join_worker("读帧线程", self.source.take());
            join_worker("检测线程", self.detection.take());
        }
    }
}

fn join_worker(name: &str, handle: Option<JoinHandle<u64>>) -> Option<u64> {
    let handle = handle?;
    match handle.join() {
        Ok(count) => Some(count),
        Err(_) => {
            log::error!("❌ {}异常退出", name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::ScriptedDetector;
    use crate::error::PipelineError;
    use crate::input::PatternSource;
    use std::time::{Duration, Instant};

    #[test]
    fn test_unopenable_source_aborts_start() {
        let config = AppConfig {
            source: "pattern:oops".to_string(),
            ..AppConfig::default()
        };
        let result = Pipeline::start(&config, Box::new(ScriptedDetector::new(Vec::new())));
        assert!(matches!(result, Err(PipelineError::SourceOpen { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AppConfig {
            result_queue_capacity: 0,
            ..AppConfig::default()
        };
        let result = Pipeline::start_with_source(
            &config,
            Box::new(PatternSource::new(1, 2, 2)),
            Box::new(ScriptedDetector::new(Vec::new())),
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_shutdown_stops_endless_pipeline() {
        let config = AppConfig {
            source: "pattern:0@8x8".to_string(),
            frame_interval_ms: 5,
            poll_interval_ms: 5,
            ..AppConfig::default()
        };
        let detector = ScriptedDetector::new(vec![vec!["CA001".to_string()]]).cycling();
        let (pipeline, mut presenter) = Pipeline::start(&config, Box::new(detector)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while presenter.canvas().is_none() && Instant::now() < deadline {
            presenter.tick();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(presenter.canvas().is_some());
        assert!(!pipeline.is_idle());

        let summary = pipeline.shutdown(presenter);
        assert!(summary.frames.unwrap_or(0) > 0);
        assert!(summary.results.is_some());
    }
}
