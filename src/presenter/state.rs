//! 显示状态机
//!
//! `空闲(Raw) --开始--> 识别中(Annotated) --处理数超过阈值--> 结束(Raw)`
//! 结束后不能再次进入识别。

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    Raw,       // 显示原始画面
    Annotated, // 显示检测结果
}

/// 状态标签
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusLabel {
    Idle,
    Detecting,
    Finished,
    DetectionStopped,
    SourceStopped,
}

impl StatusLabel {
    pub fn text(&self) -> &'static str {
        match self {
            StatusLabel::Idle => "空闲",
            StatusLabel::Detecting => "识别中",
            StatusLabel::Finished => "结束",
            StatusLabel::DetectionStopped => "检测已停止",
            StatusLabel::SourceStopped => "视频源已结束",
        }
    }
}

#[derive(Debug)]
pub struct PresenterState {
    mode: DisplayMode,
    processed: u32,
    last_labels: Vec<String>,
    finished: bool,
    detection_stopped: bool,
    status: StatusLabel,
    finish_threshold: Option<u32>,
}

impl PresenterState {
    pub fn new(finish_threshold: Option<u32>) -> Self {
        Self {
            mode: DisplayMode::Raw,
            processed: 0,
            last_labels: Vec::new(),
            finished: false,
            detection_stopped: false,
            status: StatusLabel::Idle,
            finish_threshold,
        }
    }

    /// 开始识别, 返回模式是否改变
    pub fn start(&mut self) -> bool {
        if self.finished {
            log::warn!("⚠️  本次识别已结束, 忽略开始命令");
            return false;
        }
        if self.detection_stopped {
            log::warn!("⚠️  检测线程已停止, 忽略开始命令");
            return false;
        }
        if self.mode == DisplayMode::Annotated {
            return false;
        }
        self.mode = DisplayMode::Annotated;
        self.status = StatusLabel::Detecting;
        log::info!("▶️  开始识别");
        true
    }

    /// 处理数超过阈值时切回原始画面, 只触发一次
    pub fn finish_if_exhausted(&mut self) -> bool {
        let Some(threshold) = self.finish_threshold else {
            return false;
        };
        if self.finished || self.mode != DisplayMode::Annotated || self.processed <= threshold {
            return false;
        }
        self.mode = DisplayMode::Raw;
        self.finished = true;
        self.status = StatusLabel::Finished;
        log::info!("🏁 识别结束 (已处理 {} 个结果)", self.processed);
        true
    }

    /// 记录一个检测结果, 返回统计是否需要重算
    ///
    /// 空类别序列不替换上一次的统计
    pub fn record_result(&mut self, labels: &[String]) -> bool {
        self.processed += 1;
        if labels.is_empty() || labels == self.last_labels.as_slice() {
            return false;
        }
        self.last_labels = labels.to_vec();
        true
    }

    /// 检测线程已停止: 不会再有检测结果, 切回原始画面
    pub fn mark_detection_stopped(&mut self) {
        self.detection_stopped = true;
        if self.mode == DisplayMode::Annotated {
            self.mode = DisplayMode::Raw;
            log::warn!("⚠️  检测线程已停止, 切回原始画面 (已处理 {} 个结果)", self.processed);
        }
        if !self.finished {
            self.status = StatusLabel::DetectionStopped;
        }
    }

    pub fn mark_source_stopped(&mut self) {
        if matches!(self.status, StatusLabel::Idle | StatusLabel::Detecting) {
            self.status = StatusLabel::SourceStopped;
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn processed(&self) -> u32 {
        self.processed
    }

    pub fn last_labels(&self) -> &[String] {
        &self.last_labels
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn status(&self) -> StatusLabel {
        self.status
    }

    pub fn finish_threshold(&self) -> Option<u32> {
        self.finish_threshold
    }
}
