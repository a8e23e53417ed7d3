/// 渲染与统计 (Presenter)
///
/// 在界面线程中按固定周期 tick, 从不阻塞:
/// 1. 处理工作线程状态通知
/// 2. 处理数超过阈值时切回原始画面 (结束)
/// 3. 按显示模式取数据: 识别中取检测结果, 否则取最新原始帧
/// 4. 类别序列变化时重算统计并更新统计面板
/// 5. 画面缩放到输出尺寸并转换为RGBA
///
/// 状态与统计只由本模块读写; 工作线程只能通过队列和状态通道与它交流。
pub mod board;
pub mod canvas;
pub mod state;
pub mod tally;

use crossbeam_channel::Receiver;
use image::RgbImage;

use crate::config::AppConfig;
use crate::pipeline::{DetectionResult, Frame, Subscriber, WorkerStatus};

pub use board::{RowChange, TallyBoard, TallyRow, PANEL_TITLE};
pub use canvas::{CanvasImage, CanvasScaler};
pub use state::{DisplayMode, PresenterState, StatusLabel};
pub use tally::Tally;

/// 本次tick取到的数据
#[derive(Clone, Debug, PartialEq)]
pub enum Consumed {
    Frame { seq: u64, skipped: usize },
    Result { seq: u64, labels: Vec<String>, rate: f64 },
}

/// 一次tick的结果, 供界面与测试观察
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    pub finished_now: bool,
    pub consumed: Option<Consumed>,
    pub tally_changes: Vec<RowChange>,
    pub canvas_updated: bool,
    pub status_changed: bool,
}

/// 显示界面 (窗口 / 日志)
pub trait Surface {
    fn present(&mut self, presenter: &Presenter, report: &TickReport);
}

pub struct Presenter {
    state: PresenterState,
    tally: Tally,
    board: TallyBoard,
    scaler: CanvasScaler,
    canvas: Option<CanvasImage>,
    preview: Subscriber<Frame>,
    results: Subscriber<DetectionResult>,
    status: Receiver<WorkerStatus>,
    rate: f64,
    source_done: bool,
    detection_done: bool,
}

impl Presenter {
    pub fn new(
        config: &AppConfig,
        preview: Subscriber<Frame>,
        results: Subscriber<DetectionResult>,
        status: Receiver<WorkerStatus>,
    ) -> Self {
        Self {
            state: PresenterState::new(config.finish_threshold),
            tally: Tally::default(),
            board: TallyBoard::new(config.max_tally_rows),
            scaler: CanvasScaler::new(config.output_width, config.output_height),
            canvas: None,
            preview,
            results,
            status,
            rate: 0.0,
            source_done: false,
            detection_done: false,
        }
    }

    /// 开始命令 (界面按钮)
    pub fn start(&mut self) -> bool {
        self.state.start()
    }

    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport {
            status_changed: self.drain_status(),
            ..TickReport::default()
        };

        if self.state.finish_if_exhausted() {
            report.finished_now = true;
            report.status_changed = true;
        }

        let image = match self.state.mode() {
            DisplayMode::Annotated => self.results.try_take().map(|result| {
                let DetectionResult {
                    seq,
                    image,
                    labels,
                    rate,
                    ..
                } = result;
                self.rate = rate;
                if self.state.record_result(&labels) {
                    self.tally = Tally::from_labels(self.state.last_labels());
                    report.tally_changes = self.board.apply(&self.tally);
                }
                report.consumed = Some(Consumed::Result { seq, labels, rate });
                (seq, ImageRef::Owned(image))
            }),
            DisplayMode::Raw => self.take_latest_frame().map(|(frame, skipped)| {
                report.consumed = Some(Consumed::Frame {
                    seq: frame.seq,
                    skipped,
                });
                (frame.seq, ImageRef::Shared(frame))
            }),
        };

        if let Some((seq, image)) = image {
            match self.scaler.render(seq, image.as_image()) {
                Ok(canvas) => {
                    self.canvas = Some(canvas);
                    report.canvas_updated = true;
                }
                Err(e) => log::warn!("⚠️  帧 #{} 显示失败: {}", seq, e),
            }
        }

        report
    }

    /// 原始画面只显示最新一帧, 积压的旧帧直接丢弃
    fn take_latest_frame(&mut self) -> Option<(Frame, usize)> {
        let mut latest = self.preview.try_take()?;
        let mut skipped = 0;
        while let Some(frame) = self.preview.try_take() {
            latest = frame;
            skipped += 1;
        }
        Some((latest, skipped))
    }

    fn drain_status(&mut self) -> bool {
        let mut changed = false;
        while let Ok(status) = self.status.try_recv() {
            let before = self.state.status();
            match &status {
                WorkerStatus::SourceEnded { frames } => {
                    log::info!("📼 视频源结束 ({} 帧)", frames);
                    self.source_done = true;
                    self.state.mark_source_stopped();
                }
                WorkerStatus::SourceFailed(reason) => {
                    log::warn!("⚠️  视频源失败: {}", reason);
                    self.source_done = true;
                    self.state.mark_source_stopped();
                }
                WorkerStatus::DetectionEnded { results } => {
                    log::info!("📭 检测完成 ({} 个结果)", results);
                    self.detection_done = true;
                }
                WorkerStatus::DetectionStopped(reason) => {
                    log::error!("❌ 检测已停止: {}", reason);
                    self.detection_done = true;
                    self.state.mark_detection_stopped();
                }
            }
            changed |= before != self.state.status();
        }
        changed
    }

    pub fn state(&self) -> &PresenterState {
        &self.state
    }

    pub fn mode(&self) -> DisplayMode {
        self.state.mode()
    }

    pub fn status(&self) -> StatusLabel {
        self.state.status()
    }

    pub fn processed(&self) -> u32 {
        self.state.processed()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    pub fn board(&self) -> &TallyBoard {
        &self.board
    }

    pub fn canvas(&self) -> Option<&CanvasImage> {
        self.canvas.as_ref()
    }

    /// 最近一个检测结果的速率
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn pending_results(&self) -> usize {
        self.results.len()
    }

    pub fn source_done(&self) -> bool {
        self.source_done
    }

    /// 检测线程已退出且结果已全部取完
    pub fn detection_drained(&self) -> bool {
        self.detection_done && self.results.is_empty()
    }
}

/// 检测结果图归本tick所有, 原始帧与检测线程共享
enum ImageRef {
    Owned(RgbImage),
    Shared(Frame),
}

impl ImageRef {
    fn as_image(&self) -> &RgbImage {
        match self {
            ImageRef::Owned(image) => image,
            ImageRef::Shared(frame) => &frame.image,
        }
    }
}
