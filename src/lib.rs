//! 视频目标检测与类别统计
//!
//! 读帧线程 → 检测线程 → 界面线程, 三者之间只通过有界队列交换数据。
//! 界面线程按固定周期从队列取最新画面或检测结果, 统计每个结果中各类别的数量。
pub mod app; // 流水线装配与关闭
pub mod config; // 配置文件与命令行参数
pub mod detection; // 检测模型与检测线程
pub mod error;
pub mod input; // 视频源与读帧线程
pub mod pipeline; // 队列与取消信号
pub mod presenter; // 显示模式, 统计与画面缩放

#[cfg(feature = "gui")]
pub mod renderer; // macroquad + egui 窗口

pub use crate::app::{Pipeline, PipelineSummary};
pub use crate::config::{AppConfig, Args, ModelConfig};
pub use crate::error::{PipelineError, Result};
pub use crate::presenter::{Presenter, Surface, TickReport};
