/// 目标检测系统 (Detection System)
///
/// 职责: 从检测队列取帧 → 模型检测 → 叠加帧率 → 标注图与类别序列一起发往结果队列
/// - Detector:        检测模型接口 (脚本 / ONNX)
/// - DetectionWorker: 检测线程
/// - RateMeter / FpsOverlay: 检测速率估计与叠加
pub mod overlay;
pub mod scripted;
pub mod worker;

#[cfg(feature = "onnx")]
pub mod onnx;

use std::path::Path;

use image::RgbImage;

use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};

pub use overlay::{FpsOverlay, RateMeter};
pub use scripted::ScriptedDetector;
pub use worker::DetectionWorker;

#[cfg(feature = "onnx")]
pub use onnx::OnnxDetector;

/// 单帧检测输出
#[derive(Clone, Debug)]
pub struct Detections {
    pub annotated: RgbImage,  // 画好检测框的图像
    pub labels: Vec<String>,  // 每个检测实例一个类别
}

/// 检测模型: 图像 → (标注图, 类别序列)
///
/// 实例只在检测线程内使用
pub trait Detector: Send {
    fn detect(&mut self, image: &RgbImage) -> Result<Detections>;

    fn name(&self) -> &str {
        "detector"
    }
}

/// 按文件扩展名加载检测器
///
/// - `.json`: 脚本检测器
/// - `.onnx`: YOLOv8 ONNX 模型 (需启用 `onnx` 特性)
pub fn load_detector(config: &ModelConfig) -> Result<Box<dyn Detector>> {
    let path = Path::new(&config.path);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => Ok(Box::new(ScriptedDetector::from_json_file(path)?)),
        "onnx" => load_onnx(config),
        _ => Err(PipelineError::ModelLoad(format!(
            "无法识别的模型类型: {} (支持 .json / .onnx)",
            config.path
        ))),
    }
}

#[cfg(feature = "onnx")]
fn load_onnx(config: &ModelConfig) -> Result<Box<dyn Detector>> {
    Ok(Box::new(OnnxDetector::new(config)?))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(config: &ModelConfig) -> Result<Box<dyn Detector>> {
    Err(PipelineError::ModelLoad(format!(
        "{}: ONNX 推理需启用 onnx 特性",
        config.path
    )))
}
