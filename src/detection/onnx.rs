// YOLOv8 ONNX 检测器
// 包含: 模型加载、预处理(等比缩放+填充)、推理、后处理(NMS)、画框

use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use ndarray::{s, Array, Axis, Ix4};
use ort::{GraphOptimizationLevel, Session};

use super::{Detections, Detector};
use crate::config::ModelConfig;
use crate::error::{PipelineError, Result};

const CXYWH_OFFSET: usize = 4;

const BRIGHT_COLORS: [[u8; 3]; 12] = [
    [255, 0, 0],     // 红色
    [0, 255, 0],     // 绿色
    [0, 0, 255],     // 蓝色
    [255, 255, 0],   // 黄色
    [255, 0, 255],   // 品红
    [0, 255, 255],   // 青色
    [255, 128, 0],   // 橙色
    [255, 0, 128],   // 粉红
    [128, 255, 0],   // 黄绿
    [0, 128, 255],   // 天蓝
    [255, 255, 255], // 白色
    [128, 0, 255],   // 紫色
];

/// 检测框 (原图坐标)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl BBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = w * h;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// 非极大值抑制: 按置信度降序保留, 与已保留框IOU超过阈值的丢弃
pub fn non_max_suppression(boxes: &mut Vec<BBox>, iou_threshold: f32) {
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept = 0;
    for index in 0..boxes.len() {
        let overlapped = (0..kept).any(|prev| boxes[prev].iou(&boxes[index]) > iou_threshold);
        if !overlapped {
            boxes.swap(kept, index);
            kept += 1;
        }
    }
    boxes.truncate(kept);
}

/// 等比缩放到输入尺寸, 空白处填充灰色, 返回张量和缩放比例
fn letterbox(image: &RgbImage, size: u32) -> Result<(Array<f32, Ix4>, f32)> {
    let (w0, h0) = image.dimensions();
    if w0 == 0 || h0 == 0 || size == 0 {
        return Err(PipelineError::Detection(format!(
            "无法缩放 {}x{} 的图像到 {}",
            w0, h0, size
        )));
    }
    let ratio = (size as f32 / w0 as f32).min(size as f32 / h0 as f32);
    let w1 = ((w0 as f32 * ratio).round() as u32).clamp(1, size);
    let h1 = ((h0 as f32 * ratio).round() as u32).clamp(1, size);
    let resized = image::imageops::resize(image, w1, h1, FilterType::Triangle);

    let mut input = Array::from_elem((1, 3, size as usize, size as usize), 144.0 / 255.0);
    for (x, y, rgb) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        let [r, g, b] = rgb.0;
        input[[0, 0, y, x]] = r as f32 / 255.0;
        input[[0, 1, y, x]] = g as f32 / 255.0;
        input[[0, 2, y, x]] = b as f32 / 255.0;
    }
    Ok((input, ratio))
}

pub struct OnnxDetector {
    session: Session,
    input_name: String,
    input_size: u32,
    labels: Vec<String>,
    conf: f32,
    iou: f32,
}

impl OnnxDetector {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let load_err = |e: ort::Error| PipelineError::ModelLoad(format!("{}: {}", config.path, e));

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(&config.path))
            .map_err(load_err)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| PipelineError::ModelLoad(format!("{}: 模型没有输入", config.path)))?;

        log::info!(
            "✅ YOLOv8 检测模型加载成功: {} (输入 {}, {}类)",
            config.path,
            config.input_size,
            config.labels.len()
        );

        Ok(Self {
            session,
            input_name,
            input_size: config.input_size,
            labels: config.labels.clone(),
            conf: config.conf_threshold,
            iou: config.iou_threshold,
        })
    }

    /// 输出 [1, 4 + nc, anchors] → 检测框
    fn postprocess(&self, output: ndarray::ArrayViewD<f32>, ratio: f32, w0: f32, h0: f32) -> Result<Vec<BBox>> {
        let shape = output.shape();
        if shape.len() != 3 || shape[1] <= CXYWH_OFFSET {
            return Err(PipelineError::Detection(format!("输出形状异常: {:?}", shape)));
        }
        let nc = shape[1] - CXYWH_OFFSET;

        let mut boxes = Vec::new();
        let preds = output.index_axis(Axis(0), 0);
        for pred in preds.axis_iter(Axis(1)) {
            let bbox = pred.slice(s![0..CXYWH_OFFSET]);
            let clss = pred.slice(s![CXYWH_OFFSET..CXYWH_OFFSET + nc]);

            let Some((id, &confidence)) = clss
                .iter()
                .enumerate()
                .reduce(|max, x| if x.1 > max.1 { x } else { max })
            else {
                continue;
            };
            if confidence < self.conf {
                continue;
            }

            let cx = bbox[0] / ratio;
            let cy = bbox[1] / ratio;
            let w = bbox[2] / ratio;
            let h = bbox[3] / ratio;
            boxes.push(BBox {
                x1: (cx - w / 2.0).clamp(0.0, w0),
                y1: (cy - h / 2.0).clamp(0.0, h0),
                x2: (cx + w / 2.0).clamp(0.0, w0),
                y2: (cy + h / 2.0).clamp(0.0, h0),
                confidence,
                class_id: id,
            });
        }

        non_max_suppression(&mut boxes, self.iou);
        Ok(boxes)
    }

    fn label(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class{}", class_id))
    }
}

impl Detector for OnnxDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Detections> {
        let (w0, h0) = image.dimensions();
        let (input, ratio) = letterbox(image, self.input_size)?;

        let inputs = ort::inputs![self.input_name.as_str() => input.view()]
            .map_err(|e| PipelineError::Detection(e.to_string()))?;
        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| PipelineError::Detection(e.to_string()))?;
        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Detection(e.to_string()))?;

        let boxes = self.postprocess(output, ratio, w0 as f32, h0 as f32)?;

        let mut annotated = image.clone();
        let mut labels = Vec::with_capacity(boxes.len());
        for bbox in &boxes {
            let w = bbox.width().round() as u32;
            let h = bbox.height().round() as u32;
            if w > 0 && h > 0 {
                let rect = Rect::at(bbox.x1 as i32, bbox.y1 as i32).of_size(w, h);
                let color = BRIGHT_COLORS[bbox.class_id % BRIGHT_COLORS.len()];
                draw_hollow_rect_mut(&mut annotated, rect, Rgb(color));
            }
            labels.push(self.label(bbox.class_id));
        }

        Ok(Detections { annotated, labels })
    }

    fn name(&self) -> &str {
        "yolov8-onnx"
    }
}
