//! 脚本检测器 - 按顺序返回预先写好的类别序列
//!
//! 用于无模型环境下的演示与测试。脚本文件是JSON数组, 每项是一帧的类别列表:
//! `[["CA001"], ["CA001", "CB002"], []]`

use std::fs;
use std::path::Path;

use image::RgbImage;

use super::{Detections, Detector};
use crate::error::{PipelineError, Result};

pub struct ScriptedDetector {
    script: Vec<Vec<String>>,
    next: usize,
    cycle: bool,
}

impl ScriptedDetector {
    pub fn new(script: Vec<Vec<String>>) -> Self {
        Self {
            script,
            next: 0,
            cycle: false,
        }
    }

    /// 脚本用完后从头开始
    pub fn cycling(mut self) -> Self {
        self.cycle = true;
        self
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| PipelineError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        let script: Vec<Vec<String>> = serde_json::from_str(&json)
            .map_err(|e| PipelineError::ModelLoad(format!("{}: {}", path.display(), e)))?;
        log::info!("📜 脚本检测器: {} ({} 帧)", path.display(), script.len());
        Ok(Self::new(script))
    }

    fn next_labels(&mut self) -> Vec<String> {
        if self.cycle && !self.script.is_empty() && self.next >= self.script.len() {
            self.next = 0;
        }
        let labels = self.script.get(self.next).cloned().unwrap_or_default();
        self.next += 1;
        labels
    }
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Detections> {
        Ok(Detections {
            annotated: image.clone(),
            labels: self.next_labels(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
