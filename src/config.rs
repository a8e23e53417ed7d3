//! 运行配置 - 通过JSON文件调整参数, 命令行参数可覆盖

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::OverflowPolicy;

/// 默认识别类别 (16类)
pub const DEFAULT_CATEGORIES: [&str; 16] = [
    "CA001", "CA002", "CA003", "CA004", "CB001", "CB002", "CB003", "CB004", "CC001", "CC002",
    "CC003", "CC004", "CD001", "CD002", "CD003", "CD004",
];

/// 检测模型配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,             // .onnx 模型 或 .json 脚本
    pub labels: Vec<String>,      // 类别名称 (按类别ID排列)
    pub conf_threshold: f32,      // 置信度阈值
    pub iou_threshold: f32,       // NMS IOU阈值
    pub input_size: u32,          // 模型输入尺寸
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/detector.onnx".to_string(),
            labels: DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            conf_threshold: 0.5,
            iou_threshold: 0.45,
            input_size: 640,
        }
    }
}

/// 应用配置
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    // === 视频源 ===
    pub source: String,                   // 视频文件 / 图片目录 / pattern:<n>
    pub frame_interval_ms: u64,           // 读帧间隔 (控制帧率)
    pub sample_interval_ms: Option<u64>,  // 送检采样间隔, None=每帧送检

    // === 队列 ===
    pub frame_queue_capacity: usize,
    pub result_queue_capacity: usize,
    pub overflow: OverflowPolicy,
    pub poll_interval_ms: u64,            // 检测线程等待帧的超时

    // === 界面 ===
    pub tick_ms: u64,                     // 界面刷新周期
    pub finish_threshold: Option<u32>,    // 处理结果数超过该值后自动结束, None=不自动结束
    pub output_width: u32,
    pub output_height: u32,
    pub max_tally_rows: usize,            // 统计面板最多显示行数
    pub font_path: Option<String>,        // 帧率叠加字体

    pub model: ModelConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source: "qq1.mp4".to_string(),
            frame_interval_ms: 30,
            sample_interval_ms: None,

            frame_queue_capacity: 8,
            result_queue_capacity: 8,
            overflow: OverflowPolicy::DropOldest,
            poll_interval_ms: 50,

            tick_ms: 30,
            finish_threshold: Some(8),
            output_width: 360,
            output_height: 640,
            max_tally_rows: 20,
            font_path: None,

            model: ModelConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从JSON文件加载配置 (文件不存在时创建默认配置, 解析失败时使用默认值)
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => {
                    log::info!("✅ 配置已从 {} 加载", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("⚠️  配置文件解析失败: {}, 使用默认值", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("📝 配置文件不存在,创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    log::error!("❌ 保存配置失败: {}", e);
                }
                config
            }
        }
    }

    /// 严格加载: 文件缺失或格式错误都返回错误
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)
            .map_err(|e| PipelineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        fs::write(path, json)?;
        log::info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_queue_capacity == 0 || self.result_queue_capacity == 0 {
            return Err(PipelineError::Config("队列容量必须大于0".to_string()));
        }
        if self.output_width == 0 || self.output_height == 0 {
            return Err(PipelineError::Config(format!(
                "输出尺寸非法: {}x{}",
                self.output_width, self.output_height
            )));
        }
        if self.tick_ms == 0 {
            return Err(PipelineError::Config("tick_ms 必须大于0".to_string()));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn sample_interval(&self) -> Option<Duration> {
        self.sample_interval_ms.map(Duration::from_millis)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// 打印当前配置
    pub fn print_summary(&self) {
        log::info!("🎛️  当前配置:");
        log::info!("  视频源: {}", self.source);
        log::info!("  读帧间隔: {}ms", self.frame_interval_ms);
        if let Some(ms) = self.sample_interval_ms {
            log::info!("  送检采样间隔: {}ms", ms);
        }
        log::info!(
            "  队列容量: 帧{} | 结果{} | 溢出策略 {:?}",
            self.frame_queue_capacity,
            self.result_queue_capacity,
            self.overflow
        );
        match self.finish_threshold {
            Some(n) => log::info!("  自动结束阈值: {}", n),
            None => log::info!("  自动结束: 关闭"),
        }
        log::info!("  检测模型: {}", self.model.path);
    }
}

/// 命令行参数
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about = "视频目标检测与类别统计", long_about = None)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "tally.json")]
    pub config: PathBuf,

    /// 视频源 (视频文件 / 图片目录 / pattern:<帧数>)
    #[arg(short, long)]
    pub source: Option<String>,

    /// 检测模型 (.onnx) 或 标签脚本 (.json)
    #[arg(short, long)]
    pub model: Option<String>,

    /// 自动结束阈值
    #[arg(short, long)]
    pub threshold: Option<u32>,

    /// 关闭自动结束
    #[arg(long)]
    pub no_auto_finish: bool,

    /// 帧率叠加使用的字体文件
    #[arg(long)]
    pub font: Option<String>,
}

impl Args {
    /// 命令行参数覆盖配置文件
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(source) = &self.source {
            config.source = source.clone();
        }
        if let Some(model) = &self.model {
            config.model.path = model.clone();
        }
        if let Some(threshold) = self.threshold {
            config.finish_threshold = Some(threshold);
        }
        if self.no_auto_finish {
            config.finish_threshold = None;
        }
        if let Some(font) = &self.font {
            config.font_path = Some(font.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.finish_threshold, Some(8));
        assert_eq!(config.tick_ms, 30);
        assert_eq!((config.output_width, config.output_height), (360, 640));
        assert_eq!(config.model.labels.len(), 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.json");
        let config = AppConfig::load(&path);
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());
        assert_eq!(AppConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.json");
        fs::write(&path, r#"{ "source": "pattern:5", "finish_threshold": null }"#).unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.source, "pattern:5");
        assert_eq!(config.finish_threshold, None);
        assert_eq!(config.frame_interval_ms, 30);
    }

    #[test]
    fn test_broken_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::from_file(&path).is_err());
        assert_eq!(AppConfig::load(&path), AppConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = AppConfig {
            frame_queue_capacity: 0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_args_override() {
        let mut config = AppConfig::default();
        let args = Args {
            source: Some("clips".to_string()),
            threshold: Some(3),
            ..Args::default()
        };
        args.apply_to(&mut config);
        assert_eq!(config.source, "clips");
        assert_eq!(config.finish_threshold, Some(3));

        let args = Args {
            no_auto_finish: true,
            ..Args::default()
        };
        args.apply_to(&mut config);
        assert_eq!(config.finish_threshold, None);
    }
}
