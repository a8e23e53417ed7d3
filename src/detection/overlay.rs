//! 检测速率估计与帧率叠加

use std::fs;
use std::time::Duration;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

/// 检测速率: 每次检测后取 (旧值 + 1/检测耗时) / 2, 初始为0
///
/// 只计模型调用本身的耗时, 不含等待新帧的时间
#[derive(Debug, Default)]
pub struct RateMeter {
    rate: f64,
}

impl RateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, latency: Duration) -> f64 {
        let secs = latency.as_secs_f64();
        // 计时精度不足时耗时为0, 不改变速率
        if secs > 0.0 {
            self.rate = (self.rate + 1.0 / secs) / 2.0;
        }
        self.rate
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }
}

const TEXT_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_X: i32 = 0;
const TEXT_Y: i32 = 40;
const TEXT_SCALE: f32 = 28.0;

/// 在标注图左上角绘制 `fps= xx.xx`
pub struct FpsOverlay {
    font: Option<FontArc>,
    warned: bool,
}

impl FpsOverlay {
    /// 加载字体, 失败时叠加被跳过
    pub fn load(path: Option<&str>) -> Self {
        let font = path.and_then(|path| match fs::read(path) {
            Ok(bytes) => match FontArc::try_from_vec(bytes) {
                Ok(font) => {
                    log::info!("🔤 帧率叠加字体: {}", path);
                    Some(font)
                }
                Err(e) => {
                    log::warn!("⚠️  字体解析失败 {}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                log::warn!("⚠️  字体读取失败 {}: {}", path, e);
                None
            }
        });
        Self { font, warned: false }
    }

    pub fn disabled() -> Self {
        Self {
            font: None,
            warned: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw(&mut self, image: &mut RgbImage, rate: f64) {
        match &self.font {
            Some(font) => {
                let text = format!("fps= {:.2}", rate);
                draw_text_mut(image, TEXT_COLOR, TEXT_X, TEXT_Y, PxScale::from(TEXT_SCALE), font, &text);
            }
            None if !self.warned => {
                log::warn!("⚠️  未配置字体, 跳过帧率叠加 (--font)");
                self.warned = true;
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_running_average() {
        let mut meter = RateMeter::new();
        // 耗时0.5s: (0 + 2) / 2 = 1
        assert!((meter.update(Duration::from_millis(500)) - 1.0).abs() < 1e-9);
        // 耗时0.25s: (1 + 4) / 2 = 2.5
        assert!((meter.update(Duration::from_millis(250)) - 2.5).abs() < 1e-9);
        assert!((meter.rate() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_rate_ignores_zero_latency() {
        let mut meter = RateMeter::new();
        assert_eq!(meter.update(Duration::ZERO), 0.0);
        meter.update(Duration::from_millis(100));
        assert!((meter.update(Duration::ZERO) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlay_without_font_leaves_image() {
        let mut overlay = FpsOverlay::load(None);
        assert!(!overlay.is_enabled());
        let mut image = RgbImage::new(16, 16);
        overlay.draw(&mut image, 12.5);
        overlay.draw(&mut image, 12.5);
        assert!(image.pixels().all(|p| p.0 == [0, 0, 0]));
    }

    #[test]
    fn test_overlay_missing_font_file() {
        let overlay = FpsOverlay::load(Some("/nonexistent/font.ttf"));
        assert!(!overlay.is_enabled());
    }
}
