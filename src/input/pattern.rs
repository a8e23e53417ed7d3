//! 合成测试画面 - 无需摄像头/视频文件即可驱动整条流水线
//!
//! 第 i 帧 (从0开始) 的蓝色通道恒为 `i % 256`, 便于核对帧顺序。

use image::{Rgb, RgbImage};

use super::VideoSource;
use crate::error::{PipelineError, Result};

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;

pub struct PatternSource {
    total: u64, // 0 = 无限
    produced: u64,
    width: u32,
    height: u32,
}

impl PatternSource {
    pub fn new(total: u64, width: u32, height: u32) -> Self {
        Self {
            total,
            produced: 0,
            width,
            height,
        }
    }

    /// 解析 `<帧数>[@<宽>x<高>]`
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| PipelineError::source_open(format!("pattern:{}", spec), reason);

        let (count, size) = match spec.split_once('@') {
            Some((count, size)) => (count, Some(size)),
            None => (spec, None),
        };
        let total = count
            .trim()
            .parse::<u64>()
            .map_err(|_| invalid("帧数不是整数"))?;

        let (width, height) = match size {
            Some(size) => {
                let (w, h) = size.split_once('x').ok_or_else(|| invalid("尺寸格式应为 <宽>x<高>"))?;
                let w = w.trim().parse::<u32>().map_err(|_| invalid("宽度不是整数"))?;
                let h = h.trim().parse::<u32>().map_err(|_| invalid("高度不是整数"))?;
                if w == 0 || h == 0 {
                    return Err(invalid("尺寸不能为0"));
                }
                (w, h)
            }
            None => (DEFAULT_WIDTH, DEFAULT_HEIGHT),
        };

        Ok(Self::new(total, width, height))
    }
}

impl VideoSource for PatternSource {
    fn read(&mut self) -> Result<Option<RgbImage>> {
        if self.total != 0 && self.produced >= self.total {
            return Ok(None);
        }
        let index = self.produced;
        self.produced += 1;

        let image = RgbImage::from_fn(self.width, self.height, |x, y| pattern_pixel(index, x, y));
        Ok(Some(image))
    }

    fn describe(&self) -> String {
        if self.total == 0 {
            format!("合成画面 {}x{} (无限)", self.width, self.height)
        } else {
            format!("合成画面 {}x{} ({}帧)", self.width, self.height, self.total)
        }
    }
}

/// 第 `index` 帧的像素: 红绿为随帧平移的渐变, 蓝色为帧序号标记
fn pattern_pixel(index: u64, x: u32, y: u32) -> Rgb<u8> {
    // 每帧平移4个像素, 64帧一个周期
    let shift = (index % 64) as u32 * 4;
    let marker = (index % 256) as u8;
    Rgb([((x % 256 + shift) % 256) as u8, ((y % 256 + shift) % 256) as u8, marker])
}
