//! 画布: 缩放到固定输出尺寸 (fast_image_resize 双线性) 并转换为RGBA

use fast_image_resize as fr;
use image::RgbImage;

use crate::error::{PipelineError, Result};

/// 最近一次显示的画面 (RGBA)
#[derive(Clone, Debug)]
pub struct CanvasImage {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

pub struct CanvasScaler {
    resizer: fr::Resizer,
    width: u32,
    height: u32,
}

impl CanvasScaler {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resizer: fr::Resizer::new(),
            width,
            height,
        }
    }

    pub fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn render(&mut self, seq: u64, image: &RgbImage) -> Result<CanvasImage> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(PipelineError::Canvas(format!("空图像 {}x{}", w, h)));
        }

        let rgb = if (w, h) == (self.width, self.height) {
            image.as_raw().clone()
        } else {
            let src = fr::images::Image::from_vec_u8(w, h, image.as_raw().clone(), fr::PixelType::U8x3)
                .map_err(|e| PipelineError::Canvas(e.to_string()))?;
            let mut dst = fr::images::Image::new(self.width, self.height, fr::PixelType::U8x3);
            self.resizer
                .resize(
                    &src,
                    &mut dst,
                    &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
                )
                .map_err(|e| PipelineError::Canvas(e.to_string()))?;
            dst.buffer().to_vec()
        };

        // RGB → RGBA (纹理格式)
        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for chunk in rgb.chunks_exact(3) {
            rgba.extend_from_slice(chunk);
            rgba.push(255);
        }

        Ok(CanvasImage {
            seq,
            width: self.width,
            height: self.height,
            rgba,
        })
    }
}
