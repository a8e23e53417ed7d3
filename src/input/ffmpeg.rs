/// FFmpeg解码输入 (视频文件 / RTSP / 摄像头设备)
///
/// FFmpeg在自己的线程中解码, 过滤器把 YUV420P 帧转成RGB后经有界通道交给读帧线程。
/// 通道满时解码线程等待, 解码节奏跟随读帧节奏。
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{Receiver, RecvError, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Frame, Input};
use image::RgbImage;

use super::VideoSource;
use crate::error::{PipelineError, Result};
use crate::pipeline::CancelToken;

/// 解码线程与读帧线程之间的缓冲帧数
const DECODED_BUFFER: usize = 2;
const MAX_DIMENSION: u32 = 4096;

enum Decoded {
    Image(RgbImage),
    Failed(String),
}

pub struct FfmpegSource {
    url: String,
    frames: Receiver<Decoded>,
    stop: Arc<AtomicBool>,
    cancel: Option<CancelToken>,
}

impl FfmpegSource {
    pub fn open(url: &str) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::bounded(DECODED_BUFFER);
        let stop = Arc::new(AtomicBool::new(false));
        let filter = DecodeFilter::new(tx.clone(), stop.clone());

        let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
        let pipe = pipe.filter("decode", Box::new(filter));
        let out = create_null_output().add_frame_pipeline(pipe);

        let mut input = Input::new(url);
        if url.starts_with("rtsp://") {
            input = input.set_input_opts([("rtsp_transport", "tcp"), ("rtsp_flags", "prefer_tcp")].into());
        }

        let ctx = FfmpegContext::builder()
            .input(input)
            .filter_descs(["format=yuv420p"].into())
            .output(out)
            .build()
            .map_err(|e| PipelineError::source_open(url, format!("构建失败: {}", e)))?;

        let sch = ctx
            .start()
            .map_err(|e| PipelineError::source_open(url, format!("启动失败: {}", e)))?;
        log::info!("🎬 FFmpeg解码启动: {}", url);

        // 等待FFmpeg结束; 异常退出时通知读帧线程
        let name = url.to_string();
        thread::Builder::new()
            .name("ffmpeg-wait".to_string())
            .spawn(move || {
                if let Err(e) = sch.wait() {
                    log::warn!("⚠️  FFmpeg退出异常 ({}): {}", name, e);
                    let _ = tx.send(Decoded::Failed(e.to_string()));
                }
            })?;

        Ok(Self {
            url: url.to_string(),
            frames: rx,
            stop,
            cancel: None,
        })
    }
}

impl VideoSource for FfmpegSource {
    /// 网络流卡住时解码线程不再产出帧, 等待新帧的同时监听取消信号
    fn read(&mut self) -> Result<Option<RgbImage>> {
        let Some(cancel) = &self.cancel else {
            return into_frame(self.frames.recv());
        };
        crossbeam_channel::select! {
            recv(self.frames) -> msg => into_frame(msg),
            recv(cancel.signal()) -> _ => {
                self.stop.store(true, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn describe(&self) -> String {
        format!("FFmpeg {}", self.url)
    }

    fn watch_cancel(&mut self, cancel: &CancelToken) {
        self.cancel = Some(cancel.clone());
    }
}

fn into_frame(msg: std::result::Result<Decoded, RecvError>) -> Result<Option<RgbImage>> {
    match msg {
        Ok(Decoded::Image(image)) => Ok(Some(image)),
        Ok(Decoded::Failed(reason)) => Err(PipelineError::SourceRead(reason)),
        // 过滤器与等待线程都已退出
        Err(_) => Ok(None),
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// FFmpeg解码过滤器: YUV420P帧 → RgbImage
struct DecodeFilter {
    tx: Option<Sender<Decoded>>,
    stop: Arc<AtomicBool>,
    count: usize,
    total_frames: usize,
    dropped_frames: usize,
    last: Instant,
}

impl DecodeFilter {
    fn new(tx: Sender<Decoded>, stop: Arc<AtomicBool>) -> Self {
        Self {
            tx: Some(tx),
            stop,
            count: 0,
            total_frames: 0,
            dropped_frames: 0,
            last: Instant::now(),
        }
    }

    fn drop_frame(&mut self, reason: &str) {
        self.dropped_frames += 1;
        if self.total_frames <= 10 {
            log::warn!("⚠️  丢弃帧 #{}: {}", self.total_frames, reason);
        }
    }
}

impl FrameFilter for DecodeFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> std::result::Result<(), String> {
        log::debug!("✅ 解码线程启动");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: Frame,
        _ctx: &FrameFilterContext,
    ) -> std::result::Result<Option<Frame>, String> {
        if self.stop.load(Ordering::Relaxed) {
            return Err("source closed".to_string());
        }
        self.total_frames += 1;

        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.drop_frame("空帧/损坏帧");
                return Ok(None);
            }

            let raw = &*frame.as_ptr();
            let w = raw.width as u32;
            let h = raw.height as u32;
            if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                self.drop_frame(&format!("非法分辨率 {}x{}", w, h));
                return Ok(None);
            }

            let (y_plane, u_plane, v_plane) = (raw.data[0], raw.data[1], raw.data[2]);
            let y_stride = raw.linesize[0] as usize;
            let uv_stride = raw.linesize[1] as usize;
            if y_plane.is_null() || u_plane.is_null() || v_plane.is_null() {
                self.drop_frame("YUV指针为空");
                return Ok(None);
            }
            if y_stride < w as usize || uv_stride < (w as usize).div_ceil(2) {
                self.drop_frame(&format!("步长异常 y_stride={} uv_stride={}", y_stride, uv_stride));
                return Ok(None);
            }

            let mut buffer = vec![0u8; (w * h * 3) as usize];
            yuv420p_to_rgb(y_plane, u_plane, v_plane, y_stride, uv_stride, &mut buffer, w as usize, h as usize);
            RgbImage::from_raw(w, h, buffer)
        };

        let Some(image) = image else {
            self.drop_frame("缓冲区尺寸不匹配");
            return Ok(None);
        };

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 1.0 {
            let fps = self.count as f64 / self.last.elapsed().as_secs_f64();
            log::debug!(
                "📺 解码统计: {:.1}fps | 总帧{} | 丢弃{}",
                fps,
                self.total_frames,
                self.dropped_frames
            );
            self.last = Instant::now();
            self.count = 0;
        }

        match &self.tx {
            Some(tx) if tx.send(Decoded::Image(image)).is_ok() => Ok(Some(frame)),
            _ => Err("reader gone".to_string()),
        }
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        // 释放发送端, 读帧线程据此判断流结束
        self.tx.take();
        log::debug!("✅ 解码线程退出");
    }
}

/// BT.601 YUV420P → RGB24 (定点运算)
#[allow(clippy::too_many_arguments)]
#[inline]
unsafe fn yuv420p_to_rgb(
    y_plane: *const u8,
    u_plane: *const u8,
    v_plane: *const u8,
    y_stride: usize,
    uv_stride: usize,
    buffer: &mut [u8],
    width: usize,
    height: usize,
) {
    let mut out_idx = 0;
    for y in 0..height {
        let y_row = y * y_stride;
        let uv_row = (y >> 1) * uv_stride;

        for x in 0..width {
            let y_val = *y_plane.add(y_row + x) as i32;
            let u_val = *u_plane.add(uv_row + (x >> 1)) as i32 - 128;
            let v_val = *v_plane.add(uv_row + (x >> 1)) as i32 - 128;

            buffer[out_idx] = (y_val + ((v_val * 179) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 1] = (y_val - ((u_val * 44) >> 7) - ((v_val * 91) >> 7)).clamp(0, 255) as u8;
            buffer[out_idx + 2] = (y_val + ((u_val * 227) >> 7)).clamp(0, 255) as u8;
            out_idx += 3;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn stalled(tx_keepalive: &mut Vec<Sender<Decoded>>) -> FfmpegSource {
        let (tx, rx) = crossbeam_channel::bounded(DECODED_BUFFER);
        tx_keepalive.push(tx);
        FfmpegSource {
            url: "rtsp://stalled".to_string(),
            frames: rx,
            stop: Arc::new(AtomicBool::new(false)),
            cancel: None,
        }
    }

    #[test]
    fn test_cancel_unblocks_stalled_stream() {
        let mut senders = Vec::new();
        let mut source = stalled(&mut senders);
        let stop = source.stop.clone();
        let cancel = CancelToken::new();
        source.watch_cancel(&cancel);

        let reader = thread::spawn(move || source.read().map(|frame| frame.is_none()));
        thread::sleep(Duration::from_millis(30));
        assert!(!reader.is_finished());

        cancel.cancel();
        assert!(matches!(reader.join().unwrap(), Ok(true)));
        assert!(stop.load(Ordering::Relaxed));
    }

    #[test]
    fn test_decoded_frame_passes_through() {
        let mut senders = Vec::new();
        let mut source = stalled(&mut senders);
        source.watch_cancel(&CancelToken::new());
        senders[0].send(Decoded::Image(RgbImage::new(4, 2))).unwrap();
        let frame = source.read().unwrap().unwrap();
        assert_eq!(frame.dimensions(), (4, 2));

        senders[0].send(Decoded::Failed("eof".to_string())).unwrap();
        assert!(matches!(source.read(), Err(PipelineError::SourceRead(_))));
    }
}
