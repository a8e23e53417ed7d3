/// 图形界面 (macroquad + egui)
///
/// 左侧画布显示原始画面或检测结果, 右侧是统计面板。
/// 画面纹理只在尺寸变化时重建, 否则原地更新像素。
mod tally_panel;

use std::fs;
use std::time::Instant;

use egui_macroquad::egui;
use macroquad::prelude::*;

use crate::presenter::{Presenter, Surface, TickReport};

pub use tally_panel::TallyPanel;

pub struct TallyWindow {
    texture: Option<Texture2D>,
    panel: TallyPanel,
    start_requested: bool,
    render_count: u64,
    render_last: Instant,
    render_fps: f64,
}

impl TallyWindow {
    pub fn new(font_path: Option<&str>) -> Self {
        log::info!("🎨 渲染器启动");
        if let Some(path) = font_path {
            load_chinese_font(path);
        } else {
            log::warn!("⚠️  未配置中文字体 (--font), 面板中文可能无法显示");
        }

        Self {
            texture: None,
            panel: TallyPanel::new(),
            start_requested: false,
            render_count: 0,
            render_last: Instant::now(),
            render_fps: 0.0,
        }
    }

    /// 取出并清除界面上的开始命令
    pub fn take_start_request(&mut self) -> bool {
        std::mem::take(&mut self.start_requested)
    }

    pub fn render_fps(&self) -> f64 {
        self.render_fps
    }

    fn update_texture(&mut self, presenter: &Presenter) {
        let Some(canvas) = presenter.canvas() else {
            return;
        };

        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != canvas.width as f32 || tex.height() != canvas.height as f32,
            None => true,
        };

        if needs_rebuild {
            let texture = Texture2D::from_rgba8(canvas.width as u16, canvas.height as u16, &canvas.rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            let img = Image {
                bytes: canvas.rgba.clone(),
                width: canvas.width as u16,
                height: canvas.height as u16,
            };
            tex.update(&img);
        }
    }

    pub fn draw(&mut self, presenter: &Presenter) {
        clear_background(GRAY);

        if let Some(texture) = &self.texture {
            draw_texture_ex(
                texture,
                0.0,
                0.0,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(texture.width(), texture.height())),
                    ..Default::default()
                },
            );
        }

        let status = presenter.status();
        let rate = presenter.rate();
        let processed = presenter.processed();
        let mut clicked = false;
        egui_macroquad::ui(|egui_ctx| {
            clicked = self.panel.show(egui_ctx, status, rate, processed);
        });
        egui_macroquad::draw();
        if clicked {
            self.start_requested = true;
        }

        self.render_count += 1;
        let elapsed = self.render_last.elapsed().as_secs_f64();
        if elapsed >= 1.0 {
            self.render_fps = self.render_count as f64 / elapsed;
            self.render_count = 0;
            self.render_last = Instant::now();
        }
    }
}

impl Surface for TallyWindow {
    fn present(&mut self, presenter: &Presenter, report: &TickReport) {
        if report.canvas_updated {
            self.update_texture(presenter);
        }
        if !report.tally_changes.is_empty() {
            self.panel.apply(&report.tally_changes);
        }
        if report.status_changed {
            log::info!("🔔 状态: {}", presenter.status().text());
        }
    }
}

/// egui默认字体不含中文, 追加到字体列表最前
fn load_chinese_font(path: &str) {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::warn!("⚠️  中文字体加载失败 {}: {}", path, e);
            return;
        }
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("chinese".to_owned(), egui::FontData::from_owned(bytes).into());
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .insert(0, "chinese".to_owned());
    }
    egui_macroquad::cfg(|egui_ctx| egui_ctx.set_fonts(fonts));
    log::info!("✅ 中文字体加载成功: {}", path);
}
