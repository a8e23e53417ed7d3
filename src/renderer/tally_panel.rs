use egui_macroquad::egui;

use crate::presenter::{RowChange, StatusLabel, TallyRow, PANEL_TITLE};

const TITLE_COLOR: egui::Color32 = egui::Color32::from_rgb(200, 100, 0);
const ROW_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 0, 255);
const STATUS_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 0, 0);

/// 统计面板 (识别结果输出区 + 状态 + 开始按钮)
pub struct TallyPanel {
    rows: Vec<TallyRow>, // 已渲染的行, 只按变化增量更新
}

impl TallyPanel {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    pub fn apply(&mut self, changes: &[RowChange]) {
        for change in changes {
            change.apply_to(&mut self.rows);
        }
    }

    pub fn rows(&self) -> &[TallyRow] {
        &self.rows
    }

    fn set_style(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.window_fill = egui::Color32::from_gray(128);
        visuals.panel_fill = egui::Color32::from_gray(128);
        visuals.widgets.noninteractive.corner_radius = 0.0.into();
        visuals.widgets.inactive.corner_radius = 0.0.into();
        visuals.widgets.hovered.corner_radius = 0.0.into();
        visuals.widgets.active.corner_radius = 0.0.into();
        ctx.set_visuals(visuals);
    }

    /// 绘制面板, 返回是否点击了开始
    pub fn show(&mut self, ctx: &egui::Context, status: StatusLabel, rate: f64, processed: u32) -> bool {
        self.set_style(ctx);
        let mut start_clicked = false;

        egui::SidePanel::right("tally_panel")
            .exact_width(400.0)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(egui::RichText::new(PANEL_TITLE).size(20.0).strong().color(TITLE_COLOR));
                ui.add_space(6.0);

                egui::Grid::new("tally_rows")
                    .num_columns(2)
                    .min_col_width(120.0)
                    .show(ui, |ui| {
                        for row in &self.rows {
                            ui.colored_label(ROW_COLOR, row.id_text());
                            ui.colored_label(ROW_COLOR, row.count_text());
                            ui.end_row();
                        }
                    });

                ui.with_layout(egui::Layout::bottom_up(egui::Align::RIGHT), |ui| {
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        ui.label(egui::RichText::new(status.text()).size(20.0).color(STATUS_COLOR));
                        ui.add_space(10.0);
                        let button = egui::Button::new(egui::RichText::new("开始").size(18.0));
                        if ui.add_enabled(status == StatusLabel::Idle, button).clicked() {
                            start_clicked = true;
                        }
                    });
                    ui.label(format!("检测速率: {:.2} | 已处理: {}", rate, processed));
                });
            });

        start_clicked
    }
}

impl Default for TallyPanel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::{Tally, TallyBoard};

    #[test]
    fn test_panel_follows_board() {
        let mut board = TallyBoard::new(20);
        let mut panel = TallyPanel::new();
        for labels in [&["CA001", "CB002"][..], &["CB002", "CB002"][..], &["CC003"][..]] {
            panel.apply(&board.apply(&Tally::from_labels(labels)));
            assert_eq!(panel.rows(), board.rows());
        }
    }
}
