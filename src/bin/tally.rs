/// 目标识别统计 (图形界面)
///
/// 系统架构:
/// 1. 读帧线程: 视频解码, 原始帧送预览队列, 采样帧送检测队列
/// 2. 检测线程: 目标检测, 结果送结果队列
/// 3. 主线程:   按固定周期tick, 渲染画面与统计面板 (macroquad事件循环)
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use macroquad::prelude::*;

use detect_tally::config::{AppConfig, Args};
use detect_tally::detection::load_detector;
use detect_tally::presenter::{Presenter, Surface};
use detect_tally::renderer::TallyWindow;
use detect_tally::Pipeline;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn window_conf() -> Conf {
    Conf {
        window_title: "目标识别统计".to_owned(),
        window_width: 800,
        window_height: 680,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("❌ {:#}", e);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut config = AppConfig::load(&args.config);
    args.apply_to(&mut config);
    config.print_summary();

    let detector = load_detector(&config.model).context("加载检测模型失败")?;
    let (pipeline, mut presenter) = Pipeline::start(&config, detector).context("启动流水线失败")?;
    let mut window = TallyWindow::new(config.font_path.as_deref());

    // 关闭窗口时先停止工作线程
    prevent_quit();

    let tick = config.tick();
    let mut last_tick: Option<Instant> = None;
    loop {
        if is_quit_requested() || is_key_pressed(KeyCode::Escape) {
            break;
        }

        if window.take_start_request() {
            presenter.start();
        }

        if last_tick.map_or(true, |t| t.elapsed() >= tick) {
            last_tick = Some(Instant::now());
            let report = presenter.tick();
            window.present(&presenter, &report);
        }

        window.draw(&presenter);
        next_frame().await;
    }

    shutdown(pipeline, presenter);
    Ok(())
}

fn shutdown(pipeline: Pipeline, presenter: Presenter) {
    let processed = presenter.processed();
    let summary = pipeline.shutdown(presenter);
    log::info!(
        "👋 退出 (已处理 {} 个结果, 读帧 {:?})",
        processed,
        summary.frames
    );
}
