/// 目标识别统计 (无界面模式)
///
/// 启动后立即开始识别, 统计变化与状态变化输出到日志。
/// 结束条件: 达到自动结束阈值 / 检测结果全部处理完 / Ctrl+C
use anyhow::Context;
use clap::Parser;

use detect_tally::config::{AppConfig, Args};
use detect_tally::detection::load_detector;
use detect_tally::presenter::{Presenter, RowChange, Surface, TickReport};
use detect_tally::Pipeline;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 日志界面
struct LogSurface;

impl Surface for LogSurface {
    fn present(&mut self, presenter: &Presenter, report: &TickReport) {
        for change in &report.tally_changes {
            match change {
                RowChange::Insert { row, .. } | RowChange::Update { row, .. } => {
                    log::info!("📊 {} | {}", row.id_text(), row.count_text());
                }
                RowChange::Remove { label } => log::info!("📊 移除 {}", label),
            }
        }
        if report.status_changed {
            log::info!(
                "🔔 状态: {} (已处理 {} 个结果, 速率 {:.2})",
                presenter.status().text(),
                presenter.processed(),
                presenter.rate()
            );
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(&args.config);
    args.apply_to(&mut config);
    config.print_summary();

    let detector = load_detector(&config.model).context("加载检测模型失败")?;
    let (pipeline, mut presenter) = Pipeline::start(&config, detector).context("启动流水线失败")?;

    let cancel = pipeline.cancel_token();
    let ctrlc_cancel = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("🛑 收到 Ctrl+C");
        ctrlc_cancel.cancel();
    })
    .context("注册 Ctrl+C 处理失败")?;

    if !presenter.start() {
        log::warn!("⚠️  无法开始识别: {}", presenter.status().text());
    }

    let mut surface = LogSurface;
    let tick = config.tick();
    loop {
        let report = presenter.tick();
        surface.present(&presenter, &report);

        if presenter.is_finished() || presenter.detection_drained() {
            break;
        }
        if cancel.wait_timeout(tick) {
            break;
        }
    }

    println!();
    println!("识别统计:");
    for (label, count) in presenter.tally().iter() {
        println!("  {:<12} {}", label, count);
    }
    println!("  合计: {}", presenter.tally().total());

    pipeline.shutdown(presenter);
    Ok(())
}
