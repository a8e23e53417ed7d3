use std::time::{Duration, Instant};

use detect_tally::config::{AppConfig, ModelConfig};
use detect_tally::detection::{load_detector, ScriptedDetector};
use detect_tally::presenter::{Consumed, DisplayMode, Presenter, StatusLabel};
use detect_tally::Pipeline;
use image::{Rgb, RgbImage};

fn labels(script: &[&[&str]]) -> Vec<Vec<String>> {
    script
        .iter()
        .map(|frame| frame.iter().map(|s| s.to_string()).collect())
        .collect()
}

fn fast_config(source: &str) -> AppConfig {
    AppConfig {
        source: source.to_string(),
        frame_interval_ms: 1,
        poll_interval_ms: 5,
        frame_queue_capacity: 8,
        result_queue_capacity: 8,
        finish_threshold: None,
        output_width: 36,
        output_height: 64,
        ..AppConfig::default()
    }
}

/// tick直到条件满足或超时, 返回取到的检测结果
fn tick_until(presenter: &mut Presenter, done: impl Fn(&Presenter) -> bool) -> Vec<(u64, Vec<String>)> {
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut consumed = Vec::new();
    while !done(presenter) && Instant::now() < deadline {
        let report = presenter.tick();
        if let Some(Consumed::Result { seq, labels, .. }) = report.consumed {
            consumed.push((seq, labels));
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    consumed
}

#[test]
fn test_end_to_end_tally() {
    let config = fast_config("pattern:5@16x16");
    let script = labels(&[&["CA001"], &["CA001", "CB002"], &[], &["CD004"], &["CA001"]]);
    let detector = ScriptedDetector::new(script.clone());
    let (pipeline, mut presenter) = Pipeline::start(&config, Box::new(detector)).unwrap();
    assert!(presenter.start());

    let consumed = tick_until(&mut presenter, |p| p.detection_drained());

    // 结果按帧序号依次到达, 与各自的帧配对
    let seqs: Vec<u64> = consumed.iter().map(|(seq, _)| *seq).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
    for (seq, labels) in &consumed {
        assert_eq!(labels, &script[(*seq - 1) as usize]);
    }

    assert_eq!(presenter.processed(), 5);
    assert_eq!(presenter.tally().len(), 1);
    assert_eq!(presenter.tally().get("CA001"), Some(1));
    assert_eq!(presenter.board().rows().len(), 1);
    assert_eq!(presenter.mode(), DisplayMode::Annotated);
    assert!(presenter.canvas().map_or(false, |c| c.width == 36 && c.height == 64));

    let summary = pipeline.shutdown(presenter);
    assert_eq!(summary.frames, Some(5));
    assert_eq!(summary.results, Some(5));
}

#[test]
fn test_auto_finish_returns_to_raw() {
    let config = AppConfig {
        finish_threshold: Some(2),
        ..fast_config("pattern:0@8x8")
    };
    let detector = ScriptedDetector::new(labels(&[&["CA001"], &["CB002"]])).cycling();
    let (pipeline, mut presenter) = Pipeline::start(&config, Box::new(detector)).unwrap();
    assert!(presenter.start());

    tick_until(&mut presenter, |p| p.is_finished());

    assert!(presenter.is_finished());
    assert_eq!(presenter.processed(), 3);
    assert_eq!(presenter.mode(), DisplayMode::Raw);
    assert_eq!(presenter.status(), StatusLabel::Finished);
    assert!(!presenter.start());

    // 结束后继续显示原始画面
    let consumed_frame = {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = false;
        while !seen && Instant::now() < deadline {
            seen = matches!(presenter.tick().consumed, Some(Consumed::Frame { .. }));
            std::thread::sleep(Duration::from_millis(2));
        }
        seen
    };
    assert!(consumed_frame);
    assert_eq!(presenter.processed(), 3);

    pipeline.shutdown(presenter);
}

#[test]
fn test_image_directory_with_json_script() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..3u8 {
        let img = RgbImage::from_pixel(12, 10, Rgb([i * 40, 0, 0]));
        img.save(dir.path().join(format!("frame_{:03}.png", i))).unwrap();
    }
    let script_path = dir.path().join("script.json");
    std::fs::write(&script_path, r#"[["CA001","CA001"],["CB002"],["CA001","CC003"]]"#).unwrap();

    let mut config = fast_config(dir.path().to_str().unwrap());
    config.model = ModelConfig {
        path: script_path.to_str().unwrap().to_string(),
        ..ModelConfig::default()
    };

    let detector = load_detector(&config.model).unwrap();
    let (pipeline, mut presenter) = Pipeline::start(&config, detector).unwrap();
    assert!(presenter.start());

    tick_until(&mut presenter, |p| p.detection_drained());

    assert_eq!(presenter.processed(), 3);
    assert_eq!(presenter.tally().get("CA001"), Some(1));
    assert_eq!(presenter.tally().get("CC003"), Some(1));
    assert_eq!(presenter.tally().get("CB002"), None);
    assert!(presenter.source_done());

    pipeline.shutdown(presenter);
}
