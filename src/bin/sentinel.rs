// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// 离线处理程序 - 读取帧目录, 逐帧核验身份并检测暴力行为, 输出标注帧
///
/// 两线程架构:
/// - Reader:    按文件名顺序读取编码帧 (独立线程)
/// - Processor: 逐帧流水线 + 写出结果 (主线程)
///
/// 直接运行: cargo run --bin sentinel --release -- --frames frames/ --detections dets.jsonl
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info, warn};
use serde::Serialize;

use sentinel_rs::detection::ByteTracker;
use sentinel_rs::models::{GalleryVerifier, MotionEnergyClassifier, ReplayDetector};
use sentinel_rs::{gen_time_string, Args, FrameProcessor, PipelineConfig, SharedModels, ViolenceSignal};

/// 读取线程 → 处理线程 的帧缓冲
const FRAME_QUEUE_SIZE: usize = 8;

/// 读取线程发出的编码帧
struct EncodedFrame {
    index: usize,
    name: String,
    bytes: Vec<u8>,
}

/// 每帧一行的暴力信号记录
#[derive(Serialize)]
struct SignalLine<'a> {
    frame: usize,
    name: &'a str,
    #[serde(flatten)]
    signal: &'a ViolenceSignal,
    timestamp: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = PipelineConfig::load(&args.config);
    if args.font.is_some() {
        config.font_path = args.font.clone();
    }
    config.validate()?;
    config.print_summary();

    // 模型
    let detector = ReplayDetector::load(&args.detections)?;
    info!("📦 检测结果回放: {} 帧", detector.remaining());
    let gallery = match &args.gallery {
        Some(dir) => GalleryVerifier::load(dir, args.face_distance)?,
        None => {
            warn!("⚠️ 未指定人脸库, 所有身份都将核验失败");
            GalleryVerifier::new(args.face_distance)
        }
    };
    let models = SharedModels {
        detector: Arc::new(Mutex::new(detector)),
        face: Arc::new(Mutex::new(gallery)),
        violence: Arc::new(Mutex::new(MotionEnergyClassifier::default())),
    };
    let tracker = Box::new(ByteTracker::from_config(&config));
    let mut processor = FrameProcessor::new(&config, models, tracker);

    // 输入帧
    let mut paths: Vec<PathBuf> = fs::read_dir(&args.frames)
        .with_context(|| format!("failed to read frames from {}", args.frames.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    info!("🎞️ 输入帧: {} 个", paths.len());

    fs::create_dir_all(&args.output)
        .with_context(|| format!("failed to create {}", args.output.display()))?;
    let mut signals = match &args.signals {
        Some(path) => Some(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => None,
    };

    // 读取线程
    let (tx, rx) = bounded::<EncodedFrame>(FRAME_QUEUE_SIZE);
    let reader = thread::spawn(move || {
        for (index, path) in paths.into_iter().enumerate() {
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| format!("{:06}", index));
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("⚠️ 读取失败 {}: {}", path.display(), e);
                    continue;
                }
            };
            if tx.send(EncodedFrame { index, name, bytes }).is_err() {
                break;
            }
        }
    });

    // 处理
    let start = Instant::now();
    let (mut processed, mut failed, mut alerts) = (0usize, 0usize, 0usize);
    for frame in rx {
        let output = match processor.process_frame_with_signal(&frame.bytes) {
            Ok(output) => output,
            Err(e) => {
                error!("❌ 第 {} 帧 ({}) 处理失败: {}", frame.index, frame.name, e);
                failed += 1;
                continue;
            }
        };

        let out_path = args.output.join(format!("{}.jpg", frame.name));
        fs::write(&out_path, &output.encoded)
            .with_context(|| format!("failed to write {}", out_path.display()))?;

        if output.signal.violence_detected {
            alerts += 1;
        }
        if let Some(writer) = signals.as_mut() {
            let line = SignalLine {
                frame: frame.index,
                name: &frame.name,
                signal: &output.signal,
                timestamp: gen_time_string("-"),
            };
            serde_json::to_writer(&mut *writer, &line)?;
            writer.write_all(b"\n")?;
        }
        processed += 1;
    }

    if reader.join().is_err() {
        error!("❌ 读取线程异常退出");
    }
    if let Some(mut writer) = signals {
        writer.flush()?;
    }

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "✅ 处理完成: {} 帧成功, {} 帧失败, {} 帧告警, 耗时 {:.2}s ({:.1} FPS)",
        processed,
        failed,
        alerts,
        elapsed,
        processed as f64 / elapsed.max(1e-6)
    );
    Ok(())
}
