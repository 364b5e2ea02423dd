//! 帧标注: 身份框 + TrackID 标签 + 暴力告警横幅

use std::fs;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::{info, warn};

use crate::detection::BBox;
use crate::violence::ViolenceSignal;

/// 框线宽度 (像素)
const BOX_THICKNESS: i32 = 2;
const LABEL_SCALE: f32 = 20.0;
/// 画面外保留的绘制余量 (大于标签偏移+标签宽度)
const OFFSCREEN_MARGIN: i32 = 64;
const BANNER_HEIGHT: u32 = 32;
const ALERT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// 帧标注器; 没有字体时只画框不写字
pub struct Overlay {
    font: Option<FontVec>,
}

impl Overlay {
    pub fn new(font_path: Option<&str>) -> Self {
        let font = font_path.and_then(|path| match fs::read(path) {
            Ok(data) => match FontVec::try_from_vec(data) {
                Ok(font) => {
                    info!("✅ 字体加载成功: {}", path);
                    Some(font)
                }
                Err(e) => {
                    warn!("⚠️ 字体解析失败 {}: {}", path, e);
                    None
                }
            },
            Err(e) => {
                warn!("⚠️ 字体文件读取失败 {}: {}", path, e);
                None
            }
        });
        Self { font }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// 画身份框, 标签写在框左上角外侧
    pub fn draw_identity(&self, frame: &mut RgbImage, bbox: &BBox, label: &str, color: Rgb<u8>) {
        let (w, h) = frame.dimensions();
        let x1 = clamp_coord(bbox.x1, w);
        let y1 = clamp_coord(bbox.y1, h);
        let x2 = clamp_coord(bbox.x2, w);
        let y2 = clamp_coord(bbox.y2, h);

        for inset in 0..BOX_THICKNESS {
            let w = x2 - x1 - 2 * inset;
            let h = y2 - y1 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(x1 + inset, y1 + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(frame, rect, color);
        }

        if let Some(font) = &self.font {
            draw_text_mut(
                frame,
                color,
                x1 - 10,
                y1 - 10,
                PxScale::from(LABEL_SCALE),
                font,
                label,
            );
        }
    }

    /// 告警期间在画面顶部画红色横幅
    pub fn draw_alert(&self, frame: &mut RgbImage, label: &str, signal: &ViolenceSignal) {
        if !signal.violence_detected || frame.width() == 0 || frame.height() == 0 {
            return;
        }

        let height = BANNER_HEIGHT.min(frame.height());
        draw_filled_rect_mut(frame, Rect::at(0, 0).of_size(frame.width(), height), ALERT_COLOR);

        if let Some(font) = &self.font {
            let text = format!("{} {:.0}%", label, signal.confidence);
            draw_text_mut(
                frame,
                TEXT_COLOR,
                8,
                4,
                PxScale::from(LABEL_SCALE),
                font,
                &text,
            );
        }
    }
}

/// 坐标限制在画面外扩 `OFFSCREEN_MARGIN` 的范围内, 画面外的边和标签仍留在画面外
fn clamp_coord(v: f32, limit: u32) -> i32 {
    let margin = OFFSCREEN_MARGIN as i64;
    (v as i64).clamp(-margin, limit as i64 + margin) as i32
}
