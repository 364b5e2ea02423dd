// 人脸库比对 (参考实现)
// 每张登记照片计算一个64位平均哈希指纹, 裁剪图与任一指纹汉明距离不超过阈值即视为匹配

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, RgbImage};
use log::{info, warn};

use super::FaceVerifier;

/// 指纹边长 (8x8 = 64位)
const HASH_SIDE: u32 = 8;

pub struct GalleryVerifier {
    entries: Vec<(String, u64)>,
    max_distance: u32,
}

impl GalleryVerifier {
    pub fn new(max_distance: u32) -> Self {
        Self {
            entries: Vec::new(),
            max_distance,
        }
    }

    /// 加载目录下所有可解码的图片
    pub fn load(dir: &Path, max_distance: u32) -> Result<Self> {
        let mut gallery = Self::new(max_distance);
        let mut paths: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("failed to read gallery {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            match image::open(&path) {
                Ok(img) => {
                    let name = path
                        .file_stem()
                        .map(|s| s.to_string_lossy().to_string())
                        .unwrap_or_default();
                    gallery.enroll(name, &img.to_rgb8());
                }
                Err(e) => warn!("⚠️ 跳过无法解码的登记照片 {}: {}", path.display(), e),
            }
        }
        info!("✅ 人脸库加载完成: {} 人", gallery.len());
        Ok(gallery)
    }

    pub fn enroll(&mut self, name: String, face: &RgbImage) {
        self.entries.push((name, average_hash(face)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 距离最近的登记人员及汉明距离
    pub fn nearest(&self, face: &RgbImage) -> Option<(&str, u32)> {
        let hash = average_hash(face);
        self.entries
            .iter()
            .map(|(name, h)| (name.as_str(), (hash ^ h).count_ones()))
            .min_by_key(|(_, d)| *d)
    }
}

impl FaceVerifier for GalleryVerifier {
    fn verify(&mut self, face: &RgbImage) -> Result<bool> {
        Ok(self
            .nearest(face)
            .is_some_and(|(_, distance)| distance <= self.max_distance))
    }
}

/// 平均哈希: 缩放到8x8灰度, 高于均值的像素记1
pub fn average_hash(img: &RgbImage) -> u64 {
    let gray = imageops::grayscale(img);
    let small = imageops::resize(&gray, HASH_SIDE, HASH_SIDE, imageops::FilterType::Triangle);
    let pixels: Vec<u32> = small.pixels().map(|p| p.0[0] as u32).collect();
    let mean = pixels.iter().sum::<u32>() / pixels.len().max(1) as u32;
    pixels
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > mean)
        .fold(0u64, |acc, (i, _)| acc | (1 << i))
}
