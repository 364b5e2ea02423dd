//! 定长滑动窗口 + 片段帧预处理

use std::collections::VecDeque;

use anyhow::Result;
use fast_image_resize as fr;
use image::RgbImage;
use ndarray::Array3;

/// 预处理后的片段帧: [size, size, 3], 像素归一化到 0-1
pub type ClipFrame = Array3<f32>;

/// 定长FIFO, 满了之后推入新元素会挤出最旧的元素
#[derive(Clone, Debug)]
pub struct BoundedWindow<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedWindow<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 推入新元素, 返回被挤出的最旧元素
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// 从旧到新遍历
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

/// 缩放到 size x size 并归一化
pub fn preprocess_clip(frame: &RgbImage, size: u32) -> Result<ClipFrame> {
    let src = fr::images::Image::from_vec_u8(
        frame.width(),
        frame.height(),
        frame.as_raw().clone(),
        fr::PixelType::U8x3,
    )?;
    let mut dst = fr::images::Image::new(size, size, fr::PixelType::U8x3);

    let mut resizer = fr::Resizer::new();
    resizer.resize(
        &src,
        &mut dst,
        &fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(fr::FilterType::Bilinear)),
    )?;

    let side = size as usize;
    let data: Vec<f32> = dst.buffer().iter().map(|&v| v as f32 / 255.0).collect();
    Ok(Array3::from_shape_vec((side, side, 3), data)?)
}
