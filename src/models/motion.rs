// 运动能量分类器 (参考实现)
// 窗口内相邻帧的平均绝对差越大, 判为 "Violence" 的概率越高
// 输出: [P(No Violence), P(Violence)]

use anyhow::{bail, ensure, Result};
use ndarray::{array, Array1};

use super::ViolenceClassifier;
use crate::violence::ClipFrame;

pub struct MotionEnergyClassifier {
    /// 概率为0.5时的运动能量
    midpoint: f32,
    /// logistic 曲线陡峭程度
    sensitivity: f32,
}

impl Default for MotionEnergyClassifier {
    fn default() -> Self {
        Self {
            midpoint: 0.08,
            sensitivity: 40.0,
        }
    }
}

impl MotionEnergyClassifier {
    pub fn new(midpoint: f32, sensitivity: f32) -> Self {
        Self {
            midpoint,
            sensitivity,
        }
    }

    /// 相邻帧平均绝对差的均值 (像素已归一化到 0-1)
    pub fn motion_energy(window: &[&ClipFrame]) -> Result<f32> {
        if window.len() < 2 {
            bail!("motion energy needs at least 2 frames, got {}", window.len());
        }
        let mut total = 0.0;
        for pair in window.windows(2) {
            ensure!(
                pair[0].shape() == pair[1].shape(),
                "clip frame shapes differ: {:?} vs {:?}",
                pair[0].shape(),
                pair[1].shape()
            );
            let diff = (pair[1] - pair[0]).mapv(f32::abs);
            total += diff.mean().unwrap_or(0.0);
        }
        Ok(total / (window.len() - 1) as f32)
    }
}

impl ViolenceClassifier for MotionEnergyClassifier {
    fn classify(&mut self, window: &[&ClipFrame]) -> Result<Array1<f32>> {
        let energy = Self::motion_energy(window)?;
        let p = 1.0 / (1.0 + (-self.sensitivity * (energy - self.midpoint)).exp());
        Ok(array![1.0 - p, p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_static_window_is_calm() {
        let frame = Array3::<f32>::from_elem((8, 8, 3), 0.5);
        let window = vec![&frame; 13];
        let probs = MotionEnergyClassifier::default().classify(&window).unwrap();
        assert!(probs[0] > probs[1]);
        assert!((probs.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_flicker_window_is_violent() {
        let dark = Array3::<f32>::zeros((8, 8, 3));
        let bright = Array3::<f32>::ones((8, 8, 3));
        let window: Vec<&ClipFrame> = (0..13)
            .map(|i| if i % 2 == 0 { &dark } else { &bright })
            .collect();
        let probs = MotionEnergyClassifier::default().classify(&window).unwrap();
        assert!(probs[1] > 0.99);
    }

    #[test]
    fn test_single_frame_rejected() {
        let frame = Array3::<f32>::zeros((8, 8, 3));
        assert!(MotionEnergyClassifier::default().classify(&[&frame]).is_err());
    }
}
