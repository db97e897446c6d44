use dxf2fcs_core::geometry::Point3;
use glam::{DMat3, DVec3};
use tracing::debug;

use crate::errors::EngineError;

/// 局部坐标到父坐标的映射：`p ↦ linear·p + translation`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformFrame {
    pub linear: DMat3,
    pub translation: DVec3,
}

impl TransformFrame {
    pub const IDENTITY: TransformFrame = TransformFrame {
        linear: DMat3::IDENTITY,
        translation: DVec3::ZERO,
    };

    pub fn new(linear: DMat3, translation: DVec3) -> Self {
        Self {
            linear,
            translation,
        }
    }

    #[inline]
    pub fn apply(&self, point: DVec3) -> DVec3 {
        self.linear * point + self.translation
    }

    /// 先应用 `local`，再应用 `self`。
    pub fn compose(&self, local: &TransformFrame) -> TransformFrame {
        TransformFrame {
            linear: self.linear * local.linear,
            translation: self.linear * local.translation + self.translation,
        }
    }
}

/// 嵌套块参照的变换栈，栈底始终是单位变换。
#[derive(Debug, Clone)]
pub struct TransformStack {
    frames: Vec<TransformFrame>,
    unit_scale: f64,
}

impl TransformStack {
    pub fn new(unit_scale: f64) -> Self {
        Self {
            frames: vec![TransformFrame::IDENTITY],
            unit_scale,
        }
    }

    /// 与当前栈顶复合后入栈，原有帧不被修改。
    pub fn push(&mut self, linear: DMat3, translation: DVec3) {
        let local = TransformFrame::new(linear, translation);
        let composed = self.current().compose(&local);
        self.frames.push(composed);
        debug!(depth = self.frames.len(), "进入块参照变换");
    }

    pub fn pop(&mut self) -> Result<TransformFrame, EngineError> {
        if self.frames.len() <= 1 {
            return Err(EngineError::TransformUnderflow);
        }
        self.frames.pop().ok_or(EngineError::TransformUnderflow)
    }

    #[inline]
    pub fn current(&self) -> TransformFrame {
        self.frames
            .last()
            .copied()
            .unwrap_or(TransformFrame::IDENTITY)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// 经当前帧变换并乘以输出单位比例。
    #[inline]
    pub fn apply(&self, point: Point3) -> DVec3 {
        self.current().apply(point.as_vec3()) * self.unit_scale
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::*;

    fn assert_vec_eq(actual: DVec3, expected: DVec3) {
        assert!(
            (actual - expected).length() < 1e-9,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn nested_frames_compose_left_to_right() {
        let mut stack = TransformStack::new(1.0);
        let outer_linear = DMat3::from_rotation_z(FRAC_PI_2);
        let outer_translation = DVec3::new(10.0, 0.0, 0.0);
        let inner_linear = DMat3::from_diagonal(DVec3::new(2.0, 2.0, 1.0));
        let inner_translation = DVec3::new(1.0, 1.0, 0.0);

        stack.push(outer_linear, outer_translation);
        stack.push(inner_linear, inner_translation);
        assert_eq!(stack.depth(), 3);

        let local = DVec3::new(1.0, 0.0, 0.0);
        let expected = outer_linear * (inner_linear * local + inner_translation) + outer_translation;
        assert_vec_eq(stack.apply(Point3::from_vec(local)), expected);
        // (1,0) -> 缩放平移 (3,1) -> 旋转 (-1,3) -> 平移 (9,3)
        assert_vec_eq(expected, DVec3::new(9.0, 3.0, 0.0));

        stack.pop().expect("pop inner");
        assert_vec_eq(
            stack.apply(Point3::from_vec(local)),
            DVec3::new(10.0, 1.0, 0.0),
        );
        stack.pop().expect("pop outer");
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn identity_frame_cannot_be_popped() {
        let mut stack = TransformStack::new(0.001);
        assert!(matches!(stack.pop(), Err(EngineError::TransformUnderflow)));
        assert_eq!(stack.depth(), 1);
        assert_vec_eq(
            stack.apply(Point3::new(1000.0, 0.0, 500.0)),
            DVec3::new(1.0, 0.0, 0.5),
        );
    }
}
