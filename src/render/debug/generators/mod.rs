//! 调试图形顶点生成器
//!
//! 每个生成器把图形参数转换成固定数量的顶点，写入目标缓冲区 `start` 开始的位置，
//! 不检查参数是否合理：退化的输入（例如长度为零的方向）生成退化但确定的顶点。
//!
//! | 生成器 | 拓扑 | 顶点数 |
//! |--------|------|--------|
//! | `LineVertexGenerator` | 线段 | 2 |
//! | `WireframeTriangleVertexGenerator` | 线段 | 6 |
//! | `WireframeBoxVertexGenerator` | 线段 | 24 |
//! | `WireframeArrowVertexGenerator` | 线段 | 10 |
//! | `SolidTriangleVertexGenerator` | 三角形 | 3 |
//! | `SolidBoxVertexGenerator` | 三角形 | 36 |
//! | `SolidArrowVertexGenerator` | 三角形 | 144 |

mod solid;
mod wireframe;

pub use solid::{SolidArrowVertexGenerator, SolidBoxVertexGenerator, SolidTriangleVertexGenerator};
pub use wireframe::{
    LineVertexGenerator, WireframeArrowVertexGenerator, WireframeBoxVertexGenerator,
    WireframeTriangleVertexGenerator,
};

use glam::Vec3;

/// 箭头头部占总长度的比例
pub(crate) const ARROW_HEAD_LENGTH: f32 = 0.25;
/// 箭头头部半径相对总长度的比例
pub(crate) const ARROW_HEAD_RADIUS: f32 = 0.1;
/// 实心箭头杆的半径相对总长度的比例
pub(crate) const ARROW_SHAFT_RADIUS: f32 = 0.025;

/// 绕任意单位轴旋转向量（Rodrigues 公式）
///
/// `v' = v·cosθ + (k × v)·sinθ + k·(k·v)·(1 − cosθ)`
#[inline]
pub fn rotate_around_axis(vector: Vec3, axis: Vec3, angle: f32) -> Vec3 {
    let (sin, cos) = angle.sin_cos();
    vector * cos + axis.cross(vector) * sin + axis * axis.dot(vector) * (1.0 - cos)
}

/// 与 `axis` 垂直的单位向量，`axis` 为零时返回零向量
pub(crate) fn any_perpendicular(axis: Vec3) -> Vec3 {
    let reference = if axis.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
    axis.cross(reference).normalize_or_zero()
}

/// 箭头的几何参数
#[derive(Debug, Clone, Copy)]
pub(crate) struct ArrowFrame {
    pub origin: Vec3,
    pub tip: Vec3,
    pub head_base: Vec3,
    pub axis: Vec3,
    pub perpendicular: Vec3,
    pub length: f32,
}

impl ArrowFrame {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        let axis = direction.normalize_or_zero();
        Self {
            origin,
            tip: origin + direction,
            head_base: origin + direction * (1.0 - ARROW_HEAD_LENGTH),
            axis,
            perpendicular: any_perpendicular(axis),
            length: direction.length(),
        }
    }

    /// 以 `center` 为圆心、`radius` 为半径、垂直于箭头的圆上第 `index` 个点（共 `segments` 个）
    pub fn ring_point(&self, center: Vec3, radius: f32, index: usize, segments: usize) -> Vec3 {
        let angle = std::f32::consts::TAU * index as f32 / segments as f32;
        center + rotate_around_axis(self.perpendicular, self.axis, angle) * radius
    }
}

/// 轴对齐盒子的 8 个角点
///
/// 0-3 位于 `min.z` 平面，4-7 位于 `max.z` 平面，同一平面内按逆时针排列。
pub(crate) fn box_corners(min: Vec3, max: Vec3) -> [Vec3; 8] {
    [
        Vec3::new(min.x, min.y, min.z),
        Vec3::new(max.x, min.y, min.z),
        Vec3::new(max.x, max.y, min.z),
        Vec3::new(min.x, max.y, min.z),
        Vec3::new(min.x, min.y, max.z),
        Vec3::new(max.x, min.y, max.z),
        Vec3::new(max.x, max.y, max.z),
        Vec3::new(min.x, max.y, max.z),
    ]
}
