//! 实心图形（三角形列表）

use glam::{Vec3, Vec4};

use super::{box_corners, ArrowFrame, ARROW_HEAD_RADIUS, ARROW_SHAFT_RADIUS};
use crate::render::vertex::PositionColorVertex;

/// 顺序写入顶点的游标
struct TriangleWriter<'a> {
    vertices: &'a mut [PositionColorVertex],
    next: usize,
    color: Vec4,
}

impl<'a> TriangleWriter<'a> {
    fn new(vertices: &'a mut [PositionColorVertex], color: Vec4) -> Self {
        Self {
            vertices,
            next: 0,
            color,
        }
    }

    #[inline]
    fn triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        for point in [a, b, c] {
            self.vertices[self.next] = PositionColorVertex::new(point, self.color);
            self.next += 1;
        }
    }

    /// 四边形 a-b-c-d 拆成两个三角形
    #[inline]
    fn quad(&mut self, a: Vec3, b: Vec3, c: Vec3, d: Vec3) {
        self.triangle(a, b, c);
        self.triangle(a, c, d);
    }
}

/// 单个实心三角形
#[derive(Debug, Clone, Copy)]
pub struct SolidTriangleVertexGenerator;

impl SolidTriangleVertexGenerator {
    pub const VERTEX_COUNT: usize = 3;

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        color: Vec4,
    ) {
        TriangleWriter::new(&mut vertices[start..start + Self::VERTEX_COUNT], color)
            .triangle(a, b, c);
    }
}

/// 实心轴对齐盒子，6 个面共 12 个三角形
#[derive(Debug, Clone, Copy)]
pub struct SolidBoxVertexGenerator;

impl SolidBoxVertexGenerator {
    pub const VERTEX_COUNT: usize = 36;

    const FACES: [[usize; 4]; 6] = [
        [0, 3, 2, 1],
        [4, 5, 6, 7],
        [0, 4, 7, 3],
        [1, 2, 6, 5],
        [0, 1, 5, 4],
        [3, 7, 6, 2],
    ];

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        min: Vec3,
        max: Vec3,
        color: Vec4,
    ) {
        let corners = box_corners(min, max);
        let mut writer = TriangleWriter::new(&mut vertices[start..start + Self::VERTEX_COUNT], color);
        for [a, b, c, d] in Self::FACES {
            writer.quad(corners[a], corners[b], corners[c], corners[d]);
        }
    }
}

/// 实心箭头
///
/// 由 8 段的圆环构成：杆底面、杆侧面、头部底面圆环、锥面。
#[derive(Debug, Clone, Copy)]
pub struct SolidArrowVertexGenerator;

impl SolidArrowVertexGenerator {
    pub const SEGMENTS: usize = 8;
    pub const VERTEX_COUNT: usize = 144;

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        origin: Vec3,
        direction: Vec3,
        color: Vec4,
    ) {
        const N: usize = SolidArrowVertexGenerator::SEGMENTS;

        let frame = ArrowFrame::new(origin, direction);
        let shaft_radius = frame.length * ARROW_SHAFT_RADIUS;
        let head_radius = frame.length * ARROW_HEAD_RADIUS;

        let ring = |center: Vec3, radius: f32| -> [Vec3; N] {
            std::array::from_fn(|i| frame.ring_point(center, radius, i, N))
        };
        let shaft_bottom = ring(frame.origin, shaft_radius);
        let shaft_top = ring(frame.head_base, shaft_radius);
        let head = ring(frame.head_base, head_radius);

        let mut writer = TriangleWriter::new(&mut vertices[start..start + Self::VERTEX_COUNT], color);
        for i in 0..N {
            let j = (i + 1) % N;
            // 杆底面
            writer.triangle(frame.origin, shaft_bottom[j], shaft_bottom[i]);
            // 杆侧面
            writer.quad(shaft_bottom[i], shaft_bottom[j], shaft_top[j], shaft_top[i]);
            // 头部底面圆环
            writer.quad(shaft_top[i], shaft_top[j], head[j], head[i]);
            // 锥面
            writer.triangle(head[i], head[j], frame.tip);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREEN: Vec4 = Vec4::new(0.0, 1.0, 0.0, 1.0);

    #[test]
    fn test_solid_triangle() {
        let mut vertices = vec![PositionColorVertex::default(); 5];
        SolidTriangleVertexGenerator::generate(&mut vertices, 1, Vec3::X, Vec3::Y, Vec3::Z, GREEN);
        assert_eq!(vertices[0], PositionColorVertex::default());
        assert_eq!(vertices[1].position(), Vec3::X);
        assert_eq!(vertices[3].position(), Vec3::Z);
        assert_eq!(vertices[4], PositionColorVertex::default());
    }

    #[test]
    fn test_solid_box_covers_all_faces() {
        let mut vertices = vec![PositionColorVertex::default(); 36];
        SolidBoxVertexGenerator::generate(&mut vertices, 0, Vec3::ZERO, Vec3::splat(2.0), GREEN);

        // 每个三角形都位于某个面上：三个顶点共享一个坐标分量
        for triangle in vertices.chunks_exact(3) {
            let [a, b, c] = [triangle[0].position(), triangle[1].position(), triangle[2].position()];
            let shared = (0..3).filter(|&axis| a[axis] == b[axis] && b[axis] == c[axis]).count();
            assert_eq!(shared, 1);
        }
    }

    #[test]
    fn test_solid_arrow_fills_all_vertices() {
        let sentinel = PositionColorVertex::new(Vec3::splat(99.0), Vec4::ZERO);
        let mut vertices = vec![sentinel; 150];
        let origin = Vec3::new(1.0, 2.0, 3.0);
        let direction = Vec3::new(0.0, 8.0, 0.0);

        SolidArrowVertexGenerator::generate(&mut vertices, 4, origin, direction, GREEN);

        assert!(vertices[..4].iter().all(|v| *v == sentinel));
        assert!(vertices[148..].iter().all(|v| *v == sentinel));
        for vertex in &vertices[4..148] {
            assert_eq!(vertex.color(), GREEN);
            let p = vertex.position();
            // 所有顶点都在箭头的包围盒内
            assert!(p.y >= origin.y - 1e-4 && p.y <= origin.y + 8.0 + 1e-4);
            assert!((p - Vec3::new(origin.x, p.y, origin.z)).length() <= 0.8 + 1e-4);
        }
        // 锥面的最后一个顶点是尖端
        assert_eq!(vertices[147].position(), origin + direction);
    }

    #[test]
    fn test_solid_arrow_vertex_count() {
        let per_segment = 3 + 6 + 6 + 3;
        assert_eq!(
            per_segment * SolidArrowVertexGenerator::SEGMENTS,
            SolidArrowVertexGenerator::VERTEX_COUNT
        );
    }
}
