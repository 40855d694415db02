//! 线框图形（线段列表）

use glam::{Vec3, Vec4};

use super::{box_corners, ArrowFrame, ARROW_HEAD_RADIUS};
use crate::render::vertex::PositionColorVertex;

#[inline]
fn write_lines(vertices: &mut [PositionColorVertex], start: usize, points: &[Vec3], color: Vec4) {
    for (slot, &point) in vertices[start..start + points.len()].iter_mut().zip(points) {
        *slot = PositionColorVertex::new(point, color);
    }
}

/// 单条线段
#[derive(Debug, Clone, Copy)]
pub struct LineVertexGenerator;

impl LineVertexGenerator {
    pub const VERTEX_COUNT: usize = 2;

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        from: Vec3,
        to: Vec3,
        color: Vec4,
    ) {
        write_lines(vertices, start, &[from, to], color);
    }
}

/// 三角形的三条边
#[derive(Debug, Clone, Copy)]
pub struct WireframeTriangleVertexGenerator;

impl WireframeTriangleVertexGenerator {
    pub const VERTEX_COUNT: usize = 6;

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        a: Vec3,
        b: Vec3,
        c: Vec3,
        color: Vec4,
    ) {
        write_lines(vertices, start, &[a, b, b, c, c, a], color);
    }
}

/// 轴对齐盒子的 12 条棱
#[derive(Debug, Clone, Copy)]
pub struct WireframeBoxVertexGenerator;

impl WireframeBoxVertexGenerator {
    pub const VERTEX_COUNT: usize = 24;

    const EDGES: [(usize, usize); 12] = [
        (0, 1),
        (1, 2),
        (2, 3),
        (3, 0),
        (4, 5),
        (5, 6),
        (6, 7),
        (7, 4),
        (0, 4),
        (1, 5),
        (2, 6),
        (3, 7),
    ];

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        min: Vec3,
        max: Vec3,
        color: Vec4,
    ) {
        let corners = box_corners(min, max);
        let mut points = [Vec3::ZERO; Self::VERTEX_COUNT];
        for (pair, (a, b)) in points.chunks_exact_mut(2).zip(Self::EDGES) {
            pair[0] = corners[a];
            pair[1] = corners[b];
        }
        write_lines(vertices, start, &points, color);
    }
}

/// 箭头：杆加上从尖端出发的 4 条头部线
#[derive(Debug, Clone, Copy)]
pub struct WireframeArrowVertexGenerator;

impl WireframeArrowVertexGenerator {
    pub const VERTEX_COUNT: usize = 10;

    pub fn generate(
        vertices: &mut [PositionColorVertex],
        start: usize,
        origin: Vec3,
        direction: Vec3,
        color: Vec4,
    ) {
        let frame = ArrowFrame::new(origin, direction);
        let radius = frame.length * ARROW_HEAD_RADIUS;
        let mut points = [Vec3::ZERO; Self::VERTEX_COUNT];
        points[0] = frame.origin;
        points[1] = frame.tip;
        for i in 0..4 {
            points[2 + i * 2] = frame.tip;
            points[3 + i * 2] = frame.ring_point(frame.head_base, radius, i, 4);
        }
        write_lines(vertices, start, &points, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

    #[test]
    fn test_wireframe_box_at_offset() {
        let sentinel = PositionColorVertex::new(Vec3::splat(-7.0), Vec4::ONE);
        let mut vertices = vec![sentinel; 40];
        let min = Vec3::new(10.0, 20.0, 30.0);
        let max = Vec3::new(20.0, 25.0, 32.5);

        WireframeBoxVertexGenerator::generate(&mut vertices, 8, min, max, RED);

        assert!(vertices[..8].iter().all(|v| *v == sentinel));
        assert!(vertices[32..].iter().all(|v| *v == sentinel));
        for vertex in &vertices[8..32] {
            assert_ne!(vertex.position(), Vec3::ZERO);
            assert_eq!(vertex.color(), RED);
            let p = vertex.position();
            assert!(p.x == min.x || p.x == max.x);
            assert!(p.y == min.y || p.y == max.y);
            assert!(p.z == min.z || p.z == max.z);
        }
    }

    #[test]
    fn test_box_edges_are_axis_aligned() {
        let mut vertices = vec![PositionColorVertex::default(); 24];
        WireframeBoxVertexGenerator::generate(&mut vertices, 0, Vec3::ZERO, Vec3::ONE, RED);
        for pair in vertices.chunks_exact(2) {
            let delta = (pair[1].position() - pair[0].position()).abs();
            assert_eq!(delta.x + delta.y + delta.z, 1.0);
        }
    }

    #[test]
    fn test_wireframe_triangle_closes() {
        let mut vertices = vec![PositionColorVertex::default(); 6];
        WireframeTriangleVertexGenerator::generate(&mut vertices, 0, Vec3::X, Vec3::Y, Vec3::Z, RED);
        assert_eq!(vertices[0].position(), vertices[5].position());
        assert_eq!(vertices[1].position(), vertices[2].position());
    }

    #[test]
    fn test_wireframe_arrow_head() {
        let mut vertices = vec![PositionColorVertex::default(); 10];
        WireframeArrowVertexGenerator::generate(&mut vertices, 0, Vec3::ZERO, Vec3::new(0.0, 0.0, 4.0), RED);

        assert_eq!(vertices[0].position(), Vec3::ZERO);
        assert_eq!(vertices[1].position(), Vec3::new(0.0, 0.0, 4.0));
        for pair in vertices[2..].chunks_exact(2) {
            assert_eq!(pair[0].position(), Vec3::new(0.0, 0.0, 4.0));
            let head = pair[1].position();
            assert!((head.z - 3.0).abs() < 1e-5);
            assert!((head.truncate().length() - 0.4).abs() < 1e-5);
        }
    }

    #[test]
    fn test_degenerate_arrow_collapses() {
        let mut vertices = vec![PositionColorVertex::default(); 10];
        WireframeArrowVertexGenerator::generate(&mut vertices, 0, Vec3::ONE, Vec3::ZERO, RED);
        assert!(vertices.iter().all(|v| v.position() == Vec3::ONE));
    }
}
