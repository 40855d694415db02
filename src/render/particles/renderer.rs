//! 粒子渲染器
//!
//! 把一段存活粒子转换成顶点写入共享的图元批次。

use glam::Vec3;

use super::affectors::SimpleParticle;
use crate::core::error::RenderResult;
use crate::render::device::PrimitiveTopology;
use crate::render::primitive_batch::PrimitiveBatch;
use crate::render::vertex::{PositionColorVertex, Vertex};

/// 粒子渲染器
pub trait ParticleRenderer<P, V: Vertex>: Send + Sync {
    fn render(&self, particles: &[P], batch: &mut PrimitiveBatch<V>) -> RenderResult<()>;
}

/// 把 `SimpleParticle` 绘制为沿速度方向的短线段
#[derive(Debug, Clone, Copy)]
pub struct StreakRenderer {
    /// 线段长度相对速度的比例
    pub length: f32,
}

impl Default for StreakRenderer {
    fn default() -> Self {
        Self { length: 1.0 }
    }
}

impl StreakRenderer {
    pub fn new(length: f32) -> Self {
        Self { length }
    }

    fn streak(&self, particle: &SimpleParticle) -> [PositionColorVertex; 2] {
        let mut tail = particle.position - particle.velocity * self.length;
        if tail == particle.position {
            // 静止粒子画成一个很短的竖线，保证可见
            tail -= Vec3::Y * 0.01;
        }
        let mut faded = particle.color;
        faded.w = 0.0;
        [
            PositionColorVertex::new(particle.position, particle.color),
            PositionColorVertex::new(tail, faded),
        ]
    }
}

impl ParticleRenderer<SimpleParticle, PositionColorVertex> for StreakRenderer {
    fn render(
        &self,
        particles: &[SimpleParticle],
        batch: &mut PrimitiveBatch<PositionColorVertex>,
    ) -> RenderResult<()> {
        if particles.is_empty() {
            return Ok(());
        }
        let vertices: Vec<PositionColorVertex> =
            particles.iter().flat_map(|p| self.streak(p)).collect();
        batch.queue(&vertices, PrimitiveTopology::LineList)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::HeadlessDevice;
    use crate::render::vertex::VertexLayout;
    use std::sync::Arc;

    #[test]
    fn test_streak_renderer_emits_lines() {
        let device = Arc::new(HeadlessDevice::new());
        let layout = VertexLayout::derive::<PositionColorVertex>().unwrap();
        let mut batch = PrimitiveBatch::new(device.clone(), layout, 64).unwrap();
        let particles = [
            SimpleParticle::new(Vec3::ZERO, Vec3::X),
            SimpleParticle::new(Vec3::ONE, Vec3::ZERO),
        ];

        batch.begin().unwrap();
        StreakRenderer::new(0.5).render(&particles, &mut batch).unwrap();
        batch.end().unwrap();

        let stats = device.stats();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices_by_topology[&PrimitiveTopology::LineList], 4);
    }

    #[test]
    fn test_streak_tail_follows_velocity() {
        let renderer = StreakRenderer::new(2.0);
        let [head, tail] = renderer.streak(&SimpleParticle::new(Vec3::ONE, Vec3::X));
        assert_eq!(head.position(), Vec3::ONE);
        assert_eq!(tail.position(), Vec3::new(-1.0, 1.0, 1.0));
        assert_eq!(tail.color().w, 0.0);
    }
}
