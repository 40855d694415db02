//! 批次引用计数与调试缓冲区的属性测试

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nuclex_framework::config::ParticleConfig;
use nuclex_framework::core::RenderResult;
use nuclex_framework::render::debug::DebugVertexBuffer;
use nuclex_framework::render::particles::{ParticleRenderer, ParticleSystem, ParticleSystemManager};
use nuclex_framework::render::{
    HeadlessDevice, PositionColorVertex, PrimitiveBatch, Vertex, VertexElement,
    VertexElementUsage, VertexFormat,
};
use proptest::prelude::*;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PointVertex {
    position: [f32; 3],
    size: f32,
}

impl Vertex for PointVertex {
    const ELEMENTS: &'static [VertexElement] = &[
        VertexElement::new(0, VertexFormat::Float32x3, VertexElementUsage::Position, 0),
        VertexElement::new(12, VertexFormat::Float32, VertexElementUsage::PointSize, 0),
    ];
}

struct Nothing;

impl ParticleRenderer<u8, PositionColorVertex> for Nothing {
    fn render(&self, _: &[u8], _: &mut PrimitiveBatch<PositionColorVertex>) -> RenderResult<()> {
        Ok(())
    }
}

impl ParticleRenderer<u8, PointVertex> for Nothing {
    fn render(&self, _: &[u8], _: &mut PrimitiveBatch<PointVertex>) -> RenderResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Op {
    Add { slot: usize, points: bool },
    Remove { slot: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..8usize, any::<bool>()).prop_map(|(slot, points)| Op::Add { slot, points }),
        (0..8usize).prop_map(|slot| Op::Remove { slot }),
    ]
}

proptest! {
    #[test]
    fn batch_references_match_live_systems(ops in prop::collection::vec(op(), 0..64)) {
        let device = Arc::new(HeadlessDevice::new());
        let mut manager = ParticleSystemManager::new(device.clone(), &ParticleConfig::default());
        // 每个槽位：粒子系统及其使用的顶点类型
        let mut slots: Vec<Option<(ParticleSystem<u8>, bool)>> = vec![None; 8];

        for op in ops {
            match op {
                Op::Add { slot, points } => {
                    if slots[slot].is_some() {
                        continue;
                    }
                    let system = ParticleSystem::new(1);
                    if points {
                        manager
                            .add_particle_system::<u8, PointVertex, _, _>(system.clone(), |_| false, Nothing)
                            .unwrap();
                    } else {
                        manager
                            .add_particle_system::<u8, PositionColorVertex, _, _>(system.clone(), |_| false, Nothing)
                            .unwrap();
                    }
                    slots[slot] = Some((system, points));
                }
                Op::Remove { slot } => {
                    if let Some((system, _)) = slots[slot].take() {
                        manager.remove_particle_system(&system).unwrap();
                    }
                }
            }

            let points = slots.iter().flatten().filter(|(_, p)| *p).count();
            let colors = slots.iter().flatten().filter(|(_, p)| !*p).count();
            prop_assert_eq!(manager.vertex_reference_count::<PointVertex>(), points);
            prop_assert_eq!(manager.vertex_reference_count::<PositionColorVertex>(), colors);
            prop_assert_eq!(
                manager.primitive_batch_count(),
                usize::from(points > 0) + usize::from(colors > 0)
            );
            prop_assert_eq!(device.stats().live_layouts, manager.primitive_batch_count());
        }
    }

    #[test]
    fn debug_buffer_regions_never_cross(
        capacity in 1..512usize,
        requests in prop::collection::vec((any::<bool>(), 1..64usize), 0..32),
    ) {
        let mut buffer = DebugVertexBuffer::new(capacity);
        let mut triangles = 0;
        let mut lines = 0;

        for (is_line, count) in requests {
            let result = if is_line {
                buffer.try_reserve_line_vertices(count)
            } else {
                buffer.try_reserve_triangle_vertices(count)
            };
            match result {
                Ok(range) => {
                    prop_assert_eq!(range.len(), count);
                    if is_line { lines += count } else { triangles += count }
                }
                Err(overflow) => {
                    prop_assert!(overflow.requested > overflow.remaining);
                    prop_assert!(buffer.overflowed());
                }
            }
            prop_assert_eq!(buffer.triangle_vertices().len(), triangles);
            prop_assert_eq!(buffer.line_vertices().len(), lines);
            prop_assert_eq!(buffer.remaining(), capacity - triangles - lines);
        }

        buffer.reset();
        prop_assert_eq!(buffer.remaining(), capacity);
        prop_assert!(!buffer.overflowed());
    }
}
