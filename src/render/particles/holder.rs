//! 粒子系统持有者
//!
//! 把具体粒子类型和顶点类型擦除掉，让管理器用一个同质的集合保存所有粒子系统。

use std::any::{type_name, TypeId};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::particle_system::{ParticleSystem, ParticleSystemId, PrunePredicate};
use super::renderer::ParticleRenderer;
use crate::core::async_result::{AsyncCallback, AsyncResult, AsyncState};
use crate::core::error::{ParticleResult, RenderError, RenderResult};
use crate::render::batch_pool::PrimitiveBatchPool;
use crate::render::vertex::Vertex;

/// 与粒子类型无关的粒子系统接口
pub trait ParticleSystemHolder: Send + Sync {
    /// 所持有粒子系统的身份
    fn id(&self) -> ParticleSystemId;

    /// 渲染使用的顶点类型
    fn vertex_type(&self) -> (TypeId, &'static str);

    /// 存活粒子数
    fn particle_count(&self) -> usize;

    fn update(&self, updates: usize) -> ParticleResult<()>;

    /// 按修剪谓词移除粒子，返回移除数
    fn prune(&self) -> usize;

    /// 把存活粒子写入该顶点类型的共享批次
    fn render(&self, pool: &mut PrimitiveBatchPool) -> RenderResult<()>;

    fn begin_update(
        &self,
        updates: usize,
        threads: usize,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<AsyncResult>;

    fn end_update(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()>;

    fn begin_prune(
        &self,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<AsyncResult>;

    fn end_prune(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()>;

    /// 归还对共享批次的引用
    fn release_primitive_batch(&self, pool: &mut PrimitiveBatchPool) -> RenderResult<()>;
}

/// 具体粒子类型 `P`、顶点类型 `V` 的持有者
pub struct TypedParticleSystemHolder<P, V> {
    system: ParticleSystem<P>,
    prune: PrunePredicate<P>,
    renderer: Arc<dyn ParticleRenderer<P, V>>,
    _vertex: PhantomData<fn() -> V>,
}

impl<P, V> TypedParticleSystemHolder<P, V>
where
    P: Send + 'static,
    V: Vertex,
{
    pub fn new(
        system: ParticleSystem<P>,
        prune: PrunePredicate<P>,
        renderer: Arc<dyn ParticleRenderer<P, V>>,
    ) -> Self {
        Self {
            system,
            prune,
            renderer,
            _vertex: PhantomData,
        }
    }

    pub fn system(&self) -> &ParticleSystem<P> {
        &self.system
    }
}

impl<P, V> ParticleSystemHolder for TypedParticleSystemHolder<P, V>
where
    P: Send + 'static,
    V: Vertex,
{
    fn id(&self) -> ParticleSystemId {
        self.system.id()
    }

    fn vertex_type(&self) -> (TypeId, &'static str) {
        (TypeId::of::<V>(), type_name::<V>())
    }

    fn particle_count(&self) -> usize {
        self.system.len()
    }

    fn update(&self, updates: usize) -> ParticleResult<()> {
        self.system.update(updates)
    }

    fn prune(&self) -> usize {
        self.system.prune(|particle| (self.prune)(particle))
    }

    fn render(&self, pool: &mut PrimitiveBatchPool) -> RenderResult<()> {
        let batch = pool
            .batch_mut::<V>()
            .ok_or(RenderError::MissingBatch(type_name::<V>()))?;
        self.system
            .with_particles(|particles| self.renderer.render(particles, batch))
    }

    fn begin_update(
        &self,
        updates: usize,
        threads: usize,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<AsyncResult> {
        self.system.begin_update(updates, threads, callback, state)
    }

    fn end_update(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()> {
        self.system.end_update(handle)
    }

    fn begin_prune(
        &self,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<AsyncResult> {
        self.system
            .begin_prune(Arc::clone(&self.prune), callback, state)
    }

    fn end_prune(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()> {
        self.system.end_prune(handle)
    }

    fn release_primitive_batch(&self, pool: &mut PrimitiveBatchPool) -> RenderResult<()> {
        pool.release::<V>()
    }
}

impl<P, V> fmt::Debug for TypedParticleSystemHolder<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedParticleSystemHolder")
            .field("system", &self.system)
            .field("vertex", &type_name::<V>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::HeadlessDevice;
    use crate::render::particles::affectors::SimpleParticle;
    use crate::render::particles::renderer::StreakRenderer;
    use crate::render::vertex::PositionColorVertex;
    use glam::Vec3;

    fn holder(system: &ParticleSystem<SimpleParticle>) -> Arc<dyn ParticleSystemHolder> {
        Arc::new(TypedParticleSystemHolder::<_, PositionColorVertex>::new(
            system.clone(),
            Arc::new(|p: &SimpleParticle| p.position.y < 0.0),
            Arc::new(StreakRenderer::default()),
        ))
    }

    #[test]
    fn test_holder_prunes_with_predicate() {
        let system = ParticleSystem::new(4);
        system.add_particle(SimpleParticle::new(Vec3::ZERO, Vec3::ZERO));
        system.add_particle(SimpleParticle::new(Vec3::NEG_Y, Vec3::ZERO));
        let holder = holder(&system);

        assert_eq!(holder.id(), system.id());
        assert_eq!(holder.prune(), 1);
        assert_eq!(holder.particle_count(), 1);
    }

    #[test]
    fn test_render_needs_batch() {
        let device = Arc::new(HeadlessDevice::new());
        let mut pool = PrimitiveBatchPool::new(device.clone(), 64);
        let system = ParticleSystem::new(4);
        system.add_particle(SimpleParticle::new(Vec3::ZERO, Vec3::X));
        let holder = holder(&system);

        assert!(matches!(
            holder.render(&mut pool),
            Err(RenderError::MissingBatch(_))
        ));

        pool.acquire::<PositionColorVertex>().unwrap();
        pool.begin_all().unwrap();
        holder.render(&mut pool).unwrap();
        pool.end_all().unwrap();
        assert_eq!(device.stats().vertices, 2);

        holder.release_primitive_batch(&mut pool).unwrap();
        assert!(pool.is_empty());
    }
}
