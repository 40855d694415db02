//! 粒子系统管理器
//!
//! 管理多个粒子系统，提供统一的更新、修剪和渲染接口。
//!
//! ## 帧循环
//!
//! ```text
//! begin_update ──► end_update ──► begin_prune ──► end_prune ──► draw
//!      │                                                         │
//!      └─ 按注册顺序逐个粒子系统执行                  每种顶点类型一次绘制
//! ```
//!
//! 添加/移除粒子系统、注册顶点类型这些结构性操作只能在帧与帧之间调用，
//! 异步更新或修剪进行中调用会返回 `ParticleError::OperationInFlight`。

use std::fmt;
use std::sync::Arc;

use glam::Mat4;

use super::async_steps::{AsyncStepResult, StepOperation};
use super::holder::{ParticleSystemHolder, TypedParticleSystemHolder};
use super::particle_system::{ParticleSystem, ParticleSystemId};
use super::renderer::ParticleRenderer;
use crate::config::ParticleConfig;
use crate::core::async_result::{AsyncCallback, AsyncState};
use crate::core::error::{ParticleError, ParticleResult};
use crate::render::batch_pool::PrimitiveBatchPool;
use crate::render::device::GraphicsDevice;
use crate::render::vertex::{Vertex, VertexLayout};

/// 粒子系统管理器
pub struct ParticleSystemManager {
    /// 按注册顺序保存
    holders: Vec<Arc<dyn ParticleSystemHolder>>,
    /// 按顶点类型共享的图元批次
    batches: PrimitiveBatchPool,
    update_steps: Arc<AsyncStepResult>,
    prune_steps: Arc<AsyncStepResult>,
    /// 异步更新默认使用的线程数
    update_threads: usize,
    transform: Mat4,
}

impl ParticleSystemManager {
    /// 创建新的粒子系统管理器
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &ParticleConfig) -> Self {
        Self {
            holders: Vec::new(),
            batches: PrimitiveBatchPool::new(device, config.batch_capacity),
            update_steps: AsyncStepResult::new("update"),
            prune_steps: AsyncStepResult::new("prune"),
            update_threads: config.effective_update_threads(),
            transform: Mat4::IDENTITY,
        }
    }

    fn ensure_idle(&self, operation: &'static str) -> ParticleResult<()> {
        if self.is_busy() {
            return Err(ParticleError::OperationInFlight(operation));
        }
        Ok(())
    }

    fn position(&self, id: ParticleSystemId) -> Option<usize> {
        self.holders.iter().position(|h| h.id() == id)
    }

    /// 异步更新或修剪是否正在进行
    pub fn is_busy(&self) -> bool {
        self.update_steps.is_running() || self.prune_steps.is_running()
    }

    /// 添加粒子系统
    ///
    /// # 参数
    ///
    /// * `system` - 粒子系统句柄
    /// * `prune` - 修剪谓词，返回 `true` 的粒子会被移除
    /// * `renderer` - 把粒子转换为 `V` 顶点的渲染器
    ///
    /// # 错误
    ///
    /// 同一个粒子系统重复添加返回 `DuplicateSystem`；无法推断 `V` 的布局时返回渲染错误。
    pub fn add_particle_system<P, V, F, R>(
        &mut self,
        system: ParticleSystem<P>,
        prune: F,
        renderer: R,
    ) -> ParticleResult<()>
    where
        P: Send + 'static,
        V: Vertex,
        F: Fn(&P) -> bool + Send + Sync + 'static,
        R: ParticleRenderer<P, V> + 'static,
    {
        self.ensure_idle("add_particle_system")?;
        let id = system.id();
        if self.position(id).is_some() {
            return Err(ParticleError::DuplicateSystem(id.to_string()));
        }

        self.batches.acquire::<V>()?;
        self.holders
            .push(Arc::new(TypedParticleSystemHolder::<P, V>::new(
                system,
                Arc::new(prune),
                Arc::new(renderer),
            )));

        tracing::debug!(
            target: "particles",
            system = %id,
            vertex = std::any::type_name::<V>(),
            total = self.holders.len(),
            "Particle system added"
        );
        Ok(())
    }

    /// 移除粒子系统并归还其批次引用
    pub fn remove_particle_system<P: Send + 'static>(
        &mut self,
        system: &ParticleSystem<P>,
    ) -> ParticleResult<()> {
        self.ensure_idle("remove_particle_system")?;
        let id = system.id();
        let index = self
            .position(id)
            .ok_or_else(|| ParticleError::UnknownSystem(id.to_string()))?;

        let holder = self.holders.remove(index);
        holder.release_primitive_batch(&mut self.batches)?;

        tracing::debug!(target: "particles", system = %id, "Particle system removed");
        Ok(())
    }

    /// 是否管理着该粒子系统
    pub fn contains<P: Send + 'static>(&self, system: &ParticleSystem<P>) -> bool {
        self.position(system.id()).is_some()
    }

    /// 以显式布局注册顶点类型
    pub fn register_vertex<V: Vertex>(&mut self, layout: VertexLayout) -> ParticleResult<()> {
        self.ensure_idle("register_vertex")?;
        self.batches.register::<V>(layout)?;
        Ok(())
    }

    /// 取消顶点类型的显式注册
    pub fn unregister_vertex<V: Vertex>(&mut self) -> ParticleResult<()> {
        self.ensure_idle("unregister_vertex")?;
        self.batches.unregister::<V>()?;
        Ok(())
    }

    /// 同步更新所有粒子系统
    pub fn update(&self, updates: usize) -> ParticleResult<()> {
        self.ensure_idle("update")?;
        for holder in &self.holders {
            holder.update(updates)?;
        }
        Ok(())
    }

    /// 同步修剪所有粒子系统，返回移除的粒子总数
    pub fn prune(&self) -> ParticleResult<usize> {
        self.ensure_idle("prune")?;
        Ok(self.holders.iter().map(|holder| holder.prune()).sum())
    }

    /// 开始异步更新
    ///
    /// 粒子系统按注册顺序逐个更新；`threads` 为 0 时使用配置的线程数。
    pub fn begin_update(
        &self,
        updates: usize,
        threads: usize,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> ParticleResult<Arc<AsyncStepResult>> {
        if self.prune_steps.is_running() {
            return Err(ParticleError::OperationInFlight("begin_update"));
        }
        let threads = if threads == 0 { self.update_threads } else { threads };
        self.update_steps.start(
            self.holders.clone(),
            StepOperation::Update { updates, threads },
            callback,
            state,
        )?;
        Ok(Arc::clone(&self.update_steps))
    }

    /// 结束异步更新，阻塞直到所有粒子系统处理完毕
    pub fn end_update(&self, handle: &Arc<AsyncStepResult>) -> ParticleResult<()> {
        if !Arc::ptr_eq(handle, &self.update_steps) {
            return Err(ParticleError::ForeignHandle("particle system manager update"));
        }
        handle.wait()
    }

    /// 开始异步修剪
    pub fn begin_prune(
        &self,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> ParticleResult<Arc<AsyncStepResult>> {
        if self.update_steps.is_running() {
            return Err(ParticleError::OperationInFlight("begin_prune"));
        }
        self.prune_steps.start(
            self.holders.clone(),
            StepOperation::Prune,
            callback,
            state,
        )?;
        Ok(Arc::clone(&self.prune_steps))
    }

    /// 结束异步修剪
    pub fn end_prune(&self, handle: &Arc<AsyncStepResult>) -> ParticleResult<()> {
        if !Arc::ptr_eq(handle, &self.prune_steps) {
            return Err(ParticleError::ForeignHandle("particle system manager prune"));
        }
        handle.wait()
    }

    /// 设置粒子绘制使用的视图投影变换
    pub fn set_view_projection(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// 绘制所有粒子系统
    ///
    /// 先让所有批次开始收集，再让每个粒子系统写入顶点，最后统一提交。
    pub fn draw(&mut self) -> ParticleResult<()> {
        self.ensure_idle("draw")?;
        self.batches.set_transform_all(self.transform);
        self.batches.begin_all()?;

        let mut first_error = None;
        for holder in &self.holders {
            if let Err(e) = holder.render(&mut self.batches) {
                tracing::error!(
                    target: "particles",
                    system = %holder.id(),
                    "Failed to render particle system: {}",
                    e
                );
                first_error.get_or_insert(e);
            }
        }

        let ended = self.batches.end_all();
        match first_error {
            Some(e) => Err(e.into()),
            None => ended.map_err(Into::into),
        }
    }

    /// 管理的粒子系统数
    pub fn particle_system_count(&self) -> usize {
        self.holders.len()
    }

    /// 存活的图元批次数
    pub fn primitive_batch_count(&self) -> usize {
        self.batches.len()
    }

    /// 使用 `V` 的粒子系统数加上显式注册
    pub fn vertex_reference_count<V: Vertex>(&self) -> usize {
        self.batches.reference_count::<V>()
    }

    /// 所有粒子系统的存活粒子总数
    pub fn particle_count(&self) -> usize {
        self.holders.iter().map(|h| h.particle_count()).sum()
    }
}

impl Drop for ParticleSystemManager {
    fn drop(&mut self) {
        // 只等待正在运行的链，从未开始的链没有可等待的结果
        for steps in [&self.update_steps, &self.prune_steps] {
            if steps.is_running() {
                let _ = steps.wait();
            }
        }
        for holder in self.holders.drain(..) {
            if let Err(e) = holder.release_primitive_batch(&mut self.batches) {
                tracing::warn!(
                    target: "particles",
                    system = %holder.id(),
                    "Failed to release primitive batch: {}",
                    e
                );
            }
        }
    }
}

impl fmt::Debug for ParticleSystemManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystemManager")
            .field("systems", &self.holders.len())
            .field("batches", &self.batches)
            .field("update", &self.update_steps)
            .field("prune", &self.prune_steps)
            .finish()
    }
}
