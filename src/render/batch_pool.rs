//! 图元批次池
//!
//! 每种顶点类型最多一个图元批次，由所有使用该类型的粒子系统共享。
//!
//! ## 引用计数
//!
//! - `acquire` 增加计数，首次使用时按推断的布局创建批次
//! - `release` 减少计数，计数归零时销毁批次并释放设备上的布局
//! - `register` 以显式布局固定批次（占一个计数），`unregister` 解除固定；
//!   仍被粒子系统使用时回退到推断的布局
//!
//! 结构性修改只能在帧与帧之间进行，不能与异步更新/修剪并发。

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use glam::Mat4;

use super::device::GraphicsDevice;
use super::primitive_batch::PrimitiveBatch;
use super::vertex::{Vertex, VertexLayout};
use crate::core::error::{RenderError, RenderResult};

/// 擦除了顶点类型的图元批次
trait ErasedBatch: Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn layout(&self) -> &VertexLayout;
    fn is_drawing(&self) -> bool;
    fn begin(&mut self) -> RenderResult<()>;
    fn end(&mut self) -> RenderResult<()>;
    fn set_transform(&mut self, transform: Mat4);
}

impl<V: Vertex> ErasedBatch for PrimitiveBatch<V> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn layout(&self) -> &VertexLayout {
        PrimitiveBatch::layout(self)
    }

    fn is_drawing(&self) -> bool {
        PrimitiveBatch::is_drawing(self)
    }

    fn begin(&mut self) -> RenderResult<()> {
        PrimitiveBatch::begin(self)
    }

    fn end(&mut self) -> RenderResult<()> {
        PrimitiveBatch::end(self)
    }

    fn set_transform(&mut self, transform: Mat4) {
        PrimitiveBatch::set_transform(self, transform)
    }
}

/// 一种顶点类型的批次及其引用计数
struct PrimitiveBatchHolder {
    type_id: TypeId,
    type_name: &'static str,
    batch: Box<dyn ErasedBatch>,
    /// 使用者数量（粒子系统 + 显式注册）
    references: usize,
    /// 是否由显式注册固定
    explicit: bool,
}

/// 图元批次池
pub struct PrimitiveBatchPool {
    device: Arc<dyn GraphicsDevice>,
    batch_capacity: usize,
    /// 按创建顺序保存，保证每帧的绘制顺序稳定
    holders: Vec<PrimitiveBatchHolder>,
}

impl PrimitiveBatchPool {
    pub fn new(device: Arc<dyn GraphicsDevice>, batch_capacity: usize) -> Self {
        Self {
            device,
            batch_capacity,
            holders: Vec::new(),
        }
    }

    fn position(&self, type_id: TypeId) -> Option<usize> {
        self.holders.iter().position(|h| h.type_id == type_id)
    }

    fn create_batch<V: Vertex>(&self, layout: VertexLayout) -> RenderResult<Box<dyn ErasedBatch>> {
        let batch = PrimitiveBatch::<V>::new(Arc::clone(&self.device), layout, self.batch_capacity)?;
        Ok(Box::new(batch))
    }

    fn ensure_not_drawing(&self, index: usize) -> RenderResult<()> {
        let holder = &self.holders[index];
        if holder.batch.is_drawing() {
            return Err(RenderError::InvalidState(format!(
                "the {} batch cannot be replaced while drawing",
                holder.type_name
            )));
        }
        Ok(())
    }

    /// 获取或创建 `V` 的批次，并增加一次引用
    pub fn acquire<V: Vertex>(&mut self) -> RenderResult<&mut PrimitiveBatch<V>> {
        let type_id = TypeId::of::<V>();
        match self.position(type_id) {
            Some(index) => self.holders[index].references += 1,
            None => {
                let layout = VertexLayout::derive::<V>()?;
                let batch = self.create_batch::<V>(layout)?;
                self.holders.push(PrimitiveBatchHolder {
                    type_id,
                    type_name: type_name::<V>(),
                    batch,
                    references: 1,
                    explicit: false,
                });
                tracing::debug!(
                    target: "batch_pool",
                    vertex = type_name::<V>(),
                    "Primitive batch created with inferred layout"
                );
            }
        }
        self.batch_mut::<V>()
            .ok_or(RenderError::MissingBatch(type_name::<V>()))
    }

    /// 释放 `V` 的一次引用
    pub fn release<V: Vertex>(&mut self) -> RenderResult<()> {
        self.release_type(TypeId::of::<V>(), type_name::<V>())
    }

    /// 按类型 ID 释放一次引用，计数归零时销毁批次
    pub fn release_type(&mut self, type_id: TypeId, type_name: &'static str) -> RenderResult<()> {
        let index = self
            .position(type_id)
            .ok_or(RenderError::VertexNotRegistered(type_name))?;

        let holder = &mut self.holders[index];
        holder.references -= 1;
        if holder.references == 0 {
            let holder = self.holders.remove(index);
            tracing::debug!(
                target: "batch_pool",
                vertex = holder.type_name,
                "Primitive batch destroyed"
            );
        }
        Ok(())
    }

    /// 以显式布局注册顶点类型
    pub fn register<V: Vertex>(&mut self, layout: VertexLayout) -> RenderResult<()> {
        layout.validate_for::<V>()?;

        match self.position(TypeId::of::<V>()) {
            Some(index) if self.holders[index].explicit => {
                Err(RenderError::DuplicateVertexRegistration(type_name::<V>()))
            }
            Some(index) => {
                self.ensure_not_drawing(index)?;
                let batch = self.create_batch::<V>(layout)?;
                let holder = &mut self.holders[index];
                holder.batch = batch;
                holder.explicit = true;
                holder.references += 1;
                tracing::debug!(
                    target: "batch_pool",
                    vertex = holder.type_name,
                    "Primitive batch switched to registered layout"
                );
                Ok(())
            }
            None => {
                let batch = self.create_batch::<V>(layout)?;
                self.holders.push(PrimitiveBatchHolder {
                    type_id: TypeId::of::<V>(),
                    type_name: type_name::<V>(),
                    batch,
                    references: 1,
                    explicit: true,
                });
                tracing::debug!(
                    target: "batch_pool",
                    vertex = type_name::<V>(),
                    "Primitive batch created with registered layout"
                );
                Ok(())
            }
        }
    }

    /// 注销显式注册的顶点类型
    ///
    /// 仍有粒子系统使用该类型时回退到推断的布局；推断失败则返回错误，
    /// 显式注册保持不变。
    pub fn unregister<V: Vertex>(&mut self) -> RenderResult<()> {
        let index = self
            .position(TypeId::of::<V>())
            .filter(|&index| self.holders[index].explicit)
            .ok_or(RenderError::VertexNotRegistered(type_name::<V>()))?;

        if self.holders[index].references == 1 {
            self.ensure_not_drawing(index)?;
            let holder = self.holders.remove(index);
            tracing::debug!(
                target: "batch_pool",
                vertex = holder.type_name,
                "Registered primitive batch destroyed"
            );
            return Ok(());
        }

        self.ensure_not_drawing(index)?;
        let layout = VertexLayout::derive::<V>()?;
        let batch = self.create_batch::<V>(layout)?;
        let holder = &mut self.holders[index];
        holder.batch = batch;
        holder.explicit = false;
        holder.references -= 1;
        tracing::info!(
            target: "batch_pool",
            vertex = holder.type_name,
            users = holder.references,
            "Vertex type unregistered while in use, falling back to inferred layout"
        );
        Ok(())
    }

    /// `V` 的批次
    pub fn batch_mut<V: Vertex>(&mut self) -> Option<&mut PrimitiveBatch<V>> {
        let index = self.position(TypeId::of::<V>())?;
        self.holders[index]
            .batch
            .as_any_mut()
            .downcast_mut::<PrimitiveBatch<V>>()
    }

    /// `V` 的批次（只读）
    pub fn batch<V: Vertex>(&self) -> Option<&PrimitiveBatch<V>> {
        let index = self.position(TypeId::of::<V>())?;
        self.holders[index]
            .batch
            .as_any()
            .downcast_ref::<PrimitiveBatch<V>>()
    }

    /// `V` 当前使用的布局
    pub fn layout_of<V: Vertex>(&self) -> Option<&VertexLayout> {
        let index = self.position(TypeId::of::<V>())?;
        Some(self.holders[index].batch.layout())
    }

    /// `V` 的引用计数，没有批次时为 0
    pub fn reference_count<V: Vertex>(&self) -> usize {
        self.position(TypeId::of::<V>())
            .map_or(0, |index| self.holders[index].references)
    }

    pub fn contains<V: Vertex>(&self) -> bool {
        self.position(TypeId::of::<V>()).is_some()
    }

    /// `V` 是否被显式注册
    pub fn is_registered<V: Vertex>(&self) -> bool {
        self.position(TypeId::of::<V>())
            .is_some_and(|index| self.holders[index].explicit)
    }

    /// 批次数量
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// 设置所有批次的视图投影变换
    pub fn set_transform_all(&mut self, transform: Mat4) {
        for holder in &mut self.holders {
            holder.batch.set_transform(transform);
        }
    }

    /// 所有批次开始收集
    pub fn begin_all(&mut self) -> RenderResult<()> {
        let mut first_error = None;
        for holder in &mut self.holders {
            if let Err(e) = holder.batch.begin() {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// 所有批次提交；单个批次失败不会阻止其余批次结束
    pub fn end_all(&mut self) -> RenderResult<()> {
        let mut first_error = None;
        for holder in &mut self.holders {
            if !holder.batch.is_drawing() {
                continue;
            }
            if let Err(e) = holder.batch.end() {
                tracing::error!(
                    target: "batch_pool",
                    vertex = holder.type_name,
                    "Failed to submit primitive batch: {}",
                    e
                );
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for PrimitiveBatchPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_list();
        for holder in &self.holders {
            list.entry(&(holder.type_name, holder.references, holder.explicit));
        }
        list.finish()
    }
}
