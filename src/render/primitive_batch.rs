//! 图元批次
//!
//! 收集同一顶点布局的顶点，在拓扑改变、容量用尽或 `end()` 时合并为一次绘制调用。
//! 批次存活期间占用设备上的布局资源，销毁时释放。

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use glam::Mat4;

use super::device::{DrawCall, GraphicsDevice, PrimitiveTopology};
use super::vertex::{Vertex, VertexLayout};
use crate::core::error::{RenderError, RenderResult};

/// 最小容量：能容纳任意拓扑的两个图元
const MIN_CAPACITY: usize = 6;

/// 单一顶点类型的图元批次
pub struct PrimitiveBatch<V: Vertex> {
    device: Arc<dyn GraphicsDevice>,
    layout: VertexLayout,
    vertices: Vec<V>,
    topology: Option<PrimitiveTopology>,
    capacity: usize,
    transform: Mat4,
    drawing: bool,
    draw_calls: usize,
}

impl<V: Vertex> PrimitiveBatch<V> {
    /// 创建批次并在设备上准备布局
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        layout: VertexLayout,
        capacity: usize,
    ) -> RenderResult<Self> {
        device.prepare_layout(&layout)?;
        let capacity = capacity.max(MIN_CAPACITY);
        Ok(Self {
            device,
            layout,
            vertices: Vec::with_capacity(capacity),
            topology: None,
            capacity,
            transform: Mat4::IDENTITY,
            drawing: false,
            draw_calls: 0,
        })
    }

    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// 单次绘制调用的最大顶点数
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 设置后续绘制调用使用的视图投影变换
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// 是否处于 begin/end 之间
    pub fn is_drawing(&self) -> bool {
        self.drawing
    }

    /// 自创建以来提交的绘制调用次数
    pub fn draw_calls(&self) -> usize {
        self.draw_calls
    }

    /// 等待提交的顶点数
    pub fn queued_len(&self) -> usize {
        self.vertices.len()
    }

    /// 开始收集顶点
    pub fn begin(&mut self) -> RenderResult<()> {
        if self.drawing {
            return Err(RenderError::InvalidState(format!(
                "begin() called twice on the {} batch",
                type_name::<V>()
            )));
        }
        self.drawing = true;
        self.vertices.clear();
        self.topology = None;
        Ok(())
    }

    /// 加入顶点
    ///
    /// 顶点数必须是整数个图元。超出容量时按整图元拆分为多次绘制调用。
    pub fn queue(&mut self, vertices: &[V], topology: PrimitiveTopology) -> RenderResult<()> {
        if !self.drawing {
            return Err(RenderError::InvalidState(format!(
                "queue() called outside begin()/end() on the {} batch",
                type_name::<V>()
            )));
        }

        let per_primitive = topology.vertices_per_primitive();
        if vertices.len() % per_primitive != 0 {
            return Err(RenderError::InvalidState(format!(
                "{} vertices do not form whole {:?} primitives",
                vertices.len(),
                topology
            )));
        }

        if self.topology != Some(topology) {
            self.flush()?;
            self.topology = Some(topology);
        }

        let limit = self.capacity - self.capacity % per_primitive;
        let mut remaining = vertices;
        while !remaining.is_empty() {
            let free = limit - self.vertices.len();
            if free == 0 {
                self.flush()?;
                continue;
            }
            let take = free.min(remaining.len());
            self.vertices.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
        }
        Ok(())
    }

    /// 提交剩余顶点并结束收集
    pub fn end(&mut self) -> RenderResult<()> {
        if !self.drawing {
            return Err(RenderError::InvalidState(format!(
                "end() called without begin() on the {} batch",
                type_name::<V>()
            )));
        }
        let result = self.flush();
        self.drawing = false;
        result
    }

    fn flush(&mut self) -> RenderResult<()> {
        let Some(topology) = self.topology else {
            return Ok(());
        };
        if self.vertices.is_empty() {
            return Ok(());
        }

        let result = self.device.draw_primitives(&DrawCall {
            layout: &self.layout,
            vertex_data: bytemuck::cast_slice(&self.vertices),
            vertex_count: self.vertices.len(),
            topology,
            transform: self.transform,
        });
        self.vertices.clear();
        self.draw_calls += 1;
        result
    }
}

impl<V: Vertex> Drop for PrimitiveBatch<V> {
    fn drop(&mut self) {
        self.device.release_layout(&self.layout);
    }
}

impl<V: Vertex> fmt::Debug for PrimitiveBatch<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveBatch")
            .field("vertex_type", &type_name::<V>())
            .field("capacity", &self.capacity)
            .field("queued", &self.vertices.len())
            .field("drawing", &self.drawing)
            .finish()
    }
}
