//! 图形设备服务
//!
//! 框架只依赖这个抽象：为顶点布局准备资源、按图元拓扑提交顶点、绘制文本。
//! 真正的渲染后端（wgpu 等）在框架之外实现该 trait。

use std::collections::HashMap;
use std::sync::Mutex;

use glam::{Mat4, Vec2, Vec4};

use super::vertex::VertexLayout;
use crate::core::error::RenderResult;
use crate::core::sync::lock;

/// 图元拓扑
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTopology {
    PointList,
    LineList,
    TriangleList,
}

impl PrimitiveTopology {
    /// 每个图元的顶点数
    #[inline]
    pub const fn vertices_per_primitive(self) -> usize {
        match self {
            PrimitiveTopology::PointList => 1,
            PrimitiveTopology::LineList => 2,
            PrimitiveTopology::TriangleList => 3,
        }
    }
}

/// 一次绘制调用
#[derive(Debug, Clone, Copy)]
pub struct DrawCall<'a> {
    /// 顶点布局
    pub layout: &'a VertexLayout,
    /// 原始顶点字节
    pub vertex_data: &'a [u8],
    /// 顶点数
    pub vertex_count: usize,
    /// 图元拓扑
    pub topology: PrimitiveTopology,
    /// 视图投影变换
    pub transform: Mat4,
}

/// 图形设备服务
pub trait GraphicsDevice: Send + Sync {
    /// 为某个布局创建图元批次时调用
    fn prepare_layout(&self, _layout: &VertexLayout) -> RenderResult<()> {
        Ok(())
    }

    /// 该布局的图元批次被销毁时调用
    fn release_layout(&self, _layout: &VertexLayout) {}

    /// 提交顶点
    fn draw_primitives(&self, call: &DrawCall<'_>) -> RenderResult<()>;

    /// 绘制屏幕文本
    fn draw_text(&self, position: Vec2, text: &str, color: Vec4) -> RenderResult<()>;
}

/// 无头设备的统计信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadlessStats {
    /// 绘制调用次数
    pub draw_calls: usize,
    /// 提交的顶点总数
    pub vertices: usize,
    /// 按拓扑统计的顶点数
    pub vertices_by_topology: HashMap<PrimitiveTopology, usize>,
    /// 当前存活的布局数
    pub live_layouts: usize,
    /// 创建过的布局数
    pub prepared_layouts: usize,
    /// 绘制过的文本
    pub texts: Vec<String>,
}

/// 不连接任何 GPU 的设备，只记录调用
///
/// 用于测试和无窗口演示。
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    stats: Mutex<HeadlessStats>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前统计信息的快照
    pub fn stats(&self) -> HeadlessStats {
        lock(&self.stats).clone()
    }

    /// 清空绘制统计（保留布局计数）
    pub fn clear_frame_stats(&self) {
        let mut stats = lock(&self.stats);
        stats.draw_calls = 0;
        stats.vertices = 0;
        stats.vertices_by_topology.clear();
        stats.texts.clear();
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn prepare_layout(&self, layout: &VertexLayout) -> RenderResult<()> {
        let mut stats = lock(&self.stats);
        stats.live_layouts += 1;
        stats.prepared_layouts += 1;
        tracing::trace!(target: "render", stride = layout.stride(), "Layout prepared");
        Ok(())
    }

    fn release_layout(&self, layout: &VertexLayout) {
        let mut stats = lock(&self.stats);
        stats.live_layouts = stats.live_layouts.saturating_sub(1);
        tracing::trace!(target: "render", stride = layout.stride(), "Layout released");
    }

    fn draw_primitives(&self, call: &DrawCall<'_>) -> RenderResult<()> {
        let mut stats = lock(&self.stats);
        stats.draw_calls += 1;
        stats.vertices += call.vertex_count;
        *stats.vertices_by_topology.entry(call.topology).or_insert(0) += call.vertex_count;
        tracing::trace!(
            target: "render",
            vertices = call.vertex_count,
            topology = ?call.topology,
            "Draw primitives"
        );
        Ok(())
    }

    fn draw_text(&self, _position: Vec2, text: &str, _color: Vec4) -> RenderResult<()> {
        lock(&self.stats).texts.push(text.to_string());
        Ok(())
    }
}
