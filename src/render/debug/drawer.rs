//! 调试绘制器
//!
//! 在一帧内收集调试图形和文本，`draw()` 时一次性提交并清空。
//! 缓冲区满时新图形被丢弃，并在屏幕上显示一条警告。

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::generators::{
    LineVertexGenerator, SolidArrowVertexGenerator, SolidBoxVertexGenerator,
    SolidTriangleVertexGenerator, WireframeArrowVertexGenerator, WireframeBoxVertexGenerator,
    WireframeTriangleVertexGenerator,
};
use super::vertex_buffer::DebugVertexBuffer;
use crate::config::DebugDrawerConfig;
use crate::core::error::RenderResult;
use crate::render::device::{GraphicsDevice, PrimitiveTopology};
use crate::render::primitive_batch::PrimitiveBatch;
use crate::render::vertex::{PositionColorVertex, VertexLayout};

/// 溢出警告文本
pub const OVERFLOW_WARNING: &str = "Warning: Debug vertex buffer overflow";

const WARNING_COLOR: Vec4 = Vec4::new(1.0, 0.0, 0.0, 1.0);

#[derive(Debug, Clone)]
struct QueuedString {
    position: Vec2,
    text: String,
    color: Vec4,
}

/// 调试绘制器
pub struct DebugDrawer {
    device: Arc<dyn GraphicsDevice>,
    buffer: DebugVertexBuffer,
    batch: PrimitiveBatch<PositionColorVertex>,
    strings: Vec<QueuedString>,
    view_projection: Mat4,
    overflow_warning: bool,
    warning_position: Vec2,
}

impl DebugDrawer {
    pub fn new(device: Arc<dyn GraphicsDevice>, config: &DebugDrawerConfig) -> RenderResult<Self> {
        let layout = VertexLayout::derive::<PositionColorVertex>()?;
        let batch = PrimitiveBatch::new(Arc::clone(&device), layout, config.max_vertices)?;
        Ok(Self {
            device,
            buffer: DebugVertexBuffer::new(config.max_vertices),
            batch,
            strings: Vec::new(),
            view_projection: Mat4::IDENTITY,
            overflow_warning: config.overflow_warning,
            warning_position: Vec2::from(config.warning_position),
        })
    }

    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.view_projection = view_projection;
    }

    pub fn view_projection(&self) -> Mat4 {
        self.view_projection
    }

    /// 排队的顶点缓冲区
    pub fn buffer(&self) -> &DebugVertexBuffer {
        &self.buffer
    }

    /// 本帧是否有图形因缓冲区已满而被丢弃
    pub fn overflowed(&self) -> bool {
        self.buffer.overflowed()
    }

    pub fn draw_line(&mut self, from: Vec3, to: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_line_vertices(LineVertexGenerator::VERTEX_COUNT)
        {
            LineVertexGenerator::generate(self.buffer.vertices_mut(), range.start, from, to, color);
        }
    }

    pub fn draw_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_line_vertices(WireframeTriangleVertexGenerator::VERTEX_COUNT)
        {
            WireframeTriangleVertexGenerator::generate(
                self.buffer.vertices_mut(),
                range.start,
                a,
                b,
                c,
                color,
            );
        }
    }

    pub fn draw_solid_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_triangle_vertices(SolidTriangleVertexGenerator::VERTEX_COUNT)
        {
            SolidTriangleVertexGenerator::generate(
                self.buffer.vertices_mut(),
                range.start,
                a,
                b,
                c,
                color,
            );
        }
    }

    pub fn draw_box(&mut self, min: Vec3, max: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_line_vertices(WireframeBoxVertexGenerator::VERTEX_COUNT)
        {
            WireframeBoxVertexGenerator::generate(
                self.buffer.vertices_mut(),
                range.start,
                min,
                max,
                color,
            );
        }
    }

    pub fn draw_solid_box(&mut self, min: Vec3, max: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_triangle_vertices(SolidBoxVertexGenerator::VERTEX_COUNT)
        {
            SolidBoxVertexGenerator::generate(
                self.buffer.vertices_mut(),
                range.start,
                min,
                max,
                color,
            );
        }
    }

    pub fn draw_arrow(&mut self, origin: Vec3, direction: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_line_vertices(WireframeArrowVertexGenerator::VERTEX_COUNT)
        {
            WireframeArrowVertexGenerator::generate(
                self.buffer.vertices_mut(),
                range.start,
                origin,
                direction,
                color,
            );
        }
    }

    pub fn draw_solid_arrow(&mut self, origin: Vec3, direction: Vec3, color: Vec4) {
        if let Ok(range) = self
            .buffer
            .try_reserve_triangle_vertices(SolidArrowVertexGenerator::VERTEX_COUNT)
        {
            SolidArrowVertexGenerator::generate(
                self.buffer.vertices_mut(),
                range.start,
                origin,
                direction,
                color,
            );
        }
    }

    /// 在屏幕坐标处绘制文本
    pub fn draw_string(&mut self, position: Vec2, text: impl Into<String>, color: Vec4) {
        self.strings.push(QueuedString {
            position,
            text: text.into(),
            color,
        });
    }

    /// 提交本帧收集的所有图形和文本，然后清空
    pub fn draw(&mut self) -> RenderResult<()> {
        let result = self.submit();
        self.reset();
        result
    }

    fn submit(&mut self) -> RenderResult<()> {
        let triangles = self.buffer.triangle_vertices();
        let lines = self.buffer.line_vertices();
        if !triangles.is_empty() || !lines.is_empty() {
            self.batch.set_transform(self.view_projection);
            self.batch.begin()?;
            let mut queued = Ok(());
            if !triangles.is_empty() {
                queued = self.batch.queue(triangles, PrimitiveTopology::TriangleList);
            }
            if queued.is_ok() && !lines.is_empty() {
                queued = self.batch.queue(lines, PrimitiveTopology::LineList);
            }
            let ended = self.batch.end();
            queued?;
            ended?;
        }

        for string in &self.strings {
            self.device
                .draw_text(string.position, &string.text, string.color)?;
        }

        if self.buffer.overflowed() {
            tracing::warn!(
                target: "debug_drawer",
                capacity = self.buffer.capacity(),
                "Debug vertex buffer overflowed, some shapes were dropped"
            );
            if self.overflow_warning {
                self.device
                    .draw_text(self.warning_position, OVERFLOW_WARNING, WARNING_COLOR)?;
            }
        }
        Ok(())
    }

    /// 丢弃本帧已收集的图形和文本
    pub fn reset(&mut self) {
        self.buffer.reset();
        self.strings.clear();
    }
}

impl std::fmt::Debug for DebugDrawer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugDrawer")
            .field("capacity", &self.buffer.capacity())
            .field("remaining", &self.buffer.remaining())
            .field("strings", &self.strings.len())
            .field("overflowed", &self.buffer.overflowed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::HeadlessDevice;

    fn drawer(device: &Arc<HeadlessDevice>, max_vertices: usize) -> DebugDrawer {
        let config = DebugDrawerConfig {
            max_vertices,
            ..Default::default()
        };
        DebugDrawer::new(device.clone(), &config).unwrap()
    }

    #[test]
    fn test_draw_submits_triangles_then_lines() {
        let device = Arc::new(HeadlessDevice::new());
        let mut drawer = drawer(&device, 256);

        drawer.draw_solid_box(Vec3::ZERO, Vec3::ONE, Vec4::ONE);
        drawer.draw_box(Vec3::ZERO, Vec3::ONE, Vec4::ONE);
        drawer.draw_line(Vec3::ZERO, Vec3::X, Vec4::ONE);
        drawer.draw_string(Vec2::new(5.0, 5.0), "fps: 60", Vec4::ONE);
        drawer.draw().unwrap();

        let stats = device.stats();
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.vertices_by_topology[&PrimitiveTopology::TriangleList], 36);
        assert_eq!(stats.vertices_by_topology[&PrimitiveTopology::LineList], 26);
        assert_eq!(stats.texts, vec!["fps: 60".to_string()]);
        assert_eq!(drawer.buffer().remaining(), 256);
    }

    #[test]
    fn test_overflow_warning_then_reset() {
        let device = Arc::new(HeadlessDevice::new());
        let mut drawer = drawer(&device, 40);

        drawer.draw_solid_box(Vec3::ZERO, Vec3::ONE, Vec4::ONE);
        drawer.draw_box(Vec3::ZERO, Vec3::ONE, Vec4::ONE);
        assert!(drawer.overflowed());
        // 溢出之后仍能放下的图形照常绘制
        drawer.draw_line(Vec3::ZERO, Vec3::Y, Vec4::ONE);
        drawer.draw().unwrap();

        let stats = device.stats();
        assert_eq!(stats.vertices_by_topology[&PrimitiveTopology::TriangleList], 36);
        assert_eq!(stats.vertices_by_topology[&PrimitiveTopology::LineList], 2);
        assert_eq!(stats.texts, vec![OVERFLOW_WARNING.to_string()]);

        assert!(!drawer.overflowed());
        device.clear_frame_stats();
        drawer.draw().unwrap();
        assert!(device.stats().texts.is_empty());
        assert_eq!(device.stats().draw_calls, 0);
    }

    #[test]
    fn test_reset_discards_frame() {
        let device = Arc::new(HeadlessDevice::new());
        let mut drawer = drawer(&device, 256);
        drawer.draw_arrow(Vec3::ZERO, Vec3::X, Vec4::ONE);
        drawer.draw_solid_arrow(Vec3::ZERO, Vec3::X, Vec4::ONE);
        drawer.draw_string(Vec2::ZERO, "dropped", Vec4::ONE);
        drawer.reset();
        drawer.draw().unwrap();
        assert_eq!(device.stats().draw_calls, 0);
        assert!(device.stats().texts.is_empty());
    }
}
