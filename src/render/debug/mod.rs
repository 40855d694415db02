//! 调试绘制模块
//!
//! 线框和实心的调试图形、屏幕文本，以及承载它们的双向增长顶点缓冲区。
//!
//! ## 使用示例
//!
//! ```ignore
//! drawer.set_view_projection(camera.view_projection());
//! drawer.draw_box(aabb.min, aabb.max, Vec4::new(0.0, 1.0, 0.0, 1.0));
//! drawer.draw_arrow(position, velocity, Vec4::ONE);
//! drawer.draw_string(Vec2::new(10.0, 30.0), "paused", Vec4::ONE);
//! drawer.draw()?;
//! ```

pub mod drawer;
pub mod generators;
pub mod vertex_buffer;

pub use drawer::{DebugDrawer, OVERFLOW_WARNING};
pub use generators::{
    rotate_around_axis, LineVertexGenerator, SolidArrowVertexGenerator, SolidBoxVertexGenerator,
    SolidTriangleVertexGenerator, WireframeArrowVertexGenerator, WireframeBoxVertexGenerator,
    WireframeTriangleVertexGenerator,
};
pub use vertex_buffer::{DebugVertexBuffer, VertexBufferOverflow};
