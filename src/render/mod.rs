//! 渲染模块
//!
//! - `vertex` - 顶点元素与布局
//! - `device` - 图形设备服务抽象与无头实现
//! - `primitive_batch` / `batch_pool` - 按顶点类型共享的图元批次
//! - `particles` - 粒子系统及其管理器
//! - `debug` - 调试图形绘制

pub mod batch_pool;
pub mod debug;
pub mod device;
pub mod particles;
pub mod primitive_batch;
pub mod vertex;

pub use batch_pool::PrimitiveBatchPool;
pub use debug::{DebugDrawer, DebugVertexBuffer, VertexBufferOverflow};
pub use device::{DrawCall, GraphicsDevice, HeadlessDevice, HeadlessStats, PrimitiveTopology};
pub use particles::{
    ParticleAffector, ParticleRenderer, ParticleSystem, ParticleSystemHolder,
    ParticleSystemManager,
};
pub use primitive_batch::PrimitiveBatch;
pub use vertex::{
    PositionColorVertex, Vertex, VertexElement, VertexElementUsage, VertexFormat, VertexLayout,
};
