//! 粒子系统模块
//!
//! CPU 粒子系统以及管理它们的异步更新/修剪流水线。
//!
//! ## 架构设计
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                ParticleSystemManager                      │
//! ├──────────────────────────────────────────────────────────┤
//! │  holders: [ParticleSystemHolder]   (注册顺序)              │
//! │     └─ ParticleSystem<P> + 修剪谓词 + ParticleRenderer<P,V> │
//! │                                                           │
//! │  PrimitiveBatchPool                (每种顶点类型一个批次)   │
//! │                                                           │
//! │  AsyncStepResult × 2               (更新 / 修剪)            │
//! │     └─ 逐个粒子系统 begin → 完成 → end，首个错误即终止       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 使用示例
//!
//! ```ignore
//! let system = ParticleSystem::new(1024);
//! system.add_affector(GravityAffector::new(SimpleParticleModifier));
//! system.add_affector(MovementAffector::new(SimpleParticleModifier));
//!
//! manager.add_particle_system(system, |p: &SimpleParticle| p.position.y < 0.0, StreakRenderer::default())?;
//!
//! let handle = manager.begin_update(1, 4, None, None)?;
//! manager.end_update(&handle)?;
//! manager.draw()?;
//! ```

pub mod affectors;
pub mod async_steps;
pub mod holder;
pub mod particle_system;
pub mod renderer;
pub mod system;

pub use affectors::{
    GravityAffector, MovementAffector, ParticleModifier, SimpleParticle, SimpleParticleModifier,
};
pub use async_steps::{AsyncStepResult, StepOperation, StepPhase};
pub use holder::{ParticleSystemHolder, TypedParticleSystemHolder};
pub use particle_system::{ParticleAffector, ParticleSystem, ParticleSystemId, PrunePredicate};
pub use renderer::{ParticleRenderer, StreakRenderer};
pub use system::ParticleSystemManager;
