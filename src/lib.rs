//! # Nuclex Framework
//!
//! Game-development helpers built around two subsystems.
//!
//! ## Features
//!
//! - **Particle System Manager**: CPU particle systems with affectors, updated and pruned
//!   asynchronously one system after another in registration order
//! - **Primitive-Batch Pooling**: one reference-counted render batch per vertex type,
//!   shared by every particle system that renders with it
//! - **Debug Drawer**: wireframe/solid lines, triangles, boxes and arrows packed into a
//!   fixed vertex buffer that degrades visibly instead of failing when full
//!
//! ## Architecture Design
//!
//! Rendering goes through the [`render::GraphicsDevice`] service. The framework never
//! talks to a GPU API directly; [`render::HeadlessDevice`] records draw calls for tests
//! and the demo binary.
//!
//! Asynchronous work follows a begin/end pattern: `begin_*` returns a handle at once,
//! `end_*` blocks until the work finishes and returns the captured error. Handles can
//! also be awaited as futures.
//!
//! ### Example
//!
//! ```ignore
//! use nuclex_framework::render::particles::*;
//!
//! let system = ParticleSystem::new(1024);
//! system.add_affector(MovementAffector::new(SimpleParticleModifier));
//! manager.add_particle_system(system, |p: &SimpleParticle| p.position.y < 0.0, StreakRenderer::default())?;
//!
//! let handle = manager.begin_update(1, 4, None, None)?;
//! manager.end_update(&handle)?;
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Engine entry point, errors, async primitives and task scheduling
//! - [`render`]: Vertex layouts, batching, particle systems and debug drawing
//! - [`config`]: Configuration loading and validation

/// Core functionality including the engine loop, errors and scheduling
pub mod core;
/// Configuration system
pub mod config;
/// Rendering: batching, particles and debug geometry
pub mod render;
