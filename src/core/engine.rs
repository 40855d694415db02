//! 框架主入口
//!
//! 定义 Engine 结构和无窗口演示循环

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3, Vec4};
use rand::Rng;

use super::async_result::AsyncResult;
use super::error::{EngineError, EngineResult};
use super::scheduler::TaskScheduler;
use crate::config::{EngineConfig, LoggingConfig};
use crate::render::debug::DebugDrawer;
use crate::render::device::{GraphicsDevice, HeadlessDevice};
use crate::render::particles::{
    GravityAffector, MovementAffector, ParticleSystem, ParticleSystemManager, SimpleParticle,
    SimpleParticleModifier, StreakRenderer,
};

/// 演示循环的帧数
const DEMO_FRAMES: u64 = 120;
/// 演示喷泉每帧发射的粒子数
const DEMO_EMIT_PER_FRAME: usize = 64;

/// 框架主结构
///
/// `Engine` 把粒子系统管理器和调试绘制器绑定到同一个图形设备上，
/// 并按固定顺序驱动每一帧：
/// 1. **更新**：异步更新所有粒子系统
/// 2. **修剪**：异步移除失效粒子
/// 3. **绘制**：提交粒子批次和调试图形
/// 4. **回调**：处理投递到主线程的任务，包括上一轮更新链的完成回调
///
/// # 示例
///
/// ```no_run
/// use nuclex_framework::core::Engine;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     Engine::run()?;
///     Ok(())
/// }
/// ```
pub struct Engine {
    config: EngineConfig,
    particles: ParticleSystemManager,
    debug_drawer: DebugDrawer,
    frame_count: u64,
    /// 已在主线程上确认完成的更新链数
    completed_updates: Arc<AtomicU64>,
}

impl Engine {
    /// 创建引擎
    ///
    /// 配置不合法时返回 `EngineError::Config`。
    pub fn new(config: EngineConfig, device: Arc<dyn GraphicsDevice>) -> EngineResult<Self> {
        config.validate()?;
        let particles = ParticleSystemManager::new(Arc::clone(&device), &config.particles);
        let debug_drawer = DebugDrawer::new(device, &config.debug_drawer)?;
        Ok(Self {
            config,
            particles,
            debug_drawer,
            frame_count: 0,
            completed_updates: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn particles(&self) -> &ParticleSystemManager {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleSystemManager {
        &mut self.particles
    }

    pub fn debug_drawer_mut(&mut self) -> &mut DebugDrawer {
        &mut self.debug_drawer
    }

    /// 已完成的帧数
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// 完成回调已在主线程上执行的更新链数
    pub fn completed_updates(&self) -> u64 {
        self.completed_updates.load(Ordering::SeqCst)
    }

    /// 设置粒子和调试图形共用的视图投影变换
    pub fn set_view_projection(&mut self, view_projection: Mat4) {
        self.particles.set_view_projection(view_projection);
        self.debug_drawer.set_view_projection(view_projection);
    }

    /// 执行一帧
    pub fn frame(&mut self, updates: usize) -> EngineResult<()> {
        let _span = tracing::debug_span!(target: "engine", "frame", index = self.frame_count).entered();

        let completed = Arc::clone(&self.completed_updates);
        let frame = self.frame_count;
        let on_updated = TaskScheduler::main_thread_callback(Box::new(
            move |result: &AsyncResult| {
                if let Some(Err(e)) = result.outcome() {
                    tracing::warn!(target: "engine", frame, "Particle update failed: {}", e);
                }
                completed.fetch_add(1, Ordering::SeqCst);
            },
        ));

        let update = self.particles.begin_update(updates, 0, Some(on_updated), None)?;
        self.particles.end_update(&update)?;

        let prune = self.particles.begin_prune(None, None)?;
        self.particles.end_prune(&prune)?;

        self.particles.draw()?;
        self.debug_drawer.draw()?;

        let processed = TaskScheduler::shared()?.process_main_thread_tasks();
        if processed > 0 {
            tracing::trace!(target: "engine", processed, "Main thread tasks processed");
        }

        self.frame_count += 1;
        Ok(())
    }

    /// 运行无窗口演示
    pub fn run() -> EngineResult<()> {
        let mut config = EngineConfig::load_or_default();
        config.apply_env_overrides();
        Self::initialize_logging(&config.logging);

        TaskScheduler::install(&config.scheduler)?;

        let device = Arc::new(HeadlessDevice::new());
        let mut engine = Self::new(config, device.clone())?;
        let fountain = Self::spawn_demo_fountain(&mut engine)?;

        let mut rng = rand::thread_rng();
        for _ in 0..DEMO_FRAMES {
            Self::emit(&fountain, &mut rng);

            let drawer = engine.debug_drawer_mut();
            drawer.draw_box(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 0.1, 5.0), Vec4::ONE);
            drawer.draw_arrow(Vec3::ZERO, Vec3::Y * 2.0, Vec4::new(0.0, 1.0, 0.0, 1.0));
            drawer.draw_string(
                Vec2::new(10.0, 30.0),
                format!("particles: {}", fountain.len()),
                Vec4::ONE,
            );

            engine.frame(1)?;
        }

        let stats = device.stats();
        tracing::info!(
            target: "engine",
            frames = engine.frame_count(),
            completed_updates = engine.completed_updates(),
            draw_calls = stats.draw_calls,
            vertices = stats.vertices,
            live_particles = fountain.len(),
            "Demo finished"
        );
        tracing::info!(target: "engine", "Engine shutting down");
        Ok(())
    }

    /// 初始化日志系统
    ///
    /// 配置tracing日志框架，`RUST_LOG` 环境变量优先于配置文件中的级别。
    pub fn initialize_logging(config: &LoggingConfig) {
        if !config.log_to_console {
            return;
        }
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.level.as_filter()));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
        tracing::info!(target: "engine", "Engine starting");
    }

    fn spawn_demo_fountain(engine: &mut Self) -> EngineResult<ParticleSystem<SimpleParticle>> {
        let fountain = ParticleSystem::new(4096);
        fountain.add_affector(GravityAffector::new(SimpleParticleModifier));
        fountain.add_affector(MovementAffector::new(SimpleParticleModifier));

        engine
            .particles_mut()
            .add_particle_system(
                fountain.clone(),
                |particle: &SimpleParticle| particle.position.y < 0.0,
                StreakRenderer::new(0.5),
            )
            .map_err(EngineError::from)?;
        Ok(fountain)
    }

    fn emit(fountain: &ParticleSystem<SimpleParticle>, rng: &mut impl Rng) {
        for _ in 0..DEMO_EMIT_PER_FRAME {
            let velocity = Vec3::new(
                rng.gen_range(-0.05..0.05),
                rng.gen_range(0.2..0.3),
                rng.gen_range(-0.05..0.05),
            );
            let color = Vec4::new(rng.gen_range(0.5..1.0), 0.6, 1.0, 1.0);
            if !fountain.add_particle(SimpleParticle::new(Vec3::ZERO, velocity).with_color(color)) {
                break;
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("frame_count", &self.frame_count)
            .field("completed_updates", &self.completed_updates())
            .field("particles", &self.particles)
            .field("debug_drawer", &self.debug_drawer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::PrimitiveTopology;

    #[test]
    fn test_frame_draws_particles_and_overlay() {
        let device = Arc::new(HeadlessDevice::new());
        let mut engine = Engine::new(EngineConfig::default(), device.clone()).unwrap();
        let fountain = Engine::spawn_demo_fountain(&mut engine).unwrap();
        fountain.add_particle(SimpleParticle::new(Vec3::Y, Vec3::ZERO));
        fountain.add_particle(SimpleParticle::new(Vec3::NEG_Y, Vec3::ZERO));
        engine
            .debug_drawer_mut()
            .draw_box(Vec3::ZERO, Vec3::ONE, Vec4::ONE);

        engine.frame(1).unwrap();

        assert_eq!(engine.frame_count(), 1);
        // 完成回调经主线程队列送回，可能晚于本帧的处理
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while engine.completed_updates() < 1 && std::time::Instant::now() < deadline {
            TaskScheduler::shared().unwrap().process_main_thread_tasks();
            std::thread::yield_now();
        }
        assert_eq!(engine.completed_updates(), 1);
        // 位于地面以下的粒子被修剪
        assert_eq!(fountain.len(), 1);
        let stats = device.stats();
        // 1 个粒子 × 2 顶点 + 盒子 24 顶点
        assert_eq!(stats.vertices_by_topology[&PrimitiveTopology::LineList], 26);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.particles.batch_capacity = 1;
        let result = Engine::new(config, Arc::new(HeadlessDevice::new()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
