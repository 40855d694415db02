//! 粒子系统
//!
//! 固定容量的粒子缓冲区加上一组影响器。`ParticleSystem` 是可克隆的句柄，
//! 所有克隆指向同一个粒子系统，管理器按句柄的身份（而不是值）查找粒子系统。
//!
//! ## 更新顺序
//!
//! 1. 可合并的影响器各调用一次，传入全部更新次数
//! 2. 不可合并的影响器按更新次数逐次调用，每次传入 1
//!
//! 异步更新在共享调度器的阻塞线程池上执行，`threads > 1` 时把存活粒子
//! 切分成若干段并行处理。

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;

use crate::core::async_result::{AsyncCallback, AsyncResult, AsyncState};
use crate::core::error::{AffectorError, ParticleError, ParticleResult};
use crate::core::scheduler::TaskScheduler;
use crate::core::sync::{lock, panic_message};

/// 粒子影响器
///
/// 原地修改一段粒子，例如施加重力或按速度移动。
pub trait ParticleAffector<P>: Send + Sync {
    /// 能否一次处理多次更新（`updates > 1`）
    fn is_coalescable(&self) -> bool;

    /// 修改粒子
    fn affect(&self, particles: &mut [P], updates: usize) -> Result<(), AffectorError>;
}

/// 修剪谓词，返回 `true` 表示移除该粒子
pub type PrunePredicate<P> = Arc<dyn Fn(&P) -> bool + Send + Sync>;

/// 粒子系统身份
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticleSystemId(usize);

impl ParticleSystemId {
    #[inline]
    pub(crate) fn raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for ParticleSystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

struct AffectorSet<P> {
    coalescable: Vec<Arc<dyn ParticleAffector<P>>>,
    non_coalescable: Vec<Arc<dyn ParticleAffector<P>>>,
}

impl<P> Clone for AffectorSet<P> {
    fn clone(&self) -> Self {
        Self {
            coalescable: self.coalescable.clone(),
            non_coalescable: self.non_coalescable.clone(),
        }
    }
}

impl<P> AffectorSet<P> {
    fn len(&self) -> usize {
        self.coalescable.len() + self.non_coalescable.len()
    }

    fn apply(&self, particles: &mut [P], updates: usize) -> Result<(), AffectorError> {
        for affector in &self.coalescable {
            affector.affect(particles, updates)?;
        }
        for _ in 0..updates {
            for affector in &self.non_coalescable {
                affector.affect(particles, 1)?;
            }
        }
        Ok(())
    }
}

struct ParticleSystemShared<P> {
    capacity: usize,
    particles: Mutex<Vec<P>>,
    affectors: RwLock<AffectorSet<P>>,
}

impl<P: Send + 'static> ParticleSystemShared<P> {
    fn affectors(&self) -> AffectorSet<P> {
        self.affectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn run_update(&self, updates: usize, threads: usize) -> ParticleResult<()> {
        let affectors = self.affectors();
        let mut particles = lock(&self.particles);
        if particles.is_empty() || affectors.len() == 0 || updates == 0 {
            return Ok(());
        }

        let threads = threads.clamp(1, particles.len());
        if threads == 1 {
            return affectors.apply(&mut particles, updates).map_err(Into::into);
        }

        let chunk_size = particles.len().div_ceil(threads);
        let affectors = &affectors;
        // 各段借用加锁的粒子缓冲区，不能交给要求 'static 的调度器任务
        thread::scope(|scope| {
            let workers: Vec<_> = particles
                .chunks_mut(chunk_size)
                .map(|chunk| scope.spawn(move || affectors.apply(chunk, updates)))
                .collect();

            let mut outcome = Ok(());
            for worker in workers {
                let result = match worker.join() {
                    Ok(result) => result.map_err(ParticleError::from),
                    Err(payload) => Err(ParticleError::Panicked(panic_message(payload.as_ref()))),
                };
                if outcome.is_ok() {
                    outcome = result;
                }
            }
            outcome
        })
    }

    fn run_prune(&self, predicate: &dyn Fn(&P) -> bool) -> usize {
        let mut particles = lock(&self.particles);
        let before = particles.len();
        let mut index = 0;
        while index < particles.len() {
            if predicate(&particles[index]) {
                // 用最后一个存活粒子填补空位
                particles.swap_remove(index);
            } else {
                index += 1;
            }
        }
        before - particles.len()
    }
}

/// 粒子系统
pub struct ParticleSystem<P> {
    shared: Arc<ParticleSystemShared<P>>,
}

impl<P> Clone for ParticleSystem<P> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Send + 'static> ParticleSystem<P> {
    /// 创建容量为 `capacity` 的粒子系统
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(ParticleSystemShared {
                capacity,
                particles: Mutex::new(Vec::with_capacity(capacity)),
                affectors: RwLock::new(AffectorSet {
                    coalescable: Vec::new(),
                    non_coalescable: Vec::new(),
                }),
            }),
        }
    }

    /// 粒子系统身份，所有克隆相同
    pub fn id(&self) -> ParticleSystemId {
        ParticleSystemId(Arc::as_ptr(&self.shared) as *const () as usize)
    }

    /// 两个句柄是否指向同一个粒子系统
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// 存活粒子数
    pub fn len(&self) -> usize {
        lock(&self.shared.particles).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 添加粒子，已满时返回 `false`
    pub fn add_particle(&self, particle: P) -> bool {
        let mut particles = lock(&self.shared.particles);
        if particles.len() >= self.shared.capacity {
            return false;
        }
        particles.push(particle);
        true
    }

    /// 添加影响器
    pub fn add_affector<A>(&self, affector: A)
    where
        A: ParticleAffector<P> + 'static,
    {
        self.add_shared_affector(Arc::new(affector));
    }

    /// 添加一个可能被多个粒子系统共享的影响器
    pub fn add_shared_affector(&self, affector: Arc<dyn ParticleAffector<P>>) {
        let mut affectors = self
            .shared
            .affectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if affector.is_coalescable() {
            affectors.coalescable.push(affector);
        } else {
            affectors.non_coalescable.push(affector);
        }
    }

    /// 移除所有影响器
    pub fn clear_affectors(&self) {
        let mut affectors = self
            .shared
            .affectors
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        affectors.coalescable.clear();
        affectors.non_coalescable.clear();
    }

    pub fn affector_count(&self) -> usize {
        self.shared
            .affectors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// 访问存活粒子
    pub fn with_particles<R>(&self, f: impl FnOnce(&[P]) -> R) -> R {
        f(&lock(&self.shared.particles))
    }

    /// 修改存活粒子
    pub fn with_particles_mut<R>(&self, f: impl FnOnce(&mut [P]) -> R) -> R {
        f(&mut lock(&self.shared.particles))
    }

    /// 同步更新
    pub fn update(&self, updates: usize) -> ParticleResult<()> {
        self.shared.run_update(updates, 1)
    }

    /// 同步修剪，返回移除的粒子数
    pub fn prune<F>(&self, predicate: F) -> usize
    where
        F: Fn(&P) -> bool,
    {
        self.shared.run_prune(&predicate)
    }

    /// 开始异步更新
    pub fn begin_update(
        &self,
        updates: usize,
        threads: usize,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<AsyncResult> {
        let shared = Arc::clone(&self.shared);
        self.dispatch(callback, state, move || shared.run_update(updates, threads))
    }

    /// 结束异步更新，阻塞直到完成
    pub fn end_update(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()> {
        self.end(handle)
    }

    /// 开始异步修剪
    pub fn begin_prune(
        &self,
        predicate: PrunePredicate<P>,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<AsyncResult> {
        let shared = Arc::clone(&self.shared);
        self.dispatch(callback, state, move || {
            let removed = shared.run_prune(predicate.as_ref());
            tracing::trace!(target: "particles", removed, "Particles pruned");
            Ok(())
        })
    }

    /// 结束异步修剪，阻塞直到完成
    pub fn end_prune(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()> {
        self.end(handle)
    }

    fn dispatch<F>(
        &self,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
        job: F,
    ) -> Arc<AsyncResult>
    where
        F: FnOnce() -> ParticleResult<()> + Send + 'static,
    {
        let result = AsyncResult::owned(self.id().raw(), callback, state);
        match TaskScheduler::shared() {
            Ok(scheduler) => {
                let pending = Arc::clone(&result);
                scheduler.spawn_blocking(move || {
                    let outcome = catch_unwind(AssertUnwindSafe(job)).unwrap_or_else(|payload| {
                        Err(ParticleError::Panicked(panic_message(payload.as_ref())))
                    });
                    pending.complete(outcome);
                });
            }
            Err(e) => result.complete(Err(e.into())),
        }
        result
    }

    fn end(&self, handle: &Arc<AsyncResult>) -> ParticleResult<()> {
        if !handle.is_owned_by(self.id().raw()) {
            return Err(ParticleError::ForeignHandle("particle system"));
        }
        handle.wait()
    }
}

impl<P> fmt::Debug for ParticleSystem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParticleSystem")
            .field("capacity", &self.shared.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Increment {
        coalescable: bool,
        calls: Arc<AtomicUsize>,
    }

    impl ParticleAffector<u32> for Increment {
        fn is_coalescable(&self) -> bool {
            self.coalescable
        }

        fn affect(&self, particles: &mut [u32], updates: usize) -> Result<(), AffectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            for particle in particles {
                *particle += updates as u32;
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl fmt::Display for Broken {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "broken affector")
        }
    }

    impl std::error::Error for Broken {}

    struct Failing;

    impl ParticleAffector<u32> for Failing {
        fn is_coalescable(&self) -> bool {
            true
        }

        fn affect(&self, _particles: &mut [u32], _updates: usize) -> Result<(), AffectorError> {
            Err(AffectorError::new(Broken))
        }
    }

    struct Panicking;

    impl ParticleAffector<u32> for Panicking {
        fn is_coalescable(&self) -> bool {
            true
        }

        fn affect(&self, _particles: &mut [u32], _updates: usize) -> Result<(), AffectorError> {
            panic!("affector exploded");
        }
    }

    fn filled(capacity: usize) -> ParticleSystem<u32> {
        let system = ParticleSystem::new(capacity);
        for _ in 0..capacity {
            assert!(system.add_particle(0));
        }
        system
    }

    #[test]
    fn test_capacity_is_enforced() {
        let system = ParticleSystem::new(2);
        assert!(system.add_particle(1u32));
        assert!(system.add_particle(2u32));
        assert!(!system.add_particle(3u32));
        assert_eq!(system.len(), 2);
    }

    #[test]
    fn test_identity_shared_by_clones() {
        let a = ParticleSystem::<u32>::new(4);
        let b = a.clone();
        let c = ParticleSystem::<u32>::new(4);
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn test_coalescable_affector_called_once() {
        let system = filled(8);
        let coalescable = Arc::new(AtomicUsize::new(0));
        let single = Arc::new(AtomicUsize::new(0));
        system.add_affector(Increment {
            coalescable: true,
            calls: coalescable.clone(),
        });
        system.add_affector(Increment {
            coalescable: false,
            calls: single.clone(),
        });

        system.update(3).unwrap();

        assert_eq!(coalescable.load(Ordering::SeqCst), 1);
        assert_eq!(single.load(Ordering::SeqCst), 3);
        system.with_particles(|particles| assert!(particles.iter().all(|&p| p == 6)));
    }

    #[test]
    fn test_clear_affectors_stops_updates() {
        let system = filled(4);
        let calls = Arc::new(AtomicUsize::new(0));
        system.add_affector(Increment {
            coalescable: true,
            calls: calls.clone(),
        });
        system.add_affector(Failing);
        assert_eq!(system.affector_count(), 2);

        system.clear_affectors();
        assert_eq!(system.affector_count(), 0);
        system.update(5).unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        system.with_particles(|particles| assert!(particles.iter().all(|&p| p == 0)));
    }

    #[test]
    fn test_update_error_propagates() {
        let system = filled(4);
        system.add_affector(Failing);
        match system.update(1) {
            Err(ParticleError::Affector(e)) => assert!(e.downcast_ref::<Broken>().is_some()),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_prune_moves_last_particle_into_gap() {
        let system = ParticleSystem::new(5);
        for value in [1u32, 2, 3, 4, 5] {
            system.add_particle(value);
        }

        let removed = system.prune(|&p| p == 2 || p == 4);

        assert_eq!(removed, 2);
        system.with_particles(|particles| assert_eq!(particles, &[1, 5, 3]));
    }

    #[test]
    fn test_threaded_async_update() {
        let system = filled(1000);
        let calls = Arc::new(AtomicUsize::new(0));
        system.add_affector(Increment {
            coalescable: true,
            calls: calls.clone(),
        });

        let handle = system.begin_update(2, 4, None, None);
        system.end_update(&handle).unwrap();

        assert!(handle.is_completed());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        system.with_particles(|particles| assert!(particles.iter().all(|&p| p == 2)));
    }

    #[test]
    fn test_async_prune() {
        let system = ParticleSystem::new(10);
        for value in 0..10u32 {
            system.add_particle(value);
        }

        let handle = system.begin_prune(Arc::new(|&p: &u32| p % 2 == 0), None, None);
        system.end_prune(&handle).unwrap();

        assert_eq!(system.len(), 5);
    }

    #[test]
    fn test_async_panic_becomes_error() {
        let system = filled(4);
        system.add_affector(Panicking);
        let handle = system.begin_update(1, 1, None, None);
        assert!(matches!(
            system.end_update(&handle),
            Err(ParticleError::Panicked(message)) if message.contains("exploded")
        ));
        // 锁中毒不影响后续访问
        assert_eq!(system.len(), 4);
    }

    #[test]
    fn test_foreign_handle_rejected() {
        let a = filled(2);
        let b = filled(2);
        let handle = a.begin_update(1, 1, None, None);
        assert!(matches!(
            b.end_update(&handle),
            Err(ParticleError::ForeignHandle(_))
        ));
        a.end_update(&handle).unwrap();
    }
}
