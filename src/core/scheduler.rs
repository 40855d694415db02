//! 任务调度系统
//!
//! 粒子系统的异步更新/修剪都在这里执行。
//!
//! ## 功能特性
//!
//! - 异步任务（管理器的顺序执行链）
//! - 阻塞任务（粒子缓冲区上的影响器计算）
//! - 主线程回调（`main_thread_callback` 把完成回调送回游戏循环）
//! - 进程级共享实例

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use super::async_result::{AsyncCallback, AsyncResult};
use super::error::{SchedulerError, SchedulerResult};
use super::sync::lock;
use crate::config::SchedulerConfig;

/// 任务 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(pub u64);

/// 主线程任务
type MainThreadTask = Box<dyn FnOnce() + Send + 'static>;

static SHARED: OnceLock<TaskScheduler> = OnceLock::new();
static SHARED_INIT: Mutex<()> = Mutex::new(());

/// 任务调度器
///
/// 管理后台任务和主线程回调。
///
/// # 示例
///
/// ```ignore
/// let scheduler = TaskScheduler::new(4)?;
///
/// // 后台任务
/// scheduler.spawn(async {
///     // 异步操作
/// });
///
/// // 主线程回调
/// scheduler.run_on_main_thread(|| {
///     // 必须在主线程执行的操作
/// });
/// scheduler.process_main_thread_tasks();
/// ```
pub struct TaskScheduler {
    /// Tokio 运行时
    runtime: tokio::runtime::Runtime,
    /// 主线程任务接收器
    main_thread_rx: Receiver<MainThreadTask>,
    /// 主线程任务发送器
    main_thread_tx: Sender<MainThreadTask>,
    /// 下一个任务 ID
    next_task_id: AtomicU64,
    /// 工作线程数
    worker_count: usize,
}

impl TaskScheduler {
    /// 创建任务调度器
    ///
    /// # 参数
    /// - `worker_threads`: 工作线程数量，0 表示使用 CPU 核心数
    pub fn new(worker_threads: usize) -> SchedulerResult<Self> {
        let workers = if worker_threads == 0 {
            num_cpus::get()
        } else {
            worker_threads
        };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name("nuclex-worker")
            .enable_all()
            .build()
            .map_err(|e| SchedulerError::Runtime(e.to_string()))?;

        let (main_thread_tx, main_thread_rx) = unbounded();

        tracing::debug!(target: "scheduler", workers, "Task scheduler created");

        Ok(Self {
            runtime,
            main_thread_rx,
            main_thread_tx,
            next_task_id: AtomicU64::new(1),
            worker_count: workers,
        })
    }

    /// 按配置安装进程级共享调度器
    ///
    /// 如果共享调度器已经存在，直接返回已有实例。
    pub fn install(config: &SchedulerConfig) -> SchedulerResult<&'static TaskScheduler> {
        if let Some(scheduler) = SHARED.get() {
            return Ok(scheduler);
        }

        let _guard = lock(&SHARED_INIT);
        if let Some(scheduler) = SHARED.get() {
            return Ok(scheduler);
        }

        let scheduler = Self::new(config.worker_threads)?;
        tracing::info!(
            target: "scheduler",
            workers = scheduler.worker_count(),
            "Shared task scheduler installed"
        );
        Ok(SHARED.get_or_init(|| scheduler))
    }

    /// 进程级共享调度器，首次访问时以默认配置创建
    pub fn shared() -> SchedulerResult<&'static TaskScheduler> {
        Self::install(&SchedulerConfig::default())
    }

    fn next_id(&self) -> TaskId {
        TaskId(self.next_task_id.fetch_add(1, Ordering::SeqCst))
    }

    /// 在运行时上执行异步任务
    pub fn spawn<F>(&self, task: F) -> TaskId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_id();
        self.runtime.spawn(task);
        id
    }

    /// 在阻塞线程池上执行同步任务
    ///
    /// 影响器计算属于 CPU 密集型操作，不能占用异步工作线程。
    pub fn spawn_blocking<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id();
        self.runtime.spawn_blocking(task);
        id
    }

    /// 在主线程执行任务
    ///
    /// 任务不会立即执行，需要在主循环中调用 `process_main_thread_tasks()`。
    pub fn run_on_main_thread<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let _ = self.main_thread_tx.send(Box::new(task));
    }

    /// 处理主线程任务队列（应在主循环中调用），返回处理的任务数
    pub fn process_main_thread_tasks(&self) -> usize {
        let mut processed = 0;
        while let Ok(task) = self.main_thread_rx.try_recv() {
            task();
            processed += 1;
        }
        processed
    }

    /// 获取工作线程数
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// 把完成回调转交到主线程执行
    ///
    /// 返回的回调在操作完成时把本轮结果的快照投递到共享调度器的主线程队列，
    /// `callback` 在游戏循环调用 `process_main_thread_tasks()` 时才执行。
    pub fn main_thread_callback(callback: AsyncCallback) -> AsyncCallback {
        Box::new(move |result: &AsyncResult| {
            let snapshot = result.snapshot();
            match Self::shared() {
                Ok(scheduler) => scheduler.run_on_main_thread(move || callback(&snapshot)),
                Err(e) => tracing::error!(
                    target: "scheduler",
                    "Completion callback dropped, scheduler unavailable: {}",
                    e
                ),
            }
        })
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("worker_count", &self.worker_count)
            .finish_non_exhaustive()
    }
}
