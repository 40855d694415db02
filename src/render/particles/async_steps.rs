//! 顺序异步步骤
//!
//! 管理器的异步更新/修剪会依次在每个粒子系统上执行：开始第 k 个粒子系统的操作，
//! 等它完成并取回结果，再开始第 k+1 个。任何一步失败都会立刻结束整条链，
//! 后面的粒子系统在本轮中不再处理。
//!
//! 每个管理器为更新和修剪各保留一个 `AsyncStepResult`，每轮操作复用同一个实例。

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;

use super::holder::ParticleSystemHolder;
use crate::core::async_result::{
    AsyncCallback, AsyncOutcome, AsyncResult, AsyncState, Completion,
};
use crate::core::error::{ParticleError, ParticleResult};
use crate::core::scheduler::TaskScheduler;
use crate::core::sync::{lock, panic_message, WaitHandle};

/// 在每个粒子系统上执行的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOperation {
    Update { updates: usize, threads: usize },
    Prune,
}

impl StepOperation {
    fn name(self) -> &'static str {
        match self {
            StepOperation::Update { .. } => "update",
            StepOperation::Prune => "prune",
        }
    }
}

/// 步骤链所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Idle,
    Running,
    Completed { faulted: bool },
}

/// 可复用的多步异步操作结果
pub struct AsyncStepResult {
    label: &'static str,
    phase: Mutex<StepPhase>,
    current_step: AtomicIsize,
    step_count: AtomicUsize,
    result: AsyncResult,
}

impl AsyncStepResult {
    pub fn new(label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            label,
            phase: Mutex::new(StepPhase::Idle),
            current_step: AtomicIsize::new(-1),
            step_count: AtomicUsize::new(0),
            result: AsyncResult::idle(None, None),
        })
    }

    /// 开始新一轮操作
    ///
    /// 只能在 `Idle` 或 `Completed` 阶段调用。
    pub fn start(
        self: &Arc<Self>,
        holders: Vec<Arc<dyn ParticleSystemHolder>>,
        operation: StepOperation,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> ParticleResult<()> {
        self.result.restart_if(callback, state, || {
            let mut phase = lock(&self.phase);
            if *phase == StepPhase::Running {
                return Err(ParticleError::AsyncBusy(self.label));
            }
            *phase = StepPhase::Running;
            self.current_step.store(-1, Ordering::SeqCst);
            self.step_count.store(holders.len(), Ordering::SeqCst);
            Ok(())
        })?;

        tracing::debug!(
            target: "particles",
            operation = operation.name(),
            steps = holders.len(),
            "Async step chain started"
        );

        match TaskScheduler::shared() {
            Ok(scheduler) => {
                let this = Arc::clone(self);
                scheduler.spawn(async move {
                    let outcome = AssertUnwindSafe(this.run_chain(&holders, operation))
                        .catch_unwind()
                        .await
                        .unwrap_or_else(|payload| {
                            Err(ParticleError::Panicked(panic_message(payload.as_ref())))
                        });
                    this.finish(outcome);
                });
            }
            Err(e) => self.finish(Err(e.into())),
        }
        Ok(())
    }

    async fn run_chain(
        &self,
        holders: &[Arc<dyn ParticleSystemHolder>],
        operation: StepOperation,
    ) -> AsyncOutcome {
        for (index, holder) in holders.iter().enumerate() {
            self.current_step.store(index as isize, Ordering::SeqCst);
            match operation {
                StepOperation::Update { updates, threads } => {
                    let handle = holder.begin_update(updates, threads, None, None);
                    // 失败通过 end_update 取回
                    let _ = handle.completion().await;
                    holder.end_update(&handle)?;
                }
                StepOperation::Prune => {
                    let handle = holder.begin_prune(None, None);
                    let _ = handle.completion().await;
                    holder.end_prune(&handle)?;
                }
            }
        }
        self.current_step.store(holders.len() as isize, Ordering::SeqCst);
        Ok(())
    }

    fn finish(&self, outcome: AsyncOutcome) {
        if let Err(e) = &outcome {
            tracing::warn!(
                target: "particles",
                chain = self.label,
                step = self.current_step(),
                error = %e,
                "Async step chain faulted"
            );
        }
        let faulted = outcome.is_err();
        // 等待者被唤醒时阶段必须已经是 Completed，且不会与下一轮 start 交错
        self.result.complete_then(outcome, || {
            *lock(&self.phase) = StepPhase::Completed { faulted };
        });
    }

    pub fn phase(&self) -> StepPhase {
        *lock(&self.phase)
    }

    pub fn is_running(&self) -> bool {
        self.phase() == StepPhase::Running
    }

    /// 正在处理的粒子系统下标，开始前为 -1，成功结束后等于步骤数
    pub fn current_step(&self) -> isize {
        self.current_step.load(Ordering::SeqCst)
    }

    pub fn step_count(&self) -> usize {
        self.step_count.load(Ordering::SeqCst)
    }

    pub fn is_completed(&self) -> bool {
        self.result.is_completed()
    }

    pub fn completed_synchronously(&self) -> bool {
        self.result.completed_synchronously()
    }

    pub fn async_state(&self) -> Option<AsyncState> {
        self.result.async_state()
    }

    pub fn wait_handle(&self) -> Arc<WaitHandle> {
        self.result.wait_handle()
    }

    /// 阻塞直到整条链结束
    pub fn wait(&self) -> AsyncOutcome {
        self.result.wait()
    }

    pub fn outcome(&self) -> Option<AsyncOutcome> {
        self.result.outcome()
    }

    pub fn completion(self: &Arc<Self>) -> Completion<Self> {
        Completion::new(Arc::clone(self))
    }
}

impl AsRef<AsyncResult> for AsyncStepResult {
    fn as_ref(&self) -> &AsyncResult {
        &self.result
    }
}

impl fmt::Debug for AsyncStepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncStepResult")
            .field("label", &self.label)
            .field("phase", &self.phase())
            .field("current_step", &self.current_step())
            .field("step_count", &self.step_count())
            .finish()
    }
}
