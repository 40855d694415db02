//! 异步操作结果
//!
//! 实现 begin/end 风格的异步协议：`begin_*` 立即返回一个 `AsyncResult`，
//! `end_*` 阻塞直到操作完成并原样返回捕获的错误。
//!
//! 同一个结果既可以阻塞等待（`wait`），也可以作为 `Future` 等待（`completion`），
//! 粒子系统管理器的顺序执行链正是通过后者串联各个粒子系统的。
//!
//! 完成回调拿到的是本轮结果的快照：可复用的结果在回调运行期间被重新装填，
//! 也不会影响回调看到的结果和状态。

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::task::{Context, Poll, Waker};

use super::error::ParticleError;
use super::sync::{lock, panic_message, WaitHandle};

/// 用户附加在异步操作上的状态
pub type AsyncState = Arc<dyn Any + Send + Sync>;

/// 异步操作完成回调，每次操作恰好调用一次
pub type AsyncCallback = Box<dyn FnOnce(&AsyncResult) + Send + 'static>;

/// 异步操作的最终结果
pub type AsyncOutcome = Result<(), ParticleError>;

#[derive(Default)]
struct AsyncInner {
    outcome: Option<AsyncOutcome>,
    callback: Option<AsyncCallback>,
    state: Option<AsyncState>,
    wakers: Vec<Waker>,
}

/// 进行中的异步操作
pub struct AsyncResult {
    /// 发起方标识，0 表示匿名
    owner: usize,
    completed: AtomicBool,
    inner: Mutex<AsyncInner>,
    wait_handle: OnceLock<Arc<WaitHandle>>,
}

impl AsyncResult {
    /// 创建一个尚未完成的操作
    pub fn new(callback: Option<AsyncCallback>, state: Option<AsyncState>) -> Arc<Self> {
        Arc::new(Self::idle(callback, state))
    }

    /// 创建一个带发起方标识的操作，`end_*` 据此拒绝外来的句柄
    pub fn owned(
        owner: usize,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<Self> {
        let mut result = Self::idle(callback, state);
        result.owner = owner;
        Arc::new(result)
    }

    /// 是否由 `owner` 发起
    #[inline]
    pub fn is_owned_by(&self, owner: usize) -> bool {
        self.owner != 0 && self.owner == owner
    }

    /// 创建一个已经失败的操作（回调会立即被调用）
    pub fn failed(
        error: ParticleError,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) -> Arc<Self> {
        let result = Self::new(callback, state);
        result.complete(Err(error));
        result
    }

    pub(crate) fn idle(callback: Option<AsyncCallback>, state: Option<AsyncState>) -> Self {
        Self {
            owner: 0,
            completed: AtomicBool::new(false),
            inner: Mutex::new(AsyncInner {
                callback,
                state,
                ..Default::default()
            }),
            wait_handle: OnceLock::new(),
        }
    }

    /// 已完成操作的独立副本，只携带结果和状态
    pub(crate) fn snapshot(&self) -> Self {
        self.snapshot_of(&lock(&self.inner))
    }

    fn snapshot_of(&self, inner: &AsyncInner) -> Self {
        Self {
            owner: self.owner,
            completed: AtomicBool::new(inner.outcome.is_some()),
            inner: Mutex::new(AsyncInner {
                outcome: inner.outcome.clone(),
                state: inner.state.clone(),
                ..Default::default()
            }),
            wait_handle: OnceLock::new(),
        }
    }

    /// 重新装填一个可复用的结果
    ///
    /// 在持有结果锁的情况下先调用 `admit`，成功后才重新装填。
    ///
    /// `admit` 与 `complete_then` 的 `on_stored` 在同一把锁下运行，
    /// 两者对外部阶段的修改不会交错。
    pub(crate) fn restart_if<E>(
        &self,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
        admit: impl FnOnce() -> Result<(), E>,
    ) -> Result<(), E> {
        let mut inner = lock(&self.inner);
        admit()?;
        self.rearm(&mut inner, callback, state);
        Ok(())
    }

    fn rearm(
        &self,
        inner: &mut AsyncInner,
        callback: Option<AsyncCallback>,
        state: Option<AsyncState>,
    ) {
        inner.outcome = None;
        inner.callback = callback;
        inner.state = state;
        inner.wakers.clear();
        self.completed.store(false, Ordering::SeqCst);
        if let Some(handle) = self.wait_handle.get() {
            handle.reset();
        }
    }

    /// 标记操作完成
    ///
    /// 保存结果并置位等待句柄（同一把锁下），然后唤醒 future，
    /// 最后用本轮结果的快照调用回调。对同一轮操作的重复调用会被忽略。
    pub fn complete(&self, outcome: AsyncOutcome) {
        self.complete_then(outcome, || {});
    }

    /// 与 `complete` 相同，`on_stored` 在保存结果的同一把锁下、发出信号之前调用
    pub(crate) fn complete_then(&self, outcome: AsyncOutcome, on_stored: impl FnOnce()) {
        let (callback, wakers, snapshot) = {
            let mut inner = lock(&self.inner);
            if self.completed.load(Ordering::SeqCst) {
                return;
            }
            inner.outcome = Some(outcome);
            self.completed.store(true, Ordering::SeqCst);
            on_stored();
            if let Some(handle) = self.wait_handle.get() {
                handle.set();
            }

            let callback = inner.callback.take();
            let snapshot = callback.as_ref().map(|_| self.snapshot_of(&inner));
            (callback, std::mem::take(&mut inner.wakers), snapshot)
        };

        for waker in wakers {
            waker.wake();
        }
        if let (Some(callback), Some(snapshot)) = (callback, snapshot) {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback(&snapshot))) {
                tracing::error!(
                    target: "scheduler",
                    "Async completion callback panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    /// 操作是否已完成（不阻塞）
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// 总是 `false`：操作总是在调度器上逐步完成
    #[inline]
    pub fn completed_synchronously(&self) -> bool {
        false
    }

    /// 调用 `begin_*` 时附加的用户状态
    pub fn async_state(&self) -> Option<AsyncState> {
        lock(&self.inner).state.clone()
    }

    /// 等待句柄，首次访问时创建
    pub fn wait_handle(&self) -> Arc<WaitHandle> {
        let handle = self
            .wait_handle
            .get_or_init(|| Arc::new(WaitHandle::new(false)));
        // 创建与 complete() 并发时补发信号
        if lock(&self.inner).outcome.is_some() {
            handle.set();
        }
        Arc::clone(handle)
    }

    /// 阻塞直到完成，返回操作结果
    pub fn wait(&self) -> AsyncOutcome {
        loop {
            if let Some(outcome) = self.outcome() {
                return outcome;
            }
            self.wait_handle().wait();
        }
    }

    /// 已完成操作的结果，未完成时为 `None`
    pub fn outcome(&self) -> Option<AsyncOutcome> {
        lock(&self.inner).outcome.clone()
    }

    /// 以 `Future` 的方式等待完成
    pub fn completion(self: &Arc<Self>) -> Completion<Self> {
        Completion::new(Arc::clone(self))
    }

    fn poll_outcome(&self, cx: &mut Context<'_>) -> Poll<AsyncOutcome> {
        let mut inner = lock(&self.inner);
        if let Some(outcome) = inner.outcome.clone() {
            return Poll::Ready(outcome);
        }
        if !inner.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            inner.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl AsRef<AsyncResult> for AsyncResult {
    fn as_ref(&self) -> &AsyncResult {
        self
    }
}

impl fmt::Debug for AsyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncResult")
            .field("completed", &self.is_completed())
            .finish_non_exhaustive()
    }
}

/// 等待某个异步结果完成的 future
pub struct Completion<T: AsRef<AsyncResult>> {
    source: Arc<T>,
}

impl<T: AsRef<AsyncResult>> Completion<T> {
    pub(crate) fn new(source: Arc<T>) -> Self {
        Self { source }
    }
}

impl<T: AsRef<AsyncResult>> Future for Completion<T> {
    type Output = AsyncOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        (*self.source).as_ref().poll_outcome(cx)
    }
}
