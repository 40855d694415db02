//! 同步原语
//!
//! - `WaitHandle`: 手动重置事件，异步操作完成时置位
//! - `lock`: 忽略中毒状态的互斥锁获取（工作线程的 panic 已被转换为错误）

use std::any::Any;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// 获取互斥锁，忽略中毒状态
#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 从 panic 负载中提取消息
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// 手动重置事件
///
/// 置位后所有等待者被唤醒，直到显式 `reset` 之前保持置位状态。
#[derive(Debug, Default)]
pub struct WaitHandle {
    signaled: Mutex<bool>,
    condvar: Condvar,
}

impl WaitHandle {
    /// 创建事件，`signaled` 为初始状态
    pub fn new(signaled: bool) -> Self {
        Self {
            signaled: Mutex::new(signaled),
            condvar: Condvar::new(),
        }
    }

    /// 置位并唤醒所有等待者
    pub fn set(&self) {
        let mut signaled = lock(&self.signaled);
        *signaled = true;
        self.condvar.notify_all();
    }

    /// 复位
    pub fn reset(&self) {
        *lock(&self.signaled) = false;
    }

    /// 是否已置位（不阻塞）
    pub fn is_set(&self) -> bool {
        *lock(&self.signaled)
    }

    /// 阻塞直到置位
    pub fn wait(&self) {
        let mut signaled = lock(&self.signaled);
        while !*signaled {
            signaled = self
                .condvar
                .wait(signaled)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// 阻塞直到置位或超时，返回是否已置位
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = lock(&self.signaled);
        let (signaled, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |signaled| !*signaled)
            .unwrap_or_else(PoisonError::into_inner);
        *signaled
    }
}
