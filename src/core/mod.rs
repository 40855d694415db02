//! 核心模块
//!
//! 包含框架的核心功能：
//! - `engine` - 主入口和演示循环
//! - `error` - 错误类型定义
//! - `scheduler` - 任务调度系统
//! - `async_result` - begin/end 风格的异步操作结果
//! - `sync` - 同步原语

pub mod async_result;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod sync;
#[macro_use]
pub mod macros;

// 重新导出错误类型
pub use error::{
    AffectorError, EngineError, EngineResult, ParticleError, ParticleResult, RenderError,
    RenderResult, SchedulerError, SchedulerResult,
};

// 重新导出主要类型
pub use async_result::{AsyncCallback, AsyncOutcome, AsyncResult, AsyncState, Completion};
pub use engine::Engine;
pub use scheduler::{TaskId, TaskScheduler};
pub use sync::WaitHandle;
