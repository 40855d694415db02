//! 统一错误处理模块
//!
//! 提供框架范围内的统一错误类型定义
//!
//! ## 错误类型分层
//!
//! - **配置错误**: 重复注册顶点类型、注销未注册的类型、移除未添加的粒子系统、
//!   传入外来的异步句柄等，在引发错误的调用处立即返回
//! - **运行错误**: 影响器在更新/修剪过程中失败，在对应的 `end_*` 调用处原样返回
//! - **布局推断错误**: 无法从顶点类型的字段元数据推断布局，直接向调用者传播
//!
//! 调试顶点缓冲区溢出不是错误，见 `render::debug`。
//!
//! `EngineError` 可以同时承载以上所有错误。

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::config::ConfigError;

/// 引擎顶层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Particle error: {0}")]
    Particle(#[from] ParticleError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// 渲染系统错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("Draw call failed: {0}")]
    Draw(String),

    #[error("Cannot infer a vertex layout for {type_name}: {reason}")]
    LayoutInference {
        type_name: &'static str,
        reason: String,
    },

    #[error("Invalid vertex layout for {type_name}: {reason}")]
    InvalidLayout {
        type_name: &'static str,
        reason: String,
    },

    #[error("Vertex type {0} is already registered")]
    DuplicateVertexRegistration(&'static str),

    #[error("Vertex type {0} is not registered")]
    VertexNotRegistered(&'static str),

    #[error("No primitive batch exists for vertex type {0}")]
    MissingBatch(&'static str),

    #[error("Invalid render state: {0}")]
    InvalidState(String),
}

/// 影响器抛出的错误
///
/// 以 `Arc` 保存原始错误，使得在 `end_update`/`end_prune` 处返回的错误与
/// 影响器返回的错误是同一个对象。
#[derive(Clone)]
pub struct AffectorError(Arc<dyn StdError + Send + Sync>);

impl AffectorError {
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self(Arc::new(error))
    }

    /// 从已共享的错误创建，保留其身份
    pub fn from_shared(error: Arc<dyn StdError + Send + Sync>) -> Self {
        Self(error)
    }

    /// 原始错误
    pub fn inner(&self) -> &Arc<dyn StdError + Send + Sync> {
        &self.0
    }

    /// 尝试将原始错误向下转型
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for AffectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AffectorError").field(&self.0).finish()
    }
}

impl fmt::Display for AffectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 粒子系统错误
#[derive(Error, Debug, Clone)]
pub enum ParticleError {
    #[error("Particle system {0} is already registered")]
    DuplicateSystem(String),

    #[error("Particle system {0} is not registered")]
    UnknownSystem(String),

    #[error("The async handle was not issued by this {0}")]
    ForeignHandle(&'static str),

    #[error("An asynchronous {0} is already running")]
    AsyncBusy(&'static str),

    #[error("Cannot {0} while an asynchronous update or prune is in flight")]
    OperationInFlight(&'static str),

    #[error("Affector failed: {0}")]
    Affector(AffectorError),

    #[error("Particle worker panicked: {0}")]
    Panicked(String),

    #[error("Scheduler unavailable: {0}")]
    Scheduler(String),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),
}

impl From<AffectorError> for ParticleError {
    fn from(error: AffectorError) -> Self {
        Self::Affector(error)
    }
}

impl From<SchedulerError> for ParticleError {
    fn from(error: SchedulerError) -> Self {
        Self::Scheduler(error.to_string())
    }
}

/// 任务调度器错误
#[derive(Error, Debug, Clone)]
pub enum SchedulerError {
    #[error("Failed to build runtime: {0}")]
    Runtime(String),
}

/// 引擎结果类型别名
pub type EngineResult<T> = Result<T, EngineError>;
pub type RenderResult<T> = Result<T, RenderError>;
pub type ParticleResult<T> = Result<T, ParticleError>;
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom")
        }
    }

    impl StdError for Boom {}

    #[test]
    fn test_error_conversion() {
        let render_err = RenderError::VertexNotRegistered("Foo");
        let particle_err: ParticleError = render_err.into();
        assert!(matches!(particle_err, ParticleError::Render(_)));

        let engine_err: EngineError = particle_err.into();
        assert!(matches!(engine_err, EngineError::Particle(_)));
    }

    #[test]
    fn test_error_display() {
        let err = RenderError::DuplicateVertexRegistration("PositionColorVertex");
        assert_eq!(
            err.to_string(),
            "Vertex type PositionColorVertex is already registered"
        );
    }

    #[test]
    fn test_affector_error_keeps_identity() {
        let shared: Arc<dyn StdError + Send + Sync> = Arc::new(Boom);
        let err = ParticleError::from(AffectorError::from_shared(shared.clone()));
        let cloned = err.clone();

        match cloned {
            ParticleError::Affector(inner) => {
                assert!(Arc::ptr_eq(inner.inner(), &shared));
                assert!(inner.downcast_ref::<Boom>().is_some());
                assert_eq!(inner.to_string(), "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
