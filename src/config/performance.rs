use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 工作线程数（0表示自动）
    pub worker_threads: usize,
}

impl_default!(SchedulerConfig {
    worker_threads: 0, // 自动
});

impl SchedulerConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_threads > 256 {
            return Err(ConfigError::ValidationError(
                "Invalid worker thread count".to_string(),
            ));
        }
        Ok(())
    }
}
