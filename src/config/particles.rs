use super::{ConfigError, ConfigResult};
use crate::impl_default;
use serde::{Deserialize, Serialize};

/// 单个图元批次至少要能容纳一个任意拓扑的图元
const MIN_BATCH_CAPACITY: usize = 6;

/// 粒子系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleConfig {
    /// 每个图元批次在一次绘制调用中最多提交的顶点数
    pub batch_capacity: usize,

    /// 异步更新时每个粒子系统使用的线程数（0表示自动）
    pub update_threads: usize,
}

impl_default!(ParticleConfig {
    batch_capacity: 8192,
    update_threads: 0, // 自动
});

impl ParticleConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.batch_capacity < MIN_BATCH_CAPACITY {
            return Err(ConfigError::ValidationError(format!(
                "Primitive batch capacity must be at least {MIN_BATCH_CAPACITY} vertices"
            )));
        }
        if self.update_threads > 256 {
            return Err(ConfigError::ValidationError(
                "Invalid particle update thread count".to_string(),
            ));
        }
        Ok(())
    }

    /// 实际使用的更新线程数
    pub fn effective_update_threads(&self) -> usize {
        if self.update_threads == 0 {
            num_cpus::get()
        } else {
            self.update_threads
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_capacity_validation() {
        let config = ParticleConfig {
            batch_capacity: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_effective_update_threads() {
        let config = ParticleConfig {
            update_threads: 3,
            ..Default::default()
        };
        assert_eq!(config.effective_update_threads(), 3);
        assert!(ParticleConfig::default().effective_update_threads() >= 1);
    }
}
