use super::{ConfigError, ConfigResult};
use crate::impl_default;
use crate::render::debug::SolidArrowVertexGenerator;
use serde::{Deserialize, Serialize};

/// 调试绘制配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugDrawerConfig {
    /// 调试顶点缓冲区容量（三角形和线段共享）
    pub max_vertices: usize,

    /// 缓冲区溢出时是否在屏幕上显示警告
    pub overflow_warning: bool,

    /// 溢出警告的屏幕位置
    pub warning_position: [f32; 2],
}

impl_default!(DebugDrawerConfig {
    max_vertices: 8192,
    overflow_warning: true,
    warning_position: [10.0, 10.0],
});

impl DebugDrawerConfig {
    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        // 缓冲区至少要能放下最大的单个图形
        if self.max_vertices < SolidArrowVertexGenerator::VERTEX_COUNT {
            return Err(ConfigError::ValidationError(format!(
                "Debug vertex buffer must hold at least {} vertices",
                SolidArrowVertexGenerator::VERTEX_COUNT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_config_validation() {
        assert!(DebugDrawerConfig::default().validate().is_ok());

        let config = DebugDrawerConfig {
            max_vertices: 100,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
