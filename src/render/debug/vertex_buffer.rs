//! 调试顶点缓冲区
//!
//! 一块固定大小的顶点数组，三角形顶点从头部向后增长，线段顶点从尾部向前增长，
//! 两个游标相遇即视为溢出。溢出不是错误：本次写入被丢弃，溢出标志保持到下次 `reset()`。

use std::ops::Range;

use thiserror::Error;

use crate::render::vertex::PositionColorVertex;

/// 预留失败：剩余空间不足
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("debug vertex buffer overflow: requested {requested} vertices, {remaining} remaining")]
pub struct VertexBufferOverflow {
    pub requested: usize,
    pub remaining: usize,
}

/// 双向增长的调试顶点缓冲区
#[derive(Debug, Clone)]
pub struct DebugVertexBuffer {
    vertices: Vec<PositionColorVertex>,
    /// 下一个三角形顶点的位置
    triangle_end: usize,
    /// 最后写入的线段顶点的位置
    line_start: usize,
    overflowed: bool,
}

impl DebugVertexBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            vertices: vec![PositionColorVertex::default(); capacity],
            triangle_end: 0,
            line_start: capacity,
            overflowed: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.vertices.len()
    }

    /// 两个游标之间的剩余顶点数
    pub fn remaining(&self) -> usize {
        self.line_start - self.triangle_end
    }

    /// 本帧是否发生过溢出
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// 从头部预留 `count` 个三角形顶点
    pub fn try_reserve_triangle_vertices(
        &mut self,
        count: usize,
    ) -> Result<Range<usize>, VertexBufferOverflow> {
        self.check(count)?;
        let range = self.triangle_end..self.triangle_end + count;
        self.triangle_end = range.end;
        Ok(range)
    }

    /// 从尾部预留 `count` 个线段顶点
    pub fn try_reserve_line_vertices(
        &mut self,
        count: usize,
    ) -> Result<Range<usize>, VertexBufferOverflow> {
        self.check(count)?;
        let range = self.line_start - count..self.line_start;
        self.line_start = range.start;
        Ok(range)
    }

    fn check(&mut self, count: usize) -> Result<(), VertexBufferOverflow> {
        let remaining = self.remaining();
        if count > remaining {
            self.overflowed = true;
            return Err(VertexBufferOverflow {
                requested: count,
                remaining,
            });
        }
        Ok(())
    }

    /// 整块缓冲区，生成器按预留到的范围写入
    pub fn vertices_mut(&mut self) -> &mut [PositionColorVertex] {
        &mut self.vertices
    }

    /// 已写入的三角形顶点
    pub fn triangle_vertices(&self) -> &[PositionColorVertex] {
        &self.vertices[..self.triangle_end]
    }

    /// 已写入的线段顶点
    pub fn line_vertices(&self) -> &[PositionColorVertex] {
        &self.vertices[self.line_start..]
    }

    /// 丢弃所有顶点并清除溢出标志
    pub fn reset(&mut self) {
        self.triangle_end = 0;
        self.line_start = self.vertices.len();
        self.overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    #[test]
    fn test_cursors_grow_towards_each_other() {
        let mut buffer = DebugVertexBuffer::new(10);

        assert_eq!(buffer.try_reserve_triangle_vertices(3), Ok(0..3));
        assert_eq!(buffer.try_reserve_line_vertices(2), Ok(8..10));
        assert_eq!(buffer.try_reserve_line_vertices(2), Ok(6..8));
        assert_eq!(buffer.remaining(), 3);
        assert_eq!(buffer.triangle_vertices().len(), 3);
        assert_eq!(buffer.line_vertices().len(), 4);
    }

    #[test]
    fn test_exact_fit_then_overflow() {
        let mut buffer = DebugVertexBuffer::new(6);
        assert!(buffer.try_reserve_triangle_vertices(3).is_ok());
        assert!(buffer.try_reserve_triangle_vertices(3).is_ok());
        assert!(!buffer.overflowed());

        assert_eq!(
            buffer.try_reserve_line_vertices(2),
            Err(VertexBufferOverflow {
                requested: 2,
                remaining: 0
            })
        );
        assert!(buffer.overflowed());
    }

    #[test]
    fn test_overflow_keeps_written_vertices() {
        let mut buffer = DebugVertexBuffer::new(8);
        let marker = PositionColorVertex::new(Vec3::ONE, Vec4::ONE);
        let range = buffer.try_reserve_triangle_vertices(6).unwrap();
        buffer.vertices_mut()[range].fill(marker);

        assert!(buffer.try_reserve_triangle_vertices(3).is_err());
        // 溢出后标志保持，后续合适的请求仍然可以成功
        assert!(buffer.try_reserve_line_vertices(2).is_ok());
        assert!(buffer.overflowed());
        assert!(buffer.triangle_vertices().iter().all(|v| *v == marker));

        buffer.reset();
        assert!(!buffer.overflowed());
        assert_eq!(buffer.remaining(), 8);
        assert!(buffer.triangle_vertices().is_empty());
        assert!(buffer.line_vertices().is_empty());
    }
}
