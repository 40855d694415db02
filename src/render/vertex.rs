//! 顶点布局
//!
//! 描述一个顶点在内存中的形状（字段、偏移、语义），图形设备据此解释原始顶点字节。
//!
//! 布局可以显式给出，也可以从顶点类型的字段元数据（`Vertex::ELEMENTS`）推断。
//! 没有元数据的类型无法推断布局，这属于致命的配置错误。

use std::any::type_name;
use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::core::error::{RenderError, RenderResult};

/// 顶点元素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Unorm8x4,
    Uint32,
}

impl VertexFormat {
    /// 元素大小（字节）
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 | VertexFormat::Unorm8x4 | VertexFormat::Uint32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }

    fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            VertexFormat::Float32 => wgpu::VertexFormat::Float32,
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
            VertexFormat::Unorm8x4 => wgpu::VertexFormat::Unorm8x4,
            VertexFormat::Uint32 => wgpu::VertexFormat::Uint32,
        }
    }
}

/// 顶点元素语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexElementUsage {
    Position,
    Color,
    TextureCoordinate,
    Normal,
    PointSize,
    Custom,
}

/// 顶点元素
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexElement {
    /// 相对顶点起始位置的偏移（字节）
    pub offset: u32,
    /// 格式
    pub format: VertexFormat,
    /// 语义
    pub usage: VertexElementUsage,
    /// 同一语义的序号
    pub usage_index: u8,
}

impl VertexElement {
    pub const fn new(
        offset: u32,
        format: VertexFormat,
        usage: VertexElementUsage,
        usage_index: u8,
    ) -> Self {
        Self {
            offset,
            format,
            usage,
            usage_index,
        }
    }

    #[inline]
    fn end(&self) -> u32 {
        self.offset + self.format.size()
    }
}

/// 可以放入图元批次的顶点类型
///
/// `ELEMENTS` 是字段元数据，用于自动推断布局；留空表示只能通过显式注册使用。
pub trait Vertex: Pod + Send + Sync + 'static {
    const ELEMENTS: &'static [VertexElement] = &[];
}

/// 顶点布局描述
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexLayout {
    stride: u32,
    elements: Vec<VertexElement>,
}

impl VertexLayout {
    pub fn new(stride: u32, elements: Vec<VertexElement>) -> Self {
        Self { stride, elements }
    }

    /// 顶点跨度（字节）
    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn elements(&self) -> &[VertexElement] {
        &self.elements
    }

    /// 从顶点类型的字段元数据推断布局
    pub fn derive<V: Vertex>() -> RenderResult<Self> {
        let stride = size_of::<V>() as u32;
        check_elements(stride, V::ELEMENTS).map_err(|reason| RenderError::LayoutInference {
            type_name: type_name::<V>(),
            reason,
        })?;
        Ok(Self::new(stride, V::ELEMENTS.to_vec()))
    }

    /// 检查显式布局能否描述 `V`
    pub fn validate_for<V: Vertex>(&self) -> RenderResult<()> {
        let invalid = |reason: String| RenderError::InvalidLayout {
            type_name: type_name::<V>(),
            reason,
        };

        let size = size_of::<V>() as u32;
        if self.stride != size {
            return Err(invalid(format!(
                "stride {} does not match vertex size {}",
                self.stride, size
            )));
        }
        check_elements(self.stride, &self.elements).map_err(invalid)
    }

    /// 转换为 wgpu 顶点属性，着色器位置按元素顺序分配
    pub fn wgpu_attributes(&self) -> Vec<wgpu::VertexAttribute> {
        self.elements
            .iter()
            .enumerate()
            .map(|(location, element)| wgpu::VertexAttribute {
                format: element.format.to_wgpu(),
                offset: element.offset as u64,
                shader_location: location as u32,
            })
            .collect()
    }

    /// 构造 wgpu 顶点缓冲区布局
    pub fn wgpu_buffer_layout<'a>(
        &self,
        attributes: &'a [wgpu::VertexAttribute],
    ) -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: self.stride as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}

fn check_elements(stride: u32, elements: &[VertexElement]) -> Result<(), String> {
    if elements.is_empty() {
        return Err("the vertex type declares no vertex elements".to_string());
    }

    let mut sorted: Vec<&VertexElement> = elements.iter().collect();
    sorted.sort_by_key(|e| e.offset);

    for element in &sorted {
        if element.end() > stride {
            return Err(format!(
                "{:?} element at offset {} exceeds the vertex size {}",
                element.usage, element.offset, stride
            ));
        }
    }
    for pair in sorted.windows(2) {
        if pair[0].end() > pair[1].offset {
            return Err(format!(
                "elements at offsets {} and {} overlap",
                pair[0].offset, pair[1].offset
            ));
        }
    }
    Ok(())
}

/// 带颜色的位置顶点，调试绘制使用
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct PositionColorVertex {
    /// 位置 (x, y, z)
    pub position: [f32; 3],
    /// 颜色 (r, g, b, a)
    pub color: [f32; 4],
}

impl PositionColorVertex {
    #[inline]
    pub fn new(position: Vec3, color: Vec4) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn color(&self) -> Vec4 {
        Vec4::from_array(self.color)
    }
}

impl Vertex for PositionColorVertex {
    const ELEMENTS: &'static [VertexElement] = &[
        VertexElement::new(0, VertexFormat::Float32x3, VertexElementUsage::Position, 0),
        VertexElement::new(12, VertexFormat::Float32x4, VertexElementUsage::Color, 0),
    ];
}
