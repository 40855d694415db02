//! 核心宏定义

/// 为配置结构体实现 Default trait 的宏
///
/// 使用示例:
/// ```rust
/// use nuclex_framework::impl_default;
///
/// struct BatchSettings {
///     capacity: usize,
///     label: String,
/// }
///
/// impl_default!(BatchSettings {
///     capacity: 8192,
///     label: String::from("particles"),
/// });
///
/// assert_eq!(BatchSettings::default().capacity, 8192);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}
