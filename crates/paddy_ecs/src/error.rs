use thiserror::Error;

/// 两种可见的错误\
/// 其他所有失败（对已存在行重复 `add_column`、`column::<T>` 类型不匹配、
/// 对不存在的组件调用 `get`、对已销毁实体执行操作）都是编程错误，允许直接 `panic`
#[derive(Debug, Error, Clone, Copy, Eq, PartialEq)]
pub enum EcsError {
    /// 对一个陈旧(stale)或越界的 [`Entity`](crate::entity::Entity) 进行查询或释放\
    /// 可恢复：调用方通常会忽略对已死亡实体的 `despawn`
    #[error("no such entity")]
    UnknownEntity,

    /// 容量增长路径失败。World 保持调用前的状态不变（先增长容量再写入）
    #[error("allocation failure")]
    AllocationFailure,
}
