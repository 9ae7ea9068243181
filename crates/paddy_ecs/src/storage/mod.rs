pub(crate) mod blob_vec;
pub mod sparse_set;
pub(crate) mod table;

use table::Tables;

/// 用于 [`World`](crate::world::World) 的原始数据存储
#[derive(Debug)]
pub(crate) struct Storages {
    pub(crate) tables: Tables,
}

impl Storages {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    pub(crate) fn with_capacity(table_cap: usize) -> Self {
        Self {
            tables: Tables::with_capacity(table_cap),
        }
    }
}
