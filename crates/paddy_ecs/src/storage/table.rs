use std::{alloc::Layout, collections::HashMap};

use paddy_ptr::{OwningPtr, Ptr, PtrMut};

use crate::{
    component::{ComponentId, ComponentInfo},
    entity::Entity,
    storage::{blob_vec::BlobVec, sparse_set::SparseSet},
};

/// 在一个World中唯一的Table id (多World中不唯一)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(u32);

impl TableId {
    /// 无效的TableId
    pub(crate) const INVALID: TableId = TableId(u32::MAX);

    #[inline]
    pub const fn from_u32(index: u32) -> Self {
        Self(index)
    }
    #[inline]
    pub const fn from_usize(index: usize) -> Self {
        debug_assert!(index as u32 as usize == index);
        Self(index as u32)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// The [`TableId`] of the [`Table`] without any components.
    #[inline]
    pub const fn empty() -> Self {
        Self(0)
    }
}

/// 表示Table中的一行
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRow(u32);

impl TableRow {
    /// 无效的TableRow
    pub(crate) const INVALID: TableRow = TableRow(u32::MAX);

    #[inline]
    pub const fn from_u32(index: u32) -> Self {
        Self(index)
    }
    #[inline]
    pub const fn from_usize(index: usize) -> Self {
        debug_assert!(index as u32 as usize == index);
        Self(index as u32)
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

/// Table的一列, 一组相同组件类型的集合\
/// 一个类型擦除的连续的容器，用于存储同质类型的数据。概念上类似于一个类型擦除的 `Vec<T>`
#[derive(Debug)]
pub(crate) struct Column {
    data: BlobVec,
}

impl Column {
    #[inline]
    pub fn item_layout(&self) -> Layout {
        self.data.layout()
    }
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// 构造一个新的 [`Column`]，它配置了组件的布局并具有初始的容量(`capacity`)
    pub(crate) fn with_capacity(component_info: &ComponentInfo, capacity: usize) -> Self {
        Column {
            // SAFETY: component_info.drop() is valid for the types that will be inserted.
            data: unsafe { BlobVec::new(component_info.layout(), component_info.drop(), capacity) },
        }
    }

    /// 将组件数据写入指定行的列中
    ///
    /// 对应空间未初始化，不调用 drop\
    /// 如果要覆盖现有的已初始化值，请使用 [`Self::replace`]
    ///
    /// # Safety
    /// - 假设数据已经为指定的行分配好了空间
    /// - `data` 需是指向正确的类型(被类型擦出前的类型)
    #[inline]
    pub(crate) unsafe fn initialize(&mut self, row: TableRow, data: OwningPtr<'_>) {
        debug_assert!(row.as_usize() < self.len());
        // SAFETY: caller upholds the contract.
        unsafe { self.data.initialize_unchecked(row.as_usize(), data) };
    }

    /// 将组件数据写入指定行的列中 (用于覆盖数据)
    ///
    /// 若对应空间已经初始化，则会调用 drop
    ///
    /// # Safety
    /// - 假设数据已经为指定的行分配好了空间
    /// - `data` 需是指向正确的类型(被类型擦出前的类型)
    #[inline]
    pub(crate) unsafe fn replace(&mut self, row: TableRow, data: OwningPtr<'_>) {
        debug_assert!(row.as_usize() < self.len());
        // SAFETY: caller upholds the contract.
        unsafe { self.data.replace_unchecked(row.as_usize(), data) };
    }

    /// 将一个新值添加到此 [`Column`] 的末尾
    ///
    /// # Safety
    /// `ptr` 必须指向此列的 组件类型 的有效数据
    pub(crate) unsafe fn push(&mut self, ptr: OwningPtr<'_>) {
        // SAFETY: caller upholds the contract.
        unsafe { self.data.push(ptr) };
    }

    /// 将剩余容量扩展到 additional 大小
    #[inline]
    pub(crate) fn reserve_exact(&mut self, additional: usize) {
        self.data.reserve_exact(additional);
    }

    /// 获取 `row` 行的数据的只读引用
    #[inline]
    pub fn get_data(&self, row: TableRow) -> Option<Ptr<'_>> {
        (row.as_usize() < self.data.len()).then(|| {
            // SAFETY: length checked above.
            unsafe { self.data.get_unchecked(row.as_usize()) }
        })
    }

    /// # Safety
    /// - `row` 必须在范围 `[0, self.len())` 内
    #[inline]
    pub unsafe fn get_data_unchecked(&self, row: TableRow) -> Ptr<'_> {
        debug_assert!(row.as_usize() < self.data.len());
        // SAFETY: caller upholds the contract.
        unsafe { self.data.get_unchecked(row.as_usize()) }
    }

    /// 获取 `row` 行的数据的可变引用
    #[inline]
    pub fn get_data_mut(&mut self, row: TableRow) -> Option<PtrMut<'_>> {
        (row.as_usize() < self.data.len()).then(|| {
            // SAFETY: length checked above.
            unsafe { self.data.get_unchecked_mut(row.as_usize()) }
        })
    }

    /// 从 [`Column`] 中 swap-remove 移除一个元素，释放其资源
    ///
    /// # Safety
    /// `row` 必须在范围 `[0, self.len())` 之内
    #[inline]
    pub(crate) unsafe fn swap_remove_unchecked(&mut self, row: TableRow) {
        // SAFETY: caller upholds the contract.
        unsafe { self.data.swap_remove_and_drop_unchecked(row.as_usize()) };
    }

    /// 从 [`Column`] 中移除一个元素并转移所有权给调用方（不释放）
    ///
    /// # Safety
    /// `row` 必须在范围 `[0, self.len())` 之内
    #[inline]
    #[must_use = "The returned pointer should be used or dropped"]
    pub(crate) unsafe fn swap_remove_and_forget_unchecked(&mut self, row: TableRow) -> OwningPtr<'_> {
        // SAFETY: caller upholds the contract.
        unsafe { self.data.swap_remove_and_forget_unchecked(row.as_usize()) }
    }

    /// 清空此列，移除其中的所有值；不影响已分配容量
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Table 中保存 Entity的Archetype数据, 每一个 Table 对应着一个特定的组件组合(Archetype)
///
/// ```text
/// 若 Archetype 包含 Component1,Component2 ,则Table是:
/// +------------+------------+------------+
/// | Entity ID  | Component1 | Component2 |
/// +------------+------------+------------+
/// | Entity 1   | (x1, y1)   | (vx1, vy1) |
/// | Entity 2   | (x2, y2)   | (vx2, vy2) |
/// +------------+------------+------------+
/// ```
#[derive(Debug)]
pub(crate) struct Table {
    /// 列集合在第一次 `allocate` 之后被冻结，不再添加或移除
    columns: SparseSet<ComponentId, Column>,
    frozen: bool,
    entities: Vec<Entity>,
}

impl Table {
    pub(crate) fn new() -> Self {
        Self {
            columns: SparseSet::new(),
            frozen: false,
            entities: Vec::new(),
        }
    }

    /// 为Table 添加一列。只有在尚未分配过任何行时才允许调用
    ///
    /// # Panics
    /// 若该列已存在，或Table已经有过行分配（已冻结）
    pub(crate) fn add_column(&mut self, component_id: ComponentId, component_info: &ComponentInfo) {
        assert!(
            !self.frozen,
            "cannot add a column to a table that already has rows"
        );
        assert!(
            !self.columns.contains(component_id),
            "duplicate column for {component_id:?}"
        );
        let capacity = self.entities.capacity();
        self.columns
            .insert(component_id, Column::with_capacity(component_info, capacity));
    }

    #[inline]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn component_count(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn entity_capacity(&self) -> usize {
        self.entities.capacity()
    }

    /// 获取指定组件的列的只读引用。若组件不在Table中则返回 `None`
    #[inline]
    pub fn get_column(&self, component_id: ComponentId) -> Option<&Column> {
        self.columns.get_opt(component_id)
    }

    #[inline]
    pub(crate) fn get_column_mut(&mut self, component_id: ComponentId) -> Option<&mut Column> {
        self.columns.get_mut(component_id)
    }

    /// 扩展剩余容量
    pub(crate) fn reserve(&mut self, additional: usize) {
        if self.entities.capacity() - self.entities.len() < additional {
            self.entities.reserve(additional);
            let new_capacity = self.entities.capacity();
            for column in self.columns.values_mut() {
                column.reserve_exact(new_capacity - column.len());
            }
        }
    }

    /// 为一个新的Entity分配空间，冻结此Table的列集合
    ///
    /// # Safety
    /// 分配的行必须立即把每一列都写入有效值
    pub(crate) unsafe fn allocate(&mut self, entity: Entity) -> TableRow {
        self.frozen = true;
        self.reserve(1);
        let index = self.entities.len();
        self.entities.push(entity);
        for column in self.columns.values_mut() {
            column.data.set_len(self.entities.len());
        }
        TableRow::from_usize(index)
    }

    /// 从Table中swap-remove移除一行（丢弃其所有组件值）\
    /// @return 若尾部的行被移动填补了空洞，返回该被移动的 `Entity`
    pub(crate) fn swap_remove(&mut self, row: TableRow) -> Option<Entity> {
        let last = self.entities.len() - 1;
        self.entities.swap_remove(row.as_usize());
        for column in self.columns.values_mut() {
            // SAFETY: row is within bounds (caller guarantees table contains this row).
            unsafe { column.swap_remove_unchecked(row) };
        }
        (row.as_usize() != last).then(|| self.entities[row.as_usize()])
    }

    /// 将 `row` 行的所有列的数据搬运到 `new_table`（新表必须包含旧表的全部列），
    /// 并从旧表中swap-remove该行。
    ///
    /// @return `(replacement, new_row)`：`replacement` 是旧表中因 swap-remove 而被移动填补空洞的
    /// entity（如果有），`new_row` 是该实体在目标表中的新行号。
    pub(crate) fn transfer_row(&mut self, row: TableRow, new_table: &mut Table) -> (Option<Entity>, TableRow) {
        let entity = self.entities[row.as_usize()];
        // SAFETY: new row immediately populated from all of self's columns below.
        let new_row = unsafe { new_table.allocate(entity) };

        for component_id in self.columns.indices() {
            let Some(column) = self.columns.get_mut(component_id) else {
                continue;
            };
            // SAFETY: row is a valid row in this column, ownership moves into new_table.
            let data = unsafe { column.swap_remove_and_forget_unchecked(row) };
            if let Some(new_column) = new_table.get_column_mut(component_id) {
                // SAFETY: data is of the type this column stores.
                unsafe { new_column.initialize(new_row, data) };
            } else {
                // new_table的列是old table的超集之外新增的，没有来源数据可搬运
                // 但这里旧表没有该列，走不到这个分支：旧表列是 new_table 列集合的子集
                unreachable!("transfer_row requires new_table's columns to be a superset of self's")
            }
        }

        let was_last = row.as_usize() == self.entities.len() - 1;
        self.entities.swap_remove(row.as_usize());
        let replacement = (!was_last).then(|| self.entities[row.as_usize()]);

        (replacement, new_row)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// 清除Table中所有存储的Entity和Component数据，容量不变
    pub(crate) fn clear(&mut self) {
        self.entities.clear();
        for column in self.columns.values_mut() {
            column.clear();
        }
    }
}

/// Table 是没必要摧毁的,分配id后就永远是这个id
#[derive(Debug)]
pub(crate) struct Tables {
    /// 下标是 TableId
    tables: Vec<Table>,
    table_ids: HashMap<Box<[ComponentId]>, TableId>,
}

impl Tables {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    /// `capacity` 为即将创建的 table 数量的预估值，用于预分配底层 `Vec`/`HashMap`
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut tables = Tables {
            tables: Vec::with_capacity(capacity),
            table_ids: HashMap::with_capacity(capacity),
        };
        let empty_id = tables.tables.len();
        tables.tables.push(Table::new());
        tables.table_ids.insert(Box::new([]), TableId::from_usize(empty_id));
        tables
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tables.len()
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
    #[inline]
    pub fn get(&self, id: TableId) -> Option<&Table> {
        self.tables.get(id.as_usize())
    }

    /// 按签名(排序后的 ComponentId 列表)查找已有Table的id
    pub(crate) fn get_id(&self, component_ids: &[ComponentId]) -> Option<TableId> {
        self.table_ids.get(component_ids).copied()
    }

    /// 注册一张新创建的Table，按其签名建立索引
    pub(crate) fn push(&mut self, component_ids: Box<[ComponentId]>, table: Table) -> TableId {
        let id = TableId::from_usize(self.tables.len());
        self.tables.push(table);
        self.table_ids.insert(component_ids, id);
        id
    }

    /// 同时获取两张不同Table的可变引用，返回顺序与 `(a, b)` 一致
    ///
    /// # Panics
    /// 若 `a == b`
    pub(crate) fn get_pair_mut(&mut self, a: TableId, b: TableId) -> (&mut Table, &mut Table) {
        assert_ne!(a, b, "get_pair_mut requires two distinct tables");
        let (lo, hi) = if a.as_usize() < b.as_usize() { (a, b) } else { (b, a) };
        let (left, right) = self.tables.split_at_mut(hi.as_usize());
        let t_lo = &mut left[lo.as_usize()];
        let t_hi = &mut right[0];
        if a == lo {
            (t_lo, t_hi)
        } else {
            (t_hi, t_lo)
        }
    }
}

impl std::ops::Index<TableId> for Tables {
    type Output = Table;
    #[inline]
    fn index(&self, index: TableId) -> &Self::Output {
        &self.tables[index.as_usize()]
    }
}

impl std::ops::IndexMut<TableId> for Tables {
    #[inline]
    fn index_mut(&mut self, index: TableId) -> &mut Self::Output {
        &mut self.tables[index.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentDescriptor, ComponentInfo};
    use paddy_ptr::OwningPtr;

    fn info_for<T: Component>(id: usize) -> ComponentInfo {
        ComponentInfo::new(ComponentId::new(id), ComponentDescriptor::new::<T>(None))
    }

    #[test]
    fn add_column_then_freeze_after_first_allocate() {
        let mut table = Table::new();
        let info = info_for::<i32>(0);
        table.add_column(ComponentId::new(0), &info);
        let e = Entity::from_raw(0);
        // SAFETY: row is initialized immediately below.
        let row = unsafe { table.allocate(e) };
        OwningPtr::make(5_i32, |ptr| unsafe {
            table.get_column_mut(ComponentId::new(0)).unwrap().initialize(row, ptr);
        });
        assert_eq!(table.entity_count(), 1);
    }

    #[test]
    fn swap_remove_reports_moved_replacement() {
        let mut table = Table::new();
        let info = info_for::<i32>(0);
        table.add_column(ComponentId::new(0), &info);

        let e0 = Entity::from_raw(0);
        let e1 = Entity::from_raw(1);
        // SAFETY: row initialized immediately below.
        let r0 = unsafe { table.allocate(e0) };
        OwningPtr::make(1_i32, |ptr| unsafe {
            table.get_column_mut(ComponentId::new(0)).unwrap().initialize(r0, ptr);
        });
        // SAFETY: row initialized immediately below.
        let r1 = unsafe { table.allocate(e1) };
        OwningPtr::make(2_i32, |ptr| unsafe {
            table.get_column_mut(ComponentId::new(0)).unwrap().initialize(r1, ptr);
        });

        let replacement = table.swap_remove(r0);
        assert_eq!(replacement, Some(e1));
        assert_eq!(table.entity_count(), 1);
    }
}
