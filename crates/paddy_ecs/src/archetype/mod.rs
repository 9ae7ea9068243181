mod edge;

pub(crate) use edge::{AddBundle, BundleComponentStatus, ComponentStatus, Edges, SpawnBundleStatus};

use std::{
    collections::HashMap,
    ops::{Index, IndexMut},
};

use crate::{
    component::{ComponentId, Components},
    entity::{Entity, EntityLocation},
    storage::{
        sparse_set::ImmutableSparseSet,
        table::{TableId, TableRow},
    },
};

/// [`Archetype::entities`] 的下标,指向Entity\
/// 这可以与 [`ArchetypeId`] 结合使用，以找到 [`World`](crate::world::World) 中一个 [`Entity`] 的确切位置
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct ArchetypeRow(u32);

impl ArchetypeRow {
    /// 无效 `ArchetypeRow` 的索引，用作占位符
    pub const INVALID: ArchetypeRow = ArchetypeRow(u32::MAX);

    #[inline]
    pub const fn new(index: usize) -> Self {
        Self(index as u32)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// 用于表示在 [`World`](crate::world::World) 中唯一的 [`Archetype`] 标识\
/// `Archetype` id 只对对应的 `World` 有效，且不是全局唯一的。唯一的例外是
/// [`EMPTY`](ArchetypeId::EMPTY)，它在所有 World 中都表示没有任何Component的 `Archetype`
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// 没有任何Component的 [`Archetype`] 的 id
    pub const EMPTY: ArchetypeId = ArchetypeId(0);
    /// 一个无效的id
    pub const INVALID: ArchetypeId = ArchetypeId(u32::MAX);

    #[inline]
    pub const fn new(index: usize) -> Self {
        ArchetypeId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// 在一个[`Archetype`]中 关于[`Entity`]的元数据
#[derive(Debug)]
pub(crate) struct ArchetypeEntity {
    entity: Entity,
    table_row: TableRow,
}

impl ArchetypeEntity {
    #[inline]
    pub const fn id(&self) -> Entity {
        self.entity
    }

    #[inline]
    pub const fn table_row(&self) -> TableRow {
        self.table_row
    }
}

/// `Archetype` 中的 `Component` 签名，用作 `by_components` 的查找键
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct ArchetypeComponents(Box<[ComponentId]>);

/// Archetype 表示一种组件组合。从Entity中移除或添加Component,只需要切换Archetype即可
#[derive(Debug)]
pub(crate) struct Archetype {
    id: ArchetypeId,
    /// Archetype 对应的 Table
    table_id: TableId,
    edges: Edges,
    entities: Vec<ArchetypeEntity>,
    /// 一旦Archetype被构造后,这个字段就不可变
    components: ImmutableSparseSet<ComponentId, ()>,
}

impl Archetype {
    pub(crate) fn new(
        _components: &Components,
        id: ArchetypeId,
        table_id: TableId,
        component_ids: impl Iterator<Item = ComponentId>,
    ) -> Self {
        let mut set = crate::storage::sparse_set::SparseSet::new();
        for component_id in component_ids {
            set.insert(component_id, ());
        }
        Self {
            id,
            table_id,
            entities: Vec::new(),
            components: set.into_immutable(),
            edges: Edges::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> ArchetypeId {
        self.id
    }

    #[inline]
    pub fn table_id(&self) -> TableId {
        self.table_id
    }

    #[inline]
    pub fn entities(&self) -> &[ArchetypeEntity] {
        &self.entities
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    #[inline]
    pub fn edges(&self) -> &Edges {
        &self.edges
    }

    #[inline]
    pub(crate) fn edges_mut(&mut self) -> &mut Edges {
        &mut self.edges
    }

    /// 检查该原型是否包含某个组件，`O(1)`
    #[inline]
    pub fn contains(&self, component_id: ComponentId) -> bool {
        self.components.contains(component_id)
    }

    #[inline]
    pub fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.indices()
    }

    #[inline]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub(crate) fn set_entity_table_row(&mut self, row: ArchetypeRow, table_row: TableRow) {
        self.entities[row.index()].table_row = table_row;
    }

    /// 为Archetype分配一个Entity
    ///
    /// # Safety
    /// 有效的组件值必须立即写入相关存储中；`table_row` 必须有效
    #[inline]
    pub(crate) unsafe fn allocate(&mut self, entity: Entity, table_row: TableRow) -> EntityLocation {
        let archetype_row = ArchetypeRow::new(self.entities.len());
        self.entities.push(ArchetypeEntity { entity, table_row });

        EntityLocation {
            archetype_id: self.id,
            archetype_row,
            table_id: self.table_id,
            table_row,
        }
    }

    /// swap-remove该原型中的一行，返回被移动填补空洞的 entity（如果有）
    pub(crate) fn swap_remove(&mut self, row: ArchetypeRow) -> Option<Entity> {
        let is_last = row.index() == self.entities.len() - 1;
        self.entities.swap_remove(row.index());
        (!is_last).then(|| self.entities[row.index()].id())
    }

    #[inline]
    pub(crate) fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
    }
}

#[derive(Debug)]
pub(crate) struct Archetypes {
    archetypes: Vec<Archetype>,
    by_components: HashMap<ArchetypeComponents, ArchetypeId>,
}

impl Archetypes {
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    /// `capacity` 为即将创建的 archetype 数量的预估值，用于预分配底层 `Vec`/`HashMap`
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let mut archetypes = Archetypes {
            archetypes: Vec::with_capacity(capacity),
            by_components: HashMap::with_capacity(capacity),
        };
        // SAFETY: 空原型不包含任何组件，TableId::empty() 在 Tables::new() 中同步创建
        unsafe {
            archetypes.get_id_or_insert(&Components::default(), TableId::empty(), Vec::new());
        }
        archetypes
    }

    #[inline]
    pub fn get(&self, id: ArchetypeId) -> Option<&Archetype> {
        self.archetypes.get(id.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    /// 获取没有任何组件的原型的可变引用
    #[inline]
    pub(crate) fn empty_mut(&mut self) -> &mut Archetype {
        // SAFETY: empty archetype always exists, created in Archetypes::new
        unsafe { self.archetypes.get_unchecked_mut(ArchetypeId::EMPTY.index()) }
    }

    /// 获取给定组件签名的原型id，若不存在则插入一个新的。`component_ids` 必须已排序
    ///
    /// # Safety
    /// `table_id` 必须存在于 tables 中；`component_ids` 中的每个id必须存在于 `components` 中
    pub(crate) unsafe fn get_id_or_insert(
        &mut self,
        components: &Components,
        table_id: TableId,
        component_ids: Vec<ComponentId>,
    ) -> ArchetypeId {
        let key = ArchetypeComponents(component_ids.clone().into_boxed_slice());
        let archetypes = &mut self.archetypes;
        *self.by_components.entry(key).or_insert_with(move || {
            let id = ArchetypeId::new(archetypes.len());
            archetypes.push(Archetype::new(components, id, table_id, component_ids.into_iter()));
            id
        })
    }
}

impl Index<ArchetypeId> for Archetypes {
    type Output = Archetype;
    #[inline]
    fn index(&self, index: ArchetypeId) -> &Self::Output {
        &self.archetypes[index.index()]
    }
}

impl IndexMut<ArchetypeId> for Archetypes {
    #[inline]
    fn index_mut(&mut self, index: ArchetypeId) -> &mut Self::Output {
        &mut self.archetypes[index.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_archetype_is_materialized_at_construction() {
        let archetypes = Archetypes::new();
        assert_eq!(archetypes.len(), 1);
        let empty = archetypes.get(ArchetypeId::EMPTY).unwrap();
        assert_eq!(empty.component_count(), 0);
    }

    #[test]
    fn same_signature_reuses_archetype() {
        let mut archetypes = Archetypes::new();
        let components = Components::default();
        let a_id = unsafe {
            archetypes.get_id_or_insert(&components, TableId::from_usize(1), vec![ComponentId::new(0)])
        };
        let b_id = unsafe {
            archetypes.get_id_or_insert(&components, TableId::from_usize(1), vec![ComponentId::new(0)])
        };
        assert_eq!(a_id, b_id);
        assert_eq!(archetypes.len(), 2);
    }
}
