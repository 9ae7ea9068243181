use super::ArchetypeId;
use crate::{bundle::BundleId, storage::sparse_set::SparseArray};

/// Archetypes and bundles form a graph. Adding a bundle moves an [`Entity`](crate::entity::Entity)
/// to a new [`Archetype`](super::Archetype).
///
/// [`Edges`] caches the results of these moves, memoizing repeated structural changes so they
/// become an `O(1)` cache hit instead of recomputing the target archetype's signature.
///
/// 原型和组件包（bundle）形成一个图结构。添加一个组件包会将一个 Entity 移动到一个新的原型
///
/// `Edges` 缓存了这些移动的结果，使得重复的结构性变更是 O(1) 的缓存命中而非重新计算
#[derive(Debug, Default)]
pub(crate) struct Edges {
    add_bundle: SparseArray<BundleId, AddBundle>,
}

impl Edges {
    /// 若该边已被遍历过，返回添加 `bundle_id` 的目标Archetype
    #[inline]
    pub fn get_add_bundle(&self, bundle_id: BundleId) -> Option<ArchetypeId> {
        self.get_add_bundle_internal(bundle_id)
            .map(|bundle| bundle.archetype_id)
    }

    #[inline]
    pub(crate) fn get_add_bundle_internal(&self, bundle_id: BundleId) -> Option<&AddBundle> {
        self.add_bundle.get(bundle_id)
    }

    #[inline]
    pub(crate) fn insert_add_bundle(
        &mut self,
        bundle_id: BundleId,
        archetype_id: ArchetypeId,
        bundle_status: Vec<ComponentStatus>,
    ) {
        self.add_bundle.insert(
            bundle_id,
            AddBundle {
                archetype_id,
                bundle_status,
            },
        );
    }
}

/// 表示一个组件的状态：是被添加还是被修改(在源原型中已经存在，值被覆盖)
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ComponentStatus {
    Added,
    Mutated,
}

#[derive(Debug)]
pub(crate) struct AddBundle {
    /// 在源原型添加bundle后的目标原型
    pub archetype_id: ArchetypeId,
    /// 按源 [`Bundle`](crate::bundle::Bundle) 迭代顺序，标记每个组件在目标原型中是新增的还是已存在的
    pub bundle_status: Vec<ComponentStatus>,
}

/// 用于报告 [`Bundle`](crate::bundle::Bundle) 的组件相对于实体原有原型被添加时的状态
pub(crate) trait BundleComponentStatus {
    /// # Safety
    /// 调用者必须保证 `index` 始终是与此 [`BundleComponentStatus`] 关联的 Bundle 的有效索引
    unsafe fn get_status(&self, index: usize) -> ComponentStatus;
}

impl BundleComponentStatus for AddBundle {
    #[inline]
    unsafe fn get_status(&self, index: usize) -> ComponentStatus {
        // SAFETY: caller has ensured index is a valid bundle index for this bundle
        unsafe { *self.bundle_status.get_unchecked(index) }
    }
}

pub(crate) struct SpawnBundleStatus;

impl BundleComponentStatus for SpawnBundleStatus {
    #[inline]
    unsafe fn get_status(&self, _index: usize) -> ComponentStatus {
        // spawn 时所有组件总是视为新增
        ComponentStatus::Added
    }
}
