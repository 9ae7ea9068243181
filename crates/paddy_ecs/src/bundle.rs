use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
};

use paddy_ptr::OwningPtr;
use paddy_utils::all_tuples;

use crate::{
    archetype::{Archetype, ArchetypeId, Archetypes, BundleComponentStatus, ComponentStatus, SpawnBundleStatus},
    component::{Component, ComponentId, Components},
    entity::{Entity, EntityLocation},
    storage::{
        sparse_set::SparseSetIndex,
        table::{Table, TableRow},
        Storages,
    },
};

/// `Bundle` trait 使得可以在一个实体上一次性添加一组静态类型已知的 [`Component`]
///
/// 实现 `Bundle` trait 的类型被称为“bundles”。每个 bundle 代表一组静态类型的 [`Component`]
///
/// 当前，bundle 不能包含相同的 [`Component`]，如果不满足这个条件，将在初始化时触发 panic
///
/// 将一个 bundle 插入一个Entity时，bundle 所代表的组件被写入该实体；如果实体已经包含其中的某个组件，
/// 原有的值将被覆盖
///
/// 每个实现了 [`Component`] 的类型也自动实现 `Bundle`。此外，元组类型的 bundle（最多 15 项）
/// 也是 `Bundle`，`()` 是一个没有组件的 bundle，在批量创建空实体时很有用
///
/// # Safety
/// 手动实现这个 trait 是不被支持的；不应直接为自定义类型实现它
pub unsafe trait Bundle: DynamicBundle + 'static {
    /// 获取这个 [`Bundle`] 的组件 ID，按该 bundle 的 [`Component`] 顺序排列
    #[doc(hidden)]
    fn component_ids(components: &mut Components, ids: &mut impl FnMut(ComponentId));

    /// 调用 `func`，该函数应返回这个 bundle 中每个组件的数据，按该 bundle 的 [`Component`] 顺序排列
    ///
    /// # Safety
    /// 调用者必须返回这个 bundle 中每个组件的数据，按该 bundle 的 [`Component`] 顺序排列
    #[doc(hidden)]
    unsafe fn from_components<T, F>(ctx: &mut T, func: &mut F) -> Self
    where
        F: for<'a> FnMut(&'a mut T) -> OwningPtr<'a>,
        Self: Sized;
}

/// [`Bundle`] 中的运行时部分：按顺序把每个组件的值交给调用方
pub trait DynamicBundle {
    /// 按这个 bundle 的 [`Component`] 顺序调用 `func` 处理每个值。这会将组件值的所有权传递给 `func`
    #[doc(hidden)]
    fn get_components(self, func: &mut impl FnMut(OwningPtr<'_>));
}

// SAFETY:
// - `Bundle::component_ids` calls `ids` for C's component id (and nothing else)
// - `Bundle::get_components` is called exactly once for C
// - `Bundle::from_components` calls `func` exactly once for C, the exact value from `component_ids`
unsafe impl<C: Component> Bundle for C {
    fn component_ids(components: &mut Components, ids: &mut impl FnMut(ComponentId)) {
        ids(components.init_component::<C>());
    }

    unsafe fn from_components<T, F>(ctx: &mut T, func: &mut F) -> Self
    where
        F: for<'a> FnMut(&'a mut T) -> OwningPtr<'a>,
        Self: Sized,
    {
        let ptr = func(ctx);
        // SAFETY: The id given in `component_ids` is for `Self`
        unsafe { ptr.read() }
    }
}

impl<C: Component> DynamicBundle for C {
    #[inline]
    fn get_components(self, func: &mut impl FnMut(OwningPtr<'_>)) {
        OwningPtr::make(self, |ptr| func(ptr));
    }
}

macro_rules! tuple_impl {
    ($($name: ident),*) => {
        // SAFETY:
        // - `Bundle::component_ids` calls `ids` for each component type in the bundle, in the
        //   exact order that `DynamicBundle::get_components` is called.
        // - `Bundle::from_components` calls `func` exactly once for each `ComponentId` returned
        //   by `Bundle::component_ids`.
        unsafe impl<$($name: Bundle),*> Bundle for ($($name,)*) {
            #[allow(unused_variables)]
            fn component_ids(components: &mut Components, ids: &mut impl FnMut(ComponentId)){
                $(<$name as Bundle>::component_ids(components, ids);)*
            }

            #[allow(unused_variables, unused_mut)]
            #[allow(clippy::unused_unit)]
            unsafe fn from_components<T, F>(ctx: &mut T, func: &mut F) -> Self
            where
                F: FnMut(&mut T) -> OwningPtr<'_>
            {
                #[allow(unused_unsafe)]
                // SAFETY: Rust guarantees that tuple calls are evaluated 'left to right'.
                unsafe { ($(<$name as Bundle>::from_components(ctx, func),)*) }
            }
        }

        impl<$($name: Bundle),*> DynamicBundle for ($($name,)*) {
            #[allow(unused_variables, unused_mut)]
            #[inline(always)]
            fn get_components(self, func: &mut impl FnMut(OwningPtr<'_>)) {
                #[allow(non_snake_case)]
                let ($(mut $name,)*) = self;
                $(
                    $name.get_components(&mut *func);
                )*
            }
        }
    }
}

all_tuples!(tuple_impl, 0, 15, B);

/// 对于对应的 [`World`](crate::world::World)，它存储了一个唯一的值，用于标识已注册的 [`Bundle`] 类型
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BundleId(usize);

impl BundleId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl SparseSetIndex for BundleId {
    #[inline]
    fn sparse_set_index(&self) -> usize {
        self.index()
    }

    #[inline]
    fn get_sparse_set_index(value: usize) -> Self {
        Self(value)
    }
}

/// 存储在对应 [`World`](crate::world::World) 中某个 [`Bundle`] 类型相关的元数据
#[derive(Debug)]
pub struct BundleInfo {
    id: BundleId,
    /// 每个 ID 必须在拥有此 `BundleInfo` 的 World 中有效，且已初始化其存储（即在表中创建了列），
    /// 并且顺序与源 Bundle 类型写入其组件的顺序相同
    component_ids: Vec<ComponentId>,
}

impl BundleInfo {
    /// # Safety
    /// `component_ids` 中的每个 ID 必须在拥有 BundleInfo 的 World 中有效，且已初始化其存储
    unsafe fn new(
        bundle_type_name: &'static str,
        components: &Components,
        component_ids: Vec<ComponentId>,
        id: BundleId,
    ) -> BundleInfo {
        let mut deduped = component_ids.clone();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != component_ids.len() {
            let mut seen = HashSet::new();
            let mut dups = Vec::new();
            for id in component_ids {
                if !seen.insert(id) {
                    dups.push(id);
                }
            }
            let names = dups
                .into_iter()
                .map(|id| {
                    // SAFETY: the caller ensures component_id is valid.
                    unsafe { components.get_info_unchecked(id).name() }
                })
                .collect::<Vec<_>>()
                .join(", ");
            panic!("Bundle {bundle_type_name} has duplicate components: {names}");
        }

        BundleInfo { id, component_ids }
    }

    #[inline]
    pub const fn id(&self) -> BundleId {
        self.id
    }

    #[inline]
    pub fn components(&self) -> &[ComponentId] {
        &self.component_ids
    }

    #[inline]
    pub fn iter_components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.component_ids.iter().cloned()
    }

    /// 将给定 [`Bundle`] 中的各个组件写入表中指定的行
    ///
    /// # Safety
    /// `bundle_component_status` 必须针对实体原始原型（添加该bundle之前）为每个组件返回正确的
    /// [`ComponentStatus`]。`table` 必须是 `entity` 的新表，`table_row` 必须已为 `entity`
    /// 分配好空间，`bundle` 的类型必须与此 [`BundleInfo`] 匹配
    #[inline]
    pub(crate) unsafe fn write_components<T: DynamicBundle, S: BundleComponentStatus>(
        &self,
        table: &mut Table,
        bundle_component_status: &S,
        table_row: TableRow,
        bundle: T,
    ) {
        let mut bundle_component = 0;
        bundle.get_components(&mut |component_ptr| {
            // SAFETY: bundle_component is in range for self.component_ids
            let component_id = unsafe { *self.component_ids.get_unchecked(bundle_component) };
            let column = table
                .get_column_mut(component_id)
                .expect("BundleInfo::new guarantees the target table contains this column");
            // SAFETY: bundle_component is a valid index for this bundle
            let status = unsafe { bundle_component_status.get_status(bundle_component) };
            match status {
                // SAFETY: table_row was just allocated for this entity
                ComponentStatus::Added => unsafe { column.initialize(table_row, component_ptr) },
                ComponentStatus::Mutated => unsafe { column.replace(table_row, component_ptr) },
            }
            bundle_component += 1;
        });
    }

    /// 将此 bundle 添加到给定原型，返回结果原型。若添加该 bundle 不引起原型变化，结果与输入相同。
    /// 结果被缓存到 [`Archetype`] 的边中以避免重复计算
    ///
    /// # Safety
    /// `components` 必须与 [`Self::new`] 中传入的是同一个
    pub(crate) unsafe fn add_bundle_to_archetype(
        &self,
        archetypes: &mut Archetypes,
        storages: &mut Storages,
        components: &Components,
        archetype_id: ArchetypeId,
    ) -> ArchetypeId {
        if let Some(cached) = archetypes[archetype_id].edges().get_add_bundle(self.id) {
            return cached;
        }

        let mut new_components = Vec::new();
        let mut bundle_status = Vec::with_capacity(self.component_ids.len());

        let current_archetype = &archetypes[archetype_id];
        for component_id in self.component_ids.iter().cloned() {
            if current_archetype.contains(component_id) {
                bundle_status.push(ComponentStatus::Mutated);
            } else {
                bundle_status.push(ComponentStatus::Added);
                new_components.push(component_id);
            }
        }

        if new_components.is_empty() {
            let edges = archetypes[archetype_id].edges_mut();
            edges.insert_add_bundle(self.id, archetype_id, bundle_status);
            return archetype_id;
        }

        let current_archetype = &archetypes[archetype_id];
        new_components.extend(current_archetype.components());
        new_components.sort();
        new_components.dedup();

        let table_id = match storages.tables.get_id(&new_components) {
            Some(id) => id,
            None => {
                let mut table = Table::new();
                for &component_id in &new_components {
                    // SAFETY: component_id came from component_ids / the current archetype, both valid
                    let info = unsafe { components.get_info_unchecked(component_id) };
                    table.add_column(component_id, info);
                }
                storages.tables.push(new_components.clone().into_boxed_slice(), table)
            }
        };

        // SAFETY: table_id just created/looked-up above; new_components ids are all valid
        let new_archetype_id =
            unsafe { archetypes.get_id_or_insert(components, table_id, new_components) };

        archetypes[archetype_id]
            .edges_mut()
            .insert_add_bundle(self.id, new_archetype_id, bundle_status);
        new_archetype_id
    }
}

/// 存储所有已在对应 World 中注册的 [`Bundle`] 类型的元数据
#[derive(Debug, Default)]
pub struct Bundles {
    /// 下标为 BundleId
    bundle_infos: Vec<BundleInfo>,
    /// 静态已知类型的 [`BundleId`] 缓存
    bundle_ids: HashMap<TypeId, BundleId>,
}

impl Bundles {
    #[inline]
    pub fn get(&self, bundle_id: BundleId) -> Option<&BundleInfo> {
        self.bundle_infos.get(bundle_id.index())
    }

    #[inline]
    pub fn get_id(&self, type_id: TypeId) -> Option<BundleId> {
        self.bundle_ids.get(&type_id).cloned()
    }

    /// # Safety
    /// 给定 `id` 的 `BundleInfo` 必须已在此 `Bundles` 实例中初始化
    pub(crate) unsafe fn get_unchecked(&self, id: BundleId) -> &BundleInfo {
        // SAFETY: caller upholds the contract.
        unsafe { self.bundle_infos.get_unchecked(id.0) }
    }

    /// 为静态已知类型初始化一个新的 [`BundleInfo`]，同时初始化 bundle 中的所有组件
    pub(crate) fn init_info<T: Bundle>(&mut self, components: &mut Components) -> BundleId {
        let bundle_infos = &mut self.bundle_infos;
        *self.bundle_ids.entry(TypeId::of::<T>()).or_insert_with(|| {
            let mut component_ids = Vec::new();
            T::component_ids(components, &mut |id| component_ids.push(id));
            let id = BundleId(bundle_infos.len());
            // SAFETY: T::component_ids ensures ids are valid, storage-initialized, and bundle-ordered
            let bundle_info =
                unsafe { BundleInfo::new(std::any::type_name::<T>(), components, component_ids, id) };
            bundle_infos.push(bundle_info);
            id
        })
    }
}

/// 在空原型上构造一棵新Entity并写入一个bundle的值
pub(crate) struct BundleSpawner<'w> {
    world: &'w mut crate::world::World,
    bundle_id: BundleId,
}

impl<'w> BundleSpawner<'w> {
    pub fn new<T: Bundle>(world: &'w mut crate::world::World) -> Self {
        let bundle_id = world.bundles.init_info::<T>(&mut world.components);
        // SAFETY: bundle_id initialized above
        unsafe { Self::new_with_id(world, bundle_id) }
    }

    /// # Safety
    /// 调用者必须保证 `bundle_id` 存在于 `world.bundles` 中
    pub(crate) unsafe fn new_with_id(world: &'w mut crate::world::World, bundle_id: BundleId) -> Self {
        Self { world, bundle_id }
    }

    /// # Safety
    /// `entity` 必须已被分配(但尚不存在于任何原型)，`T` 必须与此 bundle_id 对应的类型匹配
    pub unsafe fn spawn_non_existent<T: DynamicBundle>(&mut self, entity: Entity, bundle: T) -> EntityLocation {
        // SAFETY: bundle_id was validated at construction
        let bundle_info = unsafe { self.world.bundles.get_unchecked(self.bundle_id) };
        let new_archetype_id = unsafe {
            bundle_info.add_bundle_to_archetype(
                &mut self.world.archetypes,
                &mut self.world.storages,
                &self.world.components,
                ArchetypeId::EMPTY,
            )
        };

        let table_id = self.world.archetypes[new_archetype_id].table_id();
        let table = &mut self.world.storages.tables[table_id];
        // SAFETY: columns are written immediately below via write_components
        let table_row = unsafe { table.allocate(entity) };
        let archetype: &mut Archetype = &mut self.world.archetypes[new_archetype_id];
        // SAFETY: table_row just allocated for entity
        let location = unsafe { archetype.allocate(entity, table_row) };

        let bundle_info = unsafe { self.world.bundles.get_unchecked(self.bundle_id) };
        let table = &mut self.world.storages.tables[table_id];
        // SAFETY: bundle matches bundle_info's type, table_row was just allocated
        unsafe {
            bundle_info.write_components(table, &SpawnBundleStatus, table_row, bundle);
        }

        self.world.entities.set(entity.index(), location);
        location
    }
}
