use std::sync::atomic::{AtomicU32, Ordering};

use paddy_utils::{dbg, info};

use crate::{
    archetype::{ArchetypeId, Archetypes},
    bundle::{Bundle, BundleSpawner, Bundles},
    component::{Component, ComponentId, Components},
    entity::{Entities, Entity},
    error::EcsError,
    storage::{table::TableRow, Storages},
    type_storage::TypeStorage,
};

static WORLD_COUNT: AtomicU32 = AtomicU32::new(0);

/// 在进程内唯一标识一个 [`World`] 实例
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct WorldId(u32);

impl WorldId {
    /// 分配一个新的、此前未被使用过的 `WorldId`
    ///
    /// @return 若已分配的 world 数量耗尽了 `u32` 的空间，返回 `None`
    pub fn new() -> Option<Self> {
        WORLD_COUNT
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
            .map(WorldId)
            .ok()
    }
}

/// 持有一组实体及其组件数据的容器，并提供生成、查询、修改和销毁这些实体的方法
///
/// 单线程协作模型：所有对 `World` 的访问都通过 `&self`/`&mut self` 借用规则静态保证互斥，
/// 不存在内部锁或原子计数的运行时借用检查
#[derive(Debug)]
pub struct World {
    id: WorldId,
    pub(crate) entities: Entities,
    pub(crate) components: Components,
    pub(crate) storages: Storages,
    pub(crate) archetypes: Archetypes,
    pub(crate) bundles: Bundles,
    resources: TypeStorage,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// 创建一个新的空 `World`
    pub fn new() -> Self {
        Self::init(0, 0, 0)
    }

    /// 创建一个新的空 `World`，并按给定的容量提示预分配内部存储\
    /// 这是本核心唯一暴露的“配置”：`entity_cap` 预分配实体注册表，`table_cap` 预分配
    /// table/archetype 图，`component_cap` 预分配组件类型表。三者均只是容量提示，不影响语义
    pub fn init(entity_cap: usize, table_cap: usize, component_cap: usize) -> Self {
        let id = WorldId::new().expect("more `World`s have been created than allowed");
        info(("world created", id));
        Self {
            id,
            entities: Entities::with_capacity(entity_cap),
            components: Components::with_capacity(component_cap),
            storages: Storages::with_capacity(table_cap),
            archetypes: Archetypes::with_capacity(table_cap),
            bundles: Bundles::default(),
            resources: TypeStorage::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> WorldId {
        self.id
    }

    #[inline]
    pub fn entity_count(&self) -> u32 {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// 注册一个无名的 `T` 类型组件，返回它的 [`ComponentId`]。重复调用返回相同的id
    pub fn init_component<T: Component>(&mut self) -> ComponentId {
        self.components.init_component::<T>()
    }

    /// 注册一个具名实例的 `T` 类型组件（同一类型的不同命名字段被 intern 为不同的 `ComponentId`）
    pub fn init_component_named<T: Component>(&mut self, name: &str) -> ComponentId {
        self.components.init_component_named::<T>(Some(name))
    }

    /// 创建一个新实体，将其放入空原型（archetype 0），然后立即用 `bundle` 的值填充它
    ///
    /// @return 若 entity id 空间已耗尽，返回 [`EcsError::AllocationFailure`]
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<Entity, EcsError> {
        let entity = self.entities.alloc()?;
        let mut spawner = BundleSpawner::new::<B>(self);
        // SAFETY: `entity` was just allocated and is not present in any archetype yet
        let location = unsafe { spawner.spawn_non_existent(entity, bundle) };
        dbg(("spawned", entity, location.archetype_id));
        Ok(entity)
    }

    /// 创建一个没有任何组件的实体（等价于 `spawn(())`）
    pub fn spawn_empty(&mut self) -> Result<Entity, EcsError> {
        self.spawn(())
    }

    /// 销毁一个实体：从注册表释放它（generation 递增），并 swap-remove 它在表与原型中的行
    ///
    /// @return 若 `entity` 不存在（已被销毁或从未存在），返回 [`EcsError::UnknownEntity`]
    pub fn despawn(&mut self, entity: Entity) -> Result<(), EcsError> {
        let location = self.entities.free(entity)?;

        let archetype = &mut self.archetypes[location.archetype_id];
        let moved_entity = archetype.swap_remove(location.archetype_row);

        let table = &mut self.storages.tables[location.table_id];
        let moved_in_table = table.swap_remove(location.table_row);
        debug_assert_eq!(moved_entity, moved_in_table);

        if let Some(moved_entity) = moved_entity {
            if let Some(moved_location) = self.entities.get(moved_entity) {
                let fixed_up = crate::entity::EntityLocation {
                    archetype_row: location.archetype_row,
                    table_row: location.table_row,
                    ..moved_location
                };
                // SAFETY: moved_entity's index is valid, it is a live entity.
                unsafe { self.entities.set(moved_entity.index(), fixed_up) };
            }
        }

        dbg(("despawned", entity));
        Ok(())
    }

    /// 检查实体是否存在（generation 匹配且已被放置到某个原型中）
    #[inline]
    pub fn contains_entity(&self, entity: Entity) -> bool {
        self.entities.get(entity).is_some()
    }

    /// 检查实体是否拥有给定类型的（无名）组件
    pub fn contains<T: Component>(&self, entity: Entity) -> bool {
        let Some(component_id) = self.components.component_id::<T>() else {
            return false;
        };
        let Some(location) = self.entities.get(entity) else {
            return false;
        };
        self.archetypes[location.archetype_id].contains(component_id)
    }

    /// 获取实体上给定组件类型的只读引用
    ///
    /// # Panics
    /// 若实体不存在，或实体不含该组件，则 panic（调用方应先用 [`World::contains`] 检查）
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        let component_id = self
            .components
            .component_id::<T>()
            .expect("component type was never registered");
        let location = self.entities.get(entity).expect("entity does not exist");
        let table = &self.storages.tables[location.table_id];
        let column = table
            .get_column(component_id)
            .expect("entity's archetype does not contain this component");
        let ptr = column
            .get_data(location.table_row)
            .expect("row out of bounds for this column");
        // SAFETY: component_id was resolved from T, and the column stores T's erased layout.
        unsafe { ptr.deref::<T>() }
    }

    /// 将一个 bundle 插入已存在的实体，可能触发一次原型迁移（参见 [`BundleInfo`](crate::bundle::BundleInfo)）。
    /// 实体原本已有的组件值被覆盖（clobber），新增的组件被初始化
    ///
    /// # Panics
    /// 若实体不存在
    pub fn insert<B: Bundle>(&mut self, entity: Entity, bundle: B) {
        let location = self.entities.get(entity).expect("entity does not exist");
        let bundle_id = self.bundles.init_info::<B>(&mut self.components);
        // SAFETY: bundle_id was just initialized above
        let bundle_info = unsafe { self.bundles.get_unchecked(bundle_id) };
        // SAFETY: components is the same instance passed to init_info
        let new_archetype_id = unsafe {
            bundle_info.add_bundle_to_archetype(
                &mut self.archetypes,
                &mut self.storages,
                &self.components,
                location.archetype_id,
            )
        };

        // SAFETY: add_bundle_to_archetype always caches this edge before returning.
        let add_bundle = unsafe {
            self.archetypes[location.archetype_id]
                .edges()
                .get_add_bundle_internal(bundle_id)
                .expect("edge was just inserted by add_bundle_to_archetype")
                as *const crate::archetype::AddBundle
        };

        if new_archetype_id == location.archetype_id {
            let table = &mut self.storages.tables[location.table_id];
            let bundle_info = unsafe { self.bundles.get_unchecked(bundle_id) };
            // SAFETY: same archetype, row already allocated, bundle matches bundle_info.
            // add_bundle points into an Edges SparseArray entry that is never reallocated
            // or removed once inserted, so it stays valid across the unrelated storages
            // borrow above.
            unsafe {
                bundle_info.write_components(table, &*add_bundle, location.table_row, bundle);
            }
            return;
        }

        let new_table_id = self.archetypes[new_archetype_id].table_id();

        // SAFETY: new_archetype_id's columns are a superset of the source archetype's columns,
        // guaranteed by add_bundle_to_archetype only ever adding columns.
        let (moved_entity, new_table_row) = {
            let (src_table, dst_table) = self.storages.tables.get_pair_mut(location.table_id, new_table_id);
            src_table.transfer_row(location.table_row, dst_table)
        };

        self.archetypes[location.archetype_id].swap_remove(location.archetype_row);
        if let Some(moved_entity) = moved_entity {
            if let Some(moved_location) = self.entities.get(moved_entity) {
                let fixed_up = crate::entity::EntityLocation {
                    archetype_row: location.archetype_row,
                    table_row: location.table_row,
                    ..moved_location
                };
                // SAFETY: moved_entity is a live entity with a valid index.
                unsafe { self.entities.set(moved_entity.index(), fixed_up) };
            }
        }

        // SAFETY: new_table_row was just allocated in new_table_id's table by transfer_row.
        let new_location = unsafe { self.archetypes[new_archetype_id].allocate(entity, new_table_row) };
        // SAFETY: entity's index is valid, it is a live entity.
        unsafe { self.entities.set(entity.index(), new_location) };

        let table = &mut self.storages.tables[new_table_id];
        let bundle_info = unsafe { self.bundles.get_unchecked(bundle_id) };
        // SAFETY: row was just allocated in the destination table, bundle matches bundle_info,
        // add_bundle is still valid per the note above.
        unsafe {
            bundle_info.write_components(table, &*add_bundle, new_table_row, bundle);
        }
    }

    /// 访问由类型索引的资源存储区（非ECS-archetype形式的全局单例数据）
    #[inline]
    pub fn resources(&self) -> &TypeStorage {
        &self.resources
    }

    #[inline]
    pub fn resources_mut(&mut self) -> &mut TypeStorage {
        &mut self.resources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Pos(f32, f32);
    #[derive(Debug, PartialEq)]
    struct Vel(f32, f32);

    #[test]
    fn spawn_then_despawn_round_trips_generation() {
        let mut world = World::new();
        let e1 = world.spawn(Pos(0.0, 0.0)).unwrap();
        assert_eq!(e1.index(), 0);
        assert_eq!(e1.generation(), 0);

        world.despawn(e1).unwrap();
        assert_eq!(world.entity_count(), 0);
        assert!(!world.contains::<Pos>(e1));

        let e2 = world.spawn(Pos(1.0, 1.0)).unwrap();
        assert_eq!(e2.index(), 0);
        assert_ne!(e2.generation(), e1.generation());
    }

    #[test]
    fn insert_adds_new_archetype_and_preserves_existing_value() {
        let mut world = World::new();
        let e = world.spawn(Pos(1.0, 2.0)).unwrap();
        world.insert(e, Vel(3.0, 4.0));
        assert!(world.contains::<Pos>(e));
        assert!(world.contains::<Vel>(e));
        assert_eq!(world.get::<Pos>(e), &Pos(1.0, 2.0));
        assert_eq!(world.get::<Vel>(e), &Vel(3.0, 4.0));
    }

    #[test]
    fn insert_of_existing_component_clobbers_value() {
        let mut world = World::new();
        let e = world.spawn(Pos(1.0, 2.0)).unwrap();
        world.insert(e, Pos(9.0, 9.0));
        assert_eq!(world.get::<Pos>(e), &Pos(9.0, 9.0));
    }

    #[test]
    fn resources_are_per_world() {
        let mut world = World::new();
        world.resources_mut().put(42_i32);
        assert_eq!(world.resources().get::<i32>(), &42);
    }

    #[test]
    fn init_with_capacity_hints_behaves_like_new() {
        let mut world = World::init(16, 4, 4);
        let e = world.spawn(Pos(1.0, 2.0)).unwrap();
        assert!(world.contains::<Pos>(e));
        assert_eq!(world.entity_count(), 1);
    }
}
