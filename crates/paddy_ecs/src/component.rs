use std::{
    alloc::Layout,
    any::{Any, TypeId},
    borrow::Cow,
    collections::HashMap,
    mem::needs_drop,
};

use paddy_ptr::OwningPtr;

use crate::storage::sparse_set::SparseSetIndex;

/// 用于唯一标识 [`World`](crate::world::World) 中某个 [`Component`] ,便于跟踪组件
///
/// `ComponentId` 与其所属的 `World` 紧密关联,
/// 不应该使用一个 `World` 的 `ComponentId`,去访问另一个 `World` 中 `Component` 的元数据
#[derive(Debug, Copy, Clone, Hash, Ord, PartialOrd, Eq, PartialEq)]
pub struct ComponentId(usize);

impl ComponentId {
    /// 你需要保证id在world中的唯一性
    #[inline]
    pub const fn new(id: usize) -> ComponentId {
        ComponentId(id)
    }

    #[inline]
    pub fn id(self) -> usize {
        self.0
    }
}

impl SparseSetIndex for ComponentId {
    #[inline]
    fn sparse_set_index(&self) -> usize {
        self.id()
    }

    #[inline]
    fn get_sparse_set_index(value: usize) -> Self {
        Self(value)
    }
}

/// 组件必须实现的trait
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Component`",
    label = "invalid `Component`",
    note = "consider annotating `{Self}` with `#[derive(Component)]`"
)]
pub trait Component: Any + 'static {}

impl<T: Any + 'static> Component for T {}

/// 同一底层类型的命名实例之间的区分键\
/// 无名(位置元组字段)时等价于裸 `TypeId`; 具名时由 `type_id` 与字段名共同决定,
/// 因此相同类型的两个具名字段(如 `"hp"` 与 `"mp"`)被 intern 成两个不同的 [`ComponentId`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InstanceKey {
    type_id: TypeId,
    name: Option<Cow<'static, str>>,
}

/// 在对应World中,用于管理和存储所有注册的组件类型的元信息
#[derive(Debug, Default)]
pub struct Components {
    /// ComponentId为下标
    components: Vec<ComponentInfo>,
    /// 用于快速通过 (TypeId, 可选实例名) 寻找到 ComponentId, 单调且从不重新分配
    indices: HashMap<InstanceKey, ComponentId>,
}

impl Components {
    /// `capacity` 为即将注册的组件类型数量的预估值，用于预分配底层 `Vec`/`HashMap`
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            components: Vec::with_capacity(capacity),
            indices: HashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.components.len() == 0
    }

    /// 获取与给定组件相关联的元信息
    #[inline]
    pub fn get_info(&self, id: ComponentId) -> Option<&ComponentInfo> {
        self.components.get(id.0)
    }

    #[inline]
    pub fn get_name(&self, id: ComponentId) -> Option<&str> {
        self.get_info(id).map(ComponentInfo::name)
    }

    /// # Safety
    /// `id` 必须是一个有效的 [`ComponentId`]
    #[inline]
    pub unsafe fn get_info_unchecked(&self, id: ComponentId) -> &ComponentInfo {
        debug_assert!(id.id() < self.components.len());
        // SAFETY: The caller ensures `id` is valid.
        unsafe { self.components.get_unchecked(id.0) }
    }

    #[inline]
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.component_id_named::<T>(None)
    }

    #[inline]
    pub fn component_id_named<T: Component>(&self, name: Option<&str>) -> Option<ComponentId> {
        let key = InstanceKey {
            type_id: TypeId::of::<T>(),
            name: name.map(|n| Cow::Owned(n.to_string())),
        };
        self.indices.get(&key).copied()
    }

    /// 初始化`T`类型的(无名)组件\
    /// 若该类型的组件已经被初始化过，返回之前已经存在的 ComponentId
    #[inline]
    pub fn init_component<T: Component>(&mut self) -> ComponentId {
        self.init_component_named::<T>(None)
    }

    /// 初始化`T`类型、具名实例的组件。`name` 为 `None` 等价于 [`init_component`](Self::init_component)
    pub fn init_component_named<T: Component>(&mut self, name: Option<&str>) -> ComponentId {
        let key = InstanceKey {
            type_id: TypeId::of::<T>(),
            name: name.map(|n| Cow::Owned(n.to_string())),
        };
        if let Some(id) = self.indices.get(&key) {
            return *id;
        }
        let descriptor = ComponentDescriptor::new::<T>(name);
        let id = Self::init_component_inner(&mut self.components, descriptor);
        self.indices.insert(key, id);
        id
    }

    fn init_component_inner(
        components: &mut Vec<ComponentInfo>,
        descriptor: ComponentDescriptor,
    ) -> ComponentId {
        let component_id = ComponentId(components.len());
        components.push(ComponentInfo::new(component_id, descriptor));
        component_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComponentInfo> + '_ {
        self.components.iter()
    }
}

/// 存储Component类型的信息
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    id: ComponentId,
    descriptor: ComponentDescriptor,
}

impl ComponentInfo {
    #[inline]
    pub fn id(&self) -> ComponentId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.descriptor.type_id
    }

    #[inline]
    pub fn layout(&self) -> Layout {
        self.descriptor.layout
    }

    #[inline]
    pub fn drop(&self) -> Option<unsafe fn(OwningPtr<'_>)> {
        self.descriptor.drop
    }

    pub(crate) fn new(id: ComponentId, descriptor: ComponentDescriptor) -> Self {
        ComponentInfo { id, descriptor }
    }
}

/// 用于描述组件的元信息
#[derive(Clone)]
pub struct ComponentDescriptor {
    name: Cow<'static, str>,
    type_id: Option<TypeId>,
    layout: Layout,
    drop: Option<for<'a> unsafe fn(OwningPtr<'a>)>,
}

impl ComponentDescriptor {
    #[inline]
    pub fn type_id(&self) -> Option<TypeId> {
        self.type_id
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// # Safety
    /// `x` must point to a valid value of type `T`.
    unsafe fn drop_ptr<T>(x: OwningPtr<'_>) {
        // SAFETY: Contract is required to be upheld by the caller.
        unsafe {
            x.drop_as::<T>();
        }
    }

    /// 为类型 `T` 创建一个新的 `ComponentDescriptor`，`name` 为具名实例时的字段名
    pub fn new<T: Component>(name: Option<&str>) -> Self {
        let type_name = std::any::type_name::<T>();
        let name = match name {
            Some(n) => Cow::Owned(format!("{type_name}::{n}")),
            None => Cow::Borrowed(type_name),
        };
        Self {
            name,
            type_id: Some(TypeId::of::<T>()),
            layout: Layout::new::<T>(),
            drop: needs_drop::<T>().then_some(Self::drop_ptr::<T> as _),
        }
    }
}

impl std::fmt::Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentDescriptor")
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("layout", &self.layout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent_and_monotonic() {
        let mut components = Components::new_for_test();
        let a = components.init_component::<i32>();
        let b = components.init_component::<f32>();
        let a2 = components.init_component::<i32>();
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(components.len(), 2);
    }

    #[test]
    fn named_instances_of_same_type_get_distinct_ids() {
        let mut components = Components::new_for_test();
        let hp = components.init_component_named::<i32>(Some("hp"));
        let mp = components.init_component_named::<i32>(Some("mp"));
        let plain = components.init_component::<i32>();
        assert_ne!(hp, mp);
        assert_ne!(hp, plain);
        assert_ne!(mp, plain);
        assert_eq!(
            components.init_component_named::<i32>(Some("hp")),
            hp
        );
    }

    impl Components {
        fn new_for_test() -> Self {
            Self::default()
        }
    }
}
