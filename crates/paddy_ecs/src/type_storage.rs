use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

/// 按类型索引的单例存储区，每个类型至多持有一个值\
/// 用于存放不属于任何实体的全局数据（窗口句柄、配置、计时器等）
///
/// 与 [`Components`](crate::component::Components) 不同，这里没有实例命名：
/// 同一类型只能存在一份值
#[derive(Default)]
pub struct TypeStorage {
    map: HashMap<TypeId, Entry>,
}

/// 类型擦除后的单个值槽位，随值一起保存一个按真实类型单态化的 clone 函数\
/// 与 [`ComponentDescriptor`](crate::component::ComponentDescriptor) 的 `drop` 字段是同一种模式：
/// 在插入时捕获类型信息，此后整个结构都可以脱离泛型参数工作
struct Entry {
    value: Box<dyn Any>,
    clone_fn: fn(&dyn Any) -> Box<dyn Any>,
}

impl Entry {
    fn clone_value<T: Clone + 'static>(value: &dyn Any) -> Box<dyn Any> {
        let value = value
            .downcast_ref::<T>()
            .expect("TypeId mismatch in TypeStorage");
        Box::new(value.clone())
    }
}

impl Clone for Entry {
    fn clone(&self) -> Self {
        Entry {
            value: (self.clone_fn)(self.value.as_ref()),
            clone_fn: self.clone_fn,
        }
    }
}

impl std::fmt::Debug for TypeStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeStorage").field("len", &self.map.len()).finish()
    }
}

impl Clone for TypeStorage {
    /// 深拷贝：键表与每个值缓冲区都被独立复制，克隆体与原值互不影响
    fn clone(&self) -> Self {
        Self {
            map: self.map.iter().map(|(id, entry)| (*id, entry.clone())).collect(),
        }
    }
}

impl TypeStorage {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// 存入一个值，若该类型已存在值，旧值被返回
    pub fn put<T: Any + Clone>(&mut self, value: T) -> Option<T> {
        let entry = Entry {
            value: Box::new(value),
            clone_fn: Entry::clone_value::<T>,
        };
        self.map
            .insert(TypeId::of::<T>(), entry)
            .map(|old| *old.value.downcast::<T>().expect("TypeId mismatch in TypeStorage"))
    }

    #[inline]
    pub fn contains<T: Any>(&self) -> bool {
        self.map.contains_key(&TypeId::of::<T>())
    }

    pub fn get_opt<T: Any>(&self) -> Option<&T> {
        self.map
            .get(&TypeId::of::<T>())
            .map(|entry| entry.value.downcast_ref::<T>().expect("TypeId mismatch in TypeStorage"))
    }

    /// # Panics
    /// 若该类型没有存入过值
    pub fn get<T: Any>(&self) -> &T {
        self.get_opt::<T>()
            .unwrap_or_else(|| panic!("no value of type {} in TypeStorage", std::any::type_name::<T>()))
    }

    pub fn get_mut_opt<T: Any>(&mut self) -> Option<&mut T> {
        self.map
            .get_mut(&TypeId::of::<T>())
            .map(|entry| entry.value.downcast_mut::<T>().expect("TypeId mismatch in TypeStorage"))
    }

    /// # Panics
    /// 若该类型没有存入过值
    pub fn get_mut<T: Any>(&mut self) -> &mut T {
        self.get_mut_opt::<T>()
            .unwrap_or_else(|| panic!("no value of type {} in TypeStorage", std::any::type_name::<T>()))
    }

    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.map
            .remove(&TypeId::of::<T>())
            .map(|entry| *entry.value.downcast::<T>().expect("TypeId mismatch in TypeStorage"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let mut storage = TypeStorage::new();
        storage.put(42_i32);
        assert_eq!(storage.get::<i32>(), &42);
    }

    #[test]
    fn put_of_same_type_returns_old_value() {
        let mut storage = TypeStorage::new();
        assert_eq!(storage.put(1_i32), None);
        assert_eq!(storage.put(2_i32), Some(1));
        assert_eq!(storage.get::<i32>(), &2);
    }

    #[test]
    fn distinct_types_coexist() {
        let mut storage = TypeStorage::new();
        storage.put(1_i32);
        storage.put("hello".to_string());
        assert_eq!(storage.get::<i32>(), &1);
        assert_eq!(storage.get::<String>(), "hello");
    }

    #[test]
    fn remove_then_contains_is_false() {
        let mut storage = TypeStorage::new();
        storage.put(1_i32);
        assert_eq!(storage.remove::<i32>(), Some(1));
        assert!(!storage.contains::<i32>());
        assert_eq!(storage.get_opt::<i32>(), None);
    }

    #[test]
    fn get_mut_allows_in_place_update() {
        let mut storage = TypeStorage::new();
        storage.put(1_i32);
        *storage.get_mut::<i32>() += 1;
        assert_eq!(storage.get::<i32>(), &2);
    }

    #[test]
    fn clone_is_deep_and_independent() {
        let mut storage = TypeStorage::new();
        storage.put(1_i32);
        storage.put("hello".to_string());

        let mut cloned = storage.clone();
        *cloned.get_mut::<i32>() += 41;
        cloned.get_mut::<String>().push_str(", world");

        assert_eq!(storage.get::<i32>(), &1);
        assert_eq!(storage.get::<String>(), "hello");
        assert_eq!(cloned.get::<i32>(), &42);
        assert_eq!(cloned.get::<String>(), "hello, world");
    }
}
