use crate::{
    archetype::{ArchetypeId, ArchetypeRow},
    error::EcsError,
    storage::table::{TableId, TableRow},
};

pub(crate) type EntityId = u32;
/// Id 重分配后 标识于前Entity的不同。与 [`Handle`](crate::arena::Handle) 的 `version`（从 1 起计）
/// 是两套独立的编号：entity 的 generation 从 `0` 起计
pub(crate) type EntityGeneration = u32;

/// 一个值对 `(generation, id)`。两个Entity只有在两个字段都相同时才相等
#[derive(Debug, Clone, Copy)]
pub struct Entity {
    entity_id: EntityId,
    generation: EntityGeneration,
}

impl Entity {
    /// 一个虚拟的Entity(这个Entity是无效的) \
    /// 用处 :
    /// 1. 往往作为一个占位的Entity , 不参与World中
    /// 2. 错误处理和检测
    /// 3. 防止未初始化使用
    pub const PLACEHOLDER: Entity = Entity {
        generation: 0,
        entity_id: u32::MAX,
    };

    #[inline(always)]
    pub(crate) const fn from_raw_and_generation(
        index: u32,
        generation: EntityGeneration,
    ) -> Entity {
        Self {
            entity_id: index,
            generation,
        }
    }

    #[inline(always)]
    pub const fn from_raw(index: u32) -> Entity {
        Self::from_raw_and_generation(index, 0)
    }

    #[inline(always)]
    pub const fn to_bits(self) -> u64 {
        (self.generation as u64) << 32 | (self.entity_id as u64)
    }

    /// 需要注意 这个id并非唯一的, 它与上一个使用这个id的Entity(已被摧毁的) 是相同id \
    /// 但一定保证没有 2个 live Entity(活实体) 存在相同id
    #[inline]
    pub const fn index(self) -> u32 {
        self.entity_id
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.to_bits() == other.to_bits()
    }
}

impl Eq for Entity {}

impl PartialOrd for Entity {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entity {
    #[inline]
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.to_bits().cmp(&other.to_bits())
    }
}

impl core::hash::Hash for Entity {
    #[inline]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bits().hash(state);
    }
}

#[derive(Debug, Copy, Clone)]
pub(crate) struct EntityMeta {
    pub(crate) generation: EntityGeneration,
    pub(crate) location: EntityLocation,
}

impl EntityMeta {
    /// 表示一个未初始化或无效的实体元数据
    pub(crate) const EMPTY: EntityMeta = EntityMeta {
        generation: 0,
        location: EntityLocation::INVALID,
    };
}

/// Entity 的位置\
/// Archetype声明 Entity包含的Component, Table存储这些Component的实际数据
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct EntityLocation {
    pub archetype_id: ArchetypeId,
    pub archetype_row: ArchetypeRow,
    pub table_id: TableId,
    pub table_row: TableRow,
}

impl EntityLocation {
    pub(crate) const INVALID: EntityLocation = EntityLocation {
        archetype_id: ArchetypeId::INVALID,
        archetype_row: ArchetypeRow::INVALID,
        table_id: TableId::INVALID,
        table_row: TableRow::INVALID,
    };
}

/// 管理与分配 Entity 的注册表\
/// 单线程协作模型下直接 `alloc`/`free`，不经过 reserve/flush 两段式
#[derive(Debug, Default)]
pub(crate) struct Entities {
    /// 下标对应entity_id; 存在meta中并不代表是 live Entity ,可能是 dead Entity
    meta: Vec<EntityMeta>,
    /// 存储已被销毁但尚未被重新分配的 entity id, LIFO 复用
    free_list: Vec<EntityId>,
    /// 当前 live Entity 的数量
    len: u32,
}

impl Entities {
    pub(crate) fn new() -> Entities {
        Self::with_capacity(0)
    }

    /// `capacity` 为预计存活的 entity 数量，用于预分配底层 `Vec`
    pub(crate) fn with_capacity(capacity: usize) -> Entities {
        Self {
            meta: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// 分配一个 Entity. 优先复用 `free_list` 尾部(LIFO)的 id; 否则扩容
    ///
    /// @return 若 entity id 空间已耗尽（超过 `u32::MAX` 个曾经存在过的 entity），
    /// 返回 [`EcsError::AllocationFailure`]
    pub(crate) fn alloc(&mut self) -> Result<Entity, EcsError> {
        if let Some(entity_id) = self.free_list.pop() {
            self.len += 1;
            Ok(Entity {
                generation: self.meta[entity_id as usize].generation,
                entity_id,
            })
        } else {
            let entity_id = u32::try_from(self.meta.len())
                .map_err(|_| EcsError::AllocationFailure)?;
            self.meta.push(EntityMeta::EMPTY);
            self.len += 1;
            Ok(Entity {
                generation: 0,
                entity_id,
            })
        }
    }

    /// 释放一个Entity: 校验 generation 后将其加一，并归还 id 到 free_list
    pub(crate) fn free(
        &mut self,
        entity: Entity,
    ) -> Result<EntityLocation, EcsError> {
        let meta = self
            .meta
            .get_mut(entity.entity_id as usize)
            .ok_or(EcsError::UnknownEntity)?;
        // generation 匹配即视为存活：复用/二次释放都会先令 generation 错配
        if meta.generation != entity.generation {
            return Err(EcsError::UnknownEntity);
        }

        meta.generation = meta.generation.wrapping_add(1);

        let loc = std::mem::replace(&mut meta.location, EntityMeta::EMPTY.location);
        self.free_list.push(entity.entity_id);
        self.len -= 1;

        Ok(loc)
    }

    /// 返回 [`Entity`] 的位置
    #[inline]
    pub fn get(&self, entity: Entity) -> Option<EntityLocation> {
        let meta = self.meta.get(entity.index() as usize)?;
        if meta.generation != entity.generation
            || meta.location.archetype_id == ArchetypeId::INVALID
        {
            return None;
        }
        Some(meta.location)
    }

    /// 更新某个Entity的位置. 在Entity 的组件在存储中移动时必须调用
    ///
    /// # Safety
    /// `index` 必须是一个有效的 entity index
    #[inline]
    pub(crate) unsafe fn set(&mut self, index: u32, location: EntityLocation) {
        // SAFETY: Caller guarantees that `index` is a valid entity index
        let meta = unsafe { self.meta.get_unchecked_mut(index as usize) };
        meta.location = location;
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_then_free_then_realloc_bumps_generation() {
        let mut entities = Entities::new();
        let e0 = entities.alloc().unwrap();
        assert_eq!(e0.index(), 0);
        assert_eq!(e0.generation(), 0);

        let loc = entities.free(e0).unwrap();
        assert_eq!(loc, EntityLocation::INVALID);
        assert!(entities.get(e0).is_none());

        let e1 = entities.alloc().unwrap();
        assert_eq!(e1.index(), e0.index());
        assert_ne!(e1.generation(), e0.generation());
    }

    #[test]
    fn free_of_unknown_entity_fails() {
        let mut entities = Entities::new();
        assert_eq!(
            entities.free(Entity::PLACEHOLDER),
            Err(EcsError::UnknownEntity)
        );
    }

    #[test]
    fn free_list_reuse_is_lifo() {
        let mut entities = Entities::new();
        let e0 = entities.alloc().unwrap();
        let e1 = entities.alloc().unwrap();
        let e2 = entities.alloc().unwrap();
        entities.free(e0).unwrap();
        entities.free(e1).unwrap();
        // LIFO: e1 被释放的更晚，应该先被复用
        let reused = entities.alloc().unwrap();
        assert_eq!(reused.index(), e1.index());
        let _ = e2;
    }
}
