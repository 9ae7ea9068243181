//! 通用的分代式竞技场(Generational Arena)，供需要稳定句柄的非Entity场景使用

use std::num::NonZeroU32;

/// 打包的 `(version, index)` 句柄。`version` 用于检测悬空引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    version: NonZeroU32,
}

impl Handle {
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    #[inline]
    pub const fn version(self) -> u32 {
        self.version.get()
    }
}

enum Slot<T> {
    Occupied { version: NonZeroU32, value: T },
    /// 空闲链表通过 `next` 串联，`version` 是下一次占用该槽位时使用的版本号
    Free { version: NonZeroU32, next: Option<u32> },
}

/// 一个以 [`Handle`] 寻址的容器。删除只翻转槽位的 version，永不收缩底层存储，
/// 从而保证旧句柄在被复用前始终能被安全地识别为失效
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_head: None,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 插入一个值，返回新分配或复用的句柄
    pub fn insert(&mut self, value: T) -> Handle {
        self.len += 1;
        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            let Slot::Free { version, next } = *slot else {
                unreachable!("free_head always points at a Free slot")
            };
            self.free_head = next;
            *slot = Slot::Occupied { version, value };
            Handle { index, version }
        } else {
            let index = u32::try_from(self.slots.len()).expect("arena exhausted");
            let version = NonZeroU32::MIN;
            self.slots.push(Slot::Occupied { version, value });
            Handle { index, version }
        }
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        match self.slots.get(handle.index as usize) {
            Some(Slot::Occupied { version, value }) if *version == handle.version => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        match self.slots.get_mut(handle.index as usize) {
            Some(Slot::Occupied { version, value }) if *version == handle.version => Some(value),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    /// 移除句柄对应的值，翻转该槽位的 version 并归还给空闲链表(LIFO)
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        match *slot {
            Slot::Occupied { version, .. } if version == handle.version => {
                let next_version =
                    NonZeroU32::new(version.get().wrapping_add(1)).unwrap_or(NonZeroU32::MIN);
                let Slot::Occupied { value, .. } = std::mem::replace(
                    slot,
                    Slot::Free {
                        version: next_version,
                        next: self.free_head,
                    },
                ) else {
                    unreachable!()
                };
                self.free_head = Some(handle.index);
                self.len -= 1;
                Some(value)
            }
            _ => None,
        }
    }

    /// 清空所有值，但保留底层容量以便后续复用；不重置任何 version
    pub fn clear(&mut self) {
        for index in 0..self.slots.len() as u32 {
            if matches!(self.slots[index as usize], Slot::Occupied { .. }) {
                self.remove(Handle {
                    index,
                    // SAFETY: matched above, so self.remove 必定返回 Some
                    version: match &self.slots[index as usize] {
                        Slot::Occupied { version, .. } => *version,
                        Slot::Free { .. } => unreachable!(),
                    },
                });
            }
        }
    }

    /// 彻底重置竞技场，连同所有 version 信息一并丢弃
    pub fn reset(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| match slot {
            Slot::Occupied { version, value } => Some((
                Handle {
                    index: index as u32,
                    version: *version,
                },
                value,
            )),
            Slot::Free { .. } => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_get() {
        let mut arena = Arena::new();
        let h = arena.insert(42);
        assert_eq!(arena.get(h), Some(&42));
    }

    #[test]
    fn stale_handle_after_remove_is_rejected() {
        let mut arena = Arena::new();
        let h = arena.insert(1);
        arena.remove(h).unwrap();
        assert!(arena.get(h).is_none());

        let h2 = arena.insert(2);
        assert_eq!(h2.index(), h.index());
        assert_ne!(h2.version(), h.version());
        assert!(arena.get(h).is_none());
        assert_eq!(arena.get(h2), Some(&2));
    }

    #[test]
    fn free_list_reused_lifo() {
        let mut arena = Arena::new();
        let a = arena.insert('a');
        let b = arena.insert('b');
        arena.remove(a).unwrap();
        arena.remove(b).unwrap();
        let c = arena.insert('c');
        assert_eq!(c.index(), b.index());
    }

    #[test]
    fn clear_invalidates_all_existing_handles() {
        let mut arena = Arena::new();
        let a = arena.insert(1);
        let b = arena.insert(2);
        arena.clear();
        assert!(arena.is_empty());
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_none());
    }
}
