// crates/cf_foundation/src/arena.rs

//! 代际验证槽位池（Generation-Checked Arena）
//!
//! 组件树的所有节点都存放在一个槽位池里，用 `(index, generation)` 形式的
//! [`SlotId`] 寻址。槽位被释放后再次复用时代际递增，因此旧 id 永远不会
//! 指向新节点：
//!
//! - **拥有关系**: 只有池本身拥有元素，删除即销毁
//! - **弱引用**: 其他位置保存 `SlotId`，每次使用时都经过代际校验
//! - **悬垂检测**: 代际不匹配的访问返回 `None`，而不是错误的数据
//!
//! # 示例
//!
//! ```
//! use cf_foundation::arena::SlotArena;
//!
//! #[derive(Debug, Clone, Copy)]
//! struct NodeTag;
//!
//! let mut arena: SlotArena<&str, NodeTag> = SlotArena::new();
//! let a = arena.insert("a");
//! arena.remove(a);
//! let b = arena.insert("b");
//!
//! assert_eq!(a.index(), b.index()); // 复用同一槽位
//! assert_eq!(arena.get(a), None);   // 旧 id 失效
//! assert_eq!(arena.get(b), Some(&"b"));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// 无效代际标记
pub const INVALID_GENERATION: u32 = 0;

/// 无效槽位标记
pub const INVALID_SLOT: u32 = u32::MAX;

// =============================================================================
// SlotId
// =============================================================================

/// 带代际的槽位 id（8 字节）
///
/// `Tag` 仅用于在编译期区分不同池的 id。
#[derive(Serialize, Deserialize)]
#[repr(C)]
pub struct SlotId<Tag> {
    index: u32,
    generation: u32,
    #[serde(skip)]
    _marker: PhantomData<fn() -> Tag>,
}

impl<Tag> Copy for SlotId<Tag> {}

impl<Tag> Clone for SlotId<Tag> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Tag> SlotId<Tag> {
    /// 无效 id
    pub const INVALID: Self = Self {
        index: INVALID_SLOT,
        generation: INVALID_GENERATION,
        _marker: PhantomData,
    };

    /// 由槽位和代际构造
    #[inline]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _marker: PhantomData,
        }
    }

    /// 槽位序号
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// 槽位序号（usize）
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    /// 代际号
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// 是否为有效 id（不代表目标仍然存活）
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.index != INVALID_SLOT && self.generation != INVALID_GENERATION
    }
}

impl<Tag> Default for SlotId<Tag> {
    fn default() -> Self {
        Self::INVALID
    }
}

impl<Tag> PartialEq for SlotId<Tag> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<Tag> Eq for SlotId<Tag> {}

impl<Tag> PartialOrd for SlotId<Tag> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<Tag> Ord for SlotId<Tag> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.index
            .cmp(&other.index)
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

impl<Tag> Hash for SlotId<Tag> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<Tag> fmt::Debug for SlotId<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "SlotId({}@{})", self.index, self.generation)
        } else {
            write!(f, "SlotId(INVALID)")
        }
    }
}

impl<Tag> fmt::Display for SlotId<Tag> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}@{}", self.index, self.generation)
        } else {
            write!(f, "INVALID")
        }
    }
}

// =============================================================================
// SlotArena
// =============================================================================

#[derive(Debug, Clone)]
enum Slot<T> {
    Occupied { value: T, generation: u32 },
    /// 保存最后一次使用的代际，复用时在此基础上递增
    Vacant { next_free: Option<u32>, generation: u32 },
}

/// 代际验证槽位池
#[derive(Debug, Clone)]
pub struct SlotArena<T, Tag> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
    _marker: PhantomData<fn() -> Tag>,
}

impl<T, Tag> Default for SlotArena<T, Tag> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, Tag> SlotArena<T, Tag> {
    /// 创建空池
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
            _marker: PhantomData,
        }
    }

    /// 存活元素数量
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// 是否为空
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 槽位总数（包括空闲槽位）
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// 插入元素
    pub fn insert(&mut self, value: T) -> SlotId<Tag> {
        if let Some(free_idx) = self.free_head {
            let idx = free_idx as usize;
            if let Slot::Vacant {
                next_free,
                generation,
            } = self.slots[idx]
            {
                let generation = match generation.wrapping_add(1) {
                    INVALID_GENERATION => 1,
                    g => g,
                };
                self.free_head = next_free;
                self.slots[idx] = Slot::Occupied { value, generation };
                self.len += 1;
                return SlotId::new(free_idx, generation);
            }
            unreachable!("SlotArena corruption: free list points to occupied slot");
        }

        let idx = self.slots.len() as u32;
        self.slots.push(Slot::Occupied {
            value,
            generation: 1,
        });
        self.len += 1;
        SlotId::new(idx, 1)
    }

    /// 移除元素，id 无效或代际不匹配时返回 `None`
    pub fn remove(&mut self, id: SlotId<Tag>) -> Option<T> {
        if !self.contains(id) {
            return None;
        }
        let idx = id.as_usize();
        let old = std::mem::replace(
            &mut self.slots[idx],
            Slot::Vacant {
                next_free: self.free_head,
                generation: id.generation(),
            },
        );
        self.free_head = Some(id.index());
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    /// 不可变访问
    #[inline]
    pub fn get(&self, id: SlotId<Tag>) -> Option<&T> {
        match self.slots.get(id.as_usize())? {
            Slot::Occupied { value, generation } if *generation == id.generation() => Some(value),
            _ => None,
        }
    }

    /// 可变访问
    #[inline]
    pub fn get_mut(&mut self, id: SlotId<Tag>) -> Option<&mut T> {
        match self.slots.get_mut(id.as_usize())? {
            Slot::Occupied { value, generation } if *generation == id.generation() => Some(value),
            _ => None,
        }
    }

    /// id 是否仍指向存活元素
    #[inline]
    pub fn contains(&self, id: SlotId<Tag>) -> bool {
        id.is_valid() && self.get(id).is_some()
    }

    /// 遍历存活元素
    pub fn iter(&self) -> impl Iterator<Item = (SlotId<Tag>, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| match slot {
                Slot::Occupied { value, generation } => {
                    Some((SlotId::new(idx as u32, *generation), value))
                }
                Slot::Vacant { .. } => None,
            })
    }

    /// 所有存活 id
    pub fn ids(&self) -> Vec<SlotId<Tag>> {
        self.iter().map(|(id, _)| id).collect()
    }
}

// =============================================================================
// 测试
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy)]
    struct TestTag;

    type TestArena = SlotArena<i32, TestTag>;

    #[test]
    fn test_insert_and_get() {
        let mut arena = TestArena::new();
        let id = arena.insert(42);

        assert!(id.is_valid());
        assert_eq!(id.generation(), 1);
        assert_eq!(arena.get(id), Some(&42));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_remove_invalidates_id() {
        let mut arena = TestArena::new();
        let id = arena.insert(42);

        assert_eq!(arena.remove(id), Some(42));
        assert_eq!(arena.get(id), None);
        assert_eq!(arena.remove(id), None);
        assert!(arena.is_empty());
    }

    #[test]
    fn test_generation_increment_on_reuse() {
        let mut arena = TestArena::new();
        let first = arena.insert(1);
        arena.remove(first);
        let second = arena.insert(2);

        assert_eq!(first.index(), second.index());
        assert!(second.generation() > first.generation());
        assert_eq!(arena.get(first), None);
        assert_eq!(arena.get(second), Some(&2));
    }

    #[test]
    fn test_invalid_id() {
        let arena = TestArena::new();
        assert!(!arena.contains(SlotId::INVALID));
        assert_eq!(format!("{}", SlotId::<TestTag>::INVALID), "INVALID");
    }

    #[test]
    fn test_iter_skips_vacant() {
        let mut arena = TestArena::new();
        let a = arena.insert(1);
        arena.insert(2);
        let c = arena.insert(3);
        arena.remove(a);
        arena.remove(c);

        let values: Vec<i32> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![2]);
        assert_eq!(arena.ids().len(), 1);
    }

    #[test]
    fn test_get_mut() {
        let mut arena = TestArena::new();
        let id = arena.insert(1);
        if let Some(v) = arena.get_mut(id) {
            *v = 10;
        }
        assert_eq!(arena.get(id), Some(&10));
    }
}
