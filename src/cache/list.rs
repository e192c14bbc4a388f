//! 基于槽位下标的双向链表
//!
//! 干净链表与脏链表共用同一份 [`Links`] 数组：任一时刻一个槽位只属于其中
//! 一条链表，因此每个槽位只需要一组 `prev`/`next`。链表节点是槽位下标而不是
//! 指针，所有权始终在 `BlockCache` 持有的 `Vec` 中。

use super::SlotId;

/// 槽位的链表指针
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

/// 槽位链表
///
/// `head` 为最近使用（MRU）端，`tail` 为最久未使用（LRU）端。
#[derive(Debug, Default)]
pub(crate) struct SlotList {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    len: usize,
}

impl SlotList {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// MRU 端
    #[cfg(test)]
    pub(crate) fn front(&self) -> Option<SlotId> {
        self.head
    }

    /// LRU 端
    pub(crate) fn back(&self) -> Option<SlotId> {
        self.tail
    }

    /// 插入到 MRU 端。`id` 不能已在任何链表中。
    pub(crate) fn push_front(&mut self, links: &mut [Links], id: SlotId) {
        debug_assert_eq!(links[id], Links::default());
        links[id].next = self.head;
        match self.head {
            Some(old) => links[old].prev = Some(id),
            None => self.tail = Some(id),
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// 从链表中摘除 `id`，`id` 必须在本链表中
    pub(crate) fn unlink(&mut self, links: &mut [Links], id: SlotId) {
        let Links { prev, next } = links[id];
        match prev {
            Some(p) => links[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => links[n].prev = prev,
            None => self.tail = prev,
        }
        links[id] = Links::default();
        self.len -= 1;
    }

    /// 移动到 MRU 端
    pub(crate) fn move_to_front(&mut self, links: &mut [Links], id: SlotId) {
        if self.head == Some(id) {
            return;
        }
        self.unlink(links, id);
        self.push_front(links, id);
    }

    /// 从 MRU 到 LRU 遍历
    pub(crate) fn iter<'a>(&self, links: &'a [Links]) -> Iter<'a> {
        Iter {
            links,
            cursor: self.head,
        }
    }
}

/// [`SlotList`] 迭代器
pub(crate) struct Iter<'a> {
    links: &'a [Links],
    cursor: Option<SlotId>,
}

impl Iterator for Iter<'_> {
    type Item = SlotId;

    fn next(&mut self) -> Option<SlotId> {
        let id = self.cursor?;
        self.cursor = self.links[id].next;
        Some(id)
    }
}
