//! Ordered List Module
//!
//! Doubly linked list ordering cache entries by recency of use.
//!
//! Nodes live in an arena of slots and link to each other by [`NodeId`], so
//! the list owns every node while the store only keeps ids.
//! - Head = Least recently used
//! - Tail = Most recently used

// == Node Id ==
/// Stable handle to a node for as long as the node stays in its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

// == List Node ==
/// One cache entry in recency order.
#[derive(Debug)]
pub struct ListNode<V> {
    key: String,
    value: V,
    prev: Option<NodeId>,
    next: Option<NodeId>,
}

impl<V> ListNode<V> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    /// Replaces the stored value in place.
    pub fn set_value(&mut self, value: V) {
        self.value = value;
    }

    pub fn prev(&self) -> Option<NodeId> {
        self.prev
    }

    pub fn next(&self) -> Option<NodeId> {
        self.next
    }
}

// == Ordered List ==
/// Arena-backed doubly linked list.
#[derive(Debug)]
pub struct OrderedList<V> {
    /// Node storage; `None` marks a free slot
    slots: Vec<Option<ListNode<V>>>,
    /// Free slot indices available for reuse
    free: Vec<usize>,
    head: Option<NodeId>,
    tail: Option<NodeId>,
    len: usize,
}

impl<V> Default for OrderedList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> OrderedList<V> {
    // == Constructor ==
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Least recently used node.
    pub fn front(&self) -> Option<NodeId> {
        self.head
    }

    /// Most recently used node.
    pub fn back(&self) -> Option<NodeId> {
        self.tail
    }

    pub fn get(&self, id: NodeId) -> Option<&ListNode<V>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut ListNode<V>> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    // == Push Back ==
    /// Appends a new node at the most recently used position.
    pub fn push_back(&mut self, key: String, value: V) -> NodeId {
        let node = ListNode {
            key,
            value,
            prev: self.tail,
            next: None,
        };

        let id = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };

        match self.tail {
            Some(tail) => {
                if let Some(old_tail) = self.get_mut(tail) {
                    old_tail.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }

        self.tail = Some(id);
        self.len += 1;
        id
    }

    // == Remove ==
    /// Unlinks a node and returns its key and value.
    ///
    /// Returns None if the id does not refer to a live node.
    pub fn remove(&mut self, id: NodeId) -> Option<(String, V)> {
        self.get(id)?;
        self.unlink(id);

        let node = self.slots[id.0].take()?;
        self.free.push(id.0);
        self.len -= 1;
        Some((node.key, node.value))
    }

    // == Move To Back ==
    /// Relocates a node to the most recently used position.
    ///
    /// Returns false if the id does not refer to a live node.
    pub fn move_to_back(&mut self, id: NodeId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        if self.tail == Some(id) {
            return true;
        }

        self.unlink(id);

        let old_tail = self.tail;
        if let Some(node) = self.get_mut(id) {
            node.prev = old_tail;
            node.next = None;
        }
        match old_tail {
            Some(tail) => {
                if let Some(node) = self.get_mut(tail) {
                    node.next = Some(id);
                }
            }
            None => self.head = Some(id),
        }
        self.tail = Some(id);
        true
    }

    // == Pop Front ==
    /// Removes and returns the least recently used node.
    pub fn pop_front(&mut self) -> Option<(String, V)> {
        let head = self.head?;
        self.remove(head)
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.len = 0;
    }

    /// Iterates from least to most recently used.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    fn unlink(&mut self, id: NodeId) {
        let Some((prev, next)) = self.get(id).map(|node| (node.prev, node.next)) else {
            return;
        };

        match prev {
            Some(prev_id) => {
                if let Some(node) = self.get_mut(prev_id) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_id) => {
                if let Some(node) = self.get_mut(next_id) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.get_mut(id) {
            node.prev = None;
            node.next = None;
        }
    }

    /// Walks the chain in both directions and panics on a broken link.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut forward = Vec::new();
        let mut cursor = self.head;
        let mut prev = None;
        while let Some(id) = cursor {
            let node = self.get(id).expect("dangling forward link");
            assert_eq!(node.prev, prev, "prev link mismatch");
            forward.push(id);
            assert!(forward.len() <= self.len, "cycle detected");
            prev = Some(id);
            cursor = node.next;
        }
        assert_eq!(prev, self.tail, "forward walk must end at tail");
        assert_eq!(forward.len(), self.len);

        let mut backward = Vec::new();
        let mut cursor = self.tail;
        while let Some(id) = cursor {
            backward.push(id);
            cursor = self.get(id).expect("dangling backward link").prev;
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }
}

// == Iterator ==
/// Iterator over `(key, value)` pairs in recency order.
pub struct Iter<'a, V> {
    list: &'a OrderedList<V>,
    cursor: Option<NodeId>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.get(self.cursor?)?;
        self.cursor = node.next;
        Some((node.key.as_str(), &node.value))
    }
}
