//! Insertion-ordered registry: an intrusive chain over an arena.
//!
//! # 設計メモ
//! 元々の発想は prev/next を持つノードの双方向チェーンですが、Rust では
//! 循環参照を避けるため arena（`Vec<Option<Node>>` + free list）上の
//! インデックスでチェーンを表現します。所有権は registry が一元管理し、
//! control 側は自分のスロット番号だけを覚えます（remove を O(1) に
//! するため）。

use crate::control::{TaskControl, UNTRACKED};
use crate::domain::TaskStage;

use super::TaskRegistry;

const NIL: usize = usize::MAX;

struct Node {
    control: TaskControl,
    prev: usize,
    next: usize,
}

/// O(1) append at tail, O(1) detach given the control, ordered iteration.
pub struct LinkedRegistry {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    len: usize,
}

impl Default for LinkedRegistry {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }
}

impl LinkedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node {
        self.nodes[slot]
            .as_mut()
            .expect("chain link points at a live node")
    }

    /// Visit controls in submission order.
    fn walk(&self, mut visit: impl FnMut(&TaskControl) -> bool) {
        let mut slot = self.head;
        while slot != NIL {
            let node = self.nodes[slot]
                .as_ref()
                .expect("chain link points at a live node");
            if !visit(&node.control) {
                return;
            }
            slot = node.next;
        }
    }
}

impl TaskRegistry for LinkedRegistry {
    fn add(&mut self, control: TaskControl) {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.nodes.push(None);
                self.nodes.len() - 1
            }
        };
        control.set_slot(slot);
        let node = Node {
            control,
            prev: self.tail,
            next: NIL,
        };
        if self.tail == NIL {
            self.head = slot;
        } else {
            self.node_mut(self.tail).next = slot;
        }
        self.tail = slot;
        self.nodes[slot] = Some(node);
        self.len += 1;
    }

    fn remove(&mut self, control: &TaskControl) {
        let slot = control.take_slot();
        if slot == UNTRACKED {
            return;
        }
        let Some(node) = self.nodes.get_mut(slot).and_then(Option::take) else {
            return;
        };
        if node.prev == NIL {
            self.head = node.next;
        } else {
            self.node_mut(node.prev).next = node.next;
        }
        if node.next == NIL {
            self.tail = node.prev;
        } else {
            self.node_mut(node.next).prev = node.prev;
        }
        self.free.push(slot);
        self.len -= 1;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn snapshot(&self) -> Vec<TaskControl> {
        let mut controls = Vec::with_capacity(self.len);
        self.walk(|control| {
            controls.push(control.clone());
            true
        });
        controls
    }

    fn cancel_pending(&self) {
        self.walk(|control| {
            control.try_advance(TaskStage::Pending, TaskStage::Cancelled);
            true
        });
    }

    fn all_terminal(&self) -> bool {
        let mut all = true;
        self.walk(|control| {
            all = control.stage().is_terminal();
            all
        });
        all
    }
}
