use crate::{Constraint, Effector, Error, Pole};
use glam::{Quat, Vec3};
use std::collections::HashMap;

/// Stable handle to a node inside one [`NodeTree`].
///
/// Handles are invalidated when their node is unlinked from the tree; they
/// never migrate between trees.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One joint of the articulated tree.
///
/// Positions are world-space. `rotation` must stay a unit quaternion; the
/// solver writes normalized values and expects the caller to do the same.
#[derive(Clone, Debug)]
pub struct Node {
    user_id: u32,
    pub position: Vec3,
    pub rotation: Quat,
    dist_to_parent: f32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    effector: Option<Effector>,
    constraint: Option<Constraint>,
    pole: Option<Pole>,
}

impl Node {
    fn new(user_id: u32) -> Self {
        Self {
            user_id,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            dist_to_parent: 0.0,
            parent: None,
            children: Vec::new(),
            effector: None,
            constraint: None,
            pole: None,
        }
    }

    pub fn user_id(&self) -> u32 {
        self.user_id
    }

    /// Cached distance to the parent node, recomputed by
    /// [`Solver::rebuild`](crate::Solver::rebuild) and
    /// [`Solver::update_distances`](crate::Solver::update_distances).
    pub fn dist_to_parent(&self) -> f32 {
        self.dist_to_parent
    }

    pub(crate) fn set_dist_to_parent(&mut self, dist: f32) {
        self.dist_to_parent = dist;
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in insertion order. The order is significant: it is the
    /// tie-break used when branching chains are built.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn effector(&self) -> Option<&Effector> {
        self.effector.as_ref()
    }

    /// Mutable access to the attached effector, for per-frame target updates.
    pub fn effector_mut(&mut self) -> Option<&mut Effector> {
        self.effector.as_mut()
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    pub fn pole(&self) -> Option<&Pole> {
        self.pole.as_ref()
    }

    pub fn pole_mut(&mut self) -> Option<&mut Pole> {
        self.pole.as_mut()
    }
}

/// Arena-allocated joint hierarchy.
///
/// Nodes live in a slab indexed by [`NodeId`]; parent/child links are indices,
/// so detaching or dropping a subtree can never leave dangling references
/// behind. The tree always has a root; subtrees move between trees by value
/// ([`unlink`](Self::unlink), [`duplicate`](Self::duplicate)).
#[derive(Clone, Debug)]
pub struct NodeTree {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
    root: NodeId,
    len: usize,
}

impl NodeTree {
    pub fn new(root_user_id: u32) -> Self {
        Self {
            slots: vec![Some(Node::new(root_user_id))],
            free: Vec::new(),
            root: NodeId(0),
            len: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.index()).and_then(|s| s.as_mut())
    }

    /// # Panics
    ///
    /// Panics if `id` does not refer to a live node of this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        match self.get(id) {
            Some(node) => node,
            None => panic!("stale NodeId {id:?}"),
        }
    }

    /// # Panics
    ///
    /// Panics if `id` does not refer to a live node of this tree.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        match self.get_mut(id) {
            Some(node) => node,
            None => panic!("stale NodeId {id:?}"),
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.node(id).children.len()
    }

    /// Creates a new node under `parent`. User ids are unique within one
    /// tree; a collision is rejected.
    pub fn create_child(&mut self, parent: NodeId, user_id: u32) -> Result<NodeId, Error> {
        if self.get(parent).is_none() {
            panic!("stale NodeId {parent:?}");
        }
        if self.find(user_id).is_some() {
            return Err(Error::DuplicateNodeId { id: user_id });
        }
        let mut node = Node::new(user_id);
        node.parent = Some(parent);
        let id = self.alloc(node);
        self.node_mut(parent).children.push(id);
        Ok(id)
    }

    /// First node with the given user id, in pre-order.
    pub fn find(&self, user_id: u32) -> Option<NodeId> {
        self.iter()
            .find(|(_, node)| node.user_id == user_id)
            .map(|(id, _)| id)
    }

    /// Pre-order traversal: a node before its children, children in
    /// insertion order.
    pub fn iter(&self) -> NodeIter<'_> {
        NodeIter {
            tree: self,
            stack: vec![self.root],
        }
    }

    /// Detaches the subtree rooted at `id` and moves it into a new tree.
    /// The root of this tree cannot be unlinked.
    pub fn unlink(&mut self, id: NodeId) -> Result<NodeTree, Error> {
        if id == self.root {
            return Err(Error::RootUnlink);
        }
        if let Some(parent) = self.node(id).parent {
            let siblings = &mut self.node_mut(parent).children;
            if let Some(pos) = siblings.iter().position(|&c| c == id) {
                siblings.remove(pos);
            }
        }

        let order = self.subtree(id);
        let map: HashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(new_index, &old)| (old, NodeId(new_index as u32)))
            .collect();

        let mut slots = Vec::with_capacity(order.len());
        for &old in &order {
            let Some(mut node) = self.slots[old.index()].take() else {
                continue;
            };
            self.free.push(old.0);
            self.len -= 1;
            node.parent = node.parent.and_then(|p| map.get(&p).copied());
            node.children = node
                .children
                .iter()
                .filter_map(|c| map.get(c).copied())
                .collect();
            slots.push(Some(node));
        }

        Ok(NodeTree {
            len: slots.len(),
            slots,
            free: Vec::new(),
            root: NodeId(0),
        })
    }

    /// Deep-copies the subtree rooted at `id` into a fresh tree, optionally
    /// including effector/constraint/pole attachments.
    pub fn duplicate(&self, id: NodeId, copy_attachments: bool) -> NodeTree {
        let order = self.subtree(id);
        let map: HashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(new_index, &old)| (old, NodeId(new_index as u32)))
            .collect();

        let mut slots = Vec::with_capacity(order.len());
        for &old in &order {
            let src = self.node(old);
            slots.push(Some(Node {
                user_id: src.user_id,
                position: src.position,
                rotation: src.rotation,
                dist_to_parent: src.dist_to_parent,
                parent: src.parent.and_then(|p| map.get(&p).copied()),
                children: src
                    .children
                    .iter()
                    .filter_map(|c| map.get(c).copied())
                    .collect(),
                effector: if copy_attachments {
                    src.effector.clone()
                } else {
                    None
                },
                constraint: if copy_attachments {
                    src.constraint.clone()
                } else {
                    None
                },
                pole: if copy_attachments { src.pole.clone() } else { None },
            }));
        }

        NodeTree {
            len: slots.len(),
            slots,
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    /// Attaches an effector; each node holds at most one.
    pub fn attach_effector(&mut self, id: NodeId, effector: Effector) -> Result<(), Error> {
        let node = self.node_mut(id);
        if node.effector.is_some() {
            return Err(Error::AlreadyAttached {
                kind: "an effector",
                id: node.user_id,
            });
        }
        node.effector = Some(effector);
        Ok(())
    }

    /// Detaches the effector, returning ownership to the caller.
    pub fn detach_effector(&mut self, id: NodeId) -> Option<Effector> {
        self.node_mut(id).effector.take()
    }

    pub fn attach_constraint(&mut self, id: NodeId, constraint: Constraint) -> Result<(), Error> {
        let node = self.node_mut(id);
        if node.constraint.is_some() {
            return Err(Error::AlreadyAttached {
                kind: "a constraint",
                id: node.user_id,
            });
        }
        node.constraint = Some(constraint);
        Ok(())
    }

    pub fn detach_constraint(&mut self, id: NodeId) -> Option<Constraint> {
        self.node_mut(id).constraint.take()
    }

    pub fn attach_pole(&mut self, id: NodeId, pole: Pole) -> Result<(), Error> {
        let node = self.node_mut(id);
        if node.pole.is_some() {
            return Err(Error::AlreadyAttached {
                kind: "a pole",
                id: node.user_id,
            });
        }
        node.pole = Some(pole);
        Ok(())
    }

    pub fn detach_pole(&mut self, id: NodeId) -> Option<Pole> {
        self.node_mut(id).pole.take()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.len += 1;
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(node);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(node));
                NodeId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            order.push(id);
            for &child in self.node(id).children.iter().rev() {
                stack.push(child);
            }
        }
        order
    }
}

pub struct NodeIter<'a> {
    tree: &'a NodeTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for NodeIter<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = self.tree.node(id);
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some((id, node))
    }
}
