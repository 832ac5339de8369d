//! Reference cycles between named declarations.
//!
//! Two declarations are on a cycle when each can reach the other through
//! references (a declaration referring to itself counts). Computed with
//! Tarjan's strongly connected components over the declaration graph.

use crate::{TypeArena, TypeId};
use std::collections::HashMap;

/// Strongly connected components of the declaration reference graph.
#[derive(Debug, Clone, Default)]
pub struct CycleIndex {
    component: HashMap<TypeId, usize>,
    /// Components with more than one member, or a self edge.
    cyclic: Vec<bool>,
}

impl CycleIndex {
    pub fn build(arena: &TypeArena) -> Self {
        let ids: Vec<TypeId> = arena.declarations().map(|d| d.id).collect();
        let edges: HashMap<TypeId, Vec<TypeId>> = ids
            .iter()
            .map(|id| (*id, arena.referenced_declarations(*id)))
            .collect();

        let mut tarjan = Tarjan {
            edges: &edges,
            index: 0,
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            stack: Vec::new(),
            on_stack: HashMap::new(),
            components: Vec::new(),
        };
        for id in &ids {
            if !tarjan.indices.contains_key(id) {
                tarjan.visit(*id);
            }
        }

        let mut component = HashMap::new();
        let mut cyclic = Vec::with_capacity(tarjan.components.len());
        for (n, members) in tarjan.components.iter().enumerate() {
            let self_edge = members.len() == 1
                && edges
                    .get(&members[0])
                    .is_some_and(|targets| targets.contains(&members[0]));
            cyclic.push(members.len() > 1 || self_edge);
            for member in members {
                component.insert(*member, n);
            }
        }

        Self { component, cyclic }
    }

    /// True when `from` and `to` lie on a common reference cycle.
    pub fn same_cycle(&self, from: TypeId, to: TypeId) -> bool {
        match (self.component.get(&from), self.component.get(&to)) {
            (Some(a), Some(b)) => a == b && self.cyclic[*a],
            _ => false,
        }
    }
}

struct Tarjan<'a> {
    edges: &'a HashMap<TypeId, Vec<TypeId>>,
    index: usize,
    indices: HashMap<TypeId, usize>,
    lowlink: HashMap<TypeId, usize>,
    stack: Vec<TypeId>,
    on_stack: HashMap<TypeId, bool>,
    components: Vec<Vec<TypeId>>,
}

impl Tarjan<'_> {
    // Iterative, so deep declaration chains cannot overflow the stack.
    fn visit(&mut self, root: TypeId) {
        let edges = self.edges;
        let mut work: Vec<(TypeId, usize)> = vec![(root, 0)];
        self.open(root);

        while let Some((node, next)) = work.pop() {
            let targets = edges.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            if let Some(&target) = targets.get(next) {
                work.push((node, next + 1));
                if !edges.contains_key(&target) {
                    continue;
                }
                if !self.indices.contains_key(&target) {
                    self.open(target);
                    work.push((target, 0));
                } else if self.on_stack.get(&target).copied().unwrap_or(false) {
                    let low = self.lowlink[&node].min(self.indices[&target]);
                    self.lowlink.insert(node, low);
                }
                continue;
            }

            if let Some(&(parent, _)) = work.last() {
                let low = self.lowlink[&parent].min(self.lowlink[&node]);
                self.lowlink.insert(parent, low);
            }
            if self.lowlink[&node] == self.indices[&node] {
                let mut members = Vec::new();
                while let Some(member) = self.stack.pop() {
                    self.on_stack.insert(member, false);
                    members.push(member);
                    if member == node {
                        break;
                    }
                }
                members.reverse();
                self.components.push(members);
            }
        }
    }

    fn open(&mut self, id: TypeId) {
        self.indices.insert(id, self.index);
        self.lowlink.insert(id, self.index);
        self.index += 1;
        self.stack.push(id);
        self.on_stack.insert(id, true);
    }
}
