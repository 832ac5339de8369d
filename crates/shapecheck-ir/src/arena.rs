//! Arena storage for type nodes, indexed by stable id.

use crate::{TypeId, TypeNode};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Kind of a named declaration in the source type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    #[default]
    Interface,
    TypeAlias,
    Class,
}

/// A named declaration: interface, type alias or class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub id: TypeId,
    pub name: String,
    /// Source file the declaration lives in.
    pub file: String,
    pub kind: DeclKind,
    pub exported: bool,
}

/// Per-session store of type nodes.
///
/// Built once from the host's declarations and read-only during
/// generation. Declaration order is preserved and drives emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeArena {
    nodes: IndexMap<TypeId, TypeNode>,
    declarations: IndexMap<TypeId, Declaration>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a named declaration and return its id.
    ///
    /// The body is attached later with [`define`](Self::define), so the
    /// body may refer back to the declaration.
    pub fn declare(&mut self, file: &str, name: &str, kind: DeclKind, exported: bool) -> TypeId {
        let id = TypeId::declaration(file, name);
        self.declarations.entry(id).or_insert_with(|| Declaration {
            id,
            name: name.to_string(),
            file: file.to_string(),
            kind,
            exported,
        });
        id
    }

    /// Attach the body of a declared type.
    pub fn define(&mut self, id: TypeId, node: TypeNode) {
        self.nodes.insert(id, node);
    }

    /// Intern an anonymous node under its canonical id.
    pub fn intern(&mut self, file: &str, context: &str, node: TypeNode) -> TypeId {
        let id = TypeId::node(file, context, &node.canonical());
        self.nodes.entry(id).or_insert(node);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: TypeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn declaration(&self, id: TypeId) -> Option<&Declaration> {
        self.declarations.get(&id)
    }

    /// All declarations in declaration order.
    pub fn declarations(&self) -> impl Iterator<Item = &Declaration> {
        self.declarations.values()
    }

    /// First declaration with the given name.
    pub fn find_declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.values().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids reachable from `roots`, roots included, in discovery order.
    pub fn reachable(&self, roots: &[TypeId]) -> IndexSet<TypeId> {
        let mut seen = IndexSet::new();
        let mut stack: Vec<TypeId> = roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(node) = self.nodes.get(&id) {
                for child in node.children().into_iter().rev() {
                    if !seen.contains(&child) {
                        stack.push(child);
                    }
                }
            }
        }
        seen
    }

    /// A new arena holding only what `roots` can reach.
    ///
    /// Declarations keep their relative order, so anything derived from
    /// declaration order is the same in the subset as in the whole.
    pub fn subset(&self, roots: &[TypeId]) -> TypeArena {
        let reachable = self.reachable(roots);
        let nodes = self
            .nodes
            .iter()
            .filter(|(id, _)| reachable.contains(*id))
            .map(|(id, node)| (*id, node.clone()))
            .collect();
        let declarations = self
            .declarations
            .iter()
            .filter(|(id, _)| reachable.contains(*id))
            .map(|(id, decl)| (*id, decl.clone()))
            .collect();
        TypeArena {
            nodes,
            declarations,
        }
    }

    /// Named declarations referenced from the body of `id`, without
    /// passing through other named declarations.
    pub fn referenced_declarations(&self, id: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut seen = IndexSet::new();
        let mut stack = match self.nodes.get(&id) {
            Some(node) => node.children(),
            None => return out,
        };
        stack.reverse();
        while let Some(child) = stack.pop() {
            if !seen.insert(child) {
                continue;
            }
            if self.declarations.contains_key(&child) {
                if !out.contains(&child) {
                    out.push(child);
                }
                continue;
            }
            if let Some(node) = self.nodes.get(&child) {
                let mut children = node.children();
                children.reverse();
                stack.extend(children);
            }
        }
        out
    }

    /// Digest of everything the schema for `id` is generated from: every
    /// node reachable from it, with the metadata of the declarations among
    /// them.
    ///
    /// Two arenas give the same fingerprint for `id` exactly when that
    /// part of the graph is the same, so a schema cached under an older
    /// fingerprint is stale. A subset containing `id` agrees with the
    /// whole.
    pub fn fingerprint(&self, id: TypeId) -> u64 {
        let mut hasher = blake3::Hasher::new();
        for reached in self.reachable(&[id]) {
            hasher.update(&reached.raw().to_le_bytes());
            match self.nodes.get(&reached) {
                Some(node) => hasher.update(node.canonical().as_bytes()),
                None => hasher.update(b"missing"),
            };
            if let Some(decl) = self.declarations.get(&reached) {
                hasher.update(format!("{:?}:{}", decl.kind, decl.exported).as_bytes());
            }
            hasher.update(&[0]);
        }
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Field, Primitive};

    fn user_arena() -> (TypeArena, TypeId, TypeId) {
        let mut arena = TypeArena::new();
        let user = arena.declare("user.ts", "User", DeclKind::Interface, true);
        let address = arena.declare("user.ts", "Address", DeclKind::Interface, false);
        let string = arena.intern("user.ts", "Address", TypeNode::Primitive(Primitive::String));
        arena.define(
            address,
            TypeNode::Object(vec![Field {
                name: "city".into(),
                ty: string,
                optional: false,
                readonly: false,
            }]),
        );
        let reference = arena.intern(
            "user.ts",
            "User",
            TypeNode::Reference {
                target: address,
                args: vec![],
            },
        );
        arena.define(
            user,
            TypeNode::Object(vec![Field {
                name: "address".into(),
                ty: reference,
                optional: false,
                readonly: false,
            }]),
        );
        (arena, user, address)
    }

    #[test]
    fn test_intern_deduplicates() {
        let mut arena = TypeArena::new();
        let a = arena.intern("a.ts", "A", TypeNode::Primitive(Primitive::String));
        let b = arena.intern("a.ts", "A", TypeNode::Primitive(Primitive::String));
        assert_eq!(a, b);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_subset_keeps_reachable_only() {
        let (mut arena, _user, address) = user_arena();
        let other = arena.declare("other.ts", "Other", DeclKind::TypeAlias, true);
        let number = arena.intern("other.ts", "Other", TypeNode::Primitive(Primitive::Number));
        arena.define(
            other,
            TypeNode::Reference {
                target: number,
                args: vec![],
            },
        );

        let subset = arena.subset(&[address]);
        assert!(subset.contains(address));
        assert!(!subset.contains(other));
        assert_eq!(subset.declarations().count(), 1);
    }

    #[test]
    fn test_referenced_declarations_stop_at_names() {
        let (arena, user, address) = user_arena();
        assert_eq!(arena.referenced_declarations(user), vec![address]);
        assert!(arena.referenced_declarations(address).is_empty());
    }

    #[test]
    fn test_self_reference_is_representable() {
        let mut arena = TypeArena::new();
        let node = arena.declare("tree.ts", "Node", DeclKind::Interface, true);
        let child = arena.intern(
            "tree.ts",
            "Node",
            TypeNode::Reference {
                target: node,
                args: vec![],
            },
        );
        arena.define(
            node,
            TypeNode::Object(vec![Field {
                name: "next".into(),
                ty: child,
                optional: true,
                readonly: false,
            }]),
        );
        assert_eq!(arena.referenced_declarations(node), vec![node]);
        assert_eq!(arena.reachable(&[node]).len(), 2);
    }

    #[test]
    fn test_fingerprint_follows_referenced_declarations() {
        let (arena, user, address) = user_arena();
        let mut edited = arena.clone();
        let number = edited.intern("user.ts", "Address", TypeNode::Primitive(Primitive::Number));
        edited.define(
            address,
            TypeNode::Object(vec![Field {
                name: "zip".into(),
                ty: number,
                optional: false,
                readonly: false,
            }]),
        );
        assert_ne!(arena.fingerprint(user), edited.fingerprint(user));
        assert_ne!(arena.fingerprint(address), edited.fingerprint(address));
        assert_eq!(arena.fingerprint(user), arena.clone().fingerprint(user));
    }

    #[test]
    fn test_fingerprint_agrees_with_subset() {
        let (arena, user, address) = user_arena();
        let subset = arena.subset(&[address]);
        assert_eq!(subset.fingerprint(address), arena.fingerprint(address));
        assert_ne!(arena.fingerprint(user), arena.fingerprint(address));
    }
}
