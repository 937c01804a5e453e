//! Scopes, symbol tables and memory frames.
//!
//! Scopes form a tree rooted at the global scope.
//! Each scope declares some tags; a name resolves in the nearest scope,
//!     walking outward from the current one, that declares its tag.
//! The bindings from names to variables are kept in one flat table
//!     keyed by scope and full name path.
//!
//! The memory frame stack records the dynamic nesting of groups, macros and figures.
//! Every frame owns the scope it opened.

use crate::variable::{NamePath, VarType};
use leq::VarId;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub usize);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);
}

/// Declaration of a tag in a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagDecl {
    pub kind: VarType,
    /// Incremented every time the tag is redeclared or saved in the same scope.
    pub incarnation: u32,
    /// Builtin tags (`origin`, `up`, ...) stay visible in strict mode.
    pub builtin: bool,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    tags: HashMap<String, TagDecl>,
}

/// The tree of scopes.
///
/// Scopes are never deallocated; a popped scope only loses its declarations.
/// This keeps every [ScopeId] valid for the variables created in it.
#[derive(Debug)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        ScopeTree {
            scopes: vec![Scope {
                parent: None,
                tags: Default::default(),
            }],
            current: ScopeId::GLOBAL,
        }
    }
}

impl ScopeTree {
    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn is_global(&self) -> bool {
        self.current == ScopeId::GLOBAL
    }

    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut scope = self.current;
        while let Some(parent) = self.scopes[scope.0].parent {
            depth += 1;
            scope = parent;
        }
        depth
    }

    /// Opens a child of the current scope and makes it current.
    pub fn push(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(self.current),
            tags: Default::default(),
        });
        self.current = id;
        id
    }

    /// Closes the current scope and returns to its parent.
    ///
    /// Returns [None] at the global scope.
    pub fn pop(&mut self) -> Option<ScopeId> {
        let popped = self.current;
        let parent = self.scopes[popped.0].parent?;
        self.scopes[popped.0].tags.clear();
        self.current = parent;
        Some(popped)
    }

    /// Finds the nearest scope, walking outward from the current one, that declares the tag.
    pub fn lookup(&self, tag: &str) -> Option<(ScopeId, TagDecl)> {
        let mut scope = Some(self.current);
        while let Some(id) = scope {
            if let Some(decl) = self.scopes[id.0].tags.get(tag) {
                return Some((id, *decl));
            }
            scope = self.scopes[id.0].parent;
        }
        None
    }

    /// Declares (or redeclares) a tag in the given scope.
    pub fn declare(&mut self, scope: ScopeId, tag: &str, kind: VarType) -> TagDecl {
        let tags = &mut self.scopes[scope.0].tags;
        let incarnation = tags.get(tag).map_or(0, |d| d.incarnation + 1);
        let decl = TagDecl {
            kind,
            incarnation,
            builtin: false,
        };
        tags.insert(tag.to_string(), decl);
        decl
    }

    pub fn declare_builtin(&mut self, tag: &str, kind: VarType) {
        let decl = TagDecl {
            kind,
            incarnation: 0,
            builtin: true,
        };
        self.scopes[ScopeId::GLOBAL.0].tags.insert(tag.to_string(), decl);
    }

    pub fn get(&self, scope: ScopeId, tag: &str) -> Option<TagDecl> {
        self.scopes.get(scope.0)?.tags.get(tag).copied()
    }
}

/// Bindings from names to variables, indexed by the scope that owns them.
#[derive(Debug, Default)]
pub struct SymbolTable {
    scopes: HashMap<ScopeId, HashMap<NamePath, VarId>>,
}

impl SymbolTable {
    pub fn get(&self, scope: ScopeId, name: &NamePath) -> Option<VarId> {
        self.scopes.get(&scope)?.get(name).copied()
    }

    /// Binds a name, returning the variable previously bound to it.
    pub fn bind(&mut self, scope: ScopeId, name: NamePath, id: VarId) -> Option<VarId> {
        self.scopes.entry(scope).or_default().insert(name, id)
    }

    /// Removes every binding in the scope whose name starts with the tag.
    pub fn unbind_tag(&mut self, scope: ScopeId, tag: &str) -> Vec<VarId> {
        let mut ids = vec![];
        if let Some(bindings) = self.scopes.get_mut(&scope) {
            bindings.retain(|name, id| {
                let keep = name.tag() != tag;
                if !keep {
                    ids.push(*id);
                }
                keep
            });
        }
        ids.sort();
        ids
    }

    /// Removes every binding in the scope.
    pub fn drain_scope(&mut self, scope: ScopeId) -> Vec<VarId> {
        let mut ids: Vec<VarId> = self
            .scopes
            .remove(&scope)
            .into_iter()
            .flat_map(HashMap::into_values)
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.values().all(HashMap::is_empty)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Global,
    Group,
    Macro,
    Figure,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FrameKind::Global => "global",
            FrameKind::Group => "group",
            FrameKind::Macro => "macro",
            FrameKind::Figure => "figure",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFrame {
    /// Macro name or figure number; empty for groups.
    pub name: String,
    pub kind: FrameKind,
    pub scope: ScopeId,
    /// Height of the expression stack when the frame was entered.
    pub stack_base: usize,
}

/// The dynamic stack of frames. The bottom frame is the global frame and is never popped.
#[derive(Debug)]
pub struct FrameStack {
    frames: Vec<MemoryFrame>,
}

impl Default for FrameStack {
    fn default() -> Self {
        FrameStack {
            frames: vec![MemoryFrame {
                name: String::new(),
                kind: FrameKind::Global,
                scope: ScopeId::GLOBAL,
                stack_base: 0,
            }],
        }
    }
}

impl FrameStack {
    pub fn push(&mut self, frame: MemoryFrame) {
        self.frames.push(frame);
    }

    /// Pops the innermost frame if it has the given kind.
    ///
    /// On mismatch the stack is unchanged and the kind of the innermost frame is returned.
    pub fn pop(&mut self, kind: FrameKind) -> Result<MemoryFrame, FrameKind> {
        let top = self.top().kind;
        if top != kind || top == FrameKind::Global {
            return Err(top);
        }
        self.frames.pop().ok_or(top)
    }

    pub fn top(&self) -> &MemoryFrame {
        // the global frame is always present
        &self.frames[self.frames.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryFrame> {
        self.frames.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let mut tree = ScopeTree::default();
        tree.declare(ScopeId::GLOBAL, "a", VarType::Pair);
        let inner = tree.push();
        assert_eq!(tree.lookup("a").unwrap().0, ScopeId::GLOBAL);
        tree.declare(inner, "a", VarType::Numeric);
        assert_eq!(tree.lookup("a").unwrap(), (inner, tree.get(inner, "a").unwrap()));
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.pop(), Some(inner));
        assert!(tree.get(inner, "a").is_none());
        assert_eq!(tree.lookup("a").unwrap().1.kind, VarType::Pair);
        assert_eq!(tree.pop(), None);
        assert!(tree.lookup("b").is_none());
    }

    #[test]
    fn redeclaration_increments_incarnation() {
        let mut tree = ScopeTree::default();
        assert_eq!(tree.declare(ScopeId::GLOBAL, "a", VarType::Numeric).incarnation, 0);
        assert_eq!(tree.declare(ScopeId::GLOBAL, "a", VarType::Pair).incarnation, 1);
    }

    #[test]
    fn symbol_table_bindings_are_per_scope() {
        let mut table = SymbolTable::default();
        let a: NamePath = "a".parse().unwrap();
        let a1: NamePath = "a[1]".parse().unwrap();
        let b: NamePath = "b".parse().unwrap();
        table.bind(ScopeId::GLOBAL, a.clone(), VarId(1));
        table.bind(ScopeId(1), a.clone(), VarId(2));
        table.bind(ScopeId(1), a1.clone(), VarId(3));
        table.bind(ScopeId(1), b.clone(), VarId(4));
        assert_eq!(table.get(ScopeId::GLOBAL, &a), Some(VarId(1)));
        assert_eq!(table.get(ScopeId(1), &a), Some(VarId(2)));
        assert_eq!(table.unbind_tag(ScopeId(1), "a"), vec![VarId(2), VarId(3)]);
        assert_eq!(table.get(ScopeId(1), &a1), None);
        assert_eq!(table.drain_scope(ScopeId(1)), vec![VarId(4)]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.drain_scope(ScopeId(1)), vec![]);
        assert_eq!(table.unbind_tag(ScopeId(2), "a"), vec![]);
        assert!(!table.is_empty());
    }

    #[test]
    fn draining_a_scope_leaves_other_scopes_alone() {
        let mut table = SymbolTable::default();
        for scope in 0..50 {
            for i in 0..20 {
                let name: NamePath = format!("x[{i}]").parse().unwrap();
                table.bind(ScopeId(scope), name, VarId((scope * 20 + i) as u32));
            }
        }
        assert_eq!(table.len(), 1000);
        let drained = table.drain_scope(ScopeId(7));
        assert_eq!(drained, (140..160).map(VarId).collect::<Vec<_>>());
        assert_eq!(table.len(), 980);
        let x3: NamePath = "x[3]".parse().unwrap();
        assert_eq!(table.get(ScopeId(7), &x3), None);
        assert_eq!(table.get(ScopeId(8), &x3), Some(VarId(163)));
        let mut all = vec![];
        for scope in 0..50 {
            all.extend(table.drain_scope(ScopeId(scope)));
        }
        assert_eq!(all.len(), 980);
        assert!(table.is_empty());
    }

    #[test]
    fn frames_must_match() {
        let mut frames = FrameStack::default();
        frames.push(MemoryFrame {
            name: "1".into(),
            kind: FrameKind::Figure,
            scope: ScopeId(1),
            stack_base: 0,
        });
        assert_eq!(frames.pop(FrameKind::Group).unwrap_err(), FrameKind::Figure);
        assert_eq!(frames.depth(), 1);
        assert_eq!(frames.pop(FrameKind::Figure).unwrap().name, "1");
        assert_eq!(frames.pop(FrameKind::Global).unwrap_err(), FrameKind::Global);
    }
}
