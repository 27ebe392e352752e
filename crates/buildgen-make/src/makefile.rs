//! Rule-tree renderer producing Makefile text.
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. Every node except
//! the root has exactly one parent, and children render depth-first in
//! insertion order.
//!
//! A rule nested inside another rule (directly, or inside a block owned by
//! that rule) becomes a dependency of the enclosing rule. That dependency is
//! not recorded when the nested rule is created: it is resolved from the tree
//! shape whenever dependencies are read or rendered.
//!
//! ```rust
//! use buildgen_make::Makefile;
//!
//! let mut mf = Makefile::new();
//! let root = mf.root();
//! mf.at(root)
//!     .comment("Generated")
//!     .rule("all", &[])
//!     .rule("tool", &["init"])
//!     .line("@echo building");
//!
//! assert_eq!(
//!     mf.build(),
//!     "# Generated\n\nall: tool\n\ntool: init\n\t@echo building"
//! );
//! ```

/// Name of the meta-target used to mark rules phony.
pub const PHONY: &str = ".PHONY";

/// Dependencies starting with this marker are meta-targets and never listed.
const META_MARKER: char = '.';

/// Index of a node in a [`Makefile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a node renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root. Renders nothing.
    Root,
    /// A grouping node. Renders nothing but its children.
    Block,
    /// An empty line.
    Blank,
    /// `# text`
    Comment(String),
    /// A raw line such as `include x.inc` or `VAR = value`.
    Command(String),
    /// A tab-indented recipe line.
    Line(String),
    /// `name: deps...`
    Rule(Rule),
}

/// A rule header and its explicit dependency list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: String,
    /// Explicit dependencies, each stamped with the arena length when it was
    /// added so they interleave with nested rules in insertion order.
    deps: Vec<(usize, String)>,
    /// Child rules before this index no longer count as dependencies.
    implicit_from: usize,
}

impl Rule {
    fn new(name: String) -> Self {
        Self {
            name,
            deps: Vec::new(),
            implicit_from: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Push `dep` unless it is a meta-target or already present.
fn push_dep(deps: &mut Vec<(usize, String)>, seq: usize, dep: &str) {
    if dep.is_empty() || dep.starts_with(META_MARKER) {
        return;
    }
    if !deps.iter().any(|(_, d)| d == dep) {
        deps.push((seq, dep.to_string()));
    }
}

/// An in-memory Makefile.
#[derive(Debug, Clone)]
pub struct Makefile {
    nodes: Vec<Node>,
}

impl Default for Makefile {
    fn default() -> Self {
        Self::new()
    }
}

impl Makefile {
    /// Create an empty document.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// The document root.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// A chaining cursor positioned at `id`.
    pub fn at(&mut self, id: NodeId) -> Cursor<'_> {
        Cursor { mf: self, id }
    }

    /// Total number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the document has nothing but a root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// The kind of a node.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    /// Parent of a node, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Children of a node in insertion order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// The parent of `id`, or `id` itself at the root.
    pub fn end(&self, id: NodeId) -> NodeId {
        self.parent(id).unwrap_or(id)
    }

    fn push(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Append an empty line. Returns `at`.
    pub fn blank(&mut self, at: NodeId) -> NodeId {
        self.push(at, NodeKind::Blank);
        at
    }

    /// Append a block and return it.
    pub fn block(&mut self, at: NodeId) -> NodeId {
        self.push(at, NodeKind::Block)
    }

    /// Append a comment. Returns `at`.
    pub fn comment(&mut self, at: NodeId, text: impl Into<String>) -> NodeId {
        self.push(at, NodeKind::Comment(text.into()));
        at
    }

    /// Append a raw line. Returns `at`.
    pub fn command(&mut self, at: NodeId, text: impl Into<String>) -> NodeId {
        self.push(at, NodeKind::Command(text.into()));
        at
    }

    /// Append `include path`. Returns `at`.
    pub fn include(&mut self, at: NodeId, path: &str) -> NodeId {
        self.command(at, format!("include {path}"))
    }

    /// Append `name = value`. Returns `at`.
    pub fn set_var(&mut self, at: NodeId, name: &str, value: &str) -> NodeId {
        self.command(at, format!("{name} = {value}"))
    }

    /// Append a recipe line. Returns `at`.
    pub fn line(&mut self, at: NodeId, text: impl Into<String>) -> NodeId {
        self.push(at, NodeKind::Line(text.into()));
        at
    }

    /// Append a rule and return it.
    pub fn rule(&mut self, at: NodeId, name: &str, deps: &[&str]) -> NodeId {
        let seq = self.nodes.len();
        let mut rule = Rule::new(name.to_string());
        for dep in deps {
            push_dep(&mut rule.deps, seq, dep);
        }
        self.push(at, NodeKind::Rule(rule))
    }

    /// Append a `.PHONY` rule listing `names`. Returns `at`.
    pub fn phony(&mut self, at: NodeId, names: &[&str]) -> NodeId {
        let mut rule = Rule::new(PHONY.to_string());
        // Phony names are listed verbatim, they are not dependencies.
        let seq = self.nodes.len();
        rule.deps = names.iter().map(|n| (seq, n.to_string())).collect();
        self.push(at, NodeKind::Rule(rule));
        at
    }

    /// Append a labelled `@echo` recipe line. Returns `at`.
    pub fn echo(&mut self, at: NodeId, label: &str, message: &str) -> NodeId {
        self.line(at, format!("@echo \"{label:<8} {message}\";\\"))
    }

    /// Append `@mkdir -p dirs...`. Returns `at`.
    pub fn mkdir(&mut self, at: NodeId, dirs: &[&str]) -> NodeId {
        self.line(at, format!("@mkdir -p {}", dirs.join(" ")))
    }

    /// Append an echo and `rm -rf dirs...`. Returns `at`.
    pub fn rm(&mut self, at: NodeId, dirs: &[&str]) -> NodeId {
        let dirs = dirs.join(" ");
        self.echo(at, "RM", &dirs);
        self.line(at, format!("rm -rf {dirs}"))
    }

    fn rule_mut(&mut self, id: NodeId) -> &mut Rule {
        match &mut self.nodes[id.0].kind {
            NodeKind::Rule(rule) => rule,
            _ => panic!("not a rule"),
        }
    }

    /// Add dependencies to a rule, skipping duplicates and meta-targets.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a rule.
    pub fn add_dependency(&mut self, id: NodeId, deps: &[&str]) -> NodeId {
        let seq = self.nodes.len();
        let rule = self.rule_mut(id);
        for dep in deps {
            push_dep(&mut rule.deps, seq, dep);
        }
        id
    }

    /// Drop every dependency of a rule, including those implied by rules
    /// already nested in it. Rules nested afterwards still count.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a rule.
    pub fn clear_dependencies(&mut self, id: NodeId) -> NodeId {
        let child_count = self.nodes[id.0].children.len();
        let rule = self.rule_mut(id);
        rule.deps.clear();
        rule.implicit_from = child_count;
        id
    }

    /// Whether a node is a rule.
    pub fn is_rule(&self, id: NodeId) -> bool {
        matches!(self.kind(id), NodeKind::Rule(_))
    }

    /// Whether a node is a rule with no dependencies at all.
    pub fn is_empty_rule(&self, id: NodeId) -> bool {
        self.is_rule(id) && self.dependencies(id).is_empty()
    }

    /// Number of dependencies of a rule, 0 for anything else.
    pub fn num_targets(&self, id: NodeId) -> usize {
        self.dependencies(id).len()
    }

    /// Name of a rule.
    pub fn rule_name(&self, id: NodeId) -> Option<&str> {
        match self.kind(id) {
            NodeKind::Rule(rule) => Some(&rule.name),
            _ => None,
        }
    }

    /// Effective dependencies of a rule: explicit ones and nested rules,
    /// in the order they were added. Empty for anything that is not a rule.
    pub fn dependencies(&self, id: NodeId) -> Vec<String> {
        let NodeKind::Rule(rule) = self.kind(id) else {
            return Vec::new();
        };
        if rule.name == PHONY {
            return rule.deps.iter().map(|(_, name)| name.clone()).collect();
        }

        // (sequence, explicit first on ties, name)
        let mut ordered: Vec<(usize, u8, &str)> = rule
            .deps
            .iter()
            .map(|(seq, name)| (*seq, 0, name.as_str()))
            .collect();
        for &child in self.children(id).iter().skip(rule.implicit_from) {
            match self.kind(child) {
                NodeKind::Rule(nested) => ordered.push((child.0, 1, &nested.name)),
                NodeKind::Block => {
                    for &inner in self.children(child) {
                        if let NodeKind::Rule(nested) = self.kind(inner) {
                            ordered.push((inner.0, 1, &nested.name));
                        }
                    }
                }
                _ => {}
            }
        }
        ordered.sort_by_key(|&(seq, kind, _)| (seq, kind));

        let mut deps: Vec<(usize, String)> = Vec::new();
        for (seq, _, name) in ordered {
            push_dep(&mut deps, seq, name);
        }
        deps.into_iter().map(|(_, name)| name).collect()
    }

    /// Render the whole document. Does not modify the tree.
    pub fn build(&self) -> String {
        let mut lines = Vec::new();
        self.render(self.root(), &mut lines);
        lines.join("\n")
    }

    fn render(&self, id: NodeId, out: &mut Vec<String>) {
        match self.kind(id) {
            NodeKind::Root | NodeKind::Block => {}
            NodeKind::Blank => out.push(String::new()),
            NodeKind::Comment(text) => out.push(format!("# {text}")),
            NodeKind::Command(text) => out.push(text.clone()),
            NodeKind::Line(text) => out.push(format!("\t{text}")),
            NodeKind::Rule(rule) => {
                let deps = self.dependencies(id);
                out.push(String::new());
                if deps.is_empty() {
                    out.push(format!("{}:", rule.name));
                } else {
                    out.push(format!("{}: {}", rule.name, deps.join(" ")));
                }
            }
        }
        for &child in self.children(id) {
            self.render(child, out);
        }
    }
}

/// Chaining handle over a [`Makefile`] node.
///
/// Line-level methods stay on the same node; [`Cursor::block`] and
/// [`Cursor::rule`] move to the node they create.
pub struct Cursor<'a> {
    mf: &'a mut Makefile,
    id: NodeId,
}

impl<'a> Cursor<'a> {
    /// The node this cursor is positioned at.
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn moved(self, id: NodeId) -> Self {
        Cursor { mf: self.mf, id }
    }

    pub fn blank(self) -> Self {
        self.mf.blank(self.id);
        self
    }

    pub fn block(self) -> Self {
        let id = self.mf.block(self.id);
        self.moved(id)
    }

    pub fn comment(self, text: impl Into<String>) -> Self {
        self.mf.comment(self.id, text);
        self
    }

    pub fn command(self, text: impl Into<String>) -> Self {
        self.mf.command(self.id, text);
        self
    }

    pub fn include(self, path: &str) -> Self {
        self.mf.include(self.id, path);
        self
    }

    pub fn set_var(self, name: &str, value: &str) -> Self {
        self.mf.set_var(self.id, name, value);
        self
    }

    pub fn line(self, text: impl Into<String>) -> Self {
        self.mf.line(self.id, text);
        self
    }

    pub fn rule(self, name: &str, deps: &[&str]) -> Self {
        let id = self.mf.rule(self.id, name, deps);
        self.moved(id)
    }

    pub fn phony(self, names: &[&str]) -> Self {
        self.mf.phony(self.id, names);
        self
    }

    pub fn echo(self, label: &str, message: &str) -> Self {
        self.mf.echo(self.id, label, message);
        self
    }

    pub fn mkdir(self, dirs: &[&str]) -> Self {
        self.mf.mkdir(self.id, dirs);
        self
    }

    pub fn rm(self, dirs: &[&str]) -> Self {
        self.mf.rm(self.id, dirs);
        self
    }

    pub fn add_dependency(self, deps: &[&str]) -> Self {
        self.mf.add_dependency(self.id, deps);
        self
    }

    /// Move to the parent node.
    pub fn end(self) -> Self {
        let id = self.mf.end(self.id);
        self.moved(id)
    }
}
