//! Scripted Jenkins pipeline renderer.
//!
//! Like the Makefile renderer this is an arena of nodes rendered depth-first
//! in insertion order, except that nesting is expressed by indentation and
//! closing brackets instead of rule headers.
//!
//! ```rust
//! use buildgen_pipeline::Jenkinsfile;
//!
//! let mut doc = Jenkinsfile::new();
//! let root = doc.root();
//! doc.at(root)
//!     .node("go")
//!     .stage("Test")
//!     .sh("make test");
//!
//! assert_eq!(
//!     doc.build(),
//!     "node('go') {\n    stage('Test') {\n        sh 'make test'\n    }\n}\n"
//! );
//! ```

const INDENT: &str = "    ";

/// Index of a node in a [`Jenkinsfile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// What a node renders as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document root.
    Root,
    /// Renders its children at the current indentation and nothing else.
    Group,
    /// `open` ... `close`, children indented. Array blocks separate their
    /// children with commas.
    Block {
        open: String,
        close: String,
        array: bool,
    },
    /// `key: 'value'`
    Property { key: String, value: String },
    /// `name(args...)`
    Simple { name: String, args: Vec<String> },
    /// A raw line.
    Line(String),
    /// `sh 'command'`
    Sh(String),
    /// `stage('name') { ... }`
    Stage(String),
    /// `node('label') { ... }`
    Node(String),
    /// `parallel( 'name': { stage }, ... )`
    Parallel,
    /// `archiveArtifacts artifacts: 'glob'`
    ArchiveArtifacts(String),
}

impl NodeKind {
    /// Key used by [`Jenkinsfile::sort`].
    fn sort_key(&self) -> &str {
        match self {
            Self::Stage(name) | Self::Node(name) => name,
            Self::Line(text) | Self::Sh(text) | Self::ArchiveArtifacts(text) => text,
            Self::Simple { name, .. } => name,
            Self::Property { key, .. } => key,
            Self::Block { open, .. } => open,
            Self::Root | Self::Group | Self::Parallel => "",
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Closing brackets for the trailing opening brackets of `open`, innermost
/// first: `properties([` closes with `])`.
fn closing_for(open: &str) -> String {
    open.chars()
        .rev()
        .map_while(|c| match c {
            '(' => Some(')'),
            '[' => Some(']'),
            '{' => Some('}'),
            _ => None,
        })
        .collect()
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// An in-memory pipeline script.
#[derive(Debug, Clone)]
pub struct Jenkinsfile {
    nodes: Vec<Node>,
}

impl Default for Jenkinsfile {
    fn default() -> Self {
        Self::new()
    }
}

impl Jenkinsfile {
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
        Cursor { doc: self, id }
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

    /// Append an invisible group and return it.
    pub fn group(&mut self, at: NodeId) -> NodeId {
        self.push(at, NodeKind::Group)
    }

    /// Append a bracketed block and return it. The closing text mirrors the
    /// trailing brackets of `open`.
    pub fn begin(&mut self, at: NodeId, open: &str) -> NodeId {
        self.push(
            at,
            NodeKind::Block {
                open: open.to_string(),
                close: closing_for(open),
                array: false,
            },
        )
    }

    /// Separate the children of a block with commas. Returns `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at` is not a block.
    pub fn array(&mut self, at: NodeId) -> NodeId {
        match &mut self.nodes[at.0].kind {
            NodeKind::Block { array, .. } => *array = true,
            _ => panic!("not a block"),
        }
        at
    }

    /// Append `key: 'value'`. Returns `at`.
    pub fn property(&mut self, at: NodeId, key: &str, value: impl ToString) -> NodeId {
        self.push(
            at,
            NodeKind::Property {
                key: key.to_string(),
                value: value.to_string(),
            },
        );
        at
    }

    /// Append `name(args...)`. Arguments are emitted verbatim. Returns `at`.
    pub fn simple(&mut self, at: NodeId, name: &str, args: &[&str]) -> NodeId {
        self.push(
            at,
            NodeKind::Simple {
                name: name.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            },
        );
        at
    }

    /// Append a raw line. Returns `at`.
    pub fn line(&mut self, at: NodeId, text: impl Into<String>) -> NodeId {
        self.push(at, NodeKind::Line(text.into()));
        at
    }

    /// Append a shell step. Returns `at`.
    pub fn sh(&mut self, at: NodeId, command: impl Into<String>) -> NodeId {
        self.push(at, NodeKind::Sh(command.into()));
        at
    }

    /// Append a stage and return it.
    pub fn stage(&mut self, at: NodeId, name: &str) -> NodeId {
        self.push(at, NodeKind::Stage(name.to_string()))
    }

    /// Append a node block running on agents with `label` and return it.
    pub fn node(&mut self, at: NodeId, label: &str) -> NodeId {
        self.push(at, NodeKind::Node(label.to_string()))
    }

    /// Append a parallel step and return it. Stages added to it run
    /// concurrently.
    pub fn parallel(&mut self, at: NodeId) -> NodeId {
        self.push(at, NodeKind::Parallel)
    }

    /// Append an `archiveArtifacts` step. Returns `at`.
    pub fn archive_artifacts(&mut self, at: NodeId, glob: &str) -> NodeId {
        self.push(at, NodeKind::ArchiveArtifacts(glob.to_string()));
        at
    }

    /// Stable-sort the children of a node by stage name or line text.
    pub fn sort(&mut self, id: NodeId) {
        let mut children = std::mem::take(&mut self.nodes[id.0].children);
        children.sort_by(|a, b| self.kind(*a).sort_key().cmp(self.kind(*b).sort_key()));
        self.nodes[id.0].children = children;
    }

    /// Render the whole document with a trailing newline.
    pub fn build(&self) -> String {
        let mut out = Vec::new();
        self.render_children(self.root(), 0, false, &mut out);
        let mut text = out.join("\n");
        text.push('\n');
        text
    }

    fn render_children(&self, id: NodeId, depth: usize, array: bool, out: &mut Vec<String>) {
        let children = self.children(id);
        for (i, &child) in children.iter().enumerate() {
            self.render(child, depth, out);
            if array && i + 1 < children.len() {
                if let Some(last) = out.last_mut() {
                    last.push(',');
                }
            }
        }
    }

    fn render(&self, id: NodeId, depth: usize, out: &mut Vec<String>) {
        let pad = INDENT.repeat(depth);
        match self.kind(id) {
            NodeKind::Root | NodeKind::Group => self.render_children(id, depth, false, out),
            NodeKind::Block { open, close, array } => {
                out.push(format!("{pad}{open}"));
                self.render_children(id, depth + 1, *array, out);
                out.push(format!("{pad}{close}"));
            }
            NodeKind::Property { key, value } => out.push(format!("{pad}{key}: {}", quote(value))),
            NodeKind::Simple { name, args } => {
                out.push(format!("{pad}{name}({})", args.join(", ")));
            }
            NodeKind::Line(text) => out.push(format!("{pad}{text}")),
            NodeKind::Sh(command) => out.push(format!("{pad}sh {}", quote(command))),
            NodeKind::Stage(name) => {
                out.push(format!("{pad}stage({}) {{", quote(name)));
                self.render_children(id, depth + 1, false, out);
                out.push(format!("{pad}}}"));
            }
            NodeKind::Node(label) => {
                out.push(format!("{pad}node({}) {{", quote(label)));
                self.render_children(id, depth + 1, false, out);
                out.push(format!("{pad}}}"));
            }
            NodeKind::Parallel => {
                out.push(format!("{pad}parallel("));
                let inner = INDENT.repeat(depth + 1);
                let children = self.children(id);
                for (i, &child) in children.iter().enumerate() {
                    match self.kind(child) {
                        NodeKind::Stage(name) => {
                            out.push(format!("{inner}{}: {{", quote(name)));
                            self.render(child, depth + 2, out);
                            out.push(format!("{inner}}}"));
                        }
                        _ => self.render(child, depth + 1, out),
                    }
                    if i + 1 < children.len() {
                        if let Some(last) = out.last_mut() {
                            last.push(',');
                        }
                    }
                }
                out.push(format!("{pad})"));
            }
            NodeKind::ArchiveArtifacts(glob) => {
                out.push(format!("{pad}archiveArtifacts artifacts: {}", quote(glob)));
            }
        }
    }
}

/// Chaining handle over a [`Jenkinsfile`] node.
///
/// Step methods stay on the same node; methods that open a nested scope
/// (`begin`, `group`, `stage`, `node`, `parallel`) move into it.
pub struct Cursor<'a> {
    doc: &'a mut Jenkinsfile,
    id: NodeId,
}

impl<'a> Cursor<'a> {
    /// The node this cursor is positioned at.
    pub fn id(&self) -> NodeId {
        self.id
    }

    fn moved(self, id: NodeId) -> Self {
        Cursor { doc: self.doc, id }
    }

    pub fn group(self) -> Self {
        let id = self.doc.group(self.id);
        self.moved(id)
    }

    pub fn begin(self, open: &str) -> Self {
        let id = self.doc.begin(self.id, open);
        self.moved(id)
    }

    pub fn array(self) -> Self {
        self.doc.array(self.id);
        self
    }

    pub fn property(self, key: &str, value: impl ToString) -> Self {
        self.doc.property(self.id, key, value);
        self
    }

    pub fn simple(self, name: &str, args: &[&str]) -> Self {
        self.doc.simple(self.id, name, args);
        self
    }

    pub fn line(self, text: impl Into<String>) -> Self {
        self.doc.line(self.id, text);
        self
    }

    pub fn sh(self, command: impl Into<String>) -> Self {
        self.doc.sh(self.id, command);
        self
    }

    pub fn stage(self, name: &str) -> Self {
        let id = self.doc.stage(self.id, name);
        self.moved(id)
    }

    pub fn node(self, label: &str) -> Self {
        let id = self.doc.node(self.id, label);
        self.moved(id)
    }

    pub fn parallel(self) -> Self {
        let id = self.doc.parallel(self.id);
        self.moved(id)
    }

    pub fn archive_artifacts(self, glob: &str) -> Self {
        self.doc.archive_artifacts(self.id, glob);
        self
    }

    /// Move to the parent node.
    ///
    /// # Panics
    ///
    /// Panics at the document root.
    pub fn end(self) -> Self {
        match self.doc.parent(self.id) {
            Some(parent) => self.moved(parent),
            None => panic!("end called on the document root"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_brackets_mirror_opening() {
        assert_eq!(closing_for("properties(["), "])");
        assert_eq!(closing_for("buildDiscarder("), ")");
        assert_eq!(closing_for("plain"), "");
    }

    #[test]
    fn array_blocks_are_comma_separated() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        doc.at(root)
            .begin("properties([")
            .array()
            .begin("buildDiscarder(")
            .begin("logRotator(")
            .array()
            .property("daysToKeepStr", "")
            .property("numToKeepStr", 10)
            .end()
            .end()
            .simple("disableConcurrentBuilds", &[])
            .begin("pipelineTriggers([")
            .simple("cron", &["'H H * * *'"]);
        assert_eq!(
            doc.build(),
            "properties([
    buildDiscarder(
        logRotator(
            daysToKeepStr: '',
            numToKeepStr: '10'
        )
    ),
    disableConcurrentBuilds(),
    pipelineTriggers([
        cron('H H * * *')
    ])
])
"
        );
    }

    #[test]
    fn parallel_wraps_each_stage() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        let par = doc.at(root).stage("linux").parallel().id();
        doc.at(par).stage("amd64").sh("make linux_amd64");
        doc.at(par).stage("arm64").sh("make linux_arm64");
        assert_eq!(
            doc.build(),
            "stage('linux') {
    parallel(
        'amd64': {
            stage('amd64') {
                sh 'make linux_amd64'
            }
        },
        'arm64': {
            stage('arm64') {
                sh 'make linux_arm64'
            }
        }
    )
}
"
        );
    }

    #[test]
    fn groups_are_invisible() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        let node = doc.at(root).node("go").id();
        doc.at(node).group().stage("b").line("checkout scm");
        doc.at(node).archive_artifacts("dist/*");
        assert_eq!(
            doc.build(),
            "node('go') {
    stage('b') {
        checkout scm
    }
    archiveArtifacts artifacts: 'dist/*'
}
"
        );
    }

    #[test]
    fn sort_is_stable_by_name() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        let group = doc.group(root);
        for name in ["windows_amd64", "linux_arm7", "linux_amd64", "linux_arm6"] {
            doc.stage(group, name);
        }
        doc.sort(group);
        let names: Vec<_> = doc
            .children(group)
            .iter()
            .map(|&c| doc.kind(c).sort_key().to_string())
            .collect();
        assert_eq!(names, ["linux_amd64", "linux_arm6", "linux_arm7", "windows_amd64"]);
    }

    #[test]
    fn quotes_are_escaped() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        doc.sh(root, "echo 'hi'");
        assert_eq!(doc.build(), "sh 'echo \\'hi\\''\n");
    }

    #[test]
    fn build_is_repeatable() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        doc.at(root).node("go").stage("Init").sh("make clean init");
        assert_eq!(doc.build(), doc.build());
    }

    #[test]
    #[should_panic(expected = "end called on the document root")]
    fn end_past_root_panics() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        doc.at(root).end();
    }

    #[test]
    #[should_panic(expected = "not a block")]
    fn array_requires_block() {
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        doc.array(root);
    }
}
