//! Target dependency graph.
//!
//! A [`TargetGraph`] holds named targets used by extensions to add rules for
//! auxiliary files. Targets live in an arena; the graph root owns one
//! anonymous branch per [`TargetGraph::branch`] call, and each branch owns
//! the targets declared through its [`TargetBuilder`].
//!
//! Rendering a target opens a rule with its explicit dependencies, runs its
//! render commands against that rule, then renders every child inside it and
//! lists the child as a dependency. Linked targets are listed as
//! dependencies without being rendered again.

use std::fmt;

use crate::makefile::{Makefile, NodeId};

/// Index of a target (or branch) in a [`TargetGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

type CustomCommand = Box<dyn Fn(&mut Makefile, NodeId, &str)>;

/// A deferred action producing recipe lines for a target's rule.
pub enum RenderCommand {
    /// A labelled echo line.
    Echo { label: String, message: String },
    /// A raw recipe line.
    Line(String),
    /// `@mkdir -p path`
    MkDir(String),
    /// Echo plus `@$(BUILD) flag args...`, re-invoking the build tool.
    BuildTool { flag: String, args: Vec<String> },
    /// Anything else. Receives the rule and the target's name.
    Custom(CustomCommand),
}

impl RenderCommand {
    fn render(&self, mf: &mut Makefile, rule: NodeId, target: &str) {
        match self {
            Self::Echo { label, message } => {
                mf.echo(rule, label, message);
            }
            Self::Line(text) => {
                mf.line(rule, text.clone());
            }
            Self::MkDir(path) => {
                mf.mkdir(rule, &[path]);
            }
            Self::BuildTool { flag, args } => {
                mf.echo(rule, "BUILD", &format!("{flag} {target}"));
                mf.line(rule, format!("@$(BUILD) {flag} {}", args.join(" ")));
            }
            Self::Custom(f) => f(mf, rule, target),
        }
    }
}

impl fmt::Debug for RenderCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Echo { label, message } => f
                .debug_struct("Echo")
                .field("label", label)
                .field("message", message)
                .finish(),
            Self::Line(text) => f.debug_tuple("Line").field(text).finish(),
            Self::MkDir(path) => f.debug_tuple("MkDir").field(path).finish(),
            Self::BuildTool { flag, args } => f
                .debug_struct("BuildTool")
                .field("flag", flag)
                .field("args", args)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A named build target.
#[derive(Debug)]
pub struct Target {
    name: String,
    dependencies: Vec<String>,
    phony: bool,
    commands: Vec<RenderCommand>,
    links: Vec<TargetId>,
}

impl Target {
    fn new(name: &str, dependencies: &[&str], phony: bool) -> Self {
        Self {
            name: name.to_string(),
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
            phony,
            commands: Vec::new(),
            links: Vec::new(),
        }
    }

    /// The rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit dependencies given at declaration.
    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    /// Whether the target is marked `.PHONY`.
    pub fn is_phony(&self) -> bool {
        self.phony
    }

    /// Render commands in registration order.
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }
}

#[derive(Debug)]
struct Entry {
    parent: Option<TargetId>,
    children: Vec<TargetId>,
    /// `None` for the root and branch entries.
    target: Option<Target>,
}

/// Arena of build targets shared by every branch of one generation run.
#[derive(Debug)]
pub struct TargetGraph {
    entries: Vec<Entry>,
}

impl Default for TargetGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetGraph {
    /// Create a graph with an empty root.
    pub fn new() -> Self {
        Self {
            entries: vec![Entry {
                parent: None,
                children: Vec::new(),
                target: None,
            }],
        }
    }

    /// The graph root.
    pub fn root(&self) -> TargetId {
        TargetId(0)
    }

    fn push(&mut self, parent: TargetId, target: Option<Target>) -> TargetId {
        let id = TargetId(self.entries.len());
        self.entries.push(Entry {
            parent: Some(parent),
            children: Vec::new(),
            target,
        });
        self.entries[parent.0].children.push(id);
        id
    }

    /// Open a fresh branch under the root and return a builder positioned on it.
    pub fn branch(&mut self) -> TargetBuilder<'_> {
        let root = self.root();
        let branch = self.push(root, None);
        TargetBuilder {
            graph: self,
            branch,
            cursor: branch,
        }
    }

    /// A target by id. `None` for the root and branches.
    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.entries[id.0].target.as_ref()
    }

    /// Children of a target or branch in declaration order.
    pub fn children(&self, id: TargetId) -> &[TargetId] {
        &self.entries[id.0].children
    }

    /// Depth-first search from the root for a target by name.
    pub fn get_named_target(&self, name: &str) -> Option<TargetId> {
        self.find_from(self.root(), name)
    }

    fn find_from(&self, id: TargetId, name: &str) -> Option<TargetId> {
        if self.get(id).is_some_and(|t| t.name == name) {
            return Some(id);
        }
        self.children(id)
            .iter()
            .find_map(|&child| self.find_from(child, name))
    }

    /// Render a target, or every target of a branch, into `into`.
    /// Returns the rule created for a target, or `into` for a branch.
    pub fn render(&self, id: TargetId, mf: &mut Makefile, into: NodeId) -> NodeId {
        let Some(target) = self.get(id) else {
            for &child in self.children(id) {
                self.render(child, mf, into);
            }
            return into;
        };

        if target.phony {
            mf.phony(into, &[&target.name]);
        }

        let deps: Vec<&str> = target.dependencies.iter().map(String::as_str).collect();
        let rule = mf.rule(into, &target.name, &deps);

        for command in &target.commands {
            command.render(mf, rule, &target.name);
        }

        for &child in self.children(id) {
            self.render(child, mf, rule);
            if let Some(c) = self.get(child) {
                mf.add_dependency(rule, &[&c.name]);
            }
        }

        for &link in &target.links {
            if let Some(linked) = self.get(link) {
                mf.add_dependency(rule, &[&linked.name]);
            }
        }

        rule
    }
}

/// Chaining handle over one branch of a [`TargetGraph`].
///
/// [`TargetBuilder::target`] moves the handle to the new target so that
/// following calls add commands to it; [`TargetBuilder::end`] moves back up.
pub struct TargetBuilder<'g> {
    graph: &'g mut TargetGraph,
    branch: TargetId,
    cursor: TargetId,
}

impl<'g> TargetBuilder<'g> {
    /// The branch this builder was opened on.
    pub fn branch_id(&self) -> TargetId {
        self.branch
    }

    /// The current target, `None` while positioned on the branch itself.
    pub fn current(&self) -> Option<TargetId> {
        self.graph.get(self.cursor).map(|_| self.cursor)
    }

    /// The current target's data.
    pub fn get_target(&self) -> Option<&Target> {
        self.graph.get(self.cursor)
    }

    /// Read access to the whole graph.
    pub fn graph(&self) -> &TargetGraph {
        self.graph
    }

    /// Depth-first search from the graph root, across every branch.
    pub fn get_named_target(&self, name: &str) -> Option<TargetId> {
        self.graph.get_named_target(name)
    }

    fn add(&mut self, target: Target) -> &mut Self {
        self.cursor = self.graph.push(self.cursor, Some(target));
        self
    }

    /// Declare a child target and move to it.
    pub fn target(&mut self, name: &str, deps: &[&str]) -> &mut Self {
        self.add(Target::new(name, deps, false))
    }

    /// Declare a phony child target and move to it.
    pub fn phony_target(&mut self, name: &str, deps: &[&str]) -> &mut Self {
        self.add(Target::new(name, deps, true))
    }

    /// Move to the parent target. Stays put on the branch.
    pub fn end(&mut self) -> &mut Self {
        if self.cursor != self.branch {
            if let Some(parent) = self.graph.entries[self.cursor.0].parent {
                self.cursor = parent;
            }
        }
        self
    }

    fn current_mut(&mut self) -> &mut Target {
        match self.graph.entries[self.cursor.0].target.as_mut() {
            Some(target) => target,
            None => panic!("no current target"),
        }
    }

    fn push_command(&mut self, command: RenderCommand) -> &mut Self {
        self.current_mut().commands.push(command);
        self
    }

    /// Depend on a target declared elsewhere without re-parenting it.
    ///
    /// # Panics
    ///
    /// Panics when positioned on the branch rather than a target.
    pub fn link(&mut self, target: TargetId) -> &mut Self {
        let current = self.current_mut();
        if !current.links.contains(&target) {
            current.links.push(target);
        }
        self
    }

    /// Add a labelled echo line.
    pub fn echo(&mut self, label: &str, message: &str) -> &mut Self {
        self.push_command(RenderCommand::Echo {
            label: label.to_string(),
            message: message.to_string(),
        })
    }

    /// Add a raw recipe line.
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.push_command(RenderCommand::Line(text.into()))
    }

    /// Add `@mkdir -p path`.
    pub fn mkdir(&mut self, path: &str) -> &mut Self {
        self.push_command(RenderCommand::MkDir(path.to_string()))
    }

    /// Re-invoke the build tool with `flag args...`.
    pub fn build_tool(&mut self, flag: &str, args: &[&str]) -> &mut Self {
        self.push_command(RenderCommand::BuildTool {
            flag: flag.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        })
    }

    /// Add an arbitrary render command.
    pub fn command<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&mut Makefile, NodeId, &str) + 'static,
    {
        self.push_command(RenderCommand::Custom(Box::new(f)))
    }

    /// Render this builder's branch into `into`.
    pub fn build(&self, mf: &mut Makefile, into: NodeId) -> NodeId {
        self.graph.render(self.branch, mf, into)
    }
}
