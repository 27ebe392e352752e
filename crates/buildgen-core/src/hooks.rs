//! Hook traits and ordered hook chains.
//!
//! Every hook kind is a trait with a blanket implementation for matching
//! closures, so both plain functions and configured structs can be
//! registered. A [`Chain`] runs its hooks in registration order against the
//! same arguments; an empty chain does nothing.

use buildgen_arch::Architecture;
use buildgen_make::TargetBuilder;
use buildgen_pipeline::{Jenkinsfile, NodeId};

use crate::meta::Meta;

/// Adds targets for one architecture, e.g. a packaging format.
pub trait Extension {
    fn apply(&self, arch: &Architecture, target: &mut TargetBuilder<'_>, meta: &Meta);
}

impl<F> Extension for F
where
    F: Fn(&Architecture, &mut TargetBuilder<'_>, &Meta),
{
    fn apply(&self, arch: &Architecture, target: &mut TargetBuilder<'_>, meta: &Meta) {
        self(arch, target, meta)
    }
}

/// Adds targets under the `docs` rule.
pub trait Documentation {
    fn apply(&self, target: &mut TargetBuilder<'_>, meta: &Meta);
}

impl<F> Documentation for F
where
    F: Fn(&mut TargetBuilder<'_>, &Meta),
{
    fn apply(&self, target: &mut TargetBuilder<'_>, meta: &Meta) {
        self(target, meta)
    }
}

/// Adds steps to the Jenkinsfile `node` block after the build stages.
pub trait PipelineHook {
    fn apply(&self, doc: &mut Jenkinsfile, node: NodeId, meta: &Meta);
}

impl<F> PipelineHook for F
where
    F: Fn(&mut Jenkinsfile, NodeId, &Meta),
{
    fn apply(&self, doc: &mut Jenkinsfile, node: NodeId, meta: &Meta) {
        self(doc, node, meta)
    }
}

/// An ordered list of hooks of one kind.
pub struct Chain<T: ?Sized> {
    hooks: Vec<Box<T>>,
}

impl<T: ?Sized> Default for Chain<T> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}

impl<T: ?Sized> Chain<T> {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook after every hook already registered.
    pub fn add(&mut self, hook: Box<T>) {
        self.hooks.push(hook);
    }

    /// This chain followed by `other`.
    pub fn then(mut self, other: Chain<T>) -> Self {
        self.hooks.extend(other.hooks);
        self
    }

    /// Number of registered hooks.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Whether running the chain would do nothing.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Registered hooks in order.
    pub fn hooks(&self) -> &[Box<T>] {
        &self.hooks
    }
}

impl Chain<dyn Extension> {
    /// Run every extension against one architecture's branch.
    pub fn run(&self, arch: &Architecture, target: &mut TargetBuilder<'_>, meta: &Meta) {
        for hook in &self.hooks {
            hook.apply(arch, target, meta);
        }
    }
}

impl Chain<dyn Documentation> {
    /// Run every documentation hook against the docs branch.
    pub fn run(&self, target: &mut TargetBuilder<'_>, meta: &Meta) {
        for hook in &self.hooks {
            hook.apply(target, meta);
        }
    }
}

impl Chain<dyn PipelineHook> {
    /// Run every pipeline hook against the `node` block.
    pub fn run(&self, doc: &mut Jenkinsfile, node: NodeId, meta: &Meta) {
        for hook in &self.hooks {
            hook.apply(doc, node, meta);
        }
    }
}

impl<T: ?Sized> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.hooks.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildgen_make::{Makefile, TargetGraph};

    fn meta() -> Meta {
        Meta::new("pkg", "1.0", "buildgen")
    }

    fn named(name: &'static str) -> Box<dyn Extension> {
        Box::new(move |arch: &Architecture, t: &mut TargetBuilder<'_>, _: &Meta| {
            t.target(&format!("{name}_{}", arch.target()), &[]).end();
        })
    }

    fn render(chain: &Chain<dyn Extension>) -> String {
        let mut graph = TargetGraph::new();
        let mut mf = Makefile::new();
        let root = mf.root();
        let mut branch = graph.branch();
        chain.run(&Architecture::new("linux", "amd64"), &mut branch, &meta());
        branch.build(&mut mf, root);
        mf.build()
    }

    #[test]
    fn empty_chain_is_a_no_op() {
        let chain: Chain<dyn Extension> = Chain::new();
        assert!(chain.is_empty());
        assert_eq!(render(&chain), "");
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let mut chain: Chain<dyn Extension> = Chain::new();
        chain.add(named("a"));
        chain.add(named("b"));
        let out = render(&chain);
        let a = out.find("a_linux_amd64:").unwrap();
        let b = out.find("b_linux_amd64:").unwrap();
        assert!(a < b);
    }

    #[test]
    fn then_concatenates() {
        let mut first: Chain<dyn Extension> = Chain::new();
        first.add(named("a"));
        let mut second: Chain<dyn Extension> = Chain::new();
        second.add(named("b"));
        second.add(named("c"));
        let chain = first.then(second).then(Chain::new());
        assert_eq!(chain.len(), 3);
        let out = render(&chain);
        assert!(out.find("a_").unwrap() < out.find("b_").unwrap());
        assert!(out.find("b_").unwrap() < out.find("c_").unwrap());
    }

    #[test]
    fn documentation_and_pipeline_chains() {
        let mut docs: Chain<dyn Documentation> = Chain::new();
        docs.add(Box::new(|t: &mut TargetBuilder<'_>, m: &Meta| {
            t.target(&format!("{}.md", m.package_name), &[]);
        }));
        let mut graph = TargetGraph::new();
        let mut branch = graph.branch();
        docs.run(&mut branch, &meta());
        assert!(branch.get_named_target("pkg.md").is_some());

        let mut pipeline: Chain<dyn PipelineHook> = Chain::new();
        pipeline.add(Box::new(|doc: &mut Jenkinsfile, node: NodeId, _: &Meta| {
            doc.stage(node, "Publish");
        }));
        let mut doc = Jenkinsfile::new();
        let root = doc.root();
        pipeline.run(&mut doc, root, &meta());
        assert_eq!(doc.build(), "stage('Publish') {\n}\n");
    }
}
