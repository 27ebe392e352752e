//! Grouping of the architecture matrix into pipeline build stages.

use std::collections::HashMap;

use buildgen_arch::Architecture;
use tracing::debug;

use crate::jenkinsfile::{Jenkinsfile, NodeId};

/// Makefile the build stages invoke.
pub const DEFAULT_MAKEFILE: &str = "Makefile.gen";

/// How architectures are grouped into stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StageMode {
    /// One stage per architecture, run one after another.
    #[default]
    Sequential,
    /// One stage per OS whose architecture stages run concurrently.
    Parallel,
}

/// A stage created for one grouping key.
#[derive(Debug, Clone)]
pub struct OsStage {
    /// The first architecture that created this stage.
    pub arch: Architecture,
    /// The `stage` node.
    pub stage: NodeId,
    /// Where steps or child stages are appended: the stage itself, or its
    /// `parallel` step in parallel mode.
    pub body: NodeId,
    /// Child stages keyed by CPU token. Only used in parallel mode.
    pub children: HashMap<String, OsStage>,
}

impl OsStage {
    fn new(doc: &mut Jenkinsfile, parent: NodeId, arch: &Architecture, name: &str) -> Self {
        let stage = doc.stage(parent, name);
        Self {
            arch: arch.clone(),
            stage,
            body: stage,
            children: HashMap::new(),
        }
    }

    /// The child stage for `name`, created on first use.
    fn child(&mut self, doc: &mut Jenkinsfile, arch: &Architecture, name: &str) -> &mut OsStage {
        let body = self.body;
        self.children
            .entry(name.to_string())
            .or_insert_with(|| OsStage::new(doc, body, arch, name))
    }

    fn sort(&self, doc: &mut Jenkinsfile) {
        doc.sort(self.body);
        for child in self.children.values() {
            child.sort(doc);
        }
    }
}

/// The stage for `key`, created under `group` on first use.
fn lookup_or_create<'s>(
    stages: &'s mut HashMap<String, OsStage>,
    doc: &mut Jenkinsfile,
    group: NodeId,
    mode: StageMode,
    arch: &Architecture,
    key: &str,
) -> &'s mut OsStage {
    stages.entry(key.to_string()).or_insert_with(|| {
        debug!(stage = key, "creating pipeline stage");
        let mut stage = OsStage::new(doc, group, arch, key);
        if mode == StageMode::Parallel {
            stage.body = doc.parallel(stage.stage);
        }
        stage
    })
}

/// Builds one stage per grouping key under a pipeline `node` block.
///
/// The stages live in an invisible group so that [`StageComposer::finish`]
/// can order them without moving steps declared around them.
pub struct StageComposer<'a> {
    doc: &'a mut Jenkinsfile,
    group: NodeId,
    mode: StageMode,
    makefile: String,
    stages: HashMap<String, OsStage>,
}

impl<'a> StageComposer<'a> {
    /// Start composing stages inside `node`.
    pub fn new(doc: &'a mut Jenkinsfile, node: NodeId, mode: StageMode) -> Self {
        let group = doc.group(node);
        Self {
            doc,
            group,
            mode,
            makefile: DEFAULT_MAKEFILE.to_string(),
            stages: HashMap::new(),
        }
    }

    /// Invoke a different makefile from the build steps.
    pub fn with_makefile(mut self, makefile: impl Into<String>) -> Self {
        self.makefile = makefile.into();
        self
    }

    /// The stage for a grouping key, if one was created.
    pub fn stage(&self, key: &str) -> Option<&OsStage> {
        self.stages.get(key)
    }

    /// Number of top-level stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether no stage has been created.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Add the build step for one architecture to its stage.
    pub fn add(&mut self, arch: &Architecture) {
        let step = format!("make -f {} {}", self.makefile, arch.target());
        let body = match self.mode {
            StageMode::Sequential => {
                let key = arch.target();
                lookup_or_create(&mut self.stages, self.doc, self.group, self.mode, arch, &key).body
            }
            StageMode::Parallel => {
                let os_stage = lookup_or_create(
                    &mut self.stages,
                    self.doc,
                    self.group,
                    self.mode,
                    arch,
                    &arch.os,
                );
                os_stage.child(self.doc, arch, &arch.cpu()).body
            }
        };
        self.doc.sh(body, step);
    }

    /// Add every architecture in matrix order.
    pub fn add_all<'m>(&mut self, arches: impl IntoIterator<Item = &'m Architecture>) {
        for arch in arches {
            self.add(arch);
        }
    }

    /// Sort the stages, and every stage's steps, into canonical order.
    /// Returns the group holding the stages.
    pub fn finish(self) -> NodeId {
        self.doc.sort(self.group);
        for stage in self.stages.values() {
            stage.sort(self.doc);
        }
        self.group
    }
}
