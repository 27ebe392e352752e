//! The generation run: Makefile, platform table and Jenkinsfile.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use buildgen_arch::{Architecture, BlockPolicy, PlatformSource, Resolver};
use buildgen_make::{Makefile, NodeId, TargetBuilder, TargetGraph};
use buildgen_pipeline::{Jenkinsfile, NodeId as PipelineNode, StageComposer, StageMode};
use tracing::{debug, info};

use crate::config::BuildConfig;
use crate::error::{GenerateError, Result};
use crate::hooks::{Chain, Documentation, Extension, PipelineHook};
use crate::meta::Meta;
use crate::platforms::{platform_table, PLATFORM_TABLE};
use crate::tools::discover_tools;

/// File name of the generated pipeline script.
pub const JENKINSFILE: &str = "Jenkinsfile";

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// The rendered artifacts of one run.
#[derive(Debug, Clone)]
pub struct Outputs {
    /// The resolved architecture matrix.
    pub arches: Vec<Architecture>,
    pub tools: Vec<String>,
    pub makefile: String,
    pub platforms: String,
    pub jenkinsfile: String,
}

impl Outputs {
    /// Write the Makefile, the platform table and the Jenkinsfile, in that
    /// order. A failure leaves earlier files in place.
    pub fn write(&self, config: &BuildConfig) -> Result<()> {
        let makefile = config.output_path(&config.makefile);
        if let Some(parent) = makefile.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GenerateError::io(parent, e))?;
        }
        write_file(&makefile, &self.makefile)?;
        write_file(&config.output_path(Path::new(PLATFORM_TABLE)), &self.platforms)?;
        write_file(&config.output_path(Path::new(JENKINSFILE)), &self.jenkinsfile)?;
        Ok(())
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|e| GenerateError::io(path, e))?;
    info!(path = %path.display(), "wrote");
    Ok(())
}

/// Orchestrates one generation run.
#[derive(Debug)]
pub struct Generator {
    config: BuildConfig,
    resolver: Resolver,
    extensions: Chain<dyn Extension>,
    documentation: Chain<dyn Documentation>,
    pipeline: Chain<dyn PipelineHook>,
    clean_dirs: BTreeSet<String>,
}

impl Generator {
    /// Create a generator. The clean rule always removes dest and dist.
    pub fn new(config: BuildConfig, policy: BlockPolicy) -> Self {
        let clean_dirs = [config.dest.clone(), config.dist.clone()].into_iter().collect();
        Self {
            config,
            resolver: Resolver::new(policy),
            extensions: Chain::new(),
            documentation: Chain::new(),
            pipeline: Chain::new(),
            clean_dirs,
        }
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Register an extension closure after every extension already registered.
    pub fn add_extension<F>(&mut self, f: F)
    where
        F: Fn(&Architecture, &mut TargetBuilder<'_>, &Meta) + 'static,
    {
        self.extensions.add(Box::new(f));
    }

    /// Register an extension value, such as [`crate::apt::AptExtension`].
    pub fn register_extension(&mut self, ext: impl Extension + 'static) {
        self.extensions.add(Box::new(ext));
    }

    /// Register a documentation hook.
    pub fn add_documentation<F>(&mut self, f: F)
    where
        F: Fn(&mut TargetBuilder<'_>, &Meta) + 'static,
    {
        self.documentation.add(Box::new(f));
    }

    /// Register a pipeline hook.
    pub fn add_pipeline_hook<F>(&mut self, f: F)
    where
        F: Fn(&mut Jenkinsfile, PipelineNode, &Meta) + 'static,
    {
        self.pipeline.add(Box::new(f));
    }

    /// Also remove `dir` in the clean rule.
    pub fn add_clean_directory(&mut self, dir: impl Into<String>) {
        self.clean_dirs.insert(dir.into());
    }

    /// Directories removed by the clean rule, sorted.
    pub fn clean_directories(&self) -> Vec<&str> {
        self.clean_dirs.iter().map(String::as_str).collect()
    }

    /// Resolve the matrix, discover tools and render every artifact.
    pub fn generate(&self, source: &dyn PlatformSource, meta: &Meta) -> Result<Outputs> {
        let arches = self.resolver.resolve(source)?;
        let tools_dir = self.config.project_dir.join(&self.config.tools_dir);
        let tools = discover_tools(&tools_dir, self.config.no_tools)?;
        info!(arches = arches.len(), tools = tools.len(), "generating build files");

        Ok(Outputs {
            makefile: self.makefile(&arches, &tools, meta),
            platforms: platform_table(&arches),
            jenkinsfile: self.jenkinsfile(&arches, meta),
            arches,
            tools,
        })
    }

    /// [`Generator::generate`] then write the artifacts.
    pub fn run(&self, source: &dyn PlatformSource, meta: &Meta) -> Result<Outputs> {
        let outputs = self.generate(source, meta)?;
        outputs.write(&self.config)?;
        Ok(outputs)
    }

    /// Render the Makefile for a resolved matrix.
    pub fn makefile(&self, arches: &[Architecture], tools: &[String], meta: &Meta) -> String {
        let cfg = &self.config;
        let mut mf = Makefile::new();
        let root = mf.root();

        mf.at(root)
            .comment(format!("Generated Makefile {}", meta.time))
            .set_var("BUILD", &meta.tool_name)
            .set_var("export BUILD_VERSION", &quoted(&meta.version))
            .set_var("export BUILD_TIME", &quoted(&meta.time))
            .set_var("export BUILD_PACKAGE_NAME", &quoted(&meta.package_name))
            .set_var("export BUILD_PACKAGE_PREFIX", &quoted(&meta.package_prefix))
            .phony(&["all", "clean", "init", "test"]);

        self.housekeeping(&mut mf, root);

        let all = mf.rule(root, "all", &[]);
        self.restrict_all(&mut mf, all, arches);
        // An unrestricted `all` collects the OS groups nested in it.
        let groups = if mf.is_empty_rule(all) { all } else { root };

        let mut graph = TargetGraph::new();
        let mut os_groups: BTreeMap<&str, NodeId> = BTreeMap::new();

        for arch in arches {
            let os_rule = *os_groups.entry(arch.os.as_str()).or_insert_with(|| {
                let block = mf.block(groups);
                mf.rule(block, &arch.os, &["init"])
            });
            let block = mf.block(os_rule);
            let arch_rule = mf.rule(block, &arch.target(), &["init"]);

            let tools_rule = mf.rule(arch_rule, &format!("{}_tools", arch.target()), &[]);
            for tool in tools {
                if self.resolver.policy().is_tool_blocked(arch, tool) {
                    debug!(%arch, tool = %tool, "tool blocked");
                    continue;
                }
                self.compile_rule(&mut mf, tools_rule, arch, tool);
            }

            let ext_rule = mf.rule(arch_rule, &format!("{}_ext", arch.target()), &[]);
            let mut branch = graph.branch();
            self.extensions.run(arch, &mut branch, meta);
            branch.build(&mut mf, ext_rule);

            let dist_rule = mf.rule(arch_rule, &format!("{}_dist", arch.target()), &[]);
            self.archive_rule(&mut mf, dist_rule, arch, meta);
        }

        if cfg.build_local {
            mf.clear_dependencies(all);
            mf.add_dependency(all, &[&cfg.host.target()]);
        }

        mf.phony(groups, &["docs"]);
        let docs = mf.rule(groups, "docs", &[]);
        let mut branch = graph.branch();
        self.documentation.run(&mut branch, meta);
        branch.build(&mut mf, docs);

        mf.build()
    }

    fn housekeeping(&self, mf: &mut Makefile, root: NodeId) {
        let cfg = &self.config;

        mf.at(root).rule("init", &[]).mkdir(&[&cfg.dest, &cfg.dist]);

        let clean = mf.rule(root, "clean", &[]);
        mf.rm(clean, &self.clean_directories());
        mf.line(clean, format!("@$(BUILD) -d {} -go clean -- -testcache", cfg.dest));

        mf.at(root)
            .rule("test", &["init"])
            .mkdir(&[&cfg.dest])
            .line(format!("@$(BUILD) -d {} -go test", cfg.dest));
    }

    /// Point `all` at the requested OS groups and architectures, if any.
    fn restrict_all(&self, mf: &mut Makefile, all: NodeId, arches: &[Architecture]) {
        let tokens = self.config.platform_tokens();
        if tokens.is_empty() {
            return;
        }
        for arch in arches {
            for token in &tokens {
                if *token == arch.os {
                    mf.add_dependency(all, &[&arch.os]);
                } else if arch.matches_platform(token) {
                    mf.add_dependency(all, &[&arch.target()]);
                }
            }
        }
        debug!(deps = ?mf.dependencies(all), "restricted all");
    }

    fn compile_rule(&self, mf: &mut Makefile, at: NodeId, arch: &Architecture, tool: &str) {
        let dest = &self.config.dest;
        let binary = arch.tool(Path::new(dest), tool);
        let dir = binary
            .parent()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let mut command = format!("@$(BUILD) -d {dest} -go build {} {}", arch.os, arch.arch);
        if !arch.arm.is_empty() {
            command.push(' ');
            command.push_str(&arch.arm);
        }
        command.push(' ');
        command.push_str(tool);

        mf.at(at)
            .rule(&binary.display().to_string(), &[])
            .mkdir(&[&dir])
            .line(command);
    }

    fn archive_rule(&self, mf: &mut Makefile, at: NodeId, arch: &Architecture, meta: &Meta) {
        let cfg = &self.config;
        let (flag, ext) = if arch.is_windows() {
            ("zip", "zip")
        } else {
            ("tar", "tgz")
        };
        let archive = Path::new(&cfg.dist)
            .join(format!(
                "{}_{}_{}_{}.{ext}",
                meta.package_name,
                meta.version,
                arch.os,
                arch.cpu()
            ))
            .display()
            .to_string();
        let base = arch.base_dir(Path::new(&cfg.dest)).display().to_string();

        mf.at(at)
            .rule(&archive, &[])
            .line(format!("@$(BUILD) -d {} -{flag} {archive} {base}", cfg.dest));
    }

    /// Render the Jenkinsfile for a resolved matrix.
    pub fn jenkinsfile(&self, arches: &[Architecture], meta: &Meta) -> String {
        let cfg = &self.config;
        let mut doc = Jenkinsfile::new();
        let root = doc.root();

        doc.at(root)
            .begin("properties([")
            .array()
            .begin("buildDiscarder(")
            .begin("logRotator(")
            .array()
            .property("artifactDaysToKeepStr", "")
            .property("artifactNumToKeepStr", "")
            .property("daysToKeepStr", "")
            .property("numToKeepStr", 10)
            .end()
            .end()
            .simple("disableConcurrentBuilds", &[])
            .simple("disableResume", &[])
            .begin("pipelineTriggers([")
            .simple("cron", &["'H H * * *'"]);

        let node = doc.node(root, &cfg.build_node);
        doc.at(node).stage("Checkout").line("checkout scm");
        doc.at(node).stage("Init").sh("make clean init");
        doc.at(node).stage("Test").sh("make test");

        if cfg.build_local {
            doc.at(node)
                .stage("Build")
                .sh(format!("make -f {} all", cfg.makefile_name()));
        } else {
            let mode = if cfg.parallel {
                StageMode::Parallel
            } else {
                StageMode::Sequential
            };
            let mut composer =
                StageComposer::new(&mut doc, node, mode).with_makefile(cfg.makefile_name());
            composer.add_all(arches);
            composer.finish();
        }

        self.pipeline.run(&mut doc, node, meta);

        if let Some(glob) = &cfg.archive_artifacts {
            doc.at(node).stage("archiveArtifacts").archive_artifacts(glob);
        }

        doc.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> Meta {
        Meta::new("pkg", "1.0", "buildgen").with_time("2024-01-01T00:00:00Z")
    }

    fn generator() -> Generator {
        Generator::new(BuildConfig::new("."), BlockPolicy::builtin())
    }

    fn linux() -> Vec<Architecture> {
        vec![Architecture::new("linux", "amd64")]
    }

    #[test]
    fn preamble_and_housekeeping() {
        let mut g = generator();
        g.add_clean_directory("docs/out");
        g.add_clean_directory("builds");
        let out = g.makefile(&linux(), &["tool".into()], &meta());
        assert!(out.starts_with(
            "# Generated Makefile 2024-01-01T00:00:00Z\n\
             BUILD = buildgen\n\
             export BUILD_VERSION = \"1.0\"\n\
             export BUILD_TIME = \"2024-01-01T00:00:00Z\"\n\
             export BUILD_PACKAGE_NAME = \"pkg\"\n\
             export BUILD_PACKAGE_PREFIX = \"\"\n\
             \n.PHONY: all clean init test\n\
             \ninit:\n\t@mkdir -p builds dist\n\
             \nclean:\n\t@echo \"RM       builds dist docs/out\";\\\n\trm -rf builds dist docs/out\n\
             \t@$(BUILD) -d builds -go clean -- -testcache\n\
             \ntest: init\n\t@mkdir -p builds\n\t@$(BUILD) -d builds -go test\n"
        ));
    }

    #[test]
    fn arm_compile_rule_passes_revision() {
        let arches = vec![Architecture::new("linux", "arm").with_arm("7")];
        let out = generator().makefile(&arches, &["tool".into()], &meta());
        assert!(out.contains(
            "\nbuilds/linux/arm7/bin/tool:\n\t@mkdir -p builds/linux/arm7/bin\n\
             \t@$(BUILD) -d builds -go build linux arm 7 tool"
        ));
        assert!(out.contains(
            "\ndist/pkg_1.0_linux_arm7.tgz:\n\
             \t@$(BUILD) -d builds -tar dist/pkg_1.0_linux_arm7.tgz builds/linux/arm7"
        ));
    }

    #[test]
    fn tool_blocks_skip_compile_rules() {
        let policy = BlockPolicy::from_toml_str("[tools]\nServer = [{ os = \"linux\" }]").unwrap();
        let g = Generator::new(BuildConfig::new("."), policy);
        let out = g.makefile(&linux(), &["client".into(), "server".into()], &meta());
        assert!(out.contains("\nlinux_amd64_tools: builds/linux/amd64/bin/client\n"));
        assert!(!out.contains("bin/server"));
    }

    #[test]
    fn extensions_render_under_ext_rule() {
        let mut g = generator();
        g.add_extension(|arch: &Architecture, t: &mut TargetBuilder<'_>, _: &Meta| {
            t.target(&format!("first_{}", arch.target()), &[]).line("one").end();
        });
        g.add_extension(|arch: &Architecture, t: &mut TargetBuilder<'_>, _: &Meta| {
            t.target(&format!("second_{}", arch.target()), &[]).line("two").end();
        });
        let out = g.makefile(&linux(), &[], &meta());
        assert!(out.contains("\nlinux_amd64_ext: first_linux_amd64 second_linux_amd64\n"));
        assert!(out.find("\tone").unwrap() < out.find("\ttwo").unwrap());
    }

    #[test]
    fn extensions_find_targets_across_architectures() {
        let mut g = generator();
        g.add_extension(|arch: &Architecture, t: &mut TargetBuilder<'_>, _: &Meta| {
            match t.get_named_target("shared") {
                Some(shared) => {
                    t.target(&format!("use_{}", arch.target()), &[]).link(shared).end();
                }
                None => {
                    t.target("shared", &[]).end();
                }
            }
        });
        let arches = vec![
            Architecture::new("linux", "amd64"),
            Architecture::new("linux", "arm64"),
        ];
        let out = g.makefile(&arches, &[], &meta());
        assert_eq!(out.matches("\nshared:").count(), 1);
        assert!(out.contains("\nuse_linux_arm64: shared"));
    }

    #[test]
    fn build_local_replaces_all() {
        let mut config = BuildConfig::new(".");
        config.build_local = true;
        config.host = Architecture::new("linux", "amd64");
        let g = Generator::new(config, BlockPolicy::builtin());
        let out = g.makefile(&linux(), &[], &meta());
        assert!(out.contains("\nall: linux_amd64 docs\n"));
    }

    #[test]
    fn platform_label_selects_one_architecture() {
        let mut config = BuildConfig::new(".");
        config.platforms = "linux:arm64:".into();
        let g = Generator::new(config, BlockPolicy::builtin());
        let arches = vec![
            Architecture::new("linux", "amd64"),
            Architecture::new("linux", "arm64"),
        ];
        let out = g.makefile(&arches, &[], &meta());
        assert!(out.contains("\nall: linux_arm64\n"));
        assert!(out.contains("\nlinux: init linux_amd64 linux_arm64\n"));
    }

    #[test]
    fn documentation_renders_under_docs() {
        let mut g = generator();
        g.add_documentation(|t: &mut TargetBuilder<'_>, m: &Meta| {
            t.target(&format!("docs/{}.html", m.package_name), &[])
                .line("render")
                .end();
        });
        let out = g.makefile(&linux(), &[], &meta());
        assert!(out.contains("\n.PHONY: docs\n\ndocs: docs/pkg.html\n\ndocs/pkg.html:\n\trender"));
    }

    #[test]
    fn jenkinsfile_layout() {
        let mut config = BuildConfig::new(".");
        config.archive_artifacts = Some("dist/*".into());
        let mut g = Generator::new(config, BlockPolicy::builtin());
        g.add_pipeline_hook(|doc: &mut Jenkinsfile, node: PipelineNode, m: &Meta| {
            doc.at(node).stage("Publish").sh(format!("publish {}", m.version));
        });
        let out = g.jenkinsfile(&linux(), &meta());
        assert_eq!(
            out,
            "properties([
    buildDiscarder(
        logRotator(
            artifactDaysToKeepStr: '',
            artifactNumToKeepStr: '',
            daysToKeepStr: '',
            numToKeepStr: '10'
        )
    ),
    disableConcurrentBuilds(),
    disableResume(),
    pipelineTriggers([
        cron('H H * * *')
    ])
])
node('go') {
    stage('Checkout') {
        checkout scm
    }
    stage('Init') {
        sh 'make clean init'
    }
    stage('Test') {
        sh 'make test'
    }
    stage('linux_amd64') {
        sh 'make -f Makefile.gen linux_amd64'
    }
    stage('Publish') {
        sh 'publish 1.0'
    }
    stage('archiveArtifacts') {
        archiveArtifacts artifacts: 'dist/*'
    }
}
"
        );
    }

    #[test]
    fn jenkinsfile_build_local() {
        let mut config = BuildConfig::new(".");
        config.build_local = true;
        let g = Generator::new(config, BlockPolicy::builtin());
        let out = g.jenkinsfile(&linux(), &meta());
        assert!(out.contains("    stage('Build') {\n        sh 'make -f Makefile.gen all'\n    }\n"));
        assert!(!out.contains("linux_amd64"));
    }

    #[test]
    fn clean_directories_sorted_and_unique() {
        let mut g = generator();
        g.add_clean_directory("a");
        g.add_clean_directory("dist");
        assert_eq!(g.clean_directories(), ["a", "builds", "dist"]);
    }
}
