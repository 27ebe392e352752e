//! Discovery of the tools a project builds.

use std::path::Path;

use tracing::debug;

use crate::error::{GenerateError, Result};

/// Entry point of a tool, relative to its directory.
pub const ENTRY_POINT: &str = "bin/main.go";

/// Tool directory name reserved for the build tool itself.
const RESERVED: &str = "build";

/// Names of every `<tools_dir>/<tool>/bin/main.go`, sorted.
///
/// A missing tools directory counts as no tools. Finding none is an error
/// unless `allow_empty` is set.
pub fn discover_tools(tools_dir: &Path, allow_empty: bool) -> Result<Vec<String>> {
    let mut tools = Vec::new();

    if tools_dir.is_dir() {
        let entries =
            std::fs::read_dir(tools_dir).map_err(|e| GenerateError::io(tools_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| GenerateError::io(tools_dir, e))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name == RESERVED || !entry.path().join(ENTRY_POINT).is_file() {
                continue;
            }
            tools.push(name);
        }
    }

    if tools.is_empty() && !allow_empty {
        return Err(GenerateError::NoTools {
            dir: tools_dir.to_path_buf(),
        });
    }

    tools.sort();
    debug!(?tools, "discovered tools");
    Ok(tools)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_tool(root: &Path, name: &str) {
        let bin = root.join(name).join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("main.go"), "package main\n").unwrap();
    }

    #[test]
    fn finds_sorted_tools_and_skips_build() {
        let dir = tempfile::tempdir().unwrap();
        add_tool(dir.path(), "zeta");
        add_tool(dir.path(), "alpha");
        add_tool(dir.path(), "build");
        std::fs::create_dir_all(dir.path().join("nomain/bin")).unwrap();
        std::fs::write(dir.path().join("README"), "").unwrap();

        let tools = discover_tools(dir.path(), false).unwrap();
        assert_eq!(tools, ["alpha", "zeta"]);
    }

    #[test]
    fn no_tools_is_an_error_unless_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_tools(dir.path(), false).unwrap_err();
        assert!(matches!(err, GenerateError::NoTools { .. }));
        assert!(discover_tools(dir.path(), true).unwrap().is_empty());
        assert!(discover_tools(&dir.path().join("missing"), true).unwrap().is_empty());
    }
}
