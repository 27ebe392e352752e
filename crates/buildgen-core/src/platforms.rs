//! The generated `platforms.md` support table.

use std::collections::BTreeSet;

use buildgen_arch::Architecture;

/// File name of the platform table.
pub const PLATFORM_TABLE: &str = "platforms.md";

/// Render a markdown table of every OS in the matrix with its CPU tokens,
/// followed by a count of distinct operating systems and CPU tokens.
///
/// The matrix is expected in resolver order, grouped by OS.
pub fn platform_table(arches: &[Architecture]) -> String {
    let mut lines = vec![
        "# Supported Platforms".to_string(),
        String::new(),
        "The following platforms are supported by virtue of how the build system works:"
            .to_string(),
        String::new(),
        "| Operating System | CPU Architectures |".to_string(),
        "| ---------------- | ----------------- |".to_string(),
    ];

    let mut os_count = 0;
    let mut cpus = BTreeSet::new();
    let mut last_os: Option<&str> = None;

    for arch in arches {
        cpus.insert(arch.cpu());
        if last_os == Some(arch.os.as_str()) {
            continue;
        }
        last_os = Some(arch.os.as_str());
        os_count += 1;

        let tokens: Vec<String> = arches
            .iter()
            .filter(|a| a.os == arch.os)
            .map(Architecture::cpu)
            .collect();
        lines.push(format!("| {} | {} |", arch.os, tokens.join(" ")));
    }

    lines.push(String::new());
    lines.push(format!("Operating Systems {os_count} CPU's {}", cpus.len()));
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_each_os_once() {
        let arches = vec![
            Architecture::new("linux", "amd64"),
            Architecture::new("linux", "arm").with_arm("6"),
            Architecture::new("linux", "arm").with_arm("7"),
            Architecture::new("windows", "amd64"),
        ];
        let table = platform_table(&arches);
        assert!(table.contains("| linux | amd64 arm6 arm7 |"));
        assert!(table.contains("| windows | amd64 |"));
        assert!(table.ends_with("Operating Systems 2 CPU's 3\n"));
    }

    #[test]
    fn empty_matrix() {
        let table = platform_table(&[]);
        assert!(table.ends_with("| ---------------- | ----------------- |\n\nOperating Systems 0 CPU's 0\n"));
    }
}
