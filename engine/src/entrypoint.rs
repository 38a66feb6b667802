/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

//! Backend entry file resolution.
//!
//! Backends often ship TypeScript source without a build step, so the
//! start command is derived from what the package actually contains
//! rather than trusting `scripts.start` blindly.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

static ENTRY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:bun|node|tsx|ts-node|nodemon)\s+(?:run\s+)?(?:watch\s+)?(\S+\.(?:ts|js))")
        .unwrap()
});

const COMMON_ENTRIES: [&str; 10] = [
    "src/index.ts",
    "src/index.js",
    "src/server.ts",
    "src/server.js",
    "index.ts",
    "index.js",
    "server.ts",
    "server.js",
    "src/app.ts",
    "src/app.js",
];

#[derive(Deserialize, Default)]
struct PackageJson {
    #[serde(default)]
    main: Option<String>,
    #[serde(default)]
    scripts: HashMap<String, String>,
}

/// Resolution order: dev script (most reliable for TypeScript source),
/// `main` when it exists on disk, the source twin of a `dist/` main,
/// start script, then the well-known entry locations.
pub fn detect_entry_file(cwd: &Path) -> Option<String> {
    let pkg = read_package_json(cwd).unwrap_or_default();

    if let Some(script) = pkg.scripts.get("dev") {
        if let Some(entry) = extract_entry_from_script(script) {
            if cwd.join(&entry).is_file() {
                return Some(entry);
            }
        }
    }

    if let Some(main) = &pkg.main {
        if !main.is_empty() && cwd.join(main).is_file() {
            return Some(main.clone());
        }

        if main.contains("dist/") {
            let source_twin = main.replacen("dist/", "src/", 1).replacen(".js", ".ts", 1);
            if cwd.join(&source_twin).is_file() {
                return Some(source_twin);
            }
        }
    }

    if let Some(script) = pkg.scripts.get("start") {
        if let Some(entry) = extract_entry_from_script(script) {
            if cwd.join(&entry).is_file() {
                return Some(entry);
            }
        }
    }

    COMMON_ENTRIES
        .iter()
        .find(|entry| cwd.join(entry).is_file())
        .map(|entry| entry.to_string())
}

/// `bun run <entry>` when an entry is found, `bun run start` otherwise.
pub fn backend_start_command(cwd: &Path, bun: &str) -> Vec<String> {
    match detect_entry_file(cwd) {
        Some(entry) => vec![bun.to_string(), "run".to_string(), entry],
        None => vec![bun.to_string(), "run".to_string(), "start".to_string()],
    }
}

fn extract_entry_from_script(script: &str) -> Option<String> {
    ENTRY_PATTERN
        .captures(script)
        .map(|caps| caps[1].trim_start_matches("./").to_string())
}

fn read_package_json(cwd: &Path) -> Option<PackageJson> {
    let raw = std::fs::read_to_string(cwd.join("package.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use uuid::Uuid;

    fn scratch_app(package_json: &str, files: &[&str]) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("slipway-entrypoint-tests")
            .join(Uuid::new_v4().to_string());
        fs::create_dir_all(&dir).unwrap();

        fs::write(dir.join("package.json"), package_json).unwrap();
        for file in files {
            let path = dir.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"// entry").unwrap();
        }

        dir
    }

    #[test]
    fn extracts_entry_from_scripts() {
        assert_eq!(
            extract_entry_from_script("bun src/index.ts"),
            Some("src/index.ts".to_string())
        );
        assert_eq!(
            extract_entry_from_script("nodemon src/server.js"),
            Some("src/server.js".to_string())
        );
        assert_eq!(
            extract_entry_from_script("tsx watch src/app.ts"),
            Some("src/app.ts".to_string())
        );
        assert_eq!(
            extract_entry_from_script("node ./dist/index.js"),
            Some("dist/index.js".to_string())
        );
        assert_eq!(extract_entry_from_script("vite"), None);
    }

    #[test]
    fn dev_script_wins_over_main() {
        let dir = scratch_app(
            r#"{"main": "index.js", "scripts": {"dev": "bun src/server.ts"}}"#,
            &["index.js", "src/server.ts"],
        );

        assert_eq!(detect_entry_file(&dir), Some("src/server.ts".to_string()));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn main_is_used_when_present_on_disk() {
        let dir = scratch_app(r#"{"main": "server.js"}"#, &["server.js"]);

        assert_eq!(detect_entry_file(&dir), Some("server.js".to_string()));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn dist_main_falls_back_to_source_twin() {
        let dir = scratch_app(r#"{"main": "dist/index.js"}"#, &["src/index.ts"]);

        assert_eq!(detect_entry_file(&dir), Some("src/index.ts".to_string()));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn start_script_is_consulted_after_main() {
        let dir = scratch_app(
            r#"{"scripts": {"start": "node server.js"}}"#,
            &["server.js"],
        );

        assert_eq!(detect_entry_file(&dir), Some("server.js".to_string()));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn common_entries_are_scanned_in_order() {
        let dir = scratch_app("{}", &["src/server.ts", "index.ts"]);

        assert_eq!(detect_entry_file(&dir), Some("src/server.ts".to_string()));
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_entry_falls_back_to_start() {
        let dir = scratch_app("{}", &[]);

        assert_eq!(detect_entry_file(&dir), None);
        assert_eq!(
            backend_start_command(&dir, "bun"),
            vec!["bun", "run", "start"]
        );
        fs::remove_dir_all(dir).unwrap();
    }
}
