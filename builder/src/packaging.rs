/*
 * SPDX-FileCopyrightText: 2026 Wavelens GmbH <info@wavelens.io>
 *
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{bail, Context, Result};
use entity::project::Framework;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Packages the project directory into `<workspace>/<build_id>.tar.gz`.
///
/// Frontend artifacts carry only the framework's allow-list; backend
/// artifacts carry every top-level entry except dependency and VCS
/// directories, since backends may ship uncompiled source.
pub fn create_artifact(
    project_dir: &Path,
    workspace: &Path,
    build_id: Uuid,
    framework: Framework,
) -> Result<PathBuf> {
    let artifact_path = workspace.join(format!("{}.tar.gz", build_id));

    let file = File::create(&artifact_path)
        .with_context(|| format!("Failed to create {}", artifact_path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut archive = tar::Builder::new(encoder);
    archive.follow_symlinks(false);

    let mut appended = 0usize;

    for entry in std::fs::read_dir(project_dir)
        .with_context(|| format!("Failed to read {}", project_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();

        if !include_in_artifact(framework, &name) {
            continue;
        }

        let path = entry.path();
        if path.is_dir() {
            archive.append_dir_all(&name, &path)?;
        } else {
            archive.append_path_with_name(&path, &name)?;
        }
        appended += 1;
    }

    if appended == 0 {
        bail!(
            "Nothing to package for {} in {}",
            framework,
            project_dir.display()
        );
    }

    let encoder = archive.into_inner().context("Failed to finish archive")?;
    encoder.finish().context("Failed to finish gzip stream")?;

    Ok(artifact_path)
}

fn include_in_artifact(framework: Framework, name: &str) -> bool {
    match framework {
        Framework::NextJs => {
            matches!(name, ".next" | "public" | "package.json" | "bun.lockb" | "out")
                || name.starts_with("next.config.")
        }
        Framework::Vite => name == "dist",
        _ => name != "node_modules" && name != ".git",
    }
}

/// Streams the artifact to the deploy engine's upload endpoint.
pub async fn upload_artifact(
    http: &reqwest::Client,
    engine_url: &str,
    build_id: Uuid,
    artifact_path: &Path,
) -> Result<()> {
    let bytes = tokio::fs::read(artifact_path)
        .await
        .with_context(|| format!("Failed to read {}", artifact_path.display()))?;

    let res = http
        .post(format!(
            "{}/artifacts/upload?buildId={}",
            engine_url, build_id
        ))
        .header("Content-Type", "application/gzip")
        .body(bytes)
        .send()
        .await
        .context("Artifact upload failed")?;

    if !res.status().is_success() {
        bail!("Artifact upload returned {}", res.status());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::HashSet;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("slipway-packaging-tests")
            .join(format!("{}-{}", name, Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x").unwrap();
    }

    fn archive_entries(path: &Path) -> HashSet<String> {
        let file = File::open(path).unwrap();
        let mut archive = tar::Archive::new(GzDecoder::new(file));

        archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn vite_artifact_is_dist_only() {
        let workspace = scratch_dir("vite");
        let project = workspace.join("repo");
        touch(&project.join("dist/index.html"));
        touch(&project.join("dist/assets/app.js"));
        touch(&project.join("src/main.ts"));
        touch(&project.join("package.json"));

        let artifact =
            create_artifact(&project, &workspace, Uuid::new_v4(), Framework::Vite).unwrap();

        let entries = archive_entries(&artifact);
        assert!(entries.contains("dist/index.html"));
        assert!(entries.contains("dist/assets/app.js"));
        assert!(!entries.iter().any(|e| e.starts_with("src")));
        assert!(!entries.contains("package.json"));

        fs::remove_dir_all(workspace).unwrap();
    }

    #[test]
    fn nextjs_artifact_follows_allow_list() {
        let workspace = scratch_dir("nextjs");
        let project = workspace.join("repo");
        touch(&project.join(".next/BUILD_ID"));
        touch(&project.join("public/favicon.ico"));
        touch(&project.join("package.json"));
        touch(&project.join("next.config.mjs"));
        touch(&project.join("node_modules/react/index.js"));
        touch(&project.join("src/app/page.tsx"));

        let artifact =
            create_artifact(&project, &workspace, Uuid::new_v4(), Framework::NextJs).unwrap();

        let entries = archive_entries(&artifact);
        assert!(entries.contains(".next/BUILD_ID"));
        assert!(entries.contains("public/favicon.ico"));
        assert!(entries.contains("package.json"));
        assert!(entries.contains("next.config.mjs"));
        assert!(!entries.iter().any(|e| e.starts_with("node_modules")));
        assert!(!entries.iter().any(|e| e.starts_with("src")));

        fs::remove_dir_all(workspace).unwrap();
    }

    #[test]
    fn backend_artifact_excludes_node_modules_and_git() {
        let workspace = scratch_dir("backend");
        let project = workspace.join("repo");
        touch(&project.join("src/index.ts"));
        touch(&project.join("package.json"));
        touch(&project.join("tsconfig.json"));
        touch(&project.join("node_modules/hono/index.js"));
        touch(&project.join(".git/HEAD"));

        let artifact =
            create_artifact(&project, &workspace, Uuid::new_v4(), Framework::Hono).unwrap();

        let entries = archive_entries(&artifact);
        assert!(entries.contains("src/index.ts"));
        assert!(entries.contains("package.json"));
        assert!(entries.contains("tsconfig.json"));
        assert!(!entries.iter().any(|e| e.starts_with("node_modules")));
        assert!(!entries.iter().any(|e| e.starts_with(".git")));

        fs::remove_dir_all(workspace).unwrap();
    }

    #[test]
    fn empty_selection_is_an_error() {
        let workspace = scratch_dir("empty");
        let project = workspace.join("repo");
        touch(&project.join("src/main.ts"));

        // Vite with no dist/ produces an empty artifact, which is a bug
        // upstream in the build, not something to ship silently.
        let result = create_artifact(&project, &workspace, Uuid::new_v4(), Framework::Vite);
        assert!(result.is_err());

        fs::remove_dir_all(workspace).unwrap();
    }
}
