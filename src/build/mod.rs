//! Production bundling.
//!
//! One-shot pipeline that turns the project into a deployable output
//! directory: assets build, TypeScript compile, then meta files and the
//! package manifest copied alongside the compiled output. Only two
//! failures abort — the assets build and (with `stop_on_error`) the
//! compile; every copy step is best effort.

mod pkg;

pub use pkg::PackageManager;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::compiler::{Compiler, read_ts_out_dir};
use crate::config::ProjectConfig;
use crate::utils::exec::{Cmd, NPM_FILTER};
use crate::utils::path::relative_unix_path;
use crate::{debug, log};

pub struct Bundler<C: Compiler> {
    config: Arc<ProjectConfig>,
    compiler: C,
}

impl<C: Compiler> Bundler<C> {
    pub fn new(config: Arc<ProjectConfig>, compiler: C) -> Self {
        Self { config, compiler }
    }

    /// Run the whole pipeline. `Ok(false)` means the compile failed and
    /// `stop_on_error` stopped the bundle; hard failures are `Err`.
    pub fn bundle(&self) -> Result<bool> {
        let root = self.config.get_root();
        let out_dir = self.resolve_out_dir();
        debug!("build"; "output directory: {}", out_dir.display());

        // Start from a clean slate
        match fs::remove_dir_all(&out_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to clear {}", out_dir.display()));
            }
        }

        if self.config.assets.has_build_step() {
            log!("build"; "bundling assets ({})", self.config.assets.build_command.join(" "));
            Cmd::from_slice(&self.config.assets.build_command)
                .cwd(root)
                .pty(true)
                .filter(&NPM_FILTER)
                .run()
                .context("assets bundling failed")?;
        }

        log!("build"; "compiling ({})", self.config.build.compile_command.join(" "));
        let outcome = self.compiler.compile()?;
        for line in &outcome.diagnostics {
            log!("build"; "{line}");
        }

        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create {}", out_dir.display()))?;

        // Ancillary script ships whether or not the compile succeeded
        self.copy_into(&out_dir, &self.config.build.ancillary_script);

        if !outcome.success && self.config.build.stop_on_error {
            let _ = fs::remove_dir_all(&out_dir);
            log!("error"; "compilation failed, bundle removed");
            log!("build"; "set [build] stop_on_error = false (or pass --stop-on-error=false) to bundle anyway");
            return Ok(false);
        }

        self.copy_meta_files(&out_dir);
        self.copy_into(&out_dir, "package.json");
        let pm = PackageManager::detect(root);
        self.copy_into(&out_dir, pm.lock_file());

        self.print_summary(&out_dir, pm);
        Ok(true)
    }

    /// Output directory resolution: explicit config, then tsconfig
    /// `outDir`, then `build/`.
    fn resolve_out_dir(&self) -> PathBuf {
        let build = &self.config.build;
        let dir = build
            .out_dir
            .clone()
            .or_else(|| read_ts_out_dir(self.config.get_root(), &build.tsconfig))
            .unwrap_or_else(|| PathBuf::from("build"));
        self.config.root_join(dir)
    }

    /// Copy every file matching the meta globs, keeping relative paths.
    /// Unmatched globs and unreadable files are skipped silently.
    fn copy_meta_files(&self, out_dir: &Path) {
        let root = self.config.get_root();
        for entry in &self.config.meta {
            let full = format!("{}/{}", root.display(), entry.pattern);
            let Ok(paths) = glob::glob(&full) else {
                continue;
            };
            for path in paths.flatten() {
                if !path.is_file() {
                    continue;
                }
                let rel = relative_unix_path(&path, root);
                self.copy_into(out_dir, &rel);
            }
        }
    }

    /// Copy one root-relative file into the bundle, creating parents.
    /// Missing sources are skipped silently.
    fn copy_into(&self, out_dir: &Path, rel: &str) {
        let src = self.config.root_join(rel);
        if !src.is_file() {
            return;
        }
        let dest = out_dir.join(rel);
        if let Some(parent) = dest.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(err) = fs::copy(&src, &dest) {
            debug!("build"; "could not copy {rel}: {err}");
        }
    }

    fn print_summary(&self, out_dir: &Path, pm: PackageManager) {
        let rel = relative_unix_path(out_dir, self.config.get_root());
        log!("build"; "bundle created in ./{rel}");
        log!("build"; "run it with:");
        println!("  cd {rel}");
        println!("  {}", pm.install_command());
        println!("  {} {}", self.config.serve.runner, self.config.build.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOutcome;
    use crate::config::test_parse_config;

    struct StubCompiler {
        success: bool,
    }

    impl Compiler for StubCompiler {
        fn compile(&self) -> Result<CompileOutcome> {
            Ok(CompileOutcome {
                success: self.success,
                diagnostics: Vec::new(),
            })
        }
    }

    fn project(toml: &str, root: &Path) -> Arc<ProjectConfig> {
        let mut config = test_parse_config(toml);
        config.root = root.to_path_buf();
        config.config_path = root.join("forge.toml");
        Arc::new(config)
    }

    #[test]
    fn test_stop_on_error_removes_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let config = project("[build]\nout_dir = \"dist\"", dir.path());

        let bundled = Bundler::new(config, StubCompiler { success: false })
            .bundle()
            .unwrap();

        assert!(!bundled);
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn test_continue_past_compile_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let config = project(
            "[build]\nout_dir = \"dist\"\nstop_on_error = false",
            dir.path(),
        );

        let bundled = Bundler::new(config, StubCompiler { success: false })
            .bundle()
            .unwrap();

        assert!(bundled);
        assert!(dir.path().join("dist/package.json").exists());
    }

    #[test]
    fn test_meta_files_and_manifest_copied() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        std::fs::write(dir.path().join("package-lock.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join("public/css")).unwrap();
        std::fs::write(dir.path().join("public/css/app.css"), "body {}").unwrap();

        let config = project(
            "[build]\nout_dir = \"dist\"\n\n[[meta]]\npattern = \"public/**\"",
            dir.path(),
        );
        let bundled = Bundler::new(config, StubCompiler { success: true })
            .bundle()
            .unwrap();

        assert!(bundled);
        assert!(dir.path().join("dist/package.json").exists());
        assert!(dir.path().join("dist/package-lock.json").exists());
        assert!(dir.path().join("dist/public/css/app.css").exists());
    }

    #[test]
    fn test_out_dir_from_tsconfig() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("tsconfig.json"),
            r#"{ "compilerOptions": { "outDir": "./compiled" } }"#,
        )
        .unwrap();

        let config = project("", dir.path());
        let bundled = Bundler::new(config, StubCompiler { success: true })
            .bundle()
            .unwrap();

        assert!(bundled);
        assert!(dir.path().join("compiled").exists());
    }

    #[test]
    fn test_previous_bundle_cleared() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("dist")).unwrap();
        std::fs::write(dir.path().join("dist/stale.js"), "old").unwrap();

        let config = project("[build]\nout_dir = \"dist\"", dir.path());
        Bundler::new(config, StubCompiler { success: true })
            .bundle()
            .unwrap();

        assert!(!dir.path().join("dist/stale.js").exists());
    }
}
