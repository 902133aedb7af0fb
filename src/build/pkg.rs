//! Package-manager detection for the production bundle.
//!
//! The bundle ships the lock file of whatever package manager the
//! project uses, and the success summary prints the matching install
//! command.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    const ALL: [Self; 4] = [Self::Npm, Self::Pnpm, Self::Yarn, Self::Bun];

    pub fn lock_file(self) -> &'static str {
        match self {
            Self::Npm => "package-lock.json",
            Self::Pnpm => "pnpm-lock.yaml",
            Self::Yarn => "yarn.lock",
            Self::Bun => "bun.lockb",
        }
    }

    pub fn binary(self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Pnpm => "pnpm",
            Self::Yarn => "yarn",
            Self::Bun => "bun",
        }
    }

    /// Production install command for the success summary.
    pub fn install_command(self) -> &'static str {
        match self {
            Self::Npm => "npm ci --omit=dev",
            Self::Pnpm => "pnpm i --prod",
            Self::Yarn => "yarn install --production",
            Self::Bun => "bun install --production",
        }
    }

    /// Detect by lock file, verifying the binary actually exists on
    /// PATH; anything inconclusive falls back to npm.
    pub fn detect(root: &Path) -> Self {
        for pm in Self::ALL {
            if root.join(pm.lock_file()).exists() {
                if pm != Self::Npm && which::which(pm.binary()).is_err() {
                    return Self::Npm;
                }
                return pm;
            }
        }
        Self::Npm
    }
}
