//! Filesystem-backed asset resolution
//!
//! Audio assets live under `<root>/<guild_id>/`, one folder per guild,
//! named by file stem: a request for `siren` matches `siren.mp3` or
//! `siren.ogg`. A missing guild folder just means "nothing uploaded yet",
//! never an error. Uploading into these folders is the asset-storage
//! subsystem's job, not ours.

use crate::gateway::{AssetResolver, AudioResource};
use async_trait::async_trait;
use soundbridge_common::ids::GuildId;
use std::path::{Path, PathBuf};
use tracing::debug;

const AUDIO_EXTENSIONS: [&str; 4] = ["mp3", "wav", "m4a", "ogg"];

/// Resolves guild-scoped asset names against a directory tree
pub struct FsAssetResolver {
    root: PathBuf,
}

impl FsAssetResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn guild_dir(&self, guild_id: GuildId) -> PathBuf {
        self.root.join(guild_id.0.to_string())
    }

    /// Asset names available for a guild, without extensions, sorted.
    ///
    /// Used by the command layer's autocomplete. Empty when the guild has
    /// no folder yet.
    pub fn list(&self, guild_id: GuildId) -> Vec<String> {
        let dir = self.guild_dir(guild_id);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut names: Vec<String> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| is_audio_file(path))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        names.sort();
        names
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl AssetResolver for FsAssetResolver {
    async fn resolve(&self, guild_id: GuildId, name: &str) -> Option<AudioResource> {
        let dir = self.guild_dir(guild_id);
        let entries = std::fs::read_dir(&dir).ok()?;

        for entry in entries.flatten() {
            let path = entry.path();
            if is_audio_file(&path)
                && path.file_stem().and_then(|stem| stem.to_str()) == Some(name)
            {
                return Some(AudioResource {
                    name: name.to_string(),
                    path,
                });
            }
        }

        debug!(%guild_id, name, "asset not found");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, b"x").unwrap();
    }

    #[tokio::test]
    async fn test_resolve_matches_by_stem() {
        let dir = tempfile::tempdir().unwrap();
        let guild_dir = dir.path().join("42");
        std::fs::create_dir_all(&guild_dir).unwrap();
        touch(&guild_dir.join("siren.mp3"));
        touch(&guild_dir.join("horn.OGG"));
        touch(&guild_dir.join("notes.txt"));

        let resolver = FsAssetResolver::new(dir.path());

        let resource = resolver.resolve(GuildId(42), "siren").await.unwrap();
        assert_eq!(resource.name, "siren");
        assert_eq!(resource.path, guild_dir.join("siren.mp3"));

        // Extension matching is case-insensitive
        assert!(resolver.resolve(GuildId(42), "horn").await.is_some());

        // Non-audio files never resolve
        assert!(resolver.resolve(GuildId(42), "notes").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_is_guild_scoped() {
        let dir = tempfile::tempdir().unwrap();
        let guild_dir = dir.path().join("1");
        std::fs::create_dir_all(&guild_dir).unwrap();
        touch(&guild_dir.join("siren.wav"));

        let resolver = FsAssetResolver::new(dir.path());

        assert!(resolver.resolve(GuildId(1), "siren").await.is_some());
        assert!(resolver.resolve(GuildId(2), "siren").await.is_none());
    }

    #[test]
    fn test_list_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        let guild_dir = dir.path().join("7");
        std::fs::create_dir_all(&guild_dir).unwrap();
        touch(&guild_dir.join("zebra.m4a"));
        touch(&guild_dir.join("alpha.mp3"));
        touch(&guild_dir.join("readme.md"));

        let resolver = FsAssetResolver::new(dir.path());
        assert_eq!(resolver.list(GuildId(7)), vec!["alpha", "zebra"]);
    }

    #[test]
    fn test_missing_guild_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsAssetResolver::new(dir.path());
        assert!(resolver.list(GuildId(404)).is_empty());
    }
}
