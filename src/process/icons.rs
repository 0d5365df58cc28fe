//! Icon lookup through freedesktop `.desktop` entries.
//!
//! The index maps the basename of each entry's `Exec` binary to its `Icon`
//! value. It is built on first use and never refreshed.

use ahash::AHashMap as HashMap;
use once_cell::sync::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default application directories scanned for desktop entries.
pub fn default_application_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/applications"),
        PathBuf::from("/usr/local/share/applications"),
        PathBuf::from("/var/lib/flatpak/exports/share/applications"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(Path::new(&home).join(".local/share/applications"));
    }
    dirs
}

/// Extracts `(binary basename, icon)` from the `[Desktop Entry]` group.
pub fn parse_desktop_entry(content: &str) -> Option<(String, String)> {
    let mut in_main_group = false;
    let mut exec = None;
    let mut icon = None;

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('[') {
            in_main_group = line == "[Desktop Entry]";
            continue;
        }
        if !in_main_group {
            continue;
        }
        if let Some(v) = line.strip_prefix("Exec=") {
            exec.get_or_insert_with(|| v.to_string());
        } else if let Some(v) = line.strip_prefix("Icon=") {
            icon.get_or_insert_with(|| v.to_string());
        }
    }

    let binary = exec_binary(&exec?)?;
    let icon = icon.filter(|i| !i.is_empty())?;
    Some((binary, icon))
}

/// First program token of an `Exec` line, skipping `env` and its
/// `VAR=value` assignments.
fn exec_binary(exec: &str) -> Option<String> {
    let program = exec
        .split_whitespace()
        .map(|t| t.trim_matches('"'))
        .find(|t| *t != "env" && !t.contains('=') && !t.starts_with('%'))?;
    Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .map(|s| s.to_string())
}

/// Lazily built map from binary name to icon handle.
pub struct IconIndex {
    dirs: Vec<PathBuf>,
    index: OnceCell<HashMap<String, String>>,
}

impl IconIndex {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            index: OnceCell::new(),
        }
    }

    fn build(&self) -> HashMap<String, String> {
        let mut index = HashMap::new();
        for dir in &self.dirs {
            let Ok(entries) = fs::read_dir(dir) else {
                continue;
            };
            for path in entries.flatten().map(|e| e.path()) {
                if path.extension().and_then(|e| e.to_str()) != Some("desktop") {
                    continue;
                }
                let Ok(content) = fs::read_to_string(&path) else {
                    continue;
                };
                if let Some((binary, icon)) = parse_desktop_entry(&content) {
                    index.entry(binary).or_insert(icon);
                }
            }
        }
        debug!("Icon index built with {} entries", index.len());
        index
    }

    pub fn lookup(&self, process_name: &str) -> Option<String> {
        self.index
            .get_or_init(|| self.build())
            .get(process_name)
            .cloned()
    }
}

impl Default for IconIndex {
    fn default() -> Self {
        Self::new(default_application_dirs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_desktop_entry() {
        let content = "[Desktop Entry]\n\
                       Name=Firefox\n\
                       Exec=/usr/lib/firefox/firefox %u\n\
                       Icon=firefox\n\
                       [Desktop Action new-window]\n\
                       Exec=/usr/lib/firefox/firefox --new-window\n\
                       Icon=other\n";
        assert_eq!(
            parse_desktop_entry(content),
            Some(("firefox".to_string(), "firefox".to_string()))
        );
    }

    #[test]
    fn test_exec_with_env_prefix() {
        let content = "[Desktop Entry]\nExec=env GDK_BACKEND=x11 code --unity\nIcon=vscode\n";
        assert_eq!(
            parse_desktop_entry(content),
            Some(("code".to_string(), "vscode".to_string()))
        );
    }

    #[test]
    fn test_entry_without_icon_is_ignored() {
        assert_eq!(parse_desktop_entry("[Desktop Entry]\nExec=foo\n"), None);
    }

    #[test]
    fn test_index_lookup() {
        let dir = tempdir().expect("Failed to create temp dir");
        std::fs::write(
            dir.path().join("term.desktop"),
            "[Desktop Entry]\nExec=alacritty\nIcon=Alacritty\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Exec=x\nIcon=y\n").unwrap();

        let index = IconIndex::new(vec![dir.path().to_path_buf()]);
        assert_eq!(index.lookup("alacritty"), Some("Alacritty".to_string()));
        assert_eq!(index.lookup("x"), None);
    }
}
