//! Configuration loading and parsing.
//!
//! The config format is a small ini dialect:
//! * lines are capped at 256 characters; longer lines are truncated;
//! * an indented line continues the previous value, appended after
//!   stripping the newline and leading whitespace;
//! * `[section]` starts a section — whitespace inside the brackets is
//!   trimmed and anything after `]` is ignored;
//! * `#` starts a comment outside double quotes;
//! * a value in matched double quotes loses the quotes;
//! * blank lines and unknown sections are ignored.
//!
//! Recognised sections: `global` (editor attributes), `module` (lazy
//! module-loading triggers for a command name or prefix), `file:<glob>`
//! (attributes for documents whose filename matches the glob), and
//! `include` (another file, resolved against the including file's
//! directory, then `/usr/share/edlib/`, then `$HOME/.config/edlib/`).
//!
//! Loading is tolerant by default — a missing or unreadable file yields
//! an empty config and malformed lines are skipped with a warning —
//! because startup must not die on a stale user config. `Config::apply`
//! installs the global attributes onto the editor root; module triggers
//! and file attributes are queried by the collaborators that need them.

use anyhow::{Context, Result};
use core_pane::Editor;
use std::path::{Path, PathBuf};
use std::{env, fs};
use tracing::{debug, info, warn};

/// Longest accepted line.
const MAX_LINE: usize = 256;
/// Include nesting bound.
const MAX_INCLUDE_DEPTH: u32 = 8;

/// A lazy module-loading trigger: when a command with this key (or
/// prefix) is wanted and unknown, `module` should be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleTrigger {
    pub key: String,
    pub prefix: bool,
    pub module: String,
}

/// Attributes applied to documents whose filename matches `pattern`.
#[derive(Debug, Clone)]
pub struct FileAttrs {
    pub pattern: glob::Pattern,
    pub attrs: Vec<(String, String)>,
}

/// Parsed configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub globals: Vec<(String, String)>,
    pub modules: Vec<ModuleTrigger>,
    pub files: Vec<FileAttrs>,
}

/// Best-effort config path: `edlib.ini` beside the working directory,
/// else the per-user config directory.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("edlib.ini");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("edlib").join("edlib.ini");
    }
    PathBuf::from("edlib.ini")
}

impl Config {
    /// Load strictly: an unreadable top-level file is an error (includes
    /// stay tolerant).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut cfg = Self::default();
        cfg.parse(&text, path, 0);
        info!(target: "config", path = %path.display(), globals = cfg.globals.len(), "config_loaded");
        Ok(cfg)
    }

    /// Load tolerantly from `path` (or the discovered location): missing
    /// or unreadable files yield an empty config.
    pub fn load_from(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(discover);
        match Self::load(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                debug!(target: "config", path = %path.display(), error = %e, "config_absent");
                Self::default()
            }
        }
    }

    /// Install the `[global]` attributes onto the editor root.
    pub fn apply(&self, ed: &mut Editor) {
        for (k, v) in &self.globals {
            ed.global_set_attr(k, v);
        }
    }

    /// The module registered for a command key, if any (exact entries
    /// first, then the longest matching prefix).
    pub fn module_for(&self, key: &str) -> Option<&str> {
        if let Some(t) = self.modules.iter().find(|t| !t.prefix && t.key == key) {
            return Some(&t.module);
        }
        self.modules
            .iter()
            .filter(|t| t.prefix && key.starts_with(&t.key))
            .max_by_key(|t| t.key.len())
            .map(|t| t.module.as_str())
    }

    /// Attributes for a document filename, in declaration order.
    pub fn attrs_for_file<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.files
            .iter()
            .filter(move |f| f.pattern.matches(name))
            .flat_map(|f| f.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    fn parse(&mut self, text: &str, path: &Path, depth: u32) {
        let mut section = Section::None;
        let mut pending: Option<(String, String)> = None;
        for raw in text.lines() {
            let line: String = raw.chars().take(MAX_LINE).collect();
            if line.chars().count() < raw.chars().count() {
                warn!(target: "config", path = %path.display(), "line_truncated");
            }
            // Indented, non-blank: continuation of the previous value,
            // appended after stripping the newline and leading
            // whitespace.
            if line.starts_with([' ', '\t']) && !line.trim().is_empty() {
                if let Some((_, value)) = pending.as_mut() {
                    value.push_str(strip_comment(&line).trim());
                }
                continue;
            }
            if let Some((key, value)) = pending.take() {
                self.commit(&section, key, value, path, depth);
            }
            let line = strip_comment(&line);
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some(rest) = trimmed.strip_prefix('[') {
                // Everything after `]` is ignored.
                let inner = match rest.find(']') {
                    Some(end) => rest[..end].trim(),
                    None => rest.trim(),
                };
                section = Section::parse(inner);
                continue;
            }
            match trimmed.split_once('=') {
                Some((key, value)) => {
                    pending = Some((key.trim().to_string(), value.trim().to_string()));
                }
                None => {
                    warn!(target: "config", path = %path.display(), line = trimmed, "line_skipped");
                }
            }
        }
        if let Some((key, value)) = pending.take() {
            self.commit(&section, key, value, path, depth);
        }
    }

    fn commit(&mut self, section: &Section, key: String, value: String, path: &Path, depth: u32) {
        let value = strip_quotes(value);
        match section {
            Section::None | Section::Include => {
                // `include = file` works from the dedicated section and
                // from the empty section before any header.
                if key == "include" {
                    self.include(&value, path, depth);
                } else {
                    warn!(target: "config", key, "entry_outside_section_skipped");
                }
            }
            Section::Global => self.globals.push((key, value)),
            Section::Module => {
                let prefix = key.ends_with('-') || key.ends_with(':');
                self.modules.push(ModuleTrigger { key, prefix, module: value });
            }
            Section::File(pattern) => {
                match self.files.iter_mut().find(|f| f.pattern == *pattern) {
                    Some(f) => f.attrs.push((key, value)),
                    None => self.files.push(FileAttrs {
                        pattern: pattern.clone(),
                        attrs: vec![(key, value)],
                    }),
                }
            }
            Section::Unknown => {}
        }
    }

    fn include(&mut self, name: &str, from: &Path, depth: u32) {
        if depth >= MAX_INCLUDE_DEPTH {
            warn!(target: "config", name, "include_depth_exceeded");
            return;
        }
        let Some(path) = resolve_include(name, from) else {
            warn!(target: "config", name, from = %from.display(), "include_not_found");
            return;
        };
        match fs::read_to_string(&path) {
            Ok(text) => {
                debug!(target: "config", path = %path.display(), "include");
                self.parse(&text, &path, depth + 1);
            }
            Err(e) => warn!(target: "config", path = %path.display(), error = %e, "include_unreadable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Section {
    None,
    Global,
    Module,
    File(glob::Pattern),
    Include,
    Unknown,
}

impl Section {
    fn parse(name: &str) -> Self {
        match name {
            "global" => Self::Global,
            "module" => Self::Module,
            "include" => Self::Include,
            _ => match name.strip_prefix("file:") {
                Some(pat) => match glob::Pattern::new(pat.trim()) {
                    Ok(pattern) => Self::File(pattern),
                    Err(e) => {
                        warn!(target: "config", pattern = pat, error = %e, "bad_file_glob");
                        Self::Unknown
                    }
                },
                None => Self::Unknown,
            },
        }
    }
}

/// Drop a `#` comment that is not inside double quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '#' if !in_quotes => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Strip one pair of matched double quotes.
fn strip_quotes(value: String) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value
    }
}

/// Resolve an include name: absolute as-is, otherwise against the
/// including file's directory, the system share directory, then the
/// user's config directory.
fn resolve_include(name: &str, from: &Path) -> Option<PathBuf> {
    let p = Path::new(name);
    if p.is_absolute() {
        return p.exists().then(|| p.to_path_buf());
    }
    let mut candidates = Vec::new();
    if let Some(dir) = from.parent() {
        candidates.push(dir.join(name));
    }
    candidates.push(Path::new("/usr/share/edlib").join(name));
    if let Some(home) = dirs::home_dir().or_else(|| env::var_os("HOME").map(PathBuf::from)) {
        candidates.push(home.join(".config").join("edlib").join(name));
    }
    candidates.into_iter().find(|c| c.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn parse(text: &str) -> Config {
        let mut cfg = Config::default();
        cfg.parse(text, Path::new("test.ini"), 0);
        cfg
    }

    #[test]
    fn globals_and_comments() {
        let cfg = parse(
            "[global]\n\
             name = value # trailing comment\n\
             # whole-line comment\n\
             quoted = \"has # hash\"\n\
             \n\
             spaced   =   padded   \n",
        );
        assert_eq!(
            cfg.globals,
            vec![
                ("name".to_string(), "value".to_string()),
                ("quoted".to_string(), "has # hash".to_string()),
                ("spaced".to_string(), "padded".to_string()),
            ]
        );
    }

    #[test]
    fn continuation_lines_append() {
        let cfg = parse("[global]\ngreeting = hello,\n\t world\n   again\nnext = x\n");
        assert_eq!(cfg.globals[0], ("greeting".to_string(), "hello,worldagain".to_string()));
        assert_eq!(cfg.globals[1], ("next".to_string(), "x".to_string()));
    }

    #[test]
    fn section_brackets_trim_and_ignore_trailing() {
        let cfg = parse("[  global  ] junk after\nk = v\n");
        assert_eq!(cfg.globals, vec![("k".to_string(), "v".to_string())]);
    }

    #[test]
    fn unknown_sections_ignored() {
        let cfg = parse("[mystery]\nk = v\n[global]\nok = yes\n");
        assert_eq!(cfg.globals, vec![("ok".to_string(), "yes".to_string())]);
    }

    #[test]
    fn long_lines_truncate() {
        let long = "x".repeat(400);
        let cfg = parse(&format!("[global]\nbig = {long}\n"));
        let (_, v) = &cfg.globals[0];
        // 256 chars total minus "big = ".
        assert_eq!(v.len(), MAX_LINE - "big = ".len());
    }

    #[test]
    fn module_triggers_exact_and_prefix() {
        let cfg = parse(
            "[module]\n\
             render-lines = lib-renderline\n\
             doc: = lib-docs\n\
             Move- = lib-motion\n",
        );
        assert_eq!(cfg.module_for("render-lines"), Some("lib-renderline"));
        assert_eq!(cfg.module_for("doc:open"), Some("lib-docs"));
        assert_eq!(cfg.module_for("Move-Word"), Some("lib-motion"));
        assert_eq!(cfg.module_for("unknown"), None);
    }

    #[test]
    fn file_glob_attrs() {
        let cfg = parse(
            "[file:*.rs]\n\
             syntax = rust\n\
             tabstop = 4\n\
             [file:Makefile]\n\
             tabs = hard\n",
        );
        let attrs: Vec<_> = cfg.attrs_for_file("main.rs").collect();
        assert_eq!(attrs, vec![("syntax", "rust"), ("tabstop", "4")]);
        let attrs: Vec<_> = cfg.attrs_for_file("Makefile").collect();
        assert_eq!(attrs, vec![("tabs", "hard")]);
        assert_eq!(cfg.attrs_for_file("notes.txt").count(), 0);
    }

    #[test]
    fn include_from_empty_section_loads_sibling() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ini");
        let b = dir.path().join("b.ini");
        let mut f = fs::File::create(&a).unwrap();
        writeln!(f, "include = b.ini").unwrap();
        let mut f = fs::File::create(&b).unwrap();
        writeln!(f, "[global]").unwrap();
        writeln!(f, "name = value").unwrap();
        let cfg = Config::load(&a).unwrap();
        assert_eq!(cfg.globals, vec![("name".to_string(), "value".to_string())]);
    }

    #[test]
    fn include_cycles_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.ini");
        fs::write(&a, "include = a.ini\n[global]\nk = v\n").unwrap();
        let cfg = Config::load(&a).unwrap();
        // The self-include bottoms out at the depth limit; each level
        // contributed its global once.
        assert!(cfg.globals.iter().all(|(k, v)| k == "k" && v == "v"));
        assert_eq!(cfg.globals.len(), MAX_INCLUDE_DEPTH as usize + 1);
    }

    #[test]
    fn applies_globals_to_editor_root() {
        let cfg = parse("[global]\nstatus-line = fancy\n");
        let mut ed = Editor::new();
        cfg.apply(&mut ed);
        assert_eq!(ed.global_attr("status-line"), Some("fancy"));
    }
}
