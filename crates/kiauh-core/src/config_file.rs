//! Line-preserving editor for Klipper/Moonraker style INI files.
//!
//! Klipper configs use `key: value` pairs, indented continuation lines (gcode macros,
//! multi-line lists) and `#`/`;` comments. Edits touch only the lines they change so the
//! operator's formatting and comments survive.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    lines: Vec<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::io(format!("unable to read {}", path.display()), e))?;
        Ok(Self::parse(path, &raw))
    }

    pub fn parse(path: &Path, raw: &str) -> Self {
        Self {
            path: path.to_path_buf(),
            lines: raw.lines().map(str::to_string).collect(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sections(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|l| section_name(l))
            .map(str::to_string)
            .collect()
    }

    pub fn has_section(&self, section: &str) -> bool {
        self.section_span(section).is_some()
    }

    /// Append an empty `[section]`; no-op when it already exists.
    pub fn add_section(&mut self, section: &str) {
        if self.has_section(section) {
            return;
        }
        if self.lines.last().is_some_and(|l| !l.trim().is_empty()) {
            self.lines.push(String::new());
        }
        self.lines.push(format!("[{section}]"));
    }

    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        let (start, end) = self.section_span(section)?;
        let idx = self.find_key(start, end, key)?;
        let (_, value) = split_option(&self.lines[idx])?;
        let mut value = value.to_string();
        for cont in self.continuation(idx, end) {
            if !value.is_empty() {
                value.push('\n');
            }
            value.push_str(self.lines[cont].trim());
        }
        Some(value)
    }

    /// Set `key` in `section`, creating either when missing.
    ///
    /// An existing key keeps its separator style; its continuation lines are dropped.
    pub fn set_value(&mut self, section: &str, key: &str, value: &str) {
        if !self.has_section(section) {
            self.add_section(section);
        }
        let Some((start, end)) = self.section_span(section) else {
            return;
        };
        if let Some(idx) = self.find_key(start, end, key) {
            let sep = separator(&self.lines[idx]);
            let cont = self.continuation(idx, end);
            if let (Some(first), Some(last)) = (cont.first(), cont.last()) {
                self.lines.drain(*first..=*last);
            }
            self.lines[idx] = format!("{key}{sep}{value}");
            return;
        }
        // insert after the last non-blank line of the section
        let mut insert_at = end;
        while insert_at > start + 1 && self.lines[insert_at - 1].trim().is_empty() {
            insert_at -= 1;
        }
        self.lines.insert(insert_at, format!("{key}: {value}"));
    }

    pub fn write(&self) -> Result<()> {
        let mut out = self.lines.join("\n");
        out.push('\n');
        fs::write(&self.path, out)
            .map_err(|e| Error::io(format!("unable to write {}", self.path.display()), e))
    }

    /// Line range `[header, next header)` of a section.
    fn section_span(&self, section: &str) -> Option<(usize, usize)> {
        let start = self
            .lines
            .iter()
            .position(|l| section_name(l) == Some(section))?;
        let end = self.lines[start + 1..]
            .iter()
            .position(|l| section_name(l).is_some())
            .map(|p| start + 1 + p)
            .unwrap_or(self.lines.len());
        Some((start, end))
    }

    fn find_key(&self, start: usize, end: usize, key: &str) -> Option<usize> {
        (start + 1..end).find(|&i| {
            let line = &self.lines[i];
            !is_indented(line)
                && split_option(line).is_some_and(|(k, _)| k.eq_ignore_ascii_case(key))
        })
    }

    /// Indices of the indented lines that continue the option at `idx`.
    fn continuation(&self, idx: usize, end: usize) -> Vec<usize> {
        (idx + 1..end)
            .take_while(|&i| is_indented(&self.lines[i]) && !self.lines[i].trim().is_empty())
            .collect()
    }
}

fn section_name(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if is_indented(line) {
        return None;
    }
    trimmed
        .strip_prefix('[')
        .and_then(|s| s.split_once(']'))
        .map(|(name, _)| name.trim())
}

fn is_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn split_option(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
        return None;
    }
    let pos = trimmed.find([':', '='])?;
    Some((trimmed[..pos].trim(), trimmed[pos + 1..].trim()))
}

fn separator(line: &str) -> &'static str {
    match line.find([':', '=']) {
        Some(pos) if line.as_bytes()[pos] == b'=' => " = ",
        _ => ": ",
    }
}
