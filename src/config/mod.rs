// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pipeline config file.
//!
//! The config is INI-style text: `[section]` headers followed by
//! `key = literal` lines, where the literals are Python-flavoured (quoted
//! strings, ints, floats, `True`/`False` booleans and lists of the same).
//! Every stage process reads the same file, and some write derived values
//! back. A [`ConfigStore`] owns the file for the lifetime of the process: it
//! holds the parsed config in memory, persists every mutation immediately, and
//! takes a lock file so that two stages can't scribble over each other.

mod error;
mod spw;

pub(crate) use error::ConfigError;
pub(crate) use spw::{clamp_spw_mhz, fmt_mhz, parse_spw, SpwError};

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use itertools::Itertools;
use log::debug;

/// A literal config value. The type is whatever the literal parses to; no
/// schema is enforced at load time. Type mismatches surface when a stage
/// coerces the value with one of the `ConfigStore::get_*` methods.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    /// Parse a raw literal. Strings must be quoted; anything unparseable is an
    /// error (the caller supplies the section/key context).
    fn parse(raw: &str) -> Result<Value, ()> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(());
        }

        if let Some(q) = s.chars().next().filter(|c| *c == '\'' || *c == '"') {
            if s.len() >= 2 && s.ends_with(q) {
                return Ok(Value::Str(s[1..s.len() - 1].to_string()));
            }
            return Err(());
        }

        match s {
            "True" | "true" => return Ok(Value::Bool(true)),
            "False" | "false" => return Ok(Value::Bool(false)),
            _ => (),
        }

        if (s.starts_with('[') && s.ends_with(']')) || (s.starts_with('(') && s.ends_with(')')) {
            let inner = &s[1..s.len() - 1];
            let mut elems = vec![];
            for part in split_top_level(inner) {
                let part = part.trim();
                // Tolerate a trailing comma, as in ('m001',).
                if part.is_empty() {
                    continue;
                }
                elems.push(Value::parse(part)?);
            }
            return Ok(Value::List(elems));
        }

        if let Ok(i) = s.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        if let Ok(f) = s.parse::<f64>() {
            return Ok(Value::Float(f));
        }
        Err(())
    }
}

/// Split a list body on commas that aren't nested inside quotes or brackets.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = vec![];
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => (),
            (None, '\'' | '"') => quote = Some(c),
            (None, '[' | '(') => depth += 1,
            (None, ']' | ')') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => (),
        }
    }
    parts.push(&s[start..]);
    parts
}

impl fmt::Display for Value {
    /// Render the value back out as a config literal. Floats always carry a
    /// decimal point so that a round trip preserves the type.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.is_finite() && x.abs() < 1e16 {
                    write!(f, "{x:.1}")
                } else {
                    write!(f, "{x}")
                }
            }
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::List(elems) => {
                write!(f, "[{}]", elems.iter().join(", "))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<&Path> for Value {
    fn from(p: &Path) -> Value {
        Value::Str(p.display().to_string())
    }
}

impl From<&PathBuf> for Value {
    fn from(p: &PathBuf) -> Value {
        Value::Str(p.display().to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Value {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Value {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

#[derive(Debug, Default, Clone)]
struct Section {
    comment: Option<String>,
    values: IndexMap<String, Value>,
}

/// A set of key overwrites for one section, produced by a stage and applied
/// by whoever owns the [`ConfigStore`].
#[derive(Debug, Clone)]
pub(crate) struct ConfigDelta {
    pub(crate) section: &'static str,
    pub(crate) comment: Option<&'static str>,
    pub(crate) values: IndexMap<String, Value>,
}

/// Removes the lock file when the store is dropped.
#[derive(Debug)]
struct LockGuard {
    path: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// The single owner of a pipeline config file. All mutation goes through this
/// type and is persisted immediately; the lock file rejects a second
/// concurrent owner rather than allowing last-writer-wins corruption.
#[derive(Debug)]
pub(crate) struct ConfigStore {
    path: PathBuf,
    sections: IndexMap<String, Section>,
    _lock: LockGuard,
}

impl ConfigStore {
    /// Create a new, empty config file, taking ownership of it.
    pub(crate) fn create<P: AsRef<Path>>(path: P) -> Result<ConfigStore, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let lock = Self::acquire_lock(&path)?;
        let store = ConfigStore {
            path,
            sections: IndexMap::new(),
            _lock: lock,
        };
        store.persist()?;
        Ok(store)
    }

    /// Parse an existing config file, taking ownership of it.
    pub(crate) fn load<P: AsRef<Path>>(path: P) -> Result<ConfigStore, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let text = fs::read_to_string(&path).map_err(|err| ConfigError::Read {
            path: path.clone(),
            err,
        })?;
        let lock = Self::acquire_lock(&path)?;
        let sections = Self::parse(&text, &path)?;
        debug!(
            "Parsed {} section(s) from '{}'",
            sections.len(),
            path.display()
        );
        Ok(ConfigStore {
            path,
            sections,
            _lock: lock,
        })
    }

    fn acquire_lock(path: &Path) -> Result<LockGuard, ConfigError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string());
        let lock_path = path.with_file_name(format!(".{file_name}.lock"));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(_) => Ok(LockGuard { path: lock_path }),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ConfigError::Locked {
                    path: path.to_path_buf(),
                    lock: lock_path,
                })
            }
            Err(err) => Err(ConfigError::Write {
                path: lock_path,
                err,
            }),
        }
    }

    fn parse(text: &str, path: &Path) -> Result<IndexMap<String, Section>, ConfigError> {
        let mut sections: IndexMap<String, Section> = IndexMap::new();
        let mut current: Option<String> = None;

        for (i, line) in text.lines().enumerate() {
            let line_num = i + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            if let Some(name) = trimmed
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
            {
                let name = name.trim().to_string();
                if sections.contains_key(&name) {
                    return Err(ConfigError::DuplicateSection {
                        section: name,
                        path: path.to_path_buf(),
                    });
                }
                sections.insert(name.clone(), Section::default());
                current = Some(name);
                continue;
            }

            let (key, raw) = match trimmed.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => {
                    return Err(ConfigError::BadLine {
                        line: line_num,
                        raw: trimmed.to_string(),
                        path: path.to_path_buf(),
                    })
                }
            };
            let section_name = current.clone().ok_or_else(|| ConfigError::BadLine {
                line: line_num,
                raw: trimmed.to_string(),
                path: path.to_path_buf(),
            })?;

            let value = Value::parse(raw).map_err(|()| ConfigError::BadLiteral {
                section: section_name.clone(),
                key: key.to_string(),
                raw: raw.to_string(),
                path: path.to_path_buf(),
            })?;
            let section = &mut sections[&section_name];
            if section.values.contains_key(key) {
                return Err(ConfigError::DuplicateKey {
                    section: section_name,
                    key: key.to_string(),
                    path: path.to_path_buf(),
                });
            }
            section.values.insert(key.to_string(), value);
        }

        Ok(sections)
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    fn try_get(&self, section: &str, key: &str) -> Option<&Value> {
        self.sections.get(section)?.values.get(key)
    }

    /// Get a value, failing with a missing-configuration error if the section
    /// or key is absent.
    pub(crate) fn get(&self, section: &str, key: &str) -> Result<&Value, ConfigError> {
        let s = self
            .sections
            .get(section)
            .ok_or_else(|| ConfigError::MissingSection {
                section: section.to_string(),
                path: self.path.clone(),
            })?;
        s.values.get(key).ok_or_else(|| ConfigError::MissingKey {
            section: section.to_string(),
            key: key.to_string(),
            path: self.path.clone(),
        })
    }

    pub(crate) fn get_str(&self, section: &str, key: &str) -> Result<&str, ConfigError> {
        match self.get(section, key)? {
            Value::Str(s) => Ok(s),
            other => Err(self.coerce_error(section, key, "a quoted string", other)),
        }
    }

    pub(crate) fn get_str_or(
        &self,
        section: &str,
        key: &str,
        default: &str,
    ) -> Result<String, ConfigError> {
        match self.try_get(section, key) {
            None => Ok(default.to_string()),
            Some(Value::Str(s)) => Ok(s.clone()),
            Some(other) => Err(self.coerce_error(section, key, "a quoted string", other)),
        }
    }

    pub(crate) fn get_int_or(
        &self,
        section: &str,
        key: &str,
        default: i64,
    ) -> Result<i64, ConfigError> {
        match self.try_get(section, key) {
            None => Ok(default),
            Some(Value::Int(i)) => Ok(*i),
            Some(other) => Err(self.coerce_error(section, key, "an integer", other)),
        }
    }

    pub(crate) fn get_bool_or(
        &self,
        section: &str,
        key: &str,
        default: bool,
    ) -> Result<bool, ConfigError> {
        match self.try_get(section, key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(self.coerce_error(section, key, "a boolean", other)),
        }
    }

    /// Get a list of strings. A missing key is an empty list, so that optional
    /// keys like `badants` don't have to be present.
    pub(crate) fn get_str_list_or_empty(
        &self,
        section: &str,
        key: &str,
    ) -> Result<Vec<String>, ConfigError> {
        match self.try_get(section, key) {
            None => Ok(vec![]),
            Some(Value::List(elems)) => elems
                .iter()
                .map(|e| match e {
                    Value::Str(s) => Ok(s.clone()),
                    other => Err(self.coerce_error(section, key, "a list of strings", other)),
                })
                .collect(),
            Some(other) => Err(self.coerce_error(section, key, "a list of strings", other)),
        }
    }

    fn coerce_error(&self, section: &str, key: &str, expected: &str, value: &Value) -> ConfigError {
        ConfigError::Coerce {
            section: section.to_string(),
            key: key.to_string(),
            expected: expected.to_string(),
            value: value.to_string(),
        }
    }

    /// Keys present in a section but not in the caller's expected set. Stages
    /// warn about these rather than failing.
    pub(crate) fn unknown_keys(&self, section: &str, expected: &[&str]) -> Vec<String> {
        match self.sections.get(section) {
            None => vec![],
            Some(s) => s
                .values
                .keys()
                .filter(|k| !expected.contains(&k.as_str()))
                .cloned()
                .collect(),
        }
    }

    /// Overwrite the named keys in a section (creating the section if absent,
    /// leaving unrelated keys alone) and persist immediately.
    pub(crate) fn write_section(
        &mut self,
        section: &str,
        values: IndexMap<String, Value>,
        comment: Option<&str>,
    ) -> Result<(), ConfigError> {
        let entry = self
            .sections
            .entry(section.to_string())
            .or_insert_with(Section::default);
        if let Some(c) = comment {
            entry.comment = Some(c.to_string());
        }
        for (k, v) in values {
            entry.values.insert(k, v);
        }
        debug!("Writing [{section}] in '{}'", self.path.display());
        self.persist()
    }

    pub(crate) fn apply(&mut self, delta: ConfigDelta) -> Result<(), ConfigError> {
        self.write_section(delta.section, delta.values, delta.comment)
    }

    /// Delete a section entirely and persist.
    pub(crate) fn remove_section(&mut self, section: &str) -> Result<(), ConfigError> {
        self.sections.shift_remove(section);
        self.persist()
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (name, section) in &self.sections {
            out.push_str(&format!("[{name}]\n"));
            if let Some(c) = &section.comment {
                out.push_str(&format!("# {c}\n"));
            }
            for (k, v) in &section.values {
                out.push_str(&format!("{k} = {v}\n"));
            }
            out.push('\n');
        }
        out
    }

    /// Write the config back to its file. The write goes via a temporary file
    /// and a rename so a crash can't leave a half-written config.
    pub(crate) fn persist(&self) -> Result<(), ConfigError> {
        let tmp = self.path.with_extension("tmp");
        let write = |path: &Path| -> Result<(), std::io::Error> {
            let mut f = fs::File::create(path)?;
            f.write_all(self.render().as_bytes())?;
            f.sync_all()
        };
        write(&tmp).map_err(|err| ConfigError::Write {
            path: tmp.clone(),
            err,
        })?;
        fs::rename(&tmp, &self.path).map_err(|err| ConfigError::Write {
            path: self.path.clone(),
            err,
        })
    }
}
