//! Key-value store behind every command.
//!
//! Entries live in one of two tiers. Persistent entries survive restarts and
//! are written to a JSON file after every transaction that touched them;
//! ephemeral entries (live game state, daily counters) exist only in memory.
//! Each tier is split into global entries and per-user entries keyed by the
//! Twitch user id.
//!
//! Commands never touch the maps directly. They run inside
//! [`Store::transaction`], which holds the store lock for the whole command
//! and buffers writes in a [`Txn`]. Writes are applied only when the command
//! returns `Ok`, so a rejected command leaves no trace and two commands for
//! the same user can't interleave their read-modify-write of a balance.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

pub const PERSISTENT: bool = true;
pub const EPHEMERAL: bool = false;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl Value {
    pub fn as_int(&self) -> i64 {
        match self {
            Value::Int(i) => *i,
            Value::Float(f) => *f as i64,
            Value::Bool(b) => *b as i64,
            Value::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => s.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    User(String),
}

impl Scope {
    pub fn user(id: &str) -> Self {
        Scope::User(id.to_string())
    }
}

/// Access to store entries. Missing entries read as the type's zero value,
/// matching how balances and counters spring into existence on first use.
pub trait Vars {
    fn get(&self, scope: &Scope, key: &str, persisted: bool) -> Option<Value>;
    fn set(&mut self, scope: &Scope, key: &str, value: Value, persisted: bool);
    fn unset(&mut self, scope: &Scope, key: &str, persisted: bool);

    /// Every user holding `key`, as `(user id, value)`.
    fn users_with(&self, key: &str, persisted: bool) -> Vec<(String, Value)>;

    fn int(&self, scope: &Scope, key: &str, persisted: bool) -> i64 {
        self.get(scope, key, persisted).map(|v| v.as_int()).unwrap_or(0)
    }

    fn text(&self, scope: &Scope, key: &str, persisted: bool) -> String {
        self.get(scope, key, persisted).map(|v| v.as_text()).unwrap_or_default()
    }

    fn flag(&self, scope: &Scope, key: &str, persisted: bool) -> bool {
        self.get(scope, key, persisted).map(|v| v.as_bool()).unwrap_or(false)
    }

    /// A stored RFC 3339 timestamp. Empty or unparseable text reads as `None`.
    fn time(&self, scope: &Scope, key: &str, persisted: bool) -> Option<DateTime<Utc>> {
        let raw = self.text(scope, key, persisted);
        if raw.is_empty() {
            return None;
        }
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                debug!(key, raw, error = %e, "ignoring unparseable timestamp");
                None
            }
        }
    }

    fn set_time(&mut self, scope: &Scope, key: &str, at: DateTime<Utc>, persisted: bool) {
        self.set(scope, key, Value::Text(at.to_rfc3339()), persisted);
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Tier {
    #[serde(default)]
    globals: BTreeMap<String, Value>,
    #[serde(default)]
    users: BTreeMap<String, BTreeMap<String, Value>>,
}

impl Tier {
    fn apply(&mut self, slot: Slot, status: Status) {
        match status {
            Status::Update(value) => self.set(slot.scope, slot.key, value),
            Status::Delete => self.unset(&slot.scope, &slot.key),
        }
    }

    fn get(&self, scope: &Scope, key: &str) -> Option<&Value> {
        match scope {
            Scope::Global => self.globals.get(key),
            Scope::User(id) => self.users.get(id).and_then(|vars| vars.get(key)),
        }
    }

    fn set(&mut self, scope: Scope, key: String, value: Value) {
        match scope {
            Scope::Global => {
                self.globals.insert(key, value);
            }
            Scope::User(id) => {
                self.users.entry(id).or_default().insert(key, value);
            }
        }
    }

    fn unset(&mut self, scope: &Scope, key: &str) {
        match scope {
            Scope::Global => {
                self.globals.remove(key);
            }
            Scope::User(id) => {
                if let Some(vars) = self.users.get_mut(id) {
                    vars.remove(key);
                }
            }
        }
    }
}

/// The committed contents of the store.
#[derive(Debug, Default)]
pub struct Snapshot {
    persistent: Tier,
    ephemeral: Tier,
}

impl Snapshot {
    fn tier(&self, persisted: bool) -> &Tier {
        if persisted {
            &self.persistent
        } else {
            &self.ephemeral
        }
    }

    fn tier_mut(&mut self, persisted: bool) -> &mut Tier {
        if persisted {
            &mut self.persistent
        } else {
            &mut self.ephemeral
        }
    }

    fn apply(&mut self, pending: BTreeMap<Slot, Status>) {
        for (slot, status) in pending {
            self.tier_mut(slot.persisted).apply(slot, status);
        }
    }
}

impl Vars for Snapshot {
    fn get(&self, scope: &Scope, key: &str, persisted: bool) -> Option<Value> {
        self.tier(persisted).get(scope, key).cloned()
    }

    fn set(&mut self, scope: &Scope, key: &str, value: Value, persisted: bool) {
        self.tier_mut(persisted).set(scope.clone(), key.to_string(), value);
    }

    fn unset(&mut self, scope: &Scope, key: &str, persisted: bool) {
        self.tier_mut(persisted).unset(scope, key);
    }

    fn users_with(&self, key: &str, persisted: bool) -> Vec<(String, Value)> {
        self.tier(persisted)
            .users
            .iter()
            .filter_map(|(id, vars)| vars.get(key).map(|v| (id.clone(), v.clone())))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Slot {
    persisted: bool,
    scope: Scope,
    key: String,
}

#[derive(Clone, Debug)]
enum Status {
    Update(Value),
    Delete,
}

/// Buffered view over a snapshot. Reads see this transaction's own writes.
pub struct Txn<'a> {
    base: &'a Snapshot,
    pending: BTreeMap<Slot, Status>,
}

impl<'a> Txn<'a> {
    fn new(base: &'a Snapshot) -> Self {
        Self {
            base,
            pending: BTreeMap::new(),
        }
    }

    fn slot(scope: &Scope, key: &str, persisted: bool) -> Slot {
        Slot {
            persisted,
            scope: scope.clone(),
            key: key.to_string(),
        }
    }
}

impl<'a> Vars for Txn<'a> {
    fn get(&self, scope: &Scope, key: &str, persisted: bool) -> Option<Value> {
        match self.pending.get(&Self::slot(scope, key, persisted)) {
            Some(Status::Update(value)) => Some(value.clone()),
            Some(Status::Delete) => None,
            None => self.base.get(scope, key, persisted),
        }
    }

    fn set(&mut self, scope: &Scope, key: &str, value: Value, persisted: bool) {
        self.pending
            .insert(Self::slot(scope, key, persisted), Status::Update(value));
    }

    fn unset(&mut self, scope: &Scope, key: &str, persisted: bool) {
        self.pending
            .insert(Self::slot(scope, key, persisted), Status::Delete);
    }

    fn users_with(&self, key: &str, persisted: bool) -> Vec<(String, Value)> {
        let mut found: HashMap<String, Value> = self.base.users_with(key, persisted).into_iter().collect();
        for (slot, status) in &self.pending {
            let Scope::User(id) = &slot.scope else { continue };
            if slot.persisted != persisted || slot.key != key {
                continue;
            }
            match status {
                Status::Update(value) => {
                    found.insert(id.clone(), value.clone());
                }
                Status::Delete => {
                    found.remove(id);
                }
            }
        }
        found.into_iter().collect()
    }
}

pub struct Store {
    inner: Mutex<Snapshot>,
    path: Option<PathBuf>,
}

impl Store {
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Store {
            inner: Mutex::new(Snapshot::default()),
            path: None,
        }
    }

    /// In-memory store starting from existing contents.
    #[cfg(test)]
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Store {
            inner: Mutex::new(snapshot),
            path: None,
        }
    }

    #[cfg(test)]
    pub fn into_snapshot(self) -> Snapshot {
        self.inner.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the store backed by `path`, loading persistent entries if the file exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let persistent = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Tier::default(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), users = persistent.users.len(), "opened store");

        Ok(Store {
            inner: Mutex::new(Snapshot {
                persistent,
                ephemeral: Tier::default(),
            }),
            path: Some(path),
        })
    }

    /// Run `f` against a buffered view of the store, committing its writes only if it succeeds.
    pub fn transaction<R, E>(&self, f: impl FnOnce(&mut Txn<'_>) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut snapshot = self.inner.lock().map_err(|_| StoreError::Poisoned)?;

        let (result, pending) = {
            let mut txn = Txn::new(&snapshot);
            let result = f(&mut txn);
            (result, txn.pending)
        };

        if result.is_err() || pending.is_empty() {
            return result;
        }

        // Persistent writes reach memory only once they are on disk
        let (durable, live): (BTreeMap<_, _>, BTreeMap<_, _>) =
            pending.into_iter().partition(|(slot, _)| slot.persisted);
        if !durable.is_empty() {
            let mut persistent = snapshot.persistent.clone();
            for (slot, status) in durable {
                persistent.apply(slot, status);
            }
            self.save(&persistent)?;
            snapshot.persistent = persistent;
        }
        snapshot.apply(live);

        result
    }

    /// Read-only access outside a command.
    pub fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> Result<R, StoreError> {
        let snapshot = self.inner.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&snapshot))
    }

    fn save(&self, persistent: &Tier) -> Result<(), StoreError> {
        let Some(path) = &self.path else { return Ok(()) };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(persistent)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
