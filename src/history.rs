//! Durable, category-scoped undo stacks.
//!
//! Every category (`request`, `bin`, `dispatch`) is an independent LIFO stack.
//! Each action type is a variant of its category's enum, so a stack can only
//! ever hold actions of its own category and callers undo them with an
//! exhaustive `match`. The manager itself never looks inside a payload.
//!
//! On disk the history is one JSON object mapping category name to a
//! bottom-to-top array of `{type, data, timestamp}` objects. It is rewritten
//! in full after every push and pop.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::model::{Bin, BinId, RequestRecord, Vehicle};
use crate::store::JsonStore;

/// The fixed set of history categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryCategory {
    Request,
    Bin,
    Dispatch,
}

impl HistoryCategory {
    pub const ALL: [HistoryCategory; 3] = [
        HistoryCategory::Request,
        HistoryCategory::Bin,
        HistoryCategory::Dispatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryCategory::Request => "request",
            HistoryCategory::Bin => "bin",
            HistoryCategory::Dispatch => "dispatch",
        }
    }
}

impl fmt::Display for HistoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HistoryCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown history category '{}'", s))
    }
}

/// Full copy of fleet and bins taken right before a dispatch pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub vehicles: Vec<Vehicle>,
    pub bins: Vec<Bin>,
}

/// A single fill level edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinLevelChange {
    pub id: BinId,
    pub old_level: f64,
    pub new_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum DispatchAction {
    DispatchAll(DispatchSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum BinAction {
    AddBin(Bin),
    UpdateBin(BinLevelChange),
    RemoveBin(Bin),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RequestAction {
    AddRequest(RequestRecord),
    ProcessRequest(RequestRecord),
    CancelRequest(RequestRecord),
}

/// Any recordable action, grouped by category.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryAction {
    Request(RequestAction),
    Bin(BinAction),
    Dispatch(DispatchAction),
}

impl HistoryAction {
    pub fn category(&self) -> HistoryCategory {
        match self {
            HistoryAction::Request(_) => HistoryCategory::Request,
            HistoryAction::Bin(_) => HistoryCategory::Bin,
            HistoryAction::Dispatch(_) => HistoryCategory::Dispatch,
        }
    }

    /// The persisted `type` tag.
    pub fn action_type(&self) -> &'static str {
        match self {
            HistoryAction::Request(RequestAction::AddRequest(_)) => "add_request",
            HistoryAction::Request(RequestAction::ProcessRequest(_)) => "process_request",
            HistoryAction::Request(RequestAction::CancelRequest(_)) => "cancel_request",
            HistoryAction::Bin(BinAction::AddBin(_)) => "add_bin",
            HistoryAction::Bin(BinAction::UpdateBin(_)) => "update_bin",
            HistoryAction::Bin(BinAction::RemoveBin(_)) => "remove_bin",
            HistoryAction::Dispatch(DispatchAction::DispatchAll(_)) => "dispatch_all",
        }
    }

    /// `{type, data}` object.
    fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            HistoryAction::Request(action) => serde_json::to_value(action),
            HistoryAction::Bin(action) => serde_json::to_value(action),
            HistoryAction::Dispatch(action) => serde_json::to_value(action),
        }
    }

    fn from_value(category: HistoryCategory, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match category {
            HistoryCategory::Request => HistoryAction::Request(serde_json::from_value(value)?),
            HistoryCategory::Bin => HistoryAction::Bin(serde_json::from_value(value)?),
            HistoryCategory::Dispatch => HistoryAction::Dispatch(serde_json::from_value(value)?),
        })
    }
}

/// Ties a per-category action enum to its stack.
pub trait CategoryAction: Into<HistoryAction> + Sized {
    const CATEGORY: HistoryCategory;

    fn from_action(action: HistoryAction) -> Option<Self>;
}

macro_rules! category_action {
    ($ty:ident, $variant:ident) => {
        impl From<$ty> for HistoryAction {
            fn from(action: $ty) -> Self {
                HistoryAction::$variant(action)
            }
        }

        impl CategoryAction for $ty {
            const CATEGORY: HistoryCategory = HistoryCategory::$variant;

            fn from_action(action: HistoryAction) -> Option<Self> {
                match action {
                    HistoryAction::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

category_action!(RequestAction, Request);
category_action!(BinAction, Bin);
category_action!(DispatchAction, Dispatch);

/// A recorded action and when it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub action: HistoryAction,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(action: impl Into<HistoryAction>) -> Self {
        Self {
            action: action.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn category(&self) -> HistoryCategory {
        self.action.category()
    }

    pub fn action_type(&self) -> &'static str {
        self.action.action_type()
    }
}

/// On-disk entry before its payload is typed. Older files carry no timestamp.
#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

/// RFC 3339, or a zone-less ISO 8601 time taken as UTC. Anything else is
/// treated as missing.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    Ok(NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}

type Stacks = BTreeMap<HistoryCategory, Vec<HistoryEntry>>;

fn empty_stacks() -> Stacks {
    HistoryCategory::ALL
        .into_iter()
        .map(|category| (category, Vec::new()))
        .collect()
}

/// Category-scoped LIFO history with durable storage.
#[derive(Debug)]
pub struct HistoryManager {
    stacks: Stacks,
    store: JsonStore,
}

impl HistoryManager {
    /// Loads `store` and replays it. Missing or malformed storage gives an
    /// empty history in every category.
    pub fn open(store: JsonStore) -> Self {
        let mut manager = Self {
            stacks: empty_stacks(),
            store,
        };

        let Some(raw) = manager.store.load::<BTreeMap<HistoryCategory, Vec<RawEntry>>>() else {
            return manager;
        };

        match decode(raw) {
            Ok(decoded) => {
                for entry in decoded {
                    manager.stack_mut(entry.category()).push(entry);
                }
                debug!(
                    request = manager.len(HistoryCategory::Request),
                    bin = manager.len(HistoryCategory::Bin),
                    dispatch = manager.len(HistoryCategory::Dispatch),
                    "history loaded"
                );
            }
            Err(err) => warn!(error = %err, "history is malformed, starting empty"),
        }

        manager
    }

    pub fn in_memory() -> Self {
        Self::open(JsonStore::ephemeral())
    }

    fn stack_mut(&mut self, category: HistoryCategory) -> &mut Vec<HistoryEntry> {
        self.stacks.entry(category).or_default()
    }

    /// Records `action` on top of its category's stack and persists.
    ///
    /// If persisting fails the push is rolled back.
    pub fn push(&mut self, action: impl Into<HistoryAction>) -> Result<(), StoreError> {
        self.push_entry(HistoryEntry::new(action))
    }

    pub fn push_entry(&mut self, entry: HistoryEntry) -> Result<(), StoreError> {
        let category = entry.category();
        debug!(%category, action = entry.action_type(), "history push");
        self.stack_mut(category).push(entry);
        if let Err(err) = self.save() {
            self.stack_mut(category).pop();
            return Err(err);
        }
        Ok(())
    }

    /// Removes and returns the top entry, `None` when the category is empty.
    ///
    /// If persisting fails the entry is put back.
    pub fn pop(&mut self, category: HistoryCategory) -> Result<Option<HistoryEntry>, StoreError> {
        let Some(entry) = self.stack_mut(category).pop() else {
            return Ok(None);
        };
        if let Err(err) = self.save() {
            self.stack_mut(category).push(entry);
            return Err(err);
        }
        debug!(%category, action = entry.action_type(), "history pop");
        Ok(Some(entry))
    }

    /// Typed [`pop`](Self::pop) for the category owned by `A`.
    pub fn pop_action<A: CategoryAction>(&mut self) -> Result<Option<(A, DateTime<Utc>)>, StoreError> {
        let popped = self.pop(A::CATEGORY)?;
        Ok(popped.and_then(|entry| {
            let timestamp = entry.timestamp;
            A::from_action(entry.action).map(|action| (action, timestamp))
        }))
    }

    pub fn peek(&self, category: HistoryCategory) -> Option<&HistoryEntry> {
        self.entries(category).last()
    }

    /// Typed copy of the top entry for the category owned by `A`.
    pub fn peek_action<A: CategoryAction>(&self) -> Option<(A, DateTime<Utc>)> {
        let entry = self.peek(A::CATEGORY)?;
        A::from_action(entry.action.clone()).map(|action| (action, entry.timestamp))
    }

    /// Bottom-to-top view of one category.
    pub fn entries(&self, category: HistoryCategory) -> &[HistoryEntry] {
        self.stacks.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self, category: HistoryCategory) -> usize {
        self.entries(category).len()
    }

    pub fn is_empty(&self, category: HistoryCategory) -> bool {
        self.entries(category).is_empty()
    }

    fn save(&self) -> Result<(), StoreError> {
        let mut document = Map::new();
        for (category, entries) in &self.stacks {
            let stored = entries
                .iter()
                .map(encode)
                .collect::<Result<Vec<_>, _>>()?;
            document.insert(category.as_str().to_string(), Value::Array(stored));
        }
        self.store.save(&document)
    }
}

fn encode(entry: &HistoryEntry) -> Result<Value, serde_json::Error> {
    let mut value = entry.action.to_value()?;
    if let Value::Object(map) = &mut value {
        map.insert("timestamp".to_string(), serde_json::to_value(entry.timestamp)?);
    }
    Ok(value)
}

/// Types every raw entry against the category it was stored under. One bad
/// entry fails the whole document.
fn decode(raw: BTreeMap<HistoryCategory, Vec<RawEntry>>) -> Result<Vec<HistoryEntry>, serde_json::Error> {
    let loaded_at = Utc::now();
    let mut entries = Vec::new();
    for (category, raw_entries) in raw {
        for raw in raw_entries {
            let action = HistoryAction::from_value(category, json!({ "type": raw.kind, "data": raw.data }))?;
            entries.push(HistoryEntry {
                action,
                timestamp: raw.timestamp.unwrap_or(loaded_at),
            });
        }
    }
    Ok(entries)
}
