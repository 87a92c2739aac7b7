use serde_json::Value;
use std::fmt;

/// A persisted setting changed value. `None` means the key is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingChange {
    pub key: String,
    pub new_value: Option<Value>,
    pub old_value: Option<Value>,
    pub timestamp: std::time::Instant,
}

impl SettingChange {
    pub fn new(key: impl Into<String>, new_value: Option<Value>, old_value: Option<Value>) -> Self {
        Self {
            key: key.into(),
            new_value,
            old_value,
            timestamp: std::time::Instant::now(),
        }
    }

    /// Whether a watcher of `key` should see this change: a write to `key`
    /// itself, to a path below it (`a.b` for `a`) or to one of its parents
    /// (`a` for `a.b`, including whole-document replacements).
    pub fn concerns(&self, key: &str) -> bool {
        self.key == key || is_below(&self.key, key) || is_below(key, &self.key)
    }
}

/// `a.b.c` is below `a` and `a.b`, not below `a.b.c` or `a.bc`.
pub(crate) fn is_below(path: &str, parent: &str) -> bool {
    path.strip_prefix(parent)
        .is_some_and(|rest| rest.starts_with('.'))
}

impl fmt::Display for SettingChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(v) => v.to_string(),
            None => "<unset>".to_string(),
        };
        write!(
            f,
            "{}: {} -> {}",
            self.key,
            show(&self.old_value),
            show(&self.new_value)
        )
    }
}
