//! The registry of entry kinds and which kinds may reference which.

use std::collections::BTreeMap;

/// Which kinds an entry of a given kind may reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefPolicy {
    /// References to any kind are allowed.
    Any,
    /// Only the listed kinds may be referenced. Empty means no references.
    Only(Vec<String>),
}

impl RefPolicy {
    /// Builds a policy from a config list, where `"*"` means any kind.
    pub fn from_list(refs: &[String]) -> Self {
        if refs.iter().any(|r| r == "*") {
            RefPolicy::Any
        } else {
            RefPolicy::Only(refs.to_vec())
        }
    }

    /// Returns `true` if a reference to `target_kind` is allowed.
    pub fn allows(&self, target_kind: &str) -> bool {
        match self {
            RefPolicy::Any => true,
            RefPolicy::Only(kinds) => kinds.iter().any(|k| k == target_kind),
        }
    }
}

/// One registered kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSpec {
    /// Kind name as written in definitions.
    pub name: String,
    /// Non-zero tag written into artifact records.
    pub tag: u32,
    /// Which kinds this kind may reference.
    pub refs: RefPolicy,
}

/// Errors from registering kinds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KindError {
    /// The kind name is already registered.
    #[error("kind '{0}' is already defined")]
    DuplicateName(String),
    /// Another kind already uses the tag.
    #[error("kind '{name}' reuses tag {tag} of kind '{existing}'")]
    DuplicateTag {
        /// The kind being registered.
        name: String,
        /// The contested tag.
        tag: u32,
        /// The kind that already owns the tag.
        existing: String,
    },
    /// Tag 0 is reserved.
    #[error("kind '{0}' may not use the reserved tag 0")]
    ReservedTag(String),
}

/// The set of kinds a definition may use.
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    kinds: BTreeMap<String, KindSpec>,
}

impl KindRegistry {
    /// Creates an empty registry.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates the registry of built-in kinds:
    /// `record` (→ record, blob), `table` (→ record, table), `blob` (no
    /// references) and `alias` (→ anything).
    pub fn builtin() -> Self {
        let mut reg = Self::empty();
        let builtins: [(&str, u32, RefPolicy); 4] = [
            ("record", 1, RefPolicy::Only(vec!["record".into(), "blob".into()])),
            ("table", 2, RefPolicy::Only(vec!["record".into(), "table".into()])),
            ("blob", 3, RefPolicy::Only(Vec::new())),
            ("alias", 4, RefPolicy::Any),
        ];
        for (name, tag, refs) in builtins {
            reg.kinds.insert(
                name.to_string(),
                KindSpec {
                    name: name.to_string(),
                    tag,
                    refs,
                },
            );
        }
        reg
    }

    /// Registers a new kind.
    pub fn register(&mut self, name: &str, tag: u32, refs: RefPolicy) -> Result<(), KindError> {
        if tag == 0 {
            return Err(KindError::ReservedTag(name.to_string()));
        }
        if self.kinds.contains_key(name) {
            return Err(KindError::DuplicateName(name.to_string()));
        }
        if let Some(existing) = self.kinds.values().find(|k| k.tag == tag) {
            return Err(KindError::DuplicateTag {
                name: name.to_string(),
                tag,
                existing: existing.name.clone(),
            });
        }
        self.kinds.insert(
            name.to_string(),
            KindSpec {
                name: name.to_string(),
                tag,
                refs,
            },
        );
        Ok(())
    }

    /// Looks up a kind by name.
    pub fn get(&self, name: &str) -> Option<&KindSpec> {
        self.kinds.get(name)
    }

    /// Finds the kind that owns `tag`.
    pub fn by_tag(&self, tag: u32) -> Option<&KindSpec> {
        self.kinds.values().find(|spec| spec.tag == tag)
    }

    /// Returns `true` if `name` is a registered kind.
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Returns `true` if entries of kind `from` may reference entries of kind `to`.
    pub fn can_reference(&self, from: &str, to: &str) -> bool {
        self.kinds
            .get(from)
            .is_some_and(|spec| spec.refs.allows(to))
    }

    /// Registered kind names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }
}
