//! Interned qualified names.
//!
//! Every symbol and package in an analysis run is identified by a
//! `::`-separated qualified name. Names are interned in a global table so
//! equality is a pointer comparison and copies are free, which matters once
//! the same names are shared by the symbol table, the reference graph and
//! every per-package worker.
//!
//! Method names use `#` for instance methods (`A::B#call`) and `.` for
//! singleton methods (`A::B.build`).

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{LazyLock, RwLock};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Separator between namespace segments.
pub const SCOPE_SEPARATOR: &str = "::";

static INTERNER: LazyLock<RwLock<HashSet<&'static str>>> =
    LazyLock::new(|| RwLock::new(HashSet::new()));

/// A `::`-separated, interned identifier.
#[derive(Clone, Copy)]
pub struct QualifiedName {
    inner: &'static str,
}

impl QualifiedName {
    /// Intern a name.
    pub fn new(s: impl AsRef<str>) -> Self {
        let s = s.as_ref();

        {
            let interner = INTERNER.read().unwrap_or_else(|e| e.into_inner());
            if let Some(&interned) = interner.get(s) {
                return QualifiedName { inner: interned };
            }
        }

        let mut interner = INTERNER.write().unwrap_or_else(|e| e.into_inner());

        // Another thread may have won the race between the two locks.
        if let Some(&interned) = interner.get(s) {
            return QualifiedName { inner: interned };
        }

        let leaked: &'static str = Box::leak(s.to_string().into_boxed_str());
        interner.insert(leaked);

        QualifiedName { inner: leaked }
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        self.inner
    }

    /// Split a method name into its receiver and method parts.
    ///
    /// Returns `(owner, method, singleton)` for `A::B#m` and `A::B.m`.
    pub fn split_method(&self) -> Option<(QualifiedName, &'static str, bool)> {
        let last_scope = self.inner.rfind(SCOPE_SEPARATOR).map(|i| i + 2).unwrap_or(0);
        let tail = &self.inner[last_scope..];

        if let Some(i) = tail.find('#') {
            let at = last_scope + i;
            return Some((QualifiedName::new(&self.inner[..at]), &self.inner[at + 1..], false));
        }
        if let Some(i) = tail.find('.') {
            let at = last_scope + i;
            return Some((QualifiedName::new(&self.inner[..at]), &self.inner[at + 1..], true));
        }
        None
    }

    /// The enclosing namespace, if any.
    ///
    /// `A::B::C` -> `A::B`, `A::B#m` -> `A::B`, `A` -> `None`.
    pub fn parent(&self) -> Option<QualifiedName> {
        if let Some((owner, _, _)) = self.split_method() {
            return Some(owner);
        }
        self.inner
            .rfind(SCOPE_SEPARATOR)
            .map(|i| QualifiedName::new(&self.inner[..i]))
    }

    /// The final segment of the name (`C` for `A::B::C`, `m` for `A#m`).
    pub fn last_segment(&self) -> &'static str {
        if let Some((_, method, _)) = self.split_method() {
            return method;
        }
        match self.inner.rfind(SCOPE_SEPARATOR) {
            Some(i) => &self.inner[i + 2..],
            None => self.inner,
        }
    }

    /// All enclosing namespaces, outermost first (excluding `self`).
    pub fn ancestors(&self) -> Vec<QualifiedName> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(name) = current {
            current = name.parent();
            out.push(name);
        }
        out.reverse();
        out
    }

    /// Whether `self` equals `prefix` or is nested somewhere beneath it.
    pub fn is_within(&self, prefix: QualifiedName) -> bool {
        if *self == prefix {
            return true;
        }
        match self.inner.strip_prefix(prefix.inner) {
            Some(rest) => {
                rest.starts_with(SCOPE_SEPARATOR) || rest.starts_with('#') || rest.starts_with('.')
            }
            None => false,
        }
    }

    /// Append a nested segment.
    pub fn join(&self, segment: &str) -> QualifiedName {
        QualifiedName::new(format!("{}{}{}", self.inner, SCOPE_SEPARATOR, segment))
    }

    /// Namespace segments (`["A", "B", "C"]` for `A::B::C`).
    pub fn segments(&self) -> impl Iterator<Item = &'static str> {
        self.inner.split(SCOPE_SEPARATOR)
    }
}

impl Deref for QualifiedName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &str {
        self.inner
    }
}

impl AsRef<str> for QualifiedName {
    #[inline]
    fn as_ref(&self) -> &str {
        self.inner
    }
}

impl Borrow<str> for QualifiedName {
    #[inline]
    fn borrow(&self) -> &str {
        self.inner
    }
}

impl PartialEq for QualifiedName {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.inner, other.inner)
    }
}

impl Eq for QualifiedName {}

impl PartialOrd for QualifiedName {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QualifiedName {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(other.inner)
    }
}

impl Hash for QualifiedName {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.inner, state)
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.inner, f)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner, f)
    }
}

impl From<&str> for QualifiedName {
    fn from(s: &str) -> Self {
        QualifiedName::new(s)
    }
}

impl From<String> for QualifiedName {
    fn from(s: String) -> Self {
        QualifiedName::new(s)
    }
}

impl From<&String> for QualifiedName {
    fn from(s: &String) -> Self {
        QualifiedName::new(s)
    }
}

impl Serialize for QualifiedName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.inner.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for QualifiedName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(QualifiedName::new(s))
    }
}
