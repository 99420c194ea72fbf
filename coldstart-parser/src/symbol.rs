// coldstart-parser - Interned symbols and keywords
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Symbols and keywords: optionally namespaced, interned names.
//!
//! Both share one process-wide interner keyed by `(namespace, name)`, so two
//! symbols with the same spelling are the same allocation and compare by
//! pointer. Keywords wrap the same interned name but are a distinct type, so a
//! symbol never compares equal to a keyword.
//!
//! Interned names are never freed. Snapshot runs are short-lived batch
//! processes over a bounded vocabulary, so the interner only grows.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

#[derive(Debug)]
struct NameInner {
    namespace: Option<Arc<str>>,
    name: Arc<str>,
}

/// An interned `(namespace, name)` pair shared by [`Symbol`] and [`Keyword`].
#[derive(Clone)]
struct Name(Arc<NameInner>);

type InternerKey = (Option<Arc<str>>, Arc<str>);

#[derive(Default)]
struct Interner {
    names: HashMap<InternerKey, Arc<NameInner>>,
    strings: HashSet<Arc<str>>,
}

impl Interner {
    fn string(&mut self, s: &str) -> Arc<str> {
        if let Some(existing) = self.strings.get(s) {
            return Arc::clone(existing);
        }
        let interned: Arc<str> = Arc::from(s);
        self.strings.insert(Arc::clone(&interned));
        interned
    }

    fn name(&mut self, namespace: Option<&str>, name: &str) -> Arc<NameInner> {
        let ns = namespace.map(|s| self.string(s));
        let n = self.string(name);
        let key = (ns.clone(), Arc::clone(&n));
        Arc::clone(
            self.names
                .entry(key)
                .or_insert_with(|| Arc::new(NameInner { namespace: ns, name: n })),
        )
    }
}

static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();

impl Name {
    fn intern(namespace: Option<&str>, name: &str) -> Self {
        let interner = INTERNER.get_or_init(|| Mutex::new(Interner::default()));
        // A panic while holding the lock cannot leave a half-inserted entry.
        let mut guard = interner.lock().unwrap_or_else(PoisonError::into_inner);
        Name(guard.name(namespace, name))
    }

    /// Split `ns/name`; a lone `/` and names ending in `/` are unqualified.
    fn parse(s: &str) -> Self {
        match s.find('/') {
            Some(pos) if s != "/" && pos > 0 && pos + 1 < s.len() => {
                Name::intern(Some(&s[..pos]), &s[pos + 1..])
            }
            _ => Name::intern(None, s),
        }
    }

    fn namespace(&self) -> Option<&str> {
        self.0.namespace.as_deref()
    }

    fn name(&self) -> &str {
        &self.0.name
    }

    fn write_qualified(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{}/{}", ns, self.name()),
            None => f.write_str(self.name()),
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Content hash rather than pointer hash keeps HashMap iteration
        // independent of allocation addresses.
        self.0.namespace.hash(state);
        self.0.name.hash(state);
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.namespace()
            .cmp(&other.namespace())
            .then_with(|| self.name().cmp(other.name()))
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A symbol with an optional namespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(Name);

impl Symbol {
    /// Create an unqualified symbol.
    pub fn new(name: &str) -> Self {
        Symbol(Name::intern(None, name))
    }

    /// Create a namespace-qualified symbol.
    pub fn with_namespace(namespace: &str, name: &str) -> Self {
        Symbol(Name::intern(Some(namespace), name))
    }

    /// Parse `foo` or `ns/foo`.
    pub fn parse(s: &str) -> Self {
        Symbol(Name::parse(s))
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The same name without its namespace.
    #[must_use]
    pub fn unqualified(&self) -> Symbol {
        match self.namespace() {
            Some(_) => Symbol::new(self.name()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.write_qualified(f)
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self)
    }
}

/// A keyword with an optional namespace. Prints with a leading `:`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Keyword(Name);

impl Keyword {
    pub fn new(name: &str) -> Self {
        Keyword(Name::intern(None, name))
    }

    pub fn with_namespace(namespace: &str, name: &str) -> Self {
        Keyword(Name::intern(Some(namespace), name))
    }

    /// Parse the text after the colon: `foo` or `ns/foo`.
    pub fn parse(s: &str) -> Self {
        Keyword(Name::parse(s))
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.0.namespace()
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(":")?;
        self.0.write_qualified(f)
    }
}

impl fmt::Debug for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keyword({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_pointer_equal() {
        let a = Symbol::new("foo");
        let b = Symbol::new("foo");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&(a.0).0, &(b.0).0));
    }

    #[test]
    fn test_parse_qualified() {
        let sym = Symbol::parse("user/foo");
        assert_eq!(sym.namespace(), Some("user"));
        assert_eq!(sym.name(), "foo");
        assert_eq!(sym, Symbol::with_namespace("user", "foo"));
        assert_eq!(sym.unqualified(), Symbol::new("foo"));
    }

    #[test]
    fn test_parse_slash() {
        assert_eq!(Symbol::parse("/").name(), "/");
        assert_eq!(Symbol::parse("/").namespace(), None);
    }

    #[test]
    fn test_keyword_display() {
        assert_eq!(Keyword::parse("a/b").to_string(), ":a/b");
        assert_eq!(Keyword::new("x").to_string(), ":x");
    }

    #[test]
    fn test_ordering() {
        let mut syms = vec![Symbol::new("b"), Symbol::parse("z/a"), Symbol::new("a")];
        syms.sort();
        assert_eq!(syms, vec![Symbol::new("a"), Symbol::new("b"), Symbol::parse("z/a")]);
    }
}
