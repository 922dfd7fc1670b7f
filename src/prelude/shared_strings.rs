use std::{
    borrow::Borrow,
    fmt::{Debug, Display},
    ops::Deref,
    sync::Arc,
};

/// Interned-by-sharing identifier text used throughout the AST.
///
/// Cloning is a reference count bump. Hashing and comparison go through the
/// underlying `str`, so maps keyed by `YulString` can be queried with `&str`.
#[derive(Clone, Eq, PartialOrd, Ord)]
pub struct YulString(Arc<str>);

impl YulString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for YulString {
    fn default() -> Self {
        Self("".into())
    }
}

impl From<String> for YulString {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<&str> for YulString {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl std::hash::Hash for YulString {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (*self.0).hash(state);
    }
}

impl PartialEq for YulString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialEq<str> for YulString {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for YulString {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl Borrow<str> for YulString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Debug for YulString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&format!("{:?}", self.0))
    }
}

impl Deref for YulString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for YulString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}
