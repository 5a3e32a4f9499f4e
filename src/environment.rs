/*
 * ==========================================================================
 * RELAY - runtime core
 * ==========================================================================
 *
 * Author:   Sam Wilcox
 * Github:   https://github.com/samwilcox/pawx
 *
 * License: dual MIT / Apache-2.0, see LICENSE files.
 * ==========================================================================
 */

//! Lexical environments.
//!
//! An `Environment` is a frame mapping names to values, linked to an
//! optional parent. `define` inserts into the current frame; there is no
//! mutation of an existing binding's value in place — rebinding a name in
//! the current frame shadows any parent binding rather than overwriting it.
//! The frame chain is `Arc<Mutex<Scope>>` rather than a single-threaded
//! `Rc<RefCell<_>>` because closures captured by a `server` definition are
//! handed to a different tokio task than the one that defined them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::value::Value;

struct Scope {
    values: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A lexical frame. Cheap to clone — clones share the same underlying scope.
#[derive(Clone)]
pub struct Environment(Arc<Mutex<Scope>>);

impl Environment {
    pub fn new(parent: Option<Environment>) -> Self {
        Environment(Arc::new(Mutex::new(Scope {
            values: HashMap::new(),
            parent,
        })))
    }

    pub fn root() -> Self {
        Environment::new(None)
    }

    pub fn child(&self) -> Self {
        Environment::new(Some(self.clone()))
    }

    /// Inserts into the current frame. Rebinding an existing name in this
    /// frame shadows it; it never reaches into a parent frame.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.0.lock().unwrap().values.insert(name.into(), value);
    }

    /// Walks the parent chain looking for `name`.
    pub fn get(&self, name: &str) -> Option<Value> {
        let scope = self.0.lock().unwrap();
        if let Some(v) = scope.values.get(name) {
            return Some(v.clone());
        }
        match &scope.parent {
            Some(parent) => {
                let parent = parent.clone();
                drop(scope);
                parent.get(name)
            }
            None => None,
        }
    }

    /// True if `name` is bound in this frame or an ancestor.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Identity comparison, useful for tests that check closure capture.
    pub fn same_scope(&self, other: &Environment) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_chain() {
        let root = Environment::root();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        assert_eq!(child.get("x").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn rebinding_shadows_without_mutating_parent() {
        let root = Environment::root();
        root.define("x", Value::Number(1.0));
        let child = root.child();
        child.define("x", Value::Number(2.0));
        assert_eq!(child.get("x").unwrap().as_number(), Some(2.0));
        assert_eq!(root.get("x").unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn undefined_lookup_is_none() {
        let root = Environment::root();
        assert!(root.get("missing").is_none());
    }
}
