// ABOUTME: Environment frames with lexical parent lookup and local mutation

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::{Token, Value};

/// A frame of name-to-value bindings with an optional parent. Frames
/// form a DAG: many children may share one parent, and operatives keep
/// their static environment alive for as long as they do. Definition
/// writes to the current frame only; parent frames are never mutated
/// through a child.
pub struct Environment {
    bindings: RefCell<HashMap<Rc<str>, Value>>,
    parent: Option<Rc<Environment>>,
    keyed: Option<(Token, Value)>,
}

impl Environment {
    /// A fresh frame whose parent is the root.
    pub fn new() -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
            keyed: None,
        })
    }

    pub fn with_parent(parent: &Rc<Environment>) -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            keyed: None,
        })
    }

    /// A child frame carrying a keyed static binding, produced by the
    /// binder half of `make-keyed-static-variable`.
    pub fn with_keyed(parent: &Rc<Environment>, key: Token, value: Value) -> Rc<Environment> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent.clone()),
            keyed: Some((key, value)),
        })
    }

    /// Binds in this frame, shadowing any parent binding.
    pub fn define(&self, name: Rc<str>, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Walks this frame and its parents until a binding is found.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        let mut current = self.parent.clone();
        while let Some(env) = current {
            if let Some(value) = env.bindings.borrow().get(name) {
                return Some(value.clone());
            }
            current = env.parent.clone();
        }
        None
    }

    /// Walks the parent chain for the nearest keyed static binding.
    pub fn keyed_lookup(&self, key: &Token) -> Option<Value> {
        if let Some((token, value)) = &self.keyed {
            if token.matches(key) {
                return Some(value.clone());
            }
        }
        let mut current = self.parent.clone();
        while let Some(env) = current {
            if let Some((token, value)) = &env.keyed {
                if token.matches(key) {
                    return Some(value.clone());
                }
            }
            current = env.parent.clone();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_and_lookup() {
        let env = Environment::new();
        env.define(Rc::from("x"), Value::Int(42));
        match env.lookup("x") {
            Some(Value::Int(n)) => assert_eq!(n, 42),
            _ => panic!("expected Int(42)"),
        }
    }

    #[test]
    fn test_missing_binding() {
        let env = Environment::new();
        assert!(env.lookup("missing").is_none());
    }

    #[test]
    fn test_shadowing_leaves_parent_untouched() {
        let parent = Environment::new();
        parent.define(Rc::from("x"), Value::Int(1));
        let child = Environment::with_parent(&parent);
        child.define(Rc::from("x"), Value::Int(2));
        assert!(matches!(child.lookup("x"), Some(Value::Int(2))));
        assert!(matches!(parent.lookup("x"), Some(Value::Int(1))));
    }

    #[test]
    fn test_lookup_walks_all_ancestors() {
        let grandparent = Environment::new();
        grandparent.define(Rc::from("a"), Value::Int(1));
        let parent = Environment::with_parent(&grandparent);
        parent.define(Rc::from("b"), Value::Int(2));
        let child = Environment::with_parent(&parent);
        assert!(matches!(child.lookup("a"), Some(Value::Int(1))));
        assert!(matches!(child.lookup("b"), Some(Value::Int(2))));
        assert!(child.lookup("c").is_none());
    }

    #[test]
    fn test_keyed_lookup_walks_chain() {
        let key = Token::new();
        let other = Token::new();
        let base = Environment::new();
        let bound = Environment::with_keyed(&base, key.clone(), Value::Int(7));
        let child = Environment::with_parent(&bound);
        assert!(matches!(child.keyed_lookup(&key), Some(Value::Int(7))));
        assert!(child.keyed_lookup(&other).is_none());
        assert!(base.keyed_lookup(&key).is_none());
    }

    #[test]
    fn test_shared_parent_sees_later_definitions() {
        let parent = Environment::new();
        let left = Environment::with_parent(&parent);
        let right = Environment::with_parent(&parent);
        parent.define(Rc::from("late"), Value::Int(9));
        assert!(matches!(left.lookup("late"), Some(Value::Int(9))));
        assert!(matches!(right.lookup("late"), Some(Value::Int(9))));
    }
}
