// ABOUTME: First-class continuations, guard frames, and the abnormal pass

use std::rc::Rc;

use crate::env::Environment;
use crate::eval::Step;
use crate::value::{Combiner, Operative, Pair, Token, Value};

/// An entry or exit guard: the interceptor fires only when the other
/// end of an abnormal pass lies within the selector's subtree.
#[derive(Clone)]
pub struct Guard {
    pub selector: Rc<Continuation>,
    pub interceptor: Rc<Combiner>,
}

/// A continuation frame. Frames form a tree rooted at the
/// interpreter's root continuation; reified continuations share
/// prefixes freely. `call_info` remembers the expression a non-tail
/// frame is waiting on, for the stack-trace printer.
pub struct Continuation {
    pub handler: Handler,
    pub parent: Option<Rc<Continuation>>,
    pub entry_guards: Vec<Guard>,
    pub exit_guards: Vec<Guard>,
    pub dynamic: Option<(Token, Value)>,
    pub call_info: Option<Value>,
}

impl Continuation {
    fn base(handler: Handler, parent: Option<Rc<Continuation>>) -> Continuation {
        Continuation {
            handler,
            parent,
            entry_guards: Vec::new(),
            exit_guards: Vec::new(),
            dynamic: None,
            call_info: None,
        }
    }

    /// The sentinel that terminates evaluation.
    pub fn root() -> Rc<Continuation> {
        Rc::new(Continuation::base(Handler::Root, None))
    }

    pub fn new(handler: Handler, parent: &Rc<Continuation>) -> Rc<Continuation> {
        Rc::new(Continuation::base(handler, Some(parent.clone())))
    }

    pub fn with_info(handler: Handler, parent: &Rc<Continuation>, info: Value) -> Rc<Continuation> {
        let mut cont = Continuation::base(handler, Some(parent.clone()));
        cont.call_info = Some(info);
        Rc::new(cont)
    }

    pub fn with_dynamic(
        handler: Handler,
        parent: &Rc<Continuation>,
        key: Token,
        value: Value,
    ) -> Rc<Continuation> {
        let mut cont = Continuation::base(handler, Some(parent.clone()));
        cont.dynamic = Some((key, value));
        Rc::new(cont)
    }

    pub fn with_guards(
        handler: Handler,
        parent: &Rc<Continuation>,
        entry_guards: Vec<Guard>,
        exit_guards: Vec<Guard>,
    ) -> Rc<Continuation> {
        let mut cont = Continuation::base(handler, Some(parent.clone()));
        cont.entry_guards = entry_guards;
        cont.exit_guards = exit_guards;
        Rc::new(cont)
    }
}

impl Drop for Continuation {
    fn drop(&mut self) {
        // Unlink parent chains iteratively; dropping a deep reified
        // continuation must not recurse.
        let mut parent = self.parent.take();
        while let Some(cont) = parent {
            match Rc::try_unwrap(cont) {
                Ok(mut inner) => parent = inner.parent.take(),
                Err(_) => break,
            }
        }
    }
}

/// What a frame does with the value returned to it. Primitive control
/// steps carry their state here instead of in fake environments.
pub enum Handler {
    /// Terminates evaluation; only the root frame carries this.
    Root,
    /// Returns the value unchanged to the parent.
    Passthrough,
    /// The car of a combiner call finished evaluating; check it and
    /// start the argument-evaluation protocol.
    Combine {
        env: Rc<Environment>,
        operands: Value,
    },
    /// One operand position finished evaluating.
    Argument {
        state: Rc<ArgState>,
        index: usize,
        wraps_left: u32,
    },
    /// The condition of `$if` finished evaluating.
    Branch {
        env: Rc<Environment>,
        consequent: Value,
        alternative: Value,
    },
    /// The value of `$define!` finished evaluating; match the pattern.
    Define {
        env: Rc<Environment>,
        pattern: Value,
    },
    /// The environment argument of `$binds?` finished evaluating.
    Binds { name: Rc<str> },
    /// Sequential evaluation of the remaining expressions of `load`,
    /// yielding Inert once exhausted.
    Sequence {
        env: Rc<Environment>,
        rest: Value,
    },
    /// Invoke an operative with the incoming value as its operand;
    /// installed by `extend-continuation` and the keyed binders.
    Invoke {
        env: Rc<Environment>,
        operative: Rc<Operative>,
    },
    /// Transfer the value to another continuation without consulting
    /// guards; plumbing between interceptor links.
    Jump { target: Rc<Continuation> },
    /// Apply one guard interceptor to the value in flight.
    Intercept {
        interceptor: Rc<Combiner>,
        outer: Rc<Continuation>,
    },
}

/// Shared state of one applicative call's argument evaluation: the
/// isomorphic operand copy and its pairs in evaluation order.
pub struct ArgState {
    pub env: Rc<Environment>,
    pub operative: Rc<Operative>,
    pub args: Value,
    pub order: Vec<Rc<Pair>>,
}

fn depth(cont: &Rc<Continuation>) -> usize {
    let mut n = 0;
    let mut current = cont.parent.clone();
    while let Some(cont) = current {
        n += 1;
        current = cont.parent.clone();
    }
    n
}

/// Whether `descendant` lies within the subtree rooted at `ancestor`.
pub fn contains(ancestor: &Rc<Continuation>, descendant: &Rc<Continuation>) -> bool {
    let mut current = descendant.clone();
    loop {
        if Rc::ptr_eq(&current, ancestor) {
            return true;
        }
        match current.parent.clone() {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Transfers `value` from `source` to `destination` along the
/// continuation tree. Exit guards are collected walking source to the
/// common ancestor, entry guards walking the ancestor down to the
/// destination; each fires only when the selector's subtree holds the
/// opposite end. The interceptors run in that order, each feeding the
/// next, and the final value reaches the destination.
pub fn abnormal_pass(
    source: &Rc<Continuation>,
    destination: &Rc<Continuation>,
    value: Value,
) -> Step {
    let mut exits: Vec<(Rc<Continuation>, Guard)> = Vec::new();
    let mut entries: Vec<(Rc<Continuation>, Guard)> = Vec::new();
    let mut from = source.clone();
    let mut to = destination.clone();
    let mut from_depth = depth(&from);
    let mut to_depth = depth(&to);
    while !Rc::ptr_eq(&from, &to) {
        if from_depth > to_depth {
            if let Some(guard) = from
                .exit_guards
                .iter()
                .find(|guard| contains(&guard.selector, destination))
            {
                exits.push((from.clone(), guard.clone()));
            }
            let parent = from.parent.clone().expect("frames above the root have parents");
            from = parent;
            from_depth -= 1;
        } else {
            if let Some(guard) = to
                .entry_guards
                .iter()
                .find(|guard| contains(&guard.selector, source))
            {
                entries.push((to.clone(), guard.clone()));
            }
            let parent = to.parent.clone().expect("frames above the root have parents");
            to = parent;
            to_depth -= 1;
        }
    }
    entries.reverse();

    // Build the interceptor chain back to front so the last link
    // delivers to the destination.
    let mut chain: Vec<(Rc<Continuation>, Guard, bool)> = Vec::new();
    chain.extend(exits.into_iter().map(|(frame, guard)| (frame, guard, true)));
    chain.extend(entries.into_iter().map(|(frame, guard)| (frame, guard, false)));
    let mut target = destination.clone();
    for (frame, guard, is_exit) in chain.into_iter().rev() {
        let outer = if is_exit {
            frame.parent.clone().expect("guarded frames have parents")
        } else {
            frame
        };
        let jump = Continuation::new(Handler::Jump { target }, &outer);
        target = Continuation::new(
            Handler::Intercept {
                interceptor: guard.interceptor,
                outer,
            },
            &jump,
        );
    }
    Step::Return {
        value,
        cont: target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_walks_ancestry() {
        let root = Continuation::root();
        let child = Continuation::new(Handler::Passthrough, &root);
        let grandchild = Continuation::new(Handler::Passthrough, &child);
        assert!(contains(&root, &grandchild));
        assert!(contains(&child, &grandchild));
        assert!(contains(&grandchild, &grandchild));
        assert!(!contains(&grandchild, &child));
        let sibling = Continuation::new(Handler::Passthrough, &root);
        assert!(!contains(&child, &sibling));
    }

    #[test]
    fn test_pass_without_guards_reaches_destination() {
        let root = Continuation::root();
        let child = Continuation::new(Handler::Passthrough, &root);
        let deep = Continuation::new(Handler::Passthrough, &child);
        let step = abnormal_pass(&deep, &root, Value::Int(5));
        match step {
            Step::Return { value, cont } => {
                assert!(matches!(value, Value::Int(5)));
                assert!(Rc::ptr_eq(&cont, &root));
            }
            _ => panic!("expected a return step"),
        }
    }

    #[test]
    fn test_deep_chain_drops_without_overflow() {
        let mut cont = Continuation::root();
        for _ in 0..200_000 {
            cont = Continuation::new(Handler::Passthrough, &cont);
        }
        drop(cont);
    }
}
