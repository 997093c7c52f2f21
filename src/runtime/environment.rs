use crate::runtime::value::Value;
use std::collections::HashMap;

#[derive(Clone, Default)]
struct Scope {
    bindings: HashMap<String, Value>,
}

/// Scopes hidden from a running call, restored by `leave_call`.
pub struct CallFrame {
    depth: usize,
    hidden: Vec<Scope>,
}

/// Stack of value scopes. Cloning takes an independent snapshot; array
/// values inside still share their storage.
#[derive(Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
        if self.scopes.is_empty() {
            self.scopes.push(Scope::default());
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Hides every scope above `depth` and opens a fresh scope for a call,
    /// so the callee resolves names lexically rather than through its caller.
    pub fn enter_call(&mut self, depth: usize) -> CallFrame {
        let depth = depth.clamp(1, self.scopes.len());
        let hidden = self.scopes.split_off(depth);
        self.scopes.push(Scope::default());
        CallFrame { depth, hidden }
    }

    pub fn leave_call(&mut self, frame: CallFrame) {
        self.scopes.truncate(frame.depth);
        self.scopes.extend(frame.hidden);
    }

    /// Binds `name` in the innermost scope, replacing any binding it already
    /// holds there.
    pub fn declare(&mut self, name: &str, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.bindings.insert(name.to_string(), value);
        }
    }

    /// Rebinds the innermost visible `name`. Returns false if it is not
    /// declared anywhere.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        for scope in self.scopes.iter_mut().rev() {
            if let Some(slot) = scope.bindings.get_mut(name) {
                *slot = value;
                return true;
            }
        }
        false
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(name).cloned())
    }
}
