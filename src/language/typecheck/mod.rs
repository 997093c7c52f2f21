use crate::language::types::Type;
use std::collections::HashMap;

#[derive(Clone, Debug)]
struct FunctionSignature {
    params: Vec<Type>,
    required: usize,
    returns: Type,
}

impl FunctionSignature {
    fn accepts_arity(&self, count: usize) -> bool {
        count >= self.required && count <= self.params.len()
    }
}

#[derive(Clone, Debug)]
struct ReturnContext {
    name: String,
    returns: Type,
}

/// Nested name → type scopes, innermost last.
struct Scopes {
    scopes: Vec<HashMap<String, Type>>,
}

impl Scopes {
    fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()],
        }
    }

    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Returns false when the name already exists in the innermost scope.
    fn declare(&mut self, name: &str, ty: Type) -> bool {
        let Some(scope) = self.scopes.last_mut() else {
            return false;
        };
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), ty);
        true
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}

mod checker;

pub use checker::analyze;

#[cfg(test)]
mod tests;
