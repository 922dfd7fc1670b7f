use std::collections::HashMap;

use crate::prelude::{Type, YulString};

/// Index of a scope in a [`Scopes`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(usize);

/// What a name resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Variable { ty: Type },
    Label,
    Function { arguments: Vec<Type>, returns: Vec<Type> },
}

/// A resolved declaration: the scope it lives in and its name. Unique
/// across one analysed tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclarationId {
    pub scope: ScopeId,
    pub name: YulString,
}

#[derive(Debug, Default)]
pub struct Scope {
    pub super_scope: Option<ScopeId>,
    /// Set for the scope holding a function's parameters. Lookups that
    /// pass through it can no longer see outer variables.
    pub function_scope: bool,
    symbols: HashMap<YulString, Symbol>,
    variables: usize,
}

#[derive(Debug, Default)]
pub struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub fn new_scope(&mut self, super_scope: Option<ScopeId>, function_scope: bool) -> ScopeId {
        self.scopes.push(Scope {
            super_scope,
            function_scope,
            ..Default::default()
        });
        ScopeId(self.scopes.len() - 1)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    /// Registers `name` in `scope`. Returns `false` if it is already
    /// declared there.
    pub fn register(&mut self, scope: ScopeId, name: YulString, symbol: Symbol) -> bool {
        let scope = &mut self.scopes[scope.0];
        if scope.symbols.contains_key(&name) {
            return false;
        }
        if matches!(symbol, Symbol::Variable { .. }) {
            scope.variables += 1;
        }
        scope.symbols.insert(name, symbol);
        true
    }

    /// Resolves `name` starting at `scope`. Variables declared outside the
    /// innermost enclosing function are invisible.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(DeclarationId, &Symbol)> {
        let mut crossed_function = false;
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if let Some((key, symbol)) = scope.symbols.get_key_value(name) {
                if crossed_function && matches!(symbol, Symbol::Variable { .. }) {
                    return None;
                }
                let declaration = DeclarationId {
                    scope: id,
                    name: key.clone(),
                };
                return Some((declaration, symbol));
            }
            crossed_function |= scope.function_scope;
            current = scope.super_scope;
        }
        None
    }

    /// Whether `name` is declared in `scope` or any scope around it,
    /// ignoring function boundaries.
    pub fn exists(&self, scope: ScopeId, name: &str) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if scope.symbols.contains_key(name) {
                return true;
            }
            current = scope.super_scope;
        }
        false
    }

    pub fn number_of_variables(&self, scope: ScopeId) -> usize {
        self.get(scope).variables
    }

    pub fn inside_function(&self, scope: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if scope.function_scope {
                return true;
            }
            current = scope.super_scope;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable() -> Symbol {
        Symbol::Variable { ty: Type::default() }
    }

    #[test]
    fn lookup_walks_outwards() {
        let mut scopes = Scopes::default();
        let outer = scopes.new_scope(None, false);
        let inner = scopes.new_scope(Some(outer), false);
        assert!(scopes.register(outer, "x".into(), variable()));
        assert!(!scopes.register(outer, "x".into(), variable()));
        let (declaration, _) = scopes.lookup(inner, "x").unwrap();
        assert_eq!(declaration.scope, outer);
        assert!(scopes.lookup(inner, "y").is_none());
        assert_eq!(scopes.number_of_variables(outer), 1);
        assert_eq!(scopes.number_of_variables(inner), 0);
    }

    #[test]
    fn functions_hide_outer_variables_but_not_functions() {
        let mut scopes = Scopes::default();
        let outer = scopes.new_scope(None, false);
        let parameters = scopes.new_scope(Some(outer), true);
        let body = scopes.new_scope(Some(parameters), false);
        scopes.register(outer, "x".into(), variable());
        scopes.register(
            outer,
            "f".into(),
            Symbol::Function {
                arguments: vec![],
                returns: vec![],
            },
        );
        scopes.register(parameters, "a".into(), variable());
        assert!(scopes.lookup(body, "x").is_none());
        assert!(scopes.lookup(body, "a").is_some());
        assert!(scopes.lookup(body, "f").is_some());
        assert!(scopes.exists(body, "x"));
        assert!(scopes.inside_function(body));
        assert!(!scopes.inside_function(outer));
    }
}
