
use std::collections::{HashMap, HashSet};

use crate::scheme::Scheme;

/// Deduplicates symbol nodes so that variable lookup and `eq?` can compare
/// symbols by identity. One table lives as long as its interpreter.
pub struct SymbolTable {
    table: HashMap<String, Scheme>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            table: HashMap::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// The canonical symbol spelled `name`, created on first use.
    pub fn intern(&mut self, name: &str) -> Scheme {
        if let Some(symbol) = self.table.get(name) {
            return symbol.clone();
        }
        let symbol = Scheme::symbol(name);
        self.table.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// The canonical node for an existing symbol node. A spelling seen for
    /// the first time adopts `symbol` itself as canonical.
    fn canonical(&mut self, symbol: &Scheme) -> Scheme {
        let name = match symbol.as_symbol() {
            Some(name) => name,
            None => return symbol.clone(),
        };
        if let Some(existing) = self.table.get(name) {
            return existing.clone();
        }
        self.table.insert(name.to_string(), symbol.clone());
        symbol.clone()
    }

    /// Rewrite every symbol reachable from `expr` through pairs to its
    /// canonical node, in place. Shared and cyclic structure is visited once.
    pub fn intern_tree(&mut self, expr: &Scheme) -> Scheme {
        if expr.as_symbol().is_some() {
            return self.canonical(expr);
        }

        let mut visited = HashSet::new();
        let mut pending = vec![expr.clone()];
        while let Some(node) = pending.pop() {
            let (car, cdr) = match node.as_pair_mut() {
                Some(cells) => cells,
                None => continue,
            };
            if !visited.insert(node.as_ptr()) {
                continue;
            }
            for cell in &[car, cdr] {
                let child = cell.borrow().clone();
                if child.as_symbol().is_some() {
                    let canonical = self.canonical(&child);
                    if !canonical.is(&child) {
                        *cell.borrow_mut() = canonical;
                    }
                } else if child.as_pair().is_some() {
                    pending.push(child);
                }
            }
        }
        expr.clone()
    }
}
