use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use anyhow::{bail, Result};

use super::object::Object;

/// One lexical scope. Scopes are shared between call frames and the closures
/// created inside them, so they always live behind `Rc<RefCell<_>>`.
#[derive(Default)]
pub struct Environment {
    store: HashMap<String, Object>,
    outer: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment::default()))
    }

    pub fn new_enclosed_environment(outer: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            store: HashMap::new(),
            outer: Some(outer),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Object> {
        match self.store.get(name) {
            Some(value) => Some(value.clone()),
            None => match &self.outer {
                Some(outer) => outer.borrow().get(name),
                None => None,
            },
        }
    }

    /// Declares `name` in this scope, shadowing any outer binding.
    pub fn set(&mut self, name: &str, value: Object) {
        self.store.insert(name.to_string(), value);
    }

    /// Rebinds the nearest existing `name`, searching outward.
    pub fn assign(&mut self, name: &str, value: Object) -> Result<()> {
        if let Some(slot) = self.store.get_mut(name) {
            *slot = value;
            return Ok(());
        }
        match &self.outer {
            Some(outer) => outer.borrow_mut().assign(name, value),
            None => bail!("cannot assign to undeclared identifier: {}", name),
        }
    }
}

// Function values hold their environment, so a derived Debug would recurse
// through every closure stored in scope.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut names: Vec<&String> = self.store.keys().collect();
        names.sort();
        f.debug_struct("Environment")
            .field("names", &names)
            .field("enclosed", &self.outer.is_some())
            .finish()
    }
}
