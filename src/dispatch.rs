//! Event dispatcher: walks one unit's model and invokes registered handlers.
//!
//! Order for a unit: unit handlers once; each free function; each free
//! variable; then per class: class handlers, its methods, its members.
//! Within a slot, handlers run in registration order.

use crate::generate::GenContext;
use crate::model::{Class, Function, Unit, Variable};
use log::debug;
use std::fmt;

/// Called once per unit, before any entity.
pub trait UnitHandler {
    fn name(&self) -> &str;
    fn on_unit(&self, ctx: &mut GenContext, unit: &Unit);
}

/// Called for each free function.
pub trait FunctionHandler {
    fn name(&self) -> &str;
    fn on_function(&self, ctx: &mut GenContext, function: &Function);
}

/// Called for each free (or static member) variable.
pub trait VariableHandler {
    fn name(&self) -> &str;
    fn on_variable(&self, ctx: &mut GenContext, variable: &Variable);
}

pub trait ClassHandler {
    fn name(&self) -> &str;
    fn on_class(&self, ctx: &mut GenContext, class: &Class);
}

/// Called for each method and constructor, with the owning class.
pub trait MethodHandler {
    fn name(&self) -> &str;
    fn on_method(&self, ctx: &mut GenContext, class: &Class, method: &Function);
}

/// Called for each field, with the owning class.
pub trait MemberHandler {
    fn name(&self) -> &str;
    fn on_member(&self, ctx: &mut GenContext, class: &Class, member: &Variable);
}

/// Handler slot, one per entity kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Unit,
    Function,
    Variable,
    Class,
    Method,
    Member,
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Slot::Unit => "unit",
            Slot::Function => "function",
            Slot::Variable => "variable",
            Slot::Class => "class",
            Slot::Method => "method",
            Slot::Member => "member",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
pub struct Dispatcher {
    units: Vec<Box<dyn UnitHandler>>,
    functions: Vec<Box<dyn FunctionHandler>>,
    variables: Vec<Box<dyn VariableHandler>>,
    classes: Vec<Box<dyn ClassHandler>>,
    methods: Vec<Box<dyn MethodHandler>>,
    members: Vec<Box<dyn MemberHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_unit_handler(&mut self, handler: impl UnitHandler + 'static) -> &mut Self {
        self.units.push(Box::new(handler));
        self
    }

    pub fn add_function_handler(&mut self, handler: impl FunctionHandler + 'static) -> &mut Self {
        self.functions.push(Box::new(handler));
        self
    }

    pub fn add_variable_handler(&mut self, handler: impl VariableHandler + 'static) -> &mut Self {
        self.variables.push(Box::new(handler));
        self
    }

    pub fn add_class_handler(&mut self, handler: impl ClassHandler + 'static) -> &mut Self {
        self.classes.push(Box::new(handler));
        self
    }

    pub fn add_method_handler(&mut self, handler: impl MethodHandler + 'static) -> &mut Self {
        self.methods.push(Box::new(handler));
        self
    }

    pub fn add_member_handler(&mut self, handler: impl MemberHandler + 'static) -> &mut Self {
        self.members.push(Box::new(handler));
        self
    }

    /// Registered handlers as `(slot, name)`, in dispatch order.
    pub fn handler_names(&self) -> Vec<(Slot, &str)> {
        let mut names = Vec::new();
        names.extend(self.units.iter().map(|h| (Slot::Unit, h.name())));
        names.extend(self.functions.iter().map(|h| (Slot::Function, h.name())));
        names.extend(self.variables.iter().map(|h| (Slot::Variable, h.name())));
        names.extend(self.classes.iter().map(|h| (Slot::Class, h.name())));
        names.extend(self.methods.iter().map(|h| (Slot::Method, h.name())));
        names.extend(self.members.iter().map(|h| (Slot::Member, h.name())));
        names
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
            && self.functions.is_empty()
            && self.variables.is_empty()
            && self.classes.is_empty()
            && self.methods.is_empty()
            && self.members.is_empty()
    }

    pub fn dispatch(&self, ctx: &mut GenContext, unit: &Unit) {
        debug!(
            "dispatching {} ({} classes, {} functions, {} variables)",
            unit.path.display(),
            unit.classes.len(),
            unit.functions.len(),
            unit.variables.len()
        );

        for handler in &self.units {
            handler.on_unit(ctx, unit);
        }
        for function in &unit.functions {
            for handler in &self.functions {
                handler.on_function(ctx, function);
            }
        }
        for variable in &unit.variables {
            for handler in &self.variables {
                handler.on_variable(ctx, variable);
            }
        }
        for class in &unit.classes {
            for handler in &self.classes {
                handler.on_class(ctx, class);
            }
            for method in &class.functions {
                for handler in &self.methods {
                    handler.on_method(ctx, class, method);
                }
            }
            for member in &class.variables {
                for handler in &self.members {
                    handler.on_member(ctx, class, member);
                }
            }
        }
    }
}
