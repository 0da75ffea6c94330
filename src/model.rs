//! Data model for annotated declarations.

use std::path::PathBuf;

/// One `key` or `key=value` token of an annotation directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

/// A property value is either plain text or a `{ ... }` group of properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Group(Vec<Property>),
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Text(value.into()),
        }
    }

    /// Text value, or `None` for a group.
    pub fn text(&self) -> Option<&str> {
        match &self.value {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Group(_) => None,
        }
    }

    /// Nested properties, or `None` for plain text.
    pub fn group(&self) -> Option<&[Property]> {
        match &self.value {
            PropertyValue::Group(items) => Some(items),
            PropertyValue::Text(_) => None,
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        PropertyValue::Text(String::new())
    }
}

/// Find the first property with the given name.
pub fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name == name)
}

/// Attributes shared by every entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    /// Simple identifier
    pub name: String,
    /// Fully qualified identifier, used when emitting code
    pub full_namespace: String,
    /// Originating unit
    pub path: PathBuf,
    /// Directive properties; the first entry carries the triggering keyword
    pub properties: Vec<Property>,
}

impl Object {
    pub fn property(&self, name: &str) -> Option<&Property> {
        find_property(&self.properties, name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }
}

/// A field, parameter or free variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub object: Object,
    /// Type as spelled in the source
    pub ty: String,
}

impl Variable {
    pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object: Object {
                name: name.into(),
                ..Default::default()
            },
            ty: ty.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }
}

impl Default for Variable {
    fn default() -> Self {
        Self::new("int", "")
    }
}

/// A method, constructor or free function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub object: Object,
    pub return_type: String,
    /// Unique by name (unnamed ones excepted), in declaration order
    pub parameters: Vec<Variable>,
    pub is_constructor: bool,
}

impl Function {
    pub fn new(return_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            object: Object {
                name: name.into(),
                ..Default::default()
            },
            return_type: return_type.into(),
            parameters: Vec::new(),
            is_constructor: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.object.name
    }

    /// Append a parameter unless one with the same name already exists.
    ///
    /// Unnamed parameters (`void f(int, int)`) are always appended.
    pub fn add_parameter(&mut self, parameter: Variable) {
        if !parameter.name().is_empty()
            && self.parameters.iter().any(|p| p.name() == parameter.name())
        {
            return;
        }
        self.parameters.push(parameter);
    }
}

impl Default for Function {
    fn default() -> Self {
        Self::new("void", "")
    }
}

/// An annotated class, struct or union.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Class {
    pub object: Object,
    /// Fields
    pub variables: Vec<Variable>,
    /// Methods and constructors
    pub functions: Vec<Function>,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.object.name
    }
}

/// Everything extracted from one input file.
#[derive(Debug, Clone, Default)]
pub struct Unit {
    pub path: PathBuf,
    pub classes: Vec<Class>,
    pub functions: Vec<Function>,
    pub variables: Vec<Variable>,
    /// Parameters seen with no open function (function-pointer types)
    pub skipped_parameters: usize,
}

impl Unit {
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.functions.is_empty() && self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_parameter_is_ignored() {
        let mut func = Function::new("void", "f");
        func.add_parameter(Variable::new("int", "a"));
        func.add_parameter(Variable::new("float", "a"));
        assert_eq!(func.parameters.len(), 1);
        assert_eq!(func.parameters[0].ty, "int");
    }

    #[test]
    fn unnamed_parameters_are_all_kept() {
        let mut func = Function::new("void", "Vec");
        func.add_parameter(Variable::new("float", ""));
        func.add_parameter(Variable::new("float", ""));
        func.add_parameter(Variable::new("int", "n"));
        func.add_parameter(Variable::new("int", "n"));
        let types: Vec<&str> = func.parameters.iter().map(|p| p.ty.as_str()).collect();
        assert_eq!(types, vec!["float", "float", "int"]);
    }

    #[test]
    fn defaults_match_cpp_conventions() {
        assert_eq!(Variable::default().ty, "int");
        assert_eq!(Function::default().return_type, "void");
        assert!(!Function::default().is_constructor);
    }

    #[test]
    fn property_lookup() {
        let obj = Object {
            properties: vec![Property::new("CGCLASS", ""), Property::new("LuaClass", "")],
            ..Default::default()
        };
        assert!(obj.has_property("LuaClass"));
        assert!(!obj.has_property("Reflect"));
        assert_eq!(obj.property("CGCLASS").and_then(Property::text), Some(""));
    }
}
