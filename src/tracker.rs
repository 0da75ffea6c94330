//! Declaration scope tracker.
//!
//! Folds a depth-first declaration event stream into a [`Unit`]. Classes live
//! in an arena addressed by index; the open classes and the functions under
//! construction are explicit stacks. A function is attached to its owner (the
//! unit, or the class that was open when it started) when its subtree ends.

use crate::directive::{self, Keyword};
use crate::model::{Class, Function, Object, Unit, Variable};
use crate::source::{DeclEvent, DeclKind, Declaration};
use log::trace;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structural errors in a declaration stream. Any of them aborts the unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TrackError {
    /// Annotated field with no open annotated class
    #[error("member '{name}' in {} is annotated but its class is not", file.display())]
    OrphanMember {
        /// Qualified name of the field
        name: String,
        /// Originating file
        file: PathBuf,
    },

    /// Annotated method or constructor with no open annotated class
    #[error("method '{name}' in {} is annotated but its class is not", file.display())]
    OrphanMethod {
        /// Qualified name of the method
        name: String,
        /// Originating file
        file: PathBuf,
    },

    /// Function declaration while another function is still open
    #[error("function '{name}' in {} is nested inside function '{outer}'", file.display())]
    NestedFunction {
        /// Qualified name of the inner function
        name: String,
        /// Qualified name of the open function
        outer: String,
        /// Originating file
        file: PathBuf,
    },

    /// Exit event with nothing open
    #[error("declaration stream closed a scope that was never opened")]
    UnbalancedExit,

    /// Stream ended with scopes still open
    #[error("declaration stream ended with {open} open scope(s)")]
    UnclosedScope {
        /// Number of unmatched Enter events
        open: usize,
    },
}

/// What an Enter event pushed, undone by the matching Exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Passive,
    Class,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Owner {
    Unit,
    Class(usize),
}

/// Assembles one unit's annotated entities.
#[derive(Debug)]
pub struct ScopeTracker {
    unit: PathBuf,
    classes: Vec<Class>,
    functions: Vec<Function>,
    variables: Vec<Variable>,
    class_stack: Vec<usize>,
    function_stack: Vec<(Function, Owner)>,
    frames: Vec<Frame>,
    /// Depth inside a subtree being skipped; 0 when not skipping
    skip_depth: usize,
    skipped_parameters: usize,
}

impl ScopeTracker {
    /// Declarations whose file is not `unit` are skipped with their subtree.
    pub fn new(unit: impl Into<PathBuf>) -> Self {
        Self {
            unit: unit.into(),
            classes: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            class_stack: Vec::new(),
            function_stack: Vec::new(),
            frames: Vec::new(),
            skip_depth: 0,
            skipped_parameters: 0,
        }
    }

    /// Track a whole stream and return the assembled unit.
    pub fn track(
        unit: &Path,
        events: impl IntoIterator<Item = DeclEvent>,
    ) -> Result<Unit, TrackError> {
        let mut tracker = Self::new(unit);
        for event in events {
            tracker.handle(event)?;
        }
        tracker.finish()
    }

    pub fn handle(&mut self, event: DeclEvent) -> Result<(), TrackError> {
        match event {
            DeclEvent::Enter(decl) => self.enter(decl),
            DeclEvent::Exit => self.exit(),
        }
    }

    /// Number of classes currently open.
    pub fn open_classes(&self) -> usize {
        self.class_stack.len()
    }

    /// Number of functions currently under construction.
    pub fn open_functions(&self) -> usize {
        self.function_stack.len()
    }

    pub fn finish(self) -> Result<Unit, TrackError> {
        let open = self.frames.len() + self.skip_depth;
        if open > 0 {
            return Err(TrackError::UnclosedScope { open });
        }
        Ok(Unit {
            path: self.unit,
            classes: self.classes,
            functions: self.functions,
            variables: self.variables,
            skipped_parameters: self.skipped_parameters,
        })
    }

    fn enter(&mut self, decl: Declaration) -> Result<(), TrackError> {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return Ok(());
        }
        if decl.file != self.unit {
            trace!("{} skipped, declared in {}", decl.qualified_name, decl.file.display());
            self.skip_depth = 1;
            return Ok(());
        }

        let frame = match decl.kind {
            DeclKind::Namespace => Frame::Passive,
            DeclKind::Record => {
                let Some(object) = self.annotate(&decl, Keyword::Class) else {
                    return self.skip_subtree(&decl);
                };
                self.classes.push(Class {
                    object,
                    ..Default::default()
                });
                self.class_stack.push(self.classes.len() - 1);
                Frame::Class
            }
            DeclKind::Field => {
                let Some(object) = self.annotate(&decl, Keyword::Member) else {
                    return self.skip_subtree(&decl);
                };
                let Some(&class) = self.class_stack.last() else {
                    return Err(TrackError::OrphanMember {
                        name: decl.qualified_name,
                        file: decl.file,
                    });
                };
                self.classes[class].variables.push(Variable {
                    object,
                    ty: decl.type_spelling(),
                });
                Frame::Passive
            }
            DeclKind::Method | DeclKind::Constructor => {
                let constructor = decl.kind == DeclKind::Constructor;
                let keyword = if constructor {
                    Keyword::Constructor
                } else {
                    Keyword::Method
                };
                let Some(object) = self.annotate(&decl, keyword) else {
                    return self.skip_subtree(&decl);
                };
                let Some(&class) = self.class_stack.last() else {
                    return Err(TrackError::OrphanMethod {
                        name: decl.qualified_name,
                        file: decl.file,
                    });
                };
                let function = if constructor {
                    Function {
                        object,
                        return_type: "void".to_string(),
                        parameters: Vec::new(),
                        is_constructor: true,
                    }
                } else {
                    Function {
                        object,
                        return_type: decl.type_spelling(),
                        parameters: Vec::new(),
                        is_constructor: false,
                    }
                };
                self.open_function(&decl, function, Owner::Class(class))?
            }
            DeclKind::Function => {
                let Some(object) = self.annotate(&decl, Keyword::Function) else {
                    return self.skip_subtree(&decl);
                };
                let function = Function {
                    object,
                    return_type: decl.type_spelling(),
                    parameters: Vec::new(),
                    is_constructor: false,
                };
                self.open_function(&decl, function, Owner::Unit)?
            }
            DeclKind::Parameter => {
                match self.function_stack.last_mut() {
                    Some((function, _)) => function.add_parameter(Variable {
                        object: Object {
                            name: decl.name.clone(),
                            full_namespace: decl.qualified_name.clone(),
                            path: self.unit.clone(),
                            properties: Vec::new(),
                        },
                        ty: decl.type_spelling(),
                    }),
                    // Parameters of function-pointer types have no function.
                    None => self.skipped_parameters += 1,
                }
                Frame::Passive
            }
            DeclKind::Variable => {
                let Some(object) = self.annotate(&decl, Keyword::Variable) else {
                    return self.skip_subtree(&decl);
                };
                self.variables.push(Variable {
                    object,
                    ty: decl.type_spelling(),
                });
                Frame::Passive
            }
        };

        trace!("enter {:?} {}", decl.kind, decl.qualified_name);
        self.frames.push(frame);
        Ok(())
    }

    fn exit(&mut self) -> Result<(), TrackError> {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return Ok(());
        }
        match self.frames.pop() {
            None => Err(TrackError::UnbalancedExit),
            Some(Frame::Passive) => Ok(()),
            Some(Frame::Class) => {
                self.class_stack.pop();
                Ok(())
            }
            Some(Frame::Function) => {
                if let Some((function, owner)) = self.function_stack.pop() {
                    match owner {
                        Owner::Unit => self.functions.push(function),
                        Owner::Class(class) => self.classes[class].functions.push(function),
                    }
                }
                Ok(())
            }
        }
    }

    fn open_function(
        &mut self,
        decl: &Declaration,
        function: Function,
        owner: Owner,
    ) -> Result<Frame, TrackError> {
        if let Some((outer, _)) = self.function_stack.last() {
            return Err(TrackError::NestedFunction {
                name: decl.qualified_name.clone(),
                outer: outer.object.full_namespace.clone(),
                file: decl.file.clone(),
            });
        }
        self.function_stack.push((function, owner));
        Ok(Frame::Function)
    }

    /// Unannotated declarations take their whole subtree with them.
    fn skip_subtree(&mut self, decl: &Declaration) -> Result<(), TrackError> {
        trace!("{} not annotated", decl.qualified_name);
        self.skip_depth = 1;
        Ok(())
    }

    fn annotate(&self, decl: &Declaration, keyword: Keyword) -> Option<Object> {
        let properties = directive::parse(&decl.line_above, keyword);
        if properties.is_empty() {
            return None;
        }
        Some(Object {
            name: decl.name.clone(),
            full_namespace: decl.qualified_name.clone(),
            path: self.unit.clone(),
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Property;

    const UNIT: &str = "/src/unit.h";

    fn decl_in(file: &str, kind: DeclKind, qualified: &str, above: &str, text: &str) -> DeclEvent {
        let name = qualified.rsplit("::").next().unwrap_or(qualified);
        DeclEvent::Enter(Declaration {
            kind,
            name: name.to_string(),
            qualified_name: qualified.to_string(),
            file: PathBuf::from(file),
            line: 2,
            line_above: above.to_string(),
            source_text: text.to_string(),
        })
    }

    fn decl(kind: DeclKind, qualified: &str, above: &str, text: &str) -> DeclEvent {
        decl_in(UNIT, kind, qualified, above, text)
    }

    fn exit() -> DeclEvent {
        DeclEvent::Exit
    }

    fn run(events: Vec<DeclEvent>) -> Result<Unit, TrackError> {
        ScopeTracker::track(Path::new(UNIT), events)
    }

    #[test]
    fn method_with_parameters_nests_under_class() {
        let events = vec![
            decl(DeclKind::Record, "Foo", "CGCLASS(LuaClass)", "class Foo"),
            decl(DeclKind::Method, "Foo::move", "CGMETHOD(LuaInspect)", "void move(float dx, int steps)"),
            decl(DeclKind::Parameter, "dx", "CGMEMBER(Ignored)", "float dx"),
            exit(),
            decl(DeclKind::Parameter, "steps", "", "int steps"),
            exit(),
            exit(),
            exit(),
        ];
        let mut tracker = ScopeTracker::new(UNIT);
        for event in events {
            tracker.handle(event).unwrap();
        }
        assert_eq!(tracker.open_classes(), 0);
        assert_eq!(tracker.open_functions(), 0);

        let unit = tracker.finish().unwrap();
        assert_eq!(unit.classes.len(), 1);
        let class = &unit.classes[0];
        assert_eq!(class.functions.len(), 1);
        let method = &class.functions[0];
        assert_eq!(method.name(), "move");
        assert_eq!(method.object.full_namespace, "Foo::move");
        assert_eq!(method.return_type, "void");
        assert_eq!(method.parameters.len(), 2);
        assert_eq!(method.parameters[0].ty, "float");
        assert!(method.parameters[0].object.properties.is_empty());
        assert_eq!(method.parameters[1].name(), "steps");
    }

    #[test]
    fn constructor_returns_void() {
        let unit = run(vec![
            decl(DeclKind::Record, "Foo", "CGCLASS()", "class Foo"),
            decl(DeclKind::Constructor, "Foo::Foo", "CGCONSTRUCTOR()", "explicit Foo(int x)"),
            decl(DeclKind::Parameter, "x", "", "int x"),
            exit(),
            exit(),
            exit(),
        ])
        .unwrap();
        let ctor = &unit.classes[0].functions[0];
        assert!(ctor.is_constructor);
        assert_eq!(ctor.return_type, "void");
        assert_eq!(ctor.parameters.len(), 1);
    }

    #[test]
    fn constructor_needs_its_own_keyword() {
        let unit = run(vec![
            decl(DeclKind::Record, "Foo", "CGCLASS()", "class Foo"),
            decl(DeclKind::Constructor, "Foo::Foo", "CGMETHOD()", "Foo()"),
            exit(),
            exit(),
        ])
        .unwrap();
        assert!(unit.classes[0].functions.is_empty());
    }

    #[test]
    fn member_records_type_and_properties() {
        let unit = run(vec![
            decl(DeclKind::Record, "game::Foo", "CGCLASS(LuaClass)", "class Foo"),
            decl(DeclKind::Field, "game::Foo::bar", "  CGMEMBER(LuaInspect, name = Bar)", "int bar"),
            exit(),
            exit(),
        ])
        .unwrap();
        let class = &unit.classes[0];
        assert_eq!(class.object.full_namespace, "game::Foo");
        assert_eq!(class.object.path, PathBuf::from(UNIT));
        let bar = &class.variables[0];
        assert_eq!(bar.ty, "int");
        assert_eq!(
            bar.object.properties,
            vec![
                Property::new("CGMEMBER", ""),
                Property::new("LuaInspect", ""),
                Property::new("name", "Bar"),
            ]
        );
    }

    #[test]
    fn unannotated_class_skips_its_subtree() {
        let unit = run(vec![
            decl(DeclKind::Record, "Plain", "", "class Plain"),
            decl(DeclKind::Field, "Plain::x", "CGMEMBER(LuaInspect)", "int x"),
            exit(),
            decl(DeclKind::Record, "Plain::Inner", "CGCLASS(LuaClass)", "class Inner"),
            exit(),
            exit(),
        ])
        .unwrap();
        assert!(unit.is_empty());
    }

    #[test]
    fn declarations_from_other_files_are_skipped() {
        let unit = run(vec![
            decl_in("/src/other.h", DeclKind::Record, "Other", "CGCLASS(LuaClass)", "class Other"),
            decl_in("/src/other.h", DeclKind::Field, "Other::x", "CGMEMBER()", "int x"),
            exit(),
            exit(),
            decl(DeclKind::Variable, "gravity", "CGVARIABLE(LuaInspect)", "extern float gravity"),
            exit(),
        ])
        .unwrap();
        assert!(unit.classes.is_empty());
        assert_eq!(unit.variables.len(), 1);
        assert_eq!(unit.variables[0].ty, "extern float");
    }

    #[test]
    fn free_function_goes_to_unit() {
        let unit = run(vec![
            decl(DeclKind::Namespace, "math", "", "namespace math"),
            decl(DeclKind::Function, "math::add", "CGFUNCTION(LuaInspect)", "static int add(int a, int b)"),
            decl(DeclKind::Parameter, "a", "", "int a"),
            exit(),
            decl(DeclKind::Parameter, "a", "", "int a"),
            exit(),
            exit(),
            exit(),
        ])
        .unwrap();
        assert_eq!(unit.functions.len(), 1);
        assert_eq!(unit.functions[0].return_type, "int");
        // duplicate parameter name
        assert_eq!(unit.functions[0].parameters.len(), 1);
    }

    #[test]
    fn unnamed_parameters_keep_their_arity() {
        let unit = run(vec![
            decl(DeclKind::Record, "Vec", "CGCLASS(LuaClass)", "class Vec"),
            decl(DeclKind::Constructor, "Vec::Vec", "CGCONSTRUCTOR(LuaInspect)", "Vec(float, float)"),
            decl(DeclKind::Parameter, "", "", "float"),
            exit(),
            decl(DeclKind::Parameter, "", "", "float"),
            exit(),
            exit(),
            exit(),
        ])
        .unwrap();
        let ctor = &unit.classes[0].functions[0];
        let types: Vec<&str> = ctor.parameters.iter().map(|p| p.ty.as_str()).collect();
        assert_eq!(types, vec!["float", "float"]);
    }

    #[test]
    fn parameters_without_function_are_counted() {
        let unit = run(vec![
            decl(DeclKind::Record, "Callbacks", "CGCLASS()", "struct Callbacks"),
            decl(DeclKind::Field, "Callbacks::on_hit", "CGMEMBER()", "void (*on_hit"),
            decl(DeclKind::Parameter, "damage", "", "int damage"),
            exit(),
            exit(),
            decl(DeclKind::Field, "Callbacks::on_miss", "", "void (*on_miss"),
            decl(DeclKind::Parameter, "reason", "", "int reason"),
            exit(),
            exit(),
            exit(),
        ])
        .unwrap();
        assert_eq!(unit.skipped_parameters, 1);
        assert_eq!(unit.classes[0].variables[0].ty, "void");
    }

    #[test]
    fn orphan_member_is_an_error() {
        let err = run(vec![
            decl(DeclKind::Field, "x", "CGMEMBER(LuaInspect)", "int x"),
            exit(),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            TrackError::OrphanMember {
                name: "x".to_string(),
                file: PathBuf::from(UNIT),
            }
        );
        assert!(err.to_string().contains("/src/unit.h"));
    }

    #[test]
    fn orphan_method_is_an_error() {
        let err = run(vec![
            decl(DeclKind::Method, "f", "CGMETHOD()", "void f()"),
            exit(),
        ])
        .unwrap_err();
        assert!(matches!(err, TrackError::OrphanMethod { .. }));
    }

    #[test]
    fn nested_function_is_an_error() {
        let err = run(vec![
            decl(DeclKind::Function, "outer", "CGFUNCTION()", "void outer()"),
            decl(DeclKind::Function, "inner", "CGFUNCTION()", "void inner()"),
            exit(),
            exit(),
        ])
        .unwrap_err();
        assert!(matches!(err, TrackError::NestedFunction { ref outer, .. } if outer == "outer"));
    }

    #[test]
    fn unbalanced_streams_are_errors() {
        assert_eq!(run(vec![exit()]).unwrap_err(), TrackError::UnbalancedExit);
        assert_eq!(
            run(vec![decl(DeclKind::Namespace, "a", "", "namespace a")]).unwrap_err(),
            TrackError::UnclosedScope { open: 1 }
        );
        assert_eq!(
            run(vec![decl(DeclKind::Record, "Plain", "", "class Plain")]).unwrap_err(),
            TrackError::UnclosedScope { open: 1 }
        );
    }

    #[test]
    fn static_member_is_a_variable() {
        let unit = run(vec![
            decl(DeclKind::Record, "Foo", "CGCLASS()", "class Foo"),
            decl(DeclKind::Variable, "Foo::count", "CGVARIABLE(LuaInspect)", "static int count"),
            exit(),
            exit(),
        ])
        .unwrap();
        assert!(unit.classes[0].variables.is_empty());
        assert_eq!(unit.variables[0].object.full_namespace, "Foo::count");
        assert_eq!(unit.variables[0].ty, "int");
    }
}
