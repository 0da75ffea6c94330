//! Type-name reflection.
//!
//! Each class carrying `Reflect` gets a `TypeName<T>()` specialization in
//! `Reflection.cpp.gen`. `Reflect=Alias` overrides the returned name.

use crate::dispatch::{ClassHandler, Dispatcher, UnitHandler};
use crate::generate::GenContext;
use crate::model::{Class, Unit};

pub const OUTPUT_FILE: &str = "Reflection.cpp.gen";

const PROPERTY: &str = "Reflect";
const DECLARATION: &str = "template <typename T> const char* TypeName();";

pub fn install(dispatcher: &mut Dispatcher) {
    dispatcher
        .add_unit_handler(ReflectUnit)
        .add_class_handler(ReflectClass);
}

fn is_reflected(class: &Class) -> bool {
    class.object.has_property(PROPERTY)
}

/// Includes units with reflected classes and declares the primary template.
pub struct ReflectUnit;

impl UnitHandler for ReflectUnit {
    fn name(&self) -> &str {
        "reflect"
    }

    fn on_unit(&self, ctx: &mut GenContext, unit: &Unit) {
        if !unit.classes.iter().any(is_reflected) {
            return;
        }
        let file = ctx.file(OUTPUT_FILE);
        file.includes.insert(unit.path.clone());
        file.add_header_once(DECLARATION);
    }
}

pub struct ReflectClass;

impl ClassHandler for ReflectClass {
    fn name(&self) -> &str {
        "reflect"
    }

    fn on_class(&self, ctx: &mut GenContext, class: &Class) {
        let Some(property) = class.object.property(PROPERTY) else {
            return;
        };
        let qualified = &class.object.full_namespace;
        let alias = property.text().filter(|s| !s.is_empty()).unwrap_or(qualified.as_str());

        let function = ctx
            .file(OUTPUT_FILE)
            .function(&format!("TypeName<{}>", qualified));
        // Same class seen through several units.
        if !function.body.is_empty() {
            return;
        }
        function.prefix = "template <>\n".to_string();
        function.header.return_type = "const char*".to_string();
        function.body.push(format!("return \"{}\";", alias));
    }
}
