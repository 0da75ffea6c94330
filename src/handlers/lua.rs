//! sol2 Lua bindings.
//!
//! Everything goes into one `CreateBindings(sol::state& lua_state)` function
//! in `LuaBindings.cpp.gen`. Classes need `LuaClass`; their methods and
//! members, and free functions and variables, need `LuaInspect`.

use crate::dispatch::{
    ClassHandler, Dispatcher, FunctionHandler, MemberHandler, MethodHandler, VariableHandler,
};
use crate::generate::{FullFunction, GenContext};
use crate::model::{Class, Function, Variable};
use std::path::Path;

pub const OUTPUT_FILE: &str = "LuaBindings.cpp.gen";
pub const ENTRY_POINT: &str = "CreateBindings";

const CLASS_PROPERTY: &str = "LuaClass";
const INSPECT_PROPERTY: &str = "LuaInspect";

pub fn install(dispatcher: &mut Dispatcher) {
    dispatcher
        .add_class_handler(LuaClass)
        .add_method_handler(LuaInspect)
        .add_member_handler(LuaInspect)
        .add_function_handler(LuaInspect)
        .add_variable_handler(LuaInspect);
}

/// The bindings function, with `path` included and the state parameter set.
fn bindings<'a>(ctx: &'a mut GenContext, path: &Path) -> &'a mut FullFunction {
    let file = ctx.file(OUTPUT_FILE);
    file.includes.insert(path.to_path_buf());
    let function = file.function(ENTRY_POINT);
    function
        .header
        .add_parameter(Variable::new("sol::state&", "lua_state"));
    function
}

/// Registers annotated classes as usertypes.
pub struct LuaClass;

impl ClassHandler for LuaClass {
    fn name(&self) -> &str {
        "lua"
    }

    fn on_class(&self, ctx: &mut GenContext, class: &Class) {
        if !class.object.has_property(CLASS_PROPERTY) {
            return;
        }
        let line = usertype_line(class);
        bindings(ctx, &class.object.path).body.push(line);
    }
}

/// `sol::usertype<Q> N_table = lua_state.new_usertype<Q>("N", sol::constructors<...>{});`
///
/// Constructors marked `LuaInspect` supply the constructor list; without any,
/// the default constructor is used.
fn usertype_line(class: &Class) -> String {
    let qualified = &class.object.full_namespace;
    let name = class.name();
    let mut constructors: Vec<String> = class
        .functions
        .iter()
        .filter(|f| f.is_constructor && f.object.has_property(INSPECT_PROPERTY))
        .map(|f| {
            let params: Vec<&str> = f.parameters.iter().map(|p| p.ty.as_str()).collect();
            format!("{}({})", qualified, params.join(", "))
        })
        .collect();
    if constructors.is_empty() {
        constructors.push(format!("{}()", qualified));
    }
    format!(
        "sol::usertype<{q}> {n}_table = lua_state.new_usertype<{q}>(\"{n}\", sol::constructors<{c}>{{}});",
        q = qualified,
        n = name,
        c = constructors.join(", ")
    )
}

/// Binds inspected members, methods, free functions and free variables.
pub struct LuaInspect;

impl MethodHandler for LuaInspect {
    fn name(&self) -> &str {
        "lua"
    }

    fn on_method(&self, ctx: &mut GenContext, class: &Class, method: &Function) {
        // Constructors are bound through the usertype line.
        if method.is_constructor
            || !class.object.has_property(CLASS_PROPERTY)
            || !method.object.has_property(INSPECT_PROPERTY)
        {
            return;
        }
        let line = format!(
            "{}_table[\"{}\"] = &{};",
            class.name(),
            method.name(),
            method.object.full_namespace
        );
        bindings(ctx, &method.object.path).body.push(line);
    }
}

impl MemberHandler for LuaInspect {
    fn name(&self) -> &str {
        "lua"
    }

    fn on_member(&self, ctx: &mut GenContext, class: &Class, member: &Variable) {
        if !class.object.has_property(CLASS_PROPERTY)
            || !member.object.has_property(INSPECT_PROPERTY)
        {
            return;
        }
        let line = format!(
            "{}_table[\"{}\"] = &{};",
            class.name(),
            member.name(),
            member.object.full_namespace
        );
        bindings(ctx, &member.object.path).body.push(line);
    }
}

impl FunctionHandler for LuaInspect {
    fn name(&self) -> &str {
        "lua"
    }

    fn on_function(&self, ctx: &mut GenContext, function: &Function) {
        if !function.object.has_property(INSPECT_PROPERTY) {
            return;
        }
        let line = format!(
            "lua_state.set_function(\"{}\", &{});",
            function.name(),
            function.object.full_namespace
        );
        bindings(ctx, &function.object.path).body.push(line);
    }
}

impl VariableHandler for LuaInspect {
    fn name(&self) -> &str {
        "lua"
    }

    fn on_variable(&self, ctx: &mut GenContext, variable: &Variable) {
        if !variable.object.has_property(INSPECT_PROPERTY) {
            return;
        }
        let line = format!(
            "lua_state[\"{}\"] = std::ref({});",
            variable.name(),
            variable.object.full_namespace
        );
        bindings(ctx, &variable.object.path).body.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Object, Property, Unit};
    use std::path::PathBuf;

    fn object(name: &str, qualified: &str, props: &[&str]) -> Object {
        Object {
            name: name.to_string(),
            full_namespace: qualified.to_string(),
            path: PathBuf::from("/src/foo.h"),
            properties: props.iter().map(|p| Property::new(*p, "")).collect(),
        }
    }

    fn foo_class(class_props: &[&str]) -> Class {
        let mut ctor = Function::new("void", "Foo");
        ctor.object = object("Foo", "game::Foo::Foo", &["CGCONSTRUCTOR", "LuaInspect"]);
        ctor.is_constructor = true;
        ctor.add_parameter(Variable::new("int", "hp"));
        ctor.add_parameter(Variable::new("const std::string&", "name"));

        let mut method = Function::new("float", "getX");
        method.object = object("getX", "game::Foo::getX", &["CGMETHOD", "LuaInspect"]);

        let mut bar = Variable::new("int", "bar");
        bar.object = object("bar", "game::Foo::bar", &["CGMEMBER", "LuaInspect"]);
        let mut hidden = Variable::new("int", "hidden");
        hidden.object = object("hidden", "game::Foo::hidden", &["CGMEMBER"]);

        Class {
            object: object("Foo", "game::Foo", class_props),
            functions: vec![ctor, method],
            variables: vec![bar, hidden],
        }
    }

    fn body(ctx: &GenContext) -> Vec<String> {
        ctx.get(OUTPUT_FILE)
            .and_then(|f| f.functions().next().map(|(_, func)| func.body.clone()))
            .unwrap_or_default()
    }

    fn dispatch(unit: &Unit) -> GenContext {
        let mut dispatcher = Dispatcher::new();
        install(&mut dispatcher);
        let mut ctx = GenContext::new();
        dispatcher.dispatch(&mut ctx, unit);
        ctx
    }

    #[test]
    fn class_members_and_methods() {
        let unit = Unit {
            path: "/src/foo.h".into(),
            classes: vec![foo_class(&["CGCLASS", "LuaClass"])],
            ..Default::default()
        };
        let ctx = dispatch(&unit);
        assert_eq!(
            body(&ctx),
            vec![
                "sol::usertype<game::Foo> Foo_table = lua_state.new_usertype<game::Foo>(\"Foo\", \
                 sol::constructors<game::Foo(int, const std::string&)>{});",
                "Foo_table[\"getX\"] = &game::Foo::getX;",
                "Foo_table[\"bar\"] = &game::Foo::bar;",
            ]
        );

        let file = ctx.get(OUTPUT_FILE).unwrap();
        let (key, function) = file.functions().next().unwrap();
        assert_eq!(key, ENTRY_POINT);
        assert_eq!(function.header.parameters.len(), 1);
        assert_eq!(function.header.parameters[0].ty, "sol::state&");
        assert_eq!(
            file.includes.iter().collect::<Vec<_>>(),
            vec![&PathBuf::from("/src/foo.h")]
        );
    }

    #[test]
    fn default_constructor_when_none_inspected() {
        let mut class = foo_class(&["CGCLASS", "LuaClass"]);
        class.functions.retain(|f| !f.is_constructor);
        class.object.full_namespace = "Foo".to_string();
        assert_eq!(
            usertype_line(&class),
            "sol::usertype<Foo> Foo_table = lua_state.new_usertype<Foo>(\"Foo\", sol::constructors<Foo()>{});"
        );
    }

    #[test]
    fn class_without_lua_class_is_ignored() {
        let unit = Unit {
            path: "/src/foo.h".into(),
            classes: vec![foo_class(&["CGCLASS", "Reflect"])],
            ..Default::default()
        };
        assert!(dispatch(&unit).get(OUTPUT_FILE).is_none());
    }

    #[test]
    fn free_functions_and_variables() {
        let mut add = Function::new("int", "add");
        add.object = object("add", "math::add", &["CGFUNCTION", "LuaInspect"]);
        let mut gravity = Variable::new("float", "gravity");
        gravity.object = object("gravity", "gravity", &["CGVARIABLE", "LuaInspect"]);
        let mut quiet = Variable::new("float", "quiet");
        quiet.object = object("quiet", "quiet", &["CGVARIABLE"]);

        let unit = Unit {
            path: "/src/foo.h".into(),
            functions: vec![add],
            variables: vec![gravity, quiet],
            ..Default::default()
        };
        assert_eq!(
            body(&dispatch(&unit)),
            vec![
                "lua_state.set_function(\"add\", &math::add);",
                "lua_state[\"gravity\"] = std::ref(gravity);",
            ]
        );
    }

    #[test]
    fn repeated_dispatch_keeps_one_parameter() {
        let unit = Unit {
            path: "/src/foo.h".into(),
            classes: vec![foo_class(&["CGCLASS", "LuaClass"])],
            ..Default::default()
        };
        let mut dispatcher = Dispatcher::new();
        install(&mut dispatcher);
        let mut ctx = GenContext::new();
        dispatcher.dispatch(&mut ctx, &unit);
        dispatcher.dispatch(&mut ctx, &unit);
        let file = ctx.get(OUTPUT_FILE).unwrap();
        let (_, function) = file.functions().next().unwrap();
        assert_eq!(function.header.parameters.len(), 1);
        assert_eq!(function.body.len(), 6);
    }
}
