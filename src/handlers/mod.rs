//! Built-in handler sets, selected by name on the command line.

pub mod lua;
pub mod reflect;

use crate::dispatch::Dispatcher;
use anyhow::{anyhow, Result};

/// Names accepted by [`install`].
pub const HANDLER_SETS: &[&str] = &["lua", "reflect"];

/// Register the handler set `name` with `dispatcher`.
pub fn install(name: &str, dispatcher: &mut Dispatcher) -> Result<()> {
    match name {
        "lua" => lua::install(dispatcher),
        "reflect" => reflect::install(dispatcher),
        _ => {
            return Err(anyhow!(
                "unknown handler set: {}. Use {}",
                name,
                HANDLER_SETS.join(" or ")
            ))
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_sets_install() {
        let mut dispatcher = Dispatcher::new();
        for name in HANDLER_SETS {
            install(name, &mut dispatcher).unwrap();
        }
        assert!(!dispatcher.is_empty());
    }

    #[test]
    fn unknown_set_is_an_error() {
        let mut dispatcher = Dispatcher::new();
        let err = install("python", &mut dispatcher).unwrap_err();
        assert!(err.to_string().contains("unknown handler set: python"));
        assert!(dispatcher.is_empty());
    }
}
