//! WASM bindings for the Pitchfork engine.

use wasm_bindgen::prelude::*;

mod flow;
mod provider;
mod session;

pub use flow::WasmFlow;
pub use provider::JsSymbolicProvider;
pub use session::WasmBifurcationSession;

/// Joins an error and its causes into one line, outermost first.
pub(crate) fn format_error_chain(error: &anyhow::Error) -> String {
    error
        .chain()
        .map(|cause| cause.to_string())
        .collect::<Vec<_>>()
        .join(": ")
}

pub(crate) fn to_js_error(error: anyhow::Error) -> JsValue {
    JsValue::from_str(&format_error_chain(&error))
}

#[cfg(test)]
mod tests {
    use super::format_error_chain;
    use anyhow::{anyhow, Context};

    #[test]
    fn error_chain_lists_context_first() {
        let error = Err::<(), _>(anyhow!("Unknown function: foo"))
            .context("Failed to compile 'foo(x)'")
            .unwrap_err();
        assert_eq!(
            format_error_chain(&error),
            "Failed to compile 'foo(x)': Unknown function: foo"
        );
    }
}
