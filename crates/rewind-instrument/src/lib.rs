//! Probe placement for traced methods.
//!
//! [`Instrumentor::instrument_method`] rewrites a method body so that it
//! reports entry, field and local writes, array stores, calls, returns,
//! throws and catches to the trace session, and wraps the original code in a
//! catch-all region that reports an exceptional exit before re-raising.
//! Apart from the added probes the rewritten body leaves the operand stack,
//! branch targets and exception table of the original untouched.

mod class;
mod method;
mod region;

use rewind_bytecode::{ClassDef, MethodBody, MethodDef, RedefineError};
use rewind_config::InstrumentConfig;
use thiserror::Error;

pub use crate::class::ClassInstrumentation;

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("class {0} is excluded from instrumentation")]
    Excluded(String),
    #[error("invalid code in {method}: {source}")]
    Bytecode {
        method: String,
        #[source]
        source: rewind_bytecode::Error,
    },
    #[error("constructor {method} never calls another constructor")]
    MissingDelegatingInit { method: String },
    #[error("failed to redefine {class}: {source}")]
    Redefine {
        class: String,
        #[source]
        source: RedefineError,
    },
}

#[derive(Clone, Debug, Default)]
pub struct Instrumentor {
    config: InstrumentConfig,
}

impl Instrumentor {
    pub fn new(config: InstrumentConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InstrumentConfig {
        &self.config
    }

    /// Rewrite a single method. The result carries recomputed `max_stack`
    /// and `max_locals`.
    pub fn instrument_method(
        &self,
        class: &ClassDef,
        method: &MethodDef,
    ) -> Result<MethodBody, InstrumentError> {
        if self.config.is_excluded(&class.name) {
            return Err(InstrumentError::Excluded(class.name.clone()));
        }
        let body = method::MethodRewriter::new(&self.config, class, method)?.rewrite()?;
        tracing::debug!(
            target: "rewind.instrument",
            class = %class.name,
            method = %method,
            insns = body.insns.len(),
            max_stack = body.max_stack,
            max_locals = body.max_locals,
            "method instrumented"
        );
        Ok(body)
    }
}
