use rewind_bytecode::{ClassDef, ClassRedefiner};

use crate::{InstrumentError, Instrumentor};

/// Outcome of instrumenting every method of a class.
#[derive(Debug)]
pub struct ClassInstrumentation {
    /// The class with every successfully rewritten method replaced. Methods
    /// that failed keep their original body.
    pub class: ClassDef,
    /// `name` + descriptor of every rewritten method.
    pub instrumented: Vec<String>,
    /// Methods without code.
    pub skipped: Vec<String>,
    pub failures: Vec<(String, InstrumentError)>,
}

impl ClassInstrumentation {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Instrumentor {
    pub fn instrument_class(
        &self,
        class: &ClassDef,
    ) -> Result<ClassInstrumentation, InstrumentError> {
        if self.config.is_excluded(&class.name) {
            return Err(InstrumentError::Excluded(class.name.clone()));
        }

        let mut rewritten = class.clone();
        let mut instrumented = Vec::new();
        let mut skipped = Vec::new();
        let mut failures = Vec::new();

        for method in &mut rewritten.methods {
            let signature = method.to_string();
            if method.body.is_none() {
                skipped.push(signature);
                continue;
            }
            match self.instrument_method(class, method) {
                Ok(body) => {
                    method.body = Some(body);
                    instrumented.push(signature);
                }
                Err(err) => {
                    tracing::warn!(
                        target: "rewind.instrument",
                        class = %class.name,
                        method = %signature,
                        error = %err,
                        "method left uninstrumented"
                    );
                    failures.push((signature, err));
                }
            }
        }

        Ok(ClassInstrumentation {
            class: rewritten,
            instrumented,
            skipped,
            failures,
        })
    }

    /// Instrument `class` and hand the result to `redefiner`.
    ///
    /// Per-method failures do not stop the redefinition; they are reported
    /// in the returned [`ClassInstrumentation`].
    pub fn instrument_and_redefine(
        &self,
        class: &ClassDef,
        redefiner: &dyn ClassRedefiner,
    ) -> Result<ClassInstrumentation, InstrumentError> {
        let result = self.instrument_class(class)?;
        redefiner
            .redefine_class(result.class.clone())
            .map_err(|source| InstrumentError::Redefine {
                class: class.name.clone(),
                source,
            })?;
        tracing::info!(
            target: "rewind.instrument",
            class = %class.name,
            methods = result.instrumented.len(),
            failures = result.failures.len(),
            "class redefined"
        );
        Ok(result)
    }
}
