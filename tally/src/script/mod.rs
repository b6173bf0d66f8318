//! Script host contract.
//!
//! A script is compiled once per request into an immutable
//! [`CompiledScript`] that is shared by every shard and segment. Each segment
//! then gets its own [`SegmentScript`] execution context, which is focused on
//! one document at a time and run to produce that document's value.
//!
//! Engines are injected by the caller through [`ScriptEngines`]; nothing is
//! discovered at runtime.

mod field_value;

pub use field_value::FieldValueScriptEngine;

use crate::segment::{DocId, Segment};
use crate::value::Value;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Reserved script parameter naming the field a script reads from.
pub const FIELD_OVERRIDE_PARAM: &str = "s";

/// A script definition as carried by an aggregation request.
///
/// The reserved [`FIELD_OVERRIDE_PARAM`] is never kept in `params`: it is
/// lifted into `field_override` so the redirection is visible in the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScriptSpecRepr", into = "ScriptSpecRepr")]
pub struct ScriptSpec {
    pub lang: String,
    pub source: String,
    pub params: BTreeMap<String, String>,
    pub field_override: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct ScriptSpecRepr {
    lang: String,
    #[serde(default)]
    source: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, String>,
}

impl From<ScriptSpecRepr> for ScriptSpec {
    fn from(repr: ScriptSpecRepr) -> Self {
        repr.params.into_iter().fold(
            ScriptSpec::new(repr.lang, repr.source),
            |spec, (k, v)| spec.with_param(k, v),
        )
    }
}

impl From<ScriptSpec> for ScriptSpecRepr {
    fn from(spec: ScriptSpec) -> Self {
        let params = spec.variables();
        ScriptSpecRepr {
            lang: spec.lang,
            source: spec.source,
            params,
        }
    }
}

impl ScriptSpec {
    pub fn new(lang: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            lang: lang.into(),
            source: source.into(),
            params: BTreeMap::new(),
            field_override: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        if name == FIELD_OVERRIDE_PARAM {
            self.field_override = Some(value.into());
        } else {
            self.params.insert(name, value.into());
        }
        self
    }

    pub fn with_field_override(mut self, field: impl Into<String>) -> Self {
        self.field_override = Some(field.into());
        self
    }

    /// Parameters as seen by the engine, with the override under its
    /// reserved key.
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = self.params.clone();
        if let Some(field) = &self.field_override {
            vars.insert(FIELD_OVERRIDE_PARAM.to_string(), field.clone());
        }
        vars
    }
}

/// Opaque, immutable output of [`ScriptEngine::compile`].
#[derive(Clone)]
pub struct CompiledScript {
    lang: String,
    source: String,
    compiled: Arc<dyn Any + Send + Sync>,
}

impl CompiledScript {
    pub fn new(
        lang: impl Into<String>,
        source: impl Into<String>,
        compiled: impl Any + Send + Sync,
    ) -> Self {
        Self {
            lang: lang.into(),
            source: source.into(),
            compiled: Arc::new(compiled),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// The engine-specific compiled form, if it is a `T`.
    pub fn compiled<T: Any>(&self) -> Option<&T> {
        self.compiled.downcast_ref::<T>()
    }
}

impl fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("lang", &self.lang)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// What a script produced for the focused document.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutput {
    /// No value (missing field, `null`).
    Null,
    /// Exactly one logical value, even if it is a composite.
    Value(Value),
    /// The doc-values view of a field; every stored value counts.
    FieldValues(Vec<Value>),
}

pub trait ScriptEngine: Send + Sync {
    fn lang(&self) -> &str;

    fn compile(&self, source: &str, params: &BTreeMap<String, String>) -> Result<CompiledScript>;

    /// Create an execution context bound to `segment`.
    fn for_segment(
        &self,
        script: &CompiledScript,
        vars: &BTreeMap<String, String>,
        segment: &dyn Segment,
    ) -> Result<Box<dyn SegmentScript>>;
}

/// Per-segment execution context. Owned by exactly one collector.
pub trait SegmentScript: Send {
    fn set_document(&mut self, doc: DocId);

    fn set_variable(&mut self, name: &str, value: Value);

    fn run(&mut self) -> Result<ScriptOutput>;

    fn run_as_long(&mut self) -> Result<i64> {
        Err(Error::UnsupportedOperation("run_as_long".to_string()))
    }

    fn run_as_double(&mut self) -> Result<f64> {
        Err(Error::UnsupportedOperation("run_as_double".to_string()))
    }

    fn run_as_float(&mut self) -> Result<f32> {
        Err(Error::UnsupportedOperation("run_as_float".to_string()))
    }
}

/// Script engines available to one aggregation context, keyed by language.
#[derive(Clone, Default)]
pub struct ScriptEngines {
    engines: HashMap<String, Arc<dyn ScriptEngine>>,
}

impl ScriptEngines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: Arc<dyn ScriptEngine>) -> Self {
        self.engines.insert(engine.lang().to_string(), engine);
        self
    }

    pub fn get(&self, lang: &str) -> Result<&Arc<dyn ScriptEngine>> {
        self.engines.get(lang).ok_or_else(|| {
            Error::ScriptCompile(format!("no script engine registered for lang [{}]", lang))
        })
    }

    /// Compile `spec` with the engine registered for its language.
    pub fn compile(&self, spec: &ScriptSpec) -> Result<(Arc<dyn ScriptEngine>, Arc<CompiledScript>)> {
        let engine = self.get(&spec.lang)?;
        let compiled = engine.compile(&spec.source, &spec.variables())?;
        tracing::debug!(lang = %spec.lang, source = %spec.source, "compiled script");
        Ok((Arc::clone(engine), Arc::new(compiled)))
    }
}

impl fmt::Debug for ScriptEngines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.engines.keys()).finish()
    }
}
