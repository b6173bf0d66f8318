//! Value sources: where a metric or terms aggregation reads its values.
//!
//! A [`ValueSourceSpec`] is part of the request. It is resolved once per
//! request ([`ResolvedSource`], which compiles scripts), bound once per
//! segment ([`ValueSource`]) and then asked for the values of one document
//! at a time.

use crate::script::{CompiledScript, ScriptEngine, ScriptEngines, ScriptOutput, ScriptSpec, SegmentScript};
use crate::segment::{DocId, Segment, ValueColumn};
use crate::value::Value;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSourceSpec {
    Field(String),
    Script(ScriptSpec),
}

impl ValueSourceSpec {
    pub fn field(name: impl Into<String>) -> Self {
        ValueSourceSpec::Field(name.into())
    }

    pub fn resolve(&self, scripts: &ScriptEngines) -> Result<ResolvedSource> {
        match self {
            ValueSourceSpec::Field(field) => Ok(ResolvedSource::Field(field.clone())),
            ValueSourceSpec::Script(spec) => {
                let (engine, compiled) = scripts.compile(spec)?;
                Ok(ResolvedSource::Script {
                    engine,
                    compiled,
                    vars: spec.variables(),
                })
            }
        }
    }
}

/// A value source ready to be bound to segments. Shared by all shards.
#[derive(Clone)]
pub enum ResolvedSource {
    Field(String),
    Script {
        engine: Arc<dyn ScriptEngine>,
        compiled: Arc<CompiledScript>,
        vars: BTreeMap<String, String>,
    },
}

impl ResolvedSource {
    pub fn for_segment(&self, segment: &dyn Segment) -> Result<ValueSource> {
        match self {
            ResolvedSource::Field(field) => Ok(ValueSource::Field(FieldValues {
                column: segment.column(field),
            })),
            ResolvedSource::Script {
                engine,
                compiled,
                vars,
            } => Ok(ValueSource::Script(ScriptValues {
                script: engine.for_segment(compiled, vars, segment)?,
            })),
        }
    }
}

impl std::fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedSource::Field(field) => f.debug_tuple("Field").field(field).finish(),
            ResolvedSource::Script { compiled, .. } => {
                f.debug_tuple("Script").field(compiled).finish()
            }
        }
    }
}

/// A value source bound to one segment.
pub enum ValueSource {
    Field(FieldValues),
    Script(ScriptValues),
}

pub struct FieldValues {
    column: Option<Arc<dyn ValueColumn>>,
}

pub struct ScriptValues {
    script: Box<dyn SegmentScript>,
}

impl ValueSource {
    /// Replace `out` with the values of `doc`.
    pub fn values_for_doc(&mut self, doc: DocId, out: &mut Vec<Value>) -> Result<()> {
        out.clear();
        match self {
            ValueSource::Field(field) => {
                if let Some(column) = &field.column {
                    column.values_for_doc(doc, out);
                }
            }
            ValueSource::Script(script) => {
                script.script.set_document(doc);
                match script.script.run()? {
                    ScriptOutput::Null => {}
                    ScriptOutput::Value(v) => out.push(v),
                    ScriptOutput::FieldValues(values) => out.extend(values),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::FieldValueScriptEngine;
    use crate::segment::MemorySegment;
    use serde_json::json;

    fn segment() -> MemorySegment {
        MemorySegment::builder(0)
            .with_documents(&[json!({"value": 1, "values": [2, 3]})])
            .unwrap()
            .build()
    }

    fn values(spec: ValueSourceSpec) -> Vec<Value> {
        let scripts = ScriptEngines::new().with_engine(Arc::new(FieldValueScriptEngine));
        let mut source = spec.resolve(&scripts).unwrap().for_segment(&segment()).unwrap();
        let mut out = vec![Value::I64(99)];
        source.values_for_doc(0, &mut out).unwrap();
        out
    }

    #[test]
    fn test_field_and_script_agree() {
        assert_eq!(values(ValueSourceSpec::field("values")).len(), 2);
        assert_eq!(
            values(ValueSourceSpec::Script(ScriptSpec::new("field_value", "values"))).len(),
            2
        );
        assert_eq!(
            values(ValueSourceSpec::Script(
                ScriptSpec::new("field_value", "values").with_param("s", "value")
            )),
            vec![Value::I64(1)]
        );
    }

    #[test]
    fn test_unmapped_field_yields_nothing() {
        assert!(values(ValueSourceSpec::field("missing")).is_empty());
    }

    #[test]
    fn test_spec_json() {
        let spec: ValueSourceSpec = serde_json::from_value(json!({"field": "value"})).unwrap();
        assert_eq!(spec, ValueSourceSpec::field("value"));
    }
}
