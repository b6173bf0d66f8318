use super::{CompiledScript, ScriptEngine, ScriptOutput, SegmentScript, FIELD_OVERRIDE_PARAM};
use crate::segment::{DocId, Segment, ValueColumn};
use crate::value::Value;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Script engine whose scripts return the values of a document field.
///
/// The script source is the field name. A `s` parameter, when present,
/// names the field instead and wins over the source.
#[derive(Debug, Default)]
pub struct FieldValueScriptEngine;

impl FieldValueScriptEngine {
    pub const NAME: &'static str = "field_value";
}

/// Compiled form: the field named by the script source.
struct SourceField(String);

impl ScriptEngine for FieldValueScriptEngine {
    fn lang(&self) -> &str {
        Self::NAME
    }

    fn compile(&self, source: &str, params: &BTreeMap<String, String>) -> Result<CompiledScript> {
        let source = source.trim();
        if source.is_empty() && !params.contains_key(FIELD_OVERRIDE_PARAM) {
            return Err(Error::ScriptCompile(format!(
                "[{}] script needs a field name as source or a [{}] parameter",
                Self::NAME,
                FIELD_OVERRIDE_PARAM
            )));
        }
        Ok(CompiledScript::new(
            Self::NAME,
            source,
            SourceField(source.to_string()),
        ))
    }

    fn for_segment(
        &self,
        script: &CompiledScript,
        vars: &BTreeMap<String, String>,
        segment: &dyn Segment,
    ) -> Result<Box<dyn SegmentScript>> {
        let field = match vars.get(FIELD_OVERRIDE_PARAM) {
            Some(field) => field.clone(),
            None => script
                .compiled::<SourceField>()
                .map(|f| f.0.clone())
                .ok_or_else(|| {
                    Error::ScriptCompile(format!(
                        "script compiled for [{}] handed to [{}]",
                        script.lang(),
                        Self::NAME
                    ))
                })?,
        };

        Ok(Box::new(FieldValueScript {
            column: segment.column(&field),
            doc: None,
        }))
    }
}

struct FieldValueScript {
    column: Option<Arc<dyn ValueColumn>>,
    doc: Option<DocId>,
}

impl SegmentScript for FieldValueScript {
    fn set_document(&mut self, doc: DocId) {
        self.doc = Some(doc);
    }

    /// Field reads take no variables.
    fn set_variable(&mut self, _name: &str, _value: Value) {}

    fn run(&mut self) -> Result<ScriptOutput> {
        let doc = self.doc.ok_or_else(|| {
            Error::InvalidRequest("script run before a document was set".to_string())
        })?;
        let Some(column) = &self.column else {
            return Ok(ScriptOutput::Null);
        };
        let mut values = Vec::new();
        column.values_for_doc(doc, &mut values);
        Ok(ScriptOutput::FieldValues(values))
    }
}
