//! Declarative input binders for plan steps.
//!
//! A binder builds a step's request payload from the intent's parameters,
//! results of earlier steps and the session's previous reply. Binders are
//! data, not closures, so rules can be loaded from configuration and plans
//! stay inspectable.

use super::StepId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Where a bound field takes its value from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", rename_all = "snake_case")]
pub enum BindingSource {
    /// A fixed value.
    Literal {
        /// The value to bind.
        value: Value,
    },
    /// A structured parameter of the intent.
    IntentParameter {
        /// Parameter name.
        name: String,
    },
    /// The result of an earlier step, optionally narrowed by a JSON pointer.
    StepResult {
        /// Step whose result is read.
        step: StepId,
        /// JSON pointer into the result (RFC 6901).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pointer: Option<String>,
    },
    /// The payload of the session's most recent reply.
    PreviousReply {
        /// JSON pointer into the reply (RFC 6901).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pointer: Option<String>,
    },
}

/// One field of a step payload and where its value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldBinding {
    /// Payload field to set.
    pub field: String,
    /// Source of the value.
    pub source: BindingSource,
}

/// Errors raised while evaluating a binder.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    /// The intent lacks a parameter the binder reads.
    #[error("intent parameter '{0}' is missing")]
    MissingIntentParameter(String),
    /// The referenced step has no recorded result.
    #[error("no result recorded for step {0}")]
    MissingStepResult(StepId),
    /// The session has no previous reply.
    #[error("the session has no previous reply")]
    NoPreviousReply,
    /// A JSON pointer did not resolve.
    #[error("pointer '{pointer}' did not resolve in {source_name}")]
    PointerNotFound {
        /// The pointer that failed.
        pointer: String,
        /// Human name of the document searched.
        source_name: String,
    },
}

/// Inputs available while binding a step payload.
#[derive(Debug, Clone, Copy)]
pub struct BindingContext<'a> {
    /// Structured parameters of the intent.
    pub intent_parameters: &'a Map<String, Value>,
    /// Results recorded so far in this plan.
    pub results: &'a BTreeMap<StepId, Value>,
    /// The session's most recent reply payload.
    pub previous_reply: Option<&'a Value>,
}

/// Builds a step payload as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputBinder {
    #[serde(default)]
    include_intent_parameters: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    bindings: Vec<FieldBinding>,
}

impl InputBinder {
    /// Creates a binder from explicit field bindings.
    #[must_use]
    pub const fn new(include_intent_parameters: bool, bindings: Vec<FieldBinding>) -> Self {
        Self {
            include_intent_parameters,
            bindings,
        }
    }

    /// Creates a binder that forwards the intent's parameters unchanged.
    #[must_use]
    pub const fn forward_intent() -> Self {
        Self::new(true, Vec::new())
    }

    /// Returns the field bindings.
    #[must_use]
    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Returns the steps whose results this binder reads.
    pub fn referenced_steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.bindings.iter().filter_map(|binding| match binding.source {
            BindingSource::StepResult { step, .. } => Some(step),
            _ => None,
        })
    }

    /// Evaluates the binder.
    ///
    /// Intent parameters, when forwarded, are written first; explicit
    /// bindings then overwrite fields in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError`] when a source is missing or a pointer does
    /// not resolve.
    pub fn bind(&self, context: &BindingContext<'_>) -> Result<Value, BindingError> {
        let mut payload = if self.include_intent_parameters {
            context.intent_parameters.clone()
        } else {
            Map::new()
        };
        for binding in &self.bindings {
            let value = resolve(&binding.source, context)?;
            payload.insert(binding.field.clone(), value);
        }
        Ok(Value::Object(payload))
    }
}

fn resolve(source: &BindingSource, context: &BindingContext<'_>) -> Result<Value, BindingError> {
    match source {
        BindingSource::Literal { value } => Ok(value.clone()),
        BindingSource::IntentParameter { name } => context
            .intent_parameters
            .get(name)
            .cloned()
            .ok_or_else(|| BindingError::MissingIntentParameter(name.clone())),
        BindingSource::StepResult { step, pointer } => {
            let result = context
                .results
                .get(step)
                .ok_or(BindingError::MissingStepResult(*step))?;
            select(result, pointer.as_deref(), || format!("step {step} result"))
        }
        BindingSource::PreviousReply { pointer } => {
            let reply = context.previous_reply.ok_or(BindingError::NoPreviousReply)?;
            select(reply, pointer.as_deref(), || "previous reply".to_owned())
        }
    }
}

fn select(
    document: &Value,
    pointer: Option<&str>,
    source_name: impl FnOnce() -> String,
) -> Result<Value, BindingError> {
    let Some(path) = pointer else {
        return Ok(document.clone());
    };
    document
        .pointer(path)
        .cloned()
        .ok_or_else(|| BindingError::PointerNotFound {
            pointer: path.to_owned(),
            source_name: source_name(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn parameters() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("user_email".to_owned(), json!("me@example.com"));
        map.insert("days_ahead".to_owned(), json!(1));
        map
    }

    fn results() -> BTreeMap<StepId, Value> {
        BTreeMap::from([(StepId::new(0), json!({"events": ["standup", "review"]}))])
    }

    #[rstest]
    fn binds_all_source_kinds() {
        let params = parameters();
        let recorded = results();
        let reply = json!({"summary": "done"});
        let context = BindingContext {
            intent_parameters: &params,
            results: &recorded,
            previous_reply: Some(&reply),
        };
        let binder = InputBinder::new(
            false,
            vec![
                FieldBinding {
                    field: "subject".to_owned(),
                    source: BindingSource::Literal {
                        value: json!("Tomorrow"),
                    },
                },
                FieldBinding {
                    field: "to".to_owned(),
                    source: BindingSource::IntentParameter {
                        name: "user_email".to_owned(),
                    },
                },
                FieldBinding {
                    field: "body".to_owned(),
                    source: BindingSource::StepResult {
                        step: StepId::new(0),
                        pointer: Some("/events".to_owned()),
                    },
                },
                FieldBinding {
                    field: "context".to_owned(),
                    source: BindingSource::PreviousReply {
                        pointer: Some("/summary".to_owned()),
                    },
                },
            ],
        );

        let payload = binder.bind(&context).expect("binding should succeed");

        assert_eq!(
            payload,
            json!({
                "subject": "Tomorrow",
                "to": "me@example.com",
                "body": ["standup", "review"],
                "context": "done",
            })
        );
    }

    #[rstest]
    fn forwarded_parameters_are_overridden_by_bindings() {
        let params = parameters();
        let recorded = BTreeMap::new();
        let context = BindingContext {
            intent_parameters: &params,
            results: &recorded,
            previous_reply: None,
        };
        let binder = InputBinder::new(
            true,
            vec![FieldBinding {
                field: "days_ahead".to_owned(),
                source: BindingSource::Literal { value: json!(7) },
            }],
        );

        let payload = binder.bind(&context).expect("binding should succeed");

        assert_eq!(payload["days_ahead"], json!(7));
        assert_eq!(payload["user_email"], json!("me@example.com"));
    }

    #[rstest]
    #[case(
        BindingSource::IntentParameter { name: "missing".to_owned() },
        BindingError::MissingIntentParameter("missing".to_owned())
    )]
    #[case(
        BindingSource::StepResult { step: StepId::new(3), pointer: None },
        BindingError::MissingStepResult(StepId::new(3))
    )]
    #[case(
        BindingSource::PreviousReply { pointer: None },
        BindingError::NoPreviousReply
    )]
    #[case(
        BindingSource::StepResult { step: StepId::new(0), pointer: Some("/nope".to_owned()) },
        BindingError::PointerNotFound {
            pointer: "/nope".to_owned(),
            source_name: "step 0 result".to_owned(),
        }
    )]
    fn missing_sources_are_reported(#[case] source: BindingSource, #[case] expected: BindingError) {
        let params = parameters();
        let recorded = results();
        let context = BindingContext {
            intent_parameters: &params,
            results: &recorded,
            previous_reply: None,
        };
        let binder = InputBinder::new(
            false,
            vec![FieldBinding {
                field: "x".to_owned(),
                source,
            }],
        );

        assert_eq!(binder.bind(&context), Err(expected));
    }

    #[rstest]
    fn binding_parses_from_toml() {
        let binding: FieldBinding = toml::from_str(
            r#"
            field = "body"
            source = { from = "step_result", step = 0, pointer = "/events" }
            "#,
        )
        .expect("binding should parse");

        assert_eq!(
            binding.source,
            BindingSource::StepResult {
                step: StepId::new(0),
                pointer: Some("/events".to_owned()),
            }
        );
    }
}
