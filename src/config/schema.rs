//! Serialized form of a mock configuration document.
//!
//! These types mirror the JSON layout one-to-one and carry no validation; turning them
//! into checked [`crate::MockRule`]s is the job of [`crate::RuleSet::parse`].

use serde::{Deserialize, Serialize};

/// Exception type used when a declaration does not name one.
pub const DEFAULT_EXCEPTION_TYPE: &str = "java.lang.RuntimeException";

/// Exception message used when a declaration does not provide one.
pub const DEFAULT_EXCEPTION_MESSAGE: &str = "Mocked exception";

fn default_true() -> bool {
    true
}

/// Top level of a configuration document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockDocument {
    /// Rule declarations, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDecl>,
    /// Flat method entries as written by editor tooling. Appended after `rules`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mock_methods: Vec<LegacyMethodDecl>,
}

/// One rule declaration.
///
/// The target is given either as a `target` descriptor or as separate
/// `owner`/`member`/`params` fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDecl {
    /// Target descriptor, e.g. `Calculator.add(int,int)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Owning type name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Member name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    /// Parameter type signatures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Vec<String>>,
    /// Marks the target as static.
    #[serde(default, rename = "static")]
    pub is_static: bool,
    /// Marks the target as a constructor.
    #[serde(default)]
    pub constructor: bool,
    /// Declared return type used to check literal payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Condition expression; the rule applies only when it evaluates to `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Higher priorities are tried first.
    #[serde(default)]
    pub priority: i32,
    /// Disabled rules stay loaded but never match.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-form name shown in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// What to do when the rule matches.
    pub action: ActionDecl,
}

/// Action of a rule declaration.
///
/// ```json
/// { "return": 42 }
/// { "throw": { "type": "IllegalStateException", "message": "boom" } }
/// "delegate"
/// { "computed": "arg0 * 10" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionDecl {
    /// Return a literal value.
    Return(serde_json::Value),
    /// Throw an exception.
    Throw(ThrowDecl),
    /// Run the original body.
    Delegate,
    /// Return the result of an expression over the arguments.
    Computed(String),
}

/// Exception description of a `throw` action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThrowDecl {
    /// Exception type name, fully qualified or simple.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Exception message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A flat method entry as produced by editor tooling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMethodDecl {
    /// Owning type name.
    pub class_name: String,
    /// Member name.
    pub method_name: String,
    /// Parameter list in the form `(T1, T2)`. Absent means no parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Literal return value as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_value: Option<String>,
    /// Declared return type; inferred from `returnValue` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// Disabled entries stay loaded but never match.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Throw instead of returning.
    #[serde(default)]
    pub throw_exception: bool,
    /// Exception type when `throwException` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_type: Option<String>,
    /// Exception message when `throwException` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_message: Option<String>,
}

impl LegacyMethodDecl {
    /// Returns the declared return type, inferring it from the literal text when absent.
    ///
    /// Inference: empty text is `Object`, text starting with `[` is a `List`, `true` and
    /// `false` are `boolean`, integers are `int`, and anything else is a `String`.
    #[must_use]
    pub fn effective_return_type(&self) -> String {
        if let Some(declared) = self.return_type.as_deref().filter(|t| !t.trim().is_empty()) {
            return declared.to_string();
        }

        let text = self.return_value.as_deref().unwrap_or("").trim();
        if text.is_empty() {
            "Object"
        } else if text.starts_with('[') {
            "List"
        } else if text == "true" || text == "false" {
            "boolean"
        } else if text.parse::<i32>().is_ok() {
            "int"
        } else {
            "String"
        }
        .to_string()
    }
}
