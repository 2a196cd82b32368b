//! Validated mock rules and immutable rule sets.
//!
//! A [`RuleSet`] is one configuration generation: a mapping from [`TargetId`] to the
//! ordered list of rules declared for it. Rule sets are immutable once built; a reload
//! produces a new set and publishes it atomically (see [`crate::RuleStore`]).
//!
//! # Ordering
//!
//! Rules for one target are tried in descending priority. Rules with equal priority keep
//! their declaration order, so the first-declared rule wins a tie.

use std::{cmp::Reverse, collections::HashMap, fmt, sync::Arc};

use sha1::{Digest, Sha1};

use crate::{
    config::schema::{
        ActionDecl, LegacyMethodDecl, MockDocument, RuleDecl, DEFAULT_EXCEPTION_MESSAGE,
        DEFAULT_EXCEPTION_TYPE,
    },
    expr::Expression,
    target::{split_top_level, validate_type_name, TargetFlags, TargetId, TypeSig},
    value::{coerce_literal, Literal},
    Result,
};

/// What a matching rule does with the call.
#[derive(Clone, Debug, PartialEq)]
pub enum RuleAction {
    /// Return a literal, coerced to the method's return type.
    ReturnLiteral(Literal),
    /// Raise an exception of the named type.
    ThrowException {
        /// Exception type name, fully qualified or simple.
        type_name: Arc<str>,
        /// Exception message.
        message: String,
    },
    /// Run the original body.
    DelegateToOriginal,
    /// Return the value of an expression over the call arguments.
    Computed(Expression),
}

impl RuleAction {
    /// Returns a short name for the action kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RuleAction::ReturnLiteral(_) => "return",
            RuleAction::ThrowException { .. } => "throw",
            RuleAction::DelegateToOriginal => "delegate",
            RuleAction::Computed(_) => "computed",
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleAction::ReturnLiteral(Literal::Json(json)) => write!(f, "return {json}"),
            RuleAction::ReturnLiteral(Literal::Text(text)) => write!(f, "return {text:?}"),
            RuleAction::ThrowException { type_name, message } => {
                write!(f, "throw {type_name}({message:?})")
            }
            RuleAction::DelegateToOriginal => write!(f, "delegate"),
            RuleAction::Computed(expr) => write!(f, "computed {expr}"),
        }
    }
}

/// One substitution rule.
///
/// Rules are built either by parsing a configuration document or programmatically:
///
/// ```rust
/// use mockscope::{Literal, MockRule, RuleAction, RuleSet, TargetId};
///
/// let target = TargetId::parse("Calculator.add(int,int)")?;
/// let rule = MockRule::new(target.clone(), RuleAction::ReturnLiteral(Literal::Json(42.into())))
///     .with_condition("arg0 > 1")?
///     .with_priority(10);
///
/// let set = RuleSet::from_rules(vec![rule], 1)?;
/// assert_eq!(set.lookup(&target).len(), 1);
/// # Ok::<(), mockscope::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct MockRule {
    target: TargetId,
    condition: Option<Expression>,
    action: RuleAction,
    priority: i32,
    enabled: bool,
    declared_return: Option<TypeSig>,
    index: usize,
    label: Option<String>,
}

impl MockRule {
    /// Creates an enabled, unconditional rule with priority 0.
    #[must_use]
    pub fn new(target: TargetId, action: RuleAction) -> Self {
        MockRule {
            target,
            condition: None,
            action,
            priority: 0,
            enabled: true,
            declared_return: None,
            index: 0,
            label: None,
        }
    }

    /// Adds a condition expression.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Expression`] if the condition does not compile.
    pub fn with_condition(mut self, condition: &str) -> Result<Self> {
        self.condition = Some(Expression::compile(condition)?);
        Ok(self)
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets whether the rule can match.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Declares the return type literal payloads are checked against.
    #[must_use]
    pub fn with_return_type(mut self, ty: TypeSig) -> Self {
        self.declared_return = Some(ty);
        self
    }

    /// Sets the display label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns the target the rule applies to.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Returns the condition, if any.
    #[must_use]
    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    /// Returns the action.
    #[must_use]
    pub fn action(&self) -> &RuleAction {
        &self.action
    }

    /// Returns the priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns `true` if the rule can match.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the declared return type, if any.
    #[must_use]
    pub fn declared_return(&self) -> Option<&TypeSig> {
        self.declared_return.as_ref()
    }

    /// Returns the position of the rule in its document.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the label, if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns `true` if the rule always yields the same substitute.
    ///
    /// Such rules can have their coerced value cached per generation.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.condition.is_none() && matches!(self.action, RuleAction::ReturnLiteral(_))
    }

    fn describe(&self) -> String {
        match &self.label {
            Some(label) => format!("rule #{} '{}' ({})", self.index, label, self.target),
            None => format!("rule #{} ({})", self.index, self.target),
        }
    }

    fn validate(&self) -> Result<()> {
        match &self.action {
            RuleAction::ReturnLiteral(literal) => {
                if let Some(ty) = self.declared_return.as_ref().filter(|ty| !ty.is_named()) {
                    coerce_literal(literal, ty).map_err(|err| {
                        config_error!("{}: return value does not type-check: {}", self.describe(), err)
                    })?;
                }
            }
            RuleAction::ThrowException { type_name, .. } => {
                validate_type_name(type_name).map_err(|err| {
                    config_error!("{}: invalid exception type: {}", self.describe(), err)
                })?;
            }
            RuleAction::Computed(_) | RuleAction::DelegateToOriginal => {}
        }
        if self.declared_return.as_ref().is_some_and(TypeSig::is_void)
            && matches!(self.action, RuleAction::Computed(_))
        {
            return Err(config_error!(
                "{}: a computed value cannot be returned from a void method",
                self.describe()
            ));
        }
        Ok(())
    }
}

/// Immutable mapping from target to ordered rules for one configuration generation.
#[derive(Clone)]
pub struct RuleSet {
    rules: HashMap<TargetId, Arc<[Arc<MockRule>]>>,
    generation: u64,
    fingerprint: [u8; 20],
    rule_count: usize,
}

impl RuleSet {
    /// Creates a rule set without any rules.
    #[must_use]
    pub fn empty(generation: u64) -> Self {
        RuleSet {
            rules: HashMap::new(),
            generation,
            fingerprint: Sha1::digest(b"").into(),
            rule_count: 0,
        }
    }

    /// Parses a JSON configuration document.
    ///
    /// An empty or whitespace-only document yields an empty rule set.
    ///
    /// # Arguments
    ///
    /// * `data` - The raw document bytes
    /// * `generation` - The generation number the resulting set is tagged with
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if the document is not valid JSON or does not follow
    /// the schema, and [`crate::Error::ConfigParse`] / [`crate::Error::Expression`] naming
    /// the first invalid rule otherwise.
    pub fn parse(data: &[u8], generation: u64) -> Result<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::empty(generation));
        }

        let document: MockDocument = serde_json::from_slice(data)?;
        let mut set = Self::from_document(&document, generation)?;
        set.fingerprint = Sha1::digest(data).into();
        Ok(set)
    }

    /// Builds a rule set from an already deserialized document.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid rule.
    pub fn from_document(document: &MockDocument, generation: u64) -> Result<Self> {
        let mut rules = Vec::with_capacity(document.rules.len() + document.mock_methods.len());
        for (index, decl) in document.rules.iter().enumerate() {
            rules.push(rule_from_decl(decl, index)?);
        }
        for (offset, decl) in document.mock_methods.iter().enumerate() {
            rules.push(rule_from_legacy(decl, document.rules.len() + offset)?);
        }
        Self::from_rules(rules, generation)
    }

    /// Builds a rule set from rules in declaration order.
    ///
    /// Each rule's index is set to its position in `rules`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ConfigParse`] if a literal payload does not type-check
    /// against its declared return type or an exception type name is malformed.
    pub fn from_rules(rules: Vec<MockRule>, generation: u64) -> Result<Self> {
        let mut hasher = Sha1::new();
        let rule_count = rules.len();
        let mut grouped: HashMap<TargetId, Vec<Arc<MockRule>>> = HashMap::new();

        for (index, mut rule) in rules.into_iter().enumerate() {
            rule.index = index;
            rule.validate()?;
            hasher.update(
                format!(
                    "{}|{}|{}|{}|{}\n",
                    rule.target,
                    rule.priority,
                    rule.enabled,
                    rule.condition.as_ref().map_or("", Expression::source),
                    rule.action
                )
                .as_bytes(),
            );
            grouped
                .entry(rule.target.clone())
                .or_default()
                .push(Arc::new(rule));
        }

        let rules = grouped
            .into_iter()
            .map(|(target, mut list)| {
                list.sort_by_key(|rule| Reverse(rule.priority));
                (target, Arc::from(list))
            })
            .collect();

        Ok(RuleSet {
            rules,
            generation,
            fingerprint: hasher.finalize().into(),
            rule_count,
        })
    }

    /// Returns the rules for `target` in match order; empty for untracked targets.
    #[must_use]
    pub fn lookup(&self, target: &TargetId) -> &[Arc<MockRule>] {
        self.rules.get(target).map(|rules| &**rules).unwrap_or(&[])
    }

    /// Returns the shared rule list for `target`, if it is tracked.
    #[must_use]
    pub fn lookup_shared(&self, target: &TargetId) -> Option<Arc<[Arc<MockRule>]>> {
        self.rules.get(target).cloned()
    }

    /// Returns `true` if at least one rule targets `target`.
    #[must_use]
    pub fn contains(&self, target: &TargetId) -> bool {
        self.rules.contains_key(target)
    }

    /// Iterates over all targeted methods, in no particular order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetId> {
        self.rules.keys()
    }

    /// Returns all rules in declaration order.
    #[must_use]
    pub fn rules(&self) -> Vec<Arc<MockRule>> {
        let mut all: Vec<_> = self.rules.values().flat_map(|r| r.iter().cloned()).collect();
        all.sort_by_key(|rule| rule.index);
        all
    }

    /// Returns the number of distinct targets.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.rules.len()
    }

    /// Returns the total number of rules.
    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    /// Returns `true` if the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }

    /// Returns the generation this set was loaded as.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the SHA-1 digest of the source document.
    #[must_use]
    pub fn fingerprint(&self) -> &[u8; 20] {
        &self.fingerprint
    }

    /// Returns the SHA-1 digest as lowercase hex.
    #[must_use]
    pub fn fingerprint_hex(&self) -> String {
        use std::fmt::Write;

        self.fingerprint
            .iter()
            .fold(String::with_capacity(40), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }

    pub(crate) fn with_generation(mut self, generation: u64) -> Self {
        self.generation = generation;
        self
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::empty(0)
    }
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("generation", &self.generation)
            .field("targets", &self.rules.len())
            .field("rules", &self.rule_count)
            .field("fingerprint", &self.fingerprint_hex())
            .finish()
    }
}

fn target_from_decl(decl: &RuleDecl, index: usize) -> Result<TargetId> {
    let mut flags = TargetFlags::empty();
    if decl.is_static {
        flags |= TargetFlags::STATIC;
    }
    if decl.constructor {
        flags |= TargetFlags::CONSTRUCTOR;
    }

    let target = match (&decl.target, &decl.owner, &decl.member) {
        (Some(descriptor), None, None) => TargetId::parse(descriptor).and_then(|parsed| {
            if flags.is_empty() {
                Ok(parsed)
            } else {
                TargetId::new(
                    parsed.owner(),
                    parsed.member(),
                    parsed.params().to_vec(),
                    parsed.flags() | flags,
                )
            }
        }),
        (None, Some(owner), Some(member)) => decl
            .params
            .iter()
            .flatten()
            .map(|p| TypeSig::parse(p))
            .collect::<Result<Vec<_>>>()
            .and_then(|params| TargetId::new(owner, member, params, flags)),
        (None, _, _) => Err(config_error!(
            "target is missing, give 'target' or both 'owner' and 'member'"
        )),
        (Some(_), _, _) => Err(config_error!(
            "'target' cannot be combined with 'owner'/'member'"
        )),
    };
    target.map_err(|err| config_error!("rule #{}: unresolvable target: {}", index, err))
}

fn rule_from_decl(decl: &RuleDecl, index: usize) -> Result<MockRule> {
    let target = target_from_decl(decl, index)?;
    let context = |what: &str, err: crate::Error| {
        config_error!("rule #{} ({}): invalid {}: {}", index, target, what, err)
    };

    let action = match &decl.action {
        ActionDecl::Return(json) => RuleAction::ReturnLiteral(Literal::Json(json.clone())),
        ActionDecl::Throw(throw) => RuleAction::ThrowException {
            type_name: Arc::from(throw.type_name.trim()),
            message: throw
                .message
                .clone()
                .unwrap_or_else(|| DEFAULT_EXCEPTION_MESSAGE.to_string()),
        },
        ActionDecl::Delegate => RuleAction::DelegateToOriginal,
        ActionDecl::Computed(source) => RuleAction::Computed(
            Expression::compile(source).map_err(|err| context("computed expression", err))?,
        ),
    };

    let mut rule = MockRule::new(target.clone(), action)
        .with_priority(decl.priority)
        .with_enabled(decl.enabled);
    rule.index = index;
    rule.label.clone_from(&decl.label);

    if let Some(condition) = &decl.condition {
        rule.condition =
            Some(Expression::compile(condition).map_err(|err| context("condition", err))?);
    }
    if let Some(ty) = &decl.return_type {
        rule.declared_return =
            Some(TypeSig::parse(ty).map_err(|err| context("return type", err))?);
    }
    Ok(rule)
}

fn rule_from_legacy(decl: &LegacyMethodDecl, index: usize) -> Result<MockRule> {
    let params = match decl.signature.as_deref().map(str::trim) {
        None | Some("") => Vec::new(),
        Some(signature) => {
            let inner = signature
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .unwrap_or(signature);
            split_top_level(inner)
                .and_then(|parts| parts.into_iter().map(TypeSig::parse).collect())
                .map_err(|err| {
                    config_error!(
                        "mock method #{} ({}.{}): invalid signature: {}",
                        index,
                        decl.class_name,
                        decl.method_name,
                        err
                    )
                })?
        }
    };
    let target = TargetId::new(&decl.class_name, &decl.method_name, params, TargetFlags::empty())
        .map_err(|err| config_error!("mock method #{}: unresolvable target: {}", index, err))?;

    let action = if decl.throw_exception {
        RuleAction::ThrowException {
            type_name: Arc::from(
                decl.exception_type
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .unwrap_or(DEFAULT_EXCEPTION_TYPE),
            ),
            message: decl
                .exception_message
                .clone()
                .unwrap_or_else(|| DEFAULT_EXCEPTION_MESSAGE.to_string()),
        }
    } else {
        RuleAction::ReturnLiteral(Literal::Text(decl.return_value.clone().unwrap_or_default()))
    };

    let return_type = TypeSig::parse(&decl.effective_return_type())
        .map_err(|err| config_error!("mock method #{}: invalid return type: {}", index, err))?;

    let mut rule = MockRule::new(target, action)
        .with_enabled(decl.enabled)
        .with_return_type(return_type);
    rule.index = index;
    Ok(rule)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{value::Value, Error};

    fn target(descriptor: &str) -> TargetId {
        TargetId::parse(descriptor).unwrap()
    }

    #[test]
    fn test_empty_document() {
        let set = RuleSet::parse(b"  \n", 3).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.generation(), 3);
        assert!(set.lookup(&target("A.b()")).is_empty());
    }

    #[test]
    fn test_priority_then_declaration_order() {
        let set = RuleSet::parse(
            br#"{ "rules": [
                { "target": "S.f(int)", "label": "first", "action": { "return": 1 } },
                { "target": "S.f(int)", "label": "high", "priority": 5, "action": { "return": 2 } },
                { "target": "S.f(int)", "label": "second", "action": { "return": 3 } },
                { "target": "S.g()", "action": "delegate" }
            ] }"#,
            1,
        )
        .unwrap();

        let labels: Vec<_> = set
            .lookup(&target("S.f(int)"))
            .iter()
            .map(|r| r.label().unwrap())
            .collect();
        assert_eq!(labels, vec!["high", "first", "second"]);
        assert_eq!(set.rule_count(), 4);
        assert_eq!(set.target_count(), 2);
        assert_eq!(set.rules()[3].index(), 3);
    }

    #[test]
    fn test_duplicate_targets_merge_across_forms() {
        let set = RuleSet::parse(
            br#"{
                "rules": [ { "owner": "com.acme.Repo", "member": "count", "action": { "return": 1 } } ],
                "mockMethods": [ { "className": "com.acme.Repo", "methodName": "count",
                                   "signature": "()", "returnValue": "2" } ]
            }"#,
            1,
        )
        .unwrap();
        let rules = set.lookup(&target("com.acme.Repo.count()"));
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].declared_return(), Some(&TypeSig::INT));
    }

    #[test]
    fn test_legacy_throw_defaults() {
        let set = RuleSet::parse(
            br#"{ "mockMethods": [ { "className": "A", "methodName": "b",
                  "signature": "(long, String)", "throwException": true } ] }"#,
            1,
        )
        .unwrap();
        let rules = set.lookup(&target("A.b(long,String)"));
        assert_eq!(
            rules[0].action(),
            &RuleAction::ThrowException {
                type_name: Arc::from("java.lang.RuntimeException"),
                message: "Mocked exception".to_string()
            }
        );
    }

    #[test]
    fn test_literal_type_checked_against_declared_type() {
        let err = RuleSet::parse(
            br#"{ "rules": [ { "target": "A.b()", "returnType": "int",
                  "action": { "return": "forty-two" } } ] }"#,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));
        assert!(err.to_string().contains("rule #0 (A.b())"));

        // Named types are only checked when a value is produced
        assert!(RuleSet::parse(
            br#"{ "rules": [ { "target": "A.b()", "returnType": "com.acme.User",
                  "action": { "return": 5 } } ] }"#,
            1,
        )
        .is_ok());
    }

    #[test]
    fn test_invalid_documents() {
        assert!(matches!(RuleSet::parse(b"{ nope", 1), Err(Error::Json(_))));
        assert!(RuleSet::parse(br#"{ "rules": [ { "action": "delegate" } ] }"#, 1).is_err());
        assert!(RuleSet::parse(
            br#"{ "rules": [ { "target": ".add()", "action": "delegate" } ] }"#,
            1
        )
        .is_err());
        assert!(RuleSet::parse(
            br#"{ "rules": [ { "target": "A.b()", "condition": "arg0 ==", "action": "delegate" } ] }"#,
            1
        )
        .is_err());
        assert!(RuleSet::parse(
            br#"{ "rules": [ { "target": "A.b()", "action": { "throw": { "type": "Bad Name" } } } ] }"#,
            1
        )
        .is_err());
    }

    #[test]
    fn test_fingerprint_tracks_source() {
        let a = RuleSet::parse(br#"{ "rules": [] }"#, 1).unwrap();
        let b = RuleSet::parse(br#"{"rules":[]}"#, 1).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint_hex().len(), 40);
        assert_eq!(
            RuleSet::empty(0).fingerprint_hex(),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn test_programmatic_rules() {
        let t = target("Calc.add(int,int)");
        let rule = MockRule::new(t.clone(), RuleAction::ReturnLiteral(Literal::Json(7.into())))
            .with_return_type(TypeSig::INT);
        assert!(rule.is_constant());

        let set = RuleSet::from_rules(vec![rule], 9).unwrap();
        assert_eq!(set.generation(), 9);
        match set.lookup(&t)[0].action() {
            RuleAction::ReturnLiteral(lit) => assert_eq!(lit.to_value(), Value::Int(7)),
            other => panic!("unexpected action {other:?}"),
        }
    }

    #[test]
    fn test_static_flag_on_descriptor() {
        let set = RuleSet::parse(
            br#"{ "rules": [ { "target": "Util.now()", "static": true, "action": "delegate" } ] }"#,
            1,
        )
        .unwrap();
        assert!(set.contains(&target("static Util.now()")));
        assert!(!set.contains(&target("Util.now()")));
    }
}
