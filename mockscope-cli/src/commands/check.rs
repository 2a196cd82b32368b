use std::path::Path;

use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::{file_display_name, load_rules},
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub file: String,
    pub fingerprint: String,
    pub target_count: usize,
    pub rule_count: usize,
    pub rules: Vec<RuleInfo>,
}

#[derive(Debug, Serialize)]
pub struct RuleInfo {
    pub index: usize,
    pub target: String,
    pub priority: i32,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

pub fn run(path: &Path, opts: &GlobalOptions) -> anyhow::Result<()> {
    let rules = load_rules(path, 1)?;

    let mut infos: Vec<RuleInfo> = rules
        .rules()
        .iter()
        .map(|rule| RuleInfo {
            index: rule.index(),
            target: rule.target().to_string(),
            priority: rule.priority(),
            enabled: rule.is_enabled(),
            condition: rule.condition().map(ToString::to_string),
            action: rule.action().to_string(),
            returns: rule.declared_return().map(ToString::to_string),
            label: rule.label().map(str::to_string),
        })
        .collect();
    infos.sort_by_key(|info| info.index);

    let report = CheckReport {
        file: file_display_name(path),
        fingerprint: rules.fingerprint_hex(),
        target_count: rules.target_count(),
        rule_count: rules.rule_count(),
        rules: infos,
    };

    print_output(&report, opts, |r| {
        println!("{}: {} rules across {} targets", r.file, r.rule_count, r.target_count);
        println!("Fingerprint: {}", r.fingerprint);
        if r.rules.is_empty() {
            return;
        }
        println!();

        let mut tw = TabWriter::new(&[
            ("#", Align::Right),
            ("Target", Align::Left),
            ("Prio", Align::Right),
            ("When", Align::Left),
            ("Action", Align::Left),
        ]);
        for rule in &r.rules {
            let mut action = rule.action.clone();
            if !rule.enabled {
                action.push_str(" (disabled)");
            }
            tw.row(vec![
                rule.index.to_string(),
                rule.target.clone(),
                rule.priority.to_string(),
                rule.condition.clone().unwrap_or_else(|| "always".to_string()),
                action,
            ]);
        }
        tw.print();
    })
}
