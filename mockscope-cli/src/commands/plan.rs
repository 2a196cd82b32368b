use std::{collections::HashSet, path::Path};

use mockscope::TransformPlan;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    commands::common::load_rules,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub install: Vec<String>,
    pub remove: Vec<String>,
    pub unchanged: Vec<String>,
}

pub fn run(path: &Path, from: Option<&Path>, opts: &GlobalOptions) -> anyhow::Result<()> {
    let installed: HashSet<_> = match from {
        Some(previous) => load_rules(previous, 1)?.targets().cloned().collect(),
        None => HashSet::new(),
    };
    let next = load_rules(path, 2)?;
    let plan = TransformPlan::compute(&installed, &next);

    let mut unchanged: Vec<String> = next
        .targets()
        .filter(|target| installed.contains(*target))
        .map(ToString::to_string)
        .collect();
    unchanged.sort();

    let output = PlanOutput {
        install: plan.install().iter().map(ToString::to_string).collect(),
        remove: plan.remove().iter().map(ToString::to_string).collect(),
        unchanged,
    };

    print_output(&output, opts, |o| {
        if o.install.is_empty() && o.remove.is_empty() {
            println!("No changes ({} targets stay installed)", o.unchanged.len());
            return;
        }

        let mut tw = TabWriter::new(&[("", Align::Left), ("Target", Align::Left)]);
        for target in &o.install {
            tw.row(vec!["+".to_string(), target.clone()]);
        }
        for target in &o.remove {
            tw.row(vec!["-".to_string(), target.clone()]);
        }
        for target in &o.unchanged {
            tw.row(vec!["=".to_string(), target.clone()]);
        }
        tw.print();
        println!();
        println!(
            "{} to install, {} to remove, {} unchanged",
            o.install.len(),
            o.remove.len(),
            o.unchanged.len()
        );
    })
}
