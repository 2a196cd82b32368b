use anyhow::Context;
use mockscope::expr::Expression;
use serde::Serialize;

use crate::{app::GlobalOptions, commands::common::parse_value, output::print_output};

#[derive(Debug, Serialize)]
pub struct EvalOutput {
    pub expression: String,
    pub args: Vec<serde_json::Value>,
    pub result: serde_json::Value,
    #[serde(rename = "type")]
    pub type_name: String,
}

pub fn run(source: &str, raw_args: &[String], opts: &GlobalOptions) -> anyhow::Result<()> {
    let expression = Expression::compile(source).context("failed to compile expression")?;
    let args: Vec<_> = raw_args.iter().map(|raw| parse_value(raw)).collect();
    let result = expression
        .evaluate(&args)
        .with_context(|| format!("failed to evaluate `{source}`"))?;

    let output = EvalOutput {
        expression: expression.to_string(),
        args: args.iter().map(|arg| arg.to_json()).collect(),
        type_name: result.type_name().to_string(),
        result: result.to_json(),
    };

    print_output(&output, opts, |o| {
        println!("{} : {}", o.result, o.type_name);
    })
}
