use crate::periods::Period;
use crate::tracers::{Trace, TraceStep};
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the traced computation of `variable` for `period` as an
/// indented tree, dependencies below their readers.
///
/// A request already printed higher up is shown as a reference to the
/// level where it first appeared.
pub fn format_trace(trace: &Trace, variable: &str, period: Period) -> String {
    let mut tracer = Tracer { trace, visited_at_level: HashMap::new(), output: String::new() };

    if trace.step(variable, period).is_some() {
        let _ = writeln!(tracer.output, "AUDIT TRACE for variable '{}<{}>':", variable, period);
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(variable, period, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: '{}<{}>' was not traced", variable, period);
    }
    tracer.output
}

struct Tracer<'a> {
    trace: &'a Trace,
    visited_at_level: HashMap<(String, Period), usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, variable: &str, period: Period, level: usize, prefix: &str) {
        let key = (variable.to_string(), period);
        if let Some(&first_seen) = self.visited_at_level.get(&key) {
            let _ = writeln!(self.output, "{}-> (Ref to L{})", prefix, first_seen);
            return;
        }
        self.visited_at_level.insert(key, level);

        let trace = self.trace;
        let Some(step) = trace.step(variable, period) else {
            let _ = writeln!(self.output, "{}[L{}] {}<{}>[?]", prefix, level, variable, period);
            return;
        };
        let line_header = format!("[L{}] {}<{}>{}", level, step.variable, step.requested, step.value);

        match &step.formula {
            None => {
                let _ = writeln!(self.output, "{}{} -> Input", prefix, line_header);
            }
            Some(formula) => {
                let formula_str = self.format_formula(formula, step);
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, formula_str);
                let stem = self.build_child_stem(prefix);
                if step.period != step.requested {
                    let _ = writeln!(self.output, "{}|  stored for <{}>", stem, step.period);
                }
                if !step.parameters.is_empty() {
                    let instants: Vec<String> = step.parameters.iter().map(ToString::to_string).collect();
                    let _ = writeln!(self.output, "{}|  parameters at {}", stem, instants.join(", "));
                }
                self.recurse_children(prefix, step, level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, step: &'a TraceStep, level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, input) in step.inputs.iter().enumerate() {
            let is_last_child = i == step.inputs.len() - 1;
            let connector = if is_last_child { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(&input.variable, input.period, level + 1, &full_prefix);
        }
    }

    fn format_formula(&self, formula: &str, step: &TraceStep) -> String {
        let arguments: Vec<String> = step
            .inputs
            .iter()
            .map(|input| {
                let value = self
                    .trace
                    .step(&input.variable, input.period)
                    .map_or("[?]", |traced| traced.value.as_str());
                format!("{}{}", input.variable, value)
            })
            .collect();
        format!("{}({})", formula, arguments.join(", "))
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracers::TracedInput;

    fn step(variable: &str, inputs: &[&str], value: &str) -> TraceStep {
        let period: Period = "2015".parse().unwrap();
        TraceStep {
            variable: variable.to_string(),
            entity: "persons".to_string(),
            requested: period,
            period,
            formula: (!inputs.is_empty()).then(|| variable.to_string()),
            inputs: inputs
                .iter()
                .map(|name| TracedInput { variable: name.to_string(), period })
                .collect(),
            parameters: Vec::new(),
            is_computed: !inputs.is_empty(),
            default_inputs: false,
            value: value.to_string(),
        }
    }

    #[test]
    fn test_tree_shows_inputs_and_references() {
        let mut trace = Trace::new();
        trace.record(step("salary", &[], "[1000]"));
        trace.record(step("tax", &["salary"], "[200]"));
        trace.record(step("net", &["salary", "tax"], "[800]"));

        let rendered = format_trace(&trace, "net", "2015".parse().unwrap());
        let expected = "\
AUDIT TRACE for variable 'net<2015>':
--------------------------------------------------
[L1] net<2015>[800] = net(salary[1000], tax[200])
|--[L2] salary<2015>[1000] -> Input
`--[L2] tax<2015>[200] = tax(salary[1000])
   `---> (Ref to L2)
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_untraced_request() {
        let rendered = format_trace(&Trace::new(), "net", "2015".parse().unwrap());
        assert_eq!(rendered, "Error: 'net<2015>' was not traced\n");
    }
}
