//! Arithmetic checking.
//!
//! Simple `a op b = c` statements are verified locally, so this plugin is
//! useful even without a reasoning service. With one, the chunk is also
//! reviewed for errors in percentages, units and worded calculations.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use super::{analysis_request, parse_findings, AnalysisContext, ChunkAnalysis, Plugin, PluginError};
use crate::analysis::router::{CostTier, RoutingExample};
use crate::models::{Chunk, Finding, Importance};

const INSTRUCTIONS: &str = "You are checking the mathematics in a document. Find incorrect \
calculations, wrong percentages, inconsistent totals and unit errors. Do not re-report simple \
equations of the form `a + b = c`; those are checked separately. Only report real errors.";

static EQUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(\d+(?:\.\d+)?)(?:\s*([+\-*/×÷])\s*|\s+([xX])\s+)(\d+(?:\.\d+)?)\s*=\s*(-?\d+(?:\.\d+)?)",
    )
    .unwrap()
});

/// One arithmetic statement found in text.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub start: usize,
    pub end: usize,
    pub left: f64,
    pub op: char,
    pub right: f64,
    pub stated: f64,
    stated_decimals: usize,
}

impl Equation {
    /// The correct result, or `None` for division by zero.
    pub fn expected(&self) -> Option<f64> {
        match self.op {
            '+' => Some(self.left + self.right),
            '-' => Some(self.left - self.right),
            '*' | '×' | 'x' | 'X' => Some(self.left * self.right),
            '/' | '÷' if self.right == 0.0 => None,
            '/' | '÷' => Some(self.left / self.right),
            _ => None,
        }
    }

    /// Whether the stated result matches at its own precision.
    pub fn is_correct(&self) -> bool {
        match self.expected() {
            Some(expected) => {
                let tolerance = 0.5 * 10f64.powi(-(self.stated_decimals as i32)) + 1e-9;
                (expected - self.stated).abs() <= tolerance
            }
            None => false,
        }
    }
}

fn decimals(number: &str) -> usize {
    number.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0)
}

/// Find `a op b = c` statements. Numbers embedded in longer numerals
/// (`1,000`, `1.2.3`) are skipped.
pub fn find_equations(text: &str) -> Vec<Equation> {
    let mut equations = Vec::new();
    for caps in EQUATION.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let before = text[..whole.start()].chars().next_back();
        let mut after = text[whole.end()..].chars();
        let embedded_before = matches!(before, Some('.' | ',' | '-'));
        let embedded_after = match (after.next(), after.next()) {
            (Some(c), _) if c.is_ascii_digit() => true,
            (Some('.' | ','), Some(d)) => d.is_ascii_digit(),
            _ => false,
        };
        if embedded_before || embedded_after {
            continue;
        }

        let op = caps
            .get(2)
            .or_else(|| caps.get(3))
            .and_then(|m| m.as_str().chars().next());
        let (Some(op), Ok(left), Ok(right), Ok(stated)) = (
            op,
            caps[1].parse::<f64>(),
            caps[4].parse::<f64>(),
            caps[5].parse::<f64>(),
        ) else {
            continue;
        };
        equations.push(Equation {
            start: whole.start(),
            end: whole.end(),
            left,
            op,
            right,
            stated,
            stated_decimals: decimals(&caps[5]),
        });
    }
    equations
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.6}", value);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// Findings for every incorrect statement in `text`.
pub fn check_arithmetic(plugin_name: &str, text: &str) -> Vec<Finding> {
    find_equations(text)
        .into_iter()
        .filter(|eq| !eq.is_correct())
        .map(|eq| {
            let quoted = &text[eq.start..eq.end];
            let description = match eq.expected() {
                Some(expected) => format!(
                    "Incorrect arithmetic: {} {} {} is {}, not {}",
                    format_number(eq.left),
                    eq.op,
                    format_number(eq.right),
                    format_number(expected),
                    format_number(eq.stated)
                ),
                None => "Division by zero".to_string(),
            };
            Finding::new(plugin_name, quoted, description).with_importance(Importance::High)
        })
        .collect()
}

pub struct MathPlugin;

impl MathPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for MathPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for MathPlugin {
    fn name(&self) -> &str {
        "math"
    }

    fn when_to_use(&self) -> &str {
        "Passages containing calculations, equations, percentages, totals or numeric claims derived from other numbers."
    }

    fn routing_examples(&self) -> Vec<RoutingExample> {
        vec![
            RoutingExample::new(
                "Revenue grew from 40 million to 50 million, an increase of 20 percent.",
                true,
                "percentage derived from stated figures",
            ),
            RoutingExample::new(
                "The village sits at the foot of the mountains and is known for its cheese.",
                false,
                "no quantities",
            ),
        ]
    }

    fn keywords(&self) -> Vec<String> {
        ["=", "%", "percent", "average", "total of", "sum of"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn cost_tier(&self) -> CostTier {
        CostTier::Low
    }

    fn priority(&self) -> u32 {
        20
    }

    async fn analyze_chunk(
        &self,
        chunk: &Chunk,
        ctx: &AnalysisContext<'_>,
    ) -> Result<ChunkAnalysis, PluginError> {
        let mut findings = check_arithmetic(self.name(), &chunk.text);
        let checked = findings.len();
        let mut summary = match checked {
            0 => String::new(),
            n => format!("{} incorrect equation(s)", n),
        };

        if ctx.has_service() {
            let response = ctx.invoke(&analysis_request(INSTRUCTIONS, chunk)).await?;
            let reviewed = parse_findings(self.name(), &response)?;
            for finding in reviewed.findings {
                let duplicate = findings
                    .iter()
                    .any(|f| f.quoted_text.trim() == finding.quoted_text.trim());
                if !duplicate {
                    findings.push(finding);
                }
            }
            if !reviewed.summary.trim().is_empty() {
                if !summary.is_empty() {
                    summary.push_str("; ");
                }
                summary.push_str(reviewed.summary.trim());
            }
        }

        Ok(ChunkAnalysis { summary, findings })
    }
}
