//! Default prompts for routing, location escalation and plugin analysis.
//!
//! Placeholders are replaced with `str::replace`; unknown placeholders are
//! left untouched.

/// Prompt for deciding whether a chunk is worth sending to an analyzer.
pub const ROUTING_PROMPT: &str = r#"You decide whether a document analyzer should examine a passage.

Analyzer: {plugin}
When to use it: {when_to_use}

Labeled examples:
{examples}

Passage:
"""
{chunk}
"""

Respond with ONLY a JSON object: {"shouldProcess": true|false, "reason": "<one short sentence>"}"#;

/// Prompt for recovering the exact wording of a quote inside a passage.
pub const LOCATE_PROMPT: &str = r#"An analyzer quoted text from the passage below, but the quote may be paraphrased, truncated, or differently punctuated.

Quote: "{quote}"
{hint}
Passage:
"""
{chunk}
"""

Copy the passage text that the quote refers to EXACTLY as it appears in the passage, character for character.
Respond with ONLY a JSON object: {"found": true|false, "exactText": "<verbatim passage text>"}"#;

/// Wrapper shared by all analysis plugins.
pub const ANALYSIS_PROMPT: &str = r#"{instructions}

Quote each problem exactly as it appears in the text (copy it verbatim, keep it short: the smallest span that shows the problem). If the same wording appears more than once, add a few surrounding words as contextHint.

Text to analyze:
"""
{chunk}
"""

Respond with ONLY a JSON object:
{"summary": "<one sentence>", "findings": [{"quotedText": "...", "contextHint": "...", "importance": "low|medium|high|critical", "description": "..."}]}
Use an empty findings array when there are no problems."#;

/// JSON schema for routing responses.
pub fn routing_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "shouldProcess": {"type": "boolean"},
            "reason": {"type": "string"}
        },
        "required": ["shouldProcess", "reason"]
    })
}

/// JSON schema for location escalation responses.
pub fn locate_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "found": {"type": "boolean"},
            "exactText": {"type": "string"}
        },
        "required": ["found"]
    })
}

/// JSON schema for plugin analysis responses.
pub fn findings_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "summary": {"type": "string"},
            "findings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "quotedText": {"type": "string"},
                        "contextHint": {"type": "string"},
                        "importance": {"type": "string", "enum": ["low", "medium", "high", "critical"]},
                        "description": {"type": "string"}
                    },
                    "required": ["quotedText", "description"]
                }
            }
        },
        "required": ["findings"]
    })
}
