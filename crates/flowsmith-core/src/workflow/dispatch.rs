//! Capability dispatch table.
//!
//! Every node capability maps to one handler kind. Built-in agent kinds, tools
//! and sub-workflows are always present; custom agent tags must be registered
//! before templates that use them validate or dispatch.

use std::collections::BTreeSet;

use flowsmith_types::workflow::Capability;
use serde_json::Value;

/// Which collaborator handles a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Agent,
    Tool,
    SubWorkflow,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    custom_agents: BTreeSet<String>,
}

impl CapabilityTable {
    /// Only the built-in capabilities.
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Built-ins plus the given custom agent tags.
    pub fn with_custom_agents<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::builtin();
        for tag in tags {
            table.register_agent(tag);
        }
        table
    }

    /// Route a custom tag to the agent invoker.
    pub fn register_agent(&mut self, tag: impl Into<String>) {
        self.custom_agents.insert(tag.into());
    }

    pub fn resolve(&self, capability: &Capability) -> Option<Handler> {
        match capability {
            Capability::Researcher | Capability::Analyst | Capability::Writer => Some(Handler::Agent),
            Capability::Tool => Some(Handler::Tool),
            Capability::SubWorkflow => Some(Handler::SubWorkflow),
            Capability::Custom(tag) => self.custom_agents.contains(tag).then_some(Handler::Agent),
        }
    }

    /// Registered custom tags, sorted.
    pub fn custom_tags(&self) -> impl Iterator<Item = &str> {
        self.custom_agents.iter().map(String::as_str)
    }
}

/// Convert agent text into a stored output.
///
/// Text that parses as a JSON object is stored structured, so routing rules can
/// inspect its fields; anything else is stored as a string. Text longer than
/// `max_bytes` is cut at a character boundary first.
pub fn agent_output(node_id: &str, text: String, max_bytes: Option<usize>) -> Value {
    let text = match max_bytes {
        Some(max) if text.len() > max => {
            tracing::warn!(
                node_id,
                size = text.len(),
                max,
                "agent output exceeds size limit, truncating"
            );
            let mut cut = max;
            while !text.is_char_boundary(cut) {
                cut -= 1;
            }
            text[..cut].to_string()
        }
        _ => text,
    };

    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ Value::Object(_)) => value,
        _ => Value::String(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_resolution() {
        let table = CapabilityTable::builtin();
        assert_eq!(table.resolve(&Capability::Writer), Some(Handler::Agent));
        assert_eq!(table.resolve(&Capability::Tool), Some(Handler::Tool));
        assert_eq!(table.resolve(&Capability::SubWorkflow), Some(Handler::SubWorkflow));
        assert_eq!(table.resolve(&Capability::Custom("critic".into())), None);
    }

    #[test]
    fn test_custom_agents() {
        let table = CapabilityTable::with_custom_agents(["critic", "editor"]);
        assert_eq!(table.resolve(&Capability::Custom("critic".into())), Some(Handler::Agent));
        assert_eq!(table.custom_tags().collect::<Vec<_>>(), vec!["critic", "editor"]);
    }

    #[test]
    fn test_agent_output_parsing() {
        assert_eq!(
            agent_output("n", r#" {"score": 9} "#.to_string(), None),
            json!({"score": 9})
        );
        assert_eq!(agent_output("n", "[1, 2]".to_string(), None), json!("[1, 2]"));
        assert_eq!(agent_output("n", "plain".to_string(), None), json!("plain"));
    }

    #[test]
    fn test_agent_output_truncation() {
        assert_eq!(agent_output("n", "abcdef".to_string(), Some(4)), json!("abcd"));
        // "é" is two bytes; never split it.
        assert_eq!(agent_output("n", "aé".to_string(), Some(2)), json!("a"));
    }
}
