use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::AgentError;
use crate::model::ToolSpec;
use crate::tool::{tool_spec, ToolInvoker};

const MAX_NAME_LEN: usize = 64;

/// The tools one participant may call, keyed by name.
#[derive(Clone, Default)]
pub struct CapabilitySet {
    tools: Vec<Arc<dyn ToolInvoker>>,
}

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a set, rejecting names a completion backend could not address
    /// and duplicates.
    pub fn new(tools: Vec<Arc<dyn ToolInvoker>>) -> Result<Self, AgentError> {
        let mut seen = HashSet::new();
        for tool in &tools {
            let name = tool.name();
            validate_name(name)?;
            if !seen.insert(name.to_string()) {
                return Err(AgentError::Configuration(format!(
                    "Duplicate capability name: {name}"
                )));
            }
        }
        Ok(Self { tools })
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| tool_spec(t.as_ref())).collect()
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn ToolInvoker>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn validate_name(name: &str) -> Result<(), AgentError> {
    if name.is_empty() {
        return Err(AgentError::Configuration(
            "Capability name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AgentError::Configuration(format!(
            "Capability name longer than {MAX_NAME_LEN} characters: {name}"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AgentError::Configuration(format!(
            "Capability name has invalid characters: {name}"
        )));
    }
    Ok(())
}
