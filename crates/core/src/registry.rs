// crates/core/src/registry.rs
//
// Tree of agents discovered while a run is in progress. The root agent is
// pre-registered; every other agent is announced mid-stream by the tool result
// that spawned it.
//
// Forward references: a child whose parent has not been announced yet is
// attached under the root immediately and is never re-parented later.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};
use ts_rs::TS;

/// Id of the pre-registered root agent.
pub const ROOT_AGENT_ID: &str = "main";
const ROOT_AGENT_NAME: &str = "Main Agent";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Running,
    Completed,
    Failed,
    Unknown,
}

impl AgentStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "running" | "started" | "in_progress" | "active" => AgentStatus::Running,
            "completed" | "complete" | "finished" | "success" | "done" => AgentStatus::Completed,
            "failed" | "error" | "crashed" | "stopped" | "killed" => AgentStatus::Failed,
            _ => AgentStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,
    /// `None` only for the root agent.
    pub parent_id: Option<String>,
    pub status: AgentStatus,
    /// Child ids in discovery order.
    pub children: Vec<String>,
}

/// Outcome of [`AgentRegistry::register_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// False when the id was already registered (or rejected).
    pub inserted: bool,
    /// Parent the agent actually hangs under. Differs from the requested
    /// parent when the request was a forward reference.
    pub attached_to: Option<String>,
}

/// Renderer-facing view of one agent. The tree is flat: links are ids.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[cfg_attr(feature = "codegen", ts(export, export_to = "../../../web/src/types/generated/"))]
#[serde(rename_all = "camelCase")]
pub struct AgentView {
    pub id: String,
    pub name: String,
    pub status: AgentStatus,
    pub parent_id: Option<String>,
    pub children: Vec<String>,
}

impl From<&Agent> for AgentView {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id.clone(),
            name: agent.name.clone(),
            status: agent.status,
            parent_id: agent.parent_id.clone(),
            children: agent.children.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: HashMap<String, Agent>,
    /// Ids in discovery order, root first.
    order: Vec<String>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentRegistry {
    /// A registry holding only the root agent.
    pub fn new() -> Self {
        let root = Agent {
            id: ROOT_AGENT_ID.to_string(),
            name: ROOT_AGENT_NAME.to_string(),
            parent_id: None,
            status: AgentStatus::Running,
            children: Vec::new(),
        };
        let mut agents = HashMap::new();
        agents.insert(root.id.clone(), root);
        Self {
            agents,
            order: vec![ROOT_AGENT_ID.to_string()],
        }
    }

    /// Register an agent unless its id is already known.
    ///
    /// A missing, unknown, or self-referencing parent attaches the agent under
    /// the root. Re-registering an existing id changes nothing, not even its
    /// name or parent.
    pub fn register_if_absent(&mut self, id: &str, parent_id: Option<&str>, name: &str) -> Registration {
        if id.is_empty() {
            debug!("ignoring agent registration with empty id");
            return Registration {
                inserted: false,
                attached_to: None,
            };
        }
        if let Some(existing) = self.agents.get(id) {
            return Registration {
                inserted: false,
                attached_to: existing.parent_id.clone(),
            };
        }

        let parent = match parent_id {
            Some(p) if p != id && self.agents.contains_key(p) => p.to_string(),
            Some(p) if p != id => {
                debug!(agent_id = id, parent_id = p, "parent not yet announced, attaching under root");
                ROOT_AGENT_ID.to_string()
            }
            _ => ROOT_AGENT_ID.to_string(),
        };

        let name = if name.trim().is_empty() { id } else { name };
        self.agents.insert(
            id.to_string(),
            Agent {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: Some(parent.clone()),
                status: AgentStatus::Running,
                children: Vec::new(),
            },
        );
        if let Some(p) = self.agents.get_mut(&parent) {
            p.children.push(id.to_string());
        }
        self.order.push(id.to_string());
        debug!(agent_id = id, parent_id = %parent, "agent registered");

        Registration {
            inserted: true,
            attached_to: Some(parent),
        }
    }

    /// Update an agent's status. Returns false (and logs) for unknown ids.
    pub fn mark_status(&mut self, id: &str, status: AgentStatus) -> bool {
        match self.agents.get_mut(id) {
            Some(agent) => {
                agent.status = status;
                true
            }
            None => {
                warn!(agent_id = id, ?status, "status update for unknown agent ignored");
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// Root ids. Always exactly the pre-registered root.
    pub fn roots(&self) -> Vec<&str> {
        vec![ROOT_AGENT_ID]
    }

    /// Number of registered agents, root included.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Always false: the root is registered at construction.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Agents in discovery order, root first.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    /// Flat views in discovery order, root first. Parents precede children.
    pub fn views(&self) -> Vec<AgentView> {
        self.iter().map(AgentView::from).collect()
    }
}

/// Depth-first walk from the root, each agent paired with its depth.
///
/// Uses an explicit stack; chains of any depth are fine.
pub fn walk(views: &[AgentView]) -> Vec<(usize, &AgentView)> {
    let by_id: HashMap<&str, &AgentView> = views.iter().map(|v| (v.id.as_str(), v)).collect();
    let mut seen = HashSet::with_capacity(views.len());
    let mut out = Vec::with_capacity(views.len());
    let mut stack = vec![(0usize, ROOT_AGENT_ID)];

    while let Some((depth, id)) = stack.pop() {
        let Some(view) = by_id.get(id).copied() else {
            continue;
        };
        if !seen.insert(id) {
            continue;
        }
        out.push((depth, view));
        stack.extend(view.children.iter().rev().map(|c| (depth + 1, c.as_str())));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_registry_has_only_root() {
        let registry = AgentRegistry::new();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.roots(), vec!["main"]);
        let root = registry.get(ROOT_AGENT_ID).unwrap();
        assert!(root.parent_id.is_none());
        assert_eq!(root.status, AgentStatus::Running);
    }

    #[test]
    fn test_register_under_known_parent() {
        let mut registry = AgentRegistry::new();
        let reg = registry.register_if_absent("a1", Some("main"), "Recon");
        assert_eq!(
            reg,
            Registration {
                inserted: true,
                attached_to: Some("main".into())
            }
        );
        registry.register_if_absent("a2", Some("a1"), "Exploit");
        assert_eq!(registry.get("a1").unwrap().children, vec!["a2".to_string()]);
        assert_eq!(registry.get("a2").unwrap().parent_id.as_deref(), Some("a1"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = AgentRegistry::new();
        registry.register_if_absent("a1", Some("main"), "Recon");
        let again = registry.register_if_absent("a1", Some("main"), "Renamed");
        assert!(!again.inserted);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("a1").unwrap().name, "Recon");
        assert_eq!(registry.get("main").unwrap().children.len(), 1);
    }

    #[test]
    fn test_forward_reference_attaches_under_root() {
        let mut registry = AgentRegistry::new();
        let reg = registry.register_if_absent("child", Some("later"), "Child");
        assert_eq!(reg.attached_to.as_deref(), Some("main"));

        // The parent showing up afterwards does not re-parent the child.
        registry.register_if_absent("later", Some("main"), "Later");
        assert_eq!(registry.get("child").unwrap().parent_id.as_deref(), Some("main"));
        assert!(registry.get("later").unwrap().children.is_empty());
    }

    #[test]
    fn test_missing_or_self_parent_attaches_under_root() {
        let mut registry = AgentRegistry::new();
        registry.register_if_absent("a1", None, "One");
        registry.register_if_absent("a2", Some("a2"), "Two");
        assert_eq!(registry.get("main").unwrap().children, vec!["a1".to_string(), "a2".to_string()]);
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut registry = AgentRegistry::new();
        assert!(!registry.register_if_absent("", Some("main"), "Nameless").inserted);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_blank_name_falls_back_to_id() {
        let mut registry = AgentRegistry::new();
        registry.register_if_absent("a9", Some("main"), "  ");
        assert_eq!(registry.get("a9").unwrap().name, "a9");
    }

    #[test]
    fn test_mark_status_known_and_unknown() {
        let mut registry = AgentRegistry::new();
        registry.register_if_absent("a1", Some("main"), "Recon");
        assert!(registry.mark_status("a1", AgentStatus::Completed));
        assert_eq!(registry.get("a1").unwrap().status, AgentStatus::Completed);
        assert!(!registry.mark_status("ghost", AgentStatus::Failed));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_walk_visits_depth_first() {
        let mut registry = AgentRegistry::new();
        registry.register_if_absent("a1", Some("main"), "Recon");
        registry.register_if_absent("b1", Some("main"), "Report");
        registry.register_if_absent("a2", Some("a1"), "Exploit");
        let views = registry.views();
        let order: Vec<(usize, &str)> = walk(&views).into_iter().map(|(d, v)| (d, v.id.as_str())).collect();
        assert_eq!(order, vec![(0, "main"), (1, "a1"), (2, "a2"), (1, "b1")]);
        assert_eq!(views[3].parent_id.as_deref(), Some("a1"));
        assert_eq!(views[1].children, vec!["a2".to_string()]);
    }

    #[test]
    fn test_deep_chain_views_and_walk() {
        let mut registry = AgentRegistry::new();
        let mut parent = ROOT_AGENT_ID.to_string();
        for i in 0..20_000 {
            let id = format!("agent-{i}");
            registry.register_if_absent(&id, Some(&parent), "");
            parent = id;
        }
        let views = registry.views();
        let walked = walk(&views);
        assert_eq!(walked.len(), 20_001);
        assert_eq!(walked.last().map(|(d, v)| (*d, v.id.as_str())), Some((20_000, "agent-19999")));
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(AgentStatus::from_label("RUNNING"), AgentStatus::Running);
        assert_eq!(AgentStatus::from_label("completed"), AgentStatus::Completed);
        assert_eq!(AgentStatus::from_label("error"), AgentStatus::Failed);
        assert_eq!(AgentStatus::from_label("waiting"), AgentStatus::Unknown);
    }
}
