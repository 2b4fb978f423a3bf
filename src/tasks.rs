//! Work items, the static phase → work item table, and task assembly.
//!
//! Assembly collects the work items implied by a selection and orders them
//! topologically over explicit prerequisite edges (Kahn's algorithm), breaking
//! ties by the canonical `WorkItem` order. The result never holds duplicates
//! and does not depend on the order in which rules fired.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::agent::AgentRole;
use crate::roadmap::RoadmapPhase;
use crate::selection::Selection;

/// A unit of generation work assigned to a role agent.
///
/// Declaration order is the canonical order used to break ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItem {
    AnalyzeRequirements,
    DesignArchitecture,
    BackendAuthSkeleton,
    FrontendLoginDashboardSkeleton,
    BackendChatSkeleton,
    FrontendChat,
    TestPlans,
    InfraSetup,
}

impl WorkItem {
    pub const ALL: [WorkItem; 8] = [
        WorkItem::AnalyzeRequirements,
        WorkItem::DesignArchitecture,
        WorkItem::BackendAuthSkeleton,
        WorkItem::FrontendLoginDashboardSkeleton,
        WorkItem::BackendChatSkeleton,
        WorkItem::FrontendChat,
        WorkItem::TestPlans,
        WorkItem::InfraSetup,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Self::AnalyzeRequirements => "analyze_requirements",
            Self::DesignArchitecture => "design_architecture",
            Self::BackendAuthSkeleton => "backend_auth_skeleton",
            Self::FrontendLoginDashboardSkeleton => "frontend_login_dashboard_skeleton",
            Self::BackendChatSkeleton => "backend_chat_skeleton",
            Self::FrontendChat => "frontend_chat",
            Self::TestPlans => "test_plans",
            Self::InfraSetup => "infra_setup",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::AnalyzeRequirements => "Requirements and ER analysis",
            Self::DesignArchitecture => "Architecture and database schema design",
            Self::BackendAuthSkeleton => "Backend authentication service skeleton",
            Self::FrontendLoginDashboardSkeleton => "Frontend login and dashboard skeleton",
            Self::BackendChatSkeleton => "Backend chat service skeleton",
            Self::FrontendChat => "Frontend chat interface",
            Self::TestPlans => "Test plans",
            Self::InfraSetup => "Docker infrastructure setup",
        }
    }

    pub fn role(self) -> AgentRole {
        match self {
            Self::AnalyzeRequirements => AgentRole::ProductOwner,
            Self::DesignArchitecture => AgentRole::TechLead,
            Self::BackendAuthSkeleton | Self::BackendChatSkeleton => AgentRole::BackendDeveloper,
            Self::FrontendLoginDashboardSkeleton | Self::FrontendChat => {
                AgentRole::FrontendDeveloper
            }
            Self::TestPlans => AgentRole::QaEngineer,
            Self::InfraSetup => AgentRole::DevopsEngineer,
        }
    }

    /// What the agent is asked to do.
    pub fn description(self) -> &'static str {
        match self {
            Self::AnalyzeRequirements => {
                "Carefully analyze the system flow and entity-relationship documents. \
                 Identify all functional and non-functional requirements and prepare a clear \
                 summary that will serve as the basis for the architecture design."
            }
            Self::DesignArchitecture => {
                "Based on the analyzed requirements and the ER specification, design the overall \
                 system architecture and the database schema: service structure, main \
                 technologies and the high-level database design (tables, relations). \
                 Also write the initial technical documentation for both."
            }
            Self::BackendAuthSkeleton => {
                "Build the skeleton of the backend authentication service: initial project \
                 setup, user models, basic register/login endpoints and integration with a \
                 token-based authentication scheme (e.g. JWT)."
            }
            Self::FrontendLoginDashboardSkeleton => {
                "Build the skeleton of the frontend login and dashboard screens: UI components, \
                 basic routes and the initial integration with the authentication backend."
            }
            Self::BackendChatSkeleton => {
                "Build the skeleton of the backend chat service: initial setup, message and \
                 chat room models, and basic endpoints for sending and receiving messages."
            }
            Self::FrontendChat => {
                "Build the frontend chat interface and integrate it with the backend chat \
                 service: message list, message composer and real-time delivery (WebSockets \
                 where applicable)."
            }
            Self::TestPlans => {
                "Write comprehensive test plans for every feature developed so far, covering \
                 backend (API, business logic) and frontend (UI, user flows). Prioritize \
                 integration and end-to-end tests."
            }
            Self::InfraSetup => {
                "Set up the base infrastructure with Docker and Docker Compose for the backend \
                 and frontend services: one Dockerfile per service and a docker-compose.yml \
                 that gives an easy local development environment matching the architecture."
            }
        }
    }

    pub fn expected_output(self) -> &'static str {
        match self {
            Self::AnalyzeRequirements => {
                "A detailed summary of functional and non-functional requirements and an \
                 analysis of the ER diagram."
            }
            Self::DesignArchitecture => {
                "Architecture and database schema design documents describing the system \
                 structure."
            }
            Self::BackendAuthSkeleton => "Working code for the authentication service skeleton.",
            Self::FrontendLoginDashboardSkeleton => {
                "Working code for the login and dashboard interface skeleton."
            }
            Self::BackendChatSkeleton => "Working code for the chat service skeleton.",
            Self::FrontendChat => "Working code for the chat interface.",
            Self::TestPlans => "Detailed test plan documents for the developed features.",
            Self::InfraSetup => "Working Dockerfile and docker-compose.yml files.",
        }
    }

    /// Module skeleton work pulls in test planning and infrastructure.
    pub fn is_module_skeleton(self) -> bool {
        matches!(
            self,
            Self::BackendAuthSkeleton
                | Self::FrontendLoginDashboardSkeleton
                | Self::BackendChatSkeleton
                | Self::FrontendChat
        )
    }

    /// Items that must come first when both are part of the same run.
    pub fn prerequisites(self) -> &'static [WorkItem] {
        match self {
            Self::AnalyzeRequirements => &[],
            Self::DesignArchitecture => &[Self::AnalyzeRequirements],
            Self::BackendAuthSkeleton => &[Self::DesignArchitecture],
            Self::FrontendLoginDashboardSkeleton => &[Self::BackendAuthSkeleton],
            Self::BackendChatSkeleton => &[Self::DesignArchitecture, Self::BackendAuthSkeleton],
            Self::FrontendChat => &[
                Self::BackendChatSkeleton,
                Self::FrontendLoginDashboardSkeleton,
            ],
            Self::TestPlans => &[
                Self::BackendAuthSkeleton,
                Self::FrontendLoginDashboardSkeleton,
                Self::BackendChatSkeleton,
                Self::FrontendChat,
            ],
            Self::InfraSetup => &[Self::DesignArchitecture],
        }
    }
}

impl std::fmt::Display for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Roadmap phases the task table knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownPhase {
    DiscoveryAndDesign,
    ConfigurationAndBootstrap,
    IterativeDevelopment,
    ComprehensiveTesting,
    DeploymentAndOperation,
}

impl KnownPhase {
    /// Title spellings accepted for each phase, lowercase.
    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::DiscoveryAndDesign => &["discovery and design", "descoberta e design"],
            Self::ConfigurationAndBootstrap => &[
                "configuration and bootstrap",
                "configuração e bootstrap",
            ],
            Self::IterativeDevelopment => &[
                "iterative development by modules/features",
                "desenvolvimento iterativo por módulos/funcionalidades",
            ],
            Self::ComprehensiveTesting => &[
                "comprehensive testing and quality",
                "testes abrangentes e qualidade",
            ],
            Self::DeploymentAndOperation => &["deployment and operation", "implantação e operação"],
        }
    }

    /// Match a roadmap phase title, ignoring case and surrounding whitespace.
    pub fn from_title(title: &str) -> Option<Self> {
        let normalized = title.trim().to_lowercase();
        [
            Self::DiscoveryAndDesign,
            Self::ConfigurationAndBootstrap,
            Self::IterativeDevelopment,
            Self::ComprehensiveTesting,
            Self::DeploymentAndOperation,
        ]
        .into_iter()
        .find(|phase| phase.aliases().contains(&normalized.as_str()))
    }

    pub fn work_items(self) -> &'static [WorkItem] {
        match self {
            Self::DiscoveryAndDesign => {
                &[WorkItem::AnalyzeRequirements, WorkItem::DesignArchitecture]
            }
            Self::ConfigurationAndBootstrap => &[WorkItem::InfraSetup],
            Self::IterativeDevelopment => &[
                WorkItem::BackendAuthSkeleton,
                WorkItem::FrontendLoginDashboardSkeleton,
                WorkItem::BackendChatSkeleton,
                WorkItem::FrontendChat,
            ],
            Self::ComprehensiveTesting => &[WorkItem::TestPlans],
            Self::DeploymentAndOperation => &[],
        }
    }

    /// Selecting this phase requires requirements analysis and architecture design.
    pub fn needs_foundation(self) -> bool {
        matches!(
            self,
            Self::DiscoveryAndDesign | Self::ConfigurationAndBootstrap | Self::IterativeDevelopment
        )
    }
}

/// Assemble the ordered work items for a selection.
pub fn assemble(selection: &Selection) -> Vec<WorkItem> {
    match selection {
        Selection::Phases(phases) => assemble_for_phases(phases),
        Selection::Instruction(_) => {
            vec![WorkItem::AnalyzeRequirements, WorkItem::DesignArchitecture]
        }
    }
}

/// Assemble the ordered work items for selected roadmap phases.
pub fn assemble_for_phases(phases: &[RoadmapPhase]) -> Vec<WorkItem> {
    let known: Vec<KnownPhase> = phases
        .iter()
        .filter_map(|phase| {
            let known = KnownPhase::from_title(&phase.title);
            if known.is_none() {
                tracing::debug!(phase = %phase.name, "phase has no mapped work items");
            }
            known
        })
        .collect();

    let mut included: BTreeSet<WorkItem> = known
        .iter()
        .flat_map(|phase| phase.work_items().iter().copied())
        .collect();

    if included.iter().any(|item| item.is_module_skeleton()) {
        included.insert(WorkItem::TestPlans);
        included.insert(WorkItem::InfraSetup);
    }
    if known.iter().any(|phase| phase.needs_foundation()) {
        included.insert(WorkItem::AnalyzeRequirements);
        included.insert(WorkItem::DesignArchitecture);
    }

    topological_order(&included)
}

/// Order items so every prerequisite present in the set comes first.
fn topological_order(included: &BTreeSet<WorkItem>) -> Vec<WorkItem> {
    let mut in_degree: HashMap<WorkItem, usize> = included
        .iter()
        .map(|&item| {
            let deps = item
                .prerequisites()
                .iter()
                .filter(|dep| included.contains(*dep))
                .count();
            (item, deps)
        })
        .collect();

    let mut ready: BTreeSet<WorkItem> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&item, _)| item)
        .collect();

    let mut ordered = Vec::with_capacity(included.len());
    while let Some(item) = ready.pop_first() {
        ordered.push(item);
        for &dependent in included {
            if dependent.prerequisites().contains(&item)
                && let Some(deg) = in_degree.get_mut(&dependent)
            {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(dependent);
                }
            }
        }
    }

    // Only reachable if the prerequisite table gains a cycle.
    if ordered.len() != included.len() {
        tracing::error!("cycle in work item prerequisites; appending remaining items");
        let remaining: Vec<WorkItem> = included
            .iter()
            .filter(|item| !ordered.contains(item))
            .copied()
            .collect();
        ordered.extend(remaining);
    }
    ordered
}
