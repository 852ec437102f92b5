//! Node.js service descriptor.

use crate::paths::ExecutionMode;

use super::traits::{LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Node.js runtime.
///
/// Node is a toolchain rather than a daemon; launching it only validates
/// that the selected binary works.
pub struct NodeService;

impl NodeService {
    /// Arguments for a version probe.
    pub const PROBE_ARGS: [&'static str; 1] = ["--version"];
}

impl ServiceDescriptor for NodeService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Node
    }

    fn display_name(&self) -> &'static str {
        "Node.js"
    }

    fn default_port(&self) -> Option<u16> {
        None
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "node.exe",
            ExecutionMode::Wsl => "bin/node",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let root = ctx.install_path.to_path_buf();
        let mut plan = LaunchPlan::new(root.join(self.executable(ctx.mode())), root);
        plan.args.extend(Self::PROBE_ARGS.iter().map(|a| a.to_string()));
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ini::IniSection;
    use crate::settings::SettingsModel;

    #[test]
    fn test_node_service() {
        let service = NodeService;
        assert_eq!(service.service_type(), ServiceType::Node);
        assert_eq!(service.default_port(), None);
    }

    #[test]
    fn test_node_section_has_no_port() {
        let settings = SettingsModel::default();
        let section = NodeService.write_section(&settings);
        assert!(section.get("Port").is_none());
        assert_eq!(section.get("AutoStart"), Some("False"));

        let mut parsed = SettingsModel::default();
        let mut input = IniSection::new("Node");
        input.set("Port", "3000");
        NodeService.read_section(&input, &mut parsed);
        assert_eq!(parsed.node.port, None);
    }
}
