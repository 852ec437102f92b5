//! Redis service descriptor.

use crate::paths::ExecutionMode;

use super::traits::{LaunchContext, LaunchPlan, ServiceDescriptor};
use super::types::ServiceType;

/// Redis in-memory data store.
pub struct RedisService;

impl ServiceDescriptor for RedisService {
    fn service_type(&self) -> ServiceType {
        ServiceType::Redis
    }

    fn display_name(&self) -> &'static str {
        "Redis"
    }

    fn default_port(&self) -> Option<u16> {
        Some(6379)
    }

    fn executable(&self, mode: ExecutionMode) -> &'static str {
        match mode {
            ExecutionMode::Native => "redis-server.exe",
            ExecutionMode::Wsl => "redis-server",
        }
    }

    fn launch(&self, ctx: &LaunchContext<'_>) -> LaunchPlan {
        let root = ctx.install_path.to_path_buf();
        LaunchPlan::new(root.join(self.executable(ctx.mode())), root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_service() {
        let service = RedisService;
        assert_eq!(service.service_type(), ServiceType::Redis);
        assert_eq!(service.display_name(), "Redis");
        assert_eq!(service.executable(ExecutionMode::Native), "redis-server.exe");
        assert_eq!(service.executable(ExecutionMode::Wsl), "redis-server");
    }
}
