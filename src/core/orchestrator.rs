use anyhow::Result;
use tracing::info;

use crate::adapters;
use crate::context::AppContext;
use crate::core::notifications::create_notifier;
use crate::core::{CompletionMonitor, JobRegistry, ScriptScheduler};
use crate::rpc::{MethodHandler, RpcServer};

/// Wires the daemon together and runs it until shutdown.
pub struct Orchestrator {
    ctx: AppContext,
}

impl Orchestrator {
    pub fn new(ctx: AppContext) -> Self {
        Self { ctx }
    }

    pub async fn start(&self) -> Result<()> {
        let config = self.ctx.config.clone();
        info!(
            simulation = config.simulation,
            agents_dir = %config.agents_dir.display(),
            "jobsd daemon starting"
        );

        let notifier = create_notifier(&config.notifications);
        let adapter = adapters::get_adapter(config.simulation);
        let registry = JobRegistry::new(config.clone(), adapter);
        let monitor = CompletionMonitor::new(
            notifier.clone(),
            config.monitor_poll_interval(),
            config.monitor_timeout(),
        );
        let scheduler =
            ScriptScheduler::new(self.ctx.db.clone(), notifier, config.script_timeout());

        // Armed timers are never persisted; re-derive them from the store.
        scheduler.start_all().await?;

        let handler = MethodHandler::new(self.ctx.clone(), registry, monitor, scheduler);
        let server = RpcServer::new(handler, config.rpc_bind);

        tokio::select! {
            result = server.start() => result,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                server.shutdown();
                Ok(())
            }
        }
    }
}
