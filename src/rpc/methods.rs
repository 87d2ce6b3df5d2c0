//! RPC method handlers: the daemon's entire external surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use uuid::Uuid;

use crate::context::AppContext;
use crate::core::models::{ActionResult, ScriptJob};
use crate::core::schedule::{Schedule, describe};
use crate::core::{CompletionMonitor, JobRegistry, ScriptScheduler};
use crate::db;

use super::{NOT_FOUND, Request, Response};

pub struct MethodHandler {
    ctx: AppContext,
    registry: JobRegistry,
    monitor: CompletionMonitor,
    scheduler: ScriptScheduler,
    start_time: Instant,
}

impl MethodHandler {
    pub fn new(
        ctx: AppContext,
        registry: JobRegistry,
        monitor: CompletionMonitor,
        scheduler: ScriptScheduler,
    ) -> Self {
        Self {
            ctx,
            registry,
            monitor,
            scheduler,
            start_time: Instant::now(),
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let id = request.id.clone().unwrap_or(Value::Null);
        let params = request.params.unwrap_or(Value::Null);

        match request.method.as_str() {
            "daemon.status" => self.daemon_status(id).await,
            "jobs.list" => self.jobs_list(id).await,
            "jobs.get" => self.jobs_get(id, params).await,
            "jobs.toggle" => self.jobs_toggle(id, params).await,
            "jobs.start" => self.jobs_start(id, params).await,
            "scripts.list" => self.scripts_list(id).await,
            "scripts.create" => self.scripts_create(id, params).await,
            "scripts.update" => self.scripts_update(id, params).await,
            "scripts.delete" => self.scripts_delete(id, params).await,
            "scripts.toggle" => self.scripts_toggle(id, params).await,
            "scripts.run" => self.scripts_run(id, params).await,
            _ => Response::method_not_found(id, &request.method),
        }
    }

    async fn daemon_status(&self, id: Value) -> Response {
        #[derive(Serialize)]
        struct DaemonStatus {
            version: &'static str,
            uptime_secs: u64,
            simulation: bool,
            monitoring: usize,
            armed_timers: usize,
            rpc_bind: String,
        }

        Response::success(
            id,
            DaemonStatus {
                version: env!("CARGO_PKG_VERSION"),
                uptime_secs: self.start_time.elapsed().as_secs(),
                simulation: self.ctx.config.simulation,
                monitoring: self.monitor.active_count().await,
                armed_timers: self.scheduler.armed_count(),
                rpc_bind: self.ctx.config.rpc_bind.to_string(),
            },
        )
    }

    async fn jobs_list(&self, id: Value) -> Response {
        Response::success(id, self.registry.list_all().await)
    }

    async fn jobs_get(&self, id: Value, params: Value) -> Response {
        let params: LabelParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        match self.registry.find_by_id(&params.label).await {
            Some(state) => Response::success(id, state),
            None => Response::error(
                id,
                NOT_FOUND,
                format!("작업을 찾을 수 없습니다: {}", params.label),
            ),
        }
    }

    async fn jobs_toggle(&self, id: Value, params: Value) -> Response {
        let params: LabelParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        Response::success(id, self.registry.toggle(&params.label).await)
    }

    /// Manual start. On success, arm the completion monitor so the user
    /// hears about the outcome; jobs without a log path cannot be observed
    /// and are simply not monitored.
    async fn jobs_start(&self, id: Value, params: Value) -> Response {
        let params: LabelParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        let result = self.registry.start(&params.label).await;
        if result.success {
            if let Some(state) = self.registry.find_by_id(&params.label).await {
                if let Some(log) = &state.definition.log_path {
                    self.monitor
                        .start_monitoring(
                            &state.definition.label,
                            &state.definition.display_name,
                            log,
                        )
                        .await;
                }
            }
        }
        Response::success(id, result)
    }

    async fn scripts_list(&self, id: Value) -> Response {
        match db::scripts::list(&self.ctx.db).await {
            Ok(jobs) => {
                #[derive(Serialize)]
                struct ScriptView {
                    #[serde(flatten)]
                    job: ScriptJob,
                    schedule_text: String,
                    armed: bool,
                }

                let views: Vec<ScriptView> = jobs
                    .into_iter()
                    .map(|job| ScriptView {
                        schedule_text: describe(&job.schedule),
                        armed: self.scheduler.armed(&job.id),
                        job,
                    })
                    .collect();
                Response::success(id, views)
            }
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }

    async fn scripts_create(&self, id: Value, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            name: String,
            script: String,
            schedule: Schedule,
            #[serde(default = "default_enabled")]
            enabled: bool,
        }

        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        let job = ScriptJob {
            id: Uuid::now_v7().to_string(),
            name: params.name,
            script: params.script,
            schedule: params.schedule,
            enabled: params.enabled,
            last_run: None,
        };

        if let Err(e) = db::scripts::create(&self.ctx.db, job.clone()).await {
            return Response::internal_error(id, e.to_string());
        }
        self.scheduler.refresh(&job);
        Response::success(id, job)
    }

    async fn scripts_update(&self, id: Value, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            id: String,
            name: String,
            script: String,
            schedule: Schedule,
            enabled: bool,
        }

        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        let job = ScriptJob {
            id: params.id,
            name: params.name,
            script: params.script,
            schedule: params.schedule,
            enabled: params.enabled,
            last_run: None,
        };

        if let Err(e) = db::scripts::update(&self.ctx.db, job.clone()).await {
            return Response::internal_error(id, e.to_string());
        }
        match db::scripts::get(&self.ctx.db, job.id.clone()).await {
            Ok(Some(stored)) => {
                self.scheduler.refresh(&stored);
                Response::success(id, stored)
            }
            Ok(None) => Response::error(
                id,
                NOT_FOUND,
                format!("스크립트를 찾을 수 없습니다: {}", job.id),
            ),
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }

    async fn scripts_delete(&self, id: Value, params: Value) -> Response {
        let params: IdParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        // Disarm before deleting so no stale timer fires on dead config.
        self.scheduler.cancel(&params.id);
        match db::scripts::delete(&self.ctx.db, params.id).await {
            Ok(()) => Response::success(id, ActionResult::ok()),
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }

    async fn scripts_toggle(&self, id: Value, params: Value) -> Response {
        #[derive(Deserialize)]
        struct Params {
            id: String,
            enabled: bool,
        }

        let params: Params = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        if let Err(e) =
            db::scripts::set_enabled(&self.ctx.db, params.id.clone(), params.enabled).await
        {
            return Response::internal_error(id, e.to_string());
        }

        match db::scripts::get(&self.ctx.db, params.id.clone()).await {
            Ok(Some(job)) => {
                self.scheduler.refresh(&job);
                Response::success(id, job)
            }
            Ok(None) => Response::error(
                id,
                NOT_FOUND,
                format!("스크립트를 찾을 수 없습니다: {}", params.id),
            ),
            Err(e) => Response::internal_error(id, e.to_string()),
        }
    }

    async fn scripts_run(&self, id: Value, params: Value) -> Response {
        let params: IdParams = match serde_json::from_value(params) {
            Ok(p) => p,
            Err(e) => return Response::invalid_params(id, e.to_string()),
        };

        Response::success(id, self.scheduler.run_now(&params.id).await)
    }
}

#[derive(Deserialize)]
struct LabelParams {
    label: String,
}

#[derive(Deserialize)]
struct IdParams {
    id: String,
}

fn default_enabled() -> bool {
    true
}
