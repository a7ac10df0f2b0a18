//! Fakes for the process, probe and API seams.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, StreamExt};

use crate::client::{LineStream, RuntimeApi};
use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::error::RuntimeError;
use crate::health::HealthProbe;
use crate::models::InstalledModel;

type Hook = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// Records commands instead of running them.
#[derive(Default)]
pub struct FakeRunner {
    runs: Mutex<Vec<CommandSpec>>,
    spawns: Mutex<Vec<CommandSpec>>,
    output: Option<CommandOutput>,
    failing: HashSet<String>,
    spawn_fails: bool,
    on_run: Option<Hook>,
    on_spawn: Option<Hook>,
}

impl FakeRunner {
    pub fn with_output(mut self, output: CommandOutput) -> Self {
        self.output = Some(output);
        self
    }

    /// Every run of `program` exits non-zero.
    pub fn failing(mut self, program: &str) -> Self {
        self.failing.insert(program.to_string());
        self
    }

    pub fn failing_spawns(mut self) -> Self {
        self.spawn_fails = true;
        self
    }

    pub fn on_run(mut self, hook: impl Fn(&CommandSpec) + Send + Sync + 'static) -> Self {
        self.on_run = Some(Box::new(hook));
        self
    }

    pub fn on_spawn(mut self, hook: impl Fn(&CommandSpec) + Send + Sync + 'static) -> Self {
        self.on_spawn = Some(Box::new(hook));
        self
    }

    pub fn runs(&self) -> Vec<CommandSpec> {
        self.runs.lock().unwrap().clone()
    }

    pub fn spawns(&self) -> Vec<CommandSpec> {
        self.spawns.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec, _timeout: Duration) -> Result<CommandOutput, RuntimeError> {
        self.runs.lock().unwrap().push(spec.clone());
        if self.failing.contains(&spec.program) {
            return Ok(CommandOutput::failed(1, "failed"));
        }
        if let Some(hook) = &self.on_run {
            hook(spec);
        }
        Ok(self.output.clone().unwrap_or_else(CommandOutput::ok))
    }

    fn spawn_detached(&self, spec: &CommandSpec) -> Result<u32, RuntimeError> {
        self.spawns.lock().unwrap().push(spec.clone());
        if self.spawn_fails {
            return Err(RuntimeError::command_failed(spec.program.clone(), "spawn failed"));
        }
        if let Some(hook) = &self.on_spawn {
            hook(spec);
        }
        Ok(4242)
    }
}

/// Probe whose answer is a shared flag.
#[derive(Default)]
pub struct FakeProbe {
    healthy: Arc<AtomicBool>,
    pings: AtomicUsize,
}

impl FakeProbe {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: Arc::new(AtomicBool::new(healthy)),
            pings: AtomicUsize::new(0),
        }
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        self.healthy.clone()
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn ping(&self) -> bool {
        self.pings.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Scripted response to a pull.
#[derive(Clone, Default)]
pub struct PullScript {
    pub lines: Vec<Result<String, String>>,
    /// Model is present once the stream is fully consumed
    pub installs: bool,
    /// Stream never ends after its lines
    pub hangs: bool,
}

impl PullScript {
    pub fn lines<I: IntoIterator<Item = &'static str>>(lines: I) -> Self {
        Self {
            lines: lines.into_iter().map(|l| Ok(l.to_string())).collect(),
            ..Default::default()
        }
    }

    pub fn installing(mut self) -> Self {
        self.installs = true;
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hangs = true;
        self
    }
}

/// In-memory runtime model store.
#[derive(Default)]
pub struct FakeApi {
    installed: Arc<Mutex<BTreeSet<String>>>,
    scripts: Mutex<HashMap<String, PullScript>>,
    list_fails: AtomicBool,
    delete_fails: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    pulls: AtomicUsize,
}

impl FakeApi {
    pub fn with_models<I: IntoIterator<Item = &'static str>>(models: I) -> Self {
        let api = Self::default();
        api.installed
            .lock()
            .unwrap()
            .extend(models.into_iter().map(String::from));
        api
    }

    pub fn script(&self, model: &str, script: PullScript) {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), script);
    }

    pub fn fail_listing(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, model: &str) {
        self.delete_fails.lock().unwrap().insert(model.to_string());
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn installed(&self) -> Vec<String> {
        self.installed.lock().unwrap().iter().cloned().collect()
    }

    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuntimeApi for FakeApi {
    async fn list_models(&self) -> Result<Vec<InstalledModel>, RuntimeError> {
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(RuntimeError::NotReachable("fake".into()));
        }
        Ok(self
            .installed
            .lock()
            .unwrap()
            .iter()
            .map(|name| InstalledModel {
                name: name.clone(),
                size: None,
                digest: None,
            })
            .collect())
    }

    async fn pull(&self, model: &str) -> Result<LineStream, RuntimeError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .lock()
            .unwrap()
            .get(model)
            .cloned()
            .ok_or_else(|| RuntimeError::NotReachable("fake".into()))?;

        let lines = stream::iter(
            script
                .lines
                .into_iter()
                .map(|l| l.map_err(RuntimeError::Api)),
        );

        let installed = self.installed.clone();
        let name = model.to_string();
        let installs = script.installs;
        let finish = stream::once(async move {
            if installs {
                installed.lock().unwrap().insert(name);
            }
        })
        .filter_map(|_| async { None::<Result<String, RuntimeError>> });

        if script.hangs {
            Ok(Box::pin(lines.chain(stream::pending())))
        } else {
            Ok(Box::pin(lines.chain(finish)))
        }
    }

    async fn delete(&self, model: &str) -> Result<(), RuntimeError> {
        if self.delete_fails.lock().unwrap().contains(model) {
            return Err(RuntimeError::Api("500: locked".into()));
        }
        self.installed.lock().unwrap().remove(model);
        self.deleted.lock().unwrap().push(model.to_string());
        Ok(())
    }
}

/// Status sink that keeps every line.
pub fn collect_status() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) + Send + Sync) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = lines.clone();
    (lines, move |s: &str| sink.lock().unwrap().push(s.to_string()))
}

/// Create an executable file, including parent directories.
pub fn make_executable(path: &Path) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"#!/bin/sh\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}
