//! In-memory collaborators shared by the engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use pagecraft_engine::generation::{GenerationError, GenerationRequest, SiteGenerator};
use pagecraft_engine::hosting::{
    HostError, PageBuild, RepoFileHandle, RepoHost, RepoSummary, VersionToken,
};
use pagecraft_engine::notifier::{DeliveryError, Notifier, NotifyError};
use pagecraft_engine::orchestrator::{Orchestrator, PipelineSettings};
use pagecraft_engine::retry::RetryError;
use sdk::types::{Attachment, Bundle, EvaluatorNotification, GeneratedFile, Round, SiteRequest};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const OWNER: &str = "octo";

#[derive(Debug, Clone)]
struct StoredFile {
    content: Vec<u8>,
    version: u64,
}

#[derive(Default)]
struct HostState {
    repos: HashMap<String, HashMap<String, StoredFile>>,
    commits: HashMap<String, u64>,
    next_version: u64,
    calls: Vec<String>,
    messages: Vec<String>,
}

/// What `page_builds` reports
#[derive(Debug, Clone, Default)]
pub enum BuildReport {
    /// One finished build for the current head
    #[default]
    BuiltAtHead,
    /// Exactly these builds, whatever the head is
    Fixed(Vec<PageBuild>),
    /// Every poll fails
    Failing,
}

/// A repository host backed by maps, recording every mutating call
#[derive(Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
    conflicts: Mutex<HashSet<String>>,
    unreachable: Mutex<bool>,
    builds: Mutex<BuildReport>,
    build_polls: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a repository holding `files` as if a previous round had published it
    pub fn seed(&self, repo: &str, files: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        let mut stored = HashMap::new();
        for (path, content) in files {
            state.next_version += 1;
            stored.insert(
                path.to_string(),
                StoredFile {
                    content: content.as_bytes().to_vec(),
                    version: state.next_version,
                },
            );
        }
        state.repos.insert(repo.to_string(), stored);
        state.commits.insert(repo.to_string(), 1);
    }

    /// Make the next update of `path` fail as if someone else wrote it
    pub fn conflict_on(&self, path: &str) {
        self.conflicts.lock().unwrap().insert(path.to_string());
    }

    pub fn set_unreachable(&self) {
        *self.unreachable.lock().unwrap() = true;
    }

    pub fn set_builds(&self, report: BuildReport) {
        *self.builds.lock().unwrap() = report;
    }

    pub fn build_polls(&self) -> usize {
        self.build_polls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn file(&self, repo: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .repos
            .get(repo)
            .and_then(|files| files.get(path))
            .map(|f| String::from_utf8_lossy(&f.content).into_owned())
    }

    pub fn paths(&self, repo: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut paths: Vec<String> = state
            .repos
            .get(repo)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }

    pub fn head(&self, repo: &str) -> String {
        let state = self.state.lock().unwrap();
        format!("c{}", state.commits.get(repo).copied().unwrap_or(0))
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl RepoHost for FakeHost {
    async fn check_connectivity(&self) -> Result<(), HostError> {
        self.record("check_connectivity".to_string());
        if *self.unreachable.lock().unwrap() {
            return Err(HostError::Unavailable("offline".to_string()));
        }
        Ok(())
    }

    async fn list_repositories(&self) -> Result<Vec<RepoSummary>, HostError> {
        self.record("list_repositories".to_string());
        let state = self.state.lock().unwrap();
        Ok(state
            .repos
            .keys()
            .map(|name| RepoSummary { name: name.clone() })
            .collect())
    }

    async fn create_repository(&self, name: &str) -> Result<(), HostError> {
        self.record(format!("create_repository {}", name));
        let mut state = self.state.lock().unwrap();
        if state.repos.contains_key(name) {
            return Err(HostError::Api {
                status: 422,
                message: "name already exists on this account".to_string(),
            });
        }
        state.repos.insert(name.to_string(), HashMap::new());
        state.commits.insert(name.to_string(), 0);
        Ok(())
    }

    async fn delete_repository(&self, name: &str) -> Result<(), HostError> {
        self.record(format!("delete_repository {}", name));
        let mut state = self.state.lock().unwrap();
        state.commits.remove(name);
        state
            .repos
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| HostError::NotFound(name.to_string()))
    }

    async fn create_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<(), HostError> {
        self.record(format!("create_file {}", path));
        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version = state.next_version;
        let files = state
            .repos
            .get_mut(repo)
            .ok_or_else(|| HostError::NotFound(repo.to_string()))?;
        if files.contains_key(path) {
            return Err(HostError::Api {
                status: 422,
                message: format!("{} already exists", path),
            });
        }
        files.insert(
            path.to_string(),
            StoredFile {
                content: content.to_vec(),
                version,
            },
        );
        *state.commits.entry(repo.to_string()).or_insert(0) += 1;
        state.messages.push(message.to_string());
        Ok(())
    }

    async fn read_file(&self, repo: &str, path: &str) -> Result<RepoFileHandle, HostError> {
        self.record(format!("read_file {}", path));
        let state = self.state.lock().unwrap();
        let file = state
            .repos
            .get(repo)
            .and_then(|files| files.get(path))
            .ok_or_else(|| HostError::NotFound(format!("{}/{}", repo, path)))?;
        Ok(RepoFileHandle {
            filename: path.to_string(),
            version_token: VersionToken::new(format!("v{}", file.version)),
            content: String::from_utf8_lossy(&file.content).into_owned(),
        })
    }

    async fn update_file(
        &self,
        repo: &str,
        path: &str,
        content: &[u8],
        message: &str,
        token: &VersionToken,
    ) -> Result<(), HostError> {
        self.record(format!("update_file {}", path));
        if self.conflicts.lock().unwrap().remove(path) {
            return Err(HostError::VersionConflict {
                path: path.to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.next_version += 1;
        let version = state.next_version;
        let file = state
            .repos
            .get_mut(repo)
            .and_then(|files| files.get_mut(path))
            .ok_or_else(|| HostError::NotFound(format!("{}/{}", repo, path)))?;
        if token.as_str() != format!("v{}", file.version) {
            return Err(HostError::VersionConflict {
                path: path.to_string(),
            });
        }
        file.content = content.to_vec();
        file.version = version;
        *state.commits.entry(repo.to_string()).or_insert(0) += 1;
        state.messages.push(message.to_string());
        Ok(())
    }

    async fn enable_pages(&self, repo: &str) -> Result<(), HostError> {
        self.record(format!("enable_pages {}", repo));
        Ok(())
    }

    async fn latest_commit(&self, repo: &str) -> Result<String, HostError> {
        let state = self.state.lock().unwrap();
        state
            .commits
            .get(repo)
            .filter(|n| **n > 0)
            .map(|n| format!("c{}", n))
            .ok_or_else(|| HostError::NotFound(format!("no commits in {}", repo)))
    }

    async fn page_builds(&self, repo: &str) -> Result<Vec<PageBuild>, HostError> {
        self.build_polls.fetch_add(1, Ordering::SeqCst);
        let report = self.builds.lock().unwrap().clone();
        match report {
            BuildReport::BuiltAtHead => Ok(vec![PageBuild {
                status: PageBuild::BUILT.to_string(),
                commit: self.head(repo),
            }]),
            BuildReport::Fixed(builds) => Ok(builds),
            BuildReport::Failing => Err(HostError::Api {
                status: 502,
                message: "pages service unavailable".to_string(),
            }),
        }
    }

    fn repo_url(&self, repo: &str) -> String {
        format!("https://github.com/{}/{}", OWNER, repo)
    }

    fn pages_url(&self, repo: &str) -> String {
        format!("https://{}.github.io/{}/", OWNER, repo)
    }
}

/// A generator returning a fixed bundle and recording what it was asked
pub struct FakeGenerator {
    bundle: Mutex<Bundle>,
    delay: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
    revised: Mutex<Vec<Vec<GeneratedFile>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeGenerator {
    pub fn new(bundle: Bundle) -> Arc<Self> {
        Self::with_delay(bundle, Duration::ZERO)
    }

    pub fn with_delay(bundle: Bundle, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            bundle: Mutex::new(bundle),
            delay,
            requests: Mutex::new(Vec::new()),
            revised: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Bundles passed to `modify` as the current state
    pub fn revised(&self) -> Vec<Vec<GeneratedFile>> {
        self.revised.lock().unwrap().clone()
    }

    /// Most calls ever in flight at once
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn reply(&self, request: &GenerationRequest) -> Bundle {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.bundle.lock().unwrap().clone()
    }
}

#[async_trait]
impl SiteGenerator for FakeGenerator {
    async fn check_health(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Bundle, GenerationError> {
        Ok(self.reply(request).await)
    }

    async fn modify(
        &self,
        request: &GenerationRequest,
        current: &[GeneratedFile],
    ) -> Result<Bundle, GenerationError> {
        self.revised.lock().unwrap().push(current.to_vec());
        Ok(self.reply(request).await)
    }
}

/// A notifier that records every notification it is handed
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, EvaluatorNotification)>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<(String, EvaluatorNotification)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        evaluation_url: &str,
        notification: &EvaluatorNotification,
    ) -> Result<(), NotifyError> {
        if self.fail {
            return Err(RetryError {
                attempts: 5,
                last: DeliveryError::Status {
                    status: 500,
                    body: "down".to_string(),
                },
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((evaluation_url.to_string(), notification.clone()));
        Ok(())
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        build_poll_attempts: 3,
        build_poll_interval: Duration::from_millis(1),
        license_holder: "Octo Bot <bot@octo.dev>".to_string(),
    }
}

pub fn orchestrator(
    host: &Arc<FakeHost>,
    generator: &Arc<FakeGenerator>,
    notifier: &Arc<RecordingNotifier>,
) -> Orchestrator {
    Orchestrator::new(
        Arc::clone(host) as Arc<dyn RepoHost>,
        Arc::clone(generator) as Arc<dyn SiteGenerator>,
        Arc::clone(notifier) as Arc<dyn Notifier>,
        settings(),
    )
}

pub fn valid_bundle(heading: &str) -> Bundle {
    vec![
        GeneratedFile::markdown("README.md", format!("# {}\n\nA small static site.\n", heading)),
        GeneratedFile::html(
            "index.html",
            format!(
                "<!doctype html><html><head><title>{0}</title></head><body><h1>{0}</h1></body></html>",
                heading
            ),
        ),
    ]
}

pub fn request(task: &str, round: Round) -> SiteRequest {
    SiteRequest {
        email: "student@example.com".to_string(),
        secret: "letmein".to_string(),
        task: task.to_string(),
        round,
        nonce: format!("nonce-{}", round),
        brief: "Landing page for a neighbourhood bakery with opening hours".to_string(),
        checks: vec![
            "Page has an h1".to_string(),
            "README explains the project".to_string(),
        ],
        evaluation_url: "https://eval.example.com/notify".to_string(),
        attachments: Vec::<Attachment>::new(),
    }
}
