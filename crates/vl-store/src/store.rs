use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use vl_codec::DocumentCodec;
use vl_remote::{
    AuthMethod, ContentsClient, FileWrite, RepoLocation, Session, Transport, User,
};
use vl_types::{Component, LedgerDocument, TestResult, Version};

use crate::clock::{Clock, SystemClock};
use crate::error::{LedgerError, LedgerResult, ValidationError};
use crate::mutation::{Collection, Mutation, NewComponent, NewSetup, NewTest, NewVersion};
use crate::query::{self, TestFilter};
use crate::warning::Warned;

const INITIAL_COMMIT_MESSAGE: &str = "initialize ledger";

/// The document as last fetched or committed, with its persistence hash.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub document: Arc<LedgerDocument>,
    pub sha: String,
}

/// A write accepted and confirmed by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub collection: Collection,
    pub sha: String,
}

/// Owns one remote ledger document and the hash it was read at.
///
/// Mutations and fetches are serialized through a per-store async mutex, so
/// each write carries the hash produced by the previous one. The hash check
/// against the host is best-effort: it detects, but cannot prevent, a
/// concurrent writer landing between the write and the confirmation read.
pub struct LedgerStore {
    contents: ContentsClient,
    session: Arc<dyn Session>,
    clock: Arc<dyn Clock>,
    snapshot: RwLock<Option<Snapshot>>,
    write_lock: Mutex<()>,
}

impl LedgerStore {
    pub fn new(
        location: RepoLocation,
        session: Arc<dyn Session>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            contents: ContentsClient::new(transport, location),
            session,
            clock: Arc::new(SystemClock),
            snapshot: RwLock::new(None),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn location(&self) -> &RepoLocation {
        self.contents.location()
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn document(&self) -> Option<Arc<LedgerDocument>> {
        self.snapshot().map(|s| s.document)
    }

    pub fn sha(&self) -> Option<String> {
        self.snapshot().map(|s| s.sha)
    }

    /// Read the remote document and replace the local snapshot.
    ///
    /// On failure the previous snapshot is kept.
    pub async fn fetch(&self) -> LedgerResult<Arc<LedgerDocument>> {
        let _guard = self.write_lock.lock().await;
        self.fetch_locked().await
    }

    /// Fetch the document, creating an empty one if the file does not exist.
    ///
    /// Returns `true` when the file was created.
    pub async fn initialize(&self) -> LedgerResult<bool> {
        let _guard = self.write_lock.lock().await;
        let auth = self.credentials()?;
        match self.load(&auth).await {
            Ok(snapshot) => {
                self.replace(snapshot);
                Ok(false)
            }
            Err(LedgerError::RemoteRead { status: 404, .. }) => {
                let document = LedgerDocument::empty();
                let content = encode(&document)?;
                let written = self
                    .contents
                    .write(
                        &auth,
                        &FileWrite {
                            message: INITIAL_COMMIT_MESSAGE.into(),
                            content,
                            sha: None,
                        },
                    )
                    .await?;
                tracing::info!(sha = %written.sha, path = %self.location().path, "ledger created");
                self.replace(Snapshot {
                    document: Arc::new(document),
                    sha: written.sha,
                });
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn add_component(&self, component: NewComponent) -> LedgerResult<Warned<Commit>> {
        self.apply(Mutation::AddComponent(component)).await
    }

    pub async fn add_setup(&self, setup: NewSetup) -> LedgerResult<Warned<Commit>> {
        self.apply(Mutation::AddSetup(setup)).await
    }

    pub async fn add_version(&self, version: NewVersion) -> LedgerResult<Warned<Commit>> {
        self.apply(Mutation::AddVersion(version)).await
    }

    pub async fn add_test(&self, test: NewTest) -> LedgerResult<Warned<Commit>> {
        self.apply(Mutation::AddTest(test)).await
    }

    /// Validate `mutation`, write the resulting document, and confirm it.
    pub async fn apply(&self, mutation: Mutation) -> LedgerResult<Warned<Commit>> {
        let _guard = self.write_lock.lock().await;
        self.apply_locked(&mutation).await
    }

    /// Fetch the latest remote document, then apply `mutation` against it.
    ///
    /// Intended for recovering from a `RemoteWrite` precondition conflict.
    /// The mutation is validated again against the fresh document.
    pub async fn refetch_and_retry(&self, mutation: Mutation) -> LedgerResult<Warned<Commit>> {
        let _guard = self.write_lock.lock().await;
        self.fetch_locked().await?;
        self.apply_locked(&mutation).await
    }

    pub async fn current_user(&self) -> LedgerResult<User> {
        let auth = self.credentials()?;
        Ok(self.contents.current_user(&auth).await?)
    }

    pub fn latest_component_version(&self, component_id: &str) -> LedgerResult<Option<Version>> {
        let document = self.loaded()?;
        Ok(query::latest_component_version(&document, component_id).cloned())
    }

    pub fn latest_versions(&self, setup_id: Option<&str>) -> LedgerResult<Vec<Version>> {
        let document = self.loaded()?;
        let latest = query::latest_versions(&document, setup_id)?;
        Ok(latest.into_iter().cloned().collect())
    }

    pub fn setup_components(&self, setup_id: &str) -> LedgerResult<Warned<Vec<Component>>> {
        let document = self.loaded()?;
        let found = query::setup_components(&document, setup_id)?;
        for warning in &found.warnings {
            tracing::warn!(%warning, "ledger warning");
        }
        Ok(found.map(|components| components.into_iter().cloned().collect()))
    }

    pub fn setup_tests(&self, setup_id: &str) -> LedgerResult<Vec<TestResult>> {
        let document = self.loaded()?;
        Ok(query::setup_tests(&document, setup_id)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn component_versions(
        &self,
        component_ids: &[String],
    ) -> LedgerResult<BTreeMap<String, Vec<String>>> {
        let document = self.loaded()?;
        Ok(query::component_versions(&document, component_ids))
    }

    pub fn release_history(&self) -> LedgerResult<Vec<Version>> {
        let document = self.loaded()?;
        Ok(query::release_history(&document).into_iter().cloned().collect())
    }

    pub fn tests(&self, filter: &TestFilter) -> LedgerResult<Vec<TestResult>> {
        let document = self.loaded()?;
        Ok(filter.apply(&document).into_iter().cloned().collect())
    }

    async fn fetch_locked(&self) -> LedgerResult<Arc<LedgerDocument>> {
        let auth = self.credentials()?;
        let snapshot = self.load(&auth).await?;
        let document = snapshot.document.clone();
        tracing::debug!(
            sha = %snapshot.sha,
            components = document.components.len(),
            versions = document.versions.len(),
            "ledger fetched"
        );
        self.replace(snapshot);
        Ok(document)
    }

    async fn load(&self, auth: &AuthMethod) -> LedgerResult<Snapshot> {
        let file = self.contents.read(auth).await?;
        let document = DocumentCodec::decode(&file.content)?;
        Ok(Snapshot {
            document: Arc::new(document),
            sha: file.sha,
        })
    }

    async fn apply_locked(&self, mutation: &Mutation) -> LedgerResult<Warned<Commit>> {
        let current = self.snapshot().ok_or_else(|| ValidationError::NotLoaded {
            url: self.location().url.clone(),
        })?;
        let plan = mutation.plan(&current.document, self.clock.now())?;
        for warning in &plan.warnings {
            tracing::warn!(collection = %plan.collection, %warning, "ledger warning");
        }

        let auth = self.credentials()?;
        let content = encode(&plan.document)?;
        let written = self
            .contents
            .write(
                &auth,
                &FileWrite {
                    message: plan.collection.commit_message(),
                    content,
                    sha: Some(current.sha.clone()),
                },
            )
            .await?;

        let confirmation = self.contents.read(&auth).await;
        // From here the host has accepted the write: always commit it locally.
        self.replace(Snapshot {
            document: Arc::new(plan.document),
            sha: written.sha.clone(),
        });

        match confirmation {
            Err(e) => {
                tracing::warn!(sha = %written.sha, error = %e, "write accepted but not confirmed");
                Err(LedgerError::Unconfirmed {
                    written_sha: written.sha,
                    reason: e.to_string(),
                })
            }
            Ok(file) if file.sha != written.sha => {
                tracing::error!(
                    written_sha = %written.sha,
                    confirmed_sha = %file.sha,
                    collection = %plan.collection,
                    "post-update hash check failed"
                );
                Err(LedgerError::ConsistencyFault {
                    written_sha: written.sha,
                    confirmed_sha: file.sha,
                })
            }
            Ok(_) => {
                tracing::info!(collection = %plan.collection, sha = %written.sha, "ledger updated");
                Ok(Warned::new(
                    Commit {
                        collection: plan.collection,
                        sha: written.sha,
                    },
                    plan.warnings,
                ))
            }
        }
    }

    fn credentials(&self) -> LedgerResult<AuthMethod> {
        self.session.credentials().map_err(LedgerError::from)
    }

    fn loaded(&self) -> LedgerResult<Arc<LedgerDocument>> {
        self.document().ok_or(LedgerError::NotLoaded)
    }

    fn replace(&self, snapshot: Snapshot) {
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }
}

fn encode(document: &LedgerDocument) -> LedgerResult<String> {
    DocumentCodec::encode(document)
        .map_err(|e| LedgerError::Internal(format!("encode ledger: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::warning::LedgerWarning;
    use chrono::{DateTime, TimeZone, Utc};
    use vl_remote::{InMemoryHost, Method, StaticSession};
    use vl_types::Setup;

    const OWNER: &str = "acme";
    const REPO: &str = "qa";
    const PATH: &str = "ledger.json";

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn location() -> RepoLocation {
        RepoLocation::new("https://github.com/acme/qa", OWNER, REPO)
    }

    fn seeded() -> LedgerDocument {
        LedgerDocument {
            components: vec![Component::new("a", "Alpha"), Component::new("b", "Beta")],
            versions: vec![Version { date: at(5), component_id: "a".into(), tag: "1.0.0".into() }],
            setups: vec![Setup {
                id: "s1".into(),
                name: "Setup 1".into(),
                component_ids: vec!["a".into(), "b".into()],
            }],
            ..LedgerDocument::default()
        }
    }

    fn seed(host: &InMemoryHost, document: &LedgerDocument) -> String {
        host.seed_file(OWNER, REPO, PATH, &DocumentCodec::encode(document).unwrap())
    }

    fn store_on(host: &Arc<InMemoryHost>) -> LedgerStore {
        LedgerStore::new(location(), Arc::new(StaticSession::with_token("t")), host.clone())
            .with_clock(Arc::new(FixedClock::new(at(1_000))))
    }

    async fn loaded() -> (Arc<InMemoryHost>, LedgerStore) {
        let host = Arc::new(InMemoryHost::new());
        seed(&host, &seeded());
        let store = store_on(&host);
        store.fetch().await.unwrap();
        (host, store)
    }

    fn component(id: &str, name: &str) -> NewComponent {
        NewComponent { id: id.into(), name: name.into() }
    }

    fn remote_document(host: &InMemoryHost) -> LedgerDocument {
        DocumentCodec::decode(&host.file_content(OWNER, REPO, PATH).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn fetch_records_document_and_sha() {
        let host = Arc::new(InMemoryHost::new());
        let sha = seed(&host, &seeded());
        let store = store_on(&host);
        assert!(store.snapshot().is_none());

        let document = store.fetch().await.unwrap();
        assert_eq!(*document, seeded());
        assert_eq!(store.sha().unwrap(), sha);
    }

    #[tokio::test]
    async fn fetch_without_session_is_not_authenticated() {
        let host = Arc::new(InMemoryHost::new());
        seed(&host, &seeded());
        let store = LedgerStore::new(location(), Arc::new(StaticSession::new()), host.clone());
        assert!(matches!(store.fetch().await, Err(LedgerError::NotAuthenticated(_))));
        assert_eq!(host.request_count(Method::Get), 0);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_previous_snapshot() {
        let (host, store) = loaded().await;
        let before = store.sha().unwrap();
        host.fail_next(Method::Get, 500);
        assert!(matches!(store.fetch().await, Err(LedgerError::RemoteRead { status: 500, .. })));
        assert_eq!(store.sha().unwrap(), before);
    }

    #[tokio::test]
    async fn undecodable_document_is_fatal() {
        let host = Arc::new(InMemoryHost::new());
        host.seed_file(OWNER, REPO, PATH, "not*base64");
        let err = store_on(&host).fetch().await.unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn add_component_commits_and_confirms() {
        let (host, store) = loaded().await;
        let commit = store.add_component(component("c", "Gamma")).await.unwrap();
        assert!(!commit.has_warnings());
        assert_eq!(commit.value.collection, Collection::Components);
        assert_eq!(commit.value.sha, host.file_sha(OWNER, REPO, PATH).unwrap());
        assert_eq!(store.sha().unwrap(), commit.value.sha);
        assert_eq!(remote_document(&host).components.len(), 3);
        assert_eq!(host.commit_messages(), ["new components"]);
    }

    #[tokio::test]
    async fn rejected_component_leaves_document_untouched() {
        let (host, store) = loaded().await;
        let before = serde_json::to_vec(&*store.document().unwrap()).unwrap();
        let sha = store.sha();

        let err = store.add_component(component("z", "Alpha")).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::DuplicateComponent { .. })
        ));
        assert_eq!(serde_json::to_vec(&*store.document().unwrap()).unwrap(), before);
        assert_eq!(store.sha(), sha);
        assert_eq!(host.request_count(Method::Put), 0);
    }

    #[tokio::test]
    async fn mutation_before_fetch_is_not_loaded() {
        let host = Arc::new(InMemoryHost::new());
        let store = store_on(&host);
        let err = store.add_component(component("c", "Gamma")).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::NotLoaded { ref url }) if url == "https://github.com/acme/qa"
        ));
        assert!(matches!(store.latest_versions(None), Err(LedgerError::NotLoaded)));
    }

    #[tokio::test]
    async fn setup_is_stored_sorted() {
        let (host, store) = loaded().await;
        store.add_component(component("c", "Gamma")).await.unwrap();
        store
            .add_setup(NewSetup {
                id: "s2".into(),
                name: "Setup 2".into(),
                component_ids: vec!["c".into(), "a".into()],
            })
            .await
            .unwrap();
        assert_eq!(remote_document(&host).setups[1].component_ids, ["a", "c"]);
    }

    #[tokio::test]
    async fn duplicate_version_warns_and_persists_both() {
        let (host, store) = loaded().await;
        let commit = store
            .add_version(NewVersion { component_id: "a".into(), tag: "1.0.0".into() })
            .await
            .unwrap();
        assert_eq!(
            commit.warnings,
            [LedgerWarning::DuplicateVersion {
                component_id: "a".into(),
                tag: "1.0.0".into(),
                created_at: at(5),
            }]
        );
        let versions = remote_document(&host).versions;
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[1].date, at(1_000));
    }

    #[tokio::test]
    async fn empty_version_map_fails_before_any_write() {
        let (host, store) = loaded().await;
        let err = store
            .add_test(NewTest {
                setup_id: "s1".into(),
                status: "passed".into(),
                description: None,
                component_version_map: Default::default(),
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(host.request_count(Method::Put), 0);
    }

    #[tokio::test]
    async fn test_with_unknown_references_is_saved_with_warnings() {
        let (host, store) = loaded().await;
        let commit = store
            .add_test(NewTest {
                setup_id: "nowhere".into(),
                status: "failed".into(),
                description: Some("flaky boot".into()),
                component_version_map: [("a".to_string(), "2.0.0".to_string())].into(),
            })
            .await
            .unwrap();
        assert_eq!(commit.warnings.len(), 2);
        assert_eq!(remote_document(&host).tests.len(), 1);
        assert_eq!(store.tests(&TestFilter::default()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn divergent_confirmation_is_consistency_fault() {
        let (host, store) = loaded().await;
        let mut foreign = seeded();
        foreign.components.push(Component::new("x", "Foreign"));
        host.overwrite_after_next_write(DocumentCodec::encode(&foreign).unwrap());

        let err = store.add_component(component("c", "Gamma")).await.unwrap_err();
        let LedgerError::ConsistencyFault { written_sha, confirmed_sha } = &err else {
            panic!("expected consistency fault, got {err:?}");
        };
        assert!(err.is_fatal());
        assert_ne!(written_sha, confirmed_sha);
        assert_eq!(confirmed_sha, &host.file_sha(OWNER, REPO, PATH).unwrap());

        // Local state is the document this client wrote, at the write's hash.
        assert_eq!(&store.sha().unwrap(), written_sha);
        let local = store.document().unwrap();
        assert!(local.has_component("c"));
        assert!(!local.has_component("x"));
    }

    #[tokio::test]
    async fn failed_confirmation_read_still_commits() {
        let (host, store) = loaded().await;
        // The write's own read happens after the PUT.
        host.fail_next(Method::Get, 503);
        let err = store.add_component(component("c", "Gamma")).await.unwrap_err();
        assert!(matches!(err, LedgerError::Unconfirmed { .. }));
        assert!(store.document().unwrap().has_component("c"));
        assert_eq!(store.sha(), host.file_sha(OWNER, REPO, PATH));
    }

    #[tokio::test]
    async fn rejected_write_keeps_state() {
        let (host, store) = loaded().await;
        let sha = store.sha();
        host.fail_next(Method::Put, 409);
        let err = store.add_component(component("c", "Gamma")).await.unwrap_err();
        assert!(matches!(err, LedgerError::RemoteWrite { status: 409, .. }));
        assert_eq!(store.sha(), sha);
        assert!(!store.document().unwrap().has_component("c"));
    }

    #[tokio::test]
    async fn disconnected_session_cannot_write() {
        let host = Arc::new(InMemoryHost::new());
        seed(&host, &seeded());
        let session = Arc::new(StaticSession::with_token("t"));
        let store = LedgerStore::new(location(), session.clone(), host.clone());
        store.fetch().await.unwrap();
        session.disconnect();
        let err = store.add_component(component("c", "Gamma")).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotAuthenticated(_)));
        assert_eq!(host.request_count(Method::Put), 0);
    }

    #[tokio::test]
    async fn concurrent_mutations_are_serialized() {
        let (host, store) = loaded().await;
        let (first, second) = tokio::join!(
            store.add_component(component("c", "Gamma")),
            store.add_component(component("d", "Delta")),
        );
        first.unwrap();
        second.unwrap();
        let remote = remote_document(&host);
        assert!(remote.has_component("c") && remote.has_component("d"));
        assert_eq!(host.request_count(Method::Put), 2);
    }

    #[tokio::test]
    async fn stale_store_recovers_with_refetch_and_retry() {
        let (host, ours) = loaded().await;
        let theirs = store_on(&host);
        theirs.fetch().await.unwrap();
        theirs.add_component(component("c", "Gamma")).await.unwrap();

        let mutation = Mutation::AddComponent(component("d", "Delta"));
        let err = ours.apply(mutation.clone()).await.unwrap_err();
        assert!(matches!(err, LedgerError::RemoteWrite { status: 409, .. }));

        ours.refetch_and_retry(mutation).await.unwrap();
        let remote = remote_document(&host);
        assert!(remote.has_component("c") && remote.has_component("d"));
    }

    #[tokio::test]
    async fn initialize_creates_missing_ledger() {
        let host = Arc::new(InMemoryHost::new());
        let store = store_on(&host);
        assert!(store.initialize().await.unwrap());
        assert_eq!(remote_document(&host), LedgerDocument::empty());
        assert_eq!(store.sha(), host.file_sha(OWNER, REPO, PATH));

        store.add_component(component("a", "Alpha")).await.unwrap();
        assert!(!store.initialize().await.unwrap());
        assert!(store.document().unwrap().has_component("a"));
    }

    #[tokio::test]
    async fn queries_follow_commits() {
        let (_host, store) = loaded().await;
        for tag in ["1.2.0", "1.10.0"] {
            store
                .add_version(NewVersion { component_id: "a".into(), tag: tag.into() })
                .await
                .unwrap();
        }
        assert_eq!(store.latest_component_version("a").unwrap().unwrap().tag, "1.10.0");
        assert_eq!(store.latest_versions(Some("s1")).unwrap().len(), 1);
        assert_eq!(store.setup_components("s1").unwrap().value.len(), 2);
        assert_eq!(store.component_versions(&["a".into()]).unwrap()["a"], ["1.10.0", "1.2.0", "1.0.0"]);
        assert_eq!(store.release_history().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unknown_setup_query_is_not_found_without_mutation() {
        let (host, store) = loaded().await;
        let sha = store.sha();
        assert!(matches!(
            store.setup_components("nope"),
            Err(LedgerError::NotFound { kind: "setup", .. })
        ));
        assert!(store.setup_tests("nope").unwrap().is_empty());
        assert_eq!(store.sha(), sha);
        assert_eq!(host.request_count(Method::Put), 0);
    }

    #[tokio::test]
    async fn wall_clock_writes_match_the_persisted_document() {
        let host = Arc::new(InMemoryHost::new());
        let store = LedgerStore::new(location(), Arc::new(StaticSession::with_token("t")), host.clone());
        store.initialize().await.unwrap();
        store.add_component(component("fw", "Firmware")).await.unwrap();
        store
            .add_version(NewVersion { component_id: "fw".into(), tag: "1.0.0".into() })
            .await
            .unwrap();
        store
            .add_test(NewTest {
                setup_id: "bench".into(),
                status: "passed".into(),
                description: None,
                component_version_map: [("fw".to_string(), "1.0.0".to_string())].into(),
            })
            .await
            .unwrap();

        let local = store.document().unwrap();
        assert_eq!(*local, remote_document(&host));
        assert_eq!(*store.fetch().await.unwrap(), *local);
    }

    #[tokio::test]
    async fn release_history_follows_recording_time() {
        let host = Arc::new(InMemoryHost::new());
        seed(&host, &seeded());
        let clock = Arc::new(FixedClock::new(at(1_000)));
        let store = LedgerStore::new(location(), Arc::new(StaticSession::with_token("t")), host.clone())
            .with_clock(clock.clone());
        store.fetch().await.unwrap();
        for tag in ["2.0.0", "1.5.0"] {
            store
                .add_version(NewVersion { component_id: "a".into(), tag: tag.into() })
                .await
                .unwrap();
            clock.advance(chrono::Duration::seconds(1));
        }
        let tags: Vec<String> = store.release_history().unwrap().into_iter().map(|v| v.tag).collect();
        assert_eq!(tags, ["1.5.0", "2.0.0", "1.0.0"]);
        assert_eq!(store.latest_component_version("a").unwrap().unwrap().tag, "2.0.0");
    }

    #[tokio::test]
    async fn current_user_uses_session_token() {
        let host = Arc::new(InMemoryHost::new().with_login("octocat"));
        let store = store_on(&host);
        assert_eq!(store.current_user().await.unwrap().login, "octocat");
    }
}
