use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::concept::{ConceptNode, ExpandError, Expander, MergeOutcome, MergePolicy, merge_children};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("an API key is required before concepts can be expanded")]
    MissingCredential,
    #[error("expanding \"{concept}\" failed: {reason}")]
    ExpansionFailed { concept: String, reason: String },
    #[error("expanding \"{concept}\" timed out after {}s", .after.as_secs())]
    ExpansionTimedOut { concept: String, after: Duration },
    #[error("\"{0}\" is no longer in the tree; the expansion was dropped")]
    MergeTargetNotFound(String),
}

impl SessionError {
    /// Warnings leave the session exactly as it was and need no retry.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::MergeTargetNotFound(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpansionRequest {
    pub concept: String,
    /// Empty when generating a brand new diagram from a root word.
    pub parent_context: String,
}

impl ExpansionRequest {
    pub fn root(concept: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            parent_context: String::new(),
        }
    }

    pub fn child(concept: impl Into<String>, parent_context: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            parent_context: parent_context.into(),
        }
    }

    fn is_root(&self) -> bool {
        self.parent_context.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    TreeReplaced,
    Merged { concept: String, children: usize },
}

struct PendingExpansion {
    request: ExpansionRequest,
    rx: Receiver<Result<ConceptNode, ExpandError>>,
    started_at: Instant,
}

/// Owns the concept tree and the single in-flight expansion.
pub struct Session {
    tree: Arc<ConceptNode>,
    revision: u64,
    credential: String,
    merge_policy: MergePolicy,
    timeout: Duration,
    pending: Option<PendingExpansion>,
}

impl Session {
    pub fn new(
        tree: ConceptNode,
        credential: String,
        merge_policy: MergePolicy,
        timeout: Duration,
    ) -> Self {
        Self {
            tree: Arc::new(tree),
            revision: 0,
            credential,
            merge_policy,
            timeout,
            pending: None,
        }
    }

    pub fn tree(&self) -> &Arc<ConceptNode> {
        &self.tree
    }

    /// Bumped every time the tree reference changes.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_concept(&self) -> Option<&str> {
        self.pending
            .as_ref()
            .map(|pending| pending.request.concept.as_str())
    }

    pub fn credential_mut(&mut self) -> &mut String {
        &mut self.credential
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    pub fn set_merge_policy(&mut self, policy: MergePolicy) {
        self.merge_policy = policy;
    }

    /// Starts `request` on a worker thread. Returns `Ok(false)` without calling
    /// the expander when another expansion is still running.
    pub fn request_expansion(
        &mut self,
        expander: &Arc<dyn Expander>,
        request: ExpansionRequest,
        now: Instant,
    ) -> Result<bool, SessionError> {
        let credential = self.credential.trim().to_owned();
        if credential.is_empty() {
            return Err(SessionError::MissingCredential);
        }

        if !request.is_root() && self.tree.find(&request.concept).is_none() {
            return Err(SessionError::MergeTargetNotFound(request.concept));
        }

        if let Some(pending) = &self.pending {
            debug!(
                ignored = %request.concept,
                in_flight = %pending.request.concept,
                "expansion already in flight"
            );
            return Ok(false);
        }

        let (tx, rx) = mpsc::channel();
        let worker_expander = Arc::clone(expander);
        let worker_request = request.clone();
        self.pending = Some(PendingExpansion {
            request,
            rx,
            started_at: now,
        });

        info!(
            concept = %worker_request.concept,
            parent = %worker_request.parent_context,
            "requesting expansion"
        );
        thread::spawn(move || {
            let result = worker_expander.expand(
                &worker_request.concept,
                &worker_request.parent_context,
                &credential,
            );
            let _ = tx.send(result);
        });

        Ok(true)
    }

    /// Checks the in-flight expansion. Every terminal outcome clears the
    /// loading state; `None` means nothing happened this time.
    pub fn poll(&mut self, now: Instant) -> Option<Result<SessionUpdate, SessionError>> {
        let pending = self.pending.take()?;

        let result = match pending.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => {
                let elapsed = now.saturating_duration_since(pending.started_at);
                if elapsed >= self.timeout {
                    warn!(concept = %pending.request.concept, ?elapsed, "expansion timed out");
                    return Some(Err(SessionError::ExpansionTimedOut {
                        concept: pending.request.concept,
                        after: self.timeout,
                    }));
                }
                self.pending = Some(pending);
                return None;
            }
            Err(TryRecvError::Disconnected) => {
                warn!(concept = %pending.request.concept, "expansion worker disconnected");
                return Some(Err(SessionError::ExpansionFailed {
                    concept: pending.request.concept,
                    reason: "expansion worker exited without a result".to_owned(),
                }));
            }
        };

        Some(self.apply(pending.request, result))
    }

    fn apply(
        &mut self,
        request: ExpansionRequest,
        result: Result<ConceptNode, ExpandError>,
    ) -> Result<SessionUpdate, SessionError> {
        let node = result
            .map_err(|error| {
                warn!(concept = %request.concept, %error, "expansion failed");
                SessionError::ExpansionFailed {
                    concept: request.concept.clone(),
                    reason: error.to_string(),
                }
            })?
            .sanitized();

        if request.is_root() {
            let mut root = node;
            if root.name.is_empty() {
                root.name = request.concept.clone();
            }
            info!(concept = %root.name, children = root.children.len(), "diagram generated");
            self.replace_tree(Arc::new(root));
            return Ok(SessionUpdate::TreeReplaced);
        }

        match merge_children(
            &self.tree,
            &request.concept,
            &node.children,
            self.merge_policy,
        ) {
            MergeOutcome::Merged(tree) => {
                let children = node.children.len();
                info!(concept = %request.concept, children, "expansion merged");
                self.replace_tree(tree);
                Ok(SessionUpdate::Merged {
                    concept: request.concept,
                    children,
                })
            }
            MergeOutcome::TargetNotFound => {
                warn!(concept = %request.concept, "merge target not found");
                Err(SessionError::MergeTargetNotFound(request.concept))
            }
        }
    }

    fn replace_tree(&mut self, tree: Arc<ConceptNode>) {
        self.tree = tree;
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(30);

    /// Returns a canned reply immediately and counts calls.
    struct StaticExpander {
        calls: AtomicUsize,
        children: Vec<&'static str>,
    }

    impl StaticExpander {
        fn new(children: &[&'static str]) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                children: children.to_vec(),
            }
        }
    }

    impl Expander for StaticExpander {
        fn expand(
            &self,
            concept: &str,
            _parent_context: &str,
            _credential: &str,
        ) -> Result<ConceptNode, ExpandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ConceptNode::with_children(
                concept,
                self.children.iter().map(|name| ConceptNode::leaf(*name)).collect(),
            ))
        }
    }

    /// Blocks until the test drops the sender.
    struct GatedExpander {
        calls: AtomicUsize,
        gate: Mutex<Receiver<()>>,
    }

    impl Expander for GatedExpander {
        fn expand(
            &self,
            concept: &str,
            _parent_context: &str,
            _credential: &str,
        ) -> Result<ConceptNode, ExpandError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().expect("gate lock");
            let _ = gate.recv();
            Ok(ConceptNode::leaf(concept))
        }
    }

    struct FailingExpander;

    impl Expander for FailingExpander {
        fn expand(
            &self,
            _concept: &str,
            _parent_context: &str,
            _credential: &str,
        ) -> Result<ConceptNode, ExpandError> {
            Err(ExpandError::InvalidCredential("HTTP 403".to_owned()))
        }
    }

    fn seeded_session() -> Session {
        Session::new(
            ConceptNode::with_children("root", vec![ConceptNode::leaf("A"), ConceptNode::leaf("B")]),
            "key".to_owned(),
            MergePolicy::Replace,
            TIMEOUT,
        )
    }

    fn wait(session: &mut Session) -> Result<SessionUpdate, SessionError> {
        for _ in 0..500 {
            if let Some(outcome) = session.poll(Instant::now()) {
                return outcome;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("expansion never finished");
    }

    #[test]
    fn missing_credential_is_reported_before_any_request() {
        let expander = Arc::new(StaticExpander::new(&["x"]));
        let dyn_expander: Arc<dyn Expander> = expander.clone();
        let mut session = seeded_session();
        session.credential_mut().clear();

        let error = session
            .request_expansion(&dyn_expander, ExpansionRequest::child("A", "root"), Instant::now())
            .expect_err("no credential");

        assert!(matches!(error, SessionError::MissingCredential));
        assert!(!session.is_loading());
        assert_eq!(expander.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_expansion_merges_and_shares_siblings() {
        let expander: Arc<dyn Expander> = Arc::new(StaticExpander::new(&["A1", "A2"]));
        let mut session = seeded_session();
        let before = Arc::clone(session.tree());

        assert!(
            session
                .request_expansion(&expander, ExpansionRequest::child("A", "root"), Instant::now())
                .expect("started")
        );
        assert!(session.is_loading());

        let update = wait(&mut session).expect("merged");
        assert_eq!(
            update,
            SessionUpdate::Merged {
                concept: "A".to_owned(),
                children: 2
            }
        );
        assert!(!session.is_loading());
        assert_eq!(session.revision(), 1);

        let tree = session.tree();
        let names = tree.children[0]
            .children
            .iter()
            .map(|child| child.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["A1", "A2"]);
        assert!(Arc::ptr_eq(&tree.children[1], &before.children[1]));
        assert!(before.children[0].is_leaf());
    }

    #[test]
    fn root_request_replaces_tree() {
        let expander: Arc<dyn Expander> = Arc::new(StaticExpander::new(&["x", "y", "z"]));
        let mut session = Session::new(
            ConceptNode::placeholder(),
            "key".to_owned(),
            MergePolicy::Replace,
            TIMEOUT,
        );

        session
            .request_expansion(&expander, ExpansionRequest::root("tea"), Instant::now())
            .expect("started");
        assert_eq!(wait(&mut session).expect("replaced"), SessionUpdate::TreeReplaced);
        assert_eq!(session.tree().name, "tea");
        assert_eq!(session.tree().children.len(), 3);
    }

    #[test]
    fn failure_leaves_tree_reference_untouched() {
        let expander: Arc<dyn Expander> = Arc::new(FailingExpander);
        let mut session = seeded_session();
        let before = Arc::clone(session.tree());

        session
            .request_expansion(&expander, ExpansionRequest::child("A", "root"), Instant::now())
            .expect("started");
        let error = wait(&mut session).expect_err("fails");

        assert!(matches!(error, SessionError::ExpansionFailed { .. }));
        assert!(!error.is_warning());
        assert!(Arc::ptr_eq(session.tree(), &before));
        assert!(!session.is_loading());
        assert_eq!(session.revision(), 0);
    }

    #[test]
    fn second_request_while_pending_never_reaches_expander() {
        let (release, gate) = mpsc::channel();
        let expander = Arc::new(GatedExpander {
            calls: AtomicUsize::new(0),
            gate: Mutex::new(gate),
        });
        let dyn_expander: Arc<dyn Expander> = expander.clone();
        let mut session = seeded_session();
        let now = Instant::now();

        assert!(
            session
                .request_expansion(&dyn_expander, ExpansionRequest::child("A", "root"), now)
                .expect("started")
        );
        assert!(
            !session
                .request_expansion(&dyn_expander, ExpansionRequest::child("B", "root"), now)
                .expect("ignored")
        );

        drop(release);
        wait(&mut session).expect("first expansion completes");
        assert_eq!(expander.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hung_expansion_times_out_and_clears_loading() {
        let (release, gate) = mpsc::channel::<()>();
        let expander: Arc<dyn Expander> = Arc::new(GatedExpander {
            calls: AtomicUsize::new(0),
            gate: Mutex::new(gate),
        });
        let mut session = seeded_session();
        let started = Instant::now();
        let before = Arc::clone(session.tree());

        session
            .request_expansion(&expander, ExpansionRequest::child("A", "root"), started)
            .expect("started");
        assert!(session.poll(started).is_none());
        assert!(session.is_loading());

        let outcome = session.poll(started + TIMEOUT).expect("timed out");
        assert!(matches!(outcome, Err(SessionError::ExpansionTimedOut { .. })));
        assert!(!session.is_loading());
        assert!(Arc::ptr_eq(session.tree(), &before));

        drop(release);
    }

    #[test]
    fn vanished_target_is_a_warning() {
        let mut session = seeded_session();
        let before = Arc::clone(session.tree());

        let outcome = session.apply(
            ExpansionRequest::child("gone", "root"),
            Ok(ConceptNode::with_children("gone", vec![ConceptNode::leaf("x")])),
        );

        let error = outcome.expect_err("target missing");
        assert!(error.is_warning());
        assert!(Arc::ptr_eq(session.tree(), &before));
    }

    #[test]
    fn unknown_target_is_rejected_before_calling_expander() {
        let mut session = seeded_session();
        let static_expander = Arc::new(StaticExpander::new(&["x"]));
        let expander: Arc<dyn Expander> = static_expander.clone();

        let error = session
            .request_expansion(
                &expander,
                ExpansionRequest::child("missing", "root"),
                Instant::now(),
            )
            .expect_err("target missing");

        assert!(error.is_warning());
        assert!(!session.is_loading());
        assert_eq!(static_expander.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn merged_children_are_sanitized_whatever_the_expander() {
        let mut session = seeded_session();

        session
            .apply(
                ExpansionRequest::child("A", "root"),
                Ok(ConceptNode {
                    name: "A".to_owned(),
                    value: None,
                    children: vec![
                        Arc::new(ConceptNode::leaf(" A1 ")),
                        Arc::new(ConceptNode::leaf("A1")),
                        Arc::new(ConceptNode::leaf("   ")),
                        Arc::new(ConceptNode {
                            name: "A2".to_owned(),
                            value: Some(f32::NAN),
                            children: Vec::new(),
                        }),
                    ],
                }),
            )
            .expect("merged");

        let children = &session.tree().children[0].children;
        let names = children
            .iter()
            .map(|child| child.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["A1", "A2"]);
        assert_eq!(children[1].value, None);
    }

    #[test]
    fn append_policy_extends_existing_children() {
        let mut session = Session::new(
            ConceptNode::with_children(
                "root",
                vec![ConceptNode::with_children("A", vec![ConceptNode::leaf("A1")])],
            ),
            "key".to_owned(),
            MergePolicy::Append,
            TIMEOUT,
        );

        session
            .apply(
                ExpansionRequest::child("A", "root"),
                Ok(ConceptNode::with_children("A", vec![ConceptNode::leaf("A2")])),
            )
            .expect("merged");

        assert_eq!(session.tree().children[0].children.len(), 2);
    }
}
