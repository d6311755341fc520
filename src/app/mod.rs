use std::sync::Arc;
use std::time::{Duration, Instant};

use eframe::egui::{Color32, Context};
use tracing::{debug, warn};

use crate::concept::{ConceptNode, Expander, MergePolicy};

mod highlight;
mod render_utils;
mod session;
mod sunburst;
mod ui;

pub use sunburst::ClickPolicy;

use highlight::SearchMatchCache;
use session::{ExpansionRequest, Session, SessionError, SessionUpdate};
use sunburst::{FocusTransition, PanGesture, Partition, ViewTransform};

/// Startup options resolved from the command line.
pub struct Settings {
    pub credential: String,
    pub click_policy: ClickPolicy,
    pub merge_policy: MergePolicy,
    pub timeout: Duration,
    pub initial_tree: Option<ConceptNode>,
    pub initial_concept: Option<String>,
}

pub struct SunburstApp {
    model: ViewModel,
}

struct Notice {
    text: String,
    warning: bool,
}

struct ViewModel {
    session: Session,
    expander: Arc<dyn Expander>,
    click_policy: ClickPolicy,
    partition: Partition,
    palette: Vec<Color32>,
    layout_revision: u64,
    tree_revision: u64,
    focus: usize,
    transition: Option<FocusTransition>,
    view: ViewTransform,
    pan: PanGesture,
    concept_input: String,
    search: String,
    search_cache: Option<SearchMatchCache>,
    notice: Option<Notice>,
}

impl SunburstApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        settings: Settings,
        expander: Arc<dyn Expander>,
    ) -> Self {
        Self {
            model: ViewModel::new(settings, expander),
        }
    }
}

impl eframe::App for SunburstApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.model.show(ctx);
    }
}

impl ViewModel {
    fn new(settings: Settings, expander: Arc<dyn Expander>) -> Self {
        let tree = settings.initial_tree.unwrap_or_else(ConceptNode::placeholder);
        let concept_input = settings
            .initial_concept
            .clone()
            .unwrap_or_else(|| tree.name.clone());
        let partition = Partition::new(&tree);
        let palette = render_utils::branch_palette(partition.branch_count());

        let mut model = Self {
            session: Session::new(
                tree,
                settings.credential,
                settings.merge_policy,
                settings.timeout,
            ),
            expander,
            click_policy: settings.click_policy,
            partition,
            palette,
            layout_revision: 0,
            tree_revision: 0,
            focus: Partition::ROOT,
            transition: None,
            view: ViewTransform::default(),
            pan: PanGesture::default(),
            concept_input,
            search: String::new(),
            search_cache: None,
            notice: None,
        };

        if let Some(concept) = settings.initial_concept {
            model.start_expansion(ExpansionRequest::root(concept));
        }
        model
    }

    /// Rebuilds the layout after the tree changed, keeping the focused node
    /// (found again by its name path) and the pan/zoom transform.
    fn sync_layout(&mut self) {
        if self.session.revision() == self.tree_revision {
            return;
        }

        let focus_path = self.partition.path_to(self.focus);
        self.partition = Partition::new(self.session.tree());
        self.palette = render_utils::branch_palette(self.partition.branch_count());
        self.tree_revision = self.session.revision();
        self.layout_revision += 1;
        self.transition = None;

        self.focus = self
            .partition
            .find_path(&focus_path)
            .unwrap_or(Partition::ROOT);
        if self.focus != Partition::ROOT {
            self.partition.retarget(self.focus);
            self.partition.settle();
        }
    }

    fn poll_session(&mut self, ctx: &Context) {
        if let Some(outcome) = self.session.poll(Instant::now()) {
            match outcome {
                Ok(SessionUpdate::TreeReplaced) => {
                    self.concept_input = self.session.tree().name.clone();
                    self.notice = None;
                }
                Ok(SessionUpdate::Merged { concept, children }) => {
                    debug!(%concept, children, "relayout after merge");
                    self.notice = None;
                }
                Err(error) => self.report(error),
            }
            self.sync_layout();
        }

        if self.session.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }

    fn start_expansion(&mut self, request: ExpansionRequest) {
        match self
            .session
            .request_expansion(&self.expander, request, Instant::now())
        {
            Ok(true) => self.notice = None,
            Ok(false) => {}
            Err(error) => self.report(error),
        }
    }

    fn generate_from_input(&mut self) {
        let concept = self.concept_input.trim().to_owned();
        if concept.is_empty() {
            self.notice = Some(Notice {
                text: "Enter a concept to explore first.".to_owned(),
                warning: true,
            });
            return;
        }
        self.start_expansion(ExpansionRequest::root(concept));
    }

    fn report(&mut self, error: SessionError) {
        if !error.is_warning() {
            warn!(%error, "expansion problem reported to user");
        }
        self.notice = Some(Notice {
            warning: error.is_warning(),
            text: error.to_string(),
        });
    }

    fn drill(&mut self, index: usize, now: f64) {
        if index == self.focus || self.partition.node(index).is_none() {
            return;
        }

        self.transition = Some(FocusTransition::start(&self.partition, now));
        self.partition.retarget(index);
        self.focus = index;
        debug!(focus = ?self.partition.path_to(index), "focus changed");
    }

    fn zoom_out(&mut self, now: f64) {
        let parent = self
            .partition
            .node(self.focus)
            .and_then(|node| node.parent)
            .unwrap_or(Partition::ROOT);
        self.drill(parent, now);
    }

    fn reset_view(&mut self) {
        self.view = ViewTransform::default();
        self.transition = None;
        self.focus = Partition::ROOT;
        self.partition.retarget(Partition::ROOT);
        self.partition.settle();
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;
    use std::thread;

    use eframe::egui::{Pos2, vec2};

    use super::sunburst::ArcExtent;
    use super::*;
    use crate::concept::ExpandError;

    /// Answers every request with the same child names.
    struct CannedExpander {
        children: Vec<&'static str>,
    }

    impl Expander for CannedExpander {
        fn expand(
            &self,
            concept: &str,
            _parent_context: &str,
            _credential: &str,
        ) -> Result<ConceptNode, ExpandError> {
            Ok(ConceptNode::with_children(
                concept,
                self.children.iter().map(|name| ConceptNode::leaf(*name)).collect(),
            ))
        }
    }

    const FULL_CIRCLE: ArcExtent = ArcExtent {
        x0: 0.0,
        x1: TAU,
        y0: 0.0,
        y1: 1.0,
    };

    fn model(tree: ConceptNode, children: &[&'static str]) -> ViewModel {
        ViewModel::new(
            Settings {
                credential: "key".to_owned(),
                click_policy: ClickPolicy::ExpandLeaves,
                merge_policy: MergePolicy::Replace,
                timeout: Duration::from_secs(30),
                initial_tree: Some(tree),
                initial_concept: None,
            },
            Arc::new(CannedExpander {
                children: children.to_vec(),
            }),
        )
    }

    fn nested_tree() -> ConceptNode {
        ConceptNode::with_children(
            "root",
            vec![
                ConceptNode::with_children(
                    "A",
                    vec![
                        ConceptNode::with_children("A1", vec![ConceptNode::leaf("A1a")]),
                        ConceptNode::leaf("A2"),
                    ],
                ),
                ConceptNode::leaf("B"),
            ],
        )
    }

    fn index_of(model: &ViewModel, path: &[&str]) -> usize {
        let path = path.iter().map(|name| (*name).to_owned()).collect::<Vec<_>>();
        model.partition.find_path(&path).expect("path exists")
    }

    fn close(a: ArcExtent, b: ArcExtent) -> bool {
        (a.x0 - b.x0).abs() < 1e-4
            && (a.x1 - b.x1).abs() < 1e-4
            && (a.y0 - b.y0).abs() < 1e-4
            && (a.y1 - b.y1).abs() < 1e-4
    }

    fn wait_for_session(model: &mut ViewModel) {
        let ctx = Context::default();
        for _ in 0..500 {
            model.poll_session(&ctx);
            if !model.session.is_loading() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("expansion never finished");
    }

    #[test]
    fn merge_keeps_focus_and_view() {
        let mut model = model(nested_tree(), &["x", "y"]);
        let a = index_of(&model, &["A"]);
        model.drill(a, 0.0);
        model.view.pan_by(vec2(10.0, 5.0));
        let view_before = model.view;

        model.start_expansion(ExpansionRequest::child("A2", "A"));
        assert!(model.session.is_loading());
        wait_for_session(&mut model);

        assert!(model.notice.is_none());
        assert_eq!(model.session.tree().node_count(), 8);
        assert_eq!(model.partition.path_to(model.focus), ["A"]);
        assert!(model.transition.is_none());
        let focus = model.partition.node(model.focus).expect("focus node");
        assert!(close(focus.current, FULL_CIRCLE));
        assert_eq!(model.view, view_before);
        let merged = index_of(&model, &["A", "A2", "y"]);
        assert_eq!(model.partition.node(merged).map(|node| node.depth), Some(3));
    }

    #[test]
    fn zoom_out_steps_up_one_level_at_a_time() {
        let mut model = model(nested_tree(), &[]);
        let a = index_of(&model, &["A"]);
        let a1 = index_of(&model, &["A", "A1"]);

        model.drill(a1, 0.0);
        assert_eq!(model.focus, a1);

        model.zoom_out(0.0);
        assert_eq!(model.focus, a);
        assert!(model.transition.is_some());
        let parent = model.partition.node(a).expect("parent");
        assert!(close(parent.target, FULL_CIRCLE));

        model.zoom_out(0.0);
        assert_eq!(model.focus, Partition::ROOT);
        for node in model.partition.nodes() {
            assert!(close(node.target, node.extent), "{} not at rest", node.name);
        }
    }

    #[test]
    fn reset_view_restores_root_and_identity_transform() {
        let mut model = model(nested_tree(), &[]);
        let a1 = index_of(&model, &["A", "A1"]);
        model.drill(a1, 0.0);
        model.view.pan_by(vec2(-40.0, 12.0));
        model.view.zoom_about(Pos2::ZERO, Pos2::new(30.0, 30.0), 2.0);

        model.reset_view();

        assert_eq!(model.view, ViewTransform::default());
        assert_eq!(model.focus, Partition::ROOT);
        assert!(model.transition.is_none());
        for node in model.partition.nodes() {
            assert!(close(node.current, node.extent), "{} not at rest", node.name);
        }
    }

    #[test]
    fn generating_a_new_root_falls_back_to_root_focus() {
        let mut model = model(nested_tree(), &["milk", "leaves"]);
        let a = index_of(&model, &["A"]);
        model.drill(a, 0.0);

        model.concept_input = "  tea ".to_owned();
        model.generate_from_input();
        wait_for_session(&mut model);

        assert_eq!(model.session.tree().name, "tea");
        assert_eq!(model.concept_input, "tea");
        assert_eq!(model.focus, Partition::ROOT);
        assert_eq!(model.partition.branch_count(), 2);
        for node in model.partition.nodes() {
            assert!(close(node.current, node.extent), "{} not at rest", node.name);
        }
    }
}
