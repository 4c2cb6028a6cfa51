//! Headless page model the coordinator operates on
//!
//! Image elements are shared handles: the page driver that owns the document
//! and the coordinator both hold clones of the same element.

use crate::{
    error::{LoadError, LoadResult},
    types::{RawImage, ResourceId},
};

use parking_lot::{Condvar, Mutex};
use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Load state of the element's current source
#[derive(Debug, Clone)]
pub enum LoadStatus {
    /// Source assigned, not settled yet
    Pending,
    /// Source decoded
    Loaded(RawImage),
    /// Source failed to load
    Failed(String),
}

#[derive(Debug)]
struct ElementInner {
    src: Option<ResourceId>,
    data_src: Option<ResourceId>,
    classes: Vec<String>,
    status: LoadStatus,
}

impl ElementInner {
    fn src_label(&self) -> String {
        self.src.as_ref().map(ToString::to_string).unwrap_or_default()
    }
}

struct Shared {
    id: u64,
    state: Mutex<ElementInner>,
    settled: Condvar,
}

/// Handle to an `<img>` element
#[derive(Clone)]
pub struct ImageElement(Arc<Shared>);

impl ImageElement {
    fn with_state(state: ElementInner) -> Self {
        Self(Arc::new(Shared {
            id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(state),
            settled: Condvar::new(),
        }))
    }

    /// Element whose source is still loading
    pub fn new(src: impl Into<ResourceId>) -> Self {
        Self::with_state(ElementInner {
            src: Some(src.into()),
            data_src: None,
            classes: Vec::new(),
            status: LoadStatus::Pending,
        })
    }

    /// Element whose source has already decoded
    pub fn loaded(src: impl Into<ResourceId>, image: RawImage) -> Self {
        let element = Self::new(src);
        element.finish_loading(image);
        element
    }

    /// Deferred element: no `src` yet, real source in `data-src`, class `lazy`
    pub fn lazy(data_src: impl Into<ResourceId>) -> Self {
        Self::with_state(ElementInner {
            src: None,
            data_src: Some(data_src.into()),
            classes: vec!["lazy".to_string()],
            status: LoadStatus::Pending,
        })
    }

    /// Stable identifier, unique per process
    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn src(&self) -> Option<ResourceId> {
        self.0.state.lock().src.clone()
    }

    /// Point the element at a new source; it is pending until settled again
    pub fn set_src(&self, src: ResourceId) {
        let mut state = self.0.state.lock();
        state.src = Some(src);
        state.status = LoadStatus::Pending;
    }

    pub fn data_src(&self) -> Option<ResourceId> {
        self.0.state.lock().data_src.clone()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.0.state.lock().classes.iter().any(|c| c == class)
    }

    pub fn remove_class(&self, class: &str) {
        self.0.state.lock().classes.retain(|c| c != class);
    }

    /// Whether the current source has settled, successfully or not
    pub fn is_complete(&self) -> bool {
        !matches!(self.0.state.lock().status, LoadStatus::Pending)
    }

    pub fn status(&self) -> LoadStatus {
        self.0.state.lock().status.clone()
    }

    /// Natural dimensions once decoded
    pub fn natural_size(&self) -> Option<(u32, u32)> {
        match &self.0.state.lock().status {
            LoadStatus::Loaded(image) => Some((image.width, image.height)),
            _ => None,
        }
    }

    /// Settle the current source as decoded and wake waiters
    pub fn finish_loading(&self, image: RawImage) {
        self.0.state.lock().status = LoadStatus::Loaded(image);
        self.0.settled.notify_all();
    }

    /// Settle the current source as failed and wake waiters
    pub fn fail_loading(&self, reason: impl Into<String>) {
        self.0.state.lock().status = LoadStatus::Failed(reason.into());
        self.0.settled.notify_all();
    }

    /// Wait until the current source settles and return its pixels.
    ///
    /// `None` waits without bound.
    pub fn decode(&self, timeout: Option<Duration>) -> LoadResult<RawImage> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.0.state.lock();
        loop {
            match &state.status {
                LoadStatus::Loaded(image) => return Ok(image.clone()),
                LoadStatus::Failed(reason) => {
                    return Err(LoadError::Decode {
                        id: state.src_label(),
                        reason: reason.clone(),
                    })
                }
                LoadStatus::Pending => {}
            }

            match deadline {
                Some(deadline) => {
                    if self.0.settled.wait_until(&mut state, deadline).timed_out()
                        && matches!(state.status, LoadStatus::Pending)
                    {
                        return Err(LoadError::Timeout {
                            id: state.src_label(),
                            timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
                        });
                    }
                }
                None => self.0.settled.wait(&mut state),
            }
        }
    }
}

impl fmt::Debug for ImageElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock();
        f.debug_struct("ImageElement")
            .field("id", &self.0.id)
            .field("src", &state.src)
            .field("data_src", &state.data_src)
            .field("complete", &!matches!(state.status, LoadStatus::Pending))
            .finish()
    }
}

impl PartialEq for ImageElement {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Document node
#[derive(Debug, Clone)]
pub enum Node {
    Image(ImageElement),
    Element { tag: String, children: Vec<Node> },
    Text(String),
}

impl Node {
    pub fn element(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Element {
            tag: tag.into(),
            children,
        }
    }

    /// The node itself if it is an image, otherwise every image beneath it
    pub fn images(&self) -> Vec<ImageElement> {
        let mut found = Vec::new();
        self.collect_images(&mut found);
        found
    }

    fn collect_images(&self, found: &mut Vec<ImageElement>) {
        match self {
            Node::Image(image) => found.push(image.clone()),
            Node::Element { children, .. } => {
                for child in children {
                    child.collect_images(found);
                }
            }
            Node::Text(_) => {}
        }
    }
}

/// Visibility change reported for an observed element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntersectionEntry {
    pub element_id: u64,
    pub is_intersecting: bool,
}

impl IntersectionEntry {
    pub fn visible(element: &ImageElement) -> Self {
        Self {
            element_id: element.id(),
            is_intersecting: true,
        }
    }

    pub fn hidden(element: &ImageElement) -> Self {
        Self {
            element_id: element.id(),
            is_intersecting: false,
        }
    }
}

/// `<link rel="preload" as="image">` hint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadHint {
    pub rel: &'static str,
    pub as_: &'static str,
    pub href: ResourceId,
}

impl PreloadHint {
    pub fn image(href: ResourceId) -> Self {
        Self {
            rel: "preload",
            as_: "image",
            href,
        }
    }

    /// Markup for the document head
    pub fn to_html(&self) -> String {
        format!(r#"<link rel="{}" as="{}" href="{}">"#, self.rel, self.as_, self.href)
    }
}

/// A document: body tree plus head preload hints
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub body: Vec<Node>,
    pub head: Vec<PreloadHint>,
}

impl Page {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            head: Vec::new(),
        }
    }

    /// Every image in document order
    pub fn images(&self) -> Vec<ImageElement> {
        self.body.iter().flat_map(Node::images).collect()
    }

    /// Images carrying a deferred `data-src`
    pub fn lazy_images(&self) -> Vec<ImageElement> {
        self.images()
            .into_iter()
            .filter(|image| image.data_src().is_some())
            .collect()
    }

    /// Append `node` to the body and return it as the inserted-node record
    pub fn append(&mut self, node: Node) -> Node {
        self.body.push(node.clone());
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_nested_image_collection() {
        let a = ImageElement::new("a.jpg");
        let b = ImageElement::new("b.png");
        let tree = Node::element(
            "section",
            vec![
                Node::Text("hello".into()),
                Node::element("div", vec![Node::Image(a.clone())]),
                Node::Image(b.clone()),
            ],
        );
        assert_eq!(tree.images(), vec![a, b]);
    }

    #[test]
    fn test_decode_waits_for_load() {
        let element = ImageElement::new("slow.jpg");
        let loader = element.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            loader.finish_loading(RawImage::solid(3, 3, [1, 2, 3, 255]));
        });

        let image = element.decode(Some(Duration::from_secs(5))).unwrap();
        assert_eq!((image.width, image.height), (3, 3));
        handle.join().unwrap();
    }

    #[test]
    fn test_decode_times_out() {
        let element = ImageElement::new("never.jpg");
        let err = element.decode(Some(Duration::from_millis(10))).unwrap_err();
        assert!(matches!(err, LoadError::Timeout { timeout_ms: 10, .. }));
    }

    #[test]
    fn test_decode_reports_failure() {
        let element = ImageElement::new("broken.jpg");
        element.fail_loading("404");
        assert!(element.is_complete());
        assert!(matches!(element.decode(None), Err(LoadError::Decode { .. })));
    }

    #[test]
    fn test_lazy_element_shape() {
        let element = ImageElement::lazy("later.jpg");
        assert!(element.src().is_none());
        assert!(element.has_class("lazy"));
        element.remove_class("lazy");
        assert!(!element.has_class("lazy"));

        let page = Page::new(vec![
            Node::Image(element.clone()),
            Node::Image(ImageElement::new("x.png")),
        ]);
        assert_eq!(page.lazy_images(), vec![element]);
        assert_eq!(page.images().len(), 2);
    }

    #[test]
    fn test_preload_hint_markup() {
        let hint = PreloadHint::image(ResourceId::new("https://h/a.webp"));
        assert_eq!(hint.to_html(), r#"<link rel="preload" as="image" href="https://h/a.webp">"#);
    }
}
