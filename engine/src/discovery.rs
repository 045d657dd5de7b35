//! Locating the LMS API object.
//!
//! A SCO runs inside a browsing context that may be nested in frames or opened
//! from another window. The LMS publishes its API object somewhere up that
//! chain. Discovery checks the current context, climbs the parent chain, and
//! then repeats the climb from the opener. Each climb is capped at
//! [`MAX_DISCOVERY_HOPS`] so a cyclic or pathological context graph cannot
//! stall the SCO.

use crate::{host::HostRef, ScormVersion};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Upper bound on parent hops per climb.
pub const MAX_DISCOVERY_HOPS: usize = 500;

/// A browsing context that may hold an API object.
pub trait Window: Clone {
    fn parent(&self) -> Option<Self>;
    fn opener(&self) -> Option<Self>;
    /// Identity check; a top-level context is its own parent in browsers.
    fn same_as(&self, other: &Self) -> bool;
    /// The API object published under `name`, if any.
    fn api(&self, name: &str) -> Option<HostRef>;
}

/// Outcome of a discovery walk.
#[derive(Clone)]
pub enum Discovery {
    Found {
        api: HostRef,
        hops: usize,
        via_opener: bool,
    },
    NotFound,
    /// A climb hit the hop limit without finding the API.
    BoundExceeded,
}

impl Discovery {
    pub fn is_found(&self) -> bool {
        matches!(self, Discovery::Found { .. })
    }

    pub fn into_api(self) -> Option<HostRef> {
        match self {
            Discovery::Found { api, .. } => Some(api),
            _ => None,
        }
    }
}

impl fmt::Debug for Discovery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discovery::Found {
                hops, via_opener, ..
            } => f
                .debug_struct("Found")
                .field("hops", hops)
                .field("via_opener", via_opener)
                .finish_non_exhaustive(),
            Discovery::NotFound => f.write_str("NotFound"),
            Discovery::BoundExceeded => f.write_str("BoundExceeded"),
        }
    }
}

enum Climb {
    Found(HostRef, usize),
    Exhausted,
    Exceeded,
}

fn climb<W: Window>(start: W, name: &str) -> Climb {
    let mut current = start;
    let mut hops = 0;
    loop {
        if let Some(api) = current.api(name) {
            return Climb::Found(api, hops);
        }
        let Some(parent) = current.parent() else {
            return Climb::Exhausted;
        };
        if parent.same_as(&current) {
            return Climb::Exhausted;
        }
        hops += 1;
        if hops > MAX_DISCOVERY_HOPS {
            return Climb::Exceeded;
        }
        current = parent;
    }
}

/// Find the API object named `name`, starting from `window`.
pub fn locate_api<W: Window>(window: &W, name: &str) -> Discovery {
    let mut exceeded = false;

    match climb(window.clone(), name) {
        Climb::Found(api, hops) => {
            return Discovery::Found {
                api,
                hops,
                via_opener: false,
            }
        }
        Climb::Exceeded => exceeded = true,
        Climb::Exhausted => {}
    }

    if let Some(opener) = window.opener() {
        match climb(opener, name) {
            Climb::Found(api, hops) => {
                return Discovery::Found {
                    api,
                    hops,
                    via_opener: true,
                }
            }
            Climb::Exceeded => exceeded = true,
            Climb::Exhausted => {}
        }
    }

    if exceeded {
        tracing::warn!(name, limit = MAX_DISCOVERY_HOPS, "API discovery hop limit exceeded");
        Discovery::BoundExceeded
    } else {
        Discovery::NotFound
    }
}

/// Strategy the engine uses to find its host at initialize time.
pub trait ApiLocator {
    fn locate(&self, version: ScormVersion) -> Discovery;
}

/// Discovery through a [`Window`] graph.
#[derive(Debug, Clone)]
pub struct WindowLocator<W: Window> {
    window: W,
}

impl<W: Window> WindowLocator<W> {
    pub fn new(window: W) -> Self {
        Self { window }
    }
}

impl<W: Window> ApiLocator for WindowLocator<W> {
    fn locate(&self, version: ScormVersion) -> Discovery {
        locate_api(&self.window, version.api_name())
    }
}

/// A host handed to the engine directly, e.g. by an embedding shell.
#[derive(Clone)]
pub struct DirectHost(pub HostRef);

impl ApiLocator for DirectHost {
    fn locate(&self, _version: ScormVersion) -> Discovery {
        Discovery::Found {
            api: self.0.clone(),
            hops: 0,
            via_opener: false,
        }
    }
}

/// No LMS at all; the engine always runs from its cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standalone;

impl ApiLocator for Standalone {
    fn locate(&self, _version: ScormVersion) -> Discovery {
        Discovery::NotFound
    }
}

pub type FrameId = usize;

#[derive(Default)]
struct FrameNode {
    parent: Option<FrameId>,
    opener: Option<FrameId>,
    apis: HashMap<String, HostRef>,
}

/// An arena of browsing contexts for hosting SCOs outside a browser.
#[derive(Default)]
pub struct FrameTree {
    frames: Vec<FrameNode>,
}

impl FrameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level context.
    pub fn add_top(&mut self) -> FrameId {
        self.frames.push(FrameNode::default());
        self.frames.len() - 1
    }

    /// Add a child frame of `parent`.
    pub fn add_child(&mut self, parent: FrameId) -> FrameId {
        self.frames.push(FrameNode {
            parent: Some(parent),
            ..FrameNode::default()
        });
        self.frames.len() - 1
    }

    /// Add a top-level context opened by `opener`.
    pub fn add_popup(&mut self, opener: FrameId) -> FrameId {
        self.frames.push(FrameNode {
            opener: Some(opener),
            ..FrameNode::default()
        });
        self.frames.len() - 1
    }

    /// Publish an API object on a context under its version's global name.
    pub fn install(&mut self, frame: FrameId, version: ScormVersion, api: HostRef) {
        if let Some(node) = self.frames.get_mut(frame) {
            node.apis.insert(version.api_name().to_string(), api);
        }
    }

    /// Re-point a context's parent, allowing arbitrary (even cyclic) graphs.
    pub fn set_parent(&mut self, frame: FrameId, parent: Option<FrameId>) {
        if let Some(node) = self.frames.get_mut(frame) {
            node.parent = parent;
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Freeze the tree and return a handle to one of its contexts.
    pub fn frame(self: &Rc<Self>, id: FrameId) -> Frame {
        Frame {
            tree: Rc::clone(self),
            id,
        }
    }
}

/// Handle to a context in a [`FrameTree`].
#[derive(Clone)]
pub struct Frame {
    tree: Rc<FrameTree>,
    id: FrameId,
}

impl Frame {
    pub fn id(&self) -> FrameId {
        self.id
    }

    fn node(&self) -> Option<&FrameNode> {
        self.tree.frames.get(self.id)
    }

    fn sibling(&self, id: FrameId) -> Frame {
        Frame {
            tree: Rc::clone(&self.tree),
            id,
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame").field("id", &self.id).finish()
    }
}

impl Window for Frame {
    fn parent(&self) -> Option<Self> {
        self.node()?.parent.map(|id| self.sibling(id))
    }

    fn opener(&self) -> Option<Self> {
        self.node()?.opener.map(|id| self.sibling(id))
    }

    fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.tree, &other.tree) && self.id == other.id
    }

    fn api(&self, name: &str) -> Option<HostRef> {
        self.node()?.apis.get(name).cloned()
    }
}
