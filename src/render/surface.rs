//! Drawable surfaces and the containers that host them.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    foundation::core::PixelSize,
    render::backend::{BackendKind, CompositorBackend, create_backend},
};

static NEXT_SURFACE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// A pixel target that can hand out one rendering context per request.
#[derive(Clone, Debug)]
pub struct Surface {
    id: SurfaceId,
    size: PixelSize,
    context: Option<BackendKind>,
}

impl Surface {
    pub fn new(size: PixelSize, backend: BackendKind) -> Self {
        Self {
            id: SurfaceId(NEXT_SURFACE_ID.fetch_add(1, Ordering::Relaxed)),
            size,
            context: Some(backend),
        }
    }

    /// A surface on which context acquisition always fails.
    pub fn without_context(size: PixelSize) -> Self {
        Self {
            context: None,
            ..Self::new(size, BackendKind::Cpu)
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn size(&self) -> PixelSize {
        self.size
    }

    pub fn set_size(&mut self, size: PixelSize) {
        self.size = size;
    }

    pub fn backend(&self) -> Option<BackendKind> {
        self.context
    }

    /// A fresh context sized to the surface, or `None` when the surface has no usable one.
    pub fn acquire_context(&self) -> Option<Box<dyn CompositorBackend>> {
        let kind = self.context?;
        match create_backend(kind, self.size) {
            Ok(backend) => Some(backend),
            Err(err) => {
                tracing::warn!(surface = self.id.0, ?kind, error = %err, "rendering context unavailable");
                None
            }
        }
    }
}

/// Shared handle to an element that owns child surfaces.
#[derive(Clone, Debug, Default)]
pub struct Container {
    children: Rc<RefCell<Vec<Surface>>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, surface: Surface) {
        self.children.borrow_mut().push(surface);
    }

    /// Detach the child with `id`. Returns `false` if it was not attached.
    pub fn remove(&self, id: SurfaceId) -> bool {
        let mut children = self.children.borrow_mut();
        let before = children.len();
        children.retain(|s| s.id != id);
        children.len() != before
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.children.borrow().iter().any(|s| s.id == id)
    }

    pub fn children(&self) -> Vec<SurfaceId> {
        self.children.borrow().iter().map(|s| s.id).collect()
    }
}

/// Where a player draws: an existing surface, or a container that gets a new one.
#[derive(Clone, Debug)]
pub enum SurfaceHost {
    Surface(Surface),
    Container(Container),
}

impl From<Surface> for SurfaceHost {
    fn from(s: Surface) -> Self {
        SurfaceHost::Surface(s)
    }
}

impl From<Container> for SurfaceHost {
    fn from(c: Container) -> Self {
        SurfaceHost::Container(c)
    }
}
