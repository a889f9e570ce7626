//! Sprite rendering over an opaque render target.
//!
//! [`RenderSystem`] runs in the `Draw` phase. Its per-frame cycle maps onto
//! the target's lifecycle:
//!
//! | Hook         | Target calls                                  |
//! |--------------|-----------------------------------------------|
//! | `preupdate`  | `resize` if the [`Viewport`] changed, `bind`  |
//! | `update`     | one `draw_quad` per `Position` + `Sprite`     |
//! | `postupdate` | `resolve` if multisampled, `restore_default`  |
//!
//! GPU resource management lives entirely behind [`RenderTarget`]. This
//! crate ships [`RecordingTarget`], a headless target that records calls.

use std::cell::RefCell;
use std::rc::Rc;

use engine_ecs::{Frame, HookResult, QueryHandle, Signature, System, World};
use engine_math::Vec2;
use tracing::debug;

use crate::components::{Position, Sprite, Viewport};

/// A filled rectangle in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub center: Vec2,
    pub size: Vec2,
    pub color: [f32; 4],
}

/// A surface that can be bound as the current draw target.
pub trait RenderTarget {
    /// Backend error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Make this the current draw target.
    fn bind(&mut self) -> Result<(), Self::Error>;

    /// Make the default surface the current draw target again.
    fn restore_default(&mut self) -> Result<(), Self::Error>;

    /// Reallocate storage for a new size.
    fn resize(&mut self, width: u32, height: u32) -> Result<(), Self::Error>;

    /// Resolve multisampled storage into a sampleable image.
    fn resolve(&mut self) -> Result<(), Self::Error>;

    /// Draw one quad into the bound target.
    fn draw_quad(&mut self, quad: Quad) -> Result<(), Self::Error>;

    /// Returns `true` if [`RenderTarget::resolve`] must run after drawing.
    fn is_multisampled(&self) -> bool {
        false
    }
}

/// Errors raised by [`RecordingTarget`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("render target is not bound")]
    NotBound,

    #[error("invalid render target size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// A call recorded by [`RecordingTarget`].
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Bind,
    RestoreDefault,
    Resize { width: u32, height: u32 },
    Resolve,
    Quad(Quad),
}

#[derive(Debug, Default)]
struct Recording {
    commands: Vec<DrawCommand>,
    bound: bool,
    width: u32,
    height: u32,
}

/// A headless [`RenderTarget`] that records every call.
///
/// Clones share the same recording, so a test can keep one clone and hand
/// the other to a [`RenderSystem`].
#[derive(Debug, Clone, Default)]
pub struct RecordingTarget {
    inner: Rc<RefCell<Recording>>,
    samples: u32,
    last_frame_only: bool,
}

impl RecordingTarget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `samples` samples per pixel. More than one makes the target
    /// multisampled.
    #[must_use]
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    /// Forget earlier calls on every `bind`, keeping only the latest frame.
    #[must_use]
    pub fn retain_last_frame(mut self) -> Self {
        self.last_frame_only = true;
        self
    }

    /// Every call recorded so far.
    #[must_use]
    pub fn commands(&self) -> Vec<DrawCommand> {
        self.inner.borrow().commands.clone()
    }

    /// Drop the recorded calls.
    pub fn clear(&self) {
        self.inner.borrow_mut().commands.clear();
    }

    /// Returns `true` while bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.borrow().bound
    }

    /// The current size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        let inner = self.inner.borrow();
        (inner.width, inner.height)
    }
}

impl RenderTarget for RecordingTarget {
    type Error = RenderError;

    fn bind(&mut self) -> Result<(), RenderError> {
        let mut inner = self.inner.borrow_mut();
        if self.last_frame_only {
            inner.commands.clear();
        }
        inner.bound = true;
        inner.commands.push(DrawCommand::Bind);
        Ok(())
    }

    fn restore_default(&mut self) -> Result<(), RenderError> {
        let mut inner = self.inner.borrow_mut();
        inner.bound = false;
        inner.commands.push(DrawCommand::RestoreDefault);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize { width, height });
        }
        let mut inner = self.inner.borrow_mut();
        inner.width = width;
        inner.height = height;
        inner.commands.push(DrawCommand::Resize { width, height });
        Ok(())
    }

    fn resolve(&mut self) -> Result<(), RenderError> {
        self.inner.borrow_mut().commands.push(DrawCommand::Resolve);
        Ok(())
    }

    fn draw_quad(&mut self, quad: Quad) -> Result<(), RenderError> {
        let mut inner = self.inner.borrow_mut();
        if !inner.bound {
            return Err(RenderError::NotBound);
        }
        inner.commands.push(DrawCommand::Quad(quad));
        Ok(())
    }

    fn is_multisampled(&self) -> bool {
        self.samples > 1
    }
}

/// Draws every entity with a [`Position`] and a [`Sprite`].
pub struct RenderSystem<T> {
    target: T,
    sprites: Option<QueryHandle>,
    viewports: Option<QueryHandle>,
    size: Option<(u32, u32)>,
}

impl<T: RenderTarget> RenderSystem<T> {
    /// Default priority in the `Draw` phase.
    pub const PRIORITY: f64 = 0.0;

    #[must_use]
    pub fn new(target: T) -> Self {
        Self {
            target,
            sprites: None,
            viewports: None,
            size: None,
        }
    }

    /// The render target.
    #[must_use]
    pub fn target(&self) -> &T {
        &self.target
    }
}

impl<T: RenderTarget> System for RenderSystem<T> {
    fn name(&self) -> &str {
        "render"
    }

    fn initialize(&mut self, world: &mut World) -> HookResult {
        self.sprites = Some(world.query(Signature::new().with::<Position>().with::<Sprite>())?);
        self.viewports = Some(world.query(Signature::new().with::<Viewport>())?);
        Ok(())
    }

    fn queries(&self) -> Vec<QueryHandle> {
        self.sprites.into_iter().chain(self.viewports).collect()
    }

    fn preupdate(&mut self, frame: &mut Frame<'_>) -> HookResult {
        if let Some(viewports) = self.viewports
            && let Some(&entity) = frame.entities(viewports)?.first()
        {
            let viewport = *frame.world.get_component::<Viewport>(entity)?;
            let size = (viewport.width, viewport.height);
            if self.size != Some(size) {
                self.target.resize(size.0, size.1)?;
                self.size = Some(size);
                debug!(width = size.0, height = size.1, "render target resized");
            }
        }
        self.target.bind()?;
        Ok(())
    }

    fn update(&mut self, frame: &mut Frame<'_>) -> HookResult {
        let Some(sprites) = self.sprites else {
            return Ok(());
        };
        for &entity in frame.entities(sprites)?.iter() {
            let position = frame.world.get_component::<Position>(entity)?;
            let sprite = frame.world.get_component::<Sprite>(entity)?;
            self.target.draw_quad(Quad {
                center: position.0,
                size: sprite.size,
                color: sprite.color,
            })?;
        }
        Ok(())
    }

    fn postupdate(&mut self, _frame: &mut Frame<'_>) -> HookResult {
        if self.target.is_multisampled() {
            self.target.resolve()?;
        }
        self.target.restore_default()?;
        Ok(())
    }
}
