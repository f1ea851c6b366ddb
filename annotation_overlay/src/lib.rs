//! Screen-space annotation markers for a rendered mesh.
//!
//! Each frame, every attached anchor is projected into the viewport, tested
//! for occlusion against the mesh with a pick ray, and its marker surface is
//! repositioned and faded directly from the scene graph's pre-draw hook. The
//! [`controller::OverlayController`] owns marker lifecycles; the remaining
//! modules are the pieces it wires together.

pub mod anchor;
pub mod annotation;
pub mod camera;
pub mod config;
pub mod controller;
pub mod error;
pub mod frame_sync;
pub mod geometry;
pub mod mesh_provider;
pub mod occlusion;
pub mod projector;
pub mod scene;
pub mod surface;
pub mod texture;

pub use anchor::{Anchor, SharedAnchor};
pub use annotation::{AnnotationCard, AnnotationEvents};
pub use camera::Camera;
pub use config::OverlayConfig;
pub use controller::{MarkerHandle, MarkerState, OverlayController, marker_name};
pub use error::{OverlayError, Result};
pub use frame_sync::{FrameSynchronizer, MarkerFrame};
pub use geometry::{MeshDescription, Ray, Sprite, TriangleMesh};
pub use mesh_provider::{MeshProvider, MeshSubscription};
pub use occlusion::{OcclusionTester, is_visible};
pub use projector::{Projection, ViewportRect, project};
pub use scene::{FrameContext, FrameStats, Intersection, ObjectId, PreDrawHook, Raycast, SceneGraph, SceneObject};
pub use surface::{DisplaySurface, InlineStyle, StyleProperty};
pub use texture::{CanvasProvider, MarkerTexture, SoftwareCanvas};
