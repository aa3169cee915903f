//! Approximates a raster image with an ordered list of translucent geometric
//! primitives, streaming SVG snapshots while a hill-climbing search improves it.

pub mod analysis;
pub mod composition;
pub mod controller;
pub mod engine;
pub mod error;
pub mod fitness;
pub mod geom;
pub mod mutation_config;
pub mod primitive;
pub mod protocol;
pub mod raster;
pub mod render;
pub mod session;
pub mod settings;
pub mod svg;

pub use composition::Composition;
pub use controller::{EngineEvent, Painter, RunController, RunHandle, RunReport, Snapshot};
pub use engine::{Engine, RunState, StepOutcome};
pub use error::EngineError;
pub use fitness::{ErrorScore, MetricsSnapshot};
pub use primitive::{Primitive, Shape, ShapeKind};
pub use protocol::{ProtocolError, StartRun, WireMessage};
pub use raster::RasterBuffer;
pub use session::Session;
pub use settings::{PainterSettings, SettingsError};
