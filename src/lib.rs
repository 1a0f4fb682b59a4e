pub mod error;
pub mod stroke;
pub mod ribbon;
pub mod bundle;
pub mod obj_writer;

// Publishing
pub mod asset_store;
pub mod texture;
pub mod world;
pub mod session;
pub mod job;

pub mod cli;

pub use bundle::{build_export_bundle, ExportBundle, MaterialGroup};
pub use error::ExportError;
pub use obj_writer::{serialize, ObjDocument, ObjOptions};
pub use ribbon::{build_ribbon, triangulate, GeometryMode, RibbonMesh};
pub use stroke::{Stroke, StrokeColor, UvMode};
