pub mod boundary;
pub mod config;
pub mod congregation;
pub mod declutter;
pub mod enclosure;
pub mod error;
pub mod extent;
pub mod fit;
pub mod geometry;
pub mod locate;
pub mod proj;
pub mod raster;
pub mod spatial;
pub mod style;
pub mod tile_grid;
pub mod view;
pub mod wkt;

pub use boundary::{WHOLE_WORLD_WKT, merge_boundaries, merge_boundary_wkts};
pub use config::MapConfig;
pub use congregation::{Boundary, Congregation, Region, Territory};
pub use declutter::scale_factor;
pub use enclosure::{Candidate, EnclosureIndex, Enclosing, Roles, resolve_enclosing};
pub use error::GeometryError;
pub use extent::Extent;
pub use fit::{FitMode, FitOptions, MapKind, Padding, fit_extent, fit_with_fallback};
pub use geometry::{Geometry, union};
pub use raster::{MapRaster, RasterRegistry, RasterSource};
pub use spatial::SpatialGrid;
pub use style::StyleRegistry;
pub use view::{View, ViewConstraints, ViewState, ViewTransition};
pub use wkt::{parse_wkt, read_geometries, read_geometry, to_wkt};
