pub mod bbox;
pub mod interpolate;
pub mod models;
pub mod normalize;
pub mod projection;

pub use bbox::{BoundingBox, BoundingBoxControl, BoundingBoxError};
pub use interpolate::{interpolate_flight, interpolation_fraction, lerp, FlightPose};
pub use models::{Credentials, Flight, SnapshotPair, TokenStatus};
pub use normalize::{filter_in_bounds, normalize, normalize_value, StatesResponse};
pub use projection::{project, ScreenPoint};
