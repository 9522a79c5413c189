pub mod field;
pub mod group;
pub mod light;
pub mod sensor;

pub use field::Field;
pub use group::{Group, GroupAction};
pub use light::{DerivedColor, Light};
pub use sensor::{RotaryState, Sensor};
