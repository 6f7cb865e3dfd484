//! Configuration parser for handheld-input: device tables, the virtual gamepad layout and the
//! closed enumerations of the abstract controller model.

pub mod cfg;
pub mod codes;
pub mod controller;
