#![warn(clippy::all)]
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![doc = include_str!("../README.md")]

pub mod element;
pub mod errors;
pub mod geometry;
pub mod options;
pub mod report;
pub mod truss;

pub use element::{Element, LocalStiffness};
pub use errors::{ElementError, TrussError, ValidationError};
pub use geometry::{displacement, force, point, Displacement, Force, Line, Point};
pub use options::{SolverOptions, Tolerance};
pub use report::{render_truss_info, TrussReport};
pub use truss::{Connection, Node, Restraint, TrussSystem, DOFS_PER_NODE};
