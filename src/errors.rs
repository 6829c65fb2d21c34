//! Error types produced while building or solving a truss system.

use thiserror::Error;

/// Error returned when input to a [`TrussSystem`](crate::TrussSystem) is malformed.
///
/// Validation runs before any state is touched, so a call that returns one of these
/// leaves the system exactly as it was.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Fewer than two nodes were supplied.
    #[error("at least 2 nodes are required (received {count})")]
    TooFewNodes {
        /// Number of nodes supplied.
        count: usize,
    },
    /// A node row does not hold exactly an x and a y coordinate.
    #[error("node {node} must contain only x and y coordinates (received {components} values)")]
    NodeDimension {
        /// Position of the node in the node list.
        node: usize,
        /// Number of components found on the row.
        components: usize,
    },
    /// A node coordinate is infinite or not a number.
    #[error("node {node} has non-finite coordinates ({x}, {y})")]
    NonFiniteCoordinate {
        /// Position of the node in the node list.
        node: usize,
        /// Rejected x coordinate.
        x: f64,
        /// Rejected y coordinate.
        y: f64,
    },
    /// A connectivity row is not `[node_i, node_j, young_modulus, area]`.
    #[error(
        "connectivity entry {element} must contain [node_i, node_j, young_modulus, area] \
         (received {fields} values)"
    )]
    ConnectivityArity {
        /// Position of the entry in the connectivity table.
        element: usize,
        /// Number of fields found on the row.
        fields: usize,
    },
    /// A node reference is negative or not a whole number.
    #[error("connectivity entry {element} contains malformed node index {value}")]
    MalformedNodeIndex {
        /// Position of the entry in the connectivity table.
        element: usize,
        /// Rejected raw value.
        value: f64,
    },
    /// A connectivity entry references a node that does not exist.
    #[error(
        "connectivity entry {element} contains invalid node index {index}; \
         valid indices are 0..{node_count}"
    )]
    InvalidNodeIndex {
        /// Position of the entry in the connectivity table.
        element: usize,
        /// Rejected node index.
        index: usize,
        /// Number of nodes in the system.
        node_count: usize,
    },
    /// Young's modulus is zero, negative, infinite or not a number.
    #[error(
        "young's modulus for element {element} must be positive and finite \
         (received {young_modulus})"
    )]
    NonPositiveYoungModulus {
        /// Position of the entry in the connectivity table.
        element: usize,
        /// Rejected modulus in pascals.
        young_modulus: f64,
    },
    /// Cross-sectional area is zero, negative, infinite or not a number.
    #[error(
        "cross-sectional area for element {element} must be positive and finite \
         (received {area})"
    )]
    NonPositiveArea {
        /// Position of the entry in the connectivity table.
        element: usize,
        /// Rejected area in square metres.
        area: f64,
    },
    /// Paired argument lists have different lengths.
    #[error("received {nodes} nodes but {values} values to pair with them")]
    LengthMismatch {
        /// Length of the node list.
        nodes: usize,
        /// Length of the companion list.
        values: usize,
    },
    /// A load component is infinite or not a number.
    #[error("load on node {node} has non-finite components ({x}, {y})")]
    NonFiniteLoad {
        /// Node the load was aimed at.
        node: usize,
        /// Rejected x component in newtons.
        x: f64,
        /// Rejected y component in newtons.
        y: f64,
    },
    /// A constraint direction code is not 0, 1 or 2.
    #[error("direction code {code} is invalid; expected 0 (x), 1 (y) or 2 (both)")]
    InvalidDirectionCode {
        /// Rejected code.
        code: u8,
    },
    /// A node index passed to a mutating call is out of range.
    #[error("node {node} does not exist in this truss ({node_count} nodes)")]
    UnknownNode {
        /// Rejected node index.
        node: usize,
        /// Number of nodes in the system.
        node_count: usize,
    },
    /// A global degree of freedom is out of range.
    #[error("degree of freedom {dof} does not exist in this truss ({dof_count} dofs)")]
    UnknownDof {
        /// Rejected degree of freedom.
        dof: usize,
        /// Number of degrees of freedom in the system.
        dof_count: usize,
    },
}

/// Error returned when a single bar element cannot be built.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum ElementError {
    /// The endpoints coincide or lie at non-finite coordinates, so the bar has no
    /// usable length or orientation.
    #[error("element has degenerate length {length}; endpoints must be distinct finite points")]
    Degenerate {
        /// Computed length in metres.
        length: f64,
    },
    /// Young's modulus is zero, negative or not finite.
    #[error("young's modulus must be positive and finite (received {young_modulus})")]
    NonPositiveYoungModulus {
        /// Rejected modulus in pascals.
        young_modulus: f64,
    },
    /// Cross-sectional area is zero, negative or not finite.
    #[error("area must be positive and finite (received {area})")]
    NonPositiveArea {
        /// Rejected area in square metres.
        area: f64,
    },
    /// `E·A/L` overflows, so the stiffness matrix would hold non-finite entries.
    #[error("axial stiffness {axial_stiffness} is not finite")]
    NonFiniteStiffness {
        /// Computed `E·A/L` in newtons per metre.
        axial_stiffness: f64,
    },
}

/// Error returned by [`TrussSystem`](crate::TrussSystem) construction and analysis.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TrussError {
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A connectivity entry produced an element that cannot be built.
    #[error("element {element} is invalid: {source}")]
    DegenerateElement {
        /// Position of the entry in the connectivity table.
        element: usize,
        /// Reason the element was rejected.
        #[source]
        source: ElementError,
    },
    /// The assembled global stiffness matrix is not symmetric.
    #[error(
        "global stiffness matrix is not symmetric: K[{row}, {col}] = {upper} but \
         K[{col}, {row}] = {lower}"
    )]
    InvariantViolation {
        /// Row of the first mismatching entry.
        row: usize,
        /// Column of the first mismatching entry.
        col: usize,
        /// Value at `(row, col)`.
        upper: f64,
        /// Value at `(col, row)`.
        lower: f64,
    },
    /// The constrained system cannot be solved.
    #[error("stiffness matrix is singular; the structure is under-constrained, check supports and connectivity")]
    SingularSystem,
    /// The computed displacements do not reproduce the applied forces.
    #[error("solution failed verification: residual {residual:e} exceeds tolerance {tolerance:e}")]
    SolutionVerification {
        /// Infinity norm of `K·u − F`.
        residual: f64,
        /// Tolerance the residual was checked against.
        tolerance: f64,
    },
}
