//! Truss system: input validation, global assembly, boundary conditions and the solve.

use std::ops::RangeInclusive;

use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector};
use petgraph::algo::connected_components;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::element::Element;
use crate::errors::{TrussError, ValidationError};
use crate::geometry::{Displacement, Force, Point};
use crate::options::{SolverOptions, Tolerance};

/// Degrees of freedom carried by every node.
pub const DOFS_PER_NODE: usize = 2;

/// Node of the truss together with its solved displacement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    /// Position of the node in metres.
    pub coordinate: Point,
    /// Displacement recorded by the last solve, zero before that.
    pub displacement: Displacement,
}

impl Node {
    /// Create an undisplaced node at `coordinate`.
    #[must_use]
    pub fn new(coordinate: Point) -> Self {
        Self {
            coordinate,
            displacement: Displacement::default(),
        }
    }
}

/// Entry of the connectivity table: one bar between two nodes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Index of the start node.
    pub node_i: usize,
    /// Index of the end node.
    pub node_j: usize,
    /// Young's modulus in pascals.
    pub young_modulus: f64,
    /// Cross-sectional area in square metres.
    pub area: f64,
}

impl Connection {
    /// Create a connectivity entry.
    #[must_use]
    pub const fn new(node_i: usize, node_j: usize, young_modulus: f64, area: f64) -> Self {
        Self {
            node_i,
            node_j,
            young_modulus,
            area,
        }
    }

    /// Global degrees of freedom touched by this entry, start node first.
    ///
    /// Only called on entries whose indices were checked against the node count.
    pub(crate) fn dofs(&self) -> [usize; 4] {
        let start = DOFS_PER_NODE * self.node_i;
        let end = DOFS_PER_NODE * self.node_j;
        [start, start + 1, end, end + 1]
    }

    /// Check indices against `node_count` and require positive, finite material
    /// properties.
    fn validate(&self, element: usize, node_count: usize) -> Result<(), ValidationError> {
        for index in [self.node_i, self.node_j] {
            if index >= node_count {
                return Err(ValidationError::InvalidNodeIndex {
                    element,
                    index,
                    node_count,
                });
            }
        }
        if !self.young_modulus.is_finite() || self.young_modulus <= 0.0 {
            return Err(ValidationError::NonPositiveYoungModulus {
                element,
                young_modulus: self.young_modulus,
            });
        }
        if !self.area.is_finite() || self.area <= 0.0 {
            return Err(ValidationError::NonPositiveArea {
                element,
                area: self.area,
            });
        }
        Ok(())
    }
}

impl From<(usize, usize, f64, f64)> for Connection {
    fn from((node_i, node_j, young_modulus, area): (usize, usize, f64, f64)) -> Self {
        Self::new(node_i, node_j, young_modulus, area)
    }
}

/// Direction restrained at a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Restraint {
    /// Horizontal translation fixed (code 0).
    X,
    /// Vertical translation fixed (code 1).
    Y,
    /// Both translations fixed (code 2).
    Both,
}

impl Restraint {
    /// Global degrees of freedom this restraint fixes at `node`.
    ///
    /// `node` must already be known to the truss.
    pub(crate) fn dofs(self, node: usize) -> RangeInclusive<usize> {
        let base = DOFS_PER_NODE * node;
        match self {
            Self::X => base..=base,
            Self::Y => base + 1..=base + 1,
            Self::Both => base..=base + 1,
        }
    }
}

impl TryFrom<u8> for Restraint {
    type Error = ValidationError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::X),
            1 => Ok(Self::Y),
            2 => Ok(Self::Both),
            code => Err(ValidationError::InvalidDirectionCode { code }),
        }
    }
}

/// Planar pin-jointed truss analysed with the direct stiffness method.
///
/// Degrees of freedom are ordered `[x0, y0, x1, y1, …]`. Construction validates the
/// input and assembles the global stiffness matrix; constraints and loads are then
/// applied in any order before calling [`TrussSystem::solve`].
///
/// # Examples
/// ```
/// use truss2d::{force, point, Connection, TrussSystem};
///
/// let mut truss = TrussSystem::new(
///     vec![point(0.0, 0.0), point(1.0, 0.0)],
///     vec![Connection::new(0, 1, 200.0e9, 0.01)],
/// )?;
/// truss.constrain(&[0, 1], &[2, 1])?;
/// truss.apply_load(&[1], &[force(1_000.0, 0.0)])?;
/// truss.solve()?;
///
/// let tip = truss.node(1).expect("node exists").displacement;
/// assert!((tip.x - 5.0e-7).abs() < 1.0e-15);
/// # Ok::<(), truss2d::TrussError>(())
/// ```
#[derive(Clone, Debug)]
pub struct TrussSystem {
    /// Nodes as graph vertices and connectivity entries as edges, both in input order.
    graph: Graph<Node, Connection>,
    /// Elements derived during the last assembly, one per connectivity entry.
    elements: Vec<Element>,
    /// Global stiffness matrix, modified in place by constraints.
    stiffness: DMatrix<f64>,
    /// Global force vector.
    force: DVector<f64>,
    /// Global displacement vector, zero until solved.
    displacement: DVector<f64>,
    /// Flag for every degree of freedom eliminated by a constraint.
    constrained: Vec<bool>,
    /// Indicates whether the displacement results are current.
    solved: bool,
    /// Tolerances for the symmetry, pivot and residual checks.
    options: SolverOptions,
}

impl TrussSystem {
    /// Build and assemble a truss with default [`SolverOptions`].
    ///
    /// # Errors
    ///
    /// Returns [`TrussError::Validation`] for malformed input, including non-finite
    /// coordinates or material properties, [`TrussError::DegenerateElement`] when an
    /// entry joins coincident points or its `E·A/L` overflows, and
    /// [`TrussError::InvariantViolation`] when the assembled matrix is not symmetric.
    pub fn new(nodes: Vec<Point>, connectivity: Vec<Connection>) -> Result<Self, TrussError> {
        Self::with_options(nodes, connectivity, SolverOptions::default())
    }

    /// Build and assemble a truss with explicit options.
    ///
    /// # Errors
    ///
    /// See [`TrussSystem::new`].
    pub fn with_options(
        nodes: Vec<Point>,
        connectivity: Vec<Connection>,
        options: SolverOptions,
    ) -> Result<Self, TrussError> {
        if nodes.len() < 2 {
            return Err(ValidationError::TooFewNodes { count: nodes.len() }.into());
        }
        for (node, coordinate) in nodes.iter().enumerate() {
            if !coordinate.x.is_finite() || !coordinate.y.is_finite() {
                return Err(ValidationError::NonFiniteCoordinate {
                    node,
                    x: coordinate.x,
                    y: coordinate.y,
                }
                .into());
            }
        }
        for (element, connection) in connectivity.iter().enumerate() {
            connection.validate(element, nodes.len())?;
        }

        let mut graph = Graph::with_capacity(nodes.len(), connectivity.len());
        for coordinate in nodes {
            graph.add_node(Node::new(coordinate));
        }
        for connection in connectivity {
            graph.add_edge(
                NodeIndex::new(connection.node_i),
                NodeIndex::new(connection.node_j),
                connection,
            );
        }

        let dof = graph.node_count() * DOFS_PER_NODE;
        let mut system = Self {
            graph,
            elements: Vec::new(),
            stiffness: DMatrix::zeros(dof, dof),
            force: DVector::zeros(dof),
            displacement: DVector::zeros(dof),
            constrained: vec![false; dof],
            solved: false,
            options,
        };
        system.assemble_global_stiffness()?;
        Ok(system)
    }

    /// Build a truss from untyped rows.
    ///
    /// Node rows must be `[x, y]` and connectivity rows
    /// `[node_i, node_j, young_modulus, area]`, with whole, non-negative node indices.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`TrussSystem::new`], plus shape errors for rows of
    /// the wrong width.
    ///
    /// # Examples
    /// ```
    /// use truss2d::{TrussError, TrussSystem, ValidationError};
    ///
    /// let error = TrussSystem::from_rows(
    ///     &[vec![0.0, 0.0], vec![1.0, 0.0, 0.0]],
    ///     &[vec![0.0, 1.0, 1.0, 1.0]],
    /// )
    /// .expect_err("three dimensional node rejected");
    /// assert_eq!(
    ///     error,
    ///     TrussError::Validation(ValidationError::NodeDimension { node: 1, components: 3 })
    /// );
    /// ```
    pub fn from_rows<N, C>(nodes: &[N], connectivity: &[C]) -> Result<Self, TrussError>
    where
        N: AsRef<[f64]>,
        C: AsRef<[f64]>,
    {
        if nodes.len() < 2 {
            return Err(ValidationError::TooFewNodes { count: nodes.len() }.into());
        }
        let points = nodes
            .iter()
            .enumerate()
            .map(|(node, row)| match *row.as_ref() {
                [x, y] => Ok(Point::new(x, y)),
                ref other => Err(ValidationError::NodeDimension {
                    node,
                    components: other.len(),
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (element, row) in connectivity.iter().enumerate() {
            let fields = row.as_ref().len();
            if fields != 4 {
                return Err(ValidationError::ConnectivityArity { element, fields }.into());
            }
        }
        let connections = connectivity
            .iter()
            .enumerate()
            .map(|(element, row)| -> Result<Connection, ValidationError> {
                let row = row.as_ref();
                Ok(Connection::new(
                    parse_node_index(element, row[0])?,
                    parse_node_index(element, row[1])?,
                    row[2],
                    row[3],
                ))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(points, connections)
    }

    /// Return the number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Return the number of elements.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Return the number of global degrees of freedom.
    #[must_use]
    pub fn dof_count(&self) -> usize {
        self.node_count() * DOFS_PER_NODE
    }

    /// Nodes in input order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.raw_nodes().iter().map(|node| &node.weight)
    }

    /// Retrieve a node by index.
    #[must_use]
    pub fn node(&self, node: usize) -> Option<&Node> {
        self.graph.node_weight(NodeIndex::new(node))
    }

    /// Connectivity table in input order.
    pub fn connectivity(&self) -> impl Iterator<Item = &Connection> {
        self.graph.raw_edges().iter().map(|edge| &edge.weight)
    }

    /// Elements built by the last assembly, in connectivity order.
    #[must_use]
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Global stiffness matrix in its current, possibly constrained, state.
    #[must_use]
    pub fn stiffness_matrix(&self) -> &DMatrix<f64> {
        &self.stiffness
    }

    /// Global force vector.
    ///
    /// Entries of constrained degrees of freedom are always zero; see
    /// [`apply_load`](Self::apply_load).
    #[must_use]
    pub fn force_vector(&self) -> &DVector<f64> {
        &self.force
    }

    /// Global displacement vector, zero until [`TrussSystem::solve`] succeeds.
    #[must_use]
    pub fn displacement_vector(&self) -> &DVector<f64> {
        &self.displacement
    }

    /// Displacement vector reshaped into one entry per node.
    #[must_use]
    pub fn nodal_displacements(&self) -> Vec<Displacement> {
        self.displacement
            .as_slice()
            .chunks_exact(DOFS_PER_NODE)
            .map(|pair| Displacement::new(pair[0], pair[1]))
            .collect()
    }

    /// Return `true` when `dof` has been eliminated by a constraint.
    #[must_use]
    pub fn is_constrained(&self, dof: usize) -> bool {
        self.constrained.get(dof).copied().unwrap_or(false)
    }

    /// Return `true` when the displacement results reflect the current state.
    #[must_use]
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Options in effect for this system.
    #[must_use]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Number of disconnected pieces the structure is made of.
    #[must_use]
    pub fn component_count(&self) -> usize {
        connected_components(&self.graph)
    }

    /// Rebuild the global stiffness matrix from the connectivity table.
    ///
    /// The matrix is recomputed from scratch, so any constraints applied earlier are
    /// discarded and previous results are invalidated. Loads already in the force
    /// vector are kept.
    ///
    /// # Errors
    ///
    /// Returns [`TrussError::DegenerateElement`] when an entry joins coincident points
    /// and [`TrussError::InvariantViolation`] when the result is not symmetric.
    pub fn assemble_global_stiffness(&mut self) -> Result<(), TrussError> {
        let (stiffness, elements) = self.build_stiffness_matrix()?;
        check_symmetry(&stiffness, &self.options.symmetry)?;
        self.invalidate();
        self.stiffness = stiffness;
        self.elements = elements;
        self.constrained.fill(false);
        debug!(
            "assembled {} elements into a {dof}x{dof} stiffness matrix",
            self.elements.len(),
            dof = self.dof_count()
        );
        Ok(())
    }

    /// Fix displacement directions at a set of nodes.
    ///
    /// `codes[k]` applies to `nodes[k]`: 0 fixes x, 1 fixes y and 2 fixes both.
    /// Repeating a node or a direction is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::LengthMismatch`] when the lists differ in length,
    /// [`ValidationError::InvalidDirectionCode`] for codes outside 0..=2 and
    /// [`ValidationError::UnknownNode`] for out-of-range nodes. Nothing is modified
    /// when an error is returned.
    pub fn constrain(&mut self, nodes: &[usize], codes: &[u8]) -> Result<(), ValidationError> {
        if nodes.len() != codes.len() {
            return Err(ValidationError::LengthMismatch {
                nodes: nodes.len(),
                values: codes.len(),
            });
        }
        let restraints = codes
            .iter()
            .map(|&code| Restraint::try_from(code))
            .collect::<Result<Vec<_>, _>>()?;
        for &node in nodes {
            self.check_node(node)?;
        }
        for (&node, restraint) in nodes.iter().zip(restraints) {
            self.restrain(node, restraint);
        }
        Ok(())
    }

    /// Fix displacement directions at a single node.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownNode`] when `node` is out of range.
    pub fn constrain_node(
        &mut self,
        node: usize,
        restraint: Restraint,
    ) -> Result<(), ValidationError> {
        self.check_node(node)?;
        self.restrain(node, restraint);
        Ok(())
    }

    /// Fix individual global degrees of freedom.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownDof`] when a degree of freedom is out of range.
    /// Nothing is modified when an error is returned.
    pub fn constrain_dofs(&mut self, dofs: &[usize]) -> Result<(), ValidationError> {
        let dof_count = self.dof_count();
        if let Some(&dof) = dofs.iter().find(|&&dof| dof >= dof_count) {
            return Err(ValidationError::UnknownDof { dof, dof_count });
        }
        for &dof in dofs {
            self.constrain_dof(dof);
        }
        Ok(())
    }

    /// Add nodal loads to the force vector.
    ///
    /// Loads accumulate, so repeated calls on the same node superimpose.
    ///
    /// Components landing on a degree of freedom that is already constrained are
    /// not added: they are logged at `warn` level and the matching entry of
    /// [`force_vector`](Self::force_vector) stays zero. Constraining a degree of
    /// freedom after loading it clears its entry the same way, so the order of
    /// `constrain` and `apply_load` calls does not matter. Re-assembly releases the
    /// constraints but keeps the force vector, so dropped components do not
    /// reappear.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::LengthMismatch`] when the lists differ in length,
    /// [`ValidationError::UnknownNode`] for out-of-range nodes and
    /// [`ValidationError::NonFiniteLoad`] for infinite or NaN components. Nothing is
    /// modified when an error is returned.
    ///
    /// # Examples
    /// ```
    /// use truss2d::{force, point, Connection, Restraint, TrussSystem};
    ///
    /// let mut truss = TrussSystem::new(
    ///     vec![point(0.0, 0.0), point(1.0, 0.0)],
    ///     vec![Connection::new(0, 1, 1.0, 1.0)],
    /// )?;
    /// truss.constrain_node(0, Restraint::Both)?;
    /// truss.apply_load(&[0, 1], &[force(5.0, 5.0), force(1.0, 0.0)])?;
    /// assert_eq!(truss.force_vector().as_slice(), &[0.0, 0.0, 1.0, 0.0]);
    /// # Ok::<(), truss2d::TrussError>(())
    /// ```
    pub fn apply_load(
        &mut self,
        nodes: &[usize],
        forces: &[Force],
    ) -> Result<(), ValidationError> {
        if nodes.len() != forces.len() {
            return Err(ValidationError::LengthMismatch {
                nodes: nodes.len(),
                values: forces.len(),
            });
        }
        for (&node, load) in nodes.iter().zip(forces) {
            self.check_node(node)?;
            if !load.x.is_finite() || !load.y.is_finite() {
                return Err(ValidationError::NonFiniteLoad {
                    node,
                    x: load.x,
                    y: load.y,
                });
            }
        }
        self.invalidate();
        for (&node, load) in nodes.iter().zip(forces) {
            let base = DOFS_PER_NODE * node;
            for (dof, component) in [(base, load.x), (base + 1, load.y)] {
                if self.constrained[dof] {
                    if component != 0.0 {
                        warn!("ignoring load {component} on constrained dof {dof} of node {node}");
                    }
                    continue;
                }
                self.force[dof] += component;
            }
        }
        Ok(())
    }

    /// Solve `K·u = F` for the nodal displacements.
    ///
    /// On success the displacement vector, every node and every element carry the
    /// new results. On failure no results are exposed.
    ///
    /// # Errors
    ///
    /// Returns [`TrussError::SingularSystem`] when the structure is under-constrained
    /// and [`TrussError::SolutionVerification`] when the residual check fails.
    pub fn solve(&mut self) -> Result<(), TrussError> {
        self.invalidate();
        self.check_topology();
        let free_dofs: Vec<usize> = (0..self.dof_count())
            .filter(|&dof| !self.constrained[dof])
            .collect();
        debug!(
            "solving for {} free of {} dofs",
            free_dofs.len(),
            self.dof_count()
        );
        let displacements = solve_displacements(
            &self.stiffness,
            &self.force,
            &free_dofs,
            self.options.pivot_ratio,
        )?;
        verify_residual(
            &self.stiffness,
            &displacements,
            &self.force,
            &self.options.residual,
        )?;
        self.store_displacements(displacements);
        info!(
            "solved {} nodes; largest displacement component {:e} m",
            self.node_count(),
            self.displacement.amax()
        );
        Ok(())
    }

    /// Retrieve the displacement of a node after a solve.
    #[must_use]
    pub fn node_displacement(&self, node: usize) -> Option<Displacement> {
        self.node(node).map(|node| node.displacement)
    }

    /// Retrieve the axial force in an element after a solve.
    #[must_use]
    pub fn element_axial_force(&self, element: usize) -> Option<f64> {
        self.elements.get(element).map(Element::axial_force)
    }

    /// Retrieve the connectivity entry of an element.
    #[must_use]
    pub fn connection(&self, element: usize) -> Option<&Connection> {
        self.graph.edge_weight(EdgeIndex::new(element))
    }

    /// Reject node indices outside the node list.
    fn check_node(&self, node: usize) -> Result<(), ValidationError> {
        if node < self.node_count() {
            Ok(())
        } else {
            Err(ValidationError::UnknownNode {
                node,
                node_count: self.node_count(),
            })
        }
    }

    /// Eliminate every degree of freedom covered by `restraint` at `node`.
    fn restrain(&mut self, node: usize, restraint: Restraint) {
        for dof in restraint.dofs(node) {
            self.constrain_dof(dof);
        }
    }

    /// Zero the row and column of `dof`, put 1 on the diagonal and clear its load.
    fn constrain_dof(&mut self, dof: usize) {
        self.invalidate();
        self.stiffness.row_mut(dof).fill(0.0);
        self.stiffness.column_mut(dof).fill(0.0);
        self.stiffness[(dof, dof)] = 1.0;
        self.force[dof] = 0.0;
        self.constrained[dof] = true;
        debug!("constrained dof {dof}");
    }

    /// Reset cached results after the system changes.
    fn invalidate(&mut self) {
        if self.solved {
            self.displacement.fill(0.0);
            for node in self.graph.node_weights_mut() {
                node.displacement = Displacement::default();
            }
            for element in &mut self.elements {
                element.clear_results();
            }
            self.solved = false;
        }
    }

    /// Build every element and scatter-add its matrix into a fresh global matrix.
    fn build_stiffness_matrix(&self) -> Result<(DMatrix<f64>, Vec<Element>), TrussError> {
        let dof = self.dof_count();
        let mut matrix = DMatrix::zeros(dof, dof);
        let mut elements = Vec::with_capacity(self.element_count());
        for edge in self.graph.edge_indices() {
            let connection = &self.graph[edge];
            let start = self.graph[NodeIndex::new(connection.node_i)].coordinate;
            let end = self.graph[NodeIndex::new(connection.node_j)].coordinate;
            let element = Element::new(start, end, connection.young_modulus, connection.area)
                .map_err(|source| TrussError::DegenerateElement {
                    element: edge.index(),
                    source,
                })?;

            let local = element.local_stiffness();
            let dof_map = connection.dofs();
            for (row_local, global_row) in dof_map.iter().enumerate() {
                for (col_local, global_col) in dof_map.iter().enumerate() {
                    matrix[(*global_row, *global_col)] += local[(row_local, col_local)];
                }
            }
            elements.push(element);
        }
        Ok((matrix, elements))
    }

    /// Log structural layouts that usually lead to a singular system.
    fn check_topology(&self) {
        let components = self.component_count();
        if components > 1 {
            warn!("truss is split into {components} disconnected parts");
        }
        for node in self.graph.node_indices() {
            if self.graph.neighbors_undirected(node).next().is_none() {
                warn!("node {} is not attached to any element", node.index());
            }
        }
    }

    /// Persist solved displacements onto the vector, the nodes and the elements.
    fn store_displacements(&mut self, displacements: DVector<f64>) {
        let at = |node: usize| {
            let base = DOFS_PER_NODE * node;
            Displacement::new(displacements[base], displacements[base + 1])
        };
        for (idx, node) in self.graph.node_weights_mut().enumerate() {
            node.displacement = at(idx);
        }
        for (element, edge) in self.elements.iter_mut().zip(self.graph.raw_edges()) {
            let connection = &edge.weight;
            element.record_displacements(at(connection.node_i), at(connection.node_j));
        }
        self.displacement = displacements;
        self.solved = true;
    }
}

/// Convert a raw node reference into an index.
fn parse_node_index(element: usize, value: f64) -> Result<usize, ValidationError> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let index = value as usize;
        Ok(index)
    } else {
        Err(ValidationError::MalformedNodeIndex { element, value })
    }
}

/// Require `matrix` to equal its transpose within `tolerance`.
pub(crate) fn check_symmetry(
    matrix: &DMatrix<f64>,
    tolerance: &Tolerance,
) -> Result<(), TrussError> {
    for row in 0..matrix.nrows() {
        for col in row + 1..matrix.ncols() {
            let upper = matrix[(row, col)];
            let lower = matrix[(col, row)];
            if !tolerance.is_close(upper, lower) {
                return Err(TrussError::InvariantViolation {
                    row,
                    col,
                    upper,
                    lower,
                });
            }
        }
    }
    Ok(())
}

/// Solve the system restricted to `free_dofs`; the remaining entries stay zero.
fn solve_displacements(
    stiffness: &DMatrix<f64>,
    load: &DVector<f64>,
    free_dofs: &[usize],
    pivot_ratio: f64,
) -> Result<DVector<f64>, TrussError> {
    let mut displacements = DVector::zeros(load.len());
    let free_len = free_dofs.len();
    if free_len == 0 {
        return Ok(displacements);
    }
    let k_ff = DMatrix::from_fn(free_len, free_len, |row, col| {
        stiffness[(free_dofs[row], free_dofs[col])]
    });
    let f_f = DVector::from_fn(free_len, |row, _| load[free_dofs[row]]);

    let lu = k_ff.lu();
    let pivots = lu.u().diagonal();
    let (smallest, largest) = (pivots.amin(), pivots.amax());
    if smallest.is_nan() || smallest <= pivot_ratio * largest {
        debug!("rejecting factorisation with pivots in [{smallest:e}, {largest:e}]");
        return Err(TrussError::SingularSystem);
    }
    let solution = lu.solve(&f_f).ok_or(TrussError::SingularSystem)?;
    if solution.iter().any(|value| !value.is_finite()) {
        return Err(TrussError::SingularSystem);
    }
    for (idx, &dof) in free_dofs.iter().enumerate() {
        displacements[dof] = solution[idx];
    }
    Ok(displacements)
}

/// Require `K·u − F` to vanish relative to the magnitudes involved.
pub(crate) fn verify_residual(
    stiffness: &DMatrix<f64>,
    displacements: &DVector<f64>,
    load: &DVector<f64>,
    tolerance: &Tolerance,
) -> Result<(), TrussError> {
    let residual = (stiffness * displacements - load).amax();
    let stiffness_norm = stiffness
        .row_iter()
        .map(|row| row.iter().map(|value| value.abs()).sum::<f64>())
        .fold(0.0, f64::max);
    let bound = tolerance.bound(stiffness_norm * displacements.amax() + load.amax());
    if residual.is_nan() || residual > bound {
        return Err(TrussError::SolutionVerification {
            residual,
            tolerance: bound,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::errors::ElementError;
    use crate::geometry::{force, point};

    /// Two collinear bars of unit length along the X axis.
    fn collinear() -> TrussSystem {
        TrussSystem::new(
            vec![point(2.0, 0.0), point(3.0, 0.0), point(4.0, 0.0)],
            vec![Connection::new(0, 1, 1.0, 1.0), Connection::new(1, 2, 1.0, 1.0)],
        )
        .expect("valid truss")
    }

    /// Triangle pinned at the left and roller-supported at the right.
    fn triangle() -> TrussSystem {
        let mut truss = TrussSystem::new(
            vec![point(0.0, 0.0), point(4.0, 0.0), point(2.0, 3.0)],
            vec![
                Connection::new(0, 1, 200.0e9, 0.002),
                Connection::new(1, 2, 200.0e9, 0.002),
                Connection::new(0, 2, 200.0e9, 0.002),
            ],
        )
        .expect("valid truss");
        truss.constrain(&[0, 1], &[2, 1]).expect("valid supports");
        truss
    }

    #[test]
    fn construction_requires_two_nodes() {
        let error = TrussSystem::new(vec![point(0.0, 0.0)], vec![]).expect_err("one node");
        assert_eq!(
            error,
            TrussError::Validation(ValidationError::TooFewNodes { count: 1 })
        );
    }

    #[test]
    fn out_of_range_node_index_is_rejected() {
        let error = TrussSystem::new(
            vec![point(0.0, 0.0), point(1.0, 0.0), point(2.0, 0.0)],
            vec![Connection::new(0, 1, 1.0, 1.0), Connection::new(1, 5, 1.0, 1.0)],
        )
        .expect_err("index 5 rejected");
        assert_eq!(
            error,
            TrussError::Validation(ValidationError::InvalidNodeIndex {
                element: 1,
                index: 5,
                node_count: 3,
            })
        );
    }

    #[test]
    fn non_positive_material_properties_are_rejected() {
        let nodes = vec![point(0.0, 0.0), point(1.0, 0.0)];
        for young_modulus in [0.0, -1.0] {
            let error = TrussSystem::new(
                nodes.clone(),
                vec![Connection::new(0, 1, young_modulus, 1.0)],
            )
            .expect_err("modulus rejected");
            assert!(matches!(
                error,
                TrussError::Validation(ValidationError::NonPositiveYoungModulus { element: 0, .. })
            ));
        }
        let error = TrussSystem::new(nodes, vec![Connection::new(0, 1, 1.0, 0.0)])
            .expect_err("area rejected");
        assert_eq!(
            error,
            TrussError::Validation(ValidationError::NonPositiveArea {
                element: 0,
                area: 0.0
            })
        );
    }

    #[test]
    fn non_finite_inputs_are_validation_errors() {
        let nodes = vec![point(0.0, 0.0), point(1.0, 0.0)];
        let error = TrussSystem::new(
            nodes.clone(),
            vec![Connection::new(0, 1, f64::INFINITY, 1.0)],
        )
        .expect_err("infinite modulus rejected");
        assert_eq!(
            error,
            TrussError::Validation(ValidationError::NonPositiveYoungModulus {
                element: 0,
                young_modulus: f64::INFINITY
            })
        );

        let error = TrussSystem::new(
            nodes.clone(),
            vec![Connection::new(0, 1, 1.0, f64::NEG_INFINITY)],
        )
        .expect_err("infinite area rejected");
        assert!(matches!(
            error,
            TrussError::Validation(ValidationError::NonPositiveArea { element: 0, .. })
        ));

        let error = TrussSystem::new(
            vec![point(0.0, 0.0), point(f64::INFINITY, 0.0)],
            vec![Connection::new(0, 1, 1.0, 1.0)],
        )
        .expect_err("infinite coordinate rejected");
        assert_eq!(
            error,
            TrussError::Validation(ValidationError::NonFiniteCoordinate {
                node: 1,
                x: f64::INFINITY,
                y: 0.0
            })
        );

        let error = TrussSystem::from_rows(&[[0.0, 0.0], [1.0, f64::NAN]], &[[0.0, 1.0, 1.0, 1.0]])
            .expect_err("NaN coordinate rejected");
        assert!(matches!(
            error,
            TrussError::Validation(ValidationError::NonFiniteCoordinate { node: 1, .. })
        ));
    }

    #[test]
    fn overflowing_axial_stiffness_is_not_an_invariant_violation() {
        let error = TrussSystem::new(
            vec![point(0.0, 0.0), point(1.0, 0.0)],
            vec![Connection::new(0, 1, 1.0e300, 1.0e300)],
        )
        .expect_err("overflowing stiffness rejected");
        assert_eq!(
            error,
            TrussError::DegenerateElement {
                element: 0,
                source: ElementError::NonFiniteStiffness {
                    axial_stiffness: f64::INFINITY
                },
            }
        );
    }

    #[test]
    fn self_loop_is_a_degenerate_element() {
        let error = TrussSystem::new(
            vec![point(0.0, 0.0), point(1.0, 0.0)],
            vec![Connection::new(0, 1, 1.0, 1.0), Connection::new(1, 1, 1.0, 1.0)],
        )
        .expect_err("self loop rejected");
        assert_eq!(
            error,
            TrussError::DegenerateElement {
                element: 1,
                source: ElementError::Degenerate { length: 0.0 },
            }
        );
    }

    #[test]
    fn rows_are_checked_in_order() {
        let too_few = TrussSystem::from_rows(&[vec![0.0, 0.0, 0.0]], &[vec![0.0]])
            .expect_err("node count checked first");
        assert_eq!(
            too_few,
            TrussError::Validation(ValidationError::TooFewNodes { count: 1 })
        );

        let arity = TrussSystem::from_rows(
            &[[0.0, 0.0], [1.0, 0.0]],
            &[vec![0.0, 1.0, 1.0, 1.0], vec![0.0, 1.0, 1.0]],
        )
        .expect_err("short connectivity row");
        assert_eq!(
            arity,
            TrussError::Validation(ValidationError::ConnectivityArity {
                element: 1,
                fields: 3
            })
        );

        let malformed = TrussSystem::from_rows(&[[0.0, 0.0], [1.0, 0.0]], &[[0.5, 1.0, 1.0, 1.0]])
            .expect_err("fractional index");
        assert_eq!(
            malformed,
            TrussError::Validation(ValidationError::MalformedNodeIndex {
                element: 0,
                value: 0.5
            })
        );

        let truss = TrussSystem::from_rows(&[[0.0, 0.0], [1.0, 0.0]], &[[0.0, 1.0, 2.0, 3.0]])
            .expect("valid rows");
        assert_eq!(
            truss.connection(0),
            Some(&Connection::new(0, 1, 2.0, 3.0))
        );
    }

    #[test]
    fn asymmetric_matrix_violates_invariant() {
        let mut matrix = DMatrix::<f64>::identity(3, 3);
        matrix[(0, 2)] = 2.0;
        matrix[(2, 0)] = 2.0;
        check_symmetry(&matrix, &SolverOptions::default().symmetry).expect("symmetric");

        matrix[(1, 2)] = 1.0;
        let error = check_symmetry(&matrix, &SolverOptions::default().symmetry)
            .expect_err("asymmetry detected");
        assert_eq!(
            error,
            TrussError::InvariantViolation {
                row: 1,
                col: 2,
                upper: 1.0,
                lower: 0.0,
            }
        );
    }

    #[test]
    fn reassembly_is_deterministic_and_drops_constraints() {
        let mut truss = collinear();
        let assembled = truss.stiffness_matrix().clone();
        truss.constrain(&[0], &[2]).expect("valid constraint");
        assert_ne!(truss.stiffness_matrix(), &assembled);
        assert!(truss.is_constrained(0));

        truss.assemble_global_stiffness().expect("reassembly succeeds");
        assert_eq!(truss.stiffness_matrix(), &assembled);
        assert!(!truss.is_constrained(0));
        assert_eq!(truss.elements().len(), 2);
    }

    #[test]
    fn constraining_twice_is_idempotent() {
        let mut once = triangle();
        once.apply_load(&[2], &[force(5.0, -10.0)]).expect("valid load");
        let mut twice = once.clone();

        once.constrain(&[2], &[0]).expect("valid constraint");
        twice.constrain(&[2, 2], &[0, 0]).expect("valid constraint");
        twice.constrain_dofs(&[4]).expect("valid dof");

        assert_eq!(once.stiffness_matrix(), twice.stiffness_matrix());
        assert_eq!(once.force_vector(), twice.force_vector());
        assert_eq!(once.force_vector()[4], 0.0);
        assert_eq!(once.force_vector()[5], -10.0);
    }

    #[test]
    fn constraint_zeroes_row_and_column() {
        let mut truss = collinear();
        truss
            .constrain_node(1, Restraint::Both)
            .expect("valid constraint");
        let matrix = truss.stiffness_matrix();
        for dof in [2, 3] {
            for other in 0..truss.dof_count() {
                let expected = if other == dof { 1.0 } else { 0.0 };
                assert_eq!(matrix[(dof, other)], expected);
                assert_eq!(matrix[(other, dof)], expected);
            }
        }
    }

    #[test]
    fn invalid_constraints_leave_state_untouched() {
        let mut truss = collinear();
        let before = truss.stiffness_matrix().clone();

        assert_eq!(
            truss.constrain(&[0, 1], &[2]).expect_err("length mismatch"),
            ValidationError::LengthMismatch { nodes: 2, values: 1 }
        );
        assert_eq!(
            truss.constrain(&[0, 1], &[2, 3]).expect_err("bad code"),
            ValidationError::InvalidDirectionCode { code: 3 }
        );
        assert_eq!(
            truss.constrain(&[0, 7], &[2, 2]).expect_err("bad node"),
            ValidationError::UnknownNode {
                node: 7,
                node_count: 3
            }
        );
        assert_eq!(
            truss.constrain_dofs(&[1, 6]).expect_err("bad dof"),
            ValidationError::UnknownDof {
                dof: 6,
                dof_count: 6
            }
        );
        assert_eq!(truss.stiffness_matrix(), &before);
        assert!((0..truss.dof_count()).all(|dof| !truss.is_constrained(dof)));
    }

    #[test]
    fn restraint_codes_map_to_dofs() {
        assert_eq!(Restraint::try_from(0_u8), Ok(Restraint::X));
        assert_eq!(Restraint::try_from(1_u8), Ok(Restraint::Y));
        assert_eq!(Restraint::try_from(2_u8), Ok(Restraint::Both));
        assert_eq!(Restraint::X.dofs(3), 6..=6);
        assert_eq!(Restraint::Y.dofs(3), 7..=7);
        assert_eq!(Restraint::Both.dofs(3), 6..=7);
    }

    #[test]
    fn loads_superimpose() {
        let mut split = collinear();
        split
            .apply_load(&[2, 2], &[force(3.0, -1.0), force(4.0, 2.5)])
            .expect("valid loads");
        split.apply_load(&[1], &[force(-2.0, 0.0)]).expect("valid load");

        let mut combined = collinear();
        combined
            .apply_load(&[2, 1], &[force(7.0, 1.5), force(-2.0, 0.0)])
            .expect("valid loads");

        assert_eq!(split.force_vector(), combined.force_vector());
        assert_eq!(
            split.apply_load(&[0], &[]).expect_err("length mismatch"),
            ValidationError::LengthMismatch { nodes: 1, values: 0 }
        );
        assert_eq!(
            split.apply_load(&[3], &[force(1.0, 1.0)]).expect_err("bad node"),
            ValidationError::UnknownNode {
                node: 3,
                node_count: 3
            }
        );
    }

    #[test]
    fn non_finite_loads_are_rejected_before_mutation() {
        let mut truss = triangle();
        truss.apply_load(&[1], &[force(1.0, 0.0)]).expect("valid load");
        let before = truss.force_vector().clone();

        let error = truss
            .apply_load(&[1, 2], &[force(2.0, 0.0), force(f64::NAN, 0.0)])
            .expect_err("NaN load rejected");
        assert!(matches!(
            error,
            ValidationError::NonFiniteLoad { node: 2, y, .. } if y == 0.0
        ));
        assert_eq!(
            truss
                .apply_load(&[1], &[force(0.0, f64::INFINITY)])
                .expect_err("infinite load rejected"),
            ValidationError::NonFiniteLoad {
                node: 1,
                x: 0.0,
                y: f64::INFINITY
            }
        );
        assert_eq!(truss.force_vector(), &before);
    }

    #[test]
    fn loads_on_constrained_dofs_are_dropped() {
        let mut truss = triangle();
        truss
            .apply_load(&[1, 2], &[force(10.0, 20.0), force(0.0, -50.0)])
            .expect("valid loads");
        assert_eq!(truss.force_vector()[2], 10.0);
        assert_eq!(truss.force_vector()[3], 0.0);
        assert_eq!(truss.force_vector()[5], -50.0);

        // Constraining after loading clears the entry just the same.
        truss.constrain_node(2, Restraint::Y).expect("valid support");
        assert_eq!(truss.force_vector()[5], 0.0);
        assert!((0..truss.dof_count())
            .filter(|&dof| truss.is_constrained(dof))
            .all(|dof| truss.force_vector()[dof] == 0.0));
    }

    #[test]
    fn single_bar_matches_closed_form() {
        let mut truss = TrussSystem::new(
            vec![point(0.0, 0.0), point(1.0, 0.0)],
            vec![Connection::new(0, 1, 200.0e9, 0.01)],
        )
        .expect("valid truss");
        truss.constrain(&[0, 1], &[2, 1]).expect("valid supports");
        truss
            .apply_load(&[1], &[force(-1_000.0, 0.0)])
            .expect("valid load");
        truss.solve().expect("analysis succeeds");

        let displacement = truss.node_displacement(1).expect("node exists");
        assert_relative_eq!(displacement.x, -1_000.0 / (0.01 * 200.0e9), epsilon = 1.0e-15);
        assert_relative_eq!(displacement.y, 0.0, epsilon = 1.0e-15);

        let element = &truss.elements()[0];
        assert_eq!(element.end_displacement(), displacement);
        assert_relative_eq!(element.axial_force(), -1_000.0, epsilon = 1.0e-6);
        assert_relative_eq!(element.stress(), -100_000.0, epsilon = 1.0e-3);
    }

    #[test]
    fn symmetric_triangle_carries_apex_load_in_compression() {
        let mut truss = triangle();
        truss
            .apply_load(&[2], &[force(0.0, -10_000.0)])
            .expect("valid load");
        truss.solve().expect("analysis succeeds");

        // Each rafter carries P / (2 sin θ) with sin θ = 3 / √13.
        let rafter = -10_000.0 / (2.0 * 3.0 / 13.0_f64.sqrt());
        assert_relative_eq!(truss.element_axial_force(1).expect("exists"), rafter, epsilon = 1.0e-6);
        assert_relative_eq!(truss.element_axial_force(2).expect("exists"), rafter, epsilon = 1.0e-6);
        // The tie balances the horizontal thrust: P / (2 tan θ), tan θ = 3 / 2.
        let tie = 10_000.0 / (2.0 * 1.5);
        assert_relative_eq!(truss.element_axial_force(0).expect("exists"), tie, epsilon = 1.0e-6);

        let apex = truss.node_displacement(2).expect("node exists");
        assert!(apex.y < 0.0);
        assert_eq!(truss.nodal_displacements()[2], apex);
    }

    #[test]
    fn unconstrained_structure_is_singular() {
        let mut truss = collinear();
        truss.apply_load(&[2], &[force(1.0, 0.0)]).expect("valid load");
        assert_eq!(truss.solve(), Err(TrussError::SingularSystem));

        // Fixing x alone still leaves the y translations free.
        truss.constrain(&[0], &[0]).expect("valid constraint");
        assert_eq!(truss.solve(), Err(TrussError::SingularSystem));
        assert!(!truss.is_solved());
        assert!(truss.displacement_vector().iter().all(|&value| value == 0.0));
    }

    #[test]
    fn fully_constrained_structure_does_not_move() {
        let mut truss = collinear();
        truss.constrain(&[0, 1, 2], &[2, 2, 2]).expect("valid constraints");
        truss.solve().expect("trivial solve");
        assert!(truss.is_solved());
        assert!(truss.displacement_vector().iter().all(|&value| value == 0.0));
    }

    #[test]
    fn changes_after_a_solve_invalidate_results() {
        let mut truss = triangle();
        truss
            .apply_load(&[2], &[force(1_000.0, 0.0)])
            .expect("valid load");
        truss.solve().expect("analysis succeeds");
        let first = truss.displacement_vector().clone();
        truss.solve().expect("repeat solve succeeds");
        assert_eq!(truss.displacement_vector(), &first);

        truss.constrain(&[2], &[1]).expect("valid constraint");
        assert!(!truss.is_solved());
        assert_eq!(truss.node_displacement(2), Some(Displacement::default()));
        assert_eq!(truss.element_axial_force(0), Some(0.0));
        assert!(truss.displacement_vector().iter().all(|&value| value == 0.0));
    }

    #[test]
    fn residual_check_rejects_wrong_displacements() {
        let stiffness = DMatrix::from_row_slice(2, 2, &[2.0, -1.0, -1.0, 2.0]);
        let load = DVector::from_row_slice(&[1.0, 0.0]);
        let tolerance = SolverOptions::default().residual;

        let exact = DVector::from_row_slice(&[2.0 / 3.0, 1.0 / 3.0]);
        verify_residual(&stiffness, &exact, &load, &tolerance).expect("exact solution");

        let wrong = DVector::from_row_slice(&[0.5, 0.5]);
        let error = verify_residual(&stiffness, &wrong, &load, &tolerance)
            .expect_err("wrong solution rejected");
        assert!(matches!(error, TrussError::SolutionVerification { residual, .. } if residual > 0.4));
    }

    #[test]
    fn components_are_counted() {
        let truss = TrussSystem::new(
            vec![point(0.0, 0.0), point(1.0, 0.0), point(5.0, 5.0)],
            vec![Connection::new(0, 1, 1.0, 1.0)],
        )
        .expect("valid truss");
        assert_eq!(truss.component_count(), 2);
        assert_eq!(collinear().component_count(), 1);
    }
}
