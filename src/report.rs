//! Human-readable rendering of a truss system.
//!
//! Nothing in the analysis prints; this module turns the read-only state of a
//! [`TrussSystem`] into text for whoever wants to show it.

use std::fmt;

use crate::element::Element;
use crate::truss::{TrussSystem, DOFS_PER_NODE};

/// [`Display`](fmt::Display) adapter describing every element, the global matrix and
/// the force and displacement vectors.
#[derive(Clone, Copy, Debug)]
pub struct TrussReport<'a> {
    /// System being described.
    system: &'a TrussSystem,
}

impl<'a> TrussReport<'a> {
    /// Wrap `system` for display.
    #[must_use]
    pub fn new(system: &'a TrussSystem) -> Self {
        Self { system }
    }
}

impl fmt::Display for TrussReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let system = self.system;
        writeln!(
            f,
            "Planar truss: {} nodes, {} elements, {} degrees of freedom",
            system.node_count(),
            system.element_count(),
            system.dof_count()
        )?;
        for (idx, element) in system.elements().iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "ELEMENT {idx}")?;
            write_element(f, element)?;
        }

        writeln!(f)?;
        writeln!(f, "Global stiffness matrix:{}", system.stiffness_matrix())?;

        writeln!(f, "Global force vector (N):")?;
        let forces = system.force_vector().as_slice().chunks_exact(DOFS_PER_NODE);
        for (node, pair) in forces.enumerate() {
            writeln!(f, "  node {node}: fx = {:+.6e}, fy = {:+.6e}", pair[0], pair[1])?;
        }

        let status = if system.is_solved() { "" } else { " (not solved)" };
        writeln!(f, "Nodal displacements (m){status}:")?;
        for (idx, node) in system.nodes().enumerate() {
            writeln!(
                f,
                "  node {idx} at ({}, {}): ux = {:+.6e}, uy = {:+.6e}",
                node.coordinate.x, node.coordinate.y, node.displacement.x, node.displacement.y
            )?;
        }
        Ok(())
    }
}

/// Describe the geometry, material and local matrix of one element.
fn write_element(f: &mut fmt::Formatter<'_>, element: &Element) -> fmt::Result {
    let line = element.line();
    let (c, s) = element.direction_cosines();
    writeln!(f, "  Node 1 (m): ({}, {})", line.start.x, line.start.y)?;
    writeln!(f, "  Node 2 (m): ({}, {})", line.end.x, line.end.y)?;
    writeln!(f, "  Element length (m): {}", element.length())?;
    writeln!(f, "  Direction cosines c and s: {c}, {s}")?;
    writeln!(f, "  Young's modulus (N/m^2): {:e}", element.young_modulus())?;
    writeln!(f, "  Cross-sectional area (m^2): {:e}", element.area())?;
    writeln!(f, "  Axial force (N): {:+.6e}", element.axial_force())?;
    write!(f, "  Local stiffness matrix:{}", element.local_stiffness())
}

/// Render the full report for `system`.
///
/// # Examples
/// ```
/// use truss2d::{point, render_truss_info, Connection, TrussSystem};
///
/// let truss = TrussSystem::new(
///     vec![point(0.0, 0.0), point(1.0, 0.0)],
///     vec![Connection::new(0, 1, 1.0, 1.0)],
/// )?;
/// let report = render_truss_info(&truss);
/// assert!(report.contains("ELEMENT 0"));
/// # Ok::<(), truss2d::TrussError>(())
/// ```
#[must_use]
pub fn render_truss_info(system: &TrussSystem) -> String {
    TrussReport::new(system).to_string()
}
