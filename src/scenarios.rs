use truss2d::{force, point, Connection, TrussError, TrussSystem};

/// Three nodes on the X axis joined by two unit bars with `E = A = 1`.
///
/// Left unconstrained, the assembled matrix is only populated in the x rows and
/// columns, which makes it easy to check by hand.
pub fn collinear_bars() -> Result<TrussSystem, TrussError> {
    TrussSystem::new(
        vec![point(2.0, 0.0), point(3.0, 0.0), point(4.0, 0.0)],
        vec![Connection::new(0, 1, 1.0, 1.0), Connection::new(1, 2, 1.0, 1.0)],
    )
}

/// Panel with a diagonal loaded at its free corner, solved.
///
/// Node 0 is restrained horizontally, nodes 1 and 3 are pinned and node 2 carries
/// a load of 100 N in each direction.
pub fn braced_panel() -> Result<TrussSystem, TrussError> {
    let mut truss = TrussSystem::new(
        vec![point(0.0, 0.0), point(1.0, 1.0), point(2.0, 0.0), point(3.0, 0.0)],
        vec![
            Connection::new(0, 1, 1.0, 1.0),
            Connection::new(0, 2, 1.0, 1.0),
            Connection::new(1, 2, 1.0, 1.0),
            Connection::new(1, 3, 1.0, 1.0),
            Connection::new(2, 3, 1.0, 1.0),
        ],
    )?;
    truss.constrain(&[0, 1, 3], &[0, 2, 2])?;
    truss.apply_load(&[2], &[force(100.0, 100.0)])?;
    truss.solve()?;
    Ok(truss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenarios_build_and_solve() {
        let collinear = collinear_bars().expect("collinear bars assemble");
        assert_eq!(collinear.dof_count(), 6);

        let panel = braced_panel().expect("braced panel solves");
        assert!(panel.is_solved());
        let loaded = panel.node_displacement(2).expect("node exists");
        assert!(loaded.x > 0.0);
        assert!(loaded.y > 0.0);
    }
}
