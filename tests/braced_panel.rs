use approx::assert_relative_eq;
use truss2d::{force, point, Connection, Point, TrussSystem};

fn nodes() -> Vec<Point> {
    vec![point(0.0, 0.0), point(1.0, 1.0), point(2.0, 0.0), point(3.0, 0.0)]
}

fn members() -> Vec<Connection> {
    vec![
        Connection::new(0, 1, 1.0, 1.0),
        Connection::new(0, 2, 1.0, 1.0),
        Connection::new(1, 2, 1.0, 1.0),
        Connection::new(1, 3, 1.0, 1.0),
        Connection::new(2, 3, 1.0, 1.0),
    ]
}

fn solved_panel() -> TrussSystem {
    let mut truss = TrussSystem::new(nodes(), members()).expect("valid truss");
    truss
        .constrain(&[0, 1, 3], &[0, 2, 2])
        .expect("valid supports");
    truss
        .apply_load(&[2], &[force(100.0, 100.0)])
        .expect("valid load");
    truss.solve().expect("panel is kinematically determinate");
    truss
}

#[test]
fn residual_vanishes_after_solve() {
    let truss = solved_panel();
    let residual = truss.stiffness_matrix() * truss.displacement_vector() - truss.force_vector();
    for value in residual.iter() {
        assert_relative_eq!(*value, 0.0, epsilon = 1.0e-9);
    }
}

#[test]
fn constrained_dofs_do_not_move() {
    let truss = solved_panel();
    let u = truss.displacement_vector();
    for dof in [0, 2, 3, 6, 7] {
        assert!(truss.is_constrained(dof));
        assert_eq!(u[dof], 0.0);
    }
    // Node 0 is only held horizontally, but nothing couples its vertical motion to
    // the loaded node.
    assert_relative_eq!(u[1], 0.0, epsilon = 1.0e-12);
}

#[test]
fn loaded_node_matches_reduced_hand_solution() {
    let truss = solved_panel();

    // Free DOFs at node 2 see the horizontal bars (EA/L = 1/2 and 1) and the
    // diagonal from node 1 (EA/L = 1/√2, c = −s = 1/√2).
    let diagonal = 1.0 / 2.0_f64.sqrt();
    let kxx = 0.5 + 1.0 + 0.5 * diagonal;
    let kxy = -0.5 * diagonal;
    let kyy = 0.5 * diagonal;
    let det = kxx * kyy - kxy * kxy;
    let expected_x = (kyy * 100.0 - kxy * 100.0) / det;
    let expected_y = (kxx * 100.0 - kxy * 100.0) / det;

    let loaded = truss.node_displacement(2).expect("node exists");
    assert_relative_eq!(loaded.x, expected_x, max_relative = 1.0e-10);
    assert_relative_eq!(loaded.y, expected_y, max_relative = 1.0e-10);
}

#[test]
fn reactions_balance_the_applied_load() {
    let truss = solved_panel();
    let unconstrained = TrussSystem::new(nodes(), members()).expect("valid truss");

    // Internal nodal forces from the unconstrained matrix equal applied loads plus
    // support reactions, so over the whole structure they sum to zero.
    let internal = unconstrained.stiffness_matrix() * truss.displacement_vector();
    let total_x: f64 = internal.iter().step_by(2).sum();
    let total_y: f64 = internal.iter().skip(1).step_by(2).sum();
    assert_relative_eq!(total_x, 0.0, epsilon = 1.0e-9);
    assert_relative_eq!(total_y, 0.0, epsilon = 1.0e-9);

    // At the loaded node the internal force is exactly the applied load.
    assert_relative_eq!(internal[4], 100.0, epsilon = 1.0e-9);
    assert_relative_eq!(internal[5], 100.0, epsilon = 1.0e-9);
}

#[test]
fn element_results_follow_node_ordering() {
    let truss = solved_panel();
    for (element, connection) in truss.elements().iter().zip(truss.connectivity()) {
        assert_eq!(
            Some(element.start_displacement()),
            truss.node_displacement(connection.node_i)
        );
        assert_eq!(
            Some(element.end_displacement()),
            truss.node_displacement(connection.node_j)
        );
    }
    // Bar 1–3 joins two pinned nodes and carries nothing.
    assert_eq!(truss.element_axial_force(3), Some(0.0));
}
