use truss2d::{force, point, Connection, Restraint, TrussSystem};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Symmetric roof triangle: two rafters and a tie
    let steel = 210.0e9;
    let area = 0.005;
    let mut truss = TrussSystem::new(
        vec![point(0.0, 0.0), point(6.0, 0.0), point(3.0, 2.0)],
        vec![
            Connection::new(0, 1, steel, area),
            Connection::new(1, 2, steel, area),
            Connection::new(0, 2, steel, area),
        ],
    )?;

    // Pinned on the left, roller on the right, ridge load pointing down
    truss.constrain_node(0, Restraint::Both)?;
    truss.constrain_node(1, Restraint::Y)?;
    truss.apply_load(&[2], &[force(0.0, -5_000.0)])?;

    truss.solve()?;

    for (idx, element) in truss.elements().iter().enumerate() {
        println!(
            "member {idx}: N = {:+.1} N, stress = {:+.3e} Pa",
            element.axial_force(),
            element.stress()
        );
    }

    Ok(())
}
