use truss2d::{force, point, Connection, TrussSystem};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Two nodes joined by a single steel bar
    let mut truss = TrussSystem::new(
        vec![point(0.0, 0.0), point(1.0, 0.0)],
        vec![Connection::new(0, 1, 200.0e9, 0.01)],
    )?;

    // Pin the left node, let the right node slide horizontally only
    truss.constrain(&[0, 1], &[2, 1])?;
    truss.apply_load(&[1], &[force(-1_000.0, 0.0)])?;

    truss.solve()?;

    if let Some(displacement) = truss.node_displacement(1) {
        println!("ux = {:.3e} m", displacement.x);
    }

    Ok(())
}
