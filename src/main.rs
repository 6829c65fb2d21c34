mod scenarios;

use std::error::Error;

use log::info;
use scenarios::{braced_panel, collinear_bars};
use truss2d::render_truss_info;

fn main() -> Result<(), Box<dyn Error>> {
    // Diagnostics go through the `log` facade; RUST_LOG selects the level.
    env_logger::init();

    // Assembly alone: two unit bars along the X axis. The matrix is printed before
    // any supports are applied, so it is the raw sum of both element matrices.
    let collinear = collinear_bars()?;
    info!("assembled collinear bars");
    println!("{}", render_truss_info(&collinear));

    // Full pipeline: supports, a diagonal load and the solve with its residual check.
    let panel = braced_panel()?;
    info!("solved braced panel");
    println!("{}", render_truss_info(&panel));

    Ok(())
}
