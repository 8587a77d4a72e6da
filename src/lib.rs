mod grid;
mod solver;

pub use grid::{Cost, Error as GridError, Grid, Neighbourhood, Position};
pub use solver::{Error as SolveError, Solution, Solver, State, Step, INFINITY};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Solve(#[from] SolveError),
}

/// Parse a block of risk digits, tile it `repeat` times in each direction,
/// and find the lowest total risk of any route from the top left to the bottom right.
pub fn lowest_total_risk(input: &str, repeat: usize) -> Result<u64, Error> {
    let grid = Grid::parse_digits(input)?.expand(repeat)?;
    let risk = Solver::new(&grid)?.solve()?;
    Ok(risk)
}
