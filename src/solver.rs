use std::{cmp::Reverse, collections::BinaryHeap};

use crate::grid::{Cost, Grid, Neighbourhood, Position};

/// Distance of a node which no known path reaches yet.
///
/// Relaxation saturates at this value, so a cell costing `u64::MAX` can never be entered.
pub const INFINITY: u64 = u64::MAX;

/// Per-cell search bookkeeping.
#[derive(Debug, Clone, Copy)]
struct Node {
    /// Charged on entering this cell.
    cost: u64,
    distance: u64,
    /// Flat index of the previous node on the best known path.
    predecessor: Option<usize>,
    visited: bool,
}

impl Node {
    fn new(cost: u64) -> Self {
        Self {
            cost,
            distance: INFINITY,
            predecessor: None,
            visited: false,
        }
    }
}

/// Lifecycle of a [`Solver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Only the source is in the frontier.
    Initialized,
    Running,
    /// The target was finalized at this distance.
    Solved(u64),
    /// The frontier ran dry before the target was finalized.
    Exhausted,
}

/// Outcome of a single [`Solver::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A node other than the target had its shortest distance locked in.
    Finalized { position: Position, distance: u64 },
    Solved(u64),
    Exhausted,
}

/// The cheapest route from source to target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub cost: u64,
    /// Every cell visited, source and target included.
    pub path: Vec<Position>,
}

/// Dijkstra search for the cheapest route across a grid of entry costs.
///
/// Moving into a cell costs that cell's value; the source cell is never charged.
/// Only orthogonal moves are allowed.
///
/// The frontier is a binary heap which may hold outdated entries for a node
/// whose distance improved after it was pushed. Those are discarded when popped.
#[derive(Debug, Clone)]
pub struct Solver {
    nodes: Grid<Node>,
    source: usize,
    target: usize,
    frontier: BinaryHeap<Reverse<(u64, usize)>>,
    state: State,
    finalized: usize,
    stale: usize,
    // scratch buffer for neighbour queries
    nbuf: Vec<Position>,
}

impl Solver {
    /// Prepare a search from the top left corner to the bottom right corner of `grid`.
    pub fn new<T: Cost>(grid: &Grid<T>) -> Result<Self, Error> {
        if grid.is_empty() {
            return Err(Error::EmptyGrid);
        }
        let target = Position::new(grid.width() - 1, grid.height() - 1);
        Self::with_endpoints(grid, Position::default(), target)
    }

    /// Prepare a search between two arbitrary cells of `grid`.
    pub fn with_endpoints<T: Cost>(
        grid: &Grid<T>,
        source: Position,
        target: Position,
    ) -> Result<Self, Error> {
        if grid.is_empty() {
            return Err(Error::EmptyGrid);
        }
        let endpoint = |position: Position| {
            grid.idx(position.x, position.y).ok_or(Error::OutOfBounds {
                position,
                width: grid.width(),
                height: grid.height(),
            })
        };
        let source_idx = endpoint(source)?;
        let target_idx = endpoint(target)?;

        log::debug!(
            "searching {}x{} grid from {source} to {target}",
            grid.width(),
            grid.height()
        );

        let mut solver = Self {
            nodes: grid.map(|cost| Node::new(cost.as_u64())),
            source: source_idx,
            target: target_idx,
            frontier: BinaryHeap::new(),
            state: State::Initialized,
            finalized: 0,
            stale: 0,
            nbuf: Vec::with_capacity(4),
        };
        solver.reset();
        Ok(solver)
    }

    /// Forget all progress and return to [`State::Initialized`].
    pub fn reset(&mut self) {
        for node in self.nodes.as_mut_slice() {
            *node = Node::new(node.cost);
        }
        self.nodes.as_mut_slice()[self.source].distance = 0;
        self.frontier.clear();
        self.frontier.push(Reverse((0, self.source)));
        self.state = State::Initialized;
        self.finalized = 0;
        self.stale = 0;
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn source(&self) -> Position {
        self.nodes.position(self.source)
    }

    pub fn target(&self) -> Position {
        self.nodes.position(self.target)
    }

    /// Best distance known so far, or `None` if the cell is unreached or outside the grid.
    pub fn distance(&self, position: Position) -> Option<u64> {
        self.nodes
            .get(position.x, position.y)
            .map(|node| node.distance)
            .filter(|&distance| distance != INFINITY)
    }

    /// `true` once the cell's shortest distance is locked in.
    pub fn is_finalized(&self, position: Position) -> bool {
        self.nodes
            .get(position.x, position.y)
            .is_some_and(|node| node.visited)
    }

    /// Finalize the closest unvisited node and relax its neighbours.
    ///
    /// Once the solver has finished, this keeps returning the terminal outcome.
    pub fn step(&mut self) -> Step {
        match self.state {
            State::Solved(distance) => return Step::Solved(distance),
            State::Exhausted => return Step::Exhausted,
            State::Initialized => self.state = State::Running,
            State::Running => {}
        }

        while let Some(Reverse((distance, idx))) = self.frontier.pop() {
            let node = &mut self.nodes.as_mut_slice()[idx];
            if node.visited || distance != node.distance {
                self.stale += 1;
                continue;
            }
            node.visited = true;
            self.finalized += 1;

            let position = self.nodes.position(idx);
            log::trace!("finalized {position} at distance {distance}");

            if idx == self.target {
                log::debug!(
                    "reached {position} at cost {distance} after finalizing {} nodes ({} stale entries skipped)",
                    self.finalized,
                    self.stale
                );
                self.state = State::Solved(distance);
                return Step::Solved(distance);
            }

            self.relax(idx, position, distance);
            return Step::Finalized { position, distance };
        }

        log::debug!(
            "frontier exhausted after finalizing {} nodes without reaching {}",
            self.finalized,
            self.target()
        );
        self.state = State::Exhausted;
        Step::Exhausted
    }

    fn relax(&mut self, idx: usize, position: Position, distance: u64) {
        let mut nbuf = std::mem::take(&mut self.nbuf);
        nbuf.clear();
        nbuf.extend(
            self.nodes
                .neighbours(Neighbourhood::Orthogonal, position.x, position.y),
        );

        for &neighbour in nbuf.iter() {
            let Some(ni) = self.nodes.idx(neighbour.x, neighbour.y) else {
                continue;
            };
            let n = &mut self.nodes.as_mut_slice()[ni];
            let candidate = distance.saturating_add(n.cost);
            if n.visited {
                debug_assert!(
                    n.distance <= candidate,
                    "finalized node {neighbour} would improve from {} to {candidate}",
                    n.distance
                );
                continue;
            }
            if candidate < n.distance {
                n.distance = candidate;
                n.predecessor = Some(idx);
                self.frontier.push(Reverse((candidate, ni)));
            }
        }

        self.nbuf = nbuf;
    }

    /// Run the search to completion and return the cost of the cheapest route.
    ///
    /// Calling this again on a finished solver returns the same outcome without searching again.
    pub fn solve(&mut self) -> Result<u64, Error> {
        loop {
            match self.step() {
                Step::Finalized { .. } => {}
                Step::Solved(distance) => return Ok(distance),
                Step::Exhausted => {
                    return Err(Error::Unreachable {
                        from: self.source(),
                        to: self.target(),
                    })
                }
            }
        }
    }

    /// Like [`solve`][Self::solve], but also reconstruct the route taken.
    pub fn solve_path(&mut self) -> Result<Solution, Error> {
        let cost = self.solve()?;

        let nodes = self.nodes.as_slice();
        let mut path = Vec::new();
        let mut current = Some(self.target);
        while let Some(idx) = current {
            path.push(self.nodes.position(idx));
            current = nodes[idx].predecessor;
        }
        path.reverse();
        debug_assert_eq!(path.first(), Some(&self.source()));

        Ok(Solution { cost, path })
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("cannot search a grid with no cells")]
    EmptyGrid,
    #[error("the endpoint `{position}` is out of bounds. size: `{width}x{height}`")]
    OutOfBounds {
        position: Position,
        width: usize,
        height: usize,
    },
    #[error("no path leads from `{from}` to `{to}`")]
    Unreachable { from: Position, to: Position },
}

#[cfg(test)]
mod tests {
    use super::*;

    use indoc::indoc;
    use rstest::rstest;

    const SAMPLE: &str = indoc! {"
        1163751742
        1381373672
        2136511328
        3694931569
        7463417111
        1319128137
        1359912421
        3125421639
        1293138521
        2311944581
    "};

    const WALL: u64 = u64::MAX;

    /// Deterministic pseudo-random digits in `0..10`.
    fn digits(seed: u64, width: usize, height: usize) -> Grid<u64> {
        let mut state = seed;
        let values = (0..width * height)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                (state >> 33) % 10
            })
            .collect();
        Grid::from_vec(width, height, values).unwrap()
    }

    /// Cheapest cost over every simple path, found by exhaustive search.
    fn brute_force(grid: &Grid<u64>, from: Position, to: Position) -> Option<u64> {
        fn walk(
            grid: &Grid<u64>,
            at: Position,
            to: Position,
            visited: &mut Grid<bool>,
            spent: u64,
            best: &mut Option<u64>,
        ) {
            if at == to {
                *best = Some(best.map_or(spent, |best| best.min(spent)));
                return;
            }
            for next in grid.neighbours(Neighbourhood::Orthogonal, at.x, at.y) {
                if visited[next] || grid[next] == WALL {
                    continue;
                }
                visited[next] = true;
                walk(grid, next, to, visited, spent + grid[next], best);
                visited[next] = false;
            }
        }

        let mut visited = Grid::new(grid.width(), grid.height());
        visited[from] = true;
        let mut best = None;
        walk(grid, from, to, &mut visited, 0, &mut best);
        best
    }

    #[rstest]
    #[case("116\n138\n213", 7)]
    #[case(SAMPLE, 40)]
    #[case("5", 0)]
    #[case("19", 9)]
    fn solves_known_grids(#[case] input: &str, #[case] expected: u64) {
        let grid = Grid::parse_digits(input).unwrap();
        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(solver.solve(), Ok(expected));
        assert_eq!(solver.state(), State::Solved(expected));
    }

    #[test]
    fn solves_expanded_sample() {
        let grid = Grid::parse_digits(SAMPLE).unwrap().expand(5).unwrap();
        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(solver.target(), Position::new(49, 49));
        assert_eq!(solver.solve(), Ok(315));
    }

    #[rstest]
    fn matches_brute_force(
        #[values(1, 2, 3, 4, 5, 6, 7, 8)] seed: u64,
        #[values((3, 3), (4, 3), (4, 4))] size: (usize, usize),
    ) {
        let (width, height) = size;
        let grid = digits(seed, width, height);
        let target = Position::new(width - 1, height - 1);
        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(
            solver.solve().ok(),
            brute_force(&grid, Position::default(), target)
        );
    }

    #[rstest]
    #[case(Position::new(3, 3), Position::new(0, 0))]
    #[case(Position::new(1, 2), Position::new(3, 0))]
    #[case(Position::new(2, 2), Position::new(2, 2))]
    fn custom_endpoints_match_brute_force(#[case] from: Position, #[case] to: Position) {
        let grid = digits(42, 4, 4);
        let mut solver = Solver::with_endpoints(&grid, from, to).unwrap();
        assert_eq!(solver.solve().ok(), brute_force(&grid, from, to));
    }

    #[test]
    fn finalized_distances_never_change() {
        let grid = digits(7, 6, 5);
        let mut solver = Solver::new(&grid).unwrap();
        let mut finalized: Vec<(Position, u64)> = Vec::new();

        loop {
            let step = solver.step();
            for &(position, distance) in &finalized {
                assert!(solver.is_finalized(position));
                assert_eq!(solver.distance(position), Some(distance));
            }
            match step {
                Step::Finalized { position, distance } => {
                    if let Some(&(_, previous)) = finalized.last() {
                        assert!(distance >= previous, "finalized out of order");
                    }
                    finalized.push((position, distance));
                }
                Step::Solved(_) => break,
                Step::Exhausted => panic!("dense grid must be connected"),
            }
        }
    }

    #[test]
    fn stops_once_target_is_finalized() {
        // the right-hand column is expensive enough that nothing there needs exploring
        let grid = Grid::parse_digits("119\n119\n119").unwrap();
        let mut solver = Solver::with_endpoints(&grid, Position::new(0, 0), Position::new(1, 2))
            .unwrap();
        assert_eq!(solver.solve(), Ok(3));
        assert!(!solver.is_finalized(Position::new(2, 0)));
        assert!(!solver.is_finalized(Position::new(2, 2)));
    }

    #[test]
    fn path_follows_predecessors() {
        let grid = Grid::parse_digits(SAMPLE).unwrap();
        let mut solver = Solver::new(&grid).unwrap();
        let Solution { cost, path } = solver.solve_path().unwrap();

        assert_eq!(cost, 40);
        assert_eq!(path.first(), Some(&Position::new(0, 0)));
        assert_eq!(path.last(), Some(&Position::new(9, 9)));
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert_eq!(a.x.abs_diff(b.x) + a.y.abs_diff(b.y), 1, "{a} -> {b}");
        }
        let charged: u64 = path[1..].iter().map(|&p| u64::from(grid[p])).sum();
        assert_eq!(charged, cost);
    }

    #[test]
    fn zero_costs() {
        let grid = Grid::<u8>::new(4, 4);
        let mut solver = Solver::new(&grid).unwrap();
        let solution = solver.solve_path().unwrap();
        assert_eq!(solution.cost, 0);
        assert_eq!(solution.path.first(), Some(&Position::new(0, 0)));
        assert_eq!(solution.path.last(), Some(&Position::new(3, 3)));
    }

    #[test]
    fn walled_off_target_is_unreachable() {
        let mut grid = Grid::from_rows([[1, 1, 1], [1, 1, 1], [1, 1, 1]]).unwrap();
        grid.set(1, 2, WALL).unwrap();
        grid.set(2, 1, WALL).unwrap();

        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(
            solver.solve(),
            Err(Error::Unreachable {
                from: Position::new(0, 0),
                to: Position::new(2, 2),
            })
        );
        assert_eq!(solver.state(), State::Exhausted);
        assert_eq!(solver.distance(Position::new(2, 2)), None);
        assert_eq!(solver.step(), Step::Exhausted);
    }

    #[test]
    fn walls_are_routed_around() {
        let grid = Grid::from_rows([
            [1, WALL, 1, 1],
            [1, WALL, 1, WALL],
            [1, 1, 1, 1],
        ])
        .unwrap();
        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(solver.solve(), Ok(5));
        assert_eq!(
            solver.solve().ok(),
            brute_force(&grid, Position::new(0, 0), Position::new(3, 2))
        );
    }

    #[test]
    fn repeated_solves_agree() {
        let grid = Grid::parse_digits(SAMPLE).unwrap();
        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(solver.solve(), Ok(40));
        assert_eq!(solver.solve(), Ok(40));

        solver.reset();
        assert_eq!(solver.state(), State::Initialized);
        assert_eq!(solver.distance(Position::new(9, 9)), None);
        assert_eq!(solver.distance(Position::new(0, 0)), Some(0));
        assert_eq!(solver.solve(), Ok(40));
    }

    #[test]
    fn empty_grid_is_rejected() {
        let grid = Grid::<u8>::new(0, 0);
        assert_eq!(Solver::new(&grid).unwrap_err(), Error::EmptyGrid);
    }

    #[test]
    fn endpoints_must_be_in_bounds() {
        let grid = Grid::<u8>::new(3, 2);
        let err = Solver::with_endpoints(&grid, Position::new(0, 0), Position::new(3, 1))
            .unwrap_err();
        assert_eq!(
            err,
            Error::OutOfBounds {
                position: Position::new(3, 1),
                width: 3,
                height: 2,
            }
        );
    }

    #[test]
    fn step_reports_progress() {
        let grid = Grid::parse_digits("12\n34").unwrap();
        let mut solver = Solver::new(&grid).unwrap();
        assert_eq!(solver.state(), State::Initialized);
        assert_eq!(
            solver.step(),
            Step::Finalized {
                position: Position::new(0, 0),
                distance: 0
            }
        );
        assert_eq!(solver.state(), State::Running);
        assert_eq!(
            solver.step(),
            Step::Finalized {
                position: Position::new(1, 0),
                distance: 2
            }
        );
        assert_eq!(
            solver.step(),
            Step::Finalized {
                position: Position::new(0, 1),
                distance: 3
            }
        );
        assert_eq!(solver.step(), Step::Solved(6));
        assert_eq!(solver.step(), Step::Solved(6));
    }
}
