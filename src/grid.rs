use std::{
    fmt,
    ops::{Index, IndexMut},
    str::FromStr,
};

/// Tiled values wrap back to 1 once they would exceed this.
const WRAP_ABOVE: u128 = 9;

/// A single addressable cell of a [`Grid`].
///
/// `(0, 0)` is the top left corner; `x` grows to the right and `y` grows downwards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl From<(usize, usize)> for Position {
    fn from((x, y): (usize, usize)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Which cells count as adjacent when enumerating neighbours.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Neighbourhood {
    /// North, east, south and west.
    #[default]
    Orthogonal,
    /// The orthogonal neighbours plus the four diagonals.
    Diagonal,
}

const ORTHOGONAL: [(isize, isize); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const DIAGONAL: [(isize, isize); 4] = [(1, -1), (1, 1), (-1, 1), (-1, -1)];

impl Neighbourhood {
    fn offsets(self) -> impl Iterator<Item = (isize, isize)> {
        let diagonals: &'static [(isize, isize)] = match self {
            Neighbourhood::Orthogonal => &[],
            Neighbourhood::Diagonal => &DIAGONAL,
        };
        ORTHOGONAL.iter().chain(diagonals).copied()
    }
}

/// Integer cell values which can be charged as path costs, incremented and tiled.
pub trait Cost: Copy + Ord + fmt::Debug {
    /// Widen the value for distance arithmetic.
    fn as_u64(self) -> u64;

    /// The value one higher than this one, or `None` if that does not fit.
    fn increment(self) -> Option<Self>;

    /// Add the tile offset, then wrap anything above 9 back into `1..=9`.
    fn tiled(self, offset: usize) -> Self;
}

macro_rules! impl_cost {
    ($($t:ty),*) => {
        $(
            impl Cost for $t {
                fn as_u64(self) -> u64 {
                    self as u64
                }

                fn increment(self) -> Option<Self> {
                    self.checked_add(1)
                }

                fn tiled(self, offset: usize) -> Self {
                    // widened so the largest cell value plus any offset cannot overflow
                    let value = self as u128 + offset as u128;
                    if value > WRAP_ABOVE {
                        // same result as subtracting 9 until the value is at most 9
                        ((value - 1) % WRAP_ABOVE + 1) as $t
                    } else {
                        value as $t
                    }
                }
            }
        )*
    };
}

impl_cost!(u8, u16, u32, u64, usize);

/// A dense representation of a 2d grid, stored in row-major order.
///
/// For indexing operations on this grid, `(0, 0)` is the top left corner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    width: usize,
    height: usize,
    values: Vec<T>,
}

impl<T> Grid<T>
where
    T: Default + Clone,
{
    /// Create a `width` by `height` grid with every cell set to its default value.
    pub fn new(width: usize, height: usize) -> Self {
        Grid {
            width,
            height,
            values: vec![T::default(); width * height],
        }
    }
}

impl<T> Grid<T> {
    /// Wrap a row-major vector of values.
    pub fn from_vec(width: usize, height: usize, values: Vec<T>) -> Result<Self, Error> {
        if values.len() != width * height {
            return Err(Error::Dimensions {
                width,
                height,
                len: values.len(),
            });
        }
        Ok(Grid {
            width,
            height,
            values,
        })
    }

    /// Build a grid from an iterable of rows.
    ///
    /// The first row determines the width; every later row must match it.
    pub fn from_rows<Rows, Row>(rows: Rows) -> Result<Self, Error>
    where
        Rows: IntoIterator<Item = Row>,
        Row: IntoIterator<Item = T>,
    {
        let mut values = Vec::new();
        let mut width = None;
        let mut height = 0;

        for (row, items) in rows.into_iter().enumerate() {
            let before = values.len();
            values.extend(items);
            let found = values.len() - before;

            let expected = *width.get_or_insert(found);
            if found != expected {
                return Err(Error::RaggedRow {
                    row,
                    expected,
                    found,
                });
            }
            height += 1;
        }

        match width {
            Some(width) if width > 0 => Ok(Grid {
                width,
                height,
                values,
            }),
            _ => Err(Error::Empty),
        }
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }

    /// `(rows, columns)`
    pub fn dimensions(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `true` when the point lies within the grid.
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.height
    }

    /// Get the internal index where the desired value is stored,
    /// or `None` if it is out of bounds.
    pub fn idx(&self, x: usize, y: usize) -> Option<usize> {
        self.contains(x, y).then_some((y * self.width) + x)
    }

    /// Inverse of [`idx`][Self::idx].
    pub(crate) fn position(&self, idx: usize) -> Position {
        Position {
            x: idx % self.width,
            y: idx / self.width,
        }
    }

    fn check_bounds(&self, x: usize, y: usize) -> Result<usize, Error> {
        self.idx(x, y).ok_or(Error::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        self.idx(x, y).map(|idx| &self.values[idx])
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        self.idx(x, y).map(|idx| &mut self.values[idx])
    }

    /// Overwrite the value at the given coordinates, or `Error::OutOfBounds` if there is no such cell.
    pub fn set(&mut self, x: usize, y: usize, value: T) -> Result<(), Error> {
        let idx = self.check_bounds(x, y)?;
        self.values[idx] = value;
        Ok(())
    }

    /// The cells in row-major order; `as_slice()[idx]` is the cell at [`position(idx)`][Self::position].
    pub fn as_slice(&self) -> &[T] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.values
    }

    /// Build a grid of the same shape by transforming every value.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            width: self.width,
            height: self.height,
            values: self.values.iter().map(f).collect(),
        }
    }

    /// Iterate over every cell in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &T)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(idx, value)| (self.position(idx), value))
    }

    /// Visit every cell in row-major order.
    pub fn for_each(&self, mut visit: impl FnMut(usize, usize, &T)) {
        for (Position { x, y }, value) in self.iter() {
            visit(x, y, value);
        }
    }

    /// Iterate over the in-bounds neighbours of `(x, y)`.
    ///
    /// Neighbours which would fall outside the grid are silently skipped.
    pub fn neighbours(
        &self,
        neighbourhood: Neighbourhood,
        x: usize,
        y: usize,
    ) -> impl Iterator<Item = Position> + '_ {
        neighbourhood.offsets().filter_map(move |(dx, dy)| {
            let nx = x.checked_add_signed(dx)?;
            let ny = y.checked_add_signed(dy)?;
            self.contains(nx, ny).then_some(Position::new(nx, ny))
        })
    }

    pub fn for_each_neighbour(
        &self,
        neighbourhood: Neighbourhood,
        x: usize,
        y: usize,
        mut visit: impl FnMut(usize, usize),
    ) {
        for Position { x, y } in self.neighbours(neighbourhood, x, y) {
            visit(x, y);
        }
    }
}

impl<T> Grid<T>
where
    T: Cost,
{
    /// Increment the value at the given coordinates.
    pub fn increment(&mut self, x: usize, y: usize) -> Result<(), Error> {
        let idx = self.check_bounds(x, y)?;
        self.values[idx] = self.values[idx]
            .increment()
            .ok_or(Error::Overflow { x, y })?;
        Ok(())
    }

    /// Increment every value, or leave the grid untouched if any of them would overflow.
    pub fn increment_all(&mut self) -> Result<(), Error> {
        if let Some(idx) = self.values.iter().position(|v| v.increment().is_none()) {
            let Position { x, y } = self.position(idx);
            return Err(Error::Overflow { x, y });
        }
        for value in self.values.iter_mut() {
            if let Some(next) = value.increment() {
                *value = next;
            }
        }
        Ok(())
    }

    /// Tile this grid `repeat` times along each axis.
    ///
    /// The tile at offset `(i, j)` holds the original values plus `i + j`,
    /// wrapped so that anything above 9 starts again from 1.
    pub fn expand(&self, repeat: usize) -> Result<Self, Error> {
        if repeat == 0 {
            return Err(Error::ZeroRepeat);
        }

        let width = self.width * repeat;
        let height = self.height * repeat;
        let mut values = Vec::with_capacity(width * height);
        for y in 0..height {
            let (tile_y, src_y) = (y / self.height, y % self.height);
            for x in 0..width {
                let (tile_x, src_x) = (x / self.width, x % self.width);
                values.push(self[(src_x, src_y)].tiled(tile_x + tile_y));
            }
        }

        log::debug!(
            "expanded {}x{} grid {repeat} times to {width}x{height}",
            self.width,
            self.height
        );
        Ok(Grid {
            width,
            height,
            values,
        })
    }
}

impl Grid<u8> {
    /// Parse a block of decimal digits, one row per line.
    ///
    /// Blank lines before and after the block are ignored, as is whitespace around each row.
    /// Error coordinates refer to the line and column of the input text.
    pub fn parse_digits(text: &str) -> Result<Self, Error> {
        let lines: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .skip_while(|(_, line)| line.trim().is_empty())
            .collect();
        let end = lines
            .iter()
            .rposition(|(_, line)| !line.trim().is_empty())
            .map_or(0, |last| last + 1);

        let mut rows = Vec::new();
        for &(y, line) in &lines[..end] {
            let indent = line.chars().take_while(|c| c.is_whitespace()).count();
            let row = line
                .trim()
                .chars()
                .enumerate()
                .map(|(x, found)| match found.to_digit(10) {
                    Some(digit) => Ok(digit as u8),
                    None => Err(Error::InvalidDigit {
                        x: indent + x,
                        y,
                        found,
                    }),
                })
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(row);
        }
        Self::from_rows(rows)
    }
}

impl FromStr for Grid<u8> {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_digits(s)
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        let (width, height) = (self.width, self.height);
        self.get(x, y).unwrap_or_else(|| {
            panic!("the point `({x}, {y})` is out of bounds of a {width}x{height} grid")
        })
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        let (width, height) = (self.width, self.height);
        self.get_mut(x, y).unwrap_or_else(|| {
            panic!("the point `({x}, {y})` is out of bounds of a {width}x{height} grid")
        })
    }
}

impl<T> Index<Position> for Grid<T> {
    type Output = T;

    fn index(&self, position: Position) -> &Self::Output {
        &self[(position.x, position.y)]
    }
}

impl<T> IndexMut<Position> for Grid<T> {
    fn index_mut(&mut self, position: Position) -> &mut Self::Output {
        &mut self[(position.x, position.y)]
    }
}

impl<T> fmt::Display for Grid<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.values.chunks(self.width.max(1)) {
            for value in row {
                write!(f, "{value}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("the point `({x}, {y})` is out of bounds. size: `{width}x{height}`")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
    #[error("row {row} has {found} cells but the grid is {expected} wide")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("found {found:?} at `({x}, {y})` where a digit was expected")]
    InvalidDigit { x: usize, y: usize, found: char },
    #[error("a `{width}x{height}` grid cannot hold {len} values")]
    Dimensions {
        width: usize,
        height: usize,
        len: usize,
    },
    #[error("the grid has no cells")]
    Empty,
    #[error("a grid must be repeated at least once")]
    ZeroRepeat,
    #[error("incrementing the value at `({x}, {y})` would overflow")]
    Overflow { x: usize, y: usize },
}
