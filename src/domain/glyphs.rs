/// Bitmap masks drawn into the height field: a 3×6 digit font for the clock
/// and the ASCII-art castle.

pub const DIGIT_W: usize = 3;
pub const DIGIT_H: usize = 6;

/// Rows top to bottom, `#` = lit.
const DIGITS: [[&str; DIGIT_H]; 10] = [
    ["###", "#.#", "#.#", "#.#", "#.#", "###"],
    [".#.", "##.", ".#.", ".#.", ".#.", "###"],
    ["###", "..#", "..#", "###", "#..", "###"],
    ["###", "..#", ".##", "..#", "..#", "###"],
    ["#.#", "#.#", "#.#", "###", "..#", "..#"],
    ["###", "#..", "###", "..#", "..#", "###"],
    ["###", "#..", "###", "#.#", "#.#", "###"],
    ["###", "..#", "..#", ".#.", ".#.", ".#."],
    ["###", "#.#", "###", "#.#", "#.#", "###"],
    ["###", "#.#", "###", "..#", "..#", "###"],
];

/// Is pixel (x, y) of digit `d` lit? Out-of-range anything is dark.
pub fn digit_pixel(d: u8, x: usize, y: usize) -> bool {
    if d > 9 || x >= DIGIT_W || y >= DIGIT_H {
        return false;
    }
    DIGITS[d as usize][y].as_bytes()[x] == b'#'
}

/// Lit cells of a `HH:MM` readout. Columns: digits at 0, 4, 8, 12 and a
/// two-dot colon in column 7, 15 columns in all.
pub fn clock_cells(hours: u32, minutes: u32, origin: (usize, usize)) -> Vec<(usize, usize)> {
    let digits = [
        ((hours / 10) % 10) as u8,
        (hours % 10) as u8,
        ((minutes / 10) % 10) as u8,
        (minutes % 10) as u8,
    ];
    let offsets = [0, 4, 8, 12];
    let mut cells = vec![];

    for (d, off) in digits.iter().zip(offsets) {
        for y in 0..DIGIT_H {
            for x in 0..DIGIT_W {
                if digit_pixel(*d, x, y) {
                    cells.push((origin.0 + off + x, origin.1 + y));
                }
            }
        }
    }
    // colon sits in column 7 between the pairs
    cells.push((origin.0 + 7, origin.1 + 1));
    cells.push((origin.0 + 7, origin.1 + 4));
    cells
}

/// The castle, 20×20, `#` = wall.
pub const CASTLE: [&str; 20] = [
    "....................",
    "....................",
    "..#.#.#......#.#.#..",
    "..#####......#####..",
    "...###........###...",
    "...###.#.#.#..###...",
    "...###.#####..###...",
    "...###..###...###...",
    "...###..###...###...",
    "...############.#...",
    "...###########.##...",
    "...###.......#.##...",
    "...###.......####...",
    "...###..###..###....",
    "...###.#...#.###....",
    "...###.#...#.###....",
    "...###.#...#.###....",
    "...##############...",
    "....................",
    "....................",
];

/// Cells lit by an ASCII mask (`#`), as (column, row).
pub fn mask_cells(rows: &[&str]) -> Vec<(usize, usize)> {
    rows.iter().enumerate()
        .flat_map(|(j, row)| {
            row.bytes().enumerate()
                .filter(|(_, b)| *b == b'#')
                .map(move |(i, _)| (i, j))
        })
        .collect()
}
