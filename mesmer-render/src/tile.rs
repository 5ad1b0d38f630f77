use crate::error::RenderError;
use crate::gpu::Rect;
use crate::Result;

/// Default pre-render tile edge in pixels. Small enough that one tile
/// finishes well inside a driver watchdog window at high iteration counts.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// A square-ish region of a pre-render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Grid column, fed to the shader as `u_tile.x`.
    pub col: u32,
    /// Grid row, fed to the shader as `u_tile.y`.
    pub row: u32,
    /// Pixel x of the corner nearest the origin.
    pub x: u32,
    /// Pixel y of the corner nearest the origin.
    pub y: u32,
    /// Tile width in pixels (may be smaller in the last column).
    pub width: u32,
    /// Tile height in pixels (may be smaller in the last row).
    pub height: u32,
}

impl Tile {
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

/// Split a `resolution`×`resolution` target into row-major tiles.
///
/// Produces `ceil(R/T)²` tiles; edge tiles are clamped when `R` is not a
/// multiple of `T`.
pub fn build_tile_grid(resolution: u32, tile_size: u32) -> Result<Vec<Tile>> {
    if tile_size == 0 {
        return Err(RenderError::InvalidTileSize(tile_size));
    }
    let mut tiles = Vec::new();
    let mut y = 0;
    let mut row = 0;
    while y < resolution {
        let th = tile_size.min(resolution - y);
        let mut x = 0;
        let mut col = 0;
        while x < resolution {
            let tw = tile_size.min(resolution - x);
            tiles.push(Tile {
                col,
                row,
                x,
                y,
                width: tw,
                height: th,
            });
            x += tw;
            col += 1;
        }
        y += th;
        row += 1;
    }
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(tiles: &[Tile], resolution: u32) {
        let r = resolution as usize;
        let mut covered = vec![false; r * r];
        for tile in tiles {
            for py in tile.y..tile.y + tile.height {
                for px in tile.x..tile.x + tile.width {
                    let idx = py as usize * r + px as usize;
                    assert!(!covered[idx], "pixel ({px}, {py}) covered twice");
                    covered[idx] = true;
                }
            }
        }
        assert!(covered.iter().all(|&c| c), "all pixels must be covered");
    }

    #[test]
    fn divisible_resolution_gives_square_count() {
        let tiles = build_tile_grid(1024, 256).unwrap();
        assert_eq!(tiles.len(), 16);
        assert!(tiles.iter().all(|t| t.width == 256 && t.height == 256));
        assert_exact_cover(&tiles, 1024);
    }

    #[test]
    fn edge_tiles_are_clamped() {
        let tiles = build_tile_grid(200, 64).unwrap();
        assert_eq!(tiles.len(), 16);
        let last = tiles.last().unwrap();
        assert_eq!((last.col, last.row), (3, 3));
        assert_eq!((last.width, last.height), (200 - 192, 200 - 192));
        assert_exact_cover(&tiles, 200);
    }

    #[test]
    fn grid_is_row_major() {
        let tiles = build_tile_grid(128, 64).unwrap();
        let coords: Vec<_> = tiles.iter().map(|t| (t.col, t.row)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn tile_larger_than_target_is_single_tile() {
        let tiles = build_tile_grid(100, 256).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].rect(), Rect::full(100, 100));
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(matches!(
            build_tile_grid(512, 0),
            Err(RenderError::InvalidTileSize(0))
        ));
    }
}
