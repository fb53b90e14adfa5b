use crate::executor::ExecutorConfig;
use crate::rect::{GridPolicy, Rect};

/// Tunables of the engine. Every field has a default, so partial files are fine.
#[derive(serde::Serialize, serde::Deserialize, Clone, PartialEq, Eq, Debug)]
#[serde(default)]
pub struct EngineConfig {
    /// Stroke worker threads. 0 to use the available parallelism.
    pub worker_threads: usize,
    /// Side of the grid cells that dirty regions are snapped to.
    pub grid_cell_size: i32,
    /// Longest side of a UI patch, in grid cells.
    pub max_patch_cells: i32,
    pub canvas_width: i32,
    pub canvas_height: i32,
}
impl Default for EngineConfig {
    fn default() -> Self {
        let grid = GridPolicy::default();
        Self {
            worker_threads: 0,
            grid_cell_size: grid.cell_size,
            max_patch_cells: grid.max_patch_cells,
            canvas_width: 1080,
            canvas_height: 1080,
        }
    }
}
impl EngineConfig {
    #[must_use]
    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            worker_threads: self.worker_threads,
        }
    }
    /// Nonsense values are clamped to 1.
    #[must_use]
    pub fn grid_policy(&self) -> GridPolicy {
        GridPolicy {
            cell_size: self.grid_cell_size.max(1),
            max_patch_cells: self.max_patch_cells.max(1),
        }
    }
    #[must_use]
    pub fn canvas_bounds(&self) -> Rect {
        Rect::new(0, 0, self.canvas_width.max(0), self.canvas_height.max(0))
    }
}

#[cfg(test)]
mod test {
    use super::EngineConfig;

    #[test]
    fn clamps_policy() {
        let config = EngineConfig {
            grid_cell_size: 0,
            max_patch_cells: -3,
            ..EngineConfig::default()
        };
        let policy = config.grid_policy();
        assert_eq!(policy.cell_size, 1);
        assert_eq!(policy.max_patch_cells, 1);
    }
    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.grid_cell_size, 64);
        assert_eq!(config.max_patch_cells, 4);
        assert_eq!(config.executor().worker_threads, 0);
        assert_eq!(config.canvas_bounds().area(), 1080 * 1080);
    }
}
