use crate::domain::{AdvantgError, Axis, Directive, InputErrorKind, ResolveResult};
use serde::Serialize;

/// Coarse boundaries for one axis with the number of fine cells per coarse
/// interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisMesh {
    pub axis: Axis,
    pub boundaries: Vec<f64>,
    pub intervals: Vec<u32>,
}

impl AxisMesh {
    /// Pairs boundaries with interval counts.
    ///
    /// Boundaries must be strictly increasing and there must be exactly one
    /// positive count per coarse interval.
    pub fn new(axis: Axis, boundaries: Vec<f64>, intervals: &[i64]) -> ResolveResult<Self> {
        if boundaries.len() < 2 {
            return Err(mesh_error(
                axis,
                format!("needs at least 2 boundaries, got {}", boundaries.len()),
            ));
        }

        if let Some(index) = boundaries.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(mesh_error(
                axis,
                format!(
                    "boundaries must be strictly increasing: {} is followed by {} at position {}",
                    boundaries[index],
                    boundaries[index + 1],
                    index + 2
                ),
            ));
        }

        let expected = boundaries.len() - 1;
        if intervals.len() != expected {
            return Err(mesh_error(
                axis,
                format!(
                    "{} boundaries need {} interval counts, got {}",
                    boundaries.len(),
                    expected,
                    intervals.len()
                ),
            ));
        }

        let intervals = intervals
            .iter()
            .map(|&count| {
                u32::try_from(count)
                    .ok()
                    .filter(|count| *count > 0)
                    .ok_or_else(|| {
                        mesh_error(
                            axis,
                            format!("interval counts must be positive integers, got {count}"),
                        )
                    })
            })
            .collect::<ResolveResult<Vec<_>>>()?;

        Ok(Self {
            axis,
            boundaries,
            intervals,
        })
    }

    pub fn cell_count(&self) -> u64 {
        self.intervals
            .iter()
            .fold(0_u64, |total, &count| total.saturating_add(u64::from(count)))
    }

    pub fn lower(&self) -> f64 {
        self.boundaries[0]
    }

    pub fn upper(&self) -> f64 {
        self.boundaries[self.boundaries.len() - 1]
    }

    pub fn extent(&self) -> f64 {
        self.upper() - self.lower()
    }

    /// Fine-mesh edges: every coarse interval split uniformly.
    pub fn fine_edges(&self) -> Vec<f64> {
        let capacity = usize::try_from(self.cell_count())
            .ok()
            .and_then(|cells| cells.checked_add(1))
            .unwrap_or(usize::MAX);
        let mut edges = Vec::with_capacity(capacity);
        edges.push(self.lower());
        for (pair, &count) in self.boundaries.windows(2).zip(&self.intervals) {
            let width = (pair[1] - pair[0]) / f64::from(count);
            for step in 1..count {
                edges.push(pair[0] + width * f64::from(step));
            }
            edges.push(pair[1]);
        }
        edges
    }

    /// Smallest and largest fine cell width.
    pub fn cell_width_range(&self) -> (f64, f64) {
        self.boundaries
            .windows(2)
            .zip(&self.intervals)
            .map(|(pair, &count)| (pair[1] - pair[0]) / f64::from(count))
            .fold((f64::INFINITY, 0.0_f64), |(min, max), width| {
                (min.min(width), max.max(width))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeshGrid {
    pub x: AxisMesh,
    pub y: AxisMesh,
    pub z: AxisMesh,
}

impl MeshGrid {
    pub fn axes(&self) -> [&AxisMesh; 3] {
        [&self.x, &self.y, &self.z]
    }

    pub fn axis(&self, axis: Axis) -> &AxisMesh {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    /// `None` when the product of the axis counts does not fit in `u64`.
    pub fn checked_cell_count(&self) -> Option<u64> {
        self.axes()
            .iter()
            .try_fold(1_u64, |total, mesh| total.checked_mul(mesh.cell_count()))
    }

    /// Saturates at `u64::MAX`; grids from `build_mesh_grid` always fit.
    pub fn cell_count(&self) -> u64 {
        self.checked_cell_count().unwrap_or(u64::MAX)
    }
}

/// Assembles the grid from validated `mesh_*` / `mesh_*_ints` directives.
pub fn build_mesh_grid(directives: &[Directive]) -> ResolveResult<MeshGrid> {
    let find = |key: &str| directives.iter().find(|directive| directive.key == key);

    let mut axes = Vec::with_capacity(3);
    for axis in Axis::ALL {
        let boundaries = find(axis.boundaries_key());
        let intervals = find(axis.intervals_key());
        let (boundaries, intervals) = match (boundaries, intervals) {
            (Some(boundaries), Some(intervals)) => (boundaries, intervals),
            (Some(boundaries), None) => {
                return Err(AdvantgError::at_line(
                    InputErrorKind::MeshConsistency,
                    boundaries.source_line,
                    format!(
                        "'{}' is given without '{}'",
                        axis.boundaries_key(),
                        axis.intervals_key()
                    ),
                ));
            }
            (None, Some(intervals)) => {
                return Err(AdvantgError::at_line(
                    InputErrorKind::MeshConsistency,
                    intervals.source_line,
                    format!(
                        "'{}' is given without '{}'",
                        axis.intervals_key(),
                        axis.boundaries_key()
                    ),
                ));
            }
            (None, None) => {
                return Err(AdvantgError::input(
                    InputErrorKind::MissingRequired,
                    format!("missing required directive '{}'", axis.boundaries_key()),
                ));
            }
        };

        let (Some(boundary_values), Some(interval_values)) = (
            boundaries.value.as_real_list(),
            intervals.value.as_integer_list(),
        ) else {
            return Err(AdvantgError::internal(
                "SYS.MESH_DIRECTIVE_KIND",
                format!("mesh directives for axis {axis} were not validated as numeric lists"),
            ));
        };

        let mesh = AxisMesh::new(axis, boundary_values.to_vec(), interval_values).map_err(
            |error| {
                AdvantgError::at_line(
                    InputErrorKind::MeshConsistency,
                    boundaries.source_line,
                    error.message(),
                )
            },
        )?;
        axes.push(mesh);
    }

    let mut axes = axes.into_iter();
    let grid = match (axes.next(), axes.next(), axes.next()) {
        (Some(x), Some(y), Some(z)) => MeshGrid { x, y, z },
        _ => {
            return Err(AdvantgError::internal(
                "SYS.MESH_AXES",
                "mesh grid requires exactly three axes",
            ));
        }
    };

    if grid.checked_cell_count().is_none() {
        let counts: Vec<String> = grid
            .axes()
            .iter()
            .map(|mesh| mesh.cell_count().to_string())
            .collect();
        return Err(AdvantgError::input(
            InputErrorKind::MeshConsistency,
            format!(
                "mesh grid of {} cells overflows the cell count",
                counts.join(" x ")
            ),
        ));
    }

    Ok(grid)
}

fn mesh_error(axis: Axis, detail: String) -> AdvantgError {
    AdvantgError::input(
        InputErrorKind::MeshConsistency,
        format!("mesh axis {axis}: {detail}"),
    )
}

#[cfg(test)]
mod tests {
    use super::{AxisMesh, build_mesh_grid};
    use crate::domain::{Axis, Directive, DirectiveValue, InputErrorKind};

    #[test]
    fn accepts_aligned_mesh() {
        let mesh = AxisMesh::new(
            Axis::X,
            vec![-20.0, -13.0, -1.0, 1.0, 8.0, 20.0],
            &[5, 5, 15, 5, 5],
        )
        .expect("aligned mesh should build");

        assert_eq!(mesh.cell_count(), 35);
        assert_eq!(mesh.extent(), 40.0);
        assert_eq!(mesh.intervals, vec![5, 5, 15, 5, 5]);
    }

    #[test]
    fn rejects_misaligned_interval_counts() {
        let error = AxisMesh::new(Axis::Y, vec![0.0, 5.0, 12.0], &[5, 5, 15])
            .expect_err("3 boundaries with 3 counts should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
        assert_eq!(
            error.message(),
            "mesh axis y: 3 boundaries need 2 interval counts, got 3"
        );

        let error = AxisMesh::new(Axis::Y, vec![0.0, 5.0, 12.0, 20.0], &[5, 5])
            .expect_err("too few counts should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
    }

    #[test]
    fn four_boundaries_pair_with_three_counts() {
        let mesh = AxisMesh::new(Axis::Z, vec![0.0, 5.0, 12.0, 20.0], &[5, 5, 15])
            .expect("4 boundaries with 3 counts should build");
        assert_eq!(mesh.cell_count(), 25);
    }

    #[test]
    fn rejects_non_monotonic_boundaries() {
        let error = AxisMesh::new(Axis::X, vec![0.0, 5.0, 5.0, 8.0], &[1, 1, 1])
            .expect_err("repeated boundary should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
        assert!(error.message().contains("strictly increasing"));

        let error = AxisMesh::new(Axis::X, vec![0.0, -1.0], &[1])
            .expect_err("decreasing boundary should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
    }

    #[test]
    fn rejects_non_positive_counts() {
        let error = AxisMesh::new(Axis::X, vec![0.0, 1.0, 2.0], &[3, 0])
            .expect_err("zero count should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));

        let error = AxisMesh::new(Axis::X, vec![0.0, 1.0], &[-2])
            .expect_err("negative count should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
    }

    #[test]
    fn fine_edges_split_each_interval() {
        let mesh = AxisMesh::new(Axis::X, vec![0.0, 4.0, 10.0], &[2, 3])
            .expect("mesh should build");
        assert_eq!(mesh.fine_edges(), vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]);
        assert_eq!(mesh.cell_width_range(), (2.0, 2.0));

        let mesh = AxisMesh::new(Axis::X, vec![-1.0, 1.0, 9.0], &[4, 2])
            .expect("mesh should build");
        assert_eq!(mesh.fine_edges().len() as u64, mesh.cell_count() + 1);
        assert_eq!(mesh.cell_width_range(), (0.5, 4.0));
    }

    fn directive(key: &str, value: DirectiveValue) -> Directive {
        Directive {
            key: key.to_string(),
            value,
            source_line: 3,
        }
    }

    fn grid_directives() -> Vec<Directive> {
        vec![
            directive("mesh_x", DirectiveValue::RealList(vec![0.0, 1.0, 2.0])),
            directive("mesh_x_ints", DirectiveValue::IntegerList(vec![2, 3])),
            directive("mesh_y", DirectiveValue::RealList(vec![0.0, 4.0])),
            directive("mesh_y_ints", DirectiveValue::IntegerList(vec![4])),
            directive("mesh_z", DirectiveValue::RealList(vec![-1.0, 1.0])),
            directive("mesh_z_ints", DirectiveValue::IntegerList(vec![10])),
        ]
    }

    #[test]
    fn grid_cell_count_is_product_of_axes() {
        let grid = build_mesh_grid(&grid_directives()).expect("grid should build");
        assert_eq!(grid.x.cell_count(), 5);
        assert_eq!(grid.cell_count(), 5 * 4 * 10);
    }

    #[test]
    fn boundaries_without_counts_are_inconsistent() {
        let mut directives = grid_directives();
        directives.retain(|directive| directive.key != "mesh_y_ints");
        let error = build_mesh_grid(&directives).expect_err("missing counts should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
        assert_eq!(
            error.message(),
            "line 3: 'mesh_y' is given without 'mesh_y_ints'"
        );
    }

    #[test]
    fn oversized_grid_is_rejected_instead_of_overflowing() {
        let huge = 4_000_000_000_i64;
        let mut directives = grid_directives();
        for axis in Axis::ALL {
            directives.retain(|directive| {
                directive.key != axis.boundaries_key() && directive.key != axis.intervals_key()
            });
            directives.push(directive(
                axis.boundaries_key(),
                DirectiveValue::RealList(vec![0.0, 1.0]),
            ));
            directives.push(directive(
                axis.intervals_key(),
                DirectiveValue::IntegerList(vec![huge]),
            ));
        }

        let error = build_mesh_grid(&directives).expect_err("overflowing grid should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
        assert_eq!(
            error.message(),
            "mesh grid of 4000000000 x 4000000000 x 4000000000 cells overflows the cell count"
        );
    }

    #[test]
    fn large_axis_counts_within_range_are_accepted() {
        let mesh = AxisMesh::new(Axis::X, vec![0.0, 1.0, 2.0], &[u32::MAX.into(), 1])
            .expect("counts up to u32::MAX are valid");
        assert_eq!(mesh.cell_count(), u64::from(u32::MAX) + 1);
    }

    #[test]
    fn grid_errors_point_at_boundary_line() {
        let mut directives = grid_directives();
        directives[1] = directive("mesh_x_ints", DirectiveValue::IntegerList(vec![2]));
        let error = build_mesh_grid(&directives).expect_err("misaligned axis should fail");
        assert_eq!(error.kind(), Some(InputErrorKind::MeshConsistency));
        assert_eq!(
            error.message(),
            "line 3: mesh axis x: 3 boundaries need 2 interval counts, got 1"
        );
    }
}
