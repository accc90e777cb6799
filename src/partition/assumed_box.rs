//! Assumed partitions: box decompositions every rank can compute alone.
//!
//! An [`AssumedPartitionBox`] carves one box into a grid of near-uniform
//! partitions and assigns them to a contiguous rank interval using nothing but
//! arithmetic. Any process that knows the constructor arguments knows the
//! whole layout, so ownership questions ("who owns the region my data maps
//! to?") are answered without any communication. That makes this the anchor
//! for distributed metadata searches: a rank computes which partitions its
//! query touches, and therefore which owner ranks to contact.

use core::fmt;

use itertools::Itertools;

use crate::debug_invariants::DebugInvariants;
use crate::decomp_error::DecompError;
use crate::geometry::{IndexBox, IntVector};

/// A communication-free partitioning of a box across ranks
/// `[rank_begin, rank_end)`.
///
/// Partitions are numbered `[begin(), end())` and tile the box exactly: the
/// grid is chosen by repeatedly splitting the axis with the longest per-slot
/// extent, each partition gets `extent / grid` cells per axis, and the last
/// partition along an axis absorbs the division remainder. Rank assignment is
/// either contiguous runs (ranks differ in load by at most one partition) or
/// round-robin interleaved.
///
/// # Determinism
/// The layout is a pure function of the constructor arguments. Equal inputs
/// give bit-for-bit equal partitions on every rank, which is what lets ranks
/// agree without talking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumedPartitionBox<const D: usize> {
    box_: IndexBox<D>,
    rank_begin: usize,
    rank_end: usize,
    index_begin: usize,
    index_end: usize,
    /// Cells per partition along each axis (before remainder absorption).
    uniform_size: IntVector<D>,
    /// Number of partitions along each axis.
    grid: IntVector<D>,
    /// Axes ordered from slowest varying (fewest partitions) to fastest.
    major: [usize; D],
    /// Flattening stride per axis; the fastest axis has stride 1.
    stride: IntVector<D>,
    interleave: bool,
    /// Partitions per rank in the base group; the extra group gets one more.
    base_quota: usize,
    first_rank_with_base: usize,
    first_rank_with_zero: usize,
    first_index_of_extra: usize,
    first_index_of_base: usize,
}

impl<const D: usize> AssumedPartitionBox<D> {
    /// Partition `box_` across ranks `[rank_begin, rank_end)`.
    ///
    /// Partition numbering starts at `index_begin` (so several assumed
    /// partitions can share one id space). `parts_per_rank` scales the target
    /// partition count; `1.0` aims for one partition per rank. `interleave`
    /// selects round-robin instead of contiguous rank assignment.
    ///
    /// # Errors
    /// - [`DecompError::EmptyPartitionBox`] if `box_` has no cells.
    /// - [`DecompError::EmptyRankRange`] if `rank_begin >= rank_end`.
    /// - [`DecompError::InvalidPartsPerRank`] unless `parts_per_rank` is
    ///   finite and strictly positive.
    pub fn new(
        box_: IndexBox<D>,
        rank_begin: usize,
        rank_end: usize,
        index_begin: usize,
        parts_per_rank: f64,
        interleave: bool,
    ) -> Result<Self, DecompError> {
        let mut out = Self {
            box_: IndexBox::empty_in(box_.block()),
            rank_begin: 0,
            rank_end: 0,
            index_begin: 0,
            index_end: 0,
            uniform_size: IntVector::zero(),
            grid: IntVector::zero(),
            major: core::array::from_fn(|d| d),
            stride: IntVector::zero(),
            interleave: false,
            base_quota: 0,
            first_rank_with_base: 0,
            first_rank_with_zero: 0,
            first_index_of_extra: 0,
            first_index_of_base: 0,
        };
        out.partition(box_, rank_begin, rank_end, index_begin, parts_per_rank, interleave)?;
        Ok(out)
    }

    /// Recompute the partition in place with new parameters.
    ///
    /// On error the previous state is left untouched.
    ///
    /// # Errors
    /// Same conditions as [`AssumedPartitionBox::new`].
    pub fn partition(
        &mut self,
        box_: IndexBox<D>,
        rank_begin: usize,
        rank_end: usize,
        index_begin: usize,
        parts_per_rank: f64,
        interleave: bool,
    ) -> Result<(), DecompError> {
        if box_.is_empty() {
            return Err(DecompError::EmptyPartitionBox(box_.to_string()));
        }
        if rank_begin >= rank_end {
            return Err(DecompError::EmptyRankRange { rank_begin, rank_end });
        }
        if !parts_per_rank.is_finite() || parts_per_rank <= 0.0 {
            return Err(DecompError::InvalidPartsPerRank(parts_per_rank.to_string()));
        }

        let extents = box_.extents();
        let ranks = rank_end - rank_begin;
        // saturating float cast; the splitting loop is bounded by the cell
        // count regardless of how large the target is
        let target = ((ranks as f64) * parts_per_rank).max(1.0) as usize;

        // Grow the partition grid one split at a time, always splitting the
        // axis whose partitions are currently longest. The comparison
        // extents[a]/grid[a] > extents[b]/grid[b] is done in cross-multiplied
        // integers so the choice is exact; ties go to the lower axis.
        let mut grid = IntVector::<D>::one();
        while (grid.product() as usize) < target {
            let mut best: Option<usize> = None;
            for a in 0..D {
                if grid[a] >= extents[a] {
                    continue; // already at one cell per partition
                }
                best = match best {
                    None => Some(a),
                    Some(b) => {
                        let lhs = (extents[a] as i128) * (grid[b] as i128);
                        let rhs = (extents[b] as i128) * (grid[a] as i128);
                        if lhs > rhs { Some(a) } else { Some(b) }
                    }
                };
            }
            match best {
                Some(a) => grid[a] += 1,
                None => break, // every axis fully split
            }
        }

        let mut uniform_size = IntVector::zero();
        for d in 0..D {
            uniform_size[d] = extents[d] / grid[d];
        }

        // stable sort keeps axis order deterministic on equal counts
        let mut major: [usize; D] = core::array::from_fn(|d| d);
        major.sort_by_key(|&d| grid[d]);

        let mut stride = IntVector::zero();
        let mut acc = 1i64;
        for k in (0..D).rev() {
            stride[major[k]] = acc;
            acc *= grid[major[k]];
        }
        let num_parts = acc as usize;
        let index_end = index_begin + num_parts;

        let base_quota = num_parts / ranks;
        let extra_ranks = num_parts % ranks;
        let first_rank_with_base = rank_begin + extra_ranks;
        let first_rank_with_zero = if base_quota == 0 {
            first_rank_with_base
        } else {
            rank_end
        };
        let first_index_of_extra = index_begin;
        let first_index_of_base = index_begin + extra_ranks * (base_quota + 1);

        log::trace!(
            "assumed partition: {box_} -> grid {grid} ({num_parts} parts) for ranks [{rank_begin}, {rank_end}), interleave {interleave}"
        );

        self.box_ = box_;
        self.rank_begin = rank_begin;
        self.rank_end = rank_end;
        self.index_begin = index_begin;
        self.index_end = index_end;
        self.uniform_size = uniform_size;
        self.grid = grid;
        self.major = major;
        self.stride = stride;
        self.interleave = interleave;
        self.base_quota = base_quota;
        self.first_rank_with_base = first_rank_with_base;
        self.first_rank_with_zero = first_rank_with_zero;
        self.first_index_of_extra = first_index_of_extra;
        self.first_index_of_base = first_index_of_base;

        self.debug_assert_invariants();
        Ok(())
    }

    /// The box this partition covers.
    pub fn unpartitioned_box(&self) -> &IndexBox<D> {
        &self.box_
    }

    /// First partition id.
    pub fn begin(&self) -> usize {
        self.index_begin
    }

    /// One past the last partition id.
    pub fn end(&self) -> usize {
        self.index_end
    }

    /// Total number of partitions.
    pub fn num_parts(&self) -> usize {
        self.index_end - self.index_begin
    }

    pub fn rank_begin(&self) -> usize {
        self.rank_begin
    }

    pub fn rank_end(&self) -> usize {
        self.rank_end
    }

    pub fn interleaved(&self) -> bool {
        self.interleave
    }

    /// Partitions along each axis.
    pub fn partition_grid(&self) -> &IntVector<D> {
        &self.grid
    }

    /// Cells per partition along each axis, before remainder absorption.
    pub fn uniform_partition_size(&self) -> &IntVector<D> {
        &self.uniform_size
    }

    /// Rank owning partition `index`.
    ///
    /// # Errors
    /// [`DecompError::IndexOutOfRange`] if `index` is not a partition id of
    /// this object.
    pub fn owner(&self, index: usize) -> Result<usize, DecompError> {
        self.check_index(index)?;
        if self.interleave {
            let ranks = self.rank_end - self.rank_begin;
            return Ok(self.rank_begin + (index - self.index_begin) % ranks);
        }
        if index >= self.first_index_of_base {
            // indices at or past the base breakpoint exist only when the base
            // quota is nonzero
            Ok(self.first_rank_with_base + (index - self.first_index_of_base) / self.base_quota)
        } else {
            Ok(self.rank_begin + (index - self.first_index_of_extra) / (self.base_quota + 1))
        }
    }

    /// First partition id owned by `rank` under contiguous assignment.
    ///
    /// # Errors
    /// - [`DecompError::RankOutOfRange`] if `rank` is outside the interval.
    /// - [`DecompError::InterleavedRankQuery`] under interleaved assignment,
    ///   where ranks do not own contiguous id runs.
    pub fn first_index_of_rank(&self, rank: usize) -> Result<usize, DecompError> {
        self.check_rank(rank)?;
        if self.interleave {
            return Err(DecompError::InterleavedRankQuery);
        }
        Ok(self.first_index_unchecked(rank))
    }

    /// One past the last partition id owned by `rank` under contiguous
    /// assignment.
    ///
    /// # Errors
    /// Same conditions as [`AssumedPartitionBox::first_index_of_rank`].
    pub fn end_index_of_rank(&self, rank: usize) -> Result<usize, DecompError> {
        self.check_rank(rank)?;
        if self.interleave {
            return Err(DecompError::InterleavedRankQuery);
        }
        Ok(self.first_index_unchecked(rank + 1))
    }

    /// The box of partition `index`.
    ///
    /// # Errors
    /// [`DecompError::IndexOutOfRange`] if `index` is not a partition id of
    /// this object.
    pub fn box_for_index(&self, index: usize) -> Result<IndexBox<D>, DecompError> {
        self.check_index(index)?;
        Ok(self.box_for_index_unchecked(index))
    }

    /// The box of the partition containing cell `position`.
    ///
    /// # Errors
    /// [`DecompError::PositionOutsideBox`] if the cell is not in the
    /// partitioned box.
    pub fn box_for_position(&self, position: &IntVector<D>) -> Result<IndexBox<D>, DecompError> {
        let coord = self.coord_of_position(position)?;
        Ok(self.partition_box_at(&coord))
    }

    /// The id of the partition containing cell `position`.
    ///
    /// # Errors
    /// [`DecompError::PositionOutsideBox`] if the cell is not in the
    /// partitioned box.
    pub fn index_of_position(&self, position: &IntVector<D>) -> Result<usize, DecompError> {
        let coord = self.coord_of_position(position)?;
        Ok(self.index_of_coord(&coord))
    }

    /// All partition boxes, in id order.
    pub fn all_boxes(&self) -> Vec<IndexBox<D>> {
        (self.index_begin..self.index_end)
            .map(|i| self.box_for_index_unchecked(i))
            .collect()
    }

    /// The boxes owned by `rank`, in id order. Works in both assignment
    /// modes; interleaved ownership is a stride walk rather than a run.
    ///
    /// # Errors
    /// [`DecompError::RankOutOfRange`] if `rank` is outside the interval.
    pub fn boxes_of_rank(&self, rank: usize) -> Result<Vec<IndexBox<D>>, DecompError> {
        self.check_rank(rank)?;
        let boxes = if self.interleave {
            let ranks = self.rank_end - self.rank_begin;
            let start = self.index_begin + (rank - self.rank_begin);
            (start..self.index_end)
                .step_by(ranks)
                .map(|i| self.box_for_index_unchecked(i))
                .collect()
        } else {
            (self.first_index_unchecked(rank)..self.first_index_unchecked(rank + 1))
                .map(|i| self.box_for_index_unchecked(i))
                .collect()
        };
        Ok(boxes)
    }

    /// Ids of the partitions whose boxes intersect `query`, in id order.
    ///
    /// The result comes from per-axis grid-range arithmetic, so the cost is
    /// proportional to the number of hits, never to the total partition
    /// count. A query in another block or disjoint from the partitioned box
    /// returns nothing.
    pub fn find_overlaps(&self, query: &IndexBox<D>) -> Vec<IndexBox<D>> {
        self.overlap_coords(query)
            .into_iter()
            .map(|coord| self.partition_box_at(&coord))
            .collect()
    }

    /// Like [`AssumedPartitionBox::find_overlaps`], but yielding partition
    /// ids; callers turn these into owner ranks with
    /// [`AssumedPartitionBox::owner`].
    pub fn find_overlap_indices(&self, query: &IndexBox<D>) -> Vec<usize> {
        self.overlap_coords(query)
            .into_iter()
            .map(|coord| self.index_of_coord(&coord))
            .collect()
    }

    /// Exhaustive consistency audit. Returns the number of problems found;
    /// each one is also reported through `log::error!`. Zero means the
    /// partition tiles its box exactly with every id owned by an in-range
    /// rank. Cost is proportional to the partition count.
    pub fn self_check(&self) -> usize {
        let mut problems = 0usize;
        let mut flag = |ok: bool, msg: &dyn Fn() -> String| {
            if !ok {
                problems += 1;
                log::error!("assumed partition self check: {}", msg());
            }
        };

        let grid_parts = self.grid.product();
        flag(
            grid_parts > 0 && grid_parts as usize == self.num_parts(),
            &|| format!("grid {} disagrees with id range [{}, {})", self.grid, self.index_begin, self.index_end),
        );
        for d in 0..D {
            flag(
                self.grid[d] >= 1 && self.grid[d] <= self.box_.extent(d),
                &|| format!("axis {d}: grid count {} outside [1, {}]", self.grid[d], self.box_.extent(d)),
            );
            flag(
                self.uniform_size[d] >= 1
                    && self.uniform_size[d] == self.box_.extent(d) / self.grid[d].max(1),
                &|| format!("axis {d}: uniform size {} inconsistent", self.uniform_size[d]),
            );
        }

        let mut axis_seen = [false; D];
        for k in 0..D {
            let a = self.major[k];
            if a < D {
                axis_seen[a] = true;
            }
            if k > 0 {
                flag(
                    a < D && self.grid[self.major[k - 1]] <= self.grid[a],
                    &|| format!("major order not sorted at position {k}"),
                );
            }
        }
        flag(axis_seen.iter().all(|&s| s), &|| "major order is not a permutation".to_string());

        let ranks = self.rank_begin..self.rank_end;
        let mut total_cells = 0i64;
        for index in self.index_begin..self.index_end {
            let b = self.box_for_index_unchecked(index);
            flag(!b.is_empty(), &|| format!("partition {index} is empty"));
            flag(
                self.box_.contains_box(&b),
                &|| format!("partition {index} box {b} leaves the domain"),
            );
            total_cells += b.num_cells();
            match self.owner(index) {
                Ok(r) => flag(ranks.contains(&r), &|| format!("partition {index} owner {r} out of range")),
                Err(e) => flag(false, &|| format!("owner({index}) failed: {e}")),
            }
            if !b.is_empty() {
                flag(
                    self.index_of_position(b.lower()) == Ok(index),
                    &|| format!("position lookup disagrees for partition {index}"),
                );
            }
        }
        flag(
            total_cells == self.box_.num_cells(),
            &|| format!("partitions cover {total_cells} cells, box has {}", self.box_.num_cells()),
        );

        if !self.interleave {
            let mut expected = self.index_begin;
            for rank in self.rank_begin..self.rank_end {
                let first = self.first_index_unchecked(rank);
                let end = self.first_index_unchecked(rank + 1);
                flag(
                    first == expected && first <= end,
                    &|| format!("rank {rank} interval [{first}, {end}) does not continue at {expected}"),
                );
                for index in first..end {
                    flag(
                        self.owner(index) == Ok(rank),
                        &|| format!("partition {index} not owned by its interval rank {rank}"),
                    );
                }
                expected = end;
            }
            flag(
                expected == self.index_end,
                &|| format!("rank intervals end at {expected}, ids end at {}", self.index_end),
            );
        }

        problems
    }

    /// Multi-line description of the partition. `detail_depth` 0 prints the
    /// summary, 1 adds per-rank lines, 2 adds every partition box.
    pub fn recursive_print<W: fmt::Write>(
        &self,
        w: &mut W,
        border: &str,
        detail_depth: usize,
    ) -> fmt::Result {
        writeln!(
            w,
            "{border}box {} with {} cells",
            self.box_,
            self.box_.num_cells()
        )?;
        writeln!(
            w,
            "{border}ranks [{}, {}) ids [{}, {}) {}",
            self.rank_begin,
            self.rank_end,
            self.index_begin,
            self.index_end,
            if self.interleave { "interleaved" } else { "contiguous" }
        )?;
        writeln!(
            w,
            "{border}grid {} uniform {} major {:?}",
            self.grid, self.uniform_size, self.major
        )?;
        if detail_depth >= 1 {
            for rank in self.rank_begin..self.rank_end {
                // rank range is valid by construction here
                let n = self.boxes_of_rank(rank).map(|b| b.len()).unwrap_or(0);
                if self.interleave {
                    writeln!(w, "{border}  rank {rank}: {n} parts (round-robin)")?;
                } else {
                    let first = self.first_index_unchecked(rank);
                    let end = self.first_index_unchecked(rank + 1);
                    writeln!(w, "{border}  rank {rank}: {n} parts, ids [{first}, {end})")?;
                }
            }
        }
        if detail_depth >= 2 {
            for index in self.index_begin..self.index_end {
                let b = self.box_for_index_unchecked(index);
                let owner = self.owner(index).map(|r| r.to_string()).unwrap_or_default();
                writeln!(w, "{border}    id {index} -> {b} owner {owner}")?;
            }
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<(), DecompError> {
        if index < self.index_begin || index >= self.index_end {
            return Err(DecompError::IndexOutOfRange {
                index,
                begin: self.index_begin,
                end: self.index_end,
            });
        }
        Ok(())
    }

    fn check_rank(&self, rank: usize) -> Result<(), DecompError> {
        if rank < self.rank_begin || rank >= self.rank_end {
            return Err(DecompError::RankOutOfRange {
                rank,
                rank_begin: self.rank_begin,
                rank_end: self.rank_end,
            });
        }
        Ok(())
    }

    fn first_index_unchecked(&self, rank: usize) -> usize {
        if rank < self.first_rank_with_base {
            self.index_begin + (rank - self.rank_begin) * (self.base_quota + 1)
        } else {
            self.first_index_of_base + (rank - self.first_rank_with_base) * self.base_quota
        }
    }

    fn box_for_index_unchecked(&self, index: usize) -> IndexBox<D> {
        let mut rel = (index - self.index_begin) as i64;
        let mut coord = IntVector::zero();
        for k in 0..D {
            let axis = self.major[k];
            coord[axis] = rel / self.stride[axis];
            rel %= self.stride[axis];
        }
        self.partition_box_at(&coord)
    }

    fn partition_box_at(&self, coord: &IntVector<D>) -> IndexBox<D> {
        let mut lower = IntVector::zero();
        let mut upper = IntVector::zero();
        for d in 0..D {
            lower[d] = self.box_.lower()[d] + coord[d] * self.uniform_size[d];
            upper[d] = if coord[d] + 1 < self.grid[d] {
                lower[d] + self.uniform_size[d] - 1
            } else {
                // the last partition along each axis absorbs the remainder
                self.box_.upper()[d]
            };
        }
        IndexBox::with_block(lower, upper, self.box_.block())
    }

    fn index_of_coord(&self, coord: &IntVector<D>) -> usize {
        let mut flat = 0i64;
        for d in 0..D {
            flat += coord[d] * self.stride[d];
        }
        self.index_begin + flat as usize
    }

    fn coord_of_position(&self, position: &IntVector<D>) -> Result<IntVector<D>, DecompError> {
        if !self.box_.contains(position) {
            return Err(DecompError::PositionOutsideBox {
                position: position.to_string(),
                box_: self.box_.to_string(),
            });
        }
        let mut coord = IntVector::zero();
        for d in 0..D {
            coord[d] =
                ((position[d] - self.box_.lower()[d]) / self.uniform_size[d]).min(self.grid[d] - 1);
        }
        Ok(coord)
    }

    fn overlap_coords(&self, query: &IndexBox<D>) -> Vec<IntVector<D>> {
        if query.block() != self.box_.block() {
            return Vec::new();
        }
        let inter = self.box_.intersect(query);
        if inter.is_empty() {
            return Vec::new();
        }
        // both corners are inside the box, so the coordinate lookups succeed
        let Ok(lo) = self.coord_of_position(inter.lower()) else {
            return Vec::new();
        };
        let Ok(hi) = self.coord_of_position(inter.upper()) else {
            return Vec::new();
        };
        // walk the grid in major order, stride-1 axis innermost, so the
        // resulting partition ids come out ascending
        (0..D)
            .map(|k| {
                let axis = self.major[k];
                lo[axis]..=hi[axis]
            })
            .multi_cartesian_product()
            .map(|c| {
                let mut coord = IntVector::zero();
                for (k, v) in c.into_iter().enumerate() {
                    coord[self.major[k]] = v;
                }
                coord
            })
            .collect()
    }
}

impl<const D: usize> DebugInvariants for AssumedPartitionBox<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "AssumedPartitionBox invalid");
    }

    fn validate_invariants(&self) -> Result<(), DecompError> {
        let problems = self.self_check();
        if problems > 0 {
            return Err(DecompError::SelfCheckFailed { problems });
        }
        Ok(())
    }
}
