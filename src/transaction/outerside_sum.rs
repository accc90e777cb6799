//! Outerside sum transactions: one patch pair's contribution to a boundary
//! sum.
//!
//! A sum schedule moves outer-face values between patch pairs and combines
//! them with `+=` at the destination, so coincident faces end up holding the
//! sum of every patch's contribution. Each transaction covers one
//! (destination patch, source patch) pair under one registered transfer item.
//!
//! Both endpoints enumerate the transfer set from replicated metadata alone:
//! the overlap's boxes intersected with the destination patch's outer faces,
//! walked in a fixed order (direction, then side, then box, then row-major
//! elements, with components innermost). Sender and receiver therefore agree
//! on message layout and on byte counts without talking to each other, and a
//! sum transaction's incoming and outgoing sizes are equal by construction.

use core::fmt;
use core::ops::AddAssign;

use bytemuck::Pod;

use crate::data::outerside::{OutersideData, Side, face_box_of};
use crate::data::PatchLevel;
use crate::decomp_error::DecompError;
use crate::geometry::IndexBox;
use crate::overlap::{SideGeometry, SideIndex, SideOverlap};
use crate::transaction::registry::TransferRegistry;
use crate::wire::MessageBuffer;

/// How a transaction moves its data, decided by the endpoint owners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    /// Both endpoints on the local rank; data moves in memory.
    Local,
    /// Source local, destination remote; the local rank packs.
    Send,
    /// Destination local, source remote; the local rank unpacks.
    Recv,
}

impl TransactionMode {
    fn name(self) -> &'static str {
        match self {
            TransactionMode::Local => "local",
            TransactionMode::Send => "send",
            TransactionMode::Recv => "recv",
        }
    }
}

/// One destination-patch/source-patch transfer of a boundary sum.
///
/// Holds ids and replicated metadata only; patch storage is looked up at
/// execution time through the levels, and the transfer item through the
/// registry, which must keep its window open for the transaction's lifetime.
#[derive(Debug)]
pub struct OutersideSumTransaction<'a, V, const D: usize> {
    dst_level: &'a PatchLevel<V, D>,
    src_level: &'a PatchLevel<V, D>,
    overlap: &'a SideOverlap<D>,
    registry: &'a TransferRegistry,
    dst_patch: usize,
    src_patch: usize,
    item_id: usize,
    dst_owner: usize,
    src_owner: usize,
    mode: TransactionMode,
    depth: usize,
    /// Transfer set in canonical order: (first element, row length) per row.
    rows: Vec<(SideIndex<D>, usize)>,
    elements: usize,
}

impl<'a, V, const D: usize> OutersideSumTransaction<'a, V, D>
where
    V: Pod + AddAssign,
{
    /// Build the transaction for one patch pair.
    ///
    /// `overlap` must be expressed in the destination patch's index space.
    /// The component count comes from the locally-allocated endpoint; in
    /// local mode both endpoints must agree.
    ///
    /// # Errors
    /// - Registry errors if no window is open or `item_id` is unknown.
    /// - [`DecompError::PatchOutOfRange`] for bad patch ids.
    /// - [`DecompError::BlockMismatch`] if the overlap's block pair does not
    ///   match the patch boxes.
    /// - [`DecompError::NoLocalEndpoint`] if neither patch is owned locally.
    /// - [`DecompError::DepthMismatch`] for disagreeing local endpoints.
    /// - Data-access errors if a local endpoint's slot was never allocated.
    pub fn new(
        dst_level: &'a PatchLevel<V, D>,
        src_level: &'a PatchLevel<V, D>,
        overlap: &'a SideOverlap<D>,
        registry: &'a TransferRegistry,
        dst_patch: usize,
        src_patch: usize,
        item_id: usize,
    ) -> Result<Self, DecompError> {
        let item = registry.item(item_id)?;
        let dst = dst_level.patch(dst_patch)?;
        let src = src_level.patch(src_patch)?;
        debug_assert_eq!(dst_level.rank(), src_level.rank());
        let rank = dst_level.rank();

        let t = overlap.transformation();
        if t.dst_block() != dst.box_().block() || t.src_block() != src.box_().block() {
            return Err(DecompError::BlockMismatch(format!(
                "overlap maps block {} -> {}, patches sit on {} -> {}",
                t.src_block(),
                t.dst_block(),
                src.box_().block(),
                dst.box_().block()
            )));
        }

        let mode = match (dst.owner() == rank, src.owner() == rank) {
            (true, true) => TransactionMode::Local,
            (false, true) => TransactionMode::Send,
            (true, false) => TransactionMode::Recv,
            (false, false) => {
                return Err(DecompError::NoLocalEndpoint {
                    dst_owner: dst.owner(),
                    src_owner: src.owner(),
                    rank,
                });
            }
        };
        let depth = match mode {
            TransactionMode::Local => {
                let d = dst_level.data(dst_patch, item.dst_slot)?.read().depth();
                let s = src_level.data(src_patch, item.src_slot)?.read().depth();
                if d != s {
                    return Err(DecompError::DepthMismatch { dst: d, src: s });
                }
                d
            }
            TransactionMode::Send => src_level.data(src_patch, item.src_slot)?.read().depth(),
            TransactionMode::Recv => dst_level.data(dst_patch, item.dst_slot)?.read().depth(),
        };

        let rows = transfer_rows(overlap, dst.box_());
        let elements = rows.iter().map(|&(_, len)| len).sum();
        Ok(Self {
            dst_level,
            src_level,
            overlap,
            registry,
            dst_patch,
            src_patch,
            item_id,
            dst_owner: dst.owner(),
            src_owner: src.owner(),
            mode,
            depth,
            rows,
            elements,
        })
    }

    /// How this transaction moves its data.
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    /// The overlap descriptor the transfer set came from.
    pub fn overlap(&self) -> &SideOverlap<D> {
        self.overlap
    }

    /// Destination patch id.
    pub fn dst_patch(&self) -> usize {
        self.dst_patch
    }

    /// Source patch id.
    pub fn src_patch(&self) -> usize {
        self.src_patch
    }

    /// Rank that will unpack this transaction's message.
    pub fn destination_processor(&self) -> usize {
        self.dst_owner
    }

    /// Rank that will pack this transaction's message.
    pub fn source_processor(&self) -> usize {
        self.src_owner
    }

    /// Side elements in the transfer set, before the depth factor.
    pub fn num_elements(&self) -> usize {
        self.elements
    }

    /// Whether the local rank can size the incoming message right now. A
    /// sender always reports false; only the receiving side estimates, and
    /// it answers from the allocation state of its destination storage.
    pub fn can_estimate_incoming_message_size(&self) -> bool {
        match self.mode {
            TransactionMode::Send => false,
            TransactionMode::Local | TransactionMode::Recv => {
                match self.registry.item(self.item_id) {
                    Ok(item) => self.dst_level.data(self.dst_patch, item.dst_slot).is_ok(),
                    Err(_) => false,
                }
            }
        }
    }

    /// Bytes this transaction will unpack. Equal to the outgoing size.
    pub fn incoming_message_bytes(&self) -> usize {
        self.elements * self.depth * size_of::<V>()
    }

    /// Bytes this transaction will pack. Equal to the incoming size.
    pub fn outgoing_message_bytes(&self) -> usize {
        self.elements * self.depth * size_of::<V>()
    }

    /// Pack the transfer set into `stream` in canonical order.
    ///
    /// # Errors
    /// - [`DecompError::WrongTransactionMode`] unless in send mode.
    /// - [`DecompError::FaceElementMissing`] if the overlap maps a transfer
    ///   element off the source patch's outer faces.
    pub fn pack_stream(&self, stream: &mut MessageBuffer) -> Result<(), DecompError> {
        if self.mode != TransactionMode::Send {
            return Err(DecompError::WrongTransactionMode {
                expected: "send",
                actual: self.mode.name(),
            });
        }
        let values = self.gather_source()?;
        stream.pack_slice(&values);
        Ok(())
    }

    /// Unpack the transfer set from `stream` and `+=` it into the
    /// destination faces.
    ///
    /// # Errors
    /// - [`DecompError::WrongTransactionMode`] unless in receive mode.
    /// - [`DecompError::BufferUnderrun`] if `stream` runs short.
    pub fn unpack_stream(&self, stream: &mut MessageBuffer) -> Result<(), DecompError> {
        if self.mode != TransactionMode::Recv {
            return Err(DecompError::WrongTransactionMode {
                expected: "recv",
                actual: self.mode.name(),
            });
        }
        let values = stream.unpack_vec::<V>(self.elements * self.depth)?;
        self.scatter_destination(&values)
    }

    /// Perform the whole transfer in memory.
    ///
    /// # Errors
    /// [`DecompError::WrongTransactionMode`] unless in local mode.
    pub fn copy_local_data(&self) -> Result<(), DecompError> {
        if self.mode != TransactionMode::Local {
            return Err(DecompError::WrongTransactionMode {
                expected: "local",
                actual: self.mode.name(),
            });
        }
        // Gather fully before scattering; with source and destination in the
        // same slot the two lock acquisitions must not overlap.
        let values = self.gather_source()?;
        self.scatter_destination(&values)
    }

    /// Read the transfer set out of the source faces in canonical order.
    /// Destination elements are carried back through the inverse of the
    /// overlap's transformation; an identity overlap copies whole rows.
    fn gather_source(&self) -> Result<Vec<V>, DecompError> {
        let item = self.registry.item(self.item_id)?;
        let lock = self.src_level.data(self.src_patch, item.src_slot)?;
        let src = lock.read();
        let mut values = Vec::with_capacity(self.elements * self.depth);
        let t = self.overlap.transformation();
        if t.is_identity() {
            for &(start, len) in &self.rows {
                let first = face_offset(&src, &start, self.src_patch)?;
                let mut end = start;
                end.coord[D - 1] += len as i64 - 1;
                let last = face_offset(&src, &end, self.src_patch)?;
                debug_assert_eq!(last, first + (len - 1) * self.depth);
                values.extend_from_slice(&src.values()[first..last + self.depth]);
            }
        } else {
            let inv = t.inverse();
            for &(start, len) in &self.rows {
                for k in 0..len as i64 {
                    let mut si = start;
                    si.coord[D - 1] += k;
                    let si = SideGeometry::transform_side_index(&si, &inv);
                    let off = face_offset(&src, &si, self.src_patch)?;
                    values.extend_from_slice(&src.values()[off..off + self.depth]);
                }
            }
        }
        Ok(values)
    }

    /// `+=` gathered values into the destination faces, row by row. Rows are
    /// cut from the destination's own faces, so they are contiguous there.
    fn scatter_destination(&self, values: &[V]) -> Result<(), DecompError> {
        debug_assert_eq!(values.len(), self.elements * self.depth);
        let item = self.registry.item(self.item_id)?;
        let lock = self.dst_level.data(self.dst_patch, item.dst_slot)?;
        let mut dst = lock.write();
        let mut pos = 0;
        for &(start, len) in &self.rows {
            let first = face_offset(&dst, &start, self.dst_patch)?;
            let n = len * self.depth;
            for (d, s) in dst.values_mut()[first..first + n]
                .iter_mut()
                .zip(&values[pos..pos + n])
            {
                *d += *s;
            }
            pos += n;
        }
        Ok(())
    }
}

impl<V, const D: usize> fmt::Display for OutersideSumTransaction<'_, V, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "outerside sum transaction")?;
        writeln!(
            f,
            "  mode {} (dst patch {} owned by {}, src patch {} owned by {})",
            self.mode.name(),
            self.dst_patch,
            self.dst_owner,
            self.src_patch,
            self.src_owner
        )?;
        writeln!(
            f,
            "  item {}, {} elements of depth {} in {} rows",
            self.item_id,
            self.elements,
            self.depth,
            self.rows.len()
        )?;
        write!(f, "  transformation {}", self.overlap.transformation())
    }
}

/// The transfer set of one patch pair, as rows: the overlap's boxes clipped
/// to the destination patch's outer faces, walked direction by direction,
/// lower side before upper, in the overlap's box order, row-major within a
/// piece with the last axis fastest.
fn transfer_rows<const D: usize>(
    overlap: &SideOverlap<D>,
    dst_box: &IndexBox<D>,
) -> Vec<(SideIndex<D>, usize)> {
    let mut rows = Vec::new();
    for axis in 0..D {
        for side in Side::ALL {
            let face = face_box_of(dst_box, axis, side);
            for b in overlap.boxes(axis) {
                let piece = b.intersect(&face);
                if piece.is_empty() {
                    continue;
                }
                let len = piece.extent(D - 1) as usize;
                let mut coord = *piece.lower();
                'piece: loop {
                    rows.push((SideIndex { axis, coord }, len));
                    let mut a = D - 1;
                    loop {
                        if a == 0 {
                            break 'piece;
                        }
                        a -= 1;
                        coord[a] += 1;
                        if coord[a] <= piece.upper()[a] {
                            continue 'piece;
                        }
                        coord[a] = piece.lower()[a];
                    }
                }
            }
        }
    }
    rows
}

fn face_offset<V, const D: usize>(
    data: &OutersideData<V, D>,
    index: &SideIndex<D>,
    patch: usize,
) -> Result<usize, DecompError> {
    data.offset_of(index, 0)
        .ok_or_else(|| DecompError::FaceElementMissing {
            patch,
            index: index.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{IntVector, Transformation};
    use crate::transaction::registry::TransferItem;

    fn b2(lo: [i64; 2], hi: [i64; 2]) -> IndexBox<2> {
        IndexBox::new(IntVector::new(lo), IntVector::new(hi))
    }

    fn b1(lo: i64, hi: i64) -> IndexBox<1> {
        IndexBox::new(IntVector::new([lo]), IntVector::new([hi]))
    }

    fn sum_item(src_slot: usize, dst_slot: usize) -> TransferItem {
        TransferItem {
            var_name: "flux".into(),
            src_slot,
            dst_slot,
            op_name: "sum".into(),
            fill_ghosts: false,
        }
    }

    /// Left and right patch meeting at the plane x = 4, plus the overlap a
    /// sum schedule would hand the (dst = left, src = right) pair.
    fn abutting_level(rank: usize, left_owner: usize, right_owner: usize) -> PatchLevel<f64, 2> {
        let mut level = PatchLevel::new(rank);
        level.add_patch(b2([0, 0], [3, 3]), left_owner);
        level.add_patch(b2([4, 0], [7, 3]), right_owner);
        level
    }

    fn shared_plane_overlap() -> SideOverlap<2> {
        // the right patch's first cell column, in the shared index space
        SideOverlap::from_cell_boxes(&[b2([4, 0], [4, 3])], Transformation::identity())
    }

    #[test]
    fn transfer_rows_follow_canonical_order() {
        let overlap = shared_plane_overlap();
        let rows = transfer_rows(&overlap, &b2([0, 0], [3, 3]));
        // the x = 4 plane is a single y-run; nothing survives in direction 1
        assert_eq!(
            rows,
            vec![(
                SideIndex {
                    axis: 0,
                    coord: IntVector::new([4, 0]),
                },
                4
            )]
        );
    }

    #[test]
    fn local_transaction_sums_the_shared_plane() {
        let mut level = abutting_level(0, 0, 0);
        level.allocate(0, 0, 1).unwrap();
        level.allocate(1, 0, 1).unwrap();
        level.data(0, 0).unwrap().write().fill(5.0);
        level.data(1, 0).unwrap().write().fill(5.0);
        let overlap = shared_plane_overlap();
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 0));
        let _window = registry.open().unwrap();

        let txn =
            OutersideSumTransaction::new(&level, &level, &overlap, &registry, 0, 1, item).unwrap();
        assert_eq!(txn.mode(), TransactionMode::Local);
        assert_eq!(txn.num_elements(), 4);
        assert_eq!(txn.incoming_message_bytes(), 4 * 8);
        txn.copy_local_data().unwrap();

        let dst = level.data(0, 0).unwrap().read();
        assert!(dst.face_slice(0, Side::Upper).iter().all(|&v| v == 10.0));
        // every other destination face untouched
        assert!(dst.face_slice(0, Side::Lower).iter().all(|&v| v == 5.0));
        assert!(dst.face_slice(1, Side::Lower).iter().all(|&v| v == 5.0));
        assert!(dst.face_slice(1, Side::Upper).iter().all(|&v| v == 5.0));
        // and the source is read-only throughout
        let src = level.data(1, 0).unwrap().read();
        assert!(src.values().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn one_dimensional_patches_sum_their_shared_end() {
        let mut level: PatchLevel<f64, 1> = PatchLevel::new(0);
        level.add_patch(b1(0, 3), 0);
        level.add_patch(b1(4, 7), 0);
        level.allocate(0, 0, 1).unwrap();
        level.allocate(1, 0, 1).unwrap();
        level.data(0, 0).unwrap().write().fill(5.0);
        level.data(1, 0).unwrap().write().fill(5.0);
        // the right patch's first cell; both patches end on the node x = 4
        let overlap = SideOverlap::from_cell_boxes(&[b1(4, 4)], Transformation::identity());
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 0));
        let _window = registry.open().unwrap();

        let txn =
            OutersideSumTransaction::new(&level, &level, &overlap, &registry, 0, 1, item).unwrap();
        assert_eq!(txn.num_elements(), 1);
        txn.copy_local_data().unwrap();

        let dst = level.data(0, 0).unwrap().read();
        assert!(dst.face_slice(0, Side::Upper).iter().all(|&v| v == 10.0));
        assert!(dst.face_slice(0, Side::Lower).iter().all(|&v| v == 5.0));
        let src = level.data(1, 0).unwrap().read();
        assert!(src.values().iter().all(|&v| v == 5.0));
    }

    #[test]
    fn translated_overlap_uses_the_inverse_map() {
        // source patch lives at x in [10, 13]; the transformation carries its
        // indices left by 6 into the destination's space
        let mut level: PatchLevel<f64, 2> = PatchLevel::new(0);
        level.add_patch(b2([0, 0], [3, 3]), 0);
        level.add_patch(b2([10, 0], [13, 3]), 0);
        level.allocate(0, 0, 1).unwrap();
        level.allocate(1, 0, 1).unwrap();
        // mark the source's lower-x face so the gather is distinguishable
        {
            let lock = level.data(1, 0).unwrap();
            let mut src = lock.write();
            src.face_slice_mut(0, Side::Lower).fill(3.0);
        }
        let t = Transformation::translation(IntVector::new([-6, 0]), crate::geometry::BlockId::ZERO);
        let overlap = SideOverlap::from_cell_boxes(&[b2([4, 0], [4, 3])], t);
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 0));
        let _window = registry.open().unwrap();

        let txn =
            OutersideSumTransaction::new(&level, &level, &overlap, &registry, 0, 1, item).unwrap();
        txn.copy_local_data().unwrap();
        let dst = level.data(0, 0).unwrap().read();
        assert!(dst.face_slice(0, Side::Upper).iter().all(|&v| v == 3.0));
        assert!(dst.face_slice(0, Side::Lower).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn mode_comes_from_the_owners() {
        let mut sender_view = abutting_level(1, 0, 1);
        sender_view.allocate(1, 0, 1).unwrap();
        let mut receiver_view = abutting_level(0, 0, 1);
        receiver_view.allocate(0, 0, 1).unwrap();
        let overlap = shared_plane_overlap();
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 0));
        let _window = registry.open().unwrap();

        let send = OutersideSumTransaction::new(
            &sender_view,
            &sender_view,
            &overlap,
            &registry,
            0,
            1,
            item,
        )
        .unwrap();
        assert_eq!(send.mode(), TransactionMode::Send);
        assert_eq!(send.destination_processor(), 0);
        assert_eq!(send.source_processor(), 1);

        let recv = OutersideSumTransaction::new(
            &receiver_view,
            &receiver_view,
            &overlap,
            &registry,
            0,
            1,
            item,
        )
        .unwrap();
        assert_eq!(recv.mode(), TransactionMode::Recv);

        // neither endpoint on rank 7
        let stranger_view = abutting_level(7, 0, 1);
        assert!(matches!(
            OutersideSumTransaction::new(
                &stranger_view,
                &stranger_view,
                &overlap,
                &registry,
                0,
                1,
                item
            ),
            Err(DecompError::NoLocalEndpoint {
                dst_owner: 0,
                src_owner: 1,
                rank: 7
            })
        ));
    }

    #[test]
    fn operations_reject_the_wrong_mode() {
        let mut level = abutting_level(0, 0, 0);
        level.allocate(0, 0, 1).unwrap();
        level.allocate(1, 0, 1).unwrap();
        let overlap = shared_plane_overlap();
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 0));
        let _window = registry.open().unwrap();
        let txn =
            OutersideSumTransaction::new(&level, &level, &overlap, &registry, 0, 1, item).unwrap();

        let mut stream = MessageBuffer::new();
        assert!(matches!(
            txn.pack_stream(&mut stream),
            Err(DecompError::WrongTransactionMode {
                expected: "send",
                actual: "local"
            })
        ));
        assert!(matches!(
            txn.unpack_stream(&mut stream),
            Err(DecompError::WrongTransactionMode {
                expected: "recv",
                actual: "local"
            })
        ));
    }

    #[test]
    fn size_estimates_follow_local_allocation() {
        let mut receiver_view = abutting_level(0, 0, 1);
        let overlap = shared_plane_overlap();
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 3));
        let _window = registry.open().unwrap();
        // building the transaction itself needs the local endpoint allocated
        assert!(matches!(
            OutersideSumTransaction::new(
                &receiver_view,
                &receiver_view,
                &overlap,
                &registry,
                0,
                1,
                item
            ),
            Err(DecompError::SlotOutOfRange { .. })
        ));
        receiver_view.allocate(0, 3, 2).unwrap();
        let txn = OutersideSumTransaction::new(
            &receiver_view,
            &receiver_view,
            &overlap,
            &registry,
            0,
            1,
            item,
        )
        .unwrap();
        assert!(txn.can_estimate_incoming_message_size());
        assert_eq!(txn.incoming_message_bytes(), txn.outgoing_message_bytes());
        assert_eq!(txn.incoming_message_bytes(), 4 * 2 * 8);

        // the sender never estimates the incoming size, allocated or not
        let mut sender_view = abutting_level(1, 0, 1);
        sender_view.allocate(1, 0, 2).unwrap();
        let send = OutersideSumTransaction::new(
            &sender_view,
            &sender_view,
            &overlap,
            &registry,
            0,
            1,
            item,
        )
        .unwrap();
        assert_eq!(send.mode(), TransactionMode::Send);
        assert!(!send.can_estimate_incoming_message_size());
        assert_eq!(send.outgoing_message_bytes(), 4 * 2 * 8);
    }

    #[test]
    fn construction_requires_an_open_window() {
        let mut level = abutting_level(0, 0, 0);
        level.allocate(0, 0, 1).unwrap();
        level.allocate(1, 0, 1).unwrap();
        let overlap = shared_plane_overlap();
        let mut registry = TransferRegistry::new();
        let item = registry.register(sum_item(0, 0));
        assert!(matches!(
            OutersideSumTransaction::new(&level, &level, &overlap, &registry, 0, 1, item),
            Err(DecompError::RegistryClosed)
        ));
    }
}
