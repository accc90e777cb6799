//! Overlap geometry across patches and blocks: interior protection,
//! restriction with retry, and agreement between the different descriptions
//! of one interface, rotated against untransformed and either end against
//! the other.

use amr_decomp::geometry::{BlockId, IndexBox, IntVector, Rotation, Transformation};
use amr_decomp::overlap::{SideGeometry, SideOverlap};

fn b2(lo: [i64; 2], hi: [i64; 2]) -> IndexBox<2> {
    IndexBox::new(IntVector::new(lo), IntVector::new(hi))
}

fn b2_in(lo: [i64; 2], hi: [i64; 2], block: u32) -> IndexBox<2> {
    IndexBox::with_block(IntVector::new(lo), IntVector::new(hi), BlockId(block))
}

/// Destination patch `[0,3]^2` with one ghost cell all around.
fn dst_geometry() -> SideGeometry<2> {
    SideGeometry::new(b2([0, 0], [3, 3]), IntVector::one()).unwrap()
}

/// A quarter turn plus translation that lays block 1's `[0,3]^2` patch
/// alongside the destination patch, covering cells `[4,7] x [0,3]`.
fn quarter_turn_interface() -> Transformation<2> {
    let rotation = Rotation::new([(1, true), (0, false)]).unwrap();
    Transformation::new(rotation, IntVector::new([8, 0]), BlockId(1), BlockId::ZERO)
}

#[test]
fn rotated_and_untransformed_interfaces_agree() {
    let dst = dst_geometry();
    let fill = dst.ghost_box();

    // the same neighbor, described without any transformation...
    let plain_src = SideGeometry::new(b2([4, 0], [7, 3]), IntVector::one()).unwrap();
    let plain = dst
        .calculate_overlap(
            &plain_src,
            plain_src.patch_box(),
            &fill,
            true,
            &Transformation::identity(),
            false,
            &[],
        )
        .unwrap();

    // ...and as a patch of block 1 seen through a quarter turn
    let t = quarter_turn_interface();
    let rotated_src =
        SideGeometry::new(b2_in([0, 0], [3, 3], 1), IntVector::one()).unwrap();
    let rotated = dst
        .calculate_overlap(&rotated_src, rotated_src.patch_box(), &fill, true, &t, false, &[])
        .unwrap();

    for d in 0..2 {
        assert_eq!(rotated.boxes(d), plain.boxes(d), "direction {d}");
    }
    assert_eq!(plain.boxes(0), &[b2([4, 0], [5, 3])]);
    assert_eq!(plain.boxes(1), &[b2([4, 0], [4, 4])]);
    assert_eq!(plain.total_elements(), 8 + 5);
    assert_ne!(rotated.transformation(), plain.transformation());
}

#[test]
fn interior_sides_survive_only_when_overwriting() {
    let dst = dst_geometry();
    let src = SideGeometry::new(b2([4, 0], [7, 3]), IntVector::one()).unwrap();
    let fill = dst.ghost_box();

    let protected = dst
        .calculate_overlap(
            &src,
            src.patch_box(),
            &fill,
            false,
            &Transformation::identity(),
            false,
            &[],
        )
        .unwrap();
    // the x = 4 plane bounds destination interior cells, so protection trims
    // direction 0 to the ghost-side plane x = 5 and leaves direction 1 alone
    assert_eq!(protected.boxes(0), &[b2([5, 0], [5, 3])]);
    assert_eq!(protected.boxes(1), &[b2([4, 0], [4, 4])]);
    assert_eq!(protected.total_elements(), 4 + 5);
}

#[test]
fn restriction_clips_per_direction() {
    let dst = dst_geometry();
    let src = SideGeometry::new(b2([4, 0], [7, 3]), IntVector::one()).unwrap();
    let fill = dst.ghost_box();
    let restrict = [b2([4, 0], [7, 1])];

    let overlap = dst
        .calculate_overlap(
            &src,
            src.patch_box(),
            &fill,
            true,
            &Transformation::identity(),
            false,
            &restrict,
        )
        .unwrap();
    // cell restriction widens by one on each direction's normal axis
    assert_eq!(overlap.boxes(0), &[b2([4, 0], [5, 1])]);
    assert_eq!(overlap.boxes(1), &[b2([4, 0], [4, 2])]);
}

#[test]
fn empty_restriction_retries_unrestricted() {
    let dst = dst_geometry();
    let src = SideGeometry::new(b2([4, 0], [7, 3]), IntVector::one()).unwrap();
    let fill = dst.ghost_box();
    let far_away = [b2([20, 20], [22, 22])];

    let gave_up = dst
        .calculate_overlap(
            &src,
            src.patch_box(),
            &fill,
            true,
            &Transformation::identity(),
            false,
            &far_away,
        )
        .unwrap();
    assert!(gave_up.is_empty());

    let retried = dst
        .calculate_overlap(
            &src,
            src.patch_box(),
            &fill,
            true,
            &Transformation::identity(),
            true,
            &far_away,
        )
        .unwrap();
    assert!(!retried.is_empty());
    assert_eq!(retried.total_elements(), 8 + 5);
}

#[test]
fn side_boxes_round_trip_through_the_inverse() {
    let t = quarter_turn_interface();
    let inv = t.inverse();
    for normal in 0..2 {
        for box_ in [
            b2_in([0, 0], [3, 3], 1),
            b2_in([-2, 1], [5, 1], 1),
            b2_in([4, 4], [4, 9], 1),
        ] {
            let side = SideGeometry::to_side_box(&box_, normal);
            let (mapped, mapped_normal) = SideGeometry::transform_side_box(&side, normal, &t);
            let (back, back_normal) =
                SideGeometry::transform_side_box(&mapped, mapped_normal, &inv);
            assert_eq!(back, side);
            assert_eq!(back_normal, normal);
        }
    }
}

#[test]
fn overlaps_from_either_side_map_onto_each_other() {
    let dst = dst_geometry();
    let src = SideGeometry::new(b2_in([0, 0], [3, 3], 1), IntVector::one()).unwrap();
    let t = quarter_turn_interface();

    // the same interface computed from each end, with the mask and fill
    // operands mirroring each other
    let forward = dst
        .calculate_overlap(&src, &src.ghost_box(), &dst.ghost_box(), true, &t, false, &[])
        .unwrap();
    let reverse = src
        .calculate_overlap(
            &dst,
            &dst.ghost_box(),
            &src.ghost_box(),
            true,
            &t.inverse(),
            false,
            &[],
        )
        .unwrap();

    assert_eq!(forward.boxes(0), &[b2([3, -1], [5, 4])]);
    assert_eq!(forward.boxes(1), &[b2([3, -1], [4, 5])]);
    assert_eq!(reverse.boxes(0), &[b2_in([-1, 3], [5, 4], 1)]);
    assert_eq!(reverse.boxes(1), &[b2_in([-1, 3], [4, 5], 1)]);
    assert_eq!(forward.total_elements(), 18 + 14);
    assert_eq!(reverse.total_elements(), forward.total_elements());

    // every reverse box carried through the transformation lands exactly on
    // the forward boxes of the image direction
    for normal in 0..2 {
        let mapped: Vec<_> = reverse
            .boxes(normal)
            .iter()
            .map(|b| SideGeometry::transform_side_box(b, normal, &t))
            .collect();
        let image = t.rotation().image_axis(normal);
        let expected: Vec<_> = forward.boxes(image).iter().map(|b| (*b, image)).collect();
        assert_eq!(mapped, expected, "normal {normal}");
    }
}

#[test]
fn cell_boxes_expand_per_direction() {
    let overlap = SideOverlap::from_cell_boxes(&[b2([4, 0], [4, 3])], Transformation::identity());
    assert_eq!(overlap.boxes(0), &[b2([4, 0], [5, 3])]);
    assert_eq!(overlap.boxes(1), &[b2([4, 0], [4, 4])]);
    assert_eq!(overlap.total_elements(), 8 + 5);
}

#[test]
fn mismatched_blocks_are_rejected() {
    let dst = dst_geometry();
    let src_in_block_1 =
        SideGeometry::new(b2_in([0, 0], [3, 3], 1), IntVector::one()).unwrap();
    // identity claims block 0 -> block 0, but the source sits in block 1
    let err = dst
        .calculate_overlap(
            &src_in_block_1,
            src_in_block_1.patch_box(),
            &dst.ghost_box(),
            true,
            &Transformation::identity(),
            false,
            &[],
        )
        .unwrap_err();
    assert!(matches!(err, amr_decomp::DecompError::BlockMismatch(_)));
}
