pub type Index1 = usize;
pub type Index3 = [usize; 3];
pub type BoxDim = [usize; 3];

/// Signed 3d position: block origins may lie outside the image they belong to
pub type Offset3 = [isize; 3];

// ----- Flat <-> voxel indices --------------------------------------------------------
// Rasters are stored with x varying fastest.

pub fn index3_to_1([x, y, z]: Index3, [nx, ny, _]: BoxDim) -> Index1 {
    (z * ny + y) * nx + x
}

pub fn index1_to_3(i: Index1, [nx, ny, _]: BoxDim) -> Index3 {
    let (yz, x) = (i / nx, i % nx);
    [x, yz % ny, yz / ny]
}

/// Fold an arbitrary coordinate back into `0..n` by reflection about the
/// first and last sample, without repeating the edge sample:
/// `-1 -> 1`, `n -> n-2`.
pub fn mirror(i: isize, n: usize) -> usize {
    if n == 1 { return 0 }
    let n = n as isize;
    let period = 2 * (n - 1);
    let i = i.rem_euclid(period);
    (if i < n { i } else { period - i }) as usize
}


#[cfg(test)]
mod test_mirror {
    use super::*;
    use rstest::rstest;

    #[rstest(/**/ i,  n, expected,
             case( 0, 5, 0),
             case( 4, 5, 4),
             case(-1, 5, 1),
             case(-4, 5, 4),
             case(-5, 5, 3),
             case( 5, 5, 3),
             case( 8, 5, 0),
             case( 9, 5, 1),
             case(-3, 1, 0),
             case( 7, 1, 0),
             case(-1, 2, 1),
             case( 2, 2, 0),
    )]
    fn hand_picked(i: isize, n: usize, expected: usize) {
        assert_eq!(mirror(i, n), expected);
    }

    use proptest::prelude::*;

    proptest! {
        #[test]
        fn always_in_range(i in -10_000_isize..10_000, n in 1_usize..300) {
            assert!(mirror(i, n) < n);
        }

        #[test]
        fn identity_inside(n in 1_usize..300, f in 0.0..1.0_f64) {
            let i = (f * n as f64) as usize;
            assert_eq!(mirror(i as isize, n), i);
        }
    }
}
