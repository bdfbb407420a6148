use brisk_cli::{Brisk, BriskBuilder, BriskError, BriskImage, BriskKeypoint, Config};
use brisk_descriptor::DescriptorError;

fn create_test_config(n_threads: usize) -> Config {
    Config {
        threshold: 30.0,
        octaves: 3,
        n_threads,
        ..Config::default()
    }
}

fn create_square_image(size: usize, x0: usize, side: usize) -> BriskImage {
    BriskImage::from_fn(size, size, |x, y| {
        if (x0..x0 + side).contains(&x) && (x0..x0 + side).contains(&y) {
            220
        } else {
            30
        }
    })
}

/// Square plus a small off-centre bar so the scene has no 180° symmetry
fn create_scene(size: usize) -> BriskImage {
    BriskImage::from_fn(size, size, |x, y| {
        let square = (64..128).contains(&x) && (64..128).contains(&y);
        let bar = (40..58).contains(&x) && (140..150).contains(&y);
        if square {
            210
        } else if bar {
            160
        } else {
            35
        }
    })
}

/// 64x64 background with a 12x12 bright square centred at (32, 32)
fn create_centred_square() -> BriskImage {
    create_square_image(64, 26, 12)
}

fn create_default_pipeline() -> Brisk {
    Brisk::new(Config {
        n_threads: 2,
        ..Config::default()
    })
    .unwrap()
}

fn hamming(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

#[test]
fn test_bright_square_yields_clustered_keypoints() {
    let brisk = Brisk::new(create_test_config(2)).unwrap();
    let img = create_square_image(64, 20, 24);

    let detected = brisk.detect(&img).unwrap();
    assert!(!detected.is_empty());
    for kp in &detected {
        assert!(kp.x > 8.0 && kp.x < 56.0 && kp.y > 8.0 && kp.y < 56.0, "{kp:?}");
    }

    let (kept, descriptors) = brisk.describe(&img, &detected).unwrap();
    assert!(kept.len() <= detected.len());
    assert_eq!(kept.len(), descriptors.len());
    for row in descriptors.rows() {
        assert_eq!(row.len(), 64);
        assert_eq!(hamming(row, row), 0);
    }
}

#[test]
fn test_centred_square_is_found_at_its_corners() {
    let brisk = create_default_pipeline();
    let img = create_centred_square();

    // corner scores vanish inside the flat square, so nothing lands on its centre
    let detected = brisk.detect(&img).unwrap();
    assert_eq!(detected.len(), 26);
    for kp in &detected {
        assert!(kp.x > 18.0 && kp.x < 46.0 && kp.y > 18.0 && kp.y < 46.0, "{kp:?}");
        assert!((kp.x - 32.0).abs() > 1.0 || (kp.y - 32.0).abs() > 1.0, "{kp:?}");
    }
    for (cx, cy) in [(26.0, 26.0), (37.0, 26.0), (26.0, 37.0), (37.0, 37.0)] {
        assert!(
            detected
                .iter()
                .any(|kp| kp.layer == 0 && (kp.x - cx).abs() < 2.0 && (kp.y - cy).abs() < 2.0),
            "no keypoint near ({cx}, {cy})"
        );
    }

    let (kept, descriptors) = brisk.describe(&img, &detected).unwrap();
    assert_eq!(kept.len(), 12);
    assert_eq!(descriptors.len(), 12);
}

#[test]
fn test_centred_square_survives_half_turn() {
    let brisk = create_default_pipeline();
    let img = create_centred_square();
    let rotated = img.rotate180();
    let (kps_a, desc_a) = brisk.detect_and_describe(&img).unwrap();
    let (kps_b, desc_b) = brisk.detect_and_describe(&rotated).unwrap();
    assert!(!kps_a.is_empty());

    let mut matches = 0;
    for (i, a) in kps_a.iter().enumerate() {
        let (mx, my) = (63.0 - a.x, 63.0 - a.y);
        let offset = |b: &BriskKeypoint| (b.x - mx).abs().max((b.y - my).abs());
        let Some((j, _)) = kps_b
            .iter()
            .enumerate()
            .filter(|(_, b)| b.layer == a.layer && offset(b) < 1.0)
            .min_by(|(_, p), (_, q)| offset(p).total_cmp(&offset(q)))
        else {
            continue;
        };
        let turn = (kps_b[j].angle - a.angle).rem_euclid(360.0);
        assert!((turn - 180.0).abs() < 3.0, "angle difference {turn} at {a:?}");
        let distance = hamming(desc_a.row(i).unwrap(), desc_b.row(j).unwrap());
        assert!(distance < 16, "hamming distance {distance} at {a:?}");
        matches += 1;
    }
    assert!(matches > 0);
}

#[test]
fn test_square_corners_are_described() {
    let brisk = Brisk::new(create_test_config(2)).unwrap();
    let img = create_square_image(160, 48, 64);
    let (keypoints, descriptors) = brisk.detect_and_describe(&img).unwrap();

    assert!(!keypoints.is_empty());
    assert_eq!(keypoints.len(), descriptors.len());
    assert_eq!(descriptors.as_bytes().len(), keypoints.len() * brisk.descriptor_bytes());
    for kp in &keypoints {
        assert!((0.0..360.0).contains(&kp.angle));
        assert!(kp.response > 30.0);
    }
}

#[test]
fn test_rotated_scene_matches() {
    let brisk = Brisk::new(create_test_config(2)).unwrap();
    let img = create_scene(192);
    let rotated = img.rotate180();
    let (kps_a, desc_a) = brisk.detect_and_describe(&img).unwrap();
    let (kps_b, desc_b) = brisk.detect_and_describe(&rotated).unwrap();
    assert!(!kps_a.is_empty() && !kps_b.is_empty());

    let mirror = |kp: &BriskKeypoint| (191.0 - kp.x, 191.0 - kp.y);
    let mut matches = 0;
    for (i, a) in kps_a.iter().enumerate() {
        let (mx, my) = mirror(a);
        let Some((j, b)) = kps_b
            .iter()
            .enumerate()
            .filter(|(_, b)| b.layer == a.layer)
            .find(|(_, b)| (b.x - mx).abs() < 2.0 && (b.y - my).abs() < 2.0)
        else {
            continue;
        };
        let turn = (b.angle - a.angle).rem_euclid(360.0);
        let distance = hamming(desc_a.row(i).unwrap(), desc_b.row(j).unwrap());
        if (turn - 180.0).abs() < 3.0 && distance < 16 {
            matches += 1;
        }
    }
    assert!(matches > 0, "no consistent match among {} keypoints", kps_a.len());
}

#[test]
fn test_extreme_images_yield_nothing() {
    let brisk = Brisk::new(create_test_config(2)).unwrap();
    for value in [0u8, 255] {
        let img = BriskImage::from_fn(80, 80, |_, _| value);
        let (keypoints, descriptors) = brisk.detect_and_describe(&img).unwrap();
        assert!(keypoints.is_empty());
        assert!(descriptors.is_empty());
    }
}

#[test]
fn test_output_is_independent_of_thread_count() {
    let img = create_scene(192);
    let single = Brisk::new(create_test_config(1)).unwrap().detect_and_describe(&img).unwrap();
    let multi = Brisk::new(create_test_config(4)).unwrap().detect_and_describe(&img).unwrap();
    assert_eq!(single.0, multi.0);
    assert_eq!(single.1, multi.1);
}

#[test]
fn test_upright_pipeline_leaves_angles_unset() {
    let brisk = BriskBuilder::new()
        .threshold(30.0)
        .octaves(2)
        .rotation_invariant(false)
        .threads(2)
        .build()
        .unwrap();
    let (keypoints, _) = brisk.detect_and_describe(&create_scene(192)).unwrap();
    assert!(!keypoints.is_empty());
    assert!(keypoints.iter().all(|kp| !kp.has_angle()));
}

#[test]
fn test_short_permutation_is_a_configuration_error() {
    let result = BriskBuilder::new().short_pair_permutation(vec![0, 1, 2]).build();
    assert!(matches!(
        result,
        Err(BriskError::Descriptor(DescriptorError::PermutationTooShort { len: 3, .. }))
    ));
}
