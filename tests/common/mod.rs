//! Shared test fixtures: a synthetic seed-kernel dataset with the same
//! shape as the real thing (7 morphological features, 3 varieties,
//! geometrically correlated size measurements).

use cultivar::data::Dataset;
use ndarray::Array2;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const FEATURES: [&str; 7] = [
    "area",
    "perimeter",
    "compactness",
    "kernel_length",
    "kernel_width",
    "asymmetry",
    "groove_length",
];

/// Generate `per_class` samples for each of 3 varieties. Area,
/// perimeter, length, and width are derived from shared size factors,
/// so they correlate strongly; every feature is continuous.
pub fn seed_like_dataset(per_class: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let base_length = [5.2, 5.6, 6.2];
    let base_width = [2.9, 3.1, 3.6];
    let base_asymmetry = [2.0, 4.0, 3.0];

    let n = 3 * per_class;
    let mut rows: Vec<[f64; 7]> = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);

    for class in 0..3 {
        for _ in 0..per_class {
            let length: f64 = base_length[class] + rng.gen_range(-0.2..0.2);
            let width: f64 = base_width[class] + rng.gen_range(-0.15..0.15);
            let area = 0.72 * length * width + rng.gen_range(-0.05..0.05);
            let perimeter = 2.09 * (length + width) + rng.gen_range(-0.08..0.08);
            let compactness =
                4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
            let asymmetry: f64 = base_asymmetry[class] + rng.gen_range(-1.2..1.2);
            let groove = length - 0.55 + rng.gen_range(-0.1..0.1);

            rows.push([
                area, perimeter, compactness, length, width, asymmetry, groove,
            ]);
            labels.push(class);
        }
    }

    let features = Array2::from_shape_fn((n, 7), |(r, c)| rows[r][c]);
    let feature_names = FEATURES.iter().map(|s| s.to_string()).collect();
    let class_names = vec![
        "canadian".to_string(),
        "kama".to_string(),
        "rosa".to_string(),
    ];

    Dataset::new(features, labels, feature_names, class_names).unwrap()
}
