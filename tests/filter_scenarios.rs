use ancestry_hmm::model::{retention_probability, EmissionModelBuilder, TransitionModelBuilder};
use ancestry_hmm::windows::{bin_size, window_genetic_positions};
use ancestry_hmm::prelude::*;
use ndarray::{array, Array1, Array2, Array3, Axis};

const SNP_LOCATIONS: [Position; 45] = [
    14431347, 16211813, 16989647, 17960185, 19135369, 20429295, 21053116, 21773909, 22522081,
    23704434, 24530858, 25026783, 25592569, 25979024, 26384814, 27576605, 28538608, 29525941,
    30726524, 31319141, 31887585, 32430944, 32932547, 33457979, 33936496, 34908093, 35571213,
    36162392, 37337120, 38357467, 39774632, 40982261, 41820819, 42478803, 43037663, 43632337,
    44287817, 45168693, 45771245, 46338815, 46775561, 47215631, 47719425, 48069691, 48554269,
];

fn two_population_calls() -> Array2<usize> {
    let mut raw = Array2::<usize>::zeros((45, 1));
    raw.slice_mut(ndarray::s![20.., 0]).fill(1);
    raw
}

#[test]
fn identity_model_keeps_certain_calls() {
    let transitions: Array3<f64> = Array2::eye(3).insert_axis(Axis(0));
    let emissions = EmissionModelBuilder::new(3)
        .unwrap()
        .build(&[1.0, 1.0])
        .unwrap();
    let hmm = HmmEngine::new(transitions, emissions, Array1::from_elem(3, 1.0 / 3.0)).unwrap();

    let result = hmm.infer(&[1, 1]).unwrap();
    assert_eq!(result.posteriors, array![[0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]);
    assert_eq!(result.calls, vec![1, 1]);
}

#[test]
fn zero_distance_windows_give_identity_transitions() {
    let a = TransitionModelBuilder::new(10.0, 3)
        .unwrap()
        .build(&[2.5, 2.5])
        .unwrap();
    assert_eq!(a.index_axis(Axis(0), 0), Array2::<f64>::eye(3));
}

#[test]
fn below_chance_success_rate_regression() {
    // With a success rate of 0.3 over three classes, the observed label is
    // the least likely one under its own state, so the never-observed
    // state 2 explains every window best.
    let gm = GeneticMap::from_file("tests/data/genetic_map_test.txt").unwrap();
    let filter = HmmFilter::new(gm, FilterConfig::new(10.0, 3))
        .unwrap()
        .with_posteriors(true);
    let success = vec![0.3; SNP_LOCATIONS.len()];
    let raw = two_population_calls();

    let first = filter.filter(&SNP_LOCATIONS, &success, raw.view()).unwrap();
    let second = filter.filter(&SNP_LOCATIONS, &success, raw.view()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.calls.dim(), (45, 1));
    assert!(first.calls.iter().all(|&c| c == 2));

    let posteriors = first.posteriors.unwrap();
    for row in posteriors.lanes(Axis(2)) {
        assert!((row.sum() - 1.0).abs() < 1e-9);
        assert!(row.iter().all(|&p| p >= 0.0));
    }
}

#[test]
fn accurate_classifier_recovers_tract_boundary() {
    let gm = GeneticMap::from_file("tests/data/genetic_map_test.txt").unwrap();
    let filter = HmmFilter::new(gm, FilterConfig::new(10.0, 3)).unwrap();
    let success = vec![0.9; SNP_LOCATIONS.len()];
    let raw = two_population_calls();

    let smoothed = filter.filter(&SNP_LOCATIONS, &success, raw.view()).unwrap();
    assert_eq!(smoothed.calls, raw);
}

#[test]
fn every_model_row_is_a_distribution() {
    let gm = GeneticMap::from_file("tests/data/genetic_map_test.txt").unwrap();
    let window_pos = window_genetic_positions(&gm, &SNP_LOCATIONS, 15).unwrap();
    assert_eq!(window_pos.len(), 15);
    assert!(window_pos.windows(2).all(|pair| pair[0] <= pair[1]));

    for k in 2..6 {
        let a = TransitionModelBuilder::new(7.5, k)
            .unwrap()
            .build(&window_pos)
            .unwrap();
        let success: Vec<f64> = (0..15).map(|i| i as f64 / 14.0).collect();
        let b = EmissionModelBuilder::new(k).unwrap().build(&success).unwrap();
        for row in a.lanes(Axis(2)).into_iter().chain(b.lanes(Axis(2))) {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }
}

#[test]
fn retention_falls_with_distance_and_generations() {
    let distances = [0.0, 0.001, 0.1, 1.0, 3.0, 10.0, 40.0];
    for n_gens in [1.0, 6.0, 50.0] {
        let e: Vec<f64> = distances
            .iter()
            .map(|&d| retention_probability(d, n_gens).unwrap())
            .collect();
        assert!(e.windows(2).all(|pair| pair[1] < pair[0]), "{:?}", e);
    }
    assert!(retention_probability(1.0, 10.0).unwrap() < retention_probability(1.0, 5.0).unwrap());
}

#[test]
fn ceiling_bins_cover_all_snps() {
    for n_windows in 1..=45 {
        if let Ok(size) = bin_size(45, n_windows) {
            assert!((n_windows - 1) * size < 45 && 45 <= n_windows * size);
        }
    }
    assert_eq!(bin_size(45, 9).unwrap(), 5);
    assert_eq!(bin_size(45, 8).unwrap(), 6);
    assert!(matches!(bin_size(44, 45), Err(AncestryError::Configuration(_))));
}
