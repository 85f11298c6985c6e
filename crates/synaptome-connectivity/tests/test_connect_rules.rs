// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Connection rule tests against a single-rank kernel.
//!
//! Every rule must produce the same table for any thread count.

use ahash::AHashMap;
use proptest::prelude::*;
use std::sync::Arc;
use synaptome_config::KernelConfig;
use synaptome_connectivity::{
    Autapses, ConnRule, ConnSpec, ConnectError, ConnectionQuery, ConnectivityKernel,
    DistanceKernel, Mask, Multapses, ParameterSpec, Position, SingleProcess, SpatialRule, SynSpec,
};
use synaptome_structures::{NodeCollection, NodeId};

fn create_kernel(threads: usize, seed: u64) -> ConnectivityKernel {
    let mut config = KernelConfig::with_partition(1, threads);
    config.rng_seed = seed;
    ConnectivityKernel::new(config, Arc::new(SingleProcess)).expect("Failed to create kernel")
}

fn random_syn() -> SynSpec {
    SynSpec::default()
        .with_weight(ParameterSpec::Normal {
            mean: 0.0,
            std: 1.0,
        })
        .with_delay(ParameterSpec::Uniform {
            low: 1.0,
            high: 3.0,
        })
}

/// CSV export of `rule` applied to `n` nodes onto themselves
fn build_csv(threads: usize, n: u64, conn: &ConnSpec, syn: &SynSpec) -> String {
    let mut kernel = create_kernel(threads, 12345);
    let nodes = kernel.create_nodes(n).unwrap();
    kernel.connect(&nodes, &nodes, conn, syn).unwrap();
    kernel.export_table(&ConnectionQuery::all()).unwrap().to_csv().unwrap()
}

fn all_rules() -> Vec<ConnSpec> {
    vec![
        ConnSpec::new(ConnRule::OneToOne, Autapses::Allow, Multapses::Allow),
        ConnSpec::new(ConnRule::AllToAll, Autapses::Forbid, Multapses::Allow),
        ConnSpec::new(
            ConnRule::FixedIndegree { indegree: 5 },
            Autapses::Forbid,
            Multapses::Forbid,
        ),
        ConnSpec::new(
            ConnRule::FixedIndegree { indegree: 5 },
            Autapses::Allow,
            Multapses::Allow,
        ),
        ConnSpec::new(
            ConnRule::FixedOutdegree { outdegree: 4 },
            Autapses::Forbid,
            Multapses::Forbid,
        ),
        ConnSpec::new(
            ConnRule::FixedTotalNumber { n: 57 },
            Autapses::Allow,
            Multapses::Allow,
        ),
        ConnSpec::new(
            ConnRule::PairwiseBernoulli { p: 0.3 },
            Autapses::Forbid,
            Multapses::Allow,
        ),
    ]
}

#[test]
fn test_every_rule_is_thread_invariant() {
    let syn = random_syn();
    for conn in all_rules() {
        let reference = build_csv(1, 24, &conn, &syn);
        for threads in [3, 4] {
            assert_eq!(
                build_csv(threads, 24, &conn, &syn),
                reference,
                "{} differs with {threads} threads",
                conn.rule.name()
            );
        }
    }
}

/// CSV export of a masked spatial rule on a 6x6 grid with distance-dependent delays
fn build_spatial_csv(threads: usize) -> String {
    let mut kernel = create_kernel(threads, 12345);
    let grid: Vec<Position> = (0..36)
        .map(|i| Position::planar((i % 6) as f64 * 0.5, (i / 6) as f64 * 0.5))
        .collect();
    let layer = kernel.create_spatial_nodes(&grid).unwrap();
    let rule = SpatialRule::new(0.8, DistanceKernel::Exponential { tau: 1.0 })
        .with_mask(Mask::Circular { radius: 1.2 });
    let conn = ConnSpec::new(ConnRule::Spatial(rule), Autapses::Forbid, Multapses::Allow);
    let syn = SynSpec::default()
        .with_weight(ParameterSpec::Normal {
            mean: 0.0,
            std: 1.0,
        })
        .with_delay(ParameterSpec::DistanceLinear {
            offset: 1.0,
            slope: 0.5,
        });
    kernel.connect(&layer, &layer, &conn, &syn).unwrap();
    kernel.export_table(&ConnectionQuery::all()).unwrap().to_csv().unwrap()
}

#[test]
fn test_spatial_rule_is_thread_invariant() {
    let reference = build_spatial_csv(1);
    assert!(reference.lines().count() > 36);
    for threads in [2, 3, 5] {
        assert_eq!(
            build_spatial_csv(threads),
            reference,
            "spatial differs with {threads} threads"
        );
    }
}

#[test]
fn test_fixed_indegree_counts() {
    let mut kernel = create_kernel(3, 7);
    let nodes = kernel.create_nodes(40).unwrap();
    let conn = ConnSpec::new(
        ConnRule::FixedIndegree { indegree: 6 },
        Autapses::Forbid,
        Multapses::Forbid,
    );
    kernel.connect(&nodes, &nodes, &conn, &SynSpec::default()).unwrap();

    let views = kernel.get_connections(&ConnectionQuery::all()).unwrap();
    assert_eq!(views.len(), 240);

    let mut per_target: AHashMap<NodeId, Vec<NodeId>> = AHashMap::new();
    for v in &views {
        assert_ne!(v.source, v.target);
        per_target.entry(v.target).or_default().push(v.source);
    }
    for (_, mut sources) in per_target {
        assert_eq!(sources.len(), 6);
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), 6);
    }
}

#[test]
fn test_fixed_outdegree_counts() {
    let mut kernel = create_kernel(4, 99);
    let nodes = kernel.create_nodes(20).unwrap();
    let conn = ConnSpec::new(
        ConnRule::FixedOutdegree { outdegree: 3 },
        Autapses::Forbid,
        Multapses::Forbid,
    );
    kernel.connect(&nodes, &nodes, &conn, &SynSpec::default()).unwrap();

    let mut per_source: AHashMap<NodeId, usize> = AHashMap::new();
    for v in kernel.get_connections(&ConnectionQuery::all()).unwrap() {
        *per_source.entry(v.source).or_insert(0) += 1;
    }
    assert_eq!(per_source.len(), 20);
    assert!(per_source.values().all(|&n| n == 3));
}

#[test]
fn test_fixed_total_number_single_edge() {
    let mut kernel = create_kernel(4, 3);
    let nodes = kernel.create_nodes(4).unwrap();
    let conn = ConnSpec::new(
        ConnRule::FixedTotalNumber { n: 1 },
        Autapses::Allow,
        Multapses::Allow,
    );
    kernel.connect(&nodes, &nodes, &conn, &SynSpec::default()).unwrap();
    assert_eq!(kernel.num_connections().unwrap(), 1);
    let stored: usize = kernel.registries().iter().map(|r| r.iter().count()).sum();
    assert_eq!(stored, 1);
}

#[test]
fn test_fixed_total_number_without_multapses_is_a_set() {
    let mut kernel = create_kernel(2, 3);
    let nodes = kernel.create_nodes(5).unwrap();
    let conn = ConnSpec::new(
        ConnRule::FixedTotalNumber { n: 20 },
        Autapses::Forbid,
        Multapses::Forbid,
    );
    kernel.connect(&nodes, &nodes, &conn, &SynSpec::default()).unwrap();
    let views = kernel.get_connections(&ConnectionQuery::all()).unwrap();
    assert_eq!(views.len(), 20);

    let too_many = ConnSpec::new(
        ConnRule::FixedTotalNumber { n: 21 },
        Autapses::Forbid,
        Multapses::Forbid,
    );
    assert!(matches!(
        kernel.connect(&nodes, &nodes, &too_many, &SynSpec::default()),
        Err(ConnectError::InvalidDegree(_))
    ));
}

#[test]
fn test_bernoulli_extremes() {
    let mut kernel = create_kernel(2, 1);
    let nodes = kernel.create_nodes(6).unwrap();
    let never = ConnSpec::new(
        ConnRule::PairwiseBernoulli { p: 0.0 },
        Autapses::Allow,
        Multapses::Allow,
    );
    let always = ConnSpec::new(
        ConnRule::PairwiseBernoulli { p: 1.0 },
        Autapses::Allow,
        Multapses::Allow,
    );
    kernel.connect(&nodes, &nodes, &never, &SynSpec::default()).unwrap();
    assert_eq!(kernel.num_connections().unwrap(), 0);
    kernel.connect(&nodes, &nodes, &always, &SynSpec::default()).unwrap();
    assert_eq!(kernel.num_connections().unwrap(), 36);

    let invalid = ConnSpec::new(
        ConnRule::PairwiseBernoulli { p: 1.5 },
        Autapses::Allow,
        Multapses::Allow,
    );
    assert!(kernel.connect(&nodes, &nodes, &invalid, &SynSpec::default()).is_err());
    assert_eq!(kernel.connect_calls(), 2);
}

#[test]
fn test_array_weights_follow_ordinals() {
    let mut kernel = create_kernel(3, 5);
    let sources = kernel.create_nodes(4).unwrap();
    let targets = kernel.create_nodes(4).unwrap();
    let syn = SynSpec::default().with_weight(ParameterSpec::Array(vec![0.1, 0.2, 0.3, 0.4]));
    let conn = ConnSpec::new(ConnRule::OneToOne, Autapses::Allow, Multapses::Allow);
    kernel.connect(&sources, &targets, &conn, &syn).unwrap();

    let views = kernel.get_connections(&ConnectionQuery::all()).unwrap();
    let edges: Vec<(u64, u64, f64)> = views
        .iter()
        .map(|v| (v.source.0, v.target.0, v.weight))
        .collect();
    assert_eq!(
        edges,
        vec![(1, 5, 0.1), (2, 6, 0.2), (3, 7, 0.3), (4, 8, 0.4)]
    );
}

#[test]
fn test_array_length_must_match() {
    let mut kernel = create_kernel(1, 5);
    let nodes = kernel.create_nodes(3).unwrap();
    let syn = SynSpec::default().with_weight(ParameterSpec::Array(vec![1.0; 8]));
    let conn = ConnSpec::new(ConnRule::AllToAll, Autapses::Allow, Multapses::Allow);
    assert!(matches!(
        kernel.connect(&nodes, &nodes, &conn, &syn),
        Err(ConnectError::BadParameter(_))
    ));
    assert_eq!(kernel.num_connections().unwrap(), 0);
}

#[test]
fn test_spatial_rule_respects_mask_and_kernel() {
    let mut kernel = create_kernel(3, 11);
    let grid: Vec<Position> = (0..25)
        .map(|i| Position::planar((i % 5) as f64, (i / 5) as f64))
        .collect();
    let layer = kernel.create_spatial_nodes(&grid).unwrap();
    let rule = SpatialRule::new(1.0, DistanceKernel::Gaussian { sigma: 1.0 })
        .with_mask(Mask::Circular { radius: 1.5 });
    let conn = ConnSpec::new(ConnRule::Spatial(rule), Autapses::Forbid, Multapses::Allow);
    kernel.connect(&layer, &layer, &conn, &SynSpec::default()).unwrap();

    for v in kernel.get_connections(&ConnectionQuery::all()).unwrap() {
        let a = kernel.position(v.source).unwrap();
        let b = kernel.position(v.target).unwrap();
        assert!(a.displacement_from(&b).norm() <= 1.5);
        assert_ne!(v.source, v.target);
    }
}

#[test]
fn test_spatial_rule_needs_positions() {
    let mut kernel = create_kernel(1, 11);
    let plain = kernel.create_nodes(3).unwrap();
    let conn = ConnSpec::new(
        ConnRule::Spatial(SpatialRule::new(1.0, DistanceKernel::Constant)),
        Autapses::Allow,
        Multapses::Allow,
    );
    assert!(matches!(
        kernel.connect(&plain, &plain, &conn, &SynSpec::default()),
        Err(ConnectError::BadParameter(_))
    ));
}

#[test]
fn test_seed_changes_topology() {
    let conn = ConnSpec::new(
        ConnRule::PairwiseBernoulli { p: 0.5 },
        Autapses::Allow,
        Multapses::Allow,
    );
    let build = |seed| {
        let mut kernel = create_kernel(2, seed);
        let nodes = kernel.create_nodes(30).unwrap();
        kernel.connect(&nodes, &nodes, &conn, &SynSpec::default()).unwrap();
        kernel.export_table(&ConnectionQuery::all()).unwrap().to_csv().unwrap()
    };
    assert_eq!(build(1), build(1));
    assert_ne!(build(1), build(2));
}

#[test]
fn test_composite_collections() {
    let mut kernel = create_kernel(2, 4);
    kernel.create_nodes(10).unwrap();
    let odd = NodeCollection::from_ids(vec![NodeId(1), NodeId(3), NodeId(5)]).unwrap();
    let even = NodeCollection::from_ids(vec![NodeId(2), NodeId(4), NodeId(6)]).unwrap();
    let conn = ConnSpec::new(ConnRule::OneToOne, Autapses::Allow, Multapses::Allow);
    kernel.connect(&odd, &even, &conn, &SynSpec::default()).unwrap();
    let pairs: Vec<(u64, u64)> = kernel
        .get_connections(&ConnectionQuery::all())
        .unwrap()
        .iter()
        .map(|v| (v.source.0, v.target.0))
        .collect();
    assert_eq!(pairs, vec![(1, 2), (3, 4), (5, 6)]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_indegree_total_is_n_times_k(n in 2usize..20, k in 1usize..5, threads in 1usize..5) {
        prop_assume!(k < n);
        let mut kernel = create_kernel(threads, (n * 31 + k) as u64);
        let nodes = kernel.create_nodes(n as u64).unwrap();
        let conn = ConnSpec::new(
            ConnRule::FixedIndegree { indegree: k },
            Autapses::Forbid,
            Multapses::Forbid,
        );
        kernel.connect(&nodes, &nodes, &conn, &SynSpec::default()).unwrap();
        prop_assert_eq!(kernel.num_connections().unwrap(), (n * k) as u64);
    }
}
