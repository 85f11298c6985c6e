// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Connection builder - turns one connect call into per-thread pending buffers.

Everything checked in [`ConnectionBuilder::new`] depends only on inputs that
are identical on every rank, so either every rank fails there or none does.
Planning itself runs per local thread and may still fail (a drawn delay below
the resolution, say); the kernel reconciles those failures across ranks
before committing anything.
*/

use crate::parameters::{EdgeContext, ParameterSpec};
use crate::rng::{SeededStreams, StreamKey};
use crate::rules::{self, Candidate, ConnSpec, Position, RuleContext};
use crate::synapse::{SynSpec, SynapseModelRegistry};
use crate::types::{ConnectError, ConnectResult};
use ahash::AHashMap;
use rand_chacha::ChaCha8Rng;
use synaptome_runtime::{CreationIndex, NewConnection, SynapseModelId};
use synaptome_structures::{NodeCollection, NodeId, VirtualProcessMap};
use tracing::debug;

/// Kernel state a build reads
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    pub vp_map: &'a VirtualProcessMap,
    pub streams: &'a SeededStreams,
    pub synapse_models: &'a SynapseModelRegistry,
    pub positions: &'a AHashMap<NodeId, Position>,
    pub resolution: f64,
    pub rank: usize,
    /// Index of this connect call on the kernel
    pub call: u64,
}

pub struct ConnectionBuilder<'a> {
    env: BuildContext<'a>,
    sources: &'a NodeCollection,
    targets: &'a NodeCollection,
    source_ids: Vec<NodeId>,
    target_ids: Vec<NodeId>,
    conn_spec: &'a ConnSpec,
    syn_spec: &'a SynSpec,
    synapse_model: SynapseModelId,
}

impl<'a> ConnectionBuilder<'a> {
    /// Resolve the synapse model and run every rank-independent check
    pub fn new(
        env: BuildContext<'a>,
        sources: &'a NodeCollection,
        targets: &'a NodeCollection,
        conn_spec: &'a ConnSpec,
        syn_spec: &'a SynSpec,
    ) -> ConnectResult<Self> {
        let synapse_model = env.synapse_models.lookup(&syn_spec.model)?;
        let builder = Self {
            env,
            sources,
            targets,
            source_ids: sources.iter().collect(),
            target_ids: targets.iter().collect(),
            conn_spec,
            syn_spec,
            synapse_model,
        };
        builder.validate()?;
        Ok(builder)
    }

    pub fn synapse_model(&self) -> SynapseModelId {
        self.synapse_model
    }

    fn rule_context(&self) -> RuleContext<'_> {
        RuleContext {
            sources: self.sources,
            targets: self.targets,
            source_ids: &self.source_ids,
            target_ids: &self.target_ids,
            vp_map: self.env.vp_map,
            streams: self.env.streams,
            call: self.env.call,
            autapses: self.conn_spec.autapses,
            multapses: self.conn_spec.multapses,
            positions: self.env.positions,
        }
    }

    fn validate(&self) -> ConnectResult<()> {
        let rule = &self.conn_spec.rule;
        rules::validate(&self.rule_context(), rule)?;

        let homogeneous = self
            .env
            .synapse_models
            .info(self.synapse_model)
            .is_some_and(|m| m.homogeneous_weight);
        if homogeneous && !matches!(self.syn_spec.weight, ParameterSpec::Constant(_)) {
            return Err(ConnectError::BadParameter(format!(
                "{} requires a constant weight",
                self.syn_spec.model
            )));
        }

        for (name, spec) in [("weight", &self.syn_spec.weight), ("delay", &self.syn_spec.delay)] {
            spec.validate(name)?;
            if matches!(spec, ParameterSpec::DistanceLinear { .. }) && !rule.is_spatial() {
                return Err(ConnectError::BadParameter(format!(
                    "{name}: distance_linear needs the spatial rule, not {}",
                    rule.name()
                )));
            }
            if let ParameterSpec::Array(values) = spec {
                self.validate_array(name, values.len())?;
            }
        }

        if let ParameterSpec::Constant(delay) = self.syn_spec.delay {
            self.check_delay(delay)?;
        }
        Ok(())
    }

    fn validate_array(&self, name: &str, len: usize) -> ConnectResult<()> {
        let rule = &self.conn_spec.rule;
        if self.env.vp_map.num_ranks() > 1 {
            return Err(ConnectError::NotImplemented(format!(
                "{name}: array-valued parameters with more than one rank"
            )));
        }
        match rule.ordinal_space(self.source_ids.len(), self.target_ids.len()) {
            None => Err(ConnectError::BadParameter(format!(
                "{name}: array values need a rule with a fixed edge count, not {}",
                rule.name()
            ))),
            Some(expected) if expected != len as u64 => Err(ConnectError::BadParameter(format!(
                "{name}: {} rule needs {expected} values, got {len}",
                rule.name()
            ))),
            Some(_) => Ok(()),
        }
    }

    fn check_delay(&self, delay: f64) -> ConnectResult<()> {
        if !delay.is_finite() || delay < self.env.resolution {
            return Err(ConnectError::BadDelay {
                delay,
                resolution: self.env.resolution,
            });
        }
        Ok(())
    }

    /// Value of `spec` for one edge; the edge's parameter stream is created
    /// on first use and shared by weight and delay
    fn resolve_value(
        &self,
        spec: &ParameterSpec,
        edge: EdgeContext,
        rng: &mut Option<ChaCha8Rng>,
    ) -> ConnectResult<f64> {
        if let Some(value) = spec.fixed_value(edge)? {
            return Ok(value);
        }
        let streams = self.env.streams;
        let call = self.env.call;
        let rng = rng.get_or_insert_with(|| streams.stream(StreamKey::parameters(call, edge.ordinal)));
        spec.sample(rng, edge)
    }

    fn resolve(&self, candidate: Candidate) -> ConnectResult<NewConnection> {
        let edge = EdgeContext {
            ordinal: candidate.ordinal,
            distance: candidate.distance,
        };
        let mut rng = None;
        let weight = self.resolve_value(&self.syn_spec.weight, edge, &mut rng)?;
        let delay = self.resolve_value(&self.syn_spec.delay, edge, &mut rng)?;
        if !weight.is_finite() {
            return Err(ConnectError::BadParameter(format!(
                "weight {weight} of edge {} -> {} is not finite",
                candidate.source, candidate.target
            )));
        }
        self.check_delay(delay)?;
        Ok(NewConnection {
            source: candidate.source,
            target: candidate.target,
            synapse_model: self.synapse_model,
            weight,
            delay,
            creation: CreationIndex {
                call: self.env.call,
                ordinal: candidate.ordinal,
            },
        })
    }

    /// Pending connections of one local thread
    pub fn plan_thread(&self, thread: usize) -> ConnectResult<Vec<NewConnection>> {
        let vp = self.env.vp_map.vp_for(self.env.rank, thread);
        let candidates = rules::plan(&self.rule_context(), &self.conn_spec.rule, vp);
        let pending = candidates
            .into_iter()
            .map(|c| self.resolve(c))
            .collect::<ConnectResult<Vec<_>>>()?;
        debug!(
            target: "synaptome-connectivity",
            "[CONNECT] call {} rank {} thread {}: {} pending {} connections",
            self.env.call,
            self.env.rank,
            thread,
            pending.len(),
            self.conn_spec.rule.name()
        );
        Ok(pending)
    }

    /// Pending connections of every local thread, indexed by thread
    ///
    /// On failure the error of the lowest failing thread is returned.
    pub fn plan(&self) -> ConnectResult<Vec<Vec<NewConnection>>> {
        let threads = self.env.vp_map.threads_per_rank();

        #[cfg(feature = "parallel")]
        let per_thread: Vec<ConnectResult<Vec<NewConnection>>> = {
            use rayon::prelude::*;
            (0..threads)
                .into_par_iter()
                .map(|thread| self.plan_thread(thread))
                .collect()
        };

        #[cfg(not(feature = "parallel"))]
        let per_thread: Vec<ConnectResult<Vec<NewConnection>>> = (0..threads)
            .map(|thread| self.plan_thread(thread))
            .collect();

        per_thread.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Autapses, ConnRule, Multapses};

    struct Env {
        vp_map: VirtualProcessMap,
        streams: SeededStreams,
        models: SynapseModelRegistry,
        positions: AHashMap<NodeId, Position>,
    }

    impl Env {
        fn new(ranks: usize, threads: usize) -> Self {
            Self {
                vp_map: VirtualProcessMap::new(ranks, threads).unwrap(),
                streams: SeededStreams::new(99),
                models: SynapseModelRegistry::builtin(),
                positions: AHashMap::new(),
            }
        }

        fn ctx(&self, rank: usize) -> BuildContext<'_> {
            BuildContext {
                vp_map: &self.vp_map,
                streams: &self.streams,
                synapse_models: &self.models,
                positions: &self.positions,
                resolution: 0.1,
                rank,
                call: 0,
            }
        }
    }

    fn nodes(first: u64, last: u64) -> NodeCollection {
        NodeCollection::from_range(first, last).unwrap()
    }

    fn spec(rule: ConnRule) -> ConnSpec {
        ConnSpec::new(rule, Autapses::Allow, Multapses::Allow)
    }

    #[test]
    fn test_unknown_model_rejected() {
        let env = Env::new(1, 1);
        let (s, t) = (nodes(1, 2), nodes(1, 2));
        let conn = spec(ConnRule::AllToAll);
        let syn = SynSpec::new("no_such_synapse");
        assert!(matches!(
            ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &syn),
            Err(ConnectError::UnknownSynapseModel(_))
        ));
    }

    #[test]
    fn test_constant_delay_below_resolution() {
        let env = Env::new(1, 1);
        let (s, t) = (nodes(1, 2), nodes(1, 2));
        let conn = spec(ConnRule::AllToAll);
        let syn = SynSpec::default().with_delay(0.05);
        assert_eq!(
            ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &syn).err(),
            Some(ConnectError::BadDelay {
                delay: 0.05,
                resolution: 0.1
            })
        );
    }

    #[test]
    fn test_drawn_delay_below_resolution_fails_planning() {
        let env = Env::new(1, 2);
        let (s, t) = (nodes(1, 10), nodes(1, 10));
        let conn = spec(ConnRule::AllToAll);
        let syn = SynSpec::default().with_delay(ParameterSpec::Uniform { low: 0.0, high: 1.0 });
        let builder = ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &syn).unwrap();
        assert!(matches!(builder.plan(), Err(ConnectError::BadDelay { .. })));
    }

    #[test]
    fn test_array_parameters() {
        let env = Env::new(1, 2);
        let (s, t) = (nodes(1, 3), nodes(4, 6));
        let conn = spec(ConnRule::OneToOne);
        let syn = SynSpec::default().with_weight(ParameterSpec::Array(vec![0.5, 1.5, 2.5]));
        let builder = ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &syn).unwrap();
        let mut all: Vec<NewConnection> = builder.plan().unwrap().into_iter().flatten().collect();
        all.sort_by_key(|c| c.creation);
        let weights: Vec<f64> = all.iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![0.5, 1.5, 2.5]);

        let short = SynSpec::default().with_weight(ParameterSpec::Array(vec![0.5]));
        assert!(matches!(
            ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &short),
            Err(ConnectError::BadParameter(_))
        ));

        let bernoulli = spec(ConnRule::PairwiseBernoulli { p: 0.5 });
        assert!(matches!(
            ConnectionBuilder::new(env.ctx(0), &s, &t, &bernoulli, &syn),
            Err(ConnectError::BadParameter(_))
        ));
    }

    #[test]
    fn test_array_parameters_refused_with_many_ranks() {
        let env = Env::new(2, 1);
        let (s, t) = (nodes(1, 3), nodes(4, 6));
        let conn = spec(ConnRule::OneToOne);
        let syn = SynSpec::default().with_delay(ParameterSpec::Array(vec![1.0, 2.0, 3.0]));
        assert!(matches!(
            ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &syn),
            Err(ConnectError::NotImplemented(_))
        ));
    }

    #[test]
    fn test_homogeneous_weight_model_needs_constant() {
        let env = Env::new(1, 1);
        let (s, t) = (nodes(1, 2), nodes(1, 2));
        let conn = spec(ConnRule::AllToAll);
        let syn = SynSpec::new("static_synapse_hom_w")
            .with_weight(ParameterSpec::Normal { mean: 1.0, std: 0.1 });
        assert!(matches!(
            ConnectionBuilder::new(env.ctx(0), &s, &t, &conn, &syn),
            Err(ConnectError::BadParameter(_))
        ));
    }

    #[test]
    fn test_random_parameters_independent_of_partition() {
        let (s, t) = (nodes(1, 12), nodes(1, 12));
        let conn = spec(ConnRule::FixedIndegree { indegree: 4 });
        let syn = SynSpec::default()
            .with_weight(ParameterSpec::Normal { mean: 0.0, std: 1.0 })
            .with_delay(ParameterSpec::Uniform { low: 0.5, high: 2.5 });

        let collect = |ranks: usize, threads: usize| {
            let env = Env::new(ranks, threads);
            let mut all: Vec<NewConnection> = (0..ranks)
                .flat_map(|rank| {
                    ConnectionBuilder::new(env.ctx(rank), &s, &t, &conn, &syn)
                        .unwrap()
                        .plan()
                        .unwrap()
                        .into_iter()
                        .flatten()
                })
                .collect();
            all.sort_by_key(|c| c.creation);
            all
        };

        let reference = collect(1, 1);
        assert_eq!(reference.len(), 48);
        assert_eq!(collect(2, 1), reference);
        assert_eq!(collect(2, 3), reference);
        assert_eq!(collect(4, 1), reference);
    }
}
