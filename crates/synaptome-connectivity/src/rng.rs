// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Seeded random streams keyed by canonical indices.

Every stream is a ChaCha8 generator whose key comes from the global seed and
whose 64-bit stream id is an xxh64 hash of a [`StreamKey`]. Because a key only
names the connect call, the purpose and a canonical index, two ranks that
need the numbers for the same candidate edge always build the same stream,
no matter how the edges were partitioned.

Per-pair draws seek inside the target's topology stream instead of building
a generator per pair: pair `(j, i)` reads the two words at position `2 * i`.
*/

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use xxhash_rust::xxh64::Xxh64;

/// What a stream is used for; part of the stream key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamPurpose {
    /// Which candidates become edges
    Topology = 0,
    /// Weight and delay draws of one edge
    Parameters = 1,
    /// Draws shared by every thread of every rank
    Global = 2,
}

/// Partition-independent stream address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamKey {
    pub call: u64,
    pub purpose: StreamPurpose,
    pub index: u64,
}

impl StreamKey {
    pub fn topology(call: u64, index: u64) -> Self {
        Self {
            call,
            purpose: StreamPurpose::Topology,
            index,
        }
    }

    pub fn parameters(call: u64, ordinal: u64) -> Self {
        Self {
            call,
            purpose: StreamPurpose::Parameters,
            index: ordinal,
        }
    }

    pub fn global(call: u64) -> Self {
        Self {
            call,
            purpose: StreamPurpose::Global,
            index: 0,
        }
    }
}

/// Factory for seeded streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededStreams {
    seed: u64,
}

impl SeededStreams {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    fn stream_id(&self, key: StreamKey) -> u64 {
        let mut hasher = Xxh64::new(self.seed);
        hasher.update(&key.call.to_le_bytes());
        hasher.update(&[key.purpose as u8]);
        hasher.update(&key.index.to_le_bytes());
        hasher.digest()
    }

    /// Fresh generator for `key`, positioned at its first word
    pub fn stream(&self, key: StreamKey) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(self.stream_id(key));
        rng
    }

    /// Per-pair substreams of the target at `target_position`
    pub fn pair_stream(&self, call: u64, target_position: u64) -> PairStream {
        PairStream {
            rng: self.stream(StreamKey::topology(call, target_position)),
        }
    }

    /// Uniform in `[0, 1)` for the pair (target position, source position)
    pub fn pair_uniform(&self, call: u64, target_position: u64, source_position: u64) -> f64 {
        self.pair_stream(call, target_position)
            .uniform(source_position)
    }
}

/// Seekable topology stream of one target
pub struct PairStream {
    rng: ChaCha8Rng,
}

impl PairStream {
    /// Uniform in `[0, 1)` for the source at `source_position`
    pub fn uniform(&mut self, source_position: u64) -> f64 {
        self.rng.set_word_pos(2 * u128::from(source_position));
        self.rng.gen::<f64>()
    }
}
