// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Row-oriented export of connection views.

Only partition-independent columns are written, so the same logical query
exports identical bytes for any rank or thread count.
*/

use crate::query::ConnectionView;
use crate::synapse::SynapseModelRegistry;
use crate::types::{ConnectError, ConnectResult};
use serde::{Deserialize, Serialize};

pub const CSV_HEADER: &str = "source,target,synapse_model,weight,delay";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub source: u64,
    pub target: u64,
    pub synapse_model: String,
    pub weight: f64,
    pub delay: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTable {
    pub rows: Vec<ConnectionRow>,
}

impl ConnectionTable {
    /// Rows in the order of `views`
    pub fn from_views(views: &[ConnectionView], models: &SynapseModelRegistry) -> Self {
        let rows = views
            .iter()
            .map(|v| ConnectionRow {
                source: v.source.0,
                target: v.target.0,
                synapse_model: models.name(v.synapse_model).to_string(),
                weight: v.weight,
                delay: v.delay,
            })
            .collect();
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header plus one record per row, columns in [`CSV_HEADER`] order
    pub fn to_csv(&self) -> ConnectResult<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::with_capacity(CSV_HEADER.len() + 1 + self.rows.len() * 32));
        // Explicit so an empty table still carries the header
        writer.write_record(CSV_HEADER.split(','))?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|err| ConnectError::Export(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| ConnectError::Export(err.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.rows)
    }
}
