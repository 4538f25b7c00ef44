//! Per-file packet transformation: PDML stream in, queued rows out.

use std::io::Read;

use tracing::debug;

use crate::error::Error;
use crate::fixup::FixupEngine;
use crate::queue::RowQueue;
use crate::schema::SchemaModel;

use super::{flatten_packet, PdmlReader};

/// Counters for one transformed file.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransformStats {
    pub packets: u64,
    pub rows: u64,
}

/// Streams PDML, flattens each packet and enqueues its rows.
pub struct PacketTransformer<'a> {
    schema: &'a SchemaModel,
    fixups: &'a FixupEngine,
}

impl<'a> PacketTransformer<'a> {
    pub fn new(schema: &'a SchemaModel, fixups: &'a FixupEngine) -> Self {
        Self { schema, fixups }
    }

    /// Transform one dissected file into rows on the queue.
    ///
    /// Rows are enqueued packet by packet, geninfo row first; an error
    /// here is fatal (the writer refused the row).
    pub fn transform<R: Read>(
        &self,
        source_file: &str,
        input: R,
        queue: &RowQueue,
    ) -> Result<TransformStats, Error> {
        let mut reader = PdmlReader::new(input);
        let mut stats = TransformStats::default();
        while let Some(tree) = reader.next_packet(self.schema, self.fixups)? {
            for row in flatten_packet(&tree, source_file) {
                queue.enqueue(row)?;
                stats.rows += 1;
            }
            stats.packets += 1;
        }
        debug!(
            source_file,
            packets = stats.packets,
            rows = stats.rows,
            "file transformed"
        );
        Ok(stats)
    }
}
