//! LLM Workload Layout and Trace Emitter
//!
//! Lays a transformer model's weight matrices across the SSD's logical
//! address space and emits the read workload an inference campaign issues
//! against it. The layout is deterministic, so a compact single-iteration
//! trace replayed N times is exactly the N-token decode workload.
//!
//! Three trace shapes share one record format:
//! - **compact**: one traversal of all weights plus one compute-delay tick,
//!   meant to be replayed via the workload config's relay count
//! - **decode**: one traversal plus compute delay per generated token
//! - **full**: a prefill traversal with its longer compute delay, then the
//!   decode section

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

/// LBA granularity.
pub const SECTOR_SIZE_BYTES: u64 = 512;

const GIB: u64 = 1024 * 1024 * 1024;

/// Catalogue entry for a model whose weights get laid out on flash.
/// Sizes assume INT8 quantisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelSpec {
    pub name: &'static str,
    pub size_bytes: u64,
    pub num_layers: u32,
    pub hidden_dim: u32,
    pub weights_per_layer: u64,
}

impl ModelSpec {
    pub fn llama2_7b() -> Self {
        ModelSpec {
            name: "Llama2-7B",
            size_bytes: 7 * GIB,
            num_layers: 32,
            hidden_dim: 4096,
            weights_per_layer: 7 * GIB / 32,
        }
    }

    pub fn llama2_13b() -> Self {
        ModelSpec {
            name: "Llama2-13B",
            size_bytes: 13 * GIB,
            num_layers: 40,
            hidden_dim: 5120,
            weights_per_layer: 13 * GIB / 40,
        }
    }

    pub fn llama2_70b() -> Self {
        ModelSpec {
            name: "Llama2-70B",
            size_bytes: 70 * GIB,
            num_layers: 80,
            hidden_dim: 8192,
            weights_per_layer: 70 * GIB / 80,
        }
    }

    pub fn opt_6_7b() -> Self {
        ModelSpec {
            name: "OPT-6.7B",
            size_bytes: 7 * GIB,
            num_layers: 32,
            hidden_dim: 4096,
            weights_per_layer: 7 * GIB / 32,
        }
    }

    /// Resolve a CLI model name.
    pub fn from_cli_name(name: &str) -> Option<Self> {
        match name {
            "llama7b" => Some(Self::llama2_7b()),
            "llama13b" => Some(Self::llama2_13b()),
            "llama70b" => Some(Self::llama2_70b()),
            "opt6.7b" => Some(Self::opt_6_7b()),
            _ => None,
        }
    }
}

/// The six weight matrices of one transformer layer, in layout order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MatrixName {
    QProj,
    KProj,
    VProj,
    OProj,
    Ffn1,
    Ffn2,
}

impl MatrixName {
    /// Fixed per-layer layout order.
    pub const LAYER_ORDER: [MatrixName; 6] = [
        MatrixName::QProj,
        MatrixName::KProj,
        MatrixName::VProj,
        MatrixName::OProj,
        MatrixName::Ffn1,
        MatrixName::Ffn2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MatrixName::QProj => "Q_proj",
            MatrixName::KProj => "K_proj",
            MatrixName::VProj => "V_proj",
            MatrixName::OProj => "O_proj",
            MatrixName::Ffn1 => "FFN1",
            MatrixName::Ffn2 => "FFN2",
        }
    }
}

/// One weight matrix's home on flash. `lba_end` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightBlock {
    pub lba_start: u64,
    pub lba_end: u64,
    pub layer_id: u32,
    pub matrix: MatrixName,
}

impl WeightBlock {
    pub fn sectors(&self) -> u64 {
        self.lba_end - self.lba_start + 1
    }
}

/// Inference campaign parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub num_tokens_to_generate: u32,
    /// Prompt length processed in the prefill phase.
    pub prefill_length: u32,
    /// Always 1 for edge inference.
    pub batch_size: u32,
    /// GEMV + special-function compute delay per generated token.
    pub compute_time_per_token_us: f64,
    /// Gap between consecutive page reads within a traversal.
    pub inter_read_gap_us: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            num_tokens_to_generate: 10_000,
            prefill_length: 512,
            batch_size: 1,
            compute_time_per_token_us: 1000.0,
            inter_read_gap_us: 30,
        }
    }
}

/// Trace shape to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Compact,
    Decode,
    Full,
}

impl TraceKind {
    pub fn from_cli_name(name: &str) -> Option<Self> {
        match name {
            "compact" => Some(TraceKind::Compact),
            "decode" => Some(TraceKind::Decode),
            "full" => Some(TraceKind::Full),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("unknown model `{0}` (expected llama7b, llama13b, llama70b, or opt6.7b)")]
    UnknownModel(String),
    #[error("unknown trace type `{0}` (expected compact, decode, or full)")]
    UnknownTraceKind(String),
    #[error("trace I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// What an emitter produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TraceSummary {
    /// Data records written (header comments excluded).
    pub records: u64,
    /// Simulated time covered by the trace, microseconds.
    pub duration_us: u64,
}

/// Aggregate workload numbers, reported before emission.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadStats {
    pub model: &'static str,
    pub model_size_bytes: u64,
    pub num_layers: u32,
    pub weight_blocks: usize,
    pub sectors_per_token: u64,
    pub bytes_per_token: u64,
    pub tokens: u32,
    pub campaign_read_bytes: u64,
    pub estimated_blocks_used: u64,
    pub avg_reads_per_block: f64,
}

impl fmt::Display for WorkloadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== LLM Workload Statistics ===")?;
        writeln!(f, "Model: {}", self.model)?;
        writeln!(
            f,
            "Total size: {:.2} GiB",
            self.model_size_bytes as f64 / GIB as f64
        )?;
        writeln!(f, "Layers: {}", self.num_layers)?;
        writeln!(f, "Weight blocks: {}", self.weight_blocks)?;
        writeln!(
            f,
            "Reads per token: {} sectors ({:.2} GiB)",
            self.sectors_per_token,
            self.bytes_per_token as f64 / GIB as f64
        )?;
        writeln!(
            f,
            "Total reads for {} tokens: {:.2} TiB",
            self.tokens,
            self.campaign_read_bytes as f64 / (1024.0 * GIB as f64)
        )?;
        writeln!(f, "Estimated blocks used: {}", self.estimated_blocks_used)?;
        writeln!(f, "Average reads per block: {:.0}", self.avg_reads_per_block)?;
        write!(f, "===============================")
    }
}

/// Deterministic weight layout plus the trace emitters over it.
#[derive(Debug, Clone)]
pub struct LlmWorkload {
    model: ModelSpec,
    config: InferenceConfig,
    page_size_bytes: u32,
    pages_per_block: u32,
    weight_blocks: Vec<WeightBlock>,
}

impl LlmWorkload {
    pub fn new(
        model: ModelSpec,
        config: InferenceConfig,
        ssd_capacity_bytes: u64,
        page_size_bytes: u32,
        pages_per_block: u32,
    ) -> Self {
        let weight_blocks = Self::build_layout(&model);
        let span_bytes = weight_blocks
            .last()
            .map(|wb| (wb.lba_end + 1) * SECTOR_SIZE_BYTES)
            .unwrap_or(0);
        if span_bytes > ssd_capacity_bytes {
            warn!(
                "{} weight layout ({} B) exceeds SSD capacity ({} B)",
                model.name, span_bytes, ssd_capacity_bytes
            );
        }
        info!(
            "laid out {} weight blocks for {} over LBA 0..={}",
            weight_blocks.len(),
            model.name,
            weight_blocks.last().map(|wb| wb.lba_end).unwrap_or(0)
        );

        LlmWorkload {
            model,
            config,
            page_size_bytes,
            pages_per_block,
            weight_blocks,
        }
    }

    /// Walk layers in order, placing the six matrices of each contiguously.
    /// Matrix size is `weights_per_layer / 6` rounded down, so the layout is
    /// reproducible from the catalogue entry alone.
    fn build_layout(model: &ModelSpec) -> Vec<WeightBlock> {
        let matrix_bytes = model.weights_per_layer / MatrixName::LAYER_ORDER.len() as u64;
        let matrix_sectors = matrix_bytes / SECTOR_SIZE_BYTES;
        assert!(matrix_sectors > 0, "weight matrix smaller than one sector");

        let mut blocks = Vec::with_capacity(model.num_layers as usize * 6);
        let mut cursor = 0u64;
        for layer_id in 0..model.num_layers {
            for matrix in MatrixName::LAYER_ORDER {
                let block = WeightBlock {
                    lba_start: cursor,
                    lba_end: cursor + matrix_sectors - 1,
                    layer_id,
                    matrix,
                };
                cursor = block.lba_end + 1;
                blocks.push(block);
            }
        }
        blocks
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn weight_blocks(&self) -> &[WeightBlock] {
        &self.weight_blocks
    }

    pub fn stats(&self) -> WorkloadStats {
        let sectors_per_token: u64 = self.weight_blocks.iter().map(WeightBlock::sectors).sum();
        let bytes_per_token = sectors_per_token * SECTOR_SIZE_BYTES;
        let tokens = self.config.num_tokens_to_generate;
        let campaign_read_bytes = bytes_per_token * tokens as u64;

        let total_lba_span = self
            .weight_blocks
            .last()
            .map(|wb| wb.lba_end + 1)
            .unwrap_or(0);
        let sectors_per_block =
            (self.pages_per_block as u64 * self.page_size_bytes as u64) / SECTOR_SIZE_BYTES;
        let estimated_blocks_used = total_lba_span.div_ceil(sectors_per_block);
        let avg_reads_per_block = if estimated_blocks_used == 0 {
            0.0
        } else {
            (sectors_per_token * tokens as u64) as f64 / estimated_blocks_used as f64
        };

        WorkloadStats {
            model: self.model.name,
            model_size_bytes: self.model.size_bytes,
            num_layers: self.model.num_layers,
            weight_blocks: self.weight_blocks.len(),
            sectors_per_token,
            bytes_per_token,
            tokens,
            campaign_read_bytes,
            estimated_blocks_used,
            avg_reads_per_block,
        }
    }

    /// Emit the requested trace shape to `path`, failing fast on I/O errors.
    pub fn generate(&self, kind: TraceKind, path: &Path) -> Result<TraceSummary, WorkloadError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        let summary = match kind {
            TraceKind::Compact => self.write_compact_trace(&mut out)?,
            TraceKind::Decode => self.write_decode_trace(&mut out)?,
            TraceKind::Full => self.write_full_trace(&mut out)?,
        };
        out.flush()?;
        info!(
            "trace written to {}: {} records, {:.3} s simulated",
            path.display(),
            summary.records,
            summary.duration_us as f64 / 1e6
        );
        Ok(summary)
    }

    /// One pass through all weight matrices plus the end-of-iteration compute
    /// tick. Replay it N times (workload relay count) to simulate N tokens.
    pub fn write_compact_trace<W: Write>(&self, out: &mut W) -> io::Result<TraceSummary> {
        writeln!(out, "# LLM single-iteration trace (compact)")?;
        writeln!(out, "# Model: {}", self.model.name)?;
        writeln!(
            out,
            "# One iteration = one token: a full pass over the weights; \
             set the workload relay count to the token count to replay it"
        )?;
        writeln!(
            out,
            "# Compute time per iteration: {} us",
            self.config.compute_time_per_token_us
        )?;
        writeln!(out, "# Format: arrival_time(us) device_id lba size_sectors read/write(1/0)")?;

        let mut timestamp_us = 0u64;
        let records = self.write_traversal(out, &mut timestamp_us)?;
        timestamp_us += self.config.compute_time_per_token_us as u64;

        Ok(TraceSummary {
            records,
            duration_us: timestamp_us,
        })
    }

    /// Token-by-token decode workload: every generated token re-reads the
    /// full weight set.
    pub fn write_decode_trace<W: Write>(&self, out: &mut W) -> io::Result<TraceSummary> {
        writeln!(out, "# LLM decode phase trace")?;
        writeln!(out, "# Model: {}", self.model.name)?;
        writeln!(
            out,
            "# Tokens to generate: {}",
            self.config.num_tokens_to_generate
        )?;
        writeln!(out, "# Format: arrival_time(us) device_id lba size_sectors read/write(1/0)")?;

        let mut timestamp_us = 0u64;
        let records = self.write_decode_section(out, &mut timestamp_us)?;
        Ok(TraceSummary {
            records,
            duration_us: timestamp_us,
        })
    }

    /// Prefill traversal with its longer compute delay, then the decode
    /// section.
    pub fn write_full_trace<W: Write>(&self, out: &mut W) -> io::Result<TraceSummary> {
        writeln!(out, "# LLM full inference trace (prefill + decode)")?;
        writeln!(out, "# Model: {}", self.model.name)?;
        writeln!(out, "# Prefill length: {}", self.config.prefill_length)?;
        writeln!(
            out,
            "# Tokens to generate: {}",
            self.config.num_tokens_to_generate
        )?;
        writeln!(out, "# Format: arrival_time(us) device_id lba size_sectors read/write(1/0)")?;

        let mut timestamp_us = 0u64;
        writeln!(out, "# PREFILL PHASE START")?;
        let mut records = self.write_traversal(out, &mut timestamp_us)?;
        // KV-cache build: matrix-matrix work scales with the prompt length
        let prefill_compute = self.config.compute_time_per_token_us
            * self.config.prefill_length as f64
            * 0.5;
        timestamp_us += prefill_compute as u64;

        writeln!(out, "# DECODE PHASE START")?;
        records += self.write_decode_section(out, &mut timestamp_us)?;
        Ok(TraceSummary {
            records,
            duration_us: timestamp_us,
        })
    }

    fn write_decode_section<W: Write>(
        &self,
        out: &mut W,
        timestamp_us: &mut u64,
    ) -> io::Result<u64> {
        let mut records = 0u64;
        for token in 0..self.config.num_tokens_to_generate {
            records += self.write_traversal(out, timestamp_us)?;
            *timestamp_us += self.config.compute_time_per_token_us as u64;

            if (token + 1) % 1000 == 0 {
                info!(
                    "generated trace for {} tokens ({:.3} s simulated)",
                    token + 1,
                    *timestamp_us as f64 / 1e6
                );
            }
        }
        Ok(records)
    }

    /// One pass over every weight block in page-sized chunks, the final chunk
    /// truncated to the remaining sectors. All reads target device 0.
    fn write_traversal<W: Write>(&self, out: &mut W, timestamp_us: &mut u64) -> io::Result<u64> {
        let sectors_per_page = self.page_size_bytes as u64 / SECTOR_SIZE_BYTES;
        let mut records = 0u64;
        for wb in &self.weight_blocks {
            let mut lba = wb.lba_start;
            let mut remaining = wb.sectors();
            while remaining > 0 {
                let sectors = remaining.min(sectors_per_page);
                writeln!(out, "{} 0 {} {} 1", timestamp_us, lba, sectors)?;
                lba += sectors;
                remaining -= sectors;
                *timestamp_us += self.config.inter_read_gap_us;
                records += 1;
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SSD_CAPACITY: u64 = 256 * GIB;

    fn tiny_model() -> ModelSpec {
        ModelSpec {
            name: "Tiny",
            size_bytes: 2 * 1024 * 1024,
            num_layers: 2,
            hidden_dim: 64,
            weights_per_layer: 1024 * 1024,
        }
    }

    fn tiny_workload(tokens: u32) -> LlmWorkload {
        let config = InferenceConfig {
            num_tokens_to_generate: tokens,
            ..Default::default()
        };
        LlmWorkload::new(tiny_model(), config, SSD_CAPACITY, 4096, 256)
    }

    fn data_lines(trace: &str) -> Vec<&str> {
        trace.lines().filter(|l| !l.starts_with('#')).collect()
    }

    #[test]
    fn test_layout_is_deterministic() {
        let a = tiny_workload(1);
        let b = tiny_workload(1);
        assert_eq!(a.weight_blocks(), b.weight_blocks());
    }

    #[test]
    fn test_layout_contiguous_from_lba_zero() {
        let workload = LlmWorkload::new(
            ModelSpec::llama2_13b(),
            InferenceConfig::default(),
            SSD_CAPACITY,
            16 * 1024,
            256,
        );
        let blocks = workload.weight_blocks();
        assert_eq!(blocks[0].lba_start, 0);
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].lba_start, pair[0].lba_end + 1);
        }
    }

    #[test]
    fn test_layout_order_is_layer_major() {
        let workload = tiny_workload(1);
        let blocks = workload.weight_blocks();
        assert_eq!(blocks.len(), 12);
        assert_eq!(blocks[0].layer_id, 0);
        assert_eq!(blocks[0].matrix, MatrixName::QProj);
        assert_eq!(blocks[5].matrix, MatrixName::Ffn2);
        assert_eq!(blocks[6].layer_id, 1);
        assert_eq!(blocks[6].matrix, MatrixName::QProj);
    }

    #[test]
    fn test_layout_coverage_tolerates_division_loss() {
        for model in [
            ModelSpec::llama2_7b(),
            ModelSpec::llama2_13b(),
            ModelSpec::llama2_70b(),
            ModelSpec::opt_6_7b(),
        ] {
            let blocks = LlmWorkload::build_layout(&model);
            let covered: u64 = blocks.iter().map(|b| b.sectors() * SECTOR_SIZE_BYTES).sum();
            let target = model.num_layers as u64 * 6 * (model.weights_per_layer / 6);
            assert!(covered <= target);
            // each matrix loses at most one partial sector
            assert!(target - covered < blocks.len() as u64 * SECTOR_SIZE_BYTES);
        }
    }

    #[test]
    fn test_llama2_7b_layout_shape() {
        let workload = LlmWorkload::new(
            ModelSpec::llama2_7b(),
            InferenceConfig::default(),
            SSD_CAPACITY,
            4096,
            256,
        );
        let blocks = workload.weight_blocks();
        assert_eq!(blocks.len(), 192);
        // matrix_bytes = (7 GiB / 32) / 6 = 39,146,837 -> 76,458 sectors
        assert_eq!(blocks[0].lba_start, 0);
        assert_eq!(blocks[0].lba_end, 76_457);
        assert_eq!(blocks[1].lba_start, 76_458);
    }

    #[test]
    fn test_llama2_7b_compact_first_record_and_compute_tick() {
        let workload = LlmWorkload::new(
            ModelSpec::llama2_7b(),
            InferenceConfig::default(),
            SSD_CAPACITY,
            4096,
            256,
        );
        let mut buf = Vec::new();
        let summary = workload.write_compact_trace(&mut buf).unwrap();
        let trace = String::from_utf8(buf).unwrap();
        let lines = data_lines(&trace);
        assert_eq!(lines[0], "0 0 0 8 1");

        // final compute tick pushes the duration past the last read by at
        // least the configured 1000 us
        let last_ts: u64 = lines
            .last()
            .unwrap()
            .split_whitespace()
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(summary.duration_us >= last_ts + 1000);
    }

    #[test]
    fn test_traversal_chunking_truncates_final_read() {
        let workload = tiny_workload(1);
        // matrix: 1 MiB / 6 = 174,762 B -> 341 sectors; pages hold 8
        let mut buf = Vec::new();
        workload.write_compact_trace(&mut buf).unwrap();
        let trace = String::from_utf8(buf).unwrap();
        let first_block: Vec<&str> = data_lines(&trace)
            .into_iter()
            .take(43)
            .collect();
        for line in &first_block[..42] {
            assert!(line.ends_with(" 8 1"), "line `{line}`");
        }
        assert!(first_block[42].ends_with(" 5 1"), "line `{}`", first_block[42]);
    }

    #[test]
    fn test_timestamps_monotone_nondecreasing() {
        let workload = tiny_workload(3);
        let mut buf = Vec::new();
        workload.write_full_trace(&mut buf).unwrap();
        let trace = String::from_utf8(buf).unwrap();
        let mut prev = 0u64;
        for line in data_lines(&trace) {
            let ts: u64 = line.split_whitespace().next().unwrap().parse().unwrap();
            assert!(ts >= prev, "timestamp went backwards at `{line}`");
            prev = ts;
        }
    }

    #[test]
    fn test_decode_equals_shifted_compact_repeats() {
        let tokens = 3u32;
        let workload = tiny_workload(tokens);

        let mut compact = Vec::new();
        let compact_summary = workload.write_compact_trace(&mut compact).unwrap();
        let compact = String::from_utf8(compact).unwrap();
        let compact_lines = data_lines(&compact);

        let mut decode = Vec::new();
        workload.write_decode_trace(&mut decode).unwrap();
        let decode = String::from_utf8(decode).unwrap();
        let decode_lines = data_lines(&decode);

        assert_eq!(
            decode_lines.len(),
            compact_lines.len() * tokens as usize
        );
        for (i, line) in decode_lines.iter().enumerate() {
            let iteration = (i / compact_lines.len()) as u64;
            let template = compact_lines[i % compact_lines.len()];
            let mut fields = template.splitn(2, ' ');
            let ts: u64 = fields.next().unwrap().parse().unwrap();
            let rest = fields.next().unwrap();
            let expected = format!("{} {}", ts + iteration * compact_summary.duration_us, rest);
            assert_eq!(*line, expected, "record {i}");
        }
    }

    #[test]
    fn test_generate_writes_file_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trace.txt");
        let workload = tiny_workload(2);
        let summary = workload.generate(TraceKind::Decode, &path).unwrap();

        let trace = std::fs::read_to_string(&path).unwrap();
        assert!(trace.contains("# Model: Tiny"));
        assert!(trace.contains("# Tokens to generate: 2"));
        assert!(trace.contains("arrival_time(us)"));
        assert_eq!(data_lines(&trace).len() as u64, summary.records);
    }

    #[test]
    fn test_stats_reflect_layout() {
        let workload = tiny_workload(10);
        let stats = workload.stats();
        assert_eq!(stats.weight_blocks, 12);
        assert_eq!(stats.sectors_per_token, 12 * 341);
        assert_eq!(stats.bytes_per_token, 12 * 341 * SECTOR_SIZE_BYTES);
        assert_eq!(stats.tokens, 10);
        assert!(stats.estimated_blocks_used >= 1);
    }

    #[test]
    fn test_cli_name_resolution() {
        assert_eq!(
            ModelSpec::from_cli_name("llama70b"),
            Some(ModelSpec::llama2_70b())
        );
        assert_eq!(ModelSpec::from_cli_name("gpt4"), None);
        assert_eq!(TraceKind::from_cli_name("full"), Some(TraceKind::Full));
        assert_eq!(TraceKind::from_cli_name("sparse"), None);
    }
}
