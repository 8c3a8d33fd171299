use std::ops::Range;
use std::thread;

use crate::kernels::conv2d::{conv_channel_range, ConvGeometry, ConvParams};
use crate::kernels::fault::{sites_for_channel_range, FaultConfig, FaultCursor, FaultSite};
use crate::kernels::quantize::PerChannelQuant;
use crate::kernels::utils;
use crate::tensor::TensorView;

/// Threading configuration: a static choice made once per invocation, with no
/// dynamic rebalancing. Disabled means one sequential pass over the full
/// channel range.
#[derive(Debug, Clone, Copy)]
pub struct Threading {
    pub enabled: bool,
    pub chunk_size: usize,
}

impl Threading {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            chunk_size: 0,
        }
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "Threading: chunk size must be nonzero");
        Self {
            enabled: true,
            chunk_size,
        }
    }

    /// Chunk size for `workers` roughly-equal contiguous channel ranges.
    pub fn for_workers(workers: usize, output_depth: usize) -> Self {
        assert!(workers > 0, "Threading: worker count must be nonzero");
        Self::with_chunk_size(output_depth.div_ceil(workers).max(1))
    }
}

/// Contiguous output-channel ranges of `chunk_size` (last one clamped),
/// covering `[0, output_depth)` exactly once.
pub fn channel_chunks(output_depth: usize, chunk_size: usize) -> Vec<Range<usize>> {
    assert!(chunk_size > 0, "channel_chunks: chunk size must be nonzero");
    (0..output_depth.div_ceil(chunk_size))
        .map(|i| {
            let start = i * chunk_size;
            start..(start + chunk_size).min(output_depth)
        })
        .collect()
}

/// One worker's slice of the output-channel dimension plus the fault sites
/// whose output channel falls inside it, in consumption order.
#[derive(Debug, Clone)]
pub struct ChunkPlan {
    pub channels: Range<usize>,
    pub sites: Vec<FaultSite>,
}

pub fn plan_chunks(sites: &[FaultSite], output_depth: usize, chunk_size: usize) -> Vec<ChunkPlan> {
    channel_chunks(output_depth, chunk_size)
        .into_iter()
        .map(|channels| ChunkPlan {
            sites: sites_for_channel_range(sites, output_depth, &channels),
            channels,
        })
        .collect()
}

#[derive(Clone, Copy)]
struct OutPtr(*mut i8);
// Safety: workers write disjoint output positions; each chunk owns the
// positions whose channel component lies in its range.
unsafe impl Send for OutPtr {}
unsafe impl Sync for OutPtr {}

/// Quantized grouped convolution with optional fault injection and optional
/// channel-chunked threading.
///
/// No fault configuration behaves identically to
/// [`conv_per_channel`](crate::kernels::conv_per_channel). With threading
/// enabled the output is
/// bit-identical to the sequential pass: channel ranges are disjoint, each
/// channel's computation is self-contained, and every chunk consumes its own
/// re-sorted fault subset, so scheduling order has no effect on values or on
/// which fault lands on which term. Workers are created fresh per invocation
/// and joined before return.
pub fn conv_per_channel_disturbed<'a>(
    params: &ConvParams,
    quant: &PerChannelQuant<'_>,
    input: &TensorView<'_, i8>,
    filter: &TensorView<'_, i8>,
    bias: Option<&TensorView<'_, i32>>,
    faults: Option<&FaultConfig>,
    threading: &Threading,
    out: &'a mut Vec<i8>,
) -> TensorView<'a, i8> {
    let geom = ConvGeometry::resolve(params, quant, input, filter, bias);
    utils::ensure_capacity(out, geom.output_len());

    let input_data: &[i8] = &input.data;
    let filter_data: &[i8] = &filter.data;
    let bias_data = bias.map(|b| b.data.as_ref());
    let bit = faults.map_or(0, |f| f.bit_position);
    let active: &[FaultSite] = faults.map_or(&[], |f| f.active());

    if !threading.enabled {
        let mut cursor = FaultCursor::over(active, bit);
        // Safety: `out` holds exactly `output_len` elements and the full
        // channel range runs on this thread alone.
        unsafe {
            conv_channel_range(
                &geom,
                params,
                quant,
                input_data,
                filter_data,
                bias_data,
                0,
                geom.output_depth,
                &mut cursor,
                out.as_mut_ptr(),
            );
        }
    } else {
        let plans = plan_chunks(active, geom.output_depth, threading.chunk_size);
        let out_ptr = OutPtr(out.as_mut_ptr());
        thread::scope(|scope| {
            for plan in plans {
                let out_ptr = out_ptr;
                let geom = geom;
                scope.spawn(move || {
                    let out_ptr = out_ptr;
                    let mut cursor = FaultCursor::owned(plan.sites, bit);
                    // Safety: `out` holds exactly `output_len` elements;
                    // chunk channel ranges never overlap, so this worker is
                    // the only writer of its output positions.
                    unsafe {
                        conv_channel_range(
                            &geom,
                            params,
                            quant,
                            input_data,
                            filter_data,
                            bias_data,
                            plan.channels.start,
                            plan.channels.end,
                            &mut cursor,
                            out_ptr.0,
                        );
                    }
                });
            }
        });
    }

    TensorView::from_slice(out, geom.output_shape())
}
