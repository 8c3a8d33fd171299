use crate::kernels::fault::FaultCursor;
use crate::kernels::quantize::{multiply_by_quantized_multiplier, PerChannelQuant};
use crate::kernels::utils;
use crate::tensor::TensorView;

/// Convolution hyperparameters, immutable for the duration of one call.
#[derive(Debug, Clone, Copy)]
pub struct ConvParams {
    pub stride_h: usize,
    pub stride_w: usize,
    pub dilation_h: usize,
    pub dilation_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
    pub input_offset: i32,
    pub output_offset: i32,
    pub activation_min: i32,
    pub activation_max: i32,
}

impl Default for ConvParams {
    fn default() -> Self {
        Self {
            stride_h: 1,
            stride_w: 1,
            dilation_h: 1,
            dilation_w: 1,
            pad_h: 0,
            pad_w: 0,
            input_offset: 0,
            output_offset: 0,
            activation_min: i32::from(i8::MIN),
            activation_max: i32::from(i8::MAX),
        }
    }
}

/// Dimensions resolved once per invocation from the rank-4 tensor shapes.
///
/// Resolution enforces the abort-class preconditions; a violation is a fatal
/// configuration error with no recovery path.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConvGeometry {
    pub batches: usize,
    pub input_height: usize,
    pub input_width: usize,
    pub input_depth: usize,
    pub filter_height: usize,
    pub filter_width: usize,
    pub filter_input_depth: usize,
    pub output_height: usize,
    pub output_width: usize,
    pub output_depth: usize,
    pub filters_per_group: usize,
}

impl ConvGeometry {
    pub(crate) fn resolve(
        params: &ConvParams,
        quant: &PerChannelQuant<'_>,
        input: &TensorView<'_, i8>,
        filter: &TensorView<'_, i8>,
        bias: Option<&TensorView<'_, i32>>,
    ) -> Self {
        assert!(
            input.dim() == 4,
            "ConvPerChannel: expected rank-4 input [N,H,W,C], got rank {}",
            input.dim()
        );
        assert!(
            filter.dim() == 4,
            "ConvPerChannel: expected rank-4 filter [C_out,kH,kW,C_in/g], got rank {}",
            filter.dim()
        );
        assert!(params.stride_h > 0 && params.stride_w > 0, "ConvPerChannel: zero stride");
        assert!(
            params.dilation_h > 0 && params.dilation_w > 0,
            "ConvPerChannel: zero dilation"
        );
        assert!(
            params.activation_min <= params.activation_max,
            "ConvPerChannel: activation bounds inverted ({} > {})",
            params.activation_min,
            params.activation_max
        );

        let batches = input.size(0);
        let input_height = input.size(1);
        let input_width = input.size(2);
        let input_depth = input.size(3);

        let output_depth = filter.size(0);
        let filter_height = filter.size(1);
        let filter_width = filter.size(2);
        let filter_input_depth = filter.size(3);

        assert!(filter_input_depth > 0, "ConvPerChannel: zero filter input depth");
        let groups = input_depth / filter_input_depth;
        assert!(groups != 0, "ConvPerChannel: zero group count");
        assert!(
            input_depth % filter_input_depth == 0,
            "ConvPerChannel: input depth {} not divisible by filter input depth {}",
            input_depth,
            filter_input_depth
        );
        let filters_per_group = output_depth / groups;
        assert!(filters_per_group != 0, "ConvPerChannel: zero filters per group");

        if let Some(b) = bias {
            assert!(
                b.flat_len() == output_depth,
                "ConvPerChannel: bias size {} does not match output depth {}",
                b.flat_len(),
                output_depth
            );
        }
        assert!(
            quant.channels() == output_depth,
            "ConvPerChannel: quantization table has {} channels, output depth is {}",
            quant.channels(),
            output_depth
        );

        let output_height = (input_height + 2 * params.pad_h
            - params.dilation_h * (filter_height - 1)
            - 1)
            / params.stride_h
            + 1;
        let output_width = (input_width + 2 * params.pad_w
            - params.dilation_w * (filter_width - 1)
            - 1)
            / params.stride_w
            + 1;

        Self {
            batches,
            input_height,
            input_width,
            input_depth,
            filter_height,
            filter_width,
            filter_input_depth,
            output_height,
            output_width,
            output_depth,
            filters_per_group,
        }
    }

    pub(crate) fn output_len(&self) -> usize {
        self.batches * self.output_height * self.output_width * self.output_depth
    }

    pub(crate) fn output_shape(&self) -> Vec<usize> {
        vec![
            self.batches,
            self.output_height,
            self.output_width,
            self.output_depth,
        ]
    }
}

/// Quantized grouped convolution over one contiguous output-channel range.
///
/// For each output element the reduction accumulates
/// `filter[f] * (input[f] + input_offset)` in 32 bits, routing every term
/// through the fault cursor before accumulation. Out-of-image positions
/// contribute nothing and do not advance the cursor. After the reduction:
/// bias, per-channel requantization, output offset, activation clamp, cast.
///
/// The accumulator is not overflow-checked: the design assumes the filter
/// window stays below 2^16 terms. Violating callers get silently wrong
/// results, not an error.
///
/// # Safety
///
/// `out` must point to a buffer of `geom.output_len()` elements, and no other
/// thread may write any position whose channel component lies in
/// `channel_start..channel_end` while this call runs.
pub(crate) unsafe fn conv_channel_range(
    geom: &ConvGeometry,
    params: &ConvParams,
    quant: &PerChannelQuant<'_>,
    input_data: &[i8],
    filter_data: &[i8],
    bias_data: Option<&[i32]>,
    channel_start: usize,
    channel_end: usize,
    faults: &mut FaultCursor<'_>,
    out: *mut i8,
) {
    let out_row = geom.output_width * geom.output_depth;
    let out_plane = geom.output_height * out_row;

    for batch in 0..geom.batches {
        for out_y in 0..geom.output_height {
            let in_y_origin = (out_y * params.stride_h) as isize - params.pad_h as isize;
            for out_x in 0..geom.output_width {
                let in_x_origin = (out_x * params.stride_w) as isize - params.pad_w as isize;
                for out_channel in channel_start..channel_end {
                    let output_position =
                        batch * out_plane + out_y * out_row + out_x * geom.output_depth + out_channel;
                    let group = out_channel / geom.filters_per_group;

                    let mut acc: i32 = 0;
                    for filter_y in 0..geom.filter_height {
                        let in_y = in_y_origin + (filter_y * params.dilation_h) as isize;
                        if in_y < 0 || in_y >= geom.input_height as isize {
                            continue;
                        }
                        for filter_x in 0..geom.filter_width {
                            let in_x = in_x_origin + (filter_x * params.dilation_w) as isize;
                            if in_x < 0 || in_x >= geom.input_width as isize {
                                continue;
                            }
                            for in_channel in 0..geom.filter_input_depth {
                                let reduction_position = (filter_y * geom.filter_width + filter_x)
                                    * geom.filter_input_depth
                                    + in_channel;

                                let input_val = i32::from(
                                    input_data[utils::nhwc_offset(
                                        geom.input_height,
                                        geom.input_width,
                                        geom.input_depth,
                                        batch,
                                        in_y as usize,
                                        in_x as usize,
                                        in_channel + group * geom.filter_input_depth,
                                    )],
                                );
                                let filter_val = i32::from(
                                    filter_data[utils::nhwc_offset(
                                        geom.filter_height,
                                        geom.filter_width,
                                        geom.filter_input_depth,
                                        out_channel,
                                        filter_y,
                                        filter_x,
                                        in_channel,
                                    )],
                                );

                                let product = faults.apply(
                                    output_position,
                                    reduction_position,
                                    filter_val * (input_val + params.input_offset),
                                );
                                acc = acc.wrapping_add(product);
                            }
                        }
                    }

                    if let Some(bias) = bias_data {
                        acc = acc.wrapping_add(bias[out_channel]);
                    }
                    acc = multiply_by_quantized_multiplier(
                        acc,
                        quant.multiplier[out_channel],
                        quant.shift[out_channel],
                    );
                    acc += params.output_offset;
                    acc = acc.max(params.activation_min).min(params.activation_max);
                    *out.add(output_position) = acc as i8;
                }
            }
        }
    }
}

/// Quantized grouped convolution without perturbation: the fault hook never
/// fires. Fills `out` in place and returns a view over it.
pub fn conv_per_channel<'a>(
    params: &ConvParams,
    quant: &PerChannelQuant<'_>,
    input: &TensorView<'_, i8>,
    filter: &TensorView<'_, i8>,
    bias: Option<&TensorView<'_, i32>>,
    out: &'a mut Vec<i8>,
) -> TensorView<'a, i8> {
    let geom = ConvGeometry::resolve(params, quant, input, filter, bias);
    utils::ensure_capacity(out, geom.output_len());

    let mut faults = FaultCursor::disabled();
    // Safety: `out` holds exactly `output_len` elements and the full channel
    // range runs on this thread alone.
    unsafe {
        conv_channel_range(
            &geom,
            params,
            quant,
            &input.data,
            &filter.data,
            bias.map(|b| b.data.as_ref()),
            0,
            geom.output_depth,
            &mut faults,
            out.as_mut_ptr(),
        );
    }

    TensorView::from_slice(out, geom.output_shape())
}
