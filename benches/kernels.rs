//! Kernel-level benchmarks for the quantized convolution paths
//!
//! Run with: cargo bench --bench kernels

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use falla::kernels::{
    conv_per_channel, conv_per_channel_disturbed, ConvParams, FaultConfig, FaultSite,
    PerChannelQuant, Threading,
};
use falla::tensor::TensorView;

fn tensor_i8(len: usize, shape: Vec<usize>) -> TensorView<'static, i8> {
    let data: Vec<i8> = (0..len).map(|i| ((i * 31 + 7) % 11) as i8 - 5).collect();
    TensorView::from_owned(data, shape)
}

fn bench_conv(c: &mut Criterion) {
    let mut group = c.benchmark_group("conv_per_channel");

    // (input HxW, input depth, output depth, kernel)
    let sizes = [(16, 8, 16, 3), (32, 8, 16, 3), (32, 16, 32, 3)];

    for &(hw, in_depth, out_depth, k) in &sizes {
        let input = tensor_i8(hw * hw * in_depth, vec![1, hw, hw, in_depth]);
        let filter = tensor_i8(out_depth * k * k * in_depth, vec![out_depth, k, k, in_depth]);
        let mult = vec![1 << 30; out_depth];
        let shift = vec![-4; out_depth];
        let params = ConvParams {
            pad_h: 1,
            pad_w: 1,
            ..ConvParams::default()
        };

        let out_elems = (hw * hw * out_depth) as u64;
        group.throughput(Throughput::Elements(out_elems));
        group.bench_with_input(
            BenchmarkId::new("clean", format!("{}x{}x{}->{}", hw, hw, in_depth, out_depth)),
            &hw,
            |bencher, _| {
                let quant = PerChannelQuant::new(&mult, &shift);
                let mut out = Vec::new();
                bencher.iter(|| {
                    conv_per_channel(
                        black_box(&params),
                        &quant,
                        black_box(&input),
                        black_box(&filter),
                        None,
                        &mut out,
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_disturbed(c: &mut Criterion) {
    let mut group = c.benchmark_group("conv_disturbed");

    let hw = 32;
    let in_depth = 16;
    let out_depth = 32;
    let input = tensor_i8(hw * hw * in_depth, vec![1, hw, hw, in_depth]);
    let filter = tensor_i8(out_depth * 9 * in_depth, vec![out_depth, 3, 3, in_depth]);
    let mult = vec![1 << 30; out_depth];
    let shift = vec![-4; out_depth];
    let params = ConvParams {
        pad_h: 1,
        pad_w: 1,
        ..ConvParams::default()
    };

    let total_out = hw * hw * out_depth;
    let sites: Vec<FaultSite> = (0..64)
        .map(|k| FaultSite {
            output_position: (k * 257) % total_out,
            reduction_position: (k * 13) % (9 * in_depth),
        })
        .collect();
    let config = FaultConfig::new(0, 5, vec![sites]);

    for workers in [1usize, 2, 4] {
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |bencher, &w| {
            let quant = PerChannelQuant::new(&mult, &shift);
            let threading = if w == 1 {
                Threading::disabled()
            } else {
                Threading::for_workers(w, out_depth)
            };
            let mut out = Vec::new();
            bencher.iter(|| {
                conv_per_channel_disturbed(
                    black_box(&params),
                    &quant,
                    black_box(&input),
                    black_box(&filter),
                    None,
                    Some(&config),
                    &threading,
                    &mut out,
                );
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_conv, bench_disturbed);
criterion_main!(benches);
