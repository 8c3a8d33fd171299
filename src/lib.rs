//! Quantized grouped 2-D convolution with deterministic single-bit fault
//! injection, for hardware fault-injection studies on int8 inference.
//!
//! The caller owns all tensor buffers and supplies already-resolved inputs:
//! shapes, quantized data, per-channel requantization tables, convolution
//! hyperparameters, threading configuration, and precomputed fault-site lists.

pub mod kernels;
pub mod sites;
pub mod tensor;
