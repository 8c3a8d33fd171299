pub mod conv2d;
pub mod fault;
pub mod partition;
pub mod quantize;
pub mod utils;

pub use conv2d::{conv_per_channel, ConvParams};
pub use fault::{sites_for_channel_range, FaultConfig, FaultCursor, FaultSite};
pub use partition::{channel_chunks, conv_per_channel_disturbed, plan_chunks, ChunkPlan, Threading};
pub use quantize::{multiply_by_quantized_multiplier, PerChannelQuant};
