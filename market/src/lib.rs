pub mod candle;
pub mod depth_ratio;
pub mod types;

pub use candle::{Candle, CandleAggregator, CandleWindow, bucket_start};
pub use depth_ratio::{
    BandRatio, BandVolume, DegenerateSnapshot, DepthBand, DepthRatioAggregator,
    DepthRatioResult, InvalidBand, band_volumes, calculate_depth_ratio, round_ratio,
};
pub use types::{BookSide, OrderBookSnapshot, PriceLevel, PriceSample};
